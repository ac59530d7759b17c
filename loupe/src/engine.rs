// Copyright 2025 the Loupe Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

use core::time::Duration;
use std::sync::Arc;
use std::sync::mpsc::{self, Receiver, Sender};

use loupe_geometry::{ContinuousTransformType, IntRect, IntSize, Transform};
use loupe_source::{CreateTileDecoderError, ImageInfo, ImageSourceFactory, RegionDecoderFactory};
use loupe_tiles::{
    TileAnimationSpec, TileBitmapCache, TileChanges, TileDecoder, TileExecutor, TileManager,
    TileSnapshot, calculate_preferred_tile_size, check_new_preferred_tile_size,
    create_tile_decoder,
};
use loupe_zoom::{ZoomConfig, ZoomableEngine};

use crate::{SubsamplingChanges, SubsamplingConfig};

/// Outcome of a decoder open job, tagged with the source generation it was
/// started for.
struct DecoderOpened {
    generation: u64,
    result: Result<TileDecoder, CreateTileDecoderError>,
}

/// Inputs of the last tile refresh. A refresh only runs when one changes.
#[derive(Clone, Copy, Debug, PartialEq)]
struct ViewState {
    transform: Transform,
    visible: IntRect,
    rotation: u32,
    continuous: ContinuousTransformType,
}

/// Displays a huge image by decoding only the tiles on screen, at the
/// resolution the current zoom needs.
///
/// The engine owns a [`ZoomableEngine`] and follows its transform. Hosts set
/// the container and content sizes on [`zoom_mut`](Self::zoom_mut), hand in
/// an image with [`set_image_source`](Self::set_image_source), and call
/// [`advance`](Self::advance) once per frame. Between frames they draw
/// [`background_tiles`](Self::background_tiles) and then
/// [`foreground_tiles`](Self::foreground_tiles) over the content.
///
/// Opening a decoder and decoding tiles run on the [`TileExecutor`]; their
/// results are picked up by `advance`, so everything observable changes on
/// the host's thread.
#[derive(Debug)]
pub struct SubsamplingEngine {
    zoom: ZoomableEngine,
    decoder_factory: Arc<dyn RegionDecoderFactory>,
    executor: Arc<dyn TileExecutor>,
    config: SubsamplingConfig,
    source: Option<Arc<dyn ImageSourceFactory>>,
    /// Bumped whenever the decoder is cleaned; open results from older
    /// generations are dropped.
    generation: u64,
    opening: bool,
    opened_tx: Sender<DecoderOpened>,
    opened_rx: Receiver<DecoderOpened>,
    decoder: Option<Arc<TileDecoder>>,
    image_info: Option<ImageInfo>,
    manager: Option<TileManager>,
    /// Content size the decoder was opened for.
    content_size: IntSize,
    /// Last container size seen, and how long it has been stable while a
    /// preferred tile size update is pending.
    container_size: IntSize,
    size_settle: Option<Duration>,
    preferred_tile_size: IntSize,
    stopped: bool,
    ready: bool,
    last_view: Option<ViewState>,
    changes: SubsamplingChanges,
}

impl SubsamplingEngine {
    /// Creates an engine with no image.
    pub fn new(
        zoom_config: ZoomConfig,
        decoder_factory: Arc<dyn RegionDecoderFactory>,
        executor: Arc<dyn TileExecutor>,
        config: SubsamplingConfig,
    ) -> Self {
        let (opened_tx, opened_rx) = mpsc::channel();
        Self {
            zoom: ZoomableEngine::new(zoom_config),
            decoder_factory,
            executor,
            config,
            source: None,
            generation: 0,
            opening: false,
            opened_tx,
            opened_rx,
            decoder: None,
            image_info: None,
            manager: None,
            content_size: IntSize::ZERO,
            container_size: IntSize::ZERO,
            size_settle: None,
            preferred_tile_size: IntSize::ZERO,
            stopped: false,
            ready: false,
            last_view: None,
            changes: SubsamplingChanges::empty(),
        }
    }

    /// The zoom engine this engine follows.
    #[must_use]
    pub fn zoom(&self) -> &ZoomableEngine {
        &self.zoom
    }

    /// Mutable access to the zoom engine, for sizes and gestures.
    ///
    /// Changes are picked up on the next [`advance`](Self::advance).
    pub fn zoom_mut(&mut self) -> &mut ZoomableEngine {
        &mut self.zoom
    }

    /// Current settings.
    #[must_use]
    pub fn config(&self) -> &SubsamplingConfig {
        &self.config
    }

    /// Key of the current image source.
    #[must_use]
    pub fn image_key(&self) -> Option<&str> {
        self.source.as_deref().map(|s| s.key())
    }

    /// Header information of the image, once the decoder has probed it.
    ///
    /// Also set when opening failed after the header was read, for example
    /// because the image is no larger than its thumbnail.
    #[must_use]
    pub fn image_info(&self) -> Option<&ImageInfo> {
        self.image_info.as_ref()
    }

    /// `true` once the decoder and the tile grids are in place.
    #[must_use]
    pub fn ready(&self) -> bool {
        self.ready
    }

    /// `true` while tile decoding is stopped.
    #[must_use]
    pub fn is_stopped(&self) -> bool {
        self.stopped
    }

    /// Tile size the grids are built for; zero until the container settles.
    #[must_use]
    pub fn preferred_tile_size(&self) -> IntSize {
        self.preferred_tile_size
    }

    /// Sample size of the foreground tiles; zero before the first refresh.
    #[must_use]
    pub fn sample_size(&self) -> u32 {
        self.manager.as_ref().map_or(0, TileManager::sample_size)
    }

    /// Union of the foreground tile rects, in image pixels.
    #[must_use]
    pub fn image_load_rect(&self) -> IntRect {
        self.manager
            .as_ref()
            .map_or(IntRect::ZERO, TileManager::image_load_rect)
    }

    /// Tiles of the current sample size, in draw order.
    #[must_use]
    pub fn foreground_tiles(&self) -> Vec<TileSnapshot> {
        self.manager
            .as_ref()
            .map(TileManager::foreground_tiles)
            .unwrap_or_default()
    }

    /// Loaded tiles of previous sample sizes, drawn under the foreground
    /// until it has loaded.
    #[must_use]
    pub fn background_tiles(&self) -> Vec<TileSnapshot> {
        self.manager
            .as_ref()
            .map(TileManager::background_tiles)
            .unwrap_or_default()
    }

    /// Grid dimensions (columns, rows) per sample size, smallest first.
    #[must_use]
    pub fn tile_grid_size_map(&self) -> Vec<(u32, IntSize)> {
        self.manager
            .as_ref()
            .map(|m| m.tile_grid_size_map().to_vec())
            .unwrap_or_default()
    }

    /// Returns what changed since the last call and resets the flags.
    pub fn take_changes(&mut self) -> SubsamplingChanges {
        core::mem::take(&mut self.changes)
    }

    /// Replaces the image. Returns `false` if `source` has the same key as
    /// the current one.
    ///
    /// The previous decoder and all tiles are released, and a new decoder is
    /// opened on the executor once the content size is known.
    pub fn set_image_source(&mut self, source: Option<Arc<dyn ImageSourceFactory>>) -> bool {
        let new_key = source.as_deref().map(|s| s.key());
        if self.image_key() == new_key {
            return false;
        }
        tracing::debug!(from = ?self.image_key(), to = ?new_key, "image source changed");
        self.clean("set_image_source");
        self.source = source;
        self.reset_tile_decoder("set_image_source");
        true
    }

    /// Stops or resumes tile decoding.
    ///
    /// Stopping frees every tile, for example while the view is off screen.
    /// Resuming refreshes on the next [`advance`](Self::advance).
    pub fn set_stopped(&mut self, stopped: bool) -> bool {
        if self.stopped == stopped {
            return false;
        }
        self.stopped = stopped;
        tracing::debug!(stopped, key = ?self.image_key(), "stopped changed");
        if let Some(manager) = self.manager.as_mut() {
            manager.set_stopped(stopped);
        }
        self.last_view = None;
        true
    }

    /// Sets which continuous transforms pause tile loading.
    pub fn set_paused_continuous_transform_types(&mut self, types: ContinuousTransformType) {
        if self.config.tile.paused_continuous_transform_types == types {
            return;
        }
        self.config.tile.paused_continuous_transform_types = types;
        if let Some(manager) = self.manager.as_mut() {
            manager.set_paused_continuous_transform_types(types);
        }
        self.last_view = None;
    }

    /// Keeps or drops previous sample size tiles while new ones load.
    pub fn set_disabled_background_tiles(&mut self, disabled: bool) {
        if self.config.tile.disabled_background_tiles == disabled {
            return;
        }
        self.config.tile.disabled_background_tiles = disabled;
        if let Some(manager) = self.manager.as_mut() {
            manager.set_disabled_background_tiles(disabled);
        }
    }

    /// Sets the fade-in of newly decoded tiles.
    pub fn set_tile_animation(&mut self, spec: TileAnimationSpec) {
        self.config.tile.tile_animation = spec;
        if let Some(manager) = self.manager.as_mut() {
            manager.set_tile_animation(spec);
        }
    }

    /// Sets the extra image area loaded around the visible region.
    pub fn set_load_margin(&mut self, margin: Option<IntSize>) {
        if self.config.tile.load_margin == margin {
            return;
        }
        self.config.tile.load_margin = margin;
        if let Some(manager) = self.manager.as_mut() {
            manager.set_load_margin(margin);
        }
        self.last_view = None;
    }

    /// Replaces the shared tile bitmap cache. Current tiles are released.
    pub fn set_tile_bitmap_cache(&mut self, cache: Option<Arc<dyn TileBitmapCache>>) {
        self.config.tile_bitmap_cache.clone_from(&cache);
        if let Some(manager) = self.manager.as_mut() {
            manager.set_tile_bitmap_cache(cache);
        }
        self.last_view = None;
    }

    /// Bypasses or uses the tile bitmap cache. Current tiles are released on
    /// change.
    pub fn set_disabled_tile_bitmap_cache(&mut self, disabled: bool) {
        if self.config.tile.disabled_tile_bitmap_cache == disabled {
            return;
        }
        self.config.tile.disabled_tile_bitmap_cache = disabled;
        if let Some(manager) = self.manager.as_mut() {
            manager.set_disabled_tile_bitmap_cache(disabled);
        }
        self.last_view = None;
    }

    /// Moves the engine forward by `dt`.
    ///
    /// Advances zoom animations, settles container resizes, collects opened
    /// decoders and decoded tiles, and refreshes tiles if the view moved.
    /// Returns `true` while more frames are needed.
    pub fn advance(&mut self, dt: Duration) -> bool {
        let zoom_animating = self.zoom.advance(dt);
        self.track_container_size(dt);
        if self.zoom.content_size() != self.content_size {
            self.reset_tile_decoder("content_size_changed");
        }
        self.collect_opened_decoders();
        if let Some(manager) = self.manager.as_mut() {
            manager.apply_decode_results();
            manager.advance_animations(dt);
        }
        self.refresh_tiles();
        self.collect_tile_changes();
        zoom_animating
            || self.opening
            || self.size_settle.is_some()
            || self.manager.as_ref().is_some_and(TileManager::is_animating)
    }

    /// Releases the decoder and all tiles and forgets the image source.
    pub fn close(&mut self) {
        self.clean("close");
        self.source = None;
    }

    fn clean(&mut self, caller: &str) {
        self.clean_tile_manager(caller);
        self.clean_tile_decoder(caller);
    }

    fn track_container_size(&mut self, dt: Duration) {
        let container = self.zoom.container_size();
        let elapsed = if container != self.container_size {
            self.container_size = container;
            Duration::ZERO
        } else if let Some(elapsed) = self.size_settle {
            elapsed.saturating_add(dt)
        } else {
            return;
        };
        if elapsed < self.config.size_debounce {
            self.size_settle = Some(elapsed);
            return;
        }
        self.size_settle = None;
        let new = calculate_preferred_tile_size(container);
        let accepted = check_new_preferred_tile_size(self.preferred_tile_size, new);
        tracing::debug!(
            container = %container,
            old = %self.preferred_tile_size,
            new = %new,
            accepted,
            "preferred tile size"
        );
        if accepted {
            self.preferred_tile_size = new;
            self.reset_tile_manager("preferred_tile_size_changed");
        }
    }

    fn reset_tile_decoder(&mut self, caller: &str) {
        self.clean_tile_manager(caller);
        self.clean_tile_decoder(caller);
        self.content_size = self.zoom.content_size();
        let Some(source) = self.source.clone() else {
            tracing::debug!(caller, "decoder not opened: no image source");
            return;
        };
        if self.content_size.is_empty() {
            tracing::debug!(caller, key = source.key(), "decoder not opened: content size is empty");
            return;
        }
        let generation = self.generation;
        let factory = Arc::clone(&self.decoder_factory);
        let sender = self.opened_tx.clone();
        let content_size = self.content_size;
        tracing::debug!(caller, key = source.key(), content = %content_size, "opening decoder");
        self.opening = true;
        self.executor.execute(Box::new(move || {
            let result = create_tile_decoder(source, factory.as_ref(), content_size);
            // The engine may be gone already.
            let _ = sender.send(DecoderOpened { generation, result });
        }));
    }

    fn collect_opened_decoders(&mut self) {
        while let Ok(opened) = self.opened_rx.try_recv() {
            if opened.generation != self.generation {
                tracing::trace!("discarded decoder opened for a previous source");
                continue;
            }
            self.opening = false;
            match opened.result {
                Ok(decoder) => {
                    let info = decoder.image_info().clone();
                    tracing::debug!(key = decoder.key(), image = %info, "decoder opened");
                    self.decoder = Some(Arc::new(decoder));
                    self.set_image_info(Some(info));
                    self.reset_tile_manager("decoder_opened");
                }
                Err(err) => {
                    if err.skipped {
                        tracing::debug!(key = ?self.image_key(), error = %err, "subsampling skipped");
                    } else {
                        tracing::error!(key = ?self.image_key(), error = %err, "decoder failed to open");
                    }
                    self.set_image_info(err.image_info);
                }
            }
        }
    }

    fn reset_tile_manager(&mut self, caller: &str) {
        self.clean_tile_manager(caller);
        let Some(decoder) = self.decoder.clone() else {
            return;
        };
        if self.preferred_tile_size.is_empty() || self.content_size.is_empty() {
            tracing::debug!(
                caller,
                tile = %self.preferred_tile_size,
                content = %self.content_size,
                "tile manager not created: sizes missing"
            );
            return;
        }
        let mut manager = TileManager::new(
            decoder,
            self.content_size,
            self.preferred_tile_size,
            self.config.tile_bitmap_cache.clone(),
            Arc::clone(&self.executor),
            self.config.tile,
        );
        manager.set_stopped(self.stopped);
        self.manager = Some(manager);
        self.changes |= SubsamplingChanges::TILE_GRIDS;
        self.last_view = None;
        self.refresh_ready(caller);
    }

    fn clean_tile_manager(&mut self, caller: &str) {
        let Some(manager) = self.manager.take() else {
            return;
        };
        tracing::debug!(caller, key = manager.image_key(), "tile manager released");
        // Dropping the manager frees its tiles.
        drop(manager);
        self.changes |= SubsamplingChanges::FOREGROUND
            | SubsamplingChanges::BACKGROUND
            | SubsamplingChanges::SAMPLE_SIZE
            | SubsamplingChanges::IMAGE_LOAD_RECT
            | SubsamplingChanges::TILE_GRIDS;
        self.last_view = None;
        self.refresh_ready(caller);
    }

    fn clean_tile_decoder(&mut self, caller: &str) {
        self.generation = self.generation.wrapping_add(1);
        self.opening = false;
        if let Some(decoder) = self.decoder.take() {
            tracing::debug!(caller, key = decoder.key(), "decoder released");
            // Closing drops the decoder pool, which may touch the disk.
            self.executor.execute(Box::new(move || decoder.close()));
        }
        self.set_image_info(None);
        self.refresh_ready(caller);
    }

    fn set_image_info(&mut self, info: Option<ImageInfo>) {
        if self.image_info != info {
            self.image_info = info;
            self.changes |= SubsamplingChanges::IMAGE_INFO;
        }
    }

    fn refresh_ready(&mut self, caller: &str) {
        let ready = self.image_info.is_some() && self.decoder.is_some() && self.manager.is_some();
        if ready == self.ready {
            return;
        }
        self.ready = ready;
        self.changes |= SubsamplingChanges::READY;
        let origin = match &self.image_info {
            Some(info) if ready => info.size(),
            _ => IntSize::ZERO,
        };
        tracing::debug!(caller, ready, origin = %origin, "ready changed");
        self.zoom.set_content_origin_size(origin);
    }

    fn refresh_tiles(&mut self) {
        let Some(manager) = self.manager.as_mut() else {
            return;
        };
        let view = ViewState {
            transform: self.zoom.transform(),
            visible: self.zoom.content_visible_rect(),
            rotation: self.zoom.rotation(),
            continuous: self.zoom.continuous_transform_type(),
        };
        if self.last_view == Some(view) {
            return;
        }
        let caller = match self.last_view {
            Some(last) if last.continuous != view.continuous => "continuous_transform_changed",
            _ => "transform_changed",
        };
        let result = manager.refresh_tiles(
            view.transform.scale.x,
            view.visible,
            view.rotation,
            view.continuous,
            caller,
        );
        tracing::trace!(caller, ?result, "tiles refreshed");
        self.last_view = Some(view);
    }

    fn collect_tile_changes(&mut self) {
        let Some(manager) = self.manager.as_mut() else {
            return;
        };
        let tiles = manager.take_changes();
        for (from, to) in [
            (TileChanges::FOREGROUND, SubsamplingChanges::FOREGROUND),
            (TileChanges::BACKGROUND, SubsamplingChanges::BACKGROUND),
            (TileChanges::SAMPLE_SIZE, SubsamplingChanges::SAMPLE_SIZE),
            (TileChanges::IMAGE_LOAD_RECT, SubsamplingChanges::IMAGE_LOAD_RECT),
        ] {
            if tiles.contains(from) {
                self.changes |= to;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use loupe_source::{BytesImageSourceFactory, RegionDecoder};
    use loupe_tiles::QueuedExecutor;

    /// Fails every open after reading a header.
    #[derive(Debug)]
    struct RejectingFactory {
        skipped: bool,
    }

    impl RegionDecoderFactory for RejectingFactory {
        fn supports(&self, _mime_type: &str) -> bool {
            true
        }

        fn open(
            &self,
            _source: Arc<dyn ImageSourceFactory>,
        ) -> Result<Box<dyn RegionDecoder>, CreateTileDecoderError> {
            let info = Some(ImageInfo::new(4000, 3000, "image/jpeg"));
            if self.skipped {
                Err(CreateTileDecoderError::skipped("not worth it", info))
            } else {
                Err(CreateTileDecoderError::failed("corrupt", info))
            }
        }
    }

    fn engine(skipped: bool) -> (SubsamplingEngine, Arc<QueuedExecutor>) {
        let executor = Arc::new(QueuedExecutor::new());
        let engine = SubsamplingEngine::new(
            ZoomConfig::default(),
            Arc::new(RejectingFactory { skipped }),
            executor.clone(),
            SubsamplingConfig::default(),
        );
        (engine, executor)
    }

    fn source(key: &str) -> Option<Arc<dyn ImageSourceFactory>> {
        Some(Arc::new(BytesImageSourceFactory::new(key, vec![0_u8; 16])))
    }

    const FRAME: Duration = Duration::from_millis(16);

    #[test]
    fn new_engine_is_idle() {
        let (mut engine, executor) = engine(false);
        assert!(!engine.ready(), "no image");
        assert!(!engine.advance(FRAME), "nothing to do");
        assert_eq!(executor.pending(), 0, "no jobs");
        assert!(engine.take_changes().is_empty(), "no changes");
    }

    #[test]
    fn same_source_key_is_ignored() {
        let (mut engine, _executor) = engine(false);
        assert!(engine.set_image_source(source("a")), "first source");
        assert!(!engine.set_image_source(source("a")), "same key");
        assert!(engine.set_image_source(source("b")), "new key");
        assert_eq!(engine.image_key(), Some("b"), "key tracked");
        assert!(engine.set_image_source(None), "cleared");
        assert_eq!(engine.image_key(), None, "no key");
    }

    #[test]
    fn decoder_opens_once_content_size_is_known() {
        let (mut engine, executor) = engine(false);
        engine.set_image_source(source("a"));
        assert_eq!(executor.pending(), 0, "content size unknown");

        engine.zoom_mut().set_content_size(IntSize::new(400, 300));
        assert!(engine.advance(FRAME), "open in flight");
        assert_eq!(executor.pending(), 1, "open dispatched");
    }

    #[test]
    fn failed_open_keeps_header_info() {
        for skipped in [true, false] {
            let (mut engine, executor) = engine(skipped);
            engine.zoom_mut().set_content_size(IntSize::new(400, 300));
            engine.set_image_source(source("a"));
            executor.run_pending();
            assert!(!engine.advance(FRAME), "open settled (skipped: {skipped})");
            assert!(!engine.ready(), "not ready (skipped: {skipped})");
            assert_eq!(
                engine.image_info().map(ImageInfo::size),
                Some(IntSize::new(4000, 3000)),
                "header info kept (skipped: {skipped})"
            );
            assert!(
                engine.take_changes().contains(SubsamplingChanges::IMAGE_INFO),
                "image info reported (skipped: {skipped})"
            );
            assert_eq!(engine.zoom().content_origin_size(), IntSize::ZERO, "origin stays unknown");
        }
    }

    #[test]
    fn open_for_a_replaced_source_is_discarded() {
        let (mut engine, executor) = engine(false);
        engine.zoom_mut().set_content_size(IntSize::new(400, 300));
        engine.set_image_source(source("a"));
        engine.set_image_source(source("b"));
        assert_eq!(executor.pending(), 2, "both opens queued");
        executor.run_pending();
        engine.advance(FRAME);
        assert!(engine.image_info().is_some(), "current open applied");
        engine.set_image_source(source("c"));
        executor.run_pending();
        // The open for "c" completes only after the source is cleared.
        engine.set_image_source(None);
        assert!(!engine.advance(FRAME), "nothing pending");
        assert!(engine.image_info().is_none(), "stale result ignored");
    }

    #[test]
    fn preferred_tile_size_waits_for_the_container_to_settle() {
        let (mut engine, _executor) = engine(false);
        engine.zoom_mut().set_container_size(IntSize::new(1000, 500));
        assert!(engine.advance(FRAME), "settling");
        for _ in 0..3 {
            engine.advance(FRAME);
        }
        assert_eq!(engine.preferred_tile_size(), IntSize::ZERO, "still settling at 48 ms");

        // A resize restarts the wait.
        engine.zoom_mut().set_container_size(IntSize::new(1200, 600));
        for _ in 0..5 {
            engine.advance(FRAME);
        }
        assert_eq!(engine.preferred_tile_size(), IntSize::ZERO, "restarted at 64 ms");
        assert!(!engine.advance(FRAME), "settled at 80 ms");
        assert_eq!(
            engine.preferred_tile_size(),
            calculate_preferred_tile_size(IntSize::new(1200, 600)),
            "computed for the final container"
        );
    }

    #[test]
    fn small_resizes_keep_the_tile_size() {
        let (mut engine, _executor) = engine(false);
        engine.zoom_mut().set_container_size(IntSize::new(1000, 500));
        for _ in 0..6 {
            engine.advance(FRAME);
        }
        let first = engine.preferred_tile_size();
        assert!(!first.is_empty(), "tile size set");
        engine.zoom_mut().set_container_size(IntSize::new(1100, 550));
        for _ in 0..6 {
            engine.advance(FRAME);
        }
        assert_eq!(engine.preferred_tile_size(), first, "change too small to rebuild");
    }
}
