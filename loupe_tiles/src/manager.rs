// Copyright 2025 the Loupe Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The tile state machine.
//!
//! [`TileManager`] owns the grids of one image and decides, on every
//! refresh, which tiles should be on screen:
//!
//! - The **foreground** is the set of tiles of the active sample size that
//!   intersect the visible region grown by a load margin.
//! - The **background** is the set of loaded tiles from previously active
//!   sample sizes that still cover part of the view. They are drawn beneath
//!   the foreground while it loads and are dropped once the foreground tiles
//!   over them are loaded and faded in.
//!
//! Decodes run on a [`TileExecutor`]. Results come back over a channel and
//! are applied by [`TileManager::apply_decode_results`] on the thread that
//! owns the manager, so tile state is only ever written from one place.
//! Each dispatch captures the manager generation and the tile's load serial.
//! A result that no longer matches either is discarded.

use core::time::Duration;
use std::sync::Arc;
use std::sync::mpsc::{self, Receiver, Sender};

use loupe_geometry::{ContinuousTransformType, IntRect, IntSize};
use loupe_source::{ImageInfo, TileBitmap};
use smallvec::SmallVec;

use crate::grid::{
    build_tile_grids, calculate_image_load_rect, calculate_sample_size, default_load_margin,
};
use crate::{
    Tile, TileAnimationSpec, TileBitmapCache, TileChanges, TileDecoder, TileDecoderError,
    TileExecutor, TileGrids, TileKey, TileSnapshot, TileState,
};

/// Tile behavior settings.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TileConfig {
    /// Continuous transform kinds during which refreshes are skipped.
    pub paused_continuous_transform_types: ContinuousTransformType,
    /// Drop previous sample size tiles as soon as the sample size changes.
    pub disabled_background_tiles: bool,
    /// Fade-in for decoded tiles.
    pub tile_animation: TileAnimationSpec,
    /// Bypass the tile bitmap cache.
    pub disabled_tile_bitmap_cache: bool,
    /// Extra image pixels loaded around the visible region. `None` uses
    /// half the preferred tile size.
    pub load_margin: Option<IntSize>,
}

impl Default for TileConfig {
    fn default() -> Self {
        Self {
            paused_continuous_transform_types: ContinuousTransformType::all(),
            disabled_background_tiles: false,
            tile_animation: TileAnimationSpec::DEFAULT,
            disabled_tile_bitmap_cache: false,
            load_margin: None,
        }
    }
}

/// What a call to [`TileManager::refresh_tiles`] did.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RefreshResult {
    /// No grids; sizes are missing or empty.
    Inert,
    /// The manager is stopped.
    Stopped,
    /// A paused continuous transform is in progress.
    Paused,
    /// Tiles were updated.
    Refreshed {
        /// Decodes handed to the executor.
        dispatched: usize,
        /// Tiles served from the bitmap cache.
        cache_hits: usize,
        /// Tiles released.
        freed: usize,
    },
}

#[derive(Debug)]
enum DecodeOutcome {
    Decoded(TileBitmap),
    Failed,
    Closed,
}

#[derive(Debug)]
struct DecodeResult {
    generation: u64,
    sample_size: u32,
    index: usize,
    serial: u64,
    outcome: DecodeOutcome,
}

fn effective_cache<'a>(
    cache: &'a Option<Arc<dyn TileBitmapCache>>,
    config: &TileConfig,
) -> Option<&'a dyn TileBitmapCache> {
    if config.disabled_tile_bitmap_cache {
        None
    } else {
        cache.as_deref()
    }
}

fn tile_key(image_key: &str, tile: &Tile) -> TileKey {
    TileKey::new(image_key, tile.src_rect(), tile.sample_size())
}

/// Releases the cache reference of `tile` and returns it to `NotLoaded`.
fn free_tile(tile: &mut Tile, image_key: &str, cache: Option<&dyn TileBitmapCache>) -> bool {
    if tile.state == TileState::NotLoaded {
        return false;
    }
    if tile.cached {
        match cache {
            Some(cache) => cache.release(&tile_key(image_key, tile)),
            None => tracing::warn!(key = image_key, %tile, "cached tile freed without a cache"),
        }
    }
    tile.reset();
    true
}

/// Everything a dispatch needs, borrowed from disjoint manager fields.
struct Loader<'a> {
    image_key: &'a str,
    decoder: &'a Arc<TileDecoder>,
    cache: Option<&'a dyn TileBitmapCache>,
    executor: &'a dyn TileExecutor,
    sender: &'a Sender<DecodeResult>,
    generation: u64,
}

enum LoadKind {
    CacheHit,
    Dispatched,
}

impl Loader<'_> {
    fn load(&self, tile: &mut Tile, index: usize) -> LoadKind {
        if let Some(cache) = self.cache {
            if let Some(bitmap) = cache.acquire(&tile_key(self.image_key, tile)) {
                tile.bitmap = Some(bitmap);
                tile.state = TileState::Loaded;
                tile.cached = true;
                tile.animation.finish();
                tracing::trace!(key = self.image_key, %tile, "tile served from cache");
                return LoadKind::CacheHit;
            }
        }
        tile.state = TileState::Loading;
        tile.load_serial = tile.load_serial.wrapping_add(1);

        let decoder = Arc::clone(self.decoder);
        let sender = self.sender.clone();
        let generation = self.generation;
        let serial = tile.load_serial;
        let sample_size = tile.sample_size();
        let src_rect = tile.src_rect();
        let key = tile_key(self.image_key, tile).to_string();
        self.executor.execute(Box::new(move || {
            let outcome = match decoder.decode(&key, src_rect, sample_size) {
                Ok(Some(bitmap)) => DecodeOutcome::Decoded(bitmap),
                Ok(None) => DecodeOutcome::Failed,
                Err(TileDecoderError::Closed) => DecodeOutcome::Closed,
                Err(err) => {
                    tracing::warn!(key = %key, error = %err, "tile decode could not start");
                    DecodeOutcome::Failed
                }
            };
            // The manager may be gone; then nobody wants the result.
            let _ = sender.send(DecodeResult {
                generation,
                sample_size,
                index,
                serial,
                outcome,
            });
        }));
        tracing::trace!(key = self.image_key, %tile, "tile decode dispatched");
        LoadKind::Dispatched
    }
}

/// Tracks tile grids, foreground and background tiles, and decodes for one
/// image.
///
/// A manager is created once the image header, the content size and the
/// preferred tile size are known. With any of them empty it builds no grids
/// and stays inert.
#[derive(Debug)]
pub struct TileManager {
    image_key: String,
    decoder: Arc<TileDecoder>,
    image_info: ImageInfo,
    content_size: IntSize,
    preferred_tile_size: IntSize,
    cache: Option<Arc<dyn TileBitmapCache>>,
    executor: Arc<dyn TileExecutor>,
    config: TileConfig,
    grids: TileGrids,
    /// Active sample size; `0` before the first refresh.
    sample_size: u32,
    foreground: Vec<usize>,
    background: Vec<(u32, usize)>,
    load_rect: IntRect,
    image_load_rect: IntRect,
    stopped: bool,
    generation: u64,
    changes: TileChanges,
    sender: Sender<DecodeResult>,
    results: Receiver<DecodeResult>,
}

impl TileManager {
    /// Creates a manager and builds the grids for `preferred_tile_size`.
    pub fn new(
        decoder: Arc<TileDecoder>,
        content_size: IntSize,
        preferred_tile_size: IntSize,
        cache: Option<Arc<dyn TileBitmapCache>>,
        executor: Arc<dyn TileExecutor>,
        config: TileConfig,
    ) -> Self {
        let image_key = decoder.key().to_owned();
        let image_info = decoder.image_info().clone();
        let grids = if content_size.is_empty() {
            TileGrids::default()
        } else {
            build_tile_grids(image_info.size(), preferred_tile_size)
        };
        tracing::debug!(
            key = %image_key,
            image = %image_info,
            content = %content_size,
            tile = %preferred_tile_size,
            grids = %grids.intro_string(),
            "tile manager created"
        );
        let (sender, results) = mpsc::channel();
        Self {
            image_key,
            decoder,
            image_info,
            content_size,
            preferred_tile_size,
            cache,
            executor,
            config,
            grids,
            sample_size: 0,
            foreground: Vec::new(),
            background: Vec::new(),
            load_rect: IntRect::ZERO,
            image_load_rect: IntRect::ZERO,
            stopped: false,
            generation: 0,
            changes: TileChanges::empty(),
            sender,
            results,
        }
    }

    /// Key of the image source.
    #[must_use]
    pub fn image_key(&self) -> &str {
        &self.image_key
    }

    /// Header information of the image.
    #[must_use]
    pub fn image_info(&self) -> &ImageInfo {
        &self.image_info
    }

    /// Size of the displayed content the tiles are laid over.
    #[must_use]
    pub fn content_size(&self) -> IntSize {
        self.content_size
    }

    /// Maximum tile size the grids were built for.
    #[must_use]
    pub fn preferred_tile_size(&self) -> IntSize {
        self.preferred_tile_size
    }

    /// The decoder pool.
    #[must_use]
    pub fn decoder(&self) -> &Arc<TileDecoder> {
        &self.decoder
    }

    /// All grids, finest first.
    #[must_use]
    pub fn grids(&self) -> &TileGrids {
        &self.grids
    }

    /// `(sample_size, columns x rows)` per grid.
    #[must_use]
    pub fn tile_grid_size_map(&self) -> SmallVec<[(u32, IntSize); 8]> {
        self.grids.grid_size_map()
    }

    /// Returns `true` if no grids could be built.
    #[must_use]
    pub fn is_inert(&self) -> bool {
        self.grids.is_empty()
    }

    /// Active sample size, or `0` before the first refresh.
    #[must_use]
    pub fn sample_size(&self) -> u32 {
        self.sample_size
    }

    /// Union of the foreground tile rects in image pixels.
    #[must_use]
    pub fn image_load_rect(&self) -> IntRect {
        self.image_load_rect
    }

    /// Incremented by every [`clean`](Self::clean); decodes from older
    /// generations are discarded.
    #[must_use]
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Current settings.
    #[must_use]
    pub fn config(&self) -> &TileConfig {
        &self.config
    }

    /// Returns `true` while stopped.
    #[must_use]
    pub fn is_stopped(&self) -> bool {
        self.stopped
    }

    /// Snapshots of the foreground tiles.
    #[must_use]
    pub fn foreground_tiles(&self) -> Vec<TileSnapshot> {
        let Some(grid) = self.grids.grid(self.sample_size) else {
            return Vec::new();
        };
        self.foreground
            .iter()
            .filter_map(|&i| grid.tiles().get(i))
            .map(Tile::snapshot)
            .collect()
    }

    /// Snapshots of the background tiles.
    #[must_use]
    pub fn background_tiles(&self) -> Vec<TileSnapshot> {
        self.background
            .iter()
            .filter_map(|&(s, i)| self.grids.grid(s)?.tiles().get(i))
            .map(Tile::snapshot)
            .collect()
    }

    /// Returns and clears the set of projections that changed.
    pub fn take_changes(&mut self) -> TileChanges {
        core::mem::take(&mut self.changes)
    }

    /// Updates the visible tiles for a new viewport.
    ///
    /// `scale` is the display scale of the content, `content_visible_rect`
    /// the visible part of the content in unrotated content pixels.
    /// `continuous` describes transform changes still in progress; if it
    /// intersects the configured pause set nothing happens.
    pub fn refresh_tiles(
        &mut self,
        scale: f64,
        content_visible_rect: IntRect,
        rotation: u32,
        continuous: ContinuousTransformType,
        caller: &str,
    ) -> RefreshResult {
        if self.grids.is_empty() {
            return RefreshResult::Inert;
        }
        if self.stopped {
            tracing::debug!(key = %self.image_key, caller, "refresh skipped: stopped");
            return RefreshResult::Stopped;
        }
        if continuous.intersects(self.config.paused_continuous_transform_types) {
            tracing::trace!(key = %self.image_key, caller, ?continuous, "refresh paused");
            return RefreshResult::Paused;
        }

        let max_sample_size = self.grids.max_sample_size().unwrap_or(1);
        let target = calculate_sample_size(self.image_info.size(), self.content_size, scale)
            .min(max_sample_size);
        let margin = self
            .config
            .load_margin
            .unwrap_or_else(|| default_load_margin(self.preferred_tile_size, rotation));
        self.load_rect = calculate_image_load_rect(
            self.image_info.size(),
            self.content_size,
            margin,
            content_visible_rect,
        );

        let cache = effective_cache(&self.cache, &self.config);
        let mut freed = 0;

        if target != self.sample_size {
            let previous = self.sample_size;
            let mut candidates = core::mem::take(&mut self.background);
            candidates.extend(self.foreground.drain(..).map(|i| (previous, i)));
            for (s, index) in candidates {
                if s == target {
                    continue;
                }
                let Some(tile) = self.grids.grid_mut(s).and_then(|g| g.tiles.get_mut(index)) else {
                    continue;
                };
                let keep = !self.config.disabled_background_tiles
                    && tile.is_loaded()
                    && tile.src_rect().intersects(self.load_rect);
                if keep {
                    // Background tiles are never advanced; they must be opaque.
                    tile.animation.finish();
                    self.background.push((s, index));
                } else if free_tile(tile, &self.image_key, cache) {
                    freed += 1;
                }
            }
            tracing::debug!(
                key = %self.image_key,
                caller,
                from = previous,
                to = target,
                background = self.background.len(),
                "sample size changed"
            );
            self.sample_size = target;
            self.changes |= TileChanges::SAMPLE_SIZE | TileChanges::BACKGROUND | TileChanges::FOREGROUND;
        }

        let loader = Loader {
            image_key: &self.image_key,
            decoder: &self.decoder,
            cache,
            executor: self.executor.as_ref(),
            sender: &self.sender,
            generation: self.generation,
        };
        let mut dispatched = 0;
        let mut cache_hits = 0;
        let mut foreground = Vec::new();
        let mut image_load_rect = IntRect::ZERO;
        if let Some(grid) = self.grids.grid_mut(target) {
            for (index, tile) in grid.tiles.iter_mut().enumerate() {
                if tile.src_rect().intersects(self.load_rect) {
                    foreground.push(index);
                    image_load_rect = image_load_rect.union(tile.src_rect());
                    if tile.state == TileState::NotLoaded {
                        match loader.load(tile, index) {
                            LoadKind::CacheHit => cache_hits += 1,
                            LoadKind::Dispatched => dispatched += 1,
                        }
                    }
                } else if free_tile(tile, loader.image_key, cache) {
                    freed += 1;
                }
            }
        }

        if foreground != self.foreground || dispatched + cache_hits + freed > 0 {
            self.changes |= TileChanges::FOREGROUND;
        }
        if image_load_rect != self.image_load_rect {
            self.changes |= TileChanges::IMAGE_LOAD_RECT;
        }
        self.foreground = foreground;
        self.image_load_rect = image_load_rect;
        freed += self.prune_background();

        if dispatched + cache_hits + freed > 0 {
            tracing::debug!(
                key = %self.image_key,
                caller,
                sample_size = target,
                load_rect = %self.load_rect,
                foreground = self.foreground.len(),
                background = self.background.len(),
                dispatched,
                cache_hits,
                freed,
                "tiles refreshed"
            );
        }
        RefreshResult::Refreshed {
            dispatched,
            cache_hits,
            freed,
        }
    }

    /// Applies decode results that have arrived and returns how many were
    /// applied. Stale results are discarded silently.
    pub fn apply_decode_results(&mut self) -> usize {
        let mut applied = 0;
        while let Ok(result) = self.results.try_recv() {
            if self.apply_result(result) {
                applied += 1;
            }
        }
        if applied > 0 {
            self.prune_background();
        }
        applied
    }

    fn apply_result(&mut self, result: DecodeResult) -> bool {
        if result.generation != self.generation {
            tracing::trace!(key = %self.image_key, "discarded decode from an old generation");
            return false;
        }
        let cache = effective_cache(&self.cache, &self.config);
        let animation = self.config.tile_animation;
        let Some(tile) = self
            .grids
            .grid_mut(result.sample_size)
            .and_then(|g| g.tiles.get_mut(result.index))
        else {
            return false;
        };
        if tile.state != TileState::Loading || tile.load_serial != result.serial {
            tracing::trace!(key = %self.image_key, %tile, "discarded decode for a freed tile");
            return false;
        }
        match result.outcome {
            DecodeOutcome::Decoded(bitmap) => {
                let bitmap = match cache {
                    Some(cache) => {
                        tile.cached = true;
                        cache.insert(tile_key(&self.image_key, tile), bitmap)
                    }
                    None => bitmap,
                };
                tile.bitmap = Some(bitmap);
                tile.state = TileState::Loaded;
                if animation.is_enabled() {
                    tile.animation.start();
                } else {
                    tile.animation.finish();
                }
            }
            DecodeOutcome::Failed => {
                tile.state = TileState::Error;
                tracing::debug!(key = %self.image_key, %tile, "tile failed to load");
            }
            DecodeOutcome::Closed => tile.reset(),
        }
        if result.sample_size == self.sample_size {
            self.changes |= TileChanges::FOREGROUND;
        } else {
            self.changes |= TileChanges::BACKGROUND;
        }
        true
    }

    /// Advances tile fade-ins by `dt`. Returns `true` if any alpha changed.
    pub fn advance_animations(&mut self, dt: Duration) -> bool {
        let spec = self.config.tile_animation;
        let mut changed = false;
        if let Some(grid) = self.grids.grid_mut(self.sample_size) {
            for &index in &self.foreground {
                if let Some(tile) = grid.tiles.get_mut(index) {
                    changed |= tile.animation.advance(dt, &spec);
                }
            }
        }
        if changed {
            self.changes |= TileChanges::FOREGROUND;
            self.prune_background();
        }
        changed
    }

    /// Returns `true` while any foreground tile is fading in.
    #[must_use]
    pub fn is_animating(&self) -> bool {
        let Some(grid) = self.grids.grid(self.sample_size) else {
            return false;
        };
        self.foreground
            .iter()
            .filter_map(|&i| grid.tiles().get(i))
            .any(|t| t.animation().is_running())
    }

    /// Drops background tiles that are out of view or fully covered by
    /// settled foreground tiles. Returns how many were freed.
    fn prune_background(&mut self) -> usize {
        if self.background.is_empty() {
            return 0;
        }
        let foreground_grid = self.grids.grid(self.sample_size);
        let settled = |rect: IntRect| {
            let Some(grid) = foreground_grid else {
                return false;
            };
            self.foreground
                .iter()
                .filter_map(|&i| grid.tiles().get(i))
                .filter(|t| t.src_rect().intersects(rect))
                .all(|t| t.is_loaded() && !t.animation().is_running())
        };
        let mut dropped: SmallVec<[(u32, usize); 16]> = SmallVec::new();
        for &(s, index) in &self.background {
            let Some(tile) = self.grids.grid(s).and_then(|g| g.tiles().get(index)) else {
                dropped.push((s, index));
                continue;
            };
            let rect = tile.src_rect();
            if self.config.disabled_background_tiles
                || !rect.intersects(self.load_rect)
                || settled(rect)
            {
                dropped.push((s, index));
            }
        }
        if dropped.is_empty() {
            return 0;
        }
        let cache = effective_cache(&self.cache, &self.config);
        let mut freed = 0;
        for &(s, index) in &dropped {
            if let Some(tile) = self.grids.grid_mut(s).and_then(|g| g.tiles.get_mut(index)) {
                if free_tile(tile, &self.image_key, cache) {
                    freed += 1;
                }
            }
        }
        self.background.retain(|entry| !dropped.contains(entry));
        self.changes |= TileChanges::BACKGROUND;
        tracing::trace!(key = %self.image_key, freed, remaining = self.background.len(), "background pruned");
        freed
    }

    /// Releases every tile and forgets the active sample size.
    ///
    /// Decodes in flight are discarded when they complete.
    pub fn clean(&mut self, caller: &str) {
        let cache = effective_cache(&self.cache, &self.config);
        let mut freed = 0;
        for grid in self.grids.iter_mut() {
            for tile in &mut grid.tiles {
                if free_tile(tile, &self.image_key, cache) {
                    freed += 1;
                }
            }
        }
        self.generation = self.generation.wrapping_add(1);
        let had_state = self.sample_size != 0 || freed > 0;
        self.sample_size = 0;
        self.foreground.clear();
        self.background.clear();
        self.load_rect = IntRect::ZERO;
        self.image_load_rect = IntRect::ZERO;
        if had_state {
            self.changes |= TileChanges::all();
        }
        tracing::debug!(key = %self.image_key, caller, freed, "tiles cleaned");
    }

    /// Stops or resumes the manager.
    ///
    /// Stopping cleans every tile. After resuming, the caller refreshes.
    pub fn set_stopped(&mut self, stopped: bool) {
        if self.stopped == stopped {
            return;
        }
        self.stopped = stopped;
        if stopped {
            self.clean("stopped");
        }
    }

    /// Sets which continuous transforms pause refreshing.
    pub fn set_paused_continuous_transform_types(&mut self, types: ContinuousTransformType) {
        self.config.paused_continuous_transform_types = types;
    }

    /// Enables or disables background tiles; disabling drops them now.
    pub fn set_disabled_background_tiles(&mut self, disabled: bool) {
        if self.config.disabled_background_tiles == disabled {
            return;
        }
        self.config.disabled_background_tiles = disabled;
        if disabled {
            self.prune_background();
        }
    }

    /// Sets the fade-in used for tiles decoded from now on.
    pub fn set_tile_animation(&mut self, spec: TileAnimationSpec) {
        self.config.tile_animation = spec;
    }

    /// Sets the load margin; takes effect on the next refresh.
    pub fn set_load_margin(&mut self, margin: Option<IntSize>) {
        self.config.load_margin = margin;
    }

    /// Replaces the bitmap cache. Tiles are cleaned so references return to
    /// the cache that handed them out.
    pub fn set_tile_bitmap_cache(&mut self, cache: Option<Arc<dyn TileBitmapCache>>) {
        self.clean("set_tile_bitmap_cache");
        self.cache = cache;
    }

    /// Bypasses or uses the bitmap cache. Tiles are cleaned on change.
    pub fn set_disabled_tile_bitmap_cache(&mut self, disabled: bool) {
        if self.config.disabled_tile_bitmap_cache == disabled {
            return;
        }
        self.clean("set_disabled_tile_bitmap_cache");
        self.config.disabled_tile_bitmap_cache = disabled;
    }
}

impl Drop for TileManager {
    fn drop(&mut self) {
        self.clean("drop");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{InlineExecutor, LruTileBitmapCache, QueuedExecutor};
    use loupe_source::{DecodeError, RegionDecoder};
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Debug)]
    struct CountingDecoder {
        info: ImageInfo,
        decodes: Arc<AtomicUsize>,
        fail_x0: Option<u32>,
    }

    impl RegionDecoder for CountingDecoder {
        fn image_info(&self) -> &ImageInfo {
            &self.info
        }

        fn decode_region(
            &self,
            _key: &str,
            rect: IntRect,
            sample_size: u32,
        ) -> Result<TileBitmap, DecodeError> {
            self.decodes.fetch_add(1, Ordering::SeqCst);
            if self.fail_x0 == Some(rect.x0) {
                return Err(DecodeError::Malformed("bad block".into()));
            }
            let w = rect.width().div_ceil(sample_size);
            let h = rect.height().div_ceil(sample_size);
            Ok(TileBitmap::rgba8(w, h, vec![0; 4]))
        }

        fn try_clone(&self) -> Result<Box<dyn RegionDecoder>, DecodeError> {
            Ok(Box::new(Self {
                info: self.info.clone(),
                decodes: Arc::clone(&self.decodes),
                fail_x0: self.fail_x0,
            }))
        }
    }

    struct Fixture {
        decodes: Arc<AtomicUsize>,
        cache: Arc<LruTileBitmapCache>,
        queue: Arc<QueuedExecutor>,
        manager: TileManager,
    }

    const IMAGE: IntSize = IntSize::new(12000, 8000);
    const CONTENT: IntSize = IntSize::new(1200, 800);
    const TILE: IntSize = IntSize::new(1080, 1920);
    const ALL: IntRect = IntRect::new(0, 0, 1200, 800);

    fn fixture(config: TileConfig, fail_x0: Option<u32>) -> Fixture {
        let decodes = Arc::new(AtomicUsize::new(0));
        let root = Box::new(CountingDecoder {
            info: ImageInfo::new(IMAGE.width, IMAGE.height, "image/jpeg"),
            decodes: Arc::clone(&decodes),
            fail_x0,
        });
        let decoder = Arc::new(TileDecoder::new("img", root));
        let cache = Arc::new(LruTileBitmapCache::default());
        let queue = Arc::new(QueuedExecutor::new());
        let manager = TileManager::new(
            decoder,
            CONTENT,
            TILE,
            Some(cache.clone() as Arc<dyn TileBitmapCache>),
            queue.clone() as Arc<dyn TileExecutor>,
            config,
        );
        Fixture {
            decodes,
            cache,
            queue,
            manager,
        }
    }

    fn no_fade() -> TileConfig {
        TileConfig {
            tile_animation: TileAnimationSpec::NONE,
            ..TileConfig::default()
        }
    }

    fn refresh(m: &mut TileManager, scale: f64, visible: IntRect) -> RefreshResult {
        m.refresh_tiles(scale, visible, 0, ContinuousTransformType::empty(), "test")
    }

    fn settle(f: &mut Fixture) -> usize {
        f.queue.run_pending();
        f.manager.apply_decode_results()
    }

    #[test]
    fn fitted_view_loads_coarse_tiles() {
        let mut f = fixture(no_fade(), None);
        let result = refresh(&mut f.manager, 0.9, ALL);
        assert_eq!(f.manager.sample_size(), 8, "fitted view picks sample size 8");
        assert_eq!(
            result,
            RefreshResult::Refreshed {
                dispatched: 2,
                cache_hits: 0,
                freed: 0
            },
            "both tiles of the 2x1 grid"
        );
        let changes = f.manager.take_changes();
        assert!(changes.contains(TileChanges::SAMPLE_SIZE), "sample size published");
        assert_eq!(f.manager.image_load_rect(), IntRect::new(0, 0, 12000, 8000), "whole image");
        assert!(f.manager.foreground_tiles().iter().all(|t| t.state == TileState::Loading), "loading");

        assert_eq!(settle(&mut f), 2, "two results applied");
        let tiles = f.manager.foreground_tiles();
        assert!(tiles.iter().all(TileSnapshot::is_loaded), "loaded");
        assert!(tiles.iter().all(|t| t.alpha == 255), "no fade configured");
        assert_eq!(f.cache.stats().referenced, 2, "each tile holds a reference");
    }

    #[test]
    fn identical_refresh_dispatches_nothing() {
        let mut f = fixture(no_fade(), None);
        refresh(&mut f.manager, 0.9, ALL);
        let again = refresh(&mut f.manager, 0.9, ALL);
        assert_eq!(
            again,
            RefreshResult::Refreshed {
                dispatched: 0,
                cache_hits: 0,
                freed: 0
            },
            "diff is stable while loading"
        );
        settle(&mut f);
        f.manager.take_changes();
        refresh(&mut f.manager, 0.9, ALL);
        assert!(f.manager.take_changes().is_empty(), "nothing changed");
        assert_eq!(f.queue.pending(), 0, "no new jobs");
    }

    #[test]
    fn freed_tiles_come_back_from_cache() {
        let mut f = fixture(no_fade(), None);
        refresh(&mut f.manager, 0.9, ALL);
        settle(&mut f);
        let before = f.manager.foreground_tiles();
        assert_eq!(f.decodes.load(Ordering::SeqCst), 2, "two decodes");

        // Scroll the right tile out of view, then back.
        let left = IntRect::new(0, 0, 100, 800);
        let result = refresh(&mut f.manager, 0.9, left);
        assert!(
            matches!(result, RefreshResult::Refreshed { freed: 1, .. }),
            "right tile freed: {result:?}"
        );
        let result = refresh(&mut f.manager, 0.9, ALL);
        assert!(
            matches!(result, RefreshResult::Refreshed { dispatched: 0, cache_hits: 1, .. }),
            "served from cache: {result:?}"
        );
        let after = f.manager.foreground_tiles();
        let same = before.iter().zip(&after).all(|(a, b)| match (&a.bitmap, &b.bitmap) {
            (Some(a), Some(b)) => a.ptr_eq(b),
            _ => false,
        });
        assert!(same, "identical bitmaps");
        assert_eq!(f.decodes.load(Ordering::SeqCst), 2, "no second decode");
    }

    #[test]
    fn zooming_in_keeps_background_until_covered() {
        let mut f = fixture(no_fade(), None);
        refresh(&mut f.manager, 0.9, ALL);
        settle(&mut f);

        // Zoom far in on the top left corner.
        let corner = IntRect::new(0, 0, 60, 40);
        refresh(&mut f.manager, 20.0, corner);
        assert_eq!(f.manager.sample_size(), 1, "full resolution");
        let background = f.manager.background_tiles();
        assert_eq!(background.len(), 1, "the left coarse tile stays visible");
        assert_eq!(background[0].sample_size, 8, "from the previous sample size");
        assert_eq!(f.cache.stats().referenced, 1, "right coarse tile released");

        settle(&mut f);
        assert!(f.manager.background_tiles().is_empty(), "dropped once covered");
    }

    #[test]
    fn fade_holds_background_until_finished() {
        let mut f = fixture(TileConfig::default(), None);
        refresh(&mut f.manager, 0.9, ALL);
        settle(&mut f);
        f.manager.advance_animations(Duration::from_millis(250));
        refresh(&mut f.manager, 20.0, IntRect::new(0, 0, 60, 40));
        settle(&mut f);
        assert!(f.manager.is_animating(), "new tiles fade in");
        assert_eq!(f.manager.background_tiles().len(), 1, "background held during fade");
        assert!(f.manager.foreground_tiles().iter().all(|t| t.alpha == 0), "transparent at start");

        f.manager.advance_animations(Duration::from_millis(100));
        assert_eq!(f.manager.background_tiles().len(), 1, "still fading");
        f.manager.advance_animations(Duration::from_millis(150));
        assert!(!f.manager.is_animating(), "fade complete");
        assert!(f.manager.background_tiles().is_empty(), "background released");
    }

    #[test]
    fn zoom_during_fade_keeps_an_opaque_background() {
        let mut f = fixture(TileConfig::default(), None);
        refresh(&mut f.manager, 0.9, ALL);
        settle(&mut f);
        f.manager.advance_animations(Duration::from_millis(40));
        assert!(f.manager.is_animating(), "coarse tiles still fading");

        refresh(&mut f.manager, 20.0, IntRect::new(0, 0, 60, 40));
        let background = f.manager.background_tiles();
        assert_eq!(background.len(), 1, "coarse tile kept beneath");
        assert_eq!(background[0].alpha, 255, "demoted tile drawn opaque");
        assert!(!f.manager.is_animating(), "no foreground tile decoded yet");

        for _ in 0..100 {
            f.manager.advance_animations(Duration::from_millis(16));
        }
        assert!(
            f.manager.background_tiles().iter().all(|t| t.alpha == 255),
            "background stays opaque until covered"
        );
    }

    #[test]
    fn disabled_background_drops_immediately() {
        let config = TileConfig {
            disabled_background_tiles: true,
            ..no_fade()
        };
        let mut f = fixture(config, None);
        refresh(&mut f.manager, 0.9, ALL);
        settle(&mut f);
        refresh(&mut f.manager, 20.0, IntRect::new(0, 0, 60, 40));
        assert!(f.manager.background_tiles().is_empty(), "no background kept");
        assert_eq!(f.cache.stats().referenced, 0, "all coarse references released");
    }

    #[test]
    fn drag_pauses_until_released() {
        let mut f = fixture(no_fade(), None);
        refresh(&mut f.manager, 0.9, ALL);
        settle(&mut f);
        for step in 0..10 {
            let x = 10 * step;
            let result = f.manager.refresh_tiles(
                20.0,
                IntRect::new(x, 0, x + 60, 40),
                0,
                ContinuousTransformType::DRAG,
                "drag",
            );
            assert_eq!(result, RefreshResult::Paused, "paused while dragging");
        }
        assert_eq!(f.queue.pending(), 0, "no decodes during the drag");
        assert_eq!(f.manager.sample_size(), 8, "sample size untouched");

        let result = refresh(&mut f.manager, 20.0, IntRect::new(90, 0, 150, 40));
        assert!(
            matches!(result, RefreshResult::Refreshed { dispatched, .. } if dispatched > 0),
            "settled refresh loads: {result:?}"
        );
        let pending = f.queue.pending();
        assert_eq!(
            refresh(&mut f.manager, 20.0, IntRect::new(90, 0, 150, 40)),
            RefreshResult::Refreshed {
                dispatched: 0,
                cache_hits: 0,
                freed: 0
            },
            "one refresh is enough"
        );
        assert_eq!(f.queue.pending(), pending, "no extra jobs");
    }

    #[test]
    fn clean_discards_results_in_flight() {
        let mut f = fixture(no_fade(), None);
        refresh(&mut f.manager, 0.9, ALL);
        f.manager.clean("source changed");
        let generation = f.manager.generation();
        refresh(&mut f.manager, 0.9, ALL);
        // The first two jobs carry the old generation.
        assert_eq!(f.queue.run_pending(), 4, "old and new jobs ran");
        assert_eq!(f.manager.apply_decode_results(), 2, "only the new generation applied");
        assert_eq!(f.manager.generation(), generation, "generation unchanged by refresh");
        assert_eq!(f.cache.stats().entries, 2, "stale bitmaps were not cached");
    }

    #[test]
    fn freed_loading_tile_ignores_its_result() {
        let mut f = fixture(no_fade(), None);
        refresh(&mut f.manager, 0.9, ALL);
        refresh(&mut f.manager, 0.9, IntRect::new(0, 0, 100, 800));
        settle(&mut f);
        let tiles = f.manager.foreground_tiles();
        assert_eq!(tiles.len(), 1, "only the left tile");
        assert!(tiles[0].is_loaded(), "left tile loaded");
        assert_eq!(f.cache.stats().entries, 1, "late result for the freed tile dropped");
    }

    #[test]
    fn failed_decode_marks_error_without_retry() {
        let mut f = fixture(no_fade(), Some(6000));
        refresh(&mut f.manager, 0.9, ALL);
        settle(&mut f);
        let states: Vec<TileState> = f.manager.foreground_tiles().iter().map(|t| t.state).collect();
        assert_eq!(states, [TileState::Loaded, TileState::Error], "right tile failed");
        let again = refresh(&mut f.manager, 0.9, ALL);
        assert!(
            matches!(again, RefreshResult::Refreshed { dispatched: 0, .. }),
            "errors are not retried in place"
        );
    }

    #[test]
    fn stopping_cleans_and_blocks_refresh() {
        let mut f = fixture(no_fade(), None);
        refresh(&mut f.manager, 0.9, ALL);
        settle(&mut f);
        f.manager.set_stopped(true);
        assert_eq!(f.cache.stats().referenced, 0, "references returned");
        assert_eq!(f.manager.sample_size(), 0, "no active sample size");
        assert_eq!(refresh(&mut f.manager, 0.9, ALL), RefreshResult::Stopped, "stopped");
        f.manager.set_stopped(false);
        let result = refresh(&mut f.manager, 0.9, ALL);
        assert!(
            matches!(result, RefreshResult::Refreshed { cache_hits: 2, .. }),
            "resumes from cache: {result:?}"
        );
    }

    #[test]
    fn empty_sizes_are_inert() {
        let decoder = Arc::new(TileDecoder::new(
            "img",
            Box::new(CountingDecoder {
                info: ImageInfo::new(100, 100, "image/png"),
                decodes: Arc::new(AtomicUsize::new(0)),
                fail_x0: None,
            }),
        ));
        let mut manager = TileManager::new(
            decoder,
            CONTENT,
            IntSize::ZERO,
            None,
            Arc::new(InlineExecutor),
            TileConfig::default(),
        );
        assert!(manager.is_inert(), "no tile size, no grids");
        assert_eq!(refresh(&mut manager, 1.0, ALL), RefreshResult::Inert, "nothing to do");
    }

    #[test]
    fn works_without_a_cache() {
        let decoder = Arc::new(TileDecoder::new(
            "img",
            Box::new(CountingDecoder {
                info: ImageInfo::new(IMAGE.width, IMAGE.height, "image/jpeg"),
                decodes: Arc::new(AtomicUsize::new(0)),
                fail_x0: None,
            }),
        ));
        let mut manager = TileManager::new(
            decoder,
            CONTENT,
            TILE,
            None,
            Arc::new(InlineExecutor),
            no_fade(),
        );
        refresh(&mut manager, 0.9, ALL);
        assert_eq!(manager.apply_decode_results(), 2, "inline decodes are ready at once");
        assert!(manager.foreground_tiles().iter().all(TileSnapshot::is_loaded), "loaded");
    }
}
