// Copyright 2025 the Loupe Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! A pool of region decoders shared by decode jobs.
//!
//! Decoding libraries are rarely safe to use from several threads through
//! one instance, but opening a second instance over the same source is
//! cheap. [`TileDecoder`] hands each decode call an instance of its own: an
//! idle one from the pool, or a fresh clone of the root instance when every
//! pooled instance is busy. The decode itself runs without holding any lock.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use loupe_geometry::{IntRect, IntSize};
use loupe_source::{
    CreateTileDecoderError, DecodeError, ImageInfo, ImageSourceFactory, RegionDecoder,
    RegionDecoderFactory, TileBitmap, check_subsampling,
};

/// Errors from [`TileDecoder::decode`].
#[derive(Debug, thiserror::Error)]
pub enum TileDecoderError {
    /// The decoder was closed; no further decodes are possible.
    #[error("tile decoder is closed")]
    Closed,
    /// No instance was available and cloning the root failed.
    #[error("could not open another region decoder: {0}")]
    Clone(#[source] DecodeError),
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Pool of [`RegionDecoder`] instances over one image.
#[derive(Debug)]
pub struct TileDecoder {
    key: String,
    image_info: ImageInfo,
    closed: AtomicBool,
    root: Mutex<Option<Arc<dyn RegionDecoder>>>,
    pool: Mutex<Vec<Arc<dyn RegionDecoder>>>,
}

impl TileDecoder {
    /// Creates a pool seeded with `root`.
    pub fn new(key: impl Into<String>, root: Box<dyn RegionDecoder>) -> Self {
        let root: Arc<dyn RegionDecoder> = Arc::from(root);
        let image_info = root.image_info().clone();
        Self {
            key: key.into(),
            image_info,
            closed: AtomicBool::new(false),
            pool: Mutex::new(vec![Arc::clone(&root)]),
            root: Mutex::new(Some(root)),
        }
    }

    /// Key of the image source.
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Header information of the image.
    #[must_use]
    pub fn image_info(&self) -> &ImageInfo {
        &self.image_info
    }

    /// Number of idle instances.
    #[must_use]
    pub fn pool_size(&self) -> usize {
        lock(&self.pool).len()
    }

    /// Returns `true` once [`close`](Self::close) was called.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    fn acquire(&self) -> Result<Arc<dyn RegionDecoder>, TileDecoderError> {
        if let Some(instance) = lock(&self.pool).pop() {
            return Ok(instance);
        }
        let root = lock(&self.root).clone().ok_or(TileDecoderError::Closed)?;
        let instance = root.try_clone().map_err(TileDecoderError::Clone)?;
        tracing::debug!(key = %self.key, "opened another region decoder instance");
        Ok(Arc::from(instance))
    }

    fn recycle(&self, instance: Arc<dyn RegionDecoder>) {
        let mut pool = lock(&self.pool);
        // Checked under the pool lock so a concurrent close cannot miss it.
        if !self.is_closed() {
            pool.push(instance);
        }
    }

    /// Decodes `src_rect` downsampled by `sample_size`.
    ///
    /// Returns `Ok(None)` when the region itself could not be decoded; the
    /// failure is logged and not retried.
    pub fn decode(
        &self,
        key: &str,
        src_rect: IntRect,
        sample_size: u32,
    ) -> Result<Option<TileBitmap>, TileDecoderError> {
        if self.is_closed() {
            return Err(TileDecoderError::Closed);
        }
        let instance = self.acquire()?;
        let result = instance.decode_region(key, src_rect, sample_size);
        self.recycle(instance);
        match result {
            Ok(bitmap) => Ok(Some(bitmap)),
            Err(err) => {
                tracing::warn!(key, %src_rect, sample_size, error = %err, "region decode failed");
                Ok(None)
            }
        }
    }

    /// Closes the decoder and drops every pooled instance.
    ///
    /// Instances in use by running decodes are dropped as those decodes
    /// finish. Calling this more than once has no further effect.
    pub fn close(&self) {
        let drained = {
            let mut pool = lock(&self.pool);
            if self.closed.swap(true, Ordering::AcqRel) {
                return;
            }
            core::mem::take(&mut *pool)
        };
        let root = lock(&self.root).take();
        tracing::debug!(key = %self.key, instances = drained.len(), "tile decoder closed");
        drop(drained);
        drop(root);
    }
}

impl Drop for TileDecoder {
    fn drop(&mut self) {
        self.close();
    }
}

/// Opens a [`TileDecoder`] for `source`, shown as `content_size`.
///
/// Fails when the format is unsupported, the image is empty, the content is
/// not smaller than the image, or the aspect ratios disagree. Expected
/// rejections are marked as skipped in the error.
pub fn create_tile_decoder(
    source: Arc<dyn ImageSourceFactory>,
    factory: &dyn RegionDecoderFactory,
    content_size: IntSize,
) -> Result<TileDecoder, CreateTileDecoderError> {
    let key = source.key().to_owned();
    let root = factory.open(source)?;
    let info = root.image_info().clone();
    if !factory.supports(&info.mime_type) {
        return Err(CreateTileDecoderError::skipped(
            format!("image type '{}' does not support region decoding", info.mime_type),
            Some(info),
        ));
    }
    check_subsampling(&info, content_size)?;
    Ok(TileDecoder::new(key, root))
}
