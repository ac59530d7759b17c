// Copyright 2025 the Loupe Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

use core::fmt;
use std::io;
use std::sync::Arc;

use loupe_geometry::{IntRect, IntSize, format_decimals};

use crate::{ImageInfo, ImageSourceFactory, SourceError, TileBitmap};

/// Errors from decoding one region.
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    /// The source could not be reopened.
    #[error(transparent)]
    Source(#[from] SourceError),
    /// Reading the encoded bytes failed.
    #[error("i/o error while decoding: {0}")]
    Io(#[from] io::Error),
    /// The requested rectangle is empty or lies outside the image.
    #[error("region {rect} is outside image of size {image_size}")]
    OutOfBounds {
        /// The requested region.
        rect: IntRect,
        /// Size of the image.
        image_size: IntSize,
    },
    /// The encoded data is corrupt or truncated.
    #[error("malformed image data: {0}")]
    Malformed(String),
    /// The decoder has been closed.
    #[error("region decoder is closed")]
    Closed,
}

/// Failure to open a region decoder for an image.
///
/// `image_info` carries whatever the header probe managed to read. `skipped`
/// separates images that are deliberately not subsampled (unsupported
/// format, image not larger than its thumbnail) from genuine failures, so
/// callers can log the former quietly.
#[derive(Debug, thiserror::Error)]
#[error("{message}")]
pub struct CreateTileDecoderError {
    /// Human readable reason.
    pub message: String,
    /// `true` if subsampling was skipped on purpose.
    pub skipped: bool,
    /// Header information, if probing succeeded.
    pub image_info: Option<ImageInfo>,
}

impl CreateTileDecoderError {
    /// A deliberate skip.
    pub fn skipped(message: impl Into<String>, image_info: Option<ImageInfo>) -> Self {
        Self {
            message: message.into(),
            skipped: true,
            image_info,
        }
    }

    /// A genuine failure.
    pub fn failed(message: impl Into<String>, image_info: Option<ImageInfo>) -> Self {
        Self {
            message: message.into(),
            skipped: false,
            image_info,
        }
    }
}

impl From<SourceError> for CreateTileDecoderError {
    fn from(err: SourceError) -> Self {
        Self::failed(err.to_string(), None)
    }
}

/// Decodes downsampled sub-rectangles of one image.
///
/// A decoder instance is used by one thread at a time; the tile decoder pool
/// guarantees that. Implementations that keep per-instance state should use
/// interior mutability, which will be uncontended. Dropping an instance
/// closes it and releases its stream.
pub trait RegionDecoder: Send + Sync + fmt::Debug {
    /// Header information of the image.
    fn image_info(&self) -> &ImageInfo;

    /// Decodes `rect` (full resolution pixels) downsampled by `sample_size`.
    ///
    /// `key` identifies the tile for diagnostics. The result is roughly
    /// `rect.width() / sample_size` by `rect.height() / sample_size` pixels.
    fn decode_region(
        &self,
        key: &str,
        rect: IntRect,
        sample_size: u32,
    ) -> Result<TileBitmap, DecodeError>;

    /// Opens an independent instance over the same image.
    fn try_clone(&self) -> Result<Box<dyn RegionDecoder>, DecodeError>;
}

/// Opens [`RegionDecoder`]s for image sources.
pub trait RegionDecoderFactory: Send + Sync + fmt::Debug {
    /// Returns `true` if images of `mime_type` can be region decoded.
    fn supports(&self, mime_type: &str) -> bool;

    /// Probes the header of `source` and opens a decoder over it.
    fn open(
        &self,
        source: Arc<dyn ImageSourceFactory>,
    ) -> Result<Box<dyn RegionDecoder>, CreateTileDecoderError>;
}

/// Returns `true` if `content` is a faithful thumbnail of `image`.
///
/// Tiles are placed over the content by scaling image coordinates, which only
/// works when both have (nearly) the same aspect ratio. Ratios are compared
/// at two decimals and may differ by at most `0.5`.
#[must_use]
pub fn can_use_subsampling(image: IntSize, content: IntSize) -> bool {
    if image.is_empty() || content.is_empty() {
        return false;
    }
    let image_ratio = format_decimals(image.aspect_ratio(), 2);
    let content_ratio = format_decimals(content.aspect_ratio(), 2);
    format_decimals((image_ratio - content_ratio).abs(), 2) <= 0.5
}

/// Checks whether subsampling should be used for `info` shown as `content`.
///
/// Mirrors the checks made when a decoder is opened for the engine: an empty
/// image is an error, while an image no larger than its content, or with a
/// different aspect ratio, is skipped.
pub fn check_subsampling(info: &ImageInfo, content: IntSize) -> Result<(), CreateTileDecoderError> {
    let image = info.size();
    if image.is_empty() {
        return Err(CreateTileDecoderError::failed(
            format!("image size is invalid: {image}"),
            Some(info.clone()),
        ));
    }
    if content.width >= image.width && content.height >= image.height {
        return Err(CreateTileDecoderError::skipped(
            format!("content size {content} is not smaller than image size {image}"),
            Some(info.clone()),
        ));
    }
    if !can_use_subsampling(image, content) {
        return Err(CreateTileDecoderError::skipped(
            format!("aspect ratio of image {image} does not match content {content}"),
            Some(info.clone()),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subsampling_needs_matching_aspect() {
        let image = IntSize::new(12000, 8000);
        assert!(can_use_subsampling(image, IntSize::new(1200, 800)), "same ratio");
        assert!(can_use_subsampling(image, IntSize::new(1000, 800)), "1.25 vs 1.5 is close enough");
        assert!(can_use_subsampling(image, IntSize::new(800, 800)), "a difference of exactly 0.5 passes");
        assert!(!can_use_subsampling(image, IntSize::new(600, 800)), "0.75 vs 1.5 is too far");
    }

    #[test]
    fn check_classifies_failures() {
        let info = ImageInfo::new(12000, 8000, "image/jpeg");
        assert!(check_subsampling(&info, IntSize::new(1200, 800)).is_ok(), "thumbnail is fine");
        let same = check_subsampling(&info, IntSize::new(12000, 8000)).unwrap_err();
        assert!(same.skipped, "full size content needs no tiles");
        assert_eq!(same.image_info, Some(info.clone()), "info is reported");
        let empty = check_subsampling(&ImageInfo::new(0, 10, "image/png"), IntSize::new(1, 1)).unwrap_err();
        assert!(!empty.skipped, "empty image is an error");
    }
}
