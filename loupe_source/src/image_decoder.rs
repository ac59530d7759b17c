// Copyright 2025 the Loupe Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Region decoding through the `image` crate.
//!
//! The `image` crate has no native region decoding, so the first region
//! request decodes the whole image once. The decoded pixels are shared by
//! every clone of the decoder, so a pool of instances still holds a single
//! copy. Header probing stays cheap: opening a decoder only reads the
//! dimensions, and images above the factory's pixel budget are skipped
//! before anything is decoded.

use std::fmt;
use std::io::BufReader;
use std::sync::{Arc, OnceLock};

use image::imageops::{self, FilterType};
use image::{ImageError, ImageFormat as EncodedFormat, ImageReader, RgbaImage};
use loupe_geometry::IntRect;

use crate::{
    CreateTileDecoderError, DecodeError, ImageInfo, ImageSourceFactory, RegionDecoder,
    RegionDecoderFactory, TileBitmap,
};

/// Opens [`ImageRegionDecoder`]s for every format the `image` crate reads.
///
/// Because the whole image ends up in memory as RGBA8, images with more
/// than [`max_pixels`](Self::max_pixels) pixels are reported as skipped.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ImageRegionDecoderFactory {
    max_pixels: u64,
}

impl ImageRegionDecoderFactory {
    /// Default pixel budget: 64 megapixels, 256 MiB of RGBA8.
    pub const DEFAULT_MAX_PIXELS: u64 = 64 * 1024 * 1024;

    /// A factory with the default pixel budget.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            max_pixels: Self::DEFAULT_MAX_PIXELS,
        }
    }

    /// A factory that skips images with more than `max_pixels` pixels.
    #[must_use]
    pub const fn with_max_pixels(max_pixels: u64) -> Self {
        Self { max_pixels }
    }

    /// Largest image, in pixels, this factory opens.
    #[must_use]
    pub const fn max_pixels(&self) -> u64 {
        self.max_pixels
    }
}

impl Default for ImageRegionDecoderFactory {
    fn default() -> Self {
        Self::new()
    }
}

impl RegionDecoderFactory for ImageRegionDecoderFactory {
    fn supports(&self, mime_type: &str) -> bool {
        EncodedFormat::from_mime_type(mime_type).is_some_and(|f| f.reading_enabled())
    }

    fn open(
        &self,
        source: Arc<dyn ImageSourceFactory>,
    ) -> Result<Box<dyn RegionDecoder>, CreateTileDecoderError> {
        let stream = source.create()?;
        let reader = ImageReader::new(BufReader::new(stream))
            .with_guessed_format()
            .map_err(|e| CreateTileDecoderError::failed(format!("probe failed: {e}"), None))?;
        let Some(format) = reader.format() else {
            return Err(CreateTileDecoderError::skipped(
                format!("unrecognized image format for '{}'", source.key()),
                None,
            ));
        };
        let mime_type = format.to_mime_type();
        let (width, height) = reader.into_dimensions().map_err(|e| {
            CreateTileDecoderError::failed(format!("reading dimensions failed: {e}"), None)
        })?;
        let info = ImageInfo::new(width, height, mime_type);
        if !self.supports(mime_type) {
            return Err(CreateTileDecoderError::skipped(
                format!("format '{mime_type}' is not supported"),
                Some(info),
            ));
        }
        let pixels = u64::from(width) * u64::from(height);
        if pixels > self.max_pixels {
            return Err(CreateTileDecoderError::skipped(
                format!("{info} exceeds the budget of {} pixels", self.max_pixels),
                Some(info),
            ));
        }
        Ok(Box::new(ImageRegionDecoder {
            info,
            source,
            pixels: Arc::new(OnceLock::new()),
        }))
    }
}

/// Region decoder over a fully decoded, shared RGBA8 image.
///
/// Only a successful decode is kept. A failed one is reported to the caller
/// and the next region request reopens the source and tries again.
#[derive(Clone)]
pub struct ImageRegionDecoder {
    info: ImageInfo,
    source: Arc<dyn ImageSourceFactory>,
    pixels: Arc<OnceLock<Arc<RgbaImage>>>,
}

impl ImageRegionDecoder {
    fn decode_full(&self) -> Result<RgbaImage, DecodeError> {
        let stream = self.source.create()?;
        let image = ImageReader::new(BufReader::new(stream))
            .with_guessed_format()?
            .decode()
            .map_err(|e| match e {
                ImageError::IoError(e) => DecodeError::Io(e),
                e => DecodeError::Malformed(e.to_string()),
            })?;
        tracing::debug!(key = self.source.key(), "decoded full image for region access");
        Ok(image.to_rgba8())
    }

    fn pixels(&self) -> Result<Arc<RgbaImage>, DecodeError> {
        if let Some(pixels) = self.pixels.get() {
            return Ok(Arc::clone(pixels));
        }
        let decoded = Arc::new(self.decode_full()?);
        // Another clone may have won the race; both decodes are identical.
        Ok(Arc::clone(self.pixels.get_or_init(|| decoded)))
    }
}

impl fmt::Debug for ImageRegionDecoder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ImageRegionDecoder")
            .field("info", &self.info)
            .field("source", &self.source.key())
            .field("decoded", &self.pixels.get().is_some())
            .finish()
    }
}

impl RegionDecoder for ImageRegionDecoder {
    fn image_info(&self) -> &ImageInfo {
        &self.info
    }

    fn decode_region(
        &self,
        _key: &str,
        rect: IntRect,
        sample_size: u32,
    ) -> Result<TileBitmap, DecodeError> {
        let image_size = self.info.size();
        if rect.is_empty() || !image_size.to_rect().contains_rect(rect) {
            return Err(DecodeError::OutOfBounds { rect, image_size });
        }
        let full = self.pixels()?;
        let region =
            imageops::crop_imm(full.as_ref(), rect.x0, rect.y0, rect.width(), rect.height())
                .to_image();
        let sample_size = sample_size.max(1);
        let region = if sample_size == 1 {
            region
        } else {
            let width = rect.width().div_ceil(sample_size);
            let height = rect.height().div_ceil(sample_size);
            imageops::resize(&region, width, height, FilterType::Triangle)
        };
        let (width, height) = region.dimensions();
        Ok(TileBitmap::rgba8(width, height, region.into_raw()))
    }

    fn try_clone(&self) -> Result<Box<dyn RegionDecoder>, DecodeError> {
        Ok(Box::new(self.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{BytesImageSourceFactory, ImageSource, SourceError};
    use std::io::{self, Cursor};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn png_bytes(width: u32, height: u32) -> Vec<u8> {
        let image = RgbaImage::from_fn(width, height, |x, y| {
            image::Rgba([u8::try_from(x % 256).unwrap(), u8::try_from(y % 256).unwrap(), 0, 255])
        });
        let mut out = Cursor::new(Vec::new());
        image.write_to(&mut out, EncodedFormat::Png).unwrap();
        out.into_inner()
    }

    #[test]
    fn opens_and_decodes_downsampled_region() {
        let source = Arc::new(BytesImageSourceFactory::new("png", png_bytes(64, 32)));
        let decoder = ImageRegionDecoderFactory::new().open(source).unwrap();
        assert_eq!(decoder.image_info().mime_type, "image/png", "mime from format");
        assert_eq!(decoder.image_info().size().width, 64, "width from header");

        let tile = decoder.decode_region("t", IntRect::new(16, 0, 48, 32), 2).unwrap();
        assert_eq!((tile.width(), tile.height()), (16, 16), "halved region");
        assert_eq!(tile.byte_count(), 16 * 16 * 4, "rgba8 pixels");
    }

    #[test]
    fn clones_share_decoded_pixels() {
        let source = Arc::new(BytesImageSourceFactory::new("png", png_bytes(8, 8)));
        let decoder = ImageRegionDecoderFactory::new().open(source).unwrap();
        let clone = decoder.try_clone().unwrap();
        decoder.decode_region("a", IntRect::new(0, 0, 8, 8), 1).unwrap();
        assert!(format!("{clone:?}").contains("decoded: true"), "clone sees the decode");
    }

    #[test]
    fn rejects_out_of_bounds_region() {
        let source = Arc::new(BytesImageSourceFactory::new("png", png_bytes(8, 8)));
        let decoder = ImageRegionDecoderFactory::new().open(source).unwrap();
        let err = decoder.decode_region("a", IntRect::new(4, 4, 12, 12), 1).unwrap_err();
        assert!(matches!(err, DecodeError::OutOfBounds { .. }), "got {err}");
    }

    #[test]
    fn garbage_is_skipped() {
        let source = Arc::new(BytesImageSourceFactory::new("junk", vec![0_u8; 16]));
        let err = ImageRegionDecoderFactory::new().open(source).unwrap_err();
        assert!(err.skipped, "unknown format is a skip, got {err}");
    }

    /// Fails exactly on its second `create`, the first full decode.
    #[derive(Debug)]
    struct FlakySource {
        bytes: BytesImageSourceFactory,
        creates: AtomicUsize,
    }

    impl ImageSourceFactory for FlakySource {
        fn key(&self) -> &str {
            "flaky"
        }

        fn create(&self) -> Result<Box<dyn ImageSource>, SourceError> {
            if self.creates.fetch_add(1, Ordering::SeqCst) == 1 {
                return Err(SourceError::Io {
                    key: "flaky".into(),
                    source: io::Error::new(io::ErrorKind::Interrupted, "transient"),
                });
            }
            self.bytes.create()
        }
    }

    #[test]
    fn transient_source_failure_is_retried() {
        let source = Arc::new(FlakySource {
            bytes: BytesImageSourceFactory::new("png", png_bytes(8, 8)),
            creates: AtomicUsize::new(0),
        });
        let decoder = ImageRegionDecoderFactory::new().open(source.clone()).unwrap();
        let clone = decoder.try_clone().unwrap();
        let rect = IntRect::new(0, 0, 8, 8);

        let err = decoder.decode_region("a", rect, 1).unwrap_err();
        assert!(matches!(err, DecodeError::Source(_)), "typed source error, got {err}");
        assert!(format!("{clone:?}").contains("decoded: false"), "failure not cached");

        let tile = clone.decode_region("a", rect, 1).unwrap();
        assert_eq!((tile.width(), tile.height()), (8, 8), "retry succeeds");
        assert!(decoder.decode_region("a", rect, 2).is_ok(), "shared with the original");
        assert_eq!(source.creates.load(Ordering::SeqCst), 3, "decoded once after the failure");
    }

    #[test]
    fn over_budget_image_is_skipped_with_info() {
        let source = Arc::new(BytesImageSourceFactory::new("png", png_bytes(64, 32)));
        let factory = ImageRegionDecoderFactory::with_max_pixels(1024);
        let err = factory.open(source).unwrap_err();
        assert!(err.skipped, "over budget is a skip, got {err}");
        let info = err.image_info.expect("header was read");
        assert_eq!((info.size().width, info.size().height), (64, 32), "header size reported");

        let source = Arc::new(BytesImageSourceFactory::new("png", png_bytes(32, 32)));
        assert!(factory.open(source).is_ok(), "exactly at the budget opens");
    }
}
