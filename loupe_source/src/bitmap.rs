// Copyright 2025 the Loupe Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

use core::fmt;

use loupe_geometry::IntSize;
use peniko::{Blob, ImageAlphaType, ImageFormat};

/// Basic facts about an encoded image, read from its header.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ImageInfo {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    /// MIME type of the encoding, for example `image/jpeg`.
    pub mime_type: String,
}

impl ImageInfo {
    /// Creates new image info.
    pub fn new(width: u32, height: u32, mime_type: impl Into<String>) -> Self {
        Self {
            width,
            height,
            mime_type: mime_type.into(),
        }
    }

    /// Image dimensions.
    #[must_use]
    pub fn size(&self) -> IntSize {
        IntSize::new(self.width, self.height)
    }
}

impl fmt::Display for ImageInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ImageInfo({}x{}, '{}')", self.width, self.height, self.mime_type)
    }
}

/// Decoded pixels of one tile.
///
/// Cloning is cheap: clones share the same pixel storage. Two handles refer to
/// the same decode result exactly when [`TileBitmap::ptr_eq`] holds.
#[derive(Clone)]
pub struct TileBitmap {
    width: u32,
    height: u32,
    format: ImageFormat,
    alpha_type: ImageAlphaType,
    pixels: Blob<u8>,
}

impl TileBitmap {
    /// Wraps tightly packed, row-major pixels.
    ///
    /// Both supported formats use four bytes per pixel; `pixels` should hold
    /// `width * height * 4` bytes.
    pub fn new(
        width: u32,
        height: u32,
        format: ImageFormat,
        alpha_type: ImageAlphaType,
        pixels: impl Into<Blob<u8>>,
    ) -> Self {
        Self {
            width,
            height,
            format,
            alpha_type,
            pixels: pixels.into(),
        }
    }

    /// Straight-alpha RGBA8 pixels.
    pub fn rgba8(width: u32, height: u32, pixels: Vec<u8>) -> Self {
        Self::new(width, height, ImageFormat::Rgba8, ImageAlphaType::Alpha, pixels)
    }

    /// Width in pixels.
    #[must_use]
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Height in pixels.
    #[must_use]
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Dimensions.
    #[must_use]
    pub fn size(&self) -> IntSize {
        IntSize::new(self.width, self.height)
    }

    /// Pixel layout.
    #[must_use]
    pub fn format(&self) -> ImageFormat {
        self.format
    }

    /// Alpha encoding.
    #[must_use]
    pub fn alpha_type(&self) -> ImageAlphaType {
        self.alpha_type
    }

    /// The pixel bytes.
    #[must_use]
    pub fn pixels(&self) -> &[u8] {
        self.pixels.data()
    }

    /// Shared pixel storage, for handing to a renderer without copying.
    #[must_use]
    pub fn blob(&self) -> &Blob<u8> {
        &self.pixels
    }

    /// Memory held by the pixels, used for cache budgeting.
    #[must_use]
    pub fn byte_count(&self) -> usize {
        self.pixels.len()
    }

    /// Returns `true` if both handles share the same pixel storage.
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        self.pixels.id() == other.pixels.id()
    }
}

impl fmt::Debug for TileBitmap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TileBitmap")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("format", &self.format)
            .field("alpha_type", &self.alpha_type)
            .field("bytes", &self.pixels.len())
            .finish_non_exhaustive()
    }
}
