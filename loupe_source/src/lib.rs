// Copyright 2025 the Loupe Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Loupe Source: where tile pixels come from.
//!
//! The tile engine never touches encoded bytes directly. It works through
//! three capabilities defined here:
//!
//! - [`ImageSourceFactory`]: a re-openable, seekable byte stream with a stable
//!   key. The key identifies the image everywhere, including tile cache keys.
//! - [`RegionDecoderFactory`] / [`RegionDecoder`]: probe an image header into
//!   an [`ImageInfo`] and decode arbitrary sub-rectangles downsampled by a
//!   power of two sample size into a [`TileBitmap`].
//! - [`ModelToImageSourceChain`]: an ordered list of converters that turn
//!   loader-specific models (paths, URIs, byte buffers) into image sources.
//!
//! Failures are typed: [`SourceError`] for opening bytes, [`DecodeError`] for
//! a single region, and [`CreateTileDecoderError`] for opening a decoder,
//! which also says whether subsampling was skipped on purpose.
//!
//! ## Example
//!
//! ```rust
//! use std::sync::Arc;
//! use loupe_source::{ImageSourceFactory, ModelToImageSourceChain};
//!
//! let chain = ModelToImageSourceChain::default();
//! let source: Arc<dyn ImageSourceFactory> = chain
//!     .image_source(&String::from("file:///photos/huge.jpg"))
//!     .expect("file uris are recognized");
//! assert_eq!(source.key(), "file:///photos/huge.jpg");
//! ```
//!
//! ## Features
//!
//! - `image`: [`ImageRegionDecoderFactory`], a region decoder backed by the
//!   `image` crate.

mod bitmap;
mod decoder;
#[cfg(feature = "image")]
mod image_decoder;
pub mod model;
mod source;

pub use bitmap::{ImageInfo, TileBitmap};
pub use decoder::{
    CreateTileDecoderError, DecodeError, RegionDecoder, RegionDecoderFactory,
    can_use_subsampling, check_subsampling,
};
#[cfg(feature = "image")]
pub use image_decoder::{ImageRegionDecoder, ImageRegionDecoderFactory};
pub use model::{ModelToImageSource, ModelToImageSourceChain};
pub use source::{
    BytesImageSourceFactory, FileImageSourceFactory, ImageSource, ImageSourceFactory, SourceError,
};

pub use peniko::{ImageAlphaType, ImageFormat};
