// Copyright 2025 the Loupe Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Loupe: a headless engine for zoomable viewers of very large images.
//!
//! A viewer shows a thumbnail sized content that the user can zoom and pan.
//! Once zoomed in, the thumbnail lacks detail, so [`SubsamplingEngine`]
//! decodes the visible part of the original image tile by tile, at the
//! coarsest resolution that still covers the screen, and drops tiles as they
//! scroll out of view.
//!
//! The pieces live in their own crates and are re-exported here:
//! - [`geometry`]: sizes, rects, transforms, content fitting and read mode.
//! - [`source`]: image sources, region decoders and model conversion.
//! - [`tiles`]: tile grids, the tile manager, bitmap cache and executors.
//! - [`zoom`]: the zoom and pan engine with gestures and animations.
//!
//! The engine never renders and never reads a clock. Hosts forward input to
//! [`SubsamplingEngine::zoom_mut`], call [`SubsamplingEngine::advance`] from
//! their frame callback, and draw the tile snapshots with the engine's
//! transform.
//!
//! ## Example
//!
//! ```rust
//! use std::sync::Arc;
//! use core::time::Duration;
//! use loupe::geometry::IntSize;
//! use loupe::source::{BytesImageSourceFactory, ImageSourceFactory};
//! use loupe::tiles::InlineExecutor;
//! # use loupe::source::{CreateTileDecoderError, RegionDecoder, RegionDecoderFactory};
//! # #[derive(Debug)]
//! # struct Unsupported;
//! # impl RegionDecoderFactory for Unsupported {
//! #     fn supports(&self, _: &str) -> bool { false }
//! #     fn open(&self, _: Arc<dyn ImageSourceFactory>)
//! #         -> Result<Box<dyn RegionDecoder>, CreateTileDecoderError> {
//! #         Err(CreateTileDecoderError::skipped("unsupported", None))
//! #     }
//! # }
//! use loupe::{SubsamplingConfig, SubsamplingEngine, zoom::ZoomConfig};
//!
//! let mut engine = SubsamplingEngine::new(
//!     ZoomConfig::default(),
//!     Arc::new(Unsupported),
//!     Arc::new(InlineExecutor),
//!     SubsamplingConfig::default(),
//! );
//! engine.zoom_mut().set_container_size(IntSize::new(1080, 1920));
//! engine.zoom_mut().set_content_size(IntSize::new(540, 360));
//! let source: Arc<dyn ImageSourceFactory> =
//!     Arc::new(BytesImageSourceFactory::new("huge.png", vec![0_u8; 64]));
//! engine.set_image_source(Some(source));
//!
//! while engine.advance(Duration::from_millis(16)) {}
//! // This decoder cannot handle the image, so the thumbnail stays on its own.
//! assert!(!engine.ready());
//! assert!(engine.foreground_tiles().is_empty());
//! ```
//!
//! ## Features
//!
//! - `image`: a region decoder backed by the `image` crate.
//! - `serde`: derive `Serialize`/`Deserialize` for saved transforms and the
//!   plain geometry types.

mod config;
mod engine;

pub use config::{SubsamplingChanges, SubsamplingConfig};
pub use engine::SubsamplingEngine;

pub use kurbo;
pub use loupe_geometry as geometry;
pub use loupe_source as source;
pub use loupe_tiles as tiles;
pub use loupe_zoom as zoom;
