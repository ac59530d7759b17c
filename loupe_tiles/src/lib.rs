// Copyright 2025 the Loupe Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Loupe Tiles: a subsampling tile engine for very large images.
//!
//! Showing a photo of hundreds of megapixels in a phone sized viewport never
//! needs every pixel at once. This crate decodes only the part of the image
//! that is visible, at the coarsest resolution that still covers the screen:
//!
//! - [`build_tile_grids`] partitions the image into tiles for every power of
//!   two sample size, so each tile decodes to at most the preferred tile size.
//! - [`TileDecoder`] pools region decoder instances so decodes can run in
//!   parallel without sharing a decoder between threads.
//! - [`TileBitmapCache`] stores decoded tiles with reference counting; the
//!   bundled [`LruTileBitmapCache`] evicts unreferenced tiles by age.
//! - [`TileManager`] selects the sample size for the current scale, loads the
//!   tiles that intersect the viewport, frees the rest, and keeps the previous
//!   resolution visible underneath until the new tiles have faded in.
//!
//! The manager is driven from a single thread. Decodes run on a
//! [`TileExecutor`] and their results are applied when the owner calls
//! [`TileManager::apply_decode_results`].
//!
//! ## Example
//!
//! ```rust
//! use loupe_geometry::{IntRect, IntSize};
//! use loupe_tiles::{build_tile_grids, calculate_sample_size};
//!
//! let image = IntSize::new(12000, 8000);
//! let grids = build_tile_grids(image, IntSize::new(1080, 1920));
//! assert_eq!(grids.intro_string(), "[1:12x5,2:6x3,4:3x2,8:2x1,16:1x1]");
//!
//! // A 1200x800 thumbnail shown at 0.9x needs one image pixel in eight.
//! let sample_size = calculate_sample_size(image, IntSize::new(1200, 800), 0.9);
//! assert_eq!(sample_size, 8);
//! let grid = grids.grid(sample_size).unwrap();
//! assert_eq!(grid.tiles()[1].src_rect(), IntRect::new(6000, 0, 12000, 8000));
//! ```

mod cache;
mod decoder;
mod executor;
mod grid;
mod manager;
mod tile;

pub use cache::{CacheStats, LruTileBitmapCache, TileBitmapCache, TileKey};
pub use decoder::{TileDecoder, TileDecoderError, create_tile_decoder};
pub use executor::{InlineExecutor, Job, QueuedExecutor, ThreadPoolExecutor, TileExecutor};
pub use grid::{
    TileGrid, TileGrids, build_tile_grids, calculate_image_load_rect,
    calculate_preferred_tile_size, calculate_sample_size, check_new_preferred_tile_size,
    default_load_margin,
};
pub use manager::{RefreshResult, TileConfig, TileManager};
pub use tile::{
    Tile, TileAnimationSpec, TileAnimationState, TileChanges, TileCoordinate, TileSnapshot,
    TileState,
};
