// Copyright 2025 the Loupe Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

use core::time::Duration;
use std::sync::Arc;

use loupe_tiles::{TileBitmapCache, TileConfig};

/// Settings of a [`SubsamplingEngine`](crate::SubsamplingEngine).
#[derive(Clone, Debug)]
pub struct SubsamplingConfig {
    /// How long the container size must stay unchanged before the preferred
    /// tile size is recomputed.
    ///
    /// Resize animations report many sizes in quick succession; rebuilding
    /// the tile grids for each of them would churn decodes.
    pub size_debounce: Duration,
    /// Shared store for decoded tiles. `None` decodes every tile anew.
    pub tile_bitmap_cache: Option<Arc<dyn TileBitmapCache>>,
    /// Tile manager settings.
    pub tile: TileConfig,
}

impl SubsamplingConfig {
    /// Default debounce interval: 80 ms.
    pub const DEFAULT_SIZE_DEBOUNCE: Duration = Duration::from_millis(80);
}

impl Default for SubsamplingConfig {
    fn default() -> Self {
        Self {
            size_debounce: Self::DEFAULT_SIZE_DEBOUNCE,
            tile_bitmap_cache: None,
            tile: TileConfig::default(),
        }
    }
}

bitflags::bitflags! {
    /// What changed since the last
    /// [`SubsamplingEngine::take_changes`](crate::SubsamplingEngine::take_changes).
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    pub struct SubsamplingChanges: u8 {
        /// Foreground tile snapshots.
        const FOREGROUND = 1 << 0;
        /// Background tile snapshots.
        const BACKGROUND = 1 << 1;
        /// Active sample size.
        const SAMPLE_SIZE = 1 << 2;
        /// Image load rect.
        const IMAGE_LOAD_RECT = 1 << 3;
        /// Ready state.
        const READY = 1 << 4;
        /// Image header information.
        const IMAGE_INFO = 1 << 5;
        /// Tile grids were rebuilt or dropped.
        const TILE_GRIDS = 1 << 6;
    }
}

impl Default for SubsamplingChanges {
    fn default() -> Self {
        Self::empty()
    }
}
