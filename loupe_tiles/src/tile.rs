// Copyright 2025 the Loupe Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

use core::fmt;
use core::time::Duration;

use loupe_geometry::IntRect;
use loupe_source::TileBitmap;

/// Position of a tile within its grid.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TileCoordinate {
    /// Column, counted from the left.
    pub col: u32,
    /// Row, counted from the top.
    pub row: u32,
}

impl TileCoordinate {
    /// Creates a coordinate.
    #[must_use]
    pub const fn new(col: u32, row: u32) -> Self {
        Self { col, row }
    }
}

impl fmt::Display for TileCoordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({},{})", self.col, self.row)
    }
}

/// Load state of a tile.
///
/// Transitions are `NotLoaded → Loading → Loaded | Error`. Only a free or a
/// full reset moves a tile back to `NotLoaded`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum TileState {
    /// No bitmap and no decode in flight.
    #[default]
    NotLoaded,
    /// A decode has been dispatched.
    Loading,
    /// The bitmap is available.
    Loaded,
    /// The last decode failed.
    Error,
}

/// Fade-in applied to tiles whose bitmap arrives from a decode.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TileAnimationSpec {
    /// Time from transparent to opaque. Zero disables the fade.
    pub duration: Duration,
}

impl TileAnimationSpec {
    /// No fade; tiles appear at full opacity.
    pub const NONE: Self = Self {
        duration: Duration::ZERO,
    };

    /// The default fade of 200 ms.
    pub const DEFAULT: Self = Self {
        duration: Duration::from_millis(200),
    };

    /// Returns `true` if tiles fade in.
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        !self.duration.is_zero()
    }
}

impl Default for TileAnimationSpec {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Fade-in progress of one tile.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TileAnimationState {
    progress: f64,
    running: bool,
}

impl TileAnimationState {
    /// Starts a fade from transparent.
    pub fn start(&mut self) {
        self.progress = 0.0;
        self.running = true;
    }

    /// Jumps to fully opaque.
    pub fn finish(&mut self) {
        self.progress = 1.0;
        self.running = false;
    }

    /// Advances the fade by `dt` under `spec`. Returns `true` if the alpha changed.
    pub fn advance(&mut self, dt: Duration, spec: &TileAnimationSpec) -> bool {
        if !self.running {
            return false;
        }
        if !spec.is_enabled() {
            self.finish();
            return true;
        }
        self.progress += dt.as_secs_f64() / spec.duration.as_secs_f64();
        if self.progress >= 1.0 {
            self.finish();
        }
        true
    }

    /// Returns `true` while the fade is in progress.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Opacity in `0..=255`.
    #[must_use]
    #[expect(
        clippy::cast_possible_truncation,
        reason = "progress is clamped to [0, 1] before scaling to 255"
    )]
    pub fn alpha(&self) -> u8 {
        (self.progress.clamp(0.0, 1.0) * 255.0).round() as u8
    }
}

impl Default for TileAnimationState {
    /// Opaque and idle.
    fn default() -> Self {
        Self {
            progress: 1.0,
            running: false,
        }
    }
}

/// One rectangular region of the image at one sample size.
///
/// Tiles are owned by their [`TileGrid`](crate::TileGrid) and mutated only by
/// the [`TileManager`](crate::TileManager). Consumers see them through
/// [`TileSnapshot`]s.
#[derive(Clone, Debug)]
pub struct Tile {
    coordinate: TileCoordinate,
    src_rect: IntRect,
    sample_size: u32,
    pub(crate) bitmap: Option<TileBitmap>,
    pub(crate) state: TileState,
    pub(crate) animation: TileAnimationState,
    /// Holds a reference in the bitmap cache.
    pub(crate) cached: bool,
    /// Bumped on every dispatch and free so late results can be matched.
    pub(crate) load_serial: u64,
}

impl Tile {
    /// Creates an unloaded tile.
    #[must_use]
    pub fn new(coordinate: TileCoordinate, src_rect: IntRect, sample_size: u32) -> Self {
        Self {
            coordinate,
            src_rect,
            sample_size,
            bitmap: None,
            state: TileState::NotLoaded,
            animation: TileAnimationState::default(),
            cached: false,
            load_serial: 0,
        }
    }

    /// Grid position.
    #[must_use]
    pub fn coordinate(&self) -> TileCoordinate {
        self.coordinate
    }

    /// Region of the full resolution image covered by this tile.
    #[must_use]
    pub fn src_rect(&self) -> IntRect {
        self.src_rect
    }

    /// Downsampling factor used to decode this tile.
    #[must_use]
    pub fn sample_size(&self) -> u32 {
        self.sample_size
    }

    /// The decoded pixels, while loaded.
    #[must_use]
    pub fn bitmap(&self) -> Option<&TileBitmap> {
        self.bitmap.as_ref()
    }

    /// Current load state.
    #[must_use]
    pub fn state(&self) -> TileState {
        self.state
    }

    /// Fade-in progress.
    #[must_use]
    pub fn animation(&self) -> &TileAnimationState {
        &self.animation
    }

    /// Returns `true` once the bitmap is available.
    #[must_use]
    pub fn is_loaded(&self) -> bool {
        self.state == TileState::Loaded
    }

    /// Read-only projection for consumers.
    #[must_use]
    pub fn snapshot(&self) -> TileSnapshot {
        TileSnapshot {
            coordinate: self.coordinate,
            src_rect: self.src_rect,
            sample_size: self.sample_size,
            bitmap: self.bitmap.clone(),
            state: self.state,
            alpha: self.animation.alpha(),
        }
    }

    pub(crate) fn reset(&mut self) {
        self.bitmap = None;
        self.state = TileState::NotLoaded;
        self.animation = TileAnimationState::default();
        self.cached = false;
        self.load_serial = self.load_serial.wrapping_add(1);
    }
}

impl fmt::Display for Tile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Tile({}, {}, {}, {:?})",
            self.coordinate, self.src_rect, self.sample_size, self.state
        )
    }
}

/// Immutable view of a tile handed to the rendering layer.
#[derive(Clone, Debug)]
pub struct TileSnapshot {
    /// Grid position.
    pub coordinate: TileCoordinate,
    /// Region of the full resolution image.
    pub src_rect: IntRect,
    /// Downsampling factor.
    pub sample_size: u32,
    /// Decoded pixels, if loaded.
    pub bitmap: Option<TileBitmap>,
    /// Load state when the snapshot was taken.
    pub state: TileState,
    /// Opacity in `0..=255` from the fade-in.
    pub alpha: u8,
}

impl TileSnapshot {
    /// Returns `true` if the tile had its bitmap.
    #[must_use]
    pub fn is_loaded(&self) -> bool {
        self.state == TileState::Loaded
    }
}

bitflags::bitflags! {
    /// Which projections of a [`TileManager`](crate::TileManager) changed.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    pub struct TileChanges: u8 {
        /// Foreground tile snapshots.
        const FOREGROUND      = 0b0000_0001;
        /// Background tile snapshots.
        const BACKGROUND      = 0b0000_0010;
        /// The active sample size.
        const SAMPLE_SIZE     = 0b0000_0100;
        /// The union of foreground tile rects.
        const IMAGE_LOAD_RECT = 0b0000_1000;
    }
}

impl Default for TileChanges {
    fn default() -> Self {
        Self::empty()
    }
}
