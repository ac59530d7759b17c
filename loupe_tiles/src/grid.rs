// Copyright 2025 the Loupe Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Partitioning an image into tiles per sample size.
//!
//! A grid for sample size `s` splits the full resolution image into columns
//! and rows such that every tile, once downsampled by `s`, fits within the
//! maximum tile size. Grids are built for `s = 1, 2, 4, …` until a grid
//! consists of a single tile; that coarsest grid shows the whole image in one
//! decode.

use core::fmt::Write as _;

use loupe_geometry::{IntRect, IntSize, is_sideways, round_to_u32};
use smallvec::SmallVec;

use crate::{Tile, TileCoordinate};

/// All tiles of one sample size, in row-major order.
#[derive(Clone, Debug)]
pub struct TileGrid {
    sample_size: u32,
    grid_size: IntSize,
    pub(crate) tiles: Vec<Tile>,
}

impl TileGrid {
    /// Downsampling factor shared by every tile in the grid.
    #[must_use]
    pub fn sample_size(&self) -> u32 {
        self.sample_size
    }

    /// Number of columns (`width`) and rows (`height`).
    #[must_use]
    pub fn grid_size(&self) -> IntSize {
        self.grid_size
    }

    /// The tiles, row by row.
    #[must_use]
    pub fn tiles(&self) -> &[Tile] {
        &self.tiles
    }

    /// Number of tiles.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tiles.len()
    }

    /// Returns `true` if the grid has no tiles.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tiles.is_empty()
    }

    /// Looks up a tile by position.
    #[must_use]
    pub fn tile(&self, coordinate: TileCoordinate) -> Option<&Tile> {
        if coordinate.col >= self.grid_size.width || coordinate.row >= self.grid_size.height {
            return None;
        }
        let index = coordinate.row as usize * self.grid_size.width as usize + coordinate.col as usize;
        self.tiles.get(index)
    }
}

/// Grids for every sample size, ascending.
#[derive(Clone, Debug, Default)]
pub struct TileGrids {
    grids: Vec<TileGrid>,
}

impl TileGrids {
    /// Returns `true` if no grids were built.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.grids.is_empty()
    }

    /// Number of grids.
    #[must_use]
    pub fn len(&self) -> usize {
        self.grids.len()
    }

    /// Grids from the finest to the coarsest.
    pub fn iter(&self) -> impl Iterator<Item = &TileGrid> {
        self.grids.iter()
    }

    /// Sample sizes that have a grid, ascending.
    #[must_use]
    pub fn sample_sizes(&self) -> SmallVec<[u32; 8]> {
        self.grids.iter().map(TileGrid::sample_size).collect()
    }

    /// The grid for `sample_size`.
    #[must_use]
    pub fn grid(&self, sample_size: u32) -> Option<&TileGrid> {
        self.grids.iter().find(|g| g.sample_size == sample_size)
    }

    pub(crate) fn grid_mut(&mut self, sample_size: u32) -> Option<&mut TileGrid> {
        self.grids.iter_mut().find(|g| g.sample_size == sample_size)
    }

    pub(crate) fn iter_mut(&mut self) -> impl Iterator<Item = &mut TileGrid> {
        self.grids.iter_mut()
    }

    /// The coarsest sample size, whose grid is a single tile.
    #[must_use]
    pub fn max_sample_size(&self) -> Option<u32> {
        self.grids.last().map(TileGrid::sample_size)
    }

    /// `(sample_size, columns x rows)` per grid.
    #[must_use]
    pub fn grid_size_map(&self) -> SmallVec<[(u32, IntSize); 8]> {
        self.grids
            .iter()
            .map(|g| (g.sample_size, g.grid_size))
            .collect()
    }

    /// Compact description for logs, for example `[1:12x5,2:6x3,4:3x2]`.
    #[must_use]
    pub fn intro_string(&self) -> String {
        let mut out = String::from("[");
        for (i, grid) in self.grids.iter().enumerate() {
            if i > 0 {
                out.push(',');
            }
            let _ = write!(out, "{}:{}", grid.sample_size, grid.grid_size);
        }
        out.push(']');
        out
    }
}

/// Number of tiles along one axis and the source length of each.
///
/// The tile count is the smallest `n` with `ceil(ceil(len / n) / sample) <= max`,
/// which is `ceil(len / (max * sample))`.
fn split_axis(len: u32, max: u32, sample_size: u32) -> (u32, u32) {
    let max_source = u64::from(max) * u64::from(sample_size);
    let pieces = u64::from(len).div_ceil(max_source).max(1);
    let step = u64::from(len).div_ceil(pieces);
    let step = u32::try_from(step).unwrap_or(len).max(1);
    (len.div_ceil(step), step)
}

fn build_grid(image_size: IntSize, max_tile_size: IntSize, sample_size: u32) -> TileGrid {
    let (cols, step_x) = split_axis(image_size.width, max_tile_size.width, sample_size);
    let (rows, step_y) = split_axis(image_size.height, max_tile_size.height, sample_size);
    let mut tiles = Vec::with_capacity(cols as usize * rows as usize);
    for row in 0..rows {
        let y0 = row * step_y;
        let y1 = (y0 + step_y).min(image_size.height);
        for col in 0..cols {
            let x0 = col * step_x;
            let x1 = (x0 + step_x).min(image_size.width);
            tiles.push(Tile::new(
                TileCoordinate::new(col, row),
                IntRect::new(x0, y0, x1, y1),
                sample_size,
            ));
        }
    }
    TileGrid {
        sample_size,
        grid_size: IntSize::new(cols, rows),
        tiles,
    }
}

/// Builds the tile grids of `image_size` for tiles of at most `max_tile_size`.
///
/// Returns no grids when either size is empty. Building stops at the first
/// single-tile grid, and in any case once the sample size reaches the
/// largest image dimension.
#[must_use]
pub fn build_tile_grids(image_size: IntSize, max_tile_size: IntSize) -> TileGrids {
    if image_size.is_empty() || max_tile_size.is_empty() {
        return TileGrids::default();
    }
    let longest = image_size.width.max(image_size.height);
    let mut grids = Vec::new();
    let mut sample_size = 1_u32;
    loop {
        let grid = build_grid(image_size, max_tile_size, sample_size);
        let single = grid.len() == 1;
        grids.push(grid);
        if single || sample_size >= longest {
            break;
        }
        match sample_size.checked_mul(2) {
            Some(next) => sample_size = next,
            None => break,
        }
    }
    TileGrids { grids }
}

/// Picks the sample size for showing `image_size` as `content_size` at `scale`.
///
/// `scale` is the display scale of the content (base and user scale
/// combined). The result is the largest power of two whose downsampled image
/// still has at least as many pixels as the screen shows, so resolution never
/// drops below one image pixel per screen pixel. Callers clamp it to the
/// coarsest available grid.
#[must_use]
pub fn calculate_sample_size(image_size: IntSize, content_size: IntSize, scale: f64) -> u32 {
    if image_size.is_empty() || content_size.is_empty() || !(scale.is_finite() && scale > 0.0) {
        return 1;
    }
    let ratio = f64::from(image_size.width) / (f64::from(content_size.width) * scale);
    let mut sample_size = 1_u32;
    while ratio >= f64::from(sample_size) * 2.0 {
        match sample_size.checked_mul(2) {
            Some(next) => sample_size = next,
            None => break,
        }
    }
    sample_size
}

/// Maps the visible content rect into image space and grows it by `margin`.
///
/// The result is clamped to the image; tiles intersecting it are loaded.
/// Returns [`IntRect::ZERO`] if any input is empty.
#[must_use]
pub fn calculate_image_load_rect(
    image_size: IntSize,
    content_size: IntSize,
    margin: IntSize,
    content_visible_rect: IntRect,
) -> IntRect {
    if image_size.is_empty() || content_size.is_empty() || content_visible_rect.is_empty() {
        return IntRect::ZERO;
    }
    let sx = f64::from(image_size.width) / f64::from(content_size.width);
    let sy = f64::from(image_size.height) / f64::from(content_size.height);
    let visible = content_visible_rect.to_rect();
    let mapped = kurbo::Rect::new(
        visible.x0 * sx,
        visible.y0 * sy,
        visible.x1 * sx,
        visible.y1 * sy,
    );
    IntRect::from_rect_round_out(mapped)
        .intersect(image_size.to_rect())
        .expand_within(margin, image_size)
}

/// Default load margin: half a preferred tile, swapped for sideways content.
#[must_use]
pub fn default_load_margin(preferred_tile_size: IntSize, rotation: u32) -> IntSize {
    let margin = IntSize::new(preferred_tile_size.width / 2, preferred_tile_size.height / 2);
    if is_sideways(rotation) { margin.swapped() } else { margin }
}

/// Preferred (maximum) tile size for a container: half of it, rounded.
#[must_use]
pub fn calculate_preferred_tile_size(container_size: IntSize) -> IntSize {
    IntSize::new(
        round_to_u32(f64::from(container_size.width) / 2.0),
        round_to_u32(f64::from(container_size.height) / 2.0),
    )
}

/// Returns `true` if `new` should replace `old` as the preferred tile size.
///
/// Rebuilding grids discards every loaded tile, so only a first value or a
/// change of at least a factor of two along either axis is accepted.
#[must_use]
pub fn check_new_preferred_tile_size(old: IntSize, new: IntSize) -> bool {
    if new.is_empty() || old == new {
        return false;
    }
    if old.is_empty() {
        return true;
    }
    let changed = |a: u32, b: u32| {
        let (a, b) = (u64::from(a), u64::from(b));
        b >= a * 2 || a >= b * 2
    };
    changed(old.width, new.width) || changed(old.height, new.height)
}
