// Copyright 2025 the Loupe Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

use core::fmt;

use kurbo::{Rect, Size};

/// Size in whole pixels.
///
/// Used for image, content and container dimensions. A size with either
/// dimension equal to zero is considered empty, and every computation in this
/// workspace treats an empty size as "not known yet".
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct IntSize {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl IntSize {
    /// The empty size.
    pub const ZERO: Self = Self::new(0, 0);

    /// Creates a new size.
    #[must_use]
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Returns `true` if either dimension is zero.
    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Returns the size with width and height exchanged.
    #[must_use]
    pub const fn swapped(self) -> Self {
        Self::new(self.height, self.width)
    }

    /// Returns the number of pixels covered by this size.
    #[must_use]
    pub const fn area(self) -> u64 {
        self.width as u64 * self.height as u64
    }

    /// Width divided by height, or `0.0` for an empty size.
    #[must_use]
    pub fn aspect_ratio(self) -> f64 {
        if self.is_empty() {
            return 0.0;
        }
        f64::from(self.width) / f64::from(self.height)
    }

    /// Converts to a floating point [`Size`].
    #[must_use]
    pub fn to_size(self) -> Size {
        Size::new(f64::from(self.width), f64::from(self.height))
    }

    /// Rounds a floating point size to whole pixels.
    ///
    /// Negative and non-finite dimensions become zero.
    #[must_use]
    pub fn from_size_round(size: Size) -> Self {
        Self::new(round_to_u32(size.width), round_to_u32(size.height))
    }

    /// Returns the rectangle at the origin covering this size.
    #[must_use]
    pub const fn to_rect(self) -> IntRect {
        IntRect::new(0, 0, self.width, self.height)
    }
}

impl fmt::Display for IntSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Axis-aligned rectangle in whole pixels.
///
/// The rectangle is half open: it covers `x0..x1` horizontally and `y0..y1`
/// vertically. Constructors normalize the corners so that `x0 <= x1` and
/// `y0 <= y1` always hold.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct IntRect {
    /// Left edge.
    pub x0: u32,
    /// Top edge.
    pub y0: u32,
    /// Right edge (exclusive).
    pub x1: u32,
    /// Bottom edge (exclusive).
    pub y1: u32,
}

impl IntRect {
    /// The empty rectangle at the origin.
    pub const ZERO: Self = Self::new(0, 0, 0, 0);

    /// Creates a new rectangle from two corners.
    #[must_use]
    pub const fn new(x0: u32, y0: u32, x1: u32, y1: u32) -> Self {
        let (x0, x1) = if x0 <= x1 { (x0, x1) } else { (x1, x0) };
        let (y0, y1) = if y0 <= y1 { (y0, y1) } else { (y1, y0) };
        Self { x0, y0, x1, y1 }
    }

    /// Width of the rectangle.
    #[must_use]
    pub const fn width(self) -> u32 {
        self.x1 - self.x0
    }

    /// Height of the rectangle.
    #[must_use]
    pub const fn height(self) -> u32 {
        self.y1 - self.y0
    }

    /// Size of the rectangle.
    #[must_use]
    pub const fn size(self) -> IntSize {
        IntSize::new(self.width(), self.height())
    }

    /// Returns `true` if the rectangle covers no pixels.
    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.x0 >= self.x1 || self.y0 >= self.y1
    }

    /// Returns `true` if the two rectangles share at least one pixel.
    ///
    /// Rectangles that only touch along an edge do not intersect.
    #[must_use]
    pub const fn intersects(self, other: Self) -> bool {
        self.x0 < other.x1 && other.x0 < self.x1 && self.y0 < other.y1 && other.y0 < self.y1
    }

    /// Returns `true` if `other` lies entirely within this rectangle.
    #[must_use]
    pub const fn contains_rect(self, other: Self) -> bool {
        other.x0 >= self.x0 && other.y0 >= self.y0 && other.x1 <= self.x1 && other.y1 <= self.y1
    }

    /// Returns the overlapping region, or [`IntRect::ZERO`] when disjoint.
    #[must_use]
    pub fn intersect(self, other: Self) -> Self {
        if !self.intersects(other) {
            return Self::ZERO;
        }
        Self::new(
            self.x0.max(other.x0),
            self.y0.max(other.y0),
            self.x1.min(other.x1),
            self.y1.min(other.y1),
        )
    }

    /// Returns the smallest rectangle containing both rectangles.
    ///
    /// Empty rectangles do not contribute to the union.
    #[must_use]
    pub fn union(self, other: Self) -> Self {
        if self.is_empty() {
            return other;
        }
        if other.is_empty() {
            return self;
        }
        Self::new(
            self.x0.min(other.x0),
            self.y0.min(other.y0),
            self.x1.max(other.x1),
            self.y1.max(other.y1),
        )
    }

    /// Grows the rectangle by `margin` on every side, then clamps it to `bounds`.
    #[must_use]
    pub fn expand_within(self, margin: IntSize, bounds: IntSize) -> Self {
        Self::new(
            self.x0.saturating_sub(margin.width),
            self.y0.saturating_sub(margin.height),
            self.x1.saturating_add(margin.width).min(bounds.width),
            self.y1.saturating_add(margin.height).min(bounds.height),
        )
    }

    /// Converts to a floating point [`Rect`].
    #[must_use]
    pub fn to_rect(self) -> Rect {
        Rect::new(
            f64::from(self.x0),
            f64::from(self.y0),
            f64::from(self.x1),
            f64::from(self.y1),
        )
    }

    /// Converts a floating point rectangle to the smallest integer rectangle
    /// containing it. Negative coordinates are clamped to zero.
    #[must_use]
    pub fn from_rect_round_out(rect: Rect) -> Self {
        let rect = rect.abs().expand();
        Self::new(
            round_to_u32(rect.x0),
            round_to_u32(rect.y0),
            round_to_u32(rect.x1),
            round_to_u32(rect.y1),
        )
    }
}

impl fmt::Display for IntRect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{},{},{},{}]", self.x0, self.y0, self.x1, self.y1)
    }
}

/// Rounds to the nearest non-negative `u32`, saturating at the ends of the range.
#[must_use]
#[expect(
    clippy::cast_possible_truncation,
    reason = "value is checked to be finite and within u32 range"
)]
pub fn round_to_u32(value: f64) -> u32 {
    if !value.is_finite() || value <= 0.0 {
        return 0;
    }
    let rounded = value.round();
    if rounded >= f64::from(u32::MAX) {
        u32::MAX
    } else {
        rounded as u32
    }
}
