// Copyright 2025 the Loupe Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

use core::fmt;

use kurbo::{Affine, Point, Size, Vec2};

use crate::rotation::quarter_turn_affine;
use crate::IntSize;

/// Per-axis scale. Both axes are equal except under
/// [`ContentScale::FillBounds`](crate::ContentScale::FillBounds).
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ScaleFactor {
    /// Horizontal scale.
    pub x: f64,
    /// Vertical scale.
    pub y: f64,
}

impl ScaleFactor {
    /// The identity scale.
    pub const ONE: Self = Self::new(1.0, 1.0);

    /// Creates a new scale factor.
    #[must_use]
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Creates a scale factor with the same value on both axes.
    #[must_use]
    pub const fn uniform(s: f64) -> Self {
        Self::new(s, s)
    }

    /// Multiplies both axes by `s`.
    #[must_use]
    pub fn times(self, s: f64) -> Self {
        Self::new(self.x * s, self.y * s)
    }

    /// Scales a size.
    #[must_use]
    pub fn apply(self, size: Size) -> Size {
        Size::new(size.width * self.x, size.height * self.y)
    }

    /// Linear interpolation towards `other`.
    #[must_use]
    pub fn lerp(self, other: Self, t: f64) -> Self {
        Self::new(
            self.x + (other.x - self.x) * t,
            self.y + (other.y - self.y) * t,
        )
    }
}

impl Default for ScaleFactor {
    fn default() -> Self {
        Self::ONE
    }
}

/// Scale, offset and quarter-turn rotation.
///
/// Points are rotated first (within the unrotated content size), then scaled,
/// then offset. The same type is used for the base transform that places
/// content in its container, for the user transform layered on top of it,
/// and for the combined display transform.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Transform {
    /// Scale applied after rotation.
    pub scale: ScaleFactor,
    /// Offset applied after scaling.
    pub offset: Vec2,
    /// Clockwise rotation in degrees. Always a multiple of 90 in `0..360`.
    pub rotation: u32,
}

impl Transform {
    /// The identity transform.
    pub const IDENTITY: Self = Self {
        scale: ScaleFactor::ONE,
        offset: Vec2::ZERO,
        rotation: 0,
    };

    /// Creates a transform without rotation.
    #[must_use]
    pub const fn new(scale: ScaleFactor, offset: Vec2) -> Self {
        Self {
            scale,
            offset,
            rotation: 0,
        }
    }

    /// Returns the transform with its rotation replaced.
    #[must_use]
    pub fn with_rotation(mut self, degrees: i32) -> Self {
        self.rotation = crate::normalize_rotation(degrees);
        self
    }

    /// Maps a point given in the post-rotation space.
    #[must_use]
    pub fn apply_rotated(&self, p: Point) -> Point {
        Point::new(
            p.x * self.scale.x + self.offset.x,
            p.y * self.scale.y + self.offset.y,
        )
    }

    /// Inverse of [`Transform::apply_rotated`].
    ///
    /// A zero scale axis maps everything to the origin on that axis.
    #[must_use]
    pub fn invert_rotated(&self, p: Point) -> Point {
        let inv = |v: f64, o: f64, s: f64| if s == 0.0 { 0.0 } else { (v - o) / s };
        Point::new(
            inv(p.x, self.offset.x, self.scale.x),
            inv(p.y, self.offset.y, self.scale.y),
        )
    }

    /// Layers `self` on top of `inner`: the result applies `inner` first.
    ///
    /// The rotation of the result is the rotation of `inner`; rotation only
    /// happens at the content level.
    #[must_use]
    pub fn after(&self, inner: &Self) -> Self {
        Self {
            scale: ScaleFactor::new(inner.scale.x * self.scale.x, inner.scale.y * self.scale.y),
            offset: Vec2::new(
                inner.offset.x * self.scale.x + self.offset.x,
                inner.offset.y * self.scale.y + self.offset.y,
            ),
            rotation: inner.rotation,
        }
    }

    /// Builds the full affine map for content of `content_size` (unrotated).
    #[must_use]
    pub fn to_affine(&self, content_size: IntSize) -> Affine {
        Affine::translate(self.offset)
            * Affine::scale_non_uniform(self.scale.x, self.scale.y)
            * quarter_turn_affine(self.rotation, content_size)
    }

    /// Linear interpolation of scale and offset towards `other`.
    ///
    /// The rotation of `self` is kept.
    #[must_use]
    pub fn lerp(&self, other: &Self, t: f64) -> Self {
        Self {
            scale: self.scale.lerp(other.scale, t),
            offset: self.offset.lerp(other.offset, t),
            rotation: self.rotation,
        }
    }
}

impl Default for Transform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl fmt::Display for Transform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "(scale={:.2}x{:.2}, offset={:.1}x{:.1}, rotation={})",
            self.scale.x, self.scale.y, self.offset.x, self.offset.y, self.rotation
        )
    }
}
