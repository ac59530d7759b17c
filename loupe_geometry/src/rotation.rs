// Copyright 2025 the Loupe Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Quarter-turn rotation of content within its own bounds.
//!
//! Rotation is clockwise. A point of content with unrotated size `W x H` maps
//! into the rotated box (size `H x W` for 90 and 270 degrees) as follows:
//!
//! | degrees | rotated point  |
//! |---------|----------------|
//! | 90      | `(H - y, x)`   |
//! | 180     | `(W - x, H - y)` |
//! | 270     | `(y, W - x)`   |

use kurbo::{Affine, Point, Rect};

use crate::{IntRect, IntSize, round_to_u32};

/// Normalizes any angle to one of `0`, `90`, `180` or `270`.
///
/// Angles that are not a multiple of 90 are rounded to the nearest quarter turn.
#[must_use]
pub fn normalize_rotation(degrees: i32) -> u32 {
    let quarter_turns = (f64::from(degrees) / 90.0).round();
    let quarter_turns = quarter_turns.rem_euclid(4.0);
    round_to_u32(quarter_turns) % 4 * 90
}

/// Returns `true` if the rotation exchanges width and height.
#[must_use]
pub fn is_sideways(rotation: u32) -> bool {
    rotation % 180 == 90
}

/// Size of the content after rotation.
#[must_use]
pub fn rotate_size(size: IntSize, rotation: u32) -> IntSize {
    if is_sideways(rotation) {
        size.swapped()
    } else {
        size
    }
}

/// Maps a point of unrotated content into the rotated box.
#[must_use]
pub fn rotate_point_in_size(p: Point, size: IntSize, rotation: u32) -> Point {
    let (w, h) = (f64::from(size.width), f64::from(size.height));
    match rotation {
        90 => Point::new(h - p.y, p.x),
        180 => Point::new(w - p.x, h - p.y),
        270 => Point::new(p.y, w - p.x),
        _ => p,
    }
}

/// Maps a point of the rotated box back into unrotated content coordinates.
///
/// `size` is the unrotated content size.
#[must_use]
pub fn reverse_rotate_point_in_size(p: Point, size: IntSize, rotation: u32) -> Point {
    let (w, h) = (f64::from(size.width), f64::from(size.height));
    match rotation {
        90 => Point::new(p.y, h - p.x),
        180 => Point::new(w - p.x, h - p.y),
        270 => Point::new(w - p.y, p.x),
        _ => p,
    }
}

/// Maps a rectangle of the rotated box back into unrotated content coordinates.
#[must_use]
pub fn reverse_rotate_rect_in_size(rect: Rect, size: IntSize, rotation: u32) -> Rect {
    let a = reverse_rotate_point_in_size(rect.origin(), size, rotation);
    let b = reverse_rotate_point_in_size(Point::new(rect.x1, rect.y1), size, rotation);
    Rect::from_points(a, b)
}

/// Integer variant of [`reverse_rotate_rect_in_size`].
#[must_use]
pub fn reverse_rotate_int_rect_in_size(rect: IntRect, size: IntSize, rotation: u32) -> IntRect {
    IntRect::from_rect_round_out(reverse_rotate_rect_in_size(rect.to_rect(), size, rotation))
}

/// Affine map from unrotated content coordinates into the rotated box.
#[must_use]
pub fn quarter_turn_affine(rotation: u32, size: IntSize) -> Affine {
    let (w, h) = (f64::from(size.width), f64::from(size.height));
    match rotation {
        90 => Affine::new([0.0, 1.0, -1.0, 0.0, h, 0.0]),
        180 => Affine::new([-1.0, 0.0, 0.0, -1.0, w, h]),
        270 => Affine::new([0.0, -1.0, 1.0, 0.0, 0.0, w]),
        _ => Affine::IDENTITY,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SIZE: IntSize = IntSize::new(200, 100);

    #[test]
    fn normalize_handles_negative_and_off_grid_angles() {
        assert_eq!(normalize_rotation(0), 0, "zero stays");
        assert_eq!(normalize_rotation(450), 90, "wraps past a full turn");
        assert_eq!(normalize_rotation(-90), 270, "negative turns wrap");
        assert_eq!(normalize_rotation(100), 90, "rounds to nearest quarter");
        assert_eq!(normalize_rotation(360), 0, "full turn is zero");
    }

    #[test]
    fn rotate_and_reverse_are_inverse() {
        let p = Point::new(30.0, 20.0);
        for rotation in [0, 90, 180, 270] {
            let r = rotate_point_in_size(p, SIZE, rotation);
            let back = reverse_rotate_point_in_size(r, SIZE, rotation);
            assert!((back - p).hypot() < 1e-9, "rotation {rotation} should round trip");
        }
    }

    #[test]
    fn affine_matches_point_mapping() {
        let p = Point::new(30.0, 20.0);
        for rotation in [0, 90, 180, 270] {
            let by_affine = quarter_turn_affine(rotation, SIZE) * p;
            let by_fn = rotate_point_in_size(p, SIZE, rotation);
            assert!((by_affine - by_fn).hypot() < 1e-9, "rotation {rotation} mismatch");
        }
    }

    #[test]
    fn reverse_rect_for_quarter_turn() {
        // Top strip of the rotated 100x200 box is the left strip of the content.
        let rotated = Rect::new(0.0, 0.0, 100.0, 50.0);
        let r = reverse_rotate_rect_in_size(rotated, SIZE, 90);
        assert_eq!(r, Rect::new(0.0, 0.0, 50.0, 100.0), "got {r:?}");
        assert_eq!(rotate_size(SIZE, 270), IntSize::new(100, 200), "sideways swaps");
    }
}
