// Copyright 2025 the Loupe Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

use smallvec::{SmallVec, smallvec};

use crate::rotation::rotate_size;
use crate::{ContentLayout, IntSize};

/// Policy for the medium (double tap) zoom level.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ScalesCalculator {
    /// Medium is the largest of the 1:1 original-pixel scale, `multiple`
    /// times the minimum, and the fill scale when read mode applies.
    Dynamic {
        /// Multiple of the minimum scale.
        multiple: f64,
    },
    /// Medium is always `multiple` times the minimum.
    Fixed {
        /// Multiple of the minimum scale.
        multiple: f64,
    },
}

impl ScalesCalculator {
    /// Default multiple of the minimum scale.
    pub const DEFAULT_MULTIPLE: f64 = 3.0;
}

impl Default for ScalesCalculator {
    fn default() -> Self {
        Self::Dynamic {
            multiple: Self::DEFAULT_MULTIPLE,
        }
    }
}

/// Minimum, medium and maximum user scale.
///
/// User scales are relative to the base transform: `1.0` shows the content
/// as fitted by its [`ContentScale`](crate::ContentScale).
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct UserScales {
    /// Smallest allowed scale.
    pub min: f64,
    /// Intermediate double tap target.
    pub medium: f64,
    /// Largest allowed scale.
    pub max: f64,
}

impl UserScales {
    /// All three scales at `1.0`; used while sizes are unknown.
    pub const ONE: Self = Self {
        min: 1.0,
        medium: 1.0,
        max: 1.0,
    };

    /// Clamps `scale` into `[min, max]`.
    #[must_use]
    pub fn clamp(&self, scale: f64) -> f64 {
        scale.clamp(self.min, self.max)
    }

    /// Step targets for double tap cycling.
    #[must_use]
    pub fn steps(&self, three_step: bool) -> SmallVec<[f64; 3]> {
        if three_step {
            smallvec![self.min, self.medium, self.max]
        } else {
            smallvec![self.min, self.medium]
        }
    }
}

impl Default for UserScales {
    fn default() -> Self {
        Self::ONE
    }
}

/// Computes the user scale range for `layout`.
///
/// `content_origin` is the full resolution size of the image behind the
/// displayed content; pass an empty size when it is unknown. `fill_medium`
/// asks for the fill scale to be considered for medium, which is what read
/// mode wants.
#[must_use]
pub fn compute_user_scales(
    layout: &ContentLayout,
    content_origin: IntSize,
    calculator: ScalesCalculator,
    fill_medium: bool,
) -> UserScales {
    if layout.is_empty() {
        return UserScales::ONE;
    }
    let base = layout.base_transform().scale;
    if base.x <= 0.0 || base.y <= 0.0 {
        return UserScales::ONE;
    }
    let rotated = layout.rotated_content().to_size();
    let container = layout.container.to_size();
    let min = 1.0;
    let medium = match calculator {
        ScalesCalculator::Fixed { multiple } => min * multiple,
        ScalesCalculator::Dynamic { multiple } => {
            let mut medium = min * multiple;
            if !content_origin.is_empty() {
                let origin = rotate_size(content_origin, layout.rotation).to_size();
                let origin_x = origin.width / rotated.width / base.x;
                let origin_y = origin.height / rotated.height / base.y;
                medium = medium.max(origin_x.max(origin_y));
            }
            if fill_medium {
                let fill = (container.width / rotated.width).max(container.height / rotated.height);
                medium = medium.max((fill / base.x).max(fill / base.y));
            }
            medium
        }
    };
    let medium = medium.max(min);
    let max = (medium * 2.0).max(min * 8.0);
    UserScales { min, medium, max }
}

/// Returns the step after `current` in `steps`, wrapping to the first.
///
/// Scales are compared at one decimal place with a `0.1` tolerance so a
/// scale that is only slightly above a step still counts as that step.
#[must_use]
pub fn calculate_next_step_scale(steps: &[f64], current: f64) -> f64 {
    const RANGE_OF_ERROR: f64 = 0.1;
    let Some(first) = steps.first() else {
        return current;
    };
    let current = format_decimals(current, 1);
    steps
        .iter()
        .copied()
        .find(|step| format_decimals(*step, 1) > current + RANGE_OF_ERROR)
        .unwrap_or(*first)
}

/// Default overscale ratio for rubber band zooming.
pub const RUBBER_BAND_SCALE_RATIO: f64 = 2.0;

/// Damps a scale change that leaves `[min, max]`.
///
/// Inside the range `target` is returned unchanged. Beyond it, the step from
/// `current` towards `target` shrinks the further past the limit the target
/// lies, reaching zero at `max * ratio` (or `min / ratio`).
#[must_use]
pub fn limit_scale_with_rubber_band(current: f64, target: f64, min: f64, max: f64, ratio: f64) -> f64 {
    let (limit, edge) = if target > max {
        (max * ratio, max)
    } else if target < min {
        (min / ratio, min)
    } else {
        return target;
    };
    let span = limit - edge;
    if span == 0.0 {
        return current;
    }
    let progress = ((target - edge) / span).clamp(0.0, 1.0);
    let damped = current + (target - current) * (1.0 - progress) * 0.5;
    let ratio = ratio.max(1.0);
    damped.clamp(min / ratio, max * ratio)
}

/// Pulls an offset beyond `[min, max]` back towards the range.
///
/// The overshoot follows `d * (1 - 1 / (x * 0.55 / d + 1))`, which grows with
/// the raw overshoot `x` but never reaches `limit` (`d`).
#[must_use]
pub fn limit_offset_with_rubber_band(target: f64, min: f64, max: f64, limit: f64) -> f64 {
    let resist = |over: f64| {
        if limit <= 0.0 {
            0.0
        } else {
            limit * (1.0 - 1.0 / (over * 0.55 / limit + 1.0))
        }
    };
    if target > max {
        max + resist(target - max)
    } else if target < min {
        min - resist(min - target)
    } else {
        target
    }
}

/// Rounds `value` to `decimals` decimal places, passing NaN through.
#[must_use]
pub fn format_decimals(value: f64, decimals: i32) -> f64 {
    if value.is_nan() {
        return value;
    }
    let multiplier = 10_f64.powi(decimals);
    (value * multiplier).round() / multiplier
}

#[cfg(test)]
mod tests {
    use super::*;

    fn layout() -> ContentLayout {
        // 1200x800 content fitted into a 600x600 container: base scale 0.5.
        ContentLayout::new(IntSize::new(600, 600), IntSize::new(1200, 800))
    }

    #[test]
    fn medium_is_origin_scale_when_larger() {
        // Full resolution is 12000x8000, ten times the displayed content. The
        // 1:1 user scale is 10 / 0.5 = 20.
        let scales = compute_user_scales(
            &layout(),
            IntSize::new(12000, 8000),
            ScalesCalculator::default(),
            false,
        );
        assert_eq!(scales.min, 1.0, "min is the fitted scale");
        assert!((scales.medium - 20.0).abs() < 1e-9, "medium reaches 1:1, got {}", scales.medium);
        assert!((scales.max - 40.0).abs() < 1e-9, "max doubles medium");
    }

    #[test]
    fn medium_falls_back_to_multiple() {
        let scales = compute_user_scales(&layout(), IntSize::ZERO, ScalesCalculator::default(), false);
        assert_eq!(scales.medium, 3.0, "multiple of min");
        assert_eq!(scales.max, 8.0, "8x min wins over 2x medium");
        let fixed = compute_user_scales(
            &layout(),
            IntSize::new(12000, 8000),
            ScalesCalculator::Fixed { multiple: 2.0 },
            false,
        );
        assert_eq!(fixed.medium, 2.0, "fixed ignores origin size");
    }

    #[test]
    fn fill_medium_considers_fill_scale() {
        let tall = ContentLayout::new(IntSize::new(1000, 500), IntSize::new(100, 1000));
        // Base fit scale 0.5; filling the width needs display scale 10, user 20.
        let scales = compute_user_scales(&tall, IntSize::ZERO, ScalesCalculator::default(), true);
        assert!((scales.medium - 20.0).abs() < 1e-9, "got {}", scales.medium);
    }

    #[test]
    fn empty_layout_is_all_ones() {
        let l = ContentLayout::new(IntSize::ZERO, IntSize::new(10, 10));
        assert_eq!(
            compute_user_scales(&l, IntSize::ZERO, ScalesCalculator::default(), false),
            UserScales::ONE,
            "unknown sizes do not zoom"
        );
    }

    #[test]
    fn next_step_cycles_and_wraps() {
        let steps = [1.0, 3.0, 9.0];
        assert_eq!(calculate_next_step_scale(&steps, 1.0), 3.0, "min goes to medium");
        assert_eq!(calculate_next_step_scale(&steps, 3.04), 9.0, "near medium goes to max");
        assert_eq!(calculate_next_step_scale(&steps, 9.0), 1.0, "max wraps to min");
        assert_eq!(calculate_next_step_scale(&steps, 5.0), 9.0, "between steps goes up");
        assert_eq!(calculate_next_step_scale(&[], 2.0), 2.0, "no steps keeps current");
    }

    #[test]
    fn rubber_band_scale_is_damped_past_max() {
        let s = limit_scale_with_rubber_band(4.0, 5.0, 1.0, 4.0, RUBBER_BAND_SCALE_RATIO);
        assert!(s > 4.0 && s < 5.0, "overscale is allowed but damped, got {s}");
        let inside = limit_scale_with_rubber_band(2.0, 3.0, 1.0, 4.0, RUBBER_BAND_SCALE_RATIO);
        assert_eq!(inside, 3.0, "in range is untouched");
        let below = limit_scale_with_rubber_band(1.0, 0.8, 1.0, 4.0, RUBBER_BAND_SCALE_RATIO);
        assert!(below < 1.0 && below > 0.8, "underscale is damped, got {below}");
    }

    #[test]
    fn rubber_band_offset_never_reaches_limit() {
        let v = limit_offset_with_rubber_band(10_000.0, 0.0, 100.0, 50.0);
        assert!(v > 100.0 && v < 150.0, "overshoot is bounded, got {v}");
        let v = limit_offset_with_rubber_band(-10.0, 0.0, 100.0, 50.0);
        assert!(v < 0.0 && v > -10.0, "small overshoot is damped, got {v}");
        assert_eq!(limit_offset_with_rubber_band(42.0, 0.0, 100.0, 50.0), 42.0, "in range");
    }

    #[test]
    fn format_rounds_half_away_from_zero() {
        assert_eq!(format_decimals(1.25, 1), 1.3, "one decimal");
        assert_eq!(format_decimals(0.5625, 2), 0.56, "two decimals");
        assert!(format_decimals(f64::NAN, 2).is_nan(), "NaN passes through");
    }
}
