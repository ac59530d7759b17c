// Copyright 2025 the Loupe Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Time-driven motion: eased transform tweens and fling decay.
//!
//! Nothing here owns a clock. The engine feeds elapsed time in through
//! `advance`, so hosts can drive animations from their frame callback and
//! tests can step them deterministically.

use core::time::Duration;

use kurbo::Vec2;
use loupe_geometry::Transform;

/// Progress curve of an animation.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub enum Easing {
    /// Constant speed.
    Linear,
    /// Standard ease.
    Ease,
    /// Slow start.
    EaseIn,
    /// Slow end.
    EaseOut,
    /// Slow start and end.
    EaseInOut,
    /// Quick start, long gentle landing. Suits zoom transitions.
    #[default]
    FastOutSlowIn,
    /// Cubic Bézier through `(0, 0)`, `(x1, y1)`, `(x2, y2)`, `(1, 1)`.
    CubicBezier(f64, f64, f64, f64),
}

impl Easing {
    /// Maps linear progress `t` in `0..=1` to eased progress.
    #[must_use]
    pub fn evaluate(self, t: f64) -> f64 {
        let t = t.clamp(0.0, 1.0);
        match self {
            Self::Linear => t,
            Self::Ease => cubic_bezier(0.25, 0.1, 0.25, 1.0, t),
            Self::EaseIn => cubic_bezier(0.42, 0.0, 1.0, 1.0, t),
            Self::EaseOut => cubic_bezier(0.0, 0.0, 0.58, 1.0, t),
            Self::EaseInOut => cubic_bezier(0.42, 0.0, 0.58, 1.0, t),
            Self::FastOutSlowIn => cubic_bezier(0.4, 0.0, 0.2, 1.0, t),
            Self::CubicBezier(x1, y1, x2, y2) => cubic_bezier(x1, y1, x2, y2, t),
        }
    }
}

/// Solves the curve for `x = t` with Newton steps, then samples `y`.
fn cubic_bezier(x1: f64, y1: f64, x2: f64, y2: f64, t: f64) -> f64 {
    if t <= 0.0 || t >= 1.0 {
        return t;
    }
    let mut guess = t;
    for _ in 0..8 {
        let x = bezier_sample(x1, x2, guess) - t;
        if x.abs() < 1e-7 {
            break;
        }
        let dx = bezier_derivative(x1, x2, guess);
        if dx.abs() < 1e-6 {
            break;
        }
        guess = (guess - x / dx).clamp(0.0, 1.0);
    }
    bezier_sample(y1, y2, guess)
}

fn bezier_sample(p1: f64, p2: f64, t: f64) -> f64 {
    let mt = 1.0 - t;
    3.0 * mt * mt * t * p1 + 3.0 * mt * t * t * p2 + t * t * t
}

fn bezier_derivative(p1: f64, p2: f64, t: f64) -> f64 {
    let mt = 1.0 - t;
    3.0 * mt * mt * p1 + 6.0 * mt * t * (p2 - p1) + 3.0 * t * t * (1.0 - p2)
}

/// Duration and curve of animated zoom transitions.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ZoomAnimationSpec {
    /// Length of a transition. Zero jumps straight to the target.
    pub duration: Duration,
    /// Progress curve.
    pub easing: Easing,
}

impl ZoomAnimationSpec {
    /// 300 ms with [`Easing::FastOutSlowIn`].
    pub const DEFAULT: Self = Self {
        duration: Duration::from_millis(300),
        easing: Easing::FastOutSlowIn,
    };

    /// Transitions that complete immediately.
    pub const NONE: Self = Self {
        duration: Duration::ZERO,
        easing: Easing::Linear,
    };
}

impl Default for ZoomAnimationSpec {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Eased interpolation between two user transforms.
#[derive(Clone, Copy, Debug)]
pub(crate) struct TransformTween {
    from: Transform,
    to: Transform,
    elapsed: Duration,
    spec: ZoomAnimationSpec,
}

impl TransformTween {
    pub(crate) fn new(from: Transform, to: Transform, spec: ZoomAnimationSpec) -> Self {
        Self {
            from,
            to,
            elapsed: Duration::ZERO,
            spec,
        }
    }

    pub(crate) fn target(&self) -> Transform {
        self.to
    }

    /// Steps the tween and returns the current value and whether it ended.
    pub(crate) fn advance(&mut self, dt: Duration) -> (Transform, bool) {
        self.elapsed = self.elapsed.saturating_add(dt);
        if self.spec.duration.is_zero() || self.elapsed >= self.spec.duration {
            return (self.to, true);
        }
        let t = self.elapsed.as_secs_f64() / self.spec.duration.as_secs_f64();
        (self.from.lerp(&self.to, self.spec.easing.evaluate(t)), false)
    }
}

/// Exponentially decaying pan velocity after a drag is released.
///
/// Velocity decays as `v(t) = v0 * e^(-damping * t)`. Each step moves by the
/// integral of the velocity over the step, so the total distance does not
/// depend on how time is sliced.
#[derive(Clone, Copy, Debug)]
pub(crate) struct FlingDecay {
    velocity: Vec2,
    damping: f64,
}

impl FlingDecay {
    /// Velocity damping per second.
    pub(crate) const DAMPING: f64 = 7.5;
    /// Speed in pixels per second below which the fling stops.
    pub(crate) const REST_SPEED: f64 = 20.0;

    pub(crate) fn new(velocity: Vec2) -> Self {
        Self {
            velocity,
            damping: Self::DAMPING,
        }
    }

    /// Returns the displacement over `dt` and decays the velocity.
    pub(crate) fn advance(&mut self, dt: Duration) -> Vec2 {
        let dt = dt.as_secs_f64();
        let attenuation = (-self.damping * dt).exp();
        let gain = if self.damping <= f64::EPSILON {
            dt
        } else {
            (1.0 - attenuation) / self.damping
        };
        let delta = self.velocity * gain;
        self.velocity *= attenuation;
        delta
    }

    /// Stops motion along the given axes, for example at a bound.
    pub(crate) fn halt(&mut self, x: bool, y: bool) {
        if x {
            self.velocity.x = 0.0;
        }
        if y {
            self.velocity.y = 0.0;
        }
    }

    pub(crate) fn is_settled(&self) -> bool {
        self.velocity.hypot() < Self::REST_SPEED
    }

    /// Total distance still to travel if left to run forever.
    pub(crate) fn remaining_distance(&self) -> Vec2 {
        self.velocity / self.damping
    }
}
