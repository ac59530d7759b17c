// Copyright 2025 the Loupe Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

use loupe_geometry::{Alignment, ContentScale, ReadMode, ScalesCalculator};

use crate::ZoomAnimationSpec;

/// Settings of a [`ZoomableEngine`](crate::ZoomableEngine).
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ZoomConfig {
    /// How content is fitted into the container at rest.
    pub content_scale: ContentScale,
    /// Where fitted content sits when it does not span the container.
    pub alignment: Alignment,
    /// Opens long images filled along their short side. `None` disables it.
    pub read_mode: Option<ReadMode>,
    /// Policy for the medium scale.
    pub scales_calculator: ScalesCalculator,
    /// Double tap cycles through min, medium and max instead of min and medium.
    pub three_step_scale: bool,
    /// Pinching may overshoot the scale range and springs back on release.
    pub rubber_band_scale: bool,
    /// Dragging may overshoot the offset bounds and springs back on release.
    pub rubber_band_offset: bool,
    /// Animated transitions.
    pub animation: ZoomAnimationSpec,
    /// Keep panning within the part of the content visible at rest.
    ///
    /// Only matters when content is cropped at rest, for example under
    /// [`ContentScale::Crop`]. When `false` the cropped parts can be panned
    /// into view.
    pub limit_offset_within_base_visible_rect: bool,
}

impl Default for ZoomConfig {
    fn default() -> Self {
        Self {
            content_scale: ContentScale::Fit,
            alignment: Alignment::CENTER,
            read_mode: None,
            scales_calculator: ScalesCalculator::default(),
            three_step_scale: false,
            rubber_band_scale: true,
            rubber_band_offset: true,
            animation: ZoomAnimationSpec::DEFAULT,
            limit_offset_within_base_visible_rect: false,
        }
    }
}

/// Keyboard commands understood by
/// [`ZoomableEngine::handle_key`](crate::ZoomableEngine::handle_key).
///
/// Move keys name the direction the viewport travels over the content.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ZoomKey {
    /// Zoom in by [`ZoomKey::SCALE_STEP`] about the container center.
    ZoomIn,
    /// Zoom out by [`ZoomKey::SCALE_STEP`] about the container center.
    ZoomOut,
    /// Reveal content above.
    MoveUp,
    /// Reveal content below.
    MoveDown,
    /// Reveal content to the left.
    MoveLeft,
    /// Reveal content to the right.
    MoveRight,
}

impl ZoomKey {
    /// Scale factor applied by one zoom key press.
    pub const SCALE_STEP: f64 = 1.5;
    /// Fraction of the container moved by one move key press.
    pub const MOVE_FRACTION: f64 = 0.1;
}

/// User transform in a form suitable for persisting across sessions.
///
/// Restore it into an engine showing the same content in a container of the
/// same size; otherwise it is clamped to the new limits.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SavedTransform {
    /// User scale.
    pub scale: f64,
    /// Horizontal user offset in container pixels.
    pub translation_x: f64,
    /// Vertical user offset in container pixels.
    pub translation_y: f64,
}

/// Which ends of the content are reached along one axis.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Edge {
    /// Both ends are out of view; scrolling either way is possible.
    #[default]
    None,
    /// The leading end (left or top) is in view.
    Start,
    /// The trailing end (right or bottom) is in view.
    End,
    /// The whole axis is in view.
    Both,
}

impl Edge {
    pub(crate) fn from_offset(offset: f64, min: f64, max: f64) -> Self {
        const TOLERANCE: f64 = 0.5;
        let start = offset >= max - TOLERANCE;
        let end = offset <= min + TOLERANCE;
        match (start, end) {
            (true, true) => Self::Both,
            (true, false) => Self::Start,
            (false, true) => Self::End,
            (false, false) => Self::None,
        }
    }
}

/// Scroll edges of both axes, as seen in the container.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct ScrollEdge {
    /// Left/right.
    pub horizontal: Edge,
    /// Top/bottom.
    pub vertical: Edge,
}

bitflags::bitflags! {
    /// What changed since the last
    /// [`ZoomableEngine::take_changes`](crate::ZoomableEngine::take_changes).
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    pub struct ZoomChanges: u8 {
        /// User transform.
        const TRANSFORM = 1 << 0;
        /// Minimum, medium or maximum scale.
        const SCALES = 1 << 1;
        /// Kind of in-flight transform change.
        const CONTINUOUS = 1 << 2;
        /// Container, content, rotation or configuration.
        const LAYOUT = 1 << 3;
    }
}

impl Default for ZoomChanges {
    fn default() -> Self {
        Self::empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn edges_follow_offset_bounds() {
        assert_eq!(Edge::from_offset(0.0, -500.0, 0.0), Edge::Start, "at max offset");
        assert_eq!(Edge::from_offset(-500.0, -500.0, 0.0), Edge::End, "at min offset");
        assert_eq!(Edge::from_offset(-250.0, -500.0, 0.0), Edge::None, "in between");
        assert_eq!(Edge::from_offset(-10.0, -10.0, -10.0), Edge::Both, "pinned axis");
    }

    #[test]
    fn default_config_springs_back() {
        let config = ZoomConfig::default();
        assert!(config.rubber_band_scale && config.rubber_band_offset, "rubber band on");
        assert!(config.read_mode.is_none(), "read mode is opt-in");
        assert!(!config.three_step_scale, "two step double tap");
    }
}
