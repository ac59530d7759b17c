// Copyright 2025 the Loupe Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

use kurbo::{Size, Vec2};

use crate::{ContentLayout, HorizontalAlign, IntSize, ScaleFactor, Transform, VerticalAlign, format_decimals};

/// Which content orientations read mode applies to.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum AcceptedSizeType {
    /// Both wide and tall content.
    #[default]
    Both,
    /// Only content wider than it is tall.
    OnlyHorizontal,
    /// Only content taller than it is wide.
    OnlyVertical,
}

/// Decides whether content is "long" enough to be read rather than viewed.
///
/// Content is first scaled to fill the container. If the filled content then
/// extends past the container by at least the configured multiple, it is a
/// long image. Content whose orientation differs from the container's must
/// be longer to qualify.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct LongImageDecider {
    /// Minimum overflow multiple when content and container share orientation.
    pub same_direction_multiple: f64,
    /// Minimum overflow multiple when their orientations differ.
    pub not_same_direction_multiple: f64,
}

impl LongImageDecider {
    /// Returns `true` if `content` should open in read mode inside `container`.
    #[must_use]
    pub fn should(&self, content: IntSize, container: IntSize) -> bool {
        if content.is_empty() || container.is_empty() {
            return false;
        }
        let (content, container) = (content.to_size(), container.to_size());
        let fill_scale = (container.width / content.width).max(container.height / content.height);
        let filled = ScaleFactor::uniform(fill_scale).apply(content);
        let multiple = (filled.width / container.width).max(filled.height / container.height);
        let min_multiple = if is_same_direction(content, container) {
            self.same_direction_multiple
        } else {
            self.not_same_direction_multiple
        };
        format_decimals(multiple, 1) >= format_decimals(min_multiple, 1)
    }
}

impl Default for LongImageDecider {
    fn default() -> Self {
        Self {
            same_direction_multiple: 2.5,
            not_same_direction_multiple: 5.0,
        }
    }
}

fn is_same_direction(src: Size, dst: Size) -> bool {
    let src_ratio = format_decimals(src.width / src.height, 2);
    let dst_ratio = format_decimals(dst.width / dst.height, 2);
    src_ratio == 1.0
        || dst_ratio == 1.0
        || (src_ratio > 1.0 && dst_ratio > 1.0)
        || (src_ratio < 1.0 && dst_ratio < 1.0)
}

/// Opens long images filled along their short side, starting at the beginning.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ReadMode {
    /// Orientations read mode applies to.
    pub accepted: AcceptedSizeType,
    /// Long image test.
    pub decider: LongImageDecider,
}

impl ReadMode {
    /// Returns `true` if read mode applies to `content` in `container`.
    ///
    /// `content` should already be rotated.
    #[must_use]
    pub fn accept(&self, content: IntSize, container: IntSize) -> bool {
        let orientation_matches = match self.accepted {
            AcceptedSizeType::Both => true,
            AcceptedSizeType::OnlyHorizontal => content.width > content.height,
            AcceptedSizeType::OnlyVertical => content.width < content.height,
        };
        orientation_matches && self.decider.should(content, container)
    }
}

/// Display transform of content opened in read mode.
///
/// The rotated content is scaled uniformly to fill the container. Along the
/// axis that overflows, content starts at the leading edge unless the
/// alignment is trailing. The other axis follows the layout's alignment.
#[must_use]
pub fn compute_read_mode_transform(layout: &ContentLayout) -> Transform {
    if layout.is_empty() {
        return layout.base_transform();
    }
    let rotated = layout.rotated_content().to_size();
    let container = layout.container.to_size();
    let fill = (container.width / rotated.width).max(container.height / rotated.height);
    let filled = ScaleFactor::uniform(fill).apply(rotated);
    let aligned = layout.alignment.align(filled, container);
    let x = if filled.width > container.width {
        match layout.alignment.horizontal {
            HorizontalAlign::End => container.width - filled.width,
            _ => 0.0,
        }
    } else {
        aligned.x
    };
    let y = if filled.height > container.height {
        match layout.alignment.vertical {
            VerticalAlign::Bottom => container.height - filled.height,
            _ => 0.0,
        }
    } else {
        aligned.y
    };
    Transform {
        scale: ScaleFactor::uniform(fill),
        offset: Vec2::new(x, y),
        rotation: layout.rotation,
    }
}

/// User transform that, layered on the base transform, yields
/// [`compute_read_mode_transform`].
#[must_use]
pub fn compute_read_mode_user_transform(layout: &ContentLayout) -> Transform {
    let base = layout.base_transform();
    let read = compute_read_mode_transform(layout);
    if base.scale.x == 0.0 {
        return Transform::IDENTITY;
    }
    let scale = read.scale.x / base.scale.x;
    Transform::new(ScaleFactor::uniform(scale), read.offset - base.offset * scale)
}

#[cfg(test)]
mod tests {
    use super::*;

    const PHONE: IntSize = IntSize::new(1080, 1920);

    #[test]
    fn long_vertical_image_is_accepted() {
        let decider = LongImageDecider::default();
        // 500x10000 fills width to 1080x21600, 11.25x the container height.
        assert!(decider.should(IntSize::new(500, 10000), PHONE), "very tall image is long");
        assert!(!decider.should(IntSize::new(1000, 1500), PHONE), "ordinary photo is not long");
    }

    #[test]
    fn cross_direction_needs_larger_multiple() {
        let decider = LongImageDecider::default();
        // Wide 8000x1000 in a tall container: fill height gives 15360 wide, 14.2x.
        assert!(decider.should(IntSize::new(8000, 1000), PHONE), "panorama is long");
        // 3000x1000 fills to 5760 wide, 5.3x: just over the cross-direction multiple.
        assert!(decider.should(IntSize::new(3000, 1000), PHONE), "5.3x passes 5.0");
        // 2400x1000 fills to 4608 wide, 4.3x.
        assert!(!decider.should(IntSize::new(2400, 1000), PHONE), "4.3x fails 5.0");
    }

    #[test]
    fn accepted_size_type_filters_orientation() {
        let mode = ReadMode {
            accepted: AcceptedSizeType::OnlyHorizontal,
            ..ReadMode::default()
        };
        assert!(!mode.accept(IntSize::new(500, 10000), PHONE), "tall content rejected");
    }

    #[test]
    fn read_mode_fills_width_and_starts_at_top() {
        let layout = ContentLayout::new(PHONE, IntSize::new(540, 9600));
        let t = compute_read_mode_transform(&layout);
        assert_eq!(t.scale, ScaleFactor::uniform(2.0), "fills the width");
        assert_eq!(t.offset, Vec2::ZERO, "starts at the top");

        let user = compute_read_mode_user_transform(&layout);
        let display = user.after(&layout.base_transform());
        assert!((display.scale.x - 2.0).abs() < 1e-9, "user transform reproduces the read scale");
        assert!(display.offset.hypot() < 1e-9, "user transform reproduces the read offset");
    }
}
