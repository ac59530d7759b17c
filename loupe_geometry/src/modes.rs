// Copyright 2025 the Loupe Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

use kurbo::{Size, Vec2};

use crate::ScaleFactor;

/// How content is scaled into its container before any user zoom applies.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ContentScale {
    /// Uniformly scale so the whole content fits inside the container.
    #[default]
    Fit,
    /// Uniformly scale so the content covers the whole container.
    Crop,
    /// Like [`ContentScale::Fit`], but never scale content up.
    Inside,
    /// Stretch each axis independently to exactly fill the container.
    FillBounds,
    /// Uniformly scale so the content width matches the container width.
    FillWidth,
    /// Uniformly scale so the content height matches the container height.
    FillHeight,
    /// Keep the intrinsic content size.
    None,
}

impl ContentScale {
    /// Computes the factor that maps `src` onto `dst` under this mode.
    ///
    /// Returns [`ScaleFactor::ONE`] when either size is empty.
    #[must_use]
    pub fn scale_factor(self, src: Size, dst: Size) -> ScaleFactor {
        if src.is_zero_area() || dst.is_zero_area() {
            return ScaleFactor::ONE;
        }
        let width_scale = dst.width / src.width;
        let height_scale = dst.height / src.height;
        match self {
            Self::Fit => ScaleFactor::uniform(width_scale.min(height_scale)),
            Self::Crop => ScaleFactor::uniform(width_scale.max(height_scale)),
            Self::Inside => {
                if src.width <= dst.width && src.height <= dst.height {
                    ScaleFactor::ONE
                } else {
                    ScaleFactor::uniform(width_scale.min(height_scale))
                }
            }
            Self::FillBounds => ScaleFactor::new(width_scale, height_scale),
            Self::FillWidth => ScaleFactor::uniform(width_scale),
            Self::FillHeight => ScaleFactor::uniform(height_scale),
            Self::None => ScaleFactor::ONE,
        }
    }

    /// Returns `true` if read mode can override this mode.
    ///
    /// Read mode fills one axis uniformly, which has no meaning when both axes
    /// are already stretched independently.
    #[must_use]
    pub fn supports_read_mode(self) -> bool {
        self != Self::FillBounds
    }
}

/// Horizontal placement of content that does not span the container.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum HorizontalAlign {
    /// Align to the left edge.
    Start,
    /// Center horizontally.
    #[default]
    Center,
    /// Align to the right edge.
    End,
}

/// Vertical placement of content that does not span the container.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum VerticalAlign {
    /// Align to the top edge.
    Top,
    /// Center vertically.
    #[default]
    Center,
    /// Align to the bottom edge.
    Bottom,
}

/// Placement of content inside its container on both axes.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Alignment {
    /// Horizontal placement.
    pub horizontal: HorizontalAlign,
    /// Vertical placement.
    pub vertical: VerticalAlign,
}

impl Alignment {
    /// Top left.
    pub const TOP_START: Self = Self::new(HorizontalAlign::Start, VerticalAlign::Top);
    /// Top center.
    pub const TOP_CENTER: Self = Self::new(HorizontalAlign::Center, VerticalAlign::Top);
    /// Top right.
    pub const TOP_END: Self = Self::new(HorizontalAlign::End, VerticalAlign::Top);
    /// Center left.
    pub const CENTER_START: Self = Self::new(HorizontalAlign::Start, VerticalAlign::Center);
    /// Centered on both axes.
    pub const CENTER: Self = Self::new(HorizontalAlign::Center, VerticalAlign::Center);
    /// Center right.
    pub const CENTER_END: Self = Self::new(HorizontalAlign::End, VerticalAlign::Center);
    /// Bottom left.
    pub const BOTTOM_START: Self = Self::new(HorizontalAlign::Start, VerticalAlign::Bottom);
    /// Bottom center.
    pub const BOTTOM_CENTER: Self = Self::new(HorizontalAlign::Center, VerticalAlign::Bottom);
    /// Bottom right.
    pub const BOTTOM_END: Self = Self::new(HorizontalAlign::End, VerticalAlign::Bottom);

    /// Creates an alignment from its two axes.
    #[must_use]
    pub const fn new(horizontal: HorizontalAlign, vertical: VerticalAlign) -> Self {
        Self {
            horizontal,
            vertical,
        }
    }

    /// Returns the offset that places a box of `size` inside `space`.
    ///
    /// The offset is negative on an axis where `size` exceeds `space`.
    #[must_use]
    pub fn align(self, size: Size, space: Size) -> Vec2 {
        let free_x = space.width - size.width;
        let free_y = space.height - size.height;
        let x = match self.horizontal {
            HorizontalAlign::Start => 0.0,
            HorizontalAlign::Center => free_x / 2.0,
            HorizontalAlign::End => free_x,
        };
        let y = match self.vertical {
            VerticalAlign::Top => 0.0,
            VerticalAlign::Center => free_y / 2.0,
            VerticalAlign::Bottom => free_y,
        };
        Vec2::new(x, y)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SRC: Size = Size::new(400.0, 200.0);
    const DST: Size = Size::new(100.0, 100.0);

    #[test]
    fn fit_and_crop_pick_min_and_max() {
        assert_eq!(
            ContentScale::Fit.scale_factor(SRC, DST),
            ScaleFactor::uniform(0.25),
            "fit uses the smaller axis ratio"
        );
        assert_eq!(
            ContentScale::Crop.scale_factor(SRC, DST),
            ScaleFactor::uniform(0.5),
            "crop uses the larger axis ratio"
        );
        assert_eq!(
            ContentScale::FillBounds.scale_factor(SRC, DST),
            ScaleFactor::new(0.25, 0.5),
            "fill bounds scales axes independently"
        );
    }

    #[test]
    fn inside_never_upscales() {
        let small = Size::new(50.0, 20.0);
        assert_eq!(
            ContentScale::Inside.scale_factor(small, DST),
            ScaleFactor::ONE,
            "content smaller than the container keeps its size"
        );
        assert_eq!(
            ContentScale::Inside.scale_factor(SRC, DST),
            ScaleFactor::uniform(0.25),
            "larger content shrinks like fit"
        );
    }

    #[test]
    fn empty_sizes_scale_by_one() {
        assert_eq!(
            ContentScale::Crop.scale_factor(Size::ZERO, DST),
            ScaleFactor::ONE,
            "empty content is not scaled"
        );
    }

    #[test]
    fn alignment_offsets() {
        let size = Size::new(40.0, 10.0);
        assert_eq!(Alignment::TOP_START.align(size, DST), Vec2::ZERO, "start is origin");
        assert_eq!(
            Alignment::CENTER.align(size, DST),
            Vec2::new(30.0, 45.0),
            "center splits free space"
        );
        assert_eq!(
            Alignment::BOTTOM_END.align(size, DST),
            Vec2::new(60.0, 90.0),
            "end takes all free space"
        );
    }
}
