// Copyright 2025 the Loupe Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

use kurbo::{Point, Rect, Size, Vec2};

use crate::rotation::{
    reverse_rotate_point_in_size, reverse_rotate_rect_in_size, rotate_point_in_size, rotate_size,
};
use crate::{Alignment, ContentScale, HorizontalAlign, IntRect, IntSize, Transform, VerticalAlign};

/// Placement of content inside a container.
///
/// `ContentLayout` answers every question that depends on the container,
/// the content and how the content is fitted, but not on user zoom: the base
/// transform, where the content sits at rest, and how a user transform layered
/// on top maps container space back to content space.
///
/// All content coordinates are unrotated content pixels. Container coordinates
/// are view pixels with the origin at the top left.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ContentLayout {
    /// Size of the viewport.
    pub container: IntSize,
    /// Size of the displayed content, before rotation.
    pub content: IntSize,
    /// How the content is fitted into the container.
    pub content_scale: ContentScale,
    /// Where fitted content sits when it does not span the container.
    pub alignment: Alignment,
    /// Clockwise rotation in degrees, one of `0`, `90`, `180` or `270`.
    pub rotation: u32,
}

impl ContentLayout {
    /// Creates a layout with default fitting and no rotation.
    #[must_use]
    pub fn new(container: IntSize, content: IntSize) -> Self {
        Self {
            container,
            content,
            content_scale: ContentScale::default(),
            alignment: Alignment::default(),
            rotation: 0,
        }
    }

    /// Returns `true` if the container or the content has no area.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.container.is_empty() || self.content.is_empty()
    }

    /// Content size after rotation.
    #[must_use]
    pub fn rotated_content(&self) -> IntSize {
        rotate_size(self.content, self.rotation)
    }

    /// Transform that fits the rotated content into the container.
    #[must_use]
    pub fn base_transform(&self) -> Transform {
        if self.is_empty() {
            return Transform {
                rotation: self.rotation,
                ..Transform::IDENTITY
            };
        }
        let rotated = self.rotated_content().to_size();
        let container = self.container.to_size();
        let scale = self.content_scale.scale_factor(rotated, container);
        let offset = self.alignment.align(scale.apply(rotated), container);
        Transform {
            scale,
            offset,
            rotation: self.rotation,
        }
    }

    /// Rectangle covered by the content at rest, in container coordinates.
    ///
    /// May extend past the container, for example under [`ContentScale::Crop`].
    #[must_use]
    pub fn base_display_rect(&self) -> Rect {
        if self.is_empty() {
            return Rect::ZERO;
        }
        let base = self.base_transform();
        let size = base.scale.apply(self.rotated_content().to_size());
        Rect::from_origin_size(base.offset.to_point(), size)
    }

    /// [`ContentLayout::base_display_rect`] clipped to the container.
    #[must_use]
    pub fn base_visible_rect(&self) -> Rect {
        self.base_display_rect()
            .intersect(self.container.to_rect().to_rect())
    }

    /// Range of user offsets that keep content in view at `user_scale`.
    ///
    /// The returned rect holds the minimum offset in `x0`/`y0` and the
    /// maximum in `x1`/`y1`. On an axis where the scaled content is narrower
    /// than the container the range collapses to the single offset that keeps
    /// the content aligned.
    #[must_use]
    pub fn user_offset_bounds(&self, user_scale: f64) -> Rect {
        self.user_offset_bounds_within(user_scale, true)
    }

    /// Like [`ContentLayout::user_offset_bounds`], choosing which rest rect
    /// must stay in view.
    ///
    /// With `visible_only` the bounds keep [`ContentLayout::base_visible_rect`]
    /// in view. Otherwise they keep the whole
    /// [`ContentLayout::base_display_rect`] reachable, so content cropped at
    /// rest can be panned into view.
    #[must_use]
    pub fn user_offset_bounds_within(&self, user_scale: f64, visible_only: bool) -> Rect {
        if self.is_empty() {
            return Rect::ZERO;
        }
        let container = self.container.to_size();
        let inner = if visible_only {
            self.base_visible_rect()
        } else {
            self.base_display_rect()
        };
        let scaled = Rect::new(
            inner.x0 * user_scale,
            inner.y0 * user_scale,
            inner.x1 * user_scale,
            inner.y1 * user_scale,
        );
        let (min_x, max_x) = if scaled.width() > container.width {
            (container.width - scaled.x1, -scaled.x0)
        } else {
            let x = match self.alignment.horizontal {
                HorizontalAlign::Start => 0.0,
                HorizontalAlign::Center => -(container.width * user_scale - container.width) / 2.0,
                HorizontalAlign::End => -(container.width * user_scale - container.width),
            };
            (x, x)
        };
        let (min_y, max_y) = if scaled.height() > container.height {
            (container.height - scaled.y1, -scaled.y0)
        } else {
            let y = match self.alignment.vertical {
                VerticalAlign::Top => 0.0,
                VerticalAlign::Center => -(container.height * user_scale - container.height) / 2.0,
                VerticalAlign::Bottom => -(container.height * user_scale - container.height),
            };
            (y, y)
        };
        Rect::new(min_x, min_y, max_x, max_y)
    }

    /// Region of the content visible through the container under `user`.
    ///
    /// The result is in unrotated content pixels, rounded outward and clamped
    /// to the content bounds. It is empty when nothing is visible.
    #[must_use]
    pub fn content_visible_rect(&self, user: &Transform) -> IntRect {
        if self.is_empty() || user.scale.x <= 0.0 || user.scale.y <= 0.0 {
            return IntRect::ZERO;
        }
        let container = self.container.to_size();
        let in_base = Rect::from_points(
            user.invert_rotated(Point::ORIGIN),
            user.invert_rotated(Point::new(container.width, container.height)),
        );
        let visible = in_base.intersect(self.base_display_rect());
        if visible.is_zero_area() {
            return IntRect::ZERO;
        }
        let base = self.base_transform();
        let rotated = self.rotated_content();
        let in_rotated = Rect::from_points(
            base.invert_rotated(visible.origin()),
            base.invert_rotated(Point::new(visible.x1, visible.y1)),
        )
        .intersect(rotated.to_rect().to_rect());
        if in_rotated.is_zero_area() {
            return IntRect::ZERO;
        }
        let content = reverse_rotate_rect_in_size(in_rotated, self.content, self.rotation);
        IntRect::from_rect_round_out(content).intersect(self.content.to_rect())
    }

    /// Maps a container point to unrotated content coordinates under `user`.
    #[must_use]
    pub fn container_to_content_point(&self, user: &Transform, p: Point) -> Point {
        let base = self.base_transform();
        let in_rotated = base.invert_rotated(user.invert_rotated(p));
        reverse_rotate_point_in_size(in_rotated, self.content, self.rotation)
    }

    /// Maps an unrotated content point to container coordinates under `user`.
    #[must_use]
    pub fn content_to_container_point(&self, user: &Transform, p: Point) -> Point {
        let base = self.base_transform();
        let rotated = rotate_point_in_size(p, self.content, self.rotation);
        user.apply_rotated(base.apply_rotated(rotated))
    }

    /// User offset that keeps the content under `centroid` fixed while the
    /// user scale changes from `user.scale.x` to `new_scale`.
    #[must_use]
    pub fn offset_for_scale_about(&self, user: &Transform, new_scale: f64, centroid: Point) -> Vec2 {
        let old_scale = user.scale.x;
        if old_scale == 0.0 {
            return user.offset;
        }
        let c = centroid.to_vec2();
        c - (c - user.offset) * (new_scale / old_scale)
    }

    /// User offset that centers the content point `content_point` in the
    /// container at `user_scale`, before clamping.
    #[must_use]
    pub fn offset_to_center(&self, content_point: Point, user_scale: f64) -> Vec2 {
        let base = self.base_transform();
        let rotated = rotate_point_in_size(content_point, self.content, self.rotation);
        let at_rest = base.apply_rotated(rotated).to_vec2();
        let center = Size::new(
            f64::from(self.container.width) / 2.0,
            f64::from(self.container.height) / 2.0,
        );
        Vec2::new(center.width, center.height) - at_rest * user_scale
    }
}

/// Clamps an offset into a rectangle of allowed offsets.
#[must_use]
pub fn clamp_offset(offset: Vec2, bounds: Rect) -> Vec2 {
    Vec2::new(
        offset.x.clamp(bounds.x0, bounds.x1),
        offset.y.clamp(bounds.y0, bounds.y1),
    )
}
