// Copyright 2025 the Loupe Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

use core::time::Duration;

use kurbo::{Point, Rect, Vec2};
use loupe_geometry::{
    Alignment, ContentLayout, ContentScale, ContinuousTransformType, IntRect, IntSize,
    RUBBER_BAND_SCALE_RATIO, ReadMode, ScaleFactor, ScalesCalculator, Transform, UserScales,
    calculate_next_step_scale, clamp_offset, compute_read_mode_user_transform, compute_user_scales,
    limit_offset_with_rubber_band, limit_scale_with_rubber_band, normalize_rotation,
};

use crate::animation::{FlingDecay, TransformTween};
use crate::{Edge, SavedTransform, ScrollEdge, ZoomAnimationSpec, ZoomChanges, ZoomConfig, ZoomKey};

#[derive(Clone, Copy, Debug)]
enum Motion {
    Tween {
        tween: TransformTween,
        kind: ContinuousTransformType,
    },
    Fling(FlingDecay),
}

#[derive(Clone, Copy, Debug, Default)]
struct Gesture {
    kind: ContinuousTransformType,
    raw_offset: Vec2,
    centroid: Option<Point>,
}

/// Zoom, pan and rotation state of one image view.
///
/// The engine layers a *user transform* (uniform scale plus offset) on top of
/// the *base transform* that fits the rotated content into the container.
/// User scales are relative: `1.0` shows the content as fitted.
///
/// Every operation first stops running animations. Scales are clamped to
/// `[min_scale, max_scale]` and offsets to [`ZoomableEngine::user_offset_bounds`],
/// except that pinching and dragging may overshoot with the rubber band
/// enabled; the overshoot springs back when the gesture ends.
///
/// Animations advance only when the host calls [`ZoomableEngine::advance`].
#[derive(Clone, Debug)]
pub struct ZoomableEngine {
    container: IntSize,
    content: IntSize,
    content_origin: IntSize,
    rotation: u32,
    config: ZoomConfig,
    scales: UserScales,
    read_mode_applied: bool,
    user: Transform,
    motion: Option<Motion>,
    gesture: Gesture,
    published_continuous: ContinuousTransformType,
    changes: ZoomChanges,
}

impl ZoomableEngine {
    /// Creates an engine with no container or content yet.
    #[must_use]
    pub fn new(config: ZoomConfig) -> Self {
        Self {
            container: IntSize::ZERO,
            content: IntSize::ZERO,
            content_origin: IntSize::ZERO,
            rotation: 0,
            config,
            scales: UserScales::ONE,
            read_mode_applied: false,
            user: Transform::IDENTITY,
            motion: None,
            gesture: Gesture::default(),
            published_continuous: ContinuousTransformType::empty(),
            changes: ZoomChanges::empty(),
        }
    }

    /// Size of the viewport.
    #[must_use]
    pub fn container_size(&self) -> IntSize {
        self.container
    }

    /// Size of the displayed content, before rotation.
    #[must_use]
    pub fn content_size(&self) -> IntSize {
        self.content
    }

    /// Full resolution size of the image behind the content, if known.
    #[must_use]
    pub fn content_origin_size(&self) -> IntSize {
        self.content_origin
    }

    /// Clockwise rotation in degrees.
    #[must_use]
    pub fn rotation(&self) -> u32 {
        self.rotation
    }

    /// Current settings.
    #[must_use]
    pub fn config(&self) -> &ZoomConfig {
        &self.config
    }

    /// Placement of the content in the container, without user zoom.
    #[must_use]
    pub fn layout(&self) -> ContentLayout {
        ContentLayout {
            container: self.container,
            content: self.content,
            content_scale: self.config.content_scale,
            alignment: self.config.alignment,
            rotation: self.rotation,
        }
    }

    /// Transform that fits the rotated content into the container.
    #[must_use]
    pub fn base_transform(&self) -> Transform {
        self.layout().base_transform()
    }

    /// Zoom and pan applied on top of the base transform.
    #[must_use]
    pub fn user_transform(&self) -> Transform {
        self.user
    }

    /// Display transform: the base transform followed by the user transform.
    #[must_use]
    pub fn transform(&self) -> Transform {
        self.user.after(&self.base_transform())
    }

    /// Smallest user scale.
    #[must_use]
    pub fn min_scale(&self) -> f64 {
        self.scales.min
    }

    /// Intermediate double tap scale.
    #[must_use]
    pub fn medium_scale(&self) -> f64 {
        self.scales.medium
    }

    /// Largest user scale.
    #[must_use]
    pub fn max_scale(&self) -> f64 {
        self.scales.max
    }

    /// All three user scales.
    #[must_use]
    pub fn scales(&self) -> UserScales {
        self.scales
    }

    /// Returns `true` if the content opened in read mode on the last reset.
    #[must_use]
    pub fn read_mode_applied(&self) -> bool {
        self.read_mode_applied
    }

    /// Region of the unrotated content visible in the container.
    #[must_use]
    pub fn content_visible_rect(&self) -> IntRect {
        self.layout().content_visible_rect(&self.user)
    }

    /// Allowed user offsets at the current scale; minimum in `x0`/`y0`,
    /// maximum in `x1`/`y1`.
    #[must_use]
    pub fn user_offset_bounds(&self) -> Rect {
        self.offset_bounds(self.user.scale.x)
    }

    /// Maps a container point to unrotated content coordinates.
    #[must_use]
    pub fn container_to_content_point(&self, p: Point) -> Point {
        self.layout().container_to_content_point(&self.user, p)
    }

    /// Maps an unrotated content point to container coordinates.
    #[must_use]
    pub fn content_to_container_point(&self, p: Point) -> Point {
        self.layout().content_to_container_point(&self.user, p)
    }

    /// Kinds of transform change in flight: gestures and running animations.
    #[must_use]
    pub fn continuous_transform_type(&self) -> ContinuousTransformType {
        let motion = match &self.motion {
            Some(Motion::Tween { kind, .. }) => *kind,
            Some(Motion::Fling(_)) => ContinuousTransformType::FLING,
            None => ContinuousTransformType::empty(),
        };
        self.gesture.kind | motion
    }

    /// Whether the content can scroll further in each direction.
    #[must_use]
    pub fn scroll_edge(&self) -> ScrollEdge {
        let bounds = self.user_offset_bounds();
        ScrollEdge {
            horizontal: Edge::from_offset(self.user.offset.x, bounds.x0, bounds.x1),
            vertical: Edge::from_offset(self.user.offset.y, bounds.y0, bounds.y1),
        }
    }

    /// Returns `true` while an animation or fling runs.
    #[must_use]
    pub fn is_animating(&self) -> bool {
        self.motion.is_some()
    }

    /// Returns and clears the accumulated change flags.
    pub fn take_changes(&mut self) -> ZoomChanges {
        core::mem::take(&mut self.changes)
    }

    /// Sets the viewport size and resets the transform.
    pub fn set_container_size(&mut self, size: IntSize) -> bool {
        if self.container == size {
            return false;
        }
        self.container = size;
        self.relayout();
        true
    }

    /// Sets the displayed content size and resets the transform.
    pub fn set_content_size(&mut self, size: IntSize) -> bool {
        if self.content == size {
            return false;
        }
        self.content = size;
        self.relayout();
        true
    }

    /// Sets the full resolution image size and resets the transform.
    ///
    /// Pass [`IntSize::ZERO`] when the content is the full image.
    pub fn set_content_origin_size(&mut self, size: IntSize) -> bool {
        if self.content_origin == size {
            return false;
        }
        self.content_origin = size;
        self.relayout();
        true
    }

    /// Replaces every setting and resets the transform.
    pub fn set_config(&mut self, config: ZoomConfig) -> bool {
        if self.config == config {
            return false;
        }
        self.config = config;
        self.relayout();
        true
    }

    /// Sets how content is fitted at rest.
    pub fn set_content_scale(&mut self, content_scale: ContentScale) -> bool {
        self.update_config(|c| c.content_scale = content_scale, true)
    }

    /// Sets where fitted content sits.
    pub fn set_alignment(&mut self, alignment: Alignment) -> bool {
        self.update_config(|c| c.alignment = alignment, true)
    }

    /// Enables or disables read mode.
    pub fn set_read_mode(&mut self, read_mode: Option<ReadMode>) -> bool {
        self.update_config(|c| c.read_mode = read_mode, true)
    }

    /// Sets the medium scale policy.
    pub fn set_scales_calculator(&mut self, calculator: ScalesCalculator) -> bool {
        self.update_config(|c| c.scales_calculator = calculator, true)
    }

    /// Chooses between keeping panning within the part visible at rest or
    /// the whole content.
    pub fn set_limit_offset_within_base_visible_rect(&mut self, limit: bool) -> bool {
        self.update_config(|c| c.limit_offset_within_base_visible_rect = limit, true)
    }

    /// Chooses two or three step double tap cycling.
    pub fn set_three_step_scale(&mut self, three_step: bool) -> bool {
        self.update_config(|c| c.three_step_scale = three_step, false)
    }

    /// Enables or disables scale overshoot while pinching.
    pub fn set_rubber_band_scale(&mut self, enabled: bool) -> bool {
        self.update_config(|c| c.rubber_band_scale = enabled, false)
    }

    /// Enables or disables offset overshoot while dragging.
    pub fn set_rubber_band_offset(&mut self, enabled: bool) -> bool {
        self.update_config(|c| c.rubber_band_offset = enabled, false)
    }

    /// Sets the duration and curve of later animations.
    pub fn set_animation(&mut self, animation: ZoomAnimationSpec) -> bool {
        self.update_config(|c| c.animation = animation, false)
    }

    fn update_config(&mut self, update: impl FnOnce(&mut ZoomConfig), relayout: bool) -> bool {
        let mut config = self.config;
        update(&mut config);
        if config == self.config {
            return false;
        }
        self.config = config;
        if relayout {
            self.relayout();
        }
        true
    }

    fn relayout(&mut self) {
        self.changes |= ZoomChanges::LAYOUT;
        self.reset();
    }

    /// Recomputes the scales and returns to the initial transform.
    ///
    /// The initial transform is the identity, or the read mode transform when
    /// read mode is enabled and accepts the rotated content.
    pub fn reset(&mut self) {
        self.stop_all_animations();
        self.gesture = Gesture::default();
        let layout = self.layout();
        let read_mode = self.config.read_mode.filter(|read| {
            self.config.content_scale.supports_read_mode()
                && read.accept(layout.rotated_content(), self.container)
        });
        let scales = compute_user_scales(
            &layout,
            self.content_origin,
            self.config.scales_calculator,
            read_mode.is_some(),
        );
        if scales != self.scales {
            self.scales = scales;
            self.changes |= ZoomChanges::SCALES;
        }
        self.read_mode_applied = read_mode.is_some();
        let initial = if self.read_mode_applied {
            compute_read_mode_user_transform(&layout)
        } else {
            Transform::IDENTITY
        };
        let initial = self.clamped(initial);
        self.set_user(initial);
        self.publish_continuous();
        tracing::debug!(
            container = %self.container,
            content = %self.content,
            content_origin = %self.content_origin,
            rotation = self.rotation,
            min = self.scales.min,
            medium = self.scales.medium,
            max = self.scales.max,
            read_mode = self.read_mode_applied,
            user = %self.user,
            "zoom reset"
        );
    }

    /// Zooms to `target_scale` keeping the container point `centroid` fixed.
    ///
    /// `centroid` defaults to the container center. Returns `false` if there
    /// is nothing to zoom or the scale is not positive.
    pub fn scale(&mut self, target_scale: f64, centroid: Option<Point>, animated: bool) -> bool {
        self.stop_all_animations();
        if self.layout().is_empty() || target_scale.is_nan() || target_scale <= 0.0 {
            return false;
        }
        let scale = self.scales.clamp(target_scale);
        let centroid = centroid.unwrap_or_else(|| self.container_center());
        let target = self.scaled_about(scale, centroid);
        tracing::trace!(target_scale, scale, animated, "scale");
        self.apply(target, animated, ContinuousTransformType::SCALE);
        true
    }

    /// Multiplies the current scale by `factor`. See [`ZoomableEngine::scale`].
    pub fn scale_by(&mut self, factor: f64, centroid: Option<Point>, animated: bool) -> bool {
        if factor.is_nan() || factor <= 0.0 {
            return false;
        }
        self.scale(self.user.scale.x * factor, centroid, animated)
    }

    /// Pans by `delta` container pixels, clamped to the offset bounds.
    pub fn offset(&mut self, delta: Vec2) -> bool {
        self.offset_to(self.user.offset + delta, false)
    }

    /// Pans to the user offset `offset`, clamped to the offset bounds.
    pub fn offset_to(&mut self, offset: Vec2, animated: bool) -> bool {
        self.stop_all_animations();
        if self.layout().is_empty() {
            return false;
        }
        let target = Transform {
            offset: clamp_offset(offset, self.user_offset_bounds()),
            ..self.user
        };
        self.apply(target, animated, ContinuousTransformType::OFFSET);
        true
    }

    /// Centers the content point `content_point` in the container, zooming to
    /// `target_scale` if given.
    ///
    /// Near the content edges the point ends up as close to the center as the
    /// offset bounds allow.
    pub fn locate(&mut self, content_point: Point, target_scale: Option<f64>, animated: bool) -> bool {
        self.stop_all_animations();
        if self.layout().is_empty() {
            return false;
        }
        let scale = self.scales.clamp(target_scale.unwrap_or(self.user.scale.x));
        let offset = self.layout().offset_to_center(content_point, scale);
        let target = Transform::new(
            ScaleFactor::uniform(scale),
            clamp_offset(offset, self.offset_bounds(scale)),
        );
        self.apply(target, animated, ContinuousTransformType::LOCATE);
        true
    }

    /// Rotates the content to `degrees` clockwise and resets the transform.
    ///
    /// Only multiples of 90 are accepted. Returns `true` if the rotation
    /// changed.
    pub fn rotate(&mut self, degrees: i32) -> bool {
        if degrees % 90 != 0 {
            tracing::warn!(degrees, "rotation must be a multiple of 90");
            return false;
        }
        let rotation = normalize_rotation(degrees);
        if rotation == self.rotation {
            return false;
        }
        self.rotation = rotation;
        self.relayout();
        true
    }

    /// Scale the next double tap moves to.
    #[must_use]
    pub fn next_step_scale(&self) -> f64 {
        let steps = self.scales.steps(self.config.three_step_scale);
        calculate_next_step_scale(&steps, self.user.scale.x)
    }

    /// Double tap: moves to the next step scale about `centroid`.
    ///
    /// Returns the target scale, or `None` if there is nothing to zoom.
    pub fn switch_scale(&mut self, centroid: Option<Point>, animated: bool) -> Option<f64> {
        self.stop_all_animations();
        let next = self.next_step_scale();
        self.scale(next, centroid, animated).then_some(next)
    }

    /// Starts a drag.
    pub fn drag_start(&mut self) {
        self.stop_all_animations();
        self.gesture.kind = ContinuousTransformType::DRAG;
        self.gesture.raw_offset = self.user.offset;
        self.gesture.centroid = None;
        self.publish_continuous();
    }

    /// Moves a drag by `delta` container pixels.
    ///
    /// With the offset rubber band enabled the content follows past its
    /// bounds with increasing resistance.
    pub fn drag(&mut self, delta: Vec2) -> bool {
        if !self.gesture.kind.contains(ContinuousTransformType::DRAG) {
            self.drag_start();
        }
        if self.layout().is_empty() {
            return false;
        }
        self.gesture.raw_offset += delta;
        let offset = self.limit_offset(self.gesture.raw_offset, self.user_offset_bounds());
        self.set_user(Transform { offset, ..self.user });
        true
    }

    /// Ends a drag released at `velocity` pixels per second.
    ///
    /// Springs back if the drag left the bounds, otherwise flings. Returns
    /// `true` if an animation started.
    pub fn drag_end(&mut self, velocity: Vec2) -> bool {
        self.gesture.kind.remove(ContinuousTransformType::DRAG);
        self.settle(velocity)
    }

    /// Applies one pinch step: zoom by `zoom_change` about `centroid`, then
    /// pan by `pan`.
    ///
    /// With the scale rubber band enabled the scale may leave its range with
    /// increasing resistance.
    pub fn gesture_transform(&mut self, zoom_change: f64, centroid: Point, pan: Vec2) -> bool {
        if !self.gesture.kind.contains(ContinuousTransformType::GESTURE) {
            self.stop_all_animations();
            self.gesture.kind = ContinuousTransformType::GESTURE;
        }
        self.gesture.centroid = Some(centroid);
        self.publish_continuous();
        if self.layout().is_empty() || zoom_change.is_nan() || zoom_change <= 0.0 {
            return false;
        }
        let current = self.user.scale.x;
        let target = current * zoom_change;
        let scale = if self.config.rubber_band_scale {
            limit_scale_with_rubber_band(
                current,
                target,
                self.scales.min,
                self.scales.max,
                RUBBER_BAND_SCALE_RATIO,
            )
        } else {
            self.scales.clamp(target)
        };
        let offset = self.layout().offset_for_scale_about(&self.user, scale, centroid) + pan;
        let offset = self.limit_offset(offset, self.offset_bounds(scale));
        self.set_user(Transform::new(ScaleFactor::uniform(scale), offset));
        true
    }

    /// Ends a pinch released at `velocity` pixels per second.
    ///
    /// Springs back if the scale or offset overshot, otherwise flings.
    /// Returns `true` if an animation started.
    pub fn gesture_end(&mut self, velocity: Vec2) -> bool {
        self.gesture.kind.remove(ContinuousTransformType::GESTURE);
        self.settle(velocity)
    }

    /// Applies a keyboard command, animated.
    pub fn handle_key(&mut self, key: ZoomKey) -> bool {
        let step = self.container.to_size() * ZoomKey::MOVE_FRACTION;
        let offset = self.user.offset;
        match key {
            ZoomKey::ZoomIn => self.scale_by(ZoomKey::SCALE_STEP, None, true),
            ZoomKey::ZoomOut => self.scale_by(1.0 / ZoomKey::SCALE_STEP, None, true),
            ZoomKey::MoveUp => self.offset_to(offset + Vec2::new(0.0, step.height), true),
            ZoomKey::MoveDown => self.offset_to(offset - Vec2::new(0.0, step.height), true),
            ZoomKey::MoveLeft => self.offset_to(offset + Vec2::new(step.width, 0.0), true),
            ZoomKey::MoveRight => self.offset_to(offset - Vec2::new(step.width, 0.0), true),
        }
    }

    /// Steps running animations by `dt`. Returns `true` while one is running.
    pub fn advance(&mut self, dt: Duration) -> bool {
        let Some(motion) = self.motion.take() else {
            return false;
        };
        match motion {
            Motion::Tween { mut tween, kind } => {
                let (value, done) = tween.advance(dt);
                self.set_user(value);
                if !done {
                    self.motion = Some(Motion::Tween { tween, kind });
                }
            }
            Motion::Fling(mut fling) => {
                let raw = self.user.offset + fling.advance(dt);
                let offset = clamp_offset(raw, self.user_offset_bounds());
                fling.halt(offset.x != raw.x, offset.y != raw.y);
                self.set_user(Transform { offset, ..self.user });
                if !fling.is_settled() {
                    self.motion = Some(Motion::Fling(fling));
                }
            }
        }
        self.publish_continuous();
        self.motion.is_some()
    }

    /// Cancels any running animation or fling, leaving the transform where
    /// it currently is.
    pub fn stop_all_animations(&mut self) {
        if let Some(motion) = self.motion.take() {
            tracing::trace!(?motion, "animation stopped");
        }
        self.publish_continuous();
    }

    /// Captures the user transform.
    #[must_use]
    pub fn save(&self) -> SavedTransform {
        SavedTransform {
            scale: self.user.scale.x,
            translation_x: self.user.offset.x,
            translation_y: self.user.offset.y,
        }
    }

    /// Restores a transform captured by [`ZoomableEngine::save`], clamped to
    /// the current limits.
    pub fn restore(&mut self, saved: SavedTransform) -> bool {
        self.stop_all_animations();
        if self.layout().is_empty() || saved.scale.is_nan() || saved.scale <= 0.0 {
            return false;
        }
        let target = Transform::new(
            ScaleFactor::uniform(saved.scale),
            Vec2::new(saved.translation_x, saved.translation_y),
        );
        let target = self.clamped(target);
        self.set_user(target);
        true
    }

    fn settle(&mut self, velocity: Vec2) -> bool {
        let scale = self.user.scale.x;
        let clamped_scale = self.scales.clamp(scale);
        let started = if clamped_scale != scale {
            let centroid = self
                .gesture
                .centroid
                .unwrap_or_else(|| self.container_center());
            let target = self.scaled_about(clamped_scale, centroid);
            self.apply(target, true, ContinuousTransformType::SCALE);
            self.motion.is_some()
        } else if clamp_offset(self.user.offset, self.user_offset_bounds()) != self.user.offset {
            let target = self.clamped(self.user);
            self.apply(target, true, ContinuousTransformType::OFFSET);
            self.motion.is_some()
        } else if velocity.hypot() >= FlingDecay::REST_SPEED && !self.layout().is_empty() {
            let fling = FlingDecay::new(velocity);
            tracing::trace!(?velocity, remaining = ?fling.remaining_distance(), "fling");
            self.motion = Some(Motion::Fling(fling));
            true
        } else {
            false
        };
        self.gesture.centroid = None;
        self.publish_continuous();
        started
    }

    fn apply(&mut self, target: Transform, animated: bool, kind: ContinuousTransformType) {
        if animated && !self.config.animation.duration.is_zero() && target != self.user {
            let tween = TransformTween::new(self.user, target, self.config.animation);
            tracing::trace!(to = %tween.target(), ?kind, "animation started");
            self.motion = Some(Motion::Tween { tween, kind });
        } else {
            self.set_user(target);
        }
        self.publish_continuous();
    }

    fn set_user(&mut self, user: Transform) {
        if user != self.user {
            self.user = user;
            self.changes |= ZoomChanges::TRANSFORM;
        }
    }

    fn publish_continuous(&mut self) {
        let current = self.continuous_transform_type();
        if current != self.published_continuous {
            self.published_continuous = current;
            self.changes |= ZoomChanges::CONTINUOUS;
        }
    }

    fn offset_bounds(&self, scale: f64) -> Rect {
        self.layout()
            .user_offset_bounds_within(scale, self.config.limit_offset_within_base_visible_rect)
    }

    fn container_center(&self) -> Point {
        let size = self.container.to_size();
        Point::new(size.width / 2.0, size.height / 2.0)
    }

    /// Target for zooming to `scale` about a container point, clamped.
    fn scaled_about(&self, scale: f64, centroid: Point) -> Transform {
        let offset = self.layout().offset_for_scale_about(&self.user, scale, centroid);
        Transform::new(
            ScaleFactor::uniform(scale),
            clamp_offset(offset, self.offset_bounds(scale)),
        )
    }

    fn clamped(&self, t: Transform) -> Transform {
        let scale = self.scales.clamp(t.scale.x);
        Transform::new(
            ScaleFactor::uniform(scale),
            clamp_offset(t.offset, self.offset_bounds(scale)),
        )
    }

    fn limit_offset(&self, offset: Vec2, bounds: Rect) -> Vec2 {
        if !self.config.rubber_band_offset {
            return clamp_offset(offset, bounds);
        }
        let container = self.container.to_size();
        Vec2::new(
            limit_offset_with_rubber_band(offset.x, bounds.x0, bounds.x1, container.width),
            limit_offset_with_rubber_band(offset.y, bounds.y0, bounds.y1, container.height),
        )
    }
}

impl Default for ZoomableEngine {
    fn default() -> Self {
        Self::new(ZoomConfig::default())
    }
}
