// Copyright 2025 the Loupe Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Loupe Geometry: the math behind a zoomable image view.
//!
//! This crate is pure, allocation-light geometry with no notion of tiles,
//! decoding or time. It covers:
//! - Integer pixel sizes and rectangles ([`IntSize`], [`IntRect`]) used for
//!   image, content and container dimensions.
//! - Fitting content into a container ([`ContentScale`], [`Alignment`]) and
//!   the resulting base [`Transform`].
//! - Quarter-turn rotation of content inside its own bounds.
//! - Mapping between container space and content space under a user zoom
//!   layered on top of the base transform ([`ContentLayout`]).
//! - Read mode for long images ([`ReadMode`], [`LongImageDecider`]).
//! - The user scale range and double tap stepping ([`compute_user_scales`],
//!   [`calculate_next_step_scale`]) and rubber band damping.
//! - The kinds of in-flight transform change ([`ContinuousTransformType`]).
//!
//! ## Coordinate spaces
//!
//! - **Content space**: pixels of the displayed content, unrotated.
//! - **Container space**: pixels of the viewport, origin at the top left.
//!
//! A point travels from content to container space by rotating within the
//! content bounds, applying the base transform, then applying the user
//! transform. User scales are therefore relative: `1.0` means "as fitted".
//!
//! ## Example
//!
//! ```rust
//! use kurbo::Vec2;
//! use loupe_geometry::{ContentLayout, IntRect, IntSize, ScaleFactor, Transform};
//!
//! let layout = ContentLayout::new(IntSize::new(1000, 500), IntSize::new(400, 400));
//!
//! // At rest the whole content is visible.
//! assert_eq!(
//!     layout.content_visible_rect(&Transform::IDENTITY),
//!     IntRect::new(0, 0, 400, 400)
//! );
//!
//! // Zoomed in 2x with the content's left edge at the container's left edge,
//! // only the top half is visible.
//! let user = Transform::new(ScaleFactor::uniform(2.0), Vec2::new(-500.0, 0.0));
//! assert_eq!(layout.content_visible_rect(&user), IntRect::new(0, 0, 400, 200));
//! ```
//!
//! ## Features
//!
//! - `serde`: derive `Serialize`/`Deserialize` for the plain value types.

mod continuous;
mod layout;
mod modes;
mod read_mode;
mod rotation;
mod scales;
mod size;
mod transform;

pub use continuous::ContinuousTransformType;
pub use layout::{ContentLayout, clamp_offset};
pub use modes::{Alignment, ContentScale, HorizontalAlign, VerticalAlign};
pub use read_mode::{
    AcceptedSizeType, LongImageDecider, ReadMode, compute_read_mode_transform,
    compute_read_mode_user_transform,
};
pub use rotation::{
    is_sideways, normalize_rotation, quarter_turn_affine, reverse_rotate_int_rect_in_size,
    reverse_rotate_point_in_size, reverse_rotate_rect_in_size, rotate_point_in_size, rotate_size,
};
pub use scales::{
    RUBBER_BAND_SCALE_RATIO, ScalesCalculator, UserScales, calculate_next_step_scale,
    compute_user_scales, format_decimals, limit_offset_with_rubber_band,
    limit_scale_with_rubber_band,
};
pub use size::{IntRect, IntSize, round_to_u32};
pub use transform::{ScaleFactor, Transform};
