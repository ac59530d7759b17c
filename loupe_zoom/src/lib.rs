// Copyright 2025 the Loupe Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Loupe Zoom: the zoom and pan engine of an image viewer.
//!
//! [`ZoomableEngine`] owns the live transform of one view. Hosts feed it the
//! container and content sizes and forward recognized gestures:
//! - [`ZoomableEngine::scale`] and [`ZoomableEngine::switch_scale`] for
//!   programmatic zoom and double tap.
//! - [`ZoomableEngine::drag_start`], [`ZoomableEngine::drag`] and
//!   [`ZoomableEngine::drag_end`] for panning with fling.
//! - [`ZoomableEngine::gesture_transform`] and [`ZoomableEngine::gesture_end`]
//!   for pinch zoom with rubber band.
//! - [`ZoomableEngine::handle_key`] for keyboard control.
//!
//! The engine never reads a clock. Animations move when the host calls
//! [`ZoomableEngine::advance`] from its frame callback. After each batch of
//! calls, [`ZoomableEngine::take_changes`] reports what to redraw and the
//! tile engine reads [`ZoomableEngine::content_visible_rect`] and
//! [`ZoomableEngine::continuous_transform_type`].
//!
//! ## Example
//!
//! ```rust
//! use core::time::Duration;
//! use loupe_geometry::{IntRect, IntSize};
//! use loupe_zoom::ZoomableEngine;
//!
//! let mut engine = ZoomableEngine::default();
//! engine.set_container_size(IntSize::new(1000, 500));
//! engine.set_content_size(IntSize::new(400, 400));
//!
//! // Double tap in the middle zooms to the medium scale.
//! assert_eq!(engine.switch_scale(None, true), Some(3.0));
//! while engine.advance(Duration::from_millis(16)) {}
//! assert_eq!(engine.user_transform().scale.x, 3.0);
//! assert_eq!(engine.content_visible_rect(), IntRect::new(66, 133, 334, 267));
//! ```
//!
//! ## Features
//!
//! - `serde`: derive `Serialize`/`Deserialize` for [`SavedTransform`].

mod animation;
mod config;
mod engine;

pub use animation::{Easing, ZoomAnimationSpec};
pub use config::{Edge, SavedTransform, ScrollEdge, ZoomChanges, ZoomConfig, ZoomKey};
pub use engine::ZoomableEngine;
