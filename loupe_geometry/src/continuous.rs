// Copyright 2025 the Loupe Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

bitflags::bitflags! {
    /// Kinds of transform change that are still in progress.
    ///
    /// The zoom engine reports the set of continuous changes currently
    /// running. The tile manager compares it against a configured pause set
    /// and holds back new decodes while a matching change is in flight.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    pub struct ContinuousTransformType: u8 {
        /// An animated scale change.
        const SCALE   = 0b0000_0001;
        /// An animated offset change.
        const OFFSET  = 0b0000_0010;
        /// An animated move that centers a content point.
        const LOCATE  = 0b0000_0100;
        /// A pinch gesture.
        const GESTURE = 0b0000_1000;
        /// A single pointer drag.
        const DRAG    = 0b0001_0000;
        /// A fling after a drag was released.
        const FLING   = 0b0010_0000;
    }
}

impl Default for ContinuousTransformType {
    /// Nothing in progress.
    fn default() -> Self {
        Self::empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_at_rest() {
        assert!(ContinuousTransformType::default().is_empty(), "nothing in flight");
        let paused = ContinuousTransformType::all();
        assert!(
            paused.intersects(ContinuousTransformType::DRAG),
            "drag is one of the continuous kinds"
        );
    }
}
