// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Frames and image-plane coordinates.
//!
//! Frames are `(height, width, channels)` arrays of 8-bit samples in BGR
//! order, the layout camera drivers deliver.

use std::fmt;

use ndarray::{Array2, Array3, ArrayView3, Axis};
use serde::{Deserialize, Serialize};

/// A color frame, `(height, width, channels)`, BGR.
pub type Frame = Array3<u8>;

/// Index of the red channel in a BGR frame.
pub const BGR_RED_CHANNEL: usize = 2;

// =============================================================================
// FramePair
// =============================================================================

/// Frames captured with the laser switched on and off.
///
/// Either frame may be missing when the camera failed to deliver it.
#[derive(Debug, Clone, Default)]
pub struct FramePair {
    /// Frame with the laser on.
    pub on: Option<Frame>,
    /// Frame with the laser off.
    pub off: Option<Frame>,
}

impl FramePair {
    /// Creates a complete pair.
    pub fn new(on: Frame, off: Frame) -> Self {
        Self {
            on: Some(on),
            off: Some(off),
        }
    }

    /// Creates a pair with neither frame.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Returns `true` if both frames are present.
    pub fn is_complete(&self) -> bool {
        self.on.is_some() && self.off.is_some()
    }
}

// =============================================================================
// Coordinates
// =============================================================================

/// A sub-pixel image-plane point. Serialized as `[x, y]`.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(from = "(f64, f64)", into = "(f64, f64)")]
pub struct Point2 {
    /// Column coordinate.
    pub x: f64,
    /// Row coordinate.
    pub y: f64,
}

impl Point2 {
    /// Creates a point.
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Squared Euclidean distance to `other`.
    pub fn distance_squared(&self, other: &Point2) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        dx * dx + dy * dy
    }
}

impl From<(f64, f64)> for Point2 {
    fn from((x, y): (f64, f64)) -> Self {
        Self { x, y }
    }
}

impl From<Point2> for (f64, f64) {
    fn from(point: Point2) -> Self {
        (point.x, point.y)
    }
}

impl fmt::Display for Point2 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({:.2}, {:.2})", self.x, self.y)
    }
}

/// An integer pixel location.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Pixel {
    /// Column.
    pub x: usize,
    /// Row.
    pub y: usize,
}

impl fmt::Display for Pixel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

// =============================================================================
// Channel helpers
// =============================================================================

/// Extracts one channel as `f32`, or `None` if the frame lacks it.
pub fn channel_f32(frame: &ArrayView3<u8>, channel: usize) -> Option<Array2<f32>> {
    if channel >= frame.len_of(Axis(2)) {
        return None;
    }
    Some(frame.index_axis(Axis(2), channel).mapv(f32::from))
}

/// Builds a frame whose every pixel has the given BGR color.
pub fn solid_frame(height: usize, width: usize, bgr: [u8; 3]) -> Frame {
    Array3::from_shape_fn((height, width, 3), |(_, _, c)| bgr[c])
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_point_serializes_as_pair() {
        let point = Point2::new(320.5, 240.0);
        let json = serde_json::to_string(&point).unwrap();
        assert_eq!(json, "[320.5,240.0]");
        let back: Point2 = serde_json::from_str(&json).unwrap();
        assert_eq!(back, point);
    }

    #[test]
    fn test_distance_squared() {
        let a = Point2::new(1.0, 2.0);
        let b = Point2::new(4.0, 6.0);
        assert_eq!(a.distance_squared(&b), 25.0);
    }

    #[test]
    fn test_channel_extraction() {
        let frame = solid_frame(2, 3, [10, 20, 30]);
        let red = channel_f32(&frame.view(), BGR_RED_CHANNEL).unwrap();
        assert_eq!(red.dim(), (2, 3));
        assert!(red.iter().all(|&v| v == 30.0));
        assert!(channel_f32(&frame.view(), 3).is_none());
    }

    #[test]
    fn test_frame_pair_completeness() {
        assert!(FramePair::new(solid_frame(1, 1, [0; 3]), solid_frame(1, 1, [0; 3])).is_complete());
        assert!(!FramePair::empty().is_complete());
    }
}
