// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Robot motion collaborator.
//!
//! The calibration pipeline needs only three robot capabilities: command a
//! pose, wait until it is reached, and read the current pose. Controllers
//! implement [`RobotMotion`]; tests implement it with a simulated arm.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::CalibrationResult;

/// Index of the Z coordinate in a [`Position`].
pub const Z_AXIS: usize = 2;

// =============================================================================
// Position
// =============================================================================

/// Cartesian tool pose `[x, y, z, rx, ry, rz]` in millimetres and degrees.
///
/// Serialized as a plain six-element array.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Position(pub [f64; 6]);

impl Position {
    /// Creates a pose.
    pub const fn new(x: f64, y: f64, z: f64, rx: f64, ry: f64, rz: f64) -> Self {
        Self([x, y, z, rx, ry, rz])
    }

    /// X coordinate.
    pub fn x(&self) -> f64 {
        self.0[0]
    }

    /// Y coordinate.
    pub fn y(&self) -> f64 {
        self.0[1]
    }

    /// Z coordinate.
    pub fn z(&self) -> f64 {
        self.0[Z_AXIS]
    }

    /// Returns the same pose `mm` lower.
    pub fn lowered_by(&self, mm: f64) -> Self {
        let mut coords = self.0;
        coords[Z_AXIS] -= mm;
        Self(coords)
    }

    /// Largest absolute per-coordinate difference to `other`.
    pub fn max_deviation(&self, other: &Position) -> f64 {
        self.0
            .iter()
            .zip(other.0.iter())
            .map(|(a, b)| (a - b).abs())
            .fold(0.0, f64::max)
    }
}

impl From<[f64; 6]> for Position {
    fn from(coords: [f64; 6]) -> Self {
        Self(coords)
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [x, y, z, rx, ry, rz] = self.0;
        write!(
            f,
            "[{:.2}, {:.2}, {:.2}, {:.2}, {:.2}, {:.2}]",
            x, y, z, rx, ry, rz
        )
    }
}

// =============================================================================
// MotionParams
// =============================================================================

/// Motion parameters passed with every move command.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MotionParams {
    /// Tool frame number.
    pub tool: u32,
    /// Workpiece (user) frame number.
    pub workpiece: u32,
    /// Velocity, percent of maximum.
    pub velocity: f64,
    /// Acceleration, percent of maximum.
    pub acceleration: f64,
}

// =============================================================================
// RobotMotion
// =============================================================================

/// Robot motion interface used by the calibration session.
#[async_trait]
pub trait RobotMotion: Send + Sync {
    /// Commands a move to `position`. Returns once the command is accepted,
    /// not when the move completes.
    async fn move_to_position(
        &self,
        position: &Position,
        params: &MotionParams,
    ) -> CalibrationResult<()>;

    /// Waits until the robot is within `threshold` of `position` or `timeout`
    /// elapses. Returns `true` if the position was reached.
    async fn wait_until_reached(
        &self,
        position: &Position,
        threshold: f64,
        timeout: Duration,
    ) -> bool;

    /// Returns the current pose, or `None` if the controller cannot report it.
    async fn current_position(&self) -> Option<Position>;
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lowered_by_changes_only_z() {
        let pose = Position::new(10.0, 20.0, 300.0, 180.0, 0.0, 90.0);
        let lower = pose.lowered_by(2.5);
        assert_eq!(lower.z(), 297.5);
        assert_eq!(lower.x(), 10.0);
        assert_eq!(lower.0[5], 90.0);
    }

    #[test]
    fn test_serializes_as_array() {
        let pose = Position::new(1.0, 2.0, 3.0, 4.0, 5.0, 6.0);
        let json = serde_json::to_string(&pose).unwrap();
        assert_eq!(json, "[1.0,2.0,3.0,4.0,5.0,6.0]");
        assert_eq!(serde_json::from_str::<Position>(&json).unwrap(), pose);
    }

    #[test]
    fn test_max_deviation() {
        let a = Position::new(0.0, 0.0, 100.0, 0.0, 0.0, 0.0);
        let b = Position::new(0.5, 0.0, 98.0, 0.0, 0.0, 0.0);
        assert_eq!(a.max_deviation(&b), 2.0);
    }
}
