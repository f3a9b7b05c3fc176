// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Calibration run settings.

use std::time::Duration;

use cobot_vision::DetectionAxis;
use serde::{Deserialize, Serialize};

use crate::error::{CalibrationError, CalibrationResult};
use crate::robot::MotionParams;

/// Settings for a laser height calibration run.
///
/// Arguments passed to
/// [`CalibrationSession::calibrate`](crate::session::CalibrationSession::calibrate)
/// take precedence over `num_iterations`, `step_size_mm` and
/// `delay_between_move_detect_ms`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LaserCalibrationConfig {
    /// Number of downward steps after the zero sample.
    pub num_iterations: u32,

    /// Height change per step in millimetres.
    pub step_size_mm: f64,

    /// Settle time between a completed move and detection.
    pub delay_between_move_detect_ms: u64,

    /// Velocity for calibration moves, percent.
    pub calibration_velocity: f64,

    /// Acceleration for calibration moves, percent.
    pub calibration_acceleration: f64,

    /// Tool frame used for calibration moves.
    pub robot_tool: u32,

    /// Workpiece (user) frame used for calibration moves.
    pub robot_user: u32,

    /// Position-reached tolerance in millimetres.
    pub movement_threshold: f64,

    /// Maximum wait for a move to complete.
    #[serde(with = "humantime_serde")]
    pub movement_timeout: Duration,

    /// Detection attempts per step. Missing lines and wrong-sign deltas both
    /// consume an attempt.
    pub calibration_max_attempts: u32,

    /// Frame captures per detection attempt.
    pub calibration_detection_retries: u32,

    /// Highest polynomial degree tried when fitting.
    pub max_polynomial_degree: usize,

    /// The tool never goes to or below this height, in millimetres.
    pub min_safety_z_mm: f64,

    /// Axis the laser line is traced along.
    pub detection_axis: DetectionAxis,
}

impl Default for LaserCalibrationConfig {
    fn default() -> Self {
        Self {
            num_iterations: 10,
            step_size_mm: 1.0,
            delay_between_move_detect_ms: 500,
            calibration_velocity: 20.0,
            calibration_acceleration: 10.0,
            robot_tool: 0,
            robot_user: 0,
            movement_threshold: 0.5,
            movement_timeout: Duration::from_secs(30),
            calibration_max_attempts: 5,
            calibration_detection_retries: 3,
            max_polynomial_degree: 5,
            min_safety_z_mm: 100.0,
            detection_axis: DetectionAxis::Y,
        }
    }
}

impl LaserCalibrationConfig {
    /// Motion parameters for calibration moves.
    pub fn motion_params(&self) -> MotionParams {
        MotionParams {
            tool: self.robot_tool,
            workpiece: self.robot_user,
            velocity: self.calibration_velocity,
            acceleration: self.calibration_acceleration,
        }
    }

    /// Validates the settings.
    pub fn validate(&self) -> CalibrationResult<()> {
        validate_step(self.step_size_mm)?;

        if !(self.calibration_velocity > 0.0 && self.calibration_velocity <= 100.0) {
            return Err(CalibrationError::configuration(
                "calibration_velocity",
                format!("must be in (0, 100], got {}", self.calibration_velocity),
            ));
        }
        if !(self.calibration_acceleration > 0.0 && self.calibration_acceleration <= 100.0) {
            return Err(CalibrationError::configuration(
                "calibration_acceleration",
                format!("must be in (0, 100], got {}", self.calibration_acceleration),
            ));
        }
        if !(self.movement_threshold > 0.0 && self.movement_threshold.is_finite()) {
            return Err(CalibrationError::configuration(
                "movement_threshold",
                format!("must be positive, got {}", self.movement_threshold),
            ));
        }
        if self.movement_timeout.is_zero() {
            return Err(CalibrationError::configuration(
                "movement_timeout",
                "must be greater than zero",
            ));
        }
        if self.calibration_max_attempts == 0 {
            return Err(CalibrationError::configuration(
                "calibration_max_attempts",
                "must be at least 1",
            ));
        }
        if self.calibration_detection_retries == 0 {
            return Err(CalibrationError::configuration(
                "calibration_detection_retries",
                "must be at least 1",
            ));
        }
        if self.max_polynomial_degree == 0 {
            return Err(CalibrationError::InvalidDegree {
                degree: self.max_polynomial_degree,
            });
        }
        if !self.min_safety_z_mm.is_finite() {
            return Err(CalibrationError::configuration(
                "min_safety_z_mm",
                "must be finite",
            ));
        }
        Ok(())
    }
}

/// Rejects non-positive or non-finite step sizes.
pub(crate) fn validate_step(step_mm: f64) -> CalibrationResult<()> {
    if step_mm > 0.0 && step_mm.is_finite() {
        Ok(())
    } else {
        Err(CalibrationError::configuration(
            "step_size_mm",
            format!("must be a positive number, got {}", step_mm),
        ))
    }
}

// =============================================================================
// Tests
// =============================================================================
