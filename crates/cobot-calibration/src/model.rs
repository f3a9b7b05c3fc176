// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Calibration samples and the persisted model.
//!
//! # Persisted layout
//!
//! ```json
//! {
//!   "zero_reference_coords": [x, y],
//!   "calibration_data": [[height_mm, pixel_delta], ...],
//!   "robot_initial_position": [x, y, z, rx, ry, rz],
//!   "polynomial": {
//!     "coefficients": [0.0, c1, ..., cN],
//!     "intercept": b,
//!     "degree": N,
//!     "r2": 0.999
//!   },
//!   "created_at": "2025-01-01T00:00:00Z"
//! }
//! ```

use chrono::{DateTime, Utc};
use cobot_vision::Point2;
use serde::{Deserialize, Serialize};

use crate::robot::Position;

// =============================================================================
// CalibrationSample
// =============================================================================

/// One measurement: tool lowered by `height_mm`, laser line moved by
/// `pixel_delta` relative to the zero reference. Serialized as
/// `[height_mm, pixel_delta]`.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(from = "(f64, f64)", into = "(f64, f64)")]
pub struct CalibrationSample {
    /// Distance below the initial position, millimetres.
    pub height_mm: f64,
    /// Pixel offset from the zero reference on the measurement axis.
    pub pixel_delta: f64,
}

impl CalibrationSample {
    /// The sample recorded at the initial position.
    pub const ZERO: Self = Self::new(0.0, 0.0);

    /// Creates a sample.
    pub const fn new(height_mm: f64, pixel_delta: f64) -> Self {
        Self {
            height_mm,
            pixel_delta,
        }
    }
}

impl From<(f64, f64)> for CalibrationSample {
    fn from((height_mm, pixel_delta): (f64, f64)) -> Self {
        Self::new(height_mm, pixel_delta)
    }
}

impl From<CalibrationSample> for (f64, f64) {
    fn from(sample: CalibrationSample) -> Self {
        (sample.height_mm, sample.pixel_delta)
    }
}

// =============================================================================
// PolynomialFit
// =============================================================================

/// Polynomial mapping pixel delta to height.
///
/// `coefficients[k]` multiplies `delta^k`. The constant term lives in
/// `intercept`; `coefficients[0]` is always `0.0`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolynomialFit {
    /// Coefficients for powers `0..=degree`.
    pub coefficients: Vec<f64>,
    /// Constant term.
    pub intercept: f64,
    /// Polynomial degree.
    pub degree: usize,
    /// Coefficient of determination on the fitted samples.
    pub r2: f64,
}

impl PolynomialFit {
    /// Evaluates the polynomial at `delta`.
    pub fn evaluate(&self, delta: f64) -> f64 {
        // Horner, highest power first
        let polynomial = self
            .coefficients
            .iter()
            .skip(1)
            .rev()
            .fold(0.0, |acc, c| acc * delta + c)
            * delta;
        self.intercept + self.coefficients.first().copied().unwrap_or(0.0) + polynomial
    }
}

// =============================================================================
// CalibrationModel
// =============================================================================

/// Result of a calibration run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalibrationModel {
    /// Laser line point at the initial position.
    pub zero_reference_coords: Point2,
    /// Samples in acquisition order, starting with the zero sample.
    pub calibration_data: Vec<CalibrationSample>,
    /// Pose the run started from.
    pub robot_initial_position: Position,
    /// Selected polynomial.
    pub polynomial: PolynomialFit,
    /// When the model was produced. Absent in files written by older tools.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

impl CalibrationModel {
    /// Creates a model stamped with the current time.
    pub fn new(
        zero_reference_coords: Point2,
        calibration_data: Vec<CalibrationSample>,
        robot_initial_position: Position,
        polynomial: PolynomialFit,
    ) -> Self {
        Self {
            zero_reference_coords,
            calibration_data,
            robot_initial_position,
            polynomial,
            created_at: Some(Utc::now()),
        }
    }

    /// Height in millimetres below the initial position for a pixel delta.
    pub fn predict_height(&self, pixel_delta: f64) -> f64 {
        self.polynomial.evaluate(pixel_delta)
    }

    /// Selected polynomial degree.
    pub fn degree(&self) -> usize {
        self.polynomial.degree
    }

    /// Goodness of fit.
    pub fn r2(&self) -> f64 {
        self.polynomial.r2
    }

    /// Number of samples.
    pub fn sample_count(&self) -> usize {
        self.calibration_data.len()
    }
}

// =============================================================================
// Tests
// =============================================================================
