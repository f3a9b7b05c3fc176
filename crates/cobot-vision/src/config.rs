// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Detector settings.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{VisionError, VisionResult};
use crate::frame::BGR_RED_CHANNEL;

// =============================================================================
// DetectionAxis
// =============================================================================

/// The image axis the laser line runs along.
///
/// For [`DetectionAxis::Y`] the line is roughly vertical and one centroid is
/// computed per row; for [`DetectionAxis::X`] one per column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DetectionAxis {
    /// Line spans columns; centroids per column.
    X,
    /// Line spans rows; centroids per row.
    #[default]
    Y,
}

impl DetectionAxis {
    /// Returns the lowercase name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::X => "x",
            Self::Y => "y",
        }
    }
}

impl fmt::Display for DetectionAxis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DetectionAxis {
    type Err = VisionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "x" => Ok(Self::X),
            "y" => Ok(Self::Y),
            other => Err(VisionError::invalid_config(
                "axis",
                format!("expected 'x' or 'y', got '{}'", other),
            )),
        }
    }
}

// =============================================================================
// LaserDetectionConfig
// =============================================================================

/// Laser line detector settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LaserDetectionConfig {
    /// Axis used when the caller does not name one.
    pub default_axis: DetectionAxis,

    /// Blurred differences at or below this value are ignored.
    pub min_intensity: f32,

    /// Blur kernel size as `(width, height)`; both odd.
    pub gaussian_blur_kernel: (usize, usize),

    /// Blur sigma; `<= 0` derives it from the kernel size.
    pub gaussian_blur_sigma: f64,

    /// Rows (or columns) whose total weight is at or below this are dropped.
    pub min_line_weight: f64,

    /// Index of the red channel in the incoming frames.
    pub red_channel: usize,
}

impl Default for LaserDetectionConfig {
    fn default() -> Self {
        Self {
            default_axis: DetectionAxis::Y,
            min_intensity: 10.0,
            gaussian_blur_kernel: (5, 5),
            gaussian_blur_sigma: 0.0,
            min_line_weight: 1.0,
            red_channel: BGR_RED_CHANNEL,
        }
    }
}

impl LaserDetectionConfig {
    /// Validates the settings.
    pub fn validate(&self) -> VisionResult<()> {
        let (kw, kh) = self.gaussian_blur_kernel;
        if kw == 0 || kh == 0 || kw % 2 == 0 || kh % 2 == 0 {
            return Err(VisionError::invalid_config(
                "gaussian_blur_kernel",
                format!("kernel sizes must be positive and odd, got ({}, {})", kw, kh),
            ));
        }

        if !self.min_intensity.is_finite() || self.min_intensity < 0.0 {
            return Err(VisionError::invalid_config(
                "min_intensity",
                format!("must be a non-negative number, got {}", self.min_intensity),
            ));
        }

        if !self.gaussian_blur_sigma.is_finite() {
            return Err(VisionError::invalid_config(
                "gaussian_blur_sigma",
                "must be finite",
            ));
        }

        if !self.min_line_weight.is_finite() || self.min_line_weight < 0.0 {
            return Err(VisionError::invalid_config(
                "min_line_weight",
                format!("must be a non-negative number, got {}", self.min_line_weight),
            ));
        }

        if self.red_channel > 2 {
            return Err(VisionError::invalid_config(
                "red_channel",
                format!("must be 0, 1 or 2, got {}", self.red_channel),
            ));
        }

        Ok(())
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_validate() {
        let config = LaserDetectionConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.default_axis, DetectionAxis::Y);
        assert_eq!(config.gaussian_blur_kernel, (5, 5));
    }

    #[test]
    fn test_even_kernel_rejected() {
        let config = LaserDetectionConfig {
            gaussian_blur_kernel: (4, 5),
            ..Default::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("gaussian_blur_kernel"));
    }

    #[test]
    fn test_negative_intensity_rejected() {
        let config = LaserDetectionConfig {
            min_intensity: -1.0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_axis_parsing() {
        assert_eq!("X".parse::<DetectionAxis>().unwrap(), DetectionAxis::X);
        assert_eq!(" y ".parse::<DetectionAxis>().unwrap(), DetectionAxis::Y);
        assert!("z".parse::<DetectionAxis>().is_err());
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: LaserDetectionConfig =
            serde_json::from_str(r#"{"default_axis": "x", "gaussian_blur_kernel": [3, 3]}"#)
                .unwrap();
        assert_eq!(config.default_axis, DetectionAxis::X);
        assert_eq!(config.gaussian_blur_kernel, (3, 3));
        assert_eq!(config.min_intensity, 10.0);
    }
}
