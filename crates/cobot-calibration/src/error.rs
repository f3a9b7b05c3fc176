// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Calibration error types.
//!
//! # Error Categories
//!
//! ```text
//! CalibrationError
//! ├── PositionUnreachable   - robot did not reach a commanded pose in time
//! ├── SafetyLimitViolation  - next step would go below the safety height
//! ├── ZeroReferenceNotFound - no laser line at the initial pose
//! ├── InsufficientData      - too few samples to fit
//! ├── InvalidDegree         - polynomial degree out of range
//! ├── Numerical             - least-squares solve failed
//! ├── Robot / Camera        - collaborator failures
//! ├── Storage               - persisting or loading the model failed
//! ├── Cancelled             - cancellation observed between steps
//! └── Configuration         - invalid calibration settings
//! ```
//!
//! Every variant aborts the session. A step whose detections fail is not an
//! error; it is logged and skipped.

use std::fmt;
use std::time::Duration;

use cobot_vision::VisionError;
use thiserror::Error;
use tracing::Level;

use crate::robot::Position;

/// Boxed source error for collaborator failures.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors raised by the calibration pipeline.
#[derive(Debug, Error)]
pub enum CalibrationError {
    /// The robot did not report reaching the target within the timeout.
    #[error("Position {position} not reached within {timeout:?}")]
    PositionUnreachable {
        /// Commanded pose.
        position: Position,
        /// Wait budget.
        timeout: Duration,
    },

    /// A safety check refused the next downward step.
    #[error("Safety limit violation at step {step}: {reason}")]
    SafetyLimitViolation {
        /// Step index (1-based); 0 before the first step.
        step: u32,
        /// What the check found.
        reason: String,
    },

    /// No laser line at the initial pose.
    #[error("Zero reference not found after {captures} capture(s)")]
    ZeroReferenceNotFound {
        /// Captures attempted.
        captures: u32,
    },

    /// Too few samples to fit a polynomial.
    #[error("Insufficient calibration data: need at least {required} samples, have {actual}")]
    InsufficientData {
        /// Minimum sample count.
        required: usize,
        /// Samples available.
        actual: usize,
    },

    /// Maximum polynomial degree out of range.
    #[error("Invalid polynomial degree {degree}: must be at least 1")]
    InvalidDegree {
        /// Requested degree.
        degree: usize,
    },

    /// The least-squares solve failed.
    #[error("Polynomial fit of degree {degree} failed: {reason}")]
    Numerical {
        /// Degree being fitted.
        degree: usize,
        /// Solver message.
        reason: String,
    },

    /// Robot collaborator failure.
    #[error("Robot error: {message}")]
    Robot {
        /// Description.
        message: String,
    },

    /// Camera collaborator failure.
    #[error("Camera error: {message}")]
    Camera {
        /// Description.
        message: String,
    },

    /// Model persistence failure.
    #[error("Calibration storage error: {message}")]
    Storage {
        /// Description.
        message: String,
        /// Underlying cause.
        #[source]
        source: Option<BoxError>,
    },

    /// Cancellation was requested.
    #[error("Calibration cancelled during {stage}")]
    Cancelled {
        /// Stage at which cancellation was observed.
        stage: &'static str,
    },

    /// Invalid settings.
    #[error("Invalid calibration setting '{field}': {reason}")]
    Configuration {
        /// Setting name.
        field: &'static str,
        /// Why the value is rejected.
        reason: String,
    },
}

impl CalibrationError {
    // =========================================================================
    // Factory Methods
    // =========================================================================

    /// Creates a position-unreachable error.
    pub fn position_unreachable(position: Position, timeout: Duration) -> Self {
        Self::PositionUnreachable { position, timeout }
    }

    /// Creates a safety limit violation.
    pub fn safety_limit(step: u32, reason: impl Into<String>) -> Self {
        Self::SafetyLimitViolation {
            step,
            reason: reason.into(),
        }
    }

    /// Creates a robot error.
    pub fn robot(message: impl Into<String>) -> Self {
        Self::Robot {
            message: message.into(),
        }
    }

    /// Creates a camera error.
    pub fn camera(message: impl Into<String>) -> Self {
        Self::Camera {
            message: message.into(),
        }
    }

    /// Creates a storage error with a source.
    pub fn storage(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Storage {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Creates a storage error without a source.
    pub fn storage_message(message: impl Into<String>) -> Self {
        Self::Storage {
            message: message.into(),
            source: None,
        }
    }

    /// Creates a configuration error.
    pub fn configuration(field: &'static str, reason: impl Into<String>) -> Self {
        Self::Configuration {
            field,
            reason: reason.into(),
        }
    }

    // =========================================================================
    // Classification
    // =========================================================================

    /// Returns `true` for failures caused by robot motion or its limits.
    pub fn is_motion_error(&self) -> bool {
        matches!(
            self,
            Self::PositionUnreachable { .. } | Self::SafetyLimitViolation { .. } | Self::Robot { .. }
        )
    }

    /// Returns `true` if the session was cancelled.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled { .. })
    }

    /// Returns `true` if rerunning the calibration may succeed without
    /// operator changes.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::ZeroReferenceNotFound { .. }
                | Self::PositionUnreachable { .. }
                | Self::Camera { .. }
                | Self::Storage { .. }
                | Self::Cancelled { .. }
        )
    }

    /// Returns the severity level of this error.
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            Self::SafetyLimitViolation { .. } => ErrorSeverity::Critical,
            Self::Configuration { .. } | Self::InvalidDegree { .. } => ErrorSeverity::Critical,
            Self::Cancelled { .. } => ErrorSeverity::Info,
            Self::InsufficientData { .. } | Self::ZeroReferenceNotFound { .. } => {
                ErrorSeverity::Warning
            }
            _ => ErrorSeverity::Error,
        }
    }

    /// Returns the error category for logging.
    pub fn category(&self) -> &'static str {
        match self {
            Self::PositionUnreachable { .. } | Self::SafetyLimitViolation { .. } => "motion",
            Self::ZeroReferenceNotFound { .. } => "detection",
            Self::InsufficientData { .. } | Self::InvalidDegree { .. } | Self::Numerical { .. } => {
                "fit"
            }
            Self::Robot { .. } => "robot",
            Self::Camera { .. } => "camera",
            Self::Storage { .. } => "storage",
            Self::Cancelled { .. } => "cancelled",
            Self::Configuration { .. } => "configuration",
        }
    }

    /// Returns a unique error code for this error.
    pub fn error_code(&self) -> ErrorCode {
        match self {
            Self::PositionUnreachable { .. } => ErrorCode::new(1, 1),
            Self::SafetyLimitViolation { .. } => ErrorCode::new(1, 2),
            Self::ZeroReferenceNotFound { .. } => ErrorCode::new(2, 1),
            Self::InsufficientData { .. } => ErrorCode::new(3, 1),
            Self::InvalidDegree { .. } => ErrorCode::new(3, 2),
            Self::Numerical { .. } => ErrorCode::new(3, 3),
            Self::Robot { .. } => ErrorCode::new(4, 1),
            Self::Camera { .. } => ErrorCode::new(4, 2),
            Self::Storage { .. } => ErrorCode::new(5, 1),
            Self::Cancelled { .. } => ErrorCode::new(6, 1),
            Self::Configuration { .. } => ErrorCode::new(7, 1),
        }
    }

    /// Returns recovery hints for this error.
    pub fn recovery_hints(&self) -> Vec<&'static str> {
        match self {
            Self::PositionUnreachable { .. } => vec![
                "Check that the initial position is inside the robot workspace",
                "Increase the movement timeout or threshold",
            ],
            Self::SafetyLimitViolation { .. } => vec![
                "Raise the initial position or reduce iterations / step size",
                "Verify the minimum safety height setting",
            ],
            Self::ZeroReferenceNotFound { .. } => vec![
                "Check that the laser is switched on and aimed into the camera view",
                "Lower the detector intensity floor",
            ],
            Self::InsufficientData { .. } => vec![
                "Increase the number of iterations or detection attempts",
            ],
            Self::Storage { .. } => vec!["Check that the calibration directory is writable"],
            _ => vec![],
        }
    }

    /// Returns the tracing level for this error.
    pub fn tracing_level(&self) -> Level {
        self.severity().to_tracing_level()
    }

    /// Logs this error with appropriate level and context.
    pub fn log(&self, context: &str) {
        let code = self.error_code();

        match self.tracing_level() {
            Level::ERROR => tracing::error!(
                error_code = %code,
                category = self.category(),
                context = context,
                "{self}"
            ),
            Level::WARN => tracing::warn!(
                error_code = %code,
                category = self.category(),
                context = context,
                "{self}"
            ),
            _ => tracing::info!(
                error_code = %code,
                category = self.category(),
                context = context,
                "{self}"
            ),
        }
    }
}

impl From<VisionError> for CalibrationError {
    fn from(error: VisionError) -> Self {
        match error {
            VisionError::InvalidConfig { field, reason } => Self::Configuration { field, reason },
        }
    }
}

/// A Result type with CalibrationError.
pub type CalibrationResult<T> = Result<T, CalibrationError>;

// =============================================================================
// Severity and codes
// =============================================================================

/// Error severity levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ErrorSeverity {
    /// Expected outcome, informational.
    Info,
    /// Recoverable by rerunning.
    Warning,
    /// Requires attention.
    Error,
    /// Requires operator intervention before rerunning.
    Critical,
}

impl ErrorSeverity {
    /// Converts to a tracing level.
    pub fn to_tracing_level(self) -> Level {
        match self {
            Self::Info => Level::INFO,
            Self::Warning => Level::WARN,
            Self::Error | Self::Critical => Level::ERROR,
        }
    }
}

/// Error code, displayed as `CAL-CCNN`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ErrorCode {
    category: u8,
    code: u8,
}

impl ErrorCode {
    /// Creates a new error code.
    pub const fn new(category: u8, code: u8) -> Self {
        Self { category, code }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CAL-{:02X}{:02X}", self.category, self.code)
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code_display() {
        assert_eq!(
            CalibrationError::safety_limit(3, "z too low").error_code().to_string(),
            "CAL-0102"
        );
        assert_eq!(
            CalibrationError::InsufficientData { required: 2, actual: 1 }
                .error_code()
                .to_string(),
            "CAL-0301"
        );
    }

    #[test]
    fn test_classification() {
        assert!(CalibrationError::safety_limit(1, "x").is_motion_error());
        assert!(!CalibrationError::safety_limit(1, "x").is_retryable());
        assert!(CalibrationError::Cancelled { stage: "stepping" }.is_cancelled());
        assert_eq!(
            CalibrationError::Cancelled { stage: "stepping" }.severity(),
            ErrorSeverity::Info
        );
    }

    #[test]
    fn test_vision_error_becomes_configuration() {
        let error: CalibrationError =
            VisionError::invalid_config("gaussian_blur_kernel", "even").into();
        assert!(matches!(
            error,
            CalibrationError::Configuration { field: "gaussian_blur_kernel", .. }
        ));
    }

    #[test]
    fn test_display() {
        let error = CalibrationError::ZeroReferenceNotFound { captures: 3 };
        assert_eq!(error.to_string(), "Zero reference not found after 3 capture(s)");
    }
}
