// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Vision error types.
//!
//! Detection itself never fails with an error: a frame pair without a usable
//! laser line simply yields no detection. Errors are reserved for invalid
//! detector settings.

use thiserror::Error;

/// Errors raised while configuring the detector.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VisionError {
    /// A configuration value is out of range.
    #[error("Invalid detector setting '{field}': {reason}")]
    InvalidConfig {
        /// Setting name.
        field: &'static str,
        /// Why the value is rejected.
        reason: String,
    },
}

impl VisionError {
    /// Creates an invalid configuration error.
    pub fn invalid_config(field: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidConfig {
            field,
            reason: reason.into(),
        }
    }
}

/// A Result type with VisionError.
pub type VisionResult<T> = Result<T, VisionError>;
