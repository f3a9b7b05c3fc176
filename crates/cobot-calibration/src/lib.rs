// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # cobot-calibration
//!
//! Laser-triangulation height calibration for the glue-dispensing tool.
//!
//! A line laser mounted beside the camera shifts sideways in the image as the
//! tool approaches the workpiece. Calibration records that shift at known
//! heights and fits a polynomial mapping pixel delta back to height.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐   ┌────────────────────┐   ┌───────────────────┐
//! │ RobotMotion  │<──│ CalibrationSession │──>│ LaserFrameSource  │
//! └──────────────┘   └─────────┬──────────┘   └───────────────────┘
//!                              │ samples            │ frame pairs
//!                              ▼                    ▼
//!                  ┌───────────────────────┐  ┌───────────────────┐
//!                  │ PolynomialFitSelector │  │ LaserLineDetector │
//!                  └───────────┬───────────┘  └───────────────────┘
//!                              ▼
//!                  ┌───────────────────────┐
//!                  │   CalibrationStore    │
//!                  └───────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use cobot_calibration::{CalibrationSession, JsonFileStore, Position};
//!
//! let mut session = CalibrationSession::builder()
//!     .robot(robot)
//!     .source(camera)
//!     .store(Arc::new(JsonFileStore::new("laser_calibration.json")))
//!     .build()?;
//!
//! let model = session.calibrate(Position::new(0.0, 0.0, 300.0, 180.0, 0.0, 0.0), None, None, None).await?;
//! let height = model.predict_height(-12.5);
//! ```

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]
#![deny(unsafe_code)]

// =============================================================================
// Modules
// =============================================================================

pub mod config;
pub mod error;
pub mod fit;
pub mod model;
pub mod robot;
pub mod session;
pub mod source;
pub mod storage;

// =============================================================================
// Re-exports
// =============================================================================

pub use config::LaserCalibrationConfig;
pub use error::{CalibrationError, CalibrationResult, ErrorCode, ErrorSeverity};
pub use fit::{PolynomialFitSelector, r2_score};
pub use model::{CalibrationModel, CalibrationSample, PolynomialFit};
pub use robot::{MotionParams, Position, RobotMotion};
pub use session::{CalibrationSession, CalibrationSessionBuilder, SessionState};
pub use source::LaserFrameSource;
pub use storage::{CalibrationStore, DEFAULT_CALIBRATION_FILE, JsonFileStore, MemoryStore};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
