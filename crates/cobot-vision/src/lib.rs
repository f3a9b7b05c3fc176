// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # cobot-vision
//!
//! Image-plane laser line detection for laser-triangulation height
//! calibration.
//!
//! A line laser is imaged twice, once switched on and once off. The red
//! channel difference isolates the laser; a Gaussian blur and an intensity
//! floor suppress noise; intensity-weighted centroids give a sub-pixel trace
//! of the line. The trace point nearest the image center is the measurement
//! the calibration pipeline tracks as the tool height changes.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use cobot_vision::{DetectionAxis, LaserDetectionConfig, LaserLineDetector};
//!
//! let detector = LaserLineDetector::new(LaserDetectionConfig::default())?;
//! if let Some(detection) = detector.detect(Some(&on), Some(&off), DetectionAxis::Y) {
//!     println!("line at {}", detection.closest_point);
//! }
//! ```

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]
#![deny(unsafe_code)]

// =============================================================================
// Modules
// =============================================================================

pub mod blur;
pub mod config;
pub mod detector;
pub mod error;
pub mod frame;

// =============================================================================
// Re-exports
// =============================================================================

pub use config::{DetectionAxis, LaserDetectionConfig};
pub use detector::{LaserDetection, LaserLineDetector, MASK_ON};
pub use error::{VisionError, VisionResult};
pub use frame::{BGR_RED_CHANNEL, Frame, FramePair, Pixel, Point2, solid_frame};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
