// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # cobot-config
//!
//! Configuration for the glue-cell controller.
//!
//! ## Features
//!
//! - JSON configuration file with per-section defaults
//! - `${VAR}` / `${VAR:default}` placeholders
//! - `COBOT_*` environment overrides
//! - Cell to motor register mapping and glue types
//!
//! ## Example
//!
//! ```json
//! {
//!   "modbus": { "port": "/dev/ttyUSB0", "baud_rate": 115200, "slave_address": 1 },
//!   "scan": { "start_address": 1, "end_address": 32 },
//!   "laser": { "min_intensity": 10.0, "gaussian_blur_kernel": [5, 5] },
//!   "calibration": { "storage_path": "laser_calibration.json", "num_iterations": 10 },
//!   "cells": { "cell_motor_mapping": { "1": 0, "2": 2, "3": 4, "4": 6 } },
//!   "logging": { "level": "info", "format": "text" }
//! }
//! ```

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]
#![deny(unsafe_code)]

pub mod cells;
pub mod error;
pub mod loader;
pub mod schema;

pub use cells::{CellHardwareConfig, GlueType};
pub use error::{ConfigError, ConfigResult};
pub use loader::{ConfigLoader, DEFAULT_CONFIG_FILE, DEFAULT_ENV_PREFIX, load_config};
pub use schema::{
    CalibrationSettings, CobotConfig, LogFormat, LogLevel, LoggingConfig, ScanSettings,
};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
