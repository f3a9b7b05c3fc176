// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Configuration schema definitions.
//!
//! # Schema Structure
//!
//! ```text
//! CobotConfig
//! ├── modbus: SerialPortConfig
//! ├── scan: ScanSettings
//! ├── laser: LaserDetectionConfig
//! ├── calibration: CalibrationSettings
//! ├── cells: CellHardwareConfig
//! └── logging: LoggingConfig
//! ```
//!
//! Every section is optional in the file and falls back to its defaults.

use std::path::PathBuf;

use cobot_calibration::{DEFAULT_CALIBRATION_FILE, LaserCalibrationConfig};
use cobot_modbus::SerialPortConfig;
use cobot_modbus::scanner::{DEFAULT_PROBE_RETRIES, ScanRequest};
use cobot_modbus::types::{MAX_SLAVE_ADDRESS, MIN_SLAVE_ADDRESS};
use cobot_vision::LaserDetectionConfig;
use serde::{Deserialize, Serialize};

use crate::cells::CellHardwareConfig;
use crate::error::{ConfigError, ConfigResult};

// =============================================================================
// Top-Level Configuration
// =============================================================================

/// The root configuration structure.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CobotConfig {
    /// Serial line and default slave.
    #[serde(default)]
    pub modbus: SerialPortConfig,

    /// Bus scan defaults.
    #[serde(default)]
    pub scan: ScanSettings,

    /// Laser line detector.
    #[serde(default)]
    pub laser: LaserDetectionConfig,

    /// Height calibration.
    #[serde(default)]
    pub calibration: CalibrationSettings,

    /// Glue cell hardware.
    #[serde(default)]
    pub cells: CellHardwareConfig,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl CobotConfig {
    /// Validates the entire configuration.
    pub fn validate(&self) -> ConfigResult<()> {
        self.modbus
            .validate()
            .map_err(|e| ConfigError::validation("modbus", e.to_string()))?;

        self.scan.validate()?;

        self.laser
            .validate()
            .map_err(|e| ConfigError::validation("laser", e.to_string()))?;

        self.calibration.validate()?;
        self.cells.validate()?;
        self.logging.validate()?;

        Ok(())
    }
}

// =============================================================================
// Scan Configuration
// =============================================================================

/// Bus scan defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ScanSettings {
    /// First address probed.
    pub start_address: u8,
    /// Last address probed.
    pub end_address: u8,
    /// Register read by each probe.
    pub test_register: u16,
    /// Decimal scaling of the probe value.
    pub decimals: u8,
    /// Retries per probe. Low values keep full-range scans short.
    pub probe_retries: u32,
}

impl Default for ScanSettings {
    fn default() -> Self {
        Self {
            start_address: MIN_SLAVE_ADDRESS,
            end_address: MAX_SLAVE_ADDRESS,
            test_register: 0,
            decimals: 0,
            probe_retries: DEFAULT_PROBE_RETRIES,
        }
    }
}

impl ScanSettings {
    /// Converts to a scan request.
    pub fn to_request(&self) -> ScanRequest {
        ScanRequest::new(self.start_address, self.end_address)
            .with_test_register(self.test_register)
            .with_decimals(self.decimals)
    }

    /// Validates the scan range.
    pub fn validate(&self) -> ConfigResult<()> {
        self.to_request()
            .validate()
            .map_err(|e| ConfigError::validation("scan", e.to_string()))
    }
}

// =============================================================================
// Calibration Configuration
// =============================================================================

/// Calibration run settings plus where the model is stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CalibrationSettings {
    /// Calibration file.
    pub storage_path: PathBuf,

    /// Run settings.
    #[serde(flatten)]
    pub run: LaserCalibrationConfig,
}

impl Default for CalibrationSettings {
    fn default() -> Self {
        Self {
            storage_path: PathBuf::from(DEFAULT_CALIBRATION_FILE),
            run: LaserCalibrationConfig::default(),
        }
    }
}

impl CalibrationSettings {
    /// Validates the calibration settings.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.storage_path.as_os_str().is_empty() {
            return Err(ConfigError::validation(
                "calibration.storage_path",
                "cannot be empty",
            ));
        }
        self.run
            .validate()
            .map_err(|e| ConfigError::validation("calibration", e.to_string()))
    }
}

// =============================================================================
// Logging Configuration
// =============================================================================

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoggingConfig {
    /// Log level.
    #[serde(default)]
    pub level: LogLevel,

    /// Log format.
    #[serde(default)]
    pub format: LogFormat,

    /// Include span targets in logs.
    #[serde(default = "default_enabled")]
    pub with_target: bool,

    /// Include file/line in logs.
    #[serde(default)]
    pub with_file: bool,

    /// Include thread IDs in logs.
    #[serde(default)]
    pub with_thread_ids: bool,
}

impl LoggingConfig {
    /// Validates the logging configuration.
    pub fn validate(&self) -> ConfigResult<()> {
        Ok(())
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: LogLevel::default(),
            format: LogFormat::default(),
            with_target: true,
            with_file: false,
            with_thread_ids: false,
        }
    }
}

fn default_enabled() -> bool {
    true
}

/// Log level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Trace level.
    Trace,
    /// Debug level.
    Debug,
    /// Info level.
    #[default]
    Info,
    /// Warning level.
    Warn,
    /// Error level.
    Error,
}

impl LogLevel {
    /// Returns the filter directive name.
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }

    /// Parses a level name; accepts `warning` for `warn`.
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "trace" => Some(LogLevel::Trace),
            "debug" => Some(LogLevel::Debug),
            "info" => Some(LogLevel::Info),
            "warn" | "warning" => Some(LogLevel::Warn),
            "error" => Some(LogLevel::Error),
            _ => None,
        }
    }
}

/// Log format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable text.
    #[default]
    Text,
    /// Compact single-line text.
    Compact,
    /// JSON lines.
    Json,
}

// =============================================================================
// Tests
// =============================================================================
