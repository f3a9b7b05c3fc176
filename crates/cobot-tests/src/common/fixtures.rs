// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # Test Fixtures
//!
//! Pre-built configurations and data sets.

use std::sync::Arc;
use std::time::Duration;

use cobot_calibration::{CalibrationSample, LaserCalibrationConfig, Position};
use cobot_modbus::{RetryStrategy, RtuTransport, SerialPortConfig};

use super::mocks::{SimulatedBus, SimulatedLine};

// =============================================================================
// Serial Fixtures
// =============================================================================

/// Serial settings and transports over a [`SimulatedBus`].
pub struct SerialFixtures;

impl SerialFixtures {
    /// Fast-timeout settings for the simulated line.
    pub fn config(baud_rate: u32, slave: u8, max_retries: u32) -> SerialPortConfig {
        SerialPortConfig::builder()
            .port("simulated")
            .baud_rate(baud_rate)
            .slave_address(slave)
            .timeout(Duration::from_millis(15))
            .inter_byte_timeout(Duration::from_millis(5))
            .max_retries(max_retries)
            .build()
            .expect("fixture serial config is valid")
    }

    /// Transport onto `bus` without delays between retries.
    pub fn transport(bus: &SimulatedBus, config: SerialPortConfig) -> Arc<RtuTransport<SimulatedLine>> {
        Arc::new(RtuTransport::with_line(config, bus.line()).with_retry_strategy(RetryStrategy::Immediate))
    }
}

// =============================================================================
// Calibration Fixtures
// =============================================================================

/// Poses, settings and sample sets for calibration tests.
pub struct CalibrationFixtures;

impl CalibrationFixtures {
    /// Height of the start pose.
    pub const START_Z: f64 = 300.0;

    /// Start pose above the workpiece.
    pub fn start_position() -> Position {
        Position::new(250.0, -120.0, Self::START_Z, 180.0, 0.0, 90.0)
    }

    /// Run settings with a safe floor well below the run.
    pub fn config() -> LaserCalibrationConfig {
        LaserCalibrationConfig {
            min_safety_z_mm: 200.0,
            delay_between_move_detect_ms: 0,
            ..LaserCalibrationConfig::default()
        }
    }

    /// `height = -0.25 * delta`, zero sample first.
    pub fn linear_samples() -> Vec<CalibrationSample> {
        (0..=6)
            .map(|h| CalibrationSample::new(f64::from(h), -4.0 * f64::from(h)))
            .collect()
    }

    /// `height = 0.5 - 0.1 * delta + 0.02 * delta²`.
    pub fn quadratic_samples() -> Vec<CalibrationSample> {
        (0..8)
            .map(|i| {
                let delta = -2.0 * f64::from(i);
                CalibrationSample::new(0.5 - 0.1 * delta + 0.02 * delta * delta, delta)
            })
            .collect()
    }
}

// =============================================================================
// Config Fixtures
// =============================================================================

/// Configuration files.
pub struct ConfigFixtures;

impl ConfigFixtures {
    /// A complete configuration file using a placeholder for the port.
    pub fn full_json() -> &'static str {
        r#"{
    "modbus": {
        "port": "${COBOT_TEST_SERIAL:/dev/ttyUSB3}",
        "baud_rate": 9600,
        "slave_address": 5,
        "parity": "even",
        "timeout": "30ms",
        "max_retries": 10
    },
    "scan": {"start_address": 1, "end_address": 16, "probe_retries": 0},
    "laser": {"min_intensity": 12.0, "gaussian_blur_kernel": [3, 3]},
    "calibration": {
        "storage_path": "calibration/laser.json",
        "num_iterations": 8,
        "step_size_mm": 0.5,
        "movement_timeout": "10s",
        "detection_axis": "x"
    },
    "cells": {
        "cell_motor_mapping": {"1": 0, "2": 2, "3": 4},
        "glue_types": {"1": "Type A", "2": "TypeB", "3": "Epoxy 2K"}
    },
    "logging": {"level": "debug", "format": "json"}
}"#
    }
}
