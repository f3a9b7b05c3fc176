// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # Configuration Integration Tests
//!
//! Loading configuration files and building hardware objects from them.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use approx::assert_relative_eq;
use cobot_calibration::LaserFrameSource;
use cobot_config::{CobotConfig, ConfigError, ConfigLoader, GlueType, LogFormat, LogLevel};
use cobot_modbus::{ModbusBusScanner, ModbusDeviceClient, Parity};
use cobot_tests::prelude::*;
use cobot_vision::{DetectionAxis, LaserLineDetector};

// =============================================================================
// Test Helpers
// =============================================================================

fn env(vars: &'static [(&'static str, &'static str)]) -> impl Fn(&str) -> Option<String> {
    move |name| {
        vars.iter()
            .find(|(key, _)| *key == name)
            .map(|(_, value)| value.to_string())
    }
}

fn write_config(dir: &Path, content: &str) -> PathBuf {
    let path = dir.join("cobot.json");
    std::fs::write(&path, content).unwrap();
    path
}

fn load_fixture(vars: &'static [(&'static str, &'static str)]) -> (tempfile::TempDir, CobotConfig) {
    let dir = temp_test_dir("cobot_config");
    let path = write_config(dir.path(), ConfigFixtures::full_json());
    let config = ConfigLoader::new().load_with(&path, env(vars)).unwrap();
    (dir, config)
}

// =============================================================================
// Loading Tests
// =============================================================================

#[test]
fn test_load_full_file_with_placeholder_default() {
    init_test_logging();
    let (_dir, config) = load_fixture(&[]);

    assert_eq!(config.modbus.port, "/dev/ttyUSB3");
    assert_eq!(config.modbus.baud_rate, 9600);
    assert_eq!(config.modbus.slave_address, 5);
    assert_eq!(config.modbus.parity, Parity::Even);
    assert_eq!(config.modbus.timeout, Duration::from_millis(30));
    assert_eq!(config.modbus.max_retries, 10);
    assert_eq!(config.logging.level, LogLevel::Debug);
    assert_eq!(config.logging.format, LogFormat::Json);
}

#[test]
fn test_load_placeholder_from_environment() {
    let (_dir, config) = load_fixture(&[("COBOT_TEST_SERIAL", "/dev/ttyACM0")]);
    assert_eq!(config.modbus.port, "/dev/ttyACM0");
}

#[test]
fn test_load_env_overrides_take_precedence() {
    let (_dir, config) = load_fixture(&[
        ("COBOT_TEST_SERIAL", "/dev/ttyACM0"),
        ("COBOT_MODBUS_PORT", "/dev/ttyS1"),
        ("COBOT_MODBUS_BAUD_RATE", "19200"),
        ("COBOT_LOG_LEVEL", "warn"),
    ]);

    assert_eq!(config.modbus.port, "/dev/ttyS1");
    assert_eq!(config.modbus.baud_rate, 19200);
    assert_eq!(config.logging.level, LogLevel::Warn);
}

#[test]
fn test_load_rejects_malformed_env_override() {
    let dir = temp_test_dir("cobot_config");
    let path = write_config(dir.path(), ConfigFixtures::full_json());

    let err = ConfigLoader::new()
        .load_with(&path, env(&[("COBOT_MODBUS_MAX_RETRIES", "many")]))
        .unwrap_err();

    assert!(matches!(
        err,
        ConfigError::InvalidEnvVar { ref name, .. } if name == "COBOT_MODBUS_MAX_RETRIES"
    ));
}

#[test]
fn test_load_resolves_storage_path_against_config_dir() {
    let (dir, config) = load_fixture(&[]);
    assert_eq!(
        config.calibration.storage_path,
        dir.path().join("calibration").join("laser.json")
    );
}

#[test]
fn test_load_calibration_and_laser_sections() {
    let (_dir, config) = load_fixture(&[]);

    let run = &config.calibration.run;
    assert_eq!(run.num_iterations, 8);
    assert_relative_eq!(run.step_size_mm, 0.5);
    assert_eq!(run.movement_timeout, Duration::from_secs(10));
    assert_eq!(run.detection_axis, DetectionAxis::X);
    // Unset values keep their defaults
    assert_eq!(run.calibration_max_attempts, 5);

    assert_relative_eq!(config.laser.min_intensity, 12.0);
    assert_eq!(config.laser.gaussian_blur_kernel, (3, 3));
}

#[test]
fn test_load_cells_and_glue_types() {
    let (_dir, config) = load_fixture(&[]);

    assert_eq!(config.cells.cell_ids(), vec![1, 2, 3]);
    assert_eq!(config.cells.motor_address(3).unwrap(), 4);
    assert!(config.cells.motor_address(4).is_err());
    assert_eq!(config.cells.glue_type(1), Some(&GlueType::TypeA));
    assert_eq!(config.cells.glue_type(2), Some(&GlueType::TypeB));
    assert_eq!(
        config.cells.glue_type(3),
        Some(&GlueType::Custom("Epoxy 2K".to_string()))
    );
}

#[test]
fn test_load_missing_file() {
    let dir = temp_test_dir("cobot_config");
    let err = ConfigLoader::new()
        .load_with(dir.path().join("absent.json"), env(&[]))
        .unwrap_err();
    assert!(matches!(err, ConfigError::FileNotFound { .. }));
}

#[test]
fn test_load_rejects_unknown_section() {
    let dir = temp_test_dir("cobot_config");
    let path = write_config(dir.path(), r#"{"modbus": {"port": "/dev/ttyUSB0"}, "robot": {}}"#);

    let err = ConfigLoader::new().load_with(&path, env(&[])).unwrap_err();

    assert!(matches!(err, ConfigError::Parse { .. }));
}

#[test]
fn test_load_rejects_invalid_scan_range() {
    let dir = temp_test_dir("cobot_config");
    let path = write_config(
        dir.path(),
        r#"{"scan": {"start_address": 20, "end_address": 10}}"#,
    );

    let err = ConfigLoader::new().load_with(&path, env(&[])).unwrap_err();

    assert!(matches!(err, ConfigError::Validation { ref field, .. } if field == "scan"));
}

// =============================================================================
// Hardware From Configuration
// =============================================================================

#[tokio::test]
async fn test_loaded_config_drives_scan_and_client() {
    let (_dir, config) = load_fixture(&[]);
    let bus = SimulatedBus::new().with_device(5, &[(0, 321)]);
    let transport = SerialFixtures::transport(&bus, config.modbus.clone());

    let scanner =
        ModbusBusScanner::new(transport.clone()).with_probe_retries(config.scan.probe_retries);
    let result = scanner.scan_request(&config.scan.to_request()).await.unwrap();
    assert_eq!(result.responding(), vec![5]);
    assert_eq!(result.probes().len(), 16);

    let client = ModbusDeviceClient::for_default_slave(Arc::clone(&transport)).unwrap();
    assert_relative_eq!(client.read_register(0, 2).await.unwrap(), 3.21, epsilon = 1e-9);
}

#[tokio::test]
async fn test_loaded_config_builds_detector() {
    let (_dir, config) = load_fixture(&[]);
    let detector = LaserLineDetector::new(config.laser.clone()).unwrap();

    let robot = Arc::new(SimulatedRobot::new());
    let camera = SyntheticLaserCamera::new(robot, CalibrationFixtures::START_Z);
    let pair = camera.capture_pair().await.unwrap();

    let detection = detector.detect_pair(&pair, DetectionAxis::Y).unwrap();
    assert_relative_eq!(detection.closest_point.x, 60.0, epsilon = 1e-6);
}
