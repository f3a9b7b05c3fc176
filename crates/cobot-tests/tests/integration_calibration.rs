// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # Calibration Integration Tests
//!
//! Laser height calibration from homing to the persisted model, against a
//! simulated robot and a synthetic camera.
//!
//! ## Test Categories
//!
//! - `test_session_*`: Complete and aborted calibration runs
//! - `test_fit_*`: Polynomial selection on recorded data
//! - `test_store_*`: Model persistence

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use approx::assert_relative_eq;
use async_trait::async_trait;
use cobot_calibration::{
    CalibrationError, CalibrationResult, CalibrationSample, CalibrationSession, CalibrationStore,
    JsonFileStore, LaserFrameSource, MemoryStore, PolynomialFitSelector, SessionState,
};
use cobot_tests::prelude::*;
use cobot_vision::{FramePair, Point2};

// =============================================================================
// Test Helpers
// =============================================================================

struct Rig {
    robot: Arc<SimulatedRobot>,
    camera: Arc<SyntheticLaserCamera>,
    store: Arc<MemoryStore>,
    session: CalibrationSession,
}

fn rig_with(
    robot: SimulatedRobot,
    configure: impl FnOnce(SyntheticLaserCamera) -> SyntheticLaserCamera,
) -> Rig {
    let robot = Arc::new(robot);
    let camera = Arc::new(configure(SyntheticLaserCamera::new(
        robot.clone(),
        CalibrationFixtures::START_Z,
    )));
    let store = Arc::new(MemoryStore::new());
    let session = CalibrationSession::builder()
        .robot(robot.clone())
        .source(camera.clone())
        .store(store.clone())
        .config(CalibrationFixtures::config())
        .build()
        .unwrap();
    Rig {
        robot,
        camera,
        store,
        session,
    }
}

fn rig() -> Rig {
    rig_with(SimulatedRobot::new(), |camera| camera)
}

/// Source that trips a cancellation flag after its first capture.
struct CancellingSource {
    inner: Arc<SyntheticLaserCamera>,
    cancel: Arc<AtomicBool>,
}

#[async_trait]
impl LaserFrameSource for CancellingSource {
    async fn capture_pair(&self) -> CalibrationResult<FramePair> {
        let pair = self.inner.capture_pair().await;
        self.cancel.store(true, Ordering::SeqCst);
        pair
    }
}

// =============================================================================
// Session Tests
// =============================================================================

#[tokio::test]
async fn test_session_linear_run_persists_model() {
    init_test_logging();
    let dir = temp_test_dir("cobot_calibration");
    let path = dir.path().join("cal").join("laser.json");
    let robot = Arc::new(SimulatedRobot::new());
    let camera = Arc::new(SyntheticLaserCamera::new(robot.clone(), CalibrationFixtures::START_Z));
    let store = Arc::new(JsonFileStore::new(&path));

    let mut session = CalibrationSession::builder()
        .robot(robot.clone())
        .source(camera)
        .store(store.clone())
        .config(CalibrationFixtures::config())
        .build()
        .unwrap();

    let start = CalibrationFixtures::start_position();
    let model = session.calibrate(start, Some(6), Some(1.0), None).await.unwrap();

    assert_eq!(session.state(), SessionState::Complete);
    assert_eq!(model.sample_count(), 7);
    assert_eq!(model.calibration_data[0], CalibrationSample::ZERO);
    assert_eq!(model.degree(), 1);
    assert_relative_eq!(model.r2(), 1.0, epsilon = 1e-9);
    assert_relative_eq!(model.predict_height(-12.0), 3.0, epsilon = 1e-6);
    assert_eq!(model.robot_initial_position, start);
    assert!(model.created_at.is_some());

    // Homing plus one move per step, each 1 mm lower
    let moves = robot.moves();
    assert_eq!(moves.len(), 7);
    assert_relative_eq!(moves[6].z(), CalibrationFixtures::START_Z - 6.0, epsilon = 1e-9);

    let loaded = store.load().await.unwrap().unwrap();
    assert_eq!(loaded.calibration_data, model.calibration_data);
    assert_eq!(loaded.zero_reference_coords, model.zero_reference_coords);
    assert_eq!(loaded.created_at, model.created_at);
    assert_eq!(loaded.degree(), 1);
    assert_relative_eq!(loaded.predict_height(-12.0), 3.0, epsilon = 1e-6);
}

#[tokio::test]
async fn test_session_curved_response_selects_higher_degree() {
    let mut rig = rig_with(SimulatedRobot::new(), |camera| camera.with_response(3.0, 1.0));

    let model = rig
        .session
        .calibrate(CalibrationFixtures::start_position(), Some(5), Some(1.0), None)
        .await
        .unwrap();

    assert!(model.degree() >= 2);
    assert!(model.r2() > 0.999);
    for sample in &model.calibration_data {
        assert!(
            (model.predict_height(sample.pixel_delta) - sample.height_mm).abs() < 0.05,
            "sample {:?}",
            sample
        );
    }
    assert_eq!(rig.store.save_count(), 1);
}

#[tokio::test]
async fn test_session_tolerates_dropped_frames() {
    let mut rig = rig();
    rig.camera.drop_next(2);

    let model = rig
        .session
        .calibrate(CalibrationFixtures::start_position(), Some(3), Some(1.0), None)
        .await
        .unwrap();

    assert_eq!(model.sample_count(), 4);
    assert!(rig.session.skipped_steps().is_empty());
    // Two lost captures before the zero reference, then one per step
    assert_eq!(rig.camera.capture_count(), 6);
}

#[tokio::test]
async fn test_session_zero_reference_not_found() {
    let mut rig = rig();
    rig.camera.drop_next(u32::MAX);

    let err = rig
        .session
        .calibrate(CalibrationFixtures::start_position(), Some(3), Some(1.0), None)
        .await
        .unwrap_err();

    assert!(matches!(err, CalibrationError::ZeroReferenceNotFound { captures: 3 }));
    assert_eq!(rig.session.state(), SessionState::Failed);
    assert!(rig.session.samples().is_empty());
    assert_eq!(rig.robot.move_count(), 1);
}

#[tokio::test]
async fn test_session_unreachable_pose() {
    let mut rig = rig_with(SimulatedRobot::new().reachable_moves(3), |camera| camera);

    let err = rig
        .session
        .calibrate(CalibrationFixtures::start_position(), Some(5), Some(1.0), None)
        .await
        .unwrap_err();

    assert!(matches!(err, CalibrationError::PositionUnreachable { .. }));
    assert!(err.is_motion_error());
    assert_eq!(rig.session.samples().len(), 3);
    assert_eq!(rig.store.save_count(), 0);
}

#[tokio::test]
async fn test_session_robot_rejects_motion() {
    let mut rig = rig_with(SimulatedRobot::new().failing(), |camera| camera);

    let err = rig
        .session
        .calibrate(CalibrationFixtures::start_position(), None, None, Some(0))
        .await
        .unwrap_err();

    assert!(matches!(err, CalibrationError::Robot { .. }));
    assert_eq!(rig.session.state(), SessionState::Failed);
}

#[tokio::test]
async fn test_session_camera_failure_aborts() {
    let robot = Arc::new(SimulatedRobot::new());
    let mut session = CalibrationSession::builder()
        .robot(robot.clone())
        .source(Arc::new(BrokenCamera))
        .store(Arc::new(MemoryStore::new()))
        .config(CalibrationFixtures::config())
        .build()
        .unwrap();

    let err = session
        .calibrate(CalibrationFixtures::start_position(), Some(2), Some(1.0), None)
        .await
        .unwrap_err();

    assert!(matches!(err, CalibrationError::Camera { .. }));
    assert_eq!(robot.move_count(), 1);
}

#[tokio::test]
async fn test_session_safety_floor_blocks_motion() {
    let robot = Arc::new(SimulatedRobot::new());
    let camera = Arc::new(SyntheticLaserCamera::new(robot.clone(), CalibrationFixtures::START_Z));
    let mut config = CalibrationFixtures::config();
    config.min_safety_z_mm = CalibrationFixtures::START_Z - 2.5;

    let mut session = CalibrationSession::builder()
        .robot(robot.clone())
        .source(camera)
        .store(Arc::new(MemoryStore::new()))
        .config(config)
        .build()
        .unwrap();

    let err = session
        .calibrate(CalibrationFixtures::start_position(), Some(5), Some(1.0), None)
        .await
        .unwrap_err();

    assert!(matches!(err, CalibrationError::SafetyLimitViolation { step: 3, .. }));
    assert_eq!(robot.move_count(), 3);
    assert_relative_eq!(
        robot.pose().unwrap().z(),
        CalibrationFixtures::START_Z - 2.0,
        epsilon = 1e-9
    );
}

#[tokio::test]
async fn test_session_cancel_between_stages() {
    let robot = Arc::new(SimulatedRobot::new());
    let camera = Arc::new(SyntheticLaserCamera::new(robot.clone(), CalibrationFixtures::START_Z));
    let cancel = Arc::new(AtomicBool::new(false));

    let mut session = CalibrationSession::builder()
        .robot(robot.clone())
        .source(Arc::new(CancellingSource {
            inner: camera,
            cancel: cancel.clone(),
        }))
        .store(Arc::new(MemoryStore::new()))
        .config(CalibrationFixtures::config())
        .cancel_flag(cancel)
        .build()
        .unwrap();

    let err = session
        .calibrate(CalibrationFixtures::start_position(), Some(5), Some(1.0), None)
        .await
        .unwrap_err();

    assert!(matches!(err, CalibrationError::Cancelled { stage: "stepping" }));
    assert!(err.is_cancelled());
    assert_eq!(robot.move_count(), 1);
    assert_eq!(session.samples(), &[CalibrationSample::ZERO]);
}

#[tokio::test]
async fn test_session_state_is_observable() {
    let mut rig = rig();
    let receiver = rig.session.subscribe();
    assert_eq!(*receiver.borrow(), SessionState::NotStarted);

    rig.session
        .calibrate(CalibrationFixtures::start_position(), Some(2), Some(1.0), None)
        .await
        .unwrap();

    assert_eq!(*receiver.borrow(), SessionState::Complete);
    assert!(receiver.borrow().is_terminal());
}

// =============================================================================
// Fit Tests
// =============================================================================

#[test]
fn test_fit_quadratic_data_selects_degree_two() {
    let samples = CalibrationFixtures::quadratic_samples();

    let fit = PolynomialFitSelector::new().fit(&samples, 5).unwrap();

    assert_eq!(fit.degree, 2);
    assert_eq!(fit.coefficients.len(), 3);
    assert_relative_eq!(fit.coefficients[0], 0.0);
    assert_relative_eq!(fit.coefficients[1], -0.1, epsilon = 1e-6);
    assert_relative_eq!(fit.coefficients[2], 0.02, epsilon = 1e-6);
    assert_relative_eq!(fit.intercept, 0.5, epsilon = 1e-6);
}

#[test]
fn test_fit_all_reports_every_degree() {
    let samples = CalibrationFixtures::quadratic_samples();

    let fits = PolynomialFitSelector::new().fit_all(&samples, 4).unwrap();

    assert_eq!(fits.iter().map(|f| f.degree).collect::<Vec<_>>(), vec![1, 2, 3, 4]);
    assert!(fits[0].r2 < fits[1].r2);
}

#[test]
fn test_fit_linear_fixture() {
    let samples = CalibrationFixtures::linear_samples();

    let fit = PolynomialFitSelector::new().fit(&samples, 3).unwrap();

    assert_eq!(fit.degree, 1);
    assert_relative_eq!(fit.evaluate(-10.0), 2.5, epsilon = 1e-9);
}

#[test]
fn test_fit_rejects_single_sample() {
    let err = PolynomialFitSelector::new()
        .fit(&[CalibrationSample::ZERO], 5)
        .unwrap_err();
    assert!(matches!(err, CalibrationError::InsufficientData { required: 2, actual: 1 }));
}

// =============================================================================
// Store Tests
// =============================================================================

#[tokio::test]
async fn test_store_file_uses_documented_keys() {
    let dir = temp_test_dir("cobot_store");
    let store = JsonFileStore::in_dir(dir.path());
    let model = PolynomialFitSelector::new()
        .fit_model(
            Point2::new(100.0, 24.0),
            CalibrationFixtures::linear_samples(),
            CalibrationFixtures::start_position(),
            2,
        )
        .unwrap();

    store.save(&model).await.unwrap();

    let raw: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(store.path()).unwrap()).unwrap();
    for key in [
        "zero_reference_coords",
        "calibration_data",
        "robot_initial_position",
        "polynomial",
        "created_at",
    ] {
        assert!(raw.get(key).is_some(), "missing key {key}");
    }
    assert_eq!(raw["calibration_data"][1], serde_json::json!([1.0, -4.0]));
    assert_eq!(raw["polynomial"]["degree"], 1);
    assert!(store.path().ends_with("laser_calibration.json"));
}

#[tokio::test]
async fn test_store_missing_file_loads_none() {
    let dir = temp_test_dir("cobot_store");
    let store = JsonFileStore::in_dir(dir.path());
    assert!(store.load().await.unwrap().is_none());
}
