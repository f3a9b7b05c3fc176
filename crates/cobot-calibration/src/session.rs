// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Calibration session state machine.
//!
//! # States
//!
//! ```text
//! NotStarted ──> Homing ──> Capturing ──┬──> Stepping ──> Capturing ─┐
//!                                       │         ▲                  │
//!                                       │         └──────────────────┘
//!                                       └──> Fitting ──> Complete
//!
//!            any state ──> Failed
//! ```
//!
//! # Run
//!
//! 1. Move to the initial pose and wait until it is reached.
//! 2. Detect the laser line there; its closest point is the zero reference
//!    and `(0, 0.0)` the first sample.
//! 3. For each step: check the safety height, move down by one step, wait,
//!    then detect. A detection whose pixel delta points the wrong way is
//!    rejected. Each step has a fixed attempt budget; an exhausted budget
//!    skips the step.
//! 4. Fit a polynomial to the samples and persist the model.
//!
//! Cancellation is observed between moves, never while the robot is in
//! motion.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use cobot_vision::{DetectionAxis, LaserDetection, LaserDetectionConfig, LaserLineDetector, Point2};
use tokio::sync::watch;
use tracing::{debug, info, trace, warn};

use crate::config::{LaserCalibrationConfig, validate_step};
use crate::error::{CalibrationError, CalibrationResult};
use crate::fit::PolynomialFitSelector;
use crate::model::{CalibrationModel, CalibrationSample};
use crate::robot::{Position, RobotMotion};
use crate::source::LaserFrameSource;
use crate::storage::CalibrationStore;

// =============================================================================
// SessionState
// =============================================================================

/// Observable calibration state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SessionState {
    /// No run started.
    #[default]
    NotStarted,
    /// Moving to the initial pose.
    Homing,
    /// Detecting the laser line.
    Capturing,
    /// Moving down one step.
    Stepping,
    /// Fitting and persisting the model.
    Fitting,
    /// Run finished with a model.
    Complete,
    /// Run aborted.
    Failed,
}

impl SessionState {
    /// Returns the lowercase name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NotStarted => "not_started",
            Self::Homing => "homing",
            Self::Capturing => "capturing",
            Self::Stepping => "stepping",
            Self::Fitting => "fitting",
            Self::Complete => "complete",
            Self::Failed => "failed",
        }
    }

    /// Returns `true` once a run has ended.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Complete | Self::Failed)
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// CalibrationSession
// =============================================================================

/// Runs laser height calibrations against a robot and a laser camera.
pub struct CalibrationSession {
    robot: Arc<dyn RobotMotion>,
    source: Arc<dyn LaserFrameSource>,
    store: Arc<dyn CalibrationStore>,
    detector: LaserLineDetector,
    selector: PolynomialFitSelector,
    config: LaserCalibrationConfig,
    cancel: Arc<AtomicBool>,
    state: watch::Sender<SessionState>,
    samples: Vec<CalibrationSample>,
    zero_reference: Option<Point2>,
    skipped_steps: Vec<u32>,
}

impl fmt::Debug for CalibrationSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CalibrationSession")
            .field("state", &self.state())
            .field("config", &self.config)
            .field("samples", &self.samples.len())
            .field("zero_reference", &self.zero_reference)
            .finish_non_exhaustive()
    }
}

impl CalibrationSession {
    /// Creates a builder.
    pub fn builder() -> CalibrationSessionBuilder {
        CalibrationSessionBuilder::default()
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    /// Current state.
    pub fn state(&self) -> SessionState {
        *self.state.borrow()
    }

    /// Subscribes to state changes.
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    /// Samples of the current or last run.
    pub fn samples(&self) -> &[CalibrationSample] {
        &self.samples
    }

    /// Zero reference of the current or last run.
    pub fn zero_reference(&self) -> Option<Point2> {
        self.zero_reference
    }

    /// Steps skipped in the current or last run because no acceptable
    /// detection was found.
    pub fn skipped_steps(&self) -> &[u32] {
        &self.skipped_steps
    }

    /// Run settings.
    pub fn config(&self) -> &LaserCalibrationConfig {
        &self.config
    }

    /// Flag that cancels the run when set.
    pub fn cancel_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancel)
    }

    /// Requests cancellation of the current run, or of the next one if no
    /// run is in progress. The run that stops on the request clears the
    /// flag, so later runs start normally.
    pub fn cancel(&self) {
        self.cancel.store(true, Ordering::SeqCst);
    }

    // =========================================================================
    // Run
    // =========================================================================

    /// Runs a calibration from `initial_position`.
    ///
    /// `None` arguments fall back to the session config. On success the
    /// model has been persisted through the store. On failure the samples
    /// collected so far remain available through [`samples`](Self::samples).
    pub async fn calibrate(
        &mut self,
        initial_position: Position,
        iterations: Option<u32>,
        step_mm: Option<f64>,
        delay_ms: Option<u64>,
    ) -> CalibrationResult<CalibrationModel> {
        let iterations = iterations.unwrap_or(self.config.num_iterations);
        let step_mm = step_mm.unwrap_or(self.config.step_size_mm);
        let delay = Duration::from_millis(delay_ms.unwrap_or(self.config.delay_between_move_detect_ms));

        self.samples.clear();
        self.skipped_steps.clear();
        self.zero_reference = None;

        info!(
            position = %initial_position,
            iterations,
            step_mm,
            delay_ms = delay.as_millis() as u64,
            "Starting laser calibration"
        );

        match self.run(initial_position, iterations, step_mm, delay).await {
            Ok(model) => {
                self.set_state(SessionState::Complete);
                info!(
                    degree = model.degree(),
                    r2 = model.r2(),
                    samples = model.sample_count(),
                    skipped = self.skipped_steps.len(),
                    "Laser calibration complete"
                );
                Ok(model)
            }
            Err(error) => {
                if error.is_cancelled() {
                    self.cancel.store(false, Ordering::SeqCst);
                }
                self.set_state(SessionState::Failed);
                error.log("laser calibration");
                Err(error)
            }
        }
    }

    async fn run(
        &mut self,
        initial_position: Position,
        iterations: u32,
        step_mm: f64,
        delay: Duration,
    ) -> CalibrationResult<CalibrationModel> {
        validate_step(step_mm)?;

        // Homing
        self.check_cancelled("homing")?;
        self.set_state(SessionState::Homing);
        self.move_and_wait(&initial_position).await?;
        tokio::time::sleep(delay).await;

        // Zero reference
        self.check_cancelled("capturing")?;
        self.set_state(SessionState::Capturing);
        let retries = self.config.calibration_detection_retries.max(1);
        let zero = self
            .detect(self.config.detection_axis, retries)
            .await?
            .ok_or(CalibrationError::ZeroReferenceNotFound { captures: retries })?
            .closest_point;
        info!(zero = %zero, "Zero reference detected");
        self.zero_reference = Some(zero);
        self.samples.push(CalibrationSample::ZERO);

        for step in 1..=iterations {
            self.check_cancelled("stepping")?;
            self.set_state(SessionState::Stepping);
            self.step_down(step, step_mm).await?;
            tokio::time::sleep(delay).await;

            self.set_state(SessionState::Capturing);
            let height = f64::from(step) * step_mm;
            match self.capture_delta(step, &zero).await? {
                Some(delta) => {
                    info!(step, height_mm = height, delta, "Captured calibration point");
                    self.samples.push(CalibrationSample::new(height, delta));
                }
                None => {
                    warn!(
                        step,
                        attempts = self.config.calibration_max_attempts,
                        "No acceptable laser detection, skipping step"
                    );
                    self.skipped_steps.push(step);
                }
            }
        }

        self.check_cancelled("fitting")?;
        self.set_state(SessionState::Fitting);
        let model = self.selector.fit_model(
            zero,
            self.samples.clone(),
            initial_position,
            self.config.max_polynomial_degree,
        )?;
        self.store.save(&model).await?;
        Ok(model)
    }

    /// Checks the safety height, then lowers the tool by one step.
    async fn step_down(&self, step: u32, step_mm: f64) -> CalibrationResult<()> {
        let min_z = self.config.min_safety_z_mm;
        let current = self.robot.current_position().await.ok_or_else(|| {
            CalibrationError::safety_limit(step, "current robot position unavailable")
        })?;

        if current.z() <= min_z {
            return Err(CalibrationError::safety_limit(
                step,
                format!("current Z {:.3} mm is at or below the minimum {:.3} mm", current.z(), min_z),
            ));
        }

        let target = current.lowered_by(step_mm);
        if target.z() < min_z {
            return Err(CalibrationError::safety_limit(
                step,
                format!("target Z {:.3} mm would go below the minimum {:.3} mm", target.z(), min_z),
            ));
        }

        debug!(step, from_z = current.z(), to_z = target.z(), "Stepping down");
        self.move_and_wait(&target).await
    }

    async fn move_and_wait(&self, target: &Position) -> CalibrationResult<()> {
        let params = self.config.motion_params();
        self.robot.move_to_position(target, &params).await?;

        let timeout = self.config.movement_timeout;
        if !self
            .robot
            .wait_until_reached(target, self.config.movement_threshold, timeout)
            .await
        {
            return Err(CalibrationError::position_unreachable(*target, timeout));
        }
        Ok(())
    }

    /// Returns the accepted pixel delta for a step, or `None` if every
    /// attempt failed or was rejected.
    async fn capture_delta(&self, step: u32, zero: &Point2) -> CalibrationResult<Option<f64>> {
        let axis = self.config.detection_axis;
        let retries = self.config.calibration_detection_retries.max(1);

        for attempt in 1..=self.config.calibration_max_attempts {
            let Some(detection) = self.detect(axis, retries).await? else {
                debug!(step, attempt, "Laser line not detected");
                continue;
            };

            let delta = measurement(zero, axis) - measurement(&detection.closest_point, axis);
            if delta > 0.0 {
                debug!(step, attempt, delta, "Rejected detection with positive delta");
                continue;
            }
            return Ok(Some(delta));
        }
        Ok(None)
    }

    /// Captures up to `captures` frame pairs until one yields a detection.
    async fn detect(
        &self,
        axis: DetectionAxis,
        captures: u32,
    ) -> CalibrationResult<Option<LaserDetection>> {
        for capture in 1..=captures {
            let pair = self.source.capture_pair().await?;
            if let Some(detection) = self.detector.detect_pair(&pair, axis) {
                return Ok(Some(detection));
            }
            trace!(capture, captures, "No laser line in capture");
        }
        Ok(None)
    }

    fn check_cancelled(&self, stage: &'static str) -> CalibrationResult<()> {
        if self.cancel.load(Ordering::SeqCst) {
            return Err(CalibrationError::Cancelled { stage });
        }
        Ok(())
    }

    fn set_state(&self, state: SessionState) {
        let previous = self.state.send_replace(state);
        if previous != state {
            debug!(from = %previous, to = %state, "Calibration state changed");
        }
    }
}

/// Coordinate that moves with height: x for a line traced along Y, y for a
/// line traced along X.
fn measurement(point: &Point2, axis: DetectionAxis) -> f64 {
    match axis {
        DetectionAxis::Y => point.x,
        DetectionAxis::X => point.y,
    }
}

// =============================================================================
// CalibrationSessionBuilder
// =============================================================================

/// Builder for [`CalibrationSession`].
#[derive(Default)]
pub struct CalibrationSessionBuilder {
    robot: Option<Arc<dyn RobotMotion>>,
    source: Option<Arc<dyn LaserFrameSource>>,
    store: Option<Arc<dyn CalibrationStore>>,
    detector: Option<LaserDetectionConfig>,
    config: Option<LaserCalibrationConfig>,
    cancel: Option<Arc<AtomicBool>>,
}

impl CalibrationSessionBuilder {
    /// Sets the robot.
    pub fn robot(mut self, robot: Arc<dyn RobotMotion>) -> Self {
        self.robot = Some(robot);
        self
    }

    /// Sets the frame source.
    pub fn source(mut self, source: Arc<dyn LaserFrameSource>) -> Self {
        self.source = Some(source);
        self
    }

    /// Sets the model store.
    pub fn store(mut self, store: Arc<dyn CalibrationStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Sets the detector settings.
    pub fn detector(mut self, config: LaserDetectionConfig) -> Self {
        self.detector = Some(config);
        self
    }

    /// Sets the run settings.
    pub fn config(mut self, config: LaserCalibrationConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Shares an external cancellation flag. A run that stops on the flag
    /// clears it.
    pub fn cancel_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.cancel = Some(flag);
        self
    }

    /// Builds the session.
    pub fn build(self) -> CalibrationResult<CalibrationSession> {
        let robot = self
            .robot
            .ok_or_else(|| CalibrationError::configuration("robot", "is required"))?;
        let source = self
            .source
            .ok_or_else(|| CalibrationError::configuration("source", "is required"))?;
        let store = self
            .store
            .ok_or_else(|| CalibrationError::configuration("store", "is required"))?;

        let config = self.config.unwrap_or_default();
        config.validate()?;
        let detector = LaserLineDetector::new(self.detector.unwrap_or_default())?;

        let (state, _) = watch::channel(SessionState::NotStarted);

        Ok(CalibrationSession {
            robot,
            source,
            store,
            detector,
            selector: PolynomialFitSelector::new(),
            config,
            cancel: self.cancel.unwrap_or_default(),
            state,
            samples: Vec::new(),
            zero_reference: None,
            skipped_steps: Vec::new(),
        })
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;
    use async_trait::async_trait;
    use cobot_vision::{FramePair, solid_frame};
    use parking_lot::Mutex;

    const START_Z: f64 = 300.0;

    /// Arm that reaches every commanded pose instantly.
    #[derive(Default)]
    struct InstantRobot {
        pose: Mutex<Option<Position>>,
        moves: Mutex<Vec<Position>>,
    }

    #[async_trait]
    impl RobotMotion for InstantRobot {
        async fn move_to_position(
            &self,
            position: &Position,
            _params: &crate::robot::MotionParams,
        ) -> CalibrationResult<()> {
            *self.pose.lock() = Some(*position);
            self.moves.lock().push(*position);
            Ok(())
        }

        async fn wait_until_reached(&self, _: &Position, _: f64, _: Duration) -> bool {
            true
        }

        async fn current_position(&self) -> Option<Position> {
            *self.pose.lock()
        }
    }

    /// Camera whose laser column shifts right by `px_per_mm` as the tool
    /// goes down.
    struct ShiftingLaser {
        robot: Arc<InstantRobot>,
        px_per_mm: f64,
    }

    #[async_trait]
    impl LaserFrameSource for ShiftingLaser {
        async fn capture_pair(&self) -> CalibrationResult<FramePair> {
            let z = self.robot.pose.lock().map(|p| p.z()).unwrap_or(START_Z);
            let col = (60.0 + (START_Z - z) * self.px_per_mm).round() as usize;
            let off = solid_frame(40, 160, [0, 0, 0]);
            let mut on = off.clone();
            for row in 0..40 {
                on[[row, col, 2]] = 200;
            }
            Ok(FramePair::new(on, off))
        }
    }

    fn session(px_per_mm: f64, config: LaserCalibrationConfig) -> (CalibrationSession, Arc<InstantRobot>, Arc<MemoryStore>) {
        let robot = Arc::new(InstantRobot::default());
        let store = Arc::new(MemoryStore::new());
        let session = CalibrationSession::builder()
            .robot(robot.clone())
            .source(Arc::new(ShiftingLaser {
                robot: robot.clone(),
                px_per_mm,
            }))
            .store(store.clone())
            .config(config)
            .build()
            .unwrap();
        (session, robot, store)
    }

    fn start() -> Position {
        Position::new(0.0, 0.0, START_Z, 180.0, 0.0, 0.0)
    }

    #[tokio::test]
    async fn test_linear_run() {
        let (mut session, robot, store) = session(4.0, LaserCalibrationConfig::default());

        let model = session.calibrate(start(), Some(5), Some(1.0), Some(0)).await.unwrap();

        assert_eq!(session.state(), SessionState::Complete);
        assert_eq!(model.calibration_data[0], CalibrationSample::ZERO);
        assert_eq!(model.sample_count(), 6);
        assert_eq!(model.degree(), 1);
        approx::assert_relative_eq!(model.predict_height(-8.0), 2.0, epsilon = 1e-6);
        assert_eq!(robot.moves.lock().len(), 6);
        assert_eq!(store.save_count(), 1);
    }

    #[tokio::test]
    async fn test_wrong_sign_steps_are_skipped() {
        // Line moves left: every delta is positive
        let (mut session, _, store) = session(-4.0, LaserCalibrationConfig::default());

        let err = session.calibrate(start(), Some(3), Some(1.0), Some(0)).await.unwrap_err();

        assert!(matches!(err, CalibrationError::InsufficientData { actual: 1, .. }));
        assert_eq!(session.skipped_steps(), &[1, 2, 3]);
        assert_eq!(session.samples(), &[CalibrationSample::ZERO]);
        assert_eq!(session.state(), SessionState::Failed);
        assert_eq!(store.save_count(), 0);
    }

    #[tokio::test]
    async fn test_safety_limit_stops_before_moving() {
        let config = LaserCalibrationConfig {
            min_safety_z_mm: START_Z - 2.5,
            ..Default::default()
        };
        let (mut session, robot, _) = session(4.0, config);

        let err = session.calibrate(start(), Some(5), Some(1.0), Some(0)).await.unwrap_err();

        assert!(matches!(err, CalibrationError::SafetyLimitViolation { step: 3, .. }));
        // Homing plus two steps; the third step never moved
        assert_eq!(robot.moves.lock().len(), 3);
        assert_eq!(session.samples().len(), 3);
    }

    #[tokio::test]
    async fn test_cancel_before_start() {
        let (mut session, robot, _) = session(4.0, LaserCalibrationConfig::default());
        session.cancel();

        let err = session.calibrate(start(), Some(2), Some(1.0), Some(0)).await.unwrap_err();

        assert!(err.is_cancelled());
        assert!(robot.moves.lock().is_empty());
    }

    #[tokio::test]
    async fn test_run_after_cancelled_run_starts_normally() {
        let (mut session, robot, store) = session(4.0, LaserCalibrationConfig::default());
        session.cancel();
        let err = session.calibrate(start(), Some(2), Some(1.0), Some(0)).await.unwrap_err();
        assert!(matches!(err, CalibrationError::Cancelled { stage: "homing" }));

        let model = session.calibrate(start(), Some(2), Some(1.0), Some(0)).await.unwrap();

        assert_eq!(model.sample_count(), 3);
        assert!(!session.cancel_flag().load(Ordering::SeqCst));
        assert_eq!(robot.moves.lock().len(), 3);
        assert!(store.load().await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_state_is_observable() {
        let (mut session, _, _) = session(4.0, LaserCalibrationConfig::default());
        let receiver = session.subscribe();
        assert_eq!(*receiver.borrow(), SessionState::NotStarted);

        session.calibrate(start(), Some(1), Some(1.0), Some(0)).await.unwrap();
        assert_eq!(*receiver.borrow(), SessionState::Complete);
    }

    #[test]
    fn test_builder_requires_collaborators() {
        let err = CalibrationSession::builder().build().unwrap_err();
        assert!(matches!(err, CalibrationError::Configuration { field: "robot", .. }));
    }
}
