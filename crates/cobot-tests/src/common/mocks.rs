// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # Mock Implementations
//!
//! Simulated hardware for exercising the glue cell crates without a serial
//! port, a robot arm or a camera.
//!
//! - [`SimulatedBus`]: Modbus RTU slaves behind a [`SerialLine`]
//! - [`SimulatedRobot`]: arm that reaches commanded poses instantly
//! - [`SyntheticLaserCamera`]: renders a laser line whose position depends on
//!   the robot height
//!
//! Every mock records its interactions for verification.

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::io;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use cobot_calibration::{
    CalibrationError, CalibrationResult, LaserFrameSource, MotionParams, Position, RobotMotion,
};
use cobot_modbus::SerialLine;
use cobot_modbus::frame::{append_crc, verify_crc};
use cobot_vision::{Frame, FramePair, solid_frame};

// =============================================================================
// Simulated Modbus Bus
// =============================================================================

/// Misbehavior injected for one slave address.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceFault {
    /// Never answers.
    Silent,
    /// Answers every request with this exception code.
    Exception(u8),
    /// Answers with a corrupted CRC.
    CorruptCrc,
}

#[derive(Debug, Default)]
struct BusState {
    devices: BTreeMap<u8, BTreeMap<u16, u16>>,
    faults: HashMap<u8, DeviceFault>,
    requests: Vec<Vec<u8>>,
    clears: usize,
}

/// A set of simulated Modbus RTU slaves sharing one line.
///
/// Supports read holding registers (0x03), write single register (0x06) and
/// write multiple registers (0x10). Unknown registers answer with exception
/// 0x02, unknown functions with 0x01, absent slaves stay silent.
///
/// # Example
///
/// ```rust,ignore
/// let bus = SimulatedBus::new().with_device(5, &[(0, 1234)]);
/// let transport = RtuTransport::with_line(config, bus.line());
/// ```
#[derive(Debug, Clone, Default)]
pub struct SimulatedBus {
    state: Arc<Mutex<BusState>>,
}

impl SimulatedBus {
    /// Creates an empty bus.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a slave with initial register values.
    pub fn with_device(self, slave: u8, registers: &[(u16, u16)]) -> Self {
        self.state
            .lock()
            .devices
            .insert(slave, registers.iter().copied().collect());
        self
    }

    /// Injects a fault for `slave`.
    pub fn with_fault(self, slave: u8, fault: DeviceFault) -> Self {
        self.state.lock().faults.insert(slave, fault);
        self
    }

    /// Removes any fault injected for `slave`.
    pub fn clear_fault(&self, slave: u8) {
        self.state.lock().faults.remove(&slave);
    }

    /// Sets a register on an existing slave.
    pub fn set_register(&self, slave: u8, register: u16, value: u16) {
        if let Some(registers) = self.state.lock().devices.get_mut(&slave) {
            registers.insert(register, value);
        }
    }

    /// Current value of a register.
    pub fn register(&self, slave: u8, register: u16) -> Option<u16> {
        self.state
            .lock()
            .devices
            .get(&slave)
            .and_then(|registers| registers.get(&register).copied())
    }

    /// Every frame written to the line, in order.
    pub fn requests(&self) -> Vec<Vec<u8>> {
        self.state.lock().requests.clone()
    }

    /// Number of frames addressed to `slave`.
    pub fn request_count_for(&self, slave: u8) -> usize {
        self.state
            .lock()
            .requests
            .iter()
            .filter(|frame| frame.first() == Some(&slave))
            .count()
    }

    /// Number of buffer flushes performed by the master.
    pub fn clear_count(&self) -> usize {
        self.state.lock().clears
    }

    /// Opens a line onto the bus.
    pub fn line(&self) -> SimulatedLine {
        SimulatedLine {
            bus: self.clone(),
            pending: VecDeque::new(),
        }
    }

    fn respond(&self, frame: &[u8]) -> Option<Vec<u8>> {
        let mut state = self.state.lock();
        state.requests.push(frame.to_vec());

        if frame.len() < 4 || verify_crc(frame).is_err() {
            return None;
        }
        let slave = frame[0];
        let function = frame[1];
        let fault = state.faults.get(&slave).copied();

        let mut reply = match fault {
            Some(DeviceFault::Silent) => return None,
            Some(DeviceFault::Exception(code)) => exception_body(slave, function, code),
            _ => {
                let registers = state.devices.get_mut(&slave)?;
                handle_request(registers, &frame[..frame.len() - 2])
            }
        };

        append_crc(&mut reply);
        if fault == Some(DeviceFault::CorruptCrc) {
            if let Some(last) = reply.last_mut() {
                *last ^= 0xFF;
            }
        }
        Some(reply)
    }
}

fn handle_request(registers: &mut BTreeMap<u16, u16>, body: &[u8]) -> Vec<u8> {
    let slave = body[0];
    let function = body[1];
    let word = |offset: usize| -> Option<u16> {
        Some(u16::from_be_bytes([*body.get(offset)?, *body.get(offset + 1)?]))
    };

    match function {
        0x03 => {
            let (Some(address), Some(count)) = (word(2), word(4)) else {
                return exception_body(slave, function, 0x03);
            };
            let mut reply = vec![slave, function, (count * 2) as u8];
            for offset in 0..count {
                match registers.get(&address.wrapping_add(offset)) {
                    Some(value) => reply.extend_from_slice(&value.to_be_bytes()),
                    None => return exception_body(slave, function, 0x02),
                }
            }
            reply
        }
        0x06 => {
            let (Some(address), Some(value)) = (word(2), word(4)) else {
                return exception_body(slave, function, 0x03);
            };
            registers.insert(address, value);
            body.to_vec()
        }
        0x10 => {
            let (Some(address), Some(count)) = (word(2), word(4)) else {
                return exception_body(slave, function, 0x03);
            };
            for offset in 0..count {
                let Some(value) = word(7 + 2 * offset as usize) else {
                    return exception_body(slave, function, 0x03);
                };
                registers.insert(address.wrapping_add(offset), value);
            }
            body[..6].to_vec()
        }
        _ => exception_body(slave, function, 0x01),
    }
}

fn exception_body(slave: u8, function: u8, code: u8) -> Vec<u8> {
    vec![slave, function | 0x80, code]
}

/// One master's connection to a [`SimulatedBus`].
#[derive(Debug)]
pub struct SimulatedLine {
    bus: SimulatedBus,
    pending: VecDeque<u8>,
}

#[async_trait]
impl SerialLine for SimulatedLine {
    async fn clear(&mut self) -> io::Result<()> {
        self.bus.state.lock().clears += 1;
        self.pending.clear();
        Ok(())
    }

    async fn write_all(&mut self, frame: &[u8]) -> io::Result<()> {
        if let Some(reply) = self.bus.respond(frame) {
            self.pending.extend(reply);
        }
        Ok(())
    }

    async fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.pending.is_empty() {
            std::future::pending::<()>().await;
        }
        let n = buf.len().min(self.pending.len());
        for (slot, byte) in buf.iter_mut().zip(self.pending.drain(..n)) {
            *slot = byte;
        }
        Ok(n)
    }

    fn name(&self) -> &str {
        "simulated"
    }
}

// =============================================================================
// Simulated Robot
// =============================================================================

/// Robot arm that reaches every commanded pose instantly.
#[derive(Debug, Default)]
pub struct SimulatedRobot {
    pose: Mutex<Option<Position>>,
    moves: Mutex<Vec<Position>>,
    reachable_moves: Mutex<Option<usize>>,
    fail_moves: Mutex<bool>,
}

impl SimulatedRobot {
    /// Creates a robot with an unknown pose.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a robot standing at `position`.
    pub fn at(position: Position) -> Self {
        let robot = Self::default();
        *robot.pose.lock() = Some(position);
        robot
    }

    /// Moves after the first `count` are accepted but never arrive.
    pub fn reachable_moves(self, count: usize) -> Self {
        *self.reachable_moves.lock() = Some(count);
        self
    }

    /// Every motion command is rejected by the controller.
    pub fn failing(self) -> Self {
        *self.fail_moves.lock() = true;
        self
    }

    /// Commanded poses, in order.
    pub fn moves(&self) -> Vec<Position> {
        self.moves.lock().clone()
    }

    /// Number of motion commands received.
    pub fn move_count(&self) -> usize {
        self.moves.lock().len()
    }

    /// Current pose.
    pub fn pose(&self) -> Option<Position> {
        *self.pose.lock()
    }
}

#[async_trait]
impl RobotMotion for SimulatedRobot {
    async fn move_to_position(
        &self,
        position: &Position,
        _params: &MotionParams,
    ) -> CalibrationResult<()> {
        if *self.fail_moves.lock() {
            return Err(CalibrationError::robot("controller rejected the motion command"));
        }

        let mut moves = self.moves.lock();
        moves.push(*position);
        let reachable = self
            .reachable_moves
            .lock()
            .is_none_or(|limit| moves.len() <= limit);
        if reachable {
            *self.pose.lock() = Some(*position);
        }
        Ok(())
    }

    async fn wait_until_reached(&self, target: &Position, threshold: f64, _timeout: Duration) -> bool {
        self.pose()
            .is_some_and(|pose| pose.max_deviation(target) <= threshold)
    }

    async fn current_position(&self) -> Option<Position> {
        self.pose()
    }
}

// =============================================================================
// Synthetic Laser Camera
// =============================================================================

/// Camera looking at a vertical laser line.
///
/// The line sits at `base_column` while the robot is at `reference_z` and
/// moves right by `linear * d + quadratic * d²` pixels when the tool is
/// `d` millimetres lower.
#[derive(Debug)]
pub struct SyntheticLaserCamera {
    robot: Arc<SimulatedRobot>,
    reference_z: f64,
    height: usize,
    width: usize,
    base_column: f64,
    linear: f64,
    quadratic: f64,
    missing_on_frames: AtomicU32,
    captures: AtomicU32,
}

impl SyntheticLaserCamera {
    /// Frame height in pixels.
    pub const HEIGHT: usize = 48;
    /// Frame width in pixels.
    pub const WIDTH: usize = 200;
    /// Laser intensity in the red channel.
    pub const INTENSITY: u8 = 200;

    /// Creates a camera with a 4 px/mm linear response.
    pub fn new(robot: Arc<SimulatedRobot>, reference_z: f64) -> Self {
        Self {
            robot,
            reference_z,
            height: Self::HEIGHT,
            width: Self::WIDTH,
            base_column: 60.0,
            linear: 4.0,
            quadratic: 0.0,
            missing_on_frames: AtomicU32::new(0),
            captures: AtomicU32::new(0),
        }
    }

    /// Sets the line displacement per millimetre.
    pub fn with_response(mut self, linear: f64, quadratic: f64) -> Self {
        self.linear = linear;
        self.quadratic = quadratic;
        self
    }

    /// The next `count` captures lose their laser-on frame.
    pub fn drop_next(&self, count: u32) {
        self.missing_on_frames.store(count, Ordering::SeqCst);
    }

    /// Number of captures taken.
    pub fn capture_count(&self) -> u32 {
        self.captures.load(Ordering::SeqCst)
    }

    /// Line column for the current robot height.
    pub fn line_column(&self) -> Option<usize> {
        let z = self.robot.pose().map_or(self.reference_z, |p| p.z());
        let d = self.reference_z - z;
        let column = (self.base_column + self.linear * d + self.quadratic * d * d).round();
        (column >= 0.0 && (column as usize) < self.width).then_some(column as usize)
    }

    fn render(&self) -> Frame {
        let mut frame = solid_frame(self.height, self.width, [0, 0, 0]);
        if let Some(column) = self.line_column() {
            for row in 0..self.height {
                frame[[row, column, 2]] = Self::INTENSITY;
            }
        }
        frame
    }
}

#[async_trait]
impl LaserFrameSource for SyntheticLaserCamera {
    async fn capture_pair(&self) -> CalibrationResult<FramePair> {
        self.captures.fetch_add(1, Ordering::SeqCst);
        let off = solid_frame(self.height, self.width, [0, 0, 0]);

        let dropped = self
            .missing_on_frames
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if dropped {
            return Ok(FramePair {
                on: None,
                off: Some(off),
            });
        }

        Ok(FramePair::new(self.render(), off))
    }
}

/// Camera that always fails to deliver.
#[derive(Debug, Default)]
pub struct BrokenCamera;

#[async_trait]
impl LaserFrameSource for BrokenCamera {
    async fn capture_pair(&self) -> CalibrationResult<FramePair> {
        Err(CalibrationError::camera("camera disconnected"))
    }
}
