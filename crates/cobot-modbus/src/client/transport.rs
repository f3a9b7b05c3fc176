// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Modbus RTU transport.
//!
//! [`RtuTransport`] exclusively owns one serial line and performs framed
//! request/response exchanges on it. A single exchange, retries included,
//! runs under the transport lock, so device clients that share a transport
//! never interleave bytes on the bus.
//!
//! # Transaction
//!
//! ```text
//!  lock ─┬─> clear buffers ─> write frame ─> wait `timeout` for first byte
//!        │        ▲                               │
//!        │        │ retry (≤ max_retries)         ▼
//!        │        └──── silent / bad frame <── read until complete or
//!        │                                     `inter_byte_timeout` silence
//!        └─> validated response ─> unlock
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use cobot_modbus::client::RtuTransport;
//! use cobot_modbus::frame::RequestFrame;
//! use cobot_modbus::types::SerialPortConfig;
//!
//! let transport = Arc::new(RtuTransport::open(SerialPortConfig::new("/dev/ttyUSB0"))?);
//! let request = RequestFrame::read_holding_registers(1, 0, 1)?;
//! let transaction = transport.execute(&request).await?;
//! println!("{:?} after {} attempt(s)", transaction.response, transaction.attempts());
//! ```

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use tokio::sync::Mutex;
use tokio::time::timeout;

use crate::error::{ConnectionError, FrameError, ModbusError, ModbusResult};
use crate::frame::{MAX_FRAME_LEN, ModbusTransaction, RequestFrame, ResponseFrame};
use crate::types::SerialPortConfig;

use super::line::{SerialLine, TokioSerialLine};
use super::retry::RetryStrategy;

// =============================================================================
// TransportState
// =============================================================================

/// Lifecycle state of a transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TransportState {
    /// The serial line is open and accepts transactions.
    Open,
    /// The serial line has been released.
    #[default]
    Closed,
}

impl TransportState {
    /// Returns `true` if transactions can be executed.
    pub fn is_open(&self) -> bool {
        matches!(self, Self::Open)
    }
}

impl fmt::Display for TransportState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Open => write!(f, "open"),
            Self::Closed => write!(f, "closed"),
        }
    }
}

// =============================================================================
// RtuTransport
// =============================================================================

/// Framed request/response exchange over one serial line.
pub struct RtuTransport<L: SerialLine = TokioSerialLine> {
    config: SerialPortConfig,
    retry_strategy: RetryStrategy,
    line: Mutex<Option<L>>,
    stats: TransportStats,
}

impl RtuTransport<TokioSerialLine> {
    /// Opens the configured serial port.
    ///
    /// Fails with a port-unavailable error if the device node cannot be
    /// opened. There is no retry at this level.
    pub fn open(config: SerialPortConfig) -> ModbusResult<Self> {
        config.validate()?;
        let line = TokioSerialLine::open(&config)?;

        tracing::info!(
            port = %config.port,
            baud_rate = config.baud_rate,
            settings = %config.line_settings(),
            slave = config.slave_address,
            "Opened Modbus RTU serial port"
        );

        Ok(Self::with_line(config, line))
    }
}

impl<L: SerialLine> RtuTransport<L> {
    /// Creates a transport over an already opened line.
    pub fn with_line(config: SerialPortConfig, line: L) -> Self {
        let retry_strategy = RetryStrategy::inter_frame(&config);
        Self {
            config,
            retry_strategy,
            line: Mutex::new(Some(line)),
            stats: TransportStats::default(),
        }
    }

    /// Sets the pause between attempts.
    pub fn with_retry_strategy(mut self, strategy: RetryStrategy) -> Self {
        self.retry_strategy = strategy;
        self
    }

    /// Returns the line configuration.
    pub fn config(&self) -> &SerialPortConfig {
        &self.config
    }

    /// Returns the transport statistics.
    pub fn stats(&self) -> &TransportStats {
        &self.stats
    }

    /// Returns the current state.
    pub async fn state(&self) -> TransportState {
        if self.line.lock().await.is_some() {
            TransportState::Open
        } else {
            TransportState::Closed
        }
    }

    /// Returns `true` while the line is open.
    pub async fn is_open(&self) -> bool {
        self.state().await.is_open()
    }

    /// Executes a request with the configured retry count.
    pub async fn execute(&self, request: &RequestFrame) -> ModbusResult<ModbusTransaction> {
        self.execute_with_retries(request, self.config.max_retries)
            .await
    }

    /// Executes a request, making at most `retries + 1` physical attempts.
    ///
    /// Fails with [`ModbusError::Frame`] only if every attempt produced an
    /// invalid frame; otherwise exhaustion is [`ModbusError::NoResponse`].
    /// Exception responses and I/O errors end the transaction immediately.
    pub async fn execute_with_retries(
        &self,
        request: &RequestFrame,
        retries: u32,
    ) -> ModbusResult<ModbusTransaction> {
        let mut guard = self.line.lock().await;
        let line = guard.as_mut().ok_or_else(ModbusError::not_connected)?;

        let encoded = request.encode();
        let attempts = retries.saturating_add(1);
        let start = Instant::now();
        let mut frame_failures = 0u32;
        let mut last_frame_error: Option<FrameError> = None;

        self.stats.transactions.fetch_add(1, Ordering::Relaxed);

        for attempt in 0..attempts {
            if attempt > 0 {
                let delay = self.retry_strategy.delay(attempt - 1);
                tracing::debug!(
                    port = line.name(),
                    slave = request.slave(),
                    attempt = attempt + 1,
                    max_attempts = attempts,
                    delay_ms = delay.as_millis() as u64,
                    "Retrying Modbus transaction"
                );
                self.stats.retries.fetch_add(1, Ordering::Relaxed);
                tokio::time::sleep(delay).await;
            }

            match self.attempt(line, request, &encoded).await {
                Ok(response) => {
                    return Ok(ModbusTransaction {
                        request: request.clone(),
                        response,
                        elapsed: start.elapsed(),
                        retries_used: attempt,
                    });
                }
                Err(AttemptFailure::Silent) => {
                    self.stats.silent_attempts.fetch_add(1, Ordering::Relaxed);
                    tracing::trace!(slave = request.slave(), attempt = attempt + 1, "No response");
                }
                Err(AttemptFailure::Frame(error)) => {
                    self.stats.frame_errors.fetch_add(1, Ordering::Relaxed);
                    tracing::debug!(
                        slave = request.slave(),
                        attempt = attempt + 1,
                        error = %error,
                        "Invalid response frame"
                    );
                    frame_failures += 1;
                    last_frame_error = Some(error);
                }
                Err(AttemptFailure::Fatal(error)) => {
                    self.stats.failures.fetch_add(1, Ordering::Relaxed);
                    return Err(error);
                }
            }
        }

        self.stats.failures.fetch_add(1, Ordering::Relaxed);
        match last_frame_error {
            Some(error) if frame_failures == attempts => Err(error.into()),
            _ => Err(ModbusError::no_response(request.slave(), attempts)),
        }
    }

    /// Releases the serial line. Calling this more than once is harmless.
    pub async fn close(&self) {
        if let Some(line) = self.line.lock().await.take() {
            tracing::info!(port = line.name(), "Closed Modbus RTU serial port");
        }
    }

    async fn attempt(
        &self,
        line: &mut L,
        request: &RequestFrame,
        encoded: &[u8],
    ) -> Result<ResponseFrame, AttemptFailure> {
        line.clear().await.map_err(|e| {
            AttemptFailure::Fatal(ConnectionError::io("failed to clear serial buffers", e).into())
        })?;

        tracing::trace!(port = line.name(), tx = %hex(encoded), "Sending frame");
        line.write_all(encoded).await.map_err(|e| {
            AttemptFailure::Fatal(ConnectionError::io("failed to write request frame", e).into())
        })?;

        let received = self.read_frame(line, request).await?;
        if received.is_empty() {
            return Err(AttemptFailure::Silent);
        }
        tracing::trace!(port = line.name(), rx = %hex(&received), "Received frame");

        match request.decode_response(&received) {
            Ok(response) => Ok(response),
            Err(ModbusError::Frame(error)) => Err(AttemptFailure::Frame(error)),
            Err(other) => Err(AttemptFailure::Fatal(other)),
        }
    }

    /// Reads one response: the first byte within `timeout`, each further
    /// chunk within `inter_byte_timeout`, until the implied length arrives.
    async fn read_frame(
        &self,
        line: &mut L,
        request: &RequestFrame,
    ) -> Result<Vec<u8>, AttemptFailure> {
        let mut frame = Vec::with_capacity(request.normal_response_len());
        let mut chunk = [0u8; MAX_FRAME_LEN];
        let mut wait = self.config.timeout;

        loop {
            let read = match timeout(wait, line.read(&mut chunk)).await {
                Err(_elapsed) => break,
                Ok(Ok(0)) => break,
                Ok(Ok(n)) => n,
                Ok(Err(e)) => {
                    return Err(AttemptFailure::Fatal(
                        ConnectionError::io("failed to read response", e).into(),
                    ));
                }
            };

            frame.extend_from_slice(&chunk[..read]);
            wait = self.config.inter_byte_timeout;

            if let Some(len) = request.expected_response_len(&frame) {
                if frame.len() >= len {
                    frame.truncate(len);
                    break;
                }
            }
            if frame.len() >= MAX_FRAME_LEN {
                break;
            }
        }

        Ok(frame)
    }
}

impl<L: SerialLine> fmt::Debug for RtuTransport<L> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RtuTransport")
            .field("port", &self.config.port)
            .field("settings", &self.config.line_settings())
            .field("max_retries", &self.config.max_retries)
            .finish_non_exhaustive()
    }
}

enum AttemptFailure {
    Silent,
    Frame(FrameError),
    Fatal(ModbusError),
}

fn hex(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|b| format!("{b:02X}"))
        .collect::<Vec<_>>()
        .join(" ")
}

// =============================================================================
// TransportStats
// =============================================================================

/// Attempt-level counters of a transport.
#[derive(Debug, Default)]
pub struct TransportStats {
    transactions: AtomicU64,
    failures: AtomicU64,
    retries: AtomicU64,
    silent_attempts: AtomicU64,
    frame_errors: AtomicU64,
}

impl TransportStats {
    /// Returns the number of transactions started.
    pub fn transactions(&self) -> u64 {
        self.transactions.load(Ordering::Relaxed)
    }

    /// Returns the number of transactions that ended in an error.
    pub fn failures(&self) -> u64 {
        self.failures.load(Ordering::Relaxed)
    }

    /// Returns the number of retries performed.
    pub fn retries(&self) -> u64 {
        self.retries.load(Ordering::Relaxed)
    }

    /// Returns the number of attempts that got no answer.
    pub fn silent_attempts(&self) -> u64 {
        self.silent_attempts.load(Ordering::Relaxed)
    }

    /// Returns the number of attempts that got an invalid frame.
    pub fn frame_errors(&self) -> u64 {
        self.frame_errors.load(Ordering::Relaxed)
    }

    /// Returns the number of physical attempts made.
    pub fn attempts(&self) -> u64 {
        self.transactions() + self.retries()
    }
}

// =============================================================================
// Tests
// =============================================================================
