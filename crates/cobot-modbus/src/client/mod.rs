// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Modbus RTU client implementation.
//!
//! # Architecture
//!
//! ```text
//! ┌───────────────────────┐  ┌───────────────────────┐
//! │ ModbusDeviceClient(1) │  │ ModbusDeviceClient(5) │   one per slave
//! └───────────┬───────────┘  └───────────┬───────────┘
//!             └──────────┬───────────────┘
//!                        ▼
//!             ┌─────────────────────┐
//!             │ Arc<RtuTransport>   │   lock held per transaction
//!             └──────────┬──────────┘
//!                        ▼
//!             ┌─────────────────────┐
//!             │ SerialLine          │   tokio-serial or simulated
//!             └─────────────────────┘
//! ```

mod line;
mod retry;
mod transport;

pub use line::{SerialLine, TokioSerialLine};
pub use retry::RetryStrategy;
pub use transport::{RtuTransport, TransportState, TransportStats};

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use crate::error::{ConversionError, ModbusError, ModbusResult};
use crate::frame::{ModbusTransaction, RequestFrame};
use crate::types::validate_slave_address;

// =============================================================================
// ModbusDeviceClient
// =============================================================================

/// Typed register access for one slave on a shared transport.
///
/// Bus errors are returned unchanged; whether silence means "device absent"
/// or "hardware fault" is the caller's decision.
///
/// # Example
///
/// ```rust,ignore
/// let transport = Arc::new(RtuTransport::open(config)?);
/// let motor = ModbusDeviceClient::new(transport.clone(), 1)?;
/// let weight = motor.read_register(0, 1).await?; // raw 1234 -> 123.4
/// motor.write_register(2, 12.5, 1).await?;        // writes raw 125
/// ```
pub struct ModbusDeviceClient<L: SerialLine = TokioSerialLine> {
    transport: Arc<RtuTransport<L>>,
    slave: u8,
    retries: Option<u32>,
    stats: ClientStats,
}

impl<L: SerialLine> ModbusDeviceClient<L> {
    /// Creates a client for `slave` (1-247).
    pub fn new(transport: Arc<RtuTransport<L>>, slave: u8) -> ModbusResult<Self> {
        validate_slave_address(slave)?;
        Ok(Self {
            transport,
            slave,
            retries: None,
            stats: ClientStats::new(),
        })
    }

    /// Creates a client for the slave named in the transport configuration.
    pub fn for_default_slave(transport: Arc<RtuTransport<L>>) -> ModbusResult<Self> {
        let slave = transport.config().slave_address;
        Self::new(transport, slave)
    }

    /// Overrides the transport's retry count for this client only.
    pub fn with_retries(mut self, retries: u32) -> Self {
        self.retries = Some(retries);
        self
    }

    /// Returns the slave address.
    pub fn slave(&self) -> u8 {
        self.slave
    }

    /// Returns the effective retry count.
    pub fn retries(&self) -> u32 {
        self.retries
            .unwrap_or(self.transport.config().max_retries)
    }

    /// Returns the shared transport.
    pub fn transport(&self) -> &Arc<RtuTransport<L>> {
        &self.transport
    }

    /// Returns the client statistics.
    pub fn stats(&self) -> &ClientStats {
        &self.stats
    }

    // =========================================================================
    // Read Operations
    // =========================================================================

    /// Reads one holding register and divides it by `10^decimals`.
    pub async fn read_register(&self, address: u16, decimals: u8) -> ModbusResult<f64> {
        let raw = self.read_raw_register(address).await?;
        Ok(scale_from_raw(raw, decimals))
    }

    /// Reads one holding register without scaling.
    pub async fn read_raw_register(&self, address: u16) -> ModbusResult<u16> {
        let registers = self.read_registers(address, 1).await?;
        registers.first().copied().ok_or_else(|| {
            ModbusError::conversion(ConversionError::InsufficientData {
                expected: 1,
                actual: 0,
            })
        })
    }

    /// Reads `count` consecutive holding registers (FC03).
    pub async fn read_registers(&self, address: u16, count: u16) -> ModbusResult<Vec<u16>> {
        let request = RequestFrame::read_holding_registers(self.slave, address, count)?;
        let transaction = self.execute(&request).await?;
        let registers = transaction.response.registers();
        if registers.len() != count as usize {
            return Err(ModbusError::conversion(ConversionError::InsufficientData {
                expected: count as usize,
                actual: registers.len(),
            }));
        }
        Ok(registers)
    }

    // =========================================================================
    // Write Operations
    // =========================================================================

    /// Multiplies `value` by `10^decimals` and writes it to one register.
    ///
    /// Uses function 0x10 with a single register, which every cell device
    /// accepts.
    pub async fn write_register(&self, address: u16, value: f64, decimals: u8) -> ModbusResult<()> {
        let raw = scale_to_raw(value, decimals)?;
        let request = RequestFrame::write_multiple_registers(self.slave, address, vec![raw])?;
        self.execute(&request).await.map(|_| ())
    }

    /// Writes one raw register with function 0x06.
    pub async fn write_single_register(&self, address: u16, raw: u16) -> ModbusResult<()> {
        let request = RequestFrame::write_single_register(self.slave, address, raw);
        self.execute(&request).await.map(|_| ())
    }

    async fn execute(&self, request: &RequestFrame) -> ModbusResult<ModbusTransaction> {
        let start = Instant::now();
        match self
            .transport
            .execute_with_retries(request, self.retries())
            .await
        {
            Ok(transaction) => {
                self.stats.record_success(start.elapsed(), transaction.retries_used);
                Ok(transaction)
            }
            Err(error) => {
                self.stats.record_error();
                Err(error)
            }
        }
    }
}

impl<L: SerialLine> std::fmt::Debug for ModbusDeviceClient<L> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModbusDeviceClient")
            .field("slave", &self.slave)
            .field("retries", &self.retries())
            .field("transport", &self.transport)
            .finish()
    }
}

// =============================================================================
// Scaling
// =============================================================================

/// Converts a raw register to an engineering value: `raw / 10^decimals`.
pub fn scale_from_raw(raw: u16, decimals: u8) -> f64 {
    raw as f64 / 10f64.powi(decimals as i32)
}

/// Converts an engineering value to a raw register, rounding to nearest.
pub fn scale_to_raw(value: f64, decimals: u8) -> Result<u16, ConversionError> {
    if !value.is_finite() {
        return Err(ConversionError::NotFinite { value });
    }
    let scaled = (value * 10f64.powi(decimals as i32)).round();
    if !(0.0..=u16::MAX as f64).contains(&scaled) {
        return Err(ConversionError::OutOfRange { value, decimals });
    }
    Ok(scaled as u16)
}

// =============================================================================
// ClientStats
// =============================================================================

/// Statistics for one device client.
#[derive(Debug)]
pub struct ClientStats {
    total_requests: AtomicU64,
    successful_requests: AtomicU64,
    failed_requests: AtomicU64,
    retries: AtomicU64,
    total_response_time_us: AtomicU64,
}

impl ClientStats {
    /// Creates new statistics.
    pub fn new() -> Self {
        Self {
            total_requests: AtomicU64::new(0),
            successful_requests: AtomicU64::new(0),
            failed_requests: AtomicU64::new(0),
            retries: AtomicU64::new(0),
            total_response_time_us: AtomicU64::new(0),
        }
    }

    /// Records a successful request.
    pub fn record_success(&self, duration: Duration, retries: u32) {
        self.total_requests.fetch_add(1, Ordering::Relaxed);
        self.successful_requests.fetch_add(1, Ordering::Relaxed);
        self.retries.fetch_add(retries as u64, Ordering::Relaxed);
        self.total_response_time_us
            .fetch_add(duration.as_micros() as u64, Ordering::Relaxed);
    }

    /// Records a failed request.
    pub fn record_error(&self) {
        self.total_requests.fetch_add(1, Ordering::Relaxed);
        self.failed_requests.fetch_add(1, Ordering::Relaxed);
    }

    /// Returns the total number of requests.
    pub fn total_requests(&self) -> u64 {
        self.total_requests.load(Ordering::Relaxed)
    }

    /// Returns the number of successful requests.
    pub fn successful_requests(&self) -> u64 {
        self.successful_requests.load(Ordering::Relaxed)
    }

    /// Returns the number of failed requests.
    pub fn failed_requests(&self) -> u64 {
        self.failed_requests.load(Ordering::Relaxed)
    }

    /// Returns retries spent on successful requests.
    pub fn retries(&self) -> u64 {
        self.retries.load(Ordering::Relaxed)
    }

    /// Returns the success rate (0.0 - 1.0).
    pub fn success_rate(&self) -> f64 {
        let total = self.total_requests();
        if total == 0 {
            return 1.0;
        }
        self.successful_requests() as f64 / total as f64
    }

    /// Returns the average response time of successful requests.
    pub fn average_response_time(&self) -> Duration {
        let success = self.successful_requests();
        if success == 0 {
            return Duration::ZERO;
        }
        Duration::from_micros(self.total_response_time_us.load(Ordering::Relaxed) / success)
    }
}

impl Default for ClientStats {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// Tests
// =============================================================================
