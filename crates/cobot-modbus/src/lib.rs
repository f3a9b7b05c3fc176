// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # cobot-modbus
//!
//! Modbus RTU transaction layer for the glue-dispensing cell hardware.
//!
//! This crate provides:
//!
//! - **RTU framing**: CRC16, request encoding and response validation
//! - **Serial transport**: buffer flush, response and inter-byte timeouts,
//!   bounded retries, one transaction at a time per bus
//! - **Device client**: scaled register reads and writes for one slave
//! - **Bus scanner**: discovery of responding slaves on a range of addresses
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────┐     ┌──────────────────────┐
//! │   ModbusBusScanner   │     │  ModbusDeviceClient  │
//! │  (probe per address) │────>│ (typed register I/O) │
//! └──────────────────────┘     └──────────┬───────────┘
//!                                         │ Arc
//!                                         ▼
//!                              ┌──────────────────────┐
//!                              │     RtuTransport     │
//!                              │ (framing, retries)   │
//!                              └──────────┬───────────┘
//!                                         ▼
//!                              ┌──────────────────────┐
//!                              │  SerialLine (trait)  │
//!                              │   TokioSerialLine    │
//!                              └──────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use cobot_modbus::{ModbusBusScanner, ModbusDeviceClient, RtuTransport, SerialPortConfig};
//!
//! let config = SerialPortConfig::builder()
//!     .port("/dev/ttyUSB0")
//!     .baud_rate(115200)
//!     .build()?;
//! let transport = Arc::new(RtuTransport::open(config)?);
//!
//! // Find devices
//! let scanner = ModbusBusScanner::new(transport.clone());
//! let found = scanner.scan(1, 247, 0, 0).await?;
//!
//! // Talk to one of them
//! let client = ModbusDeviceClient::new(transport.clone(), found[0])?;
//! let weight = client.read_register(0, 1).await?;
//! ```

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]
#![deny(unsafe_code)]

// =============================================================================
// Modules
// =============================================================================

pub mod client;
pub mod error;
pub mod frame;
pub mod scanner;
pub mod types;

// =============================================================================
// Re-exports
// =============================================================================

pub use error::{
    ConfigurationError, ConnectionError, ConversionError, ErrorCode, ErrorSeverity, FrameError,
    ModbusError, ModbusResult,
};

pub use types::{DataBits, Parity, SerialPortConfig, SerialPortConfigBuilder, StopBits};

pub use frame::{FunctionCode, ModbusTransaction, RequestFrame, ResponseFrame, crc16};

pub use client::{
    ClientStats, ModbusDeviceClient, RetryStrategy, RtuTransport, SerialLine, TokioSerialLine,
    TransportState, TransportStats,
};

pub use scanner::{BusScanResult, ModbusBusScanner, ProbeOutcome, ProbeRecord, ScanRequest};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Crate name.
pub const NAME: &str = env!("CARGO_PKG_NAME");
