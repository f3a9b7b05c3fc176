// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Byte-level serial line used by the RTU transport.
//!
//! [`SerialLine`] is the seam between RTU framing and the physical port.
//! [`TokioSerialLine`] drives a real device through `tokio-serial`; tests
//! plug in simulated buses.

use std::fmt;
use std::io;

use async_trait::async_trait;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio_serial::{
    ClearBuffer, DataBits as SerialDataBits, Parity as SerialParity, SerialPort,
    SerialPortBuilderExt, SerialStream, StopBits as SerialStopBits,
};

use crate::error::{ConnectionError, ModbusError, ModbusResult};
use crate::types::{DataBits, Parity, SerialPortConfig, StopBits};

// =============================================================================
// SerialLine Trait
// =============================================================================

/// A half-duplex byte stream to the bus.
///
/// Implementations perform no framing and no timeouts; the transport wraps
/// every read in its own response and inter-byte timeouts. A read with
/// nothing to deliver should stay pending rather than return `Ok(0)`.
#[async_trait]
pub trait SerialLine: Send + 'static {
    /// Discards pending bytes in both the input and output buffers.
    async fn clear(&mut self) -> io::Result<()>;

    /// Writes a complete frame and flushes it to the wire.
    async fn write_all(&mut self, frame: &[u8]) -> io::Result<()>;

    /// Reads whatever bytes are available into `buf`.
    async fn read(&mut self, buf: &mut [u8]) -> io::Result<usize>;

    /// Returns the port identifier for diagnostics.
    fn name(&self) -> &str;
}

// =============================================================================
// TokioSerialLine
// =============================================================================

/// A physical serial port opened through `tokio-serial`.
pub struct TokioSerialLine {
    port: String,
    stream: SerialStream,
}

impl TokioSerialLine {
    /// Opens the port with the configured line settings.
    ///
    /// Any failure to open maps to [`ConnectionError::PortUnavailable`].
    pub fn open(config: &SerialPortConfig) -> ModbusResult<Self> {
        let stream = tokio_serial::new(&config.port, config.baud_rate)
            .data_bits(convert_data_bits(config.data_bits))
            .parity(convert_parity(config.parity))
            .stop_bits(convert_stop_bits(config.stop_bits))
            .timeout(config.timeout)
            .open_native_async()
            .map_err(|e| {
                let reason = match e.kind {
                    tokio_serial::ErrorKind::NoDevice => "device not found".to_string(),
                    tokio_serial::ErrorKind::Io(io::ErrorKind::NotFound) => {
                        "device not found".to_string()
                    }
                    tokio_serial::ErrorKind::Io(io::ErrorKind::PermissionDenied) => {
                        "permission denied".to_string()
                    }
                    tokio_serial::ErrorKind::InvalidInput => {
                        format!("invalid line settings: {}", e.description)
                    }
                    _ => e.to_string(),
                };
                ModbusError::Connection(ConnectionError::port_unavailable(&config.port, reason))
            })?;

        Ok(Self {
            port: config.port.clone(),
            stream,
        })
    }
}

#[async_trait]
impl SerialLine for TokioSerialLine {
    async fn clear(&mut self) -> io::Result<()> {
        self.stream.clear(ClearBuffer::All).map_err(io::Error::from)
    }

    async fn write_all(&mut self, frame: &[u8]) -> io::Result<()> {
        AsyncWriteExt::write_all(&mut self.stream, frame).await?;
        AsyncWriteExt::flush(&mut self.stream).await
    }

    async fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        AsyncReadExt::read(&mut self.stream, buf).await
    }

    fn name(&self) -> &str {
        &self.port
    }
}

impl fmt::Debug for TokioSerialLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokioSerialLine")
            .field("port", &self.port)
            .finish_non_exhaustive()
    }
}

fn convert_data_bits(bits: DataBits) -> SerialDataBits {
    match bits {
        DataBits::Five => SerialDataBits::Five,
        DataBits::Six => SerialDataBits::Six,
        DataBits::Seven => SerialDataBits::Seven,
        DataBits::Eight => SerialDataBits::Eight,
    }
}

fn convert_parity(parity: Parity) -> SerialParity {
    match parity {
        Parity::None => SerialParity::None,
        Parity::Even => SerialParity::Even,
        Parity::Odd => SerialParity::Odd,
    }
}

fn convert_stop_bits(bits: StopBits) -> SerialStopBits {
    match bits {
        StopBits::One => SerialStopBits::One,
        StopBits::Two => SerialStopBits::Two,
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_line_settings_conversion() {
        assert_eq!(convert_data_bits(DataBits::Seven), SerialDataBits::Seven);
        assert_eq!(convert_parity(Parity::Even), SerialParity::Even);
        assert_eq!(convert_stop_bits(StopBits::Two), SerialStopBits::Two);
    }

    #[tokio::test]
    async fn test_open_missing_port_is_port_unavailable() {
        let config = SerialPortConfig::new("/dev/cobot-missing-port-for-tests");
        let error = TokioSerialLine::open(&config).unwrap_err();
        assert!(error.is_port_unavailable());
        assert!(error.to_string().contains("/dev/cobot-missing-port-for-tests"));
    }
}
