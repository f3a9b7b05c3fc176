// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Modbus RTU error types with diagnostics.
//!
//! Errors are grouped by the layer that raises them so callers can decide what
//! a failure means in their domain. The bus scanner, for example, treats
//! [`ModbusError::NoResponse`] as "no device here" while normal operation
//! treats it as a hardware fault.
//!
//! # Error Categories
//!
//! ```text
//! ModbusError
//! ├── Connection    - serial port could not be opened, transport closed, I/O
//! ├── NoResponse    - slave stayed silent for every attempt
//! ├── Frame         - CRC / length / echo violations on every attempt
//! ├── Exception     - slave answered with a Modbus exception response
//! ├── Conversion    - register value scaling out of range
//! └── Configuration - invalid serial or scan settings
//! ```
//!
//! # Examples
//!
//! ```
//! use cobot_modbus::error::{ModbusError, ErrorSeverity};
//!
//! let error = ModbusError::no_response(5, 31);
//! assert!(error.is_no_response());
//! assert_eq!(error.severity(), ErrorSeverity::Warning);
//! ```

use std::fmt;
use std::io;
use std::time::Duration;

use thiserror::Error;
use tracing::Level;

// =============================================================================
// ModbusError - Main Error Type
// =============================================================================

/// The main error type for Modbus RTU operations.
#[derive(Debug, Error)]
pub enum ModbusError {
    /// Serial connection errors.
    #[error("{0}")]
    Connection(#[from] ConnectionError),

    /// The slave did not answer within the response timeout on any attempt.
    #[error("No response from slave {slave} after {attempts} attempt(s)")]
    NoResponse {
        /// Slave address that was addressed.
        slave: u8,
        /// Number of physical write/read attempts made.
        attempts: u32,
    },

    /// Every attempt produced a structurally invalid frame.
    #[error("{0}")]
    Frame(#[from] FrameError),

    /// The slave answered with a Modbus exception response.
    #[error(
        "Modbus exception from slave {slave}: function {function_code:#04x}, exception {exception_code} ({exception_name})"
    )]
    Exception {
        /// Responding slave address.
        slave: u8,
        /// Function code of the request.
        function_code: u8,
        /// Exception code returned by the slave.
        exception_code: u8,
        /// Standard name of the exception code.
        exception_name: &'static str,
    },

    /// Value conversion errors.
    #[error("{0}")]
    Conversion(#[from] ConversionError),

    /// Configuration errors.
    #[error("{0}")]
    Configuration(#[from] ConfigurationError),
}

impl ModbusError {
    // =========================================================================
    // Factory Methods
    // =========================================================================

    /// Creates a port-unavailable error.
    pub fn port_unavailable(port: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Connection(ConnectionError::port_unavailable(port, reason))
    }

    /// Creates a not-connected error.
    #[inline]
    pub fn not_connected() -> Self {
        Self::Connection(ConnectionError::NotConnected)
    }

    /// Creates a no-response error.
    #[inline]
    pub fn no_response(slave: u8, attempts: u32) -> Self {
        Self::NoResponse { slave, attempts }
    }

    /// Creates an exception response error.
    #[inline]
    pub fn exception(slave: u8, function_code: u8, exception_code: u8) -> Self {
        Self::Exception {
            slave,
            function_code,
            exception_code,
            exception_name: exception_name(exception_code),
        }
    }

    /// Creates a configuration error.
    #[inline]
    pub fn configuration(error: ConfigurationError) -> Self {
        Self::Configuration(error)
    }

    /// Creates a conversion error.
    #[inline]
    pub fn conversion(error: ConversionError) -> Self {
        Self::Conversion(error)
    }

    // =========================================================================
    // Classification
    // =========================================================================

    /// Returns `true` if the slave stayed silent.
    pub fn is_no_response(&self) -> bool {
        matches!(self, Self::NoResponse { .. })
    }

    /// Returns `true` for framing errors (CRC, length, echo).
    pub fn is_frame_error(&self) -> bool {
        matches!(self, Self::Frame(_))
    }

    /// Returns `true` for Modbus exception responses.
    pub fn is_exception(&self) -> bool {
        matches!(self, Self::Exception { .. })
    }

    /// Returns `true` if the serial port could not be opened.
    pub fn is_port_unavailable(&self) -> bool {
        matches!(
            self,
            Self::Connection(ConnectionError::PortUnavailable { .. })
        )
    }

    /// Returns `true` for bus-level failures: silence, bad frames, or a
    /// slave exception. These are what a bus scan classifies as absence.
    pub fn is_bus_error(&self) -> bool {
        self.is_no_response() || self.is_frame_error() || self.is_exception()
    }

    /// Returns `true` if this error is retryable within a transaction.
    ///
    /// Exception responses are valid answers and are never retried.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::NoResponse { .. } | Self::Frame(_) => true,
            Self::Connection(e) => e.is_retryable(),
            Self::Exception { .. } | Self::Conversion(_) | Self::Configuration(_) => false,
        }
    }

    /// Returns the severity level of this error.
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            Self::Connection(e) => e.severity(),
            Self::NoResponse { .. } => ErrorSeverity::Warning,
            Self::Frame(_) => ErrorSeverity::Warning,
            Self::Exception { .. } => ErrorSeverity::Error,
            Self::Conversion(_) => ErrorSeverity::Error,
            Self::Configuration(_) => ErrorSeverity::Critical,
        }
    }

    /// Returns the error category for logging.
    pub fn category(&self) -> &'static str {
        match self {
            Self::Connection(_) => "connection",
            Self::NoResponse { .. } => "no_response",
            Self::Frame(_) => "frame",
            Self::Exception { .. } => "exception",
            Self::Conversion(_) => "conversion",
            Self::Configuration(_) => "configuration",
        }
    }

    /// Returns a unique error code for this error.
    pub fn error_code(&self) -> ErrorCode {
        match self {
            Self::Connection(e) => e.error_code(),
            Self::NoResponse { .. } => ErrorCode::new(2, 1),
            Self::Frame(e) => e.error_code(),
            Self::Exception { exception_code, .. } => ErrorCode::new(4, *exception_code),
            Self::Conversion(e) => e.error_code(),
            Self::Configuration(e) => e.error_code(),
        }
    }

    /// Returns recovery hints for this error.
    pub fn recovery_hints(&self) -> Vec<&'static str> {
        match self {
            Self::Connection(e) => e.recovery_hints(),
            Self::NoResponse { .. } => vec![
                "Check that the device is powered and wired to the bus",
                "Verify the slave address matches the device setting",
                "Verify baud rate, parity and stop bits match the device",
                "Increase the response timeout for slow devices",
            ],
            Self::Frame(_) => vec![
                "Check bus termination and cable shielding",
                "Verify that only one master is active on the bus",
                "Check for baud rate mismatch between master and slave",
            ],
            Self::Exception { exception_code, .. } => match exception_code {
                0x01 => vec!["The device does not support this function code"],
                0x02 => vec!["Verify the register address against the device manual"],
                0x03 => vec!["The written value is outside the range the device accepts"],
                _ => vec!["Consult the device manual for the exception code"],
            },
            Self::Conversion(_) => vec!["Check the decimals scaling and the value range"],
            Self::Configuration(e) => e.recovery_hints(),
        }
    }

    /// Returns the tracing level for this error.
    pub fn tracing_level(&self) -> Level {
        self.severity().to_tracing_level()
    }

    /// Logs this error with appropriate level and context.
    pub fn log(&self, context: &str) {
        let code = self.error_code();

        match self.tracing_level() {
            Level::ERROR => tracing::error!(
                error_code = %code,
                category = self.category(),
                context = context,
                retryable = self.is_retryable(),
                "{self}"
            ),
            Level::WARN => tracing::warn!(
                error_code = %code,
                category = self.category(),
                context = context,
                retryable = self.is_retryable(),
                "{self}"
            ),
            _ => tracing::debug!(
                error_code = %code,
                category = self.category(),
                context = context,
                retryable = self.is_retryable(),
                "{self}"
            ),
        }
    }
}

/// Returns the standard name of a Modbus exception code.
pub fn exception_name(code: u8) -> &'static str {
    match code {
        0x01 => "Illegal Function",
        0x02 => "Illegal Data Address",
        0x03 => "Illegal Data Value",
        0x04 => "Server Device Failure",
        0x05 => "Acknowledge",
        0x06 => "Server Device Busy",
        0x08 => "Memory Parity Error",
        0x0A => "Gateway Path Unavailable",
        0x0B => "Gateway Target Device Failed to Respond",
        _ => "Unknown Exception",
    }
}

// =============================================================================
// ConnectionError
// =============================================================================

/// Serial connection errors.
#[derive(Debug, Error)]
pub enum ConnectionError {
    /// The serial device node could not be opened.
    #[error("Serial port '{port}' unavailable: {reason}")]
    PortUnavailable {
        /// Port identifier.
        port: String,
        /// Why the port could not be opened.
        reason: String,
    },

    /// The transport has been closed.
    #[error("Serial transport is closed")]
    NotConnected,

    /// Low-level I/O failure on an open port.
    #[error("Serial I/O error: {message}")]
    Io {
        /// Error message.
        message: String,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },
}

impl ConnectionError {
    /// Creates a port-unavailable error.
    pub fn port_unavailable(port: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::PortUnavailable {
            port: port.into(),
            reason: reason.into(),
        }
    }

    /// Creates an I/O error.
    pub fn io(message: impl Into<String>, source: io::Error) -> Self {
        Self::Io {
            message: message.into(),
            source,
        }
    }

    /// Port errors are fatal; transient I/O errors may clear on retry.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Io { .. })
    }

    /// Returns the severity level.
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            Self::PortUnavailable { .. } => ErrorSeverity::Critical,
            Self::NotConnected => ErrorSeverity::Error,
            Self::Io { .. } => ErrorSeverity::Warning,
        }
    }

    /// Returns the error code.
    pub fn error_code(&self) -> ErrorCode {
        match self {
            Self::PortUnavailable { .. } => ErrorCode::new(1, 1),
            Self::NotConnected => ErrorCode::new(1, 2),
            Self::Io { .. } => ErrorCode::new(1, 3),
        }
    }

    /// Returns recovery hints.
    pub fn recovery_hints(&self) -> Vec<&'static str> {
        match self {
            Self::PortUnavailable { .. } => vec![
                "Check that the USB-RS485 adapter is plugged in",
                "Verify the port name (COMx on Windows, /dev/ttyUSBx on Linux)",
                "Add the user to the dialout group or check port permissions",
                "Close other programs that hold the port",
            ],
            Self::NotConnected => vec!["Open a new transport before issuing requests"],
            Self::Io { .. } => vec!["Check the adapter connection and retry"],
        }
    }
}

impl From<io::Error> for ConnectionError {
    fn from(error: io::Error) -> Self {
        Self::io(error.to_string(), error)
    }
}

impl From<io::Error> for ModbusError {
    fn from(error: io::Error) -> Self {
        Self::Connection(ConnectionError::from(error))
    }
}

// =============================================================================
// FrameError
// =============================================================================

/// Structural problems with a received RTU frame.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FrameError {
    /// CRC16 check failed.
    #[error("CRC check failed: expected {expected:#06x}, got {actual:#06x}")]
    CrcMismatch {
        /// CRC computed over the received bytes.
        expected: u16,
        /// CRC carried by the frame.
        actual: u16,
    },

    /// Frame ended before the expected length.
    #[error("Frame too short: expected {expected} bytes, got {actual}")]
    TooShort {
        /// Expected length.
        expected: usize,
        /// Received length.
        actual: usize,
    },

    /// Response came from a different slave.
    #[error("Slave address mismatch: expected {expected}, got {actual}")]
    SlaveMismatch {
        /// Addressed slave.
        expected: u8,
        /// Slave in the response.
        actual: u8,
    },

    /// Response carries a different function code.
    #[error("Function code mismatch: expected {expected:#04x}, got {actual:#04x}")]
    FunctionMismatch {
        /// Function code of the request.
        expected: u8,
        /// Function code in the response.
        actual: u8,
    },

    /// Read response byte count does not match the requested registers.
    #[error("Byte count mismatch: expected {expected}, got {actual}")]
    ByteCountMismatch {
        /// Expected byte count.
        expected: usize,
        /// Byte count in the response.
        actual: usize,
    },

    /// Write response does not echo the request.
    #[error("Write echo mismatch: {message}")]
    EchoMismatch {
        /// Description of the mismatch.
        message: String,
    },
}

impl FrameError {
    /// Creates a CRC mismatch error.
    pub fn crc_mismatch(expected: u16, actual: u16) -> Self {
        Self::CrcMismatch { expected, actual }
    }

    /// Creates a too-short error.
    pub fn too_short(expected: usize, actual: usize) -> Self {
        Self::TooShort { expected, actual }
    }

    /// Returns the error code.
    pub fn error_code(&self) -> ErrorCode {
        match self {
            Self::CrcMismatch { .. } => ErrorCode::new(3, 1),
            Self::TooShort { .. } => ErrorCode::new(3, 2),
            Self::SlaveMismatch { .. } => ErrorCode::new(3, 3),
            Self::FunctionMismatch { .. } => ErrorCode::new(3, 4),
            Self::ByteCountMismatch { .. } => ErrorCode::new(3, 5),
            Self::EchoMismatch { .. } => ErrorCode::new(3, 6),
        }
    }
}

// =============================================================================
// ConversionError
// =============================================================================

/// Register value conversion errors.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConversionError {
    /// Scaled value does not fit in an unsigned 16-bit register.
    #[error("Value {value} scaled by 10^{decimals} is outside 0-65535")]
    OutOfRange {
        /// Unscaled value.
        value: f64,
        /// Decimal places used for scaling.
        decimals: u8,
    },

    /// Value is NaN or infinite.
    #[error("Value {value} is not finite")]
    NotFinite {
        /// Offending value.
        value: f64,
    },

    /// Response carried fewer registers than requested.
    #[error("Not enough data: expected {expected} registers, got {actual}")]
    InsufficientData {
        /// Expected register count.
        expected: usize,
        /// Received register count.
        actual: usize,
    },
}

impl ConversionError {
    /// Returns the error code.
    pub fn error_code(&self) -> ErrorCode {
        match self {
            Self::OutOfRange { .. } => ErrorCode::new(5, 1),
            Self::NotFinite { .. } => ErrorCode::new(5, 2),
            Self::InsufficientData { .. } => ErrorCode::new(5, 3),
        }
    }
}

// =============================================================================
// ConfigurationError
// =============================================================================

/// Invalid serial or scan settings.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigurationError {
    /// Slave address outside 1-247.
    #[error("Invalid slave address: {address} (valid range: 1-247)")]
    InvalidSlaveAddress {
        /// Offending address.
        address: u8,
    },

    /// Unsupported baud rate.
    #[error("Invalid baud rate: {baud_rate}")]
    InvalidBaudRate {
        /// Offending baud rate.
        baud_rate: u32,
    },

    /// Timeout of zero or otherwise unusable.
    #[error("Invalid {name}: {duration:?}")]
    InvalidTimeout {
        /// Setting name.
        name: &'static str,
        /// Offending duration.
        duration: Duration,
    },

    /// Required setting missing.
    #[error("Missing required configuration: {field}")]
    MissingField {
        /// Missing field name.
        field: String,
    },

    /// Scan range is empty or leaves 1-247.
    #[error("Invalid scan range: {start}-{end} (valid range: 1-247, start <= end)")]
    InvalidScanRange {
        /// First address.
        start: u8,
        /// Last address.
        end: u8,
    },

    /// Register count outside the FC03 limit.
    #[error("Invalid register count: {count} (valid range: 1-125)")]
    InvalidRegisterCount {
        /// Offending count.
        count: u16,
    },
}

impl ConfigurationError {
    /// Creates an invalid slave address error.
    pub fn invalid_slave_address(address: u8) -> Self {
        Self::InvalidSlaveAddress { address }
    }

    /// Creates a missing field error.
    pub fn missing_field(field: impl Into<String>) -> Self {
        Self::MissingField {
            field: field.into(),
        }
    }

    /// Returns the error code.
    pub fn error_code(&self) -> ErrorCode {
        match self {
            Self::InvalidSlaveAddress { .. } => ErrorCode::new(6, 1),
            Self::InvalidBaudRate { .. } => ErrorCode::new(6, 2),
            Self::InvalidTimeout { .. } => ErrorCode::new(6, 3),
            Self::MissingField { .. } => ErrorCode::new(6, 4),
            Self::InvalidScanRange { .. } => ErrorCode::new(6, 5),
            Self::InvalidRegisterCount { .. } => ErrorCode::new(6, 6),
        }
    }

    /// Returns recovery hints.
    pub fn recovery_hints(&self) -> Vec<&'static str> {
        match self {
            Self::InvalidSlaveAddress { .. } => vec!["Use a slave address between 1 and 247"],
            Self::InvalidBaudRate { .. } => {
                vec!["Use a standard baud rate such as 9600, 19200 or 115200"]
            }
            Self::InvalidTimeout { .. } => vec!["Use a timeout greater than zero"],
            Self::MissingField { .. } => vec!["Add the missing setting to the configuration"],
            Self::InvalidScanRange { .. } => {
                vec!["Use a range within 1-247 with start not after end"]
            }
            Self::InvalidRegisterCount { .. } => vec!["Read between 1 and 125 registers"],
        }
    }
}

// =============================================================================
// ErrorSeverity
// =============================================================================

/// Error severity levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ErrorSeverity {
    /// Informational - no action required.
    Info,
    /// Warning - action may be required.
    Warning,
    /// Error - action required, but recoverable.
    Error,
    /// Critical - immediate action required.
    Critical,
}

impl ErrorSeverity {
    /// Converts to tracing level.
    pub fn to_tracing_level(self) -> Level {
        match self {
            Self::Info => Level::INFO,
            Self::Warning => Level::WARN,
            Self::Error | Self::Critical => Level::ERROR,
        }
    }

    /// Returns the string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Info => "info",
            Self::Warning => "warning",
            Self::Error => "error",
            Self::Critical => "critical",
        }
    }
}

impl fmt::Display for ErrorSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// =============================================================================
// ErrorCode
// =============================================================================

/// Structured error code for categorization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ErrorCode {
    /// Category (1=connection, 2=no response, 3=frame, 4=exception, 5=conversion, 6=config).
    pub category: u8,
    /// Specific error within category.
    pub code: u8,
}

impl ErrorCode {
    /// Creates a new error code.
    pub const fn new(category: u8, code: u8) -> Self {
        Self { category, code }
    }

    /// Returns the full error code as a u16.
    pub fn as_u16(&self) -> u16 {
        ((self.category as u16) << 8) | (self.code as u16)
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RTU-{:02X}{:02X}", self.category, self.code)
    }
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// A Result type with ModbusError.
pub type ModbusResult<T> = Result<T, ModbusError>;

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classification() {
        assert!(ModbusError::no_response(1, 4).is_retryable());
        assert!(ModbusError::from(FrameError::crc_mismatch(0x1234, 0x4321)).is_retryable());
        assert!(!ModbusError::exception(1, 0x03, 0x02).is_retryable());
        assert!(!ModbusError::port_unavailable("/dev/ttyUSB0", "not found").is_retryable());
        assert!(!ModbusError::not_connected().is_retryable());
    }

    #[test]
    fn test_bus_error_classification() {
        assert!(ModbusError::no_response(3, 1).is_bus_error());
        assert!(ModbusError::from(FrameError::too_short(7, 3)).is_bus_error());
        assert!(ModbusError::exception(3, 0x03, 0x02).is_bus_error());
        assert!(!ModbusError::not_connected().is_bus_error());
        assert!(
            !ModbusError::from(ConfigurationError::invalid_slave_address(0)).is_bus_error()
        );
    }

    #[test]
    fn test_exception_display() {
        let error = ModbusError::exception(7, 0x03, 0x02);
        let message = error.to_string();
        assert!(message.contains("slave 7"));
        assert!(message.contains("0x03"));
        assert!(message.contains("Illegal Data Address"));
    }

    #[test]
    fn test_error_code_display() {
        assert_eq!(ModbusError::no_response(1, 1).error_code().to_string(), "RTU-0201");
        assert_eq!(
            ModbusError::port_unavailable("COM5", "busy").error_code().to_string(),
            "RTU-0101"
        );
        assert_eq!(ErrorCode::new(3, 1).as_u16(), 0x0301);
    }

    #[test]
    fn test_severity() {
        assert_eq!(
            ModbusError::port_unavailable("COM5", "busy").severity(),
            ErrorSeverity::Critical
        );
        assert_eq!(ModbusError::no_response(1, 1).severity(), ErrorSeverity::Warning);
        assert_eq!(ErrorSeverity::Critical.to_tracing_level(), Level::ERROR);
    }

    #[test]
    fn test_recovery_hints_present() {
        assert!(!ModbusError::no_response(1, 1).recovery_hints().is_empty());
        assert!(!ModbusError::port_unavailable("COM5", "x").recovery_hints().is_empty());
        assert!(!ModbusError::exception(1, 0x06, 0x03).recovery_hints().is_empty());
    }

    #[test]
    fn test_io_conversion() {
        let io_error = io::Error::new(io::ErrorKind::BrokenPipe, "pipe");
        let error: ModbusError = io_error.into();
        assert!(matches!(error, ModbusError::Connection(ConnectionError::Io { .. })));
        assert!(error.is_retryable());
    }
}
