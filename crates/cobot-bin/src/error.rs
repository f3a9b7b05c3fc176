// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Error types for the `cobot` binary.
//!
//! # Exit Codes
//!
//! | Code | Meaning                                   |
//! |------|-------------------------------------------|
//! | 1    | Invalid configuration or unknown cell     |
//! | 2    | Invalid command input or sample file      |
//! | 3    | File could not be read or written         |
//! | 4    | Bus or protocol fault                     |
//! | 5    | Addressed device did not answer           |
//! | 6    | Calibration or fit failed                 |

use thiserror::Error;

use cobot_calibration::CalibrationError;
use cobot_config::ConfigError;
use cobot_modbus::ModbusError;

/// Result type alias for cobot-bin operations.
pub type BinResult<T> = Result<T, BinError>;

/// Process exit codes.
pub mod exit_code {
    /// Invalid configuration.
    pub const CONFIG: i32 = 1;
    /// Invalid command input.
    pub const INPUT: i32 = 2;
    /// File access failure.
    pub const IO: i32 = 3;
    /// Bus or protocol fault.
    pub const BUS: i32 = 4;
    /// Device did not answer.
    pub const NO_RESPONSE: i32 = 5;
    /// Calibration failure.
    pub const CALIBRATION: i32 = 6;
}

/// Errors surfaced by `cobot` commands.
#[derive(Debug, Error)]
pub enum BinError {
    /// Settings rejected by a command.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Bad arguments or input file contents.
    #[error("Invalid input: {0}")]
    Input(String),

    /// File access failure.
    #[error("I/O error: {0}")]
    Io(String),

    /// Loading the configuration failed.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// A bus transaction failed.
    #[error(transparent)]
    Modbus(#[from] ModbusError),

    /// Calibration, fitting or model storage failed.
    #[error(transparent)]
    Calibration(#[from] CalibrationError),

    /// An error annotated with what the command was doing.
    #[error("{context}: {source}")]
    WithContext {
        /// What was being done.
        context: String,
        /// The failure.
        #[source]
        source: Box<BinError>,
    },
}

impl BinError {
    /// Creates a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    /// Creates an input error.
    pub fn input(msg: impl Into<String>) -> Self {
        Self::Input(msg.into())
    }

    /// Creates an I/O error.
    pub fn io(msg: impl Into<String>) -> Self {
        Self::Io(msg.into())
    }

    /// Annotates the error with `context`.
    pub fn with_context(self, context: impl Into<String>) -> Self {
        Self::WithContext {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// Returns the innermost error, skipping context layers.
    pub fn root(&self) -> &BinError {
        match self {
            Self::WithContext { source, .. } => source.root(),
            other => other,
        }
    }

    /// Returns the process exit code.
    pub fn exit_code(&self) -> i32 {
        match self.root() {
            Self::Configuration(_) => exit_code::CONFIG,
            Self::Config(e) if e.is_io_error() => exit_code::IO,
            Self::Config(_) => exit_code::CONFIG,
            Self::Input(_) => exit_code::INPUT,
            Self::Io(_) => exit_code::IO,
            Self::Modbus(e) if e.is_no_response() => exit_code::NO_RESPONSE,
            Self::Modbus(_) => exit_code::BUS,
            Self::Calibration(_) => exit_code::CALIBRATION,
            Self::WithContext { .. } => exit_code::CONFIG,
        }
    }

    /// Returns what the operator can check to clear the failure.
    pub fn recovery_hints(&self) -> Vec<&'static str> {
        match self.root() {
            Self::Modbus(e) => e.recovery_hints(),
            Self::Calibration(e) => e.recovery_hints(),
            _ => Vec::new(),
        }
    }
}

impl From<std::io::Error> for BinError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

// =============================================================================
// Error Reporting
// =============================================================================

/// Prints the error and its causes to stderr.
pub fn report_error(error: &BinError) {
    eprintln!("Error: {}", error);

    let mut source = std::error::Error::source(error);
    while let Some(cause) = source {
        eprintln!("  Caused by: {}", cause);
        source = cause.source();
    }

    for hint in error.recovery_hints() {
        eprintln!("  Hint: {}", hint);
    }
}

/// Reports an error and exits with its code.
pub fn report_error_and_exit(error: BinError) -> ! {
    report_error(&error);
    std::process::exit(error.exit_code())
}

// =============================================================================
// Tests
// =============================================================================
