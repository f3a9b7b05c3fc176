// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Errors raised while reading and checking the cell configuration.

use std::path::PathBuf;

use thiserror::Error;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file is not valid JSON or does not match the schema.
    #[error("{}:{line}:{column}: {message}", path.display())]
    Parse {
        /// Configuration file.
        path: PathBuf,
        /// Line of the offending token (1-based, 0 if unknown).
        line: usize,
        /// Column of the offending token (1-based, 0 if unknown).
        column: usize,
        /// Decoder message.
        message: String,
    },

    /// In-memory JSON input failed to decode.
    #[error("Invalid configuration JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// A value is outside its allowed range.
    #[error("Invalid '{field}': {message}")]
    Validation {
        /// Dotted path of the setting, e.g. `modbus.baud_rate`.
        field: String,
        /// What is wrong with it.
        message: String,
    },

    /// The configuration file could not be read.
    #[error("Cannot read '{}': {source}", path.display())]
    Io {
        /// File being read.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// The configuration file does not exist.
    #[error("Configuration file '{}' does not exist", path.display())]
    FileNotFound {
        /// Missing path.
        path: PathBuf,
    },

    /// An override variable holds an unusable value.
    #[error("Environment variable {name}: {message}")]
    InvalidEnvVar {
        /// Variable name including the prefix.
        name: String,
        /// What was expected.
        message: String,
    },

    /// The cell is not in the motor mapping.
    #[error("Unknown cell {cell_id}; configured cells are {valid:?}")]
    UnknownCell {
        /// Requested cell.
        cell_id: u8,
        /// Configured cells.
        valid: Vec<u8>,
    },

    /// A glue type name is empty.
    #[error("Invalid glue type '{value}'")]
    InvalidGlueType {
        /// Rejected text.
        value: String,
    },
}

impl ConfigError {
    /// Wraps a decoder error for `path`, keeping its position.
    pub fn parse(path: impl Into<PathBuf>, error: &serde_json::Error) -> Self {
        Self::Parse {
            path: path.into(),
            line: error.line(),
            column: error.column(),
            message: error.to_string(),
        }
    }

    /// Creates a validation error.
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Creates a read error.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Creates a missing-file error.
    pub fn file_not_found(path: impl Into<PathBuf>) -> Self {
        Self::FileNotFound { path: path.into() }
    }

    /// Creates an override error.
    pub fn invalid_env_var(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidEnvVar {
            name: name.into(),
            message: message.into(),
        }
    }

    /// Returns `true` if the file itself could not be accessed.
    pub fn is_io_error(&self) -> bool {
        matches!(self, Self::Io { .. } | Self::FileNotFound { .. })
    }

    /// Returns `true` for problems with the contents rather than the file.
    pub fn is_content_error(&self) -> bool {
        !self.is_io_error()
    }

    /// Short category name for log fields.
    pub fn category(&self) -> &'static str {
        match self {
            Self::Parse { .. } | Self::Json(_) => "parse",
            Self::Validation { .. } => "validation",
            Self::Io { .. } | Self::FileNotFound { .. } => "io",
            Self::InvalidEnvVar { .. } => "environment",
            Self::UnknownCell { .. } | Self::InvalidGlueType { .. } => "cells",
        }
    }
}

/// Result alias for configuration operations.
pub type ConfigResult<T> = Result<T, ConfigError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_keeps_position() {
        let json_err = serde_json::from_str::<serde_json::Value>("{\n  \"a\": ,\n}").unwrap_err();
        let error = ConfigError::parse("cobot.json", &json_err);

        match &error {
            ConfigError::Parse { line, column, .. } => {
                assert_eq!(*line, 2);
                assert!(*column > 0);
            }
            other => panic!("Expected Parse error, got {other:?}"),
        }
        assert!(error.to_string().starts_with("cobot.json:2:"));
        assert_eq!(error.category(), "parse");
    }

    #[test]
    fn test_io_classification() {
        let error = ConfigError::io(
            "cobot.json",
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        );
        assert!(error.is_io_error());
        assert!(ConfigError::file_not_found("cobot.json").is_io_error());
        assert!(ConfigError::validation("scan", "empty range").is_content_error());
    }

    #[test]
    fn test_unknown_cell_message() {
        let error = ConfigError::UnknownCell {
            cell_id: 9,
            valid: vec![1, 2, 3, 4],
        };
        assert_eq!(error.to_string(), "Unknown cell 9; configured cells are [1, 2, 3, 4]");
        assert_eq!(error.category(), "cells");
    }

    #[test]
    fn test_env_var_message() {
        let error = ConfigError::invalid_env_var("COBOT_MODBUS_BAUD_RATE", "expected a baud rate");
        assert_eq!(
            error.to_string(),
            "Environment variable COBOT_MODBUS_BAUD_RATE: expected a baud rate"
        );
    }
}
