// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # cobot-bin
//!
//! The `cobot` command-line tool.
//!
//! ## Architecture
//!
//! ```text
//!                    ┌─────────────┐
//!                    │   main.rs   │
//!                    └──────┬──────┘
//!                    ┌──────▼──────┐
//!                    │   cli.rs    │
//!                    └──────┬──────┘
//!               ┌───────────┼───────────┐
//!               ▼           ▼           ▼
//!        ┌──────────┐ ┌──────────┐ ┌──────────┐
//!        │ commands │ │ logging  │ │ shutdown │
//!        └────┬─────┘ └──────────┘ └──────────┘
//!             │
//!      ┌──────┴──────┐
//!      │   cobot-*   │
//!      │  (crates)   │
//!      └─────────────┘
//! ```
//!
//! ## Usage
//!
//! ```bash
//! # Find devices on the configured port
//! cobot scan --start 1 --end 32
//!
//! # Read the load cell of cell 2 on slave 5
//! cobot read --slave 5 --cell 2 --decimals 1
//!
//! # Refit a stored calibration with up to cubic terms
//! cobot fit --samples laser_calibration.json --max-degree 3
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]

// =============================================================================
// Modules
// =============================================================================

pub mod cli;
pub mod commands;
pub mod error;
pub mod logging;
pub mod shutdown;

// =============================================================================
// Re-exports
// =============================================================================

pub use cli::{Cli, Commands};
pub use error::{BinError, BinResult};
pub use logging::init_logging;
pub use shutdown::CancelOnSignal;

use cobot_config::{CobotConfig, ConfigLoader, LogLevel};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Crate name.
pub const NAME: &str = env!("CARGO_PKG_NAME");

/// Loads configuration, initializes logging and runs the selected command.
pub async fn run(cli: Cli) -> BinResult<()> {
    if cli.is_standalone() {
        return commands::execute(&cli, CobotConfig::default()).await;
    }

    let loaded = ConfigLoader::new().load_or_default(&cli.config);

    let mut logging = loaded
        .as_ref()
        .map(|config| config.logging.clone())
        .unwrap_or_default();
    apply_log_overrides(&cli, &mut logging)?;
    init_logging(&logging);

    let mut config = loaded?;
    config.logging = logging;
    if let Some(port) = &cli.port {
        config.modbus.port = port.clone();
        config.validate()?;
    }

    commands::execute(&cli, config).await
}

fn apply_log_overrides(cli: &Cli, logging: &mut cobot_config::LoggingConfig) -> BinResult<()> {
    if let Some(level) = &cli.log_level {
        logging.level = LogLevel::parse(level)
            .ok_or_else(|| BinError::config(format!("unknown log level '{}'", level)))?;
    }
    if let Some(format) = cli.log_format {
        logging.format = format.into();
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn test_log_overrides() {
        let cli = Cli::parse_from(["cobot", "cells", "-l", "warning", "--log-format", "compact"]);
        let mut logging = cobot_config::LoggingConfig::default();
        apply_log_overrides(&cli, &mut logging).unwrap();
        assert_eq!(logging.level, LogLevel::Warn);
        assert_eq!(logging.format, cobot_config::LogFormat::Compact);
    }

    #[test]
    fn test_unknown_log_level() {
        let cli = Cli::parse_from(["cobot", "cells", "-l", "loud"]);
        let mut logging = cobot_config::LoggingConfig::default();
        assert!(apply_log_overrides(&cli, &mut logging).is_err());
    }
}
