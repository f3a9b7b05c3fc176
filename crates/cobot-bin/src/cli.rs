// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! CLI argument parsing and command definitions.
//!
//! - `scan`: Probe a range of slave addresses
//! - `read` / `write`: Access one holding register, by number or by cell
//! - `fit`: Fit a calibration polynomial to stored samples
//! - `cells`: Show the cell to motor register mapping
//! - `validate`: Validate the configuration file
//! - `version`: Show version information

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use cobot_config::DEFAULT_CONFIG_FILE;

// =============================================================================
// Main CLI Structure
// =============================================================================

/// Glue cell hardware tool
///
/// Talks to the cell's Modbus RTU devices and fits laser height calibrations.
#[derive(Parser, Debug)]
#[command(
    name = "cobot",
    author = "Sylvex <contact@sylvex.io>",
    version,
    about = "Glue cell hardware tool: Modbus RTU bus access and laser height calibration",
    long_about = None,
    propagate_version = true
)]
pub struct Cli {
    /// Configuration file path
    #[arg(
        short,
        long,
        default_value = DEFAULT_CONFIG_FILE,
        env = "COBOT_CONFIG",
        global = true
    )]
    pub config: PathBuf,

    /// Log level (trace, debug, info, warn, error); overrides the config file
    #[arg(short, long, global = true)]
    pub log_level: Option<String>,

    /// Log format; overrides the config file
    #[arg(long, global = true)]
    pub log_format: Option<LogFormat>,

    /// Serial port; overrides the config file
    #[arg(short, long, global = true)]
    pub port: Option<String>,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

// =============================================================================
// Subcommands
// =============================================================================

/// Available subcommands.
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Scan the bus for responding slaves
    ///
    /// Probes each address in the range once with a short retry budget.
    /// Ctrl-C stops the scan after the probe in flight.
    Scan(ScanArgs),

    /// Read one holding register
    Read(ReadArgs),

    /// Write one holding register
    Write(WriteArgs),

    /// Fit a calibration polynomial to recorded samples
    ///
    /// Accepts a calibration file written by a previous run or a plain
    /// `[[height_mm, pixel_delta], ...]` list.
    Fit(FitArgs),

    /// Show the cell to motor register mapping and glue types
    Cells(CellsArgs),

    /// Validate the configuration file
    Validate(ValidateArgs),

    /// Show version information
    Version,
}

// =============================================================================
// Command Arguments
// =============================================================================

/// Arguments for the `scan` command.
#[derive(Args, Debug, Clone, Default)]
pub struct ScanArgs {
    /// First address (default from config)
    #[arg(long)]
    pub start: Option<u8>,

    /// Last address (default from config)
    #[arg(long)]
    pub end: Option<u8>,

    /// Register read by each probe
    #[arg(long)]
    pub register: Option<u16>,

    /// Decimal places of the probe value
    #[arg(long)]
    pub decimals: Option<u8>,

    /// Retries per address
    #[arg(long)]
    pub retries: Option<u32>,

    /// Output format
    #[arg(short, long, default_value = "text")]
    pub format: OutputFormat,
}

/// Register selection shared by `read` and `write`.
#[derive(Args, Debug, Clone, Default)]
pub struct RegisterTarget {
    /// Slave address (default from config)
    #[arg(short, long)]
    pub slave: Option<u8>,

    /// Register address
    #[arg(short, long, conflicts_with = "cell", required_unless_present = "cell")]
    pub register: Option<u16>,

    /// Cell id, resolved through the cell motor mapping
    #[arg(long)]
    pub cell: Option<u8>,

    /// Decimal places
    #[arg(short, long, default_value = "0")]
    pub decimals: u8,
}

/// Arguments for the `read` command.
#[derive(Args, Debug, Clone, Default)]
pub struct ReadArgs {
    /// Register to read.
    #[command(flatten)]
    pub target: RegisterTarget,
}

/// Arguments for the `write` command.
#[derive(Args, Debug, Clone)]
pub struct WriteArgs {
    /// Register to write.
    #[command(flatten)]
    pub target: RegisterTarget,

    /// Value before decimal scaling
    #[arg(long, allow_hyphen_values = true)]
    pub value: f64,
}

/// Arguments for the `fit` command.
#[derive(Args, Debug, Clone)]
pub struct FitArgs {
    /// Calibration file or sample list
    #[arg(long)]
    pub samples: PathBuf,

    /// Highest degree tried (default from config)
    #[arg(long)]
    pub max_degree: Option<usize>,

    /// Write the fitted model to this file
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

/// Arguments for the `cells` command.
#[derive(Args, Debug, Clone, Default)]
pub struct CellsArgs {
    /// Output format
    #[arg(short, long, default_value = "text")]
    pub format: OutputFormat,
}

/// Arguments for the `validate` command.
#[derive(Args, Debug, Clone, Default)]
pub struct ValidateArgs {
    /// Show parsed configuration after validation
    #[arg(short, long)]
    pub show_config: bool,

    /// Output format for validation results
    #[arg(short, long, default_value = "text")]
    pub format: OutputFormat,

    /// Strict mode: treat warnings as errors
    #[arg(long)]
    pub strict: bool,
}

// =============================================================================
// Enums
// =============================================================================

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum LogFormat {
    /// Human-readable text format
    #[default]
    Text,
    /// JSON format for structured logging
    Json,
    /// Compact format for minimal output
    Compact,
}

impl From<LogFormat> for cobot_config::LogFormat {
    fn from(format: LogFormat) -> Self {
        match format {
            LogFormat::Text => cobot_config::LogFormat::Text,
            LogFormat::Json => cobot_config::LogFormat::Json,
            LogFormat::Compact => cobot_config::LogFormat::Compact,
        }
    }
}

/// Output format for command results.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text format
    #[default]
    Text,
    /// JSON format for programmatic parsing
    Json,
}

// =============================================================================
// Helper Methods
// =============================================================================

impl Cli {
    /// Parse CLI arguments from the command line.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Returns `true` for commands that never touch the configuration.
    pub fn is_standalone(&self) -> bool {
        matches!(self.command, Commands::Version)
    }
}

// =============================================================================
// Tests
// =============================================================================
