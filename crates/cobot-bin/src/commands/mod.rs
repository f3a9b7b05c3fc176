// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! CLI command implementations.
//!
//! - `scan`: Probe a range of slave addresses
//! - `read` / `write`: Access one holding register
//! - `fit`: Fit a calibration polynomial
//! - `cells`: Show the cell mapping
//! - `validate`: Validate configuration file
//! - `version`: Show version information

mod cells;
mod fit;
mod register;
mod scan;
mod validate;
mod version;

pub use cells::cells;
pub use fit::{SampleInput, fit, load_samples};
pub use register::{read, resolve_register, write};
pub use scan::scan;
pub use validate::validate;
pub use version::version;

use std::sync::Arc;

use cobot_config::CobotConfig;
use cobot_modbus::RtuTransport;

use crate::cli::{Cli, Commands};
use crate::error::BinResult;

/// Executes the appropriate command based on CLI arguments.
pub async fn execute(cli: &Cli, config: CobotConfig) -> BinResult<()> {
    match cli.command.clone() {
        Commands::Scan(args) => scan::scan(&config, args).await,
        Commands::Read(args) => register::read(&config, args).await,
        Commands::Write(args) => register::write(&config, args).await,
        Commands::Fit(args) => fit::fit(&config, args).await,
        Commands::Cells(args) => cells::cells(&config, args),
        Commands::Validate(args) => validate::validate(cli, args),
        Commands::Version => version::version(),
    }
}

/// Opens the configured serial port.
fn open_transport(config: &CobotConfig) -> BinResult<Arc<RtuTransport>> {
    Ok(Arc::new(RtuTransport::open(config.modbus.clone())?))
}
