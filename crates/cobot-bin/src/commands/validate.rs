// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Implementation of the `validate` command.

use cobot_config::CobotConfig;

use crate::cli::{Cli, OutputFormat, ValidateArgs};
use crate::error::{BinError, BinResult};

/// Executes the `validate` command to validate configuration.
pub fn validate(cli: &Cli, args: ValidateArgs) -> BinResult<()> {
    let config_path = &cli.config;

    if !config_path.exists() {
        return Err(BinError::Configuration(format!(
            "Configuration file not found: {}",
            config_path.display()
        )));
    }

    let config = cobot_config::load_config(config_path).map_err(|e| {
        BinError::Configuration(format!("Configuration validation failed: {}", e))
    })?;

    let warnings = collect_warnings(&config);

    match args.format {
        OutputFormat::Text => {
            println!("✓ Configuration is valid: {}", config_path.display());
            println!();
            println!("Summary:");
            println!("  Port:        {} ({})", config.modbus.port, config.modbus.line_settings());
            println!("  Slave:       {}", config.modbus.slave_address);
            println!("  Scan range:  {}-{}", config.scan.start_address, config.scan.end_address);
            println!("  Cells:       {}", config.cells.cell_count());
            println!("  Calibration: {}", config.calibration.storage_path.display());

            if !warnings.is_empty() {
                println!();
                println!("Warnings:");
                for warning in &warnings {
                    println!("  ⚠ {}", warning);
                }
            }

            if args.show_config {
                println!();
                println!("Parsed configuration:");
                println!(
                    "{}",
                    serde_json::to_string_pretty(&config)
                        .unwrap_or_else(|_| "(serialization error)".to_string())
                );
            }
        }
        OutputFormat::Json => {
            let output = serde_json::json!({
                "valid": true,
                "config_path": config_path.display().to_string(),
                "summary": {
                    "port": config.modbus.port,
                    "slave_address": config.modbus.slave_address,
                    "scan_start": config.scan.start_address,
                    "scan_end": config.scan.end_address,
                    "cell_count": config.cells.cell_count(),
                    "calibration_file": config.calibration.storage_path.display().to_string(),
                },
                "warnings": warnings,
                "config": if args.show_config { Some(&config) } else { None },
            });
            println!(
                "{}",
                serde_json::to_string_pretty(&output).unwrap_or_else(|_| output.to_string())
            );
        }
    }

    if args.strict && !warnings.is_empty() {
        return Err(BinError::Configuration(format!(
            "Strict mode: {} warning(s) found",
            warnings.len()
        )));
    }

    Ok(())
}

/// Non-fatal issues worth pointing out.
fn collect_warnings(config: &CobotConfig) -> Vec<String> {
    let mut warnings = Vec::new();

    let slave = config.modbus.slave_address;
    if slave < config.scan.start_address || slave > config.scan.end_address {
        warnings.push(format!(
            "Default slave {} lies outside the scan range {}-{}",
            slave, config.scan.start_address, config.scan.end_address
        ));
    }

    if let Some(parent) = config.calibration.storage_path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            warnings.push(format!(
                "Calibration directory does not exist: {}",
                parent.display()
            ));
        }
    }

    let unassigned: Vec<u8> = config
        .cells
        .cell_ids()
        .into_iter()
        .filter(|cell| config.cells.glue_type(*cell).is_none())
        .collect();
    if !unassigned.is_empty() && unassigned.len() < config.cells.cell_count() {
        warnings.push(format!("Cells without a glue type: {:?}", unassigned));
    }

    warnings
}
