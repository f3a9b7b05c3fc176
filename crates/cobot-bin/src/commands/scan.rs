// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Implementation of the `scan` command.

use cobot_config::CobotConfig;
use cobot_modbus::{BusScanResult, ModbusBusScanner, ProbeOutcome, ScanRequest};
use tracing::info;

use super::open_transport;
use crate::cli::{OutputFormat, ScanArgs};
use crate::error::BinResult;
use crate::shutdown::CancelOnSignal;

/// Executes the `scan` command.
pub async fn scan(config: &CobotConfig, args: ScanArgs) -> BinResult<()> {
    let request = scan_request(config, &args);
    request.validate()?;

    let transport = open_transport(config)?;
    let scanner = ModbusBusScanner::new(transport.clone())
        .with_probe_retries(args.retries.unwrap_or(config.scan.probe_retries));

    let guard = CancelOnSignal::install();
    let flag = guard.flag();
    let result = scanner.scan_cancellable(&request, &flag).await;
    drop(guard);
    transport.close().await;
    let result = result?;

    info!(
        found = result.responding().len(),
        elapsed = %humantime::format_duration(result.elapsed()),
        cancelled = result.was_cancelled(),
        "Bus scan finished"
    );

    match args.format {
        OutputFormat::Text => print_text(&config.modbus.port, &request, &result),
        OutputFormat::Json => print_json(&config.modbus.port, &request, &result),
    }
    Ok(())
}

/// Merges command-line overrides into the configured scan range.
fn scan_request(config: &CobotConfig, args: &ScanArgs) -> ScanRequest {
    ScanRequest::new(
        args.start.unwrap_or(config.scan.start_address),
        args.end.unwrap_or(config.scan.end_address),
    )
    .with_test_register(args.register.unwrap_or(config.scan.test_register))
    .with_decimals(args.decimals.unwrap_or(config.scan.decimals))
}

fn print_text(port: &str, request: &ScanRequest, result: &BusScanResult) {
    let responding = result.responding();
    println!(
        "Scanned {} addresses {}-{} on {}",
        result.probes().len(),
        request.start,
        request.end,
        port
    );
    if result.was_cancelled() {
        println!("Scan cancelled before the end of the range");
    }

    if responding.is_empty() {
        println!("No devices found");
    } else {
        println!("Found {} device(s):", responding.len());
        for record in result.probes() {
            if let ProbeOutcome::Responding { value } = record.outcome {
                println!("  {:>3}  register {} = {}", record.address, request.test_register, value);
            }
        }
    }

    let errors: Vec<_> = result.errors().collect();
    if !errors.is_empty() {
        println!();
        println!("Probe errors:");
        for record in errors {
            println!("  {:>3}  {}", record.address, record.outcome);
        }
    }
}

fn print_json(port: &str, request: &ScanRequest, result: &BusScanResult) {
    let errors: Vec<_> = result
        .errors()
        .map(|record| {
            serde_json::json!({
                "address": record.address,
                "error": record.outcome.to_string(),
            })
        })
        .collect();

    let output = serde_json::json!({
        "port": port,
        "start": request.start,
        "end": request.end,
        "test_register": request.test_register,
        "responding": result.responding(),
        "errors": errors,
        "probed": result.probes().len(),
        "cancelled": result.was_cancelled(),
        "elapsed_ms": result.elapsed().as_millis() as u64,
    });
    println!(
        "{}",
        serde_json::to_string_pretty(&output).unwrap_or_else(|_| output.to_string())
    );
}
