// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! `cobot` binary entry point.

use cobot_bin::cli::Cli;
use cobot_bin::error::report_error_and_exit;

#[tokio::main]
async fn main() {
    let cli = Cli::parse_args();
    if let Err(error) = cobot_bin::run(cli).await {
        report_error_and_exit(error);
    }
}
