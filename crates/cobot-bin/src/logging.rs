// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Logging and tracing initialization.
//!
//! `RUST_LOG` wins over the configured level when set.

use cobot_config::{LogFormat, LoggingConfig};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

// =============================================================================
// Logging Initialization
// =============================================================================

/// Initializes the logging subsystem.
///
/// Logs go to stderr so command output on stdout stays parseable. Calling
/// this twice keeps the first subscriber.
///
/// # Example
///
/// ```ignore
/// use cobot_bin::logging::init_logging;
///
/// init_logging(&config.logging);
/// ```
pub fn init_logging(config: &LoggingConfig) {
    let env_filter = build_filter(config.level.as_str());

    match config.format {
        LogFormat::Text => init_text_logging(env_filter, config),
        LogFormat::Json => init_json_logging(env_filter, config),
        LogFormat::Compact => init_compact_logging(env_filter, config),
    }
}

/// Builds the filter from `RUST_LOG`, falling back to `level`.
pub fn build_filter(level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level))
}

fn init_text_logging(filter: EnvFilter, config: &LoggingConfig) {
    let is_terminal = std::io::IsTerminal::is_terminal(&std::io::stderr());

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(config.with_target)
                .with_thread_ids(config.with_thread_ids)
                .with_file(config.with_file)
                .with_line_number(config.with_file)
                .with_ansi(is_terminal),
        )
        .try_init();
}

fn init_json_logging(filter: EnvFilter, config: &LoggingConfig) {
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .json()
                .with_writer(std::io::stderr)
                .with_target(config.with_target)
                .with_thread_ids(config.with_thread_ids)
                .with_file(config.with_file)
                .with_line_number(config.with_file)
                .with_current_span(true)
                .with_span_list(true),
        )
        .try_init();
}

fn init_compact_logging(filter: EnvFilter, config: &LoggingConfig) {
    let is_terminal = std::io::IsTerminal::is_terminal(&std::io::stderr());

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .compact()
                .with_writer(std::io::stderr)
                .with_target(false)
                .with_thread_ids(config.with_thread_ids)
                .with_file(false)
                .with_line_number(false)
                .with_ansi(is_terminal),
        )
        .try_init();
}
