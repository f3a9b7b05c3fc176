// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Configuration loading and processing.
//!
//! # Loading Pipeline
//!
//! 1. Read the JSON file
//! 2. Resolve `${VAR}` / `${VAR:default}` placeholders in the raw text
//! 3. Parse into [`CobotConfig`]
//! 4. Apply environment variable overrides
//! 5. Resolve the calibration file path against the config directory
//! 6. Validate
//!
//! # Environment Variable Override
//!
//! ```text
//! COBOT_MODBUS_PORT=/dev/ttyUSB1
//! COBOT_MODBUS_BAUD_RATE=9600
//! COBOT_MODBUS_SLAVE_ADDRESS=5
//! COBOT_MODBUS_MAX_RETRIES=3
//! COBOT_LOG_LEVEL=debug
//! ```

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::error::{ConfigError, ConfigResult};
use crate::schema::{CobotConfig, LogLevel};

/// Default configuration file name.
pub const DEFAULT_CONFIG_FILE: &str = "cobot.json";

/// Default environment variable prefix.
pub const DEFAULT_ENV_PREFIX: &str = "COBOT";

// =============================================================================
// ConfigLoader
// =============================================================================

/// Configuration loader.
///
/// # Examples
///
/// ```no_run
/// use cobot_config::loader::ConfigLoader;
///
/// let config = ConfigLoader::new().load("cobot.json").unwrap();
/// ```
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    /// Base directory for resolving relative paths.
    base_path: Option<PathBuf>,

    /// Environment variable prefix.
    env_prefix: String,

    /// Whether to resolve environment variables.
    resolve_env_vars: bool,

    /// Whether to resolve relative paths.
    resolve_paths: bool,
}

impl ConfigLoader {
    /// Creates a new configuration loader with default settings.
    pub fn new() -> Self {
        Self {
            base_path: None,
            env_prefix: DEFAULT_ENV_PREFIX.to_string(),
            resolve_env_vars: true,
            resolve_paths: true,
        }
    }

    /// Sets the base path for resolving relative paths.
    pub fn with_base_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.base_path = Some(path.into());
        self
    }

    /// Sets the environment variable prefix.
    pub fn with_env_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.env_prefix = prefix.into();
        self
    }

    /// Enables or disables environment variable resolution.
    pub fn with_env_vars(mut self, enabled: bool) -> Self {
        self.resolve_env_vars = enabled;
        self
    }

    /// Enables or disables relative path resolution.
    pub fn with_path_resolution(mut self, enabled: bool) -> Self {
        self.resolve_paths = enabled;
        self
    }

    /// Loads configuration from a file.
    pub fn load(&self, path: impl AsRef<Path>) -> ConfigResult<CobotConfig> {
        self.load_with(path, |name| env::var(name).ok())
    }

    /// Loads configuration from a file, looking variables up with `lookup`.
    pub fn load_with<F>(&self, path: impl AsRef<Path>, lookup: F) -> ConfigResult<CobotConfig>
    where
        F: Fn(&str) -> Option<String>,
    {
        let path = path.as_ref();
        info!("Loading configuration from: {}", path.display());

        let base_path = self.base_path.clone().unwrap_or_else(|| {
            path.parent()
                .filter(|p| !p.as_os_str().is_empty())
                .map(|p| p.to_path_buf())
                .unwrap_or_else(|| PathBuf::from("."))
        });

        let content = read_file(path)?;
        let mut config = self
            .parse_with(&content, &lookup)
            .map_err(|e| ConfigError::parse(path, &e))?;

        if self.resolve_env_vars {
            self.apply_env_overrides_from(&mut config, &lookup)?;
        }

        if self.resolve_paths {
            resolve_relative_paths(&mut config, &base_path);
        }

        config.validate()?;

        info!("Configuration loaded successfully");
        debug!(
            port = %config.modbus.port,
            line = %config.modbus.line_settings(),
            cells = config.cells.cell_count(),
            "Loaded configuration"
        );

        Ok(config)
    }

    /// Loads configuration from a JSON string.
    pub fn load_from_str(&self, content: &str) -> ConfigResult<CobotConfig> {
        self.load_from_str_with(content, |name| env::var(name).ok())
    }

    /// Loads configuration from a JSON string, looking variables up with
    /// `lookup`.
    pub fn load_from_str_with<F>(&self, content: &str, lookup: F) -> ConfigResult<CobotConfig>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = self.parse_with(content, &lookup)?;

        if self.resolve_env_vars {
            self.apply_env_overrides_from(&mut config, &lookup)?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Loads `path` if it exists, otherwise returns validated defaults with
    /// environment overrides applied.
    pub fn load_or_default(&self, path: impl AsRef<Path>) -> ConfigResult<CobotConfig> {
        let path = path.as_ref();
        if path.exists() {
            return self.load(path);
        }

        warn!(
            "Configuration file {} not found, using defaults",
            path.display()
        );
        let mut config = CobotConfig::default();
        if self.resolve_env_vars {
            self.apply_env_overrides_from(&mut config, |name| env::var(name).ok())?;
        }
        config.validate()?;
        Ok(config)
    }

    fn parse_with<F>(&self, content: &str, lookup: F) -> serde_json::Result<CobotConfig>
    where
        F: Fn(&str) -> Option<String>,
    {
        let content = if self.resolve_env_vars {
            resolve_env_placeholders(content, lookup)
        } else {
            content.to_string()
        };

        serde_json::from_str(&content)
    }

    /// Applies `{prefix}_*` overrides using `lookup` for variable values.
    pub fn apply_env_overrides_from<F>(&self, config: &mut CobotConfig, lookup: F) -> ConfigResult<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |suffix: &str| format!("{}_{}", self.env_prefix, suffix);

        if let Some(value) = lookup(&var("MODBUS_PORT")) {
            config.modbus.port = value;
        }

        if let Some(value) = lookup(&var("MODBUS_BAUD_RATE")) {
            config.modbus.baud_rate = value.trim().parse().map_err(|_| {
                ConfigError::invalid_env_var(var("MODBUS_BAUD_RATE"), "expected a baud rate")
            })?;
        }

        if let Some(value) = lookup(&var("MODBUS_SLAVE_ADDRESS")) {
            config.modbus.slave_address = value.trim().parse().map_err(|_| {
                ConfigError::invalid_env_var(
                    var("MODBUS_SLAVE_ADDRESS"),
                    "expected a slave address (1-247)",
                )
            })?;
        }

        if let Some(value) = lookup(&var("MODBUS_MAX_RETRIES")) {
            config.modbus.max_retries = value.trim().parse().map_err(|_| {
                ConfigError::invalid_env_var(var("MODBUS_MAX_RETRIES"), "expected valid number")
            })?;
        }

        if let Some(value) = lookup(&var("LOG_LEVEL")) {
            match LogLevel::parse(&value) {
                Some(level) => config.logging.level = level,
                None => warn!("Ignoring unknown log level '{}'", value),
            }
        }

        Ok(())
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

fn read_file(path: &Path) -> ConfigResult<String> {
    if !path.exists() {
        return Err(ConfigError::file_not_found(path));
    }
    fs::read_to_string(path).map_err(|e| ConfigError::io(path, e))
}

fn resolve_relative_paths(config: &mut CobotConfig, base_path: &Path) {
    if config.calibration.storage_path.is_relative() {
        config.calibration.storage_path = base_path.join(&config.calibration.storage_path);
    }
}

/// Resolves `${VAR_NAME}` and `${VAR_NAME:default}` placeholders.
///
/// Unknown variables without a default are kept verbatim.
pub fn resolve_env_placeholders<F>(content: &str, lookup: F) -> String
where
    F: Fn(&str) -> Option<String>,
{
    let mut result = String::with_capacity(content.len());
    let mut chars = content.chars().peekable();

    while let Some(c) = chars.next() {
        if c == '$' && chars.peek() == Some(&'{') {
            chars.next(); // consume '{'

            let mut var_content = String::new();
            let mut found_close = false;

            for c in chars.by_ref() {
                if c == '}' {
                    found_close = true;
                    break;
                }
                var_content.push(c);
            }

            if !found_close {
                result.push_str("${");
                result.push_str(&var_content);
                continue;
            }

            let (var_name, default_value) = match var_content.find(':') {
                Some(idx) => (&var_content[..idx], Some(&var_content[idx + 1..])),
                None => (var_content.as_str(), None),
            };

            match (lookup(var_name), default_value) {
                (Some(value), _) => result.push_str(&value),
                (None, Some(default)) => result.push_str(default),
                (None, None) => {
                    warn!("Environment variable '{}' not found", var_name);
                    result.push_str(&format!("${{{}}}", var_name));
                }
            }
        } else {
            result.push(c);
        }
    }

    result
}

// =============================================================================
// Convenience Functions
// =============================================================================

/// Loads configuration from a file with default settings.
pub fn load_config(path: impl AsRef<Path>) -> ConfigResult<CobotConfig> {
    ConfigLoader::new().load(path)
}

// =============================================================================
// Tests
// =============================================================================
