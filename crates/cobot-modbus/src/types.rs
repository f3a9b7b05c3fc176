// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Serial port configuration for Modbus RTU.
//!
//! - **SerialPortConfig**: immutable RTU line settings with builder
//! - **DataBits / Parity / StopBits**: character framing
//!
//! A configuration is created once and never mutated. Changing a setting means
//! building a new configuration and opening a new transport with it.
//!
//! # Examples
//!
//! ```
//! use std::time::Duration;
//! use cobot_modbus::types::{SerialPortConfig, Parity};
//!
//! let config = SerialPortConfig::builder()
//!     .port("/dev/ttyUSB0")
//!     .baud_rate(19200)
//!     .parity(Parity::Even)
//!     .slave_address(5)
//!     .timeout(Duration::from_millis(50))
//!     .build()
//!     .unwrap();
//!
//! assert_eq!(config.line_settings(), "19200 8E1");
//! ```

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{ConfigurationError, ModbusError, ModbusResult};

/// Lowest assignable slave address.
pub const MIN_SLAVE_ADDRESS: u8 = 1;

/// Highest assignable slave address.
pub const MAX_SLAVE_ADDRESS: u8 = 247;

/// Baud rates accepted by [`SerialPortConfig::validate`].
pub const VALID_BAUD_RATES: &[u32] = &[
    1200, 2400, 4800, 9600, 14400, 19200, 38400, 57600, 115200, 230400, 460800, 921600,
];

// =============================================================================
// SerialPortConfig
// =============================================================================

/// Settings of one RTU serial line and its default slave.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SerialPortConfig {
    /// Default slave address (1-247).
    #[serde(default = "default_slave_address")]
    pub slave_address: u8,

    /// Serial port identifier (e.g. "/dev/ttyUSB0" or "COM5").
    #[serde(default = "default_port")]
    pub port: String,

    /// Baud rate.
    #[serde(default = "default_baud_rate")]
    pub baud_rate: u32,

    /// Data bits per character.
    #[serde(default)]
    pub data_bits: DataBits,

    /// Parity.
    #[serde(default)]
    pub parity: Parity,

    /// Stop bits.
    #[serde(default)]
    pub stop_bits: StopBits,

    /// Time to wait for the first byte of a response.
    #[serde(default = "default_timeout", with = "humantime_serde")]
    pub timeout: Duration,

    /// Maximum silence between two bytes of the same response.
    #[serde(default = "default_inter_byte_timeout", with = "humantime_serde")]
    pub inter_byte_timeout: Duration,

    /// Retries after the first attempt of a transaction.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

fn default_slave_address() -> u8 {
    1
}

fn default_port() -> String {
    if cfg!(windows) {
        "COM5".to_string()
    } else {
        "/dev/ttyUSB0".to_string()
    }
}

fn default_baud_rate() -> u32 {
    115200
}

fn default_timeout() -> Duration {
    Duration::from_millis(20)
}

fn default_inter_byte_timeout() -> Duration {
    Duration::from_millis(10)
}

fn default_max_retries() -> u32 {
    30
}

impl SerialPortConfig {
    /// Creates a new builder.
    pub fn builder() -> SerialPortConfigBuilder {
        SerialPortConfigBuilder::default()
    }

    /// Creates a configuration with default settings on the given port.
    pub fn new(port: impl Into<String>) -> Self {
        Self {
            port: port.into(),
            ..Default::default()
        }
    }

    /// Returns a copy addressed to another default slave.
    pub fn with_slave_address(&self, slave_address: u8) -> Self {
        Self {
            slave_address,
            ..self.clone()
        }
    }

    /// Returns the number of bits on the wire per character.
    pub fn bits_per_char(&self) -> u32 {
        1 + self.data_bits.bits() as u32 + self.parity.bits() as u32 + self.stop_bits.bits() as u32
    }

    /// Returns the time to transmit one character.
    pub fn character_time(&self) -> Duration {
        Duration::from_secs_f64(self.bits_per_char() as f64 / self.baud_rate.max(1) as f64)
    }

    /// Returns the 3.5 character silence that delimits RTU frames.
    ///
    /// Never shorter than 1 ms, since the OS cannot schedule finer than that.
    pub fn inter_frame_delay(&self) -> Duration {
        let delay_us =
            (3.5 * self.bits_per_char() as f64 / self.baud_rate.max(1) as f64 * 1_000_000.0) as u64;
        Duration::from_micros(delay_us.max(1000))
    }

    /// Upper bound on how long one transaction may block.
    pub fn worst_case_transaction_time(&self) -> Duration {
        self.timeout.saturating_mul(self.max_retries.saturating_add(1))
    }

    /// Returns the line settings in the usual "115200 8N1" notation.
    pub fn line_settings(&self) -> String {
        format!(
            "{} {}{}{}",
            self.baud_rate, self.data_bits, self.parity, self.stop_bits
        )
    }

    /// Validates this configuration.
    pub fn validate(&self) -> ModbusResult<()> {
        validate_slave_address(self.slave_address)?;

        if self.port.trim().is_empty() {
            return Err(ConfigurationError::missing_field("port").into());
        }

        if !VALID_BAUD_RATES.contains(&self.baud_rate) {
            return Err(ConfigurationError::InvalidBaudRate {
                baud_rate: self.baud_rate,
            }
            .into());
        }

        if self.timeout.is_zero() {
            return Err(ConfigurationError::InvalidTimeout {
                name: "timeout",
                duration: self.timeout,
            }
            .into());
        }

        if self.inter_byte_timeout.is_zero() {
            return Err(ConfigurationError::InvalidTimeout {
                name: "inter_byte_timeout",
                duration: self.inter_byte_timeout,
            }
            .into());
        }

        Ok(())
    }
}

impl Default for SerialPortConfig {
    fn default() -> Self {
        Self {
            slave_address: default_slave_address(),
            port: default_port(),
            baud_rate: default_baud_rate(),
            data_bits: DataBits::default(),
            parity: Parity::default(),
            stop_bits: StopBits::default(),
            timeout: default_timeout(),
            inter_byte_timeout: default_inter_byte_timeout(),
            max_retries: default_max_retries(),
        }
    }
}

impl fmt::Display for SerialPortConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} @ {} (slave {})",
            self.port,
            self.line_settings(),
            self.slave_address
        )
    }
}

/// Checks that `address` is an assignable slave address (1-247).
pub fn validate_slave_address(address: u8) -> ModbusResult<()> {
    if (MIN_SLAVE_ADDRESS..=MAX_SLAVE_ADDRESS).contains(&address) {
        Ok(())
    } else {
        Err(ModbusError::configuration(
            ConfigurationError::invalid_slave_address(address),
        ))
    }
}

// =============================================================================
// SerialPortConfigBuilder
// =============================================================================

/// Builder for [`SerialPortConfig`].
#[derive(Debug, Default)]
pub struct SerialPortConfigBuilder {
    slave_address: Option<u8>,
    port: Option<String>,
    baud_rate: Option<u32>,
    data_bits: Option<DataBits>,
    parity: Option<Parity>,
    stop_bits: Option<StopBits>,
    timeout: Option<Duration>,
    inter_byte_timeout: Option<Duration>,
    max_retries: Option<u32>,
}

impl SerialPortConfigBuilder {
    /// Sets the default slave address.
    pub fn slave_address(mut self, address: u8) -> Self {
        self.slave_address = Some(address);
        self
    }

    /// Sets the serial port.
    pub fn port(mut self, port: impl Into<String>) -> Self {
        self.port = Some(port.into());
        self
    }

    /// Sets the baud rate.
    pub fn baud_rate(mut self, rate: u32) -> Self {
        self.baud_rate = Some(rate);
        self
    }

    /// Sets the data bits.
    pub fn data_bits(mut self, bits: DataBits) -> Self {
        self.data_bits = Some(bits);
        self
    }

    /// Sets the parity.
    pub fn parity(mut self, parity: Parity) -> Self {
        self.parity = Some(parity);
        self
    }

    /// Sets the stop bits.
    pub fn stop_bits(mut self, bits: StopBits) -> Self {
        self.stop_bits = Some(bits);
        self
    }

    /// Sets the response timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Sets the inter-byte timeout.
    pub fn inter_byte_timeout(mut self, timeout: Duration) -> Self {
        self.inter_byte_timeout = Some(timeout);
        self
    }

    /// Sets the maximum retries.
    pub fn max_retries(mut self, retries: u32) -> Self {
        self.max_retries = Some(retries);
        self
    }

    /// Sets 9600/8/N/1.
    pub fn default_9600_8n1(self) -> Self {
        self.baud_rate(9600)
            .data_bits(DataBits::Eight)
            .parity(Parity::None)
            .stop_bits(StopBits::One)
    }

    /// Builds and validates the configuration.
    pub fn build(self) -> ModbusResult<SerialPortConfig> {
        let config = SerialPortConfig {
            slave_address: self.slave_address.unwrap_or_else(default_slave_address),
            port: self.port.unwrap_or_else(default_port),
            baud_rate: self.baud_rate.unwrap_or_else(default_baud_rate),
            data_bits: self.data_bits.unwrap_or_default(),
            parity: self.parity.unwrap_or_default(),
            stop_bits: self.stop_bits.unwrap_or_default(),
            timeout: self.timeout.unwrap_or_else(default_timeout),
            inter_byte_timeout: self
                .inter_byte_timeout
                .unwrap_or_else(default_inter_byte_timeout),
            max_retries: self.max_retries.unwrap_or_else(default_max_retries),
        };

        config.validate()?;
        Ok(config)
    }
}

// =============================================================================
// Serial Port Settings
// =============================================================================

/// Data bits per character. Serialized as the plain number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(try_from = "u8", into = "u8")]
pub enum DataBits {
    /// 5 data bits.
    Five,
    /// 6 data bits.
    Six,
    /// 7 data bits.
    Seven,
    /// 8 data bits (default).
    #[default]
    Eight,
}

impl DataBits {
    /// Returns the number of bits.
    pub const fn bits(&self) -> u8 {
        match self {
            Self::Five => 5,
            Self::Six => 6,
            Self::Seven => 7,
            Self::Eight => 8,
        }
    }
}

impl TryFrom<u8> for DataBits {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            5 => Ok(Self::Five),
            6 => Ok(Self::Six),
            7 => Ok(Self::Seven),
            8 => Ok(Self::Eight),
            other => Err(format!("invalid data bits: {other} (expected 5-8)")),
        }
    }
}

impl From<DataBits> for u8 {
    fn from(value: DataBits) -> Self {
        value.bits()
    }
}

impl fmt::Display for DataBits {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.bits())
    }
}

/// Parity. Accepts both "none"/"even"/"odd" and "N"/"E"/"O".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Parity {
    /// No parity (default).
    #[default]
    #[serde(alias = "N")]
    None,
    /// Even parity.
    #[serde(alias = "E")]
    Even,
    /// Odd parity.
    #[serde(alias = "O")]
    Odd,
}

impl Parity {
    /// Returns the number of parity bits.
    pub const fn bits(&self) -> u8 {
        match self {
            Self::None => 0,
            Self::Odd | Self::Even => 1,
        }
    }

    /// Returns the short character representation.
    pub const fn char(&self) -> char {
        match self {
            Self::None => 'N',
            Self::Even => 'E',
            Self::Odd => 'O',
        }
    }
}

impl fmt::Display for Parity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.char())
    }
}

/// Stop bits. Serialized as the plain number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(try_from = "u8", into = "u8")]
pub enum StopBits {
    /// 1 stop bit (default).
    #[default]
    One,
    /// 2 stop bits.
    Two,
}

impl StopBits {
    /// Returns the number of stop bits.
    pub const fn bits(&self) -> u8 {
        match self {
            Self::One => 1,
            Self::Two => 2,
        }
    }
}

impl TryFrom<u8> for StopBits {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Self::One),
            2 => Ok(Self::Two),
            other => Err(format!("invalid stop bits: {other} (expected 1 or 2)")),
        }
    }
}

impl From<StopBits> for u8 {
    fn from(value: StopBits) -> Self {
        value.bits()
    }
}

impl fmt::Display for StopBits {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.bits())
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = SerialPortConfig::default();
        assert_eq!(config.slave_address, 1);
        assert_eq!(config.baud_rate, 115200);
        assert_eq!(config.timeout, Duration::from_millis(20));
        assert_eq!(config.inter_byte_timeout, Duration::from_millis(10));
        assert_eq!(config.max_retries, 30);
        assert_eq!(config.line_settings(), "115200 8N1");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_builder() {
        let config = SerialPortConfig::builder()
            .port("/tmp/sim")
            .default_9600_8n1()
            .slave_address(5)
            .max_retries(3)
            .build()
            .unwrap();

        assert_eq!(config.port, "/tmp/sim");
        assert_eq!(config.baud_rate, 9600);
        assert_eq!(config.slave_address, 5);
        assert_eq!(config.max_retries, 3);
    }

    #[test]
    fn test_builder_rejects_invalid() {
        assert!(SerialPortConfig::builder().slave_address(0).build().is_err());
        assert!(SerialPortConfig::builder().slave_address(248).build().is_err());
        assert!(SerialPortConfig::builder().baud_rate(1234).build().is_err());
        assert!(SerialPortConfig::builder().port("  ").build().is_err());
        assert!(
            SerialPortConfig::builder()
                .timeout(Duration::ZERO)
                .build()
                .is_err()
        );
    }

    #[test]
    fn test_inter_frame_delay() {
        let slow = SerialPortConfig::builder().baud_rate(9600).build().unwrap();
        // 3.5 * 10 bits / 9600 baud = ~3.6 ms
        let delay = slow.inter_frame_delay();
        assert!(delay >= Duration::from_millis(3));
        assert!(delay <= Duration::from_millis(4));

        // Fast lines are clamped to 1 ms
        let fast = SerialPortConfig::default();
        assert_eq!(fast.inter_frame_delay(), Duration::from_millis(1));
    }

    #[test]
    fn test_worst_case_transaction_time() {
        let config = SerialPortConfig::builder()
            .timeout(Duration::from_millis(20))
            .max_retries(4)
            .build()
            .unwrap();
        assert_eq!(config.worst_case_transaction_time(), Duration::from_millis(100));
    }

    #[test]
    fn test_with_slave_address_keeps_original() {
        let config = SerialPortConfig::default();
        let other = config.with_slave_address(9);
        assert_eq!(config.slave_address, 1);
        assert_eq!(other.slave_address, 9);
        assert_eq!(other.port, config.port);
    }

    #[test]
    fn test_serde_numeric_and_letter_fields() {
        let json = r#"{
            "slave_address": 5,
            "port": "/tmp/sim",
            "baud_rate": 9600,
            "data_bits": 7,
            "parity": "E",
            "stop_bits": 2,
            "timeout": "50ms"
        }"#;
        let config: SerialPortConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.data_bits, DataBits::Seven);
        assert_eq!(config.parity, Parity::Even);
        assert_eq!(config.stop_bits, StopBits::Two);
        assert_eq!(config.timeout, Duration::from_millis(50));
        assert_eq!(config.inter_byte_timeout, Duration::from_millis(10));

        let back = serde_json::to_value(&config).unwrap();
        assert_eq!(back["data_bits"], 7);
        assert_eq!(back["parity"], "even");
    }

    #[test]
    fn test_serde_rejects_bad_data_bits() {
        let json = r#"{ "data_bits": 9 }"#;
        assert!(serde_json::from_str::<SerialPortConfig>(json).is_err());
    }
}
