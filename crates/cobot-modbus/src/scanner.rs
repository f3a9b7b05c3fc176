// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Bus-wide device discovery.
//!
//! The scanner walks a slave-address range in ascending order and probes each
//! address with one harmless register read. Every probe yields an explicit
//! [`ProbeOutcome`]:
//!
//! | Probe result                         | Outcome      |
//! |--------------------------------------|--------------|
//! | valid response                       | `Responding` |
//! | no response after retries            | `Absent`     |
//! | bad frames / Modbus exception        | `Absent`     |
//! | anything else (I/O, closed port, ..) | `Error`      |
//!
//! A failing address never aborts the scan; the whole range is always
//! visited unless the caller cancels between probes.

use std::fmt;
use std::ops::RangeInclusive;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use crate::client::{ModbusDeviceClient, SerialLine, TokioSerialLine, RtuTransport};
use crate::error::{ConfigurationError, ModbusResult};
use crate::types::{MAX_SLAVE_ADDRESS, MIN_SLAVE_ADDRESS};

/// Retries per probe unless configured otherwise.
pub const DEFAULT_PROBE_RETRIES: u32 = 1;

// =============================================================================
// ScanRequest
// =============================================================================

/// Parameters of one scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanRequest {
    /// First slave address (inclusive).
    pub start: u8,
    /// Last slave address (inclusive).
    pub end: u8,
    /// Register read by each probe.
    pub test_register: u16,
    /// Decimal scaling applied to the probe value.
    pub decimals: u8,
}

impl ScanRequest {
    /// Creates a request for `start..=end` probing register 0.
    pub fn new(start: u8, end: u8) -> Self {
        Self {
            start,
            end,
            ..Self::default()
        }
    }

    /// Sets the probed register.
    pub fn with_test_register(mut self, register: u16) -> Self {
        self.test_register = register;
        self
    }

    /// Sets the decimal scaling.
    pub fn with_decimals(mut self, decimals: u8) -> Self {
        self.decimals = decimals;
        self
    }

    /// Returns the address range.
    pub fn addresses(&self) -> RangeInclusive<u8> {
        self.start..=self.end
    }

    /// Checks that the range is non-empty and within 1-247.
    pub fn validate(&self) -> ModbusResult<()> {
        if self.start < MIN_SLAVE_ADDRESS || self.end > MAX_SLAVE_ADDRESS || self.start > self.end
        {
            return Err(ConfigurationError::InvalidScanRange {
                start: self.start,
                end: self.end,
            }
            .into());
        }
        Ok(())
    }
}

impl Default for ScanRequest {
    fn default() -> Self {
        Self {
            start: MIN_SLAVE_ADDRESS,
            end: MAX_SLAVE_ADDRESS,
            test_register: 0,
            decimals: 0,
        }
    }
}

// =============================================================================
// ProbeOutcome
// =============================================================================

/// Classification of one probed address.
#[derive(Debug, Clone, PartialEq)]
pub enum ProbeOutcome {
    /// A device answered with a valid register value.
    Responding {
        /// Scaled value of the test register.
        value: f64,
    },
    /// Nothing usable answered.
    Absent,
    /// The probe failed for a reason other than bus silence.
    Error(String),
}

impl ProbeOutcome {
    /// Classifies the result of a probe read.
    pub fn classify(result: ModbusResult<f64>) -> Self {
        match result {
            Ok(value) => Self::Responding { value },
            Err(error) if error.is_bus_error() => Self::Absent,
            Err(error) => {
                error.log("bus scan probe");
                Self::Error(error.to_string())
            }
        }
    }

    /// Returns `true` for a responding device.
    pub fn is_responding(&self) -> bool {
        matches!(self, Self::Responding { .. })
    }
}

impl fmt::Display for ProbeOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Responding { value } => write!(f, "responding (value {value})"),
            Self::Absent => write!(f, "absent"),
            Self::Error(reason) => write!(f, "error: {reason}"),
        }
    }
}

/// Outcome for one address.
#[derive(Debug, Clone, PartialEq)]
pub struct ProbeRecord {
    /// Probed slave address.
    pub address: u8,
    /// Classification.
    pub outcome: ProbeOutcome,
}

// =============================================================================
// BusScanResult
// =============================================================================

/// Immutable snapshot of one scan.
#[derive(Debug, Clone, PartialEq)]
pub struct BusScanResult {
    probes: Vec<ProbeRecord>,
    elapsed: Duration,
    cancelled: bool,
}

impl BusScanResult {
    /// Returns the responding addresses in ascending order.
    pub fn responding(&self) -> Vec<u8> {
        self.probes
            .iter()
            .filter(|record| record.outcome.is_responding())
            .map(|record| record.address)
            .collect()
    }

    /// Returns every probe in scan order.
    pub fn probes(&self) -> &[ProbeRecord] {
        &self.probes
    }

    /// Returns probes that ended in an unexpected error.
    pub fn errors(&self) -> impl Iterator<Item = &ProbeRecord> {
        self.probes
            .iter()
            .filter(|record| matches!(record.outcome, ProbeOutcome::Error(_)))
    }

    /// Returns the time the scan took.
    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }

    /// Returns `true` if the scan stopped before the end of the range.
    pub fn was_cancelled(&self) -> bool {
        self.cancelled
    }
}

// =============================================================================
// ModbusBusScanner
// =============================================================================

/// Probes a range of slave addresses on one transport.
///
/// The scanner holds no state between scans; running it twice on an
/// unchanged bus yields the same addresses.
pub struct ModbusBusScanner<L: SerialLine = TokioSerialLine> {
    transport: Arc<RtuTransport<L>>,
    probe_retries: u32,
}

impl<L: SerialLine> ModbusBusScanner<L> {
    /// Creates a scanner with [`DEFAULT_PROBE_RETRIES`].
    pub fn new(transport: Arc<RtuTransport<L>>) -> Self {
        Self {
            transport,
            probe_retries: DEFAULT_PROBE_RETRIES,
        }
    }

    /// Sets the retries spent on each address.
    pub fn with_probe_retries(mut self, retries: u32) -> Self {
        self.probe_retries = retries;
        self
    }

    /// Returns the retries spent on each address.
    pub fn probe_retries(&self) -> u32 {
        self.probe_retries
    }

    /// Probes one address.
    pub async fn probe(&self, address: u8, test_register: u16, decimals: u8) -> ProbeOutcome {
        let client = match ModbusDeviceClient::new(self.transport.clone(), address) {
            Ok(client) => client.with_retries(self.probe_retries),
            Err(error) => return ProbeOutcome::classify(Err(error)),
        };
        ProbeOutcome::classify(client.read_register(test_register, decimals).await)
    }

    /// Scans `start_addr..=end_addr` and returns the responding addresses.
    pub async fn scan(
        &self,
        start_addr: u8,
        end_addr: u8,
        test_register: u16,
        decimals: u8,
    ) -> ModbusResult<Vec<u8>> {
        let request = ScanRequest::new(start_addr, end_addr)
            .with_test_register(test_register)
            .with_decimals(decimals);
        Ok(self.scan_request(&request).await?.responding())
    }

    /// Scans the range described by `request`.
    pub async fn scan_request(&self, request: &ScanRequest) -> ModbusResult<BusScanResult> {
        let never = AtomicBool::new(false);
        self.scan_cancellable(request, &never).await
    }

    /// Scans like [`scan_request`](Self::scan_request) but stops before the
    /// next probe once `cancel` is set. A probe in flight always completes,
    /// so the bus is never left mid-frame.
    pub async fn scan_cancellable(
        &self,
        request: &ScanRequest,
        cancel: &AtomicBool,
    ) -> ModbusResult<BusScanResult> {
        request.validate()?;

        tracing::info!(
            port = %self.transport.config().port,
            start = request.start,
            end = request.end,
            test_register = request.test_register,
            probe_retries = self.probe_retries,
            "Scanning Modbus bus"
        );

        let start = Instant::now();
        let mut probes = Vec::with_capacity(request.addresses().len());
        let mut cancelled = false;

        for address in request.addresses() {
            if cancel.load(Ordering::Relaxed) {
                tracing::info!(next_address = address, "Bus scan cancelled");
                cancelled = true;
                break;
            }

            let outcome = self
                .probe(address, request.test_register, request.decimals)
                .await;

            match &outcome {
                ProbeOutcome::Responding { value } => {
                    tracing::info!(address, value, "Modbus device found");
                }
                ProbeOutcome::Absent => {
                    tracing::trace!(address, "No device");
                }
                ProbeOutcome::Error(reason) => {
                    tracing::warn!(address, reason = %reason, "Probe failed, continuing scan");
                }
            }

            probes.push(ProbeRecord { address, outcome });
        }

        let result = BusScanResult {
            probes,
            elapsed: start.elapsed(),
            cancelled,
        };

        tracing::info!(
            found = ?result.responding(),
            elapsed_ms = result.elapsed.as_millis() as u64,
            "Bus scan finished"
        );

        Ok(result)
    }
}

impl<L: SerialLine> fmt::Debug for ModbusBusScanner<L> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModbusBusScanner")
            .field("transport", &self.transport)
            .field("probe_retries", &self.probe_retries)
            .finish()
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{FrameError, ModbusError};

    #[test]
    fn test_classify_outcomes() {
        assert_eq!(
            ProbeOutcome::classify(Ok(12.5)),
            ProbeOutcome::Responding { value: 12.5 }
        );
        assert_eq!(
            ProbeOutcome::classify(Err(ModbusError::no_response(4, 2))),
            ProbeOutcome::Absent
        );
        assert_eq!(
            ProbeOutcome::classify(Err(FrameError::crc_mismatch(1, 2).into())),
            ProbeOutcome::Absent
        );
        assert_eq!(
            ProbeOutcome::classify(Err(ModbusError::exception(4, 0x03, 0x02))),
            ProbeOutcome::Absent
        );
        assert!(matches!(
            ProbeOutcome::classify(Err(ModbusError::not_connected())),
            ProbeOutcome::Error(_)
        ));
    }

    #[test]
    fn test_scan_request_validation() {
        assert!(ScanRequest::default().validate().is_ok());
        assert!(ScanRequest::new(3, 3).validate().is_ok());
        assert!(ScanRequest::new(0, 10).validate().is_err());
        assert!(ScanRequest::new(10, 3).validate().is_err());
        assert!(ScanRequest::new(1, 248).validate().is_err());
    }

    #[test]
    fn test_default_range_is_full_bus() {
        let request = ScanRequest::default();
        assert_eq!(request.addresses().count(), 247);
        assert_eq!(request.test_register, 0);
        assert_eq!(request.decimals, 0);
    }

    #[test]
    fn test_result_accessors() {
        let result = BusScanResult {
            probes: vec![
                ProbeRecord {
                    address: 1,
                    outcome: ProbeOutcome::Absent,
                },
                ProbeRecord {
                    address: 2,
                    outcome: ProbeOutcome::Responding { value: 0.0 },
                },
                ProbeRecord {
                    address: 3,
                    outcome: ProbeOutcome::Error("boom".to_string()),
                },
            ],
            elapsed: Duration::from_millis(5),
            cancelled: false,
        };
        assert_eq!(result.responding(), vec![2]);
        assert_eq!(result.errors().count(), 1);
        assert!(!result.was_cancelled());
    }
}
