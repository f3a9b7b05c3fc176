// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Modbus RTU framing.
//!
//! An RTU frame is `[slave][function][payload...][crc_lo][crc_hi]`. There are
//! no delimiters on the wire; frames are separated by silence, so a response
//! is complete once the length implied by its function code and byte count
//! has arrived.
//!
//! ```text
//! Read holding registers (0x03)
//!   request : slave 03 addr_hi addr_lo cnt_hi cnt_lo crc_lo crc_hi
//!   response: slave 03 byte_count data... crc_lo crc_hi
//!
//! Write single register (0x06) / multiple registers (0x10)
//!   response echoes address and value / quantity (8 bytes)
//!
//! Exception
//!   response: slave (fc | 0x80) exception_code crc_lo crc_hi
//! ```

use std::fmt;
use std::time::Duration;

use crate::error::{ConfigurationError, FrameError, ModbusError, ModbusResult};

/// Largest RTU frame allowed on the wire.
pub const MAX_FRAME_LEN: usize = 256;

/// Smallest valid response (exception frame).
pub const MIN_RESPONSE_LEN: usize = 5;

/// Most registers a single FC03 read may request.
pub const MAX_READ_REGISTERS: u16 = 125;

/// Most registers a single FC16 write may carry.
pub const MAX_WRITE_REGISTERS: u16 = 123;

const EXCEPTION_FLAG: u8 = 0x80;

// =============================================================================
// CRC16
// =============================================================================

/// Computes the Modbus CRC16 (reflected polynomial 0xA001, initial 0xFFFF).
///
/// On the wire the CRC is appended low byte first.
pub fn crc16(data: &[u8]) -> u16 {
    let mut crc: u16 = 0xFFFF;
    for &byte in data {
        crc ^= byte as u16;
        for _ in 0..8 {
            if crc & 0x0001 != 0 {
                crc = (crc >> 1) ^ 0xA001;
            } else {
                crc >>= 1;
            }
        }
    }
    crc
}

/// Appends the CRC of `frame` to it, low byte first.
pub fn append_crc(frame: &mut Vec<u8>) {
    let crc = crc16(frame);
    frame.extend_from_slice(&crc.to_le_bytes());
}

/// Checks the trailing CRC of a complete frame.
pub fn verify_crc(frame: &[u8]) -> Result<(), FrameError> {
    if frame.len() < 3 {
        return Err(FrameError::too_short(MIN_RESPONSE_LEN, frame.len()));
    }
    let (body, tail) = frame.split_at(frame.len() - 2);
    let expected = crc16(body);
    let actual = u16::from_le_bytes([tail[0], tail[1]]);
    if expected == actual {
        Ok(())
    } else {
        Err(FrameError::crc_mismatch(expected, actual))
    }
}

// =============================================================================
// FunctionCode
// =============================================================================

/// Function codes used by the cell hardware.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FunctionCode {
    /// 0x03 Read Holding Registers.
    ReadHoldingRegisters,
    /// 0x06 Write Single Register.
    WriteSingleRegister,
    /// 0x10 Write Multiple Registers.
    WriteMultipleRegisters,
}

impl FunctionCode {
    /// Returns the numeric code.
    pub const fn code(&self) -> u8 {
        match self {
            Self::ReadHoldingRegisters => 0x03,
            Self::WriteSingleRegister => 0x06,
            Self::WriteMultipleRegisters => 0x10,
        }
    }

    /// Looks up a function code.
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0x03 => Some(Self::ReadHoldingRegisters),
            0x06 => Some(Self::WriteSingleRegister),
            0x10 => Some(Self::WriteMultipleRegisters),
            _ => None,
        }
    }

    /// Returns `true` for write functions.
    pub const fn is_write(&self) -> bool {
        !matches!(self, Self::ReadHoldingRegisters)
    }
}

impl fmt::Display for FunctionCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::ReadHoldingRegisters => "read_holding_registers",
            Self::WriteSingleRegister => "write_single_register",
            Self::WriteMultipleRegisters => "write_multiple_registers",
        };
        write!(f, "{name} ({:#04x})", self.code())
    }
}

// =============================================================================
// RequestFrame
// =============================================================================

/// Operation carried by a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestPdu {
    /// Read `count` holding registers starting at `address`.
    ReadHoldingRegisters {
        /// First register.
        address: u16,
        /// Number of registers.
        count: u16,
    },
    /// Write one register with FC06.
    WriteSingleRegister {
        /// Register address.
        address: u16,
        /// Raw value.
        value: u16,
    },
    /// Write consecutive registers with FC16.
    WriteMultipleRegisters {
        /// First register.
        address: u16,
        /// Raw values.
        values: Vec<u16>,
    },
}

/// A request addressed to one slave.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestFrame {
    slave: u8,
    pdu: RequestPdu,
}

impl RequestFrame {
    /// Creates an FC03 read request.
    pub fn read_holding_registers(slave: u8, address: u16, count: u16) -> ModbusResult<Self> {
        if count == 0 || count > MAX_READ_REGISTERS {
            return Err(ConfigurationError::InvalidRegisterCount { count }.into());
        }
        Ok(Self {
            slave,
            pdu: RequestPdu::ReadHoldingRegisters { address, count },
        })
    }

    /// Creates an FC06 write request.
    pub fn write_single_register(slave: u8, address: u16, value: u16) -> Self {
        Self {
            slave,
            pdu: RequestPdu::WriteSingleRegister { address, value },
        }
    }

    /// Creates an FC16 write request.
    pub fn write_multiple_registers(
        slave: u8,
        address: u16,
        values: Vec<u16>,
    ) -> ModbusResult<Self> {
        let count = u16::try_from(values.len()).unwrap_or(u16::MAX);
        if count == 0 || count > MAX_WRITE_REGISTERS {
            return Err(ConfigurationError::InvalidRegisterCount { count }.into());
        }
        Ok(Self {
            slave,
            pdu: RequestPdu::WriteMultipleRegisters { address, values },
        })
    }

    /// Returns the addressed slave.
    pub fn slave(&self) -> u8 {
        self.slave
    }

    /// Returns the operation.
    pub fn pdu(&self) -> &RequestPdu {
        &self.pdu
    }

    /// Returns the function code.
    pub fn function(&self) -> FunctionCode {
        match self.pdu {
            RequestPdu::ReadHoldingRegisters { .. } => FunctionCode::ReadHoldingRegisters,
            RequestPdu::WriteSingleRegister { .. } => FunctionCode::WriteSingleRegister,
            RequestPdu::WriteMultipleRegisters { .. } => FunctionCode::WriteMultipleRegisters,
        }
    }

    /// Returns the first register address.
    pub fn address(&self) -> u16 {
        match self.pdu {
            RequestPdu::ReadHoldingRegisters { address, .. }
            | RequestPdu::WriteSingleRegister { address, .. }
            | RequestPdu::WriteMultipleRegisters { address, .. } => address,
        }
    }

    /// Encodes the frame including its CRC.
    pub fn encode(&self) -> Vec<u8> {
        let mut frame = Vec::with_capacity(16);
        frame.push(self.slave);
        frame.push(self.function().code());

        match &self.pdu {
            RequestPdu::ReadHoldingRegisters { address, count } => {
                frame.extend_from_slice(&address.to_be_bytes());
                frame.extend_from_slice(&count.to_be_bytes());
            }
            RequestPdu::WriteSingleRegister { address, value } => {
                frame.extend_from_slice(&address.to_be_bytes());
                frame.extend_from_slice(&value.to_be_bytes());
            }
            RequestPdu::WriteMultipleRegisters { address, values } => {
                frame.extend_from_slice(&address.to_be_bytes());
                frame.extend_from_slice(&(values.len() as u16).to_be_bytes());
                frame.push((values.len() * 2) as u8);
                for value in values {
                    frame.extend_from_slice(&value.to_be_bytes());
                }
            }
        }

        append_crc(&mut frame);
        frame
    }

    /// Returns the length of a normal (non-exception) response.
    pub fn normal_response_len(&self) -> usize {
        match &self.pdu {
            RequestPdu::ReadHoldingRegisters { count, .. } => 5 + 2 * *count as usize,
            RequestPdu::WriteSingleRegister { .. } | RequestPdu::WriteMultipleRegisters { .. } => 8,
        }
    }

    /// Returns the total response length implied by the bytes received so
    /// far, or `None` if more bytes are needed to tell.
    pub fn expected_response_len(&self, received: &[u8]) -> Option<usize> {
        let function = *received.get(1)?;
        if function & EXCEPTION_FLAG != 0 {
            return Some(MIN_RESPONSE_LEN);
        }
        match self.pdu {
            RequestPdu::ReadHoldingRegisters { .. } => {
                received.get(2).map(|&byte_count| 5 + byte_count as usize)
            }
            _ => Some(8),
        }
    }

    /// Decodes and validates a response to this request.
    ///
    /// Structural problems are returned as [`ModbusError::Frame`]; a valid
    /// exception response is returned as [`ModbusError::Exception`].
    pub fn decode_response(&self, bytes: &[u8]) -> ModbusResult<ResponseFrame> {
        if bytes.len() < MIN_RESPONSE_LEN {
            return Err(FrameError::too_short(MIN_RESPONSE_LEN, bytes.len()).into());
        }

        verify_crc(bytes)?;

        let slave = bytes[0];
        if slave != self.slave {
            return Err(FrameError::SlaveMismatch {
                expected: self.slave,
                actual: slave,
            }
            .into());
        }

        let expected_fc = self.function().code();
        let function = bytes[1];
        if function == expected_fc | EXCEPTION_FLAG {
            if bytes.len() != MIN_RESPONSE_LEN {
                return Err(FrameError::too_short(MIN_RESPONSE_LEN, bytes.len()).into());
            }
            return Err(ModbusError::exception(slave, expected_fc, bytes[2]));
        }
        if function != expected_fc {
            return Err(FrameError::FunctionMismatch {
                expected: expected_fc,
                actual: function,
            }
            .into());
        }

        let expected_len = self.normal_response_len();
        match &self.pdu {
            RequestPdu::ReadHoldingRegisters { count, .. } => {
                let byte_count = bytes[2] as usize;
                if byte_count != 2 * *count as usize {
                    return Err(FrameError::ByteCountMismatch {
                        expected: 2 * *count as usize,
                        actual: byte_count,
                    }
                    .into());
                }
                if bytes.len() != expected_len {
                    return Err(FrameError::too_short(expected_len, bytes.len()).into());
                }
            }
            RequestPdu::WriteSingleRegister { address, value } => {
                if bytes.len() != expected_len {
                    return Err(FrameError::too_short(expected_len, bytes.len()).into());
                }
                self.check_echo(bytes, *address, *value)?;
            }
            RequestPdu::WriteMultipleRegisters { address, values } => {
                if bytes.len() != expected_len {
                    return Err(FrameError::too_short(expected_len, bytes.len()).into());
                }
                self.check_echo(bytes, *address, values.len() as u16)?;
            }
        }

        Ok(ResponseFrame {
            bytes: bytes.to_vec(),
        })
    }

    fn check_echo(&self, bytes: &[u8], address: u16, value: u16) -> Result<(), FrameError> {
        let echoed_address = u16::from_be_bytes([bytes[2], bytes[3]]);
        let echoed_value = u16::from_be_bytes([bytes[4], bytes[5]]);
        if echoed_address != address || echoed_value != value {
            return Err(FrameError::EchoMismatch {
                message: format!(
                    "sent address {address} value {value}, got address {echoed_address} value {echoed_value}"
                ),
            });
        }
        Ok(())
    }
}

impl fmt::Display for RequestFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.pdu {
            RequestPdu::ReadHoldingRegisters { address, count } => write!(
                f,
                "slave {} read {count} register(s) at {address}",
                self.slave
            ),
            RequestPdu::WriteSingleRegister { address, value } => {
                write!(f, "slave {} write {value} to {address}", self.slave)
            }
            RequestPdu::WriteMultipleRegisters { address, values } => write!(
                f,
                "slave {} write {} register(s) at {address}",
                self.slave,
                values.len()
            ),
        }
    }
}

// =============================================================================
// ResponseFrame
// =============================================================================

/// A validated response frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseFrame {
    bytes: Vec<u8>,
}

impl ResponseFrame {
    /// Returns the responding slave.
    pub fn slave(&self) -> u8 {
        self.bytes[0]
    }

    /// Returns the function code.
    pub fn function_code(&self) -> u8 {
        self.bytes[1]
    }

    /// Returns the CRC carried by the frame.
    pub fn crc(&self) -> u16 {
        let n = self.bytes.len();
        u16::from_le_bytes([self.bytes[n - 2], self.bytes[n - 1]])
    }

    /// Returns the raw frame bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Returns register values of a read response, big-endian decoded.
    ///
    /// Empty for write responses.
    pub fn registers(&self) -> Vec<u16> {
        if self.function_code() != FunctionCode::ReadHoldingRegisters.code() {
            return Vec::new();
        }
        let byte_count = self.bytes[2] as usize;
        self.bytes[3..3 + byte_count]
            .chunks_exact(2)
            .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
            .collect()
    }
}

// =============================================================================
// ModbusTransaction
// =============================================================================

/// One completed request/response exchange.
#[derive(Debug, Clone)]
pub struct ModbusTransaction {
    /// The request that was sent.
    pub request: RequestFrame,
    /// The validated response.
    pub response: ResponseFrame,
    /// Time from the first write to the validated response, retries included.
    pub elapsed: Duration,
    /// Retries consumed before the successful attempt.
    pub retries_used: u32,
}

impl ModbusTransaction {
    /// Returns the number of physical attempts made.
    pub fn attempts(&self) -> u32 {
        self.retries_used + 1
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn with_crc(body: &[u8]) -> Vec<u8> {
        let mut frame = body.to_vec();
        append_crc(&mut frame);
        frame
    }

    #[test]
    fn test_crc16_reference_frame() {
        // Well-known reference: read 1 register at 0 from slave 1
        let frame = RequestFrame::read_holding_registers(1, 0, 1).unwrap().encode();
        assert_eq!(frame, vec![0x01, 0x03, 0x00, 0x00, 0x00, 0x01, 0x84, 0x0A]);
        assert_eq!(crc16(&frame[..6]), 0x0A84);
    }

    #[test]
    fn test_crc_of_frame_with_crc_is_zero() {
        let frame = RequestFrame::write_single_register(17, 1, 3).encode();
        assert_eq!(crc16(&frame), 0);
        assert!(verify_crc(&frame).is_ok());
    }

    #[test]
    fn test_single_bit_corruption_rejected() {
        let request = RequestFrame::read_holding_registers(5, 0, 1).unwrap();
        let response = with_crc(&[0x05, 0x03, 0x02, 0x04, 0xD2]);
        assert!(request.decode_response(&response).is_ok());

        for byte in 0..response.len() {
            for bit in 0..8 {
                let mut corrupted = response.clone();
                corrupted[byte] ^= 1 << bit;
                assert!(
                    request.decode_response(&corrupted).is_err(),
                    "corruption at byte {byte} bit {bit} accepted"
                );
            }
        }
    }

    #[test]
    fn test_decode_read_response() {
        let request = RequestFrame::read_holding_registers(5, 0, 2).unwrap();
        let bytes = with_crc(&[0x05, 0x03, 0x04, 0x04, 0xD2, 0x00, 0x07]);
        let response = request.decode_response(&bytes).unwrap();
        assert_eq!(response.slave(), 5);
        assert_eq!(response.registers(), vec![1234, 7]);
        assert_eq!(response.crc(), crc16(&bytes[..bytes.len() - 2]));
    }

    #[test]
    fn test_decode_exception_response() {
        let request = RequestFrame::read_holding_registers(3, 100, 1).unwrap();
        let bytes = with_crc(&[0x03, 0x83, 0x02]);
        let error = request.decode_response(&bytes).unwrap_err();
        assert!(matches!(
            error,
            ModbusError::Exception {
                slave: 3,
                function_code: 0x03,
                exception_code: 0x02,
                ..
            }
        ));
    }

    #[test]
    fn test_decode_slave_mismatch() {
        let request = RequestFrame::read_holding_registers(3, 0, 1).unwrap();
        let bytes = with_crc(&[0x04, 0x03, 0x02, 0x00, 0x01]);
        let error = request.decode_response(&bytes).unwrap_err();
        assert!(matches!(
            error,
            ModbusError::Frame(FrameError::SlaveMismatch {
                expected: 3,
                actual: 4
            })
        ));
    }

    #[test]
    fn test_decode_too_short() {
        let request = RequestFrame::read_holding_registers(3, 0, 1).unwrap();
        let error = request.decode_response(&[0x03, 0x03]).unwrap_err();
        assert!(matches!(error, ModbusError::Frame(FrameError::TooShort { .. })));
    }

    #[test]
    fn test_decode_byte_count_mismatch() {
        let request = RequestFrame::read_holding_registers(3, 0, 2).unwrap();
        let bytes = with_crc(&[0x03, 0x03, 0x02, 0x00, 0x01]);
        let error = request.decode_response(&bytes).unwrap_err();
        assert!(matches!(
            error,
            ModbusError::Frame(FrameError::ByteCountMismatch { expected: 4, actual: 2 })
        ));
    }

    #[test]
    fn test_write_multiple_encoding_and_echo() {
        let request = RequestFrame::write_multiple_registers(2, 6, vec![0x0102]).unwrap();
        let encoded = request.encode();
        assert_eq!(&encoded[..9], &[0x02, 0x10, 0x00, 0x06, 0x00, 0x01, 0x02, 0x01, 0x02]);
        assert_eq!(encoded.len(), 11);

        let echo = with_crc(&[0x02, 0x10, 0x00, 0x06, 0x00, 0x01]);
        assert!(request.decode_response(&echo).is_ok());

        let bad_echo = with_crc(&[0x02, 0x10, 0x00, 0x07, 0x00, 0x01]);
        assert!(matches!(
            request.decode_response(&bad_echo).unwrap_err(),
            ModbusError::Frame(FrameError::EchoMismatch { .. })
        ));
    }

    #[test]
    fn test_expected_response_len() {
        let read = RequestFrame::read_holding_registers(1, 0, 3).unwrap();
        assert_eq!(read.expected_response_len(&[0x01]), None);
        assert_eq!(read.expected_response_len(&[0x01, 0x03]), None);
        assert_eq!(read.expected_response_len(&[0x01, 0x03, 0x06]), Some(11));
        assert_eq!(read.expected_response_len(&[0x01, 0x83]), Some(5));

        let write = RequestFrame::write_single_register(1, 0, 3);
        assert_eq!(write.expected_response_len(&[0x01, 0x06]), Some(8));
    }

    #[test]
    fn test_register_count_limits() {
        assert!(RequestFrame::read_holding_registers(1, 0, 0).is_err());
        assert!(RequestFrame::read_holding_registers(1, 0, 126).is_err());
        assert!(RequestFrame::write_multiple_registers(1, 0, Vec::new()).is_err());
    }

    #[test]
    fn test_function_code_lookup() {
        assert_eq!(FunctionCode::from_code(0x03), Some(FunctionCode::ReadHoldingRegisters));
        assert_eq!(FunctionCode::from_code(0x10), Some(FunctionCode::WriteMultipleRegisters));
        assert_eq!(FunctionCode::from_code(0x01), None);
        assert!(FunctionCode::WriteSingleRegister.is_write());
    }
}
