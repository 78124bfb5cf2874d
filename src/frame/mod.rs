// SPDX-FileCopyrightText: Copyright (c) 2018-2025 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

use core::fmt;

mod coils;
mod message;

pub use self::{coils::*, message::*};

use crate::error::Error;

// [MODBUS over Serial Line Specification and Implementation Guide V1.02](http://modbus.org/docs/Modbus_over_serial_line_V1_02.pdf), page 13
// "The maximum size of a MODBUS RTU frame is 256 bytes."
pub const MAX_FRAME_LEN: usize = 256;

/// Maximum PDU size after subtracting unit address and CRC.
pub const MAX_PDU_LEN: usize = MAX_FRAME_LEN - 3;

/// Function codes with this bit set signal an exception response.
pub const EXCEPTION_FLAG: u8 = 0x80;

/// The 1-byte slave/device identifier prefixing every frame.
pub type UnitAddress = u8;

/// A Modbus register address is represented by 16 bit (from `0` to `65535`).
pub type Address = u16;

/// A Coil represents a single bit.
///
/// - `true` is equivalent to `ON`, `1` and `0xFF00`.
/// - `false` is equivalent to `OFF`, `0` and `0x0000`.
pub type Coil = bool;

/// Modbus uses 16 bit for its data items (big-endian representation).
pub type Word = u16;

/// Number of items to process (`0` - `65535`).
pub type Quantity = u16;

/// Whether a frame travels from the client to the server or back.
///
/// RTU carries no session identifier on the wire, so this classification
/// is inferred by the transaction tracker, not read from the frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    Request,
    Response,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Request => write!(f, "request"),
            Self::Response => write!(f, "response"),
        }
    }
}

/// A Modbus function code.
///
/// This is a closed enumeration: codes outside of it fail decoding with
/// [`Error::FnCode`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FunctionCode {
    /// Modbus Function Code: `01` (`0x01`).
    ReadCoils,

    /// Modbus Function Code: `02` (`0x02`).
    ReadDiscreteInputs,

    /// Modbus Function Code: `03` (`0x03`).
    ReadHoldingRegisters,

    /// Modbus Function Code: `04` (`0x04`).
    ReadInputRegisters,

    /// Modbus Function Code: `05` (`0x05`).
    WriteSingleCoil,

    /// Modbus Function Code: `06` (`0x06`).
    WriteSingleRegister,

    /// Modbus Function Code: `07` (`0x07`).
    ReadExceptionStatus,

    /// Modbus Function Code: `08` (`0x08`).
    Diagnostics,

    /// Modbus Function Code: `11` (`0x0B`).
    GetCommEventCounter,

    /// Modbus Function Code: `12` (`0x0C`).
    GetCommEventLog,

    /// Modbus Function Code: `15` (`0x0F`).
    WriteMultipleCoils,

    /// Modbus Function Code: `16` (`0x10`).
    WriteMultipleRegisters,

    /// Modbus Function Code: `17` (`0x11`).
    ReportServerId,

    /// Modbus Function Code: `22` (`0x16`).
    MaskWriteRegister,

    /// Modbus Function Code: `23` (`0x17`).
    ReadWriteMultipleRegisters,

    /// Modbus Function Code: `43` (`0x2B`), MEI transport.
    EncapsulatedInterfaceTransport,
}

impl FunctionCode {
    /// Create a new [`FunctionCode`] from `value`.
    #[must_use]
    pub const fn new(value: u8) -> Option<Self> {
        let code = match value {
            0x01 => Self::ReadCoils,
            0x02 => Self::ReadDiscreteInputs,
            0x03 => Self::ReadHoldingRegisters,
            0x04 => Self::ReadInputRegisters,
            0x05 => Self::WriteSingleCoil,
            0x06 => Self::WriteSingleRegister,
            0x07 => Self::ReadExceptionStatus,
            0x08 => Self::Diagnostics,
            0x0B => Self::GetCommEventCounter,
            0x0C => Self::GetCommEventLog,
            0x0F => Self::WriteMultipleCoils,
            0x10 => Self::WriteMultipleRegisters,
            0x11 => Self::ReportServerId,
            0x16 => Self::MaskWriteRegister,
            0x17 => Self::ReadWriteMultipleRegisters,
            0x2B => Self::EncapsulatedInterfaceTransport,
            _ => return None,
        };
        Some(code)
    }

    /// Canonicalize a raw wire byte, clearing the exception bit.
    ///
    /// An exception-coded function maps back to its originating function so
    /// that a request/response pair compares equal regardless of outcome.
    pub fn canonical(value: u8) -> Result<Self, Error> {
        Self::new(value & !EXCEPTION_FLAG).ok_or(Error::FnCode(value))
    }

    /// Get the [`u8`] value of the current [`FunctionCode`].
    #[must_use]
    pub const fn value(self) -> u8 {
        match self {
            Self::ReadCoils => 0x01,
            Self::ReadDiscreteInputs => 0x02,
            Self::ReadHoldingRegisters => 0x03,
            Self::ReadInputRegisters => 0x04,
            Self::WriteSingleCoil => 0x05,
            Self::WriteSingleRegister => 0x06,
            Self::ReadExceptionStatus => 0x07,
            Self::Diagnostics => 0x08,
            Self::GetCommEventCounter => 0x0B,
            Self::GetCommEventLog => 0x0C,
            Self::WriteMultipleCoils => 0x0F,
            Self::WriteMultipleRegisters => 0x10,
            Self::ReportServerId => 0x11,
            Self::MaskWriteRegister => 0x16,
            Self::ReadWriteMultipleRegisters => 0x17,
            Self::EncapsulatedInterfaceTransport => 0x2B,
        }
    }
}

impl fmt::Display for FunctionCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.value().fmt(f)
    }
}

/// Whether a raw function byte carries the exception flag.
#[must_use]
pub const fn is_exception_fn(value: u8) -> bool {
    value & EXCEPTION_FLAG != 0
}

/// A server (slave) exception.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExceptionCode {
    IllegalFunction = 0x01,
    IllegalDataAddress = 0x02,
    IllegalDataValue = 0x03,
    ServerDeviceFailure = 0x04,
    Acknowledge = 0x05,
    ServerDeviceBusy = 0x06,
    MemoryParityError = 0x08,
    GatewayPathUnavailable = 0x0A,
    GatewayTargetDevice = 0x0B,
}

impl ExceptionCode {
    const fn get_name(self) -> &'static str {
        match self {
            Self::IllegalFunction => "Illegal function",
            Self::IllegalDataAddress => "Illegal data address",
            Self::IllegalDataValue => "Illegal data value",
            Self::ServerDeviceFailure => "Server device failure",
            Self::Acknowledge => "Acknowledge",
            Self::ServerDeviceBusy => "Server device busy",
            Self::MemoryParityError => "Memory parity error",
            Self::GatewayPathUnavailable => "Gateway path unavailable",
            Self::GatewayTargetDevice => "Gateway target device failed to respond",
        }
    }
}

impl TryFrom<u8> for ExceptionCode {
    type Error = Error;

    fn try_from(code: u8) -> Result<Self, Error> {
        let ex = match code {
            0x01 => Self::IllegalFunction,
            0x02 => Self::IllegalDataAddress,
            0x03 => Self::IllegalDataValue,
            0x04 => Self::ServerDeviceFailure,
            0x05 => Self::Acknowledge,
            0x06 => Self::ServerDeviceBusy,
            0x08 => Self::MemoryParityError,
            0x0A => Self::GatewayPathUnavailable,
            0x0B => Self::GatewayTargetDevice,
            _ => return Err(Error::ExceptionCode(code)),
        };
        Ok(ex)
    }
}

impl fmt::Display for ExceptionCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.get_name())
    }
}

/// The request/response correlation key.
///
/// RTU has no per-message sequence number; a (unit address, canonical
/// function) pair is the only identity a frame carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Transaction {
    pub unit: UnitAddress,
    pub function: FunctionCode,
}

impl Transaction {
    /// Build the key from the first two bytes of a frame.
    pub fn from_wire(unit: UnitAddress, function: u8) -> Result<Self, Error> {
        Ok(Self {
            unit,
            function: FunctionCode::canonical(function)?,
        })
    }
}

impl fmt::Display for Transaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unit 0x{:02X} {}", self.unit, self.function)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn function_code_into_u8() {
        let x: u8 = FunctionCode::WriteMultipleCoils.value();
        assert_eq!(x, 15);
        let x: u8 = FunctionCode::EncapsulatedInterfaceTransport.value();
        assert_eq!(x, 0x2B);
    }

    #[test]
    fn function_code_from_u8() {
        assert_eq!(
            FunctionCode::new(15),
            Some(FunctionCode::WriteMultipleCoils)
        );
        assert_eq!(FunctionCode::new(0xBB), None);
    }

    #[test]
    fn canonicalize_exception_codes() {
        assert_eq!(
            FunctionCode::canonical(0x83).unwrap(),
            FunctionCode::ReadHoldingRegisters
        );
        assert_eq!(
            FunctionCode::canonical(0x03).unwrap(),
            FunctionCode::ReadHoldingRegisters
        );
        assert!(matches!(
            FunctionCode::canonical(0xFF),
            Err(Error::FnCode(0xFF))
        ));
    }

    #[test]
    fn exception_flag() {
        assert!(is_exception_fn(0x81));
        assert!(!is_exception_fn(0x01));
    }

    #[test]
    fn transaction_ignores_exception_bit() {
        let req = Transaction::from_wire(0x11, 0x03).unwrap();
        let rsp = Transaction::from_wire(0x11, 0x83).unwrap();
        assert_eq!(req, rsp);
    }

    #[test]
    fn invalid_exception_code() {
        assert!(matches!(
            ExceptionCode::try_from(0x20),
            Err(Error::ExceptionCode(0x20))
        ));
        assert_eq!(
            ExceptionCode::try_from(0x02).unwrap(),
            ExceptionCode::IllegalDataAddress
        );
    }
}
