// SPDX-FileCopyrightText: Copyright (c) 2018-2025 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Decoded Modbus RTU messages.
//!
//! Every supported message family is a variant of [`Message`]. A decoded
//! message re-encodes to the exact frame it was parsed from, so raw bytes
//! never need to be retained alongside it.

use super::{
    Address, Coils, Direction, ExceptionCode, FunctionCode, Quantity, Transaction, UnitAddress,
    MAX_FRAME_LEN,
};
use crate::error::{Error, Result};
use crate::util;

/// MEI type of the read-device-identification transport.
pub const DEVICE_ID_MEI_TYPE: u8 = 0x2E;

/// Read device identification access level (request id code).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceIdCode {
    Basic = 1,
    Regular = 2,
    Extended = 3,
    Individual = 4,
}

impl TryFrom<u8> for DeviceIdCode {
    type Error = Error;

    fn try_from(value: u8) -> Result<Self> {
        let code = match value {
            1 => Self::Basic,
            2 => Self::Regular,
            3 => Self::Extended,
            4 => Self::Individual,
            _ => return Err(Error::Format("invalid device id code")),
        };
        Ok(code)
    }
}

/// Device identification conformity level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConformityLevel {
    Basic = 0x01,
    Regular = 0x02,
    Extended = 0x03,
    BasicIndividual = 0x81,
    RegularIndividual = 0x82,
    ExtendedIndividual = 0x83,
}

impl TryFrom<u8> for ConformityLevel {
    type Error = Error;

    fn try_from(value: u8) -> Result<Self> {
        let level = match value {
            0x01 => Self::Basic,
            0x02 => Self::Regular,
            0x03 => Self::Extended,
            0x81 => Self::BasicIndividual,
            0x82 => Self::RegularIndividual,
            0x83 => Self::ExtendedIndividual,
            _ => return Err(Error::Format("invalid conformity level")),
        };
        Ok(level)
    }
}

/// One nested object of a device identification response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectRecord {
    pub id: u8,
    pub value: Vec<u8>,
}

/// Request for the read family (coils, discrete inputs, holding/input
/// registers). Fixed 6-byte frame regardless of content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadRequest {
    pub unit: UnitAddress,
    pub function: FunctionCode,
    pub register: Address,
    pub count: Quantity,
}

/// Response carrying bit-packed coil data (read coils, read discrete inputs).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadCoilsResponse {
    pub unit: UnitAddress,
    pub function: FunctionCode,
    pub data: Vec<u8>,
}

impl ReadCoilsResponse {
    /// View the payload as individual coils.
    ///
    /// The wire format does not echo the requested quantity, so the view
    /// spans every bit of every payload byte.
    #[must_use]
    pub fn coils(&self) -> Coils<'_> {
        Coils::new(&self.data, self.data.len() * 8)
    }
}

/// Response carrying register data (read holding/input registers and the
/// read part of read/write multiple registers).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadRegistersResponse {
    pub unit: UnitAddress,
    pub function: FunctionCode,
    pub data: Vec<u16>,
}

/// Write single coil or single register; request and echo response share
/// the layout, so the direction tag disambiguates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteSingleValue {
    pub unit: UnitAddress,
    pub function: FunctionCode,
    pub direction: Direction,
    pub register: Address,
    pub value: u16,
}

impl WriteSingleValue {
    /// Interpret the value as a coil state.
    ///
    /// By specification only `0xFF00` is ON, but any non-zero value is
    /// accepted when reading.
    #[must_use]
    pub const fn coil_value(&self) -> bool {
        self.value != 0
    }
}

/// Write multiple registers request (function `0x10`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteMultipleRegistersRequest {
    pub unit: UnitAddress,
    pub register: Address,
    pub data: Vec<u16>,
}

/// Write multiple registers response: echoes start register and count.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteMultipleRegistersResponse {
    pub unit: UnitAddress,
    pub register: Address,
    pub count: Quantity,
}

/// Read/write multiple registers request (function `0x17`); the response
/// reuses the read-registers response layout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadWriteMultipleRegistersRequest {
    pub unit: UnitAddress,
    pub read_register: Address,
    pub read_count: Quantity,
    pub write_register: Address,
    pub write_data: Vec<u16>,
}

/// Read exception status request (function `0x07`), 2-byte frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadExceptionStatusRequest {
    pub unit: UnitAddress,
}

/// Read exception status response carrying the 8 status bits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadExceptionStatusResponse {
    pub unit: UnitAddress,
    pub status: u8,
}

/// Read device identification request (function `0x2B`, MEI `0x2E`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceIdRequest {
    pub unit: UnitAddress,
    pub device_id_code: DeviceIdCode,
    pub object_id: u8,
}

/// Read device identification response with its nested object records.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceIdResponse {
    pub unit: UnitAddress,
    pub device_id_code: DeviceIdCode,
    pub conformity_level: ConformityLevel,
    pub more_follows: bool,
    pub next_object_id: u8,
    pub objects: Vec<ObjectRecord>,
}

/// Exception response; `function` holds the canonicalized originating
/// function, the wire byte carries the exception flag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExceptionMessage {
    pub unit: UnitAddress,
    pub function: FunctionCode,
    pub exception: ExceptionCode,
}

/// A decoded Modbus RTU message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    ReadRequest(ReadRequest),
    ReadCoilsResponse(ReadCoilsResponse),
    ReadRegistersResponse(ReadRegistersResponse),
    WriteSingleValue(WriteSingleValue),
    WriteMultipleRegistersRequest(WriteMultipleRegistersRequest),
    WriteMultipleRegistersResponse(WriteMultipleRegistersResponse),
    ReadWriteMultipleRegistersRequest(ReadWriteMultipleRegistersRequest),
    ReadExceptionStatusRequest(ReadExceptionStatusRequest),
    ReadExceptionStatusResponse(ReadExceptionStatusResponse),
    DeviceIdRequest(DeviceIdRequest),
    DeviceIdResponse(DeviceIdResponse),
    Exception(ExceptionMessage),
}

impl Message {
    /// The unit (slave) address prefixing the frame.
    #[must_use]
    pub const fn unit_address(&self) -> UnitAddress {
        match self {
            Self::ReadRequest(m) => m.unit,
            Self::ReadCoilsResponse(m) => m.unit,
            Self::ReadRegistersResponse(m) => m.unit,
            Self::WriteSingleValue(m) => m.unit,
            Self::WriteMultipleRegistersRequest(m) => m.unit,
            Self::WriteMultipleRegistersResponse(m) => m.unit,
            Self::ReadWriteMultipleRegistersRequest(m) => m.unit,
            Self::ReadExceptionStatusRequest(m) => m.unit,
            Self::ReadExceptionStatusResponse(m) => m.unit,
            Self::DeviceIdRequest(m) => m.unit,
            Self::DeviceIdResponse(m) => m.unit,
            Self::Exception(m) => m.unit,
        }
    }

    /// The canonical function code.
    ///
    /// For exception messages this is the originating function, not the
    /// flagged wire byte.
    #[must_use]
    pub const fn function(&self) -> FunctionCode {
        match self {
            Self::ReadRequest(m) => m.function,
            Self::ReadCoilsResponse(m) => m.function,
            Self::ReadRegistersResponse(m) => m.function,
            Self::WriteSingleValue(m) => m.function,
            Self::WriteMultipleRegistersRequest(_) | Self::WriteMultipleRegistersResponse(_) => {
                FunctionCode::WriteMultipleRegisters
            }
            Self::ReadWriteMultipleRegistersRequest(_) => FunctionCode::ReadWriteMultipleRegisters,
            Self::ReadExceptionStatusRequest(_) | Self::ReadExceptionStatusResponse(_) => {
                FunctionCode::ReadExceptionStatus
            }
            Self::DeviceIdRequest(_) | Self::DeviceIdResponse(_) => {
                FunctionCode::EncapsulatedInterfaceTransport
            }
            Self::Exception(m) => m.function,
        }
    }

    /// The request/response classification this message was decoded with.
    #[must_use]
    pub const fn direction(&self) -> Direction {
        match self {
            Self::ReadRequest(_)
            | Self::WriteMultipleRegistersRequest(_)
            | Self::ReadWriteMultipleRegistersRequest(_)
            | Self::ReadExceptionStatusRequest(_)
            | Self::DeviceIdRequest(_) => Direction::Request,
            Self::ReadCoilsResponse(_)
            | Self::ReadRegistersResponse(_)
            | Self::WriteMultipleRegistersResponse(_)
            | Self::ReadExceptionStatusResponse(_)
            | Self::DeviceIdResponse(_)
            | Self::Exception(_) => Direction::Response,
            Self::WriteSingleValue(m) => m.direction,
        }
    }

    /// Number of frame bytes when encoded, CRC excluded.
    #[must_use]
    pub fn frame_len(&self) -> usize {
        match self {
            Self::ReadRequest(_)
            | Self::WriteSingleValue(_)
            | Self::WriteMultipleRegistersResponse(_) => 6,
            Self::ReadCoilsResponse(m) => 3 + m.data.len(),
            Self::ReadRegistersResponse(m) => 3 + m.data.len() * 2,
            Self::WriteMultipleRegistersRequest(m) => 7 + m.data.len() * 2,
            Self::ReadWriteMultipleRegistersRequest(m) => 11 + m.write_data.len() * 2,
            Self::ReadExceptionStatusRequest(_) => 2,
            Self::ReadExceptionStatusResponse(_) | Self::Exception(_) => 3,
            Self::DeviceIdRequest(_) => 5,
            Self::DeviceIdResponse(m) => {
                8 + m
                    .objects
                    .iter()
                    .map(|o| 2 + o.value.len())
                    .sum::<usize>()
            }
        }
    }

    /// Encode the frame (address, function, payload; no CRC) into `buf`.
    ///
    /// Returns the number of bytes written. Fails with [`Error::Oversize`]
    /// when the frame plus CRC would not fit the RTU frame limit or `buf`.
    pub fn encode_into(&self, buf: &mut [u8]) -> Result<usize> {
        let len = self.frame_len();
        if len + 2 > MAX_FRAME_LEN || len > buf.len() {
            return Err(Error::Oversize(len + 2));
        }

        buf[0] = self.unit_address();
        buf[1] = match self {
            Self::Exception(m) => m.function.value() | super::EXCEPTION_FLAG,
            _ => self.function().value(),
        };

        match self {
            Self::ReadRequest(m) => {
                util::write_u16(&mut buf[2..], m.register);
                util::write_u16(&mut buf[4..], m.count);
            }
            Self::ReadCoilsResponse(m) => {
                buf[2] = byte_count(m.data.len())?;
                buf[3..3 + m.data.len()].copy_from_slice(&m.data);
            }
            Self::ReadRegistersResponse(m) => {
                buf[2] = byte_count(m.data.len() * 2)?;
                util::write_registers(&m.data, &mut buf[3..]);
            }
            Self::WriteSingleValue(m) => {
                util::write_u16(&mut buf[2..], m.register);
                util::write_u16(&mut buf[4..], m.value);
            }
            Self::WriteMultipleRegistersRequest(m) => {
                util::write_u16(&mut buf[2..], m.register);
                util::write_u16(&mut buf[4..], m.data.len() as u16);
                buf[6] = byte_count(m.data.len() * 2)?;
                util::write_registers(&m.data, &mut buf[7..]);
            }
            Self::WriteMultipleRegistersResponse(m) => {
                util::write_u16(&mut buf[2..], m.register);
                util::write_u16(&mut buf[4..], m.count);
            }
            Self::ReadWriteMultipleRegistersRequest(m) => {
                util::write_u16(&mut buf[2..], m.read_register);
                util::write_u16(&mut buf[4..], m.read_count);
                util::write_u16(&mut buf[6..], m.write_register);
                util::write_u16(&mut buf[8..], m.write_data.len() as u16);
                buf[10] = byte_count(m.write_data.len() * 2)?;
                util::write_registers(&m.write_data, &mut buf[11..]);
            }
            Self::ReadExceptionStatusRequest(_) => {}
            Self::ReadExceptionStatusResponse(m) => {
                buf[2] = m.status;
            }
            Self::DeviceIdRequest(m) => {
                buf[2] = DEVICE_ID_MEI_TYPE;
                buf[3] = m.device_id_code as u8;
                buf[4] = m.object_id;
            }
            Self::DeviceIdResponse(m) => {
                buf[2] = DEVICE_ID_MEI_TYPE;
                buf[3] = m.device_id_code as u8;
                buf[4] = m.conformity_level as u8;
                buf[5] = if m.more_follows { 0xFF } else { 0x00 };
                buf[6] = m.next_object_id;
                buf[7] = byte_count(m.objects.len())?;
                let mut idx = 8;
                for record in &m.objects {
                    buf[idx] = record.id;
                    buf[idx + 1] = byte_count(record.value.len())?;
                    buf[idx + 2..idx + 2 + record.value.len()].copy_from_slice(&record.value);
                    idx += 2 + record.value.len();
                }
            }
            Self::Exception(m) => {
                buf[2] = m.exception as u8;
            }
        }
        Ok(len)
    }

    /// Encode the complete wire frame including the trailing CRC16.
    pub fn encode_frame(&self) -> Result<Vec<u8>> {
        let mut frame = vec![0u8; self.frame_len() + 2];
        let len = self.encode_into(&mut frame)?;
        debug_assert_eq!(len + 2, frame.len());
        util::write_crc(&mut frame);
        Ok(frame)
    }
}

fn byte_count(len: usize) -> Result<u8> {
    u8::try_from(len).map_err(|_| Error::Format("length field exceeds one byte"))
}

impl From<&Message> for Transaction {
    fn from(message: &Message) -> Self {
        Self {
            unit: message.unit_address(),
            function: message.function(),
        }
    }
}
