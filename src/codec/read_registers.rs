// SPDX-FileCopyrightText: Copyright (c) 2018-2025 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

use super::{validate_parse, Codec, FrameLength};
use crate::error::{Error, Result};
use crate::frame::{
    Direction, FunctionCode, Message, ReadRegistersResponse, ReadRequest,
};
use crate::util;

/// The read-registers family.
///
/// Requests of the whole read family (coils, discrete inputs, holding and
/// input registers) share the fixed 6-byte layout; responses carry register
/// data behind a 1-byte length field at offset 2. Coil responses are
/// bit-packed and handled by [`super::ReadCoilsResponseCodec`] instead.
pub struct ReadRegistersCodec;

impl Codec for ReadRegistersCodec {
    fn can_handle(&self, function: u8, direction: Direction) -> bool {
        let Some(code) = FunctionCode::new(function) else {
            return false;
        };
        match direction {
            Direction::Request => matches!(
                code,
                FunctionCode::ReadCoils
                    | FunctionCode::ReadDiscreteInputs
                    | FunctionCode::ReadHoldingRegisters
                    | FunctionCode::ReadInputRegisters
            ),
            Direction::Response => matches!(
                code,
                FunctionCode::ReadHoldingRegisters
                    | FunctionCode::ReadInputRegisters
                    | FunctionCode::ReadWriteMultipleRegisters
            ),
        }
    }

    fn frame_length(&self, buf: &[u8], direction: Direction) -> Result<FrameLength> {
        match direction {
            Direction::Request => Ok(FrameLength::Complete(6)),
            Direction::Response => {
                if buf.len() < 3 {
                    return Ok(FrameLength::NeedMore(3));
                }
                Ok(FrameLength::Complete(3 + buf[2] as usize))
            }
        }
    }

    fn parse(&self, buf: &[u8], direction: Direction) -> Result<Message> {
        validate_parse(self, buf, direction)?;
        let function =
            FunctionCode::new(buf[1]).ok_or(Error::FnCode(buf[1]))?;
        match direction {
            Direction::Request => Ok(Message::ReadRequest(ReadRequest {
                unit: buf[0],
                function,
                register: util::read_u16(&buf[2..]),
                count: util::read_u16(&buf[4..]),
            })),
            Direction::Response => {
                let byte_count = buf[2] as usize;
                if byte_count % 2 != 0 {
                    return Err(Error::Format(
                        "register data length is not a multiple of 2",
                    ));
                }
                Ok(Message::ReadRegistersResponse(ReadRegistersResponse {
                    unit: buf[0],
                    function,
                    data: util::read_registers(&buf[3..], byte_count / 2)?,
                }))
            }
        }
    }
}
