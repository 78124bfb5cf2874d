// SPDX-FileCopyrightText: Copyright (c) 2018-2025 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

use super::{validate_parse, Codec, FrameLength};
use crate::error::{Error, Result};
use crate::frame::{
    Direction, FunctionCode, Message, WriteMultipleRegistersRequest,
    WriteMultipleRegistersResponse,
};
use crate::util;

/// Write multiple registers (function `0x10`): variable-length request,
/// fixed 6-byte response echoing start register and count.
pub struct WriteMultipleRegistersCodec;

impl Codec for WriteMultipleRegistersCodec {
    fn can_handle(&self, function: u8, _direction: Direction) -> bool {
        FunctionCode::new(function) == Some(FunctionCode::WriteMultipleRegisters)
    }

    fn frame_length(&self, buf: &[u8], direction: Direction) -> Result<FrameLength> {
        match direction {
            Direction::Request => {
                if buf.len() < 7 {
                    return Ok(FrameLength::NeedMore(7));
                }
                Ok(FrameLength::Complete(7 + buf[6] as usize))
            }
            Direction::Response => Ok(FrameLength::Complete(6)),
        }
    }

    fn parse(&self, buf: &[u8], direction: Direction) -> Result<Message> {
        validate_parse(self, buf, direction)?;
        match direction {
            Direction::Request => {
                let count = util::read_u16(&buf[4..]) as usize;
                let byte_count = buf[6] as usize;
                if byte_count % 2 != 0 {
                    return Err(Error::Format(
                        "register data length is not a multiple of 2",
                    ));
                }
                if byte_count != count * 2 {
                    return Err(Error::Format(
                        "register count and data length do not match",
                    ));
                }
                Ok(Message::WriteMultipleRegistersRequest(
                    WriteMultipleRegistersRequest {
                        unit: buf[0],
                        register: util::read_u16(&buf[2..]),
                        data: util::read_registers(&buf[7..], count)?,
                    },
                ))
            }
            Direction::Response => Ok(Message::WriteMultipleRegistersResponse(
                WriteMultipleRegistersResponse {
                    unit: buf[0],
                    register: util::read_u16(&buf[2..]),
                    count: util::read_u16(&buf[4..]),
                },
            )),
        }
    }
}
