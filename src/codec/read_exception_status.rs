// SPDX-FileCopyrightText: Copyright (c) 2018-2025 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

use super::{validate_parse, Codec, FrameLength};
use crate::error::Result;
use crate::frame::{
    Direction, FunctionCode, Message, ReadExceptionStatusRequest, ReadExceptionStatusResponse,
};

/// Read exception status (function `0x07`): 2-byte request, 3-byte response
/// carrying one output-status byte.
pub struct ReadExceptionStatusCodec;

impl Codec for ReadExceptionStatusCodec {
    fn can_handle(&self, function: u8, _direction: Direction) -> bool {
        FunctionCode::new(function) == Some(FunctionCode::ReadExceptionStatus)
    }

    fn frame_length(&self, _buf: &[u8], direction: Direction) -> Result<FrameLength> {
        Ok(FrameLength::Complete(match direction {
            Direction::Request => 2,
            Direction::Response => 3,
        }))
    }

    fn parse(&self, buf: &[u8], direction: Direction) -> Result<Message> {
        validate_parse(self, buf, direction)?;
        Ok(match direction {
            Direction::Request => {
                Message::ReadExceptionStatusRequest(ReadExceptionStatusRequest { unit: buf[0] })
            }
            Direction::Response => {
                Message::ReadExceptionStatusResponse(ReadExceptionStatusResponse {
                    unit: buf[0],
                    status: buf[2],
                })
            }
        })
    }
}
