// SPDX-FileCopyrightText: Copyright (c) 2018-2025 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

use super::{validate_parse, Codec, FrameLength};
use crate::error::{Error, Result};
use crate::frame::{Direction, FunctionCode, Message, ReadWriteMultipleRegistersRequest};
use crate::util;

/// Combined read/write request (function `0x17`). Only the request side is
/// handled here; the response is shaped like a read response and handled by
/// [`ReadRegistersCodec`](super::read_registers::ReadRegistersCodec).
pub struct ReadWriteMultipleRegistersRequestCodec;

impl Codec for ReadWriteMultipleRegistersRequestCodec {
    fn can_handle(&self, function: u8, direction: Direction) -> bool {
        direction == Direction::Request
            && FunctionCode::new(function) == Some(FunctionCode::ReadWriteMultipleRegisters)
    }

    fn frame_length(&self, buf: &[u8], _direction: Direction) -> Result<FrameLength> {
        if buf.len() < 11 {
            return Ok(FrameLength::NeedMore(11));
        }
        Ok(FrameLength::Complete(11 + buf[10] as usize))
    }

    fn parse(&self, buf: &[u8], direction: Direction) -> Result<Message> {
        validate_parse(self, buf, direction)?;
        let write_count = util::read_u16(&buf[8..]) as usize;
        let byte_count = buf[10] as usize;
        if byte_count % 2 != 0 {
            return Err(Error::Format(
                "register data length is not a multiple of 2",
            ));
        }
        if byte_count != write_count * 2 {
            return Err(Error::Format(
                "register count and data length do not match",
            ));
        }
        Ok(Message::ReadWriteMultipleRegistersRequest(
            ReadWriteMultipleRegistersRequest {
                unit: buf[0],
                read_register: util::read_u16(&buf[2..]),
                read_count: util::read_u16(&buf[4..]),
                write_register: util::read_u16(&buf[6..]),
                write_data: util::read_registers(&buf[11..], write_count)?,
            },
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn response_side_is_not_handled() {
        assert!(!ReadWriteMultipleRegistersRequestCodec.can_handle(0x17, Direction::Response));
        assert!(ReadWriteMultipleRegistersRequestCodec.can_handle(0x17, Direction::Request));
    }

    #[test]
    fn incremental_length() {
        assert_eq!(
            ReadWriteMultipleRegistersRequestCodec
                .frame_length(&[0x11, 0x17, 0, 1], Direction::Request)
                .unwrap(),
            FrameLength::NeedMore(11)
        );
        let header = [0x11, 0x17, 0x00, 0x04, 0x00, 0x01, 0x00, 0x01, 0x00, 0x02, 0x04];
        assert_eq!(
            ReadWriteMultipleRegistersRequestCodec
                .frame_length(&header, Direction::Request)
                .unwrap(),
            FrameLength::Complete(15)
        );
    }

    #[test]
    fn parse_request() {
        let buf = [
            0x11, 0x17, 0x00, 0x04, 0x00, 0x01, 0x00, 0x01, 0x00, 0x02, 0x04, 0x00, 0xFF, 0x00,
            0x1E,
        ];
        let msg = ReadWriteMultipleRegistersRequestCodec
            .parse(&buf, Direction::Request)
            .unwrap();
        assert_eq!(
            msg,
            Message::ReadWriteMultipleRegistersRequest(ReadWriteMultipleRegistersRequest {
                unit: 0x11,
                read_register: 0x04,
                read_count: 1,
                write_register: 0x01,
                write_data: vec![0x00FF, 0x001E],
            })
        );
    }
}
