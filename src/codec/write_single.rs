// SPDX-FileCopyrightText: Copyright (c) 2018-2025 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

use super::{validate_parse, Codec, FrameLength};
use crate::error::{Error, Result};
use crate::frame::{Direction, FunctionCode, Message, WriteSingleValue};
use crate::util;

/// Write single coil and write single register; the response echoes the
/// request byte for byte.
pub struct WriteSingleValueCodec;

impl Codec for WriteSingleValueCodec {
    fn can_handle(&self, function: u8, _direction: Direction) -> bool {
        matches!(
            FunctionCode::new(function),
            Some(FunctionCode::WriteSingleCoil | FunctionCode::WriteSingleRegister)
        )
    }

    fn frame_length(&self, _buf: &[u8], _direction: Direction) -> Result<FrameLength> {
        Ok(FrameLength::Complete(6))
    }

    fn parse(&self, buf: &[u8], direction: Direction) -> Result<Message> {
        validate_parse(self, buf, direction)?;
        Ok(Message::WriteSingleValue(WriteSingleValue {
            unit: buf[0],
            function: FunctionCode::new(buf[1]).ok_or(Error::FnCode(buf[1]))?,
            direction,
            register: util::read_u16(&buf[2..]),
            value: util::read_u16(&buf[4..]),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_write_single_coil() {
        let msg = WriteSingleValueCodec
            .parse(&[0x05, 0x05, 0x12, 0x34, 0xFF, 0x00], Direction::Request)
            .unwrap();
        let Message::WriteSingleValue(m) = msg else {
            panic!("wrong message kind");
        };
        assert_eq!(m.function, FunctionCode::WriteSingleCoil);
        assert_eq!(m.register, 0x1234);
        assert!(m.coil_value());
        assert_eq!(m.direction, Direction::Request);
    }

    #[test]
    fn parse_write_single_register_response() {
        let msg = WriteSingleValueCodec
            .parse(&[0x05, 0x06, 0x00, 0x07, 0xAB, 0xCD], Direction::Response)
            .unwrap();
        let Message::WriteSingleValue(m) = msg else {
            panic!("wrong message kind");
        };
        assert_eq!(m.function, FunctionCode::WriteSingleRegister);
        assert_eq!(m.value, 0xABCD);
        assert_eq!(m.direction, Direction::Response);
    }

    #[test]
    fn short_frame_is_rejected() {
        assert!(matches!(
            WriteSingleValueCodec.parse(&[0x05, 0x06, 0x00], Direction::Request),
            Err(Error::Format(_))
        ));
    }
}
