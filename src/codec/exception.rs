// SPDX-FileCopyrightText: Copyright (c) 2018-2025 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

use super::{validate_parse, Codec, FrameLength};
use crate::error::Result;
use crate::frame::{is_exception_fn, Direction, ExceptionMessage, FunctionCode, Message};

/// Exception responses: always exactly 3 bytes, identified by the function
/// byte's high bit.
pub struct ExceptionCodec;

impl Codec for ExceptionCodec {
    fn can_handle(&self, function: u8, _direction: Direction) -> bool {
        is_exception_fn(function)
    }

    fn frame_length(&self, _buf: &[u8], _direction: Direction) -> Result<FrameLength> {
        Ok(FrameLength::Complete(3))
    }

    fn parse(&self, buf: &[u8], direction: Direction) -> Result<Message> {
        validate_parse(self, buf, direction)?;
        Ok(Message::Exception(ExceptionMessage {
            unit: buf[0],
            function: FunctionCode::canonical(buf[1])?,
            exception: buf[2].try_into()?,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::frame::ExceptionCode;

    #[test]
    fn parse_exception() {
        let msg = ExceptionCodec
            .parse(&[0x0A, 0x81, 0x02], Direction::Response)
            .unwrap();
        assert_eq!(
            msg,
            Message::Exception(ExceptionMessage {
                unit: 0x0A,
                function: FunctionCode::ReadCoils,
                exception: ExceptionCode::IllegalDataAddress,
            })
        );
    }

    #[test]
    fn rejects_unflagged_function() {
        assert!(!ExceptionCodec.can_handle(0x03, Direction::Response));
        assert!(matches!(
            ExceptionCodec.parse(&[0x0A, 0x03, 0x02], Direction::Response),
            Err(Error::UnsupportedFunction { .. })
        ));
    }

    #[test]
    fn rejects_invalid_exception_code() {
        assert!(matches!(
            ExceptionCodec.parse(&[0x0A, 0x81, 0x55], Direction::Response),
            Err(Error::ExceptionCode(0x55))
        ));
    }

    #[test]
    fn rejects_short_buffer() {
        assert!(matches!(
            ExceptionCodec.parse(&[0x0A], Direction::Response),
            Err(Error::Format(_))
        ));
    }
}
