// SPDX-FileCopyrightText: Copyright (c) 2018-2025 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

use super::{validate_parse, Codec, FrameLength};
use crate::error::{Error, Result};
use crate::frame::{Direction, FunctionCode, Message, ReadCoilsResponse};

/// Bit-packed responses of read coils and read discrete inputs.
pub struct ReadCoilsResponseCodec;

impl Codec for ReadCoilsResponseCodec {
    fn can_handle(&self, function: u8, direction: Direction) -> bool {
        direction == Direction::Response
            && matches!(
                FunctionCode::new(function),
                Some(FunctionCode::ReadCoils | FunctionCode::ReadDiscreteInputs)
            )
    }

    fn frame_length(&self, buf: &[u8], _direction: Direction) -> Result<FrameLength> {
        if buf.len() < 3 {
            return Ok(FrameLength::NeedMore(3));
        }
        Ok(FrameLength::Complete(3 + buf[2] as usize))
    }

    fn parse(&self, buf: &[u8], direction: Direction) -> Result<Message> {
        let len = validate_parse(self, buf, direction)?;
        Ok(Message::ReadCoilsResponse(ReadCoilsResponse {
            unit: buf[0],
            function: FunctionCode::new(buf[1]).ok_or(Error::FnCode(buf[1]))?,
            data: buf[3..len].to_vec(),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_coils() {
        let msg = ReadCoilsResponseCodec
            .parse(&[0x01, 0x01, 0x01, 0b0000_1101], Direction::Response)
            .unwrap();
        let Message::ReadCoilsResponse(rsp) = msg else {
            panic!("wrong message kind");
        };
        assert_eq!(rsp.unit, 0x01);
        assert_eq!(rsp.function, FunctionCode::ReadCoils);
        assert_eq!(rsp.data, vec![0b0000_1101]);
        assert_eq!(rsp.coils().get(0), Some(true));
        assert_eq!(rsp.coils().get(1), Some(false));
        assert_eq!(rsp.coils().get(2), Some(true));
        assert_eq!(rsp.coils().get(3), Some(true));
    }

    #[test]
    fn never_claims_requests() {
        assert!(!ReadCoilsResponseCodec.can_handle(0x01, Direction::Request));
        assert!(ReadCoilsResponseCodec.can_handle(0x02, Direction::Response));
    }

    #[test]
    fn truncated_payload_is_rejected() {
        assert!(matches!(
            ReadCoilsResponseCodec.parse(&[0x01, 0x01, 0x02, 0x06], Direction::Response),
            Err(Error::Format(_))
        ));
    }
}
