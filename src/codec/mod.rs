// SPDX-FileCopyrightText: Copyright (c) 2018-2025 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Message codecs and their registry.
//!
//! A codec implements the framing and payload rules of one message family.
//! The registry resolves the codec for an in-progress buffer by first match
//! over an ordered list, so registration order is semantically significant:
//! any response above `0x80` is an exception frame and the exception codec
//! must be consulted before the function-specific ones.

use crate::error::{Error, Result};
use crate::frame::{Direction, Message};

mod device_id;
mod exception;
mod read_coils;
mod read_exception_status;
mod read_registers;
mod read_write_multiple;
mod write_multiple;
mod write_single;

pub use self::{
    device_id::DeviceIdCodec, exception::ExceptionCodec, read_coils::ReadCoilsResponseCodec,
    read_exception_status::ReadExceptionStatusCodec, read_registers::ReadRegistersCodec,
    read_write_multiple::ReadWriteMultipleRegistersRequestCodec,
    write_multiple::WriteMultipleRegistersCodec, write_single::WriteSingleValueCodec,
};

/// Frame length as far as a codec can tell from the bytes seen so far.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameLength {
    /// The frame is exactly this many bytes (CRC excluded).
    Complete(usize),
    /// At least this many bytes are required before the length can be
    /// stated; ask again once they are available.
    NeedMore(usize),
}

/// Framing and payload rules of one message family.
pub trait Codec: Send + Sync {
    /// Cheap buffer-local predicate deciding whether this codec handles a
    /// frame starting with the given raw function byte.
    fn can_handle(&self, function: u8, direction: Direction) -> bool;

    /// Determine the frame length from a partially received buffer.
    ///
    /// Some codecs report an intermediate requirement (e.g. up to a length
    /// byte) before they can state the true total; callers must re-invoke
    /// with more bytes until [`FrameLength::Complete`] is returned.
    fn frame_length(&self, buf: &[u8], direction: Direction) -> Result<FrameLength>;

    /// Decode a complete frame (CRC already stripped and verified).
    fn parse(&self, buf: &[u8], direction: Direction) -> Result<Message>;
}

/// Re-validate a buffer before decoding.
///
/// `parse` may be invoked directly, outside the frame assembler, so every
/// codec double-checks minimum length, predicate and length here.
pub(crate) fn validate_parse(
    codec: &dyn Codec,
    buf: &[u8],
    direction: Direction,
) -> Result<usize> {
    if buf.len() < 2 {
        return Err(Error::Format("frame shorter than address and function"));
    }
    if !codec.can_handle(buf[1], direction) {
        return Err(Error::UnsupportedFunction {
            function: buf[1],
            direction,
        });
    }
    match codec.frame_length(buf, direction)? {
        FrameLength::Complete(len) if buf.len() >= len => Ok(len),
        _ => Err(Error::Format("buffer shorter than claimed frame length")),
    }
}

/// Ordered collection of codecs; first match wins.
pub struct CodecRegistry {
    codecs: Vec<Box<dyn Codec>>,
}

impl CodecRegistry {
    /// An empty registry.
    #[must_use]
    pub const fn new() -> Self {
        Self { codecs: Vec::new() }
    }

    /// The default codec set in its required order.
    #[must_use]
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        // The exception codec must come first, see module docs.
        registry.register(ExceptionCodec);
        registry.register(ReadCoilsResponseCodec);
        registry.register(ReadRegistersCodec);
        registry.register(ReadExceptionStatusCodec);
        registry.register(WriteSingleValueCodec);
        registry.register(WriteMultipleRegistersCodec);
        registry.register(ReadWriteMultipleRegistersRequestCodec);
        registry.register(DeviceIdCodec);
        registry
    }

    /// Append a codec at the end of the resolution order.
    pub fn register(&mut self, codec: impl Codec + 'static) {
        self.codecs.push(Box::new(codec));
    }

    /// Resolve the codec for an in-progress buffer.
    ///
    /// The buffer must hold at least the unit address and function byte.
    pub fn resolve(&self, buf: &[u8], direction: Direction) -> Result<&dyn Codec> {
        if buf.len() < 2 {
            return Err(Error::Format("frame shorter than address and function"));
        }
        let function = buf[1];
        self.codecs
            .iter()
            .map(AsRef::as_ref)
            .find(|codec| codec.can_handle(function, direction))
            .ok_or(Error::UnsupportedFunction {
                function,
                direction,
            })
    }
}

impl Default for CodecRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::{ExceptionMessage, FunctionCode};

    #[test]
    fn exception_codec_wins_over_function_codecs() {
        let registry = CodecRegistry::with_defaults();
        // 0x83 is read-holding-registers with the exception flag; without
        // the ordering contract the read-registers codec could never see
        // the difference.
        let buf = &[0x11, 0x83, 0x02];
        let codec = registry.resolve(buf, Direction::Response).unwrap();
        let msg = codec.parse(buf, Direction::Response).unwrap();
        assert_eq!(
            msg,
            Message::Exception(ExceptionMessage {
                unit: 0x11,
                function: FunctionCode::ReadHoldingRegisters,
                exception: crate::frame::ExceptionCode::IllegalDataAddress,
            })
        );
    }

    #[test]
    fn unmatched_function_is_unsupported() {
        let registry = CodecRegistry::with_defaults();
        let buf = &[0x11, 0x2A, 0x00, 0x00];
        assert!(matches!(
            registry.resolve(buf, Direction::Request),
            Err(Error::UnsupportedFunction {
                function: 0x2A,
                direction: Direction::Request
            })
        ));
    }

    #[test]
    fn resolution_requires_the_function_byte() {
        let registry = CodecRegistry::with_defaults();
        assert!(matches!(
            registry.resolve(&[0x11], Direction::Request),
            Err(Error::Format(_))
        ));
    }

    #[test]
    fn messages_survive_a_wire_round_trip() {
        use crate::frame::{
            ConformityLevel, DeviceIdCode, DeviceIdRequest, DeviceIdResponse, ExceptionCode,
            ObjectRecord, ReadCoilsResponse, ReadExceptionStatusResponse, ReadRegistersResponse,
            ReadRequest, WriteMultipleRegistersRequest, WriteSingleValue,
        };
        use crate::util;

        let registry = CodecRegistry::with_defaults();
        let cases = [
            Message::ReadRequest(ReadRequest {
                unit: 0x11,
                function: FunctionCode::ReadHoldingRegisters,
                register: 0x6B,
                count: 3,
            }),
            Message::ReadCoilsResponse(ReadCoilsResponse {
                unit: 0x01,
                function: FunctionCode::ReadCoils,
                data: vec![0b0000_1101],
            }),
            Message::ReadRegistersResponse(ReadRegistersResponse {
                unit: 0x11,
                function: FunctionCode::ReadInputRegisters,
                data: vec![0xAE41, 0x5652],
            }),
            Message::WriteSingleValue(WriteSingleValue {
                unit: 0x05,
                function: FunctionCode::WriteSingleCoil,
                direction: Direction::Request,
                register: 0x00AC,
                value: 0xFF00,
            }),
            Message::WriteMultipleRegistersRequest(WriteMultipleRegistersRequest {
                unit: 0x11,
                register: 0x01,
                data: vec![0x000A, 0x0102],
            }),
            Message::ReadExceptionStatusResponse(ReadExceptionStatusResponse {
                unit: 0x11,
                status: 0x6D,
            }),
            Message::DeviceIdRequest(DeviceIdRequest {
                unit: 0x01,
                device_id_code: DeviceIdCode::Basic,
                object_id: 0,
            }),
            Message::DeviceIdResponse(DeviceIdResponse {
                unit: 0x01,
                device_id_code: DeviceIdCode::Basic,
                conformity_level: ConformityLevel::Basic,
                more_follows: false,
                next_object_id: 0,
                objects: vec![ObjectRecord {
                    id: 0,
                    value: b"ACME".to_vec(),
                }],
            }),
            Message::Exception(ExceptionMessage {
                unit: 0x0A,
                function: FunctionCode::ReadHoldingRegisters,
                exception: ExceptionCode::IllegalDataAddress,
            }),
        ];

        for message in cases {
            let direction = message.direction();
            let frame = message.encode_frame().unwrap();
            let payload = &frame[..frame.len() - 2];
            assert_eq!(util::read_crc(&frame), util::crc16(payload));
            let codec = registry.resolve(payload, direction).unwrap();
            assert_eq!(codec.parse(payload, direction).unwrap(), message);
        }
    }

    #[test]
    fn registration_order_is_preserved() {
        struct Greedy;
        impl Codec for Greedy {
            fn can_handle(&self, _: u8, _: Direction) -> bool {
                true
            }
            fn frame_length(&self, _: &[u8], _: Direction) -> Result<FrameLength> {
                Ok(FrameLength::Complete(2))
            }
            fn parse(&self, _: &[u8], _: Direction) -> Result<Message> {
                Err(Error::Format("greedy"))
            }
        }

        let mut registry = CodecRegistry::new();
        registry.register(Greedy);
        registry.register(ExceptionCodec);
        let codec = registry
            .resolve(&[0x11, 0x83], Direction::Response)
            .unwrap();
        // The greedy codec registered first shadows the exception codec.
        assert!(codec.parse(&[0x11, 0x83], Direction::Response).is_err());
    }
}
