// SPDX-FileCopyrightText: Copyright (c) 2018-2025 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

use super::{validate_parse, Codec, FrameLength};
use crate::error::{Error, Result};
use crate::frame::{
    ConformityLevel, DeviceIdCode, DeviceIdRequest, DeviceIdResponse, Direction, FunctionCode,
    Message, ObjectRecord, DEVICE_ID_MEI_TYPE,
};

/// Read device identification (function `0x2B`, MEI type `0x2E`).
///
/// The response length is only known after walking the nested object
/// records, so `frame_length` extends its demand record by record as
/// bytes arrive.
pub struct DeviceIdCodec;

impl Codec for DeviceIdCodec {
    fn can_handle(&self, function: u8, _direction: Direction) -> bool {
        FunctionCode::new(function) == Some(FunctionCode::EncapsulatedInterfaceTransport)
    }

    fn frame_length(&self, buf: &[u8], direction: Direction) -> Result<FrameLength> {
        if buf.len() < 3 {
            return Ok(FrameLength::NeedMore(3));
        }
        if buf[2] != DEVICE_ID_MEI_TYPE {
            return Err(Error::Format("unsupported MEI type"));
        }
        match direction {
            Direction::Request => Ok(FrameLength::Complete(5)),
            Direction::Response => {
                if buf.len() < 8 {
                    return Ok(FrameLength::NeedMore(8));
                }
                let mut len = 8;
                for _ in 0..buf[7] {
                    // Object record header: id and value length.
                    len += 2;
                    if buf.len() < len {
                        return Ok(FrameLength::NeedMore(len));
                    }
                    len += buf[len - 1] as usize;
                    if buf.len() < len {
                        return Ok(FrameLength::NeedMore(len));
                    }
                }
                Ok(FrameLength::Complete(len))
            }
        }
    }

    fn parse(&self, buf: &[u8], direction: Direction) -> Result<Message> {
        validate_parse(self, buf, direction)?;
        match direction {
            Direction::Request => Ok(Message::DeviceIdRequest(DeviceIdRequest {
                unit: buf[0],
                device_id_code: DeviceIdCode::try_from(buf[3])?,
                object_id: buf[4],
            })),
            Direction::Response => {
                let mut objects = Vec::with_capacity(buf[7] as usize);
                let mut idx = 8;
                for _ in 0..buf[7] {
                    let value_len = buf[idx + 1] as usize;
                    objects.push(ObjectRecord {
                        id: buf[idx],
                        value: buf[idx + 2..idx + 2 + value_len].to_vec(),
                    });
                    idx += 2 + value_len;
                }
                Ok(Message::DeviceIdResponse(DeviceIdResponse {
                    unit: buf[0],
                    device_id_code: DeviceIdCode::try_from(buf[3])?,
                    conformity_level: ConformityLevel::try_from(buf[4])?,
                    more_follows: buf[5] != 0,
                    next_object_id: buf[6],
                    objects,
                }))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RESPONSE: &[u8] = &[
        0x01, 0x2B, 0x2E, 0x01, 0x01, 0x00, 0x00, 0x02, // header, 2 objects
        0x00, 0x04, b'A', b'C', b'M', b'E', // object 0
        0x01, 0x02, b'X', b'1', // object 1
    ];

    #[test]
    fn request_is_five_bytes() {
        assert_eq!(
            DeviceIdCodec
                .frame_length(&[0x01, 0x2B, 0x2E, 0x01, 0x00], Direction::Request)
                .unwrap(),
            FrameLength::Complete(5)
        );
    }

    #[test]
    fn foreign_mei_type_is_rejected() {
        assert!(matches!(
            DeviceIdCodec.frame_length(&[0x01, 0x2B, 0x0D], Direction::Request),
            Err(Error::Format(_))
        ));
    }

    #[test]
    fn response_length_extends_record_by_record() {
        // Demand grows as each object header and value arrives.
        let expectations = [
            (2, FrameLength::NeedMore(3)),
            (7, FrameLength::NeedMore(8)),
            (9, FrameLength::NeedMore(10)),
            (10, FrameLength::NeedMore(14)),
            (15, FrameLength::NeedMore(16)),
            (RESPONSE.len(), FrameLength::Complete(RESPONSE.len())),
        ];
        for (avail, expected) in expectations {
            assert_eq!(
                DeviceIdCodec
                    .frame_length(&RESPONSE[..avail], Direction::Response)
                    .unwrap(),
                expected,
                "with {avail} bytes available"
            );
        }
    }

    #[test]
    fn parse_request() {
        let msg = DeviceIdCodec
            .parse(&[0x01, 0x2B, 0x2E, 0x01, 0x00], Direction::Request)
            .unwrap();
        assert_eq!(
            msg,
            Message::DeviceIdRequest(DeviceIdRequest {
                unit: 0x01,
                device_id_code: DeviceIdCode::Basic,
                object_id: 0x00,
            })
        );
    }

    #[test]
    fn parse_response() {
        let msg = DeviceIdCodec.parse(RESPONSE, Direction::Response).unwrap();
        assert_eq!(
            msg,
            Message::DeviceIdResponse(DeviceIdResponse {
                unit: 0x01,
                device_id_code: DeviceIdCode::Basic,
                conformity_level: ConformityLevel::Basic,
                more_follows: false,
                next_object_id: 0,
                objects: vec![
                    ObjectRecord {
                        id: 0,
                        value: b"ACME".to_vec(),
                    },
                    ObjectRecord {
                        id: 1,
                        value: b"X1".to_vec(),
                    },
                ],
            })
        );
    }
}
