// SPDX-FileCopyrightText: Copyright (c) 2018-2025 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Checksum and register codec helpers

use byteorder::{BigEndian, ByteOrder, LittleEndian};

use crate::error::{Error, Result};

/// Calculate the CRC (Cyclic Redundancy Check) sum.
///
/// Returns the raw CRC register value (initial `0xFFFF`, polynomial
/// `0xA001`, LSB-first). On the wire the low byte is transmitted first,
/// see [`write_crc`] and [`read_crc`].
#[must_use]
pub fn crc16(data: &[u8]) -> u16 {
    let mut crc = 0xFFFF;
    for x in data {
        crc ^= u16::from(*x);
        for _ in 0..8 {
            if (crc & 0x0001) != 0 {
                crc >>= 1;
                crc ^= 0xA001;
            } else {
                crc >>= 1;
            }
        }
    }
    crc
}

/// Append the CRC16 of `frame` at its end, low byte first.
pub fn write_crc(frame: &mut [u8]) {
    debug_assert!(frame.len() >= 2);
    let (payload, crc_buf) = frame.split_at_mut(frame.len() - 2);
    LittleEndian::write_u16(crc_buf, crc16(payload));
}

/// Read the trailing CRC16 field of `frame` (transmitted low byte first).
#[must_use]
pub fn read_crc(frame: &[u8]) -> u16 {
    debug_assert!(frame.len() >= 2);
    LittleEndian::read_u16(&frame[frame.len() - 2..])
}

/// Read a big-endian word.
#[must_use]
pub fn read_u16(bytes: &[u8]) -> u16 {
    BigEndian::read_u16(bytes)
}

/// Write a big-endian word.
pub fn write_u16(bytes: &mut [u8], value: u16) {
    BigEndian::write_u16(bytes, value);
}

/// Decode `count` big-endian registers out of a byte buffer.
pub fn read_registers(bytes: &[u8], count: usize) -> Result<Vec<u16>> {
    if bytes.len() < count * 2 {
        return Err(Error::Format("register data shorter than declared"));
    }
    Ok((0..count)
        .map(|i| BigEndian::read_u16(&bytes[i * 2..]))
        .collect())
}

/// Encode registers into a byte buffer (2 bytes per register, big-endian).
pub fn write_registers(words: &[u16], target: &mut [u8]) {
    debug_assert!(target.len() >= words.len() * 2);
    for (i, w) in words.iter().enumerate() {
        BigEndian::write_u16(&mut target[i * 2..], *w);
    }
}

/// Turn a bool into a u16 coil value
#[must_use]
pub const fn bool_to_u16_coil(state: bool) -> u16 {
    if state {
        0xFF00
    } else {
        0x0000
    }
}

/// Turn a u16 coil value into a boolean value.
pub fn u16_coil_to_bool(coil: u16) -> Result<bool> {
    match coil {
        0xFF00 => Ok(true),
        0x0000 => Ok(false),
        _ => Err(Error::CoilValue(coil)),
    }
}

/// Calculate the number of bytes required for a given number of coils.
#[must_use]
pub const fn packed_coils_len(bitcount: usize) -> usize {
    bitcount.div_ceil(8)
}

/// Pack coils into a byte array (little-endian bit order within each byte).
///
/// It returns the number of bytes used to pack the coils.
pub fn pack_coils(coils: &[bool], bytes: &mut [u8]) -> Result<usize> {
    let packed_size = packed_coils_len(coils.len());
    if bytes.len() < packed_size {
        return Err(Error::Format("coil buffer too small"));
    }
    coils.iter().enumerate().for_each(|(i, b)| {
        let v = u8::from(*b);
        bytes[i / 8] |= v << (i % 8);
    });
    Ok(packed_size)
}

/// Unpack coils from a byte array.
pub fn unpack_coils(bytes: &[u8], count: u16, coils: &mut [bool]) -> Result<()> {
    if coils.len() < count as usize {
        return Err(Error::Format("coil buffer too small"));
    }
    (0..count).for_each(|i| {
        coils[i as usize] = (bytes[(i / 8u16) as usize] >> (i % 8)) & 0b1 > 0;
    });
    Ok(())
}
