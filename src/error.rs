// SPDX-FileCopyrightText: Copyright (c) 2018-2025 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::frame::Direction;

/// modbus-line result type
pub type Result<T> = core::result::Result<T, Error>;

/// modbus-line Error
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Invalid constructor arguments, fatal at construction time.
    #[error("invalid configuration: {0}")]
    Configuration(&'static str),

    /// Buffer too short for a claimed length or a misaligned length field.
    #[error("malformed frame: {0}")]
    Format(&'static str),

    /// CRC mismatch
    #[error("invalid CRC: expected = 0x{expected:04X}, actual = 0x{actual:04X}")]
    Checksum { expected: u16, actual: u16 },

    /// No registered codec claims the buffer.
    #[error("unsupported {direction} function code 0x{function:02X}")]
    UnsupportedFunction { function: u8, direction: Direction },

    /// Function code outside the closed enumeration.
    #[error("invalid function code: 0x{0:02X}")]
    FnCode(u8),

    /// Invalid exception code
    #[error("invalid exception code: 0x{0:02X}")]
    ExceptionCode(u8),

    /// Invalid coil value
    #[error("invalid coil value: 0x{0:04X}")]
    CoilValue(u16),

    /// Outbound frame does not fit into the 256 byte RTU limit.
    #[error("encoded frame of {0} bytes exceeds the RTU frame limit")]
    Oversize(usize),

    /// Physical line failure
    #[error("serial line failure")]
    Io(#[from] std::io::Error),

    /// The shared cancellation signal was observed.
    #[error("operation was cancelled")]
    Cancelled,

    /// Operation invoked after shutdown has begun.
    #[error("device has been shut down")]
    Disposed,
}

impl Error {
    /// Whether the receive loop may discard the current buffer and resume.
    ///
    /// Per-frame decoding failures are recoverable; resource failures,
    /// cancellation and disposal terminate the loop.
    #[must_use]
    pub const fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::Format(_)
                | Self::Checksum { .. }
                | Self::UnsupportedFunction { .. }
                | Self::FnCode(_)
                | Self::ExceptionCode(_)
                | Self::CoilValue(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recoverable_errors() {
        assert!(Error::Format("too short").is_recoverable());
        assert!(Error::Checksum {
            expected: 1,
            actual: 2
        }
        .is_recoverable());
        assert!(Error::UnsupportedFunction {
            function: 0x2A,
            direction: Direction::Request
        }
        .is_recoverable());
        assert!(Error::FnCode(0x64).is_recoverable());
    }

    #[test]
    fn fatal_errors() {
        assert!(!Error::Cancelled.is_recoverable());
        assert!(!Error::Disposed.is_recoverable());
        assert!(!Error::Oversize(300).is_recoverable());
        assert!(!Error::Io(std::io::Error::other("line gone")).is_recoverable());
        assert!(!Error::Configuration("empty port name").is_recoverable());
    }
}
