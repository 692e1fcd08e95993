//! WebSocket frame opcodes as defined in RFC 6455 Section 5.2.

use crate::error::{Error, Result};

/// Frame opcode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum OpCode {
    /// Continuation of a fragmented message.
    Continuation = 0x0,
    /// UTF-8 text data.
    Text = 0x1,
    /// Binary data.
    Binary = 0x2,
    /// Connection close.
    Close = 0x8,
    /// Ping (keep-alive probe).
    Ping = 0x9,
    /// Pong (reply to a ping).
    Pong = 0xA,
}

impl OpCode {
    /// Parse an opcode from the low nibble of the first frame byte.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ReservedOpcode`] for the values RFC 6455 reserves
    /// (0x3-0x7 and 0xB-0xF).
    pub fn from_u8(value: u8) -> Result<Self> {
        match value {
            0x0 => Ok(OpCode::Continuation),
            0x1 => Ok(OpCode::Text),
            0x2 => Ok(OpCode::Binary),
            0x8 => Ok(OpCode::Close),
            0x9 => Ok(OpCode::Ping),
            0xA => Ok(OpCode::Pong),
            other => Err(Error::ReservedOpcode(other)),
        }
    }

    /// Numeric wire value.
    #[inline]
    #[must_use]
    pub const fn as_u8(&self) -> u8 {
        *self as u8
    }

    /// Whether this is a control opcode (Close, Ping, Pong).
    #[inline]
    #[must_use]
    pub const fn is_control(&self) -> bool {
        matches!(self, OpCode::Close | OpCode::Ping | OpCode::Pong)
    }

    /// Whether this opcode carries application data (Text or Binary).
    #[inline]
    #[must_use]
    pub const fn is_data(&self) -> bool {
        matches!(self, OpCode::Text | OpCode::Binary)
    }
}

impl std::fmt::Display for OpCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            OpCode::Continuation => "Continuation",
            OpCode::Text => "Text",
            OpCode::Binary => "Binary",
            OpCode::Close => "Close",
            OpCode::Ping => "Ping",
            OpCode::Pong => "Pong",
        };
        write!(f, "{name}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_opcodes_round_trip() {
        for opcode in [
            OpCode::Continuation,
            OpCode::Text,
            OpCode::Binary,
            OpCode::Close,
            OpCode::Ping,
            OpCode::Pong,
        ] {
            assert_eq!(OpCode::from_u8(opcode.as_u8()).unwrap(), opcode);
        }
    }

    #[test]
    fn test_reserved_opcodes_rejected() {
        for value in (0x3..=0x7).chain(0xB..=0xF) {
            assert_eq!(
                OpCode::from_u8(value).unwrap_err(),
                Error::ReservedOpcode(value)
            );
        }
    }

    #[test]
    fn test_control_and_data_partition() {
        assert!(OpCode::Close.is_control());
        assert!(OpCode::Ping.is_control());
        assert!(OpCode::Pong.is_control());
        assert!(!OpCode::Text.is_control());
        assert!(OpCode::Text.is_data());
        assert!(OpCode::Binary.is_data());
        assert!(!OpCode::Continuation.is_data());
    }
}
