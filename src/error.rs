//! Error types for the WebSocket protocol implementation.
//!
//! This module defines all error conditions that can occur during WebSocket
//! operations, following RFC 6455 requirements.

use thiserror::Error;

/// Result type alias for WebSocket operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur during WebSocket operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum Error {
    /// Invalid frame structure or header.
    #[error("Invalid frame: {0}")]
    InvalidFrame(String),

    /// Protocol violation detected.
    #[error("Protocol violation: {0}")]
    ProtocolViolation(String),

    /// Invalid UTF-8 in text frame.
    #[error("Invalid UTF-8 in text frame")]
    InvalidUtf8,

    /// Reserved opcode used.
    #[error("Reserved opcode: {0:#x}")]
    ReservedOpcode(u8),

    /// Declared payload length exceeds the supported maximum.
    #[error("Payload length out of range: {len} bytes (max: {max})")]
    PayloadOutOfRange {
        /// Declared payload length.
        len: u64,
        /// Maximum supported length.
        max: u64,
    },

    /// Stream ended before the requested number of bytes arrived.
    #[error("Unexpected end of stream: wanted {wanted} more bytes")]
    UnexpectedEof {
        /// Number of bytes still outstanding.
        wanted: usize,
    },

    /// HTTP header exceeded the configured size bound.
    #[error("HTTP header too large (max: {max} bytes)")]
    HeaderTooLarge {
        /// Maximum allowed header size.
        max: usize,
    },

    /// Invalid WebSocket handshake.
    #[error("Invalid handshake: {0}")]
    InvalidHandshake(String),

    /// Client requested an unsupported WebSocket version.
    #[error("Unsupported WebSocket version: {0}")]
    UnsupportedVersion(u16),

    /// Server's accept key did not match the expected value.
    #[error("Accept key mismatch: expected {expected}, got {actual}")]
    AcceptMismatch {
        /// Accept value computed from the key we sent.
        expected: String,
        /// Accept value the server returned.
        actual: String,
    },

    /// Operation requires an open connection.
    #[error("Connection is not open")]
    NotOpen,

    /// Connection has been closed.
    #[error("Connection is closed")]
    Closed,

    /// I/O error occurred.
    #[error("I/O error: {0}")]
    Io(String),
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Io(err.to_string())
    }
}

impl From<std::str::Utf8Error> for Error {
    fn from(_: std::str::Utf8Error) -> Self {
        Error::InvalidUtf8
    }
}

impl From<std::string::FromUtf8Error> for Error {
    fn from(_: std::string::FromUtf8Error) -> Self {
        Error::InvalidUtf8
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::PayloadOutOfRange {
            len: 3_000_000_000,
            max: 2_147_483_648,
        };
        assert_eq!(
            err.to_string(),
            "Payload length out of range: 3000000000 bytes (max: 2147483648)"
        );
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "pipe broken");
        let ws_err: Error = io_err.into();
        assert!(matches!(ws_err, Error::Io(_)));
    }

    #[test]
    fn test_error_clone() {
        let err = Error::InvalidUtf8;
        let cloned = err.clone();
        assert_eq!(err, cloned);
    }
}
