//! Messages delivered to applications and close-handshake payloads.

use tracing::warn;

/// Position of a frame within a fragmented message.
///
/// Single-frame messages carry no marker. Chunks of a fragmented message
/// are delivered as they arrive, tagged so the application can tell the
/// stream apart from complete messages and spot the final piece.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Continuation {
    /// More chunks of this message follow.
    NonLast,
    /// Final chunk of a fragmented message.
    Last,
}

/// One deliverable chunk of application data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReceivedMessage {
    /// UTF-8 text.
    Text {
        /// Decoded text of this chunk.
        text: String,
        /// `None` for a single-frame message.
        continuation: Option<Continuation>,
    },
    /// Raw bytes.
    Binary {
        /// Payload bytes of this chunk.
        data: Vec<u8>,
        /// `None` for a single-frame message.
        continuation: Option<Continuation>,
    },
}

impl ReceivedMessage {
    /// Text content, if this is a text chunk.
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            ReceivedMessage::Text { text, .. } => Some(text),
            ReceivedMessage::Binary { .. } => None,
        }
    }

    /// The fragmentation marker.
    #[must_use]
    pub fn continuation(&self) -> Option<Continuation> {
        match self {
            ReceivedMessage::Text { continuation, .. }
            | ReceivedMessage::Binary { continuation, .. } => *continuation,
        }
    }
}

/// WebSocket close status codes (RFC 6455 Section 7.4.1).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseCode {
    /// Normal closure (1000).
    Normal,
    /// Endpoint going away (1001).
    GoingAway,
    /// Protocol error (1002).
    ProtocolError,
    /// Unacceptable data type (1003).
    UnsupportedData,
    /// Inconsistent payload data (1007).
    InvalidPayload,
    /// Policy violation (1008).
    PolicyViolation,
    /// Message too big (1009).
    MessageTooBig,
    /// Missing mandatory extension (1010).
    MandatoryExtension,
    /// Unexpected server condition (1011).
    InternalError,
}

impl CloseCode {
    /// Numeric wire value.
    #[must_use]
    pub const fn as_u16(&self) -> u16 {
        match self {
            CloseCode::Normal => 1000,
            CloseCode::GoingAway => 1001,
            CloseCode::ProtocolError => 1002,
            CloseCode::UnsupportedData => 1003,
            CloseCode::InvalidPayload => 1007,
            CloseCode::PolicyViolation => 1008,
            CloseCode::MessageTooBig => 1009,
            CloseCode::MandatoryExtension => 1010,
            CloseCode::InternalError => 1011,
        }
    }

    /// Map a numeric wire value to a known code.
    #[must_use]
    pub const fn try_from_u16(value: u16) -> Option<Self> {
        match value {
            1000 => Some(CloseCode::Normal),
            1001 => Some(CloseCode::GoingAway),
            1002 => Some(CloseCode::ProtocolError),
            1003 => Some(CloseCode::UnsupportedData),
            1007 => Some(CloseCode::InvalidPayload),
            1008 => Some(CloseCode::PolicyViolation),
            1009 => Some(CloseCode::MessageTooBig),
            1010 => Some(CloseCode::MandatoryExtension),
            1011 => Some(CloseCode::InternalError),
            _ => None,
        }
    }
}

/// Decoded contents of a Close frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloseInfo {
    /// Close status code.
    pub code: CloseCode,
    /// Optional human-readable reason.
    pub reason: Option<String>,
}

impl CloseInfo {
    /// A close with the given code and no reason.
    #[must_use]
    pub const fn new(code: CloseCode) -> Self {
        Self { code, reason: None }
    }

    /// Decode a Close frame payload. Never fails.
    ///
    /// Fewer than two payload bytes means the peer sent no code; an
    /// unrecognized numeric code is logged and treated as a normal close.
    #[must_use]
    pub fn from_payload(payload: &[u8]) -> Self {
        if payload.len() < 2 {
            return Self::new(CloseCode::Normal);
        }
        let raw = u16::from_be_bytes([payload[0], payload[1]]);
        let code = match CloseCode::try_from_u16(raw) {
            Some(code) => code,
            None => {
                warn!(code = raw, "unrecognized close code, treating as normal");
                CloseCode::Normal
            }
        };
        let reason = if payload.len() > 2 {
            Some(String::from_utf8_lossy(&payload[2..]).into_owned())
        } else {
            None
        };
        Self { code, reason }
    }

    /// Encode as a Close frame payload: 2-byte big-endian code + reason.
    #[must_use]
    pub fn to_payload(&self) -> Vec<u8> {
        let mut payload = self.code.as_u16().to_be_bytes().to_vec();
        if let Some(reason) = &self.reason {
            payload.extend_from_slice(reason.as_bytes());
        }
        payload
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_close_code_round_trip() {
        for code in [
            CloseCode::Normal,
            CloseCode::GoingAway,
            CloseCode::ProtocolError,
            CloseCode::UnsupportedData,
            CloseCode::InvalidPayload,
            CloseCode::PolicyViolation,
            CloseCode::MessageTooBig,
            CloseCode::MandatoryExtension,
            CloseCode::InternalError,
        ] {
            assert_eq!(CloseCode::try_from_u16(code.as_u16()), Some(code));
        }
    }

    #[test]
    fn test_unknown_close_code() {
        assert_eq!(CloseCode::try_from_u16(2999), None);
    }

    #[test]
    fn test_close_info_empty_payload() {
        let info = CloseInfo::from_payload(&[]);
        assert_eq!(info.code, CloseCode::Normal);
        assert!(info.reason.is_none());
    }

    #[test]
    fn test_close_info_single_byte_payload() {
        let info = CloseInfo::from_payload(&[0x03]);
        assert_eq!(info, CloseInfo::new(CloseCode::Normal));
    }

    #[test]
    fn test_close_info_unknown_code_degrades_to_normal() {
        let info = CloseInfo::from_payload(&2999u16.to_be_bytes());
        assert_eq!(info.code, CloseCode::Normal);
    }

    #[test]
    fn test_close_info_code_and_reason() {
        let mut payload = 1001u16.to_be_bytes().to_vec();
        payload.extend_from_slice(b"shutting down");
        let info = CloseInfo::from_payload(&payload);
        assert_eq!(info.code, CloseCode::GoingAway);
        assert_eq!(info.reason.as_deref(), Some("shutting down"));
        assert_eq!(info.to_payload(), payload);
    }

    #[test]
    fn test_continuation_accessor() {
        let message = ReceivedMessage::Text {
            text: "part".into(),
            continuation: Some(Continuation::NonLast),
        };
        assert_eq!(message.as_text(), Some("part"));
        assert_eq!(message.continuation(), Some(Continuation::NonLast));
    }
}
