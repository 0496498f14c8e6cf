//! Protocol error types

use thiserror::Error;

/// Errors raised while encoding or decoding CP210x control payloads
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    /// A raw line setting has no encoding on the chip
    #[error("Unsupported {setting} value: {value}")]
    InvalidLineSetting { setting: &'static str, value: u8 },

    /// The device answered a status query with fewer bytes than the layout needs
    #[error("Short {what} payload: expected {expected} bytes, got {actual}")]
    ShortPayload {
        what: &'static str,
        expected: usize,
        actual: usize,
    },
}

/// Type alias for protocol results
pub type Result<T> = std::result::Result<T, ProtocolError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ProtocolError::InvalidLineSetting {
            setting: "data bits",
            value: 9,
        };
        let msg = format!("{}", err);
        assert!(msg.contains("data bits"));
        assert!(msg.contains('9'));
    }

    #[test]
    fn test_short_payload_error() {
        let err = ProtocolError::ShortPayload {
            what: "comm status",
            expected: 19,
            actual: 4,
        };
        let msg = format!("{}", err);
        assert!(msg.contains("expected 19"));
        assert!(msg.contains("got 4"));
    }
}
