//! Flow-control templates and special characters

use serde::{Deserialize, Serialize};

/// Length of a `SET_FLOW` payload
pub const FLOW_PAYLOAD_LEN: usize = 16;

/// Bytes 1..16 shared by every template
const FLOW_TAIL: [u8; 15] = [
    0x00, 0x00, 0x00, 0x40, 0x00, 0x00, 0x00, 0x00, 0x80, 0x00, 0x00, 0x00, 0x20, 0x00, 0x00,
];

/// Flow-control mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FlowControl {
    #[default]
    Off,
    RtsCts,
    DsrDtr,
    XonXoff,
}

impl FlowControl {
    /// The 16-byte `SET_FLOW` payload for this mode
    ///
    /// Byte 0 is the control-handshake mask; XON/XOFF additionally sets the
    /// auto-transmit/auto-receive bits in byte 4.
    pub fn payload(self) -> [u8; FLOW_PAYLOAD_LEN] {
        let mut payload = [0u8; FLOW_PAYLOAD_LEN];
        payload[1..].copy_from_slice(&FLOW_TAIL);
        payload[0] = match self {
            FlowControl::Off | FlowControl::XonXoff => 0x01,
            FlowControl::RtsCts => 0x09,
            FlowControl::DsrDtr => 0x11,
        };
        if self == FlowControl::XonXoff {
            payload[4] = 0x43;
        }
        payload
    }

    /// Whether this mode relies on polling the modem status lines
    pub fn uses_status_lines(self) -> bool {
        matches!(self, FlowControl::RtsCts | FlowControl::DsrDtr)
    }
}

/// Special characters table sent with `SET_CHARS`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpecialChars {
    pub xon: u8,
    pub xoff: u8,
}

impl SpecialChars {
    /// EOF, error, break and event characters are left at zero
    pub fn payload(self) -> [u8; 6] {
        [0x00, 0x00, 0x00, 0x00, self.xon, self.xoff]
    }
}

impl Default for SpecialChars {
    fn default() -> Self {
        Self {
            xon: 0x11,
            xoff: 0x13,
        }
    }
}
