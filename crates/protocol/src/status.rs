//! Modem and comm status decoding

use crate::error::{ProtocolError, Result};
use std::fmt;

/// Length of the `GET_COMM_STATUS` answer
pub const COMM_STATUS_LEN: usize = 19;

/// Single byte returned by `GET_MDMSTS`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ModemStatus(pub u8);

impl ModemStatus {
    const CTS: u8 = 0x10;
    const DSR: u8 = 0x20;

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        bytes
            .first()
            .copied()
            .map(Self)
            .ok_or(ProtocolError::ShortPayload {
                what: "modem status",
                expected: 1,
                actual: 0,
            })
    }

    pub fn cts(self) -> bool {
        self.0 & Self::CTS != 0
    }

    pub fn dsr(self) -> bool {
        self.0 & Self::DSR != 0
    }
}

/// Line error conditions reported in comm status byte 0
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
pub struct LineErrors(u8);

impl LineErrors {
    pub const BREAK: Self = Self(0x01);
    pub const FRAMING: Self = Self(0x02);
    pub const OVERRUN: Self = Self(0x04);
    pub const PARITY: Self = Self(0x08);

    pub const fn empty() -> Self {
        Self(0)
    }

    pub const fn bits(self) -> u8 {
        self.0
    }

    pub const fn from_bits(bits: u8) -> Self {
        Self(bits & 0x0F)
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    /// Decode the chip's error mask (break 0x01, framing 0x02,
    /// hardware/queue overrun 0x04/0x08, parity 0x10)
    pub fn from_error_byte(byte: u8) -> Self {
        let mut errors = 0;
        if byte & 0x01 != 0 {
            errors |= Self::BREAK.0;
        }
        if byte & 0x02 != 0 {
            errors |= Self::FRAMING.0;
        }
        if byte & 0x0C != 0 {
            errors |= Self::OVERRUN.0;
        }
        if byte & 0x10 != 0 {
            errors |= Self::PARITY.0;
        }
        Self(errors)
    }
}

impl std::ops::BitOr for LineErrors {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl fmt::Display for LineErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return f.write_str("none");
        }
        let names = [
            (Self::BREAK, "break"),
            (Self::FRAMING, "framing"),
            (Self::OVERRUN, "overrun"),
            (Self::PARITY, "parity"),
        ];
        let mut first = true;
        for (flag, name) in names {
            if self.contains(flag) {
                if !first {
                    f.write_str("|")?;
                }
                f.write_str(name)?;
                first = false;
            }
        }
        Ok(())
    }
}

/// The 19-byte `GET_COMM_STATUS` answer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommStatus {
    raw: [u8; COMM_STATUS_LEN],
}

impl CommStatus {
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < COMM_STATUS_LEN {
            return Err(ProtocolError::ShortPayload {
                what: "comm status",
                expected: COMM_STATUS_LEN,
                actual: bytes.len(),
            });
        }
        let mut raw = [0u8; COMM_STATUS_LEN];
        raw.copy_from_slice(&bytes[..COMM_STATUS_LEN]);
        Ok(Self { raw })
    }

    pub fn raw(&self) -> &[u8; COMM_STATUS_LEN] {
        &self.raw
    }

    pub fn errors(&self) -> LineErrors {
        LineErrors::from_error_byte(self.raw[0])
    }

    /// Transmit is not held waiting for CTS
    pub fn cts_clear(&self) -> bool {
        self.raw[4] & 0x01 == 0
    }

    /// Transmit is not held waiting for DSR
    pub fn dsr_clear(&self) -> bool {
        self.raw[4] & 0x02 == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_modem_status_bits() {
        let status = ModemStatus(0x10);
        assert!(status.cts());
        assert!(!status.dsr());

        let status = ModemStatus(0x31);
        assert!(status.cts());
        assert!(status.dsr());

        assert!(ModemStatus::from_bytes(&[]).is_err());
        assert_eq!(ModemStatus::from_bytes(&[0x20]).unwrap(), ModemStatus(0x20));
    }

    #[test]
    fn test_line_errors_decoding() {
        assert!(LineErrors::from_error_byte(0x00).is_empty());
        assert_eq!(LineErrors::from_error_byte(0x01), LineErrors::BREAK);
        assert_eq!(LineErrors::from_error_byte(0x02), LineErrors::FRAMING);
        assert_eq!(LineErrors::from_error_byte(0x04), LineErrors::OVERRUN);
        assert_eq!(LineErrors::from_error_byte(0x08), LineErrors::OVERRUN);
        assert_eq!(LineErrors::from_error_byte(0x10), LineErrors::PARITY);

        let all = LineErrors::from_error_byte(0x1F);
        assert!(all.contains(LineErrors::BREAK | LineErrors::PARITY));
        assert_eq!(all.to_string(), "break|framing|overrun|parity");
        assert_eq!(LineErrors::empty().to_string(), "none");
    }

    #[test]
    fn test_comm_status_hold_reasons() {
        let mut raw = [0u8; COMM_STATUS_LEN];
        let status = CommStatus::from_bytes(&raw).unwrap();
        assert!(status.cts_clear());
        assert!(status.dsr_clear());

        raw[4] = 0x03;
        raw[0] = 0x02;
        let status = CommStatus::from_bytes(&raw).unwrap();
        assert!(!status.cts_clear());
        assert!(!status.dsr_clear());
        assert_eq!(status.errors(), LineErrors::FRAMING);
    }

    #[test]
    fn test_comm_status_too_short() {
        let err = CommStatus::from_bytes(&[0u8; 5]).unwrap_err();
        assert_eq!(
            err,
            ProtocolError::ShortPayload {
                what: "comm status",
                expected: COMM_STATUS_LEN,
                actual: 5,
            }
        );
    }
}
