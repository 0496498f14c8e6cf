//! Line-control word encoding
//!
//! ```text
//!  15      12 11     8 7      4 3    2 1      0
//! +----------+--------+--------+------+--------+
//! | reserved | data   | parity | rsvd | stop   |
//! +----------+--------+--------+------+--------+
//! ```

use crate::error::{ProtocolError, Result};
use byteorder::{ByteOrder, LittleEndian};
use serde::{Deserialize, Serialize};

const DATA_BITS_MASK: u16 = 0x0F00;
const PARITY_MASK: u16 = 0x00F0;
const STOP_BITS_MASK: u16 = 0x0003;

/// Number of data bits per character
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DataBits {
    Five,
    Six,
    Seven,
    Eight,
}

impl DataBits {
    fn bits(self) -> u16 {
        match self {
            DataBits::Five => 5,
            DataBits::Six => 6,
            DataBits::Seven => 7,
            DataBits::Eight => 8,
        }
    }
}

impl TryFrom<u8> for DataBits {
    type Error = ProtocolError;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            5 => Ok(DataBits::Five),
            6 => Ok(DataBits::Six),
            7 => Ok(DataBits::Seven),
            8 => Ok(DataBits::Eight),
            _ => Err(ProtocolError::InvalidLineSetting {
                setting: "data bits",
                value,
            }),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Parity {
    None,
    Odd,
    Even,
    Mark,
    Space,
}

impl Parity {
    fn bits(self) -> u16 {
        match self {
            Parity::None => 0,
            Parity::Odd => 1,
            Parity::Even => 2,
            Parity::Mark => 3,
            Parity::Space => 4,
        }
    }
}

impl TryFrom<u8> for Parity {
    type Error = ProtocolError;

    /// 0 = none, 1 = odd, 2 = even, 3 = mark, 4 = space
    fn try_from(value: u8) -> Result<Self> {
        match value {
            0 => Ok(Parity::None),
            1 => Ok(Parity::Odd),
            2 => Ok(Parity::Even),
            3 => Ok(Parity::Mark),
            4 => Ok(Parity::Space),
            _ => Err(ProtocolError::InvalidLineSetting {
                setting: "parity",
                value,
            }),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StopBits {
    One,
    OnePointFive,
    Two,
}

impl StopBits {
    fn bits(self) -> u16 {
        match self {
            StopBits::One => 0,
            StopBits::OnePointFive => 1,
            StopBits::Two => 2,
        }
    }
}

impl TryFrom<u8> for StopBits {
    type Error = ProtocolError;

    /// 1 = one, 2 = two, 3 = one and a half
    fn try_from(value: u8) -> Result<Self> {
        match value {
            1 => Ok(StopBits::One),
            2 => Ok(StopBits::Two),
            3 => Ok(StopBits::OnePointFive),
            _ => Err(ProtocolError::InvalidLineSetting {
                setting: "stop bits",
                value,
            }),
        }
    }
}

/// The 16-bit line-control word as held by the chip
///
/// Setters only touch their own field, so a word read back from the device
/// keeps any bits this crate does not model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineControl(u16);

impl LineControl {
    /// 8 data bits, no parity, 1 stop bit
    pub const DEFAULT: Self = Self(0x0800);

    pub fn from_raw(raw: u16) -> Self {
        Self(raw)
    }

    /// Decode the 2-byte little-endian answer to a line-control query
    pub fn from_le_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < 2 {
            return Err(ProtocolError::ShortPayload {
                what: "line control",
                expected: 2,
                actual: bytes.len(),
            });
        }
        Ok(Self(LittleEndian::read_u16(bytes)))
    }

    pub fn raw(self) -> u16 {
        self.0
    }

    pub fn with_data_bits(self, data_bits: DataBits) -> Self {
        Self((self.0 & !DATA_BITS_MASK) | (data_bits.bits() << 8))
    }

    pub fn with_parity(self, parity: Parity) -> Self {
        Self((self.0 & !PARITY_MASK) | (parity.bits() << 4))
    }

    pub fn with_stop_bits(self, stop_bits: StopBits) -> Self {
        Self((self.0 & !STOP_BITS_MASK) | stop_bits.bits())
    }

    /// Data bits field, `None` if the device reports an undefined value
    pub fn data_bits(self) -> Option<DataBits> {
        DataBits::try_from(((self.0 & DATA_BITS_MASK) >> 8) as u8).ok()
    }

    pub fn parity(self) -> Option<Parity> {
        Parity::try_from(((self.0 & PARITY_MASK) >> 4) as u8).ok()
    }

    pub fn stop_bits(self) -> Option<StopBits> {
        match self.0 & STOP_BITS_MASK {
            0 => Some(StopBits::One),
            1 => Some(StopBits::OnePointFive),
            2 => Some(StopBits::Two),
            _ => None,
        }
    }
}

impl Default for LineControl {
    fn default() -> Self {
        Self::DEFAULT
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_8n1() {
        let word = LineControl::DEFAULT;
        assert_eq!(word.raw(), 0x0800);
        assert_eq!(word.data_bits(), Some(DataBits::Eight));
        assert_eq!(word.parity(), Some(Parity::None));
        assert_eq!(word.stop_bits(), Some(StopBits::One));
    }

    #[test]
    fn test_setters_preserve_other_fields() {
        // bits 2..3 and 12..15 are not modelled and must survive
        let word = LineControl::from_raw(0xF80C);
        let word = word.with_data_bits(DataBits::Five);
        assert_eq!(word.raw(), 0xF50C);
        let word = word.with_parity(Parity::Space);
        assert_eq!(word.raw(), 0xF54C);
        let word = word.with_stop_bits(StopBits::OnePointFive);
        assert_eq!(word.raw(), 0xF54D);
    }

    #[test]
    fn test_from_le_bytes() {
        let word = LineControl::from_le_bytes(&[0x00, 0x08]).unwrap();
        assert_eq!(word, LineControl::DEFAULT);

        let err = LineControl::from_le_bytes(&[0x08]).unwrap_err();
        assert!(matches!(err, ProtocolError::ShortPayload { actual: 1, .. }));
    }

    #[test]
    fn test_raw_conversions_reject_unknown_values() {
        assert_eq!(DataBits::try_from(7).unwrap(), DataBits::Seven);
        assert!(DataBits::try_from(4).is_err());
        assert!(DataBits::try_from(9).is_err());

        assert_eq!(Parity::try_from(4).unwrap(), Parity::Space);
        assert!(Parity::try_from(5).is_err());

        assert_eq!(StopBits::try_from(3).unwrap(), StopBits::OnePointFive);
        assert!(StopBits::try_from(0).is_err());
    }

    #[test]
    fn test_undefined_stop_field_decodes_as_none() {
        assert_eq!(LineControl::from_raw(0x0803).stop_bits(), None);
        assert_eq!(LineControl::from_raw(0x0F00).data_bits(), None);
    }
}
