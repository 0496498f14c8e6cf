//! Bulk endpoint resolution

use crate::error::{LinkError, Result};
use rusb::{Direction, TransferType};

/// One endpoint of the data interface
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EndpointDescriptor {
    pub address: u8,
    pub direction: Direction,
    pub transfer_type: TransferType,
    pub max_packet_size: u16,
}

impl EndpointDescriptor {
    pub fn bulk_in(address: u8, max_packet_size: u16) -> Self {
        Self {
            address,
            direction: Direction::In,
            transfer_type: TransferType::Bulk,
            max_packet_size,
        }
    }

    pub fn bulk_out(address: u8, max_packet_size: u16) -> Self {
        Self {
            address,
            direction: Direction::Out,
            transfer_type: TransferType::Bulk,
            max_packet_size,
        }
    }

    /// Largest single transfer, never below one byte
    pub fn packet_len(&self) -> usize {
        usize::from(self.max_packet_size.max(1))
    }
}

/// The bulk IN/OUT pair carrying UART data
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EndpointPair {
    pub bulk_in: EndpointDescriptor,
    pub bulk_out: EndpointDescriptor,
}

impl EndpointPair {
    /// Pick the first bulk endpoint of each direction, whatever order the
    /// device lists them in
    pub fn select(endpoints: &[EndpointDescriptor]) -> Result<Self> {
        let first = |direction| {
            endpoints
                .iter()
                .find(|ep| ep.transfer_type == TransferType::Bulk && ep.direction == direction)
                .copied()
        };

        match (first(Direction::In), first(Direction::Out)) {
            (Some(bulk_in), Some(bulk_out)) => Ok(Self { bulk_in, bulk_out }),
            _ => Err(LinkError::EndpointsNotFound),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_select_in_listed_first() {
        let eps = [
            EndpointDescriptor::bulk_in(0x82, 64),
            EndpointDescriptor::bulk_out(0x01, 64),
        ];
        let pair = EndpointPair::select(&eps).unwrap();
        assert_eq!(pair.bulk_in.address, 0x82);
        assert_eq!(pair.bulk_out.address, 0x01);
    }

    #[test]
    fn test_select_out_listed_first() {
        let eps = [
            EndpointDescriptor::bulk_out(0x01, 64),
            EndpointDescriptor::bulk_in(0x81, 32),
        ];
        let pair = EndpointPair::select(&eps).unwrap();
        assert_eq!(pair.bulk_in.address, 0x81);
        assert_eq!(pair.bulk_in.packet_len(), 32);
        assert_eq!(pair.bulk_out.address, 0x01);
    }

    #[test]
    fn test_select_skips_interrupt_endpoints() {
        let mut interrupt = EndpointDescriptor::bulk_in(0x83, 8);
        interrupt.transfer_type = TransferType::Interrupt;
        let eps = [
            interrupt,
            EndpointDescriptor::bulk_in(0x82, 64),
            EndpointDescriptor::bulk_out(0x02, 64),
        ];
        assert_eq!(EndpointPair::select(&eps).unwrap().bulk_in.address, 0x82);
    }

    #[test]
    fn test_select_missing_direction() {
        let eps = [EndpointDescriptor::bulk_in(0x82, 64)];
        assert!(matches!(
            EndpointPair::select(&eps),
            Err(LinkError::EndpointsNotFound)
        ));
    }

    #[test]
    fn test_packet_len_floor() {
        assert_eq!(EndpointDescriptor::bulk_out(0x01, 0).packet_len(), 1);
    }
}
