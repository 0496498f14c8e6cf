//! Vendor request codes and host-to-device command construction
//!
//! Every command is a vendor control transfer addressed to the interface
//! (`wIndex` = interface number). Small settings travel in `wValue`, larger
//! ones (baud rate, flow control, special characters) in the data stage.

use crate::flow::{FlowControl, SpecialChars};
use crate::line::LineControl;
use byteorder::{ByteOrder, LittleEndian};

/// Silicon Labs vendor ID
pub const VENDOR_ID: u16 = 0x10C4;

/// CP210x UART bridge product ID
pub const PRODUCT_ID: u16 = 0xEA60;

/// Vendor | interface | host-to-device
pub const REQTYPE_HOST_TO_DEVICE: u8 = 0x41;

/// Vendor | interface | device-to-host
pub const REQTYPE_DEVICE_TO_HOST: u8 = 0xC1;

/// Baud rate programmed when nothing else is configured
pub const DEFAULT_BAUD_RATE: u32 = 9600;

pub(crate) const UART_ENABLE: u16 = 0x0001;
pub(crate) const UART_DISABLE: u16 = 0x0000;
pub(crate) const BREAK_ON: u16 = 0x0001;
pub(crate) const BREAK_OFF: u16 = 0x0000;
pub(crate) const MHS_DEFAULT: u16 = 0x0000;
pub(crate) const MHS_DTR_ON: u16 = 0x0101;
pub(crate) const MHS_DTR_OFF: u16 = 0x0100;
pub(crate) const MHS_RTS_ON: u16 = 0x0202;
pub(crate) const MHS_RTS_OFF: u16 = 0x0200;
pub(crate) const PURGE_READ: u16 = 0x000A;
pub(crate) const PURGE_WRITE: u16 = 0x0005;

/// Check whether a vendor/product pair identifies a supported bridge
pub fn is_supported_device(vendor_id: u16, product_id: u16) -> bool {
    vendor_id == VENDOR_ID && product_id == PRODUCT_ID
}

/// CP210x vendor request codes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Request {
    /// Enable or disable the UART
    IfcEnable = 0x00,
    /// Legacy divisor-based baud setting
    SetBaudDiv = 0x01,
    SetLineCtl = 0x03,
    GetLineCtl = 0x04,
    SetBreak = 0x05,
    /// Modem handshake lines (DTR/RTS)
    SetMhs = 0x07,
    GetModemStatus = 0x08,
    SetXon = 0x09,
    SetXoff = 0x0A,
    GetCommStatus = 0x10,
    Purge = 0x12,
    SetFlow = 0x13,
    SetChars = 0x19,
    SetBaudRate = 0x1E,
}

impl Request {
    /// Raw `bRequest` value
    pub fn code(self) -> u8 {
        self as u8
    }
}

/// Modem handshake line driven by [`ControlOut::handshake`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandshakeLine {
    Dtr,
    Rts,
}

/// A host-to-device vendor command
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControlOut {
    pub request: Request,
    pub value: u16,
    pub data: Vec<u8>,
}

impl ControlOut {
    fn new(request: Request, value: u16) -> Self {
        Self {
            request,
            value,
            data: Vec::new(),
        }
    }

    fn with_data(request: Request, data: Vec<u8>) -> Self {
        Self {
            request,
            value: 0,
            data,
        }
    }

    /// Enable or disable the UART
    pub fn uart(enable: bool) -> Self {
        Self::new(
            Request::IfcEnable,
            if enable { UART_ENABLE } else { UART_DISABLE },
        )
    }

    /// Program the baud rate as a 4-byte little-endian payload
    pub fn baud_rate(rate: u32) -> Self {
        let mut data = vec![0u8; 4];
        LittleEndian::write_u32(&mut data, rate);
        Self::with_data(Request::SetBaudRate, data)
    }

    /// Write the full line-control word
    pub fn line_control(word: LineControl) -> Self {
        Self::new(Request::SetLineCtl, word.raw())
    }

    /// Send the 16-byte flow-control template
    pub fn flow_control(mode: FlowControl) -> Self {
        Self::with_data(Request::SetFlow, mode.payload().to_vec())
    }

    /// Send the special characters table (XON/XOFF)
    pub fn special_chars(chars: SpecialChars) -> Self {
        Self::with_data(Request::SetChars, chars.payload().to_vec())
    }

    /// Drive a single handshake line, leaving the other one untouched
    pub fn handshake(line: HandshakeLine, on: bool) -> Self {
        let value = match (line, on) {
            (HandshakeLine::Dtr, true) => MHS_DTR_ON,
            (HandshakeLine::Dtr, false) => MHS_DTR_OFF,
            (HandshakeLine::Rts, true) => MHS_RTS_ON,
            (HandshakeLine::Rts, false) => MHS_RTS_OFF,
        };
        Self::new(Request::SetMhs, value)
    }

    /// Reset the handshake lines to their power-on default
    pub fn handshake_default() -> Self {
        Self::new(Request::SetMhs, MHS_DEFAULT)
    }

    pub fn break_state(on: bool) -> Self {
        Self::new(Request::SetBreak, if on { BREAK_ON } else { BREAK_OFF })
    }

    /// Purge the chip's receive and/or transmit FIFOs
    ///
    /// Returns `None` when neither direction is selected.
    pub fn purge(rx: bool, tx: bool) -> Option<Self> {
        let mut value = 0;
        if rx {
            value |= PURGE_READ;
        }
        if tx {
            value |= PURGE_WRITE;
        }
        (value != 0).then(|| Self::new(Request::Purge, value))
    }
}

/// A device-to-host vendor query
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControlIn {
    pub request: Request,
    pub length: usize,
}

impl ControlIn {
    pub const LINE_CONTROL: Self = Self {
        request: Request::GetLineCtl,
        length: 2,
    };

    pub const MODEM_STATUS: Self = Self {
        request: Request::GetModemStatus,
        length: 1,
    };

    pub const COMM_STATUS: Self = Self {
        request: Request::GetCommStatus,
        length: crate::status::COMM_STATUS_LEN,
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_codes() {
        assert_eq!(Request::IfcEnable.code(), 0x00);
        assert_eq!(Request::SetLineCtl.code(), 0x03);
        assert_eq!(Request::GetLineCtl.code(), 0x04);
        assert_eq!(Request::SetMhs.code(), 0x07);
        assert_eq!(Request::GetModemStatus.code(), 0x08);
        assert_eq!(Request::GetCommStatus.code(), 0x10);
        assert_eq!(Request::Purge.code(), 0x12);
        assert_eq!(Request::SetFlow.code(), 0x13);
        assert_eq!(Request::SetChars.code(), 0x19);
        assert_eq!(Request::SetBaudRate.code(), 0x1E);
    }

    #[test]
    fn test_baud_rate_payload() {
        let cmd = ControlOut::baud_rate(115_200);
        assert_eq!(cmd.value, 0);
        assert_eq!(cmd.data, vec![0x00, 0xC2, 0x01, 0x00]);

        let cmd = ControlOut::baud_rate(DEFAULT_BAUD_RATE);
        assert_eq!(cmd.data, vec![0x80, 0x25, 0x00, 0x00]);
    }

    #[test]
    fn test_uart_enable_disable() {
        assert_eq!(ControlOut::uart(true).value, 0x0001);
        assert_eq!(ControlOut::uart(false).value, 0x0000);
        assert!(ControlOut::uart(true).data.is_empty());
    }

    #[test]
    fn test_handshake_values() {
        assert_eq!(ControlOut::handshake(HandshakeLine::Dtr, true).value, 0x0101);
        assert_eq!(ControlOut::handshake(HandshakeLine::Dtr, false).value, 0x0100);
        assert_eq!(ControlOut::handshake(HandshakeLine::Rts, true).value, 0x0202);
        assert_eq!(ControlOut::handshake(HandshakeLine::Rts, false).value, 0x0200);
        assert_eq!(ControlOut::handshake_default().value, 0x0000);
    }

    #[test]
    fn test_purge_values() {
        assert_eq!(ControlOut::purge(true, true).map(|c| c.value), Some(0x000F));
        assert_eq!(ControlOut::purge(true, false).map(|c| c.value), Some(0x000A));
        assert_eq!(ControlOut::purge(false, true).map(|c| c.value), Some(0x0005));
        assert!(ControlOut::purge(false, false).is_none());
    }

    #[test]
    fn test_supported_device() {
        assert!(is_supported_device(0x10C4, 0xEA60));
        assert!(!is_supported_device(0x10C4, 0xEA70));
        assert!(!is_supported_device(0x0403, 0x6001));
    }
}
