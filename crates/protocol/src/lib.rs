//! CP210x vendor control protocol
//!
//! This crate defines the control-transfer protocol spoken by Silicon Labs
//! CP210x USB-to-UART bridges. It is pure encoding and decoding: every
//! host-to-device command is described by a [`ControlOut`] value and every
//! device-to-host query by a [`ControlIn`], which the driver hands to its
//! USB transport. Nothing in here performs I/O.
//!
//! # Example
//!
//! ```
//! use protocol::{ControlOut, Request};
//!
//! let cmd = ControlOut::baud_rate(115_200);
//! assert_eq!(cmd.request, Request::SetBaudRate);
//! assert_eq!(cmd.data, vec![0x00, 0xC2, 0x01, 0x00]);
//! ```
//!
//! # Line control
//!
//! ```
//! use protocol::{DataBits, LineControl, Parity, StopBits};
//!
//! let word = LineControl::DEFAULT
//!     .with_data_bits(DataBits::Seven)
//!     .with_parity(Parity::Even)
//!     .with_stop_bits(StopBits::Two);
//! assert_eq!(word.raw(), 0x0722);
//! ```

pub mod error;
pub mod flow;
pub mod line;
pub mod requests;
pub mod status;

pub use error::{ProtocolError, Result};
pub use flow::{FlowControl, SpecialChars};
pub use line::{DataBits, LineControl, Parity, StopBits};
pub use requests::{
    ControlIn, ControlOut, DEFAULT_BAUD_RATE, HandshakeLine, PRODUCT_ID, REQTYPE_DEVICE_TO_HOST,
    REQTYPE_HOST_TO_DEVICE, Request, VENDOR_ID, is_supported_device,
};
pub use status::{COMM_STATUS_LEN, CommStatus, LineErrors, ModemStatus};
