//! User-space driver for CP210x USB-to-UART bridges
//!
//! The driver turns a raw USB handle into a byte stream. A [`SerialLink`]
//! configures the chip through vendor control transfers and, when opened in
//! [`OpenMode::Async`], runs background pump threads that move bytes between
//! the bulk endpoints and in-memory RX/TX buffers:
//!
//! ```text
//! write() ──► TX buffer ──► write pump ──► bulk OUT ──► CP210x
//! read()  ◄── RX buffer ◄── read pump  ◄── bulk IN  ◄── CP210x
//! ```
//!
//! The USB handle is injected through the [`Transport`] trait, implemented
//! for `rusb` by [`RusbTransport`]. How the handle is obtained (device
//! enumeration, Android file descriptors) is left to the caller.
//!
//! # Example
//!
//! ```no_run
//! use cp210x::{LinkConfig, OpenMode, RusbTransport, SerialLink};
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let handle = rusb::open_device_with_vid_pid(0x10C4, 0xEA60).ok_or("no device")?;
//! let transport = Arc::new(RusbTransport::new(handle));
//!
//! let config = LinkConfig { baud_rate: 115_200, ..LinkConfig::default() };
//! let mut link = SerialLink::new(transport, config)?;
//! link.open(OpenMode::Async)?;
//!
//! link.write(b"*IDN?\n")?;
//! let line = link.read_until(b"\n", None, Some(Duration::from_secs(1)))?;
//! println!("{}", String::from_utf8_lossy(&line));
//!
//! link.close()?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod endpoint;
pub mod error;
pub mod link;
pub mod test_utils;
pub mod transport;

pub use config::{Config, LineSettings, LinkConfig, LoggingSettings};
pub use endpoint::{EndpointDescriptor, EndpointPair};
pub use error::{LinkError, PumpFault, PumpKind, Result, SetupStage};
pub use link::{OpenMode, SerialLink};
pub use transport::{RusbTransport, Transport};

pub use protocol::{DataBits, FlowControl, LineControl, LineErrors, Parity, StopBits};
