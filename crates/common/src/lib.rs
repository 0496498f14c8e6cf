//! Common utilities for the CP210x driver
//!
//! This crate provides the hardware-independent building blocks shared by
//! the driver: the thread-safe [`ByteBuffer`] that decouples pump threads
//! from callers, the [`Deadline`] wait budget, the stoppable [`Worker`]
//! loop, error handling and logging setup.

pub mod buffer;
pub mod deadline;
pub mod error;
pub mod logging;
pub mod test_utils;
pub mod worker;

pub use buffer::ByteBuffer;
pub use deadline::Deadline;
pub use error::{Error, Result};
pub use logging::{RXTX_TARGET, default_filter, hex_line, setup_logging};
pub use worker::Worker;
