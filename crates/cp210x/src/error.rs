//! Link error types

use protocol::ProtocolError;
use std::fmt;
use thiserror::Error;

/// Step of the open sequence that failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetupStage {
    ClaimInterface,
    UartEnable,
    BaudRate,
    LineControl,
    FlowControl,
    Handshake,
}

impl fmt::Display for SetupStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SetupStage::ClaimInterface => "claim interface",
            SetupStage::UartEnable => "UART enable",
            SetupStage::BaudRate => "baud rate",
            SetupStage::LineControl => "line control",
            SetupStage::FlowControl => "flow control",
            SetupStage::Handshake => "handshake lines",
        };
        f.write_str(name)
    }
}

/// Background thread of a link
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PumpKind {
    Read,
    Write,
    FlowPoll,
}

impl PumpKind {
    /// OS thread name
    pub fn thread_name(self) -> &'static str {
        match self {
            PumpKind::Read => "cp210x-read",
            PumpKind::Write => "cp210x-write",
            PumpKind::FlowPoll => "cp210x-flow",
        }
    }
}

impl fmt::Display for PumpKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PumpKind::Read => "read",
            PumpKind::Write => "write",
            PumpKind::FlowPoll => "flow-poll",
        };
        f.write_str(name)
    }
}

/// Fatal transport error that ended a pump
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{pump} pump stopped: {error}")]
pub struct PumpFault {
    pub pump: PumpKind,
    pub error: rusb::Error,
}

#[derive(Debug, Error)]
pub enum LinkError {
    #[error("Unsupported device {vendor_id:04x}:{product_id:04x}")]
    UnsupportedDevice { vendor_id: u16, product_id: u16 },

    #[error("No bulk IN/OUT endpoint pair on the first interface")]
    EndpointsNotFound,

    #[error("Setup failed at {stage}: {source}")]
    ProtocolSetup {
        stage: SetupStage,
        #[source]
        source: rusb::Error,
    },

    #[error("Link is not open")]
    NotOpen,

    #[error(transparent)]
    Faulted(PumpFault),

    #[error("USB transfer failed: {0}")]
    Transport(#[from] rusb::Error),

    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error(transparent)]
    Common(#[from] common::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, LinkError>;
