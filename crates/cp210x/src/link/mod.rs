//! The serial link over a CP210x bridge
//!
//! A [`SerialLink`] is either closed or open. Opening claims the interface
//! and programs the chip; in [`OpenMode::Async`] it also starts the read and
//! write pumps that connect the bulk endpoints to the RX/TX buffers.
//!
//! State reachable from background threads lives in `Shared`, which the
//! pumps hold through an `Arc`. The link itself owns the pump handles, so
//! nothing points back from a pump to its link.

mod control;
mod direct;
mod pumps;
mod stream;

use crate::config::LinkConfig;
use crate::endpoint::EndpointPair;
use crate::error::{LinkError, PumpFault, PumpKind, Result, SetupStage};
use crate::transport::Transport;
use common::{ByteBuffer, Worker, hex_line};
use protocol::{
    CommStatus, ControlIn, ControlOut, FlowControl, LineControl, LineErrors, ModemStatus,
    REQTYPE_DEVICE_TO_HOST, REQTYPE_HOST_TO_DEVICE,
};
use std::sync::atomic::{AtomicBool, AtomicU8, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tracing::{Span, debug, error, info, info_span, trace, warn};

/// How [`SerialLink::open`] moves data
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenMode {
    /// No background threads; use the `*_sync` transfer calls
    Sync,
    /// Read and write pumps feed the RX/TX buffers
    Async,
}

/// Link state shared with the pump threads
pub(crate) struct Shared<T> {
    pub(crate) transport: Arc<T>,
    pub(crate) interface: u8,
    control_timeout: Duration,
    control_lock: Mutex<()>,
    pub(crate) rx: ByteBuffer,
    pub(crate) tx: ByteBuffer,
    pub(crate) open: Arc<AtomicBool>,
    pub(crate) rts_cts_enabled: AtomicBool,
    pub(crate) dtr_dsr_enabled: AtomicBool,
    pub(crate) cts: AtomicBool,
    pub(crate) dsr: AtomicBool,
    line_errors: AtomicU8,
    faults: Mutex<Vec<PumpFault>>,
    lost_bytes: AtomicU64,
}

impl<T: Transport> Shared<T> {
    fn new(transport: Arc<T>, config: &LinkConfig) -> Self {
        Self {
            transport,
            interface: config.interface,
            control_timeout: config.control_timeout(),
            control_lock: Mutex::new(()),
            rx: ByteBuffer::new(),
            tx: ByteBuffer::new(),
            open: Arc::new(AtomicBool::new(false)),
            rts_cts_enabled: AtomicBool::new(false),
            dtr_dsr_enabled: AtomicBool::new(false),
            cts: AtomicBool::new(false),
            dsr: AtomicBool::new(false),
            line_errors: AtomicU8::new(0),
            faults: Mutex::new(Vec::new()),
            lost_bytes: AtomicU64::new(0),
        }
    }

    pub(crate) fn is_open(&self) -> bool {
        self.open.load(Ordering::Acquire)
    }

    /// Issue a host-to-device vendor command
    pub(crate) fn send(&self, command: &ControlOut) -> rusb::Result<usize> {
        let _guard = self.control_lock.lock().unwrap_or_else(PoisonError::into_inner);
        trace!(
            "control out {:?} value={:#06x} data=[{}]",
            command.request,
            command.value,
            hex_line(&command.data)
        );
        self.transport.write_control(
            REQTYPE_HOST_TO_DEVICE,
            command.request.code(),
            command.value,
            u16::from(self.interface),
            &command.data,
            self.control_timeout,
        )
    }

    /// Issue a device-to-host vendor query, returning the bytes received
    pub(crate) fn query(&self, query: ControlIn) -> rusb::Result<Vec<u8>> {
        let mut buf = vec![0u8; query.length];
        let len = {
            let _guard = self.control_lock.lock().unwrap_or_else(PoisonError::into_inner);
            self.transport.read_control(
                REQTYPE_DEVICE_TO_HOST,
                query.request.code(),
                0,
                u16::from(self.interface),
                &mut buf,
                self.control_timeout,
            )?
        };
        buf.truncate(len);
        trace!("control in {:?} -> [{}]", query.request, hex_line(&buf));
        Ok(buf)
    }

    pub(crate) fn line_control(&self) -> Result<LineControl> {
        let bytes = self.query(ControlIn::LINE_CONTROL)?;
        Ok(LineControl::from_le_bytes(&bytes)?)
    }

    pub(crate) fn modem_status(&self) -> Result<ModemStatus> {
        let bytes = self.query(ControlIn::MODEM_STATUS)?;
        Ok(ModemStatus::from_bytes(&bytes)?)
    }

    pub(crate) fn comm_status(&self) -> Result<CommStatus> {
        let bytes = self.query(ControlIn::COMM_STATUS)?;
        Ok(CommStatus::from_bytes(&bytes)?)
    }

    /// Fold one flow-poll sample into the link state
    pub(crate) fn apply_status(&self, modem: ModemStatus, comm: CommStatus) {
        if self.rts_cts_enabled.load(Ordering::Acquire) {
            let cts = modem.cts();
            if self.cts.swap(cts, Ordering::AcqRel) != cts {
                debug!("CTS changed: {}", cts);
            }
        }
        if self.dtr_dsr_enabled.load(Ordering::Acquire) {
            let dsr = modem.dsr();
            if self.dsr.swap(dsr, Ordering::AcqRel) != dsr {
                debug!("DSR changed: {}", dsr);
            }
        }

        let errors = comm.errors();
        self.line_errors.store(errors.bits(), Ordering::Release);
        if !errors.is_empty() {
            warn!("Line errors reported: {}", errors);
        }
    }

    pub(crate) fn line_errors(&self) -> LineErrors {
        LineErrors::from_bits(self.line_errors.load(Ordering::Acquire))
    }

    pub(crate) fn record_fault(&self, pump: PumpKind, error: rusb::Error) {
        error!("{} pump failed: {}", pump, error);
        let mut faults = self.faults.lock().unwrap_or_else(PoisonError::into_inner);
        if !faults.iter().any(|f| f.pump == pump) {
            faults.push(PumpFault { pump, error });
        }
    }

    pub(crate) fn fault_of(&self, pump: PumpKind) -> Option<PumpFault> {
        let faults = self.faults.lock().unwrap_or_else(PoisonError::into_inner);
        faults.iter().find(|f| f.pump == pump).cloned()
    }

    fn first_fault(&self) -> Option<PumpFault> {
        let faults = self.faults.lock().unwrap_or_else(PoisonError::into_inner);
        faults.first().cloned()
    }

    fn clear_faults(&self) {
        self.faults
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    pub(crate) fn add_lost_bytes(&self, count: usize) {
        self.lost_bytes.fetch_add(count as u64, Ordering::Relaxed);
    }
}

/// A CP210x UART exposed as a buffered byte stream
///
/// Control calls and the stream API take `&self`, so a link wrapped in an
/// `Arc` can be read from one thread while another writes. Calls that start
/// or stop background threads (`open`, `close`, `set_flow_control`) take
/// `&mut self`.
pub struct SerialLink<T: Transport> {
    shared: Arc<Shared<T>>,
    config: LinkConfig,
    endpoints: EndpointPair,
    baud_rate: u32,
    is_async: bool,
    read_pump: Option<Worker<rusb::Error>>,
    write_pump: Option<Worker<rusb::Error>>,
    flow_pump: Option<Worker<rusb::Error>>,
    span: Span,
}

impl<T: Transport> SerialLink<T> {
    /// Wrap an opened device handle
    ///
    /// The device must identify as a CP210x. The bulk endpoint pair is
    /// resolved here, once; no USB traffic beyond descriptor reads happens
    /// until [`open`](Self::open).
    pub fn new(transport: Arc<T>, config: LinkConfig) -> Result<Self> {
        config.validate()?;

        let (vendor_id, product_id) = transport.device_ids()?;
        if !protocol::is_supported_device(vendor_id, product_id) {
            return Err(LinkError::UnsupportedDevice {
                vendor_id,
                product_id,
            });
        }

        let endpoints = EndpointPair::select(&transport.endpoints()?)?;
        let span = info_span!("cp210x", interface = config.interface);
        span.in_scope(|| {
            debug!(
                "Endpoints: in {:#04x} ({} bytes), out {:#04x} ({} bytes)",
                endpoints.bulk_in.address,
                endpoints.bulk_in.max_packet_size,
                endpoints.bulk_out.address,
                endpoints.bulk_out.max_packet_size
            );
        });

        Ok(Self {
            shared: Arc::new(Shared::new(transport, &config)),
            baud_rate: config.baud_rate,
            config,
            endpoints,
            is_async: false,
            read_pump: None,
            write_pump: None,
            flow_pump: None,
            span,
        })
    }

    /// Claim the interface, program the UART and, in async mode, start the
    /// data pumps
    ///
    /// Opening an open link does nothing. On failure the link stays closed
    /// and the error names the step that failed.
    pub fn open(&mut self, mode: OpenMode) -> Result<()> {
        let span = self.span.clone();
        let _entered = span.enter();

        if self.is_open() {
            debug!("Link already open");
            return Ok(());
        }

        self.configure_uart()?;

        self.shared.clear_faults();
        self.shared.open.store(true, Ordering::Release);

        if mode == OpenMode::Async {
            if let Err(e) = self.start_data_pumps() {
                self.stop_data_pumps();
                self.shared.open.store(false, Ordering::Release);
                return Err(e);
            }
            self.is_async = true;
        }

        info!("Opened at {} baud ({:?})", self.baud_rate, mode);
        Ok(())
    }

    fn configure_uart(&mut self) -> Result<()> {
        fn at(stage: SetupStage) -> impl FnOnce(rusb::Error) -> LinkError {
            move |source| LinkError::ProtocolSetup { stage, source }
        }

        let shared = &self.shared;
        shared
            .transport
            .claim_interface(shared.interface)
            .map_err(at(SetupStage::ClaimInterface))?;
        shared
            .send(&ControlOut::uart(true))
            .map_err(at(SetupStage::UartEnable))?;
        shared
            .send(&ControlOut::baud_rate(self.baud_rate))
            .map_err(at(SetupStage::BaudRate))?;
        shared
            .send(&ControlOut::line_control(LineControl::DEFAULT))
            .map_err(at(SetupStage::LineControl))?;
        self.disable_flow_control()
            .map_err(at(SetupStage::FlowControl))?;
        self.shared
            .send(&ControlOut::handshake_default())
            .map_err(at(SetupStage::Handshake))?;
        Ok(())
    }

    /// Stop all threads, purge and disable the UART, then claim or release
    /// the interface
    ///
    /// Closing a closed link does nothing. Every teardown step runs even if
    /// an earlier one fails; the first failure is returned once the link is
    /// marked closed.
    pub fn close(&mut self) -> Result<()> {
        let span = self.span.clone();
        let _entered = span.enter();

        if !self.is_open() {
            return Ok(());
        }

        self.stop_data_pumps();
        self.stop_flow_pump();

        let purge = self.purge_hw_buffers(true, true);
        let disable = self.shared.send(&ControlOut::uart(false)).map(|_| ());
        let interface = if self.config.release_on_close {
            self.shared.transport.release_interface(self.shared.interface)
        } else {
            self.shared.transport.claim_interface(self.shared.interface)
        };

        self.shared.open.store(false, Ordering::Release);
        self.is_async = false;

        let result = purge
            .and(disable.map_err(LinkError::from))
            .and(interface.map_err(LinkError::from));
        match &result {
            Ok(()) => info!("Closed"),
            Err(e) => warn!("Closed with error: {}", e),
        }
        result
    }

    pub fn is_open(&self) -> bool {
        self.shared.is_open()
    }

    /// Whether the data pumps were started by the last open
    pub fn is_async(&self) -> bool {
        self.is_async
    }

    pub fn config(&self) -> &LinkConfig {
        &self.config
    }

    pub fn endpoints(&self) -> &EndpointPair {
        &self.endpoints
    }

    /// Currently programmed baud rate
    pub fn baud_rate(&self) -> u32 {
        self.baud_rate
    }

    /// Last CTS level seen while RTS/CTS flow control is enabled
    pub fn cts(&self) -> bool {
        self.shared.cts.load(Ordering::Acquire)
    }

    /// Last DSR level seen while DSR/DTR flow control is enabled
    pub fn dsr(&self) -> bool {
        self.shared.dsr.load(Ordering::Acquire)
    }

    /// Hardware flow mode the chip last accepted, `Off` when neither is on
    pub fn hardware_flow(&self) -> FlowControl {
        if self.shared.rts_cts_enabled.load(Ordering::Acquire) {
            FlowControl::RtsCts
        } else if self.shared.dtr_dsr_enabled.load(Ordering::Acquire) {
            FlowControl::DsrDtr
        } else {
            FlowControl::Off
        }
    }

    /// Line errors from the most recent flow-poll sample
    pub fn line_errors(&self) -> LineErrors {
        self.shared.line_errors()
    }

    /// The first pump fault since the last open, if any
    pub fn fault(&self) -> Option<PumpFault> {
        self.shared.first_fault()
    }

    /// Bytes dropped by short bulk-out writes
    pub fn lost_bytes(&self) -> u64 {
        self.shared.lost_bytes.load(Ordering::Relaxed)
    }

    /// Bytes waiting in the RX buffer
    pub fn rx_len(&self) -> usize {
        self.shared.rx.len()
    }

    /// Bytes waiting in the TX buffer
    pub fn tx_len(&self) -> usize {
        self.shared.tx.len()
    }

    /// Send the OFF template and drop both hardware flow modes
    fn disable_flow_control(&mut self) -> rusb::Result<()> {
        self.shared.rts_cts_enabled.store(false, Ordering::Release);
        self.shared.dtr_dsr_enabled.store(false, Ordering::Release);
        self.stop_flow_pump();
        self.shared
            .send(&ControlOut::flow_control(FlowControl::Off))
            .map(|_| ())
    }
}

impl<T: Transport> Drop for SerialLink<T> {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            warn!("Error closing link on drop: {}", e);
        }
    }
}
