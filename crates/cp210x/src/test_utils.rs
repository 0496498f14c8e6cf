//! Recording mock of the USB transport
//!
//! [`MockTransport`] behaves like a CP210x that answers every request: it
//! records control transfers and interface calls in order, keeps a
//! line-control word that `SET_LINE_CTL` updates, serves scripted bulk-in
//! packets and collects bulk-out bytes.
//!
//! # Example
//!
//! ```
//! use cp210x::test_utils::MockTransport;
//! use cp210x::{LinkConfig, OpenMode, SerialLink};
//! use std::sync::Arc;
//!
//! let mock = Arc::new(MockTransport::new());
//! let mut link = SerialLink::new(mock.clone(), LinkConfig::default()).unwrap();
//! link.open(OpenMode::Sync).unwrap();
//! assert!(mock.claimed(0));
//! ```

use crate::endpoint::EndpointDescriptor;
use crate::transport::Transport;
use protocol::{COMM_STATUS_LEN, LineControl, PRODUCT_ID, Request, VENDOR_ID};
use std::collections::{HashMap, VecDeque};
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

/// Bulk IN endpoint address of the mock
pub const MOCK_IN_EP: u8 = 0x82;
/// Bulk OUT endpoint address of the mock
pub const MOCK_OUT_EP: u8 = 0x01;
/// Max packet size of both mock endpoints
pub const MOCK_PACKET_SIZE: u16 = 64;

/// One call observed by the mock
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    Claim(u8),
    Release(u8),
    ControlOut {
        request_type: u8,
        request: u8,
        value: u16,
        index: u16,
        data: Vec<u8>,
    },
    ControlIn {
        request_type: u8,
        request: u8,
        index: u16,
        length: usize,
    },
}

impl TransportEvent {
    /// The request code of a control transfer
    pub fn request(&self) -> Option<u8> {
        match self {
            TransportEvent::ControlOut { request, .. }
            | TransportEvent::ControlIn { request, .. } => Some(*request),
            _ => None,
        }
    }
}

#[derive(Debug)]
struct MockState {
    events: Vec<TransportEvent>,
    claimed: Vec<u8>,
    bulk_in: VecDeque<rusb::Result<Vec<u8>>>,
    bulk_out: Vec<u8>,
    write_script: VecDeque<rusb::Result<usize>>,
    control_failures: HashMap<u8, rusb::Error>,
    claim_failure: Option<rusb::Error>,
    line_control: u16,
    modem_status: u8,
    comm_status: [u8; COMM_STATUS_LEN],
}

/// In-memory [`Transport`] for tests
#[derive(Debug)]
pub struct MockTransport {
    vendor_id: u16,
    product_id: u16,
    endpoints: Vec<EndpointDescriptor>,
    state: Mutex<MockState>,
    changed: Condvar,
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl MockTransport {
    /// A CP210x with endpoints 0x82 (in) and 0x01 (out)
    pub fn new() -> Self {
        Self::with_ids(VENDOR_ID, PRODUCT_ID)
    }

    pub fn with_ids(vendor_id: u16, product_id: u16) -> Self {
        Self {
            vendor_id,
            product_id,
            endpoints: vec![
                EndpointDescriptor::bulk_in(MOCK_IN_EP, MOCK_PACKET_SIZE),
                EndpointDescriptor::bulk_out(MOCK_OUT_EP, MOCK_PACKET_SIZE),
            ],
            state: Mutex::new(MockState {
                events: Vec::new(),
                claimed: Vec::new(),
                bulk_in: VecDeque::new(),
                bulk_out: Vec::new(),
                write_script: VecDeque::new(),
                control_failures: HashMap::new(),
                claim_failure: None,
                line_control: LineControl::DEFAULT.raw(),
                modem_status: 0,
                comm_status: [0; COMM_STATUS_LEN],
            }),
            changed: Condvar::new(),
        }
    }

    /// Replace the endpoint list reported by the device
    pub fn with_endpoints(mut self, endpoints: Vec<EndpointDescriptor>) -> Self {
        self.endpoints = endpoints;
        self
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Queue a packet for the next bulk-in read
    pub fn push_bulk_in(&self, data: &[u8]) {
        self.lock().bulk_in.push_back(Ok(data.to_vec()));
        self.changed.notify_all();
    }

    /// Make a future bulk-in read fail, after the packets already queued
    pub fn push_bulk_in_error(&self, error: rusb::Error) {
        self.lock().bulk_in.push_back(Err(error));
        self.changed.notify_all();
    }

    /// Accept at most `accepted` bytes on the next scripted bulk-out write
    pub fn limit_next_write(&self, accepted: usize) {
        self.lock().write_script.push_back(Ok(accepted));
    }

    /// Fail the next scripted bulk-out write
    pub fn fail_next_write(&self, error: rusb::Error) {
        self.lock().write_script.push_back(Err(error));
    }

    /// Fail every control transfer with this request code
    pub fn fail_control(&self, request: Request, error: rusb::Error) {
        self.lock().control_failures.insert(request.code(), error);
    }

    pub fn fail_claim(&self, error: rusb::Error) {
        self.lock().claim_failure = Some(error);
    }

    pub fn set_modem_status(&self, status: u8) {
        self.lock().modem_status = status;
    }

    pub fn set_comm_status(&self, status: [u8; COMM_STATUS_LEN]) {
        self.lock().comm_status = status;
    }

    /// Current line-control word as last written by the driver
    pub fn line_control(&self) -> u16 {
        self.lock().line_control
    }

    pub fn events(&self) -> Vec<TransportEvent> {
        self.lock().events.clone()
    }

    /// `(request, value, data)` of every host-to-device control transfer
    pub fn control_outs(&self) -> Vec<(u8, u16, Vec<u8>)> {
        self.lock()
            .events
            .iter()
            .filter_map(|event| match event {
                TransportEvent::ControlOut {
                    request,
                    value,
                    data,
                    ..
                } => Some((*request, *value, data.clone())),
                _ => None,
            })
            .collect()
    }

    /// Number of control transfers (either direction) with this request code
    pub fn request_count(&self, request: Request) -> usize {
        self.lock()
            .events
            .iter()
            .filter(|event| event.request() == Some(request.code()))
            .count()
    }

    pub fn clear_events(&self) {
        self.lock().events.clear();
    }

    pub fn claimed(&self, interface: u8) -> bool {
        self.lock().claimed.contains(&interface)
    }

    /// Every byte accepted on the bulk OUT endpoint so far
    pub fn bulk_out(&self) -> Vec<u8> {
        self.lock().bulk_out.clone()
    }

    /// Wait until at least `len` bytes were written to bulk OUT
    pub fn wait_for_bulk_out(&self, len: usize, timeout: Duration) -> bool {
        let state = self.lock();
        let (state, _) = self
            .changed
            .wait_timeout_while(state, timeout, |state| state.bulk_out.len() < len)
            .unwrap_or_else(PoisonError::into_inner);
        state.bulk_out.len() >= len
    }

    /// Wait until every queued bulk-in packet was consumed
    pub fn wait_for_bulk_in_drained(&self, timeout: Duration) -> bool {
        let state = self.lock();
        let (state, _) = self
            .changed
            .wait_timeout_while(state, timeout, |state| !state.bulk_in.is_empty())
            .unwrap_or_else(PoisonError::into_inner);
        state.bulk_in.is_empty()
    }
}

impl Transport for MockTransport {
    fn device_ids(&self) -> rusb::Result<(u16, u16)> {
        Ok((self.vendor_id, self.product_id))
    }

    fn endpoints(&self) -> rusb::Result<Vec<EndpointDescriptor>> {
        Ok(self.endpoints.clone())
    }

    fn claim_interface(&self, interface: u8) -> rusb::Result<()> {
        let mut state = self.lock();
        state.events.push(TransportEvent::Claim(interface));
        if let Some(e) = state.claim_failure.clone() {
            return Err(e);
        }
        if !state.claimed.contains(&interface) {
            state.claimed.push(interface);
        }
        Ok(())
    }

    fn release_interface(&self, interface: u8) -> rusb::Result<()> {
        let mut state = self.lock();
        state.events.push(TransportEvent::Release(interface));
        state.claimed.retain(|&i| i != interface);
        Ok(())
    }

    fn write_control(
        &self,
        request_type: u8,
        request: u8,
        value: u16,
        index: u16,
        data: &[u8],
        _timeout: Duration,
    ) -> rusb::Result<usize> {
        let mut state = self.lock();
        state.events.push(TransportEvent::ControlOut {
            request_type,
            request,
            value,
            index,
            data: data.to_vec(),
        });
        if let Some(e) = state.control_failures.get(&request) {
            return Err(e.clone());
        }
        if request == Request::SetLineCtl.code() {
            state.line_control = value;
        }
        Ok(data.len())
    }

    fn read_control(
        &self,
        request_type: u8,
        request: u8,
        _value: u16,
        index: u16,
        buf: &mut [u8],
        _timeout: Duration,
    ) -> rusb::Result<usize> {
        let mut state = self.lock();
        state.events.push(TransportEvent::ControlIn {
            request_type,
            request,
            index,
            length: buf.len(),
        });
        if let Some(e) = state.control_failures.get(&request) {
            return Err(e.clone());
        }

        let answer: Vec<u8> = if request == Request::GetLineCtl.code() {
            state.line_control.to_le_bytes().to_vec()
        } else if request == Request::GetModemStatus.code() {
            vec![state.modem_status]
        } else if request == Request::GetCommStatus.code() {
            state.comm_status.to_vec()
        } else {
            return Err(rusb::Error::Pipe);
        };

        let len = answer.len().min(buf.len());
        buf[..len].copy_from_slice(&answer[..len]);
        Ok(len)
    }

    fn read_bulk(&self, _endpoint: u8, buf: &mut [u8], timeout: Duration) -> rusb::Result<usize> {
        let deadline = Instant::now() + timeout;
        let mut state = self.lock();
        loop {
            if let Some(next) = state.bulk_in.pop_front() {
                let result = next.map(|mut data| {
                    let len = data.len().min(buf.len());
                    buf[..len].copy_from_slice(&data[..len]);
                    if len < data.len() {
                        state.bulk_in.push_front(Ok(data.split_off(len)));
                    }
                    len
                });
                drop(state);
                self.changed.notify_all();
                return result;
            }

            let now = Instant::now();
            if now >= deadline {
                return Err(rusb::Error::Timeout);
            }
            state = self
                .changed
                .wait_timeout(state, deadline - now)
                .unwrap_or_else(PoisonError::into_inner)
                .0;
        }
    }

    fn write_bulk(&self, _endpoint: u8, data: &[u8], _timeout: Duration) -> rusb::Result<usize> {
        let mut state = self.lock();
        let accepted = match state.write_script.pop_front() {
            Some(Ok(limit)) => limit.min(data.len()),
            Some(Err(e)) => return Err(e),
            None => data.len(),
        };
        state.bulk_out.extend_from_slice(&data[..accepted]);
        drop(state);
        self.changed.notify_all();
        Ok(accepted)
    }
}
