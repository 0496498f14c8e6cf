//! Raw USB access used by the link
//!
//! [`Transport`] is the seam between the driver and the USB stack. The link
//! only ever talks to the chip through these calls, so tests substitute a
//! recording mock (see [`crate::test_utils::MockTransport`]) and applications
//! hand in a [`RusbTransport`] wrapping whatever handle they obtained.

use crate::endpoint::EndpointDescriptor;
use rusb::{DeviceHandle, UsbContext};
use std::sync::{PoisonError, RwLock};
use std::time::Duration;
use tracing::{debug, warn};

/// Blocking USB operations on an already opened device
///
/// Signatures follow `rusb::DeviceHandle`. Implementations must tolerate
/// concurrent transfers from the pump threads and callers.
pub trait Transport: Send + Sync + 'static {
    /// `(vendor_id, product_id)` from the device descriptor
    fn device_ids(&self) -> rusb::Result<(u16, u16)>;

    /// Endpoints of the first interface of the first configuration
    fn endpoints(&self) -> rusb::Result<Vec<EndpointDescriptor>>;

    fn claim_interface(&self, interface: u8) -> rusb::Result<()>;

    fn release_interface(&self, interface: u8) -> rusb::Result<()>;

    fn write_control(
        &self,
        request_type: u8,
        request: u8,
        value: u16,
        index: u16,
        data: &[u8],
        timeout: Duration,
    ) -> rusb::Result<usize>;

    fn read_control(
        &self,
        request_type: u8,
        request: u8,
        value: u16,
        index: u16,
        buf: &mut [u8],
        timeout: Duration,
    ) -> rusb::Result<usize>;

    fn read_bulk(&self, endpoint: u8, buf: &mut [u8], timeout: Duration) -> rusb::Result<usize>;

    fn write_bulk(&self, endpoint: u8, data: &[u8], timeout: Duration) -> rusb::Result<usize>;
}

/// [`Transport`] over a `rusb` device handle
///
/// Interface claiming needs exclusive access to the handle; transfers share it.
pub struct RusbTransport<C: UsbContext = rusb::Context> {
    handle: RwLock<DeviceHandle<C>>,
}

impl<C: UsbContext> RusbTransport<C> {
    pub fn new(handle: DeviceHandle<C>) -> Self {
        Self {
            handle: RwLock::new(handle),
        }
    }

    /// Give the handle back, e.g. to reuse it after the link is dropped
    pub fn into_inner(self) -> DeviceHandle<C> {
        self.handle
            .into_inner()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn with_handle<R>(&self, f: impl FnOnce(&DeviceHandle<C>) -> R) -> R {
        let handle = self.handle.read().unwrap_or_else(PoisonError::into_inner);
        f(&handle)
    }

    fn with_handle_mut<R>(&self, f: impl FnOnce(&mut DeviceHandle<C>) -> R) -> R {
        let mut handle = self.handle.write().unwrap_or_else(PoisonError::into_inner);
        f(&mut handle)
    }
}

impl<C: UsbContext + 'static> Transport for RusbTransport<C> {
    fn device_ids(&self) -> rusb::Result<(u16, u16)> {
        self.with_handle(|handle| {
            let descriptor = handle.device().device_descriptor()?;
            Ok((descriptor.vendor_id(), descriptor.product_id()))
        })
    }

    fn endpoints(&self) -> rusb::Result<Vec<EndpointDescriptor>> {
        self.with_handle(|handle| {
            let config = handle.device().config_descriptor(0)?;
            let Some(interface) = config.interfaces().next() else {
                return Ok(Vec::new());
            };
            let Some(setting) = interface.descriptors().next() else {
                return Ok(Vec::new());
            };
            Ok(setting
                .endpoint_descriptors()
                .map(|ep| EndpointDescriptor {
                    address: ep.address(),
                    direction: ep.direction(),
                    transfer_type: ep.transfer_type(),
                    max_packet_size: ep.max_packet_size(),
                })
                .collect())
        })
    }

    fn claim_interface(&self, interface: u8) -> rusb::Result<()> {
        self.with_handle_mut(|handle| {
            match handle.kernel_driver_active(interface) {
                Ok(true) => {
                    debug!("Detaching kernel driver from interface {}", interface);
                    if let Err(e) = handle.detach_kernel_driver(interface) {
                        warn!(
                            "Failed to detach kernel driver from interface {}: {}",
                            interface, e
                        );
                    }
                }
                Ok(false) => {}
                Err(e) => {
                    // Not supported on every platform (or on wrapped fds)
                    debug!("Could not query kernel driver on interface {}: {}", interface, e);
                }
            }

            handle.claim_interface(interface)?;
            debug!("Claimed interface {}", interface);
            Ok(())
        })
    }

    fn release_interface(&self, interface: u8) -> rusb::Result<()> {
        self.with_handle_mut(|handle| {
            handle.release_interface(interface)?;
            debug!("Released interface {}", interface);
            Ok(())
        })
    }

    fn write_control(
        &self,
        request_type: u8,
        request: u8,
        value: u16,
        index: u16,
        data: &[u8],
        timeout: Duration,
    ) -> rusb::Result<usize> {
        self.with_handle(|handle| {
            handle.write_control(request_type, request, value, index, data, timeout)
        })
    }

    fn read_control(
        &self,
        request_type: u8,
        request: u8,
        value: u16,
        index: u16,
        buf: &mut [u8],
        timeout: Duration,
    ) -> rusb::Result<usize> {
        self.with_handle(|handle| {
            handle.read_control(request_type, request, value, index, buf, timeout)
        })
    }

    fn read_bulk(&self, endpoint: u8, buf: &mut [u8], timeout: Duration) -> rusb::Result<usize> {
        self.with_handle(|handle| handle.read_bulk(endpoint, buf, timeout))
    }

    fn write_bulk(&self, endpoint: u8, data: &[u8], timeout: Duration) -> rusb::Result<usize> {
        self.with_handle(|handle| handle.write_bulk(endpoint, data, timeout))
    }
}
