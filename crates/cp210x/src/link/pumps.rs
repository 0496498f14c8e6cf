//! Background threads moving data between the endpoints and the buffers
//!
//! Each pump is a [`Worker`] running one unit of work per iteration while the
//! link is open. A bulk timeout is an idle iteration; any other transport
//! error is recorded as the link's fault for that pump and ends the thread.

use super::{SerialLink, Shared};
use crate::endpoint::EndpointDescriptor;
use crate::error::{LinkError, PumpKind, Result};
use crate::transport::Transport;
use common::{RXTX_TARGET, Worker, hex_line};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tracing::{debug, error, trace, warn};

type Pump = Worker<rusb::Error>;

impl<T: Transport> SerialLink<T> {
    /// Start whichever data pump is not running; live pumps are kept
    pub(super) fn start_data_pumps(&mut self) -> Result<()> {
        if !is_running(&self.read_pump) {
            reap(self.read_pump.take());
            self.read_pump = Some(spawn_read_pump(
                &self.shared,
                self.endpoints.bulk_in,
                self.config.read_timeout(),
            )?);
        }
        if !is_running(&self.write_pump) {
            reap(self.write_pump.take());
            self.write_pump = Some(spawn_write_pump(
                &self.shared,
                self.endpoints.bulk_out,
                self.config.write_timeout(),
            )?);
        }
        Ok(())
    }

    pub(super) fn stop_data_pumps(&mut self) {
        let pumps = [self.read_pump.take(), self.write_pump.take()];
        for pump in pumps.iter().flatten() {
            pump.stop();
        }
        for pump in pumps {
            reap(pump);
        }
    }

    pub(super) fn start_flow_pump(&mut self) -> Result<()> {
        if is_running(&self.flow_pump) {
            return Ok(());
        }
        reap(self.flow_pump.take());
        self.flow_pump = Some(spawn_flow_pump(
            &self.shared,
            self.config.flow_poll_interval(),
        )?);
        Ok(())
    }

    pub(super) fn stop_flow_pump(&mut self) {
        if let Some(e) = self.flow_pump.take().and_then(Worker::stop_and_join) {
            debug!("Flow poll had exited with: {}", e);
        }
    }

    /// Whether the read pump is alive to refill the RX buffer
    pub(super) fn rx_pump_running(&self) -> bool {
        self.shared.is_open() && is_running(&self.read_pump)
    }

    /// Whether the flow-poll thread is alive
    pub fn flow_poll_running(&self) -> bool {
        is_running(&self.flow_pump)
    }
}

fn is_running(pump: &Option<Pump>) -> bool {
    pump.as_ref().is_some_and(Worker::is_alive)
}

/// Join a pump that was asked to stop or has already exited
fn reap(pump: Option<Pump>) {
    let Some(pump) = pump else {
        return;
    };
    let name = pump.name().to_string();
    if let Some(e) = pump.join() {
        debug!("{} had exited with: {}", name, e);
    }
}

fn spawn_read_pump<T: Transport>(
    shared: &Arc<Shared<T>>,
    endpoint: EndpointDescriptor,
    timeout: Duration,
) -> Result<Pump> {
    let link = shared.clone();
    let mut packet = vec![0u8; endpoint.packet_len()];

    let pump = Worker::spawn(PumpKind::Read.thread_name(), shared.open.clone(), move || {
        match link
            .transport
            .read_bulk(endpoint.address, &mut packet, timeout)
        {
            Ok(0) => Ok(()),
            Ok(len) => {
                let data = &packet[..len];
                debug!(target: RXTX_TARGET, "[RX] {}", hex_line(data));
                link.rx.write(data);
                Ok(())
            }
            Err(rusb::Error::Timeout) => {
                trace!(target: RXTX_TARGET, "[RX] idle");
                Ok(())
            }
            Err(e) => {
                link.record_fault(PumpKind::Read, e.clone());
                Err(e)
            }
        }
    })?;
    Ok(pump)
}

fn spawn_write_pump<T: Transport>(
    shared: &Arc<Shared<T>>,
    endpoint: EndpointDescriptor,
    timeout: Duration,
) -> Result<Pump> {
    let link = shared.clone();
    let packet_len = endpoint.packet_len();

    let pump = Worker::spawn(PumpKind::Write.thread_name(), shared.open.clone(), move || {
        if !link.tx.wait_for_data(Some(timeout)) {
            return Ok(());
        }
        let chunk = link.tx.read(Some(packet_len));
        if chunk.is_empty() {
            return Ok(());
        }

        debug!(target: RXTX_TARGET, "[TX] {}", hex_line(&chunk));
        let written = match link.transport.write_bulk(endpoint.address, &chunk, timeout) {
            Ok(written) => written,
            Err(rusb::Error::Timeout) => 0,
            Err(e) => {
                link.record_fault(PumpKind::Write, e.clone());
                return Err(e);
            }
        };

        if written < chunk.len() {
            link.add_lost_bytes(chunk.len() - written);
            error!(
                target: RXTX_TARGET,
                "[TX] data loss: wrote {} of {} bytes [{}]",
                written,
                chunk.len(),
                hex_line(&chunk)
            );
        }
        Ok(())
    })?;
    Ok(pump)
}

fn spawn_flow_pump<T: Transport>(shared: &Arc<Shared<T>>, interval: Duration) -> Result<Pump> {
    let link = shared.clone();

    let pump = Worker::spawn(PumpKind::FlowPoll.thread_name(), shared.open.clone(), move || {
        thread::sleep(interval);

        let sample = link
            .modem_status()
            .and_then(|modem| link.comm_status().map(|comm| (modem, comm)));
        match sample {
            Ok((modem, comm)) => link.apply_status(modem, comm),
            Err(LinkError::Transport(rusb::Error::Timeout)) => {
                trace!("Status poll timed out");
            }
            Err(LinkError::Transport(e)) => {
                link.record_fault(PumpKind::FlowPoll, e.clone());
                return Err(e);
            }
            Err(e) => warn!("Discarding status sample: {}", e),
        }
        Ok(())
    })?;
    Ok(pump)
}
