//! Direct bulk transfers for links opened in [`OpenMode::Sync`](super::OpenMode::Sync)
//!
//! These bypass the RX/TX buffers. Mixing them with a running read pump
//! splits incoming data between the two unpredictably.

use super::SerialLink;
use crate::error::{LinkError, Result};
use crate::transport::Transport;
use common::{Deadline, RXTX_TARGET, hex_line};
use std::io::Write;
use std::time::Duration;
use tracing::{debug, error, trace};

impl<T: Transport> SerialLink<T> {
    fn ensure_open(&self) -> Result<()> {
        if self.is_open() {
            Ok(())
        } else {
            Err(LinkError::NotOpen)
        }
    }

    /// One bulk-in transfer of at most `size` bytes
    ///
    /// A timeout yields an empty result.
    pub fn read_sync(&self, size: usize) -> Result<Vec<u8>> {
        self.ensure_open()?;
        if size == 0 {
            return Ok(Vec::new());
        }

        let mut buf = vec![0u8; size];
        let len = match self.shared.transport.read_bulk(
            self.endpoints.bulk_in.address,
            &mut buf,
            self.config.read_timeout(),
        ) {
            Ok(len) => len,
            Err(rusb::Error::Timeout) => 0,
            Err(e) => return Err(e.into()),
        };
        buf.truncate(len);
        if !buf.is_empty() {
            debug!(target: RXTX_TARGET, "[RX] {}", hex_line(&buf));
        }
        Ok(buf)
    }

    /// One bulk-out transfer, returning the bytes the device accepted
    ///
    /// Bytes the device did not take are counted as lost.
    pub fn write_sync(&self, data: &[u8]) -> Result<usize> {
        self.ensure_open()?;
        let written = self.bulk_write(data)?;
        if written < data.len() {
            self.report_lost(written, data.len());
        }
        Ok(written)
    }

    fn bulk_write(&self, data: &[u8]) -> Result<usize> {
        if data.is_empty() {
            return Ok(0);
        }
        debug!(target: RXTX_TARGET, "[TX] {}", hex_line(data));
        let written = self.shared.transport.write_bulk(
            self.endpoints.bulk_out.address,
            data,
            self.config.write_timeout(),
        )?;
        Ok(written.min(data.len()))
    }

    fn report_lost(&self, written: usize, len: usize) {
        self.shared.add_lost_bytes(len - written);
        error!(
            target: RXTX_TARGET,
            "[TX] data loss: wrote {} of {} bytes",
            written,
            len
        );
    }

    /// Read up to `size` bytes in packet-sized transfers
    ///
    /// Stops early at the first empty or timed-out transfer.
    pub fn read_sync_chunked(&self, size: usize) -> Result<Vec<u8>> {
        let packet_len = self.endpoints.bulk_in.packet_len();
        let mut data = Vec::with_capacity(size);
        while data.len() < size {
            let chunk = self.read_sync(packet_len.min(size - data.len()))?;
            if chunk.is_empty() {
                break;
            }
            data.extend(chunk);
        }
        Ok(data)
    }

    /// Write `data` in packet-sized transfers
    ///
    /// A partially accepted packet is followed by the rest of the data from
    /// the first unsent byte. Stops at the first transfer the device accepts
    /// nothing of, counting the unsent tail as lost. Returns the number of
    /// bytes sent.
    pub fn write_sync_chunked(&self, data: &[u8]) -> Result<usize> {
        self.ensure_open()?;
        let packet_len = self.endpoints.bulk_out.packet_len();
        let mut sent = 0;
        while sent < data.len() {
            let end = data.len().min(sent + packet_len);
            let written = self.bulk_write(&data[sent..end])?;
            if written == 0 {
                self.report_lost(sent, data.len());
                break;
            }
            sent += written;
        }
        Ok(sent)
    }

    /// Stream bulk-in packets into `out` until `until` has passed
    ///
    /// `None` streams until the transfer fails. Timeouts are skipped. Returns
    /// the number of bytes written to `out`.
    pub fn dump_to<W: Write>(&self, out: &mut W, until: Option<Duration>) -> Result<u64> {
        self.ensure_open()?;

        let deadline = Deadline::new(until);
        let mut packet = vec![0u8; self.endpoints.bulk_in.packet_len()];
        let mut total = 0u64;

        while !deadline.expired() {
            match self.shared.transport.read_bulk(
                self.endpoints.bulk_in.address,
                &mut packet,
                self.config.read_timeout(),
            ) {
                Ok(0) => {}
                Ok(len) => {
                    trace!(target: RXTX_TARGET, "[RX] {}", hex_line(&packet[..len]));
                    out.write_all(&packet[..len])?;
                    out.flush()?;
                    total += len as u64;
                }
                Err(rusb::Error::Timeout) => {}
                Err(e) => return Err(e.into()),
            }
        }
        Ok(total)
    }
}
