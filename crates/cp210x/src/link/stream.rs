//! Blocking stream reads over the RX buffer
//!
//! The read loops pull from the buffer in slices bounded by a [`Deadline`]
//! and stop early once nothing can refill the buffer (pump faulted or link
//! closed), so a call never waits for bytes that cannot arrive.

use super::SerialLink;
use crate::error::{LinkError, PumpKind, Result};
use crate::transport::Transport;
use common::buffer::{find, size_limit};
use common::{ByteBuffer, Deadline};
use std::time::Duration;

/// Wait for data unless the producer is gone; returns `false` to stop
fn wait_more(
    rx: &ByteBuffer,
    deadline: &Deadline,
    slice: Duration,
    starved: &impl Fn() -> bool,
) -> bool {
    if rx.is_empty() {
        if starved() {
            return false;
        }
        rx.wait_for_data(Some(deadline.next_wait(slice)));
    }
    true
}

pub(crate) fn read(
    rx: &ByteBuffer,
    size: Option<usize>,
    deadline: &Deadline,
    slice: Duration,
    starved: impl Fn() -> bool,
) -> Vec<u8> {
    let Some(size) = size_limit(size) else {
        return rx.read(None);
    };

    let mut data = rx.read(Some(size));
    while data.len() < size && !deadline.expired() {
        if !wait_more(rx, deadline, slice, &starved) {
            break;
        }
        data.extend(rx.read(Some(size - data.len())));
    }
    data
}

pub(crate) fn read_until(
    rx: &ByteBuffer,
    pattern: &[u8],
    limit: Option<usize>,
    deadline: &Deadline,
    slice: Duration,
    starved: impl Fn() -> bool,
) -> Vec<u8> {
    let Some(&last) = pattern.last() else {
        return Vec::new();
    };
    let limit = size_limit(limit);

    let mut data = rx.read_until(pattern, limit);
    let mut found = find(&data, pattern).is_some();
    while !found && !deadline.expired() {
        if limit.is_some_and(|l| data.len() >= l) {
            break;
        }
        if !wait_more(rx, deadline, slice, &starved) {
            break;
        }

        // Pull through the pattern's last byte at most, so bytes after a
        // match completed across two pulls stay buffered
        let remaining = limit.map(|l| l - data.len());
        let from = data.len().saturating_sub(pattern.len() - 1);
        data.extend(rx.read_until(&[last], remaining));
        found = find(&data[from..], pattern).is_some();
    }
    data
}

pub(crate) fn read_until_or_none(
    rx: &ByteBuffer,
    pattern: &[u8],
    limit: Option<usize>,
    deadline: &Deadline,
    slice: Duration,
    starved: impl Fn() -> bool,
) -> Option<Vec<u8>> {
    let limit = size_limit(limit);
    let ready = |held: &[u8]| {
        find(held, pattern).is_some() || limit.is_some_and(|l| held.len() > l)
    };

    while !deadline.expired() && !starved() {
        if rx.wait_until(Some(deadline.next_wait(slice)), &ready) {
            break;
        }
    }
    rx.take_until_within(pattern, limit)
}

impl<T: Transport> SerialLink<T> {
    /// Read up to `size` bytes
    ///
    /// `None` or `Some(0)` drains whatever is buffered without waiting.
    /// Otherwise waits until `size` bytes arrived or `timeout` passed
    /// (`None` waits forever, `Some(ZERO)` never waits) and returns what it
    /// has. Fails only when nothing was read and the read pump has faulted.
    pub fn read(&self, size: Option<usize>, timeout: Option<Duration>) -> Result<Vec<u8>> {
        let deadline = Deadline::new(timeout);
        let data = read(
            &self.shared.rx,
            size,
            &deadline,
            self.config.read_wait_slice(),
            || !self.rx_pump_running(),
        );
        self.unless_faulted(data)
    }

    /// Read through the first occurrence of `pattern`
    ///
    /// Stops early at `limit` bytes or when `timeout` passes, returning the
    /// bytes read so far; callers check whether they end with `pattern`.
    pub fn read_until(
        &self,
        pattern: &[u8],
        limit: Option<usize>,
        timeout: Option<Duration>,
    ) -> Result<Vec<u8>> {
        let deadline = Deadline::new(timeout);
        let data = read_until(
            &self.shared.rx,
            pattern,
            limit,
            &deadline,
            self.config.read_wait_slice(),
            || !self.rx_pump_running(),
        );
        self.unless_faulted(data)
    }

    /// All-or-nothing variant of [`read_until`](Self::read_until)
    ///
    /// Leaves the buffer untouched and returns `None` unless the whole match
    /// fits within `limit` bytes before `timeout`.
    pub fn read_until_or_none(
        &self,
        pattern: &[u8],
        limit: Option<usize>,
        timeout: Option<Duration>,
    ) -> Result<Option<Vec<u8>>> {
        let deadline = Deadline::new(timeout);
        let data = read_until_or_none(
            &self.shared.rx,
            pattern,
            limit,
            &deadline,
            self.config.read_wait_slice(),
            || !self.rx_pump_running(),
        );
        match data {
            Some(data) => Ok(Some(data)),
            None => match self.shared.fault_of(PumpKind::Read) {
                Some(fault) => Err(LinkError::Faulted(fault)),
                None => Ok(None),
            },
        }
    }

    /// Queue bytes for the write pump; never blocks
    pub fn write(&self, data: &[u8]) -> Result<usize> {
        if let Some(fault) = self.shared.fault_of(PumpKind::Write) {
            return Err(LinkError::Faulted(fault));
        }
        Ok(self.shared.tx.write(data))
    }

    /// Wait until the RX buffer holds data
    pub fn wait_for_rx(&self, timeout: Option<Duration>) -> bool {
        self.shared.rx.wait_for_data(timeout)
    }

    /// Wait until the write pump has taken everything queued
    pub fn wait_for_tx_drain(&self, timeout: Option<Duration>) -> bool {
        self.shared.tx.wait_for_drain(timeout)
    }

    /// Drop everything buffered on both sides
    pub fn clear_buffers(&self) {
        self.shared.rx.clear();
        self.shared.tx.clear();
    }

    fn unless_faulted(&self, data: Vec<u8>) -> Result<Vec<u8>> {
        if data.is_empty() {
            if let Some(fault) = self.shared.fault_of(PumpKind::Read) {
                return Err(LinkError::Faulted(fault));
            }
        }
        Ok(data)
    }
}
