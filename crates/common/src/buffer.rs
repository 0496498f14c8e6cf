//! Thread-safe byte FIFO with change notification
//!
//! [`ByteBuffer`] is the hand-off point between the USB pump threads and the
//! application. Every primitive operation runs under a single mutex and every
//! mutation wakes all waiters, so callers block with the `wait_*` methods
//! instead of polling.
//!
//! The buffer is unbounded. A reader that falls behind a fast device grows it
//! without limit; there is no backpressure towards the pump.
//!
//! Composite sequences (read, wait, read again) are not atomic across callers.
//! A buffer is meant to be drained by a single reader.

use bytes::{Buf, BytesMut};
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

/// Find the first occurrence of `needle` in `haystack`
///
/// An empty needle matches at offset 0.
pub fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() {
        return Some(0);
    }
    if needle.len() > haystack.len() {
        return None;
    }
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}

/// Normalise a size limit: `None` and `Some(0)` both mean "no limit"
pub fn size_limit(limit: Option<usize>) -> Option<usize> {
    limit.filter(|&n| n > 0)
}

/// Mutex-guarded growable FIFO of bytes
#[derive(Debug, Default)]
pub struct ByteBuffer {
    data: Mutex<BytesMut>,
    changed: Condvar,
}

impl ByteBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, BytesMut> {
        self.data.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Remove up to `limit` bytes from the front of a locked buffer
    fn take(data: &mut BytesMut, limit: Option<usize>) -> Vec<u8> {
        let count = size_limit(limit).map_or(data.len(), |n| n.min(data.len()));
        let taken = data[..count].to_vec();
        data.advance(count);
        taken
    }

    fn take_until(data: &mut BytesMut, pattern: &[u8], limit: Option<usize>) -> Vec<u8> {
        if pattern.is_empty() {
            return Vec::new();
        }
        let limit = size_limit(limit);
        match find(data, pattern) {
            Some(pos) => {
                let end = pos + pattern.len();
                match limit {
                    Some(limit) if end > limit => Self::take(data, Some(limit)),
                    _ => Self::take(data, Some(end)),
                }
            }
            None => Self::take(data, limit),
        }
    }

    /// Append bytes and wake waiters, returning the number appended
    pub fn write(&self, bytes: &[u8]) -> usize {
        if bytes.is_empty() {
            return 0;
        }
        self.lock().extend_from_slice(bytes);
        self.changed.notify_all();
        bytes.len()
    }

    /// Remove and return up to `limit` bytes; `None` or `Some(0)` drains everything
    ///
    /// Never blocks.
    pub fn read(&self, limit: Option<usize>) -> Vec<u8> {
        let taken = Self::take(&mut self.lock(), limit);
        if !taken.is_empty() {
            self.changed.notify_all();
        }
        taken
    }

    /// Remove bytes up to and including the first `pattern`
    ///
    /// If the pattern is absent, or would end beyond `limit`, this behaves
    /// like [`read`](Self::read) with the same limit. An empty pattern
    /// matches at offset 0: nothing is removed and an empty vector is
    /// returned.
    pub fn read_until(&self, pattern: &[u8], limit: Option<usize>) -> Vec<u8> {
        let taken = Self::take_until(&mut self.lock(), pattern, limit);
        if !taken.is_empty() {
            self.changed.notify_all();
        }
        taken
    }

    /// Remove bytes through `pattern` only if it ends within `limit`
    ///
    /// Returns `None` and leaves the buffer untouched otherwise. Check and
    /// removal happen under one lock acquisition.
    pub fn take_until_within(&self, pattern: &[u8], limit: Option<usize>) -> Option<Vec<u8>> {
        let mut data = self.lock();
        let end = find(&data, pattern)? + pattern.len();
        if size_limit(limit).is_some_and(|limit| end > limit) {
            return None;
        }
        let taken = Self::take(&mut data, Some(end));
        drop(data);
        if !taken.is_empty() {
            self.changed.notify_all();
        }
        Some(taken)
    }

    pub fn contains(&self, pattern: &[u8]) -> bool {
        find(&self.lock(), pattern).is_some()
    }

    /// Copy of up to `limit` bytes from the front, without removing them
    pub fn peek(&self, limit: Option<usize>) -> Vec<u8> {
        let data = self.lock();
        let count = size_limit(limit).map_or(data.len(), |n| n.min(data.len()));
        data[..count].to_vec()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Drop all buffered bytes
    pub fn clear(&self) {
        self.lock().clear();
        self.changed.notify_all();
    }

    /// Block until `ready` holds for the buffered bytes or `timeout` elapses
    ///
    /// `None` waits without bound. Returns the final value of `ready`.
    pub fn wait_until<F>(&self, timeout: Option<Duration>, mut ready: F) -> bool
    where
        F: FnMut(&[u8]) -> bool,
    {
        let data = self.lock();
        match timeout {
            None => {
                let data = self
                    .changed
                    .wait_while(data, |data| !ready(data))
                    .unwrap_or_else(PoisonError::into_inner);
                ready(&data)
            }
            Some(timeout) => {
                let (data, _) = self
                    .changed
                    .wait_timeout_while(data, timeout, |data| !ready(data))
                    .unwrap_or_else(PoisonError::into_inner);
                ready(&data)
            }
        }
    }

    /// Wait until the buffer holds at least one byte
    pub fn wait_for_data(&self, timeout: Option<Duration>) -> bool {
        self.wait_until(timeout, |data| !data.is_empty())
    }

    /// Wait until the buffer has been drained
    pub fn wait_for_drain(&self, timeout: Option<Duration>) -> bool {
        self.wait_until(timeout, |data| data.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;
    use std::time::Instant;

    #[test]
    fn test_find() {
        assert_eq!(find(b"foo\nbar", b"\n"), Some(3));
        assert_eq!(find(b"foo\r\nbar", b"\r\n"), Some(3));
        assert_eq!(find(b"foo", b"\n"), None);
        assert_eq!(find(b"fo", b"foo"), None);
        assert_eq!(find(b"abc", b""), Some(0));
    }

    #[test]
    fn test_write_read_fifo() {
        let buffer = ByteBuffer::new();
        assert_eq!(buffer.write(b"hello "), 6);
        assert_eq!(buffer.write(b"world"), 5);
        assert_eq!(buffer.len(), 11);

        assert_eq!(buffer.read(Some(5)), b"hello");
        assert_eq!(buffer.read(Some(0)), b" world");
        assert!(buffer.is_empty());
        assert!(buffer.read(None).is_empty());
    }

    #[test]
    fn test_read_more_than_available() {
        let buffer = ByteBuffer::new();
        buffer.write(b"abc");
        assert_eq!(buffer.read(Some(10)), b"abc");
    }

    #[test]
    fn test_read_until_found() {
        let buffer = ByteBuffer::new();
        buffer.write(b"foo\nbar");
        assert_eq!(buffer.read_until(b"\n", None), b"foo\n");
        assert_eq!(buffer.peek(None), b"bar");
    }

    #[test]
    fn test_read_until_not_found_respects_limit() {
        let buffer = ByteBuffer::new();
        buffer.write(b"abcdef");
        assert_eq!(buffer.read_until(b"\n", Some(4)), b"abcd");
        assert_eq!(buffer.read_until(b"\n", None), b"ef");
    }

    #[test]
    fn test_read_until_match_beyond_limit() {
        let buffer = ByteBuffer::new();
        buffer.write(b"abcdef\n");
        // Match ends at 7, beyond the limit of 3
        assert_eq!(buffer.read_until(b"\n", Some(3)), b"abc");
        assert_eq!(buffer.read_until(b"\n", Some(4)), b"def\n");
    }

    #[test]
    fn test_read_until_match_exactly_at_limit() {
        let buffer = ByteBuffer::new();
        buffer.write(b"ab\ncd");
        assert_eq!(buffer.read_until(b"\n", Some(3)), b"ab\n");
    }

    #[test]
    fn test_read_until_empty_pattern() {
        let buffer = ByteBuffer::new();
        buffer.write(b"abc");
        assert!(buffer.read_until(b"", None).is_empty());
        assert_eq!(buffer.len(), 3);
        assert!(buffer.contains(b""));
    }

    #[test]
    fn test_take_until_within() {
        let buffer = ByteBuffer::new();
        buffer.write(b"ab");
        assert_eq!(buffer.take_until_within(b"\n", Some(2)), None);
        assert_eq!(buffer.peek(None), b"ab");

        buffer.write(b"\ncd");
        assert_eq!(buffer.take_until_within(b"\n", Some(2)), None);
        assert_eq!(buffer.take_until_within(b"\n", Some(3)), Some(b"ab\n".to_vec()));
        assert_eq!(buffer.peek(None), b"cd");
    }

    #[test]
    fn test_peek_does_not_remove() {
        let buffer = ByteBuffer::new();
        buffer.write(b"abcdef");
        assert_eq!(buffer.peek(Some(3)), b"abc");
        assert_eq!(buffer.len(), 6);
    }

    #[test]
    fn test_clear() {
        let buffer = ByteBuffer::new();
        buffer.write(b"abc");
        buffer.clear();
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_wait_for_data_times_out_when_empty() {
        let buffer = ByteBuffer::new();
        let start = Instant::now();
        assert!(!buffer.wait_for_data(Some(Duration::from_millis(30))));
        assert!(start.elapsed() >= Duration::from_millis(30));
    }

    #[test]
    fn test_wait_for_data_returns_immediately_when_filled() {
        let buffer = ByteBuffer::new();
        buffer.write(b"x");
        assert!(buffer.wait_for_data(Some(Duration::ZERO)));
    }

    #[test]
    fn test_wait_for_data_wakes_on_write() {
        let buffer = Arc::new(ByteBuffer::new());
        let writer = buffer.clone();
        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            writer.write(b"ping");
        });

        assert!(buffer.wait_for_data(Some(Duration::from_secs(5))));
        assert_eq!(buffer.read(None), b"ping");
        handle.join().unwrap();
    }

    #[test]
    fn test_wait_for_drain() {
        let buffer = Arc::new(ByteBuffer::new());
        buffer.write(b"data");
        let reader = buffer.clone();
        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            reader.read(None)
        });

        assert!(buffer.wait_for_drain(Some(Duration::from_secs(5))));
        assert_eq!(handle.join().unwrap(), b"data");
    }
}
