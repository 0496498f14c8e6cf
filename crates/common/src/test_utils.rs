//! Test utilities for the CP210x driver
//!
//! Helpers for exercising buffers and threads without hanging the test run.
//!
//! # Example
//!
//! ```
//! use common::test_utils::{run_with_timeout, DEFAULT_TEST_TIMEOUT};
//!
//! let answer = run_with_timeout(DEFAULT_TEST_TIMEOUT, || 40 + 2).unwrap();
//! assert_eq!(answer, 42);
//! ```

use crate::buffer::ByteBuffer;
use std::sync::Arc;
use std::sync::mpsc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// Default test timeout (5 seconds)
pub const DEFAULT_TEST_TIMEOUT: Duration = Duration::from_secs(5);

/// Run `f` on a helper thread and give up after `duration`
///
/// The helper thread is left running if it does not finish in time.
pub fn run_with_timeout<T, F>(duration: Duration, f: F) -> Result<T, TimeoutError>
where
    T: Send + 'static,
    F: FnOnce() -> T + Send + 'static,
{
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        let _ = tx.send(f());
    });
    rx.recv_timeout(duration)
        .map_err(|_| TimeoutError { duration })
}

/// Write `chunks` into `buffer` from a background thread, pausing `delay`
/// before each one
///
/// # Example
/// ```
/// use common::ByteBuffer;
/// use common::test_utils::spawn_feeder;
/// use std::sync::Arc;
/// use std::time::Duration;
///
/// let buffer = Arc::new(ByteBuffer::new());
/// let feeder = spawn_feeder(buffer.clone(), vec![b"ab".to_vec(), b"cd".to_vec()], Duration::ZERO);
/// feeder.join().unwrap();
/// assert_eq!(buffer.read(None), b"abcd");
/// ```
pub fn spawn_feeder(
    buffer: Arc<ByteBuffer>,
    chunks: Vec<Vec<u8>>,
    delay: Duration,
) -> JoinHandle<usize> {
    thread::spawn(move || {
        let mut total = 0;
        for chunk in chunks {
            if !delay.is_zero() {
                thread::sleep(delay);
            }
            total += buffer.write(&chunk);
        }
        total
    })
}

/// Deterministic pseudo-random payload of `len` bytes
pub fn pattern_bytes(len: usize, seed: u8) -> Vec<u8> {
    (0..len)
        .map(|i| (i as u8).wrapping_mul(31).wrapping_add(seed))
        .collect()
}

/// Error returned when a test times out
#[derive(Debug)]
pub struct TimeoutError {
    /// The timeout duration that was exceeded
    pub duration: Duration,
}

impl std::fmt::Display for TimeoutError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Test timed out after {:?}", self.duration)
    }
}

impl std::error::Error for TimeoutError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_with_timeout_success() {
        assert_eq!(run_with_timeout(DEFAULT_TEST_TIMEOUT, || 7).unwrap(), 7);
    }

    #[test]
    fn test_run_with_timeout_expires() {
        let result = run_with_timeout(Duration::from_millis(10), || {
            thread::sleep(Duration::from_millis(500));
        });
        let err = result.unwrap_err();
        assert_eq!(err.duration, Duration::from_millis(10));
        assert!(err.to_string().contains("timed out"));
    }

    #[test]
    fn test_pattern_bytes_is_deterministic() {
        assert_eq!(pattern_bytes(64, 3), pattern_bytes(64, 3));
        assert_ne!(pattern_bytes(64, 3), pattern_bytes(64, 4));
        assert_eq!(pattern_bytes(10, 0).len(), 10);
    }
}
