//! ByteBuffer concurrency tests
//!
//! # Test Scenarios
//! - Byte conservation with one writer and one reader thread
//! - FIFO order across many small writes
//! - Waiters woken by writes from another thread
//! - Deadline-driven drain loops
//!
//! Run with: `cargo test -p common --test buffer_tests`

use common::test_utils::{DEFAULT_TEST_TIMEOUT, pattern_bytes, run_with_timeout, spawn_feeder};
use common::{ByteBuffer, Deadline};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

// ============================================================================
// Conservation and ordering
// ============================================================================

#[test]
fn test_single_writer_single_reader_conserves_bytes() {
    let buffer = Arc::new(ByteBuffer::new());
    let payload = pattern_bytes(64 * 1024, 7);
    let chunks: Vec<Vec<u8>> = payload.chunks(97).map(|c| c.to_vec()).collect();

    let feeder = spawn_feeder(buffer.clone(), chunks, Duration::ZERO);

    let reader_buffer = buffer.clone();
    let expected_len = payload.len();
    let received = run_with_timeout(DEFAULT_TEST_TIMEOUT, move || {
        let mut received = Vec::with_capacity(expected_len);
        while received.len() < expected_len {
            reader_buffer.wait_for_data(Some(Duration::from_millis(50)));
            received.extend(reader_buffer.read(Some(61)));
        }
        received
    })
    .expect("reader did not finish");

    assert_eq!(feeder.join().unwrap(), payload.len());
    assert_eq!(received, payload);
    assert!(buffer.is_empty());
}

#[test]
fn test_line_reads_preserve_order() {
    let buffer = ByteBuffer::new();
    for i in 0..100 {
        buffer.write(format!("line {}\n", i).as_bytes());
    }

    for i in 0..100 {
        let line = buffer.read_until(b"\n", None);
        assert_eq!(line, format!("line {}\n", i).into_bytes());
    }
    assert!(buffer.is_empty());
}

#[test]
fn test_multibyte_pattern_split_across_writes() {
    let buffer = ByteBuffer::new();
    buffer.write(b"abc\r");
    assert!(!buffer.contains(b"\r\n"));
    buffer.write(b"\ndef");
    assert!(buffer.contains(b"\r\n"));
    assert_eq!(buffer.read_until(b"\r\n", None), b"abc\r\n");
}

// ============================================================================
// Waiting
// ============================================================================

#[test]
fn test_wait_until_pattern_arrives() {
    let buffer = Arc::new(ByteBuffer::new());
    let feeder = spawn_feeder(
        buffer.clone(),
        vec![b"key, ".to_vec(), b"value".to_vec(), b"\n".to_vec()],
        Duration::from_millis(10),
    );

    let found = buffer.wait_until(Some(DEFAULT_TEST_TIMEOUT), |data| data.contains(&b'\n'));
    assert!(found);
    assert_eq!(buffer.read_until(b"\n", None), b"key, value\n");
    feeder.join().unwrap();
}

#[test]
fn test_many_waiters_are_all_woken() {
    let buffer = Arc::new(ByteBuffer::new());
    let woken = Arc::new(AtomicBool::new(true));

    let waiters: Vec<_> = (0..4)
        .map(|_| {
            let buffer = buffer.clone();
            let woken = woken.clone();
            thread::spawn(move || {
                if !buffer.wait_for_data(Some(DEFAULT_TEST_TIMEOUT)) {
                    woken.store(false, Ordering::SeqCst);
                }
            })
        })
        .collect();

    thread::sleep(Duration::from_millis(20));
    buffer.write(b"!");

    for waiter in waiters {
        waiter.join().unwrap();
    }
    assert!(woken.load(Ordering::SeqCst));
}

#[test]
fn test_deadline_bounded_drain_loop() {
    let buffer = Arc::new(ByteBuffer::new());
    let feeder = spawn_feeder(
        buffer.clone(),
        vec![b"12".to_vec(), b"34".to_vec()],
        Duration::from_millis(5),
    );

    let deadline = Deadline::new(Some(Duration::from_millis(200)));
    let mut data = Vec::new();
    while !deadline.expired() && data.len() < 4 {
        buffer.wait_for_data(Some(deadline.next_wait(Duration::from_millis(50))));
        data.extend(buffer.read(Some(4 - data.len())));
    }

    assert_eq!(data, b"1234");
    feeder.join().unwrap();
}
