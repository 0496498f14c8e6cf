//! Stoppable background loops on dedicated OS threads
//!
//! A [`Worker`] repeatedly runs one unit of work until either its own stop
//! flag is raised or the owner's `keep_running` flag drops. Stopping is
//! cooperative: the flag is checked between iterations, so the latency of a
//! stop is bounded by how long a single unit of work may block.
//!
//! A unit of work that returns an error ends the loop; the error is handed
//! back by [`Worker::join`].

use crate::error::{Error, Result};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use tracing::{debug, error, warn};

pub struct Worker<E> {
    name: String,
    stop: Arc<AtomicBool>,
    handle: Option<JoinHandle<std::result::Result<(), E>>>,
}

impl<E> Worker<E>
where
    E: std::fmt::Display + Send + 'static,
{
    /// Spawn a named thread running `work` in a loop
    ///
    /// The current tracing span is carried into the thread so log lines from
    /// the loop keep their owner's context.
    pub fn spawn<F>(
        name: impl Into<String>,
        keep_running: Arc<AtomicBool>,
        mut work: F,
    ) -> Result<Self>
    where
        F: FnMut() -> std::result::Result<(), E> + Send + 'static,
    {
        let name = name.into();
        let stop = Arc::new(AtomicBool::new(false));
        let thread_stop = stop.clone();
        let thread_name = name.clone();
        let span = tracing::Span::current();

        let handle = thread::Builder::new()
            .name(name.clone())
            .spawn(move || {
                let _entered = span.enter();
                debug!("{} started", thread_name);
                while !thread_stop.load(Ordering::Acquire)
                    && keep_running.load(Ordering::Acquire)
                {
                    if let Err(e) = work() {
                        error!("{} stopped on error: {}", thread_name, e);
                        return Err(e);
                    }
                }
                debug!("{} stopped", thread_name);
                Ok(())
            })
            .map_err(|source| Error::Spawn {
                name: name.clone(),
                source,
            })?;

        Ok(Self {
            name,
            stop,
            handle: Some(handle),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Ask the loop to exit after its current iteration
    pub fn stop(&self) {
        self.stop.store(true, Ordering::Release);
    }

    /// Whether the thread is still running
    pub fn is_alive(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Wait for the thread to exit
    ///
    /// Returns the error that ended the loop, if any. A panicked thread is
    /// logged and reported as `None`.
    pub fn join(mut self) -> Option<E> {
        let handle = self.handle.take()?;
        match handle.join() {
            Ok(Ok(())) => None,
            Ok(Err(e)) => Some(e),
            Err(_) => {
                warn!("{} panicked", self.name);
                None
            }
        }
    }

    /// [`stop`](Self::stop) followed by [`join`](Self::join)
    pub fn stop_and_join(self) -> Option<E> {
        self.stop();
        self.join()
    }
}

impl<E> Drop for Worker<E> {
    fn drop(&mut self) {
        // Detached threads still see the flag and exit on their own
        self.stop.store(true, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    #[test]
    fn test_worker_runs_until_stopped() {
        let running = Arc::new(AtomicBool::new(true));
        let count = Arc::new(AtomicUsize::new(0));
        let counter = count.clone();

        let worker = Worker::<String>::spawn("test-worker", running, move || {
            counter.fetch_add(1, Ordering::SeqCst);
            thread::sleep(Duration::from_millis(1));
            Ok(())
        })
        .unwrap();

        thread::sleep(Duration::from_millis(20));
        assert!(worker.is_alive());
        assert_eq!(worker.name(), "test-worker");
        assert!(worker.stop_and_join().is_none());
        assert!(count.load(Ordering::SeqCst) > 0);
    }

    #[test]
    fn test_worker_exits_when_owner_closes() {
        let running = Arc::new(AtomicBool::new(true));
        let worker = Worker::<String>::spawn("owner-closed", running.clone(), || {
            thread::sleep(Duration::from_millis(1));
            Ok(())
        })
        .unwrap();

        running.store(false, Ordering::Release);
        assert!(worker.join().is_none());
    }

    #[test]
    fn test_worker_returns_error() {
        let running = Arc::new(AtomicBool::new(true));
        let mut calls = 0;
        let worker = Worker::spawn("failing", running, move || {
            calls += 1;
            if calls == 3 {
                Err(format!("failed after {} calls", calls))
            } else {
                Ok(())
            }
        })
        .unwrap();

        assert_eq!(worker.join(), Some("failed after 3 calls".to_string()));
    }

    #[test]
    fn test_worker_not_started_when_owner_closed() {
        let running = Arc::new(AtomicBool::new(false));
        let count = Arc::new(AtomicUsize::new(0));
        let counter = count.clone();
        let worker = Worker::<String>::spawn("never", running, move || {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        })
        .unwrap();

        assert!(worker.join().is_none());
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }
}
