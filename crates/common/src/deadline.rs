//! Wait budget for blocking calls
//!
//! A [`Deadline`] is created at the start of one blocking call and consulted
//! on every iteration of its wait loop. `None` means wait forever,
//! `Some(Duration::ZERO)` means never wait, anything else is a bounded budget
//! measured on the monotonic clock. A budget too large for the clock to
//! represent is treated as infinite.

use std::cell::Cell;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Infinite,
    NonBlocking,
    Bounded(Duration),
}

impl Mode {
    fn from_timeout(timeout: Option<Duration>) -> Self {
        match timeout {
            None => Mode::Infinite,
            Some(duration) if duration.is_zero() => Mode::NonBlocking,
            Some(duration) => Mode::Bounded(duration),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Deadline {
    mode: Mode,
    target: Cell<Instant>,
}

impl Deadline {
    pub fn new(timeout: Option<Duration>) -> Self {
        let now = Instant::now();
        let (mode, target) = match Mode::from_timeout(timeout) {
            Mode::Bounded(duration) => match now.checked_add(duration) {
                Some(target) => (Mode::Bounded(duration), target),
                // Past the end of the monotonic clock
                None => (Mode::Infinite, now),
            },
            mode => (mode, now),
        };
        Self {
            mode,
            target: Cell::new(target),
        }
    }

    /// Reinitialise mode and target from now
    pub fn restart(&mut self, timeout: Option<Duration>) {
        *self = Self::new(timeout);
    }

    pub fn expired(&self) -> bool {
        match self.mode {
            Mode::Infinite => false,
            Mode::NonBlocking => true,
            Mode::Bounded(_) => self.time_left() == Some(Duration::ZERO),
        }
    }

    /// Remaining budget, `None` for an infinite deadline
    ///
    /// Never exceeds the original duration: if the clock is observed to
    /// leave more than that, the target is re-anchored at now + duration.
    pub fn time_left(&self) -> Option<Duration> {
        match self.mode {
            Mode::Infinite => None,
            Mode::NonBlocking => Some(Duration::ZERO),
            Mode::Bounded(duration) => {
                let now = Instant::now();
                let remaining = self.target.get().saturating_duration_since(now);
                if remaining > duration {
                    if let Some(target) = now.checked_add(duration) {
                        self.target.set(target);
                    }
                    return Some(duration);
                }
                Some(remaining)
            }
        }
    }

    /// Length of the next wait: the remaining budget capped at `slice`
    pub fn next_wait(&self, slice: Duration) -> Duration {
        self.time_left().map_or(slice, |left| left.min(slice))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_zero_is_expired_immediately() {
        let deadline = Deadline::new(Some(Duration::ZERO));
        assert!(deadline.expired());
        assert_eq!(deadline.time_left(), Some(Duration::ZERO));
    }

    #[test]
    fn test_none_never_expires() {
        let deadline = Deadline::new(None);
        assert!(!deadline.expired());
        assert_eq!(deadline.time_left(), None);
        assert_eq!(
            deadline.next_wait(Duration::from_millis(500)),
            Duration::from_millis(500)
        );
    }

    #[test]
    fn test_bounded_time_left_is_monotonic_and_floors_at_zero() {
        let budget = Duration::from_millis(40);
        let deadline = Deadline::new(Some(budget));
        assert!(!deadline.expired());

        let mut previous = deadline.time_left().unwrap();
        assert!(previous <= budget);
        for _ in 0..6 {
            thread::sleep(Duration::from_millis(10));
            let left = deadline.time_left().unwrap();
            assert!(left <= previous);
            previous = left;
        }

        assert!(deadline.expired());
        assert_eq!(deadline.time_left(), Some(Duration::ZERO));
    }

    #[test]
    fn test_next_wait_is_capped() {
        let deadline = Deadline::new(Some(Duration::from_secs(10)));
        assert_eq!(
            deadline.next_wait(Duration::from_millis(100)),
            Duration::from_millis(100)
        );

        let deadline = Deadline::new(Some(Duration::from_millis(5)));
        assert!(deadline.next_wait(Duration::from_secs(1)) <= Duration::from_millis(5));
    }

    #[test]
    fn test_restart() {
        let mut deadline = Deadline::new(Some(Duration::ZERO));
        assert!(deadline.expired());

        deadline.restart(Some(Duration::from_secs(5)));
        assert!(!deadline.expired());

        deadline.restart(None);
        assert!(!deadline.expired());
        assert_eq!(deadline.time_left(), None);
    }

    #[test]
    fn test_unrepresentable_timeout_waits_forever() {
        let deadline = Deadline::new(Some(Duration::MAX));
        assert!(!deadline.expired());
        assert_eq!(deadline.time_left(), None);
        assert_eq!(
            deadline.next_wait(Duration::from_millis(50)),
            Duration::from_millis(50)
        );
    }

    #[test]
    fn test_clock_jump_reanchors_target() {
        let budget = Duration::from_millis(100);
        let deadline = Deadline::new(Some(budget));
        // Simulate a target that drifted far into the future
        deadline.target.set(Instant::now() + Duration::from_secs(3600));

        assert_eq!(deadline.time_left(), Some(budget));
        assert!(deadline.target.get() <= Instant::now() + budget);
    }
}
