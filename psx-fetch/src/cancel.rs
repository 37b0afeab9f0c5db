//! Cooperative cancellation for retry sequences.
//!
//! A [`CancelToken`] is cheap to clone; all clones share one flag. It can
//! also carry a deadline, after which it reports itself cancelled.
//! [`CancelToken::sleep`] is the interruptible wait the retry loop uses
//! between attempts.

use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

#[derive(Debug, Default)]
struct Inner {
    cancelled: Mutex<bool>,
    wake: Condvar,
    deadline: Option<Instant>,
}

#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    inner: Arc<Inner>,
}

impl CancelToken {
    /// A token that is only cancelled explicitly.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_deadline(deadline: Instant) -> Self {
        Self {
            inner: Arc::new(Inner {
                deadline: Some(deadline),
                ..Inner::default()
            }),
        }
    }

    /// Deadline `timeout` from now.
    pub fn with_timeout(timeout: Duration) -> Self {
        match Instant::now().checked_add(timeout) {
            Some(deadline) => Self::with_deadline(deadline),
            None => Self::new(),
        }
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.inner.deadline
    }

    /// Cancel every clone and wake any sleeper.
    pub fn cancel(&self) {
        *self.flag() = true;
        self.inner.wake.notify_all();
    }

    pub fn is_cancelled(&self) -> bool {
        *self.flag() || self.deadline_passed()
    }

    /// Block for up to `duration`, returning early on cancellation or at
    /// the deadline. Returns `true` when the token is cancelled on wake.
    pub fn sleep(&self, duration: Duration) -> bool {
        let until = Instant::now().checked_add(duration);
        let until = match (until, self.inner.deadline) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        };

        let mut cancelled = self.flag();
        while !*cancelled {
            match until {
                Some(until) => {
                    let now = Instant::now();
                    if now >= until {
                        break;
                    }
                    cancelled = self
                        .inner
                        .wake
                        .wait_timeout(cancelled, until - now)
                        .unwrap_or_else(PoisonError::into_inner)
                        .0;
                }
                None => {
                    cancelled = self
                        .inner
                        .wake
                        .wait(cancelled)
                        .unwrap_or_else(PoisonError::into_inner);
                }
            }
        }
        let flagged = *cancelled;
        drop(cancelled);
        flagged || self.deadline_passed()
    }

    fn flag(&self) -> MutexGuard<'_, bool> {
        self.inner
            .cancelled
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn deadline_passed(&self) -> bool {
        self.inner
            .deadline
            .is_some_and(|deadline| Instant::now() >= deadline)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn fresh_token_is_not_cancelled() {
        let token = CancelToken::new();
        assert!(!token.is_cancelled());
        assert!(!token.sleep(Duration::from_millis(1)));
    }

    #[test]
    fn cancel_is_shared_between_clones() {
        let token = CancelToken::new();
        let clone = token.clone();
        clone.cancel();
        assert!(token.is_cancelled());
    }

    #[test]
    fn cancel_wakes_a_sleeper() {
        let token = CancelToken::new();
        let remote = token.clone();
        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            remote.cancel();
        });
        let started = Instant::now();
        assert!(token.sleep(Duration::from_secs(30)));
        assert!(started.elapsed() < Duration::from_secs(10));
        handle.join().unwrap();
    }

    #[test]
    fn deadline_cuts_sleep_short() {
        let token = CancelToken::with_timeout(Duration::from_millis(10));
        let started = Instant::now();
        assert!(token.sleep(Duration::from_secs(30)));
        assert!(started.elapsed() < Duration::from_secs(10));
        assert!(token.is_cancelled());
    }
}
