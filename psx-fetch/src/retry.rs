//! Retry with exponential backoff and jitter.
//!
//! [`fetch_with_retry`] invokes a single-call operation until it succeeds,
//! fails with a terminal error, runs out of attempts, or is cancelled.
//! The wrapper keeps no state between calls: each invocation owns its own
//! delay, so concurrent callers never share a backoff schedule.

use std::collections::BTreeSet;
use std::time::Duration;

use psx_core::config::RetrySettings;

use crate::cancel::CancelToken;
use crate::error::{ErrorKind, FetchError, RequestError};

/// Jitter multiplies each delay by a factor drawn from `[0.8, 1.2)`.
const JITTER_LOW: f64 = 0.8;
const JITTER_SPAN: f64 = 0.4;

#[derive(Debug, Clone, PartialEq)]
pub struct RetryConfig {
    /// Total invocations allowed, including the first.
    pub max_attempts: u32,
    pub initial_delay: Duration,
    pub backoff_multiplier: f64,
    pub max_delay: Duration,
    pub jitter: bool,
    pub retryable: BTreeSet<ErrorKind>,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self::from(&RetrySettings::default())
    }
}

impl From<&RetrySettings> for RetryConfig {
    fn from(s: &RetrySettings) -> Self {
        let mut retryable =
            BTreeSet::from([ErrorKind::Timeout, ErrorKind::Connection, ErrorKind::Server]);
        if s.retry_rate_limited {
            retryable.insert(ErrorKind::RateLimited);
        }
        Self {
            max_attempts: s.max_attempts.max(1),
            initial_delay: Duration::from_millis(s.initial_delay_ms),
            backoff_multiplier: s.backoff_multiplier,
            max_delay: Duration::from_millis(
                s.max_delay_ms.min(RetrySettings::MAX_DELAY_CEILING_MS),
            ),
            jitter: s.jitter,
            retryable,
        }
    }
}

impl RetryConfig {
    /// Single attempt, no retries.
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    pub fn is_retryable(&self, kind: ErrorKind) -> bool {
        self.retryable.contains(&kind)
    }

    /// Delay after `current`: `min(current * multiplier, max_delay)`.
    pub fn next_delay(&self, current: Duration) -> Duration {
        let next = current.as_secs_f64() * self.backoff_multiplier;
        if !next.is_finite() || next >= self.max_delay.as_secs_f64() {
            self.max_delay
        } else {
            Duration::from_secs_f64(next.max(0.0))
        }
    }

    fn jittered(&self, delay: Duration) -> Duration {
        if !self.jitter {
            return delay;
        }
        let factor = JITTER_LOW + fastrand::f64() * JITTER_SPAN;
        Duration::try_from_secs_f64(delay.as_secs_f64() * factor).unwrap_or(delay)
    }
}

// ---------------------------------------------------------------------------
// Pause between attempts
// ---------------------------------------------------------------------------

/// How the retry loop waits between attempts.
///
/// Returns `true` when the wait ended because of cancellation.
pub trait Pause: Send + Sync {
    fn pause(&self, delay: Duration, cancel: &CancelToken) -> bool;
}

/// Blocks the calling thread only, interruptibly.
#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadPause;

impl Pause for ThreadPause {
    fn pause(&self, delay: Duration, cancel: &CancelToken) -> bool {
        cancel.sleep(delay)
    }
}

// ---------------------------------------------------------------------------
// Entry points
// ---------------------------------------------------------------------------

/// Run `op` under `config`, sleeping on the calling thread between attempts.
pub fn fetch_with_retry<T, F>(
    config: &RetryConfig,
    cancel: &CancelToken,
    op: F,
) -> Result<T, FetchError>
where
    F: FnMut() -> Result<T, RequestError>,
{
    fetch_with_retry_using(config, cancel, &ThreadPause, op)
}

/// [`fetch_with_retry`] with an explicit [`Pause`].
pub fn fetch_with_retry_using<T, F>(
    config: &RetryConfig,
    cancel: &CancelToken,
    pause: &dyn Pause,
    mut op: F,
) -> Result<T, FetchError>
where
    F: FnMut() -> Result<T, RequestError>,
{
    let max_attempts = config.max_attempts.max(1);
    let mut delay = config.initial_delay;
    let mut server_errors = 0u32;
    let mut attempt = 0u32;

    loop {
        if cancel.is_cancelled() {
            return Err(FetchError::Cancelled { attempts: attempt });
        }
        attempt += 1;

        let err = match op() {
            Ok(value) => {
                if attempt > 1 {
                    tracing::info!("succeeded on attempt {attempt}/{max_attempts}");
                }
                return Ok(value);
            }
            Err(err) => err,
        };

        if err.kind == ErrorKind::Server {
            server_errors += 1;
        }
        if !config.is_retryable(err.kind) {
            tracing::warn!("not retrying {} error: {}", err.kind, err.message);
            return Err(FetchError::Rejected {
                attempts: attempt,
                error: err,
            });
        }
        if attempt >= max_attempts {
            tracing::error!(
                "giving up after {attempt} attempts ({server_errors} server errors): {}",
                err.message
            );
            return Err(FetchError::Exhausted {
                attempts: attempt,
                server_errors,
                last: Box::new(err),
            });
        }

        let wait = config.jittered(delay);
        tracing::warn!(
            "attempt {attempt}/{max_attempts} failed ({}): {}; retrying in {:.1}s",
            err.kind,
            err.message,
            wait.as_secs_f64()
        );
        if pause.pause(wait, cancel) {
            return Err(FetchError::Cancelled { attempts: attempt });
        }
        delay = config.next_delay(delay);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingPause {
        waits: Mutex<Vec<Duration>>,
    }

    impl RecordingPause {
        fn waits(&self) -> Vec<Duration> {
            self.waits.lock().unwrap().clone()
        }
    }

    impl Pause for RecordingPause {
        fn pause(&self, delay: Duration, cancel: &CancelToken) -> bool {
            self.waits.lock().unwrap().push(delay);
            cancel.is_cancelled()
        }
    }

    fn config(max_attempts: u32) -> RetryConfig {
        RetryConfig {
            max_attempts,
            initial_delay: Duration::from_millis(100),
            backoff_multiplier: 2.0,
            max_delay: Duration::from_millis(300),
            jitter: false,
            ..RetryConfig::default()
        }
    }

    fn server_error() -> RequestError {
        RequestError::from_status(503, "https://dps.psx.com.pk/market-watch")
    }

    #[test]
    fn success_returns_immediately() {
        let pause = RecordingPause::default();
        let calls = Cell::new(0);
        let out = fetch_with_retry_using(&config(3), &CancelToken::new(), &pause, || {
            calls.set(calls.get() + 1);
            Ok::<_, RequestError>(42)
        });
        assert_eq!(out.unwrap(), 42);
        assert_eq!(calls.get(), 1);
        assert!(pause.waits().is_empty());
    }

    #[test]
    fn retryable_error_exhausts_after_max_attempts() {
        let pause = RecordingPause::default();
        let calls = Cell::new(0);
        let err = fetch_with_retry_using(&config(3), &CancelToken::new(), &pause, || {
            calls.set(calls.get() + 1);
            Err::<(), _>(server_error())
        })
        .unwrap_err();

        assert_eq!(calls.get(), 3);
        assert!(matches!(err, FetchError::Exhausted { attempts: 3, .. }), "got: {err}");
        assert!(err.exhausted_by_server_errors());
        assert_eq!(pause.waits().len(), 2, "no sleep after the final attempt");
    }

    #[test]
    fn terminal_error_fails_fast_without_sleeping() {
        let pause = RecordingPause::default();
        let calls = Cell::new(0);
        let err = fetch_with_retry_using(&config(3), &CancelToken::new(), &pause, || {
            calls.set(calls.get() + 1);
            Err::<(), _>(RequestError::from_status(404, "https://dps.psx.com.pk/company/NOPE"))
        })
        .unwrap_err();

        assert_eq!(calls.get(), 1);
        assert!(matches!(
            err,
            FetchError::Rejected { attempts: 1, ref error } if error.kind == ErrorKind::Client
        ));
        assert!(pause.waits().is_empty());
    }

    #[test]
    fn malformed_response_is_terminal() {
        let pause = RecordingPause::default();
        let err = fetch_with_retry_using(&config(5), &CancelToken::new(), &pause, || {
            Err::<(), _>(RequestError::malformed("no SYMBOL column"))
        })
        .unwrap_err();
        assert_eq!(err.attempts(), 1);
        assert_eq!(err.kind(), Some(ErrorKind::Malformed));
    }

    #[test]
    fn recovers_after_transient_failures() {
        let pause = RecordingPause::default();
        let calls = Cell::new(0);
        let out = fetch_with_retry_using(&config(4), &CancelToken::new(), &pause, || {
            calls.set(calls.get() + 1);
            if calls.get() < 3 {
                Err(RequestError::new(ErrorKind::Connection, "connection reset"))
            } else {
                Ok("page")
            }
        });
        assert_eq!(out.unwrap(), "page");
        assert_eq!(calls.get(), 3);
    }

    #[test]
    fn backoff_grows_and_caps_at_max_delay() {
        let pause = RecordingPause::default();
        let _ = fetch_with_retry_using(&config(5), &CancelToken::new(), &pause, || {
            Err::<(), _>(RequestError::new(ErrorKind::Timeout, "timed out"))
        });
        assert_eq!(
            pause.waits(),
            vec![
                Duration::from_millis(100),
                Duration::from_millis(200),
                Duration::from_millis(300),
                Duration::from_millis(300),
            ]
        );
    }

    #[test]
    fn jitter_stays_within_band() {
        let cfg = RetryConfig {
            jitter: true,
            ..config(2)
        };
        for _ in 0..50 {
            let d = cfg.jittered(Duration::from_millis(1000));
            assert!(d >= Duration::from_millis(800), "{d:?}");
            assert!(d <= Duration::from_millis(1200), "{d:?}");
        }
    }

    #[test]
    fn extreme_delays_do_not_overflow() {
        let cfg = RetryConfig {
            initial_delay: Duration::MAX,
            max_delay: Duration::MAX,
            backoff_multiplier: f64::MAX,
            jitter: true,
            ..config(3)
        };
        assert_eq!(cfg.next_delay(Duration::MAX), Duration::MAX);
        let _ = cfg.jittered(Duration::MAX);

        let settings = RetrySettings {
            max_delay_ms: u64::MAX,
            ..RetrySettings::default()
        };
        assert_eq!(
            RetryConfig::from(&settings).max_delay,
            Duration::from_millis(RetrySettings::MAX_DELAY_CEILING_MS)
        );
    }

    #[test]
    fn rejection_after_retries_reports_every_attempt() {
        let pause = RecordingPause::default();
        let calls = Cell::new(0);
        let err = fetch_with_retry_using(&config(5), &CancelToken::new(), &pause, || {
            calls.set(calls.get() + 1);
            if calls.get() == 1 {
                Err::<(), _>(server_error())
            } else {
                Err(RequestError::from_status(404, "https://dps.psx.com.pk/company/GONE"))
            }
        })
        .unwrap_err();
        assert_eq!(calls.get(), 2);
        assert_eq!(err.attempts(), 2);
        assert_eq!(err.kind(), Some(ErrorKind::Client));
    }

    #[test]
    fn rate_limit_follows_settings() {
        let mut settings = RetrySettings::default();
        assert!(RetryConfig::from(&settings).is_retryable(ErrorKind::RateLimited));
        settings.retry_rate_limited = false;
        let cfg = RetryConfig::from(&settings);
        assert!(!cfg.is_retryable(ErrorKind::RateLimited));
        assert!(!cfg.is_retryable(ErrorKind::Client));
        assert!(cfg.is_retryable(ErrorKind::Server));
    }

    #[test]
    fn cancelled_token_stops_before_first_attempt() {
        let cancel = CancelToken::new();
        cancel.cancel();
        let calls = Cell::new(0);
        let err = fetch_with_retry_using(&config(3), &cancel, &RecordingPause::default(), || {
            calls.set(calls.get() + 1);
            Ok::<_, RequestError>(())
        })
        .unwrap_err();
        assert_eq!(calls.get(), 0);
        assert!(matches!(err, FetchError::Cancelled { attempts: 0 }));
    }

    #[test]
    fn cancellation_during_pause_ends_the_sequence() {
        let cancel = CancelToken::new();
        let calls = Cell::new(0);
        let err = fetch_with_retry_using(&config(5), &cancel, &RecordingPause::default(), || {
            calls.set(calls.get() + 1);
            cancel.cancel();
            Err::<(), _>(server_error())
        })
        .unwrap_err();
        assert_eq!(calls.get(), 1);
        assert!(matches!(err, FetchError::Cancelled { attempts: 1 }));
    }
}
