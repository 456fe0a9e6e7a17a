//! Retry policy with exponential backoff and jitter.
//!
//! The policy is a plain value consumed by the fetch operation. It never sleeps
//! or draws randomness on its own: both come in through [`Pause`] and a
//! `rand::Rng`, so tests can drive it deterministically and instantly.

use std::cell::RefCell;
use std::time::Duration;

use rand::Rng;
use tracing::warn;

use super::provider::DataError;

/// Something that can wait. Production code sleeps the thread.
pub trait Pause {
    fn pause(&self, duration: Duration);
}

/// Blocks the current thread.
#[derive(Debug, Default, Clone, Copy)]
pub struct ThreadPause;

impl Pause for ThreadPause {
    fn pause(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

/// Records requested pauses without waiting.
#[derive(Debug, Default)]
pub struct RecordingPause {
    pauses: RefCell<Vec<Duration>>,
}

impl RecordingPause {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn recorded(&self) -> Vec<Duration> {
        self.pauses.borrow().clone()
    }
}

impl Pause for RecordingPause {
    fn pause(&self, duration: Duration) {
        self.pauses.borrow_mut().push(duration);
    }
}

/// Backoff schedule: `base * multiplier^k + U[0, jitter)` before retry `k`.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub multiplier: f64,
    pub jitter: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 4,
            base_delay: Duration::from_secs(2),
            multiplier: 1.6,
            jitter: Duration::from_millis(750),
        }
    }
}

/// Tagged result of running an operation under a [`RetryPolicy`].
#[derive(Debug)]
pub enum FetchOutcome<T> {
    Fetched { value: T, attempts: u32 },
    Failed { attempts: u32, last_error: DataError },
}

impl<T> FetchOutcome<T> {
    pub fn attempts(&self) -> u32 {
        match self {
            FetchOutcome::Fetched { attempts, .. } | FetchOutcome::Failed { attempts, .. } => {
                *attempts
            }
        }
    }

    pub fn is_fetched(&self) -> bool {
        matches!(self, FetchOutcome::Fetched { .. })
    }
}

impl RetryPolicy {
    /// Deterministic part of the delay before retry number `retry` (0-based).
    pub fn backoff(&self, retry: u32) -> Duration {
        let exp = i32::try_from(retry).unwrap_or(i32::MAX);
        self.base_delay.mul_f64(self.multiplier.powi(exp))
    }

    /// Full delay before retry number `retry`, jitter included.
    pub fn delay_before_retry<R: Rng>(&self, retry: u32, rng: &mut R) -> Duration {
        let jitter = if self.jitter.is_zero() {
            Duration::ZERO
        } else {
            self.jitter.mul_f64(rng.gen::<f64>())
        };
        self.backoff(retry) + jitter
    }

    /// Run `op` until it succeeds, fails with a non-transient error, or the
    /// attempt budget is spent. `op` receives the 1-based attempt number.
    pub fn run<T, F, R>(&self, pause: &dyn Pause, rng: &mut R, mut op: F) -> FetchOutcome<T>
    where
        F: FnMut(u32) -> Result<T, DataError>,
        R: Rng,
    {
        let max_attempts = self.max_attempts.max(1);
        let mut attempt = 1;
        loop {
            match op(attempt) {
                Ok(value) => {
                    return FetchOutcome::Fetched {
                        value,
                        attempts: attempt,
                    }
                }
                Err(e) if !e.is_transient() || attempt >= max_attempts => {
                    return FetchOutcome::Failed {
                        attempts: attempt,
                        last_error: e,
                    }
                }
                Err(e) => {
                    let delay = self.delay_before_retry(attempt - 1, rng);
                    warn!(
                        attempt,
                        max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        "transient fetch failure: {e}"
                    );
                    pause.pause(delay);
                    attempt += 1;
                }
            }
        }
    }
}
