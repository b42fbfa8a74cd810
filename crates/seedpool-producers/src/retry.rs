//! Bounded retry with backoff for unreliable seed sources.
//!
//! [`RetryingSource`] wraps any [`SeedSource`]. On a transport failure it waits
//! `min(retry_delay, advised_delay)` (or `retry_delay` when the source advised
//! nothing) and tries again, up to `max_retries` times. After a success that
//! came with an advised delay, the next request waits the same way first.
//!
//! Waiting goes through a [`Sleeper`] so tests can run without real delays.

use std::sync::Arc;
use std::time::Duration;

use log::{debug, warn};
use parking_lot::Mutex;
use seedpool_core::CancelToken;
use serde::{Deserialize, Serialize};

use crate::error::SeedError;
use crate::source::SeedSource;

/// Retry budget for a [`RetryingSource`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Retries after the first attempt.
    pub max_retries: u32,
    /// Longest wait between attempts, in milliseconds.
    pub retry_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 5,
            retry_delay_ms: 250,
        }
    }
}

impl RetryConfig {
    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    /// Wait before the next attempt given what the source advised.
    pub fn wait_for(&self, advised: Option<Duration>) -> Duration {
        match advised {
            Some(advised) => advised.min(self.retry_delay()),
            None => self.retry_delay(),
        }
    }
}

// ---------------------------------------------------------------------------
// Sleepers
// ---------------------------------------------------------------------------

/// How a [`RetryingSource`] waits.
pub trait Sleeper: Send {
    fn sleep(&mut self, duration: Duration);
}

/// Slice length for cancellable sleeps.
const SLEEP_SLICE: Duration = Duration::from_millis(50);

/// Real sleeps on the current thread, optionally cut short by a cancel token.
#[derive(Debug, Clone, Default)]
pub struct ThreadSleeper {
    cancel: Option<CancelToken>,
}

impl ThreadSleeper {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sleep in short slices and return early once `cancel` fires.
    pub fn with_cancel(cancel: CancelToken) -> Self {
        Self {
            cancel: Some(cancel),
        }
    }
}

impl Sleeper for ThreadSleeper {
    fn sleep(&mut self, duration: Duration) {
        let Some(cancel) = &self.cancel else {
            std::thread::sleep(duration);
            return;
        };
        let mut left = duration;
        while !left.is_zero() && !cancel.is_cancelled() {
            let step = left.min(SLEEP_SLICE);
            std::thread::sleep(step);
            left -= step;
        }
    }
}

/// Records requested sleeps instead of sleeping. Clones share one log.
#[derive(Debug, Clone, Default)]
pub struct RecordingSleeper {
    log: Arc<Mutex<Vec<Duration>>>,
}

impl RecordingSleeper {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every sleep requested so far, in order.
    pub fn sleeps(&self) -> Vec<Duration> {
        self.log.lock().clone()
    }
}

impl Sleeper for RecordingSleeper {
    fn sleep(&mut self, duration: Duration) {
        self.log.lock().push(duration);
    }
}

// ---------------------------------------------------------------------------
// Retrying source
// ---------------------------------------------------------------------------

/// A [`SeedSource`] that retries transport failures of its inner source.
pub struct RetryingSource<S, Z = ThreadSleeper> {
    inner: S,
    config: RetryConfig,
    sleeper: Z,
    pending_wait: Option<Duration>,
}

impl<S: SeedSource> RetryingSource<S> {
    pub fn new(inner: S, config: RetryConfig) -> Self {
        Self::with_sleeper(inner, config, ThreadSleeper::new())
    }
}

impl<S: SeedSource, Z: Sleeper> RetryingSource<S, Z> {
    pub fn with_sleeper(inner: S, config: RetryConfig, sleeper: Z) -> Self {
        Self {
            inner,
            config,
            sleeper,
            pending_wait: None,
        }
    }

    pub fn config(&self) -> RetryConfig {
        self.config
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }
}

impl<S: SeedSource, Z: Sleeper> SeedSource for RetryingSource<S, Z> {
    fn fill(&mut self, dest: &mut [u8]) -> Result<(), SeedError> {
        if let Some(wait) = self.pending_wait.take() {
            debug!("{}: waiting {wait:?} as advised", self.inner.name());
            self.sleeper.sleep(wait);
        }

        let attempts = self.config.max_retries.saturating_add(1);
        let mut attempt = 0;
        loop {
            attempt += 1;
            let err = match self.inner.fill(dest) {
                Ok(()) => {
                    self.pending_wait = self
                        .inner
                        .advised_delay()
                        .map(|advised| self.config.wait_for(Some(advised)));
                    return Ok(());
                }
                Err(e) if e.is_retryable() => e,
                Err(e) => return Err(e),
            };

            if attempt >= attempts {
                warn!(
                    "{}: giving up after {attempt} attempts: {err}",
                    self.inner.name()
                );
                return Err(SeedError::RetriesExhausted {
                    attempts: attempt,
                    last: Box::new(err),
                });
            }

            let advised = match &err {
                SeedError::Transport { advised_delay, .. } => *advised_delay,
                _ => None,
            };
            let wait = self.config.wait_for(advised);
            warn!(
                "{}: attempt {attempt}/{attempts} failed ({err}), retrying in {wait:?}",
                self.inner.name()
            );
            self.sleeper.sleep(wait);
        }
    }

    fn max_request_size(&self) -> usize {
        self.inner.max_request_size()
    }

    fn advised_delay(&self) -> Option<Duration> {
        self.pending_wait
    }

    fn name(&self) -> &str {
        self.inner.name()
    }
}
