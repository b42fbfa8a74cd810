//! Cooperative waiting: cancellation tokens and spin backoff.
//!
//! Every blocking loop in the crate busy-polls. [`Backoff`] issues a processor
//! spin hint between attempts and starts yielding the thread once a loop has
//! missed often enough that the other side is probably descheduled.
//! [`CancelToken`] is checked once per iteration.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Cloneable cooperative cancellation flag.
///
/// All clones observe the same flag. Cancellation is one-way.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    /// Create a token that has not been cancelled.
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation. Idempotent.
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Release);
    }

    /// Whether [`cancel`](Self::cancel) has been called on any clone.
    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Acquire)
    }
}

/// Number of consecutive misses served with a spin hint before yielding.
const SPINS_BEFORE_YIELD: u32 = 64;

/// Spin-then-yield backoff for busy-poll loops.
#[derive(Debug, Default)]
pub(crate) struct Backoff {
    misses: u32,
}

impl Backoff {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Record an unsuccessful attempt and pause accordingly.
    pub(crate) fn snooze(&mut self) {
        if self.misses < SPINS_BEFORE_YIELD {
            self.misses += 1;
            std::hint::spin_loop();
        } else {
            std::thread::yield_now();
        }
    }

    /// Record progress; the next miss starts spinning again.
    pub(crate) fn reset(&mut self) {
        self.misses = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_starts_live() {
        assert!(!CancelToken::new().is_cancelled());
    }

    #[test]
    fn test_cancel_visible_through_clones() {
        let a = CancelToken::new();
        let b = a.clone();
        b.cancel();
        assert!(a.is_cancelled());
        a.cancel();
        assert!(b.is_cancelled());
    }

    #[test]
    fn test_backoff_reset() {
        let mut backoff = Backoff::new();
        for _ in 0..(SPINS_BEFORE_YIELD + 5) {
            backoff.snooze();
        }
        assert_eq!(backoff.misses, SPINS_BEFORE_YIELD);
        backoff.reset();
        assert_eq!(backoff.misses, 0);
    }
}
