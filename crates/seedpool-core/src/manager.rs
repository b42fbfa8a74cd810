//! Entropy-managed generator with automatic reseeding from a pool.
//!
//! Before each draw of cost `c` the manager looks at the budget that would be
//! left afterwards:
//!
//! ```text
//!   entropy - c <= minimum            forced reseed (blocking read)
//!   minimum < entropy - c < desired   best-effort reseed (non-blocking poll)
//!   otherwise                         no reseed
//! ```
//!
//! then debits `c`. Since a fresh generator holds more than
//! [`MAX_BITS_PER_CALL`] bits above `minimum`, a successful forced reseed
//! always leaves the budget above `minimum` after the draw.
//!
//! Seed bytes gathered by unsuccessful best-effort attempts are kept and
//! completed later, so no pool byte is wasted.

use log::{debug, warn};
use rand::RngCore;
use serde::{Deserialize, Serialize};

use crate::entropy::{BYTE_BITS, CountedRng, EntropyTracker, MAX_BITS_PER_CALL};
use crate::error::{ConfigError, PoolError};
use crate::queue::ByteQueue;
use crate::reseed::Reseedable;
use crate::wait::CancelToken;

/// Entropy levels that trigger reseeding, in bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReseedThresholds {
    /// Below this, reseed if the pool has bytes ready.
    pub desired: i64,
    /// At or below this, reseed even if it means waiting for the pool.
    pub minimum: i64,
}

impl Default for ReseedThresholds {
    fn default() -> Self {
        Self {
            desired: 128,
            minimum: 64,
        }
    }
}

impl ReseedThresholds {
    /// Check the thresholds against a generator's fresh-state entropy.
    pub fn validate(&self, fresh_entropy: i64) -> Result<(), ConfigError> {
        if self.minimum > self.desired {
            return Err(ConfigError::ThresholdOrder {
                desired: self.desired,
                minimum: self.minimum,
            });
        }
        if fresh_entropy - self.minimum <= MAX_BITS_PER_CALL {
            return Err(ConfigError::InsufficientMargin {
                fresh: fresh_entropy,
                minimum: self.minimum,
                max_cost: MAX_BITS_PER_CALL,
            });
        }
        Ok(())
    }
}

/// A counted generator that reseeds itself from a [`ByteQueue`].
pub struct EntropyManager<S, Q> {
    tracker: EntropyTracker<S>,
    pool: Q,
    thresholds: ReseedThresholds,
    holder: Box<[u8]>,
    have: usize,
    cancel: CancelToken,
    reseeds: u64,
    last_error: Option<PoolError>,
}

impl<S: Reseedable, Q: ByteQueue> EntropyManager<S, Q> {
    /// Wrap `rng`, starting from its fresh-state entropy.
    pub fn new(rng: S, thresholds: ReseedThresholds, pool: Q) -> Result<Self, ConfigError> {
        let fresh = rng.claimed_entropy_bits();
        Self::with_initial_entropy(rng, fresh, thresholds, pool)
    }

    /// Wrap `rng`, crediting it with `initial_bits` until the first reseed.
    ///
    /// Use this for generators seeded from something weaker than the pool,
    /// such as a constant or a clock. Thresholds are still checked against
    /// the fresh-state entropy, which is what every later reseed restores.
    pub fn with_initial_entropy(
        rng: S,
        initial_bits: i64,
        thresholds: ReseedThresholds,
        pool: Q,
    ) -> Result<Self, ConfigError> {
        thresholds.validate(rng.claimed_entropy_bits())?;
        let holder = vec![0u8; rng.required_seed_bytes()].into_boxed_slice();
        Ok(Self {
            tracker: EntropyTracker::with_initial_entropy(rng, initial_bits),
            pool,
            thresholds,
            holder,
            have: 0,
            cancel: CancelToken::new(),
            reseeds: 0,
            last_error: None,
        })
    }

    /// Use `cancel` to interrupt forced reseeds that are waiting on the pool.
    pub fn with_cancel_token(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn thresholds(&self) -> ReseedThresholds {
        self.thresholds
    }

    pub fn pool(&self) -> &Q {
        &self.pool
    }

    /// Successful reseeds so far.
    pub fn reseed_count(&self) -> u64 {
        self.reseeds
    }

    /// Why the most recent failed forced reseed failed, if any has.
    pub fn last_reseed_error(&self) -> Option<PoolError> {
        self.last_error
    }

    /// Seed bytes already gathered towards the next reseed.
    pub fn pending_seed_bytes(&self) -> usize {
        self.have
    }

    /// Reseed now, waiting for the pool if necessary.
    pub fn reseed_now(&mut self) -> Result<(), PoolError> {
        self.force_reseed()
    }

    /// Unwrap the generator.
    pub fn into_inner(self) -> S {
        self.tracker.into_inner()
    }

    // -----------------------------------------------------------------------
    // Reseeding
    // -----------------------------------------------------------------------

    /// Reseed if the pool has enough bytes ready right now.
    fn try_reseed(&mut self) -> bool {
        while self.have < self.holder.len() {
            let n = self.pool.poll(&mut self.holder[self.have..]);
            if n == 0 {
                break;
            }
            self.have += n;
        }
        if self.have < self.holder.len() {
            return false;
        }
        self.apply_seed();
        true
    }

    fn force_reseed(&mut self) -> Result<(), PoolError> {
        match self.pool.read(&mut self.holder[self.have..], &self.cancel) {
            Ok(()) => {
                self.apply_seed();
                Ok(())
            }
            Err(e) => {
                self.have += e.transferred();
                warn!(
                    "forced reseed failed with {} of {} seed bytes: {e}",
                    self.have,
                    self.holder.len()
                );
                self.last_error = Some(e);
                Err(e)
            }
        }
    }

    fn apply_seed(&mut self) {
        let rng = self.tracker.generator();
        rng.apply_seed(&self.holder);
        let fresh = rng.claimed_entropy_bits();
        let strategy = rng.strategy();
        self.tracker.reset_entropy(fresh);
        self.holder.fill(0);
        self.have = 0;
        self.reseeds += 1;
        debug!(
            "reseeded via {strategy} from {} bytes, entropy now {fresh} bits",
            self.holder.len()
        );
    }

    /// Reseed as needed ahead of a draw costing `bits`.
    fn prepare(&mut self, bits: i64) {
        let after = self.tracker.entropy_bits() - bits;
        if after <= self.thresholds.minimum {
            // Failure is recorded; the draw goes ahead on the current budget.
            let _ = self.force_reseed();
        } else if after < self.thresholds.desired {
            self.try_reseed();
        }
    }

    /// Whole bytes drawable while keeping the budget above `threshold`.
    fn bytes_above(&self, threshold: i64) -> usize {
        let spare = self.tracker.entropy_bits() - threshold - 1;
        usize::try_from(spare / BYTE_BITS).unwrap_or(0)
    }
}

impl<S: Reseedable, Q: ByteQueue> CountedRng for EntropyManager<S, Q> {
    type Rng = S;

    fn generator(&mut self) -> &mut S {
        self.tracker.generator()
    }

    fn debit(&mut self, bits: i64) {
        self.prepare(bits);
        self.tracker.debit(bits);
    }

    fn entropy_bits(&self) -> i64 {
        self.tracker.entropy_bits()
    }

    /// Fill `dest` in segments that each fit the budget above `desired`,
    /// reseeding between segments.
    fn draw_bytes(&mut self, dest: &mut [u8]) {
        let mut written = 0;
        while written < dest.len() {
            let mut segment = self.bytes_above(self.thresholds.desired);
            if segment == 0 {
                self.prepare(BYTE_BITS);
                segment = self.bytes_above(self.thresholds.desired).max(1);
            }
            let end = dest.len().min(written + segment);
            self.tracker.draw_bytes(&mut dest[written..end]);
            written = end;
        }
    }
}

impl<S: Reseedable, Q: ByteQueue> RngCore for EntropyManager<S, Q> {
    fn next_u32(&mut self) -> u32 {
        self.draw_u32()
    }

    fn next_u64(&mut self) -> u64 {
        self.draw_u64()
    }

    fn fill_bytes(&mut self, dest: &mut [u8]) {
        self.draw_bytes(dest)
    }
}

impl<S, Q> std::fmt::Debug for EntropyManager<S, Q>
where
    S: Reseedable,
    Q: ByteQueue,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EntropyManager")
            .field("entropy_bits", &self.tracker.entropy_bits())
            .field("thresholds", &self.thresholds)
            .field("pending_seed_bytes", &self.have)
            .field("reseeds", &self.reseeds)
            .field("last_error", &self.last_error)
            .finish_non_exhaustive()
    }
}
