//! Error types shared by the pool, the fairness wrappers and the entropy layer.
//!
//! Two families exist:
//! - [`ConfigError`]: a bad parameter detected at construction. Always fatal,
//!   never clamped.
//! - [`PoolError`]: a blocking transfer that ended before moving every byte.
//!   Full and empty pools are not errors; `offer`/`poll` report them as `0`.

use thiserror::Error;

/// Invalid construction parameter.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// Pool capacity of zero.
    #[error("pool capacity must be positive")]
    ZeroCapacity,

    /// Pool capacity that cannot be masked.
    #[error("pool capacity must be a power of two, got {0}")]
    CapacityNotPowerOfTwo(usize),

    /// `minimum` above `desired`.
    #[error("minimum entropy {minimum} exceeds desired entropy {desired}")]
    ThresholdOrder {
        /// Configured desired level in bits.
        desired: i64,
        /// Configured minimum level in bits.
        minimum: i64,
    },

    /// A single draw could push entropy below `minimum` straight after a reseed.
    #[error(
        "fresh entropy {fresh} minus minimum {minimum} must exceed the largest \
         single-draw cost of {max_cost} bits"
    )]
    InsufficientMargin {
        /// Entropy of the generator right after a reseed.
        fresh: i64,
        /// Configured minimum level in bits.
        minimum: i64,
        /// Largest bit cost of any single draw.
        max_cost: i64,
    },

    /// Jump or leap count that is zero or not a power of two.
    #[error("{what} must be a positive power of two, got {value}")]
    CountNotPowerOfTwo {
        /// Which parameter was rejected.
        what: &'static str,
        /// The rejected value.
        value: u64,
    },

    /// Jump and leap fields do not fit one 64-bit seed value.
    #[error("jump and leap fields need {0} bits, more than 64")]
    SeedTooWide(u32),

    /// Zero-byte seed for a strategy that needs at least one byte.
    #[error("seed size must be at least one byte")]
    EmptySeed,

    /// Fairness turn that could never move a byte.
    #[error("fairness turn limits must be at least 1 (bytes={max_bytes}, calls={max_calls})")]
    EmptyTurn {
        /// Configured byte limit per turn.
        max_bytes: usize,
        /// Configured delegate-call limit per turn.
        max_calls: u64,
    },

    /// Seed wider than the distances a jumpable generator can tell apart.
    #[error("seed of {seed_bits} bits exceeds the generator's {period_bits}-bit period")]
    SeedWiderThanPeriod {
        /// Bits in the configured seed.
        seed_bits: u64,
        /// log2 of the generator's period.
        period_bits: u32,
    },

    /// Declared entropy larger than the seed or state can hold.
    #[error("claimed entropy {claimed} bits exceeds the {max} bits a reseed can supply")]
    EntropyOverclaim {
        /// Bits the caller asked to be credited with.
        claimed: i64,
        /// Bits the seed and state can actually carry.
        max: i64,
    },

    /// Producer chunk of zero bytes.
    #[error("producer chunk size must be positive")]
    ZeroChunkSize,
}

/// A blocking transfer ended early.
///
/// `transferred` is the number of bytes moved before the transfer stopped;
/// those bytes are fully committed (writes) or delivered (reads).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum PoolError {
    /// The pool was closed (writes), or closed and drained (reads).
    #[error("pool closed after {transferred} bytes")]
    Closed {
        /// Bytes moved before the pool was found closed.
        transferred: usize,
    },

    /// The caller's cancel token fired.
    #[error("transfer cancelled after {transferred} bytes")]
    Cancelled {
        /// Bytes moved before cancellation was observed.
        transferred: usize,
    },
}

impl PoolError {
    /// Bytes moved before the transfer stopped.
    pub fn transferred(&self) -> usize {
        match *self {
            Self::Closed { transferred } | Self::Cancelled { transferred } => transferred,
        }
    }
}
