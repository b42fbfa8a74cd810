//! # seedpool-core
//!
//! **Lock-free seed transport and entropy-accounted reseeding.**
//!
//! `seedpool-core` moves true-random seed material from producer threads to
//! many long-running pseudorandom generators without a lock on the hot path,
//! and decides when each generator needs fresh material.
//!
//! ## Quick Start
//!
//! ```
//! use std::sync::Arc;
//!
//! use rand::SeedableRng;
//! use rand_pcg::Pcg64;
//! use seedpool_core::{ByteQueue, CountedRng, EntropyManager, Replace, ReseedThresholds, RingPool};
//!
//! let pool = Arc::new(RingPool::new(4096).unwrap());
//! pool.offer(&[0x5A; 256]);
//!
//! let rng = Replace::new(Pcg64::seed_from_u64(1));
//! // A constant seed is public knowledge: credit it with nothing.
//! let mut managed =
//!     EntropyManager::with_initial_entropy(rng, 0, ReseedThresholds::default(), Arc::clone(&pool))
//!         .unwrap();
//!
//! let roll = managed.draw_below_u32(6);
//! assert!(roll < 6);
//! assert_eq!(managed.reseed_count(), 1);
//! assert!(managed.entropy_bits() > ReseedThresholds::default().minimum);
//! ```
//!
//! ## Architecture
//!
//! Producers → [`RingPool`] (optionally behind a [`FairQueue`]) → [`EntropyManager`] → Strategy → Generator
//!
//! - [`RingPool`]: fixed power-of-two byte ring; `offer`/`poll` never block,
//!   `write`/`read` spin until done, cancelled, or the pool is closed.
//! - [`FairQueue`]: FIFO turns of bounded size in front of either direction.
//! - [`EntropyTracker`]: counts the bits each draw consumes.
//! - [`EntropyManager`]: a tracker that reseeds from a pool when the budget
//!   falls towards its thresholds.
//! - [`Replace`], [`ArbitraryJump`], [`JumpAndLeap`], [`Mix`]: how seed bytes become
//!   new generator state.
//!
//! Every queue-like type implements [`ByteQueue`], so wrappers compose and the
//! manager accepts a bare pool, a shared `Arc`, or a fair wrapper alike.

pub mod entropy;
pub mod error;
pub mod fairness;
pub mod manager;
pub mod pool;
pub mod queue;
pub mod reseed;
pub mod wait;

pub use entropy::{CountedRng, EntropyTracker, MAX_BITS_PER_CALL};
pub use error::{ConfigError, PoolError};
pub use fairness::{FairQueue, TurnLimits};
pub use manager::{EntropyManager, ReseedThresholds};
pub use pool::{CommitPolicy, PoolConfig, PoolSnapshot, RingPool};
pub use queue::{ByteQueue, write_while_reachable};
pub use reseed::{
    ArbitrarilyJumpable, ArbitraryJump, JumpAndLeap, Leapable, Mix, Replace, Reseedable,
};
pub use wait::CancelToken;

/// Library version (from Cargo.toml).
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
