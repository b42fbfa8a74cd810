//! # seedpool-producers
//!
//! Threads that keep a [`seedpool_core::RingPool`] topped up with seed bytes.
//!
//! ```text
//! SeedSource → (RetryingSource) → Conditioning → write_while_reachable → Pool
//! ```
//!
//! - [`SeedSource`]: anything that can fill a buffer. [`OsSeedSource`] reads
//!   the OS CSPRNG; [`RngSeedSource`] wraps a `rand` generator for tests.
//! - [`RetryingSource`]: bounded retries with a capped, source-advised delay.
//! - [`Conditioning`]: optional SHA-256 whitening per chunk.
//! - [`SeedProducer`]: the loop. It holds the pool weakly and stops once the
//!   pool is dropped, closed, or its [`CancelToken`] fires.
//!
//! ```
//! use std::sync::Arc;
//!
//! use seedpool_producers::{OsSeedSource, ProducerConfig, SeedProducer, StopReason};
//! use seedpool_core::RingPool;
//!
//! let pool = Arc::new(RingPool::new(1024).unwrap());
//! let producer = SeedProducer::new(OsSeedSource::new(), &pool, ProducerConfig::default()).unwrap();
//! let handle = producer.spawn().unwrap();
//!
//! drop(pool);
//! let stats = handle.join().unwrap().unwrap();
//! assert_eq!(stats.stop, StopReason::PoolDropped);
//! ```

pub mod conditioning;
pub mod error;
pub mod producer;
pub mod retry;
pub mod source;

pub use conditioning::{Conditioning, condition_into};
pub use error::SeedError;
pub use producer::{ProducerConfig, ProducerStats, SeedProducer, StopReason};
pub use retry::{RecordingSleeper, RetryConfig, RetryingSource, Sleeper, ThreadSleeper};
pub use source::{OsSeedSource, RngSeedSource, SeedSource};

pub use seedpool_core::CancelToken;
