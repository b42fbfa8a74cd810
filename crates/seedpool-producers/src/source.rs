//! Where seed bytes come from.
//!
//! Every source implements the [`SeedSource`] trait. A producer asks its
//! source for one chunk at a time, split into requests no larger than
//! [`SeedSource::max_request_size`].

use std::time::Duration;

use rand::RngCore;

use crate::error::SeedError;

/// A supplier of true-random (or, for tests, reproducible) bytes.
pub trait SeedSource: Send {
    /// Fill all of `dest`, or fail without a partial-success guarantee.
    fn fill(&mut self, dest: &mut [u8]) -> Result<(), SeedError>;

    /// Largest `dest` one call to [`fill`](Self::fill) accepts.
    fn max_request_size(&self) -> usize {
        usize::MAX
    }

    /// Delay the source asked for after its most recent answer, if any.
    fn advised_delay(&self) -> Option<Duration> {
        None
    }

    /// Short name used in log lines and thread names.
    fn name(&self) -> &str;
}

impl<S: SeedSource + ?Sized> SeedSource for Box<S> {
    fn fill(&mut self, dest: &mut [u8]) -> Result<(), SeedError> {
        (**self).fill(dest)
    }

    fn max_request_size(&self) -> usize {
        (**self).max_request_size()
    }

    fn advised_delay(&self) -> Option<Duration> {
        (**self).advised_delay()
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}

// ---------------------------------------------------------------------------
// OS source
// ---------------------------------------------------------------------------

/// The operating system's CSPRNG, via `getrandom`.
#[derive(Debug, Clone, Copy, Default)]
pub struct OsSeedSource;

impl OsSeedSource {
    pub fn new() -> Self {
        Self
    }
}

impl SeedSource for OsSeedSource {
    fn fill(&mut self, dest: &mut [u8]) -> Result<(), SeedError> {
        getrandom::fill(dest).map_err(|e| SeedError::transport(format!("OS CSPRNG failed: {e}")))
    }

    fn name(&self) -> &str {
        "os"
    }
}

// ---------------------------------------------------------------------------
// RNG-backed source
// ---------------------------------------------------------------------------

/// Bytes from any `rand` generator.
///
/// Not a source of true randomness. Useful for deterministic tests and for
/// simulations that want a reproducible seed stream.
#[derive(Debug, Clone)]
pub struct RngSeedSource<R> {
    rng: R,
}

impl<R: RngCore + Send> RngSeedSource<R> {
    pub fn new(rng: R) -> Self {
        Self { rng }
    }
}

impl<R: RngCore + Send> SeedSource for RngSeedSource<R> {
    fn fill(&mut self, dest: &mut [u8]) -> Result<(), SeedError> {
        self.rng.fill_bytes(dest);
        Ok(())
    }

    fn name(&self) -> &str {
        "rng"
    }
}
