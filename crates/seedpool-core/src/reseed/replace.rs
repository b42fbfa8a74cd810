use log::trace;
use rand::{RngCore, SeedableRng};

use super::{Reseedable, copy_padded};

/// Reseed by discarding the generator and building a new one from the seed.
///
/// Works with any [`SeedableRng`]. The seed size and claimed entropy follow
/// the generator's native seed type.
#[derive(Debug, Clone)]
pub struct Replace<R> {
    rng: R,
}

impl<R: SeedableRng + RngCore> Replace<R> {
    /// Wrap an already seeded generator.
    pub fn new(rng: R) -> Self {
        Self { rng }
    }

    /// Build the first generator from `seed`, as a later reseed would.
    pub fn from_seed_bytes(seed: &[u8]) -> Self {
        let mut native = R::Seed::default();
        copy_padded(seed, native.as_mut());
        Self::new(R::from_seed(native))
    }

    /// The current generator.
    pub fn inner(&self) -> &R {
        &self.rng
    }

    /// Unwrap the current generator.
    pub fn into_inner(self) -> R {
        self.rng
    }
}

impl<R: RngCore> RngCore for Replace<R> {
    fn next_u32(&mut self) -> u32 {
        self.rng.next_u32()
    }

    fn next_u64(&mut self) -> u64 {
        self.rng.next_u64()
    }

    fn fill_bytes(&mut self, dest: &mut [u8]) {
        self.rng.fill_bytes(dest)
    }
}

impl<R: SeedableRng + RngCore> Reseedable for Replace<R> {
    fn required_seed_bytes(&self) -> usize {
        R::Seed::default().as_ref().len()
    }

    fn claimed_entropy_bits(&self) -> i64 {
        8 * self.required_seed_bytes() as i64
    }

    fn apply_seed(&mut self, seed: &[u8]) {
        let mut native = R::Seed::default();
        copy_padded(seed, native.as_mut());
        self.rng = R::from_seed(native);
        trace!("replace: rebuilt generator from {} seed bytes", seed.len());
    }

    fn apply_u64_seed(&mut self, seed: u64) {
        self.rng = R::seed_from_u64(seed);
    }

    fn strategy(&self) -> &'static str {
        "replace"
    }
}
