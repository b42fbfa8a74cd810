use log::trace;
use rand::{RngCore, SeedableRng};

use super::Reseedable;
use crate::error::ConfigError;

/// Reseed by mixing seed bytes into the generator's current state.
///
/// On each reseed the generator's own output (one native seed's worth) is
/// XORed with the incoming seed, folding seeds longer than the native seed
/// back over it, and the generator is rebuilt from the result. Unlike
/// [`Replace`](super::Replace), a weak or partly predictable seed never
/// discards entropy the generator already holds.
///
/// The entropy credited after a reseed is declared by the caller, for
/// sources whose bytes are known to carry less than eight bits each.
#[derive(Debug, Clone)]
pub struct Mix<R> {
    rng: R,
    seed_bytes: usize,
    claimed_bits: i64,
}

impl<R: SeedableRng + RngCore> Mix<R> {
    /// Wrap `rng`, consuming `seed_bytes` per reseed and crediting
    /// `claimed_bits` afterwards.
    ///
    /// `claimed_bits` may not exceed what either the seed or the generator's
    /// native seed can hold.
    pub fn new(rng: R, seed_bytes: usize, claimed_bits: i64) -> Result<Self, ConfigError> {
        if seed_bytes == 0 {
            return Err(ConfigError::EmptySeed);
        }
        let native = R::Seed::default().as_ref().len();
        let max = 8 * seed_bytes.min(native) as i64;
        if claimed_bits > max {
            return Err(ConfigError::EntropyOverclaim {
                claimed: claimed_bits,
                max,
            });
        }
        Ok(Self {
            rng,
            seed_bytes,
            claimed_bits,
        })
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

impl<R: RngCore> RngCore for Mix<R> {
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

impl<R: SeedableRng + RngCore> Reseedable for Mix<R> {
    fn required_seed_bytes(&self) -> usize {
        self.seed_bytes
    }

    fn claimed_entropy_bits(&self) -> i64 {
        self.claimed_bits
    }

    fn apply_seed(&mut self, seed: &[u8]) {
        let seed = &seed[..seed.len().min(self.seed_bytes)];
        let mut native = R::Seed::default();
        let state = native.as_mut();
        self.rng.fill_bytes(state);
        for (i, &b) in seed.iter().enumerate() {
            state[i % state.len()] ^= b;
        }
        self.rng = R::from_seed(native);
        trace!("mixed {} seed bytes into generator state", seed.len());
    }

    fn apply_u64_seed(&mut self, seed: u64) {
        self.apply_seed(&seed.to_be_bytes());
    }

    fn strategy(&self) -> &'static str {
        "mix"
    }
}
