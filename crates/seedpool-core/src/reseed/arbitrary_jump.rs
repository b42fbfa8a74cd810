use log::trace;
use rand::RngCore;

use super::{ArbitrarilyJumpable, Reseedable};
use crate::error::ConfigError;

/// Largest chunk whose value a double holds exactly (48 of 53 mantissa bits).
const CHUNK_BYTES: usize = 6;

/// Reseed by jumping the current state forward a seed-derived distance.
///
/// The seed is cut into big-endian chunks of up to six bytes. The chunk that
/// starts at byte offset `i` is applied as a jump of `value * 2^(8 * i)`, so
/// successive chunks cover disjoint magnitude ranges of the distance. A final
/// short chunk is applied the same way.
///
/// Distances wrap at the generator's period, so a seed wider than
/// [`ArbitrarilyJumpable::PERIOD_BITS`] would claim entropy it cannot deliver
/// and is rejected. For [`rand_pcg::Pcg64`] the limit is 16 bytes.
#[derive(Debug, Clone)]
pub struct ArbitraryJump<R> {
    rng: R,
    seed_bytes: usize,
}

impl<R: ArbitrarilyJumpable + RngCore> ArbitraryJump<R> {
    /// Wrap `rng`, consuming `seed_bytes` bytes per reseed.
    pub fn new(rng: R, seed_bytes: usize) -> Result<Self, ConfigError> {
        if seed_bytes == 0 {
            return Err(ConfigError::EmptySeed);
        }
        let seed_bits = 8 * seed_bytes as u64;
        if seed_bits > u64::from(R::PERIOD_BITS) {
            return Err(ConfigError::SeedWiderThanPeriod {
                seed_bits,
                period_bits: R::PERIOD_BITS,
            });
        }
        Ok(Self { rng, seed_bytes })
    }

    /// The wrapped generator.
    pub fn inner(&self) -> &R {
        &self.rng
    }

    /// Unwrap the generator.
    pub fn into_inner(self) -> R {
        self.rng
    }
}

impl<R: RngCore> RngCore for ArbitraryJump<R> {
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

impl<R: ArbitrarilyJumpable + RngCore> Reseedable for ArbitraryJump<R> {
    fn required_seed_bytes(&self) -> usize {
        self.seed_bytes
    }

    fn claimed_entropy_bits(&self) -> i64 {
        8 * self.seed_bytes as i64
    }

    fn apply_seed(&mut self, seed: &[u8]) {
        let seed = &seed[..seed.len().min(self.seed_bytes)];
        let mut jumps = 0;
        for (index, chunk) in seed.chunks(CHUNK_BYTES).enumerate() {
            let value = chunk.iter().fold(0u64, |acc, &b| (acc << 8) | u64::from(b));
            if value == 0 {
                continue;
            }
            let offset = (index * CHUNK_BYTES * 8) as i32;
            self.rng.jump(value as f64 * 2f64.powi(offset));
            jumps += 1;
        }
        trace!("arbitrary jump: {jumps} jumps from {} seed bytes", seed.len());
    }

    fn apply_u64_seed(&mut self, seed: u64) {
        self.apply_seed(&seed.to_be_bytes());
    }

    fn strategy(&self) -> &'static str {
        "arbitrary-jump"
    }
}
