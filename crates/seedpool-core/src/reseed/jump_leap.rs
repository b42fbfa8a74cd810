use log::trace;
use rand::RngCore;

use super::{Leapable, Reseedable, copy_padded};
use crate::error::ConfigError;

/// Reseed by applying a seed-derived number of jumps, then of leaps.
///
/// The seed is the first `ceil((jb + lb) / 8)` bytes read as a big-endian
/// integer, where `jb = log2(max_jumps)` and `lb = log2(max_leaps)`. The low
/// `jb` bits give the jump count and the next `lb` bits give the leap count.
///
/// A seed whose counts are both zero would leave the state untouched, so it
/// is mapped to exactly `max_leaps` leaps instead. No other seed produces
/// that count.
#[derive(Debug, Clone)]
pub struct JumpAndLeap<R> {
    rng: R,
    jump_bits: u32,
    leap_bits: u32,
}

impl<R: Leapable + RngCore> JumpAndLeap<R> {
    /// Wrap `rng`. Both maxima must be positive powers of two, and together
    /// they must fit 64 bits.
    pub fn new(rng: R, max_jumps: u64, max_leaps: u64) -> Result<Self, ConfigError> {
        let jump_bits = log2_exact("max_jumps", max_jumps)?;
        let leap_bits = log2_exact("max_leaps", max_leaps)?;
        if jump_bits + leap_bits > 64 {
            return Err(ConfigError::SeedTooWide(jump_bits + leap_bits));
        }
        Ok(Self {
            rng,
            jump_bits,
            leap_bits,
        })
    }

    /// Largest jump count a seed can select, plus one.
    pub fn max_jumps(&self) -> u64 {
        1 << self.jump_bits
    }

    /// Largest leap count a seed can select, plus one.
    pub fn max_leaps(&self) -> u64 {
        1 << self.leap_bits
    }

    /// Jump and leap counts selected by `seed`.
    pub fn counts(&self, seed: u64) -> (u64, u64) {
        let jumps = seed & (self.max_jumps() - 1);
        let leaps = (seed >> self.jump_bits) & (self.max_leaps() - 1);
        if jumps == 0 && leaps == 0 {
            (0, self.max_leaps())
        } else {
            (jumps, leaps)
        }
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

fn log2_exact(what: &'static str, value: u64) -> Result<u32, ConfigError> {
    if !value.is_power_of_two() {
        return Err(ConfigError::CountNotPowerOfTwo { what, value });
    }
    Ok(value.trailing_zeros())
}

impl<R: RngCore> RngCore for JumpAndLeap<R> {
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

impl<R: Leapable + RngCore> Reseedable for JumpAndLeap<R> {
    fn required_seed_bytes(&self) -> usize {
        ((self.jump_bits + self.leap_bits).div_ceil(8) as usize).max(1)
    }

    fn claimed_entropy_bits(&self) -> i64 {
        i64::from(self.jump_bits + self.leap_bits)
    }

    fn apply_seed(&mut self, seed: &[u8]) {
        let width = self.required_seed_bytes();
        let mut raw = [0u8; 8];
        copy_padded(seed, &mut raw[8 - width..]);
        self.apply_u64_seed(u64::from_be_bytes(raw));
    }

    fn apply_u64_seed(&mut self, seed: u64) {
        let (jumps, leaps) = self.counts(seed);
        for _ in 0..jumps {
            self.rng.jump();
        }
        for _ in 0..leaps {
            self.rng.leap();
        }
        trace!("jump and leap: {jumps} jumps, {leaps} leaps");
    }

    fn strategy(&self) -> &'static str {
        "jump-and-leap"
    }
}
