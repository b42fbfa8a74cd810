//! Reseeding strategies: turning pool bytes into renewed generator state.
//!
//! Every strategy wraps a generator and implements [`Reseedable`], so the
//! entropy layer never needs to know how a seed is applied:
//!
//! - [`Replace`]: rebuild the generator from the seed bytes
//! - [`ArbitraryJump`]: advance the current state by a seed-derived distance
//! - [`JumpAndLeap`]: apply a seed-derived number of short jumps and long leaps
//! - [`Mix`]: fold the seed into the generator's current output and rebuild
//!
//! The jump-based strategies only ask their generator for the capability they
//! use ([`ArbitrarilyJumpable`] or [`Leapable`]).

mod arbitrary_jump;
mod jump_leap;
mod mix;
mod replace;

pub use arbitrary_jump::ArbitraryJump;
pub use jump_leap::JumpAndLeap;
pub use mix::Mix;
pub use replace::Replace;

use rand::RngCore;
use rand_pcg::Pcg64;
use rand_xoshiro::Xoshiro256PlusPlus;

/// A generator whose state can be renewed from seed material.
pub trait Reseedable: RngCore {
    /// Bytes consumed by one call to [`apply_seed`](Self::apply_seed).
    fn required_seed_bytes(&self) -> usize;

    /// Entropy the generator is credited with straight after a reseed.
    fn claimed_entropy_bits(&self) -> i64;

    /// Renew the state from `seed`.
    ///
    /// Only the first [`required_seed_bytes`](Self::required_seed_bytes)
    /// bytes are used; a shorter seed is treated as zero-padded.
    fn apply_seed(&mut self, seed: &[u8]);

    /// Renew the state from a single 64-bit value.
    fn apply_u64_seed(&mut self, seed: u64);

    /// Short name used in log lines.
    fn strategy(&self) -> &'static str {
        "custom"
    }
}

/// A generator that can skip ahead by an arbitrary number of outputs.
pub trait ArbitrarilyJumpable {
    /// log2 of the period. Jump distances are only distinct below `2^PERIOD_BITS`.
    const PERIOD_BITS: u32;

    /// Advance the state by `distance` steps. Distances beyond the period wrap.
    fn jump(&mut self, distance: f64);
}

/// A generator with a fixed short jump and a fixed long leap.
pub trait Leapable {
    /// Skip ahead by the generator's jump distance.
    fn jump(&mut self);

    /// Skip ahead by the generator's leap distance, far longer than a jump.
    fn leap(&mut self);
}

/// 2^128 as a double; the state period of [`Pcg64`].
const PCG64_PERIOD: f64 = 340_282_366_920_938_463_463_374_607_431_768_211_456.0;

impl ArbitrarilyJumpable for Pcg64 {
    const PERIOD_BITS: u32 = 128;

    fn jump(&mut self, distance: f64) {
        if !distance.is_finite() {
            return;
        }
        // `%` on doubles is exact, so the reduced magnitude is an exact integer
        // below the period.
        let steps = (distance.abs() % PCG64_PERIOD) as u128;
        if distance < 0.0 {
            self.advance(steps.wrapping_neg());
        } else {
            self.advance(steps);
        }
    }
}

impl Leapable for Xoshiro256PlusPlus {
    fn jump(&mut self) {
        Xoshiro256PlusPlus::jump(self);
    }

    fn leap(&mut self) {
        self.long_jump();
    }
}

/// Copy up to `dest.len()` bytes of `seed` into `dest`, zero-filling the rest.
pub(crate) fn copy_padded(seed: &[u8], dest: &mut [u8]) {
    let n = seed.len().min(dest.len());
    dest[..n].copy_from_slice(&seed[..n]);
    dest[n..].fill(0);
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;

    use super::*;

    #[test]
    fn test_pcg_jump_matches_advance() {
        let mut jumped = Pcg64::seed_from_u64(11);
        let mut advanced = jumped.clone();
        ArbitrarilyJumpable::jump(&mut jumped, 1_000_003.0);
        advanced.advance(1_000_003);
        assert_eq!(jumped.next_u64(), advanced.next_u64());
    }

    #[test]
    fn test_pcg_negative_jump_wraps() {
        let mut rng = Pcg64::seed_from_u64(3);
        let start = rng.clone();
        ArbitrarilyJumpable::jump(&mut rng, 4096.0);
        ArbitrarilyJumpable::jump(&mut rng, -4096.0);
        let mut start = start;
        assert_eq!(rng.next_u64(), start.next_u64());
    }

    #[test]
    fn test_pcg_non_finite_jump_ignored() {
        let mut rng = Pcg64::seed_from_u64(5);
        let mut same = rng.clone();
        ArbitrarilyJumpable::jump(&mut rng, f64::NAN);
        ArbitrarilyJumpable::jump(&mut rng, f64::INFINITY);
        assert_eq!(rng.next_u64(), same.next_u64());
    }

    #[test]
    fn test_xoshiro_leap_differs_from_jump() {
        let mut jumped = Xoshiro256PlusPlus::seed_from_u64(9);
        let mut leapt = jumped.clone();
        Leapable::jump(&mut jumped);
        leapt.leap();
        assert_ne!(jumped.next_u64(), leapt.next_u64());
    }

    #[test]
    fn test_copy_padded() {
        let mut dest = [0xFFu8; 4];
        copy_padded(&[1, 2], &mut dest);
        assert_eq!(dest, [1, 2, 0, 0]);
        copy_padded(&[1, 2, 3, 4, 5, 6], &mut dest);
        assert_eq!(dest, [1, 2, 3, 4]);
    }
}
