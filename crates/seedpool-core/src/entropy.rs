//! Entropy accounting for generator draws.
//!
//! Every draw from a counted generator debits a fixed number of bits from a
//! signed budget:
//!
//! | Draw | Bits |
//! |---|---|
//! | `bool` | 1 |
//! | `n` bytes | `8n` |
//! | integer below `bound` | bit length of `bound - 1` |
//! | integer in `origin..bound` | bit length of the range minus one, or the full width if the range overflows |
//! | `f32` | 24 |
//! | `f64` | 53 |
//! | `u32` | 32 |
//! | `u64` | 64 |
//! | gaussian / exponential | 65 |
//!
//! The 65-bit figure for the continuous distributions is an approximation: one
//! full-width draw serves the large majority of samples.
//!
//! [`EntropyTracker`] only counts. The automatic reseeding variant lives in
//! [`crate::manager`].

use rand::{Rng, RngCore};
use rand_distr::{Distribution, Exp1, StandardNormal};

use crate::reseed::Reseedable;

/// Cost of a boolean draw.
pub const BOOL_BITS: i64 = 1;
/// Cost per byte of a byte-slice draw.
pub const BYTE_BITS: i64 = 8;
/// Cost of an `f32` in `[0, 1)`: its 24-bit mantissa.
pub const F32_BITS: i64 = 24;
/// Cost of an `f64` in `[0, 1)`: its 53-bit mantissa.
pub const F64_BITS: i64 = 53;
/// Cost of a full-width `u32`.
pub const U32_BITS: i64 = 32;
/// Cost of a full-width `u64`.
pub const U64_BITS: i64 = 64;
/// Cost of a standard normal draw; the ziggurat may consume more than one word.
pub const GAUSSIAN_BITS: i64 = 65;
/// Cost of a unit exponential draw; same sampler shape as the normal.
pub const EXPONENTIAL_BITS: i64 = 65;

/// Largest cost of any single fixed-width draw.
///
/// Byte draws can cost more, but the manager splits them into segments that
/// fit the remaining budget.
pub const MAX_BITS_PER_CALL: i64 = 65;

/// Bits debited for a draw uniformly below `bound` (`bound > 0`).
pub fn bits_below(bound: u64) -> i64 {
    i64::from(u64::BITS - bound.saturating_sub(1).leading_zeros())
}

/// Bits debited for an `i32` draw in `origin..bound`.
pub fn bits_in_range_i32(origin: i32, bound: i32) -> i64 {
    match bound.checked_sub(origin) {
        Some(range) if range > 0 => bits_below(range as u64),
        _ => U32_BITS,
    }
}

/// Bits debited for an `i64` draw in `origin..bound`.
pub fn bits_in_range_i64(origin: i64, bound: i64) -> i64 {
    match bound.checked_sub(origin) {
        Some(range) if range > 0 => bits_below(range as u64),
        _ => U64_BITS,
    }
}

// ---------------------------------------------------------------------------
// Counted draws
// ---------------------------------------------------------------------------

/// A generator whose draws are paid for out of an entropy budget.
///
/// Implementors supply the budget ([`debit`](Self::debit),
/// [`entropy_bits`](Self::entropy_bits)) and the generator; the draw methods
/// debit the cost from the module table and then sample.
pub trait CountedRng {
    /// The wrapped generator.
    type Rng: RngCore;

    /// Direct access to the wrapped generator. Draws made through it are not
    /// debited.
    fn generator(&mut self) -> &mut Self::Rng;

    /// Pay `bits` for the draw about to be made.
    fn debit(&mut self, bits: i64);

    /// Remaining budget in bits. May be negative.
    fn entropy_bits(&self) -> i64;

    fn draw_bool(&mut self) -> bool {
        self.debit(BOOL_BITS);
        self.generator().random()
    }

    fn draw_u32(&mut self) -> u32 {
        self.debit(U32_BITS);
        self.generator().next_u32()
    }

    fn draw_u64(&mut self) -> u64 {
        self.debit(U64_BITS);
        self.generator().next_u64()
    }

    /// Fill `dest`, paying 8 bits per byte.
    fn draw_bytes(&mut self, dest: &mut [u8]) {
        self.debit(BYTE_BITS * dest.len() as i64);
        self.generator().fill_bytes(dest);
    }

    /// Uniform draw in `0..bound`.
    ///
    /// # Panics
    /// If `bound` is zero.
    fn draw_below_u32(&mut self, bound: u32) -> u32 {
        assert!(bound > 0, "bound must be positive");
        self.debit(bits_below(u64::from(bound)));
        self.generator().random_range(0..bound)
    }

    /// Uniform draw in `0..bound`.
    ///
    /// # Panics
    /// If `bound` is zero.
    fn draw_below_u64(&mut self, bound: u64) -> u64 {
        assert!(bound > 0, "bound must be positive");
        self.debit(bits_below(bound));
        self.generator().random_range(0..bound)
    }

    /// Uniform draw in `origin..bound`.
    ///
    /// # Panics
    /// If the range is empty.
    fn draw_range_i32(&mut self, origin: i32, bound: i32) -> i32 {
        assert!(origin < bound, "empty range {origin}..{bound}");
        self.debit(bits_in_range_i32(origin, bound));
        self.generator().random_range(origin..bound)
    }

    /// Uniform draw in `origin..bound`.
    ///
    /// # Panics
    /// If the range is empty.
    fn draw_range_i64(&mut self, origin: i64, bound: i64) -> i64 {
        assert!(origin < bound, "empty range {origin}..{bound}");
        self.debit(bits_in_range_i64(origin, bound));
        self.generator().random_range(origin..bound)
    }

    /// Uniform draw in `[0, 1)`.
    fn draw_f32(&mut self) -> f32 {
        self.debit(F32_BITS);
        self.generator().random()
    }

    /// Uniform draw in `[0, 1)`.
    fn draw_f64(&mut self) -> f64 {
        self.debit(F64_BITS);
        self.generator().random()
    }

    /// Standard normal sample.
    fn draw_gaussian(&mut self) -> f64 {
        self.debit(GAUSSIAN_BITS);
        StandardNormal.sample(self.generator())
    }

    /// Exponential sample with rate 1.
    fn draw_exponential(&mut self) -> f64 {
        self.debit(EXPONENTIAL_BITS);
        Exp1.sample(self.generator())
    }
}

// ---------------------------------------------------------------------------
// Tracker
// ---------------------------------------------------------------------------

/// Counts the entropy left in a generator without ever reseeding it.
///
/// The budget can go negative; callers that want to react to it read
/// [`entropy_bits`](CountedRng::entropy_bits) and call
/// [`reset_entropy`](Self::reset_entropy) after reseeding by hand.
#[derive(Debug, Clone)]
pub struct EntropyTracker<R> {
    rng: R,
    entropy: i64,
}

impl<R: Reseedable> EntropyTracker<R> {
    /// Start from the generator's fresh-state entropy.
    pub fn new(rng: R) -> Self {
        let entropy = rng.claimed_entropy_bits();
        Self { rng, entropy }
    }
}

impl<R: RngCore> EntropyTracker<R> {
    /// Start from an explicit budget, for generators that are not
    /// [`Reseedable`] or were seeded from weaker material.
    pub fn with_initial_entropy(rng: R, entropy_bits: i64) -> Self {
        Self {
            rng,
            entropy: entropy_bits,
        }
    }

    /// Overwrite the budget, typically after an external reseed.
    pub fn reset_entropy(&mut self, entropy_bits: i64) {
        self.entropy = entropy_bits;
    }

    /// Unwrap the generator.
    pub fn into_inner(self) -> R {
        self.rng
    }
}

impl<R: RngCore> CountedRng for EntropyTracker<R> {
    type Rng = R;

    fn generator(&mut self) -> &mut R {
        &mut self.rng
    }

    fn debit(&mut self, bits: i64) {
        self.entropy -= bits;
    }

    fn entropy_bits(&self) -> i64 {
        self.entropy
    }
}

impl<R: RngCore> RngCore for EntropyTracker<R> {
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
