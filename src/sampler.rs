//! Single-bit input perturbations.
//!
//! A trial starts from a uniformly random 64-bit state and its twin with
//! exactly one bit flipped.  The twin is built as `state ^ (1 << b)`, so the
//! one-bit difference holds by construction.

use rand::Rng;

/// Width of the sampled state in bits.
pub const STATE_BITS: u32 = u64::BITS;

/// A sampled input state and its one-bit-flipped twin.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Perturbation {
    /// Uniform draw from the full `u64` range.
    pub state: u64,
    /// `state` with bit `bit` flipped.
    pub modified_state: u64,
    /// Index of the flipped bit, in `[0, 64)`.
    pub bit: u32,
}

/// Draws one perturbation from `rng`.
#[inline]
pub fn sample_perturbation<R: Rng + ?Sized>(rng: &mut R) -> Perturbation {
    let state: u64 = rng.gen();
    let bit = rng.gen_range(0..STATE_BITS);
    Perturbation {
        state,
        modified_state: state ^ (1u64 << bit),
        bit,
    }
}

/// Number of differing bits between `a` and `b`, in `[0, 64]`.
#[inline]
pub fn hamming_distance(a: u64, b: u64) -> u32 {
    (a ^ b).count_ones()
}
