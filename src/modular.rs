//! Modular arithmetic over 64-bit moduli.
//!
//! This module provides the arithmetic behind the mixing map
//! `f(x) = x·G mod P` and the number-theoretic helpers that derive
//! candidate parameters.  The [`Modulus`](struct.Modulus.html) type wraps a
//! modulus `p > 1` and exposes reduction, multiplication and
//! exponentiation.  Products are formed in 128-bit precision before the
//! reduction, so no intermediate ever overflows.

/// A modulus `p > 1` for arithmetic on `u64` residues.
///
/// The `Modulus` type does not perform primality testing; callers that need
/// a prime (generator search, inversion-style reasoning) must check that
/// separately with [`is_prime`](crate::number_theory::is_prime).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Modulus {
    p: u64,
}

impl Modulus {
    /// Creates a modulus, returning `None` when `p <= 1`.
    pub fn new(p: u64) -> Option<Self> {
        if p <= 1 {
            None
        } else {
            Some(Modulus { p })
        }
    }

    /// Returns the raw modulus.
    #[inline]
    pub fn modulus(&self) -> u64 {
        self.p
    }

    /// Reduces `a` into `[0, p)`.
    #[inline]
    pub fn reduce(&self, a: u64) -> u64 {
        a % self.p
    }

    /// Multiplies `a` by `b` modulo `p` through a 128-bit intermediate.
    ///
    /// Neither operand needs to be reduced beforehand: the full 128-bit
    /// product of two `u64` values is exact, so `mul(x, g)` equals the
    /// mathematical `(x·g) mod p` for every `x`, `g`.
    #[inline]
    pub fn mul(&self, a: u64, b: u64) -> u64 {
        ((a as u128 * b as u128) % self.p as u128) as u64
    }

    /// Exponentiates `a` by `e` modulo `p`.
    #[inline]
    pub fn pow(&self, a: u64, mut e: u64) -> u64 {
        let mut base = a % self.p;
        let mut result = 1u64 % self.p;
        while e > 0 {
            if e & 1 == 1 {
                result = self.mul(result, base);
            }
            base = self.mul(base, base);
            e >>= 1;
        }
        result
    }
}
