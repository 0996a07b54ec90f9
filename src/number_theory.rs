//! Candidate derivation: primes, factorizations and generators.
//!
//! These are the number-theoretic services that feed the evaluator.  A
//! candidate `(P, G)` needs a prime `P` and an element `G` of large
//! multiplicative order.  We take `G` to be a primitive root of `Z*_P`,
//! found by random search and confirmed with the factorization of `P - 1`:
//! `g` generates the whole group iff `g^((P-1)/q) ≠ 1` for every prime
//! `q | P - 1`.
//!
//! Everything works on `u64` with 128-bit intermediates through
//! [`Modulus`](crate::modular::Modulus).

use crate::avalanche::Candidate;
use crate::modular::Modulus;
use rand::rngs::StdRng;
use rand::Rng;
use thiserror::Error;

/// Miller–Rabin bases that are deterministic for every `u64`.
const WITNESSES: [u64; 12] = [2, 3, 5, 7, 11, 13, 17, 19, 23, 29, 31, 37];

/// Trial division bound applied before Pollard's rho.
const TRIAL_BOUND: u64 = 1_000;

/// Random draws attempted before giving up on a primitive root.
const MAX_GENERATOR_ATTEMPTS: usize = 4_096;

/// Errors raised while deriving a candidate.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CandidateError {
    #[error("{p} is not prime")]
    /// The supplied modulus is composite (or below 2).
    NotPrime {
        /// Offending modulus.
        p: u64,
    },
    #[error("no generator found for {p}")]
    /// Generator search gave up, or `Z*_P` has no element in `(1, P)`.
    NoGenerator {
        /// Modulus that was searched.
        p: u64,
    },
}

/// Deterministic Miller–Rabin primality test for `u64`.
pub fn is_prime(n: u64) -> bool {
    if n < 2 {
        return false;
    }
    for &small in &WITNESSES {
        if n % small == 0 {
            return n == small;
        }
    }
    let m = match Modulus::new(n) {
        Some(m) => m,
        None => return false,
    };
    let mut d = n - 1;
    let mut s = 0u32;
    while d % 2 == 0 {
        d /= 2;
        s += 1;
    }
    'witness: for &a in &WITNESSES {
        let mut x = m.pow(a, d);
        if x == 1 || x == n - 1 {
            continue;
        }
        for _ in 1..s {
            x = m.mul(x, x);
            if x == n - 1 {
                continue 'witness;
            }
        }
        return false;
    }
    true
}

/// Draws a uniformly random 64-bit prime with its top bit set.
pub fn random_large_prime<R: Rng + ?Sized>(rng: &mut R) -> u64 {
    loop {
        let n = rng.gen::<u64>() | (1u64 << 63) | 1;
        if is_prime(n) {
            return n;
        }
    }
}

fn gcd(mut a: u64, mut b: u64) -> u64 {
    while b != 0 {
        let t = a % b;
        a = b;
        b = t;
    }
    a
}

/// One run of Brent's variant of Pollard's rho with `f(x) = x² + c`.
///
/// Returns a non-trivial factor of the odd composite `n`, or `None` when
/// this choice of `c` cycles without splitting `n`.
fn pollard_brent(n: u64, c: u64) -> Option<u64> {
    let m = Modulus::new(n)?;
    let step = |x: u64| ((m.mul(x, x) as u128 + c as u128) % n as u128) as u64;

    let mut y = 2u64;
    let mut x = y;
    let mut ys = y;
    let mut q = 1u64;
    let mut d = 1u64;
    let mut r = 1u64;
    while d == 1 {
        x = y;
        for _ in 0..r {
            y = step(y);
        }
        let mut k = 0u64;
        while k < r && d == 1 {
            ys = y;
            let batch = (r - k).min(128);
            for _ in 0..batch {
                y = step(y);
                q = m.mul(q, x.abs_diff(y));
            }
            d = gcd(q, n);
            k += batch;
        }
        r *= 2;
    }
    if d == n {
        // The batched product overshot; replay one step at a time.
        loop {
            ys = step(ys);
            d = gcd(x.abs_diff(ys), n);
            if d > 1 {
                break;
            }
        }
    }
    (d != n).then_some(d)
}

fn split(n: u64, out: &mut Vec<u64>) {
    if n == 1 {
        return;
    }
    if is_prime(n) {
        out.push(n);
        return;
    }
    // Some c always splits a composite; almost always the first one does.
    let divisor = (1u64..)
        .find_map(|c| pollard_brent(n, c))
        .unwrap_or(n);
    split(divisor, out);
    split(n / divisor, out);
}

/// Returns the distinct prime factors of `n` in ascending order.
///
/// `0` and `1` have no prime factors.
pub fn factorize(n: u64) -> Vec<u64> {
    let mut factors = Vec::new();
    if n < 2 {
        return factors;
    }
    let mut rest = n;
    let mut divisor = 2u64;
    while divisor <= TRIAL_BOUND && divisor * divisor <= rest {
        if rest % divisor == 0 {
            factors.push(divisor);
            while rest % divisor == 0 {
                rest /= divisor;
            }
        }
        divisor += if divisor == 2 { 1 } else { 2 };
    }
    split(rest, &mut factors);
    factors.sort_unstable();
    factors.dedup();
    factors
}

/// Searches for a primitive root of `Z*_p` given the prime factors of `p - 1`.
///
/// Draws `g` uniformly from `[2, p)` until every `g^((p-1)/q)` differs from 1.
pub fn find_generator<R: Rng + ?Sized>(
    factors: &[u64],
    p: u64,
    rng: &mut R,
) -> Result<u64, CandidateError> {
    if p < 3 {
        return Err(CandidateError::NoGenerator { p });
    }
    let m = Modulus::new(p).ok_or(CandidateError::NoGenerator { p })?;
    let order = p - 1;
    for _ in 0..MAX_GENERATOR_ATTEMPTS {
        let g = rng.gen_range(2..p);
        if factors.iter().all(|&q| m.pow(g, order / q) != 1) {
            return Ok(g);
        }
    }
    Err(CandidateError::NoGenerator { p })
}

/// Supplies `(P, G)` pairs to the orchestrator.
///
/// Implementations are shared by every worker, so they hold no mutable
/// state; all randomness comes from the calling task's own stream.
pub trait CandidateSource: Send + Sync {
    /// Derives one fresh candidate.
    fn next_candidate(&self, rng: &mut StdRng) -> Result<Candidate, CandidateError>;

    /// Short label for logging.
    fn name(&self) -> &'static str;
}

/// Fresh generators for one fixed prime.
#[derive(Debug, Clone)]
pub struct FixedPrimeSource {
    p: u64,
    factors: Vec<u64>,
}

impl FixedPrimeSource {
    /// Validates `p` and factors `p - 1` once for all later draws.
    pub fn new(p: u64) -> Result<Self, CandidateError> {
        if !is_prime(p) {
            return Err(CandidateError::NotPrime { p });
        }
        Ok(FixedPrimeSource {
            p,
            factors: factorize(p - 1),
        })
    }

    /// The shared prime.
    pub fn prime(&self) -> u64 {
        self.p
    }
}

impl CandidateSource for FixedPrimeSource {
    fn next_candidate(&self, rng: &mut StdRng) -> Result<Candidate, CandidateError> {
        let g = find_generator(&self.factors, self.p, rng)?;
        Ok(Candidate::new(self.p, g))
    }

    fn name(&self) -> &'static str {
        "fixed-prime"
    }
}

/// A fresh random prime, and a generator for it, per candidate.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExplorationSource;

impl CandidateSource for ExplorationSource {
    fn next_candidate(&self, rng: &mut StdRng) -> Result<Candidate, CandidateError> {
        let p = random_large_prime(rng);
        let factors = factorize(p - 1);
        let g = find_generator(&factors, p, rng)?;
        Ok(Candidate::new(p, g))
    }

    fn name(&self) -> &'static str {
        "exploration"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    #[test]
    fn test_primality_of_known_values() {
        let primes = [2u64, 3, 5, 37, 41, 1_000_000_007, 18_446_744_073_709_551_557];
        let composites = [0u64, 1, 4, 9, 561, 1_000_000_007 * 3, 3_215_031_751, u64::MAX];
        assert!(primes.iter().all(|&p| is_prime(p)));
        assert!(composites.iter().all(|&n| !is_prime(n)));
    }

    #[test]
    fn test_factorize_returns_distinct_sorted_primes() {
        assert_eq!(factorize(1), Vec::<u64>::new());
        assert_eq!(factorize(2), vec![2]);
        assert_eq!(factorize(360), vec![2, 3, 5]);
        assert_eq!(factorize(1_000_000_006), vec![2, 500_000_003]);
        // Two primes above the trial bound force the rho path.
        assert_eq!(factorize(1_000_003 * 1_000_033), vec![1_000_003, 1_000_033]);
        assert_eq!(factorize(4_294_967_291 * 4_294_967_291), vec![4_294_967_291]);
    }

    #[test]
    fn test_factorize_large_group_orders() {
        let mut rng = StdRng::seed_from_u64(21);
        for _ in 0..4 {
            let p = random_large_prime(&mut rng);
            let factors = factorize(p - 1);
            assert!(factors.iter().all(|&q| is_prime(q)));
            let mut rest = p - 1;
            for &q in &factors {
                while rest % q == 0 {
                    rest /= q;
                }
            }
            assert_eq!(rest, 1);
        }
    }

    #[test]
    fn test_random_primes_are_large() {
        let mut rng = StdRng::seed_from_u64(2);
        let p = random_large_prime(&mut rng);
        assert!(p >= 1u64 << 63);
        assert!(is_prime(p));
    }

    #[test]
    fn test_generator_has_full_order() {
        let mut rng = StdRng::seed_from_u64(4);
        let p = 1_000_000_007;
        let factors = factorize(p - 1);
        let g = find_generator(&factors, p, &mut rng).unwrap();
        let m = Modulus::new(p).unwrap();
        assert!(g > 1 && g < p);
        assert_eq!(m.pow(g, p - 1), 1);
        assert!(factors.iter().all(|&q| m.pow(g, (p - 1) / q) != 1));
    }

    #[test]
    fn test_tiny_primes_have_no_usable_generator() {
        let mut rng = StdRng::seed_from_u64(4);
        assert_eq!(
            find_generator(&[], 2, &mut rng),
            Err(CandidateError::NoGenerator { p: 2 })
        );
        assert_eq!(find_generator(&factorize(2), 3, &mut rng), Ok(2));
    }

    #[test]
    fn test_fixed_source_rejects_composites() {
        assert_eq!(
            FixedPrimeSource::new(1_000_000_008).unwrap_err(),
            CandidateError::NotPrime { p: 1_000_000_008 }
        );
    }

    #[test]
    fn test_sources_produce_valid_candidates() {
        let mut rng = StdRng::seed_from_u64(8);
        let fixed = FixedPrimeSource::new(1_000_000_007).unwrap();
        let candidate = fixed.next_candidate(&mut rng).unwrap();
        assert_eq!(candidate.p, 1_000_000_007);
        assert!(candidate.g > 1 && candidate.g < candidate.p);

        let explored = ExplorationSource.next_candidate(&mut rng).unwrap();
        assert!(is_prime(explored.p));
        assert!(explored.g > 1 && explored.g < explored.p);
    }
}
