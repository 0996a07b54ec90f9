#![deny(missing_docs)]

//! # cornice
//!
//! **cornice** screens parameters of the modular multiplicative map
//!
//! ```text
//! f(x) = x · G  mod P
//! ```
//!
//! for use as a cheap mixing stage in hashes and PRNGs.  For each candidate
//! `(P, G)` it measures the avalanche behaviour of `f` empirically: flip one
//! random bit of a random 64-bit input and count how many output bits change.
//! An ideal mixer flips half of the 64 bits on average, with little spread
//! and essentially never zero.
//!
//! ## Modules
//!
//! * [`avalanche`] runs the trials for one candidate and condenses them into
//!   an [`EvaluationResult`] (ordered histogram, mean, standard deviation,
//!   zero-change share).
//! * [`ranking`] orders results by a weighted distance from the ideal.
//! * [`number_theory`] derives candidates: random 64-bit primes,
//!   factorizations of `P - 1` and primitive roots.
//! * [`orchestrator`] evaluates a batch of candidates in parallel, collects
//!   the results under a single lock and ranks them.
//! * [`report`] renders summaries and histograms.
//!
//! This is not a cryptographic primitive and ranks candidates only by an
//! empirical proxy.
//!
//! ## Usage
//!
//! ```rust
//! use cornice::{evaluate_with_rng, Candidate};
//! use rand::{rngs::StdRng, SeedableRng};
//!
//! let mut rng = StdRng::seed_from_u64(7);
//! let candidate = Candidate::new(18_446_744_073_709_551_557, 0x9E37_79B9_7F4A_7C15);
//! let result = evaluate_with_rng(candidate, 2_000, &mut rng).unwrap();
//! assert_eq!(result.histogram().total(), 2_000);
//! assert!((result.mean_bit_changes() - 32.0).abs() < 5.0);
//! ```

pub mod avalanche;
mod modular;
pub mod number_theory;
pub mod orchestrator;
mod prng;
pub mod ranking;
pub mod report;
mod sampler;

pub use avalanche::{
    evaluate, evaluate_with_rng, Candidate, EvaluationError, EvaluationResult, Histogram,
    DEFAULT_TRIALS,
};
pub use modular::Modulus;
pub use number_theory::{
    factorize, find_generator, is_prime, random_large_prime, CandidateError, CandidateSource,
    ExplorationSource, FixedPrimeSource,
};
pub use orchestrator::{
    evaluate_batch, publish, run, ExcludedTask, Publication, RunConfig, RunError, RunMode,
    RunOutcome, TaskFailure,
};
pub use prng::{derive_task_seed, task_rng, StreamSeed};
pub use ranking::{compare, rank, score};
pub use sampler::{hamming_distance, sample_perturbation, Perturbation};
