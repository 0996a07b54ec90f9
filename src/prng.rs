//! Per-task randomness streams.
//!
//! Every evaluation task owns a private generator so that no random state
//! is shared between workers.  When a run is seeded, the seed of task `i`
//! is a domain-separated BLAKE2b-256 expansion of the master seed and `i`,
//! which keeps the streams independent of one another while making the
//! whole run reproducible.  Unseeded runs draw each task's seed from the
//! operating system.

use blake2::digest::{consts::U32, Digest};
use rand::rngs::StdRng;
use rand::SeedableRng;

type Blake2b256 = blake2::Blake2b<U32>;

const TASK_DOMAIN: &[u8] = b"cornice:v1:task";

/// Where the per-task streams get their seeds from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StreamSeed {
    /// Fresh operating-system entropy for every task.
    #[default]
    Entropy,
    /// Deterministic streams derived from a master seed.
    Fixed(u64),
}

/// Derives the 32-byte seed for task `index` from `master`.
pub fn derive_task_seed(master: u64, index: u64) -> [u8; 32] {
    let mut hasher = Blake2b256::new();
    hasher.update(TASK_DOMAIN);
    hasher.update(master.to_be_bytes());
    hasher.update(index.to_be_bytes());
    let mut seed = [0u8; 32];
    seed.copy_from_slice(&hasher.finalize());
    seed
}

/// Builds the private generator for task `index`.
pub fn task_rng(seed: StreamSeed, index: u64) -> StdRng {
    match seed {
        StreamSeed::Entropy => StdRng::from_entropy(),
        StreamSeed::Fixed(master) => StdRng::from_seed(derive_task_seed(master, index)),
    }
}
