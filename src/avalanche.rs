//! Avalanche evaluation of the modular multiplicative map.
//!
//! For a candidate `(P, G)` the map under test is
//!
//! ```text
//! f(x) = x · G  mod P
//! ```
//!
//! An evaluation runs a fixed number of trials.  Each trial samples a
//! random 64-bit state together with a one-bit-flipped twin, pushes both
//! through `f` and records the Hamming distance between the two outputs.
//! The distances are tallied in an ordered [`Histogram`], which is a
//! sufficient statistic for the mean and the population standard deviation
//! reported in the [`EvaluationResult`].
//!
//! Evaluations are strictly sequential; parallelism lives one level up in
//! the [`orchestrator`](crate::orchestrator), across candidates.

use crate::modular::Modulus;
use crate::sampler::{hamming_distance, sample_perturbation, STATE_BITS};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

/// Trials per evaluation in the reference workload.
pub const DEFAULT_TRIALS: u64 = 10_000_000;

/// The mean Hamming distance of an ideal avalanche: half of the 64 bits.
pub const IDEAL_MEAN: f64 = (STATE_BITS / 2) as f64;

/// One `(P, G)` pair under evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Candidate {
    /// Prime modulus.
    pub p: u64,
    /// Multiplier, a generator of a large subgroup of `Z*_P`.
    pub g: u64,
}

impl Candidate {
    /// Creates a candidate from its modulus and multiplier.
    pub fn new(p: u64, g: u64) -> Self {
        Candidate { p, g }
    }
}

impl fmt::Display for Candidate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(P={}, G={})", self.p, self.g)
    }
}

/// Reasons a candidate cannot be evaluated.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EvaluationError {
    #[error("trial count must be positive")]
    /// The evaluation was asked to run zero trials.
    ZeroTrials,
    #[error("modulus {p} is not greater than 1")]
    /// `P <= 1` leaves no room for a mixing step.
    DegenerateModulus {
        /// Offending modulus.
        p: u64,
    },
    #[error("bit change count {bits} exceeds 64")]
    /// A histogram key outside `[0, 64]`.
    BitCountOutOfRange {
        /// Offending key.
        bits: u32,
    },
    #[error("recorded trial count {recorded} disagrees with histogram total {total}")]
    /// A stored result whose trial count does not match its histogram.
    TrialMismatch {
        /// Trial count carried by the record.
        recorded: u64,
        /// Sum of the histogram's occurrence counts.
        total: u64,
    },
    #[error("generator {g} is a multiple of modulus {p}; the map is constant")]
    /// `G ≡ 0 (mod P)` sends every input to zero.
    DegenerateGenerator {
        /// Modulus of the candidate.
        p: u64,
        /// Offending multiplier.
        g: u64,
    },
}

/// Occurrence counts keyed by the number of changed output bits.
///
/// Keys lie in `[0, 64]` and iterate in ascending order.  Only keys that
/// occurred at least once are stored; deserialization enforces both.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "BTreeMap<u32, u64>", into = "BTreeMap<u32, u64>")]
pub struct Histogram {
    counts: BTreeMap<u32, u64>,
}

impl Histogram {
    /// Creates an empty histogram.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records `occurrences` trials that changed `bits` output bits.
    ///
    /// # Panics
    ///
    /// Panics if `bits > 64`.
    pub fn add(&mut self, bits: u32, occurrences: u64) {
        assert!(bits <= STATE_BITS, "bit change count {bits} exceeds 64");
        if occurrences > 0 {
            *self.counts.entry(bits).or_insert(0) += occurrences;
        }
    }

    /// Records a single trial.
    pub fn record(&mut self, bits: u32) {
        self.add(bits, 1);
    }

    /// Occurrence count for `bits`, zero if never observed.
    pub fn count(&self, bits: u32) -> u64 {
        self.counts.get(&bits).copied().unwrap_or(0)
    }

    /// Iterates `(bits, occurrences)` in ascending order of `bits`.
    pub fn iter(&self) -> impl Iterator<Item = (u32, u64)> + '_ {
        self.counts.iter().map(|(&bits, &count)| (bits, count))
    }

    /// Number of distinct change counts observed.
    pub fn len(&self) -> usize {
        self.counts.len()
    }

    /// Returns `true` if nothing has been recorded.
    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    /// Total number of recorded trials.
    pub fn total(&self) -> u64 {
        self.counts.values().sum()
    }

    /// Mean change count, or `None` for an empty histogram.
    pub fn mean(&self) -> Option<f64> {
        let total = self.total();
        if total == 0 {
            return None;
        }
        let weighted: u64 = self.iter().map(|(bits, count)| bits as u64 * count).sum();
        Some(weighted as f64 / total as f64)
    }

    /// Population standard deviation around `mean`.
    pub fn population_stddev(&self, mean: f64) -> f64 {
        let total = self.total();
        if total == 0 {
            return 0.0;
        }
        let squared: f64 = self
            .iter()
            .map(|(bits, count)| {
                let diff = bits as f64 - mean;
                diff * diff * count as f64
            })
            .sum();
        (squared / total as f64).sqrt()
    }
}

impl TryFrom<BTreeMap<u32, u64>> for Histogram {
    type Error = EvaluationError;

    fn try_from(counts: BTreeMap<u32, u64>) -> Result<Self, Self::Error> {
        let mut histogram = Histogram::new();
        for (bits, count) in counts {
            if bits > STATE_BITS {
                return Err(EvaluationError::BitCountOutOfRange { bits });
            }
            histogram.add(bits, count);
        }
        Ok(histogram)
    }
}

impl From<Histogram> for BTreeMap<u32, u64> {
    fn from(histogram: Histogram) -> Self {
        histogram.counts
    }
}

/// Stored form of an [`EvaluationResult`].
///
/// Only the candidate and histogram are trusted; the statistics are
/// recomputed on the way in.
#[derive(Deserialize)]
struct ResultRecord {
    candidate: Candidate,
    trials: u64,
    histogram: Histogram,
}

impl TryFrom<ResultRecord> for EvaluationResult {
    type Error = EvaluationError;

    fn try_from(record: ResultRecord) -> Result<Self, Self::Error> {
        let total = record.histogram.total();
        if record.trials != total {
            return Err(EvaluationError::TrialMismatch {
                recorded: record.trials,
                total,
            });
        }
        EvaluationResult::from_histogram(record.candidate, record.histogram)
    }
}

/// Statistics gathered by one evaluation.
///
/// Built once at the end of [`evaluate_with_rng`] and never modified
/// afterwards; fields are read through accessors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "ResultRecord")]
pub struct EvaluationResult {
    candidate: Candidate,
    trials: u64,
    histogram: Histogram,
    mean_bit_changes: f64,
    stddev_bit_changes: f64,
    zero_change_percentage: f64,
}

impl EvaluationResult {
    /// Builds a result from a completed histogram.
    ///
    /// `bit_sum` and `zero_count` are the running totals kept during the
    /// trial loop.  Returns `ZeroTrials` for an empty histogram.
    fn from_tallies(
        candidate: Candidate,
        histogram: Histogram,
        bit_sum: u64,
        zero_count: u64,
    ) -> Result<Self, EvaluationError> {
        let trials = histogram.total();
        if trials == 0 {
            return Err(EvaluationError::ZeroTrials);
        }
        let mean = bit_sum as f64 / trials as f64;
        let stddev = histogram.population_stddev(mean);
        Ok(EvaluationResult {
            candidate,
            trials,
            histogram,
            mean_bit_changes: mean,
            stddev_bit_changes: stddev,
            zero_change_percentage: 100.0 * zero_count as f64 / trials as f64,
        })
    }

    /// Builds a result directly from a histogram.
    pub fn from_histogram(
        candidate: Candidate,
        histogram: Histogram,
    ) -> Result<Self, EvaluationError> {
        let bit_sum = histogram.iter().map(|(bits, count)| bits as u64 * count).sum();
        let zero_count = histogram.count(0);
        Self::from_tallies(candidate, histogram, bit_sum, zero_count)
    }

    /// The evaluated `(P, G)` pair.
    pub fn candidate(&self) -> Candidate {
        self.candidate
    }

    /// Number of trials that produced this result.
    pub fn trials(&self) -> u64 {
        self.trials
    }

    /// Change-count distribution over all trials.
    pub fn histogram(&self) -> &Histogram {
        &self.histogram
    }

    /// Average number of output bits that flipped.
    pub fn mean_bit_changes(&self) -> f64 {
        self.mean_bit_changes
    }

    /// Population standard deviation of the flipped-bit count.
    pub fn stddev_bit_changes(&self) -> f64 {
        self.stddev_bit_changes
    }

    /// Share of trials, in percent, whose outputs did not differ at all.
    pub fn zero_change_percentage(&self) -> f64 {
        self.zero_change_percentage
    }
}

fn check_candidate(candidate: Candidate, trials: u64) -> Result<Modulus, EvaluationError> {
    if trials == 0 {
        return Err(EvaluationError::ZeroTrials);
    }
    let modulus =
        Modulus::new(candidate.p).ok_or(EvaluationError::DegenerateModulus { p: candidate.p })?;
    if modulus.reduce(candidate.g) == 0 {
        return Err(EvaluationError::DegenerateGenerator {
            p: candidate.p,
            g: candidate.g,
        });
    }
    Ok(modulus)
}

/// Evaluates `candidate` over `trials` trials using a freshly seeded stream.
pub fn evaluate(candidate: Candidate, trials: u64) -> Result<EvaluationResult, EvaluationError> {
    let mut rng = StdRng::from_entropy();
    evaluate_with_rng(candidate, trials, &mut rng)
}

/// Evaluates `candidate` over `trials` trials drawing from `rng`.
///
/// The same generator state always reproduces the same histogram.
pub fn evaluate_with_rng<R: Rng + ?Sized>(
    candidate: Candidate,
    trials: u64,
    rng: &mut R,
) -> Result<EvaluationResult, EvaluationError> {
    let modulus = check_candidate(candidate, trials)?;
    let g = candidate.g;

    // Dense tally for the hot loop; folded into the ordered histogram below.
    let mut tally = [0u64; STATE_BITS as usize + 1];
    let mut bit_sum = 0u64;
    let mut zero_count = 0u64;
    for _ in 0..trials {
        let sample = sample_perturbation(rng);
        let mapped = modulus.mul(sample.state, g);
        let mapped_twin = modulus.mul(sample.modified_state, g);
        let bits = hamming_distance(mapped, mapped_twin);
        tally[bits as usize] += 1;
        bit_sum += bits as u64;
        if bits == 0 {
            zero_count += 1;
        }
    }

    let mut histogram = Histogram::new();
    for (bits, &count) in tally.iter().enumerate() {
        histogram.add(bits as u32, count);
    }
    EvaluationResult::from_tallies(candidate, histogram, bit_sum, zero_count)
}
