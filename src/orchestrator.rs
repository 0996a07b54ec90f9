//! Parallel evaluation of candidate batches.
//!
//! A run derives `N` independent candidates, evaluates each of them on its
//! own worker and collects the outcomes behind a single mutex.  The lock is
//! held only for the push of one finished outcome.  Once every task has
//! joined, the surviving results are ranked best-first.
//!
//! Each task `i` owns a private random stream (see [`crate::prng`]); it uses
//! that stream both to derive its candidate and to drive the evaluation, so
//! tasks never contend on shared generator state.

use crate::avalanche::{
    evaluate_with_rng, Candidate, EvaluationError, EvaluationResult, DEFAULT_TRIALS,
};
use crate::number_theory::{
    CandidateError, CandidateSource, ExplorationSource, FixedPrimeSource,
};
use crate::prng::{task_rng, StreamSeed};
use crate::ranking::rank;
use crate::report::{
    render_fixed_prime, render_top, report_stem, write_json_report, write_text_report,
    CONSOLE_TOP,
};
use chrono::Local;
#[cfg(not(target_arch = "wasm32"))]
use rayon::prelude::*;
use std::io;
use std::path::PathBuf;
use std::sync::Mutex;
use std::time::Instant;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Which candidates a run explores.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    /// Fresh generators for one supplied prime.
    FixedPrime {
        /// The shared modulus.
        prime: u64,
    },
    /// A fresh random prime, and a generator for it, per candidate.
    Exploration,
}

/// Parameters of one run.
#[derive(Debug, Clone, PartialEq)]
pub struct RunConfig {
    /// Candidate selection mode.
    pub mode: RunMode,
    /// Number of candidates to evaluate.
    pub samples: usize,
    /// Trials per evaluation.
    pub trials: u64,
    /// Seeding of the per-task streams.
    pub seed: StreamSeed,
    /// Directory that receives exploration reports.
    pub output_dir: PathBuf,
    /// Also write a JSON-lines report in exploration mode.
    pub json: bool,
    /// Summaries printed to the console in exploration mode.
    pub console_top: usize,
}

impl Default for RunConfig {
    fn default() -> Self {
        RunConfig {
            mode: RunMode::Exploration,
            samples: 10,
            trials: DEFAULT_TRIALS,
            seed: StreamSeed::Entropy,
            output_dir: PathBuf::from("."),
            json: false,
            console_top: CONSOLE_TOP,
        }
    }
}

/// Errors that stop a run before any evaluation starts.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RunError {
    #[error("sample count must be positive")]
    /// `samples == 0`.
    NoSamples,
    #[error("trial count must be positive")]
    /// `trials == 0`.
    NoTrials,
    #[error("invalid prime: {0}")]
    /// The fixed-prime mode modulus was rejected.
    Candidate(#[from] CandidateError),
}

/// Why a single task contributed no result.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TaskFailure {
    #[error("candidate derivation failed: {0}")]
    /// The candidate source could not produce a pair.
    Candidate(#[from] CandidateError),
    #[error("evaluation of {candidate} failed: {source}")]
    /// The candidate was malformed.
    Evaluation {
        /// The rejected pair.
        candidate: Candidate,
        /// Underlying evaluation error.
        source: EvaluationError,
    },
}

/// A task that was excluded from the ranked batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExcludedTask {
    /// Index of the task within the run.
    pub index: usize,
    /// Reason for the exclusion.
    pub failure: TaskFailure,
}

/// Everything a finished run produced.
#[derive(Debug, Clone)]
pub struct RunOutcome {
    /// Successful results, best first.
    pub ranked: Vec<EvaluationResult>,
    /// Tasks that produced no result, by ascending index.
    pub excluded: Vec<ExcludedTask>,
}

/// Derives and evaluates the candidate of task `index`.
fn run_task(
    source: &dyn CandidateSource,
    index: usize,
    trials: u64,
    seed: StreamSeed,
) -> Result<EvaluationResult, TaskFailure> {
    let mut rng = task_rng(seed, index as u64);
    let candidate = source.next_candidate(&mut rng)?;
    let started = Instant::now();
    let result = evaluate_with_rng(candidate, trials, &mut rng)
        .map_err(|source| TaskFailure::Evaluation { candidate, source })?;
    debug!(
        task = index,
        p = candidate.p,
        g = candidate.g,
        mean = result.mean_bit_changes(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "evaluation finished"
    );
    Ok(result)
}

/// Runs `samples` tasks from `source` and ranks the successful results.
///
/// Results are appended to a mutex-guarded sink as tasks finish; ranking
/// starts only after every task has completed.  Equal scores keep task
/// index order, independent of completion order.
pub fn evaluate_batch(
    source: &dyn CandidateSource,
    samples: usize,
    trials: u64,
    seed: StreamSeed,
) -> RunOutcome {
    let sink: Mutex<Vec<(usize, Result<EvaluationResult, TaskFailure>)>> =
        Mutex::new(Vec::with_capacity(samples));
    let task = |index: usize| {
        let outcome = run_task(source, index, trials, seed);
        sink.lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push((index, outcome));
    };

    #[cfg(not(target_arch = "wasm32"))]
    (0..samples).into_par_iter().for_each(task);
    #[cfg(target_arch = "wasm32")]
    (0..samples).for_each(task);

    let mut collected = sink
        .into_inner()
        .unwrap_or_else(|poisoned| poisoned.into_inner());
    collected.sort_by_key(|(index, _)| *index);

    let mut ranked = Vec::with_capacity(collected.len());
    let mut excluded = Vec::new();
    for (index, outcome) in collected {
        match outcome {
            Ok(result) => ranked.push(result),
            Err(failure) => {
                warn!(task = index, source = source.name(), "excluded: {failure}");
                excluded.push(ExcludedTask { index, failure });
            }
        }
    }
    rank(&mut ranked);
    RunOutcome { ranked, excluded }
}

/// Validates `config`, runs the batch and returns the ranked outcome.
pub fn run(config: &RunConfig) -> Result<RunOutcome, RunError> {
    if config.samples == 0 {
        return Err(RunError::NoSamples);
    }
    if config.trials == 0 {
        return Err(RunError::NoTrials);
    }
    let source: Box<dyn CandidateSource> = match config.mode {
        RunMode::FixedPrime { prime } => Box::new(FixedPrimeSource::new(prime)?),
        RunMode::Exploration => Box::new(ExplorationSource),
    };
    info!(
        mode = source.name(),
        samples = config.samples,
        trials = config.trials,
        "starting run"
    );
    let started = Instant::now();
    let outcome = evaluate_batch(source.as_ref(), config.samples, config.trials, config.seed);
    info!(
        ranked = outcome.ranked.len(),
        excluded = outcome.excluded.len(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "run finished"
    );
    Ok(outcome)
}

/// Console text and written files of a published run.
#[derive(Debug, Clone, Default)]
pub struct Publication {
    /// Text destined for standard output.
    pub console: String,
    /// Report files written to disk.
    pub files: Vec<PathBuf>,
}

/// Renders `outcome` according to the mode of `config`.
///
/// Fixed-prime mode returns every result with its histogram and writes
/// nothing.  Exploration mode writes the full ranked batch to a timestamped
/// file (plus a JSON-lines twin when requested) and returns only the top
/// summaries for the console.
pub fn publish(config: &RunConfig, outcome: &RunOutcome) -> io::Result<Publication> {
    match config.mode {
        RunMode::FixedPrime { prime } => Ok(Publication {
            console: render_fixed_prime(prime, &outcome.ranked),
            files: Vec::new(),
        }),
        RunMode::Exploration => {
            let stem = report_stem(&Local::now());
            let mut files = vec![write_text_report(&config.output_dir, &stem, &outcome.ranked)?];
            if config.json {
                files.push(write_json_report(&config.output_dir, &stem, &outcome.ranked)?);
            }
            for path in &files {
                info!(path = %path.display(), "report written");
            }
            Ok(Publication {
                console: render_top(&outcome.ranked, config.console_top),
                files,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;

    /// Hands out a malformed candidate on roughly half of its draws.
    struct FlakySource;

    impl CandidateSource for FlakySource {
        fn next_candidate(&self, rng: &mut StdRng) -> Result<Candidate, CandidateError> {
            use rand::Rng;
            if rng.gen::<bool>() {
                Ok(Candidate::new(1_000_000_007, 5))
            } else {
                Ok(Candidate::new(1, 5))
            }
        }

        fn name(&self) -> &'static str {
            "flaky"
        }
    }

    struct FailingSource;

    impl CandidateSource for FailingSource {
        fn next_candidate(&self, _rng: &mut StdRng) -> Result<Candidate, CandidateError> {
            Err(CandidateError::NoGenerator { p: 2 })
        }

        fn name(&self) -> &'static str {
            "failing"
        }
    }

    #[test]
    fn test_malformed_candidates_are_excluded_not_ranked() {
        let outcome = evaluate_batch(&FlakySource, 16, 200, StreamSeed::Fixed(5));
        assert_eq!(outcome.ranked.len() + outcome.excluded.len(), 16);
        assert!(outcome.ranked.iter().all(|r| r.candidate().p == 1_000_000_007));
        for excluded in &outcome.excluded {
            assert_eq!(
                excluded.failure,
                TaskFailure::Evaluation {
                    candidate: Candidate::new(1, 5),
                    source: EvaluationError::DegenerateModulus { p: 1 },
                }
            );
        }
        let indices: Vec<usize> = outcome.excluded.iter().map(|e| e.index).collect();
        let mut sorted = indices.clone();
        sorted.sort_unstable();
        assert_eq!(indices, sorted);
    }

    #[test]
    fn test_source_failures_are_reported() {
        let outcome = evaluate_batch(&FailingSource, 3, 100, StreamSeed::Entropy);
        assert!(outcome.ranked.is_empty());
        assert_eq!(outcome.excluded.len(), 3);
        assert!(matches!(
            outcome.excluded[0].failure,
            TaskFailure::Candidate(CandidateError::NoGenerator { p: 2 })
        ));
    }

    #[test]
    fn test_run_rejects_bad_configs() {
        let base = RunConfig {
            trials: 100,
            ..RunConfig::default()
        };
        let no_samples = RunConfig {
            samples: 0,
            ..base.clone()
        };
        assert_eq!(run(&no_samples).unwrap_err(), RunError::NoSamples);

        let no_trials = RunConfig {
            trials: 0,
            ..base.clone()
        };
        assert_eq!(run(&no_trials).unwrap_err(), RunError::NoTrials);

        let composite = RunConfig {
            mode: RunMode::FixedPrime { prime: 1_000_000_008 },
            ..base
        };
        assert_eq!(
            run(&composite).unwrap_err(),
            RunError::Candidate(CandidateError::NotPrime { p: 1_000_000_008 })
        );
    }
}
