//! Command-line front end for the avalanche screening engine.
//!
//! Without `-p`, the tool explores fresh random primes; with `-p` it draws
//! `--p-samples` generators for the given prime.  Validation failures exit
//! with status 1, help and version output with status 0.

use clap::Parser;
use cornice::{publish, run, RunConfig, RunMode, StreamSeed, DEFAULT_TRIALS};
use std::path::PathBuf;
use tracing::warn;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser, Debug)]
#[command(name = "cornice")]
#[command(version, about = "Rank (P, G) parameters of x*G mod P by avalanche quality")]
#[command(after_help = "Examples:\n  \
    cornice                             # 10 random primes\n  \
    cornice 100                         # 100 random primes\n  \
    cornice -p 1000000007               # one generator for prime 1000000007\n  \
    cornice -p 1000000007 --p-samples 5 # five generators for prime 1000000007")]
struct Cli {
    /// Number of (P, G) pairs to test in exploration mode
    #[arg(value_name = "NUM_SAMPLES", default_value_t = 10,
          value_parser = clap::value_parser!(u64).range(1..))]
    num_samples: u64,

    /// Test generators of this specific prime instead of random primes
    #[arg(short = 'p', value_name = "PRIME", value_parser = clap::value_parser!(u64).range(1..))]
    prime: Option<u64>,

    /// With -p, number of (P, G) pairs to test for that prime
    #[arg(long = "p-samples", value_name = "N", default_value_t = 1,
          value_parser = clap::value_parser!(u64).range(1..))]
    p_samples: u64,

    /// Trials per candidate
    #[arg(long, value_name = "N", default_value_t = DEFAULT_TRIALS,
          value_parser = clap::value_parser!(u64).range(1..))]
    trials: u64,

    /// Master seed for reproducible runs
    #[arg(long, value_name = "SEED")]
    seed: Option<u64>,

    /// Directory for exploration reports
    #[arg(long, value_name = "DIR", default_value = ".")]
    output_dir: PathBuf,

    /// Also write exploration results as JSON lines
    #[arg(long)]
    json: bool,

    /// Log progress to stderr
    #[arg(short, long)]
    verbose: bool,
}

impl Cli {
    fn into_config(self) -> RunConfig {
        let (mode, samples) = match self.prime {
            Some(prime) => (RunMode::FixedPrime { prime }, self.p_samples),
            None => (RunMode::Exploration, self.num_samples),
        };
        RunConfig {
            mode,
            samples: samples as usize,
            trials: self.trials,
            seed: self.seed.map_or(StreamSeed::Entropy, StreamSeed::Fixed),
            output_dir: self.output_dir,
            json: self.json,
            ..RunConfig::default()
        }
    }
}

fn fatal(message: &str) -> ! {
    eprintln!("Error: {message}");
    std::process::exit(1);
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "info" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();
}

fn main() {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            let code = if err.use_stderr() { 1 } else { 0 };
            let _ = err.print();
            std::process::exit(code);
        }
    };
    init_logging(cli.verbose);
    if cli.prime.is_none() && cli.p_samples != 1 {
        warn!("--p-samples has no effect without -p");
    }

    let config = cli.into_config();
    let outcome = run(&config).unwrap_or_else(|err| fatal(&err.to_string()));
    let publication =
        publish(&config, &outcome).unwrap_or_else(|err| fatal(&format!("writing report: {err}")));

    print!("{}", publication.console);
    for path in &publication.files {
        eprintln!("Full results written to {}", path.display());
    }
    for excluded in &outcome.excluded {
        eprintln!("Task {} excluded: {}", excluded.index, excluded.failure);
    }
}
