//! Text and JSON rendering of ranked results.
//!
//! A histogram line has the form
//!
//! ```text
//! 31 bits: ################ (321470)
//! ```
//!
//! where each `#` stands for `trials / 500` occurrences, roughly 0.2% of
//! all trials.  Counts below one marker print no bar, only the count.

use crate::avalanche::{EvaluationResult, Histogram};
use chrono::{DateTime, TimeZone};
use std::fmt::Write as _;
use std::fs::{create_dir_all, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

/// Number of bar markers that make up the full trial count.
pub const BAR_RESOLUTION: u64 = 500;

/// Candidates printed to the console in exploration mode.
pub const CONSOLE_TOP: usize = 50;

const FILE_PREFIX: &str = "avalanche_results";

/// One-line summary: `P`, `G`, zero-change share, mean and stddev.
pub fn summary_line(result: &EvaluationResult) -> String {
    let candidate = result.candidate();
    format!(
        "P: {}, G: {}, Zero bits %: {:.6}, Mean: {:.6}, Stddev: {:.6}",
        candidate.p,
        candidate.g,
        result.zero_change_percentage(),
        result.mean_bit_changes(),
        result.stddev_bit_changes()
    )
}

/// Bar length for `count` occurrences out of `trials`.
pub fn bar_length(count: u64, trials: u64) -> u64 {
    count / (trials / BAR_RESOLUTION).max(1)
}

/// Renders one line per observed change count, ascending.
pub fn render_histogram(histogram: &Histogram, trials: u64) -> String {
    let mut out = String::new();
    for (bits, count) in histogram.iter() {
        let bar = bar_length(count, trials) as usize;
        let _ = write!(out, "{bits:>2} bits: ");
        out.push_str(&"#".repeat(bar));
        if bar > 0 {
            out.push(' ');
        }
        let _ = writeln!(out, "({count})");
    }
    out
}

/// Summary line followed by the labelled histogram and a blank line.
pub fn render_result(result: &EvaluationResult) -> String {
    format!(
        "{}\nHistogram:\n{}\n",
        summary_line(result),
        render_histogram(result.histogram(), result.trials())
    )
}

/// Console report for fixed-prime mode: every candidate with its histogram.
pub fn render_fixed_prime(prime: u64, ranked: &[EvaluationResult]) -> String {
    let mut out = format!("Results for P: {prime} (best first):\n");
    for result in ranked {
        out.push_str(&render_result(result));
    }
    out
}

/// Console report for exploration mode: summaries of the best `limit`.
pub fn render_top(ranked: &[EvaluationResult], limit: usize) -> String {
    let mut out = format!("Top {limit} results:\n");
    for result in ranked.iter().take(limit) {
        out.push_str(&summary_line(result));
        out.push('\n');
    }
    out
}

/// File name stem `avalanche_results_<YYYY-mm-dd_HH-MM-SS>`.
pub fn report_stem<Tz>(timestamp: &DateTime<Tz>) -> String
where
    Tz: TimeZone,
    Tz::Offset: std::fmt::Display,
{
    format!("{FILE_PREFIX}_{}", timestamp.format("%Y-%m-%d_%H-%M-%S"))
}

fn create_in(dir: &Path, file_name: String) -> io::Result<(PathBuf, BufWriter<File>)> {
    create_dir_all(dir)?;
    let path = dir.join(file_name);
    let file = File::create(&path)?;
    Ok((path, BufWriter::new(file)))
}

/// Writes every ranked result, with histograms, to `dir/<stem>.txt`.
pub fn write_text_report(
    dir: impl AsRef<Path>,
    stem: &str,
    ranked: &[EvaluationResult],
) -> io::Result<PathBuf> {
    let (path, mut writer) = create_in(dir.as_ref(), format!("{stem}.txt"))?;
    for result in ranked {
        writer.write_all(render_result(result).as_bytes())?;
    }
    writer.flush()?;
    Ok(path)
}

/// Writes one JSON object per ranked result to `dir/<stem>.jsonl`.
pub fn write_json_report(
    dir: impl AsRef<Path>,
    stem: &str,
    ranked: &[EvaluationResult],
) -> io::Result<PathBuf> {
    let (path, mut writer) = create_in(dir.as_ref(), format!("{stem}.jsonl"))?;
    for result in ranked {
        serde_json::to_writer(&mut writer, result)?;
        writer.write_all(b"\n")?;
    }
    writer.flush()?;
    Ok(path)
}
