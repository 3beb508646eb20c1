use std::collections::BTreeSet;
use std::fmt;
use std::io::BufRead;

use anyhow::{bail, Context, Result};
use log::{debug, info};

use crate::io::reads::ReadRecord;

/// Default maximal distance between a true and an aligned position.
pub const DEFAULT_GAP: u32 = 20;

/// Accuracy of an alignment against the simulated truth.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EvalReport {
    pub gap: u32,
    pub reads: usize,
    pub positions: usize,
    pub aligned_reads: usize,
    pub aligned_positions: usize,
    pub true_positives: usize,
    pub false_positives: usize,
    pub false_negatives: usize,
}

impl EvalReport {
    pub fn precision(&self) -> f64 {
        ratio(self.true_positives, self.true_positives + self.false_positives)
    }

    pub fn recall(&self) -> f64 {
        ratio(self.true_positives, self.true_positives + self.false_negatives)
    }
}

fn ratio(num: usize, den: usize) -> f64 {
    if den == 0 {
        0.0
    } else {
        num as f64 / den as f64
    }
}

impl fmt::Display for EvalReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "G={}", self.gap)?;
        writeln!(f, "Reads\tPos\tAreads\tApos\tTP\tFP\tFN\tPrecision\tRecall")?;
        write!(
            f,
            "{}\t{}\t{}\t{}\t{}\t{}\t{}\t{:.8}\t{:.8}",
            self.reads,
            self.positions,
            self.aligned_reads,
            self.aligned_positions,
            self.true_positives,
            self.false_positives,
            self.false_negatives,
            self.precision(),
            self.recall()
        )
    }
}

/// True positions of every read, indexed by line order in the reads file.
pub fn load_truth<R: BufRead>(reader: R) -> Result<Vec<Vec<u32>>> {
    let mut truth = Vec::new();
    for (i, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let rec: ReadRecord = line.parse().with_context(|| format!("reads line {}", i + 1))?;
        truth.push(rec.positions);
    }
    Ok(truth)
}

/// Scores alignment lines `<read index>\t<pos> <pos> ...` against `truth`.
///
/// An aligned position is a true positive when some true position of the same
/// read lies within `gap`; otherwise it is a false positive. Lines without a tab
/// are skipped; an index with no read is an error.
pub fn evaluate<R: BufRead>(truth: &[Vec<u32>], alignments: R, gap: u32) -> Result<EvalReport> {
    let mut report = EvalReport {
        gap,
        reads: truth.len(),
        positions: truth.iter().map(Vec::len).sum(),
        ..EvalReport::default()
    };

    for (i, line) in alignments.lines().enumerate() {
        let line = line?;
        let Some((idx, pos)) = line.trim().split_once('\t') else {
            continue;
        };
        let idx: usize = idx
            .trim()
            .parse()
            .with_context(|| format!("alignment line {}: bad read index '{}'", i + 1, idx))?;
        let Some(correct) = truth.get(idx) else {
            bail!("alignment line {}: no read with index {}", i + 1, idx);
        };
        let positions = pos
            .split_whitespace()
            .map(|p| p.parse::<u32>())
            .collect::<Result<BTreeSet<_>, _>>()
            .with_context(|| format!("alignment line {}: bad position list", i + 1))?;
        if positions.is_empty() {
            continue;
        }

        let tp = positions
            .iter()
            .filter(|&&p| correct.iter().any(|&q| p.abs_diff(q) <= gap))
            .count();
        debug!("read {}: {} aligned, {} within {} of the {} true", idx, positions.len(), tp, gap, correct.len());
        report.aligned_reads += 1;
        report.aligned_positions += positions.len();
        report.true_positives += tp;
        report.false_positives += positions.len() - tp;
    }
    report.false_negatives = report.positions.saturating_sub(report.true_positives);

    info!(
        "evaluated {} aligned reads: precision {:.4}, recall {:.4}",
        report.aligned_reads,
        report.precision(),
        report.recall()
    );
    Ok(report)
}
