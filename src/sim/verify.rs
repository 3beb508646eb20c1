use std::fmt;
use std::io::BufRead;

use anyhow::{Context, Result};
use log::{info, warn};

use crate::index::Sequence;
use crate::io::reads::ReadRecord;
use crate::util::dna;

/// A disagreement between a read line and the genome.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inconsistency {
    /// Genome body holds a symbol outside ACGTN.
    GenomeSymbol { pos: usize, byte: u8 },
    /// A read holds a symbol outside ACGTN.
    ReadSymbol { line: usize, offset: usize, byte: u8 },
    /// A claimed occurrence runs past the end of the genome.
    OutOfRange { line: usize, pos: u32 },
    /// An offset marked as an error matches the genome, or an unmarked one differs.
    Base {
        line: usize,
        pos: u32,
        offset: usize,
        is_error: bool,
        read_base: u8,
        genome_base: u8,
    },
}

impl fmt::Display for Inconsistency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Inconsistency::GenomeSymbol { pos, byte } => {
                write!(f, "genome contains invalid symbol 0x{:02x} at position {}", byte, pos)
            }
            Inconsistency::ReadSymbol { line, offset, byte } => {
                write!(f, "line {}: read contains invalid symbol 0x{:02x} at offset {}", line, byte, offset)
            }
            Inconsistency::OutOfRange { line, pos } => {
                write!(f, "line {}: occurrence at {} runs past the genome end", line, pos)
            }
            Inconsistency::Base { line, pos, offset, is_error, read_base, genome_base } => write!(
                f,
                "line {}: occurrence {} offset {} is_error={} read='{}' genome='{}'",
                line, pos, offset, is_error, read_base as char, genome_base as char
            ),
        }
    }
}

#[derive(Debug, Default)]
pub struct VerifyReport {
    pub reads: usize,
    pub occurrences: usize,
    pub inconsistencies: Vec<Inconsistency>,
}

impl VerifyReport {
    pub fn is_consistent(&self) -> bool {
        self.inconsistencies.is_empty()
    }
}

/// Body symbols outside ACGTN.
pub fn check_genome(seq: &Sequence) -> Vec<Inconsistency> {
    seq.body()
        .iter()
        .enumerate()
        .filter(|(_, &b)| !dna::is_valid_base(b))
        .map(|(pos, &byte)| Inconsistency::GenomeSymbol { pos, byte })
        .collect()
}

/// Checks one parsed read against every occurrence it claims.
///
/// Genome positions holding `N` are skipped. Case is ignored so reads written
/// with marked (lower-case) errors verify the same way.
pub fn check_record(seq: &Sequence, rec: &ReadRecord, line: usize) -> Vec<Inconsistency> {
    let mut found = Vec::new();
    if let Some((offset, byte)) = dna::first_invalid(&rec.read) {
        found.push(Inconsistency::ReadSymbol { line, offset, byte });
    }

    let body = seq.body();
    for &pos in &rec.positions {
        let Some(window) = body.get(pos as usize..pos as usize + rec.read.len()) else {
            found.push(Inconsistency::OutOfRange { line, pos });
            continue;
        };
        for (offset, (&r, &g)) in rec.read.iter().zip(window).enumerate() {
            if g.eq_ignore_ascii_case(&b'N') {
                continue;
            }
            let is_error = rec.errors.contains(&offset);
            if is_error == dna::bases_equal(r, g) {
                found.push(Inconsistency::Base {
                    line,
                    pos,
                    offset,
                    is_error,
                    read_base: r,
                    genome_base: g,
                });
            }
        }
    }
    found
}

/// Verifies every line of `reader` against `seq`.
///
/// Malformed lines abort with the offending line number; blank lines are skipped.
pub fn verify_reads<R: BufRead>(seq: &Sequence, reader: R) -> Result<VerifyReport> {
    let mut report = VerifyReport {
        inconsistencies: check_genome(seq),
        ..VerifyReport::default()
    };

    for (i, line) in reader.lines().enumerate() {
        let line_no = i + 1;
        let line = line.with_context(|| format!("cannot read line {}", line_no))?;
        if line.trim().is_empty() {
            continue;
        }
        let rec: ReadRecord = line
            .parse()
            .with_context(|| format!("malformed read line {}", line_no))?;
        report.reads += 1;
        report.occurrences += rec.positions.len();
        for inc in check_record(seq, &rec, line_no) {
            warn!("{}", inc);
            report.inconsistencies.push(inc);
        }
    }

    info!(
        "verified {} reads ({} occurrences): {} inconsistencies",
        report.reads,
        report.occurrences,
        report.inconsistencies.len()
    );
    Ok(report)
}
