use std::io::Write;

use anyhow::{bail, Context, Result};
use log::{debug, info};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::ThreadPoolBuilder;

use crate::index::{FMIndex, Sequence};
use crate::io::reads::ReadRecord;
use crate::util::dna;

/// Read simulation parameters.
#[derive(Debug, Clone)]
pub struct SimOpt {
    pub read_len: usize,
    /// Expected number of times each base is covered by some read.
    pub coverage: f64,
    /// Per-base substitution probability.
    pub error_rate: f64,
    /// Worker threads for the query fan-out (0 = rayon default).
    pub threads: usize,
    /// Fixed RNG seed for reproducible output.
    pub seed: Option<u64>,
    /// Write substituted bases in lower case.
    pub mark_errors: bool,
}

impl Default for SimOpt {
    fn default() -> Self {
        Self {
            read_len: 100,
            coverage: 2.0,
            error_rate: 0.01,
            threads: 1,
            seed: None,
            mark_errors: false,
        }
    }
}

impl SimOpt {
    fn validate(&self, n: usize) -> Result<()> {
        if self.read_len == 0 {
            bail!("read length must be positive");
        }
        // the sentinel is never part of a read
        if self.read_len >= n {
            bail!("read length {} exceeds sequence length {}", self.read_len, n - 1);
        }
        if !(0.0..=1.0).contains(&self.error_rate) {
            bail!("error rate {} not in [0, 1]", self.error_rate);
        }
        if !self.coverage.is_finite() || self.coverage < 0.0 {
            bail!("coverage {} must be a non-negative number", self.coverage);
        }
        Ok(())
    }

    /// `floor(coverage * n / read_len)`
    pub fn num_reads(&self, n: usize) -> usize {
        (self.coverage * n as f64 / self.read_len as f64) as usize
    }
}

fn make_rng(seed: Option<u64>) -> StdRng {
    match seed {
        Some(s) => StdRng::seed_from_u64(s),
        None => StdRng::from_entropy(),
    }
}

/// Plants substitutions into `read`, returning the mutated offsets.
fn mutate<R: Rng>(read: &mut [u8], error_rate: f64, mark: bool, rng: &mut R) -> Vec<usize> {
    let mut errors = Vec::new();
    for (k, base) in read.iter_mut().enumerate() {
        if rng.gen::<f64>() < error_rate {
            let sub = dna::substitute(*base, rng);
            *base = if mark { sub.to_ascii_lowercase() } else { sub };
            errors.push(k);
        }
    }
    errors
}

/// Samples reads from `seq`, locates every exact occurrence of each sampled
/// substring with the index, then plants random substitutions.
///
/// Sampling and mutation run on one seeded RNG so a fixed seed reproduces the
/// output exactly; only the index queries are spread over the worker pool.
pub fn simulate_reads(idx: &FMIndex, seq: &Sequence, opt: &SimOpt) -> Result<Vec<ReadRecord>> {
    let n = seq.len();
    if idx.len() != n {
        bail!("index length {} does not match sequence length {}", idx.len(), n);
    }
    opt.validate(n)?;

    let mut rng = make_rng(opt.seed);
    let count = opt.num_reads(n);
    let queries: Vec<(usize, usize)> = (0..count)
        .map(|_| (rng.gen_range(0..n - opt.read_len), opt.read_len))
        .collect();

    let pool = ThreadPoolBuilder::new()
        .num_threads(opt.threads)
        .build()
        .context("cannot build query thread pool")?;
    let t = std::time::Instant::now();
    let hits = pool.install(|| idx.search_batch(seq, &queries));
    info!(
        "{} queries of length {} on {} threads in {:.2?}",
        count,
        opt.read_len,
        pool.current_num_threads(),
        t.elapsed()
    );

    let mut records = Vec::with_capacity(count);
    for (&(start, len), positions) in queries.iter().zip(hits) {
        debug_assert!(positions.contains(&(start as u32)));
        let Some(sub) = seq.slice(start, len) else {
            bail!("sampled read {}+{} outside sequence", start, len);
        };
        let mut read = sub.to_vec();
        let errors = mutate(&mut read, opt.error_rate, opt.mark_errors, &mut rng);
        debug!("read at {}: {} hits, {} errors", start, positions.len(), errors.len());
        records.push(ReadRecord { read, positions, errors });
    }
    Ok(records)
}

/// Writes one line per record.
pub fn write_reads<W: Write>(records: &[ReadRecord], out: &mut W) -> Result<()> {
    for rec in records {
        writeln!(out, "{}", rec)?;
    }
    out.flush()?;
    Ok(())
}
