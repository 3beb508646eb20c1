use std::io::Write;

use anyhow::{bail, Result};
use log::{debug, info};
use rand::rngs::StdRng;
use rand::seq::index;
use rand::{Rng, SeedableRng};

use crate::util::dna;

/// Allele sets a variant site may carry: six biallelic, four triallelic, one with all bases.
pub const SNP_ALLELES: [&[u8]; 11] = [
    b"AC", b"AG", b"AT", b"CG", b"CT", b"GT", b"ACG", b"ACT", b"AGT", b"CGT", b"ACGT",
];

/// Variant genome generation parameters.
#[derive(Debug, Clone)]
pub struct GenomeOpt {
    /// Fraction of reference positions that become variant sites.
    pub mutation_rate: f64,
    /// Probability that a site is an indel rather than a SNP in a given genome.
    pub indel_frac: f64,
    /// Probability of extending an indel by one more base.
    pub indel_ext: f64,
    /// Number of genomes to generate.
    pub count: usize,
    pub seed: Option<u64>,
    /// Write substituted and inserted bases in lower case.
    pub mark_variants: bool,
}

impl Default for GenomeOpt {
    fn default() -> Self {
        Self {
            mutation_rate: 0.001,
            // indels are roughly eightfold rarer than SNPs
            indel_frac: 1.0 / 9.0,
            indel_ext: 0.3,
            count: 10,
            seed: None,
            mark_variants: false,
        }
    }
}

impl GenomeOpt {
    fn validate(&self) -> Result<()> {
        if self.count == 0 {
            bail!("number of genomes must be positive");
        }
        for (name, v) in [("mutation rate", self.mutation_rate), ("indel fraction", self.indel_frac)] {
            if !(0.0..=1.0).contains(&v) {
                bail!("{} {} not in [0, 1]", name, v);
            }
        }
        if !(0.0..1.0).contains(&self.indel_ext) {
            bail!("indel extension {} not in [0, 1)", self.indel_ext);
        }
        Ok(())
    }
}

/// One variant site shared by every generated genome.
///
/// `cumulative[i]` is the running total of expected carriers for
/// `alleles[0..=i]`; the last entry equals the number of genomes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnpSite {
    pub pos: usize,
    pub alleles: &'static [u8],
    pub cumulative: Vec<usize>,
}

impl SnpSite {
    /// Allele for a draw in `0..=count`: the first one whose running total reaches it.
    fn allele_for(&self, draw: usize) -> u8 {
        self.cumulative
            .iter()
            .position(|&f| draw <= f)
            .map_or(self.alleles[self.alleles.len() - 1], |i| self.alleles[i])
    }
}

/// Variant profile plus the genomes drawn from it.
#[derive(Debug, Clone)]
pub struct VariantSet {
    pub sites: Vec<SnpSite>,
    pub genomes: Vec<Vec<u8>>,
}

fn make_rng(seed: Option<u64>) -> StdRng {
    match seed {
        Some(s) => StdRng::seed_from_u64(s),
        None => StdRng::from_entropy(),
    }
}

fn sample_cumulative<R: Rng>(alleles: usize, count: usize, rng: &mut R) -> Vec<usize> {
    let mut f = Vec::with_capacity(alleles);
    let mut sum = 0;
    for _ in 1..alleles {
        sum += rng.gen_range(0..=count - sum);
        f.push(sum);
    }
    f.push(count);
    f
}

/// Picks `floor(rate * len)` distinct positions and an allele set for each, sorted by position.
pub fn build_profile<R: Rng>(len: usize, rate: f64, count: usize, rng: &mut R) -> Vec<SnpSite> {
    let num = ((rate * len as f64) as usize).min(len);
    let mut positions = index::sample(rng, len, num).into_vec();
    positions.sort_unstable();
    positions
        .into_iter()
        .map(|pos| {
            let alleles = SNP_ALLELES[rng.gen_range(0..SNP_ALLELES.len())];
            let cumulative = sample_cumulative(alleles.len(), count, rng);
            SnpSite { pos, alleles, cumulative }
        })
        .collect()
}

fn random_bases<R: Rng>(ext: f64, rng: &mut R) -> Vec<u8> {
    let mut seq = vec![dna::BASES[rng.gen_range(0..4)]];
    while rng.gen::<f64>() <= ext {
        seq.push(dna::BASES[rng.gen_range(0..4)]);
    }
    seq
}

fn deletion_len<R: Rng>(ext: f64, rng: &mut R) -> usize {
    let mut len = 1;
    while rng.gen::<f64>() <= ext {
        len += 1;
    }
    len
}

/// Per-genome edits, in reference coordinates.
#[derive(Debug, Default, PartialEq, Eq)]
struct Edits {
    snps: Vec<(usize, u8)>,
    /// `(start, len)` runs removed from the reference
    deletions: Vec<(usize, usize)>,
    /// bases inserted right after the reference position
    insertions: Vec<(usize, Vec<u8>)>,
}

fn draw_edits<R: Rng>(sites: &[SnpSite], opt: &GenomeOpt, rng: &mut R) -> Edits {
    let mut edits = Edits::default();
    let mut del_sites = Vec::new();
    let mut ins_sites = Vec::new();
    for site in sites {
        if rng.gen::<f64>() < opt.indel_frac {
            if rng.gen_bool(0.5) {
                ins_sites.push(site.pos);
            } else {
                del_sites.push(site.pos);
            }
        } else {
            let draw = rng.gen_range(0..=opt.count);
            edits.snps.push((site.pos, site.allele_for(draw)));
        }
    }
    edits.deletions = del_sites.into_iter().map(|p| (p, deletion_len(opt.indel_ext, rng))).collect();
    edits.insertions = ins_sites.into_iter().map(|p| (p, random_bases(opt.indel_ext, rng))).collect();
    edits
}

/// Applies edits to the reference. Insertions survive even when their anchor base is deleted.
fn apply_edits(reference: &[u8], edits: &Edits, mark: bool) -> Vec<u8> {
    let case = |b: u8| if mark { b.to_ascii_lowercase() } else { b };
    let mut bases = reference.to_vec();
    let mut keep = vec![true; reference.len()];
    for &(pos, b) in &edits.snps {
        bases[pos] = case(b);
    }
    for &(start, len) in &edits.deletions {
        let end = start.saturating_add(len).min(keep.len());
        keep[start..end].fill(false);
    }

    let mut out = Vec::with_capacity(reference.len() + edits.insertions.len());
    let mut ins = edits.insertions.iter().peekable();
    for (pos, &b) in bases.iter().enumerate() {
        if keep[pos] {
            out.push(b);
        }
        while let Some((_, seq)) = ins.next_if(|(p, _)| *p == pos) {
            out.extend(seq.iter().map(|&b| case(b)));
        }
    }
    out
}

/// Draws a shared variant profile from `reference` and `opt.count` genomes from it.
///
/// `reference` must hold only A, C, G, T or N (either case). The profile and
/// every genome come from one seeded RNG, so a fixed seed reproduces the set.
pub fn generate_genomes(reference: &[u8], opt: &GenomeOpt) -> Result<VariantSet> {
    opt.validate()?;
    if let Some((pos, b)) = dna::first_invalid(reference) {
        bail!("invalid base 0x{:02x} at position {}: expected A, C, G, T or N", b, pos);
    }
    let reference = reference.to_ascii_uppercase();

    let mut rng = make_rng(opt.seed);
    let sites = build_profile(reference.len(), opt.mutation_rate, opt.count, &mut rng);
    info!("{} variant sites over {} bases", sites.len(), reference.len());

    let genomes = (0..opt.count)
        .map(|i| {
            let edits = draw_edits(&sites, opt, &mut rng);
            debug!(
                "genome {}: {} SNPs, {} deletions, {} insertions",
                i + 1,
                edits.snps.len(),
                edits.deletions.len(),
                edits.insertions.len()
            );
            apply_edits(&reference, &edits, opt.mark_variants)
        })
        .collect();
    Ok(VariantSet { sites, genomes })
}

/// Writes the genomes as multi-FASTA, headers `>{i}.{header}` numbered from 1.
pub fn write_genomes<W: Write>(genomes: &[Vec<u8>], header: &str, out: &mut W) -> Result<()> {
    for (i, g) in genomes.iter().enumerate() {
        writeln!(out, ">{}.{}", i + 1, header)?;
        out.write_all(g)?;
        writeln!(out)?;
    }
    out.flush()?;
    Ok(())
}

/// Writes the profile: a note line, a column header, then `pos\talleles\tcumulative`.
pub fn write_profile<W: Write>(sites: &[SnpSite], indel_frac: f64, out: &mut W) -> Result<()> {
    writeln!(
        out,
        "Note: at each position, an indel occurs with probability {:.0}%.",
        indel_frac * 100.0
    )?;
    writeln!(out, "Pos\tSNP\tCumulative Expected Frequency")?;
    for s in sites {
        let freq: Vec<String> = s.cumulative.iter().map(|f| f.to_string()).collect();
        writeln!(out, "{}\t{}\t{}", s.pos, String::from_utf8_lossy(s.alleles), freq.join(","))?;
    }
    out.flush()?;
    Ok(())
}
