use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use log::info;

use fm_readsim::index::{store, FMIndex, IndexMeta};
use fm_readsim::io::fasta::{read_sequence, FastaReader};
use fm_readsim::sim::{self, GenomeOpt, SimOpt};

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: tikv_jemallocator::Jemalloc = tikv_jemallocator::Jemalloc;

#[derive(Parser, Debug)]
#[command(name = "fm-readsim", author, version, about = "FM-index exact search and read simulation", arg_required_else_help = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Build the FM index of a sequence and save it
    Index {
        /// Sequence file (plain text or FASTA)
        sequence: PathBuf,
        /// Output index directory (default: <sequence>.index)
        #[arg(short, long)]
        out: Option<PathBuf>,
    },
    /// Print every occurrence of a pattern
    Search {
        /// Index directory
        #[arg(short = 'i', long = "index")]
        index: PathBuf,
        /// Literal pattern to search for
        #[arg(short, long, conflicts_with_all = ["sequence", "start"])]
        pattern: Option<String>,
        /// Sequence file; the pattern is sequence[start..start+len)
        #[arg(short, long, requires_all = ["start", "len"])]
        sequence: Option<PathBuf>,
        #[arg(long)]
        start: Option<usize>,
        #[arg(short, long)]
        len: Option<usize>,
    },
    /// Sample reads, locate them with the index and plant substitution errors
    Simulate {
        /// Sequence file (plain text or FASTA)
        sequence: PathBuf,
        /// Load this index instead of building one
        #[arg(short = 'i', long = "index")]
        index: Option<PathBuf>,
        #[arg(short = 'l', long = "read-len", default_value_t = 100)]
        read_len: usize,
        #[arg(short = 'c', long = "coverage", default_value_t = 2.0)]
        coverage: f64,
        #[arg(short = 'e', long = "error-rate", default_value_t = 0.01)]
        error_rate: f64,
        #[arg(short = 't', long = "threads", default_value_t = 1)]
        threads: usize,
        #[arg(long)]
        seed: Option<u64>,
        /// Write substituted bases in lower case
        #[arg(long = "mark-errors")]
        mark_errors: bool,
        /// Output path (stdout if omitted)
        #[arg(short, long)]
        out: Option<PathBuf>,
    },
    /// Check simulated reads against the genome
    Verify {
        /// Genome sequence file
        #[arg(short = 's', long = "sequence")]
        sequence: PathBuf,
        /// Reads file produced by `simulate`
        #[arg(short = 'r', long = "reads")]
        reads: PathBuf,
    },
    /// Generate variant genomes (SNPs and indels) from a reference
    Genomes {
        /// Reference sequence file (FASTA or plain text, ACGTN only)
        sequence: PathBuf,
        #[arg(short = 'm', long = "mutation-rate", default_value_t = 0.001)]
        mutation_rate: f64,
        #[arg(short = 'i', long = "indel-frac", default_value_t = 1.0 / 9.0)]
        indel_frac: f64,
        #[arg(long = "indel-ext", default_value_t = 0.3)]
        indel_ext: f64,
        /// Number of genomes
        #[arg(short = 'n', default_value_t = 10)]
        count: usize,
        #[arg(long)]
        seed: Option<u64>,
        /// Write substituted and inserted bases in lower case
        #[arg(long = "mark-variants")]
        mark_variants: bool,
        #[arg(short, long, default_value = "multigenome.fasta")]
        out: PathBuf,
        #[arg(short, long, default_value = "snp_profile.txt")]
        profile: PathBuf,
    },
    /// Score an alignment against the positions recorded in a reads file
    Eval {
        /// Reads file produced by `simulate`
        reads: PathBuf,
        /// Alignment lines: <read index>TAB<positions...>
        alignment: PathBuf,
        /// Maximal distance between a true and an aligned position
        #[arg(short = 'g', long = "gap", default_value_t = sim::DEFAULT_GAP)]
        gap: u32,
    },
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();
    match cli.command {
        Commands::Index { sequence, out } => run_index(&sequence, out),
        Commands::Search { index, pattern, sequence, start, len } => {
            run_search(&index, pattern, sequence.as_deref(), start, len)
        }
        Commands::Simulate {
            sequence,
            index,
            read_len,
            coverage,
            error_rate,
            threads,
            seed,
            mark_errors,
            out,
        } => {
            let opt = SimOpt { read_len, coverage, error_rate, threads, seed, mark_errors };
            run_simulate(&sequence, index.as_deref(), out.as_deref(), &opt)
        }
        Commands::Verify { sequence, reads } => run_verify(&sequence, &reads),
        Commands::Genomes {
            sequence,
            mutation_rate,
            indel_frac,
            indel_ext,
            count,
            seed,
            mark_variants,
            out,
            profile,
        } => {
            let opt = GenomeOpt { mutation_rate, indel_frac, indel_ext, count, seed, mark_variants };
            run_genomes(&sequence, &out, &profile, &opt)
        }
        Commands::Eval { reads, alignment, gap } => run_eval(&reads, &alignment, gap),
    }
}

fn open_output(out: Option<&Path>) -> Result<Box<dyn Write>> {
    Ok(match out {
        Some(p) => Box::new(std::io::BufWriter::new(
            std::fs::File::create(p).with_context(|| format!("cannot create '{}'", p.display()))?,
        )),
        None => Box::new(std::io::BufWriter::new(std::io::stdout())),
    })
}

fn run_index(sequence: &Path, out: Option<PathBuf>) -> Result<()> {
    let seq = read_sequence(sequence)
        .with_context(|| format!("cannot read sequence '{}'", sequence.display()))?;

    let mut fm = FMIndex::build(&seq);
    fm.set_meta(IndexMeta {
        source_file: Some(sequence.display().to_string()),
        build_args: Some(std::env::args().collect::<Vec<_>>().join(" ")),
        build_timestamp: Some(chrono::Utc::now().to_rfc3339()),
    });

    let dir = out.unwrap_or_else(|| store::default_dir(sequence));
    fm.save_to_dir(&dir)
        .with_context(|| format!("cannot write index to '{}'", dir.display()))?;
    println!("sequence: {}", sequence.display());
    println!("length: {}", seq.len());
    println!("symbols: {}", String::from_utf8_lossy(fm.symbols()));
    println!("FM index saved: {}", dir.display());
    Ok(())
}

fn run_search(
    index: &Path,
    pattern: Option<String>,
    sequence: Option<&Path>,
    start: Option<usize>,
    len: Option<usize>,
) -> Result<()> {
    let fm = FMIndex::load_from_dir(index)
        .with_context(|| format!("cannot load index '{}'", index.display()))?;
    let hits = match (pattern, sequence, start, len) {
        (Some(p), _, _, _) => fm.search_pattern(p.to_ascii_uppercase().as_bytes()),
        (None, Some(s), Some(start), Some(len)) => {
            let seq = read_sequence(s).with_context(|| format!("cannot read sequence '{}'", s.display()))?;
            if seq.len() != fm.len() {
                bail!("sequence length {} does not match index length {}", seq.len(), fm.len());
            }
            fm.search(&seq, start, len)
        }
        _ => bail!("either --pattern or --sequence/--start/--len is required"),
    };

    let mut out = open_output(None)?;
    write!(out, "{}", hits.len())?;
    for p in &hits {
        write!(out, " {}", p)?;
    }
    writeln!(out)?;
    out.flush()?;
    Ok(())
}

fn run_simulate(sequence: &Path, index: Option<&Path>, out: Option<&Path>, opt: &SimOpt) -> Result<()> {
    let seq = read_sequence(sequence)
        .with_context(|| format!("cannot read sequence '{}'", sequence.display()))?;
    let fm = match index {
        Some(dir) => FMIndex::load_from_dir(dir)
            .with_context(|| format!("cannot load index '{}'", dir.display()))?,
        None => FMIndex::build(&seq),
    };
    let reads = sim::simulate_reads(&fm, &seq, opt)?;
    let mut w = open_output(out)?;
    sim::write_reads(&reads, &mut w)?;
    info!("wrote {} reads", reads.len());
    Ok(())
}

fn run_verify(sequence: &Path, reads: &Path) -> Result<()> {
    let seq = read_sequence(sequence)
        .with_context(|| format!("cannot read genome '{}'", sequence.display()))?;
    let f = std::fs::File::open(reads).with_context(|| format!("cannot open reads '{}'", reads.display()))?;
    let report = sim::verify_reads(&seq, std::io::BufReader::new(f))?;

    for inc in &report.inconsistencies {
        println!("{}", inc);
    }
    println!(
        "Finished verifying {} reads ({}) against {} (len={}): {} inconsistencies",
        report.reads,
        reads.display(),
        sequence.display(),
        seq.len(),
        report.inconsistencies.len()
    );
    Ok(())
}

/// First FASTA header id, or the file stem for plain text.
fn reference_name(path: &Path) -> Result<String> {
    let f = std::fs::File::open(path).with_context(|| format!("cannot open '{}'", path.display()))?;
    let first = FastaReader::new(std::io::BufReader::new(f)).next_record()?;
    Ok(match first {
        Some(rec) if !rec.id.is_empty() => rec.id,
        _ => path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "genome".to_string()),
    })
}

fn run_genomes(sequence: &Path, out: &Path, profile: &Path, opt: &GenomeOpt) -> Result<()> {
    let seq = read_sequence(sequence)
        .with_context(|| format!("cannot read reference '{}'", sequence.display()))?;
    let header = reference_name(sequence)?;
    let set = sim::generate_genomes(seq.body(), opt)?;

    let mut w = open_output(Some(profile))?;
    sim::write_profile(&set.sites, opt.indel_frac, &mut w)?;
    println!("Save SNP profile to {}", profile.display());
    let mut w = open_output(Some(out))?;
    sim::write_genomes(&set.genomes, &header, &mut w)?;
    println!("Save {} genomes to {}", set.genomes.len(), out.display());
    Ok(())
}

fn run_eval(reads: &Path, alignment: &Path, gap: u32) -> Result<()> {
    let open = |p: &Path| {
        std::fs::File::open(p)
            .map(std::io::BufReader::new)
            .with_context(|| format!("cannot open '{}'", p.display()))
    };
    let truth = sim::load_truth(open(reads)?)?;
    let report = sim::evaluate(&truth, open(alignment)?, gap)?;
    println!("{}", report);
    Ok(())
}
