//! Consumers of the index: read simulation and verification, plus the
//! variant-genome generator and alignment evaluator around them.

pub mod eval;
pub mod genomes;
pub mod simulate;
pub mod verify;

pub use eval::{evaluate, load_truth, EvalReport, DEFAULT_GAP};
pub use genomes::{generate_genomes, write_genomes, write_profile, GenomeOpt, SnpSite, VariantSet};
pub use simulate::{simulate_reads, write_reads, SimOpt};
pub use verify::{verify_reads, Inconsistency, VerifyReport};
