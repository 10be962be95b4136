//! Pipeline configuration
//!
//! `PipelineConfig` gathers every tunable of the four stages. It is plain
//! data: the binary fills it from command-line arguments, tests build it
//! directly. `validate()` must pass before any external tool is invoked.

pub mod ladder;

pub use ladder::{format_threshold, ClusterLadder, DedupLadder};

use std::path::PathBuf;

use crate::error::{PipelineError, Result};

/// Residue alphabet of the input loci
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SequenceType {
    #[default]
    Protein,
    Nucleotide,
}

impl std::str::FromStr for SequenceType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "protein" | "prot" | "aa" => Ok(SequenceType::Protein),
            "nucleotide" | "nucl" | "dna" | "nt" => Ok(SequenceType::Nucleotide),
            _ => Err(format!(
                "Unknown sequence type: {}. Use 'protein' or 'nucleotide'",
                s
            )),
        }
    }
}

impl std::fmt::Display for SequenceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SequenceType::Protein => write!(f, "protein"),
            SequenceType::Nucleotide => write!(f, "nucleotide"),
        }
    }
}

/// Homology search backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SearchEngine {
    /// blastp / blastn with makeblastdb
    #[default]
    Blast,
    /// diamond blastp (protein only)
    Diamond,
    /// diamond when available and applicable, blast otherwise
    Auto,
}

impl std::str::FromStr for SearchEngine {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "blast" => Ok(SearchEngine::Blast),
            "diamond" => Ok(SearchEngine::Diamond),
            "auto" => Ok(SearchEngine::Auto),
            _ => Err(format!(
                "Unknown search engine: {}. Use 'blast', 'diamond' or 'auto'",
                s
            )),
        }
    }
}

/// Alignment-span filter applied to search hits before clustering.
///
/// Only one filter can be active at a time.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SpanFilter {
    /// query HSP span / query length >= min
    QueryCoverage(f64),
    /// query span / query length >= min and query span / subject span >= min,
    /// each ratio folded to <= 1 by taking its reciprocal
    Reciprocal(f64),
}

impl SpanFilter {
    pub fn min_fraction(&self) -> f64 {
        match *self {
            SpanFilter::QueryCoverage(min) | SpanFilter::Reciprocal(min) => min,
        }
    }
}

/// Where intermediate artifacts are staged
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Staging {
    #[default]
    Memory,
    Disk,
}

#[derive(Debug, Clone)]
pub struct DedupConfig {
    /// First (highest) cutoff, percent
    pub high: f64,
    /// Last (lowest) cutoff, percent
    pub floor: f64,
    pub step: f64,
    /// Memory budget handed to the dedup tool, MB (0 = unlimited)
    pub memory_mb: usize,
    /// Freeze single-copy families present in every genome
    pub extract_core: bool,
}

impl Default for DedupConfig {
    fn default() -> Self {
        Self {
            high: 100.0,
            floor: 98.0,
            step: 0.5,
            memory_mb: 2000,
            extract_core: true,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SearchConfig {
    pub evalue: f64,
    pub span_filter: Option<SpanFilter>,
    /// Number of query chunks searched in parallel
    pub chunks: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            evalue: 1e-6,
            span_filter: None,
            chunks: 1,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ClusterConfig {
    /// Percent identities, any order; normalized by `ClusterLadder`
    pub thresholds: Vec<f64>,
    /// MCL inflation
    pub inflation: f64,
    /// Maximum number of sub-clustering jobs in flight
    pub concurrency: usize,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            thresholds: ClusterLadder::default().thresholds().to_vec(),
            inflation: 1.5,
            concurrency: 1,
        }
    }
}

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub sequence_type: SequenceType,
    pub engine: SearchEngine,
    pub dedup: DedupConfig,
    pub search: SearchConfig,
    pub cluster: ClusterConfig,
    /// Total thread budget shared by tool invocations
    pub threads: usize,
    /// Scratch directory for tool inputs, outputs and logs
    pub work_dir: PathBuf,
    pub staging: Staging,
    pub show_progress: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            sequence_type: SequenceType::default(),
            engine: SearchEngine::default(),
            dedup: DedupConfig::default(),
            search: SearchConfig::default(),
            cluster: ClusterConfig::default(),
            threads: 1,
            work_dir: PathBuf::from("panladder_work"),
            staging: Staging::default(),
            show_progress: false,
        }
    }
}

impl PipelineConfig {
    /// Reject invalid thresholds and conflicting option combinations.
    pub fn validate(&self) -> Result<()> {
        self.dedup_ladder()?;
        self.cluster_ladder()?;

        if self.sequence_type == SequenceType::Nucleotide && self.engine == SearchEngine::Diamond {
            return Err(PipelineError::Configuration(
                "diamond requires protein input; use --engine blast for nucleotide loci".to_string(),
            ));
        }
        if !(self.search.evalue > 0.0) {
            return Err(PipelineError::Configuration(format!(
                "e-value cutoff must be positive (got {})",
                self.search.evalue
            )));
        }
        if let Some(filter) = self.search.span_filter {
            let min = filter.min_fraction();
            if !(min > 0.0 && min <= 1.0) {
                return Err(PipelineError::Configuration(format!(
                    "span filter fraction must lie in (0, 1] (got {})",
                    min
                )));
            }
        }
        if !(self.cluster.inflation > 1.0) {
            return Err(PipelineError::Configuration(format!(
                "MCL inflation must be greater than 1 (got {})",
                self.cluster.inflation
            )));
        }
        if self.threads == 0 || self.cluster.concurrency == 0 || self.search.chunks == 0 {
            return Err(PipelineError::Configuration(
                "threads, concurrency and search chunks must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    pub fn dedup_ladder(&self) -> Result<DedupLadder> {
        DedupLadder::new(self.dedup.high, self.dedup.floor, self.dedup.step)
    }

    pub fn cluster_ladder(&self) -> Result<ClusterLadder> {
        ClusterLadder::new(&self.cluster.thresholds)
    }

    /// Threads available to each of `workers` concurrent tool invocations.
    pub fn threads_per_worker(&self, workers: usize) -> usize {
        (self.threads / workers.max(1)).max(1)
    }
}
