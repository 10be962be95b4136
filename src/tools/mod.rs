//! External tool adapters
//!
//! Each pipeline stage talks to its backend through one of three traits:
//! [`DedupTool`], [`SearchTool`] and [`GraphClusterTool`]. Requests and
//! results are structured values, never file paths, so backends are
//! swappable: the process-based adapters (`cdhit`, `blast`, `mcl`) wrap the
//! real binaries, while `native` provides small in-process implementations.
//!
//! Backends must be `Sync`: the graph builder and the cluster engine call
//! them from several worker threads at once, each with a distinct label.

pub mod blast;
pub mod cdhit;
pub mod mcl;
pub mod native;
pub mod process;

use log::{info, warn};
use std::path::{Path, PathBuf};

use crate::common::SimilarityEdge;
use crate::config::{PipelineConfig, SearchEngine, SequenceType};
use crate::error::Result;
use crate::sequence::Locus;

pub use blast::{BlastSearch, DiamondSearch};
pub use cdhit::CdHit;
pub use mcl::Mcl;
pub use native::{ConnectedComponents, GreedyDedup, NativeSearch};

/// One near-duplicate clustering run at a single cutoff.
#[derive(Debug, Clone)]
pub struct DedupRequest<'a> {
    /// Unique name for files written by this run
    pub label: String,
    pub loci: &'a [&'a Locus],
    /// Percent identity
    pub identity: f64,
    pub word_size: usize,
    pub threads: usize,
    pub memory_mb: usize,
    pub sequence_type: SequenceType,
}

/// A dedup cluster; `members` includes the representative.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DedupCluster {
    pub representative: String,
    pub members: Vec<String>,
}

pub trait DedupTool: Send + Sync {
    fn name(&self) -> &str;
    fn deduplicate(&self, request: &DedupRequest<'_>) -> Result<Vec<DedupCluster>>;
}

#[derive(Debug, Clone, Copy)]
pub struct SearchParams {
    pub sequence_type: SequenceType,
    pub evalue: f64,
    pub threads: usize,
}

/// Handle to a search database built from the representative set.
#[derive(Debug, Clone)]
pub struct SearchIndex {
    /// Database prefix on disk, if the backend uses one
    pub location: Option<PathBuf>,
    pub num_sequences: usize,
    /// Database loci kept in memory by in-process backends
    pub resident: Vec<Locus>,
}

#[derive(Debug, Clone)]
pub struct SearchRequest<'a> {
    pub label: String,
    pub queries: &'a [&'a Locus],
    pub params: SearchParams,
}

pub trait SearchTool: Send + Sync {
    fn name(&self) -> &str;
    fn build_index(&self, database: &[&Locus], params: &SearchParams) -> Result<SearchIndex>;
    fn search(&self, index: &SearchIndex, request: &SearchRequest<'_>) -> Result<Vec<SimilarityEdge>>;
}

#[derive(Debug, Clone, PartialEq)]
pub struct WeightedEdge {
    pub a: String,
    pub b: String,
    pub weight: f64,
}

/// An independent graph-clustering sub-problem.
#[derive(Debug, Clone)]
pub struct GraphProblem {
    pub label: String,
    pub nodes: Vec<String>,
    pub edges: Vec<WeightedEdge>,
}

#[derive(Debug, Clone, Copy)]
pub struct ClusterParams {
    pub inflation: f64,
    pub threads: usize,
}

pub trait GraphClusterTool: Send + Sync {
    fn name(&self) -> &str;
    fn cluster(&self, problem: &GraphProblem, params: &ClusterParams) -> Result<Vec<Vec<String>>>;
}

/// The three backends a pipeline run needs.
pub struct Backends<'a> {
    pub dedup: &'a dyn DedupTool,
    pub search: &'a dyn SearchTool,
    pub cluster: &'a dyn GraphClusterTool,
}

/// In-process backends; no external binaries needed.
#[derive(Debug, Default, Clone, Copy)]
pub struct NativeBackends {
    pub dedup: GreedyDedup,
    pub search: NativeSearch,
    pub cluster: ConnectedComponents,
}

impl NativeBackends {
    pub fn as_backends(&self) -> Backends<'_> {
        Backends {
            dedup: &self.dedup,
            search: &self.search,
            cluster: &self.cluster,
        }
    }
}

/// Process-based backends writing into one working directory.
pub struct ExternalBackends {
    pub dedup: CdHit,
    pub search: Box<dyn SearchTool>,
    pub cluster: Mcl,
}

impl ExternalBackends {
    /// Check PATH for every required tool and build the adapters.
    pub fn from_config(config: &PipelineConfig) -> Result<Self> {
        let work_dir = config.work_dir.as_path();
        std::fs::create_dir_all(work_dir)?;
        let engine = check_dependencies(config)?;
        let search: Box<dyn SearchTool> = match engine {
            SearchEngine::Diamond => Box::new(DiamondSearch::new(work_dir)),
            _ => Box::new(BlastSearch::new(work_dir)),
        };
        Ok(Self {
            dedup: CdHit::new(work_dir),
            search,
            cluster: Mcl::new(work_dir),
        })
    }

    pub fn as_backends(&self) -> Backends<'_> {
        Backends {
            dedup: &self.dedup,
            search: self.search.as_ref(),
            cluster: &self.cluster,
        }
    }
}

/// Resolve the search engine and verify that every required binary is on
/// PATH. A missing optional tool (diamond under `auto`) only downgrades the
/// engine.
pub fn check_dependencies(config: &PipelineConfig) -> Result<SearchEngine> {
    let dedup_tool = cdhit::program_for(config.sequence_type);
    process::require(dedup_tool, "deflation")?;
    process::require(mcl::PROGRAM, "graph clustering")?;

    let engine = match config.engine {
        SearchEngine::Auto => {
            if config.sequence_type == SequenceType::Protein
                && process::find_executable(blast::DIAMOND).is_some()
            {
                SearchEngine::Diamond
            } else {
                if config.sequence_type == SequenceType::Protein {
                    warn!("diamond not found on PATH; falling back to BLAST");
                }
                SearchEngine::Blast
            }
        }
        engine => engine,
    };

    match engine {
        SearchEngine::Diamond => {
            process::require(blast::DIAMOND, "similarity search")?;
        }
        _ => {
            process::require(blast::MAKEBLASTDB, "similarity search")?;
            process::require(blast::search_program(config.sequence_type), "similarity search")?;
        }
    }
    info!("Using {} for deflation, {:?} for search, {} for clustering", dedup_tool, engine, mcl::PROGRAM);
    Ok(engine)
}

/// `<dir>/<label>.<ext>`; labels may contain dots, so no `with_extension`.
pub(crate) fn labelled_path(dir: &Path, label: &str, ext: &str) -> PathBuf {
    dir.join(format!("{}.{}", label, ext))
}
