use clap::Args;
use std::path::PathBuf;

use crate::config::{
    ClusterConfig, ClusterLadder, DedupConfig, PipelineConfig, SearchConfig, SearchEngine, SequenceType,
    SpanFilter, Staging,
};
use crate::error::{PipelineError, Result};
use crate::report::TableStyle;
use crate::sequence::GenomeSource;

#[derive(Args, Debug, Clone)]
pub struct RunArgs {
    /// Locus FASTA file; repeat to cluster several independent datasets
    #[arg(short, long = "input", required = true)]
    pub inputs: Vec<PathBuf>,
    /// Two-column TSV mapping locus id to genome id
    #[arg(long, conflicts_with = "genome_delimiter")]
    pub genome_map: Option<PathBuf>,
    /// Derive the genome from the locus id prefix before this character
    #[arg(long)]
    pub genome_delimiter: Option<char>,
    #[arg(short = 't', long, default_value = "protein")]
    pub seq_type: SequenceType,
    /// blast, diamond or auto
    #[arg(long, default_value = "blast")]
    pub engine: SearchEngine,

    // Deflation
    #[arg(long, default_value_t = 100.0)]
    pub dedup_high: f64,
    #[arg(long, default_value_t = 98.0)]
    pub dedup_floor: f64,
    #[arg(long, default_value_t = 0.5)]
    pub dedup_step: f64,
    /// Memory budget for cd-hit in MB (0 = unlimited)
    #[arg(long, default_value_t = 2000)]
    pub memory_mb: usize,
    /// Do not freeze single-copy core families during deflation
    #[arg(long, default_value_t = false)]
    pub no_core: bool,

    // Search
    #[arg(long, default_value_t = 1e-6)]
    pub evalue: f64,
    /// Keep hits whose query span covers at least this fraction of the query
    #[arg(long)]
    pub min_query_span: Option<f64>,
    /// Like --min-query-span, and additionally require query span / subject span >= fraction
    #[arg(long)]
    pub min_reciprocal_span: Option<f64>,
    /// Number of query chunks searched concurrently
    #[arg(long, default_value_t = 1)]
    pub chunks: usize,

    // Clustering
    /// Comma-separated percent identities
    #[arg(long, default_value = "50,60,70,80,90,95,98")]
    pub thresholds: String,
    #[arg(short = 'I', long, default_value_t = 1.5)]
    pub inflation: f64,
    /// Sub-clustering jobs run at once
    #[arg(long, default_value_t = 1)]
    pub concurrency: usize,

    /// Total threads (0 = all CPUs)
    #[arg(short = 'n', long, default_value_t = 0)]
    pub num_threads: usize,
    #[arg(long, default_value = "panladder_work")]
    pub work_dir: PathBuf,
    #[arg(short, long, default_value = "panladder_out")]
    pub out_dir: PathBuf,
    /// Write intermediate tables to disk as they are produced
    #[arg(long, default_value_t = false)]
    pub disk_staging: bool,
    /// Use the in-process dedup and connected-components backends instead
    /// of cd-hit, blast and mcl
    #[arg(long, default_value_t = false)]
    pub native: bool,
    #[arg(long, default_value_t = false)]
    pub progress: bool,
    /// Precede every table with `#` lines naming it and its row count
    #[arg(long, default_value_t = false)]
    pub table_comments: bool,
}

impl RunArgs {
    pub fn genome_source(&self) -> Option<GenomeSource> {
        match (&self.genome_map, self.genome_delimiter) {
            (Some(path), _) => Some(GenomeSource::Mapping(path.clone())),
            (None, Some(delimiter)) => Some(GenomeSource::IdDelimiter(delimiter)),
            (None, None) => None,
        }
    }

    pub fn span_filter(&self) -> Result<Option<SpanFilter>> {
        match (self.min_query_span, self.min_reciprocal_span) {
            (Some(_), Some(_)) => Err(PipelineError::Configuration(
                "--min-query-span and --min-reciprocal-span are mutually exclusive".to_string(),
            )),
            (Some(min), None) => Ok(Some(SpanFilter::QueryCoverage(min))),
            (None, Some(min)) => Ok(Some(SpanFilter::Reciprocal(min))),
            (None, None) => Ok(None),
        }
    }

    pub fn table_style(&self) -> TableStyle {
        if self.table_comments {
            TableStyle::with_comments()
        } else {
            TableStyle::plain()
        }
    }

    pub fn resolved_threads(&self) -> usize {
        if self.num_threads == 0 {
            num_cpus::get()
        } else {
            self.num_threads
        }
    }

    /// Pipeline configuration for the dataset called `dataset`. Scratch
    /// files go to `<work_dir>/<dataset>`.
    pub fn to_config(&self, dataset: &str) -> Result<PipelineConfig> {
        let config = PipelineConfig {
            sequence_type: self.seq_type,
            engine: self.engine,
            dedup: DedupConfig {
                high: self.dedup_high,
                floor: self.dedup_floor,
                step: self.dedup_step,
                memory_mb: self.memory_mb,
                extract_core: !self.no_core,
            },
            search: SearchConfig {
                evalue: self.evalue,
                span_filter: self.span_filter()?,
                chunks: self.chunks,
            },
            cluster: ClusterConfig {
                thresholds: ClusterLadder::parse(&self.thresholds)?.thresholds().to_vec(),
                inflation: self.inflation,
                concurrency: self.concurrency,
            },
            threads: self.resolved_threads(),
            work_dir: self.work_dir.join(dataset),
            staging: if self.disk_staging { Staging::Disk } else { Staging::Memory },
            show_progress: self.progress,
        };
        config.validate()?;
        Ok(config)
    }
}
