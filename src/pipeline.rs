//! Pipeline driver
//!
//! Runs deflate -> similarity graph -> hierarchical clustering -> reinflate
//! over one dataset. Everything a stage needs is passed in explicitly
//! through [`PipelineContext`]; there is no process-wide state.

use log::info;
use rustc_hash::{FxHashMap, FxHashSet};
use std::time::Instant;

use crate::algorithm::deflate::{deflate, Deflation};
use crate::algorithm::graph::build_similarity_graph;
use crate::algorithm::hierarchy::{cluster_hierarchy, PartitionTree};
use crate::algorithm::reinflate::{reinflate_all, ThresholdClusters};
use crate::artifacts::{Artifact, ArtifactStore};
use crate::common::SimilarityEdge;
use crate::config::PipelineConfig;
use crate::diagnostics::{diagnostics_enabled, PipelineDiagnostics};
use crate::error::{PipelineError, Result};
use crate::sequence::Locus;
use crate::tools::Backends;

/// Everything produced by one run.
#[derive(Debug)]
pub struct PipelineOutput {
    pub deflation: Deflation,
    pub edges: Vec<SimilarityEdge>,
    pub tree: PartitionTree,
    /// One table per cluster-ladder threshold, ascending
    pub tables: Vec<ThresholdClusters>,
}

impl PipelineOutput {
    pub fn table(&self, threshold: f64) -> Option<&ThresholdClusters> {
        self.tables.iter().find(|t| t.threshold == threshold)
    }
}

/// Configuration, tool backends and artifact destination for one run.
pub struct PipelineContext<'a> {
    pub config: &'a PipelineConfig,
    pub backends: Backends<'a>,
    pub store: &'a dyn ArtifactStore,
    pub diagnostics: PipelineDiagnostics,
}

impl<'a> PipelineContext<'a> {
    pub fn new(config: &'a PipelineConfig, backends: Backends<'a>, store: &'a dyn ArtifactStore) -> Self {
        Self {
            config,
            backends,
            store,
            diagnostics: PipelineDiagnostics::default(),
        }
    }

    pub fn run(&self, loci: &[Locus]) -> Result<PipelineOutput> {
        let config = self.config;
        config.validate()?;
        let ladder = config.cluster_ladder()?;
        if loci.is_empty() {
            return Err(PipelineError::Configuration("no loci to cluster".to_string()));
        }
        let universe: FxHashSet<&str> = loci.iter().map(|l| l.id.as_str()).collect();
        if universe.len() != loci.len() {
            return Err(PipelineError::Configuration(format!(
                "{} loci share an identifier with another locus",
                loci.len() - universe.len()
            )));
        }

        let start = Instant::now();
        info!("Stage 1/4: deflation");
        let deflation = deflate(loci, config, self.backends.dedup, &self.diagnostics)?;
        self.store.put(&Artifact::DeflationLog(&deflation.log))?;
        self.store.put(&Artifact::CoreTable(&deflation.core))?;
        info!(
            "{} loci -> {} representatives + {} core families ({:.1}s)",
            loci.len(),
            deflation.map.len(),
            deflation.core.len(),
            start.elapsed().as_secs_f64()
        );

        let by_id: FxHashMap<&str, &Locus> = loci.iter().map(|l| (l.id.as_str(), l)).collect();
        let representatives: Vec<&Locus> = deflation
            .map
            .representatives()
            .map(|id| {
                by_id.get(id).copied().ok_or_else(|| {
                    PipelineError::invariant(
                        "deflation",
                        format!("representative '{}' is not an input locus", id),
                        1,
                        0,
                    )
                })
            })
            .collect::<Result<_>>()?;

        info!("Stage 2/4: similarity graph");
        let edges = build_similarity_graph(&representatives, config, self.backends.search, &self.diagnostics)?;

        info!("Stage 3/4: hierarchical clustering over {} thresholds", ladder.len());
        let rep_ids: Vec<String> = representatives.iter().map(|r| r.id.clone()).collect();
        let tree = cluster_hierarchy(
            &rep_ids,
            &edges,
            &ladder,
            config,
            self.backends.cluster,
            self.store,
            &self.diagnostics,
        )?;

        info!("Stage 4/4: reinflation");
        let tables = reinflate_all(&tree, &deflation.map, &deflation.core, &universe, self.store)?;

        if diagnostics_enabled() {
            self.diagnostics.log_summary();
        }
        info!("Pipeline finished in {:.1}s", start.elapsed().as_secs_f64());
        Ok(PipelineOutput {
            deflation,
            edges,
            tree,
            tables,
        })
    }
}

/// Run the whole pipeline over `loci` with the given backends.
pub fn run_pipeline(
    config: &PipelineConfig,
    loci: &[Locus],
    backends: Backends<'_>,
    store: &dyn ArtifactStore,
) -> Result<PipelineOutput> {
    PipelineContext::new(config, backends, store).run(loci)
}
