//! Diagnostic counters for the clustering pipeline
//!
//! Tracks where loci and edges go between stages: how many were frozen as
//! core, how many hits the span filter removed, how many self hits had to be
//! repaired. Enabled via the PANLADDER_DIAGNOSTICS environment variable;
//! counters are always collected, the summary is only logged when enabled.

use log::info;
use std::sync::atomic::{AtomicUsize, Ordering as AtomicOrdering};

/// Check if diagnostics are enabled via environment variable
pub fn diagnostics_enabled() -> bool {
    std::env::var("PANLADDER_DIAGNOSTICS")
        .map(|v| v == "1" || v.to_lowercase() == "true")
        .unwrap_or(false)
}

#[derive(Default, Debug)]
pub struct PipelineDiagnostics {
    // Deflation
    pub dedup_rounds: AtomicUsize,
    pub loci_in: AtomicUsize,
    pub core_clusters: AtomicUsize,
    pub core_loci: AtomicUsize,
    pub representatives: AtomicUsize,
    // Similarity graph
    pub search_chunks: AtomicUsize,
    pub edges_raw: AtomicUsize,
    pub edges_evalue_filtered: AtomicUsize,
    pub edges_span_filtered: AtomicUsize,
    pub self_hits_forced: AtomicUsize,
    pub self_hits_synthesized: AtomicUsize,
    // Hierarchical clustering
    pub subproblems_run: AtomicUsize,
    pub subproblems_singleton: AtomicUsize,
}

impl PipelineDiagnostics {
    pub fn add(counter: &AtomicUsize, n: usize) {
        counter.fetch_add(n, AtomicOrdering::Relaxed);
    }

    pub fn get(counter: &AtomicUsize) -> usize {
        counter.load(AtomicOrdering::Relaxed)
    }

    pub fn log_summary(&self) {
        let g = Self::get;
        info!("=== Pipeline Diagnostics ===");
        info!("Deflation:");
        info!("  Input loci:                 {}", g(&self.loci_in));
        info!("  Dedup rounds:               {}", g(&self.dedup_rounds));
        info!(
            "  Core clusters (loci):       {} ({})",
            g(&self.core_clusters),
            g(&self.core_loci)
        );
        info!("  Representatives:            {}", g(&self.representatives));
        info!("Similarity graph:");
        info!("  Search chunks:              {}", g(&self.search_chunks));
        info!("  Raw edges:                  {}", g(&self.edges_raw));
        info!("  Dropped by e-value:         {}", g(&self.edges_evalue_filtered));
        info!("  Dropped by span filter:     {}", g(&self.edges_span_filtered));
        info!("  Self hits forced to 100%:   {}", g(&self.self_hits_forced));
        info!("  Self hits synthesized:      {}", g(&self.self_hits_synthesized));
        info!("Hierarchical clustering:");
        info!("  Sub-problems clustered:     {}", g(&self.subproblems_run));
        info!("  Singleton parents carried:  {}", g(&self.subproblems_singleton));

        let loci_in = g(&self.loci_in);
        let reps = g(&self.representatives);
        if loci_in > 0 {
            info!(
                "  Deflation ratio:            {:.1}% of loci reach the graph",
                100.0 * reps as f64 / loci_in as f64
            );
        }
    }
}
