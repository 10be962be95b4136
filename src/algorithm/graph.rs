//! Similarity graph builder
//!
//! All-vs-all search of the representatives against themselves, split into
//! query chunks searched on a bounded worker pool. Hits then go through the
//! in-process filters and the self-hit repair, which guarantees that every
//! representative reaches the clustering stage with a 100% self edge even
//! when it has no homologs.

use log::{debug, info};
use rayon::prelude::*;
use rustc_hash::FxHashSet;

use crate::common::{compare_edges, SimilarityEdge};
use crate::config::PipelineConfig;
use crate::diagnostics::PipelineDiagnostics;
use crate::error::Result;
use crate::post::filter::{filter_by_evalue, filter_by_span, LengthTable};
use crate::sequence::Locus;
use crate::tools::{SearchParams, SearchRequest, SearchTool};

/// Counts reported by [`repair_self_hits`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SelfHitRepair {
    pub forced: usize,
    pub synthesized: usize,
}

/// Force every self hit to 100% identity and add a placeholder self hit for
/// each representative without one.
pub fn repair_self_hits(edges: &mut Vec<SimilarityEdge>, representatives: &[&Locus]) -> SelfHitRepair {
    let mut repair = SelfHitRepair::default();
    let mut has_self: FxHashSet<String> = FxHashSet::default();
    for edge in edges.iter_mut().filter(|e| e.is_self_hit()) {
        if edge.identity != 100.0 {
            edge.identity = 100.0;
            repair.forced += 1;
        }
        has_self.insert(edge.query_id.clone());
    }
    for rep in representatives {
        if !has_self.contains(&rep.id) {
            edges.push(SimilarityEdge::synthetic_self_hit(&rep.id));
            repair.synthesized += 1;
        }
    }
    repair
}

/// Search the representatives all-vs-all and return the repaired edge set,
/// sorted with [`compare_edges`].
pub fn build_similarity_graph(
    representatives: &[&Locus],
    config: &PipelineConfig,
    tool: &dyn SearchTool,
    diagnostics: &PipelineDiagnostics,
) -> Result<Vec<SimilarityEdge>> {
    if representatives.is_empty() {
        info!("No representatives left after deflation; skipping search");
        return Ok(Vec::new());
    }

    let chunks = config.search.chunks.min(representatives.len()).max(1);
    let chunk_size = representatives.len().div_ceil(chunks);
    let params = SearchParams {
        sequence_type: config.sequence_type,
        evalue: config.search.evalue,
        threads: config.threads_per_worker(chunks),
    };
    info!(
        "Searching {} representatives with {} in {} chunk(s)",
        representatives.len(),
        tool.name(),
        chunks
    );

    let index = tool.build_index(representatives, &params)?;
    let pool = rayon::ThreadPoolBuilder::new().num_threads(chunks).build()?;
    let per_chunk: Vec<Vec<SimilarityEdge>> = pool.install(|| {
        representatives
            .par_chunks(chunk_size)
            .enumerate()
            .map(|(i, queries)| {
                let request = SearchRequest {
                    label: format!("search_chunk_{:03}", i),
                    queries,
                    params,
                };
                let hits = tool.search(&index, &request)?;
                debug!("chunk {}: {} queries, {} hits", i, queries.len(), hits.len());
                Ok(hits)
            })
            .collect::<Result<Vec<_>>>()
    })?;
    PipelineDiagnostics::add(&diagnostics.search_chunks, per_chunk.len());

    let known: FxHashSet<&str> = representatives.iter().map(|r| r.id.as_str()).collect();
    let mut edges: Vec<SimilarityEdge> = per_chunk.into_iter().flatten().collect();
    let raw = edges.len();
    PipelineDiagnostics::add(&diagnostics.edges_raw, raw);
    edges.retain(|e| known.contains(e.query_id.as_str()) && known.contains(e.subject_id.as_str()));
    if edges.len() != raw {
        debug!("dropped {} hits to non-representative ids", raw - edges.len());
    }

    let before = edges.len();
    let mut edges = filter_by_evalue(edges, config.search.evalue);
    PipelineDiagnostics::add(&diagnostics.edges_evalue_filtered, before - edges.len());

    if let Some(filter) = config.search.span_filter {
        let lengths: LengthTable<'_> = representatives
            .iter()
            .map(|r| (r.id.as_str(), r.len()))
            .collect();
        let before = edges.len();
        edges = filter_by_span(edges, filter, &lengths);
        PipelineDiagnostics::add(&diagnostics.edges_span_filtered, before - edges.len());
        info!("Span filter {:?} removed {} edges", filter, before - edges.len());
    }

    let repair = repair_self_hits(&mut edges, representatives);
    PipelineDiagnostics::add(&diagnostics.self_hits_forced, repair.forced);
    PipelineDiagnostics::add(&diagnostics.self_hits_synthesized, repair.synthesized);
    if repair.synthesized > 0 {
        info!("Synthesized {} missing self hits", repair.synthesized);
    }

    edges.sort_by(compare_edges);
    info!("Similarity graph: {} edges over {} representatives", edges.len(), representatives.len());
    Ok(edges)
}
