use rustc_hash::FxHashMap;

use crate::common::SimilarityEdge;
use crate::config::SpanFilter;

/// Filter edges by E-value threshold
pub fn filter_by_evalue(edges: Vec<SimilarityEdge>, max_evalue: f64) -> Vec<SimilarityEdge> {
    edges
        .into_iter()
        .filter(|e| e.e_value <= max_evalue)
        .collect()
}

/// Edges at or above `min_identity` percent.
///
/// Always evaluated against the full edge set; thresholds are independent,
/// never cumulative.
pub fn filter_by_identity(edges: &[SimilarityEdge], min_identity: f64) -> Vec<SimilarityEdge> {
    edges
        .iter()
        .filter(|e| e.identity >= min_identity)
        .cloned()
        .collect()
}

/// `numerator / denominator`, folded into [0, 1] by taking the reciprocal
/// of ratios above one.
pub fn folded_ratio(numerator: usize, denominator: usize) -> f64 {
    if numerator == 0 || denominator == 0 {
        return 0.0;
    }
    let ratio = numerator as f64 / denominator as f64;
    if ratio > 1.0 {
        1.0 / ratio
    } else {
        ratio
    }
}

/// Sequence lengths keyed by locus id.
pub type LengthTable<'a> = FxHashMap<&'a str, usize>;

fn query_length(edge: &SimilarityEdge, lengths: &LengthTable<'_>) -> Option<usize> {
    lengths.get(edge.query_id.as_str()).copied().or(edge.q_len)
}

/// Whether `edge` satisfies the span filter. Edges whose query length is
/// unknown are kept.
pub fn passes_span_filter(edge: &SimilarityEdge, filter: SpanFilter, lengths: &LengthTable<'_>) -> bool {
    let Some(q_len) = query_length(edge, lengths) else {
        return true;
    };
    let min = filter.min_fraction();
    let query_fraction = folded_ratio(edge.query_span(), q_len);
    match filter {
        SpanFilter::QueryCoverage(_) => query_fraction >= min,
        SpanFilter::Reciprocal(_) => {
            query_fraction >= min && folded_ratio(edge.query_span(), edge.subject_span()) >= min
        }
    }
}

/// Drop non-self edges failing the span filter. Self hits are left to the
/// self-hit repair.
pub fn filter_by_span(
    edges: Vec<SimilarityEdge>,
    filter: SpanFilter,
    lengths: &LengthTable<'_>,
) -> Vec<SimilarityEdge> {
    edges
        .into_iter()
        .filter(|e| e.is_self_hit() || passes_span_filter(e, filter, lengths))
        .collect()
}
