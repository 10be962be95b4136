//! Unit tests for algorithm/graph.rs

use panladder::algorithm::graph::build_similarity_graph;
use panladder::config::SpanFilter;
use panladder::diagnostics::PipelineDiagnostics;
use panladder::sequence::Locus;

use super::helpers::{make_edge, random_protein, test_config, ScriptedSearch};

fn reps() -> Vec<Locus> {
    vec![
        Locus::new("a", random_protein(100, 21)),
        Locus::new("b", random_protein(100, 22)),
        Locus::new("c", random_protein(30, 23)),
    ]
}

#[test]
fn test_filters_and_repairs() {
    let loci = reps();
    let refs: Vec<&Locus> = loci.iter().collect();
    let mut weak = make_edge("a", "b", 80.0, (1, 100), (1, 100));
    weak.e_value = 0.5;
    let mut imperfect_self = make_edge("a", "a", 99.0, (1, 100), (1, 100));
    imperfect_self.e_value = 1e-50;
    let search = ScriptedSearch {
        hits: vec![
            weak,
            imperfect_self,
            make_edge("b", "c", 70.0, (1, 30), (1, 30)),
            make_edge("b", "absorbed_locus", 99.0, (1, 100), (1, 100)),
        ],
    };
    let diag = PipelineDiagnostics::default();

    let edges = build_similarity_graph(&refs, &test_config(&[50.0]), &search, &diag).unwrap();

    // a-a (forced to 100), b-c, synthesized b-b and c-c
    assert_eq!(edges.len(), 4);
    assert!(edges.iter().all(|e| e.subject_id != "absorbed_locus"));
    assert!(!edges.iter().any(|e| e.query_id == "a" && e.subject_id == "b"));
    let a_self = edges.iter().find(|e| e.query_id == "a").unwrap();
    assert_eq!(a_self.identity, 100.0);
    assert_eq!(PipelineDiagnostics::get(&diag.edges_evalue_filtered), 1);
    assert_eq!(PipelineDiagnostics::get(&diag.self_hits_forced), 1);
    assert_eq!(PipelineDiagnostics::get(&diag.self_hits_synthesized), 2);
}

#[test]
fn test_reciprocal_span_uses_representative_lengths() {
    let loci = reps();
    let refs: Vec<&Locus> = loci.iter().collect();
    // covers all of c (30 aa) but only 30% of b
    let search = ScriptedSearch {
        hits: vec![
            make_edge("b", "c", 90.0, (1, 30), (1, 30)),
            make_edge("c", "b", 90.0, (1, 30), (1, 30)),
        ],
    };
    let mut config = test_config(&[50.0]);
    config.search.span_filter = Some(SpanFilter::Reciprocal(0.5));
    let diag = PipelineDiagnostics::default();

    let edges = build_similarity_graph(&refs, &config, &search, &diag).unwrap();

    let links: Vec<(&str, &str)> = edges
        .iter()
        .filter(|e| !e.is_self_hit())
        .map(|e| (e.query_id.as_str(), e.subject_id.as_str()))
        .collect();
    assert_eq!(links, vec![("c", "b")]);
    assert_eq!(PipelineDiagnostics::get(&diag.edges_span_filtered), 1);
}

#[test]
fn test_chunked_search_sees_every_query_once() {
    let loci: Vec<Locus> = (0..10)
        .map(|i| Locus::new(format!("r{}", i), random_protein(40, 50 + i)))
        .collect();
    let refs: Vec<&Locus> = loci.iter().collect();
    let search = super::helpers::RecordingSearch::default();
    let mut config = test_config(&[50.0]);
    config.search.chunks = 4;
    let diag = PipelineDiagnostics::default();

    let edges = build_similarity_graph(&refs, &config, &search, &diag).unwrap();

    let mut queried = search.queried.lock().unwrap().clone();
    queried.sort();
    let mut expected: Vec<String> = loci.iter().map(|l| l.id.clone()).collect();
    expected.sort();
    assert_eq!(queried, expected);
    assert_eq!(PipelineDiagnostics::get(&diag.search_chunks), 4);
    assert_eq!(edges.iter().filter(|e| e.is_self_hit()).count(), 10);
}

#[test]
fn test_empty_representative_set() {
    let search = ScriptedSearch { hits: Vec::new() };
    let diag = PipelineDiagnostics::default();
    let edges = build_similarity_graph(&[], &test_config(&[50.0]), &search, &diag).unwrap();
    assert!(edges.is_empty());
}
