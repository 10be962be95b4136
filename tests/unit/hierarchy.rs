//! Unit tests for algorithm/hierarchy.rs

use panladder::algorithm::hierarchy::cluster_hierarchy;
use panladder::artifacts::MemoryStore;
use panladder::common::SimilarityEdge;
use panladder::config::ClusterLadder;
use panladder::diagnostics::PipelineDiagnostics;

use super::helpers::{make_edge, test_config, RecordingCluster};

fn ids(names: &[&str]) -> Vec<String> {
    names.iter().map(|s| s.to_string()).collect()
}

fn five_node_graph() -> (Vec<String>, Vec<SimilarityEdge>) {
    let reps = ids(&["a", "b", "c", "d", "e"]);
    let mut edges: Vec<SimilarityEdge> = reps.iter().map(|r| SimilarityEdge::synthetic_self_hit(r)).collect();
    edges.push(make_edge("a", "b", 95.0, (1, 50), (1, 50)));
    edges.push(make_edge("b", "c", 75.0, (1, 50), (1, 50)));
    edges.push(make_edge("d", "e", 60.0, (1, 50), (1, 50)));
    (reps, edges)
}

#[test]
fn test_levels_refine_and_singletons_skip_the_tool() {
    let (reps, edges) = five_node_graph();
    let ladder = ClusterLadder::new(&[90.0, 50.0, 70.0]).unwrap();
    let config = test_config(ladder.thresholds());
    let tool = RecordingCluster::default();
    let store = MemoryStore::new();
    let diag = PipelineDiagnostics::default();

    let tree = cluster_hierarchy(&reps, &edges, &ladder, &config, &tool, &store, &diag).unwrap();

    assert_eq!(tree.len(), 3);
    let members = |level: usize| -> Vec<Vec<String>> {
        tree.level(level).unwrap().clusters.iter().map(|c| c.members.clone()).collect()
    };
    assert_eq!(members(0), vec![ids(&["a", "b", "c"]), ids(&["d", "e"])]);
    assert_eq!(members(1), vec![ids(&["a", "b", "c"]), ids(&["d"]), ids(&["e"])]);
    assert_eq!(members(2), vec![ids(&["a", "b"]), ids(&["c"]), ids(&["d"]), ids(&["e"])]);

    let level1 = tree.level(1).unwrap();
    assert_eq!(level1.clusters[1].parent, Some(1));
    assert_eq!(tree.children(2, 0).count(), 2);

    let mut labels = tool.labels.lock().unwrap().clone();
    labels.sort();
    assert_eq!(
        labels,
        vec!["cluster_50_all", "cluster_70_p000000", "cluster_70_p000001", "cluster_90_p000000"]
    );
    assert_eq!(PipelineDiagnostics::get(&diag.subproblems_singleton), 2);
    assert_eq!(PipelineDiagnostics::get(&diag.subproblems_run), 4);
}

#[test]
fn test_each_level_filters_the_original_edges() {
    let (reps, edges) = five_node_graph();
    let ladder = ClusterLadder::new(&[50.0, 90.0]).unwrap();
    let config = test_config(ladder.thresholds());
    let tool = RecordingCluster::default();
    let store = MemoryStore::new();
    let diag = PipelineDiagnostics::default();

    cluster_hierarchy(&reps, &edges, &ladder, &config, &tool, &store, &diag).unwrap();

    // five self edges plus the three links at 50%, only a-b survives 90%
    assert_eq!(store.get("edges.50.tsv").unwrap().lines().count(), 8);
    assert_eq!(store.get("edges.90.tsv").unwrap().lines().count(), 6);
    assert_eq!(store.get("rep_clusters.50.tsv").unwrap(), "-\ta\tb\tc\n-\td\te\n");
    assert_eq!(store.get("rep_clusters.90.tsv").unwrap(), "0\ta\tb\n0\tc\n1\td\n1\te\n");
}

#[test]
fn test_parallel_subproblems_match_serial() {
    let (reps, edges) = five_node_graph();
    let ladder = ClusterLadder::new(&[50.0, 70.0, 90.0]).unwrap();
    let serial = test_config(ladder.thresholds());
    let mut parallel = serial.clone();
    parallel.cluster.concurrency = 4;
    parallel.threads = 4;

    let diag = PipelineDiagnostics::default();
    let a = cluster_hierarchy(&reps, &edges, &ladder, &serial, &RecordingCluster::default(), &MemoryStore::new(), &diag)
        .unwrap();
    let b = cluster_hierarchy(&reps, &edges, &ladder, &parallel, &RecordingCluster::default(), &MemoryStore::new(), &diag)
        .unwrap();
    assert_eq!(a, b);
}
