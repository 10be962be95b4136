//! End-to-end tests for pipeline.rs with in-process and scripted backends

use std::fs;

use panladder::artifacts::{DiskStore, MemoryStore};
use panladder::config::{format_threshold, SpanFilter};
use panladder::pipeline::{run_pipeline, PipelineOutput};
use panladder::sequence::Locus;
use panladder::tools::{ConnectedComponents, GreedyDedup, NativeBackends, NativeSearch};

use super::helpers::{
    backends, locus, make_edge, random_protein, test_config, GhostCluster, RecordingCluster, RecordingDedup,
    RecordingSearch, ScriptedSearch,
};

const LADDER: &[f64] = &[50.0, 70.0, 90.0, 95.0];

/// `sequence` with every tenth residue substituted.
fn mutate_every_tenth(sequence: &[u8]) -> Vec<u8> {
    sequence
        .iter()
        .enumerate()
        .map(|(i, &aa)| {
            if i % 10 == 0 {
                if aa == b'W' { b'A' } else { b'W' }
            } else {
                aa
            }
        })
        .collect()
}

/// Three genomes with four loci each: one universal single-copy family
/// (`*_f`), one pair of 90% homologs in g1/g2, everything else unique.
fn three_genome_dataset() -> Vec<Locus> {
    let family = random_protein(80, 1);
    let homolog = random_protein(80, 2);
    let mut loci = Vec::new();
    for (g, genome) in ["g1", "g2", "g3"].iter().enumerate() {
        loci.push(locus(&format!("{}_f", genome), genome, &family));
        let second = match *genome {
            "g1" => homolog.clone(),
            "g2" => mutate_every_tenth(&homolog),
            _ => random_protein(80, 100 + g as u64),
        };
        loci.push(locus(&format!("{}_2", genome), genome, &second));
        loci.push(locus(&format!("{}_3", genome), genome, &random_protein(80, 200 + g as u64)));
        loci.push(locus(&format!("{}_4", genome), genome, &random_protein(80, 300 + g as u64)));
    }
    loci
}

fn assert_partitions(output: &PipelineOutput, loci: &[Locus]) {
    for table in &output.tables {
        let mut members: Vec<&str> = table
            .clusters
            .iter()
            .flat_map(|c| c.members.iter().map(String::as_str))
            .collect();
        assert_eq!(members.len(), loci.len(), "count law at {}", table.threshold);
        members.sort();
        members.dedup();
        assert_eq!(members.len(), loci.len(), "duplicate locus at {}", table.threshold);
        let reinflated: usize = table.clusters.iter().filter(|c| !c.core).map(|c| c.members.len()).sum();
        assert_eq!(reinflated + output.deflation.core.total_loci(), loci.len());
    }
}

fn assert_nested(output: &PipelineOutput) {
    for pair in output.tables.windows(2) {
        let (coarse, fine) = (&pair[0], &pair[1]);
        for cluster in &fine.clusters {
            let parent = coarse.cluster_of(&cluster.members[0]).unwrap();
            for member in &cluster.members {
                assert!(
                    parent.members.contains(member),
                    "{} leaves its {}% cluster at {}%",
                    member,
                    coarse.threshold,
                    fine.threshold
                );
            }
        }
    }
    for k in 0..output.tree.len() {
        output.tree.check_refinement(k).unwrap();
    }
}

#[test]
fn test_universal_single_copy_family_becomes_core() {
    let loci = three_genome_dataset();
    let config = test_config(LADDER);
    let dedup = RecordingDedup::default();
    let search = RecordingSearch::default();
    let cluster = RecordingCluster::default();
    let store = MemoryStore::new();

    let output = run_pipeline(&config, &loci, backends(&dedup, &search, &cluster), &store).unwrap();

    assert_eq!(output.deflation.core.len(), 1);
    let core = &output.deflation.core.clusters()[0];
    assert_eq!(core.members, vec!["g1_f", "g2_f", "g3_f"]);

    // core loci never reach search or clustering
    let queried = search.queried.lock().unwrap();
    let indexed = search.indexed.lock().unwrap();
    let clustered = cluster.nodes.lock().unwrap();
    for id in &core.members {
        assert!(!queried.contains(id));
        assert!(!indexed.contains(id));
        assert!(!clustered.contains(id));
    }
    // only the first dedup round saw them
    let first_round = dedup.seen.lock().unwrap().iter().filter(|id| id.ends_with("_f")).count();
    assert_eq!(first_round, 3);

    // identical core rows at every threshold
    for table in &output.tables {
        let core_rows: Vec<&Vec<String>> = table.core_clusters().map(|c| &c.members).collect();
        assert_eq!(core_rows, vec![&core.members]);
        assert!(table.clusters.last().unwrap().core);
    }
    assert_partitions(&output, &loci);
}

#[test]
fn test_homolog_pair_splits_above_its_identity() {
    let loci = three_genome_dataset();
    let config = test_config(LADDER);
    let store = MemoryStore::new();
    let native = NativeBackends::default();

    let output = run_pipeline(&config, &loci, native.as_backends(), &store).unwrap();

    for threshold in [50.0, 70.0, 90.0] {
        let table = output.table(threshold).unwrap();
        let pair = table.cluster_of("g1_2").unwrap();
        assert_eq!(pair.members, vec!["g1_2", "g2_2"], "at {}%", threshold);
    }
    let tight = output.table(95.0).unwrap();
    assert_eq!(tight.cluster_of("g1_2").unwrap().members, vec!["g1_2"]);
    assert_eq!(tight.cluster_of("g2_2").unwrap().members, vec!["g2_2"]);

    assert_nested(&output);
    assert_partitions(&output, &loci);
}

#[test]
fn test_identical_loci_without_genomes_share_a_representative() {
    let shared = random_protein(60, 7);
    let loci = vec![
        Locus::new("x1", shared.clone()),
        Locus::new("x2", shared),
        Locus::new("y", random_protein(60, 8)),
    ];
    let config = test_config(LADDER);
    let store = MemoryStore::new();
    let search = RecordingSearch::default();

    let output = run_pipeline(
        &config,
        &loci,
        backends(&GreedyDedup, &search, &ConnectedComponents),
        &store,
    )
    .unwrap();

    assert!(output.deflation.core.is_empty());
    assert_eq!(output.deflation.map.len(), 2);
    assert_eq!(search.indexed.lock().unwrap().len(), 2);
    for table in &output.tables {
        assert_eq!(table.cluster_of("x1").unwrap().members, vec!["x1", "x2"]);
        assert_eq!(table.cluster_of("y").unwrap().members, vec!["y"]);
    }
    assert_partitions(&output, &loci);
}

#[test]
fn test_short_span_edge_dropped_but_self_edge_kept() {
    let loci = vec![
        Locus::new("a", random_protein(100, 11)),
        Locus::new("b", random_protein(100, 12)),
    ];
    let search = ScriptedSearch {
        hits: vec![make_edge("a", "b", 95.0, (1, 40), (1, 40))],
    };
    let mut config = test_config(LADDER);
    config.search.span_filter = Some(SpanFilter::QueryCoverage(0.5));
    let store = MemoryStore::new();

    let output = run_pipeline(&config, &loci, backends(&GreedyDedup, &search, &ConnectedComponents), &store)
        .unwrap();

    assert!(output.edges.iter().all(|e| e.is_self_hit()));
    for id in ["a", "b"] {
        assert!(output
            .edges
            .iter()
            .any(|e| e.query_id == id && e.subject_id == id && e.identity == 100.0));
    }
    for table in &output.tables {
        assert_eq!(table.clusters.len(), 2);
        assert_eq!(table.cluster_of("a").unwrap().members, vec!["a"]);
    }

    // without the filter the same hit joins them up to 95%
    config.search.span_filter = None;
    let output = run_pipeline(&config, &loci, backends(&GreedyDedup, &search, &ConnectedComponents), &store)
        .unwrap();
    assert_eq!(output.table(95.0).unwrap().cluster_of("a").unwrap().members, vec!["a", "b"]);
}

#[test]
fn test_every_representative_has_self_edge() {
    let loci = three_genome_dataset();
    let config = test_config(LADDER);
    let store = MemoryStore::new();
    let native = NativeBackends::default();
    let output = run_pipeline(&config, &loci, native.as_backends(), &store).unwrap();

    for rep in output.deflation.map.representatives() {
        assert!(
            output
                .edges
                .iter()
                .any(|e| e.query_id == rep && e.subject_id == rep && e.identity == 100.0),
            "{} lacks a self edge",
            rep
        );
    }
}

#[test]
fn test_runs_are_deterministic_across_parallelism() {
    let loci = three_genome_dataset();
    let serial_config = test_config(LADDER);
    let mut parallel_config = test_config(LADDER);
    parallel_config.threads = 4;
    parallel_config.search.chunks = 3;
    parallel_config.cluster.concurrency = 4;

    let first = MemoryStore::new();
    let second = MemoryStore::new();
    let native = NativeBackends::default();
    let a = run_pipeline(&serial_config, &loci, native.as_backends(), &first).unwrap();
    let b = run_pipeline(&parallel_config, &loci, native.as_backends(), &second).unwrap();

    assert_eq!(a.tables, b.tables);
    assert_eq!(first.names(), second.names());
    for name in first.names() {
        assert_eq!(first.get(&name), second.get(&name), "{} differs", name);
    }
}

#[test]
fn test_disk_and_memory_staging_agree() {
    let loci = three_genome_dataset();
    let config = test_config(LADDER);
    let dir = tempfile::tempdir().unwrap();
    let disk = DiskStore::create(dir.path()).unwrap();
    let memory = MemoryStore::new();
    let native = NativeBackends::default();

    run_pipeline(&config, &loci, native.as_backends(), &disk).unwrap();
    run_pipeline(&config, &loci, native.as_backends(), &memory).unwrap();

    for threshold in LADDER {
        let name = format!("clusters.{}.tsv", format_threshold(*threshold));
        let on_disk = fs::read_to_string(dir.path().join(&name)).unwrap();
        assert_eq!(Some(on_disk), memory.get(&name));
    }
    assert!(dir.path().join("deflation_log.tsv").exists());
    assert!(dir.path().join("core_clusters.tsv").exists());
    assert!(dir.path().join("edges.50.tsv").exists());
    assert!(dir.path().join("rep_clusters.95.tsv").exists());
}

#[test]
fn test_final_table_format() {
    let loci = three_genome_dataset();
    let config = test_config(&[50.0]);
    let store = MemoryStore::new();
    let native = NativeBackends::default();
    run_pipeline(&config, &loci, native.as_backends(), &store).unwrap();

    let text = store.get("clusters.50.tsv").unwrap();
    let rows: Vec<&str> = text.lines().collect();
    assert_eq!(rows.len(), 9);
    assert_eq!(rows[0], "g1_2\tg2_2");
    assert_eq!(*rows.last().unwrap(), "g1_f\tg2_f\tg3_f");
}

#[test]
fn test_all_core_dataset_skips_search() {
    let seq = random_protein(50, 3);
    let loci = vec![locus("g1_a", "g1", &seq), locus("g2_a", "g2", &seq)];
    let config = test_config(LADDER);
    let store = MemoryStore::new();
    let search = RecordingSearch::default();
    let output = run_pipeline(&config, &loci, backends(&GreedyDedup, &search, &ConnectedComponents), &store)
        .unwrap();

    assert!(search.queried.lock().unwrap().is_empty());
    assert!(output.edges.is_empty());
    for table in &output.tables {
        assert_eq!(table.clusters.len(), 1);
        assert!(table.clusters[0].core);
    }
}

#[test]
fn test_cluster_tool_inventing_nodes_is_rejected() {
    let loci = three_genome_dataset();
    let config = test_config(LADDER);
    let store = MemoryStore::new();
    let err = run_pipeline(&config, &loci, backends(&GreedyDedup, &NativeSearch, &GhostCluster), &store)
        .unwrap_err();
    assert!(err.is_invariant_violation());
}

#[test]
fn test_invalid_config_fails_before_any_tool_runs() {
    let loci = three_genome_dataset();
    let mut config = test_config(LADDER);
    config.cluster.inflation = 0.5;
    let dedup = RecordingDedup::default();
    let store = MemoryStore::new();
    let err = run_pipeline(&config, &loci, backends(&dedup, &NativeSearch, &ConnectedComponents), &store)
        .unwrap_err();
    assert!(matches!(err, panladder::PipelineError::Configuration(_)));
    assert!(dedup.seen.lock().unwrap().is_empty());
}

#[test]
fn test_duplicate_locus_ids_rejected() {
    let loci = vec![Locus::new("a", "MKV"), Locus::new("a", "WWW")];
    let store = MemoryStore::new();
    let native = NativeBackends::default();
    let err = run_pipeline(&test_config(LADDER), &loci, native.as_backends(), &store).unwrap_err();
    assert!(matches!(err, panladder::PipelineError::Configuration(_)));
}
