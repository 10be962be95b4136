//! Hierarchical cluster engine
//!
//! Divisive clustering over the ascending cluster ladder. The loosest
//! threshold is clustered once over the whole graph. Every tighter threshold
//! filters the *original* edge set again, splits it by the clusters of the
//! previous level, and clusters each parent independently on a bounded
//! worker pool. Because raising the identity cutoff only removes edges,
//! restricting a sub-problem to its parent loses nothing; the containment of
//! every child in its parent is still checked after each level.
//!
//! The result is an arena ([`PartitionTree`]) of levels, each holding its
//! clusters with explicit parent indices into the previous level.

use indicatif::{ProgressBar, ProgressStyle};
use log::{debug, info};
use rayon::prelude::*;
use rustc_hash::{FxHashMap, FxHashSet};
use std::cmp::Ordering;

use crate::artifacts::{Artifact, ArtifactStore};
use crate::common::SimilarityEdge;
use crate::config::{format_threshold, ClusterLadder, PipelineConfig};
use crate::diagnostics::PipelineDiagnostics;
use crate::error::{PipelineError, Result};
use crate::post::filter::filter_by_identity;
use crate::tools::{ClusterParams, GraphClusterTool, GraphProblem, WeightedEdge};

/// A cluster of representatives at one level of the tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClusterNode {
    /// Index of the enclosing cluster in the previous level
    pub parent: Option<usize>,
    /// Sorted representative ids
    pub members: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Level {
    pub threshold: f64,
    pub clusters: Vec<ClusterNode>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PartitionTree {
    levels: Vec<Level>,
}

impl PartitionTree {
    #[cfg(test)]
    pub(crate) fn from_levels(levels: Vec<Level>) -> Self {
        Self { levels }
    }

    pub fn levels(&self) -> &[Level] {
        &self.levels
    }

    pub fn level(&self, index: usize) -> Option<&Level> {
        self.levels.get(index)
    }

    /// Clusters of `level` whose parent is `parent`.
    pub fn children(&self, level: usize, parent: usize) -> impl Iterator<Item = (usize, &ClusterNode)> {
        self.levels
            .get(level)
            .into_iter()
            .flat_map(|l| l.clusters.iter().enumerate())
            .filter(move |(_, c)| c.parent == Some(parent))
    }

    pub fn len(&self) -> usize {
        self.levels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }

    /// Every cluster of `level` lies inside its parent, and the children of
    /// each parent cover the parent exactly.
    pub fn check_refinement(&self, level: usize) -> Result<()> {
        if level == 0 {
            return Ok(());
        }
        let (Some(coarse), Some(fine)) = (self.levels.get(level - 1), self.levels.get(level)) else {
            return Ok(());
        };
        let stage = format!(
            "refinement {}% -> {}%",
            format_threshold(coarse.threshold),
            format_threshold(fine.threshold)
        );
        let parent_of = membership_index(&coarse.clusters);
        let mut covered = vec![0usize; coarse.clusters.len()];

        for (child_id, child) in fine.clusters.iter().enumerate() {
            let parent = child.parent.ok_or_else(|| {
                PipelineError::invariant(&stage, format!("cluster {} has no parent", child_id), 1, 0)
            })?;
            if parent >= coarse.clusters.len() {
                return Err(PipelineError::invariant(
                    &stage,
                    format!("cluster {} points at missing parent {}", child_id, parent),
                    coarse.clusters.len(),
                    parent + 1,
                ));
            }
            let parent_size = coarse.clusters[parent].members.len();
            for member in &child.members {
                if parent_of.get(member.as_str()) != Some(&parent) {
                    return Err(PipelineError::invariant(
                        &stage,
                        format!(
                            "member '{}' of cluster {} lies outside parent cluster {}",
                            member, child_id, parent
                        ),
                        parent_size,
                        child.members.len(),
                    ));
                }
            }
            covered[parent] += child.members.len();
        }
        for (parent_id, parent) in coarse.clusters.iter().enumerate() {
            if covered[parent_id] != parent.members.len() {
                return Err(PipelineError::invariant(
                    &stage,
                    format!("children of cluster {} do not cover it", parent_id),
                    parent.members.len(),
                    covered[parent_id],
                ));
            }
        }
        Ok(())
    }
}

fn membership_index(clusters: &[ClusterNode]) -> FxHashMap<&str, usize> {
    clusters
        .iter()
        .enumerate()
        .flat_map(|(id, c)| c.members.iter().map(move |m| (m.as_str(), id)))
        .collect()
}

fn to_weighted(edge: &SimilarityEdge) -> WeightedEdge {
    WeightedEdge {
        a: edge.query_id.clone(),
        b: edge.subject_id.clone(),
        weight: edge.normalized_weight(),
    }
}

/// Sort members, then clusters by size descending and first member, so
/// relabeling does not depend on the tool's output order.
fn canonicalize(mut clusters: Vec<Vec<String>>) -> Vec<Vec<String>> {
    for cluster in clusters.iter_mut() {
        cluster.sort();
    }
    clusters.sort_by(|a, b| match b.len().cmp(&a.len()) {
        Ordering::Equal => a.first().cmp(&b.first()),
        ord => ord,
    });
    clusters
}

/// Run one sub-problem and check that the tool returned a partition of
/// exactly its nodes.
fn solve(
    problem: &GraphProblem,
    tool: &dyn GraphClusterTool,
    params: &ClusterParams,
    diagnostics: &PipelineDiagnostics,
) -> Result<Vec<Vec<String>>> {
    if problem.nodes.len() <= 1 {
        PipelineDiagnostics::add(&diagnostics.subproblems_singleton, 1);
        return Ok(if problem.nodes.is_empty() {
            Vec::new()
        } else {
            vec![problem.nodes.clone()]
        });
    }
    PipelineDiagnostics::add(&diagnostics.subproblems_run, 1);
    let clusters = tool.cluster(problem, params)?;

    let stage = format!("graph clustering {}", problem.label);
    let expected: FxHashSet<&str> = problem.nodes.iter().map(String::as_str).collect();
    let mut seen: FxHashSet<&str> = FxHashSet::default();
    for member in clusters.iter().flatten() {
        if !expected.contains(member.as_str()) {
            return Err(PipelineError::invariant(
                stage,
                format!("{} reported unknown node '{}'", tool.name(), member),
                expected.len(),
                seen.len(),
            ));
        }
        if !seen.insert(member.as_str()) {
            return Err(PipelineError::invariant(
                stage,
                format!("node '{}' placed in two clusters", member),
                expected.len(),
                seen.len(),
            ));
        }
    }
    if seen.len() != expected.len() {
        return Err(PipelineError::invariant(
            stage,
            "clusters do not cover every node",
            expected.len(),
            seen.len(),
        ));
    }
    Ok(canonicalize(clusters))
}

fn progress_bar(len: usize, visible: bool, threshold: f64) -> ProgressBar {
    if !visible {
        return ProgressBar::hidden();
    }
    let bar = ProgressBar::new(len as u64);
    bar.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar()),
    );
    bar.set_message(format!("{}%", format_threshold(threshold)));
    bar
}

/// Build the partition tree over `representatives` for every ladder
/// threshold, persisting each level's filtered edges and clusters.
pub fn cluster_hierarchy(
    representatives: &[String],
    edges: &[SimilarityEdge],
    ladder: &ClusterLadder,
    config: &PipelineConfig,
    tool: &dyn GraphClusterTool,
    store: &dyn ArtifactStore,
    diagnostics: &PipelineDiagnostics,
) -> Result<PartitionTree> {
    let concurrency = config.cluster.concurrency.max(1);
    let pool = rayon::ThreadPoolBuilder::new().num_threads(concurrency).build()?;
    let params = ClusterParams {
        inflation: config.cluster.inflation,
        threads: config.threads_per_worker(concurrency),
    };

    let mut nodes: Vec<String> = representatives.to_vec();
    nodes.sort();
    let mut tree = PartitionTree::default();

    for (k, &threshold) in ladder.thresholds().iter().enumerate() {
        let filtered = filter_by_identity(edges, threshold);
        store.put(&Artifact::FilteredEdges {
            threshold,
            edges: &filtered,
        })?;

        let problems: Vec<(Option<usize>, GraphProblem)> = match tree.levels.last() {
            None => vec![(
                None,
                GraphProblem {
                    label: format!("cluster_{}_all", format_threshold(threshold)),
                    nodes: nodes.clone(),
                    edges: filtered.iter().map(to_weighted).collect(),
                },
            )],
            Some(previous) => {
                let parent_of = membership_index(&previous.clusters);
                let mut buckets: Vec<Vec<WeightedEdge>> = vec![Vec::new(); previous.clusters.len()];
                for edge in &filtered {
                    let (Some(&pq), Some(&ps)) = (
                        parent_of.get(edge.query_id.as_str()),
                        parent_of.get(edge.subject_id.as_str()),
                    ) else {
                        continue;
                    };
                    if pq == ps {
                        buckets[pq].push(to_weighted(edge));
                    }
                }
                previous
                    .clusters
                    .iter()
                    .zip(buckets)
                    .enumerate()
                    .map(|(parent, (cluster, edges))| {
                        (
                            Some(parent),
                            GraphProblem {
                                label: format!("cluster_{}_p{:06}", format_threshold(threshold), parent),
                                nodes: cluster.members.clone(),
                                edges,
                            },
                        )
                    })
                    .collect()
            }
        };

        let bar = progress_bar(problems.len(), config.show_progress, threshold);
        let solved: Vec<Vec<Vec<String>>> = pool.install(|| {
            problems
                .par_iter()
                .map(|(_, problem)| {
                    let clusters = solve(problem, tool, &params, diagnostics);
                    bar.inc(1);
                    clusters
                })
                .collect::<Result<Vec<_>>>()
        })?;
        bar.finish_and_clear();

        let clusters: Vec<ClusterNode> = problems
            .iter()
            .zip(solved)
            .flat_map(|((parent, _), children)| {
                children.into_iter().map(move |members| ClusterNode {
                    parent: *parent,
                    members,
                })
            })
            .collect();

        let covered: usize = clusters.iter().map(|c| c.members.len()).sum();
        if covered != nodes.len() {
            return Err(PipelineError::invariant(
                format!("clustering at {}%", format_threshold(threshold)),
                "representatives assigned to clusters",
                nodes.len(),
                covered,
            ));
        }

        info!(
            "  {}%: {} edges, {} sub-problem(s) -> {} clusters",
            format_threshold(threshold),
            filtered.len(),
            problems.len(),
            clusters.len()
        );
        tree.levels.push(Level { threshold, clusters });
        tree.check_refinement(k)?;
        if let Some(level) = tree.levels.last() {
            store.put(&Artifact::RepresentativeClusters {
                threshold,
                clusters: &level.clusters,
            })?;
        }
        debug!("level {} refinement verified", k);
    }
    Ok(tree)
}
