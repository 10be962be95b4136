//! Reinflator
//!
//! Expands representative-level clusters back to every absorbed locus and
//! appends the frozen core families, one table per threshold. Each
//! threshold is checked on its own: a table that does not partition the
//! input loci is rejected, the others are still produced.

use log::{error, info};
use rustc_hash::FxHashSet;

use super::deflate::{CoreSet, DeflationMap};
use super::hierarchy::{Level, PartitionTree};
use crate::artifacts::{Artifact, ArtifactStore};
use crate::config::format_threshold;
use crate::error::{PipelineError, Result};

/// A cluster of original loci.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocusCluster {
    pub id: usize,
    /// Sorted locus ids
    pub members: Vec<String>,
    pub core: bool,
}

/// The final membership table for one threshold.
#[derive(Debug, Clone, PartialEq)]
pub struct ThresholdClusters {
    pub threshold: f64,
    pub clusters: Vec<LocusCluster>,
}

impl ThresholdClusters {
    pub fn total_loci(&self) -> usize {
        self.clusters.iter().map(|c| c.members.len()).sum()
    }

    pub fn core_clusters(&self) -> impl Iterator<Item = &LocusCluster> {
        self.clusters.iter().filter(|c| c.core)
    }

    /// Cluster containing `locus_id`, if any.
    pub fn cluster_of(&self, locus_id: &str) -> Option<&LocusCluster> {
        self.clusters
            .iter()
            .find(|c| c.members.iter().any(|m| m == locus_id))
    }
}

/// Invariant 2: the table partitions `universe`, and reinflated plus core
/// members add up to the input locus count.
fn check_partition(table: &ThresholdClusters, universe: &FxHashSet<&str>, core: &CoreSet) -> Result<()> {
    let stage = format!("reinflation at {}%", format_threshold(table.threshold));
    let mut seen: FxHashSet<&str> = FxHashSet::default();
    for member in table.clusters.iter().flat_map(|c| c.members.iter()) {
        if !universe.contains(member.as_str()) {
            return Err(PipelineError::invariant(
                stage,
                format!("unknown locus '{}'", member),
                universe.len(),
                table.total_loci(),
            ));
        }
        if !seen.insert(member.as_str()) {
            return Err(PipelineError::invariant(
                stage,
                format!("locus '{}' appears in more than one cluster", member),
                universe.len(),
                table.total_loci(),
            ));
        }
    }
    let reinflated: usize = table
        .clusters
        .iter()
        .filter(|c| !c.core)
        .map(|c| c.members.len())
        .sum();
    if reinflated + core.total_loci() != universe.len() || seen.len() != universe.len() {
        return Err(PipelineError::invariant(
            stage,
            format!("{} reinflated + {} core loci", reinflated, core.total_loci()),
            universe.len(),
            reinflated + core.total_loci(),
        ));
    }
    Ok(())
}

/// Reinflate one level of the partition tree.
pub fn reinflate_level(
    level: &Level,
    map: &DeflationMap,
    core: &CoreSet,
    universe: &FxHashSet<&str>,
) -> Result<ThresholdClusters> {
    let mut clusters = Vec::with_capacity(level.clusters.len() + core.len());
    for node in &level.clusters {
        let mut members = Vec::new();
        for rep in &node.members {
            let absorbed = map.members(rep).ok_or_else(|| {
                PipelineError::invariant(
                    format!("reinflation at {}%", format_threshold(level.threshold)),
                    format!("representative '{}' missing from deflation map", rep),
                    1,
                    0,
                )
            })?;
            members.extend(absorbed.iter().cloned());
        }
        members.sort();
        clusters.push(LocusCluster {
            id: clusters.len(),
            members,
            core: false,
        });
    }
    for family in core.clusters() {
        clusters.push(LocusCluster {
            id: clusters.len(),
            members: family.members.clone(),
            core: true,
        });
    }

    let table = ThresholdClusters {
        threshold: level.threshold,
        clusters,
    };
    check_partition(&table, universe, core)?;
    Ok(table)
}

/// Reinflate every level, persisting each table that passes its checks.
/// Returns the first failure after all thresholds have been attempted.
pub fn reinflate_all(
    tree: &PartitionTree,
    map: &DeflationMap,
    core: &CoreSet,
    universe: &FxHashSet<&str>,
    store: &dyn ArtifactStore,
) -> Result<Vec<ThresholdClusters>> {
    let mut tables = Vec::with_capacity(tree.len());
    let mut first_error: Option<PipelineError> = None;

    for level in tree.levels() {
        let result = reinflate_level(level, map, core, universe).and_then(|table| {
            store.put(&Artifact::ReinflatedClusters(&table))?;
            Ok(table)
        });
        match result {
            Ok(table) => {
                info!(
                    "  {}%: {} clusters ({} core) over {} loci",
                    format_threshold(table.threshold),
                    table.clusters.len(),
                    core.len(),
                    table.total_loci()
                );
                tables.push(table);
            }
            Err(e) => {
                error!("threshold {}% failed: {}", format_threshold(level.threshold), e);
                first_error.get_or_insert(e);
            }
        }
    }

    match first_error {
        Some(e) => Err(e),
        None => Ok(tables),
    }
}
