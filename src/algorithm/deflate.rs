//! Deflator: iterative near-duplicate collapsing with core shortcutting
//!
//! The dedup tool is run once per cutoff of the dedup ladder, each time over
//! the representatives that survived the previous cutoff. Cluster
//! memberships are composed across rounds, so a representative's absorbed
//! set always lists original loci. Families with exactly one copy in every
//! genome are frozen into the [`CoreSet`] as soon as they appear and take no
//! further part in the pipeline.

use log::{debug, info, warn};
use rustc_hash::{FxHashMap, FxHashSet};
use std::collections::{BTreeMap, BTreeSet};

use crate::config::{format_threshold, PipelineConfig, SequenceType};
use crate::diagnostics::PipelineDiagnostics;
use crate::error::{PipelineError, Result};
use crate::sequence::{distinct_genomes, Locus};
use crate::tools::{DedupCluster, DedupRequest, DedupTool};

/// (lowest cutoff of the range, word size), highest range first.
/// Values follow the CD-HIT user guide recommendations.
const PROTEIN_WORD_SIZES: &[(f64, usize)] = &[(70.0, 5), (60.0, 4), (50.0, 3), (40.0, 2)];
const NUCLEOTIDE_WORD_SIZES: &[(f64, usize)] = &[
    (95.0, 10),
    (90.0, 8),
    (88.0, 7),
    (85.0, 6),
    (80.0, 5),
    (75.0, 4),
];

/// Cutoff and word size actually handed to the dedup tool.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SeedChoice {
    pub cutoff: f64,
    pub word_size: usize,
    /// The requested cutoff was below the table and has been raised
    pub clamped: bool,
}

pub fn choose_word_size(sequence_type: SequenceType, cutoff: f64) -> SeedChoice {
    let table = match sequence_type {
        SequenceType::Protein => PROTEIN_WORD_SIZES,
        SequenceType::Nucleotide => NUCLEOTIDE_WORD_SIZES,
    };
    for &(lower, word_size) in table {
        if cutoff >= lower {
            return SeedChoice {
                cutoff,
                word_size,
                clamped: false,
            };
        }
    }
    let (floor, word_size) = table[table.len() - 1];
    SeedChoice {
        cutoff: floor,
        word_size,
        clamped: true,
    }
}

/// Representative id -> absorbed locus ids (representative included).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeflationMap {
    groups: BTreeMap<String, BTreeSet<String>>,
}

impl DeflationMap {
    pub fn from_groups(groups: BTreeMap<String, BTreeSet<String>>) -> Self {
        Self { groups }
    }

    pub fn members(&self, representative: &str) -> Option<&BTreeSet<String>> {
        self.groups.get(representative)
    }

    pub fn representatives(&self) -> impl Iterator<Item = &str> {
        self.groups.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &BTreeSet<String>)> {
        self.groups.iter()
    }

    /// Number of representatives
    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Number of absorbed loci across all representatives
    pub fn total_loci(&self) -> usize {
        self.groups.values().map(BTreeSet::len).sum()
    }
}

/// A single-copy family present in every genome.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoreCluster {
    pub representative: String,
    /// Sorted locus ids, one per genome
    pub members: Vec<String>,
}

/// Frozen core families. Identical at every threshold.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CoreSet {
    clusters: Vec<CoreCluster>,
    loci: FxHashSet<String>,
}

impl CoreSet {
    fn freeze(&mut self, representative: String, members: BTreeSet<String>) {
        self.loci.extend(members.iter().cloned());
        self.clusters.push(CoreCluster {
            representative,
            members: members.into_iter().collect(),
        });
    }

    pub fn contains(&self, locus_id: &str) -> bool {
        self.loci.contains(locus_id)
    }

    pub fn clusters(&self) -> &[CoreCluster] {
        &self.clusters
    }

    pub fn len(&self) -> usize {
        self.clusters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clusters.is_empty()
    }

    pub fn total_loci(&self) -> usize {
        self.loci.len()
    }
}

/// One row of the deflation log.
#[derive(Debug, Clone, PartialEq)]
pub struct DeflationStep {
    pub cutoff: f64,
    pub word_size: usize,
    pub clamped: bool,
    pub input_loci: usize,
    pub clusters: usize,
    pub core_frozen: usize,
}

#[derive(Debug, Clone, Default)]
pub struct Deflation {
    pub map: DeflationMap,
    pub core: CoreSet,
    pub log: Vec<DeflationStep>,
}

/// The tool's clusters must partition exactly the loci it was given, and
/// each representative must be one of its own members.
fn check_dedup_partition(
    cutoff: f64,
    working: &[&Locus],
    clusters: &[DedupCluster],
) -> Result<()> {
    let stage = format!("deflation at {}%", format_threshold(cutoff));
    let expected: FxHashSet<&str> = working.iter().map(|l| l.id.as_str()).collect();
    let mut seen: FxHashSet<&str> = FxHashSet::default();
    let mut found = 0usize;
    for cluster in clusters {
        if !cluster.members.contains(&cluster.representative) {
            return Err(PipelineError::invariant(
                stage,
                format!("representative '{}' missing from its own cluster", cluster.representative),
                1,
                0,
            ));
        }
        for member in &cluster.members {
            found += 1;
            if !expected.contains(member.as_str()) {
                return Err(PipelineError::invariant(
                    stage,
                    format!("dedup tool reported unknown locus '{}'", member),
                    expected.len(),
                    found,
                ));
            }
            if !seen.insert(member.as_str()) {
                return Err(PipelineError::invariant(
                    stage,
                    format!("locus '{}' assigned to more than one cluster", member),
                    expected.len(),
                    found,
                ));
            }
        }
    }
    if seen.len() != expected.len() {
        return Err(PipelineError::invariant(
            stage,
            "dedup clusters do not cover every input locus",
            expected.len(),
            seen.len(),
        ));
    }
    Ok(())
}

fn is_core(absorbed: &BTreeSet<String>, by_id: &FxHashMap<&str, &Locus>, genome_total: usize) -> bool {
    if absorbed.len() != genome_total {
        return false;
    }
    let genomes: FxHashSet<&str> = absorbed
        .iter()
        .filter_map(|id| by_id.get(id.as_str()).and_then(|l| l.genome.as_deref()))
        .collect();
    genomes.len() == genome_total
}

/// Invariant 1: every locus is in exactly one absorbed set or in the core.
fn check_deflation(loci: &[Locus], deflation: &Deflation) -> Result<()> {
    let mut seen: FxHashSet<&str> = FxHashSet::default();
    let mut total = 0usize;
    let grouped = deflation.map.iter().flat_map(|(_, members)| members.iter());
    let core = deflation.core.clusters().iter().flat_map(|c| c.members.iter());
    for id in grouped.chain(core) {
        total += 1;
        seen.insert(id.as_str());
    }
    if total != loci.len() || seen.len() != loci.len() {
        return Err(PipelineError::invariant(
            "deflation",
            format!(
                "{} absorbed + {} core loci, {} distinct",
                deflation.map.total_loci(),
                deflation.core.total_loci(),
                seen.len()
            ),
            loci.len(),
            total,
        ));
    }
    if let Some(missing) = loci.iter().find(|l| !seen.contains(l.id.as_str())) {
        return Err(PipelineError::invariant(
            "deflation",
            format!("locus '{}' lost during deflation", missing.id),
            loci.len(),
            seen.len(),
        ));
    }
    Ok(())
}

/// Run the dedup ladder over `loci`.
///
/// Core extraction needs every locus to carry a genome, at least two
/// genomes, and `config.dedup.extract_core`.
pub fn deflate(
    loci: &[Locus],
    config: &PipelineConfig,
    tool: &dyn DedupTool,
    diagnostics: &PipelineDiagnostics,
) -> Result<Deflation> {
    let ladder = config.dedup_ladder()?;
    let by_id: FxHashMap<&str, &Locus> = loci.iter().map(|l| (l.id.as_str(), l)).collect();
    let genome_total = if config.dedup.extract_core && loci.iter().all(|l| l.genome.is_some()) {
        distinct_genomes(loci).len()
    } else {
        0
    };
    // With a single genome every singleton dedup cluster meets the core
    // definition, so the whole dataset would bypass search and clustering.
    let extract_core = genome_total >= 2;
    PipelineDiagnostics::add(&diagnostics.loci_in, loci.len());
    info!(
        "Deflating {} loci over {} cutoffs ({}% to {}%), core extraction {}",
        loci.len(),
        ladder.len(),
        format_threshold(ladder.steps()[0]),
        format_threshold(ladder.floor()),
        if extract_core { "on" } else { "off" }
    );

    let mut groups: BTreeMap<String, BTreeSet<String>> = loci
        .iter()
        .map(|l| (l.id.clone(), BTreeSet::from([l.id.clone()])))
        .collect();
    let mut core = CoreSet::default();
    let mut log = Vec::with_capacity(ladder.len());
    let mut working: Vec<&Locus> = loci.iter().collect();

    for &cutoff in ladder.steps() {
        if working.is_empty() {
            break;
        }
        let choice = choose_word_size(config.sequence_type, cutoff);
        if choice.clamped {
            warn!(
                "cutoff {}% is below the {} word-size table; using {}% with word size {}",
                format_threshold(cutoff),
                config.sequence_type,
                format_threshold(choice.cutoff),
                choice.word_size
            );
        }
        let request = DedupRequest {
            label: format!("dedup_{}", format_threshold(cutoff)),
            loci: &working,
            identity: choice.cutoff,
            word_size: choice.word_size,
            threads: config.threads,
            memory_mb: config.dedup.memory_mb,
            sequence_type: config.sequence_type,
        };
        let clusters = tool.deduplicate(&request)?;
        check_dedup_partition(cutoff, &working, &clusters)?;
        PipelineDiagnostics::add(&diagnostics.dedup_rounds, 1);

        let input_loci = working.len();
        let cluster_count = clusters.len();
        let mut next: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
        for cluster in clusters {
            let mut absorbed = BTreeSet::new();
            for member in &cluster.members {
                if let Some(previous) = groups.remove(member) {
                    absorbed.extend(previous);
                }
            }
            next.insert(cluster.representative, absorbed);
        }
        groups = next;

        let mut core_frozen = 0;
        if extract_core {
            let core_reps: Vec<String> = groups
                .iter()
                .filter(|(_, absorbed)| is_core(absorbed, &by_id, genome_total))
                .map(|(rep, _)| rep.clone())
                .collect();
            for rep in core_reps {
                if let Some(members) = groups.remove(&rep) {
                    debug!("core family {} ({} loci)", rep, members.len());
                    core.freeze(rep, members);
                    core_frozen += 1;
                }
            }
        }

        working = groups
            .keys()
            .filter_map(|id| by_id.get(id.as_str()).copied())
            .collect();
        info!(
            "  {}% (word size {}): {} loci -> {} clusters, {} core frozen, {} remaining",
            format_threshold(choice.cutoff),
            choice.word_size,
            input_loci,
            cluster_count,
            core_frozen,
            working.len()
        );
        log.push(DeflationStep {
            cutoff: choice.cutoff,
            word_size: choice.word_size,
            clamped: choice.clamped,
            input_loci,
            clusters: cluster_count,
            core_frozen,
        });
    }

    let deflation = Deflation {
        map: DeflationMap::from_groups(groups),
        core,
        log,
    };
    check_deflation(loci, &deflation)?;
    PipelineDiagnostics::add(&diagnostics.core_clusters, deflation.core.len());
    PipelineDiagnostics::add(&diagnostics.core_loci, deflation.core.total_loci());
    PipelineDiagnostics::add(&diagnostics.representatives, deflation.map.len());
    Ok(deflation)
}
