//! In-process backends for small datasets
//!
//! `GreedyDedup` follows the CD-HIT greedy scheme: loci are visited longest
//! first, each unassigned locus seeds a cluster and absorbs every later
//! unassigned locus whose identity to the seed reaches the cutoff. Identity
//! is ungapped, anchored at the first residue, and measured over the shorter
//! sequence.
//!
//! `NativeSearch` compares every query with every database locus using the
//! same anchored ungapped comparison, scored with a match/mismatch scheme
//! and Karlin-Altschul statistics over the whole database as search space.
//!
//! `ConnectedComponents` is single-linkage graph clustering: every connected
//! component of the edge list is one cluster.

use rustc_hash::FxHashMap;

use super::{
    ClusterParams, DedupCluster, DedupRequest, DedupTool, GraphClusterTool, GraphProblem, SearchIndex,
    SearchParams, SearchRequest, SearchTool,
};
use crate::common::SimilarityEdge;
use crate::config::SequenceType;
use crate::error::Result;
use crate::sequence::Locus;

/// Percent identity of the shorter sequence against the longer one.
pub fn anchored_identity(a: &[u8], b: &[u8]) -> f64 {
    let shorter = a.len().min(b.len());
    if shorter == 0 {
        return if a.len() == b.len() { 100.0 } else { 0.0 };
    }
    let matches = a
        .iter()
        .zip(b.iter())
        .filter(|(x, y)| x.eq_ignore_ascii_case(y))
        .count();
    100.0 * matches as f64 / shorter as f64
}

#[derive(Debug, Default, Clone, Copy)]
pub struct GreedyDedup;

impl DedupTool for GreedyDedup {
    fn name(&self) -> &str {
        "greedy"
    }

    fn deduplicate(&self, request: &DedupRequest<'_>) -> Result<Vec<DedupCluster>> {
        let loci = request.loci;
        let mut order: Vec<usize> = (0..loci.len()).collect();
        order.sort_by(|&i, &j| {
            loci[j]
                .len()
                .cmp(&loci[i].len())
                .then_with(|| loci[i].id.cmp(&loci[j].id))
        });

        let mut assigned = vec![false; loci.len()];
        let mut clusters = Vec::new();
        for (pos, &i) in order.iter().enumerate() {
            if assigned[i] {
                continue;
            }
            assigned[i] = true;
            let seed = loci[i];
            let mut members = vec![seed.id.clone()];
            for &j in &order[pos + 1..] {
                if assigned[j] {
                    continue;
                }
                if anchored_identity(&seed.sequence, &loci[j].sequence) >= request.identity {
                    assigned[j] = true;
                    members.push(loci[j].id.clone());
                }
            }
            clusters.push(DedupCluster {
                representative: seed.id.clone(),
                members,
            });
        }
        Ok(clusters)
    }
}

/// Match/mismatch scores and ungapped Karlin-Altschul parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
struct UngappedScoring {
    reward: i32,
    penalty: i32,
    lambda: f64,
    k: f64,
}

fn scoring_for(sequence_type: SequenceType) -> UngappedScoring {
    match sequence_type {
        // blastn +1/-2
        SequenceType::Nucleotide => UngappedScoring {
            reward: 1,
            penalty: -2,
            lambda: 1.28,
            k: 0.46,
        },
        // average BLOSUM62 diagonal vs off-diagonal
        SequenceType::Protein => UngappedScoring {
            reward: 5,
            penalty: -1,
            lambda: 0.3176,
            k: 0.134,
        },
    }
}

/// Score one anchored ungapped comparison. Returns `None` when the raw
/// score is not positive.
fn compare(query: &Locus, subject: &Locus, scoring: UngappedScoring, db_residues: usize) -> Option<SimilarityEdge> {
    let length = query.len().min(subject.len());
    if length == 0 {
        return None;
    }
    let matches = query
        .sequence
        .iter()
        .zip(subject.sequence.iter())
        .filter(|(x, y)| x.eq_ignore_ascii_case(y))
        .count();
    let mismatch = length - matches;
    let raw = matches as i32 * scoring.reward + mismatch as i32 * scoring.penalty;
    if raw <= 0 {
        return None;
    }
    let bit_score = (scoring.lambda * raw as f64 - scoring.k.ln()) / std::f64::consts::LN_2;
    let search_space = (query.len() * db_residues.max(1)) as f64;
    Some(SimilarityEdge {
        query_id: query.id.clone(),
        subject_id: subject.id.clone(),
        identity: 100.0 * matches as f64 / length as f64,
        length,
        mismatch,
        gapopen: 0,
        q_start: 1,
        q_end: length,
        s_start: 1,
        s_end: length,
        e_value: search_space * 2.0_f64.powf(-bit_score),
        bit_score,
        q_len: Some(query.len()),
        s_len: Some(subject.len()),
    })
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NativeSearch;

impl SearchTool for NativeSearch {
    fn name(&self) -> &str {
        "native"
    }

    fn build_index(&self, database: &[&Locus], _params: &SearchParams) -> Result<SearchIndex> {
        Ok(SearchIndex {
            location: None,
            num_sequences: database.len(),
            resident: database.iter().map(|l| (*l).clone()).collect(),
        })
    }

    fn search(&self, index: &SearchIndex, request: &SearchRequest<'_>) -> Result<Vec<SimilarityEdge>> {
        let scoring = scoring_for(request.params.sequence_type);
        let db_residues: usize = index.resident.iter().map(Locus::len).sum();
        let mut hits = Vec::new();
        for query in request.queries {
            for subject in &index.resident {
                if let Some(edge) = compare(query, subject, scoring, db_residues) {
                    if edge.e_value <= request.params.evalue || edge.is_self_hit() {
                        hits.push(edge);
                    }
                }
            }
        }
        Ok(hits)
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct ConnectedComponents;

fn find(parent: &mut [usize], mut x: usize) -> usize {
    while parent[x] != x {
        parent[x] = parent[parent[x]];
        x = parent[x];
    }
    x
}

impl GraphClusterTool for ConnectedComponents {
    fn name(&self) -> &str {
        "components"
    }

    fn cluster(&self, problem: &GraphProblem, _params: &ClusterParams) -> Result<Vec<Vec<String>>> {
        let index: FxHashMap<&str, usize> = problem
            .nodes
            .iter()
            .enumerate()
            .map(|(i, n)| (n.as_str(), i))
            .collect();
        let mut parent: Vec<usize> = (0..problem.nodes.len()).collect();

        for edge in &problem.edges {
            if let (Some(&a), Some(&b)) = (index.get(edge.a.as_str()), index.get(edge.b.as_str())) {
                let (ra, rb) = (find(&mut parent, a), find(&mut parent, b));
                if ra != rb {
                    parent[ra.max(rb)] = ra.min(rb);
                }
            }
        }

        let mut by_root: FxHashMap<usize, usize> = FxHashMap::default();
        let mut clusters: Vec<Vec<String>> = Vec::new();
        for (i, node) in problem.nodes.iter().enumerate() {
            let root = find(&mut parent, i);
            let slot = *by_root.entry(root).or_insert_with(|| {
                clusters.push(Vec::new());
                clusters.len() - 1
            });
            clusters[slot].push(node.clone());
        }
        Ok(clusters)
    }
}
