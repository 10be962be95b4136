//! CD-HIT / CD-HIT-EST adapter
//!
//! Runs one dedup pass per cutoff and parses the `.clstr` report:
//!
//! ```text
//! >Cluster 0
//! 0	310aa, >gA_0001... *
//! 1	309aa, >gB_0001... at 99.35%
//! ```

use log::debug;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use super::process::run_logged;
use super::{labelled_path, DedupCluster, DedupRequest, DedupTool};
use crate::config::SequenceType;
use crate::error::{PipelineError, Result};
use crate::sequence::{write_fasta, Locus};
use crate::tool_args;

/// cd-hit drops sequences at or below this length (`-l`) from its report.
pub const MIN_LENGTH: usize = 10;

pub fn program_for(sequence_type: SequenceType) -> &'static str {
    match sequence_type {
        SequenceType::Protein => "cd-hit",
        SequenceType::Nucleotide => "cd-hit-est",
    }
}

pub struct CdHit {
    work_dir: PathBuf,
}

impl CdHit {
    pub fn new(work_dir: &Path) -> Self {
        Self {
            work_dir: work_dir.to_path_buf(),
        }
    }
}

impl DedupTool for CdHit {
    fn name(&self) -> &str {
        "cd-hit"
    }

    fn deduplicate(&self, request: &DedupRequest<'_>) -> Result<Vec<DedupCluster>> {
        let (clusterable, mut short) = split_short(request.loci);
        if !short.is_empty() {
            debug!(
                "{}: {} loci of at most {} residues kept as singletons",
                request.label,
                short.len(),
                MIN_LENGTH
            );
        }
        if clusterable.is_empty() {
            return Ok(short);
        }

        let program = program_for(request.sequence_type);
        let input = labelled_path(&self.work_dir, &request.label, "fasta");
        let output = labelled_path(&self.work_dir, &request.label, "reps.fasta");
        let log = labelled_path(&self.work_dir, &request.label, "log");
        write_fasta(&input, clusterable.iter().copied())?;

        let args = tool_args![
            "-i",
            &input,
            "-o",
            &output,
            "-c",
            format!("{:.4}", request.identity / 100.0),
            "-n",
            request.word_size.to_string(),
            "-T",
            request.threads.to_string(),
            "-M",
            request.memory_mb.to_string(),
            "-l",
            MIN_LENGTH.to_string(),
            "-g",
            "1",
            "-d",
            "0",
        ];
        run_logged(program, &args, &log)?;

        let mut report = output.into_os_string();
        report.push(".clstr");
        let report = PathBuf::from(report);
        debug!("parsing {}", report.display());
        let mut clusters = parse_clstr(BufReader::new(File::open(&report)?))?;
        clusters.append(&mut short);
        Ok(clusters)
    }
}

/// Separate loci cd-hit would silently drop; each becomes its own cluster.
pub fn split_short<'a>(loci: &[&'a Locus]) -> (Vec<&'a Locus>, Vec<DedupCluster>) {
    let mut clusterable = Vec::with_capacity(loci.len());
    let mut short = Vec::new();
    for &locus in loci {
        if locus.len() <= MIN_LENGTH {
            short.push(DedupCluster {
                representative: locus.id.clone(),
                members: vec![locus.id.clone()],
            });
        } else {
            clusterable.push(locus);
        }
    }
    (clusterable, short)
}

/// Extract the locus id from a member line such as `1\t309aa, >gB_0001... at 99.35%`.
fn member_id(line: &str) -> Option<&str> {
    let start = line.find('>')? + 1;
    let rest = &line[start..];
    let end = rest.find("...")?;
    Some(&rest[..end])
}

/// Parse a CD-HIT cluster report.
pub fn parse_clstr<R: BufRead>(reader: R) -> Result<Vec<DedupCluster>> {
    let mut clusters = Vec::new();
    let mut members: Vec<String> = Vec::new();
    let mut representative: Option<String> = None;
    let mut in_cluster = false;

    let mut flush = |members: &mut Vec<String>, representative: &mut Option<String>| -> Result<()> {
        if members.is_empty() {
            return Ok(());
        }
        let rep = representative.take().ok_or_else(|| {
            PipelineError::parse("cd-hit cluster report", format!("cluster without representative: {:?}", members))
        })?;
        clusters.push(DedupCluster {
            representative: rep,
            members: std::mem::take(members),
        });
        Ok(())
    };

    for line in reader.lines() {
        let line = line?;
        let line = line.trim_end();
        if line.is_empty() {
            continue;
        }
        if line.starts_with(">Cluster") {
            flush(&mut members, &mut representative)?;
            in_cluster = true;
            continue;
        }
        if !in_cluster {
            return Err(PipelineError::parse(
                "cd-hit cluster report",
                format!("member line before first cluster header: '{}'", line),
            ));
        }
        let id = member_id(line).ok_or_else(|| {
            PipelineError::parse("cd-hit cluster report", format!("malformed member line '{}'", line))
        })?;
        if line.ends_with('*') {
            if representative.is_some() {
                return Err(PipelineError::parse(
                    "cd-hit cluster report",
                    format!("second representative '{}' in one cluster", id),
                ));
            }
            representative = Some(id.to_string());
        }
        members.push(id.to_string());
    }
    flush(&mut members, &mut representative)?;
    Ok(clusters)
}
