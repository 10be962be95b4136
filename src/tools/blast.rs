//! BLAST and DIAMOND search adapters
//!
//! Both build a database from the representative set once and then search
//! query chunks against it. Each chunk writes to its own labelled files so
//! chunks can run concurrently.

use std::ffi::OsString;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use super::process::run_logged;
use super::{labelled_path, SearchIndex, SearchParams, SearchRequest, SearchTool};
use crate::common::{read_edges, SimilarityEdge};
use crate::config::SequenceType;
use crate::error::{PipelineError, Result};
use crate::sequence::{write_fasta, Locus};
use crate::tool_args;

pub const MAKEBLASTDB: &str = "makeblastdb";
pub const DIAMOND: &str = "diamond";

/// Columns requested from the search tool, in output order.
pub const OUTPUT_COLUMNS: &[&str] = &[
    "qseqid", "sseqid", "pident", "length", "mismatch", "gapopen", "qstart", "qend", "sstart",
    "send", "evalue", "bitscore", "qlen", "slen",
];

const DATABASE_LABEL: &str = "search_db";

pub fn search_program(sequence_type: SequenceType) -> &'static str {
    match sequence_type {
        SequenceType::Protein => "blastp",
        SequenceType::Nucleotide => "blastn",
    }
}

fn read_tabular(path: &Path) -> Result<Vec<SimilarityEdge>> {
    read_edges(BufReader::new(File::open(path)?))
}

fn database_prefix(index: &SearchIndex) -> Result<&Path> {
    index.location.as_deref().ok_or_else(|| {
        PipelineError::Configuration("search index has no database location".to_string())
    })
}

pub struct BlastSearch {
    work_dir: PathBuf,
}

impl BlastSearch {
    pub fn new(work_dir: &Path) -> Self {
        Self {
            work_dir: work_dir.to_path_buf(),
        }
    }
}

impl SearchTool for BlastSearch {
    fn name(&self) -> &str {
        "blast"
    }

    fn build_index(&self, database: &[&Locus], params: &SearchParams) -> Result<SearchIndex> {
        let fasta = labelled_path(&self.work_dir, DATABASE_LABEL, "fasta");
        let prefix = self.work_dir.join(DATABASE_LABEL);
        write_fasta(&fasta, database.iter().copied())?;
        let dbtype = match params.sequence_type {
            SequenceType::Protein => "prot",
            SequenceType::Nucleotide => "nucl",
        };
        let args = tool_args!["-in", &fasta, "-dbtype", dbtype, "-out", &prefix];
        run_logged(MAKEBLASTDB, &args, &labelled_path(&self.work_dir, DATABASE_LABEL, "log"))?;
        Ok(SearchIndex {
            location: Some(prefix),
            num_sequences: database.len(),
            resident: Vec::new(),
        })
    }

    fn search(&self, index: &SearchIndex, request: &SearchRequest<'_>) -> Result<Vec<SimilarityEdge>> {
        let query = labelled_path(&self.work_dir, &request.label, "fasta");
        let output = labelled_path(&self.work_dir, &request.label, "tsv");
        write_fasta(&query, request.queries.iter().copied())?;

        let args = tool_args![
            "-query",
            &query,
            "-db",
            database_prefix(index)?,
            "-evalue",
            request.params.evalue.to_string(),
            "-outfmt",
            format!("6 {}", OUTPUT_COLUMNS.join(" ")),
            "-max_target_seqs",
            index.num_sequences.max(1).to_string(),
            "-num_threads",
            request.params.threads.to_string(),
            "-out",
            &output,
        ];
        run_logged(
            search_program(request.params.sequence_type),
            &args,
            &labelled_path(&self.work_dir, &request.label, "log"),
        )?;
        read_tabular(&output)
    }
}

/// DIAMOND blastp; protein input only (enforced by config validation).
pub struct DiamondSearch {
    work_dir: PathBuf,
}

impl DiamondSearch {
    pub fn new(work_dir: &Path) -> Self {
        Self {
            work_dir: work_dir.to_path_buf(),
        }
    }
}

impl SearchTool for DiamondSearch {
    fn name(&self) -> &str {
        "diamond"
    }

    fn build_index(&self, database: &[&Locus], params: &SearchParams) -> Result<SearchIndex> {
        if params.sequence_type != SequenceType::Protein {
            return Err(PipelineError::Configuration(
                "diamond requires protein sequences".to_string(),
            ));
        }
        let fasta = labelled_path(&self.work_dir, DATABASE_LABEL, "fasta");
        let prefix = self.work_dir.join(DATABASE_LABEL);
        write_fasta(&fasta, database.iter().copied())?;
        let args = tool_args!["makedb", "--in", &fasta, "-d", &prefix];
        run_logged(DIAMOND, &args, &labelled_path(&self.work_dir, DATABASE_LABEL, "log"))?;
        Ok(SearchIndex {
            location: Some(prefix),
            num_sequences: database.len(),
            resident: Vec::new(),
        })
    }

    fn search(&self, index: &SearchIndex, request: &SearchRequest<'_>) -> Result<Vec<SimilarityEdge>> {
        let query = labelled_path(&self.work_dir, &request.label, "fasta");
        let output = labelled_path(&self.work_dir, &request.label, "tsv");
        write_fasta(&query, request.queries.iter().copied())?;

        let mut args = tool_args![
            "blastp",
            "-q",
            &query,
            "-d",
            database_prefix(index)?,
            "-e",
            request.params.evalue.to_string(),
            "-p",
            request.params.threads.to_string(),
            "--max-target-seqs",
            "0",
            "-o",
            &output,
            "--outfmt",
            "6",
        ];
        args.extend(OUTPUT_COLUMNS.iter().map(OsString::from));
        run_logged(DIAMOND, &args, &labelled_path(&self.work_dir, &request.label, "log"))?;
        read_tabular(&output)
    }
}
