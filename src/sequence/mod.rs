//! Locus input and genome assignment
//!
//! Loci are read once from FASTA and never mutated afterwards, apart from
//! the one-off genome assignment performed before deflation.

use bio::io::fasta;
use rustc_hash::{FxHashMap, FxHashSet};
use std::collections::BTreeSet;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use crate::error::{PipelineError, Result};

/// A gene or protein sequence belonging to one genome.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Locus {
    pub id: String,
    pub genome: Option<String>,
    pub sequence: Vec<u8>,
}

impl Locus {
    pub fn new(id: impl Into<String>, sequence: impl Into<Vec<u8>>) -> Self {
        Self {
            id: id.into(),
            genome: None,
            sequence: sequence.into(),
        }
    }

    pub fn with_genome(mut self, genome: impl Into<String>) -> Self {
        self.genome = Some(genome.into());
        self
    }

    pub fn len(&self) -> usize {
        self.sequence.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sequence.is_empty()
    }
}

/// Read loci from a FASTA file. Identifiers must be unique.
pub fn read_loci(path: &Path) -> Result<Vec<Locus>> {
    let reader = fasta::Reader::new(File::open(path)?);
    let mut seen: FxHashSet<String> = FxHashSet::default();
    let mut loci = Vec::new();
    for record in reader.records() {
        let record = record?;
        let id = record.id().to_string();
        if !seen.insert(id.clone()) {
            return Err(PipelineError::parse(
                path.display().to_string(),
                format!("duplicate locus id '{}'", id),
            ));
        }
        loci.push(Locus::new(id, record.seq().to_vec()));
    }
    Ok(loci)
}

/// Write loci as FASTA, the input format of every external tool.
pub fn write_fasta<'a, I>(path: &Path, loci: I) -> Result<()>
where
    I: IntoIterator<Item = &'a Locus>,
{
    let mut writer = fasta::Writer::new(File::create(path)?);
    for locus in loci {
        writer.write(&locus.id, None, &locus.sequence)?;
    }
    writer.flush()?;
    Ok(())
}

/// How genome membership is determined
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GenomeSource {
    /// Two-column TSV: locus id, genome id
    Mapping(PathBuf),
    /// Genome is the locus id up to the first occurrence of the delimiter
    IdDelimiter(char),
}

/// Locus id to genome id lookup.
#[derive(Debug, Clone, Default)]
pub struct GenomeIndex {
    by_locus: FxHashMap<String, String>,
}

impl GenomeIndex {
    pub fn from_pairs<I, L, G>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (L, G)>,
        L: Into<String>,
        G: Into<String>,
    {
        Self {
            by_locus: pairs
                .into_iter()
                .map(|(l, g)| (l.into(), g.into()))
                .collect(),
        }
    }

    /// Load a tab-separated `locus<TAB>genome` file. Blank lines and lines
    /// starting with `#` are skipped.
    pub fn from_tsv(path: &Path) -> Result<Self> {
        let reader = BufReader::new(File::open(path)?);
        let mut by_locus = FxHashMap::default();
        for (line_no, line) in reader.lines().enumerate() {
            let line = line?;
            let line = line.trim_end();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let mut fields = line.split('\t');
            match (fields.next(), fields.next()) {
                (Some(locus), Some(genome)) if !locus.is_empty() && !genome.is_empty() => {
                    by_locus.insert(locus.to_string(), genome.to_string());
                }
                _ => {
                    return Err(PipelineError::parse(
                        path.display().to_string(),
                        format!("line {}: expected 'locus<TAB>genome'", line_no + 1),
                    ))
                }
            }
        }
        Ok(Self { by_locus })
    }

    /// Derive genomes from locus id prefixes, e.g. `GCF_001_00012` with `_`
    /// gives `GCF`.
    pub fn from_id_prefix(loci: &[Locus], delimiter: char) -> Result<Self> {
        let mut by_locus = FxHashMap::default();
        for locus in loci {
            match locus.id.split_once(delimiter) {
                Some((genome, _)) if !genome.is_empty() => {
                    by_locus.insert(locus.id.clone(), genome.to_string());
                }
                _ => {
                    return Err(PipelineError::Configuration(format!(
                        "locus id '{}' has no genome prefix before '{}'",
                        locus.id, delimiter
                    )))
                }
            }
        }
        Ok(Self { by_locus })
    }

    pub fn load(source: &GenomeSource, loci: &[Locus]) -> Result<Self> {
        match source {
            GenomeSource::Mapping(path) => Self::from_tsv(path),
            GenomeSource::IdDelimiter(delimiter) => Self::from_id_prefix(loci, *delimiter),
        }
    }

    pub fn genome_of(&self, locus_id: &str) -> Option<&str> {
        self.by_locus.get(locus_id).map(String::as_str)
    }

    /// Stamp every locus with its genome. A locus missing from the index is
    /// a configuration error: core detection would be meaningless.
    pub fn assign(&self, loci: &mut [Locus]) -> Result<()> {
        for locus in loci.iter_mut() {
            match self.genome_of(&locus.id) {
                Some(genome) => locus.genome = Some(genome.to_string()),
                None => {
                    return Err(PipelineError::Configuration(format!(
                        "locus '{}' has no genome assignment",
                        locus.id
                    )))
                }
            }
        }
        Ok(())
    }
}

/// Distinct genome identifiers carried by `loci`.
pub fn distinct_genomes(loci: &[Locus]) -> BTreeSet<&str> {
    loci.iter().filter_map(|l| l.genome.as_deref()).collect()
}
