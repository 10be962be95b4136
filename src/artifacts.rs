//! Typed pipeline artifacts and the stores that keep them.
//!
//! Every intermediate table the pipeline produces is handed to an
//! [`ArtifactStore`] as an [`Artifact`]. The memory store keeps rendered
//! text for inspection; the disk store writes one file per artifact into
//! the output directory. Both render through the same writers, so a run
//! staged in memory produces byte-identical tables to one staged on disk.

use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use log::debug;

use crate::algorithm::deflate::{CoreSet, DeflationStep};
use crate::algorithm::hierarchy::ClusterNode;
use crate::algorithm::reinflate::ThresholdClusters;
use crate::common::{write_edges, SimilarityEdge};
use crate::config::format_threshold;
use crate::error::Result;
use crate::report::{
    write_cluster_table, write_core_table, write_deflation_log, write_representative_clusters, TableStyle,
};

#[derive(Debug, Clone, Copy)]
pub enum Artifact<'a> {
    DeflationLog(&'a [DeflationStep]),
    CoreTable(&'a CoreSet),
    FilteredEdges {
        threshold: f64,
        edges: &'a [SimilarityEdge],
    },
    RepresentativeClusters {
        threshold: f64,
        clusters: &'a [ClusterNode],
    },
    ReinflatedClusters(&'a ThresholdClusters),
}

impl Artifact<'_> {
    /// File name of the artifact, unique within one run.
    pub fn name(&self) -> String {
        match self {
            Artifact::DeflationLog(_) => "deflation_log.tsv".to_string(),
            Artifact::CoreTable(_) => "core_clusters.tsv".to_string(),
            Artifact::FilteredEdges { threshold, .. } => {
                format!("edges.{}.tsv", format_threshold(*threshold))
            }
            Artifact::RepresentativeClusters { threshold, .. } => {
                format!("rep_clusters.{}.tsv", format_threshold(*threshold))
            }
            Artifact::ReinflatedClusters(table) => {
                format!("clusters.{}.tsv", format_threshold(table.threshold))
            }
        }
    }

    pub fn render(&self, writer: &mut dyn Write, style: TableStyle) -> Result<()> {
        match self {
            Artifact::DeflationLog(steps) => write_deflation_log(writer, steps, style)?,
            Artifact::CoreTable(core) => write_core_table(writer, core, style)?,
            Artifact::FilteredEdges { edges, .. } => write_edges(writer, edges)?,
            Artifact::RepresentativeClusters { threshold, clusters } => {
                write_representative_clusters(writer, *threshold, clusters, style)?
            }
            Artifact::ReinflatedClusters(table) => write_cluster_table(writer, table, style)?,
        }
        Ok(())
    }
}

/// Destination for pipeline artifacts. Shared across worker threads.
pub trait ArtifactStore: Send + Sync {
    fn put(&self, artifact: &Artifact<'_>) -> Result<()>;
}

/// Keeps rendered artifacts in memory, keyed by name.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<BTreeMap<String, String>>,
    style: TableStyle,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_style(mut self, style: TableStyle) -> Self {
        self.style = style;
        self
    }

    pub fn is_empty(&self) -> bool {
        self.entries().is_empty()
    }

    fn entries(&self) -> std::sync::MutexGuard<'_, BTreeMap<String, String>> {
        self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn get(&self, name: &str) -> Option<String> {
        self.entries().get(name).cloned()
    }

    pub fn names(&self) -> Vec<String> {
        self.entries().keys().cloned().collect()
    }

    /// Write every stored artifact into `dir`.
    pub fn flush_to(&self, dir: &Path) -> Result<()> {
        fs::create_dir_all(dir)?;
        for (name, text) in self.entries().iter() {
            fs::write(dir.join(name), text)?;
        }
        Ok(())
    }
}

impl ArtifactStore for MemoryStore {
    fn put(&self, artifact: &Artifact<'_>) -> Result<()> {
        let mut buf = Vec::new();
        artifact.render(&mut buf, self.style)?;
        let text = String::from_utf8_lossy(&buf).into_owned();
        self.entries().insert(artifact.name(), text);
        Ok(())
    }
}

/// Writes each artifact to its own file under a directory.
#[derive(Debug, Clone)]
pub struct DiskStore {
    dir: PathBuf,
    style: TableStyle,
}

impl DiskStore {
    pub fn create(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self {
            dir,
            style: TableStyle::plain(),
        })
    }

    pub fn with_style(mut self, style: TableStyle) -> Self {
        self.style = style;
        self
    }

    pub fn path_of(&self, artifact: &Artifact<'_>) -> PathBuf {
        self.dir.join(artifact.name())
    }
}

impl ArtifactStore for DiskStore {
    fn put(&self, artifact: &Artifact<'_>) -> Result<()> {
        let path = self.path_of(artifact);
        let mut writer = BufWriter::new(File::create(&path)?);
        artifact.render(&mut writer, self.style)?;
        writer.flush()?;
        debug!("wrote {}", path.display());
        Ok(())
    }
}
