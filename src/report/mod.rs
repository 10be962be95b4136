//! Tabular writers for every persisted table.
//!
//! Cluster tables hold one cluster per line with tab-separated locus ids.
//! With [`TableStyle::with_comments`] each table is preceded by `#` comment
//! lines naming the table and its row count, in the manner of BLAST outfmt 7.

use std::io::{self, Write};

use crate::algorithm::deflate::{CoreSet, DeflationStep};
use crate::algorithm::hierarchy::ClusterNode;
use crate::algorithm::reinflate::ThresholdClusters;
use crate::config::format_threshold;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TableStyle {
    /// Emit `#` comment lines before the rows
    pub comments: bool,
}

impl TableStyle {
    pub fn plain() -> Self {
        Self { comments: false }
    }

    pub fn with_comments() -> Self {
        Self { comments: true }
    }
}

fn write_header<W: Write + ?Sized>(writer: &mut W, style: TableStyle, title: &str, fields: &str, rows: usize) -> io::Result<()> {
    if style.comments {
        writeln!(writer, "# {}", title)?;
        writeln!(writer, "# Fields: {}", fields)?;
        writeln!(writer, "# {} rows", rows)?;
    }
    Ok(())
}

fn write_row<W: Write + ?Sized, S: AsRef<str>>(writer: &mut W, fields: &[S]) -> io::Result<()> {
    for (i, field) in fields.iter().enumerate() {
        if i > 0 {
            writer.write_all(b"\t")?;
        }
        writer.write_all(field.as_ref().as_bytes())?;
    }
    writeln!(writer)
}

/// Final membership table for one threshold.
pub fn write_cluster_table<W: Write + ?Sized>(writer: &mut W, table: &ThresholdClusters, style: TableStyle) -> io::Result<()> {
    write_header(
        writer,
        style,
        &format!("clusters at {}% identity", format_threshold(table.threshold)),
        "locus ids",
        table.clusters.len(),
    )?;
    for cluster in &table.clusters {
        write_row(writer, &cluster.members)?;
    }
    Ok(())
}

/// Representative clusters of one tree level, prefixed by the parent index
/// in the previous level (`-` at the root level).
pub fn write_representative_clusters<W: Write + ?Sized>(
    writer: &mut W,
    threshold: f64,
    clusters: &[ClusterNode],
    style: TableStyle,
) -> io::Result<()> {
    write_header(
        writer,
        style,
        &format!("representative clusters at {}% identity", format_threshold(threshold)),
        "parent, representative ids",
        clusters.len(),
    )?;
    for cluster in clusters {
        match cluster.parent {
            Some(parent) => write!(writer, "{}", parent)?,
            None => write!(writer, "-")?,
        }
        for member in &cluster.members {
            write!(writer, "\t{}", member)?;
        }
        writeln!(writer)?;
    }
    Ok(())
}

/// Core families: representative first, then every member.
pub fn write_core_table<W: Write + ?Sized>(writer: &mut W, core: &CoreSet, style: TableStyle) -> io::Result<()> {
    write_header(writer, style, "core families", "representative, locus ids", core.len())?;
    for family in core.clusters() {
        write!(writer, "{}", family.representative)?;
        for member in &family.members {
            write!(writer, "\t{}", member)?;
        }
        writeln!(writer)?;
    }
    Ok(())
}

pub fn write_deflation_log<W: Write + ?Sized>(writer: &mut W, steps: &[DeflationStep], style: TableStyle) -> io::Result<()> {
    write_header(
        writer,
        style,
        "deflation rounds",
        "cutoff, word_size, clamped, input_loci, clusters, core_frozen",
        steps.len(),
    )?;
    for step in steps {
        writeln!(
            writer,
            "{}\t{}\t{}\t{}\t{}\t{}",
            format_threshold(step.cutoff),
            step.word_size,
            if step.clamped { "yes" } else { "no" },
            step.input_loci,
            step.clusters,
            step.core_frozen
        )?;
    }
    Ok(())
}

/// One line per threshold: cluster count, core clusters, largest cluster.
pub fn generate_summary(tables: &[ThresholdClusters]) -> String {
    let mut summary = String::from("# threshold\tclusters\tcore\tlargest\tsingletons\n");
    for table in tables {
        let largest = table.clusters.iter().map(|c| c.members.len()).max().unwrap_or(0);
        let singletons = table.clusters.iter().filter(|c| c.members.len() == 1).count();
        summary.push_str(&format!(
            "{}\t{}\t{}\t{}\t{}\n",
            format_threshold(table.threshold),
            table.clusters.len(),
            table.core_clusters().count(),
            largest,
            singletons
        ));
    }
    summary
}
