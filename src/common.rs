use std::cmp::Ordering;
use std::io::{BufRead, Write};

use crate::error::{PipelineError, Result};

/// One row of all-vs-all search output.
///
/// Conceptually undirected, but stored in the direction the search tool
/// reported it.
#[derive(Debug, Clone, PartialEq)]
pub struct SimilarityEdge {
    pub query_id: String,
    pub subject_id: String,
    /// Percent identity, 0-100
    pub identity: f64,
    pub length: usize,
    pub mismatch: usize,
    pub gapopen: usize,
    pub q_start: usize,
    pub q_end: usize,
    pub s_start: usize,
    pub s_end: usize,
    pub e_value: f64,
    pub bit_score: f64,
    /// Query length when the tool reports it (`qlen`)
    pub q_len: Option<usize>,
    /// Subject length when the tool reports it (`slen`)
    pub s_len: Option<usize>,
}

impl SimilarityEdge {
    pub fn is_self_hit(&self) -> bool {
        self.query_id == self.subject_id
    }

    /// Query HSP span; coordinates may be reversed for minus-strand hits.
    pub fn query_span(&self) -> usize {
        self.q_start.abs_diff(self.q_end) + 1
    }

    pub fn subject_span(&self) -> usize {
        self.s_start.abs_diff(self.s_end) + 1
    }

    /// Edge weight handed to the graph-clustering tool, in (0, 1].
    pub fn normalized_weight(&self) -> f64 {
        (self.identity / 100.0).clamp(0.0, 1.0)
    }

    /// Placeholder self-hit for a representative the search tool did not
    /// report against itself.
    pub fn synthetic_self_hit(id: &str) -> Self {
        Self {
            query_id: id.to_string(),
            subject_id: id.to_string(),
            identity: 100.0,
            length: 1,
            mismatch: 0,
            gapopen: 0,
            q_start: 1,
            q_end: 1,
            s_start: 1,
            s_end: 1,
            e_value: 0.0,
            bit_score: 1.0,
            q_len: None,
            s_len: None,
        }
    }
}

/// Order edges by query, then bit score descending, then subject and
/// query coordinates, so concatenated tool output is stable.
pub fn compare_edges(a: &SimilarityEdge, b: &SimilarityEdge) -> Ordering {
    a.query_id
        .cmp(&b.query_id)
        .then_with(|| {
            b.bit_score
                .partial_cmp(&a.bit_score)
                .unwrap_or(Ordering::Equal)
        })
        .then_with(|| a.subject_id.cmp(&b.subject_id))
        .then_with(|| a.q_start.cmp(&b.q_start))
        .then_with(|| a.s_start.cmp(&b.s_start))
}

fn parse_field<T: std::str::FromStr>(fields: &[&str], idx: usize, line: &str) -> Result<T> {
    fields[idx].trim().parse::<T>().map_err(|_| {
        PipelineError::parse(
            "tabular search output",
            format!("column {} in line '{}'", idx + 1, line),
        )
    })
}

/// Parse one tab-separated row with 12 standard columns and optional
/// `qlen`/`slen` columns.
pub fn parse_tabular_line(line: &str) -> Result<SimilarityEdge> {
    let fields: Vec<&str> = line.split('\t').collect();
    if fields.len() != 12 && fields.len() != 14 {
        return Err(PipelineError::parse(
            "tabular search output",
            format!("expected 12 or 14 columns, found {} in '{}'", fields.len(), line),
        ));
    }
    let (q_len, s_len) = if fields.len() == 14 {
        (
            Some(parse_field::<usize>(&fields, 12, line)?),
            Some(parse_field::<usize>(&fields, 13, line)?),
        )
    } else {
        (None, None)
    };
    Ok(SimilarityEdge {
        query_id: fields[0].to_string(),
        subject_id: fields[1].to_string(),
        identity: parse_field(&fields, 2, line)?,
        length: parse_field(&fields, 3, line)?,
        mismatch: parse_field(&fields, 4, line)?,
        gapopen: parse_field(&fields, 5, line)?,
        q_start: parse_field(&fields, 6, line)?,
        q_end: parse_field(&fields, 7, line)?,
        s_start: parse_field(&fields, 8, line)?,
        s_end: parse_field(&fields, 9, line)?,
        e_value: parse_field(&fields, 10, line)?,
        bit_score: parse_field(&fields, 11, line)?,
        q_len,
        s_len,
    })
}

/// Read every non-empty, non-comment row.
pub fn read_edges<R: BufRead>(reader: R) -> Result<Vec<SimilarityEdge>> {
    let mut edges = Vec::new();
    for line in reader.lines() {
        let line = line?;
        let line = line.trim_end();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        edges.push(parse_tabular_line(line)?);
    }
    Ok(edges)
}

pub fn write_edges<W: Write + ?Sized>(writer: &mut W, edges: &[SimilarityEdge]) -> Result<()> {
    for edge in edges {
        write!(
            writer,
            "{}\t{}\t{:.3}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{:.1e}\t{:.1}",
            edge.query_id,
            edge.subject_id,
            edge.identity,
            edge.length,
            edge.mismatch,
            edge.gapopen,
            edge.q_start,
            edge.q_end,
            edge.s_start,
            edge.s_end,
            edge.e_value,
            edge.bit_score
        )?;
        if let (Some(q_len), Some(s_len)) = (edge.q_len, edge.s_len) {
            write!(writer, "\t{}\t{}", q_len, s_len)?;
        }
        writeln!(writer)?;
    }
    Ok(())
}
