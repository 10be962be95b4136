//! MCL adapter
//!
//! Input is label-pair-plus-weight (`--abc`); output is one cluster per line
//! with tab-separated members and no header.

use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use super::process::run_logged;
use super::{labelled_path, ClusterParams, GraphClusterTool, GraphProblem};
use crate::error::Result;
use crate::tool_args;

pub const PROGRAM: &str = "mcl";

pub struct Mcl {
    work_dir: PathBuf,
}

impl Mcl {
    pub fn new(work_dir: &Path) -> Self {
        Self {
            work_dir: work_dir.to_path_buf(),
        }
    }
}

pub fn write_abc<W: Write>(writer: &mut W, problem: &GraphProblem) -> Result<()> {
    for edge in &problem.edges {
        writeln!(writer, "{}\t{}\t{:.4}", edge.a, edge.b, edge.weight)?;
    }
    Ok(())
}

pub fn parse_clusters<R: BufRead>(reader: R) -> Result<Vec<Vec<String>>> {
    let mut clusters = Vec::new();
    for line in reader.lines() {
        let line = line?;
        let members: Vec<String> = line.split_whitespace().map(str::to_string).collect();
        if !members.is_empty() {
            clusters.push(members);
        }
    }
    Ok(clusters)
}

impl GraphClusterTool for Mcl {
    fn name(&self) -> &str {
        PROGRAM
    }

    fn cluster(&self, problem: &GraphProblem, params: &ClusterParams) -> Result<Vec<Vec<String>>> {
        let input = labelled_path(&self.work_dir, &problem.label, "abc");
        let output = labelled_path(&self.work_dir, &problem.label, "mcl");
        {
            let mut writer = BufWriter::new(File::create(&input)?);
            write_abc(&mut writer, problem)?;
            writer.flush()?;
        }

        let args = tool_args![
            &input,
            "--abc",
            "-I",
            params.inflation.to_string(),
            "-te",
            params.threads.to_string(),
            "-o",
            &output,
        ];
        run_logged(PROGRAM, &args, &labelled_path(&self.work_dir, &problem.label, "mcl.log"))?;
        parse_clusters(BufReader::new(File::open(&output)?))
    }
}
