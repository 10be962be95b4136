//! `panladder run`
//!
//! Each input file is an independent dataset with its own working and
//! output directory. A failing dataset is logged and skipped; the command
//! fails at the end if any dataset did.

use anyhow::{bail, Context, Result};
use log::{error, info};
use rustc_hash::FxHashMap;
use std::path::{Path, PathBuf};

use super::args::RunArgs;
use crate::artifacts::{ArtifactStore, DiskStore, MemoryStore};
use crate::config::{PipelineConfig, Staging};
use crate::pipeline::{run_pipeline, PipelineOutput};
use crate::report::generate_summary;
use crate::sequence::{read_loci, GenomeIndex};
use crate::tools::{ExternalBackends, NativeBackends};

/// Dataset name used for per-dataset directories: the input file stem.
pub fn dataset_name(input: &Path) -> String {
    input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "dataset".to_string())
}

/// Dataset names for every input; two inputs may not share a name since
/// they would share working and output directories.
pub fn dataset_names(inputs: &[PathBuf]) -> Result<Vec<String>> {
    let mut seen: FxHashMap<String, &Path> = FxHashMap::default();
    let mut names = Vec::with_capacity(inputs.len());
    for input in inputs {
        let name = dataset_name(input);
        if let Some(previous) = seen.insert(name.clone(), input.as_path()) {
            bail!(
                "{} and {} both map to dataset '{}'; rename one of them",
                previous.display(),
                input.display(),
                name
            );
        }
        names.push(name);
    }
    Ok(names)
}

/// Write whatever the memory store holds, then hand back the pipeline
/// result. Tables from a partially failed run still reach `out_dir`.
pub fn persist_memory(
    memory: &MemoryStore,
    out_dir: &Path,
    result: crate::Result<PipelineOutput>,
) -> Result<PipelineOutput> {
    if !memory.is_empty() {
        let flushed = memory
            .flush_to(out_dir)
            .with_context(|| format!("Failed to write results to {}", out_dir.display()));
        if let Err(e) = flushed {
            if result.is_err() {
                error!("{:#}", e);
            } else {
                return Err(e);
            }
        }
    }
    Ok(result?)
}

fn execute(args: &RunArgs, config: &PipelineConfig, input: &Path, out_dir: &Path) -> Result<PipelineOutput> {
    let mut loci = read_loci(input).with_context(|| format!("Failed to read loci from {}", input.display()))?;
    if let Some(source) = args.genome_source() {
        let index = GenomeIndex::load(&source, &loci).context("Failed to load genome assignments")?;
        index.assign(&mut loci)?;
    }
    info!("{}: {} loci", input.display(), loci.len());

    let style = args.table_style();
    let memory = MemoryStore::new().with_style(style);
    let disk;
    let store: &dyn ArtifactStore = match config.staging {
        Staging::Memory => &memory,
        Staging::Disk => {
            disk = DiskStore::create(out_dir)?.with_style(style);
            &disk
        }
    };

    let result = if args.native {
        run_pipeline(config, &loci, NativeBackends::default().as_backends(), store)
    } else {
        ExternalBackends::from_config(config)
            .and_then(|backends| run_pipeline(config, &loci, backends.as_backends(), store))
    };

    match config.staging {
        Staging::Memory => persist_memory(&memory, out_dir, result),
        Staging::Disk => Ok(result?),
    }
}

pub fn run(args: RunArgs) -> Result<()> {
    let threads = args.resolved_threads();
    rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .build_global()
        .context("Failed to build thread pool")?;

    let names = dataset_names(&args.inputs)?;
    let multiple = args.inputs.len() > 1;
    let mut failed = Vec::new();
    for (input, dataset) in args.inputs.iter().zip(names) {
        let out_dir = if multiple {
            args.out_dir.join(&dataset)
        } else {
            args.out_dir.clone()
        };
        let result = args
            .to_config(&dataset)
            .map_err(anyhow::Error::from)
            .and_then(|config| execute(&args, &config, input, &out_dir));
        match result {
            Ok(output) => {
                info!("{} -> {}", dataset, out_dir.display());
                eprint!("{}", generate_summary(&output.tables));
            }
            Err(e) => {
                error!("dataset {} failed: {:#}", dataset, e);
                failed.push(dataset);
            }
        }
    }

    if !failed.is_empty() {
        bail!("{} of {} dataset(s) failed: {}", failed.len(), args.inputs.len(), failed.join(", "));
    }
    Ok(())
}
