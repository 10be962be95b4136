//! Blocking invocation of external binaries
//!
//! Every invocation writes its command line, stdout and stderr to a log file
//! that is kept after the run, successful or not.

use log::debug;
use std::env;
use std::ffi::OsString;
use std::fs::File;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::Command;

use crate::error::{PipelineError, Result};

/// Search PATH for an executable named `program`.
pub fn find_executable(program: &str) -> Option<PathBuf> {
    let candidate = Path::new(program);
    if candidate.components().count() > 1 {
        return candidate.is_file().then(|| candidate.to_path_buf());
    }
    let paths = env::var_os("PATH")?;
    env::split_paths(&paths)
        .map(|dir| dir.join(program))
        .find(|path| path.is_file())
}

pub fn require(program: &str, needed_for: &str) -> Result<PathBuf> {
    find_executable(program).ok_or_else(|| PipelineError::Dependency {
        tool: program.to_string(),
        needed_for: needed_for.to_string(),
    })
}

/// Run `program` to completion, logging to `log_path`. A nonzero exit is an
/// `ExternalTool` error pointing at the log.
pub fn run_logged(program: &str, args: &[OsString], log_path: &Path) -> Result<()> {
    let command_line = std::iter::once(program.to_string())
        .chain(args.iter().map(|a| a.to_string_lossy().into_owned()))
        .collect::<Vec<_>>()
        .join(" ");
    debug!("running: {}", command_line);

    let output = Command::new(program).args(args).output().map_err(|e| {
        if e.kind() == io::ErrorKind::NotFound {
            PipelineError::Dependency {
                tool: program.to_string(),
                needed_for: "external invocation".to_string(),
            }
        } else {
            PipelineError::Io(e)
        }
    })?;

    let mut log = File::create(log_path)?;
    writeln!(log, "$ {}", command_line)?;
    writeln!(log, "--- stdout ---")?;
    log.write_all(&output.stdout)?;
    writeln!(log, "--- stderr ---")?;
    log.write_all(&output.stderr)?;
    writeln!(log, "--- status: {} ---", output.status)?;

    if !output.status.success() {
        return Err(PipelineError::tool_failed(program, output.status, log_path.to_path_buf()));
    }
    Ok(())
}

/// Shorthand for building argument vectors from mixed strings and paths.
#[macro_export]
macro_rules! tool_args {
    ($($arg:expr),* $(,)?) => {
        vec![$(::std::ffi::OsString::from($arg)),*]
    };
}
