//! Execution layer for pythonrunscript.
//!
//! Environment creation is described as an `InstallPlan` of pure `Step`s and
//! carried out by a pluggable `StepRunner`: `SystemRunner` spawns real
//! processes with their output logged per phase, `MockRunner` only records
//! what it was asked to do. The runner also owns the final interpreter
//! launch. Prerequisite checks for `python3` and `conda` live here too.

pub mod mock;
pub mod plan;
pub mod prereq;
pub mod process;
pub mod runner;
pub mod system;

pub use mock::{Launch, MockRunner};
pub use plan::{InstallPlan, Step};
pub use prereq::{check_conda_prereqs, check_python_prereqs, format_missing, MissingPrereq};
pub use process::{capture_output, run_logged, Verbosity};
pub use runner::{select_runner, RunOutcome, StepContext, StepRunner};
pub use system::SystemRunner;

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("runtime I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("runner '{0}' is not available")]
    RunnerUnavailable(String),
    #[error("failed to start {program}: {source}")]
    Spawn {
        program: String,
        source: std::io::Error,
    },
    /// `code` is -1 when the process was killed by a signal.
    #[error("{phase} failed (exit code {code}): {command}")]
    CommandFailed {
        phase: String,
        command: String,
        code: i32,
        stderr: String,
        logs_dir: PathBuf,
    },
    #[error("failed to launch {} with {}: {source}", .script.display(), .interpreter.display())]
    LaunchFailed {
        interpreter: PathBuf,
        script: PathBuf,
        source: std::io::Error,
    },
    #[error("runner state error: {0}")]
    State(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_failed_display() {
        let e = RuntimeError::CommandFailed {
            phase: "pip_install".to_owned(),
            command: "python3 -m pip install -r requirements.txt".to_owned(),
            code: 1,
            stderr: String::new(),
            logs_dir: PathBuf::from("/c/abc/logs"),
        };
        let msg = e.to_string();
        assert!(msg.starts_with("pip_install failed (exit code 1)"));
        assert!(msg.contains("-r requirements.txt"));
    }
}
