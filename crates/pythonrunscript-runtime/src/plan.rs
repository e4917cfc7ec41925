use crate::process::command_line;
use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};

/// One unit of environment creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "step", rename_all = "kebab-case")]
pub enum Step {
    /// Write dependency text into the entry.
    WriteArtifact { path: PathBuf, contents: String },
    /// A logged install command. Failure aborts the plan.
    Command {
        phase: String,
        program: String,
        args: Vec<String>,
    },
    /// Record a command's stdout into a file. Failure is only warned about.
    Capture {
        program: String,
        args: Vec<String>,
        output: PathBuf,
    },
}

impl Step {
    pub fn is_best_effort(&self) -> bool {
        matches!(self, Step::Capture { .. })
    }

    pub fn phase(&self) -> Option<&str> {
        match self {
            Step::Command { phase, .. } => Some(phase.as_str()),
            _ => None,
        }
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Step::WriteArtifact { path, .. } => write!(f, "write {}", path.display()),
            Step::Command {
                phase,
                program,
                args,
            } => write!(f, "[{phase}] {}", command_line(program, args)),
            Step::Capture {
                program,
                args,
                output,
            } => write!(
                f,
                "[capture] {} > {}",
                command_line(program, args),
                output.display()
            ),
        }
    }
}

/// Ordered steps that build one cache entry. Computing a plan has no side
/// effects; see `StepRunner::execute`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct InstallPlan {
    steps: Vec<Step>,
}

impl InstallPlan {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn write_artifact(&mut self, path: PathBuf, contents: impl Into<String>) -> &mut Self {
        self.steps.push(Step::WriteArtifact {
            path,
            contents: contents.into(),
        });
        self
    }

    /// Append a logged command. Path arguments go through `arg_path`.
    pub fn command(&mut self, phase: &str, program: &str, args: Vec<String>) -> &mut Self {
        self.steps.push(Step::Command {
            phase: phase.to_owned(),
            program: program.to_owned(),
            args,
        });
        self
    }

    pub fn capture(&mut self, program: &str, args: Vec<String>, output: PathBuf) -> &mut Self {
        self.steps.push(Step::Capture {
            program: program.to_owned(),
            args,
            output,
        });
        self
    }

    /// Render a path as a command argument.
    pub fn arg_path(path: &Path) -> String {
        path.to_string_lossy().into_owned()
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn phases(&self) -> Vec<&str> {
        self.steps.iter().filter_map(Step::phase).collect()
    }
}
