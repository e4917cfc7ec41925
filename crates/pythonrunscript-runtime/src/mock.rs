use crate::plan::Step;
use crate::process::command_line;
use crate::runner::{RunOutcome, StepContext, StepRunner};
use crate::RuntimeError;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// A recorded `launch` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Launch {
    pub interpreter: PathBuf,
    pub script: PathBuf,
    pub args: Vec<String>,
}

/// Records steps instead of running installers.
///
/// Commands that name an environment prefix (`-m venv <dir>` or
/// `--prefix <dir>`) create that directory so callers see the same layout a
/// real install would leave behind. Artifacts are written for real.
pub struct MockRunner {
    recorded: Mutex<Vec<Step>>,
    launches: Mutex<Vec<Launch>>,
    fail_phases: Vec<String>,
    exit_code: i32,
}

impl Default for MockRunner {
    fn default() -> Self {
        Self {
            recorded: Mutex::new(Vec::new()),
            launches: Mutex::new(Vec::new()),
            fail_phases: Vec::new(),
            exit_code: 0,
        }
    }
}

fn poisoned(e: impl std::fmt::Display) -> RuntimeError {
    RuntimeError::State(format!("mutex poisoned: {e}"))
}

fn created_prefix(args: &[String]) -> Option<&str> {
    if let Some(pos) = args.iter().position(|a| a == "--prefix") {
        return args.get(pos + 1).map(String::as_str);
    }
    match args {
        [m, venv, dir, ..] if m == "-m" && venv == "venv" => Some(dir.as_str()),
        _ => None,
    }
}

impl MockRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the command with this phase, or every capture for `"capture"`.
    #[must_use]
    pub fn failing_at(mut self, phase: &str) -> Self {
        self.fail_phases.push(phase.to_owned());
        self
    }

    #[must_use]
    pub fn with_exit_code(mut self, code: i32) -> Self {
        self.exit_code = code;
        self
    }

    pub fn recorded(&self) -> Result<Vec<Step>, RuntimeError> {
        Ok(self.recorded.lock().map_err(poisoned)?.clone())
    }

    pub fn command_phases(&self) -> Result<Vec<String>, RuntimeError> {
        Ok(self
            .recorded()?
            .iter()
            .filter_map(Step::phase)
            .map(str::to_owned)
            .collect())
    }

    pub fn launches(&self) -> Result<Vec<Launch>, RuntimeError> {
        Ok(self.launches.lock().map_err(poisoned)?.clone())
    }

    fn fails(&self, phase: &str) -> bool {
        self.fail_phases.iter().any(|p| p == phase)
    }

    fn simulated_failure(phase: &str, command: String, logs_dir: &Path) -> RuntimeError {
        RuntimeError::CommandFailed {
            phase: phase.to_owned(),
            command,
            code: 1,
            stderr: format!("mock failure in {phase}\n"),
            logs_dir: logs_dir.to_path_buf(),
        }
    }
}

impl StepRunner for MockRunner {
    fn name(&self) -> &'static str {
        "mock"
    }

    fn run_step(&self, step: &Step, ctx: &StepContext<'_>) -> Result<(), RuntimeError> {
        self.recorded.lock().map_err(poisoned)?.push(step.clone());

        match step {
            Step::WriteArtifact { path, contents } => {
                if let Some(parent) = path.parent() {
                    fs::create_dir_all(parent)?;
                }
                fs::write(path, contents)?;
            }
            Step::Command {
                phase,
                program,
                args,
            } => {
                let command = command_line(program, args);
                fs::create_dir_all(ctx.logs_dir)?;
                let mut log = OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(ctx.logs_dir.join(format!("{phase}.out")))?;
                writeln!(log, "mock: {command}")?;
                if self.fails(phase) {
                    return Err(Self::simulated_failure(phase, command, ctx.logs_dir));
                }
                if let Some(prefix) = created_prefix(args) {
                    fs::create_dir_all(Path::new(prefix).join("bin"))?;
                }
            }
            Step::Capture {
                program,
                args,
                output,
            } => {
                let command = command_line(program, args);
                if self.fails("capture") {
                    return Err(Self::simulated_failure("capture", command, ctx.logs_dir));
                }
                fs::write(output, format!("mock capture of {command}\n"))?;
            }
        }
        Ok(())
    }

    fn launch(
        &self,
        interpreter: &Path,
        script: &Path,
        args: &[String],
    ) -> Result<RunOutcome, RuntimeError> {
        self.launches.lock().map_err(poisoned)?.push(Launch {
            interpreter: interpreter.to_path_buf(),
            script: script.to_path_buf(),
            args: args.to_vec(),
        });
        Ok(RunOutcome {
            exit_code: self.exit_code,
        })
    }
}
