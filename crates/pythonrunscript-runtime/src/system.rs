use crate::plan::Step;
use crate::process::{capture_output, run_logged};
use crate::runner::{RunOutcome, StepContext, StepRunner};
use crate::RuntimeError;
use std::fs;
use std::io::Write;
use std::path::Path;
use std::process::Command;
use tracing::debug;

/// Runs install steps as real processes.
pub struct SystemRunner {
    replace_process: bool,
}

impl Default for SystemRunner {
    fn default() -> Self {
        Self::new()
    }
}

impl SystemRunner {
    /// On Unix, `launch` replaces the current process with the interpreter.
    pub fn new() -> Self {
        Self {
            replace_process: cfg!(unix),
        }
    }

    /// `launch` spawns the interpreter, waits, and returns its exit code.
    pub fn spawning() -> Self {
        Self {
            replace_process: false,
        }
    }

    fn launch_failed(interpreter: &Path, script: &Path, source: std::io::Error) -> RuntimeError {
        RuntimeError::LaunchFailed {
            interpreter: interpreter.to_path_buf(),
            script: script.to_path_buf(),
            source,
        }
    }
}

impl StepRunner for SystemRunner {
    fn name(&self) -> &'static str {
        "system"
    }

    fn run_step(&self, step: &Step, ctx: &StepContext<'_>) -> Result<(), RuntimeError> {
        match step {
            Step::WriteArtifact { path, contents } => {
                if let Some(parent) = path.parent() {
                    fs::create_dir_all(parent)?;
                }
                fs::write(path, contents)?;
                Ok(())
            }
            Step::Command {
                phase,
                program,
                args,
            } => run_logged(program, args, ctx.logs_dir, phase, ctx.verbosity),
            Step::Capture {
                program,
                args,
                output,
            } => capture_output(program, args, output),
        }
    }

    fn launch(
        &self,
        interpreter: &Path,
        script: &Path,
        args: &[String],
    ) -> Result<RunOutcome, RuntimeError> {
        let mut cmd = Command::new(interpreter);
        cmd.arg(script).args(args);
        debug!(
            "launching {} {} with {} argument(s)",
            interpreter.display(),
            script.display(),
            args.len()
        );
        let _ = std::io::stdout().flush();
        let _ = std::io::stderr().flush();

        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;
            if self.replace_process {
                let source = cmd.exec();
                return Err(Self::launch_failed(interpreter, script, source));
            }
        }

        let status = cmd
            .status()
            .map_err(|source| Self::launch_failed(interpreter, script, source))?;
        Ok(RunOutcome {
            exit_code: status.code().unwrap_or(1),
        })
    }
}
