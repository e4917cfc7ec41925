use crate::plan::{InstallPlan, Step};
use crate::process::Verbosity;
use crate::RuntimeError;
use serde::Serialize;
use std::path::Path;
use tracing::warn;

/// Exit status of a launched script, for runners that return at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RunOutcome {
    pub exit_code: i32,
}

/// Where and how loudly install commands run.
#[derive(Debug, Clone, Copy)]
pub struct StepContext<'a> {
    pub logs_dir: &'a Path,
    pub verbosity: Verbosity,
}

pub trait StepRunner: Send + Sync {
    fn name(&self) -> &str;

    fn run_step(&self, step: &Step, ctx: &StepContext<'_>) -> Result<(), RuntimeError>;

    /// Run `<interpreter> <script> <args...>`.
    ///
    /// A runner that replaces the current process image only returns on
    /// failure.
    fn launch(
        &self,
        interpreter: &Path,
        script: &Path,
        args: &[String],
    ) -> Result<RunOutcome, RuntimeError>;

    /// Run every step in order. The first failing non-capture step aborts;
    /// capture failures are logged and skipped.
    fn execute(&self, plan: &InstallPlan, ctx: &StepContext<'_>) -> Result<(), RuntimeError> {
        for step in plan.steps() {
            match self.run_step(step, ctx) {
                Ok(()) => {}
                Err(e) if step.is_best_effort() => warn!("{step}: {e}"),
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }
}

pub fn select_runner(name: &str) -> Result<Box<dyn StepRunner>, RuntimeError> {
    match name {
        "system" => Ok(Box::new(crate::system::SystemRunner::new())),
        "mock" => Ok(Box::new(crate::mock::MockRunner::new())),
        other => Err(RuntimeError::RunnerUnavailable(other.to_owned())),
    }
}
