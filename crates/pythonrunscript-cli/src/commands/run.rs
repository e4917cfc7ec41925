use super::{spin_fail, spin_ok, spinner, EXIT_FAILURE};
use pythonrunscript_core::{CoreError, Engine, EnvironmentDescriptor};
use pythonrunscript_runtime::{
    check_conda_prereqs, check_python_prereqs, format_missing, RuntimeError, Verbosity,
};
use std::fmt::Write as _;
use std::path::Path;

pub fn run(engine: &Engine, script: &Path, args: &[String], verbosity: Verbosity) -> Result<u8, String> {
    let prepared = engine
        .prepare(script, verbosity)
        .map_err(|e| e.to_string())?;
    let descriptor = &prepared.descriptor;
    check_prereqs(engine, descriptor)?;

    let data = descriptor.data();
    let pb = (shows_spinner(verbosity) && !engine.is_reusable(descriptor)).then(|| {
        spinner(&format!(
            "creating {} environment {}...",
            descriptor.backend_name(),
            data.identity.short_id
        ))
    });

    let resolved = match engine.resolve(descriptor) {
        Ok(resolved) => {
            if let Some(ref pb) = pb {
                spin_ok(pb, &format!("environment {} ready", data.identity.short_id));
            }
            resolved
        }
        Err(e) => {
            if let Some(ref pb) = pb {
                spin_fail(pb, "environment creation failed");
            }
            return Err(describe_failure(&e, verbosity));
        }
    };
    if verbosity == Verbosity::Verbose {
        match &resolved.entry {
            Some(entry) if !resolved.created => {
                eprintln!("reusing environment {}", entry.display());
            }
            Some(entry) => eprintln!("created environment {}", entry.display()),
            None => eprintln!("no dependencies declared; running with {}", resolved.interpreter.display()),
        }
    }

    let outcome = engine
        .run(descriptor, &resolved, args)
        .map_err(|e| e.to_string())?;
    Ok(u8::try_from(outcome.exit_code).unwrap_or(EXIT_FAILURE))
}

/// Streamed installer stderr would tear the spinner line.
fn shows_spinner(verbosity: Verbosity) -> bool {
    !verbosity.streams_stderr()
}

fn check_prereqs(engine: &Engine, descriptor: &EnvironmentDescriptor) -> Result<(), String> {
    if std::env::var("PYTHONRUNSCRIPT_SKIP_PREREQS").as_deref() == Ok("1") {
        return Ok(());
    }
    // A cached entry brings its own interpreter.
    if descriptor.entry_kind().is_some() && engine.is_reusable(descriptor) {
        return Ok(());
    }
    let settings = engine.settings();
    let missing = match descriptor {
        EnvironmentDescriptor::NoDeps(_) | EnvironmentDescriptor::Pip(_) => {
            check_python_prereqs(&settings.python)
        }
        EnvironmentDescriptor::Conda(_) => check_conda_prereqs(&settings.conda),
    };
    if missing.is_empty() {
        Ok(())
    } else {
        Err(format_missing(&missing))
    }
}

/// Error text for a failed resolve. Installer stderr is repeated only at the
/// default verbosity.
fn describe_failure(err: &CoreError, verbosity: Verbosity) -> String {
    let CoreError::CreationFailed { source, trashed } = err else {
        return err.to_string();
    };
    let mut msg = String::from("creating the script environment failed");
    match source {
        RuntimeError::CommandFailed {
            phase,
            command,
            code,
            stderr,
            logs_dir,
        } => {
            let _ = write!(msg, "\n  step:      {phase} (exit code {code})");
            let _ = write!(msg, "\n  command:   {command}");
            let _ = write!(msg, "\n  logs:      {}", logs_dir.display());
            let _ = write!(msg, "\n  moved to:  {}", trashed.display());
            match verbosity {
                Verbosity::Verbose => msg.push_str("\nstandard error was printed above"),
                Verbosity::Errors if !stderr.trim().is_empty() => {
                    let _ = write!(msg, "\nstandard error:\n{}", stderr.trim_end());
                }
                _ => {}
            }
        }
        other => {
            let _ = write!(msg, ": {other}");
            let _ = write!(msg, "\n  moved to:  {}", trashed.display());
        }
    }
    msg
}
