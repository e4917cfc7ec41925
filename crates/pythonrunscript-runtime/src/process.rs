//! Subprocesses whose output is logged per phase and optionally streamed.

use crate::RuntimeError;
use serde::Serialize;
use std::borrow::Cow;
use std::fmt;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Write};
use std::path::Path;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread;
use tracing::{debug, info};

/// Upper bound on stderr kept in memory for error reports. The log file
/// always receives everything.
const MAX_CAPTURED_STDERR: usize = 256 * 1024;

/// How much install output reaches the terminal.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Verbosity {
    /// Log files only.
    Silent,
    /// Stream stderr, log both.
    #[default]
    Errors,
    /// Stream and log both.
    Verbose,
}

impl Verbosity {
    fn streams_stdout(self) -> bool {
        self == Verbosity::Verbose
    }

    pub fn streams_stderr(self) -> bool {
        self != Verbosity::Silent
    }
}

impl fmt::Display for Verbosity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Verbosity::Silent => write!(f, "silent"),
            Verbosity::Errors => write!(f, "errors"),
            Verbosity::Verbose => write!(f, "verbose"),
        }
    }
}

fn quote_arg(arg: &str) -> Cow<'_, str> {
    let plain = !arg.is_empty()
        && arg
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "-_./=:,+@%".contains(c));
    if plain {
        Cow::Borrowed(arg)
    } else {
        Cow::Owned(format!("'{}'", arg.replace('\'', r"'\''")))
    }
}

/// Shell-quoted rendering of a command, for logs and reports.
pub fn command_line(program: &str, args: &[String]) -> String {
    std::iter::once(program)
        .chain(args.iter().map(String::as_str))
        .map(quote_arg)
        .collect::<Vec<_>>()
        .join(" ")
}

fn open_append(path: &Path) -> io::Result<File> {
    OpenOptions::new().create(true).append(true).open(path)
}

/// Copy `src` into `log`, echoing to `echo` when given. Returns up to
/// `limit` leading bytes of what was read.
fn tee<R: Read, W: Write>(
    mut src: R,
    mut log: File,
    mut echo: Option<W>,
    limit: usize,
) -> io::Result<Vec<u8>> {
    let mut captured = Vec::new();
    let mut buf = [0u8; 8192];
    loop {
        let n = match src.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        };
        let chunk = &buf[..n];
        log.write_all(chunk)?;
        if let Some(out) = echo.as_mut() {
            out.write_all(chunk)?;
            out.flush()?;
        }
        let room = limit.saturating_sub(captured.len());
        captured.extend_from_slice(&chunk[..n.min(room)]);
    }
    log.flush()?;
    Ok(captured)
}

fn join_tee(
    joined: thread::Result<io::Result<Vec<u8>>>,
    stream: &str,
) -> Result<Vec<u8>, RuntimeError> {
    joined
        .map_err(|_| RuntimeError::State(format!("{stream} reader panicked")))?
        .map_err(RuntimeError::from)
}

/// Wait for `child`, killing it first when its output can no longer be drained.
fn reap(child: &mut Child, kill: bool) -> io::Result<ExitStatus> {
    if kill {
        let _ = child.kill();
    }
    child.wait()
}

/// Run `program` to completion, appending its stdout and stderr to
/// `<logs_dir>/<phase>.out` and `<logs_dir>/<phase>.err`.
///
/// Both pipes are drained concurrently so neither can fill up and stall the
/// child, and the child is reaped even when logging fails. A non-zero exit
/// becomes `RuntimeError::CommandFailed` carrying the captured stderr.
pub fn run_logged(
    program: &str,
    args: &[String],
    logs_dir: &Path,
    phase: &str,
    verbosity: Verbosity,
) -> Result<(), RuntimeError> {
    fs::create_dir_all(logs_dir)?;
    let out_log = open_append(&logs_dir.join(format!("{phase}.out")))?;
    let err_log = open_append(&logs_dir.join(format!("{phase}.err")))?;
    let command = command_line(program, args);
    debug!("[{phase}] {command}");

    let mut child = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|source| RuntimeError::Spawn {
            program: program.to_owned(),
            source,
        })?;
    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| RuntimeError::State(format!("stdout missing for {program}")))?;
    let stderr = child
        .stderr
        .take()
        .ok_or_else(|| RuntimeError::State(format!("stderr missing for {program}")))?;

    let (out_result, err_result) = thread::scope(|scope| {
        let out = scope.spawn(move || {
            tee(stdout, out_log, verbosity.streams_stdout().then(io::stdout), 0)
        });
        let err = scope.spawn(move || {
            tee(
                stderr,
                err_log,
                verbosity.streams_stderr().then(io::stderr),
                MAX_CAPTURED_STDERR,
            )
        });
        (out.join(), err.join())
    });
    let drained = join_tee(out_result, "stdout").and_then(|_| join_tee(err_result, "stderr"));
    let status = reap(&mut child, drained.is_err());
    let captured = drained?;
    let status = status?;
    if !status.success() {
        return Err(RuntimeError::CommandFailed {
            phase: phase.to_owned(),
            command,
            code: status.code().unwrap_or(-1),
            stderr: String::from_utf8_lossy(&captured).into_owned(),
            logs_dir: logs_dir.to_path_buf(),
        });
    }
    if verbosity == Verbosity::Verbose {
        info!("completed: {command}");
    }
    Ok(())
}

/// Run `program` and store its stdout in `dest`.
pub fn capture_output(program: &str, args: &[String], dest: &Path) -> Result<(), RuntimeError> {
    let command = command_line(program, args);
    debug!("capturing {command} into {}", dest.display());
    let output = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .output()
        .map_err(|source| RuntimeError::Spawn {
            program: program.to_owned(),
            source,
        })?;
    if !output.status.success() {
        return Err(RuntimeError::CommandFailed {
            phase: "capture".to_owned(),
            command,
            code: output.status.code().unwrap_or(-1),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            logs_dir: dest.parent().unwrap_or(Path::new("")).to_path_buf(),
        });
    }
    fs::write(dest, &output.stdout)?;
    Ok(())
}
