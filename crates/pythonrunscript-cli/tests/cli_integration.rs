//! CLI subprocess integration tests.
//!
//! These run the `pythonrunscript` binary with the mock runner unless a test
//! needs a real interpreter.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};

const PIP_SCRIPT: &str = "\
#!/usr/bin/env python3
# ```requirements.txt
# requests==2.26.0
# ```
import requests
";

struct Sandbox {
    dir: tempfile::TempDir,
}

impl Sandbox {
    fn new() -> Self {
        Self {
            dir: tempfile::tempdir().unwrap(),
        }
    }

    fn cache(&self) -> PathBuf {
        self.dir.path().join("cache")
    }

    fn script(&self, name: &str, body: &str) -> PathBuf {
        let path = self.dir.path().join(name);
        fs::write(&path, body).unwrap();
        path
    }

    fn bin(&self) -> Command {
        let mut cmd = Command::new(env!("CARGO_BIN_EXE_pythonrunscript"));
        cmd.env("PYTHONRUNSCRIPT_SKIP_PREREQS", "1")
            .env("PYTHONRUNSCRIPT_RUNNER", "mock")
            .env("PYTHONRUNSCRIPT_CACHE_DIR", self.cache())
            .env_remove("PYTHONRUNSCRIPT_PYTHON")
            .env_remove("PYTHONRUNSCRIPT_LOG");
        cmd
    }

    fn run(&self, args: &[&str]) -> Output {
        self.bin().args(args).output().unwrap()
    }
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}

fn entry_dirs(cache: &Path) -> Vec<String> {
    let Ok(read) = fs::read_dir(cache) else {
        return Vec::new();
    };
    read.map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .filter(|n| !n.starts_with('.'))
        .collect()
}

#[test]
fn cli_version_exits_zero() {
    let sb = Sandbox::new();
    let output = sb.run(&["--version"]);
    assert!(output.status.success());
    assert!(stdout(&output).contains("pythonrunscript"));
}

#[test]
fn cli_help_lists_flags() {
    let sb = Sandbox::new();
    let output = sb.run(&["--help"]);
    assert!(output.status.success());
    let text = stdout(&output);
    for flag in ["--dry-run", "--show-cache", "--clean-cache", "--cache-dir", "--python"] {
        assert!(text.contains(flag), "help must mention {flag}");
    }
}

#[test]
fn no_script_is_a_usage_error() {
    let sb = Sandbox::new();
    let output = sb.run(&[]);
    assert_eq!(output.status.code(), Some(1));
    assert!(stderr(&output).contains("no script given"));
}

#[test]
fn unknown_flag_exits_one() {
    let sb = Sandbox::new();
    let output = sb.run(&["--no-such-flag"]);
    assert_eq!(output.status.code(), Some(1));
}

#[test]
fn missing_script_fails_without_side_effects() {
    let sb = Sandbox::new();
    let missing = sb.dir.path().join("absent.py");
    let output = sb.run(&[missing.to_str().unwrap()]);
    assert_eq!(output.status.code(), Some(1));
    assert!(stderr(&output).starts_with("error:"));
    assert!(!sb.cache().exists());
}

#[test]
fn dry_run_reports_plan_and_writes_nothing() {
    let sb = Sandbox::new();
    let script = sb.script("s.py", PIP_SCRIPT);
    let output = sb.run(&["--dry-run", script.to_str().unwrap()]);
    assert!(output.status.success(), "stderr: {}", stderr(&output));

    let text = stdout(&output);
    assert!(text.contains("pip"));
    assert!(text.contains("# requests==2.26.0"));
    assert!(text.contains("missing, would be created"));
    assert!(text.contains("[create_venv]"));
    assert!(text.contains("[pip_install]"));
    assert!(!sb.cache().exists());
}

#[test]
fn dry_run_json_is_structured() {
    let sb = Sandbox::new();
    let script = sb.script("s.py", PIP_SCRIPT);
    let output = sb.run(&["--dry-run", "--json", script.to_str().unwrap()]);
    assert!(output.status.success());

    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(report["backend"], "pip");
    assert_eq!(report["entry_exists"], false);
    assert_eq!(report["blocks"][0]["content"], "requests==2.26.0");
    assert_eq!(report["fingerprint"].as_str().unwrap().len(), 64);
    assert!(report["plan"].as_array().unwrap().len() >= 3);
}

#[test]
fn dry_run_of_dependency_free_script() {
    let sb = Sandbox::new();
    let script = sb.script("plain.py", "print('hello')\n");
    let output = sb.run(&["--dry-run", "--json", script.to_str().unwrap()]);
    assert!(output.status.success());
    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(report["backend"], "no-deps");
    assert!(report["fingerprint"].is_null());
    assert_eq!(report["interpreter"], "python3");
}

#[test]
fn run_creates_entry_once_and_show_cache_lists_it() {
    let sb = Sandbox::new();
    let script = sb.script("s.py", PIP_SCRIPT);

    for _ in 0..2 {
        let output = sb.run(&[script.to_str().unwrap(), "--flag", "value"]);
        assert!(output.status.success(), "stderr: {}", stderr(&output));
    }
    let entries = entry_dirs(&sb.cache());
    assert_eq!(entries.len(), 1);

    let log = fs::read_to_string(
        sb.cache()
            .join(&entries[0])
            .join("logs")
            .join("create_venv.out"),
    )
    .unwrap();
    assert_eq!(log.lines().count(), 1);

    let output = sb.run(&["--show-cache", "--json"]);
    assert!(output.status.success());
    let listing: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let listed = listing["entries"].as_array().unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0]["metadata"]["kind"], "pip");
    assert_eq!(listed[0]["name"], entries[0].as_str());
}

#[test]
fn show_cache_prints_roots() {
    let sb = Sandbox::new();
    let output = sb.run(&["--show-cache"]);
    assert!(output.status.success());
    let text = stdout(&output);
    assert!(text.contains(&sb.cache().display().to_string()));
    assert!(text.contains("no cached environments"));
}

#[test]
fn clean_cache_empties_the_cache() {
    let sb = Sandbox::new();
    let script = sb.script("s.py", PIP_SCRIPT);
    assert!(sb.run(&[script.to_str().unwrap()]).status.success());
    assert!(sb.cache().exists());

    let output = sb.run(&["--clean-cache"]);
    assert!(output.status.success());
    assert!(stdout(&output).contains("moved the cache to"));
    assert!(!sb.cache().exists());

    let output = sb.run(&["--clean-cache"]);
    assert!(output.status.success());
    assert!(stdout(&output).contains("nothing to clean"));
}

#[test]
fn unknown_runner_is_rejected() {
    let sb = Sandbox::new();
    let script = sb.script("s.py", PIP_SCRIPT);
    let output = sb
        .bin()
        .env("PYTHONRUNSCRIPT_RUNNER", "docker")
        .arg(script)
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(1));
    assert!(stderr(&output).contains("docker"));
}

#[test]
fn missing_conda_is_reported_before_side_effects() {
    let sb = Sandbox::new();
    let script = sb.script(
        "c.py",
        "# ```conda_install_specs.txt\n# ffmpeg\n# ```\n",
    );
    let output = sb
        .bin()
        .env_remove("PYTHONRUNSCRIPT_SKIP_PREREQS")
        .env("PYTHONRUNSCRIPT_CONDA", "pythonrunscript-no-such-conda")
        .arg(script)
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(1));
    let err = stderr(&output);
    assert!(err.contains("missing prerequisites"));
    assert!(err.contains("pythonrunscript-no-such-conda"));
    assert!(!sb.cache().exists());
}

#[cfg(unix)]
#[test]
fn dependency_free_script_exit_code_propagates() {
    let sb = Sandbox::new();
    let script = sb.script("exit.sh", "# no dependencies here\nexit \"$1\"\n");
    let output = sb
        .bin()
        .env("PYTHONRUNSCRIPT_RUNNER", "system")
        .args(["--python", "/bin/sh"])
        .arg(&script)
        .arg("7")
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(7), "stderr: {}", stderr(&output));
    assert!(!sb.cache().exists());
}
