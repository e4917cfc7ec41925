use std::fmt;

/// A missing prerequisite with actionable install instructions.
#[derive(Debug)]
pub struct MissingPrereq {
    pub name: String,
    pub purpose: &'static str,
    pub install_hint: &'static str,
}

impl fmt::Display for MissingPrereq {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "  - {}: {} (install: {})",
            self.name, self.purpose, self.install_hint
        )
    }
}

fn command_exists(name: &str) -> bool {
    which::which(name).is_ok()
}

/// Check for the base interpreter used to create venvs and to run
/// dependency-free scripts.
pub fn check_python_prereqs(python: &str) -> Vec<MissingPrereq> {
    let mut missing = Vec::new();
    if !command_exists(python) {
        missing.push(MissingPrereq {
            name: python.to_owned(),
            purpose: "creating venvs and running scripts",
            install_hint: "apt install python3 python3-venv | dnf install python3 | brew install python, or pass --python",
        });
    }
    missing
}

/// Check for the conda executable needed by scripts with conda blocks.
pub fn check_conda_prereqs(conda: &str) -> Vec<MissingPrereq> {
    let mut missing = Vec::new();
    if !command_exists(conda) {
        missing.push(MissingPrereq {
            name: conda.to_owned(),
            purpose: "creating conda environments",
            install_hint: "install Miniforge or Miniconda, or set PYTHONRUNSCRIPT_CONDA",
        });
    }
    missing
}

/// Format a list of missing prerequisites into a user-friendly error message.
pub fn format_missing(missing: &[MissingPrereq]) -> String {
    use fmt::Write as _;
    let mut msg = String::from("missing prerequisites:\n");
    for m in missing {
        let _ = writeln!(msg, "{m}");
    }
    msg.push_str("\npythonrunscript needs these tools to build and run script environments.");
    msg
}
