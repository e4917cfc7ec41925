use crate::lifecycle::EnvState;
use crate::settings::Settings;
use pythonrunscript_runtime::{InstallPlan, Verbosity};
use pythonrunscript_schema::{BlockKind, ScriptDependencies, ScriptIdentity};
use pythonrunscript_store::layout::{EXPORTED_ENV_FILE, PIP_LIST_FILE};
use pythonrunscript_store::{EntryKind, StoreLayout};
use serde::Serialize;
use std::path::{Path, PathBuf};

/// What every descriptor variant carries.
#[derive(Debug, Clone, Serialize)]
pub struct DescriptorData {
    pub script: PathBuf,
    pub identity: ScriptIdentity,
    pub dependencies: ScriptDependencies,
    pub verbosity: Verbosity,
}

/// How a script's environment is provided.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "backend", rename_all = "kebab-case")]
pub enum EnvironmentDescriptor {
    /// No dependency blocks: the base interpreter runs the script.
    NoDeps(DescriptorData),
    /// A venv with pip requirements.
    Pip(DescriptorData),
    /// A conda prefix, with optional pip requirements installed into it.
    Conda(DescriptorData),
}

fn python_in(env_dir: &Path) -> PathBuf {
    env_dir.join("bin").join("python3")
}

fn args(parts: &[&str]) -> Vec<String> {
    parts.iter().map(|s| (*s).to_owned()).collect()
}

impl EnvironmentDescriptor {
    /// Conda wins whenever either conda block is present; pip alone means a
    /// venv; nothing at all means the base interpreter.
    pub fn classify(
        script: &Path,
        dependencies: ScriptDependencies,
        verbosity: Verbosity,
    ) -> Self {
        let data = DescriptorData {
            script: script.to_path_buf(),
            identity: dependencies.identity(),
            dependencies,
            verbosity,
        };
        if data.dependencies.needs_conda() {
            EnvironmentDescriptor::Conda(data)
        } else if !data.dependencies.pip_requirements.is_empty() {
            EnvironmentDescriptor::Pip(data)
        } else {
            EnvironmentDescriptor::NoDeps(data)
        }
    }

    pub fn data(&self) -> &DescriptorData {
        match self {
            EnvironmentDescriptor::NoDeps(d)
            | EnvironmentDescriptor::Pip(d)
            | EnvironmentDescriptor::Conda(d) => d,
        }
    }

    pub fn backend_name(&self) -> &'static str {
        match self {
            EnvironmentDescriptor::NoDeps(_) => "no-deps",
            EnvironmentDescriptor::Pip(_) => "pip",
            EnvironmentDescriptor::Conda(_) => "conda",
        }
    }

    /// State right after classification.
    pub fn state(&self) -> EnvState {
        match self {
            EnvironmentDescriptor::NoDeps(_) => EnvState::NoDeps,
            EnvironmentDescriptor::Pip(_) => EnvState::PendingPip,
            EnvironmentDescriptor::Conda(_) => EnvState::PendingConda,
        }
    }

    /// `None` for scripts that need no cache entry.
    pub fn entry_kind(&self) -> Option<EntryKind> {
        match self {
            EnvironmentDescriptor::NoDeps(_) => None,
            EnvironmentDescriptor::Pip(_) => Some(EntryKind::Pip),
            EnvironmentDescriptor::Conda(_) => Some(EntryKind::Conda),
        }
    }

    pub fn fingerprint(&self) -> &str {
        &self.data().identity.fingerprint
    }

    pub fn exists(&self, layout: &StoreLayout) -> bool {
        match self {
            EnvironmentDescriptor::NoDeps(_) => true,
            EnvironmentDescriptor::Pip(d) | EnvironmentDescriptor::Conda(d) => {
                layout.entry_path(&d.identity.fingerprint).is_dir()
            }
        }
    }

    pub fn interpreter(&self, layout: &StoreLayout, settings: &Settings) -> PathBuf {
        match self {
            EnvironmentDescriptor::NoDeps(_) => PathBuf::from(&settings.python),
            EnvironmentDescriptor::Pip(d) => {
                python_in(&layout.env_dir(&d.identity.fingerprint, EntryKind::Pip))
            }
            EnvironmentDescriptor::Conda(d) => {
                python_in(&layout.env_dir(&d.identity.fingerprint, EntryKind::Conda))
            }
        }
    }

    /// Steps that create this descriptor's cache entry. Empty for NoDeps.
    pub fn install_plan(&self, layout: &StoreLayout, settings: &Settings) -> InstallPlan {
        let mut plan = InstallPlan::new();
        match self {
            EnvironmentDescriptor::NoDeps(_) => {}
            EnvironmentDescriptor::Pip(d) => {
                let fp = d.identity.fingerprint.as_str();
                let venv = layout.env_dir(fp, EntryKind::Pip);
                let mut cmd = args(&["-m", "venv"]);
                cmd.push(InstallPlan::arg_path(&venv));
                plan.command("create_venv", &settings.python, cmd);
                push_pip_install(&mut plan, layout, fp, &venv, &d.dependencies.pip_requirements);
            }
            EnvironmentDescriptor::Conda(d) => {
                let fp = d.identity.fingerprint.as_str();
                let prefix = layout.env_dir(fp, EntryKind::Conda);
                let prefix_arg = InstallPlan::arg_path(&prefix);
                let deps = &d.dependencies;
                let conda = settings.conda.as_str();

                let mut cmd = args(&["create", "--quiet", "--yes", "--prefix"]);
                cmd.push(prefix_arg.clone());
                plan.command("conda_create", conda, cmd);

                if !deps.conda_env_yaml.is_empty() {
                    let yml = layout.artifact_path(fp, BlockKind::CondaEnvYaml.file_name());
                    let mut cmd = args(&["env", "create", "--quiet", "--yes", "--file"]);
                    cmd.extend([InstallPlan::arg_path(&yml), "--prefix".into(), prefix_arg.clone()]);
                    plan.write_artifact(yml, deps.conda_env_yaml.as_str())
                        .command("conda_env_create_f", conda, cmd);
                } else if !deps.conda_specs.is_empty() {
                    let specs = layout.artifact_path(fp, BlockKind::CondaSpecs.file_name());
                    let mut cmd = args(&["install", "--quiet", "--yes", "--file"]);
                    cmd.extend([InstallPlan::arg_path(&specs), "--prefix".into(), prefix_arg.clone()]);
                    plan.write_artifact(specs, deps.conda_specs.as_str())
                        .command("conda_install", conda, cmd);
                }

                let mut cmd = args(&["env", "export", "--quiet", "--prefix"]);
                cmd.push(prefix_arg);
                plan.capture(conda, cmd, layout.artifact_path(fp, EXPORTED_ENV_FILE));

                push_pip_install(&mut plan, layout, fp, &prefix, &deps.pip_requirements);
            }
        }
        plan
    }
}

/// Write requirements.txt, install it with the environment's own
/// interpreter, and record `pip list`. Nothing when `requirements` is empty.
fn push_pip_install(
    plan: &mut InstallPlan,
    layout: &StoreLayout,
    fingerprint: &str,
    env_dir: &Path,
    requirements: &str,
) {
    if requirements.is_empty() {
        return;
    }
    let interpreter = InstallPlan::arg_path(&python_in(env_dir));
    let reqs = layout.artifact_path(fingerprint, BlockKind::PipRequirements.file_name());
    let mut cmd = args(&["-m", "pip", "install", "-r"]);
    cmd.push(InstallPlan::arg_path(&reqs));
    plan.write_artifact(reqs, requirements)
        .command("pip_install", &interpreter, cmd)
        .capture(
            &interpreter,
            args(&["-m", "pip", "list"]),
            layout.artifact_path(fingerprint, PIP_LIST_FILE),
        );
}
