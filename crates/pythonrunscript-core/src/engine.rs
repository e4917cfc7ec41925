use crate::concurrency::EntryLock;
use crate::descriptor::EnvironmentDescriptor;
use crate::lifecycle::{validate_transition, EnvState};
use crate::settings::Settings;
use crate::CoreError;
use pythonrunscript_runtime::{
    InstallPlan, RunOutcome, StepContext, StepRunner, SystemRunner, Verbosity,
};
use pythonrunscript_schema::{
    parse_script_file, render_block, BlockKind, Diagnostic, Fingerprint, Grammar, ParsedScript,
    ShortId,
};
use pythonrunscript_store::{
    clean_cache, trash_entry, CacheEntry, EntryMetadata, MetadataStore, StoreLayout,
};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Central orchestration for one invocation: parse, classify, resolve the
/// cache entry, launch.
pub struct Engine {
    settings: Settings,
    layout: StoreLayout,
    meta_store: MetadataStore,
    runner: Box<dyn StepRunner>,
}

/// A parsed script and its classification.
pub struct PreparedScript {
    pub parsed: ParsedScript,
    pub descriptor: EnvironmentDescriptor,
}

/// An interpreter ready to run the script.
#[derive(Debug, Clone, Serialize)]
pub struct ResolvedEnv {
    pub state: EnvState,
    pub interpreter: PathBuf,
    /// `None` for dependency-free scripts.
    pub entry: Option<PathBuf>,
    /// Whether this invocation built the entry.
    pub created: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct BlockReport {
    pub kind: BlockKind,
    pub grammar: Grammar,
    pub content: String,
    pub rendered: String,
}

/// Everything a run would do, computed without side effects.
#[derive(Debug, Clone, Serialize)]
pub struct DryRunReport {
    pub script: PathBuf,
    pub backend: &'static str,
    pub fingerprint: Option<Fingerprint>,
    pub short_id: Option<ShortId>,
    pub blocks: Vec<BlockReport>,
    pub diagnostics: Vec<Diagnostic>,
    pub entry: Option<PathBuf>,
    /// A complete entry is cached and would be reused.
    pub entry_exists: bool,
    pub interpreter: PathBuf,
    pub plan: InstallPlan,
}

impl Engine {
    pub fn new(settings: Settings) -> Self {
        Self::with_runner(settings, Box::new(SystemRunner::new()))
    }

    pub fn with_runner(settings: Settings, runner: Box<dyn StepRunner>) -> Self {
        let layout = settings.layout();
        let meta_store = MetadataStore::new(layout.clone());
        Self {
            settings,
            layout,
            meta_store,
            runner,
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn store_layout(&self) -> &StoreLayout {
        &self.layout
    }

    /// Parse `script` and classify its environment.
    pub fn prepare(&self, script: &Path, verbosity: Verbosity) -> Result<PreparedScript, CoreError> {
        let parsed = parse_script_file(script)?;
        let descriptor =
            EnvironmentDescriptor::classify(script, parsed.dependencies.clone(), verbosity);
        validate_transition(EnvState::Unclassified, descriptor.state())?;
        debug!(
            "{} classified as {} ({})",
            script.display(),
            descriptor.backend_name(),
            descriptor.data().identity.short_id
        );
        Ok(PreparedScript { parsed, descriptor })
    }

    /// Reuse or create the descriptor's cache entry.
    ///
    /// The entry lock is taken before the existence check and held until the
    /// entry is either complete or trashed, so concurrent invocations for
    /// the same fingerprint build it once. It is released on return. An
    /// entry directory without readable metadata is trashed and rebuilt.
    pub fn resolve(&self, descriptor: &EnvironmentDescriptor) -> Result<ResolvedEnv, CoreError> {
        validate_transition(descriptor.state(), EnvState::Resolved)?;
        let interpreter = descriptor.interpreter(&self.layout, &self.settings);

        let Some(kind) = descriptor.entry_kind() else {
            return Ok(ResolvedEnv {
                state: EnvState::Resolved,
                interpreter,
                entry: None,
                created: false,
            });
        };

        let data = descriptor.data();
        let fingerprint = descriptor.fingerprint();
        let entry = self.layout.entry_path(fingerprint);
        self.layout.initialize()?;
        let lock_path = self.layout.lock_file(fingerprint);
        let _lock = match EntryLock::try_acquire(&lock_path)? {
            Some(lock) => lock,
            None => {
                info!(
                    "waiting for another invocation building environment {}",
                    data.identity.short_id
                );
                EntryLock::acquire(&lock_path)?
            }
        };

        if descriptor.exists(&self.layout) {
            match self.meta_store.get(fingerprint) {
                Ok(_) => {
                    info!("reusing {kind} environment {}", data.identity.short_id);
                    return Ok(ResolvedEnv {
                        state: EnvState::Resolved,
                        interpreter,
                        entry: Some(entry),
                        created: false,
                    });
                }
                // No readable entry.json: an earlier build never finished.
                Err(e) => {
                    warn!(
                        "environment {} is incomplete ({e}), rebuilding",
                        data.identity.short_id
                    );
                    let trashed = trash_entry(&self.layout, &entry)?;
                    debug!("moved incomplete entry to {}", trashed.display());
                }
            }
        }

        info!("creating {kind} environment {}", data.identity.short_id);
        fs::create_dir_all(&entry)?;
        let plan = descriptor.install_plan(&self.layout, &self.settings);
        let logs_dir = self.layout.logs_dir(fingerprint);
        let ctx = StepContext {
            logs_dir: &logs_dir,
            verbosity: data.verbosity,
        };

        if let Err(source) = self.runner.execute(&plan, &ctx) {
            let trashed = match trash_entry(&self.layout, &entry) {
                Ok(path) => path,
                Err(e) => {
                    warn!("environment creation failed: {source}");
                    return Err(e.into());
                }
            };
            return Err(CoreError::CreationFailed { source, trashed });
        }

        let meta = EntryMetadata::new(&data.identity, kind, &data.script);
        if let Err(e) = self.meta_store.put(&meta) {
            warn!("failed to record metadata for {}: {e}", data.identity.short_id);
        }

        Ok(ResolvedEnv {
            state: EnvState::Resolved,
            interpreter,
            entry: Some(entry),
            created: true,
        })
    }

    /// Whether `resolve` would reuse an existing entry without building.
    /// Dependency-free scripts never need one.
    pub fn is_reusable(&self, descriptor: &EnvironmentDescriptor) -> bool {
        descriptor.entry_kind().is_none()
            || (descriptor.exists(&self.layout)
                && self.meta_store.get(descriptor.fingerprint()).is_ok())
    }

    /// Hand the script to the resolved interpreter. With a process-replacing
    /// runner this only returns on failure.
    pub fn run(
        &self,
        descriptor: &EnvironmentDescriptor,
        resolved: &ResolvedEnv,
        args: &[String],
    ) -> Result<RunOutcome, CoreError> {
        validate_transition(resolved.state, EnvState::Ready)?;
        Ok(self
            .runner
            .launch(&resolved.interpreter, &descriptor.data().script, args)?)
    }

    /// Report parsing results, the chosen backend, and the install plan.
    /// Writes nothing.
    pub fn dry_run(&self, script: &Path, verbosity: Verbosity) -> Result<DryRunReport, CoreError> {
        let PreparedScript { parsed, descriptor } = self.prepare(script, verbosity)?;

        let blocks = parsed
            .origins
            .iter()
            .map(|origin| {
                let content = parsed.dependencies.get(origin.kind).to_owned();
                BlockReport {
                    kind: origin.kind,
                    grammar: origin.grammar,
                    rendered: render_block(origin.kind, &content, origin.grammar),
                    content,
                }
            })
            .collect();

        let needs_entry = descriptor.entry_kind().is_some();
        let identity = &descriptor.data().identity;
        Ok(DryRunReport {
            script: script.to_path_buf(),
            backend: descriptor.backend_name(),
            fingerprint: needs_entry.then(|| identity.fingerprint.clone()),
            short_id: needs_entry.then(|| identity.short_id.clone()),
            blocks,
            diagnostics: parsed.diagnostics.clone(),
            entry: needs_entry.then(|| self.layout.entry_path(descriptor.fingerprint())),
            entry_exists: self.is_reusable(&descriptor),
            interpreter: descriptor.interpreter(&self.layout, &self.settings),
            plan: descriptor.install_plan(&self.layout, &self.settings),
        })
    }

    pub fn list_entries(&self) -> Result<Vec<CacheEntry>, CoreError> {
        Ok(self.meta_store.list()?)
    }

    /// Move the whole cache to trash.
    pub fn clean_cache(&self) -> Result<Option<PathBuf>, CoreError> {
        Ok(clean_cache(&self.layout)?)
    }
}
