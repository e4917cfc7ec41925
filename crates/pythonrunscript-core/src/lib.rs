//! Orchestration for pythonrunscript.
//!
//! This crate ties parsing, the cache, and the runners together into the
//! `Engine`: a script is parsed and classified into an
//! `EnvironmentDescriptor`, its cache entry is resolved (reused, or created
//! under a per-fingerprint lock and trashed on failure), and the script is
//! launched with the entry's interpreter. Each stage is checked against the
//! lifecycle state machine.

pub mod concurrency;
pub mod descriptor;
pub mod engine;
pub mod lifecycle;
pub mod settings;

pub use concurrency::EntryLock;
pub use descriptor::{DescriptorData, EnvironmentDescriptor};
pub use engine::{BlockReport, DryRunReport, Engine, PreparedScript, ResolvedEnv};
pub use lifecycle::{validate_transition, EnvState};
pub use settings::Settings;

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("{0}")]
    Script(#[from] pythonrunscript_schema::ScriptError),
    #[error("cache error: {0}")]
    Store(#[from] pythonrunscript_store::StoreError),
    #[error("runtime error: {0}")]
    Runtime(#[from] pythonrunscript_runtime::RuntimeError),
    #[error("creating the environment failed, moved it to {}: {source}", .trashed.display())]
    CreationFailed {
        source: pythonrunscript_runtime::RuntimeError,
        trashed: PathBuf,
    },
    #[error("invalid state transition: {from} -> {to}")]
    InvalidTransition { from: String, to: String },
    #[error("lock error on {}: {source}", .path.display())]
    Lock {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
