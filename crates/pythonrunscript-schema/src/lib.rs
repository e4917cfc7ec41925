//! Dependency block extraction and environment identity for pythonrunscript.
//!
//! This crate is the parsing layer: it isolates a script's leading comment
//! header (`ScriptHeader`), reads dependency blocks from it under three
//! independent grammars (legacy fences, `# /// pythonrunscript-*` brackets,
//! and the `# /// script` inline TOML subset), reduces them to one
//! `ScriptDependencies`, and derives the cache `Fingerprint` from the result.

pub mod block;
pub mod bracketed;
pub mod deps;
pub mod fence;
pub mod header;
pub mod identity;
pub mod inline_toml;
pub mod types;

pub use block::{render_block, BlockError, BlockKind, Grammar};
pub use bracketed::extract_bracketed;
pub use deps::{
    parse_script_file, parse_script_str, BlockOrigin, Diagnostic, ParsedScript,
    ScriptDependencies,
};
pub use fence::extract_fenced;
pub use header::ScriptHeader;
pub use identity::{canonicalize, compute_fingerprint, ScriptIdentity};
pub use inline_toml::{read_inline_metadata, InlineMetadata};
pub use types::{Fingerprint, ShortId};

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ScriptError {
    #[error("did not find the script {}", .0.display())]
    NotFound(PathBuf),
    #[error("failed to read script {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
}
