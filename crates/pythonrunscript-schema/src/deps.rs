use crate::block::{BlockError, BlockKind, Grammar};
use crate::bracketed::extract_bracketed;
use crate::fence::extract_fenced;
use crate::header::ScriptHeader;
use crate::identity::{compute_fingerprint, ScriptIdentity};
use crate::inline_toml::read_inline_metadata;
use crate::ScriptError;
use serde::Serialize;
use std::fs;
use std::path::Path;
use tracing::{debug, info};

/// The three raw dependency strings of a script. Empty means absent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ScriptDependencies {
    pub pip_requirements: String,
    pub conda_env_yaml: String,
    pub conda_specs: String,
}

impl ScriptDependencies {
    pub fn get(&self, kind: BlockKind) -> &str {
        match kind {
            BlockKind::PipRequirements => &self.pip_requirements,
            BlockKind::CondaEnvYaml => &self.conda_env_yaml,
            BlockKind::CondaSpecs => &self.conda_specs,
        }
    }

    pub(crate) fn set(&mut self, kind: BlockKind, content: String) {
        match kind {
            BlockKind::PipRequirements => self.pip_requirements = content,
            BlockKind::CondaEnvYaml => self.conda_env_yaml = content,
            BlockKind::CondaSpecs => self.conda_specs = content,
        }
    }

    pub fn is_empty(&self) -> bool {
        BlockKind::ALL.iter().all(|k| self.get(*k).is_empty())
    }

    pub fn needs_conda(&self) -> bool {
        !self.conda_env_yaml.is_empty() || !self.conda_specs.is_empty()
    }

    pub fn identity(&self) -> ScriptIdentity {
        compute_fingerprint(&self.pip_requirements, &self.conda_env_yaml, &self.conda_specs)
    }
}

/// Where a kind's content came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BlockOrigin {
    pub kind: BlockKind,
    pub grammar: Grammar,
}

/// A grammar that was rejected for this document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
    pub grammar: Grammar,
    pub error: BlockError,
}

/// Result of reading a script's header with every grammar.
#[derive(Debug, Clone)]
pub struct ParsedScript {
    pub header: ScriptHeader,
    pub dependencies: ScriptDependencies,
    pub origins: Vec<BlockOrigin>,
    pub diagnostics: Vec<Diagnostic>,
}

impl ParsedScript {
    pub fn origin(&self, kind: BlockKind) -> Option<Grammar> {
        self.origins
            .iter()
            .find(|o| o.kind == kind)
            .map(|o| o.grammar)
    }
}

/// Run each extractor over the header and reduce their results.
///
/// Extractors are consulted in priority order (fenced, bracketed, inline
/// TOML); for each kind the first non-empty block wins. A grammar that
/// reports a structural error contributes nothing.
pub fn parse_script_str(source: &str) -> ParsedScript {
    let header = ScriptHeader::from_source(source);
    debug!("script header spans {} lines", header.len());

    let candidates = [
        (Grammar::Fenced, extract_fenced(&header)),
        (Grammar::Bracketed, extract_bracketed(&header)),
        (
            Grammar::InlineToml,
            read_inline_metadata(&header)
                .map(|meta| meta.map(|m| m.to_dependencies()).unwrap_or_default()),
        ),
    ];

    let mut dependencies = ScriptDependencies::default();
    let mut origins = Vec::new();
    let mut diagnostics = Vec::new();

    for (grammar, result) in candidates {
        let found = match result {
            Ok(found) => found,
            Err(error) => {
                info!("ignoring {grammar} dependency blocks: {error}");
                diagnostics.push(Diagnostic { grammar, error });
                continue;
            }
        };
        for kind in BlockKind::ALL {
            let content = found.get(kind);
            if content.is_empty() || !dependencies.get(kind).is_empty() {
                continue;
            }
            debug!("{kind} block read from {grammar} grammar");
            dependencies.set(kind, content.to_owned());
            origins.push(BlockOrigin { kind, grammar });
        }
    }

    ParsedScript {
        header,
        dependencies,
        origins,
        diagnostics,
    }
}

/// Read and parse a script file. Invalid UTF-8 is replaced, not rejected.
pub fn parse_script_file(path: &Path) -> Result<ParsedScript, ScriptError> {
    if !path.is_file() {
        return Err(ScriptError::NotFound(path.to_path_buf()));
    }
    let bytes = fs::read(path).map_err(|source| ScriptError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(parse_script_str(&String::from_utf8_lossy(&bytes)))
}
