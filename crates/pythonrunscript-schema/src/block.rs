//! Block kinds, grammars, and the delimited-block scanner shared by the
//! fenced and bracketed grammars.

use crate::deps::ScriptDependencies;
use crate::header::{comment_content, ScriptHeader};
use serde::Serialize;
use std::fmt;
use thiserror::Error;

/// The three manifest styles a dependency block can carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum BlockKind {
    /// pip `requirements.txt` lines.
    PipRequirements,
    /// A conda `environment.yml` document.
    CondaEnvYaml,
    /// One `conda install` spec per line.
    CondaSpecs,
}

impl BlockKind {
    /// Fingerprint order.
    pub const ALL: [BlockKind; 3] = [
        BlockKind::PipRequirements,
        BlockKind::CondaEnvYaml,
        BlockKind::CondaSpecs,
    ];

    /// File name used by the fenced grammar and for the artifact written
    /// into the cache entry.
    pub fn file_name(self) -> &'static str {
        match self {
            BlockKind::PipRequirements => "requirements.txt",
            BlockKind::CondaEnvYaml => "environment.yml",
            BlockKind::CondaSpecs => "conda_install_specs.txt",
        }
    }

    /// Block type used by the bracketed grammar.
    pub fn bracketed_name(self) -> &'static str {
        match self {
            BlockKind::PipRequirements => "pythonrunscript-requirements-txt",
            BlockKind::CondaEnvYaml => "pythonrunscript-environment-yml",
            BlockKind::CondaSpecs => "pythonrunscript-conda-install-specs-txt",
        }
    }

    pub(crate) fn tag(self) -> &'static str {
        match self {
            BlockKind::PipRequirements => "pip",
            BlockKind::CondaEnvYaml => "conda-env",
            BlockKind::CondaSpecs => "conda-specs",
        }
    }
}

impl fmt::Display for BlockKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.file_name())
    }
}

/// Surface syntax a block was read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Grammar {
    /// `` # ```requirements.txt `` ... `` # ``` ``
    Fenced,
    /// `# /// pythonrunscript-requirements-txt` ... `# ///`
    Bracketed,
    /// `# /// script` with `requires-python` and `dependencies` keys.
    InlineToml,
}

impl fmt::Display for Grammar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Grammar::Fenced => f.write_str("fenced"),
            Grammar::Bracketed => f.write_str("bracketed"),
            Grammar::InlineToml => f.write_str("inline-toml"),
        }
    }
}

/// Structural problems that invalidate one grammar for a document.
///
/// These never abort the tool: the grammar contributes nothing and the error
/// is kept as a diagnostic.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[serde(tag = "error", rename_all = "kebab-case")]
pub enum BlockError {
    #[error("line {line}: '{inner}' block opened inside the open '{outer}' block")]
    Nested {
        line: usize,
        outer: String,
        inner: String,
    },
    #[error("line {line}: second '{kind}' block")]
    Duplicate { line: usize, kind: String },
    #[error("'{kind}' block opened on line {line} is never closed")]
    Unterminated { line: usize, kind: String },
    #[error("line {line}: unsupported inline metadata: {reason}")]
    Unsupported { line: usize, reason: String },
}

/// How a scanner classifies one raw header line.
pub(crate) enum Marker {
    Begin(BlockKind),
    /// Start of a block this grammar does not own; skipped as a unit.
    Foreign(String),
    End,
    Text,
}

enum ScanState<'a> {
    Out,
    In {
        kind: BlockKind,
        opened: usize,
        lines: Vec<&'a str>,
    },
    Foreign {
        name: String,
        opened: usize,
    },
}

/// Collect at most one block per kind, with no nesting.
///
/// Any structural error fails the whole grammar: blocks closed before the
/// error are discarded along with the offending one.
pub(crate) fn scan_blocks(
    header: &ScriptHeader,
    classify: impl Fn(&str) -> Marker,
) -> Result<ScriptDependencies, BlockError> {
    let mut found = ScriptDependencies::default();
    let mut seen: Vec<BlockKind> = Vec::new();
    let mut state = ScanState::Out;

    for (idx, raw) in header.lines().iter().enumerate() {
        let line = idx + 1;
        state = match (state, classify(raw.as_str())) {
            (ScanState::Out, Marker::Begin(kind)) => {
                if seen.contains(&kind) {
                    return Err(BlockError::Duplicate {
                        line,
                        kind: kind.to_string(),
                    });
                }
                ScanState::In {
                    kind,
                    opened: line,
                    lines: Vec::new(),
                }
            }
            (ScanState::Out, Marker::Foreign(name)) => ScanState::Foreign { name, opened: line },
            (ScanState::Out, Marker::End | Marker::Text) => ScanState::Out,
            (ScanState::In { kind, .. }, Marker::Begin(inner)) => {
                return Err(BlockError::Nested {
                    line,
                    outer: kind.to_string(),
                    inner: inner.to_string(),
                });
            }
            (ScanState::In { kind, .. }, Marker::Foreign(inner)) => {
                return Err(BlockError::Nested {
                    line,
                    outer: kind.to_string(),
                    inner,
                });
            }
            (ScanState::In { kind, lines, .. }, Marker::End) => {
                seen.push(kind);
                found.set(kind, lines.join("\n"));
                ScanState::Out
            }
            (
                ScanState::In {
                    kind,
                    opened,
                    mut lines,
                },
                Marker::Text,
            ) => {
                lines.push(comment_content(raw));
                ScanState::In {
                    kind,
                    opened,
                    lines,
                }
            }
            (ScanState::Foreign { name, .. }, Marker::Begin(inner)) => {
                return Err(BlockError::Nested {
                    line,
                    outer: name,
                    inner: inner.to_string(),
                });
            }
            (ScanState::Foreign { name, .. }, Marker::Foreign(inner)) => {
                return Err(BlockError::Nested {
                    line,
                    outer: name,
                    inner,
                });
            }
            (ScanState::Foreign { .. }, Marker::End) => ScanState::Out,
            (state @ ScanState::Foreign { .. }, Marker::Text) => state,
        };
    }

    match state {
        ScanState::Out => Ok(found),
        ScanState::In { kind, opened, .. } => Err(BlockError::Unterminated {
            line: opened,
            kind: kind.to_string(),
        }),
        ScanState::Foreign { name, opened } => Err(BlockError::Unterminated {
            line: opened,
            kind: name,
        }),
    }
}

/// Comment lines for block content, the inverse of content stripping.
pub(crate) fn comment_lines(content: &str) -> impl Iterator<Item = String> + '_ {
    content.split('\n').map(|line| {
        if line.is_empty() {
            "#".to_owned()
        } else {
            format!("# {line}")
        }
    })
}

/// Serialize block content back into a comment block of the given grammar.
///
/// Extracting the result yields `content` unchanged. The inline TOML grammar
/// has no per-kind block form; it renders as the bracketed grammar.
pub fn render_block(kind: BlockKind, content: &str, grammar: Grammar) -> String {
    match grammar {
        Grammar::Fenced => crate::fence::render_fenced(kind, content),
        Grammar::Bracketed | Grammar::InlineToml => {
            crate::bracketed::render_bracketed(kind, content)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_names() {
        assert_eq!(BlockKind::PipRequirements.file_name(), "requirements.txt");
        assert_eq!(BlockKind::CondaEnvYaml.file_name(), "environment.yml");
        assert_eq!(BlockKind::CondaSpecs.file_name(), "conda_install_specs.txt");
        assert_eq!(
            BlockKind::CondaSpecs.bracketed_name(),
            "pythonrunscript-conda-install-specs-txt"
        );
    }

    #[test]
    fn fingerprint_order_is_pip_env_specs() {
        assert_eq!(
            BlockKind::ALL,
            [
                BlockKind::PipRequirements,
                BlockKind::CondaEnvYaml,
                BlockKind::CondaSpecs
            ]
        );
    }

    #[test]
    fn comment_lines_mark_empty_lines_with_bare_hash() {
        let lines: Vec<String> = comment_lines("a\n\n  b").collect();
        assert_eq!(lines, ["# a", "#", "#   b"]);
    }

    #[test]
    fn block_error_display_names_line() {
        let e = BlockError::Nested {
            line: 4,
            outer: "conda_install_specs.txt".to_owned(),
            inner: "requirements.txt".to_owned(),
        };
        let msg = e.to_string();
        assert!(msg.contains("line 4"));
        assert!(msg.contains("conda_install_specs.txt"));
    }
}
