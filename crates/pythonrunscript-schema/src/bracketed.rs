//! Bracketed metadata grammar:
//!
//! ```text
//! # /// pythonrunscript-requirements-txt
//! # requests==2.26.0
//! # ///
//! ```
//!
//! Other `# /// <type>` blocks, such as `# /// script`, belong to other
//! readers and are skipped whole.

use crate::block::{comment_lines, scan_blocks, BlockError, BlockKind, Marker};
use crate::deps::ScriptDependencies;
use crate::header::ScriptHeader;

pub(crate) const BLOCK_END: &str = "# ///";

fn is_block_type(name: &str) -> bool {
    !name.is_empty()
        && name
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'-')
}

fn classify(raw: &str) -> Marker {
    if raw == BLOCK_END {
        return Marker::End;
    }
    let Some(name) = raw.strip_prefix("# /// ") else {
        return Marker::Text;
    };
    if !is_block_type(name) {
        return Marker::Text;
    }
    BlockKind::ALL
        .into_iter()
        .find(|kind| kind.bracketed_name() == name)
        .map_or_else(|| Marker::Foreign(name.to_owned()), Marker::Begin)
}

/// Extract `# /// pythonrunscript-*` blocks from the header.
pub fn extract_bracketed(header: &ScriptHeader) -> Result<ScriptDependencies, BlockError> {
    scan_blocks(header, classify)
}

pub(crate) fn render_bracketed(kind: BlockKind, content: &str) -> String {
    let mut out = format!("# /// {}\n", kind.bracketed_name());
    for line in comment_lines(content) {
        out.push_str(&line);
        out.push('\n');
    }
    out.push_str(BLOCK_END);
    out.push('\n');
    out
}
