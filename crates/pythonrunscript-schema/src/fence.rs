//! Legacy fenced grammar:
//!
//! ```text
//! # ```requirements.txt
//! # requests==2.26.0
//! # ```
//! ```

use crate::block::{comment_lines, scan_blocks, BlockError, BlockKind, Marker};
use crate::deps::ScriptDependencies;
use crate::header::ScriptHeader;

const FENCE: &str = "# ```";

fn classify(raw: &str) -> Marker {
    let Some(rest) = raw.strip_prefix(FENCE) else {
        return Marker::Text;
    };
    if rest.is_empty() {
        return Marker::End;
    }
    BlockKind::ALL
        .into_iter()
        .find(|kind| kind.file_name() == rest)
        .map_or(Marker::Text, Marker::Begin)
}

/// Extract fenced blocks from the header.
pub fn extract_fenced(header: &ScriptHeader) -> Result<ScriptDependencies, BlockError> {
    scan_blocks(header, classify)
}

pub(crate) fn render_fenced(kind: BlockKind, content: &str) -> String {
    let mut out = format!("{FENCE}{}\n", kind.file_name());
    for line in comment_lines(content) {
        out.push_str(&line);
        out.push('\n');
    }
    out.push_str(FENCE);
    out.push('\n');
    out
}
