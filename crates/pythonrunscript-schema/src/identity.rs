use crate::block::BlockKind;
use crate::types::{Fingerprint, ShortId};
use serde::Serialize;

/// Cache identity of a dependency set.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ScriptIdentity {
    pub fingerprint: Fingerprint,
    pub short_id: ShortId,
}

/// Normalize incidental whitespace: CRLF line endings, trailing whitespace
/// on each line, and trailing empty lines.
pub fn canonicalize(text: &str) -> String {
    let lines: Vec<&str> = text.lines().map(str::trim_end).collect();
    let keep = lines
        .iter()
        .rposition(|l| !l.is_empty())
        .map_or(0, |last| last + 1);
    lines[..keep].join("\n")
}

/// Compute the cache identity of a script's dependency blocks.
///
/// Each canonical block is framed with its kind tag and byte length, in the
/// fixed order pip, conda-env, conda-specs, so content cannot move between
/// kinds without changing the digest. The script body plays no part: two
/// scripts declaring identical blocks share an environment.
pub fn compute_fingerprint(pip: &str, conda_env: &str, conda_specs: &str) -> ScriptIdentity {
    let mut hasher = blake3::Hasher::new();

    for (kind, text) in BlockKind::ALL.into_iter().zip([pip, conda_env, conda_specs]) {
        let canonical = canonicalize(text);
        hasher.update(format!("{}:{}:", kind.tag(), canonical.len()).as_bytes());
        hasher.update(canonical.as_bytes());
    }

    let fingerprint = Fingerprint::new(hasher.finalize().to_hex().to_string());
    ScriptIdentity {
        short_id: fingerprint.short_id(),
        fingerprint,
    }
}
