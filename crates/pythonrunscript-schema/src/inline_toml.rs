//! Reader for the `# /// script` inline metadata block.
//!
//! ```text
//! # /// script
//! # requires-python = ">=3.11"
//! # dependencies = [
//! #   "requests<3",
//! #   "rich",  # terminal output
//! # ]
//! # ///
//! ```
//!
//! Only top-level `requires-python` and `dependencies` are read, by pattern
//! matching over a small TOML subset: simple basic strings without escapes,
//! literal strings, and flat string arrays. Anything outside the subset makes
//! the whole block unsupported rather than guessing, so every accepted block
//! reads exactly as a TOML parser would read it.

use crate::bracketed::BLOCK_END;
use crate::block::BlockError;
use crate::deps::ScriptDependencies;
use crate::header::{comment_content, ScriptHeader};

const SCRIPT_BEGIN: &str = "# /// script";
const SCRIPT_TYPE: &str = "script";

/// Values read from a `# /// script` block.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InlineMetadata {
    pub requires_python: Option<String>,
    pub dependencies: Option<Vec<String>>,
}

impl InlineMetadata {
    /// pip requirements text: one dependency per line, newline terminated.
    pub fn pip_requirements(&self) -> String {
        let mut out = String::new();
        for dep in self.dependencies.iter().flatten() {
            out.push_str(dep);
            out.push('\n');
        }
        out
    }

    /// conda spec pinning the interpreter, e.g. `python>=3.11`.
    pub fn conda_python_spec(&self) -> String {
        self.requires_python
            .as_deref()
            .map(|constraint| format!("python{constraint}"))
            .unwrap_or_default()
    }

    pub fn to_dependencies(&self) -> ScriptDependencies {
        ScriptDependencies {
            pip_requirements: self.pip_requirements(),
            conda_env_yaml: String::new(),
            conda_specs: self.conda_python_spec(),
        }
    }
}

/// Locate the `# /// script` block and read its metadata.
///
/// Returns `Ok(None)` when the header has no such block.
pub fn read_inline_metadata(header: &ScriptHeader) -> Result<Option<InlineMetadata>, BlockError> {
    let Some(body) = script_block(header)? else {
        return Ok(None);
    };
    parse_body(&body).map(Some)
}

/// Body lines of the script block, paired with their line numbers.
fn script_block(header: &ScriptHeader) -> Result<Option<Vec<(usize, &str)>>, BlockError> {
    let mut body: Option<Vec<(usize, &str)>> = None;
    let mut opened = 0;
    let mut open = false;

    for (idx, raw) in header.lines().iter().enumerate() {
        let line = idx + 1;
        if open {
            if raw == BLOCK_END {
                open = false;
            } else if raw == SCRIPT_BEGIN {
                return Err(BlockError::Nested {
                    line,
                    outer: SCRIPT_TYPE.to_owned(),
                    inner: SCRIPT_TYPE.to_owned(),
                });
            } else if let Some(lines) = body.as_mut() {
                lines.push((line, comment_content(raw)));
            }
        } else if raw == SCRIPT_BEGIN {
            if body.is_some() {
                return Err(BlockError::Duplicate {
                    line,
                    kind: SCRIPT_TYPE.to_owned(),
                });
            }
            body = Some(Vec::new());
            opened = line;
            open = true;
        }
    }

    if open {
        return Err(BlockError::Unterminated {
            line: opened,
            kind: SCRIPT_TYPE.to_owned(),
        });
    }
    Ok(body)
}

fn unsupported(line: usize, reason: impl Into<String>) -> BlockError {
    BlockError::Unsupported {
        line,
        reason: reason.into(),
    }
}

fn parse_body(body: &[(usize, &str)]) -> Result<InlineMetadata, BlockError> {
    let mut meta = InlineMetadata::default();
    let mut idx = 0;

    while idx < body.len() {
        let (line, raw) = body[idx];
        idx += 1;
        let text = strip_comment(raw, line)?;
        if text.is_empty() {
            continue;
        }
        // Keys after a table header belong to that table.
        if text.starts_with('[') {
            break;
        }
        let Some((key, value)) = text.split_once('=') else {
            return Err(unsupported(line, format!("expected `key = value`, found `{text}`")));
        };
        let key = key.trim();
        let mut value = value.trim().to_owned();

        if value.starts_with('[') {
            while !array_closed(&value) {
                let Some(&(next_line, next_raw)) = body.get(idx) else {
                    return Err(unsupported(line, format!("array for `{key}` is never closed")));
                };
                idx += 1;
                value.push(' ');
                value.push_str(&strip_comment(next_raw, next_line)?);
            }
        }

        match key {
            "requires-python" => {
                if meta.requires_python.is_some() {
                    return Err(unsupported(line, "duplicate key `requires-python`"));
                }
                meta.requires_python = Some(parse_string(&value, line)?);
            }
            "dependencies" => {
                if meta.dependencies.is_some() {
                    return Err(unsupported(line, "duplicate key `dependencies`"));
                }
                meta.dependencies = Some(parse_string_array(&value, line)?);
            }
            _ => {}
        }
    }

    Ok(meta)
}

/// Drop a trailing `#` comment that is not inside a string, then trim.
fn strip_comment(raw: &str, line: usize) -> Result<String, BlockError> {
    let mut quote: Option<char> = None;
    for (pos, ch) in raw.char_indices() {
        match (quote, ch) {
            (None, '#') => return Ok(raw[..pos].trim().to_owned()),
            (None, '"' | '\'') => quote = Some(ch),
            (Some('"'), '\\') => return Err(unsupported(line, "escape sequences")),
            (Some(q), c) if q == c => quote = None,
            _ => {}
        }
    }
    if quote.is_some() {
        return Err(unsupported(line, "string does not end on its line"));
    }
    Ok(raw.trim().to_owned())
}

/// Whether the bracket opened at the start of `value` has been matched.
/// Brackets inside strings do not count; nested arrays do.
fn array_closed(value: &str) -> bool {
    let mut quote: Option<char> = None;
    let mut depth = 0usize;
    for ch in value.chars() {
        match (quote, ch) {
            (None, '[') => depth += 1,
            (None, ']') => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    return true;
                }
            }
            (None, '"' | '\'') => quote = Some(ch),
            (Some(q), c) if q == c => quote = None,
            _ => {}
        }
    }
    false
}

/// Split a leading quoted string off `input`.
fn take_string(input: &str, line: usize) -> Result<(String, &str), BlockError> {
    let mut chars = input.chars();
    let quote = match chars.next() {
        Some(q @ ('"' | '\'')) => q,
        _ => return Err(unsupported(line, format!("expected a quoted string at `{input}`"))),
    };
    let body = &input[1..];
    if body.starts_with(quote) && body[1..].starts_with(quote) {
        return Err(unsupported(line, "multi-line strings"));
    }
    match body.find(quote) {
        Some(end) => Ok((body[..end].to_owned(), &body[end + 1..])),
        None => Err(unsupported(line, "unterminated string")),
    }
}

fn parse_string(value: &str, line: usize) -> Result<String, BlockError> {
    let (text, rest) = take_string(value, line)?;
    if !rest.trim().is_empty() {
        return Err(unsupported(line, format!("unexpected `{}` after string", rest.trim())));
    }
    Ok(text)
}

fn parse_string_array(value: &str, line: usize) -> Result<Vec<String>, BlockError> {
    let inner = value
        .strip_prefix('[')
        .and_then(|v| v.strip_suffix(']'))
        .ok_or_else(|| unsupported(line, "expected an array of strings"))?;

    let mut items = Vec::new();
    let mut rest = inner.trim_start();
    while !rest.is_empty() {
        let (item, after) = take_string(rest, line)?;
        items.push(item);
        rest = after.trim_start();
        if rest.is_empty() {
            break;
        }
        rest = rest
            .strip_prefix(',')
            .ok_or_else(|| unsupported(line, format!("expected `,` before `{rest}`")))?
            .trim_start();
    }
    Ok(items)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Deserialize)]
    #[serde(rename_all = "kebab-case")]
    struct Reference {
        requires_python: Option<String>,
        dependencies: Option<Vec<String>>,
    }

    fn read(source: &str) -> Result<Option<InlineMetadata>, BlockError> {
        read_inline_metadata(&ScriptHeader::from_source(source))
    }

    /// Parse the block body with a real TOML parser for comparison.
    fn reference(source: &str) -> Reference {
        let header = ScriptHeader::from_source(source);
        let body: Vec<&str> = script_block(&header)
            .unwrap()
            .unwrap()
            .into_iter()
            .map(|(_, text)| text)
            .collect();
        toml::from_str(&body.join("\n")).unwrap()
    }

    fn assert_matches_reference(source: &str) {
        let ours = read(source).unwrap().unwrap();
        let theirs = reference(source);
        assert_eq!(ours.requires_python, theirs.requires_python);
        assert_eq!(ours.dependencies, theirs.dependencies);
    }

    #[test]
    fn single_line_dependencies() {
        let source = "\
# /// script
# requires-python = \">=3.11\"
# dependencies = [\"requests<3\", \"rich\"]
# ///
";
        let meta = read(source).unwrap().unwrap();
        assert_eq!(meta.pip_requirements(), "requests<3\nrich\n");
        assert_eq!(meta.conda_python_spec(), "python>=3.11");
        assert_matches_reference(source);
    }

    #[test]
    fn multi_line_array_with_comments() {
        let source = "\
# /// script
# dependencies = [
#   \"requests<3\",  # http
#   # formatting
#   'rich',
# ]
# ///
";
        let meta = read(source).unwrap().unwrap();
        assert_eq!(
            meta.dependencies,
            Some(vec!["requests<3".to_owned(), "rich".to_owned()])
        );
        assert_eq!(meta.conda_python_spec(), "");
        assert_matches_reference(source);
    }

    #[test]
    fn hash_inside_string_is_not_a_comment() {
        let source = "\
# /// script
# dependencies = [\"pkg @ https://example.com/pkg.zip#sha256=abc\"]  # pinned
# ///
";
        assert_matches_reference(source);
        let meta = read(source).unwrap().unwrap();
        assert_eq!(
            meta.pip_requirements(),
            "pkg @ https://example.com/pkg.zip#sha256=abc\n"
        );
    }

    #[test]
    fn empty_array_yields_empty_requirements() {
        let source = "# /// script\n# dependencies = []\n# requires-python = '>=3.9'\n# ///\n";
        let meta = read(source).unwrap().unwrap();
        assert_eq!(meta.pip_requirements(), "");
        assert_eq!(meta.conda_python_spec(), "python>=3.9");
        assert_matches_reference(source);
    }

    #[test]
    fn keys_under_tables_are_ignored() {
        let source = "\
# /// script
# dependencies = [\"rich\"]
# [tool.example]
# dependencies = [\"ignored\"]
# ///
";
        assert_matches_reference(source);
        let meta = read(source).unwrap().unwrap();
        assert_eq!(meta.dependencies, Some(vec!["rich".to_owned()]));
    }

    #[test]
    fn unknown_multi_line_array_is_skipped() {
        let source = "\
# /// script
# other = [
#   \"x\",
# ]
# dependencies = [\"rich\"]
# ///
";
        let meta = read(source).unwrap().unwrap();
        assert_eq!(meta.dependencies, Some(vec!["rich".to_owned()]));
    }

    #[test]
    fn nested_arrays_under_other_keys_do_not_end_the_scan() {
        let source = "\
# /// script
# matrix = [
#   [1, 2],
#   [3],
# ]
# dependencies = [\"rich\"]
# ///
";
        assert_matches_reference(source);
        let meta = read(source).unwrap().unwrap();
        assert_eq!(meta.dependencies, Some(vec!["rich".to_owned()]));
    }

    #[test]
    fn bracket_inside_string_does_not_close_array() {
        let source = "\
# /// script
# dependencies = [
#   \"pkg[extra]\",
#   \"rich\",
# ]
# ///
";
        assert_matches_reference(source);
        let meta = read(source).unwrap().unwrap();
        assert_eq!(meta.pip_requirements(), "pkg[extra]\nrich\n");
    }

    #[test]
    fn no_script_block() {
        assert_eq!(read("# just a comment\nprint()\n").unwrap(), None);
    }

    #[test]
    fn escapes_are_unsupported() {
        let source = "# /// script\n# dependencies = [\"a\\\"b\"]\n# ///\n";
        assert!(matches!(
            read(source).unwrap_err(),
            BlockError::Unsupported { line: 2, .. }
        ));
    }

    #[test]
    fn non_string_items_are_unsupported() {
        let source = "# /// script\n# dependencies = [1, 2]\n# ///\n";
        assert!(read(source).is_err());
    }

    #[test]
    fn unclosed_array_is_unsupported() {
        let source = "# /// script\n# dependencies = [\n#   \"rich\",\n# ///\n";
        assert!(matches!(
            read(source).unwrap_err(),
            BlockError::Unsupported { line: 2, .. }
        ));
    }

    #[test]
    fn unterminated_block_is_an_error() {
        let source = "# /// script\n# dependencies = [\"rich\"]\nimport rich\n";
        assert!(matches!(
            read(source).unwrap_err(),
            BlockError::Unterminated { line: 1, .. }
        ));
    }

    #[test]
    fn duplicate_script_blocks_are_an_error() {
        let source = "# /// script\n# ///\n# /// script\n# ///\n";
        assert!(matches!(
            read(source).unwrap_err(),
            BlockError::Duplicate { line: 3, .. }
        ));
    }
}
