/// The leading comment region of a script.
///
/// Holds every line up to (not including) the first line that is neither
/// blank nor a `#` comment. Lines are stored trimmed on both ends so that
/// marker comparisons are exact and CRLF files behave like LF files. Blank
/// lines are kept as empty strings, so the index of a line plus one is its
/// line number in the original file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScriptHeader {
    lines: Vec<String>,
}

impl ScriptHeader {
    pub fn from_source(source: &str) -> Self {
        let mut lines = Vec::new();
        for line in source.lines() {
            let trimmed = line.trim();
            if !trimmed.is_empty() && !trimmed.starts_with('#') {
                break;
            }
            lines.push(trimmed.to_owned());
        }
        Self { lines }
    }

    /// Raw header lines, comment markers included.
    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Header lines with their comment prefix removed, as shown in verbose output.
    pub fn contents(&self) -> impl Iterator<Item = &str> {
        self.lines.iter().map(|l| comment_content(l))
    }
}

/// Strip the comment prefix from a header line.
///
/// `# text` yields `text`, a bare `#` yields an empty line, `#text` yields
/// `text`, and a blank line stays empty.
pub(crate) fn comment_content(raw: &str) -> &str {
    raw.strip_prefix("# ")
        .or_else(|| raw.strip_prefix('#'))
        .unwrap_or(raw)
}
