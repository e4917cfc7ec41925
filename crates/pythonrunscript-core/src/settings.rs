use pythonrunscript_store::{default_trash_root, StoreLayout};
use serde::Serialize;
use std::path::PathBuf;

pub const DEFAULT_PYTHON: &str = "python3";
pub const DEFAULT_CONDA: &str = "conda";

/// Resolved configuration. Nothing below the CLI reads ambient paths or
/// environment variables; everything arrives through here.
#[derive(Debug, Clone, Serialize)]
pub struct Settings {
    pub cache_root: PathBuf,
    pub trash_root: PathBuf,
    /// Base interpreter for creating venvs and running dependency-free scripts.
    pub python: String,
    pub conda: String,
}

impl Settings {
    pub fn new(cache_root: impl Into<PathBuf>) -> Self {
        Self {
            cache_root: cache_root.into(),
            trash_root: default_trash_root(),
            python: DEFAULT_PYTHON.to_owned(),
            conda: DEFAULT_CONDA.to_owned(),
        }
    }

    #[must_use]
    pub fn with_trash_root(mut self, trash_root: impl Into<PathBuf>) -> Self {
        self.trash_root = trash_root.into();
        self
    }

    #[must_use]
    pub fn with_python(mut self, python: impl Into<String>) -> Self {
        self.python = python.into();
        self
    }

    #[must_use]
    pub fn with_conda(mut self, conda: impl Into<String>) -> Self {
        self.conda = conda.into();
        self
    }

    pub fn layout(&self) -> StoreLayout {
        StoreLayout::new(&self.cache_root, &self.trash_root)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_and_overrides() {
        let s = Settings::new("/c");
        assert_eq!(s.python, "python3");
        assert_eq!(s.conda, "conda");

        let s = s.with_trash_root("/t").with_python("python3.12").with_conda("mamba");
        let layout = s.layout();
        assert_eq!(layout.cache_root(), std::path::Path::new("/c"));
        assert_eq!(layout.trash_root(), std::path::Path::new("/t"));
        assert_eq!(s.python, "python3.12");
        assert_eq!(s.conda, "mamba");
    }
}
