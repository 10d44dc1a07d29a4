//! Source units loaded into a session.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use smol_str::SmolStr;
use tracing::{info, warn};

use crate::error::DebugError;

/// Canonical identity of a source file.
///
/// Falls back to an absolute, non-resolved path when the file does not exist.
#[must_use]
pub fn canonical_unit_path(path: &Path) -> SmolStr {
    let resolved = std::fs::canonicalize(path).unwrap_or_else(|_| {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            std::env::current_dir()
                .map(|cwd| cwd.join(path))
                .unwrap_or_else(|_| path.to_path_buf())
        }
    });
    resolved.to_string_lossy().as_ref().into()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceUnit {
    id: SmolStr,
    path: PathBuf,
    text: String,
    /// Byte offset of each line start.
    line_starts: Vec<usize>,
}

impl SourceUnit {
    #[must_use]
    pub fn new(id: impl Into<SmolStr>, path: PathBuf, text: String) -> Self {
        let line_starts = std::iter::once(0)
            .chain(text.match_indices('\n').map(|(idx, _)| idx + 1))
            .filter(|start| *start < text.len() || *start == 0)
            .collect();
        Self {
            id: id.into(),
            path,
            text,
            line_starts,
        }
    }

    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }

    #[must_use]
    pub fn line_count(&self) -> usize {
        if self.text.is_empty() {
            0
        } else {
            self.line_starts.len()
        }
    }

    /// Text of a 1-based line, without the line terminator.
    #[must_use]
    pub fn line(&self, line: u32) -> Option<&str> {
        let idx = usize::try_from(line).ok()?.checked_sub(1)?;
        if idx >= self.line_count() {
            return None;
        }
        let start = self.line_starts[idx];
        let end = self
            .line_starts
            .get(idx + 1)
            .map_or(self.text.len(), |next| next - 1);
        Some(self.text[start..end].trim_end_matches(['\r', '\n']))
    }
}

/// Loaded units keyed by canonical path.
#[derive(Debug, Clone, Default)]
pub struct SourceCatalog {
    units: BTreeMap<SmolStr, SourceUnit>,
}

impl SourceCatalog {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Read and register a file. Reloading replaces the previous text.
    pub fn load(&mut self, path: impl AsRef<Path>) -> Result<&SourceUnit, DebugError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| {
            warn!(path = %path.display(), error = %source, "source load failed");
            DebugError::SourceLoad {
                path: path.to_path_buf(),
                source,
            }
        })?;
        let id = canonical_unit_path(path);
        info!(unit = %id, "source unit loaded");
        let unit = SourceUnit::new(id.clone(), path.to_path_buf(), text);
        self.units.insert(id.clone(), unit);
        Ok(&self.units[&id])
    }

    /// Register in-memory text under an explicit id.
    pub fn insert(&mut self, unit: SourceUnit) -> &SourceUnit {
        let id = unit.id.clone();
        self.units.insert(id.clone(), unit);
        &self.units[&id]
    }

    pub fn unload(&mut self, unit: &str) -> Option<SourceUnit> {
        self.units.remove(unit)
    }

    #[must_use]
    pub fn get(&self, unit: &str) -> Option<&SourceUnit> {
        self.units.get(unit)
    }

    pub fn units(&self) -> impl Iterator<Item = &SourceUnit> {
        self.units.values()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.units.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch(name: &str, text: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("lantern-source-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join(name);
        std::fs::write(&path, text).unwrap();
        path
    }

    #[test]
    fn lines_are_one_based() {
        let unit = SourceUnit::new("a.ls", PathBuf::from("a.ls"), "let a = 1\r\nprint a\n".into());
        assert_eq!(unit.line_count(), 2);
        assert_eq!(unit.line(1), Some("let a = 1"));
        assert_eq!(unit.line(2), Some("print a"));
        assert_eq!(unit.line(0), None);
        assert_eq!(unit.line(3), None);
    }

    #[test]
    fn last_line_without_newline() {
        let unit = SourceUnit::new("b.ls", PathBuf::from("b.ls"), "a\nb".into());
        assert_eq!(unit.line_count(), 2);
        assert_eq!(unit.line(2), Some("b"));
    }

    #[test]
    fn load_canonicalizes_and_reports_missing_files() {
        let path = scratch("catalog.ls", "print 1\n");
        let mut catalog = SourceCatalog::new();
        let id = catalog.load(&path).unwrap().id().to_string();
        assert_eq!(id, canonical_unit_path(&path).as_str());
        assert!(catalog.get(&id).is_some());

        let missing = path.with_file_name("missing.ls");
        let err = catalog.load(&missing).unwrap_err();
        assert!(matches!(err, DebugError::SourceLoad { .. }));
        assert_eq!(catalog.len(), 1);

        assert!(catalog.unload(&id).is_some());
        assert!(catalog.is_empty());
    }
}
