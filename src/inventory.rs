//! Inventory model — a snapshot of one location's tree.
//!
//! An inventory maps root-relative POSIX paths to file metadata. Entries are
//! kept in a sorted map so two walks of the same backend state produce an
//! identical inventory.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::filter::ExcludeFilter;
use crate::location::Location;
use crate::utils::Result;

/// Kind of a tree entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EntryKind {
    File,
    Directory,
}

/// One file or directory under a location root.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileEntry {
    /// Root-relative path, `/`-separated, unique key within an inventory.
    pub path: String,

    pub kind: EntryKind,

    /// CRC32 content digest. Directories never carry a hash.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hash: Option<String>,

    /// POSIX permission bits (0–0o777), None when the backend cannot report.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mode: Option<u32>,
}

impl FileEntry {
    pub fn file(path: impl Into<String>, hash: impl Into<String>, mode: Option<u32>) -> Self {
        Self {
            path: path.into(),
            kind: EntryKind::File,
            hash: Some(hash.into()),
            mode,
        }
    }

    pub fn directory(path: impl Into<String>, mode: Option<u32>) -> Self {
        Self {
            path: path.into(),
            kind: EntryKind::Directory,
            hash: None,
            mode,
        }
    }

    pub fn is_dir(&self) -> bool {
        self.kind == EntryKind::Directory
    }
}

/// Snapshot of one location's tree at one point in time.
#[derive(Debug, Clone, Default)]
pub struct Inventory {
    entries: BTreeMap<String, FileEntry>,
}

impl Inventory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an entry, replacing any previous entry at the same path.
    pub fn insert(&mut self, entry: FileEntry) {
        self.entries.insert(entry.path.clone(), entry);
    }

    pub fn get(&self, path: &str) -> Option<&FileEntry> {
        self.entries.get(path)
    }

    pub fn contains(&self, path: &str) -> bool {
        self.entries.contains_key(path)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// All entries in path order.
    pub fn entries(&self) -> impl Iterator<Item = &FileEntry> {
        self.entries.values()
    }

    /// File entries in path order.
    pub fn files(&self) -> impl Iterator<Item = &FileEntry> {
        self.entries.values().filter(|e| e.kind == EntryKind::File)
    }

    /// Directory entries in path order.
    pub fn directories(&self) -> impl Iterator<Item = &FileEntry> {
        self.entries
            .values()
            .filter(|e| e.kind == EntryKind::Directory)
    }

    /// Add synthetic Directory entries for every ancestor of every entry.
    ///
    /// Some backends enumerate only files; this keeps the model uniform so
    /// the differ can order directory creation regardless of enumeration
    /// behavior. Synthetic entries carry no mode.
    pub fn infer_directories(&mut self) {
        let mut missing = Vec::new();

        for path in self.entries.keys() {
            let mut current = path.as_str();
            while let Some(dir) = parent(current) {
                if !self.entries.contains_key(dir) {
                    missing.push(dir.to_string());
                }
                current = dir;
            }
        }

        for dir in missing {
            debug!("Inferred directory entry: {}", dir);
            self.entries
                .entry(dir.clone())
                .or_insert_with(|| FileEntry::directory(dir, None));
        }
    }
}

/// Parent of a root-relative path, None at the root level.
pub fn parent(path: &str) -> Option<&str> {
    path.rsplit_once('/').map(|(dir, _)| dir)
}

/// Nesting depth of a root-relative path ("a" = 0, "a/b" = 1, ...).
pub fn depth(path: &str) -> usize {
    path.matches('/').count()
}

/// Whether `path` is strictly nested under directory `dir`.
pub fn is_under(path: &str, dir: &str) -> bool {
    path.len() > dir.len() + 1 && path.starts_with(dir) && path.as_bytes()[dir.len()] == b'/'
}

/// Build an inventory from a location, honoring exclude patterns.
///
/// Compiles the patterns, walks the tree once, then derives any directory
/// entries the backend did not enumerate.
pub fn build(location: &dyn Location, exclude_patterns: &[String]) -> Result<Inventory> {
    let filter = ExcludeFilter::new(exclude_patterns)?;
    let mut inventory = location.list_tree(&filter)?;
    inventory.infer_directories();

    debug!(
        "Built inventory: {} entries ({} files)",
        inventory.len(),
        inventory.files().count()
    );

    Ok(inventory)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parent_and_depth() {
        assert_eq!(parent("a/b/c.txt"), Some("a/b"));
        assert_eq!(parent("a"), None);
        assert_eq!(depth("a"), 0);
        assert_eq!(depth("a/b/c.txt"), 2);
    }

    #[test]
    fn test_is_under() {
        assert!(is_under("a/b/c.txt", "a"));
        assert!(is_under("a/b/c.txt", "a/b"));
        assert!(!is_under("a/b/c.txt", "a/b/c.txt"));
        assert!(!is_under("ab/c.txt", "a"));
        assert!(!is_under("a", "a/b"));
    }

    #[test]
    fn test_infer_directories() {
        let mut inv = Inventory::new();
        inv.insert(FileEntry::file("a/b/f.txt", "00000000", Some(0o644)));
        inv.infer_directories();

        assert!(inv.get("a").is_some_and(FileEntry::is_dir));
        assert!(inv.get("a/b").is_some_and(FileEntry::is_dir));
        assert_eq!(inv.len(), 3);
    }

    #[test]
    fn test_infer_does_not_replace_real_entries() {
        let mut inv = Inventory::new();
        inv.insert(FileEntry::directory("a", Some(0o755)));
        inv.insert(FileEntry::file("a/f.txt", "00000000", None));
        inv.infer_directories();

        assert_eq!(inv.get("a").unwrap().mode, Some(0o755));
    }

    #[test]
    fn test_entries_are_sorted() {
        let mut inv = Inventory::new();
        inv.insert(FileEntry::file("b.txt", "0", None));
        inv.insert(FileEntry::file("a.txt", "0", None));

        let paths: Vec<&str> = inv.entries().map(|e| e.path.as_str()).collect();
        assert_eq!(paths, vec!["a.txt", "b.txt"]);
    }
}
