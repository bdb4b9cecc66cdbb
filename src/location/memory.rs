//! In-memory location.
//!
//! Backs tests and stands in for remote stores that enumerate files without
//! explicit directory entries. Supports fault injection: paths on the deny
//! list fail every mutating operation, which is how executor failure paths
//! are exercised.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Mutex;

use crate::filter::ExcludeFilter;
use crate::hash;
use crate::inventory::{self, EntryKind, FileEntry, Inventory};
use crate::location::Location;
use crate::utils::{Result, SyncError};

#[derive(Debug, Clone)]
struct Node {
    kind: EntryKind,
    content: Vec<u8>,
    mode: Option<u32>,
}

#[derive(Default)]
pub struct MemoryLocation {
    nodes: Mutex<BTreeMap<String, Node>>,
    deny: Mutex<BTreeSet<String>>,
}

impl MemoryLocation {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a file, creating implicit parent directories.
    pub fn put_file(&self, path: &str, content: &[u8], mode: Option<u32>) {
        let mut nodes = self.nodes.lock().unwrap();
        Self::ensure_parents(&mut nodes, path);
        nodes.insert(
            path.to_string(),
            Node {
                kind: EntryKind::File,
                content: content.to_vec(),
                mode,
            },
        );
    }

    /// Seed an empty directory.
    pub fn put_dir(&self, path: &str, mode: Option<u32>) {
        let mut nodes = self.nodes.lock().unwrap();
        Self::ensure_parents(&mut nodes, path);
        nodes.insert(
            path.to_string(),
            Node {
                kind: EntryKind::Directory,
                content: Vec::new(),
                mode,
            },
        );
    }

    /// Make every mutating operation on `path` fail.
    pub fn deny(&self, path: &str) {
        self.deny.lock().unwrap().insert(path.to_string());
    }

    /// Whether a path currently exists.
    pub fn exists(&self, path: &str) -> bool {
        self.nodes.lock().unwrap().contains_key(path)
    }

    fn ensure_parents(nodes: &mut BTreeMap<String, Node>, path: &str) {
        let mut current = path;
        while let Some(dir) = inventory::parent(current) {
            nodes.entry(dir.to_string()).or_insert(Node {
                kind: EntryKind::Directory,
                content: Vec::new(),
                mode: None,
            });
            current = dir;
        }
    }

    fn check_deny(&self, path: &str) -> Result<()> {
        if self.deny.lock().unwrap().contains(path) {
            return Err(SyncError::Io(std::io::Error::other(format!(
                "backend rejected operation on \"{}\"",
                path
            ))));
        }
        Ok(())
    }
}

impl Location for MemoryLocation {
    fn read(&self, path: &str) -> Result<Vec<u8>> {
        let nodes = self.nodes.lock().unwrap();
        match nodes.get(path) {
            Some(node) if node.kind == EntryKind::File => Ok(node.content.clone()),
            _ => Err(SyncError::NotFound(path.to_string())),
        }
    }

    fn write(&self, path: &str, content: &[u8], mode: Option<u32>) -> Result<()> {
        self.check_deny(path)?;
        self.put_file(path, content, mode);
        Ok(())
    }

    fn set_mode(&self, path: &str, mode: u32) -> Result<()> {
        self.check_deny(path)?;
        let mut nodes = self.nodes.lock().unwrap();
        match nodes.get_mut(path) {
            Some(node) => {
                node.mode = Some(mode);
                Ok(())
            }
            None => Err(SyncError::NotFound(path.to_string())),
        }
    }

    fn remove(&self, path: &str) -> Result<()> {
        self.check_deny(path)?;
        self.nodes.lock().unwrap().remove(path);
        Ok(())
    }

    fn create_dir(&self, path: &str, mode: Option<u32>) -> Result<()> {
        self.check_deny(path)?;
        let mut nodes = self.nodes.lock().unwrap();

        // Refuse to create a directory over an existing file.
        if nodes
            .get(path)
            .is_some_and(|node| node.kind == EntryKind::File)
        {
            return Err(SyncError::Io(std::io::Error::other(format!(
                "a file already occupies \"{}\"",
                path
            ))));
        }

        Self::ensure_parents(&mut nodes, path);
        nodes.insert(
            path.to_string(),
            Node {
                kind: EntryKind::Directory,
                content: Vec::new(),
                mode,
            },
        );
        Ok(())
    }

    fn remove_dir(&self, path: &str) -> Result<()> {
        self.check_deny(path)?;
        let mut nodes = self.nodes.lock().unwrap();
        nodes.remove(path);
        nodes.retain(|other, _| !inventory::is_under(other, path));
        Ok(())
    }

    fn list_tree(&self, filter: &ExcludeFilter) -> Result<Inventory> {
        let nodes = self.nodes.lock().unwrap();
        let mut inv = Inventory::new();

        for (path, node) in nodes.iter() {
            match node.kind {
                EntryKind::Directory => {
                    inv.insert(FileEntry::directory(path.clone(), node.mode));
                }
                EntryKind::File => {
                    if filter.is_excluded(path) {
                        continue;
                    }
                    inv.insert(FileEntry::file(
                        path.clone(),
                        hash::hash_bytes(&node.content),
                        node.mode,
                    ));
                }
            }
        }

        Ok(inv)
    }

    fn stat_mode(&self, path: &str) -> Option<u32> {
        self.nodes.lock().unwrap().get(path)?.mode
    }

    fn stat_hash(&self, path: &str) -> Option<String> {
        let nodes = self.nodes.lock().unwrap();
        let node = nodes.get(path)?;
        (node.kind == EntryKind::File).then(|| hash::hash_bytes(&node.content))
    }
}
