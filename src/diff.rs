//! Inventory diffing.
//!
//! Compares a source inventory against a target inventory and produces the
//! ordered change set that makes the target match the source. Order is a
//! correctness invariant: parent directories are created before children,
//! files are removed before the directories that held them, and directories
//! are removed children-first.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::executor::{OpStatus, SyncResult};
use crate::inventory::{depth, is_under, Inventory};
use crate::location::Location;

/// A single reconciliation action. Produced by the differ, consumed exactly
/// once by the executor.
#[derive(Debug, Clone, PartialEq)]
pub enum ChangeOp {
    CreateDir {
        path: String,
        mode: Option<u32>,
    },
    RemoveDir {
        path: String,
    },
    CreateFile {
        path: String,
        content: Vec<u8>,
        mode: Option<u32>,
    },
    UpdateFile {
        path: String,
        content: Vec<u8>,
        mode: Option<u32>,
    },
    UpdateMode {
        path: String,
        mode: u32,
    },
    RemoveFile {
        path: String,
    },
}

impl ChangeOp {
    pub fn path(&self) -> &str {
        match self {
            ChangeOp::CreateDir { path, .. }
            | ChangeOp::RemoveDir { path }
            | ChangeOp::CreateFile { path, .. }
            | ChangeOp::UpdateFile { path, .. }
            | ChangeOp::UpdateMode { path, .. }
            | ChangeOp::RemoveFile { path } => path,
        }
    }

    pub fn kind(&self) -> OpKind {
        match self {
            ChangeOp::CreateDir { .. } => OpKind::CreateDir,
            ChangeOp::RemoveDir { .. } => OpKind::RemoveDir,
            ChangeOp::CreateFile { .. } => OpKind::CreateFile,
            ChangeOp::UpdateFile { .. } => OpKind::UpdateFile,
            ChangeOp::UpdateMode { .. } => OpKind::UpdateMode,
            ChangeOp::RemoveFile { .. } => OpKind::RemoveFile,
        }
    }
}

/// Discriminant of a change op, used in results and summaries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OpKind {
    CreateDir,
    RemoveDir,
    CreateFile,
    UpdateFile,
    UpdateMode,
    RemoveFile,
}

/// Ordered sequence of change ops.
pub type ChangeSet = Vec<ChangeOp>;

/// Differ output: the change set plus pre-failed results for source files
/// that could not be read while assembling it. The run still completes; the
/// failures surface in the summary.
#[derive(Debug, Default)]
pub struct DiffOutput {
    pub changes: ChangeSet,
    pub unreadable: Vec<SyncResult>,
}

impl DiffOutput {
    pub fn is_empty(&self) -> bool {
        self.changes.is_empty() && self.unreadable.is_empty()
    }
}

/// Compare two inventories and emit the ordered change set.
///
/// The source location is consulted for file content; hashes and modes come
/// from the inventories. Mode-only changes are emitted only when both sides
/// report a mode.
pub fn diff(source: &dyn Location, src: &Inventory, tgt: &Inventory) -> DiffOutput {
    let mut prelude: ChangeSet = Vec::new();
    let mut create_dirs: Vec<(usize, String, Option<u32>)> = Vec::new();
    let mut file_ops: ChangeSet = Vec::new();
    let mut remove_files: ChangeSet = Vec::new();
    let mut remove_dirs: Vec<(usize, String)> = Vec::new();
    let mut unreadable: Vec<SyncResult> = Vec::new();

    // Target paths consumed by the type-conflict prelude; their remove-phase
    // counterparts (and anything nested under a removed subtree) are
    // suppressed.
    let mut consumed: BTreeSet<String> = BTreeSet::new();
    let mut removed_subtrees: Vec<String> = Vec::new();
    // Conflicted target subtrees whose replacement content could not be
    // read. Nothing under them may be removed: no replacement is in hand.
    let mut preserved_subtrees: Vec<String> = Vec::new();

    // Directories present in source.
    for entry in src.directories() {
        match tgt.get(&entry.path) {
            None => {
                create_dirs.push((depth(&entry.path), entry.path.clone(), entry.mode));
            }
            Some(existing) if !existing.is_dir() => {
                // A file occupies the path the directory needs. Clear it
                // before the create-dir phase runs.
                warn!("Type conflict at {}: file in target, directory in source", entry.path);
                prelude.push(ChangeOp::RemoveFile {
                    path: entry.path.clone(),
                });
                consumed.insert(entry.path.clone());
                create_dirs.push((depth(&entry.path), entry.path.clone(), entry.mode));
            }
            Some(_) => {}
        }
    }

    // Files present in source.
    for entry in src.files() {
        let target_entry = tgt.get(&entry.path);

        // Reverse conflict: a directory occupies the path the file needs.
        let dir_conflict = target_entry.is_some_and(|t| t.is_dir());

        let op = match target_entry {
            Some(existing) if !dir_conflict => {
                if existing.hash == entry.hash {
                    match (entry.mode, existing.mode) {
                        (Some(want), Some(have)) if want != have => {
                            file_ops.push(ChangeOp::UpdateMode {
                                path: entry.path.clone(),
                                mode: want,
                            });
                        }
                        _ => {}
                    }
                    continue;
                }
                OpKind::UpdateFile
            }
            _ => OpKind::CreateFile,
        };

        let content = match source.read(&entry.path) {
            Ok(content) => content,
            Err(e) => {
                warn!("Source file unreadable, not synced: {} ({})", entry.path, e);
                if dir_conflict {
                    // The target directory stays put, contents included.
                    preserved_subtrees.push(entry.path.clone());
                }
                unreadable.push(SyncResult {
                    kind: op,
                    path: entry.path.clone(),
                    status: OpStatus::Failed(format!("source read failed: {}", e)),
                });
                continue;
            }
        };

        if dir_conflict {
            warn!("Type conflict at {}: directory in target, file in source", entry.path);
            prelude.push(ChangeOp::RemoveDir {
                path: entry.path.clone(),
            });
            consumed.insert(entry.path.clone());
            removed_subtrees.push(entry.path.clone());
        }

        file_ops.push(match op {
            OpKind::UpdateFile => ChangeOp::UpdateFile {
                path: entry.path.clone(),
                content,
                mode: entry.mode,
            },
            _ => ChangeOp::CreateFile {
                path: entry.path.clone(),
                content,
                mode: entry.mode,
            },
        });
    }

    // Files present only in target.
    for entry in tgt.files() {
        if src.contains(&entry.path) || consumed.contains(&entry.path) {
            continue;
        }
        if removed_subtrees.iter().any(|d| is_under(&entry.path, d))
            || preserved_subtrees.iter().any(|d| is_under(&entry.path, d))
        {
            continue;
        }
        remove_files.push(ChangeOp::RemoveFile {
            path: entry.path.clone(),
        });
    }

    // Directories present only in target.
    for entry in tgt.directories() {
        if src.contains(&entry.path) || consumed.contains(&entry.path) {
            continue;
        }
        if removed_subtrees.iter().any(|d| is_under(&entry.path, d))
            || preserved_subtrees.iter().any(|d| is_under(&entry.path, d))
        {
            continue;
        }
        remove_dirs.push((depth(&entry.path), entry.path.clone()));
    }

    // Parents before children on create, children before parents on remove.
    create_dirs.sort_by(|a, b| a.0.cmp(&b.0).then_with(|| a.1.cmp(&b.1)));
    remove_dirs.sort_by(|a, b| b.0.cmp(&a.0).then_with(|| a.1.cmp(&b.1)));

    let mut changes = prelude;
    changes.extend(
        create_dirs
            .into_iter()
            .map(|(_, path, mode)| ChangeOp::CreateDir { path, mode }),
    );
    changes.extend(file_ops);
    changes.extend(remove_files);
    changes.extend(
        remove_dirs
            .into_iter()
            .map(|(_, path)| ChangeOp::RemoveDir { path }),
    );

    debug!(
        "Diff produced {} ops ({} source files unreadable)",
        changes.len(),
        unreadable.len()
    );

    DiffOutput { changes, unreadable }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::location::MemoryLocation;

    fn inventory_of(loc: &MemoryLocation) -> Inventory {
        crate::inventory::build(loc, &[]).unwrap()
    }

    #[test]
    fn test_create_into_empty_target() {
        let source = MemoryLocation::new();
        source.put_file("a/f.txt", b"hello", Some(0o644));

        let src = inventory_of(&source);
        let tgt = Inventory::new();
        let out = diff(&source, &src, &tgt);

        assert_eq!(out.changes.len(), 2);
        assert!(matches!(&out.changes[0], ChangeOp::CreateDir { path, .. } if path == "a"));
        assert!(matches!(
            &out.changes[1],
            ChangeOp::CreateFile { path, content, mode }
                if path == "a/f.txt" && content == b"hello" && *mode == Some(0o644)
        ));
        assert!(out.unreadable.is_empty());
    }

    #[test]
    fn test_update_on_hash_mismatch() {
        let source = MemoryLocation::new();
        source.put_file("f.txt", b"new", Some(0o644));
        let target = MemoryLocation::new();
        target.put_file("f.txt", b"old", Some(0o644));

        let out = diff(&source, &inventory_of(&source), &inventory_of(&target));

        assert_eq!(out.changes.len(), 1);
        assert!(matches!(
            &out.changes[0],
            ChangeOp::UpdateFile { path, content, .. } if path == "f.txt" && content == b"new"
        ));
    }

    #[test]
    fn test_remove_target_only_file() {
        let source = MemoryLocation::new();
        let target = MemoryLocation::new();
        target.put_file("old.txt", b"stale", None);

        let out = diff(&source, &inventory_of(&source), &inventory_of(&target));

        let kinds: Vec<OpKind> = out.changes.iter().map(ChangeOp::kind).collect();
        assert_eq!(kinds, vec![OpKind::RemoveFile]);
        assert_eq!(out.changes[0].path(), "old.txt");
    }

    #[test]
    fn test_same_hash_same_mode_is_no_op() {
        let source = MemoryLocation::new();
        source.put_file("f.txt", b"same", Some(0o644));
        let target = MemoryLocation::new();
        target.put_file("f.txt", b"same", Some(0o644));

        let out = diff(&source, &inventory_of(&source), &inventory_of(&target));
        assert!(out.is_empty());
    }

    #[test]
    fn test_mode_only_change() {
        let source = MemoryLocation::new();
        source.put_file("f.txt", b"same", Some(0o600));
        let target = MemoryLocation::new();
        target.put_file("f.txt", b"same", Some(0o644));

        let out = diff(&source, &inventory_of(&source), &inventory_of(&target));

        assert_eq!(out.changes.len(), 1);
        assert!(matches!(
            &out.changes[0],
            ChangeOp::UpdateMode { path, mode } if path == "f.txt" && *mode == 0o600
        ));
    }

    #[test]
    fn test_unknown_mode_never_produces_update_mode() {
        let source = MemoryLocation::new();
        source.put_file("f.txt", b"same", Some(0o600));
        let target = MemoryLocation::new();
        target.put_file("f.txt", b"same", None);

        let out = diff(&source, &inventory_of(&source), &inventory_of(&target));
        assert!(out.is_empty());
    }

    #[test]
    fn test_create_dirs_parents_first_removes_children_first() {
        let source = MemoryLocation::new();
        source.put_file("a/b/c/f.txt", b"x", None);
        let target = MemoryLocation::new();
        target.put_file("x/y/z/g.txt", b"y", None);

        let out = diff(&source, &inventory_of(&source), &inventory_of(&target));

        let creates: Vec<&str> = out
            .changes
            .iter()
            .filter(|op| op.kind() == OpKind::CreateDir)
            .map(ChangeOp::path)
            .collect();
        assert_eq!(creates, vec!["a", "a/b", "a/b/c"]);

        let removes: Vec<&str> = out
            .changes
            .iter()
            .filter(|op| op.kind() == OpKind::RemoveDir)
            .map(ChangeOp::path)
            .collect();
        assert_eq!(removes, vec!["x/y/z", "x/y", "x"]);
    }

    #[test]
    fn test_file_in_target_directory_in_source() {
        let source = MemoryLocation::new();
        source.put_file("a/f.txt", b"x", None);
        let target = MemoryLocation::new();
        target.put_file("a", b"i am a file", None);

        let out = diff(&source, &inventory_of(&source), &inventory_of(&target));

        // Leading RemoveFile clears the path before the CreateDir phase.
        assert!(matches!(&out.changes[0], ChangeOp::RemoveFile { path } if path == "a"));
        assert!(matches!(&out.changes[1], ChangeOp::CreateDir { path, .. } if path == "a"));
        let remove_count = out
            .changes
            .iter()
            .filter(|op| op.path() == "a" && op.kind() == OpKind::RemoveFile)
            .count();
        assert_eq!(remove_count, 1);
    }

    #[test]
    fn test_directory_in_target_file_in_source() {
        let source = MemoryLocation::new();
        source.put_file("a", b"i am a file now", None);
        let target = MemoryLocation::new();
        target.put_file("a/old.txt", b"buried", None);

        let out = diff(&source, &inventory_of(&source), &inventory_of(&target));

        // Leading RemoveDir clears the subtree, then the file is created.
        // Nothing else references the removed subtree.
        assert!(matches!(&out.changes[0], ChangeOp::RemoveDir { path } if path == "a"));
        assert!(out
            .changes
            .iter()
            .any(|op| op.kind() == OpKind::CreateFile && op.path() == "a"));
        assert!(!out.changes.iter().any(|op| op.path() == "a/old.txt"));
    }

    #[test]
    fn test_unreadable_conflict_source_preserves_target_subtree() {
        // A directory in the target is due to be replaced by a file, but the
        // replacement content cannot be read. The target subtree must stay
        // untouched: no remove may run without the replacement in hand.
        let source = MemoryLocation::new();
        let mut src = Inventory::new();
        src.insert(crate::inventory::FileEntry::file("a", "deadbeef", None));

        let target = MemoryLocation::new();
        target.put_file("a/old.txt", b"buried", None);
        target.put_dir("a/b", None);
        let tgt = inventory_of(&target);

        let out = diff(&source, &src, &tgt);

        assert!(out.changes.is_empty());
        assert_eq!(out.unreadable.len(), 1);
        assert_eq!(out.unreadable[0].path, "a");
        assert!(matches!(out.unreadable[0].status, OpStatus::Failed(_)));
    }

    #[test]
    fn test_unreadable_source_is_reported_not_fatal() {
        let source = MemoryLocation::new();
        source.put_file("ok.txt", b"fine", None);

        let mut src = inventory_of(&source);
        // Inventory lists a file the backend can no longer read.
        src.insert(crate::inventory::FileEntry::file(
            "ghost.txt",
            "deadbeef",
            None,
        ));
        let tgt = Inventory::new();

        let out = diff(&source, &src, &tgt);

        assert_eq!(out.unreadable.len(), 1);
        assert_eq!(out.unreadable[0].path, "ghost.txt");
        assert!(matches!(out.unreadable[0].status, OpStatus::Failed(_)));
        assert!(out
            .changes
            .iter()
            .any(|op| op.kind() == OpKind::CreateFile && op.path() == "ok.txt"));
        assert!(!out.changes.iter().any(|op| op.path() == "ghost.txt"));
    }

    #[test]
    fn test_unhashed_source_entry_forces_update_attempt() {
        // A file listed without a hash (it was unreadable at walk time) never
        // ties with the target copy; the differ re-reads it and either ships
        // fresh content or records the failure.
        let source = MemoryLocation::new();
        source.put_file("f.txt", b"recovered", None);

        let mut src = Inventory::new();
        src.insert(crate::inventory::FileEntry {
            path: "f.txt".to_string(),
            kind: crate::inventory::EntryKind::File,
            hash: None,
            mode: None,
        });
        let target = MemoryLocation::new();
        target.put_file("f.txt", b"recovered", None);
        let tgt = inventory_of(&target);

        let out = diff(&source, &src, &tgt);

        assert_eq!(out.changes.len(), 1);
        assert!(matches!(
            &out.changes[0],
            ChangeOp::UpdateFile { path, content, .. }
                if path == "f.txt" && content == b"recovered"
        ));
    }

    #[test]
    fn test_phase_order_is_structural() {
        let source = MemoryLocation::new();
        source.put_file("new/f.txt", b"x", None);
        source.put_file("shared.txt", b"updated", None);
        let target = MemoryLocation::new();
        target.put_file("shared.txt", b"old", None);
        target.put_file("gone/g.txt", b"y", None);

        let out = diff(&source, &inventory_of(&source), &inventory_of(&target));

        let kinds: Vec<OpKind> = out.changes.iter().map(ChangeOp::kind).collect();
        assert_eq!(
            kinds,
            vec![
                OpKind::CreateDir,
                OpKind::CreateFile,
                OpKind::UpdateFile,
                OpKind::RemoveFile,
                OpKind::RemoveDir,
            ]
        );
    }
}
