//! Change set execution.
//!
//! Applies each op against the target location in the order the differ
//! produced. A failed op never halts the run; its error is recorded as data.
//! A failed directory creation poisons its subtree: every later op nested
//! under it is skipped rather than attempted, since its precondition cannot
//! hold.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::diff::{ChangeOp, ChangeSet, OpKind};
use crate::inventory::is_under;
use crate::location::{Location, DEFAULT_DIR_MODE};

/// Outcome of one change op.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "detail", rename_all = "snake_case")]
pub enum OpStatus {
    Applied,
    Failed(String),
    Skipped(String),
}

/// Per-op result. Never carries file content.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncResult {
    pub kind: OpKind,
    pub path: String,
    #[serde(flatten)]
    pub status: OpStatus,
}

/// Apply a change set in order, returning one result per op.
pub fn execute(target: &dyn Location, changes: ChangeSet) -> Vec<SyncResult> {
    let mut results = Vec::with_capacity(changes.len());
    // Directory creates that failed or were skipped; descendants of these
    // paths are skipped without being attempted.
    let mut poisoned_dirs: Vec<String> = Vec::new();

    for op in changes {
        let kind = op.kind();
        let path = op.path().to_string();

        if let Some(dir) = poisoned_dirs.iter().find(|d| is_under(&path, d)) {
            let detail = format!("dependent failure: directory \"{}\" was not created", dir);
            warn!("Skipping {}: {}", path, detail);
            if kind == OpKind::CreateDir {
                poisoned_dirs.push(path.clone());
            }
            results.push(SyncResult {
                kind,
                path,
                status: OpStatus::Skipped(detail),
            });
            continue;
        }

        let outcome = match op {
            ChangeOp::CreateDir { ref path, mode } => {
                target.create_dir(path, Some(mode.unwrap_or(DEFAULT_DIR_MODE)))
            }
            ChangeOp::RemoveDir { ref path } => target.remove_dir(path),
            ChangeOp::CreateFile {
                ref path,
                ref content,
                mode,
            }
            | ChangeOp::UpdateFile {
                ref path,
                ref content,
                mode,
            } => target.write(path, content, mode),
            ChangeOp::UpdateMode { ref path, mode } => target.set_mode(path, mode),
            ChangeOp::RemoveFile { ref path } => target.remove(path),
        };

        let status = match outcome {
            Ok(()) => {
                debug!("Applied {:?} {}", kind, path);
                OpStatus::Applied
            }
            Err(e) => {
                warn!("Failed {:?} {}: {}", kind, path, e);
                if kind == OpKind::CreateDir {
                    poisoned_dirs.push(path.clone());
                }
                OpStatus::Failed(e.to_string())
            }
        };

        results.push(SyncResult { kind, path, status });
    }

    results
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::location::MemoryLocation;

    #[test]
    fn test_applies_ops_in_order() {
        let target = MemoryLocation::new();
        let changes = vec![
            ChangeOp::CreateDir {
                path: "a".to_string(),
                mode: Some(0o755),
            },
            ChangeOp::CreateFile {
                path: "a/f.txt".to_string(),
                content: b"hello".to_vec(),
                mode: Some(0o644),
            },
        ];

        let results = execute(&target, changes);

        assert!(results.iter().all(|r| r.status == OpStatus::Applied));
        assert_eq!(target.read("a/f.txt").unwrap(), b"hello");
        assert_eq!(target.stat_mode("a"), Some(0o755));
    }

    #[test]
    fn test_failed_op_does_not_halt_run() {
        let target = MemoryLocation::new();
        target.deny("locked.txt");

        let changes = vec![
            ChangeOp::CreateFile {
                path: "locked.txt".to_string(),
                content: b"x".to_vec(),
                mode: None,
            },
            ChangeOp::CreateFile {
                path: "fine.txt".to_string(),
                content: b"y".to_vec(),
                mode: None,
            },
        ];

        let results = execute(&target, changes);

        assert!(matches!(results[0].status, OpStatus::Failed(_)));
        assert_eq!(results[1].status, OpStatus::Applied);
        assert_eq!(target.read("fine.txt").unwrap(), b"y");
    }

    #[test]
    fn test_failed_create_dir_skips_nested_ops() {
        let target = MemoryLocation::new();
        target.deny("a");

        let changes = vec![
            ChangeOp::CreateDir {
                path: "a".to_string(),
                mode: None,
            },
            ChangeOp::CreateFile {
                path: "a/f.txt".to_string(),
                content: b"x".to_vec(),
                mode: None,
            },
            ChangeOp::CreateFile {
                path: "b.txt".to_string(),
                content: b"y".to_vec(),
                mode: None,
            },
        ];

        let results = execute(&target, changes);

        assert!(matches!(results[0].status, OpStatus::Failed(_)));
        assert!(matches!(results[1].status, OpStatus::Skipped(_)));
        assert!(!target.exists("a/f.txt"));
        // Independent ops still run.
        assert_eq!(results[2].status, OpStatus::Applied);
    }

    #[test]
    fn test_skip_propagates_through_nested_create_dir() {
        let target = MemoryLocation::new();
        target.deny("a");

        let changes = vec![
            ChangeOp::CreateDir {
                path: "a".to_string(),
                mode: None,
            },
            ChangeOp::CreateDir {
                path: "a/b".to_string(),
                mode: None,
            },
            ChangeOp::CreateFile {
                path: "a/b/f.txt".to_string(),
                content: b"x".to_vec(),
                mode: None,
            },
        ];

        let results = execute(&target, changes);

        assert!(matches!(results[0].status, OpStatus::Failed(_)));
        assert!(matches!(results[1].status, OpStatus::Skipped(_)));
        assert!(matches!(results[2].status, OpStatus::Skipped(_)));
    }

    #[test]
    fn test_default_dir_mode_applied_when_source_has_none() {
        let target = MemoryLocation::new();
        let changes = vec![ChangeOp::CreateDir {
            path: "d".to_string(),
            mode: None,
        }];

        execute(&target, changes);

        assert_eq!(target.stat_mode("d"), Some(DEFAULT_DIR_MODE));
    }
}
