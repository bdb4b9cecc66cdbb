//! Sync orchestration.
//!
//! Wires the pipeline: build both inventories (concurrently — they have no
//! data dependency), diff, execute, summarize. This is the only place that
//! sees both locations at once. Construction and configuration errors are
//! fatal; per-op failures never are — the summary reports them.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::diff::{self, OpKind};
use crate::executor::{self, OpStatus, SyncResult};
use crate::inventory;
use crate::location::Location;
use crate::utils::{Result, SyncError};

/// Per-run options.
#[derive(Debug, Clone, Default)]
pub struct SyncOptions {
    /// Ordered exclude patterns, `!` negates.
    pub exclude: Vec<String>,

    /// Diff and report without touching the target.
    pub dry_run: bool,
}

/// Aggregate outcome of one run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SyncSummary {
    pub created: usize,
    pub updated: usize,
    pub removed: usize,
    pub mode_changed: usize,
    pub failed: usize,
    pub skipped: usize,
    /// Ordered per-op results, for diagnostics.
    pub results: Vec<SyncResult>,
}

impl SyncSummary {
    fn from_results(results: Vec<SyncResult>) -> Self {
        let mut summary = SyncSummary {
            results,
            ..Default::default()
        };

        for result in &summary.results {
            match &result.status {
                OpStatus::Applied => match result.kind {
                    OpKind::CreateFile | OpKind::CreateDir => summary.created += 1,
                    OpKind::UpdateFile => summary.updated += 1,
                    OpKind::RemoveFile | OpKind::RemoveDir => summary.removed += 1,
                    OpKind::UpdateMode => summary.mode_changed += 1,
                },
                OpStatus::Failed(_) => summary.failed += 1,
                OpStatus::Skipped(_) => summary.skipped += 1,
            }
        }

        summary
    }

    /// Whether the target already matched the source.
    pub fn is_noop(&self) -> bool {
        self.results.is_empty()
    }
}

fn join_err(e: tokio::task::JoinError) -> SyncError {
    SyncError::Io(std::io::Error::other(e))
}

/// Run one synchronization pass from source to target.
pub async fn synchronize(
    source: Arc<dyn Location>,
    target: Arc<dyn Location>,
    options: SyncOptions,
) -> Result<SyncSummary> {
    let started = std::time::Instant::now();

    // The two inventory builds are independent; walk them in parallel on
    // blocking tasks, as tree walks and hashing are filesystem-bound.
    let src_loc = Arc::clone(&source);
    let src_patterns = options.exclude.clone();
    let src_task =
        tokio::task::spawn_blocking(move || inventory::build(src_loc.as_ref(), &src_patterns));

    let tgt_loc = Arc::clone(&target);
    let tgt_patterns = options.exclude.clone();
    let tgt_task =
        tokio::task::spawn_blocking(move || inventory::build(tgt_loc.as_ref(), &tgt_patterns));

    let (src_inventory, tgt_inventory) = tokio::try_join!(src_task, tgt_task).map_err(join_err)?;
    let (src_inventory, tgt_inventory) = (src_inventory?, tgt_inventory?);

    info!(
        "Inventories built: {} source entries, {} target entries",
        src_inventory.len(),
        tgt_inventory.len()
    );

    // Diff reads source file content, so it runs blocking too.
    let diff_source = Arc::clone(&source);
    let diff_out = tokio::task::spawn_blocking(move || {
        diff::diff(diff_source.as_ref(), &src_inventory, &tgt_inventory)
    })
    .await
    .map_err(join_err)?;

    info!("Change set: {} ops", diff_out.changes.len());

    let mut results = diff_out.unreadable;

    if options.dry_run {
        info!("Dry run, not applying {} ops", diff_out.changes.len());
        results.extend(diff_out.changes.into_iter().map(|op| SyncResult {
            kind: op.kind(),
            path: op.path().to_string(),
            status: OpStatus::Skipped("dry run".to_string()),
        }));
    } else {
        let changes = diff_out.changes;
        let exec_results =
            tokio::task::spawn_blocking(move || executor::execute(target.as_ref(), changes))
                .await
                .map_err(join_err)?;
        results.extend(exec_results);
    }

    let summary = SyncSummary::from_results(results);

    info!(
        "Sync finished in {:?}: {} created, {} updated, {} removed, {} mode changed, {} failed, {} skipped",
        started.elapsed(),
        summary.created,
        summary.updated,
        summary.removed,
        summary.mode_changed,
        summary.failed,
        summary.skipped
    );

    Ok(summary)
}
