//! Checkpointing: immutable snapshots of workflow state at significant
//! events, with bounded retention and rollback.
//!
//! Checkpoints are written one JSON file per snapshot under the
//! checkpoint root, named `<workflow_id>-<sequence>`. Pruning evicts the
//! oldest snapshots of a workflow once the count exceeds the configured
//! maximum. Rollback returns a snapshot without deleting anything, so
//! newer checkpoints stay inspectable history.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::errors::WorkflowError;
use crate::state::WorkflowState;
use crate::store::validate_workflow_id;

/// Why a checkpoint was taken.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckpointReason {
    PhaseStart,
    PhaseComplete,
    Error,
    Manual,
}

impl std::fmt::Display for CheckpointReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            CheckpointReason::PhaseStart => "phase_start",
            CheckpointReason::PhaseComplete => "phase_complete",
            CheckpointReason::Error => "error",
            CheckpointReason::Manual => "manual",
        };
        write!(f, "{s}")
    }
}

/// An immutable snapshot of a workflow at one boundary event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Checkpoint {
    pub checkpoint_id: String,
    pub workflow_id: String,
    pub sequence: u64,
    pub reason: CheckpointReason,
    pub created_at: DateTime<Utc>,
    /// Deep copy of the workflow state at snapshot time.
    pub state: WorkflowState,
}

/// Creates, lists, prunes and restores checkpoints.
pub struct CheckpointManager {
    root: PathBuf,
    max_checkpoints: usize,
    /// Next sequence number per workflow, lazily seeded from disk.
    next_seq: Mutex<HashMap<String, u64>>,
}

impl CheckpointManager {
    /// Open (and create if needed) a checkpoint root.
    pub fn new(root: impl AsRef<Path>, max_checkpoints: usize) -> Result<Self, WorkflowError> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root).map_err(|source| WorkflowError::RecordWriteFailed {
            path: root.clone(),
            source,
        })?;
        Ok(Self {
            root,
            max_checkpoints: max_checkpoints.max(1),
            next_seq: Mutex::new(HashMap::new()),
        })
    }

    /// Snapshot `state` and return the new checkpoint id. Evicts the
    /// oldest snapshots of this workflow beyond the retention limit.
    pub fn checkpoint(
        &self,
        state: &WorkflowState,
        reason: CheckpointReason,
    ) -> Result<String, WorkflowError> {
        let sequence = self.next_sequence(&state.id)?;
        let checkpoint_id = format!("{}-{:06}", state.id, sequence);
        let checkpoint = Checkpoint {
            checkpoint_id: checkpoint_id.clone(),
            workflow_id: state.id.clone(),
            sequence,
            reason,
            created_at: Utc::now(),
            state: state.clone(),
        };

        let path = self.path_for(&checkpoint_id);
        let tmp = path.with_extension("json.tmp");
        let content = serde_json::to_string_pretty(&checkpoint).map_err(|source| {
            WorkflowError::RecordDecodeFailed {
                path: path.clone(),
                source,
            }
        })?;
        fs::write(&tmp, content).map_err(|source| WorkflowError::RecordWriteFailed {
            path: tmp.clone(),
            source,
        })?;
        fs::rename(&tmp, &path).map_err(|source| WorkflowError::RecordWriteFailed {
            path: path.clone(),
            source,
        })?;

        debug!(checkpoint = %checkpoint_id, reason = %reason, "checkpoint written");
        self.prune(&state.id)?;
        Ok(checkpoint_id)
    }

    /// All checkpoints of a workflow in creation order.
    pub fn list_checkpoints(&self, workflow_id: &str) -> Result<Vec<Checkpoint>, WorkflowError> {
        validate_workflow_id(workflow_id)?;
        let prefix = format!("{workflow_id}-");
        let entries = fs::read_dir(&self.root).map_err(|source| {
            WorkflowError::RecordReadFailed {
                path: self.root.clone(),
                source,
            }
        })?;

        let mut checkpoints = Vec::new();
        for entry in entries.flatten() {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            // `<workflow_id>-<seq>`: ids may themselves contain '-', so
            // match the prefix and require a numeric tail.
            let Some(tail) = stem.strip_prefix(&prefix) else {
                continue;
            };
            if tail.parse::<u64>().is_err() {
                continue;
            }
            checkpoints.push(self.read_checkpoint(&path)?);
        }
        checkpoints.sort_by_key(|c| c.sequence);
        Ok(checkpoints)
    }

    /// Return the exact snapshot stored under `checkpoint_id`.
    ///
    /// Newer checkpoints are left untouched; installing the returned
    /// state as current is the orchestrator's job.
    pub fn rollback(&self, checkpoint_id: &str) -> Result<WorkflowState, WorkflowError> {
        let path = self.path_for(checkpoint_id);
        if !path.exists() {
            return Err(WorkflowError::CheckpointNotFound {
                checkpoint_id: checkpoint_id.to_string(),
            });
        }
        Ok(self.read_checkpoint(&path)?.state)
    }

    fn path_for(&self, checkpoint_id: &str) -> PathBuf {
        self.root.join(format!("{checkpoint_id}.json"))
    }

    fn read_checkpoint(&self, path: &Path) -> Result<Checkpoint, WorkflowError> {
        let content =
            fs::read_to_string(path).map_err(|source| WorkflowError::RecordReadFailed {
                path: path.to_path_buf(),
                source,
            })?;
        serde_json::from_str(&content).map_err(|source| WorkflowError::RecordDecodeFailed {
            path: path.to_path_buf(),
            source,
        })
    }

    fn next_sequence(&self, workflow_id: &str) -> Result<u64, WorkflowError> {
        let mut map = self
            .next_seq
            .lock()
            .map_err(|_| WorkflowError::Configuration("checkpoint sequence lock poisoned".into()))?;
        let next = match map.get(workflow_id) {
            Some(n) => *n,
            None => {
                // First checkpoint for this workflow in this process:
                // continue from whatever is already on disk.
                self.list_checkpoints(workflow_id)?
                    .last()
                    .map(|c| c.sequence + 1)
                    .unwrap_or(1)
            }
        };
        map.insert(workflow_id.to_string(), next + 1);
        Ok(next)
    }

    fn prune(&self, workflow_id: &str) -> Result<(), WorkflowError> {
        let checkpoints = self.list_checkpoints(workflow_id)?;
        if checkpoints.len() <= self.max_checkpoints {
            return Ok(());
        }
        let excess = checkpoints.len() - self.max_checkpoints;
        for old in checkpoints.iter().take(excess) {
            let path = self.path_for(&old.checkpoint_id);
            fs::remove_file(&path).map_err(|source| WorkflowError::RecordWriteFailed {
                path,
                source,
            })?;
            debug!(checkpoint = %old.checkpoint_id, "pruned old checkpoint");
        }
        Ok(())
    }
}
