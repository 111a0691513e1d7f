//! Durable persistence for workflow state records.
//!
//! One JSON document per workflow id under the configured state root.
//! Saves go through a temp-file-then-rename so a reader (or a process
//! killed mid-write) never observes a torn record.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::errors::WorkflowError;
use crate::phase::Phase;
use crate::state::WorkflowState;

/// Lightweight listing row returned by [`StateStore::list_all`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowSummary {
    pub id: String,
    pub phase: Phase,
    pub prompt: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Contract for durable load/save/list/delete of workflow state by id.
pub trait StateStore: Send + Sync {
    /// Persist the record. Atomic from the caller's perspective.
    fn save(&self, state: &WorkflowState) -> Result<(), WorkflowError>;

    /// Load the record for `id`, or `StateNotFound`.
    fn load(&self, id: &str) -> Result<WorkflowState, WorkflowError>;

    /// The most recently updated record, if any exist.
    fn get_latest(&self) -> Result<Option<WorkflowState>, WorkflowError>;

    /// Summaries of every stored record, newest first.
    fn list_all(&self) -> Result<Vec<WorkflowSummary>, WorkflowError>;

    /// Remove the record for `id`, or `StateNotFound`.
    fn delete(&self, id: &str) -> Result<(), WorkflowError>;

    /// Delete terminal records last updated more than `max_age` ago.
    /// Returns how many were removed. In-flight records are never touched.
    fn cleanup_old(&self, max_age: Duration) -> Result<usize, WorkflowError>;
}

/// Reject ids that could address anything outside the state root.
///
/// Workflow ids come from user input on resume/cancel, so they are
/// validated against an allowlist before ever being joined to a path.
pub fn validate_workflow_id(id: &str) -> Result<(), WorkflowError> {
    let valid = !id.is_empty()
        && id.len() <= 128
        && !id.starts_with('.')
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'));
    if valid {
        Ok(())
    } else {
        Err(WorkflowError::InvalidWorkflowId { id: id.to_string() })
    }
}

/// Filesystem-backed [`StateStore`].
pub struct FileStateStore {
    root: PathBuf,
}

impl FileStateStore {
    /// Open (and create if needed) a store rooted at `root`.
    pub fn new(root: impl AsRef<Path>) -> Result<Self, WorkflowError> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root).map_err(|source| WorkflowError::RecordWriteFailed {
            path: root.clone(),
            source,
        })?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, id: &str) -> Result<PathBuf, WorkflowError> {
        validate_workflow_id(id)?;
        Ok(self.root.join(format!("{id}.json")))
    }

    fn read_record(&self, path: &Path) -> Result<WorkflowState, WorkflowError> {
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
}

impl StateStore for FileStateStore {
    fn save(&self, state: &WorkflowState) -> Result<(), WorkflowError> {
        let path = self.path_for(&state.id)?;
        let tmp = path.with_extension("json.tmp");

        let content = serde_json::to_string_pretty(state).map_err(|source| {
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
        debug!(workflow = %state.id, phase = %state.phase, "state persisted");
        Ok(())
    }

    fn load(&self, id: &str) -> Result<WorkflowState, WorkflowError> {
        let path = self.path_for(id)?;
        if !path.exists() {
            return Err(WorkflowError::StateNotFound { id: id.to_string() });
        }
        self.read_record(&path)
    }

    fn get_latest(&self) -> Result<Option<WorkflowState>, WorkflowError> {
        let latest_id = self.list_all()?.into_iter().next().map(|s| s.id);
        match latest_id {
            Some(id) => Ok(Some(self.load(&id)?)),
            None => Ok(None),
        }
    }

    fn list_all(&self) -> Result<Vec<WorkflowSummary>, WorkflowError> {
        let entries = fs::read_dir(&self.root).map_err(|source| {
            WorkflowError::RecordReadFailed {
                path: self.root.clone(),
                source,
            }
        })?;

        let mut summaries = Vec::new();
        for entry in entries.flatten() {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            match self.read_record(&path) {
                Ok(state) => summaries.push(WorkflowSummary {
                    id: state.id,
                    phase: state.phase,
                    prompt: state.prompt,
                    created_at: state.created_at,
                    updated_at: state.updated_at,
                }),
                // A foreign or half-migrated file should not take the
                // whole listing down.
                Err(e) => warn!(path = %path.display(), error = %e, "skipping unreadable record"),
            }
        }
        summaries.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(summaries)
    }

    fn delete(&self, id: &str) -> Result<(), WorkflowError> {
        let path = self.path_for(id)?;
        if !path.exists() {
            return Err(WorkflowError::StateNotFound { id: id.to_string() });
        }
        fs::remove_file(&path).map_err(|source| WorkflowError::RecordWriteFailed {
            path,
            source,
        })
    }

    fn cleanup_old(&self, max_age: Duration) -> Result<usize, WorkflowError> {
        let cutoff = Utc::now() - max_age;
        let mut removed = 0;
        for summary in self.list_all()? {
            if summary.phase.is_terminal() && summary.updated_at < cutoff {
                self.delete(&summary.id)?;
                removed += 1;
            }
        }
        Ok(removed)
    }
}
