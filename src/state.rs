//! The persisted workflow-state entity.
//!
//! `WorkflowState` is the aggregate root capturing all progress of a
//! run: current phase, per-phase artifacts, approval records, retry
//! counts and the append-only error history. It is exclusively owned by
//! the orchestrator while a run is active; the state store owns its
//! on-disk form.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::WorkflowError;
use crate::phase::Phase;

/// Bumped whenever the persisted layout changes shape.
pub const STATE_SCHEMA_VERSION: u32 = 1;

/// One entry of the append-only error history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorRecord {
    pub phase: Phase,
    pub error_kind: String,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

/// Outcome of an approval gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ApprovalDecision {
    Pending,
    Approved,
    Rejected,
    Expired,
}

/// Record of one gate decision, embedded in the workflow's `approvals`
/// map under its gate name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApprovalRecord {
    pub gate_name: String,
    pub decision: ApprovalDecision,
    /// Human-readable summary of what was being approved.
    pub context: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub decided_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feedback: Option<String>,
}

/// All persisted progress of a single workflow run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowState {
    pub id: String,
    pub phase: Phase,
    /// Original run input, opaque to the core.
    pub prompt: String,
    /// Which generation engine the run was started with, opaque to the core.
    pub engine_choice: String,
    /// Executor output descriptors, keyed by phase wire name.
    #[serde(default)]
    pub artifacts: HashMap<String, serde_json::Value>,
    /// Gate decisions, keyed by gate name.
    #[serde(default)]
    pub approvals: HashMap<String, ApprovalRecord>,
    /// Attempt counts, keyed by phase wire name.
    #[serde(default)]
    pub retry_counts: HashMap<String, u32>,
    /// Append-only; never truncated or rewritten.
    #[serde(default)]
    pub error_history: Vec<ErrorRecord>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub schema_version: u32,
}

impl WorkflowState {
    /// Create a fresh workflow at INIT with a generated id.
    pub fn new(prompt: &str, engine_choice: &str) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            phase: Phase::Init,
            prompt: prompt.to_string(),
            engine_choice: engine_choice.to_string(),
            artifacts: HashMap::new(),
            approvals: HashMap::new(),
            retry_counts: HashMap::new(),
            error_history: Vec::new(),
            created_at: now,
            updated_at: now,
            schema_version: STATE_SCHEMA_VERSION,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.phase.is_terminal()
    }

    /// Move to `to`, validating the edge against the transition table.
    ///
    /// On an illegal edge nothing is mutated. Entering a phase through a
    /// transition clears its retry count, so the QA -> BUILD fix cycle
    /// starts a fresh attempt budget.
    pub fn transition_to(&mut self, to: Phase) -> Result<(), WorkflowError> {
        if !self.phase.can_transition(to) {
            return Err(WorkflowError::InvalidTransition {
                from: self.phase,
                to,
            });
        }
        self.phase = to;
        self.retry_counts.remove(to.as_str());
        self.touch();
        Ok(())
    }

    /// Append to the error history. The history is never rewritten.
    pub fn record_error(&mut self, phase: Phase, error_kind: &str, message: &str) {
        self.error_history.push(ErrorRecord {
            phase,
            error_kind: error_kind.to_string(),
            message: message.to_string(),
            timestamp: Utc::now(),
        });
        self.touch();
    }

    /// Store the executor's output descriptor for a phase, replacing any
    /// descriptor from an earlier attempt or fix cycle.
    pub fn set_artifact(&mut self, phase: Phase, artifact: serde_json::Value) {
        self.artifacts.insert(phase.as_str().to_string(), artifact);
        self.touch();
    }

    pub fn artifact(&self, phase: Phase) -> Option<&serde_json::Value> {
        self.artifacts.get(phase.as_str())
    }

    /// Record a gate decision under its gate name.
    pub fn record_approval(&mut self, record: ApprovalRecord) {
        self.approvals.insert(record.gate_name.clone(), record);
        self.touch();
    }

    pub fn retry_count(&self, phase: Phase) -> u32 {
        self.retry_counts.get(phase.as_str()).copied().unwrap_or(0)
    }

    /// Count one more attempt for the phase; returns the new count.
    pub fn increment_retry(&mut self, phase: Phase) -> u32 {
        let count = self
            .retry_counts
            .entry(phase.as_str().to_string())
            .or_insert(0);
        *count += 1;
        let count = *count;
        self.touch();
        count
    }

    /// Forget the attempt count for a phase (operator-driven retry).
    pub fn clear_retries(&mut self, phase: Phase) {
        self.retry_counts.remove(phase.as_str());
        self.touch();
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}
