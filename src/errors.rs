//! Typed error hierarchy for the atelier orchestrator.
//!
//! Three top-level enums cover the three failure surfaces:
//! - `WorkflowError` — state machine, store and checkpoint faults
//! - `AgentError` — phase executor failures (recoverable or fatal)
//! - `GateError` — approval channel failures

use thiserror::Error;

use crate::phase::Phase;

/// Errors from the orchestration core: the state machine, the state
/// store and the checkpoint manager.
#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error("Illegal phase transition {from} -> {to}")]
    InvalidTransition { from: Phase, to: Phase },

    #[error("No workflow state found for id '{id}'")]
    StateNotFound { id: String },

    #[error("Invalid workflow id '{id}': only letters, digits, '.', '_' and '-' are allowed")]
    InvalidWorkflowId { id: String },

    #[error("Checkpoint '{checkpoint_id}' not found")]
    CheckpointNotFound { checkpoint_id: String },

    #[error("Workflow '{id}' is already terminal ({phase})")]
    TerminalWorkflow { id: String, phase: Phase },

    #[error("No resumable workflow found")]
    NothingToResume,

    #[error("No active workflow held by this orchestrator")]
    NoActiveWorkflow,

    #[error("Failed to read record at {path}: {source}")]
    RecordReadFailed {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write record at {path}: {source}")]
    RecordWriteFailed {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed record at {path}: {source}")]
    RecordDecodeFailed {
        path: std::path::PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Errors raised by a phase executor.
///
/// All execution-failure kinds are recoverable and eligible for retry;
/// `Configuration` is fatal and always terminates the run.
#[derive(Debug, Clone, Error)]
pub enum AgentError {
    #[error("Agent execution failed: {0}")]
    Execution(String),

    #[error("Build failed: {0}")]
    BuildFailed(String),

    #[error("QA failed: {0}")]
    QaFailed(String),

    #[error("Publish failed: {0}")]
    PublishFailed(String),

    #[error("Executor configuration error: {0}")]
    Configuration(String),
}

impl AgentError {
    /// Wrap a message in the failure kind conventional for the phase it
    /// occurred in.
    pub fn for_phase(phase: Phase, message: impl Into<String>) -> Self {
        let message = message.into();
        match phase {
            Phase::Build => AgentError::BuildFailed(message),
            Phase::Qa => AgentError::QaFailed(message),
            Phase::Publish => AgentError::PublishFailed(message),
            _ => AgentError::Execution(message),
        }
    }

    /// Whether the retry controller may re-attempt the phase.
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, AgentError::Configuration(_))
    }

    /// Stable kind string recorded in a workflow's error history.
    pub fn kind(&self) -> &'static str {
        match self {
            AgentError::Execution(_) => "agent_error",
            AgentError::BuildFailed(_) => "build_failed",
            AgentError::QaFailed(_) => "qa_failed",
            AgentError::PublishFailed(_) => "publish_failed",
            AgentError::Configuration(_) => "configuration",
        }
    }
}

/// Errors from the approval channel behind a gate.
#[derive(Debug, Error)]
pub enum GateError {
    #[error("Approval request timed out after {seconds}s")]
    Timeout { seconds: u64 },

    #[error("Approval channel failed: {0}")]
    Channel(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_transition_carries_both_phases() {
        let err = WorkflowError::InvalidTransition {
            from: Phase::Complete,
            to: Phase::Design,
        };
        match &err {
            WorkflowError::InvalidTransition { from, to } => {
                assert_eq!(*from, Phase::Complete);
                assert_eq!(*to, Phase::Design);
            }
            _ => panic!("Expected InvalidTransition variant"),
        }
        assert!(err.to_string().contains("COMPLETE"));
        assert!(err.to_string().contains("DESIGN"));
    }

    #[test]
    fn state_not_found_carries_id() {
        let err = WorkflowError::StateNotFound {
            id: "wf-42".to_string(),
        };
        assert!(err.to_string().contains("wf-42"));
    }

    #[test]
    fn agent_error_for_phase_picks_specific_kind() {
        assert!(matches!(
            AgentError::for_phase(Phase::Build, "cc failed"),
            AgentError::BuildFailed(_)
        ));
        assert!(matches!(
            AgentError::for_phase(Phase::Qa, "browser test failed"),
            AgentError::QaFailed(_)
        ));
        assert!(matches!(
            AgentError::for_phase(Phase::Publish, "upload failed"),
            AgentError::PublishFailed(_)
        ));
        assert!(matches!(
            AgentError::for_phase(Phase::Design, "llm error"),
            AgentError::Execution(_)
        ));
    }

    #[test]
    fn agent_error_recoverability() {
        assert!(AgentError::Execution("x".into()).is_recoverable());
        assert!(AgentError::BuildFailed("x".into()).is_recoverable());
        assert!(AgentError::QaFailed("x".into()).is_recoverable());
        assert!(AgentError::PublishFailed("x".into()).is_recoverable());
        assert!(!AgentError::Configuration("x".into()).is_recoverable());
    }

    #[test]
    fn agent_error_kinds_are_distinct() {
        let kinds = [
            AgentError::Execution("a".into()).kind(),
            AgentError::BuildFailed("a".into()).kind(),
            AgentError::QaFailed("a".into()).kind(),
            AgentError::PublishFailed("a".into()).kind(),
            AgentError::Configuration("a".into()).kind(),
        ];
        let unique: std::collections::HashSet<_> = kinds.iter().collect();
        assert_eq!(unique.len(), kinds.len());
    }

    #[test]
    fn all_error_types_implement_std_error_trait() {
        fn assert_std_error<E: std::error::Error>(_: &E) {}
        assert_std_error(&WorkflowError::NothingToResume);
        assert_std_error(&AgentError::BuildFailed("x".into()));
        assert_std_error(&GateError::Timeout { seconds: 30 });
    }
}
