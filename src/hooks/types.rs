//! Hook trait definitions and the types that flow through them.

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::errors::{AgentError, GateError};
use crate::executor::PhaseOutput;
use crate::phase::Phase;
use crate::state::WorkflowState;

/// Severity attached to an out-of-band notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationSeverity {
    Info,
    Warning,
    Error,
}

impl std::fmt::Display for NotificationSeverity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            NotificationSeverity::Info => "info",
            NotificationSeverity::Warning => "warning",
            NotificationSeverity::Error => "error",
        };
        write!(f, "{s}")
    }
}

/// What an approval hook gets to look at when adjudicating a gate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApprovalContext {
    pub workflow_id: String,
    /// The phase whose outcome is being gated.
    pub phase: Phase,
    pub prompt: String,
    /// The gated phase's artifact descriptor, if it produced one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artifact: Option<serde_json::Value>,
}

impl ApprovalContext {
    /// Snapshot the gate-relevant parts of the current state.
    pub fn for_phase(state: &WorkflowState, phase: Phase) -> Self {
        Self {
            workflow_id: state.id.clone(),
            phase,
            prompt: state.prompt.clone(),
            artifact: state.artifact(phase).cloned(),
        }
    }

    /// One-line summary stored in the approval record.
    pub fn summary(&self) -> String {
        format!("{} output of workflow {}", self.phase, self.workflow_id)
    }
}

/// A gate decision returned by an approval hook.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApprovalResponse {
    pub approved: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feedback: Option<String>,
}

impl ApprovalResponse {
    pub fn approved() -> Self {
        Self {
            approved: true,
            feedback: None,
        }
    }

    pub fn rejected(feedback: Option<String>) -> Self {
        Self {
            approved: false,
            feedback,
        }
    }
}

/// Observer of phase lifecycle events.
///
/// All methods default to no-ops; implementors override only the events
/// they care about. Returned errors are logged and discarded by the
/// dispatcher.
#[async_trait]
pub trait WorkflowHook: Send + Sync {
    /// Name used to attribute log lines when a callback fails.
    fn name(&self) -> &str {
        "workflow-hook"
    }

    async fn on_phase_start(&self, _phase: Phase, _state: &WorkflowState) -> Result<()> {
        Ok(())
    }

    async fn on_phase_complete(
        &self,
        _phase: Phase,
        _state: &WorkflowState,
        _output: &PhaseOutput,
    ) -> Result<()> {
        Ok(())
    }

    async fn on_error(
        &self,
        _phase: Phase,
        _state: &WorkflowState,
        _error: &AgentError,
    ) -> Result<()> {
        Ok(())
    }
}

/// Channel through which a human (or policy) decision is collected.
#[async_trait]
pub trait ApprovalHook: Send + Sync {
    fn name(&self) -> &str {
        "approval-hook"
    }

    /// Collect a decision for the named gate. May take arbitrarily long;
    /// the gate applies its own timeout around this call.
    async fn request_approval(
        &self,
        gate_name: &str,
        context: &ApprovalContext,
    ) -> Result<ApprovalResponse, GateError>;

    /// Deliver an out-of-band message. Failures are discarded.
    async fn send_notification(
        &self,
        _message: &str,
        _severity: NotificationSeverity,
    ) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_approval_context_snapshot() {
        let mut state = WorkflowState::new("a poster", "claude");
        state.transition_to(Phase::Design).unwrap();
        state.set_artifact(Phase::Design, serde_json::json!({"doc": "poster.svg"}));

        let ctx = ApprovalContext::for_phase(&state, Phase::Design);
        assert_eq!(ctx.workflow_id, state.id);
        assert_eq!(ctx.phase, Phase::Design);
        assert_eq!(ctx.artifact.as_ref().unwrap()["doc"], serde_json::json!("poster.svg"));
        assert!(ctx.summary().contains("DESIGN"));
    }

    #[test]
    fn test_approval_response_constructors() {
        assert!(ApprovalResponse::approved().approved);
        let rejected = ApprovalResponse::rejected(Some("too plain".into()));
        assert!(!rejected.approved);
        assert_eq!(rejected.feedback.as_deref(), Some("too plain"));
    }

    #[tokio::test]
    async fn test_workflow_hook_defaults_are_noops() {
        struct Silent;
        impl WorkflowHook for Silent {}

        let hook = Silent;
        let state = WorkflowState::new("p", "e");
        assert!(hook.on_phase_start(Phase::Design, &state).await.is_ok());
        assert!(
            hook.on_error(
                Phase::Design,
                &state,
                &AgentError::Execution("x".into())
            )
            .await
            .is_ok()
        );
    }
}
