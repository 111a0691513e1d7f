//! Ordered, failure-isolated delivery of lifecycle events to hooks.

use std::sync::Arc;

use tracing::warn;

use super::types::{ApprovalHook, NotificationSeverity, WorkflowHook};
use crate::errors::AgentError;
use crate::executor::PhaseOutput;
use crate::phase::Phase;
use crate::state::WorkflowState;

/// Holds the registered hooks and fans events out to them.
///
/// Dispatch is sequential in registration order on the orchestrator's
/// task. An `Err` from any callback is logged at `warn` and discarded:
/// it never reaches the orchestrator's control flow and never prevents
/// the remaining hooks from running.
#[derive(Default)]
pub struct HookDispatcher {
    workflow_hooks: Vec<Arc<dyn WorkflowHook>>,
    approval_hooks: Vec<Arc<dyn ApprovalHook>>,
}

impl HookDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_workflow_hook(&mut self, hook: Arc<dyn WorkflowHook>) {
        self.workflow_hooks.push(hook);
    }

    pub fn register_approval_hook(&mut self, hook: Arc<dyn ApprovalHook>) {
        self.approval_hooks.push(hook);
    }

    pub fn workflow_hook_count(&self) -> usize {
        self.workflow_hooks.len()
    }

    /// The registered approval hooks, in registration order. The gate
    /// asks the first for decisions and notifies all of them.
    pub fn approval_hooks(&self) -> &[Arc<dyn ApprovalHook>] {
        &self.approval_hooks
    }

    pub async fn phase_start(&self, phase: Phase, state: &WorkflowState) {
        for hook in &self.workflow_hooks {
            if let Err(e) = hook.on_phase_start(phase, state).await {
                warn!(hook = hook.name(), %phase, error = %e, "on_phase_start hook failed; continuing");
            }
        }
    }

    pub async fn phase_complete(&self, phase: Phase, state: &WorkflowState, output: &PhaseOutput) {
        for hook in &self.workflow_hooks {
            if let Err(e) = hook.on_phase_complete(phase, state, output).await {
                warn!(hook = hook.name(), %phase, error = %e, "on_phase_complete hook failed; continuing");
            }
        }
    }

    pub async fn error(&self, phase: Phase, state: &WorkflowState, error: &AgentError) {
        for hook in &self.workflow_hooks {
            if let Err(e) = hook.on_error(phase, state, error).await {
                warn!(hook = hook.name(), %phase, error = %e, "on_error hook failed; continuing");
            }
        }
    }

    /// Fan a notification out to every approval hook.
    pub async fn notify(&self, message: &str, severity: NotificationSeverity) {
        for hook in &self.approval_hooks {
            if let Err(e) = hook.send_notification(message, severity).await {
                warn!(hook = hook.name(), error = %e, "notification hook failed; continuing");
            }
        }
    }
}
