//! Hooks registered by default on every orchestrator.

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use tracing::{error, info};

use super::types::WorkflowHook;
use crate::checkpoint::{CheckpointManager, CheckpointReason};
use crate::errors::AgentError;
use crate::executor::PhaseOutput;
use crate::phase::Phase;
use crate::state::WorkflowState;

/// Structured log line per lifecycle event.
pub struct LoggingHook;

#[async_trait]
impl WorkflowHook for LoggingHook {
    fn name(&self) -> &str {
        "logging"
    }

    async fn on_phase_start(&self, phase: Phase, state: &WorkflowState) -> Result<()> {
        info!(workflow = %state.id, %phase, attempt = state.retry_count(phase) + 1, "phase started");
        Ok(())
    }

    async fn on_phase_complete(
        &self,
        phase: Phase,
        state: &WorkflowState,
        output: &PhaseOutput,
    ) -> Result<()> {
        info!(workflow = %state.id, %phase, next_step = ?output.next_step, "phase completed");
        Ok(())
    }

    async fn on_error(
        &self,
        phase: Phase,
        state: &WorkflowState,
        err: &AgentError,
    ) -> Result<()> {
        error!(workflow = %state.id, %phase, kind = err.kind(), error = %err, "phase failed");
        Ok(())
    }
}

/// Snapshots the workflow at every phase boundary.
///
/// This is how the orchestrator's phase_start / phase_complete / error
/// checkpoints get taken; cancelling and other operator actions write
/// their `manual` checkpoints directly through the manager.
pub struct CheckpointHook {
    manager: Arc<CheckpointManager>,
}

impl CheckpointHook {
    pub fn new(manager: Arc<CheckpointManager>) -> Self {
        Self { manager }
    }
}

#[async_trait]
impl WorkflowHook for CheckpointHook {
    fn name(&self) -> &str {
        "checkpoint"
    }

    async fn on_phase_start(&self, _phase: Phase, state: &WorkflowState) -> Result<()> {
        self.manager.checkpoint(state, CheckpointReason::PhaseStart)?;
        Ok(())
    }

    async fn on_phase_complete(
        &self,
        _phase: Phase,
        state: &WorkflowState,
        _output: &PhaseOutput,
    ) -> Result<()> {
        self.manager
            .checkpoint(state, CheckpointReason::PhaseComplete)?;
        Ok(())
    }

    async fn on_error(
        &self,
        _phase: Phase,
        state: &WorkflowState,
        _error: &AgentError,
    ) -> Result<()> {
        self.manager.checkpoint(state, CheckpointReason::Error)?;
        Ok(())
    }
}
