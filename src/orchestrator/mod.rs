//! The orchestrator: composes the state machine, store, checkpoints,
//! hooks, retry policy and approval gates into the end-to-end run loop.
//!
//! Control flow per phase: dispatch `on_phase_start`, invoke the
//! executor, then either merge artifacts / gate / advance, or record
//! the error and consult the retry controller. Executor failures never
//! escape `run`/`resume` as errors; they end up in the returned state's
//! `phase` and `error_history`. `Err` from the entry points means an
//! infrastructure fault (store I/O) or caller misuse (resuming a
//! terminal workflow).

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tracing::{error, info, warn};

use crate::checkpoint::{Checkpoint, CheckpointManager, CheckpointReason};
use crate::config::Config;
use crate::errors::{AgentError, WorkflowError};
use crate::executor::{ExecutorProvider, NextStep, PhaseExecutor, PhaseOutput};
use crate::gates::{ApprovalGate, GateEvaluation, GateOutcome, gate_for};
use crate::hooks::{
    ApprovalContext, ApprovalHook, CheckpointHook, HookDispatcher, LoggingHook, WorkflowHook,
};
use crate::phase::Phase;
use crate::retry::RetryController;
use crate::state::WorkflowState;
use crate::store::{FileStateStore, StateStore};

/// Shareable trigger for cooperative cancellation.
///
/// The flag is observed between phases only; an in-flight executor call
/// is never interrupted.
#[derive(Clone, Default)]
pub struct CancelHandle {
    flag: Arc<AtomicBool>,
}

impl CancelHandle {
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

/// Drives one workflow at a time from INIT to a terminal phase.
pub struct Orchestrator {
    store: Box<dyn StateStore>,
    checkpoints: Arc<CheckpointManager>,
    hooks: HookDispatcher,
    retry: RetryController,
    gate: ApprovalGate,
    provider: Box<dyn ExecutorProvider>,
    /// Executors resolved so far; populated lazily per phase.
    resolved: HashMap<Phase, Arc<dyn PhaseExecutor>>,
    state: Option<WorkflowState>,
    cancel: CancelHandle,
}

impl Orchestrator {
    /// Build an orchestrator with the built-in logging and checkpoint
    /// hooks registered.
    pub fn new(config: &Config, provider: Box<dyn ExecutorProvider>) -> Result<Self, WorkflowError> {
        let mut orchestrator = Self::without_builtin_hooks(config, provider)?;
        let checkpoints = Arc::clone(&orchestrator.checkpoints);
        orchestrator.register_workflow_hook(Arc::new(LoggingHook));
        orchestrator.register_workflow_hook(Arc::new(CheckpointHook::new(checkpoints)));
        Ok(orchestrator)
    }

    /// Build without the built-in hooks, for callers that want full
    /// control over observation (or none at all).
    pub fn without_builtin_hooks(
        config: &Config,
        provider: Box<dyn ExecutorProvider>,
    ) -> Result<Self, WorkflowError> {
        let store = Box::new(FileStateStore::new(&config.state_root)?);
        let checkpoints = Arc::new(CheckpointManager::new(
            &config.checkpoint_root,
            config.max_checkpoints,
        )?);
        Ok(Self {
            store,
            checkpoints,
            hooks: HookDispatcher::new(),
            retry: RetryController::new(config.max_retries),
            gate: ApprovalGate::new(config.auto_approve, config.approval_timeout_secs),
            provider,
            resolved: HashMap::new(),
            state: None,
            cancel: CancelHandle::default(),
        })
    }

    pub fn register_workflow_hook(&mut self, hook: Arc<dyn WorkflowHook>) {
        self.hooks.register_workflow_hook(hook);
    }

    pub fn register_approval_hook(&mut self, hook: Arc<dyn ApprovalHook>) {
        self.hooks.register_approval_hook(hook);
    }

    /// Handle for requesting cooperative cancellation from another task.
    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    /// The workflow currently held by this orchestrator, if any.
    pub fn current_state(&self) -> Option<&WorkflowState> {
        self.state.as_ref()
    }

    pub fn checkpoints(&self) -> &CheckpointManager {
        &self.checkpoints
    }

    /// Start a new workflow and drive it until it reaches a terminal
    /// phase (or suspends on cancellation).
    pub async fn run(
        &mut self,
        prompt: &str,
        engine_choice: &str,
    ) -> Result<WorkflowState, WorkflowError> {
        let state = WorkflowState::new(prompt, engine_choice);
        info!(workflow = %state.id, engine = engine_choice, "starting workflow");
        self.store.save(&state)?;
        self.state = Some(state);
        self.drive().await
    }

    /// Re-enter the loop for a persisted workflow: the named one, or
    /// the most recently updated non-terminal one.
    pub async fn resume(&mut self, id: Option<&str>) -> Result<WorkflowState, WorkflowError> {
        let state = match id {
            Some(id) => self.store.load(id)?,
            None => self.latest_resumable()?,
        };
        if state.is_terminal() {
            return Err(WorkflowError::TerminalWorkflow {
                id: state.id,
                phase: state.phase,
            });
        }
        info!(workflow = %state.id, phase = %state.phase, "resuming workflow");
        self.state = Some(state);
        self.drive().await
    }

    /// Cancel the workflow currently held by this orchestrator.
    pub fn cancel(&mut self) -> Result<WorkflowState, WorkflowError> {
        let mut state = self
            .state
            .take()
            .ok_or(WorkflowError::NoActiveWorkflow)?;
        self.finish_cancel(&mut state)?;
        self.state = Some(state.clone());
        Ok(state)
    }

    /// Cancel a persisted workflow by id without driving it.
    pub fn cancel_by_id(&mut self, id: &str) -> Result<WorkflowState, WorkflowError> {
        let mut state = self.store.load(id)?;
        self.finish_cancel(&mut state)?;
        Ok(state)
    }

    /// Operator override: forget the current phase's spent attempts and
    /// drive again from the same phase.
    pub async fn retry_phase(&mut self) -> Result<WorkflowState, WorkflowError> {
        let mut state = self
            .state
            .take()
            .ok_or(WorkflowError::NoActiveWorkflow)?;
        if state.is_terminal() {
            let err = WorkflowError::TerminalWorkflow {
                id: state.id.clone(),
                phase: state.phase,
            };
            self.state = Some(state);
            return Err(err);
        }
        let phase = state.phase;
        state.clear_retries(phase);
        self.store.save(&state)?;
        info!(workflow = %state.id, %phase, "operator retry of current phase");
        self.state = Some(state);
        self.drive().await
    }

    /// Operator override: install a checkpoint snapshot as the current
    /// workflow state and re-persist it. In-progress phase data is
    /// overwritten; newer checkpoints remain as history.
    pub fn rollback_to_checkpoint(
        &mut self,
        checkpoint_id: &str,
    ) -> Result<WorkflowState, WorkflowError> {
        let snapshot = self.checkpoints.rollback(checkpoint_id)?;
        info!(workflow = %snapshot.id, checkpoint = checkpoint_id, phase = %snapshot.phase, "rolled back to checkpoint");
        self.store.save(&snapshot)?;
        self.state = Some(snapshot.clone());
        Ok(snapshot)
    }

    pub fn list_checkpoints(&self, workflow_id: &str) -> Result<Vec<Checkpoint>, WorkflowError> {
        self.checkpoints.list_checkpoints(workflow_id)
    }

    /// The main loop. Strictly sequential: one phase at a time, each
    /// executor call awaited to completion.
    async fn drive(&mut self) -> Result<WorkflowState, WorkflowError> {
        let mut state = self.state.take().ok_or(WorkflowError::NoActiveWorkflow)?;

        while !state.phase.is_terminal() {
            // Cooperative cancellation, between phases only.
            if self.cancel.flag.swap(false, Ordering::SeqCst) {
                info!(workflow = %state.id, phase = %state.phase, "cancellation requested");
                self.finish_cancel(&mut state)?;
                break;
            }

            // INIT runs nothing; it exists so a freshly created (or
            // crashed-at-creation) workflow enters the loop uniformly.
            if state.phase == Phase::Init {
                self.hooks.phase_start(Phase::Init, &state).await;
                state.transition_to(Phase::Design)?;
                self.store.save(&state)?;
                continue;
            }

            let phase = state.phase;
            self.hooks.phase_start(phase, &state).await;

            let result = match self.executor_for(phase).await {
                Ok(executor) => executor.execute(&state).await,
                Err(e) => Err(e),
            };

            match result {
                Ok(output) => {
                    state.set_artifact(phase, output.artifacts.clone());
                    self.hooks.phase_complete(phase, &state, &output).await;

                    let rework = phase == Phase::Qa && output.next_step == NextStep::Rework;
                    if !rework && !self.pass_gate(phase, &mut state).await? {
                        // Gate halted the run; state is already FAILED
                        // and persisted.
                        break;
                    }

                    let next = if rework {
                        info!(workflow = %state.id, "QA requested rework; returning to BUILD");
                        Phase::Build
                    } else {
                        // Executable phases always have a forward edge.
                        phase.next_on_success().ok_or(
                            WorkflowError::InvalidTransition {
                                from: phase,
                                to: phase,
                            },
                        )?
                    };
                    state.transition_to(next)?;
                    self.store.save(&state)?;
                }
                Err(err) => {
                    state.record_error(phase, err.kind(), &err.to_string());
                    self.hooks.error(phase, &state, &err).await;

                    let attempts = state.retry_count(phase);
                    if self.retry.should_retry(attempts, &err) {
                        let attempt = state.increment_retry(phase);
                        self.store.save(&state)?;
                        warn!(workflow = %state.id, %phase, attempt, "retrying phase");
                        continue;
                    }

                    error!(workflow = %state.id, %phase, error = %err, "phase failed permanently");
                    state.transition_to(Phase::Failed)?;
                    self.store.save(&state)?;
                }
            }
        }

        info!(workflow = %state.id, phase = %state.phase, "workflow finished");
        self.state = Some(state.clone());
        Ok(state)
    }

    /// Evaluate the gate on the forward edge out of `phase`, if one
    /// exists. Returns whether the pipeline may advance; on rejection
    /// or expiry the state is moved to FAILED and persisted here.
    async fn pass_gate(
        &mut self,
        phase: Phase,
        state: &mut WorkflowState,
    ) -> Result<bool, WorkflowError> {
        let Some(gate_name) = gate_for(phase) else {
            return Ok(true);
        };

        let context = ApprovalContext::for_phase(state, phase);
        match self.gate.evaluate(gate_name, &context, &self.hooks).await {
            GateEvaluation::Bypassed => Ok(true),
            GateEvaluation::Decided { outcome, record } => {
                state.record_approval(record);
                match outcome {
                    GateOutcome::Approved => {
                        self.store.save(state)?;
                        Ok(true)
                    }
                    GateOutcome::Rejected { feedback } => {
                        let message = match feedback {
                            Some(f) => format!("gate '{gate_name}' rejected: {f}"),
                            None => format!("gate '{gate_name}' rejected"),
                        };
                        self.halt_at_gate(phase, state, "approval_rejected", &message)
                    }
                    GateOutcome::Expired => self.halt_at_gate(
                        phase,
                        state,
                        "approval_expired",
                        &format!("gate '{gate_name}' expired without a decision"),
                    ),
                }
            }
        }
    }

    fn halt_at_gate(
        &self,
        phase: Phase,
        state: &mut WorkflowState,
        kind: &str,
        message: &str,
    ) -> Result<bool, WorkflowError> {
        warn!(workflow = %state.id, %phase, kind, "gate halted the pipeline");
        state.record_error(phase, kind, message);
        state.transition_to(Phase::Failed)?;
        self.store.save(state)?;
        Ok(false)
    }

    fn finish_cancel(&self, state: &mut WorkflowState) -> Result<(), WorkflowError> {
        state.transition_to(Phase::Cancelled)?;
        self.store.save(state)?;
        self.checkpoints
            .checkpoint(state, CheckpointReason::Manual)?;
        info!(workflow = %state.id, "workflow cancelled");
        Ok(())
    }

    async fn executor_for(&mut self, phase: Phase) -> Result<Arc<dyn PhaseExecutor>, AgentError> {
        if let Some(executor) = self.resolved.get(&phase) {
            return Ok(Arc::clone(executor));
        }
        let executor = self.provider.resolve(phase).await?;
        self.resolved.insert(phase, Arc::clone(&executor));
        Ok(executor)
    }

    fn latest_resumable(&self) -> Result<WorkflowState, WorkflowError> {
        for summary in self.store.list_all()? {
            if !summary.phase.is_terminal() {
                return self.store.load(&summary.id);
            }
        }
        Err(WorkflowError::NothingToResume)
    }
}
