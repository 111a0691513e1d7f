//! The phase-executor boundary.
//!
//! Executors are the external collaborators that do the actual work of
//! a phase (LLM generation, code build, browser QA, packaging). The
//! core never looks inside them; it only sees the `PhaseExecutor`
//! contract: state in, artifacts or a typed `AgentError` out.
//!
//! Executors are resolved lazily through an `ExecutorProvider` so a run
//! that never reaches PUBLISH never constructs the publish executor.

use std::collections::HashMap;
use std::process::Stdio;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::debug;

use crate::errors::AgentError;
use crate::phase::Phase;
use crate::state::WorkflowState;

/// How the pipeline should proceed after a successful phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NextStep {
    /// Advance along the forward edge.
    #[default]
    Continue,
    /// QA only: send the work back to BUILD for a fix cycle.
    Rework,
}

/// Successful result of one executor invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhaseOutput {
    /// Output descriptor merged into the workflow's artifact map.
    /// Opaque payload: paths, metadata, whatever the executor produces.
    pub artifacts: serde_json::Value,
    #[serde(default)]
    pub next_step: NextStep,
}

impl PhaseOutput {
    pub fn new(artifacts: serde_json::Value) -> Self {
        Self {
            artifacts,
            next_step: NextStep::Continue,
        }
    }

    pub fn rework(artifacts: serde_json::Value) -> Self {
        Self {
            artifacts,
            next_step: NextStep::Rework,
        }
    }
}

/// One external phase collaborator.
#[async_trait]
pub trait PhaseExecutor: Send + Sync {
    /// Perform the phase's work against the current workflow state.
    ///
    /// The orchestrator awaits this call to completion; it is treated as
    /// an atomic suspension point and is never interrupted.
    async fn execute(&self, state: &WorkflowState) -> Result<PhaseOutput, AgentError>;
}

/// Factory the orchestrator consults the first time each phase runs.
#[async_trait]
pub trait ExecutorProvider: Send + Sync {
    async fn resolve(&self, phase: Phase) -> Result<Arc<dyn PhaseExecutor>, AgentError>;
}

/// Provider over a fixed phase -> executor map. Useful for embedding and
/// for tests with scripted executors.
#[derive(Default)]
pub struct StaticExecutorProvider {
    executors: HashMap<Phase, Arc<dyn PhaseExecutor>>,
}

impl StaticExecutorProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_executor(mut self, phase: Phase, executor: Arc<dyn PhaseExecutor>) -> Self {
        self.executors.insert(phase, executor);
        self
    }
}

#[async_trait]
impl ExecutorProvider for StaticExecutorProvider {
    async fn resolve(&self, phase: Phase) -> Result<Arc<dyn PhaseExecutor>, AgentError> {
        self.executors.get(&phase).cloned().ok_or_else(|| {
            AgentError::Configuration(format!("no executor registered for phase {phase}"))
        })
    }
}

/// Executor that delegates a phase to a configured subprocess.
///
/// The workflow state is serialized to the child's stdin as JSON; the
/// child's stdout is parsed as the phase output. A stdout that is not
/// JSON is wrapped as `{"output": "..."}` so ad-hoc scripts keep
/// working. Non-zero exit maps to the phase-specific recoverable error;
/// failure to even spawn is a configuration error and is never retried.
pub struct CommandExecutor {
    phase: Phase,
    program: String,
    args: Vec<String>,
}

impl CommandExecutor {
    /// Build from a whitespace-separated command line, e.g.
    /// `"python3 generate.py --fast"`. Quoting is not interpreted.
    pub fn from_command_line(phase: Phase, command_line: &str) -> Result<Self, AgentError> {
        let mut parts = command_line.split_whitespace();
        let program = parts
            .next()
            .ok_or_else(|| {
                AgentError::Configuration(format!("empty executor command for phase {phase}"))
            })?
            .to_string();
        Ok(Self {
            phase,
            program,
            args: parts.map(str::to_string).collect(),
        })
    }
}

#[async_trait]
impl PhaseExecutor for CommandExecutor {
    async fn execute(&self, state: &WorkflowState) -> Result<PhaseOutput, AgentError> {
        let input = serde_json::json!({
            "workflow_id": state.id,
            "phase": self.phase,
            "prompt": state.prompt,
            "engine_choice": state.engine_choice,
            "artifacts_so_far": state.artifacts,
        });

        debug!(phase = %self.phase, program = %self.program, "spawning phase executor");
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| {
                AgentError::Configuration(format!(
                    "failed to spawn executor '{}' for phase {}: {}",
                    self.program, self.phase, e
                ))
            })?;

        if let Some(mut stdin) = child.stdin.take() {
            let payload = input.to_string();
            stdin
                .write_all(payload.as_bytes())
                .await
                .map_err(|e| AgentError::for_phase(self.phase, format!("stdin write failed: {e}")))?;
        }

        let output = child
            .wait_with_output()
            .await
            .map_err(|e| AgentError::for_phase(self.phase, format!("executor wait failed: {e}")))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let code = output.status.code().unwrap_or(-1);
            return Err(AgentError::for_phase(
                self.phase,
                format!("executor exited {}: {}", code, stderr.trim()),
            ));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        Ok(parse_executor_output(stdout.trim()))
    }
}

/// Interpret an executor's stdout as a phase output.
fn parse_executor_output(stdout: &str) -> PhaseOutput {
    if let Ok(output) = serde_json::from_str::<PhaseOutput>(stdout) {
        return output;
    }
    if let Ok(value) = serde_json::from_str::<serde_json::Value>(stdout) {
        return PhaseOutput::new(value);
    }
    PhaseOutput::new(serde_json::json!({ "output": stdout }))
}
