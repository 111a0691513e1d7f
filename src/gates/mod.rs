//! Approval gates: named choke points where the pipeline suspends until
//! an external accept/reject decision arrives.
//!
//! Gates guard the forward edges out of DESIGN ("concept"), QA
//! ("quality") and PUBLISH ("release"). The gate is fail-open when no
//! approval hook is registered: it records an auto-approval and sends a
//! warning so unattended runs do not hang, which is documented behavior
//! and not a security boundary.

use chrono::Utc;
use std::time::Duration;
use tracing::{info, warn};

use crate::errors::GateError;
use crate::hooks::{ApprovalContext, HookDispatcher, NotificationSeverity};
use crate::phase::Phase;
use crate::state::{ApprovalDecision, ApprovalRecord};

/// Gate guarding the forward edge out of a phase, if any.
pub fn gate_for(phase: Phase) -> Option<&'static str> {
    match phase {
        Phase::Design => Some("concept"),
        Phase::Qa => Some("quality"),
        Phase::Publish => Some("release"),
        _ => None,
    }
}

/// How a gate resolved.
#[derive(Debug, Clone, PartialEq)]
pub enum GateOutcome {
    Approved,
    Rejected { feedback: Option<String> },
    Expired,
}

/// Result of evaluating a gate.
#[derive(Debug, Clone, PartialEq)]
pub enum GateEvaluation {
    /// The `auto_approve` flag short-circuited the gate; nothing is
    /// recorded.
    Bypassed,
    /// A decision was collected (or synthesized) and should be recorded
    /// on the workflow.
    Decided {
        outcome: GateOutcome,
        record: ApprovalRecord,
    },
}

impl GateEvaluation {
    /// Whether the pipeline may advance past this gate.
    pub fn passed(&self) -> bool {
        matches!(
            self,
            GateEvaluation::Bypassed
                | GateEvaluation::Decided {
                    outcome: GateOutcome::Approved,
                    ..
                }
        )
    }
}

/// Evaluates named gates against the registered approval hooks.
pub struct ApprovalGate {
    auto_approve: bool,
    timeout: Option<Duration>,
}

impl ApprovalGate {
    pub fn new(auto_approve: bool, timeout_secs: Option<u64>) -> Self {
        Self {
            auto_approve,
            timeout: timeout_secs.map(Duration::from_secs),
        }
    }

    /// Suspend until the gate resolves.
    ///
    /// The first registered approval hook adjudicates; notifications of
    /// the outcome fan out to all of them. A hook error or an elapsed
    /// gate timeout resolves to `Expired` — the run halts rather than
    /// hanging forever or advancing unapproved.
    pub async fn evaluate(
        &self,
        gate_name: &str,
        context: &ApprovalContext,
        hooks: &HookDispatcher,
    ) -> GateEvaluation {
        if self.auto_approve {
            info!(gate = gate_name, "gate bypassed by auto_approve");
            return GateEvaluation::Bypassed;
        }

        let Some(primary) = hooks.approval_hooks().first() else {
            warn!(
                gate = gate_name,
                "no approval hook registered; gate fails open"
            );
            hooks
                .notify(
                    &format!("gate '{gate_name}' auto-approved: no approval hook registered"),
                    NotificationSeverity::Warning,
                )
                .await;
            return GateEvaluation::Decided {
                outcome: GateOutcome::Approved,
                record: self.record(
                    gate_name,
                    context,
                    ApprovalDecision::Approved,
                    Some("auto-approved: no approval hook registered".to_string()),
                ),
            };
        };

        info!(gate = gate_name, phase = %context.phase, "awaiting approval");
        let request = primary.request_approval(gate_name, context);
        let response = match self.timeout {
            Some(timeout) => match tokio::time::timeout(timeout, request).await {
                Ok(response) => response,
                Err(_) => Err(GateError::Timeout {
                    seconds: timeout.as_secs(),
                }),
            },
            None => request.await,
        };

        let (outcome, decision, feedback) = match response {
            Ok(r) if r.approved => (GateOutcome::Approved, ApprovalDecision::Approved, r.feedback),
            Ok(r) => (
                GateOutcome::Rejected {
                    feedback: r.feedback.clone(),
                },
                ApprovalDecision::Rejected,
                r.feedback,
            ),
            Err(e) => {
                warn!(gate = gate_name, error = %e, "approval not collected; gate expired");
                (
                    GateOutcome::Expired,
                    ApprovalDecision::Expired,
                    Some(e.to_string()),
                )
            }
        };

        let verdict = match decision {
            ApprovalDecision::Approved => "approved",
            ApprovalDecision::Rejected => "rejected",
            ApprovalDecision::Expired => "expired",
            ApprovalDecision::Pending => "pending",
        };
        hooks
            .notify(
                &format!("gate '{gate_name}' {verdict}"),
                if decision == ApprovalDecision::Approved {
                    NotificationSeverity::Info
                } else {
                    NotificationSeverity::Warning
                },
            )
            .await;

        GateEvaluation::Decided {
            outcome,
            record: self.record(gate_name, context, decision, feedback),
        }
    }

    fn record(
        &self,
        gate_name: &str,
        context: &ApprovalContext,
        decision: ApprovalDecision,
        feedback: Option<String>,
    ) -> ApprovalRecord {
        ApprovalRecord {
            gate_name: gate_name.to_string(),
            decision,
            context: context.summary(),
            decided_at: Some(Utc::now()),
            feedback,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hooks::{ApprovalHook, ApprovalResponse};
    use crate::state::WorkflowState;
    use async_trait::async_trait;
    use std::sync::Arc;

    struct Scripted {
        response: Result<ApprovalResponse, GateError>,
    }

    #[async_trait]
    impl ApprovalHook for Scripted {
        async fn request_approval(
            &self,
            _gate_name: &str,
            _context: &ApprovalContext,
        ) -> Result<ApprovalResponse, GateError> {
            match &self.response {
                Ok(r) => Ok(r.clone()),
                Err(GateError::Timeout { seconds }) => Err(GateError::Timeout { seconds: *seconds }),
                Err(GateError::Channel(m)) => Err(GateError::Channel(m.clone())),
            }
        }
    }

    struct Sleeper;

    #[async_trait]
    impl ApprovalHook for Sleeper {
        async fn request_approval(
            &self,
            _gate_name: &str,
            _context: &ApprovalContext,
        ) -> Result<ApprovalResponse, GateError> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok(ApprovalResponse::approved())
        }
    }

    fn context() -> ApprovalContext {
        let mut state = WorkflowState::new("p", "e");
        state.transition_to(Phase::Design).unwrap();
        ApprovalContext::for_phase(&state, Phase::Design)
    }

    fn dispatcher_with(hook: Arc<dyn ApprovalHook>) -> HookDispatcher {
        let mut dispatcher = HookDispatcher::new();
        dispatcher.register_approval_hook(hook);
        dispatcher
    }

    #[test]
    fn test_gate_names_cover_gated_phases() {
        assert_eq!(gate_for(Phase::Design), Some("concept"));
        assert_eq!(gate_for(Phase::Qa), Some("quality"));
        assert_eq!(gate_for(Phase::Publish), Some("release"));
        assert_eq!(gate_for(Phase::Build), None);
        assert_eq!(gate_for(Phase::Init), None);
    }

    #[tokio::test]
    async fn test_auto_approve_bypasses_entirely() {
        let gate = ApprovalGate::new(true, None);
        let hooks = dispatcher_with(Arc::new(Scripted {
            response: Ok(ApprovalResponse::rejected(None)),
        }));
        // Even a rejecting hook is never consulted.
        let eval = gate.evaluate("concept", &context(), &hooks).await;
        assert_eq!(eval, GateEvaluation::Bypassed);
        assert!(eval.passed());
    }

    #[tokio::test]
    async fn test_no_hooks_fails_open_with_record() {
        let gate = ApprovalGate::new(false, None);
        let hooks = HookDispatcher::new();
        let eval = gate.evaluate("concept", &context(), &hooks).await;
        assert!(eval.passed());
        match eval {
            GateEvaluation::Decided { record, .. } => {
                assert_eq!(record.decision, ApprovalDecision::Approved);
                assert!(record.feedback.unwrap().contains("no approval hook"));
            }
            other => panic!("Expected Decided, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_approval() {
        let gate = ApprovalGate::new(false, None);
        let hooks = dispatcher_with(Arc::new(Scripted {
            response: Ok(ApprovalResponse::approved()),
        }));
        let eval = gate.evaluate("quality", &context(), &hooks).await;
        assert!(eval.passed());
    }

    #[tokio::test]
    async fn test_rejection_with_feedback() {
        let gate = ApprovalGate::new(false, None);
        let hooks = dispatcher_with(Arc::new(Scripted {
            response: Ok(ApprovalResponse::rejected(Some("wrong palette".into()))),
        }));
        let eval = gate.evaluate("concept", &context(), &hooks).await;
        assert!(!eval.passed());
        match eval {
            GateEvaluation::Decided { outcome, record } => {
                assert_eq!(
                    outcome,
                    GateOutcome::Rejected {
                        feedback: Some("wrong palette".into())
                    }
                );
                assert_eq!(record.decision, ApprovalDecision::Rejected);
                assert_eq!(record.gate_name, "concept");
                assert!(record.decided_at.is_some());
            }
            other => panic!("Expected Decided, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_hook_timeout_error_expires_gate() {
        let gate = ApprovalGate::new(false, None);
        let hooks = dispatcher_with(Arc::new(Scripted {
            response: Err(GateError::Timeout { seconds: 5 }),
        }));
        let eval = gate.evaluate("release", &context(), &hooks).await;
        assert!(!eval.passed());
        match eval {
            GateEvaluation::Decided { outcome, record } => {
                assert_eq!(outcome, GateOutcome::Expired);
                assert_eq!(record.decision, ApprovalDecision::Expired);
            }
            other => panic!("Expected Decided, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_gate_level_timeout_expires_a_hung_hook() {
        let gate = ApprovalGate::new(false, Some(1));
        let hooks = dispatcher_with(Arc::new(Sleeper));
        let eval = gate.evaluate("quality", &context(), &hooks).await;
        match eval {
            GateEvaluation::Decided { outcome, .. } => assert_eq!(outcome, GateOutcome::Expired),
            other => panic!("Expected Decided, got {other:?}"),
        }
    }
}
