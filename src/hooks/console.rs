//! Interactive terminal approval hook.

use anyhow::Result;
use async_trait::async_trait;
use console::style;
use dialoguer::{Input, Select, theme::ColorfulTheme};

use super::types::{ApprovalContext, ApprovalHook, ApprovalResponse, NotificationSeverity};
use crate::errors::GateError;

/// Collects gate decisions from the operator at the terminal.
pub struct ConsoleApprovalHook;

impl ConsoleApprovalHook {
    fn print_gate_header(&self, gate_name: &str, context: &ApprovalContext) {
        println!();
        println!(
            "{} gate {} for workflow {}",
            style("Approval").bold().cyan(),
            style(gate_name).bold(),
            style(&context.workflow_id).dim()
        );
        println!("  phase:  {}", context.phase);
        println!("  prompt: {}", context.prompt);
        if let Some(artifact) = &context.artifact {
            println!(
                "  output: {}",
                serde_json::to_string(artifact).unwrap_or_else(|_| "<unprintable>".to_string())
            );
        }
    }
}

#[async_trait]
impl ApprovalHook for ConsoleApprovalHook {
    fn name(&self) -> &str {
        "console"
    }

    async fn request_approval(
        &self,
        gate_name: &str,
        context: &ApprovalContext,
    ) -> Result<ApprovalResponse, GateError> {
        self.print_gate_header(gate_name, context);

        let options = &[
            "Approve and continue",
            "Reject and halt",
            "Reject with feedback",
        ];

        let selection = Select::with_theme(&ColorfulTheme::default())
            .with_prompt("Approve this phase output?")
            .items(options)
            .default(0)
            .interact()
            .map_err(|e| GateError::Channel(e.to_string()))?;

        match selection {
            0 => Ok(ApprovalResponse::approved()),
            1 => Ok(ApprovalResponse::rejected(None)),
            2 => {
                let feedback: String = Input::with_theme(&ColorfulTheme::default())
                    .with_prompt("Feedback")
                    .allow_empty(true)
                    .interact_text()
                    .map_err(|e| GateError::Channel(e.to_string()))?;
                let feedback = (!feedback.is_empty()).then_some(feedback);
                Ok(ApprovalResponse::rejected(feedback))
            }
            _ => unreachable!(),
        }
    }

    async fn send_notification(
        &self,
        message: &str,
        severity: NotificationSeverity,
    ) -> Result<()> {
        let tag = match severity {
            NotificationSeverity::Info => style("info").dim(),
            NotificationSeverity::Warning => style("warning").yellow(),
            NotificationSeverity::Error => style("error").red(),
        };
        println!("  [{tag}] {message}");
        Ok(())
    }
}
