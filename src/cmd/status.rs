//! Workflow status and listing commands.

use std::path::Path;

use anyhow::Result;
use console::style;

use atelier::config::Config;
use atelier::phase::Phase;
use atelier::store::{FileStateStore, StateStore};

fn styled_phase(phase: Phase) -> console::StyledObject<&'static str> {
    match phase {
        Phase::Complete => style(phase.as_str()).green(),
        Phase::Failed => style(phase.as_str()).red(),
        Phase::Cancelled => style(phase.as_str()).yellow(),
        _ => style(phase.as_str()).cyan(),
    }
}

pub fn cmd_status(project_dir: &Path, id: Option<&str>) -> Result<()> {
    let config = Config::load(project_dir)?;
    let store = FileStateStore::new(&config.state_root)?;

    let state = match id {
        Some(id) => store.load(id)?,
        None => match store.get_latest()? {
            Some(state) => state,
            None => {
                println!("No workflows found. Start one with 'atelier run <prompt>'.");
                return Ok(());
            }
        },
    };

    println!();
    println!("Workflow {}", style(&state.id).bold());
    println!("  phase:   {}", styled_phase(state.phase));
    println!("  prompt:  {}", state.prompt);
    println!("  engine:  {}", state.engine_choice);
    println!("  created: {}", state.created_at.to_rfc3339());
    println!("  updated: {}", state.updated_at.to_rfc3339());

    if !state.artifacts.is_empty() {
        println!();
        println!("  Artifacts:");
        let mut phases: Vec<_> = state.artifacts.keys().collect();
        phases.sort();
        for phase in phases {
            println!("    {:<10} {}", phase, state.artifacts[phase]);
        }
    }

    if !state.approvals.is_empty() {
        println!();
        println!("  Approvals:");
        for (gate, record) in &state.approvals {
            let decided = record
                .decided_at
                .map(|t| t.to_rfc3339())
                .unwrap_or_else(|| "-".to_string());
            println!("    {:<10} {:?} at {}", gate, record.decision, decided);
            if let Some(feedback) = &record.feedback {
                println!("      feedback: {feedback}");
            }
        }
    }

    if !state.error_history.is_empty() {
        println!();
        println!("  Errors:");
        for record in &state.error_history {
            println!(
                "    {} [{}] {}: {}",
                record.timestamp.to_rfc3339(),
                record.phase,
                record.error_kind,
                record.message
            );
        }
    }

    Ok(())
}

pub fn cmd_list(project_dir: &Path, prune_days: Option<i64>) -> Result<()> {
    let config = Config::load(project_dir)?;
    let store = FileStateStore::new(&config.state_root)?;

    if let Some(days) = prune_days {
        let removed = store.cleanup_old(chrono::Duration::days(days))?;
        println!("Pruned {removed} finished workflow(s) older than {days} day(s).");
    }

    let summaries = store.list_all()?;
    if summaries.is_empty() {
        println!("No workflows found. Start one with 'atelier run <prompt>'.");
        return Ok(());
    }

    println!();
    println!("{:<38} {:<11} {:<20} Prompt", "Id", "Phase", "Updated");
    for summary in summaries {
        let prompt: String = if summary.prompt.chars().count() > 40 {
            let truncated: String = summary.prompt.chars().take(37).collect();
            format!("{truncated}...")
        } else {
            summary.prompt.clone()
        };
        println!(
            "{:<38} {:<11} {:<20} {}",
            summary.id,
            styled_phase(summary.phase),
            summary.updated_at.format("%Y-%m-%d %H:%M:%S"),
            prompt
        );
    }
    Ok(())
}
