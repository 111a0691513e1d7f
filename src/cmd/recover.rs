//! Operator recovery commands: cancel, checkpoint inspection, rollback.

use std::path::Path;

use anyhow::Result;
use console::style;

use atelier::checkpoint::CheckpointManager;
use atelier::config::Config;
use atelier::executor::StaticExecutorProvider;
use atelier::orchestrator::Orchestrator;

/// The recovery commands never invoke executors, so an empty provider
/// is all the orchestrator needs.
fn build_orchestrator(project_dir: &Path) -> Result<Orchestrator> {
    let config = Config::load(project_dir)?;
    config.ensure_directories()?;
    Ok(Orchestrator::new(
        &config,
        Box::new(StaticExecutorProvider::new()),
    )?)
}

pub fn cmd_cancel(project_dir: &Path, id: &str) -> Result<()> {
    let mut orchestrator = build_orchestrator(project_dir)?;
    let state = orchestrator.cancel_by_id(id)?;
    println!(
        "{} workflow {} (was mid-pipeline, now {})",
        style("Cancelled").yellow().bold(),
        state.id,
        state.phase
    );
    Ok(())
}

pub fn cmd_checkpoints(project_dir: &Path, id: &str) -> Result<()> {
    let config = Config::load(project_dir)?;
    let manager = CheckpointManager::new(&config.checkpoint_root, config.max_checkpoints)?;

    let checkpoints = manager.list_checkpoints(id)?;
    if checkpoints.is_empty() {
        println!("No checkpoints found for workflow {id}.");
        return Ok(());
    }

    println!();
    println!("{:<45} {:<15} {:<11} Created", "Checkpoint", "Reason", "Phase");
    for cp in checkpoints {
        println!(
            "{:<45} {:<15} {:<11} {}",
            cp.checkpoint_id,
            cp.reason.to_string(),
            cp.state.phase.as_str(),
            cp.created_at.format("%Y-%m-%d %H:%M:%S")
        );
    }
    Ok(())
}

pub fn cmd_rollback(project_dir: &Path, checkpoint_id: &str) -> Result<()> {
    let mut orchestrator = build_orchestrator(project_dir)?;
    let state = orchestrator.rollback_to_checkpoint(checkpoint_id)?;
    println!(
        "{} workflow {} to checkpoint {} (phase {})",
        style("Rolled back").bold(),
        state.id,
        checkpoint_id,
        state.phase
    );
    println!("Resume it with 'atelier resume {}'.", state.id);
    Ok(())
}
