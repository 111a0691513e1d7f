//! Run and resume commands.

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use console::style;

use atelier::config::{Config, ExecutorsSection};
use atelier::executor::{CommandExecutor, ExecutorProvider, PhaseExecutor, StaticExecutorProvider};
use atelier::hooks::ConsoleApprovalHook;
use atelier::orchestrator::Orchestrator;
use atelier::phase::Phase;
use atelier::state::WorkflowState;

/// Build the subprocess-backed executor set from the `[executors]`
/// config table. Phases without a configured command fail with a
/// configuration error if the run ever reaches them.
fn provider_from_config(executors: &ExecutorsSection) -> Result<Box<dyn ExecutorProvider>> {
    let mut provider = StaticExecutorProvider::new();
    let commands = [
        (Phase::Design, executors.design.as_deref()),
        (Phase::Build, executors.build.as_deref()),
        (Phase::Qa, executors.qa.as_deref()),
        (Phase::Publish, executors.publish.as_deref()),
    ];
    for (phase, command) in commands {
        if let Some(command) = command {
            let executor: Arc<dyn PhaseExecutor> =
                Arc::new(CommandExecutor::from_command_line(phase, command)?);
            provider = provider.with_executor(phase, executor);
        }
    }
    Ok(Box::new(provider))
}

fn build_orchestrator(project_dir: &Path, auto_approve: bool) -> Result<Orchestrator> {
    let config = Config::load(project_dir)?.with_auto_approve(auto_approve);
    config.ensure_directories()?;
    let provider = provider_from_config(&config.executors)?;
    let mut orchestrator =
        Orchestrator::new(&config, provider).context("Failed to construct orchestrator")?;
    if !config.auto_approve {
        orchestrator.register_approval_hook(Arc::new(ConsoleApprovalHook));
    }
    Ok(orchestrator)
}

fn print_outcome(state: &WorkflowState) {
    println!();
    match state.phase {
        Phase::Complete => println!("{} workflow {}", style("Completed").green().bold(), state.id),
        Phase::Cancelled => println!("{} workflow {}", style("Cancelled").yellow().bold(), state.id),
        _ => {
            println!("{} workflow {}", style("Failed").red().bold(), state.id);
            if let Some(last) = state.error_history.last() {
                println!("  last error [{}] {}: {}", last.phase, last.error_kind, last.message);
            }
        }
    }
    println!(
        "  {} error(s), {} artifact(s), {} approval(s)",
        state.error_history.len(),
        state.artifacts.len(),
        state.approvals.len()
    );
}

pub async fn cmd_run(
    project_dir: &Path,
    prompt: &str,
    engine: &str,
    auto_approve: bool,
) -> Result<()> {
    let mut orchestrator = build_orchestrator(project_dir, auto_approve)?;
    let state = orchestrator.run(prompt, engine).await?;
    print_outcome(&state);
    Ok(())
}

pub async fn cmd_resume(
    project_dir: &Path,
    id: Option<&str>,
    auto_approve: bool,
) -> Result<()> {
    let mut orchestrator = build_orchestrator(project_dir, auto_approve)?;
    let state = orchestrator.resume(id).await?;
    print_outcome(&state);
    Ok(())
}
