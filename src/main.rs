use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod cmd;

#[derive(Parser)]
#[command(name = "atelier")]
#[command(version, about = "Durable workflow orchestrator for content production pipelines")]
pub struct Cli {
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Bypass all approval gates (unattended runs)
    #[arg(long, global = true)]
    pub yes: bool,

    #[arg(long, global = true)]
    pub project_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize the .atelier directory with a sample configuration
    Init,
    /// Start a new workflow from a prompt
    Run {
        /// What to produce
        prompt: String,
        /// Generation engine to hand to the executors
        #[arg(long, default_value = "default")]
        engine: String,
    },
    /// Resume a persisted workflow at its current phase
    Resume {
        /// Workflow id; defaults to the most recent unfinished workflow
        id: Option<String>,
    },
    /// Show one workflow in detail
    Status {
        /// Workflow id; defaults to the most recent workflow
        id: Option<String>,
    },
    /// List stored workflows
    List {
        /// Also delete finished workflows older than this many days
        #[arg(long)]
        prune_days: Option<i64>,
    },
    /// Cancel a non-terminal workflow
    Cancel { id: String },
    /// List checkpoints of a workflow
    Checkpoints { id: String },
    /// Restore a checkpoint snapshot as the current workflow state
    Rollback { checkpoint_id: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "atelier=debug" } else { "atelier=info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(false)
        .init();

    let project_dir = match &cli.project_dir {
        Some(dir) => dir.clone(),
        None => std::env::current_dir()?,
    };

    match &cli.command {
        Commands::Init => cmd::cmd_init(&project_dir),
        Commands::Run { prompt, engine } => {
            cmd::cmd_run(&project_dir, prompt, engine, cli.yes).await
        }
        Commands::Resume { id } => cmd::cmd_resume(&project_dir, id.as_deref(), cli.yes).await,
        Commands::Status { id } => cmd::cmd_status(&project_dir, id.as_deref()),
        Commands::List { prune_days } => cmd::cmd_list(&project_dir, *prune_days),
        Commands::Cancel { id } => cmd::cmd_cancel(&project_dir, id),
        Commands::Checkpoints { id } => cmd::cmd_checkpoints(&project_dir, id),
        Commands::Rollback { checkpoint_id } => cmd::cmd_rollback(&project_dir, checkpoint_id),
    }
}
