//! Project initialization command.

use std::path::Path;

use anyhow::{Context, Result};
use console::style;

use atelier::config::{ATELIER_DIR, CONFIG_FILE};

const SAMPLE_CONFIG: &str = r#"# atelier configuration
# Every setting is optional; the values below are the defaults.

[core]
# Retries per phase after the initial attempt.
max_retries = 2
# Checkpoints retained per workflow before the oldest are pruned.
max_checkpoints = 50
# Bypass all approval gates (unattended runs). The --yes flag does the
# same for a single invocation.
auto_approve = false
# Upper bound in seconds on waiting for one gate decision.
# Unset waits indefinitely.
#approval_timeout_secs = 3600

[executors]
# Command line per phase. Each command receives the workflow state as
# JSON on stdin and prints its artifact descriptor as JSON on stdout.
#design = "python3 tools/design_agent.py"
#build = "python3 tools/codegen.py"
#qa = "npx playwright test --reporter=json"
#publish = "python3 tools/package.py"
"#;

pub fn cmd_init(project_dir: &Path) -> Result<()> {
    let atelier_dir = project_dir.join(ATELIER_DIR);
    let config_path = atelier_dir.join(CONFIG_FILE);

    if config_path.exists() {
        println!("Project already initialized at {}", atelier_dir.display());
        return Ok(());
    }

    std::fs::create_dir_all(atelier_dir.join("state"))
        .context("Failed to create state directory")?;
    std::fs::create_dir_all(atelier_dir.join("checkpoints"))
        .context("Failed to create checkpoint directory")?;
    std::fs::write(&config_path, SAMPLE_CONFIG).context("Failed to write sample config")?;

    println!(
        "{} atelier project at {}",
        style("Initialized").green().bold(),
        atelier_dir.display()
    );
    println!("Edit {} to configure your phase executors.", config_path.display());
    Ok(())
}
