use anyhow::{Result, bail};
use console::style;

use crate::core::home::AgentHome;
use crate::core::supervisor::{self, AgentCommand, AgentStatus};
use crate::core::terminal::{print_info, print_success, print_warn};

/// Boot-trigger entry point. Idempotent: an already-running agent is left
/// alone so a boot trigger racing a scheduled update can never produce two
/// instances.
pub async fn run_agent_start(home: &AgentHome) -> Result<()> {
    if !home.is_installed() {
        bail!("outpost is not installed on this machine; run 'outpost install' first");
    }
    crate::logging::init(home);

    if let AgentStatus::Running(pid) = supervisor::agent_status(home) {
        print_info(&format!("Agent already running (PID {pid})."));
        return Ok(());
    }

    if !home.agent_entry().exists() {
        print_warn("No agent code present yet; the next update cycle will fetch it.");
        return Ok(());
    }

    let cmd = AgentCommand::resolve(home)?;
    let handle = supervisor::ensure_single_instance(home, &cmd)?;
    print_success(&format!(
        "Agent started ({} PID {})",
        style("RUNNING").green().bold(),
        handle.pid()
    ));
    Ok(())
}

pub async fn run_agent_stop(home: &AgentHome) -> Result<()> {
    crate::logging::init(home);
    if supervisor::stop_agent(home)? {
        print_success("Agent stopped.");
    } else {
        print_info("Agent is not currently running.");
    }
    Ok(())
}
