use anyhow::Result;
use console::style;

use crate::core::config;
use crate::core::home::AgentHome;
use crate::core::scheduler::{NativeScheduler, TaskScheduler};
use crate::core::source::UpdateSourceRef;
use crate::core::supervisor::{self, AgentStatus};
use crate::core::terminal::{GuideSection, print_warn};

pub async fn run_status(home: &AgentHome) -> Result<()> {
    let Some(record) = config::load_config(home)? else {
        print_warn("outpost is not installed on this machine; run 'outpost install' first.");
        return Ok(());
    };

    let marker = UpdateSourceRef::load(home);
    let agent = match supervisor::agent_status(home) {
        AgentStatus::Running(pid) => format!(
            "{} (PID {})",
            style("RUNNING").green().bold(),
            style(pid).dim()
        ),
        AgentStatus::Stopped => style("STOPPED").red().bold().to_string(),
    };

    let scheduler = NativeScheduler;
    let task_line = |name: &str| match scheduler.is_registered(name) {
        Ok(true) => style("registered").green().to_string(),
        Ok(false) => style("missing").red().to_string(),
        Err(_) => style("unknown").yellow().to_string(),
    };

    GuideSection::new("Outpost Status")
        .status(
            "Store",
            &format!("{} ({})", record.store_id, record.store_name),
        )
        .status("Endpoint", &record.central_server_url)
        .status("Update source", &record.update_source_url)
        .status("Applied marker", marker.as_deref().unwrap_or("<none>"))
        .status("Agent", &agent)
        .status(
            "Boot task",
            &task_line(&format!("outpost-agent-{}", record.store_id)),
        )
        .status(
            "Update task",
            &task_line(&format!("outpost-update-{}", record.store_id)),
        )
        .blank()
        .info("Run 'outpost doctor' for a full health check.")
        .print();
    println!();
    Ok(())
}
