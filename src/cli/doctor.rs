use std::time::Duration;

use anyhow::Result;

use crate::core::bootstrap;
use crate::core::config;
use crate::core::home::AgentHome;
use crate::core::orchestrator::{self, FAILURE_ALERT_THRESHOLD};
use crate::core::scheduler::{NativeScheduler, TaskScheduler};
use crate::core::source::UpdateSourceRef;
use crate::core::supervisor::{self, AgentStatus};
use crate::core::terminal::{print_info, print_step, print_success, print_warn};

/// Read-only diagnostic pass over everything an unattended machine needs:
/// configuration, runtime, connectivity, agent process, registrations.
pub async fn run_doctor(home: &AgentHome) -> Result<()> {
    print_step("Outpost Doctor - checking this machine...");
    println!();

    // 1. Configuration
    let record = match config::load_config(home)? {
        Some(record) => {
            print_success(&format!(
                "config.json is valid (store {}, endpoint {})",
                record.store_id, record.central_server_url
            ));
            Some(record)
        }
        None => {
            print_warn(&format!(
                "No config record at {}; run 'outpost install' first.",
                home.config_path().display()
            ));
            None
        }
    };

    // 2. Agent runtime
    match bootstrap::probe_runtime() {
        Some(version) => print_success(&format!("Agent runtime available: {version}")),
        None => print_warn("Agent runtime is missing! 'outpost install' will install it."),
    }

    // 3. Connectivity
    if let Some(record) = &record {
        let client = reqwest::Client::builder()
            .user_agent("outpost-doctor")
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(10))
            .build()?;
        // Any HTTP response counts as reachable; the doctor probes the path,
        // not the API contract.
        match client.get(&record.central_server_url).send().await {
            Ok(resp) => print_success(&format!(
                "Central endpoint reachable (HTTP {})",
                resp.status().as_u16()
            )),
            Err(e) => print_warn(&format!("Central endpoint unreachable: {e}")),
        }
        match client
            .get(format!(
                "{}/manifest.json",
                record.update_source_url.trim_end_matches('/')
            ))
            .send()
            .await
        {
            Ok(resp) => print_success(&format!(
                "Update source reachable (HTTP {})",
                resp.status().as_u16()
            )),
            Err(e) => print_warn(&format!("Update source unreachable: {e}")),
        }
    }

    // 4. Applied code version and failure streak
    match UpdateSourceRef::load(home).as_deref() {
        Some(marker) => print_success(&format!("Applied code marker: {marker}")),
        None => print_info("No update has been applied yet."),
    }
    let streak = orchestrator::failure_streak(home);
    if streak >= FAILURE_ALERT_THRESHOLD {
        print_warn(&format!(
            "Last {streak} update cycles failed in a row; check the update source."
        ));
    } else if streak > 0 {
        print_info(&format!("{streak} consecutive update cycle(s) have failed."));
    }

    // 5. Agent process
    match supervisor::agent_status(home) {
        AgentStatus::Running(pid) => print_success(&format!("Agent process running (PID {pid})")),
        AgentStatus::Stopped => print_warn("Agent process is not running."),
    }

    // 6. Scheduled tasks
    if let Some(record) = &record {
        let scheduler = NativeScheduler;
        for name in [
            format!("outpost-agent-{}", record.store_id),
            format!("outpost-update-{}", record.store_id),
        ] {
            match scheduler.is_registered(&name) {
                Ok(true) => print_success(&format!("Scheduled task '{name}' is registered.")),
                Ok(false) => print_warn(&format!("Scheduled task '{name}' is missing!")),
                Err(e) => print_warn(&format!("Could not query scheduled task '{name}': {e}")),
            }
        }
    }

    println!();
    Ok(())
}
