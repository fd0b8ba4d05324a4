use std::path::Path;

use anyhow::{Context, Result, bail};
use console::style;

use crate::core::config::IdentityInput;
use crate::core::home::AgentHome;
use crate::core::orchestrator::{self, CycleOutcome};
use crate::core::scheduler::NativeScheduler;
use crate::core::source::HttpSource;
use crate::core::supervisor::AgentCommand;
use crate::core::terminal::{self, print_step, print_success, print_warn};
use crate::core::{bootstrap, config};

/// Unattended machine setup: ensure the runtime, materialize configuration,
/// register the boot and recurring tasks, and run the first update cycle.
/// Safe to re-run at any time; an existing installation is converged, not
/// duplicated.
pub async fn run_install(home: &AgentHome, args: &[String]) -> Result<()> {
    terminal::print_banner();

    let parsed = super::parse_install_args(args, 2);
    let Some(store_id) = parsed.store_id else {
        bail!("--store-id is required (e.g. outpost install --store-id S042 --store-name \"Maple & 5th\")");
    };
    let store_name = parsed.store_name.unwrap_or_else(|| store_id.clone());

    print_step("1/3 Checking agent runtime...");
    let version = bootstrap::ensure_runtime().context("dependency bootstrap failed")?;
    print_success(&format!("Runtime ready: {version}"));

    print_step("2/3 Resolving machine configuration...");
    home.ensure_scaffold()
        .context("failed to create outpost state directories")?;
    crate::logging::init(home);

    let input = IdentityInput {
        store_id,
        store_name,
        endpoint_url: parsed.endpoint,
        source_url: parsed.source,
    };
    let record = config::resolve_config(home, &input)?;
    print_success(&format!(
        "Store {} ({}) reporting to {}",
        style(&record.store_id).cyan().bold(),
        record.store_name,
        record.central_server_url
    ));

    print_step("3/3 Registering scheduled tasks and running first update cycle...");
    let source = HttpSource::new(&record.update_source_url)?;
    let agent_cmd = AgentCommand::resolve(home)?;
    let exe = std::env::current_exe().context("cannot determine own binary path")?;
    let report = orchestrator::perform_install(
        home,
        &input,
        &NativeScheduler,
        &source,
        &shell_invocation(&exe),
        &agent_cmd,
    )
    .await?;

    print_success(&format!(
        "Tasks registered: {} (boot), {} (every {} min)",
        report.agent_task,
        report.update_task,
        report.config.poll_interval().as_secs() / 60
    ));

    match report.cycle {
        CycleOutcome::Updated => print_success("Agent code deployed and agent running."),
        CycleOutcome::NoChange => print_success("Agent code already current."),
        CycleOutcome::UpdatedRestartFailed => print_warn(
            "Agent code deployed, but the agent could not be (re)started; the next scheduled cycle will retry.",
        ),
        CycleOutcome::PollFailed => print_warn(
            "Update source unreachable; the scheduled cycle will keep retrying. See the log directory for details.",
        ),
    }

    println!();
    print_success("Installation complete.");
    Ok(())
}

/// The registered command line is re-parsed by the host scheduler (a shell
/// for cron, the task service for schtasks), so a binary path containing
/// spaces must be quoted to survive that parse.
fn shell_invocation(exe: &Path) -> String {
    let raw = exe.display().to_string();
    if raw.contains(' ') {
        format!("\"{raw}\"")
    } else {
        raw
    }
}
