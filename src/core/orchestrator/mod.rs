use anyhow::{Context, Result};
use tracing::{error, info, warn};

use crate::core::config::{self, ConfigRecord, IdentityInput};
use crate::core::home::{self, AgentHome};
use crate::core::scheduler::{TaskRegistration, TaskScheduler};
use crate::core::source::{self, UpdateOutcome, UpdateSource};
use crate::core::supervisor::{self, AgentCommand, AgentStatus};

/// Consecutive failed poll cycles before a distinct alert is raised. At the
/// default hourly interval this is six hours of unreachability.
pub const FAILURE_ALERT_THRESHOLD: u32 = 6;

#[derive(Debug, PartialEq, Eq)]
pub enum CycleOutcome {
    NoChange,
    Updated,
    /// New code is staged and the marker advanced, but the restart failed;
    /// the next tick retries the restart without re-fetching anything.
    UpdatedRestartFailed,
    PollFailed,
}

/// One update cycle: poll the source, apply if its marker moved, restart the
/// agent onto the new code.
///
/// This single sequence is invoked synchronously at install time and by every
/// scheduled tick. It never loops or retries internally; the recurring
/// trigger is the retry mechanism, so every failure path simply ends the
/// cycle in a state the next tick can pick up from.
pub async fn run_cycle(
    home: &AgentHome,
    update_source: &dyn UpdateSource,
    agent_cmd: &AgentCommand,
) -> CycleOutcome {
    match source::check_and_pull(home, update_source).await {
        UpdateOutcome::Failed(err) => {
            let streak = bump_failure_streak(home);
            warn!(
                error = %format!("{err:#}"),
                streak,
                "update poll failed; next scheduled run retries"
            );
            if streak >= FAILURE_ALERT_THRESHOLD && streak % FAILURE_ALERT_THRESHOLD == 0 {
                error!(
                    streak,
                    "update source has been unreachable for {streak} consecutive cycles"
                );
            }
            CycleOutcome::PollFailed
        }
        UpdateOutcome::NoChange => {
            clear_failure_streak(home);
            // A previous cycle may have applied code but failed the restart;
            // bring the agent up without re-fetching anything.
            if supervisor::agent_status(home) == AgentStatus::Stopped && home.agent_entry().exists()
            {
                match supervisor::ensure_single_instance(home, agent_cmd) {
                    Ok(handle) => info!(pid = handle.pid(), "agent was not running, started it"),
                    Err(err) => warn!(%err, "agent is not running and could not be started"),
                }
            }
            CycleOutcome::NoChange
        }
        UpdateOutcome::Applied(marker) => {
            clear_failure_streak(home);
            info!(%marker, "agent code updated, restarting agent");
            match supervisor::ensure_single_instance(home, agent_cmd) {
                Ok(handle) => {
                    info!(pid = handle.pid(), "agent restarted onto new code");
                    CycleOutcome::Updated
                }
                Err(err) => {
                    warn!(
                        %err,
                        "update applied but restart failed; the previous process may still be \
                         running old code until the next cycle"
                    );
                    CycleOutcome::UpdatedRestartFailed
                }
            }
        }
    }
}

pub fn failure_streak(home: &AgentHome) -> u32 {
    std::fs::read_to_string(home.failures_path())
        .ok()
        .and_then(|raw| raw.trim().parse().ok())
        .unwrap_or(0)
}

fn bump_failure_streak(home: &AgentHome) -> u32 {
    let streak = failure_streak(home) + 1;
    let _ = home::write_atomic(&home.failures_path(), streak.to_string().as_bytes());
    streak
}

fn clear_failure_streak(home: &AgentHome) {
    let _ = std::fs::remove_file(home.failures_path());
}

#[derive(Debug)]
pub struct InstallReport {
    pub config: ConfigRecord,
    pub cycle: CycleOutcome,
    pub agent_task: String,
    pub update_task: String,
}

/// The idempotent install sequence: resolve configuration, (re)register both
/// scheduled tasks, then run one update cycle synchronously so the machine is
/// current before the first tick ever fires. Re-running converges on the same
/// end state: one config record, one registration per role, one agent.
///
/// Runtime bootstrap happens before this in the CLI so a bootstrap failure
/// aborts with no registration made.
pub async fn perform_install(
    home: &AgentHome,
    input: &IdentityInput,
    scheduler: &dyn TaskScheduler,
    update_source: &dyn UpdateSource,
    exe_invocation: &str,
    agent_cmd: &AgentCommand,
) -> Result<InstallReport> {
    let config = config::resolve_config(home, input)?;

    let agent_task = TaskRegistration::agent_launch(
        &config.store_id,
        format!("{exe_invocation} agent-start"),
    );
    let update_task = TaskRegistration::update_cycle(
        &config.store_id,
        config.poll_interval(),
        format!("{exe_invocation} update"),
    );
    scheduler
        .register(&agent_task)
        .with_context(|| format!("failed to register scheduled task '{}'", agent_task.name))?;
    scheduler
        .register(&update_task)
        .with_context(|| format!("failed to register scheduled task '{}'", update_task.name))?;

    let cycle = run_cycle(home, update_source, agent_cmd).await;

    Ok(InstallReport {
        config,
        cycle,
        agent_task: agent_task.name,
        update_task: update_task.name,
    })
}
