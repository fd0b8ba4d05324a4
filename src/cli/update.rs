use anyhow::{Result, bail};

use crate::core::config;
use crate::core::home::AgentHome;
use crate::core::orchestrator::{self, CycleOutcome};
use crate::core::source::HttpSource;
use crate::core::supervisor::AgentCommand;
use crate::core::terminal::{print_info, print_success, print_warn};

/// One scheduled tick: the same cycle `install` runs synchronously. Poll
/// failures exit 0 — the recurring trigger is the retry loop, and a non-zero
/// exit would only make the host scheduler mark a perfectly healthy
/// installation as failing.
pub async fn run_update(home: &AgentHome) -> Result<()> {
    let Some(record) = config::load_config(home)? else {
        bail!("outpost is not installed on this machine; run 'outpost install' first");
    };
    crate::logging::init(home);

    let source = HttpSource::new(&record.update_source_url)?;
    let agent_cmd = AgentCommand::resolve(home)?;

    match orchestrator::run_cycle(home, &source, &agent_cmd).await {
        CycleOutcome::NoChange => print_info("Agent code is current."),
        CycleOutcome::Updated => print_success("Update applied; agent restarted onto new code."),
        CycleOutcome::UpdatedRestartFailed => {
            print_warn("Update applied but the restart failed; the next cycle will retry.")
        }
        CycleOutcome::PollFailed => {
            print_warn("Update poll failed; the next scheduled cycle will retry.")
        }
    }
    Ok(())
}
