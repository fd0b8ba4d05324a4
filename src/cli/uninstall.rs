use std::io::{self, Write};

use anyhow::{Context, Result};
use console::style;

use crate::core::config;
use crate::core::home::AgentHome;
use crate::core::scheduler::{NativeScheduler, TaskScheduler};
use crate::core::supervisor;
use crate::core::terminal::{print_step, print_success, print_warn};

/// Stop the agent and remove both scheduled-task registrations. With
/// `--purge`, also delete the home directory (config, code, logs, marker).
pub async fn run_uninstall(home: &AgentHome, args: &[String]) -> Result<()> {
    let purge = args.iter().any(|a| a == "--purge");
    let assume_yes = args.iter().any(|a| a == "--yes" || a == "-y");

    println!();
    print_warn("This will stop the agent and remove its scheduled tasks.");
    if purge {
        print_warn(&format!(
            "--purge will also delete {} (config, agent code, logs).",
            home.root().display()
        ));
    }
    println!();

    if !assume_yes {
        print!("{} ", style("Continue? [y/N]").yellow().bold());
        io::stdout().flush()?;
        let mut input = String::new();
        io::stdin().read_line(&mut input)?;
        let input = input.trim().to_lowercase();
        if input != "y" && input != "yes" {
            println!("{}", style("Uninstall cancelled.").dim());
            return Ok(());
        }
    }

    print_step("Stopping agent...");
    match supervisor::stop_agent(home) {
        Ok(true) => print_success("Agent stopped."),
        Ok(false) => print_success("Agent was not running."),
        Err(e) => print_warn(&format!("Could not stop agent: {e}")),
    }

    match config::load_config(home) {
        Ok(Some(record)) => {
            let scheduler = NativeScheduler;
            for name in [
                format!("outpost-agent-{}", record.store_id),
                format!("outpost-update-{}", record.store_id),
            ] {
                print_step(&format!("Removing scheduled task '{name}'..."));
                match scheduler.unregister(&name) {
                    Ok(()) => print_success("Removed."),
                    Err(e) => print_warn(&format!("Could not remove '{name}': {e}")),
                }
            }
        }
        Ok(None) => print_warn("No config record found; skipping task removal."),
        Err(e) => print_warn(&format!("Could not read config: {e:#}")),
    }

    if purge && home.root().exists() {
        print_step(&format!("Removing {} ...", home.root().display()));
        std::fs::remove_dir_all(home.root())
            .with_context(|| format!("failed to remove {}", home.root().display()))?;
    }

    println!();
    print_success("outpost has been uninstalled.");
    println!();
    Ok(())
}
