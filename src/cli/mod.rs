mod agent_cmd;
mod doctor;
mod install;
mod status;
mod uninstall;
mod update;

use anyhow::Result;
use console::style;

use crate::core::home::AgentHome;
use crate::core::terminal::{self, GuideSection, print_error};

fn print_help() {
    terminal::print_banner();

    GuideSection::new("Setup")
        .command("install", "Bootstrap this machine and register scheduled tasks")
        .command("uninstall", "Stop the agent and remove registrations")
        .print();

    GuideSection::new("Fleet")
        .command("update", "Run one update cycle (poll, apply, restart)")
        .command("agent-start", "Start the data-collection agent")
        .command("agent-stop", "Stop the data-collection agent")
        .print();

    GuideSection::new("Diagnostics")
        .command("status", "Show identity, code version, and agent state")
        .command("doctor", "Check runtime, connectivity, and registrations")
        .print();

    println!(
        "\n {} {} <command> [flags]\n",
        style("Usage:").bold(),
        style("outpost").green()
    );
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct InstallArgs {
    pub store_id: Option<String>,
    pub store_name: Option<String>,
    pub endpoint: Option<String>,
    pub source: Option<String>,
}

pub(crate) fn parse_install_args(args: &[String], start: usize) -> InstallArgs {
    let mut parsed = InstallArgs::default();
    let mut i = start;
    while i < args.len() {
        match args[i].as_str() {
            "--store-id" => {
                if i + 1 < args.len() {
                    parsed.store_id = Some(args[i + 1].clone());
                    i += 2;
                } else {
                    i += 1;
                }
            }
            "--store-name" => {
                if i + 1 < args.len() {
                    parsed.store_name = Some(args[i + 1].clone());
                    i += 2;
                } else {
                    i += 1;
                }
            }
            "--endpoint" => {
                if i + 1 < args.len() {
                    parsed.endpoint = Some(args[i + 1].clone());
                    i += 2;
                } else {
                    i += 1;
                }
            }
            "--source" => {
                if i + 1 < args.len() {
                    parsed.source = Some(args[i + 1].clone());
                    i += 2;
                } else {
                    i += 1;
                }
            }
            _ => i += 1,
        }
    }
    parsed
}

pub async fn run_main() -> Result<()> {
    let args: Vec<String> = std::env::args().collect();
    let home = AgentHome::resolve();

    if args.len() < 2 {
        print_help();
        return Ok(());
    }

    match args[1].as_str() {
        "install" => install::run_install(&home, &args).await,
        "update" => update::run_update(&home).await,
        "status" => status::run_status(&home).await,
        "doctor" => doctor::run_doctor(&home).await,
        "agent-start" => agent_cmd::run_agent_start(&home).await,
        "agent-stop" => agent_cmd::run_agent_stop(&home).await,
        "uninstall" => uninstall::run_uninstall(&home, &args).await,
        "help" | "--help" | "-h" => {
            print_help();
            Ok(())
        }
        other => {
            print_error(&format!("Unknown command: {other}"));
            print_help();
            Ok(())
        }
    }
}
