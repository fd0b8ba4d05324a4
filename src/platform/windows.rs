use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use super::Platform;

pub struct NativePlatform;

impl Platform for NativePlatform {
    fn runtime_candidates() -> &'static [&'static str] {
        &["python", "py"]
    }

    fn install_runtime() -> std::io::Result<std::process::ExitStatus> {
        Command::new("winget")
            .args([
                "install",
                "--id",
                "Python.Python.3.12",
                "-e",
                "--silent",
                "--accept-package-agreements",
                "--accept-source-agreements",
            ])
            .status()
    }

    fn runtime_missing_hint() -> &'static str {
        "Install Python 3 from python.org (check 'Add python.exe to PATH') and re-run."
    }

    fn process_alive(pid: u32) -> bool {
        let Ok(out) = Command::new("tasklist")
            .args(["/FI", &format!("PID eq {pid}"), "/NH", "/FO", "CSV"])
            .output()
        else {
            return false;
        };
        // tasklist exits 0 even when the filter matches nothing; it prints an
        // INFO line instead of a CSV row in that case.
        String::from_utf8_lossy(&out.stdout).contains(&format!("\"{pid}\""))
    }

    fn terminate_process(pid: u32) -> std::io::Result<Output> {
        Command::new("taskkill")
            .args(["/PID", &pid.to_string()])
            .output()
    }

    fn kill_process(pid: u32) -> std::io::Result<Output> {
        Command::new("taskkill")
            .args(["/F", "/PID", &pid.to_string()])
            .output()
    }

    fn create_boot_task(name: &str, command: &str) -> std::io::Result<Output> {
        // /F makes create-over-existing replace semantics native.
        Command::new("schtasks")
            .args([
                "/Create", "/F", "/TN", name, "/SC", "ONSTART", "/RL", "HIGHEST", "/TR", command,
            ])
            .output()
    }

    fn create_recurring_task(name: &str, command: &str, minutes: u32) -> std::io::Result<Output> {
        let minutes = minutes.clamp(1, 1439).to_string();
        Command::new("schtasks")
            .args([
                "/Create", "/F", "/TN", name, "/SC", "MINUTE", "/MO", &minutes, "/TR", command,
            ])
            .output()
    }

    fn delete_task(name: &str) -> std::io::Result<Output> {
        Command::new("schtasks")
            .args(["/Delete", "/F", "/TN", name])
            .output()
    }

    fn task_exists(name: &str) -> std::io::Result<bool> {
        Command::new("schtasks")
            .args(["/Query", "/TN", name])
            .output()
            .map(|o| o.status.success())
    }

    fn restrict_dir_permissions(_path: &Path) {
        // Windows uses ACLs; no simple equivalent to Unix mode bits.
    }

    fn restrict_file_permissions(_path: &Path) {
        // Windows uses ACLs; no simple equivalent to Unix mode bits.
    }

    fn data_dir() -> PathBuf {
        dirs::data_dir()
            .expect("Could not find data directory")
            .join("outpost")
    }
}
