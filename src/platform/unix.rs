use std::io::Write;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::process::{Command, Output, Stdio};

use super::Platform;

pub struct NativePlatform;

/// Trailing tag that marks a crontab line as owned by a named outpost task.
fn cron_tag(name: &str) -> String {
    format!("# outpost:{name}")
}

/// Rewrite a crontab: drop every line tagged with this task name, then append
/// `line` (if any) carrying the tag. Running this twice with the same name can
/// never leave two entries behind.
pub(crate) fn upsert_cron_entry(existing: &str, name: &str, line: Option<&str>) -> String {
    let tag = cron_tag(name);
    let mut out = String::new();
    for l in existing.lines() {
        if l.trim_end().ends_with(tag.as_str()) {
            continue;
        }
        out.push_str(l);
        out.push('\n');
    }
    if let Some(line) = line {
        out.push_str(line);
        out.push(' ');
        out.push_str(&tag);
        out.push('\n');
    }
    out
}

/// Cron schedule expression firing every `minutes`. Sub-hour intervals use a
/// minute step; whole-hour intervals use an hour step (`*/90` minutes is not
/// valid cron, so in-between values round down to the hour).
pub(crate) fn cron_schedule(minutes: u32) -> String {
    let minutes = minutes.max(1);
    if minutes < 60 {
        format!("*/{minutes} * * * *")
    } else {
        let hours = (minutes / 60).min(23).max(1);
        format!("0 */{hours} * * *")
    }
}

fn read_crontab() -> std::io::Result<String> {
    let out = Command::new("crontab").arg("-l").output()?;
    if out.status.success() {
        Ok(String::from_utf8_lossy(&out.stdout).into_owned())
    } else {
        // "no crontab for <user>" is the empty starting state.
        Ok(String::new())
    }
}

fn write_crontab(contents: &str) -> std::io::Result<Output> {
    let mut child = Command::new("crontab")
        .arg("-")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()?;
    if let Some(mut stdin) = child.stdin.take() {
        stdin.write_all(contents.as_bytes())?;
    }
    child.wait_with_output()
}

fn upsert_task(name: &str, line: Option<&str>) -> std::io::Result<Output> {
    let existing = read_crontab()?;
    write_crontab(&upsert_cron_entry(&existing, name, line))
}

impl Platform for NativePlatform {
    fn runtime_candidates() -> &'static [&'static str] {
        &["python3", "python"]
    }

    fn install_runtime() -> std::io::Result<std::process::ExitStatus> {
        // First package manager present wins; exit 127 if none is available.
        let script = "if command -v apt-get >/dev/null 2>&1; then sudo apt-get install -y python3; \
                      elif command -v dnf >/dev/null 2>&1; then sudo dnf install -y python3; \
                      elif command -v pacman >/dev/null 2>&1; then sudo pacman -S --noconfirm python; \
                      else exit 127; fi";
        Command::new("sh").args(["-c", script]).status()
    }

    fn runtime_missing_hint() -> &'static str {
        "Install Python 3 with your package manager (e.g. 'sudo apt-get install python3') and re-run."
    }

    fn process_alive(pid: u32) -> bool {
        #[cfg(target_os = "linux")]
        {
            // Reading /proc lets us distinguish a zombie (dead but unreaped)
            // from a live process, which `kill -0` cannot.
            let Ok(stat) = std::fs::read_to_string(format!("/proc/{pid}/stat")) else {
                return false;
            };
            match stat.rfind(')') {
                Some(end) => !matches!(stat[end + 1..].trim_start().chars().next(), Some('Z') | None),
                None => false,
            }
        }
        #[cfg(not(target_os = "linux"))]
        {
            Command::new("kill")
                .args(["-0", &pid.to_string()])
                .output()
                .map(|o| o.status.success())
                .unwrap_or(false)
        }
    }

    fn terminate_process(pid: u32) -> std::io::Result<Output> {
        Command::new("kill")
            .args(["-15", &pid.to_string()])
            .output()
    }

    fn kill_process(pid: u32) -> std::io::Result<Output> {
        Command::new("kill").args(["-9", &pid.to_string()]).output()
    }

    fn create_boot_task(name: &str, command: &str) -> std::io::Result<Output> {
        upsert_task(name, Some(&format!("@reboot {command}")))
    }

    fn create_recurring_task(name: &str, command: &str, minutes: u32) -> std::io::Result<Output> {
        upsert_task(name, Some(&format!("{} {command}", cron_schedule(minutes))))
    }

    fn delete_task(name: &str) -> std::io::Result<Output> {
        upsert_task(name, None)
    }

    fn task_exists(name: &str) -> std::io::Result<bool> {
        Ok(read_crontab()?.contains(&cron_tag(name)))
    }

    fn restrict_dir_permissions(path: &Path) {
        let _ = std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o700));
    }

    fn restrict_file_permissions(path: &Path) {
        let _ = std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600));
    }

    fn data_dir() -> PathBuf {
        dirs::home_dir()
            .expect("Could not find home directory")
            .join(".outpost")
    }
}
