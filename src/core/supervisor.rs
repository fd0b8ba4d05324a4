use std::path::PathBuf;
use std::process::Stdio;
use std::time::{Duration, Instant};

use anyhow::Context;
use thiserror::Error;
use tracing::{info, warn};

use crate::core::bootstrap;
use crate::core::home::{self, AgentHome};
use crate::platform::{NativePlatform, Platform};

/// How long a terminated agent gets to exit on its own before being killed,
/// and how long a kill gets to take effect.
const GRACE_PERIOD: Duration = Duration::from_secs(5);
const FORCE_PERIOD: Duration = Duration::from_secs(5);
const EXIT_POLL: Duration = Duration::from_millis(100);

/// How long one invocation waits for another one's supervisor lock. Covers a
/// full graceful-plus-forced termination with headroom.
const LOCK_WAIT: Duration = Duration::from_secs(30);
const LOCK_POLL: Duration = Duration::from_millis(50);

#[derive(Debug, Error)]
pub enum SupervisorError {
    #[error("agent process {pid} survived forced termination")]
    TerminateTimedOut { pid: u32 },
    #[error("failed to launch agent process: {0}")]
    Spawn(std::io::Error),
    #[error("failed to record agent pid: {0}")]
    PidFile(std::io::Error),
    #[error("failed to take the supervisor lock: {0}")]
    Lock(std::io::Error),
    #[error("another supervisor invocation held the lock for too long")]
    LockBusy,
}

/// Reference to the one running agent instance. The pid file under `run/` is
/// the stable discriminator: it survives orchestrator restarts, and a pid
/// whose process is dead reads as "not running" rather than trusted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AgentProcessHandle {
    pid: u32,
}

impl AgentProcessHandle {
    pub fn pid(&self) -> u32 {
        self.pid
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AgentStatus {
    Running(u32),
    Stopped,
}

/// Invocation used to (re)launch the agent.
#[derive(Debug, Clone)]
pub struct AgentCommand {
    pub program: String,
    pub args: Vec<String>,
    pub workdir: PathBuf,
}

impl AgentCommand {
    /// The standard invocation: the probed runtime interpreter running the
    /// entry script inside the live code tree.
    pub fn resolve(home: &AgentHome) -> anyhow::Result<Self> {
        let runtime = bootstrap::runtime_binary()
            .context("no agent runtime interpreter found; run 'outpost install' first")?;
        Ok(Self {
            program: runtime.to_string(),
            args: vec![home.agent_entry().display().to_string()],
            workdir: home.agent_dir(),
        })
    }
}

/// Held while resolving, terminating, or launching the agent so overlapping
/// invocations (an installer run racing a scheduled tick) serialize instead
/// of each spawning its own instance. The file holds the owner's pid; a lock
/// whose owner is dead is stale and reclaimed.
struct SupervisorLock {
    path: PathBuf,
}

impl Drop for SupervisorLock {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.path);
    }
}

fn acquire_lock(home: &AgentHome) -> Result<SupervisorLock, SupervisorError> {
    let path = home.lock_path();
    let deadline = Instant::now() + LOCK_WAIT;
    loop {
        match std::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
        {
            Ok(mut file) => {
                use std::io::Write;
                let _ = file.write_all(std::process::id().to_string().as_bytes());
                return Ok(SupervisorLock { path });
            }
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                if let Ok(raw) = std::fs::read_to_string(&path)
                    && let Ok(owner) = raw.trim().parse::<u32>()
                    && !NativePlatform::process_alive(owner)
                {
                    let _ = std::fs::remove_file(&path);
                    continue;
                }
                if Instant::now() >= deadline {
                    return Err(SupervisorError::LockBusy);
                }
                std::thread::sleep(LOCK_POLL);
            }
            Err(e) => return Err(SupervisorError::Lock(e)),
        }
    }
}

fn live_pid(home: &AgentHome) -> Option<u32> {
    let raw = std::fs::read_to_string(home.pid_path()).ok()?;
    let pid: u32 = raw.trim().parse().ok()?;
    NativePlatform::process_alive(pid).then_some(pid)
}

pub fn agent_status(home: &AgentHome) -> AgentStatus {
    match live_pid(home) {
        Some(pid) => AgentStatus::Running(pid),
        None => AgentStatus::Stopped,
    }
}

fn wait_for_exit(pid: u32, budget: Duration) -> bool {
    let deadline = Instant::now() + budget;
    while Instant::now() < deadline {
        if !NativePlatform::process_alive(pid) {
            return true;
        }
        std::thread::sleep(EXIT_POLL);
    }
    !NativePlatform::process_alive(pid)
}

fn terminate_with_grace(pid: u32) -> Result<(), SupervisorError> {
    let _ = NativePlatform::terminate_process(pid);
    if wait_for_exit(pid, GRACE_PERIOD) {
        return Ok(());
    }
    warn!(pid, "agent ignored graceful shutdown, forcing");
    let _ = NativePlatform::kill_process(pid);
    if wait_for_exit(pid, FORCE_PERIOD) {
        Ok(())
    } else {
        Err(SupervisorError::TerminateTimedOut { pid })
    }
}

fn launch(home: &AgentHome, cmd: &AgentCommand) -> Result<AgentProcessHandle, SupervisorError> {
    let log = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(home.agent_log_path())
        .map_err(SupervisorError::Spawn)?;
    let err_log = log.try_clone().map_err(SupervisorError::Spawn)?;

    let child = std::process::Command::new(&cmd.program)
        .args(&cmd.args)
        .current_dir(&cmd.workdir)
        .stdin(Stdio::null())
        .stdout(log)
        .stderr(err_log)
        .spawn()
        .map_err(SupervisorError::Spawn)?;

    let pid = child.id();
    home::write_atomic(&home.pid_path(), pid.to_string().as_bytes())
        .map_err(SupervisorError::PidFile)?;
    info!(pid, program = %cmd.program, "agent launched");
    Ok(AgentProcessHandle { pid })
}

/// Terminate any live agent instance, then launch a fresh one. After a
/// successful return exactly one agent process runs under the recorded pid.
///
/// The lookup always goes through the pid file plus a liveness probe, never a
/// cached handle, and the whole resolve-terminate-launch sequence runs under
/// the supervisor lock, so two concurrent invocations converge on one
/// instance: the second caller sees the first one's pid file and replaces
/// that process instead of racing it.
pub fn ensure_single_instance(
    home: &AgentHome,
    cmd: &AgentCommand,
) -> Result<AgentProcessHandle, SupervisorError> {
    let _lock = acquire_lock(home)?;
    if let Some(pid) = live_pid(home) {
        info!(pid, "terminating running agent before relaunch");
        terminate_with_grace(pid)?;
    }
    launch(home, cmd)
}

/// Stop the agent if it is running. Returns whether a process was stopped.
pub fn stop_agent(home: &AgentHome) -> Result<bool, SupervisorError> {
    let _lock = acquire_lock(home)?;
    let stopped = match live_pid(home) {
        Some(pid) => {
            terminate_with_grace(pid)?;
            info!(pid, "agent stopped");
            true
        }
        None => false,
    };
    let _ = std::fs::remove_file(home.pid_path());
    Ok(stopped)
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    fn temp_home() -> (tempfile::TempDir, AgentHome) {
        let dir = tempfile::tempdir().unwrap();
        let home = AgentHome::new(dir.path());
        home.ensure_scaffold().unwrap();
        (dir, home)
    }

    fn sleeper(home: &AgentHome) -> AgentCommand {
        AgentCommand {
            program: "sh".to_string(),
            args: vec!["-c".to_string(), "sleep 30".to_string()],
            workdir: home.agent_dir(),
        }
    }

    #[test]
    fn absent_pid_file_reads_as_stopped() {
        let (_dir, home) = temp_home();
        assert_eq!(agent_status(&home), AgentStatus::Stopped);
    }

    #[test]
    fn stale_pid_file_reads_as_stopped() {
        let (_dir, home) = temp_home();
        // A pid from the top of the range will not belong to a live process.
        std::fs::write(home.pid_path(), "4194000").unwrap();
        assert_eq!(agent_status(&home), AgentStatus::Stopped);
    }

    #[test]
    fn garbage_pid_file_reads_as_stopped() {
        let (_dir, home) = temp_home();
        std::fs::write(home.pid_path(), "not-a-pid").unwrap();
        assert_eq!(agent_status(&home), AgentStatus::Stopped);
    }

    #[test]
    fn launch_records_a_live_pid() {
        let (_dir, home) = temp_home();
        let handle = ensure_single_instance(&home, &sleeper(&home)).unwrap();
        assert_eq!(agent_status(&home), AgentStatus::Running(handle.pid()));
        assert_eq!(
            std::fs::read_to_string(home.pid_path()).unwrap().trim(),
            handle.pid().to_string()
        );
        stop_agent(&home).unwrap();
    }

    #[test]
    fn relaunch_replaces_the_previous_instance() {
        let (_dir, home) = temp_home();
        let first = ensure_single_instance(&home, &sleeper(&home)).unwrap();
        let second = ensure_single_instance(&home, &sleeper(&home)).unwrap();

        assert_ne!(first.pid(), second.pid());
        assert!(!NativePlatform::process_alive(first.pid()));
        assert_eq!(agent_status(&home), AgentStatus::Running(second.pid()));
        stop_agent(&home).unwrap();
    }

    #[test]
    fn stop_kills_and_clears_the_pid_file() {
        let (_dir, home) = temp_home();
        let handle = ensure_single_instance(&home, &sleeper(&home)).unwrap();
        assert!(stop_agent(&home).unwrap());
        assert!(!NativePlatform::process_alive(handle.pid()));
        assert!(!home.pid_path().exists());
        assert!(!stop_agent(&home).unwrap());
    }

    #[test]
    fn concurrent_launches_converge_on_one_instance() {
        let (_dir, home) = temp_home();
        let barrier = std::sync::Arc::new(std::sync::Barrier::new(2));

        let threads: Vec<_> = (0..2)
            .map(|_| {
                let home = home.clone();
                let barrier = barrier.clone();
                let cmd = sleeper(&home);
                std::thread::spawn(move || {
                    barrier.wait();
                    ensure_single_instance(&home, &cmd).unwrap()
                })
            })
            .collect();
        let pids: Vec<u32> = threads
            .into_iter()
            .map(|t| t.join().unwrap().pid())
            .collect();

        // Whichever invocation went second replaced the first one's process.
        let live: Vec<u32> = pids
            .iter()
            .copied()
            .filter(|&pid| NativePlatform::process_alive(pid))
            .collect();
        assert_eq!(live.len(), 1, "expected one survivor, got {live:?}");
        assert_eq!(agent_status(&home), AgentStatus::Running(live[0]));

        stop_agent(&home).unwrap();
        assert!(!home.lock_path().exists());
    }

    #[test]
    fn stale_lock_from_a_dead_owner_is_reclaimed() {
        let (_dir, home) = temp_home();
        // A pid from the top of the range will not belong to a live process.
        std::fs::write(home.lock_path(), "4194000").unwrap();

        let handle = ensure_single_instance(&home, &sleeper(&home)).unwrap();
        assert_eq!(agent_status(&home), AgentStatus::Running(handle.pid()));
        stop_agent(&home).unwrap();
    }

    #[test]
    fn spawn_failure_is_reported() {
        let (_dir, home) = temp_home();
        let cmd = AgentCommand {
            program: "no-such-agent-binary-xyz".to_string(),
            args: vec![],
            workdir: home.agent_dir(),
        };
        assert!(matches!(
            ensure_single_instance(&home, &cmd),
            Err(SupervisorError::Spawn(_))
        ));
        assert_eq!(agent_status(&home), AgentStatus::Stopped);
    }
}
