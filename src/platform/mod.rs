use std::path::{Path, PathBuf};

/// Platform-specific operations abstracted behind a common interface.
/// Each OS provides its own `NativePlatform` implementation so call sites
/// remain free of `#[cfg]` blocks.
pub trait Platform {
    /// Candidate interpreter binaries for the agent runtime, in probe order.
    fn runtime_candidates() -> &'static [&'static str];

    /// Install the agent runtime non-interactively.
    fn install_runtime() -> std::io::Result<std::process::ExitStatus>;

    /// Human-readable hint shown when the runtime cannot be installed automatically.
    fn runtime_missing_hint() -> &'static str;

    /// True if a process with `pid` is currently alive (zombies count as dead).
    fn process_alive(pid: u32) -> bool;

    /// Ask the process to shut down gracefully (SIGTERM / `taskkill`).
    fn terminate_process(pid: u32) -> std::io::Result<std::process::Output>;

    /// Forcibly kill the process (SIGKILL / `taskkill /F`).
    fn kill_process(pid: u32) -> std::io::Result<std::process::Output>;

    /// Create or replace a boot-triggered scheduler entry under `name`.
    fn create_boot_task(name: &str, command: &str) -> std::io::Result<std::process::Output>;

    /// Create or replace a recurring scheduler entry firing every `minutes`.
    fn create_recurring_task(
        name: &str,
        command: &str,
        minutes: u32,
    ) -> std::io::Result<std::process::Output>;

    /// Remove the scheduler entry under `name`, if present.
    fn delete_task(name: &str) -> std::io::Result<std::process::Output>;

    /// True if a scheduler entry with `name` currently exists.
    fn task_exists(name: &str) -> std::io::Result<bool>;

    /// Set restrictive *directory* permissions (0o700 on Unix, no-op on Windows).
    fn restrict_dir_permissions(path: &Path);

    /// Set restrictive *file* permissions (0o600 on Unix, no-op on Windows).
    fn restrict_file_permissions(path: &Path);

    /// Root data directory for outpost.
    /// Unix: `~/.outpost`, Windows: `%APPDATA%\outpost`.
    fn data_dir() -> PathBuf;
}

#[cfg(unix)]
mod unix;
#[cfg(unix)]
pub use unix::NativePlatform;

#[cfg(windows)]
mod windows;
#[cfg(windows)]
pub use windows::NativePlatform;
