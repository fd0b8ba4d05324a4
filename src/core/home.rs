use std::path::{Path, PathBuf};

use crate::platform::{NativePlatform, Platform};

/// Handle to the on-disk state shared by the orchestrator and the agent it
/// supervises. Everything outpost persists lives under a single root
/// directory; the handle is passed explicitly so tests can point it at a
/// temporary directory instead of the machine-wide location.
#[derive(Debug, Clone)]
pub struct AgentHome {
    root: PathBuf,
}

impl AgentHome {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Default home: `$OUTPOST_HOME` if set, otherwise the platform data dir.
    pub fn resolve() -> Self {
        match std::env::var_os("OUTPOST_HOME") {
            Some(dir) => Self::new(PathBuf::from(dir)),
            None => Self::new(NativePlatform::data_dir()),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Per-machine configuration record.
    pub fn config_path(&self) -> PathBuf {
        self.root.join("config.json")
    }

    /// Last-applied update marker.
    pub fn marker_path(&self) -> PathBuf {
        self.root.join("source.ref")
    }

    /// The live agent code tree.
    pub fn agent_dir(&self) -> PathBuf {
        self.root.join("agent")
    }

    /// Where a new code tree is extracted before being promoted.
    pub fn staging_dir(&self) -> PathBuf {
        self.root.join("agent.staging")
    }

    /// Where the previous code tree is parked during the swap.
    pub fn retired_dir(&self) -> PathBuf {
        self.root.join("agent.old")
    }

    pub fn run_dir(&self) -> PathBuf {
        self.root.join("run")
    }

    pub fn pid_path(&self) -> PathBuf {
        self.run_dir().join("agent.pid")
    }

    /// Consecutive-failed-cycle counter (see orchestrator alerting).
    pub fn failures_path(&self) -> PathBuf {
        self.run_dir().join("cycle.failures")
    }

    /// Lock file serializing supervisor mutations across invocations.
    pub fn lock_path(&self) -> PathBuf {
        self.run_dir().join("supervisor.lock")
    }

    pub fn log_dir(&self) -> PathBuf {
        self.root.join("logs")
    }

    pub fn agent_log_path(&self) -> PathBuf {
        self.log_dir().join("agent.log")
    }

    /// Entry script of the supervised agent inside the live code tree.
    pub fn agent_entry(&self) -> PathBuf {
        self.agent_dir().join("agent.py")
    }

    pub fn is_installed(&self) -> bool {
        self.config_path().exists()
    }

    /// Create the directory scaffold (agent, run, logs) if missing.
    /// Safe to re-run; never touches existing files.
    pub fn ensure_scaffold(&self) -> std::io::Result<()> {
        std::fs::create_dir_all(self.agent_dir())?;
        std::fs::create_dir_all(self.run_dir())?;
        std::fs::create_dir_all(self.log_dir())?;
        NativePlatform::restrict_dir_permissions(&self.root);
        NativePlatform::restrict_dir_permissions(&self.run_dir());
        Ok(())
    }
}

/// Write `contents` to `path` through a sibling temp file and a rename, so a
/// concurrent reader observes either the old document or the new one, never a
/// half-written mix.
pub fn write_atomic(path: &Path, contents: &[u8]) -> std::io::Result<()> {
    let tmp = path.with_extension("tmp");
    std::fs::write(&tmp, contents)?;
    #[cfg(windows)]
    {
        // Windows rename does not replace an existing destination.
        let _ = std::fs::remove_file(path);
    }
    std::fs::rename(&tmp, path)
}
