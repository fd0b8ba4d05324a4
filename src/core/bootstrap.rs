use thiserror::Error;
use tracing::info;

use crate::platform::{NativePlatform, Platform};

/// Fatal installation failures. Any of these aborts the install before a
/// single scheduled task is registered.
#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error("runtime installer could not be launched: {0}")]
    DownloadFailed(String),
    #[error("runtime installer reported failure (exit code {0})")]
    InstallFailed(i32),
    #[error("runtime still missing after install; {0}")]
    VerificationFailed(&'static str),
}

/// Version string of the first responding interpreter candidate, if any.
pub fn probe_runtime() -> Option<String> {
    probe_candidates(NativePlatform::runtime_candidates())
}

pub(crate) fn probe_candidates(candidates: &[&str]) -> Option<String> {
    for bin in candidates {
        if let Ok(out) = std::process::Command::new(bin).arg("--version").output()
            && out.status.success()
        {
            // Some interpreters print their version on stderr.
            let text = if out.stdout.is_empty() {
                &out.stderr
            } else {
                &out.stdout
            };
            return Some(String::from_utf8_lossy(text).trim().to_string());
        }
    }
    None
}

/// First interpreter candidate that responds to a version probe.
pub fn runtime_binary() -> Option<&'static str> {
    NativePlatform::runtime_candidates().iter().copied().find(|bin| {
        std::process::Command::new(bin)
            .arg("--version")
            .output()
            .map(|o| o.status.success())
            .unwrap_or(false)
    })
}

/// Ensure the agent runtime interpreter is installed, installing it silently
/// if absent. Safe to re-run: a satisfied probe short-circuits before any
/// installer is touched.
pub fn ensure_runtime() -> Result<String, BootstrapError> {
    if let Some(version) = probe_runtime() {
        return Ok(version);
    }

    info!("agent runtime missing, running platform installer");
    let status = NativePlatform::install_runtime()
        .map_err(|e| BootstrapError::DownloadFailed(e.to_string()))?;
    if !status.success() {
        return Err(BootstrapError::InstallFailed(status.code().unwrap_or(-1)));
    }

    probe_runtime().ok_or(BootstrapError::VerificationFailed(
        NativePlatform::runtime_missing_hint(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[cfg(unix)]
    #[test]
    fn probe_skips_missing_candidates() {
        // `env --version` responds on any GNU userland; the bogus entry in
        // front must not stop the probe.
        let version = probe_candidates(&["no-such-interpreter-xyz", "env"]);
        assert!(version.is_some());
    }

    #[test]
    fn probe_reports_nothing_when_no_candidate_responds() {
        assert_eq!(probe_candidates(&["no-such-interpreter-xyz"]), None);
    }
}
