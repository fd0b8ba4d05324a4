use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use flate2::read::GzDecoder;
use serde::Deserialize;
use sha2::{Digest, Sha256};
use thiserror::Error;
use tracing::{debug, info};

use crate::core::home::{self, AgentHome};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("update source request failed: {0}")]
    Request(String),
    #[error("update manifest is malformed: {0}")]
    Manifest(String),
    #[error("archive checksum mismatch (expected {expected}, got {actual})")]
    ChecksumMismatch { expected: String, actual: String },
}

/// Remote versioned code repository. The orchestrator is a read-only polling
/// consumer: `current_marker` must never mutate anything on either side.
#[async_trait]
pub trait UpdateSource: Send + Sync {
    /// The source's current revision marker.
    async fn current_marker(&self) -> Result<String, SourceError>;

    /// The full agent code tree at `marker`, as a gzipped tarball.
    async fn fetch_archive(&self, marker: &str) -> Result<Vec<u8>, SourceError>;
}

/// Last-applied marker, persisted beside the agent code so a crash mid-cycle
/// is recovered by simply comparing markers again on the next poll. Absent on
/// a machine that has never applied an update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateSourceRef(Option<String>);

impl UpdateSourceRef {
    pub fn load(home: &AgentHome) -> Self {
        match std::fs::read_to_string(home.marker_path()) {
            Ok(raw) if !raw.trim().is_empty() => Self(Some(raw.trim().to_string())),
            _ => Self(None),
        }
    }

    pub fn store(home: &AgentHome, marker: &str) -> std::io::Result<()> {
        home::write_atomic(&home.marker_path(), marker.as_bytes())
    }

    pub fn as_deref(&self) -> Option<&str> {
        self.0.as_deref()
    }

    pub fn matches(&self, remote: &str) -> bool {
        self.0.as_deref() == Some(remote)
    }
}

pub enum UpdateOutcome {
    /// Remote marker equals the applied one; nothing on disk was touched.
    NoChange,
    /// New code is live and the marker advanced to the contained value.
    Applied(String),
    /// Fetch or apply failed; content and marker are at last-known-good.
    Failed(anyhow::Error),
}

/// One poll of the update source.
///
/// The common case (marker unchanged) performs zero filesystem writes. An
/// apply extracts into staging and swaps the tree into place before the
/// marker advances, so the promoted state is always either fully old or
/// fully new; a crash between swap and marker write re-detects "different"
/// next cycle and safely re-applies.
pub async fn check_and_pull(home: &AgentHome, source: &dyn UpdateSource) -> UpdateOutcome {
    let applied = UpdateSourceRef::load(home);

    let remote = match source.current_marker().await {
        Ok(marker) => marker,
        Err(e) => return UpdateOutcome::Failed(e.into()),
    };

    if applied.matches(&remote) {
        debug!(marker = %remote, "agent code already current");
        return UpdateOutcome::NoChange;
    }

    info!(
        current = applied.as_deref().unwrap_or("<none>"),
        remote = %remote,
        "new agent code available"
    );

    let archive = match source.fetch_archive(&remote).await {
        Ok(bytes) => bytes,
        Err(e) => return UpdateOutcome::Failed(e.into()),
    };

    if let Err(e) = apply_archive(home, &archive) {
        return UpdateOutcome::Failed(e);
    }

    if let Err(e) = UpdateSourceRef::store(home, &remote) {
        return UpdateOutcome::Failed(
            anyhow::Error::new(e).context("failed to persist update marker"),
        );
    }

    UpdateOutcome::Applied(remote)
}

/// Extract the archive into the staging dir, then swap it into place.
/// Leftovers from a crashed earlier apply are cleared first, so re-running
/// after any failure is safe.
fn apply_archive(home: &AgentHome, archive: &[u8]) -> anyhow::Result<()> {
    let staging = home.staging_dir();
    let retired = home.retired_dir();
    let current = home.agent_dir();

    if staging.exists() {
        std::fs::remove_dir_all(&staging).context("failed to clear stale staging dir")?;
    }
    if retired.exists() {
        std::fs::remove_dir_all(&retired).context("failed to clear stale retired dir")?;
    }
    std::fs::create_dir_all(&staging)?;

    let decoder = GzDecoder::new(archive);
    let mut tarball = tar::Archive::new(decoder);
    tarball
        .unpack(&staging)
        .context("failed to extract agent archive")?;

    if current.exists() {
        std::fs::rename(&current, &retired).context("failed to retire current agent dir")?;
    }
    if let Err(e) = std::fs::rename(&staging, &current) {
        // The promoted state must be old or new, never absent.
        if retired.exists() {
            let _ = std::fs::rename(&retired, &current);
        }
        return Err(anyhow::Error::new(e).context("failed to promote staged agent code"));
    }
    if retired.exists() {
        let _ = std::fs::remove_dir_all(&retired);
    }
    Ok(())
}

#[derive(Debug, Deserialize)]
struct Manifest {
    marker: String,
    archive: String,
    sha256: String,
}

/// HTTP update source: a manifest naming the current marker plus a gzipped
/// tarball of the agent code, checksummed before anything touches disk.
pub struct HttpSource {
    base_url: String,
    client: reqwest::Client,
}

impl HttpSource {
    pub fn new(base_url: &str) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent("outpost-updater")
            .connect_timeout(CONNECT_TIMEOUT)
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        })
    }

    async fn manifest(&self) -> Result<Manifest, SourceError> {
        self.client
            .get(format!("{}/manifest.json", self.base_url))
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| SourceError::Request(e.to_string()))?
            .json()
            .await
            .map_err(|e| SourceError::Manifest(e.to_string()))
    }
}

#[async_trait]
impl UpdateSource for HttpSource {
    async fn current_marker(&self) -> Result<String, SourceError> {
        Ok(self.manifest().await?.marker)
    }

    async fn fetch_archive(&self, marker: &str) -> Result<Vec<u8>, SourceError> {
        let manifest = self.manifest().await?;
        if manifest.marker != marker {
            return Err(SourceError::Request(format!(
                "source advanced from {marker} to {} mid-cycle",
                manifest.marker
            )));
        }

        let bytes = self
            .client
            .get(format!("{}/{}", self.base_url, manifest.archive))
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| SourceError::Request(e.to_string()))?
            .bytes()
            .await
            .map_err(|e| SourceError::Request(e.to_string()))?;

        let mut hasher = Sha256::new();
        hasher.update(&bytes);
        let actual = hex::encode(hasher.finalize());
        if !actual.eq_ignore_ascii_case(&manifest.sha256) {
            return Err(SourceError::ChecksumMismatch {
                expected: manifest.sha256,
                actual,
            });
        }

        Ok(bytes.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::test_support::{FakeSource, make_archive};

    fn temp_home() -> (tempfile::TempDir, AgentHome) {
        let dir = tempfile::tempdir().unwrap();
        let home = AgentHome::new(dir.path());
        home.ensure_scaffold().unwrap();
        (dir, home)
    }

    #[tokio::test]
    async fn unchanged_marker_is_a_cheap_no_op() {
        let (_dir, home) = temp_home();
        UpdateSourceRef::store(&home, "v1").unwrap();
        let source = FakeSource::new("v1", make_archive(&[("agent.py", "print('v1')")]));

        let outcome = check_and_pull(&home, &source).await;

        assert!(matches!(outcome, UpdateOutcome::NoChange));
        assert_eq!(source.fetch_calls(), 0);
        assert!(!home.staging_dir().exists());
        assert_eq!(std::fs::read_to_string(home.marker_path()).unwrap(), "v1");
    }

    #[tokio::test]
    async fn first_apply_extracts_tree_and_advances_marker() {
        let (_dir, home) = temp_home();
        let source = FakeSource::new(
            "v1",
            make_archive(&[("agent.py", "print('v1')"), ("utils/db.py", "# db")]),
        );

        let outcome = check_and_pull(&home, &source).await;

        assert!(matches!(outcome, UpdateOutcome::Applied(ref m) if m == "v1"));
        assert_eq!(
            std::fs::read_to_string(home.agent_entry()).unwrap(),
            "print('v1')"
        );
        assert!(home.agent_dir().join("utils/db.py").exists());
        assert_eq!(std::fs::read_to_string(home.marker_path()).unwrap(), "v1");
        assert!(!home.staging_dir().exists());
        assert!(!home.retired_dir().exists());
    }

    #[tokio::test]
    async fn new_marker_replaces_old_tree_wholesale() {
        let (_dir, home) = temp_home();
        let v1 = FakeSource::new(
            "v1",
            make_archive(&[("agent.py", "print('v1')"), ("obsolete.py", "x")]),
        );
        check_and_pull(&home, &v1).await;

        let v2 = FakeSource::new("v2", make_archive(&[("agent.py", "print('v2')")]));
        let outcome = check_and_pull(&home, &v2).await;

        assert!(matches!(outcome, UpdateOutcome::Applied(ref m) if m == "v2"));
        assert_eq!(
            std::fs::read_to_string(home.agent_entry()).unwrap(),
            "print('v2')"
        );
        // Replace is overwrite-based, not additive.
        assert!(!home.agent_dir().join("obsolete.py").exists());
        assert_eq!(std::fs::read_to_string(home.marker_path()).unwrap(), "v2");
    }

    #[tokio::test]
    async fn fetch_failure_leaves_content_and_marker_untouched() {
        let (_dir, home) = temp_home();
        let v1 = FakeSource::new("v1", make_archive(&[("agent.py", "print('v1')")]));
        check_and_pull(&home, &v1).await;

        let broken = FakeSource::new("v2", make_archive(&[("agent.py", "print('v2')")]));
        broken.fail_fetch(true);
        let outcome = check_and_pull(&home, &broken).await;

        assert!(matches!(outcome, UpdateOutcome::Failed(_)));
        assert_eq!(
            std::fs::read_to_string(home.agent_entry()).unwrap(),
            "print('v1')"
        );
        assert_eq!(std::fs::read_to_string(home.marker_path()).unwrap(), "v1");
    }

    #[tokio::test]
    async fn marker_failure_reports_failed_poll() {
        let (_dir, home) = temp_home();
        let source = FakeSource::new("v1", make_archive(&[("agent.py", "x")]));
        source.fail_marker(true);

        let outcome = check_and_pull(&home, &source).await;

        assert!(matches!(outcome, UpdateOutcome::Failed(_)));
        assert!(!home.marker_path().exists());
    }

    #[tokio::test]
    async fn stale_staging_from_a_crashed_apply_is_cleared() {
        let (_dir, home) = temp_home();
        std::fs::create_dir_all(home.staging_dir()).unwrap();
        std::fs::write(home.staging_dir().join("junk.py"), "crashed half-way").unwrap();

        let source = FakeSource::new("v1", make_archive(&[("agent.py", "print('v1')")]));
        let outcome = check_and_pull(&home, &source).await;

        assert!(matches!(outcome, UpdateOutcome::Applied(_)));
        assert!(!home.agent_dir().join("junk.py").exists());
        assert!(!home.staging_dir().exists());
    }

    #[test]
    fn absent_marker_file_reads_as_none() {
        let (_dir, home) = temp_home();
        assert_eq!(UpdateSourceRef::load(&home).as_deref(), None);
        assert!(!UpdateSourceRef::load(&home).matches("v1"));
    }
}
