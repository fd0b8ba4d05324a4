use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::core::home::{self, AgentHome};
use crate::platform::{NativePlatform, Platform};

pub const DEFAULT_ENDPOINT_URL: &str = "http://127.0.0.1:8000/api/data";
pub const DEFAULT_SOURCE_URL: &str = "http://127.0.0.1:8000/updates";
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 3600;
pub const DEFAULT_RETRY_ATTEMPTS: u32 = 3;
pub const DEFAULT_RETRY_DELAY_SECS: u64 = 60;

/// Operator-supplied identity for one machine, fixed at install time.
#[derive(Debug, Clone)]
pub struct IdentityInput {
    pub store_id: String,
    pub store_name: String,
    pub endpoint_url: Option<String>,
    pub source_url: Option<String>,
}

/// Per-machine configuration record, stored as `config.json` in the home dir.
///
/// The orchestrator creates this once and never rewrites it. Operators may
/// edit the file by hand at any time and their edits always win; every
/// non-identity field carries a serde default so a trimmed-down file still
/// parses.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfigRecord {
    pub store_id: String,
    #[serde(default)]
    pub store_name: String,
    pub central_server_url: String,
    #[serde(default = "default_source_url")]
    pub update_source_url: String,
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,
    #[serde(default = "default_retry_attempts")]
    pub retry_attempts: u32,
    #[serde(default = "default_retry_delay")]
    pub retry_delay_secs: u64,
    /// Manual database-path override for the agent; the orchestrator only
    /// carries it through.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub db_path: Option<String>,
}

fn default_source_url() -> String {
    DEFAULT_SOURCE_URL.to_string()
}

fn default_poll_interval() -> u64 {
    DEFAULT_POLL_INTERVAL_SECS
}

fn default_retry_attempts() -> u32 {
    DEFAULT_RETRY_ATTEMPTS
}

fn default_retry_delay() -> u64 {
    DEFAULT_RETRY_DELAY_SECS
}

impl ConfigRecord {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_secs(self.retry_delay_secs)
    }
}

/// Load the config record if one exists. A present-but-unparseable file is an
/// error, not a silent re-create: clobbering an operator's hand-edited config
/// over a typo would be worse than failing loudly.
pub fn load_config(home: &AgentHome) -> Result<Option<ConfigRecord>> {
    let path = home.config_path();
    if !path.exists() {
        return Ok(None);
    }
    let raw = std::fs::read_to_string(&path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let record = serde_json::from_str(&raw)
        .with_context(|| format!("invalid JSON in {}", path.display()))?;
    Ok(Some(record))
}

/// Return the existing config record unmodified, or synthesize one from the
/// supplied identity and defaults. Creates the home scaffold as a side effect.
pub fn resolve_config(home: &AgentHome, input: &IdentityInput) -> Result<ConfigRecord> {
    home.ensure_scaffold()
        .context("failed to create outpost state directories")?;

    if let Some(existing) = load_config(home)? {
        return Ok(existing);
    }

    let record = ConfigRecord {
        store_id: input.store_id.clone(),
        store_name: input.store_name.clone(),
        central_server_url: input
            .endpoint_url
            .clone()
            .unwrap_or_else(|| DEFAULT_ENDPOINT_URL.to_string()),
        update_source_url: input
            .source_url
            .clone()
            .unwrap_or_else(|| DEFAULT_SOURCE_URL.to_string()),
        poll_interval_secs: DEFAULT_POLL_INTERVAL_SECS,
        retry_attempts: DEFAULT_RETRY_ATTEMPTS,
        retry_delay_secs: DEFAULT_RETRY_DELAY_SECS,
        db_path: None,
    };
    let body = serde_json::to_vec_pretty(&record)?;
    home::write_atomic(&home.config_path(), &body)
        .with_context(|| format!("failed to write {}", home.config_path().display()))?;
    NativePlatform::restrict_file_permissions(&home.config_path());
    Ok(record)
}
