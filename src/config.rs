//! Settings and request files
//!
//! Settings live in `config.toml` under [`crate::paths::config_dir`] and are
//! overridden by the environment. A request file describes one resource to
//! reconcile, in TOML or JSON (picked by extension).

use crate::paths;
use anyhow::{Context, Result, bail};
use converge::{Fields, PollPolicy, RequestedState};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

pub const ENV_SUBSCRIPTION_ID: &str = "AZURE_SUBSCRIPTION_ID";
pub const ENV_ACCESS_TOKEN: &str = "AZURE_ACCESS_TOKEN";
pub const ENV_ENDPOINT: &str = "AZRM_ENDPOINT";

// ============================================================================
// Settings
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    pub subscription_id: Option<String>,
    /// Resource Manager endpoint; the public cloud when unset
    pub endpoint: Option<String>,
    /// Environment variable holding the bearer token
    pub token_env: Option<String>,
    pub poll: PollSettings,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PollSettings {
    pub interval_secs: u64,
    pub max_attempts: u32,
    pub backoff_factor: f64,
    pub max_interval_secs: u64,
}

impl Default for PollSettings {
    fn default() -> Self {
        let policy = PollPolicy::default();
        Self {
            interval_secs: policy.interval.as_secs(),
            max_attempts: policy.max_attempts,
            backoff_factor: policy.backoff_factor,
            max_interval_secs: policy.max_interval.as_secs(),
        }
    }
}

impl PollSettings {
    pub fn policy(&self) -> PollPolicy {
        PollPolicy {
            interval: Duration::from_secs(self.interval_secs),
            max_attempts: self.max_attempts.max(1),
            backoff_factor: self.backoff_factor,
            max_interval: Duration::from_secs(self.max_interval_secs),
        }
    }
}

impl Settings {
    /// Load settings from `path`, or from the default location.
    ///
    /// An explicit path must exist; a missing default file yields defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let settings = match path {
            Some(path) => Self::read(path)?,
            None => {
                let default = paths::config_file()?;
                if default.exists() {
                    Self::read(&default)?
                } else {
                    log::debug!("No settings at {}, using defaults", default.display());
                    Self::default()
                }
            }
        };
        Ok(settings.with_env(|name| std::env::var(name).ok()))
    }

    fn read(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Could not read settings file: {}", path.display()))?;
        toml::from_str(&content)
            .with_context(|| format!("Invalid TOML format in {}", path.display()))
    }

    /// Apply environment overrides.
    pub fn with_env(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(id) = lookup(ENV_SUBSCRIPTION_ID).filter(|v| !v.is_empty()) {
            self.subscription_id = Some(id);
        }
        if let Some(endpoint) = lookup(ENV_ENDPOINT).filter(|v| !v.is_empty()) {
            self.endpoint = Some(endpoint);
        }
        self
    }

    pub fn require_subscription(&self) -> Result<&str> {
        match self.subscription_id.as_deref() {
            Some(id) if !id.is_empty() => Ok(id),
            _ => bail!(
                "No subscription id: set {ENV_SUBSCRIPTION_ID} or subscription_id in config.toml"
            ),
        }
    }

    /// Bearer token from the configured environment variable.
    pub fn access_token(&self, lookup: impl Fn(&str) -> Option<String>) -> Result<String> {
        let var = self.token_env.as_deref().unwrap_or(ENV_ACCESS_TOKEN);
        match lookup(var) {
            Some(token) if !token.trim().is_empty() => Ok(token.trim().to_string()),
            _ => bail!(
                "No access token in {var} (try: export {var}=$(az account get-access-token --query accessToken -o tsv))"
            ),
        }
    }
}

// ============================================================================
// Request File
// ============================================================================

/// One resource to reconcile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RequestFile {
    /// Catalog name or ARM type
    pub kind: String,
    pub resource_group: String,
    pub name: String,
    /// Parent resource name, for nested kinds
    #[serde(default)]
    pub parent: Option<String>,
    #[serde(default)]
    pub state: RequestedState,
    #[serde(default)]
    pub check_mode: bool,
    #[serde(default = "default_true")]
    pub append_tags: bool,
    #[serde(default)]
    pub tags: Option<Fields>,
    /// Kind-specific parameters
    #[serde(default)]
    pub spec: Fields,
}

fn default_true() -> bool {
    true
}

impl RequestFile {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Could not read request file: {}", path.display()))?;
        if paths::is_json(path) {
            Self::from_json(&content)
                .with_context(|| format!("Invalid JSON format in {}", path.display()))
        } else {
            Self::from_toml(&content)
                .with_context(|| format!("Invalid TOML format in {}", path.display()))
        }
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    pub fn from_json(content: &str) -> Result<Self> {
        Ok(serde_json::from_str(content)?)
    }

    /// Kind parameters with the top-level tags folded in.
    pub fn params(&self) -> Fields {
        let mut params = self.spec.clone();
        if let Some(tags) = &self.tags {
            params.insert("tags".to_string(), tags.clone().into());
        }
        params
    }
}

// ============================================================================
// Tests
// ============================================================================
