//! Configuration Management
//!
//! Handles persistent configuration storage for sso-attrs and the
//! flag > environment > file > default resolution of effective settings.

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::resource::retry::RetryPolicy;
use crate::resource::state::StateStore;
use crate::ssoadmin::client::default_endpoint;

const DEFAULT_REGION: &str = "us-east-1";

/// User configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Region of the SSO Admin endpoint
    #[serde(default)]
    pub region: Option<String>,
    /// Endpoint override (local stacks, proxies)
    #[serde(default)]
    pub endpoint: Option<String>,
    /// Tracked-resource state file
    #[serde(default)]
    pub state_path: Option<PathBuf>,
    #[serde(default)]
    pub retry: RetryPolicy,
}

impl Config {
    /// Get the config file path
    pub fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("sso-attrs").join("config.json"))
    }

    /// Load configuration from disk
    pub fn load() -> Self {
        match Self::config_path() {
            Some(path) => Self::load_from(&path),
            None => Self::default(),
        }
    }

    /// Load from a specific file; missing or corrupt files yield defaults
    pub fn load_from(path: &Path) -> Self {
        if !path.exists() {
            return Self::default();
        }

        match std::fs::read_to_string(path) {
            Ok(content) => serde_json::from_str(&content).unwrap_or_else(|e| {
                tracing::warn!("Ignoring unreadable config {}: {}", path.display(), e);
                Self::default()
            }),
            Err(_) => Self::default(),
        }
    }

    /// Save configuration to disk
    pub fn save(&self) -> Result<()> {
        let Some(path) = Self::config_path() else {
            return Ok(());
        };
        self.save_to(&path)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config {}", path.display()))?;

        Ok(())
    }

    /// Get effective region (CLI > AWS_REGION > AWS_DEFAULT_REGION > config > us-east-1)
    pub fn effective_region(&self, flag: Option<&str>) -> Result<String> {
        let region = first_set([
            flag.map(str::to_string),
            env("AWS_REGION"),
            env("AWS_DEFAULT_REGION"),
            self.region.clone(),
        ])
        .unwrap_or_else(|| DEFAULT_REGION.to_string());

        validate_region(&region)?;
        Ok(region)
    }

    /// Get effective endpoint (CLI > SSO_ATTRS_ENDPOINT > config > regional default)
    pub fn effective_endpoint(&self, flag: Option<&str>, region: &str) -> String {
        first_set([
            flag.map(str::to_string),
            env("SSO_ATTRS_ENDPOINT"),
            self.endpoint.clone(),
        ])
        .unwrap_or_else(|| default_endpoint(region))
    }

    /// Get effective state file (CLI > config > data dir)
    pub fn effective_state_path(&self, flag: Option<&Path>) -> PathBuf {
        flag.map(Path::to_path_buf)
            .or_else(|| self.state_path.clone())
            .unwrap_or_else(StateStore::default_path)
    }

    /// Session token for temporary credentials
    pub fn session_token() -> Option<String> {
        env("AWS_SESSION_TOKEN")
    }
}

fn env(name: &str) -> Option<String> {
    std::env::var(name).ok()
}

fn first_set<const N: usize>(candidates: [Option<String>; N]) -> Option<String> {
    candidates
        .into_iter()
        .flatten()
        .map(|v| v.trim().to_string())
        .find(|v| !v.is_empty())
}

/// Region names are lowercase letters, digits and hyphens
pub fn validate_region(region: &str) -> Result<()> {
    let valid = !region.is_empty()
        && !region.starts_with('-')
        && !region.ends_with('-')
        && region
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-');

    if !valid {
        bail!("Invalid region '{}'", region);
    }
    Ok(())
}
