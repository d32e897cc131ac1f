//! Tracked resources
//!
//! Maps instance ARN to the last observed configuration. The ARN is the
//! only key: there is no separately generated resource ID.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use super::model::{ObservedConfiguration, Status};
use super::normalize;
use crate::ssoadmin::api::WireAttribute;

/// Last known state of one tracked configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackedResource {
    /// Always the instance ARN
    pub id: String,
    pub instance_arn: String,
    pub status: Status,
    #[serde(default)]
    pub status_reason: Option<String>,
    pub attributes: Vec<WireAttribute>,
    pub synced_at: DateTime<Utc>,
}

impl TrackedResource {
    pub fn from_observed(observed: &ObservedConfiguration) -> Self {
        Self {
            id: observed.instance_arn.to_string(),
            instance_arn: observed.instance_arn.to_string(),
            status: observed.status,
            status_reason: observed.status_reason.clone(),
            attributes: normalize::to_wire(&observed.attributes).access_control_attributes,
            synced_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct StateFile {
    #[serde(default)]
    resources: BTreeMap<String, TrackedResource>,
}

/// Persistent store of tracked configurations
#[derive(Debug, Clone)]
pub struct StateStore {
    path: PathBuf,
    resources: BTreeMap<String, TrackedResource>,
}

impl StateStore {
    /// Default state file location
    pub fn default_path() -> PathBuf {
        dirs::data_local_dir()
            .or_else(dirs::home_dir)
            .map(|p| p.join("sso-attrs").join("state.json"))
            .unwrap_or_else(|| PathBuf::from("sso-attrs-state.json"))
    }

    /// Load from disk; a missing file is an empty store
    pub fn load(path: &Path) -> Result<Self> {
        let resources = if path.exists() {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read state file {}", path.display()))?;
            let file: StateFile = serde_json::from_str(&content)
                .with_context(|| format!("Corrupt state file {}", path.display()))?;
            file.resources
        } else {
            BTreeMap::new()
        };

        Ok(Self {
            path: path.to_path_buf(),
            resources,
        })
    }

    pub fn save(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let file = StateFile {
            resources: self.resources.clone(),
        };
        let content = serde_json::to_string_pretty(&file)?;
        std::fs::write(&self.path, content)
            .with_context(|| format!("Failed to write state file {}", self.path.display()))?;

        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn get(&self, arn: &str) -> Option<&TrackedResource> {
        self.resources.get(arn)
    }

    /// Record (or refresh) an observed configuration
    pub fn track(&mut self, observed: &ObservedConfiguration) {
        let record = TrackedResource::from_observed(observed);
        self.resources.insert(record.id.clone(), record);
    }

    /// Stop tracking; returns whether it was tracked
    pub fn untrack(&mut self, arn: &str) -> bool {
        self.resources.remove(arn).is_some()
    }

    pub fn arns(&self) -> impl Iterator<Item = &str> {
        self.resources.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.resources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::model::{AttributeMapping, DesiredConfiguration};
    use crate::ssoadmin::arn::InstanceArn;

    fn observed() -> ObservedConfiguration {
        let arn = InstanceArn::parse("arn:aws:sso:::instance/ssoins-1").unwrap();
        let desired = DesiredConfiguration::new(
            arn.clone(),
            vec![AttributeMapping::new("name", ["${path:name.givenName}"])],
            None,
        )
        .unwrap();
        ObservedConfiguration {
            instance_arn: arn,
            attributes: desired.attributes,
            status: Status::Enabled,
            status_reason: None,
        }
    }

    #[test]
    fn test_id_is_instance_arn() {
        let record = TrackedResource::from_observed(&observed());
        assert_eq!(record.id, record.instance_arn);
        assert_eq!(record.attributes[0].key, "name");
    }

    #[test]
    fn test_track_save_load_untrack() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("state.json");

        let mut store = StateStore::load(&path).unwrap();
        assert!(store.is_empty());

        store.track(&observed());
        store.save().unwrap();

        let mut reloaded = StateStore::load(&path).unwrap();
        assert_eq!(reloaded.len(), 1);
        let record = reloaded.get("arn:aws:sso:::instance/ssoins-1").unwrap();
        assert_eq!(record.status, Status::Enabled);

        assert!(reloaded.untrack("arn:aws:sso:::instance/ssoins-1"));
        assert!(!reloaded.untrack("arn:aws:sso:::instance/ssoins-1"));
        assert_eq!(reloaded.arns().count(), 0);
    }

    #[test]
    fn test_corrupt_state_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        std::fs::write(&path, "{not json").unwrap();
        assert!(StateStore::load(&path).is_err());
    }
}
