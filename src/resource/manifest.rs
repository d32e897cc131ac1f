//! Declarative manifest
//!
//! The resource block as users write it:
//!
//! ```yaml
//! instance_arn: arn:aws:sso:::instance/ssoins-1234567890abcdef
//! attribute:
//!   - key: name
//!     value:
//!       source: ["${path:name.givenName}"]
//! ```
//!
//! `status` and `status_reason` mirror the remote side; they are rendered on
//! output and `status` is honoured as an expectation when present on input.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

use super::model::{AttributeMapping, DesiredConfiguration, ObservedConfiguration, Status};
use crate::error::ConfigurationError;
use crate::ssoadmin::arn::InstanceArn;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ManifestValue {
    pub source: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ManifestAttribute {
    pub key: String,
    pub value: ManifestValue,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Manifest {
    pub instance_arn: String,
    #[serde(default)]
    pub attribute: Vec<ManifestAttribute>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<Status>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_reason: Option<String>,
}

impl Manifest {
    /// Parse YAML (or JSON, which YAML accepts)
    pub fn parse(text: &str) -> Result<Self, ConfigurationError> {
        serde_yaml::from_str(text).map_err(|e| ConfigurationError::Manifest(e.to_string()))
    }

    /// Load a manifest file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read manifest {}", path.display()))?;
        Self::parse(&content).with_context(|| format!("Failed to parse manifest {}", path.display()))
    }

    /// Validate into a desired configuration
    pub fn to_desired(&self) -> Result<DesiredConfiguration, ConfigurationError> {
        let arn = InstanceArn::parse(&self.instance_arn)?;
        let mappings = self
            .attribute
            .iter()
            .map(|a| AttributeMapping::new(a.key.clone(), a.value.source.iter().cloned()))
            .collect();
        DesiredConfiguration::new(arn, mappings, self.status)
    }

    /// Render what is attached in manifest form
    pub fn from_observed(observed: &ObservedConfiguration) -> Self {
        Self {
            instance_arn: observed.instance_arn.to_string(),
            attribute: observed
                .attributes
                .mappings()
                .iter()
                .map(|m| ManifestAttribute {
                    key: m.key.clone(),
                    value: ManifestValue {
                        source: m.sources.clone(),
                    },
                })
                .collect(),
            status: Some(observed.status),
            status_reason: observed.status_reason.clone(),
        }
    }
}
