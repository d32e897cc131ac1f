//! Attribute configuration model
//!
//! One configuration per instance. It has no identifier of its own: the
//! instance ARN is its identity everywhere in this crate.

use serde::{Deserialize, Serialize};

use super::normalize;
use crate::error::ConfigurationError;
use crate::ssoadmin::api::{ConfigurationPayload, WireConfiguration};
use crate::ssoadmin::arn::InstanceArn;

pub use crate::ssoadmin::api::Status;

/// A named attribute and the source expressions it is read from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeMapping {
    pub key: String,
    pub sources: Vec<String>,
}

impl AttributeMapping {
    pub fn new<I, S>(key: impl Into<String>, sources: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            key: key.into(),
            sources: sources.into_iter().map(Into::into).collect(),
        }
    }
}

/// Attribute mappings with unique keys, in caller order
///
/// Equality ignores the order of mappings and of each mapping's sources.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(transparent)]
pub struct AttributeSet {
    mappings: Vec<AttributeMapping>,
}

impl AttributeSet {
    /// Build from mappings already known to have unique keys
    pub(super) fn from_unique(mappings: Vec<AttributeMapping>) -> Self {
        Self { mappings }
    }

    pub fn mappings(&self) -> &[AttributeMapping] {
        &self.mappings
    }

    pub fn len(&self) -> usize {
        self.mappings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mappings.is_empty()
    }

    pub fn get(&self, key: &str) -> Option<&AttributeMapping> {
        self.mappings.iter().find(|m| m.key == key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.mappings.iter().map(|m| m.key.as_str())
    }
}

impl PartialEq for AttributeSet {
    fn eq(&self, other: &Self) -> bool {
        normalize::equal(self, other)
    }
}

impl Eq for AttributeSet {}

/// What the caller wants attached to an instance
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DesiredConfiguration {
    pub instance_arn: InstanceArn,
    pub attributes: AttributeSet,
    /// Compared and sent only when set
    pub status: Option<Status>,
}

impl DesiredConfiguration {
    /// Validate raw mappings into a desired configuration
    pub fn new(
        instance_arn: InstanceArn,
        mappings: Vec<AttributeMapping>,
        status: Option<Status>,
    ) -> Result<Self, ConfigurationError> {
        Ok(Self {
            instance_arn,
            attributes: normalize::validate(mappings)?,
            status,
        })
    }

    /// Full-replace request body
    pub fn payload(&self) -> ConfigurationPayload {
        ConfigurationPayload {
            configuration: normalize::to_wire(&self.attributes),
            status: self.status,
        }
    }
}

/// What the remote side currently reports for an instance
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ObservedConfiguration {
    pub instance_arn: InstanceArn,
    pub attributes: AttributeSet,
    pub status: Status,
    pub status_reason: Option<String>,
}

impl ObservedConfiguration {
    /// Translate a describe response; `None` when nothing is attached
    pub fn from_wire(
        instance_arn: &InstanceArn,
        configuration: Option<&WireConfiguration>,
        status: Option<Status>,
        status_reason: Option<String>,
    ) -> Option<Self> {
        let configuration = configuration?;
        let attributes = normalize::from_wire(configuration);
        if attributes.is_empty() {
            return None;
        }

        Some(Self {
            instance_arn: instance_arn.clone(),
            attributes,
            status: status.unwrap_or(Status::Enabled),
            status_reason,
        })
    }

    /// Whether the observed state satisfies `desired`
    pub fn matches(&self, desired: &DesiredConfiguration) -> bool {
        self.attributes == desired.attributes
            && desired.status.map_or(true, |status| status == self.status)
    }
}
