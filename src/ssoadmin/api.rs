//! SSO Admin API surface
//!
//! The four access-control-attribute operations plus `ListInstances`, as
//! consumed by the reconciler. Everything in the crate talks to the remote
//! side through [`SsoAdminApi`], so operations can run against the real
//! HTTP client or the in-memory stub.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::arn::InstanceArn;
use super::error::ApiError;

/// Enablement status of an attribute configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Status {
    Enabled,
    Disabled,
}

impl Status {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Enabled => "ENABLED",
            Self::Disabled => "DISABLED",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Status {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "ENABLED" => Ok(Self::Enabled),
            "DISABLED" => Ok(Self::Disabled),
            other => Err(format!("unknown status {other:?}")),
        }
    }
}

/// `AccessControlAttributeValue`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct WireAttributeValue {
    pub source: Vec<String>,
}

/// `AccessControlAttribute`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct WireAttribute {
    pub key: String,
    pub value: WireAttributeValue,
}

/// `InstanceAccessControlAttributeConfiguration`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct WireConfiguration {
    #[serde(default)]
    pub access_control_attributes: Vec<WireAttribute>,
}

/// Body of a full-replace write (create or update)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigurationPayload {
    pub configuration: WireConfiguration,
    /// Requested status; omitted from the request when unset
    pub status: Option<Status>,
}

/// Response of `DescribeInstanceAccessControlAttributeConfiguration`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct DescribeOutput {
    #[serde(default)]
    pub instance_access_control_attribute_configuration: Option<WireConfiguration>,
    #[serde(default)]
    pub status: Option<Status>,
    #[serde(default)]
    pub status_reason: Option<String>,
}

/// `InstanceMetadata` from `ListInstances`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct InstanceSummary {
    pub instance_arn: String,
    #[serde(default)]
    pub identity_store_id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
}

/// One page of `ListInstances`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ListInstancesOutput {
    #[serde(default)]
    pub instances: Vec<InstanceSummary>,
    #[serde(default)]
    pub next_token: Option<String>,
}

/// Remote control-plane operations used by the reconciler
#[async_trait]
pub trait SsoAdminApi: Send + Sync {
    async fn describe_configuration(&self, arn: &InstanceArn) -> Result<DescribeOutput, ApiError>;

    async fn create_configuration(
        &self,
        arn: &InstanceArn,
        payload: &ConfigurationPayload,
    ) -> Result<(), ApiError>;

    async fn update_configuration(
        &self,
        arn: &InstanceArn,
        payload: &ConfigurationPayload,
    ) -> Result<(), ApiError>;

    async fn delete_configuration(&self, arn: &InstanceArn) -> Result<(), ApiError>;

    async fn list_instances(&self, next_token: Option<&str>) -> Result<ListInstancesOutput, ApiError>;
}

/// List all instances (auto-paginate)
pub async fn list_all_instances(api: &dyn SsoAdminApi) -> Result<Vec<InstanceSummary>, ApiError> {
    let mut all_instances = Vec::new();
    let mut next_token: Option<String> = None;

    loop {
        let page = api.list_instances(next_token.as_deref()).await?;
        all_instances.extend(page.instances);

        match page.next_token {
            Some(token) if !token.is_empty() => next_token = Some(token),
            _ => break,
        }
    }

    Ok(all_instances)
}
