//! Instance ARNs
//!
//! The parent Instance is the only identity this tool knows about: the
//! attribute configuration has no identifier of its own, so the instance
//! ARN doubles as the tracked resource ID.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::ConfigurationError;

/// Validated ARN of an IAM Identity Center instance
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct InstanceArn(String);

impl InstanceArn {
    /// Parse and validate an ARN
    pub fn parse(value: &str) -> Result<Self, ConfigurationError> {
        if validate_arn(value) {
            Ok(Self(value.to_string()))
        } else {
            Err(ConfigurationError::InvalidArn(value.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The trailing instance id, e.g. `ssoins-1234567890abcdef`
    pub fn instance_id(&self) -> &str {
        let resource = self.0.splitn(6, ':').nth(5).unwrap_or("");
        resource.rsplit('/').next().unwrap_or(resource)
    }
}

/// Validate ARN syntax: `arn:<partition>:<service>:<region>:<account>:<resource>`
/// Partition, service and resource must be present; region and account may be
/// empty (SSO instance ARNs leave both blank).
fn validate_arn(value: &str) -> bool {
    if value.chars().any(|c| c.is_whitespace() || c.is_control()) {
        return false;
    }

    let parts: Vec<&str> = value.splitn(6, ':').collect();
    if parts.len() != 6 || parts[0] != "arn" {
        return false;
    }

    let partition = parts[1];
    if partition.is_empty()
        || !partition
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
    {
        return false;
    }

    let service = parts[2];
    if service.is_empty() || !service.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') {
        return false;
    }

    !parts[5].is_empty()
}

impl fmt::Display for InstanceArn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for InstanceArn {
    type Err = ConfigurationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for InstanceArn {
    type Error = ConfigurationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<InstanceArn> for String {
    fn from(arn: InstanceArn) -> Self {
        arn.0
    }
}

impl AsRef<str> for InstanceArn {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_instance_arn() {
        let arn = InstanceArn::parse("arn:aws:sso:::instance/ssoins-1234567890abcdef").unwrap();
        assert_eq!(arn.as_str(), "arn:aws:sso:::instance/ssoins-1234567890abcdef");
        assert_eq!(arn.instance_id(), "ssoins-1234567890abcdef");
    }

    #[test]
    fn test_parse_other_partition() {
        assert!(InstanceArn::parse("arn:aws-us-gov:sso:::instance/ssoins-abc").is_ok());
    }

    #[test]
    fn test_rejects_malformed_arns() {
        for bad in [
            "",
            "ssoins-1234",
            "arn:aws:sso::instance/ssoins-1",
            "arn::sso:::instance/ssoins-1",
            "arn:aws::::instance/ssoins-1",
            "arn:aws:sso:::",
            "arn:AWS:sso:::instance/x",
            "arn:aws:sso:::instance/ssoins 1",
            "urn:aws:sso:::instance/ssoins-1",
        ] {
            assert!(
                matches!(InstanceArn::parse(bad), Err(ConfigurationError::InvalidArn(_))),
                "expected {bad:?} to be rejected"
            );
        }
    }

    #[test]
    fn test_serde_validates() {
        let ok: Result<InstanceArn, _> =
            serde_json::from_str("\"arn:aws:sso:::instance/ssoins-1\"");
        assert!(ok.is_ok());

        let bad: Result<InstanceArn, _> = serde_json::from_str("\"not-an-arn\"");
        assert!(bad.is_err());
    }
}
