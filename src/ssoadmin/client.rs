//! SSO Admin Client
//!
//! Main client for the SSO Admin control plane, combining endpoint
//! resolution with the HTTP transport.
//!
//! Requests are not SigV4-signed. The public regional endpoint rejects them
//! with `AccessDeniedException`, so point the client at a signing proxy or a
//! local emulator with an endpoint override.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use url::Url;

use super::api::{
    ConfigurationPayload, DescribeOutput, ListInstancesOutput, SsoAdminApi,
};
use super::arn::InstanceArn;
use super::error::{ApiError, ApiErrorKind};
use super::http::SsoAdminHttpClient;

/// Page size requested from `ListInstances`
const LIST_INSTANCES_PAGE_SIZE: u32 = 100;

/// Build the public regional endpoint
///
/// Only useful behind a signing proxy that forwards to it; unsigned calls
/// sent here directly are denied.
pub fn default_endpoint(region: &str) -> String {
    format!("https://sso.{}.amazonaws.com/", region)
}

/// Main SSO Admin client
#[derive(Clone)]
pub struct SsoAdminClient {
    pub http: SsoAdminHttpClient,
    pub region: String,
    endpoint: Url,
    session_token: Option<String>,
}

impl SsoAdminClient {
    /// Create a client for `region`, optionally against an endpoint override
    pub fn new(region: &str, endpoint: Option<&str>) -> Result<Self, ApiError> {
        let raw = endpoint
            .map(|e| e.to_string())
            .unwrap_or_else(|| default_endpoint(region));

        let endpoint = Url::parse(&raw).map_err(|e| {
            ApiError::new(
                ApiErrorKind::Validation,
                "InvalidEndpoint",
                format!("{}: {}", raw, e),
            )
        })?;

        Ok(Self {
            http: SsoAdminHttpClient::new()?,
            region: region.to_string(),
            endpoint,
            session_token: None,
        })
    }

    /// Attach a session token sent as `X-Amz-Security-Token`
    pub fn with_session_token(mut self, token: Option<String>) -> Self {
        self.session_token = token.filter(|t| !t.is_empty());
        self
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    async fn invoke(&self, operation: &str, body: Value) -> Result<Value, ApiError> {
        self.http
            .call(&self.endpoint, operation, &body, self.session_token.as_deref())
            .await
    }

    fn decode<T: DeserializeOwned>(operation: &str, value: Value) -> Result<T, ApiError> {
        serde_json::from_value(value).map_err(|e| {
            ApiError::new(
                ApiErrorKind::Other,
                "SerializationException",
                format!("unexpected {} response shape: {}", operation, e),
            )
        })
    }
}

/// Request body shared by create and update
fn write_body(arn: &InstanceArn, payload: &ConfigurationPayload) -> Value {
    let mut body = json!({
        "InstanceArn": arn.as_str(),
        "InstanceAccessControlAttributeConfiguration": payload.configuration,
    });
    if let (Some(status), Value::Object(map)) = (payload.status, &mut body) {
        map.insert("Status".to_string(), Value::String(status.as_str().to_string()));
    }
    body
}

#[async_trait]
impl SsoAdminApi for SsoAdminClient {
    async fn describe_configuration(&self, arn: &InstanceArn) -> Result<DescribeOutput, ApiError> {
        const OP: &str = "DescribeInstanceAccessControlAttributeConfiguration";
        let response = self.invoke(OP, json!({ "InstanceArn": arn.as_str() })).await?;
        Self::decode(OP, response)
    }

    async fn create_configuration(
        &self,
        arn: &InstanceArn,
        payload: &ConfigurationPayload,
    ) -> Result<(), ApiError> {
        self.invoke(
            "CreateInstanceAccessControlAttributeConfiguration",
            write_body(arn, payload),
        )
        .await?;
        Ok(())
    }

    async fn update_configuration(
        &self,
        arn: &InstanceArn,
        payload: &ConfigurationPayload,
    ) -> Result<(), ApiError> {
        self.invoke(
            "UpdateInstanceAccessControlAttributeConfiguration",
            write_body(arn, payload),
        )
        .await?;
        Ok(())
    }

    async fn delete_configuration(&self, arn: &InstanceArn) -> Result<(), ApiError> {
        self.invoke(
            "DeleteInstanceAccessControlAttributeConfiguration",
            json!({ "InstanceArn": arn.as_str() }),
        )
        .await?;
        Ok(())
    }

    async fn list_instances(&self, next_token: Option<&str>) -> Result<ListInstancesOutput, ApiError> {
        const OP: &str = "ListInstances";
        let mut body = json!({ "MaxResults": LIST_INSTANCES_PAGE_SIZE });
        if let (Some(token), Value::Object(map)) = (next_token, &mut body) {
            map.insert("NextToken".to_string(), Value::String(token.to_string()));
        }
        let response = self.invoke(OP, body).await?;
        Self::decode(OP, response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ssoadmin::api::{Status, WireAttribute, WireAttributeValue, WireConfiguration};

    #[test]
    fn test_default_endpoint() {
        assert_eq!(default_endpoint("eu-west-1"), "https://sso.eu-west-1.amazonaws.com/");
        let client = SsoAdminClient::new("us-east-1", None).unwrap();
        assert_eq!(client.endpoint().host_str(), Some("sso.us-east-1.amazonaws.com"));
    }

    #[test]
    fn test_endpoint_override_and_validation() {
        let client = SsoAdminClient::new("us-east-1", Some("http://localhost:4566")).unwrap();
        assert_eq!(client.endpoint().port(), Some(4566));

        let err = SsoAdminClient::new("us-east-1", Some("not a url")).err().unwrap();
        assert_eq!(err.kind, ApiErrorKind::Validation);
    }

    #[test]
    fn test_write_body_shape() {
        let arn = InstanceArn::parse("arn:aws:sso:::instance/ssoins-1").unwrap();
        let payload = ConfigurationPayload {
            configuration: WireConfiguration {
                access_control_attributes: vec![WireAttribute {
                    key: "name".into(),
                    value: WireAttributeValue {
                        source: vec!["${path:name.givenName}".into()],
                    },
                }],
            },
            status: None,
        };

        let body = write_body(&arn, &payload);
        assert_eq!(body["InstanceArn"], "arn:aws:sso:::instance/ssoins-1");
        assert_eq!(
            body["InstanceAccessControlAttributeConfiguration"]["AccessControlAttributes"][0]["Key"],
            "name"
        );
        assert!(body.get("Status").is_none());

        let with_status = write_body(
            &arn,
            &ConfigurationPayload {
                status: Some(Status::Disabled),
                ..payload
            },
        );
        assert_eq!(with_status["Status"], "DISABLED");
    }

    #[test]
    fn test_empty_session_token_dropped() {
        let client = SsoAdminClient::new("us-east-1", None)
            .unwrap()
            .with_session_token(Some(String::new()));
        assert!(client.session_token.is_none());
    }
}
