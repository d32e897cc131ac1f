//! Integration tests for the SSO Admin HTTP client using wiremock
//!
//! These tests verify request metadata, error-code classification and
//! pagination against mocked endpoints, and drive one reconciler operation
//! end to end over HTTP.

use serde_json::json;
use std::sync::Arc;
use wiremock::matchers::{body_partial_json, header, header_exists, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use sso_attrs::resource::{AttributeMapping, DesiredConfiguration, Reconciler, RetryPolicy};
use sso_attrs::ssoadmin::api::{list_all_instances, SsoAdminApi};
use sso_attrs::ssoadmin::arn::InstanceArn;
use sso_attrs::ssoadmin::client::SsoAdminClient;
use sso_attrs::ssoadmin::error::ApiErrorKind;
use sso_attrs::ReconcileError;

const ARN: &str = "arn:aws:sso:::instance/ssoins-1234567890abcdef";
const DESCRIBE: &str =
    "SWBExternalService.DescribeInstanceAccessControlAttributeConfiguration";
const CREATE: &str = "SWBExternalService.CreateInstanceAccessControlAttributeConfiguration";

fn arn() -> InstanceArn {
    InstanceArn::parse(ARN).unwrap()
}

fn client(server: &MockServer) -> SsoAdminClient {
    SsoAdminClient::new("us-east-1", Some(&server.uri())).unwrap()
}

fn error_body(code: &str, message: &str) -> ResponseTemplate {
    ResponseTemplate::new(400).set_body_json(json!({ "__type": code, "message": message }))
}

fn fast() -> RetryPolicy {
    RetryPolicy {
        max_attempts: 3,
        initial_delay_ms: 1,
        max_delay_ms: 5,
        ..RetryPolicy::default()
    }
}

fn described() -> serde_json::Value {
    json!({
        "InstanceAccessControlAttributeConfiguration": {
            "AccessControlAttributes": [
                {"Key": "name", "Value": {"Source": ["${path:name.givenName}"]}}
            ]
        },
        "Status": "ENABLED",
        "StatusReason": "Enabled by administrator"
    })
}

/// Test module for request metadata
mod request_tests {
    use super::*;

    /// Describe sends the JSON 1.1 target and content type
    #[tokio::test]
    async fn test_describe_sends_target_and_content_type() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/"))
            .and(header("x-amz-target", DESCRIBE))
            .and(header("content-type", "application/x-amz-json-1.1"))
            .and(header_exists("amz-sdk-invocation-id"))
            .and(body_partial_json(json!({ "InstanceArn": ARN })))
            .respond_with(ResponseTemplate::new(200).set_body_json(described()))
            .expect(1)
            .mount(&server)
            .await;

        let output = client(&server).describe_configuration(&arn()).await.unwrap();

        let configuration = output.instance_access_control_attribute_configuration.unwrap();
        assert_eq!(configuration.access_control_attributes[0].key, "name");
        assert_eq!(output.status_reason.as_deref(), Some("Enabled by administrator"));
    }

    /// Session token is forwarded when present
    #[tokio::test]
    async fn test_session_token_header() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(header("x-amz-security-token", "session-123"))
            .respond_with(ResponseTemplate::new(200).set_body_json(described()))
            .expect(1)
            .mount(&server)
            .await;

        let client = client(&server).with_session_token(Some("session-123".into()));
        client.describe_configuration(&arn()).await.unwrap();
    }

    /// An empty success body is accepted for writes
    #[tokio::test]
    async fn test_delete_with_empty_body() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(header(
                "x-amz-target",
                "SWBExternalService.DeleteInstanceAccessControlAttributeConfiguration",
            ))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        client(&server).delete_configuration(&arn()).await.unwrap();
    }
}

/// Test module for error classification
mod error_tests {
    use super::*;

    #[tokio::test]
    async fn test_resource_not_found() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(error_body("ResourceNotFoundException", "nothing attached"))
            .mount(&server)
            .await;

        let err = client(&server).describe_configuration(&arn()).await.unwrap_err();
        assert_eq!(err.kind, ApiErrorKind::NotFound);
        assert_eq!(err.message, "nothing attached");
    }

    #[tokio::test]
    async fn test_conflict_from_error_type_header() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(400)
                    .insert_header("x-amzn-errortype", "ConflictException:http://internal/"),
            )
            .mount(&server)
            .await;

        let err = client(&server).delete_configuration(&arn()).await.unwrap_err();
        assert_eq!(err.kind, ApiErrorKind::Conflict);
    }

    #[tokio::test]
    async fn test_throttling_is_transient() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(error_body("ThrottlingException", "Rate exceeded"))
            .mount(&server)
            .await;

        let err = client(&server).describe_configuration(&arn()).await.unwrap_err();
        assert_eq!(err.kind, ApiErrorKind::Throttling);
        assert!(err.is_transient());
    }

    #[tokio::test]
    async fn test_server_error_is_transient() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500).set_body_string("<html>oops</html>"))
            .mount(&server)
            .await;

        let err = client(&server).describe_configuration(&arn()).await.unwrap_err();
        assert!(err.is_transient());
        assert_eq!(err.http_status, Some(500));
    }

    #[tokio::test]
    async fn test_access_denied_is_fatal() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(error_body("AccessDeniedException", "not authorized"))
            .mount(&server)
            .await;

        let err = client(&server).describe_configuration(&arn()).await.unwrap_err();
        assert_eq!(err.kind, ApiErrorKind::AccessDenied);
        assert!(!err.is_transient());
    }
}

/// Test module for instance discovery
mod pagination_tests {
    use super::*;

    #[tokio::test]
    async fn test_list_instances_follows_next_token() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(header("x-amz-target", "SWBExternalService.ListInstances"))
            .and(body_partial_json(json!({ "NextToken": "page-2" })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "Instances": [{"InstanceArn": "arn:aws:sso:::instance/ssoins-2"}]
            })))
            .expect(1)
            .mount(&server)
            .await;

        Mock::given(method("POST"))
            .and(header("x-amz-target", "SWBExternalService.ListInstances"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "Instances": [{
                    "InstanceArn": ARN,
                    "IdentityStoreId": "d-1234567890",
                    "Status": "ACTIVE"
                }],
                "NextToken": "page-2"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = client(&server);
        let instances = list_all_instances(&client).await.unwrap();

        assert_eq!(instances.len(), 2);
        assert_eq!(instances[0].instance_arn, ARN);
        assert_eq!(instances[0].identity_store_id.as_deref(), Some("d-1234567890"));
        assert_eq!(instances[1].instance_arn, "arn:aws:sso:::instance/ssoins-2");
    }
}

/// Test module for reconciler operations over HTTP
mod reconcile_tests {
    use super::*;

    /// Create waits until a lagging describe shows the new configuration
    #[tokio::test]
    async fn test_create_waits_for_propagation() {
        let server = MockServer::start().await;

        // pre-create lookup plus one stale read after the write
        Mock::given(method("POST"))
            .and(header("x-amz-target", DESCRIBE))
            .respond_with(error_body("ResourceNotFoundException", "not yet"))
            .up_to_n_times(2)
            .expect(2)
            .mount(&server)
            .await;

        Mock::given(method("POST"))
            .and(header("x-amz-target", DESCRIBE))
            .respond_with(ResponseTemplate::new(200).set_body_json(described()))
            .mount(&server)
            .await;

        Mock::given(method("POST"))
            .and(header("x-amz-target", CREATE))
            .and(body_partial_json(json!({
                "InstanceArn": ARN,
                "InstanceAccessControlAttributeConfiguration": {
                    "AccessControlAttributes": [
                        {"Key": "name", "Value": {"Source": ["${path:name.givenName}"]}}
                    ]
                }
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
            .expect(1)
            .mount(&server)
            .await;

        let reconciler = Reconciler::new(Arc::new(client(&server)), fast());
        let desired = DesiredConfiguration::new(
            arn(),
            vec![AttributeMapping::new("name", ["${path:name.givenName}"])],
            None,
        )
        .unwrap();

        let observed = reconciler.create(&desired).await.unwrap();
        assert_eq!(observed.attributes.len(), 1);
        assert_eq!(observed.status_reason.as_deref(), Some("Enabled by administrator"));
    }

    /// Persistent throttling exhausts the retry budget
    #[tokio::test]
    async fn test_read_retries_throttling_then_gives_up() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(error_body("ThrottlingException", "Rate exceeded"))
            .expect(3)
            .mount(&server)
            .await;

        let reconciler = Reconciler::new(Arc::new(client(&server)), fast());
        let err = reconciler.read(&arn()).await.unwrap_err();

        match err {
            ReconcileError::Transient { attempts, arn, .. } => {
                assert_eq!(attempts, 3);
                assert_eq!(arn, ARN);
            }
            other => panic!("unexpected error {other:?}"),
        }
    }
}
