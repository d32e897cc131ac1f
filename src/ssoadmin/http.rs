//! HTTP transport for the SSO Admin JSON protocol
//!
//! Every operation is a `POST /` with an `X-Amz-Target` header naming the
//! operation and an `application/x-amz-json-1.1` body. Failures come back as
//! a JSON document carrying `__type` and `message`.

use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use reqwest::Client;
use serde_json::Value;
use url::Url;
use uuid::Uuid;

use super::error::{ApiError, ApiErrorKind};

/// Prefix for the `X-Amz-Target` header
pub const TARGET_PREFIX: &str = "SWBExternalService";

pub const CONTENT_TYPE_JSON_1_1: &str = "application/x-amz-json-1.1";

/// Maximum length of response body to log (to avoid logging sensitive data)
const MAX_LOG_BODY_LENGTH: usize = 200;

/// Sanitize response body for logging
/// Truncates long responses and strips non-printable characters
fn sanitize_for_log(body: &str) -> String {
    let truncated = if body.len() > MAX_LOG_BODY_LENGTH {
        let mut end = MAX_LOG_BODY_LENGTH;
        while !body.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}... [truncated, {} bytes total]", &body[..end], body.len())
    } else {
        body.to_string()
    };

    truncated.replace(|c: char| !c.is_ascii_graphic() && c != ' ', "")
}

/// Extract the bare error code from `__type` or `x-amzn-ErrorType`
/// e.g. `com.amazonaws.swbexternalservice#ResourceNotFoundException` -> `ResourceNotFoundException`
fn parse_error_code(raw: &str) -> String {
    let code = raw.rsplit('#').next().unwrap_or(raw);
    code.split(':').next().unwrap_or(code).trim().to_string()
}

/// Build an [`ApiError`] from a non-success response
fn parse_error_response(status: u16, headers: &HeaderMap, body: &str) -> ApiError {
    let parsed: Option<Value> = serde_json::from_str(body).ok();

    let code = parsed
        .as_ref()
        .and_then(|v| v.get("__type").or_else(|| v.get("code")))
        .and_then(|v| v.as_str())
        .map(parse_error_code)
        .or_else(|| {
            headers
                .get("x-amzn-errortype")
                .and_then(|v| v.to_str().ok())
                .map(parse_error_code)
        })
        .unwrap_or_default();

    let message = parsed
        .as_ref()
        .and_then(|v| v.get("message").or_else(|| v.get("Message")))
        .and_then(|v| v.as_str())
        .unwrap_or("")
        .to_string();

    let code = if code.is_empty() {
        format!("Http{}", status)
    } else {
        code
    };

    ApiError::from_response(&code, &message, status)
}

/// HTTP client wrapper for SSO Admin API calls
#[derive(Clone)]
pub struct SsoAdminHttpClient {
    client: Client,
}

impl SsoAdminHttpClient {
    /// Create a new HTTP client
    pub fn new() -> Result<Self, ApiError> {
        let client = Client::builder()
            .user_agent(concat!("sso-attrs/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ApiError::new(ApiErrorKind::Other, "ClientBuild", e.to_string()))?;

        Ok(Self { client })
    }

    /// Invoke one operation and return the parsed response document
    pub async fn call(
        &self,
        endpoint: &Url,
        operation: &str,
        body: &Value,
        session_token: Option<&str>,
    ) -> Result<Value, ApiError> {
        let target = format!("{}.{}", TARGET_PREFIX, operation);
        let invocation_id = Uuid::new_v4().to_string();
        tracing::debug!(%target, %invocation_id, "POST {}", endpoint);

        let mut request = self
            .client
            .post(endpoint.clone())
            .header(CONTENT_TYPE, HeaderValue::from_static(CONTENT_TYPE_JSON_1_1))
            .header("x-amz-target", target)
            .header("amz-sdk-invocation-id", invocation_id)
            .body(body.to_string());

        if let Some(token) = session_token {
            request = request.header("x-amz-security-token", token);
        }

        let response = request.send().await.map_err(ApiError::from)?;

        let status = response.status();
        let headers = response.headers().clone();
        let response_body = response.text().await.map_err(ApiError::from)?;

        if !status.is_success() {
            // Security: Only log sanitized/truncated error body to avoid leaking sensitive data
            tracing::error!(
                operation,
                "API error: {} - {}",
                status,
                sanitize_for_log(&response_body)
            );
            return Err(parse_error_response(status.as_u16(), &headers, &response_body));
        }

        // Handle empty response
        if response_body.trim().is_empty() {
            return Ok(Value::Object(serde_json::Map::new()));
        }

        serde_json::from_str(&response_body).map_err(|e| {
            ApiError::new(
                ApiErrorKind::Other,
                "SerializationException",
                format!("failed to parse {} response: {}", operation, e),
            )
        })
    }
}
