//! Remote API errors
//!
//! Every failure coming back from the control plane is classified here once,
//! so the finder and the reconciler can match on a kind instead of
//! inspecting error code strings.

use std::fmt;
use thiserror::Error;

/// Coarse classification of a remote failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiErrorKind {
    /// `ResourceNotFoundException`: nothing attached, or no such instance
    NotFound,
    /// `ConflictException`
    Conflict,
    /// `ThrottlingException` or HTTP 429
    Throttling,
    /// `InternalServerException` or any 5xx
    ServiceUnavailable,
    /// Connection, timeout or body read failure
    Network,
    /// `ValidationException`
    Validation,
    /// `AccessDeniedException`, 401, 403
    AccessDenied,
    Other,
}

impl ApiErrorKind {
    /// Map a service error code (the `__type` field) and HTTP status to a kind
    pub fn classify(code: &str, http_status: Option<u16>) -> Self {
        match code {
            "ResourceNotFoundException" => return Self::NotFound,
            "ConflictException" => return Self::Conflict,
            "ThrottlingException" | "TooManyRequestsException" => return Self::Throttling,
            "InternalServerException" | "ServiceUnavailableException" => {
                return Self::ServiceUnavailable
            }
            "ValidationException" => return Self::Validation,
            "AccessDeniedException" | "UnrecognizedClientException" => return Self::AccessDenied,
            _ => {}
        }

        match http_status {
            Some(404) => Self::NotFound,
            Some(409) => Self::Conflict,
            Some(429) => Self::Throttling,
            Some(401) | Some(403) => Self::AccessDenied,
            Some(400) => Self::Validation,
            Some(s) if s >= 500 => Self::ServiceUnavailable,
            _ => Self::Other,
        }
    }

    /// Whether a retry with backoff may succeed
    pub fn is_transient(self) -> bool {
        matches!(
            self,
            Self::Throttling | Self::ServiceUnavailable | Self::Network
        )
    }
}

impl fmt::Display for ApiErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::NotFound => "not found",
            Self::Conflict => "conflict",
            Self::Throttling => "throttled",
            Self::ServiceUnavailable => "service unavailable",
            Self::Network => "network",
            Self::Validation => "validation",
            Self::AccessDenied => "access denied",
            Self::Other => "error",
        };
        f.write_str(name)
    }
}

/// Error returned by a remote API call
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{code}: {message}")]
pub struct ApiError {
    pub kind: ApiErrorKind,
    /// Service error code, e.g. `ResourceNotFoundException`
    pub code: String,
    pub message: String,
    pub http_status: Option<u16>,
}

impl ApiError {
    pub fn new(kind: ApiErrorKind, code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind,
            code: code.into(),
            message: message.into(),
            http_status: None,
        }
    }

    /// Build from a service error response
    pub fn from_response(code: &str, message: &str, http_status: u16) -> Self {
        Self {
            kind: ApiErrorKind::classify(code, Some(http_status)),
            code: code.to_string(),
            message: message.to_string(),
            http_status: Some(http_status),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ApiErrorKind::NotFound, "ResourceNotFoundException", message)
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(ApiErrorKind::Conflict, "ConflictException", message)
    }

    pub fn throttled(message: impl Into<String>) -> Self {
        Self::new(ApiErrorKind::Throttling, "ThrottlingException", message)
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::new(ApiErrorKind::Network, "NetworkError", message)
    }

    pub fn is_not_found(&self) -> bool {
        self.kind == ApiErrorKind::NotFound
    }

    pub fn is_transient(&self) -> bool {
        self.kind.is_transient()
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        match err.status() {
            Some(status) => {
                let code = status.canonical_reason().unwrap_or("HttpError");
                Self::from_response(code, &err.to_string(), status.as_u16())
            }
            None => Self::network(err.to_string()),
        }
    }
}
