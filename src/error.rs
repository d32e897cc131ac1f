//! Error types
//!
//! `ConfigurationError` covers a malformed desired state and is raised before
//! any remote call. `ReconcileError` is what every reconciler operation
//! returns; each variant names the instance ARN it was working on.

use std::time::Duration;
use thiserror::Error;

use crate::ssoadmin::error::ApiError;

/// Malformed desired state
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigurationError {
    #[error("invalid ARN: {0:?}")]
    InvalidArn(String),

    #[error("attribute key must not be empty")]
    EmptyKey,

    #[error("duplicate attribute key {0:?}")]
    DuplicateKey(String),

    #[error("attribute {key:?} has no sources")]
    EmptySources { key: String },

    #[error("attribute {key:?} has an empty source expression")]
    EmptySource { key: String },

    #[error("at least one attribute is required")]
    NoAttributes,

    #[error("invalid manifest: {0}")]
    Manifest(String),
}

/// Outcome taxonomy for reconciler operations
#[derive(Debug, Error)]
pub enum ReconcileError {
    /// No configuration is attached to the instance
    #[error("no access control attribute configuration found for {arn}")]
    NotFound { arn: String },

    /// The parent instance itself does not exist
    #[error("instance {arn} does not exist: {source}")]
    InstanceNotFound {
        arn: String,
        #[source]
        source: ApiError,
    },

    /// Transient failures kept happening until the retry budget ran out
    #[error("{operation} for {arn} failed after {attempts} attempts: {source}")]
    Transient {
        arn: String,
        operation: &'static str,
        attempts: u32,
        #[source]
        source: ApiError,
    },

    /// The write was accepted but the expected state never became visible
    #[error("{operation} for {arn} succeeded but the change was not visible after {attempts} reads")]
    PropagationTimeout {
        arn: String,
        operation: &'static str,
        attempts: u32,
    },

    /// Desired-state precondition violated
    #[error("conflict on {arn}: {message}")]
    Conflict { arn: String, message: String },

    #[error("invalid configuration for {arn}: {source}")]
    Configuration {
        arn: String,
        #[source]
        source: ConfigurationError,
    },

    /// Any other remote failure, surfaced as-is
    #[error("{operation} for {arn} failed: {source}")]
    Api {
        arn: String,
        operation: &'static str,
        #[source]
        source: ApiError,
    },

    /// The caller-supplied deadline elapsed
    #[error("{operation} for {arn} timed out after {after:?}")]
    Timeout {
        arn: String,
        operation: &'static str,
        after: Duration,
    },
}

impl ReconcileError {
    pub fn configuration(arn: impl Into<String>, source: ConfigurationError) -> Self {
        Self::Configuration {
            arn: arn.into(),
            source,
        }
    }

    /// ARN of the instance the failed operation targeted
    pub fn arn(&self) -> &str {
        match self {
            Self::NotFound { arn }
            | Self::InstanceNotFound { arn, .. }
            | Self::Transient { arn, .. }
            | Self::PropagationTimeout { arn, .. }
            | Self::Conflict { arn, .. }
            | Self::Configuration { arn, .. }
            | Self::Api { arn, .. }
            | Self::Timeout { arn, .. } => arn,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}
