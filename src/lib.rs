//! Reconcile IAM Identity Center instance access control attributes.
//!
//! An instance carries at most one access control attribute configuration.
//! This crate reads it, compares it with a declarative manifest and drives
//! it to the desired state through the SSO Admin API.

pub mod config;
pub mod error;
pub mod resource;
pub mod ssoadmin;

pub use error::{ConfigurationError, ReconcileError};
