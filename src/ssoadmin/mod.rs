//! SSO Admin API interaction module
//!
//! This module provides everything needed to talk to the IAM Identity Center
//! control plane about instance access control attribute configurations.
//!
//! # Module Structure
//!
//! - [`api`] - The [`api::SsoAdminApi`] trait and wire shapes
//! - [`arn`] - Instance ARN parsing and validation
//! - [`client`] - HTTP-backed implementation of the API
//! - [`error`] - Classification of remote failures
//! - [`http`] - JSON protocol transport
//! - [`memory`] - In-memory implementation for tests and dry runs
//!
//! # Example
//!
//! ```ignore
//! use sso_attrs::ssoadmin::{client::SsoAdminClient, api::SsoAdminApi, arn::InstanceArn};
//!
//! async fn example() -> anyhow::Result<()> {
//!     let client = SsoAdminClient::new("us-east-1", None)?;
//!     let arn = InstanceArn::parse("arn:aws:sso:::instance/ssoins-1234567890abcdef")?;
//!     let output = client.describe_configuration(&arn).await?;
//!     Ok(())
//! }
//! ```

pub mod api;
pub mod arn;
pub mod client;
pub mod error;
pub mod http;
pub mod memory;
