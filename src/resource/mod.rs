//! Resource reconciliation
//!
//! This module keeps the access control attribute configuration of an
//! instance consistent with a desired state.
//!
//! # Architecture
//!
//! - [`model`] - Desired and observed configurations
//! - [`normalize`] - Order-independent comparison and wire conversion
//! - [`finder`] - Describe call translated into present/absent
//! - [`retry`] - Transient retries, propagation polling, deadlines
//! - [`reconciler`] - Create, read, update, delete, import, plan, apply
//! - [`verify`] - Existence and drift predicates
//! - [`manifest`] - The declarative resource block
//! - [`state`] - Tracked resources keyed by instance ARN
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use sso_attrs::resource::{Manifest, Reconciler, RetryPolicy};
//! use sso_attrs::ssoadmin::client::SsoAdminClient;
//!
//! async fn apply(text: &str) -> anyhow::Result<()> {
//!     let client = SsoAdminClient::new("us-east-1", None)?;
//!     let reconciler = Reconciler::new(Arc::new(client), RetryPolicy::default());
//!     let desired = Manifest::parse(text)?.to_desired()?;
//!     reconciler.apply(&desired).await?;
//!     Ok(())
//! }
//! ```

pub mod finder;
pub mod manifest;
pub mod model;
pub mod normalize;
pub mod reconciler;
pub mod retry;
pub mod state;
pub mod verify;

pub use finder::find_configuration;
pub use manifest::Manifest;
pub use model::{AttributeMapping, AttributeSet, DesiredConfiguration, ObservedConfiguration, Status};
pub use reconciler::{ApplyOutcome, DeleteOutcome, Observation, Plan, Reconciler, UpdateOutcome};
pub use retry::RetryPolicy;
pub use state::{StateStore, TrackedResource};
pub use verify::{Drift, Verifier};
