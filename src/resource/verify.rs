//! Existence and drift checks
//!
//! Predicates for out-of-band verification: "does the configuration still
//! exist", "is it gone". They reuse the reconciler's own lookup so both
//! sides always agree on existence.

use tracing::info;

use super::model::{DesiredConfiguration, ObservedConfiguration};
use super::normalize::{self, AttributeDiff};
use super::reconciler::Reconciler;
use crate::error::ReconcileError;
use crate::ssoadmin::arn::InstanceArn;

/// Drift between a desired configuration and what is attached
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Drift {
    InSync,
    /// Nothing attached any more
    Disappeared,
    Changed {
        current: ObservedConfiguration,
        diff: AttributeDiff,
    },
}

#[derive(Clone)]
pub struct Verifier {
    reconciler: Reconciler,
}

impl Verifier {
    pub fn new(reconciler: Reconciler) -> Self {
        Self { reconciler }
    }

    /// Whether a configuration is attached to `arn`
    pub async fn exists(&self, arn: &InstanceArn) -> Result<bool, ReconcileError> {
        Ok(self.reconciler.find(arn, "exists").await?.is_some())
    }

    /// Whether nothing is attached to `arn`
    pub async fn destroyed(&self, arn: &InstanceArn) -> Result<bool, ReconcileError> {
        Ok(self.reconciler.find(arn, "destroyed").await?.is_none())
    }

    /// Compare what is attached with `desired`
    pub async fn drift(&self, desired: &DesiredConfiguration) -> Result<Drift, ReconcileError> {
        let arn = &desired.instance_arn;
        Ok(match self.reconciler.find(arn, "drift").await? {
            None => Drift::Disappeared,
            Some(current) if current.matches(desired) => Drift::InSync,
            Some(current) => {
                let diff = normalize::diff(&current.attributes, &desired.attributes);
                Drift::Changed { current, diff }
            }
        })
    }

    /// Remove the configuration behind the reconciler's back
    ///
    /// Issues the delete call directly, with no retries and no wait for
    /// propagation, to simulate an out-of-band deletion.
    pub async fn force_delete(&self, arn: &InstanceArn) -> Result<(), ReconcileError> {
        match self.reconciler.api().delete_configuration(arn).await {
            Ok(()) => {
                info!(%arn, "Force-deleted access control attribute configuration");
                Ok(())
            }
            Err(err) if err.is_not_found() => Ok(()),
            Err(source) => Err(ReconcileError::Api {
                arn: arn.to_string(),
                operation: "force_delete",
                source,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::model::AttributeMapping;
    use crate::resource::retry::RetryPolicy;
    use crate::ssoadmin::memory::InMemorySsoAdmin;
    use std::sync::Arc;

    fn arn() -> InstanceArn {
        InstanceArn::parse("arn:aws:sso:::instance/ssoins-1").unwrap()
    }

    fn desired(source: &str) -> DesiredConfiguration {
        DesiredConfiguration::new(arn(), vec![AttributeMapping::new("name", [source])], None)
            .unwrap()
    }

    fn setup() -> (Reconciler, Verifier) {
        let api = Arc::new(InMemorySsoAdmin::new().with_instance(&arn()));
        let policy = RetryPolicy {
            initial_delay_ms: 1,
            max_delay_ms: 1,
            ..RetryPolicy::default()
        };
        let reconciler = Reconciler::new(api, policy);
        let verifier = Verifier::new(reconciler.clone());
        (reconciler, verifier)
    }

    #[tokio::test]
    async fn test_exists_and_destroyed() {
        let (reconciler, verifier) = setup();
        assert!(!verifier.exists(&arn()).await.unwrap());
        assert!(verifier.destroyed(&arn()).await.unwrap());

        reconciler.create(&desired("a")).await.unwrap();
        assert!(verifier.exists(&arn()).await.unwrap());
        assert!(!verifier.destroyed(&arn()).await.unwrap());
    }

    #[tokio::test]
    async fn test_drift() {
        let (reconciler, verifier) = setup();
        assert_eq!(verifier.drift(&desired("a")).await.unwrap(), Drift::Disappeared);

        reconciler.create(&desired("a")).await.unwrap();
        assert_eq!(verifier.drift(&desired("a")).await.unwrap(), Drift::InSync);

        match verifier.drift(&desired("b")).await.unwrap() {
            Drift::Changed { diff, .. } => assert_eq!(diff.changed, ["name"]),
            other => panic!("unexpected drift {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_force_delete_is_idempotent() {
        let (reconciler, verifier) = setup();
        reconciler.create(&desired("a")).await.unwrap();

        verifier.force_delete(&arn()).await.unwrap();
        verifier.force_delete(&arn()).await.unwrap();
        assert!(verifier.destroyed(&arn()).await.unwrap());
    }
}
