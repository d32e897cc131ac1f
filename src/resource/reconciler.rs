//! Reconciler
//!
//! Drives the configuration attached to one instance toward a desired
//! state. The remote API only supports full-replace writes, so every change
//! is "compare, then either do nothing or send the whole desired state".
//! Writes are followed by polling reads until the new state is visible.

use futures::future::join_all;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::finder::find_configuration;
use super::model::{DesiredConfiguration, ObservedConfiguration};
use super::normalize::{self, AttributeDiff};
use super::retry::{retry_transient, wait_for_propagation, with_deadline, RetryFailure, RetryPolicy};
use crate::error::ReconcileError;
use crate::ssoadmin::api::SsoAdminApi;
use crate::ssoadmin::arn::InstanceArn;
use crate::ssoadmin::error::ApiErrorKind;

/// Result of reading an instance
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Observation {
    Present(ObservedConfiguration),
    /// Nothing attached; the resource should no longer be tracked
    Absent,
}

impl Observation {
    pub fn is_present(&self) -> bool {
        matches!(self, Self::Present(_))
    }

    pub fn into_option(self) -> Option<ObservedConfiguration> {
        match self {
            Self::Present(observed) => Some(observed),
            Self::Absent => None,
        }
    }
}

/// Write decision for a desired configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Plan {
    /// Nothing attached yet
    Create,
    /// Attached but different; the whole set is replaced
    Replace {
        current: ObservedConfiguration,
        diff: AttributeDiff,
    },
    /// Already matches
    Noop(ObservedConfiguration),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateOutcome {
    /// Observed state already matched; no write was sent
    Unchanged(ObservedConfiguration),
    Replaced(ObservedConfiguration),
}

impl UpdateOutcome {
    pub fn configuration(&self) -> &ObservedConfiguration {
        match self {
            Self::Unchanged(c) | Self::Replaced(c) => c,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteOutcome {
    Deleted,
    /// Nothing was attached; treated as success
    AlreadyAbsent,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApplyOutcome {
    Created(ObservedConfiguration),
    Updated(ObservedConfiguration),
    Unchanged(ObservedConfiguration),
}

impl ApplyOutcome {
    pub fn configuration(&self) -> &ObservedConfiguration {
        match self {
            Self::Created(c) | Self::Updated(c) | Self::Unchanged(c) => c,
        }
    }
}

/// Reconciles instance access control attribute configurations
///
/// Holds no state besides the API handle and retry policy; every operation
/// re-reads the remote side.
#[derive(Clone)]
pub struct Reconciler {
    api: Arc<dyn SsoAdminApi>,
    policy: RetryPolicy,
}

impl Reconciler {
    pub fn new(api: Arc<dyn SsoAdminApi>, policy: RetryPolicy) -> Self {
        Self { api, policy }
    }

    /// Same API handle with a different retry policy or deadline
    pub fn with_policy(&self, policy: RetryPolicy) -> Self {
        Self {
            api: Arc::clone(&self.api),
            policy,
        }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    pub fn api(&self) -> &dyn SsoAdminApi {
        self.api.as_ref()
    }

    /// Finder call with transient retries
    pub(crate) async fn find(
        &self,
        arn: &InstanceArn,
        operation: &'static str,
    ) -> Result<Option<ObservedConfiguration>, ReconcileError> {
        let api = self.api.as_ref();
        retry_transient(&self.policy, operation, arn, move || find_configuration(api, arn))
            .await
            .map_err(|failure| failure.into_reconcile_error(arn, operation))
    }

    /// Attach `desired` to an instance that has no configuration yet
    pub async fn create(
        &self,
        desired: &DesiredConfiguration,
    ) -> Result<ObservedConfiguration, ReconcileError> {
        let arn = &desired.instance_arn;
        with_deadline(&self.policy, "create", arn, self.create_inner(desired)).await
    }

    /// Current configuration of an instance
    ///
    /// `Absent` is not an error: it means the configuration disappeared and
    /// the caller should stop tracking it.
    pub async fn read(&self, arn: &InstanceArn) -> Result<Observation, ReconcileError> {
        with_deadline(&self.policy, "read", arn, self.read_inner(arn)).await
    }

    /// Decide what a write of `desired` would do
    pub async fn plan(&self, desired: &DesiredConfiguration) -> Result<Plan, ReconcileError> {
        let arn = &desired.instance_arn;
        with_deadline(&self.policy, "plan", arn, self.plan_inner(desired, "plan")).await
    }

    /// Replace the attached configuration with `desired`
    ///
    /// No write is sent when the observed state already matches.
    pub async fn update(
        &self,
        desired: &DesiredConfiguration,
    ) -> Result<UpdateOutcome, ReconcileError> {
        let arn = &desired.instance_arn;
        with_deadline(&self.policy, "update", arn, self.update_inner(desired)).await
    }

    /// Create, update or leave alone, whichever brings the instance to `desired`
    pub async fn apply(
        &self,
        desired: &DesiredConfiguration,
    ) -> Result<ApplyOutcome, ReconcileError> {
        let arn = &desired.instance_arn;
        with_deadline(&self.policy, "apply", arn, self.apply_inner(desired)).await
    }

    /// Detach the configuration from an instance
    ///
    /// Deleting something that is already gone succeeds with `AlreadyAbsent`.
    pub async fn delete(&self, arn: &InstanceArn) -> Result<DeleteOutcome, ReconcileError> {
        with_deadline(&self.policy, "delete", arn, self.delete_inner(arn)).await
    }

    /// Start tracking an existing configuration by its instance ARN
    ///
    /// Fails with `NotFound` when nothing is attached.
    pub async fn import(&self, arn: &InstanceArn) -> Result<ObservedConfiguration, ReconcileError> {
        with_deadline(&self.policy, "import", arn, self.import_inner(arn)).await
    }

    /// Read many instances concurrently
    pub async fn refresh_all(
        &self,
        arns: &[InstanceArn],
    ) -> Vec<(InstanceArn, Result<Observation, ReconcileError>)> {
        let reads = arns
            .iter()
            .map(move |arn| async move { (arn.clone(), self.read(arn).await) });
        join_all(reads).await
    }

    async fn create_inner(
        &self,
        desired: &DesiredConfiguration,
    ) -> Result<ObservedConfiguration, ReconcileError> {
        let arn = &desired.instance_arn;
        if let Some(existing) = self.find(arn, "create").await? {
            return Err(ReconcileError::Conflict {
                arn: arn.to_string(),
                message: format!(
                    "a configuration with {} attribute(s) is already attached",
                    existing.attributes.len()
                ),
            });
        }
        self.write_create(desired).await
    }

    async fn read_inner(&self, arn: &InstanceArn) -> Result<Observation, ReconcileError> {
        match self.find(arn, "read").await? {
            Some(observed) => Ok(Observation::Present(observed)),
            None => {
                warn!(%arn, "Access control attribute configuration not found, removing from tracking");
                Ok(Observation::Absent)
            }
        }
    }

    async fn plan_inner(
        &self,
        desired: &DesiredConfiguration,
        operation: &'static str,
    ) -> Result<Plan, ReconcileError> {
        let current = self.find(&desired.instance_arn, operation).await?;
        Ok(plan_against(desired, current))
    }

    async fn update_inner(
        &self,
        desired: &DesiredConfiguration,
    ) -> Result<UpdateOutcome, ReconcileError> {
        let arn = &desired.instance_arn;
        match self.plan_inner(desired, "update").await? {
            Plan::Create => Err(ReconcileError::NotFound {
                arn: arn.to_string(),
            }),
            Plan::Noop(current) => {
                debug!(%arn, "Configuration already up to date");
                Ok(UpdateOutcome::Unchanged(current))
            }
            Plan::Replace { diff, .. } => {
                log_diff(arn, &diff);
                self.write_update(desired).await.map(UpdateOutcome::Replaced)
            }
        }
    }

    async fn apply_inner(
        &self,
        desired: &DesiredConfiguration,
    ) -> Result<ApplyOutcome, ReconcileError> {
        match self.plan_inner(desired, "apply").await? {
            Plan::Create => self.write_create(desired).await.map(ApplyOutcome::Created),
            Plan::Noop(current) => Ok(ApplyOutcome::Unchanged(current)),
            Plan::Replace { diff, .. } => {
                log_diff(&desired.instance_arn, &diff);
                self.write_update(desired).await.map(ApplyOutcome::Updated)
            }
        }
    }

    async fn delete_inner(&self, arn: &InstanceArn) -> Result<DeleteOutcome, ReconcileError> {
        let api = self.api.as_ref();
        let outcome =
            match retry_transient(&self.policy, "delete", arn, move || api.delete_configuration(arn))
                .await
            {
                Ok(()) => {
                    info!(%arn, "Deleted access control attribute configuration");
                    DeleteOutcome::Deleted
                }
                Err(RetryFailure::Fatal(err)) if err.is_not_found() => {
                    info!(%arn, "Access control attribute configuration already absent");
                    DeleteOutcome::AlreadyAbsent
                }
                Err(failure) => return Err(failure.into_reconcile_error(arn, "delete")),
            };

        wait_for_propagation(&self.policy, "delete", arn, move || self.absent(arn)).await?;
        Ok(outcome)
    }

    async fn import_inner(&self, arn: &InstanceArn) -> Result<ObservedConfiguration, ReconcileError> {
        match self.find(arn, "import").await? {
            Some(observed) => {
                info!(%arn, attributes = observed.attributes.len(), "Imported configuration");
                Ok(observed)
            }
            None => Err(ReconcileError::NotFound {
                arn: arn.to_string(),
            }),
        }
    }

    async fn write_create(
        &self,
        desired: &DesiredConfiguration,
    ) -> Result<ObservedConfiguration, ReconcileError> {
        let arn = &desired.instance_arn;
        let api = self.api.as_ref();
        let payload = desired.payload();
        let payload = &payload;
        let sent = AtomicU32::new(0);
        let sent_ref = &sent;

        let result = retry_transient(&self.policy, "create", arn, move || {
            sent_ref.fetch_add(1, Ordering::SeqCst);
            api.create_configuration(arn, payload)
        })
        .await;

        match result {
            Ok(()) => {}
            // an earlier attempt may have committed before its response was lost
            Err(RetryFailure::Fatal(err))
                if err.kind == ApiErrorKind::Conflict && sent.load(Ordering::SeqCst) > 1 =>
            {
                warn!(%arn, error = %err, "Create conflicted on retry, checking for own write");
                return self.confirm_own_create(desired, err.message).await;
            }
            Err(RetryFailure::Fatal(err)) if err.is_not_found() => {
                return Err(ReconcileError::InstanceNotFound {
                    arn: arn.to_string(),
                    source: err,
                });
            }
            Err(RetryFailure::Fatal(err)) if err.kind == ApiErrorKind::Conflict => {
                return Err(ReconcileError::Conflict {
                    arn: arn.to_string(),
                    message: err.message,
                });
            }
            Err(other) => return Err(other.into_reconcile_error(arn, "create")),
        }

        info!(%arn, attributes = desired.attributes.len(), "Created access control attribute configuration");
        self.await_desired(desired, "create").await
    }

    /// Settle a conflict seen after a retried create
    ///
    /// Succeeds when the attached configuration turns out to be `desired`;
    /// anything else is a genuine conflict.
    async fn confirm_own_create(
        &self,
        desired: &DesiredConfiguration,
        message: String,
    ) -> Result<ObservedConfiguration, ReconcileError> {
        let arn = &desired.instance_arn;
        match self.await_desired(desired, "create").await {
            Ok(observed) => {
                info!(%arn, "Earlier create attempt had been applied");
                Ok(observed)
            }
            Err(ReconcileError::PropagationTimeout { .. }) => Err(ReconcileError::Conflict {
                arn: arn.to_string(),
                message,
            }),
            Err(err) => Err(err),
        }
    }

    async fn write_update(
        &self,
        desired: &DesiredConfiguration,
    ) -> Result<ObservedConfiguration, ReconcileError> {
        let arn = &desired.instance_arn;
        let api = self.api.as_ref();
        let payload = desired.payload();
        let payload = &payload;

        retry_transient(&self.policy, "update", arn, move || {
            api.update_configuration(arn, payload)
        })
        .await
        .map_err(|failure| match failure {
            RetryFailure::Fatal(err) if err.is_not_found() => ReconcileError::NotFound {
                arn: arn.to_string(),
            },
            other => other.into_reconcile_error(arn, "update"),
        })?;

        info!(%arn, attributes = desired.attributes.len(), "Replaced access control attribute configuration");
        self.await_desired(desired, "update").await
    }

    /// Poll until the observed configuration matches `desired`
    ///
    /// A missing configuration here means the write has not propagated yet,
    /// not that it disappeared.
    async fn await_desired(
        &self,
        desired: &DesiredConfiguration,
        operation: &'static str,
    ) -> Result<ObservedConfiguration, ReconcileError> {
        let arn = &desired.instance_arn;
        wait_for_propagation(&self.policy, operation, arn, move || {
            self.matching(desired, operation)
        })
        .await
    }

    async fn matching(
        &self,
        desired: &DesiredConfiguration,
        operation: &'static str,
    ) -> Result<Option<ObservedConfiguration>, ReconcileError> {
        Ok(self
            .find(&desired.instance_arn, operation)
            .await?
            .filter(|observed| observed.matches(desired)))
    }

    async fn absent(&self, arn: &InstanceArn) -> Result<Option<()>, ReconcileError> {
        Ok(self.find(arn, "delete").await?.is_none().then_some(()))
    }
}

fn plan_against(desired: &DesiredConfiguration, current: Option<ObservedConfiguration>) -> Plan {
    match current {
        None => Plan::Create,
        Some(current) if current.matches(desired) => Plan::Noop(current),
        Some(current) => {
            let diff = normalize::diff(&current.attributes, &desired.attributes);
            Plan::Replace { current, diff }
        }
    }
}

fn log_diff(arn: &InstanceArn, diff: &AttributeDiff) {
    info!(
        %arn,
        added = ?diff.added,
        removed = ?diff.removed,
        changed = ?diff.changed,
        "Configuration drifted from desired state"
    );
}
