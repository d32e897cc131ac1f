//! In-memory SSO Admin
//!
//! A stand-in for the remote control plane with the same observable
//! contract: one configuration per instance, full-replace writes,
//! `ResourceNotFoundException`/`ConflictException` where the service raises
//! them. It counts calls per operation, can inject failures, and can delay
//! visibility of writes to model eventual consistency.

use async_trait::async_trait;
use std::collections::{BTreeMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};

use super::api::{
    ConfigurationPayload, DescribeOutput, InstanceSummary, ListInstancesOutput, SsoAdminApi,
    Status, WireConfiguration,
};
use super::arn::InstanceArn;
use super::error::{ApiError, ApiErrorKind};

/// Operations of [`SsoAdminApi`], for call counting and fault injection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Describe,
    Create,
    Update,
    Delete,
    ListInstances,
}

impl Operation {
    fn index(self) -> usize {
        match self {
            Self::Describe => 0,
            Self::Create => 1,
            Self::Update => 2,
            Self::Delete => 3,
            Self::ListInstances => 4,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Stored {
    configuration: WireConfiguration,
    status: Status,
}

#[derive(Debug)]
struct InstanceState {
    summary: InstanceSummary,
    /// Latest accepted write
    committed: Option<Stored>,
    /// What readers currently see
    visible: Option<Stored>,
    /// Reads left before `visible` catches up with `committed`
    stale_reads: usize,
}

#[derive(Debug, Default)]
struct Inner {
    instances: BTreeMap<String, InstanceState>,
    faults: VecDeque<(Operation, ApiError)>,
    /// Writes that are applied but answered with an error
    lost_responses: VecDeque<(Operation, ApiError)>,
    visibility_lag: usize,
    page_size: usize,
}

/// In-memory implementation of [`SsoAdminApi`]
#[derive(Debug)]
pub struct InMemorySsoAdmin {
    inner: Mutex<Inner>,
    calls: [AtomicUsize; 5],
}

impl Default for InMemorySsoAdmin {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemorySsoAdmin {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                page_size: 100,
                ..Inner::default()
            }),
            calls: Default::default(),
        }
    }

    /// Register an instance with no configuration attached
    pub fn with_instance(self, arn: &InstanceArn) -> Self {
        self.add_instance(arn);
        self
    }

    /// Number of stale reads served after each write
    pub fn with_visibility_lag(self, reads: usize) -> Self {
        self.lock().visibility_lag = reads;
        self
    }

    /// Page size for `ListInstances`
    pub fn with_page_size(self, size: usize) -> Self {
        self.lock().page_size = size.max(1);
        self
    }

    pub fn add_instance(&self, arn: &InstanceArn) {
        let mut inner = self.lock();
        inner
            .instances
            .entry(arn.to_string())
            .or_insert_with(|| InstanceState {
                summary: InstanceSummary {
                    instance_arn: arn.to_string(),
                    identity_store_id: Some(format!("d-{}", arn.instance_id())),
                    name: None,
                    status: Some("ACTIVE".to_string()),
                },
                committed: None,
                visible: None,
                stale_reads: 0,
            });
    }

    /// Attach a configuration directly, immediately visible
    pub fn seed(&self, arn: &InstanceArn, configuration: WireConfiguration, status: Status) {
        self.add_instance(arn);
        let mut inner = self.lock();
        if let Some(state) = inner.instances.get_mut(arn.as_str()) {
            let stored = Stored {
                configuration,
                status,
            };
            state.committed = Some(stored.clone());
            state.visible = Some(stored);
            state.stale_reads = 0;
        }
    }

    /// Fail the next call of `operation` with `error`
    pub fn fail_next(&self, operation: Operation, error: ApiError) {
        self.lock().faults.push_back((operation, error));
    }

    /// Apply the next write of `operation`, then answer it with `error`
    ///
    /// Models a response lost after the service committed the change.
    pub fn lose_next_response(&self, operation: Operation, error: ApiError) {
        self.lock().lost_responses.push_back((operation, error));
    }

    /// Number of calls made to `operation` so far
    pub fn calls(&self, operation: Operation) -> usize {
        self.calls[operation.index()].load(Ordering::SeqCst)
    }

    /// Total number of writes (create, update, delete)
    pub fn write_calls(&self) -> usize {
        self.calls(Operation::Create) + self.calls(Operation::Update) + self.calls(Operation::Delete)
    }

    /// Latest committed configuration, ignoring visibility lag
    pub fn committed(&self, arn: &InstanceArn) -> Option<WireConfiguration> {
        self.lock()
            .instances
            .get(arn.as_str())
            .and_then(|s| s.committed.as_ref())
            .map(|s| s.configuration.clone())
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Count the call and pop an injected fault for it, if any
    fn enter(&self, operation: Operation) -> Result<MutexGuard<'_, Inner>, ApiError> {
        self.calls[operation.index()].fetch_add(1, Ordering::SeqCst);
        let mut inner = self.lock();
        if let Some(pos) = inner.faults.iter().position(|(op, _)| *op == operation) {
            if let Some((_, err)) = inner.faults.remove(pos) {
                return Err(err);
            }
        }
        Ok(inner)
    }
}

fn instance_not_found(arn: &InstanceArn) -> ApiError {
    ApiError::not_found(format!("Instance {} not found", arn))
}

fn configuration_not_found(arn: &InstanceArn) -> ApiError {
    ApiError::not_found(format!(
        "No access control attribute configuration attached to {}",
        arn
    ))
}

/// Error owed to the caller of a write that was already applied
fn take_lost_response(inner: &mut Inner, operation: Operation) -> Result<(), ApiError> {
    match inner.lost_responses.iter().position(|(op, _)| *op == operation) {
        Some(pos) => match inner.lost_responses.remove(pos) {
            Some((_, err)) => Err(err),
            None => Ok(()),
        },
        None => Ok(()),
    }
}

/// Record a write and start the stale-read window
fn commit(state: &mut InstanceState, value: Option<Stored>, lag: usize) {
    state.committed = value;
    if lag == 0 {
        state.visible = state.committed.clone();
    }
    state.stale_reads = lag;
}

#[async_trait]
impl SsoAdminApi for InMemorySsoAdmin {
    async fn describe_configuration(&self, arn: &InstanceArn) -> Result<DescribeOutput, ApiError> {
        let mut inner = self.enter(Operation::Describe)?;
        let state = inner
            .instances
            .get_mut(arn.as_str())
            .ok_or_else(|| instance_not_found(arn))?;

        if state.stale_reads > 0 {
            state.stale_reads -= 1;
        } else {
            state.visible = state.committed.clone();
        }

        match &state.visible {
            Some(stored) => Ok(DescribeOutput {
                instance_access_control_attribute_configuration: Some(
                    stored.configuration.clone(),
                ),
                status: Some(stored.status),
                status_reason: None,
            }),
            None => Err(configuration_not_found(arn)),
        }
    }

    async fn create_configuration(
        &self,
        arn: &InstanceArn,
        payload: &ConfigurationPayload,
    ) -> Result<(), ApiError> {
        let mut inner = self.enter(Operation::Create)?;
        let lag = inner.visibility_lag;
        let state = inner
            .instances
            .get_mut(arn.as_str())
            .ok_or_else(|| instance_not_found(arn))?;

        if state.committed.is_some() {
            return Err(ApiError::conflict(format!(
                "Access control attribute configuration already exists for {}",
                arn
            )));
        }

        let stored = Stored {
            configuration: payload.configuration.clone(),
            status: payload.status.unwrap_or(Status::Enabled),
        };
        commit(state, Some(stored), lag);
        take_lost_response(&mut inner, Operation::Create)
    }

    async fn update_configuration(
        &self,
        arn: &InstanceArn,
        payload: &ConfigurationPayload,
    ) -> Result<(), ApiError> {
        let mut inner = self.enter(Operation::Update)?;
        let lag = inner.visibility_lag;
        let state = inner
            .instances
            .get_mut(arn.as_str())
            .ok_or_else(|| instance_not_found(arn))?;

        let Some(previous) = state.committed.as_ref() else {
            return Err(configuration_not_found(arn));
        };

        let stored = Stored {
            configuration: payload.configuration.clone(),
            status: payload.status.unwrap_or(previous.status),
        };
        commit(state, Some(stored), lag);
        take_lost_response(&mut inner, Operation::Update)
    }

    async fn delete_configuration(&self, arn: &InstanceArn) -> Result<(), ApiError> {
        let mut inner = self.enter(Operation::Delete)?;
        let lag = inner.visibility_lag;
        let state = inner
            .instances
            .get_mut(arn.as_str())
            .ok_or_else(|| instance_not_found(arn))?;

        if state.committed.is_none() {
            return Err(configuration_not_found(arn));
        }

        commit(state, None, lag);
        take_lost_response(&mut inner, Operation::Delete)
    }

    async fn list_instances(&self, next_token: Option<&str>) -> Result<ListInstancesOutput, ApiError> {
        let inner = self.enter(Operation::ListInstances)?;
        let start = match next_token {
            Some(token) => token.parse::<usize>().map_err(|_| {
                ApiError::new(
                    ApiErrorKind::Validation,
                    "ValidationException",
                    format!("invalid NextToken {:?}", token),
                )
            })?,
            None => 0,
        };

        let instances: Vec<InstanceSummary> = inner
            .instances
            .values()
            .skip(start)
            .take(inner.page_size)
            .map(|s| s.summary.clone())
            .collect();

        let end = start + instances.len();
        let next_token = (end < inner.instances.len()).then(|| end.to_string());

        Ok(ListInstancesOutput {
            instances,
            next_token,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ssoadmin::api::{list_all_instances, WireAttribute, WireAttributeValue};

    fn arn(id: &str) -> InstanceArn {
        InstanceArn::parse(&format!("arn:aws:sso:::instance/ssoins-{id}")).unwrap()
    }

    fn payload(key: &str, source: &str) -> ConfigurationPayload {
        ConfigurationPayload {
            configuration: WireConfiguration {
                access_control_attributes: vec![WireAttribute {
                    key: key.into(),
                    value: WireAttributeValue {
                        source: vec![source.into()],
                    },
                }],
            },
            status: None,
        }
    }

    #[tokio::test]
    async fn test_create_then_conflict() {
        let a = arn("1");
        let api = InMemorySsoAdmin::new().with_instance(&a);

        api.create_configuration(&a, &payload("name", "x")).await.unwrap();
        let err = api
            .create_configuration(&a, &payload("name", "y"))
            .await
            .unwrap_err();
        assert_eq!(err.kind, ApiErrorKind::Conflict);
        assert_eq!(api.calls(Operation::Create), 2);
    }

    #[tokio::test]
    async fn test_unknown_instance_is_not_found() {
        let api = InMemorySsoAdmin::new();
        let err = api.describe_configuration(&arn("nope")).await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_visibility_lag() {
        let a = arn("1");
        let api = InMemorySsoAdmin::new().with_instance(&a).with_visibility_lag(2);

        api.create_configuration(&a, &payload("name", "x")).await.unwrap();
        assert!(api.describe_configuration(&a).await.is_err());
        assert!(api.describe_configuration(&a).await.is_err());
        let output = api.describe_configuration(&a).await.unwrap();
        assert_eq!(output.status, Some(Status::Enabled));
        assert!(api.committed(&a).is_some());
    }

    #[tokio::test]
    async fn test_injected_fault_consumed_once() {
        let a = arn("1");
        let api = InMemorySsoAdmin::new().with_instance(&a);
        api.fail_next(Operation::Describe, ApiError::throttled("slow down"));

        assert!(api.describe_configuration(&a).await.unwrap_err().is_transient());
        assert!(api.describe_configuration(&a).await.unwrap_err().is_not_found());
        assert_eq!(api.calls(Operation::Describe), 2);
    }

    #[tokio::test]
    async fn test_lost_response_still_commits() {
        let a = arn("1");
        let api = InMemorySsoAdmin::new().with_instance(&a);
        api.lose_next_response(
            Operation::Create,
            ApiError::from_response("InternalServerException", "try again", 500),
        );

        let err = api.create_configuration(&a, &payload("name", "x")).await.unwrap_err();
        assert!(err.is_transient());
        assert!(api.committed(&a).is_some());

        let err = api.create_configuration(&a, &payload("name", "x")).await.unwrap_err();
        assert_eq!(err.kind, ApiErrorKind::Conflict);
    }

    #[tokio::test]
    async fn test_list_instances_paginates() {
        let api = InMemorySsoAdmin::new()
            .with_instance(&arn("1"))
            .with_instance(&arn("2"))
            .with_instance(&arn("3"))
            .with_page_size(2);

        let all = list_all_instances(&api).await.unwrap();
        assert_eq!(all.len(), 3);
        assert_eq!(api.calls(Operation::ListInstances), 2);
    }
}
