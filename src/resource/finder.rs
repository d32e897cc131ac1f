//! Finder
//!
//! Looks up the configuration attached to an instance. "Nothing attached"
//! is a normal outcome and comes back as `Ok(None)`; the reconciler and the
//! verifier both go through here so they agree on what "exists" means.

use tracing::debug;

use super::model::ObservedConfiguration;
use crate::ssoadmin::api::SsoAdminApi;
use crate::ssoadmin::arn::InstanceArn;
use crate::ssoadmin::error::ApiError;

/// Current configuration of `arn`, `None` when nothing is attached
pub async fn find_configuration(
    api: &dyn SsoAdminApi,
    arn: &InstanceArn,
) -> Result<Option<ObservedConfiguration>, ApiError> {
    debug!(%arn, "Describing access control attribute configuration");

    let output = match api.describe_configuration(arn).await {
        Ok(output) => output,
        Err(err) if err.is_not_found() => {
            debug!(%arn, error = %err, "No configuration attached");
            return Ok(None);
        }
        Err(err) => return Err(err),
    };

    let observed = ObservedConfiguration::from_wire(
        arn,
        output.instance_access_control_attribute_configuration.as_ref(),
        output.status,
        output.status_reason,
    );

    if observed.is_none() {
        debug!(%arn, "Describe returned an empty configuration");
    }

    Ok(observed)
}
