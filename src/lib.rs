#![deny(missing_docs)]
//! <fullname>Lambda lifecycle</fullname>
//!
//! Manages AWS Lambda functions packaged as container images.
//! It provisions the execution role a function runs as, reconciles
//! functions against their desired state, and invokes, describes,
//! lists and deletes them.
mod config;
pub use config::{Settings, WaitSettings};

mod control_plane;
pub use control_plane::{FunctionControlPlane, FunctionPage, RoleControlPlane};

mod error;
pub use error::{ErrorKind, LifecycleError, ProviderError, UpdateStep};

mod iam;
pub use iam::IamClient;

mod lambda;
pub use lambda::LambdaClient;

mod lifecycle;
pub use lifecycle::{FunctionLifecycle, FunctionStream};

/// `model` holds the request descriptors and response snapshots
pub mod model;

mod normalize;

mod output;
pub use output::{render, OutputFormat};

/// `poll` includes the bounded waiting helpers
pub mod poll;

mod reconcile;
pub use reconcile::{Desired, FunctionReconciler};

mod role;
pub use role::RoleProvisioner;

/// `validate` checks requests before they reach the control plane
pub mod validate;

#[cfg(test)]
mod test_util;

use model::{FunctionSpec, FunctionState};

/// `deploy` is the create entry point: it ensures the execution role
/// `role_name` exists, then creates the function to run as that role.
///
/// A function that already exists fails with `AlreadyExists` before the
/// role is touched. When the role was created by this call, the function
/// create is retried while IAM propagates the role.
#[tracing::instrument(skip(roles, functions, waits, spec), fields(function = %spec.name))]
pub async fn deploy<R, F>(
    roles: &RoleProvisioner<R>,
    functions: F,
    waits: WaitSettings,
    role_name: &str,
    spec: FunctionSpec,
) -> Result<FunctionState, LifecycleError>
where
    R: RoleControlPlane,
    F: FunctionControlPlane,
{
    validate::validate_settings(&spec)?;

    match lifecycle::describe_with_retry(&functions, &spec.name).await {
        Ok(_) => {
            return Err(LifecycleError::AlreadyExists {
                resource: format!("function {}", spec.name),
                source: None,
            })
        }
        Err(err) if err.kind() == ErrorKind::NotFound => {}
        Err(err) => return Err(err),
    }

    let role = roles.ensure_role(role_name).await?;

    let spec = FunctionSpec {
        role_arn: role.role_arn,
        ..spec
    };
    FunctionReconciler::new(functions, waits)
        .with_fresh_role(role.created)
        .reconcile(&Desired::Create(spec))
        .await
}
