//! Seams between the lifecycle logic and the AWS control plane.
//!
//! [`crate::LambdaClient`] and [`crate::IamClient`] implement these traits on
//! top of the AWS SDK. Every method maps provider failures onto
//! [`LifecycleError`] before returning.
#![allow(async_fn_in_trait)]

use crate::{
    error::LifecycleError,
    model::{FunctionSpec, FunctionState, FunctionUpdate, InvocationResult, InvocationType},
};

/// One page of a function listing
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FunctionPage {
    /// Functions on this page
    pub functions: Vec<FunctionState>,
    /// Marker to request the next page, `None` on the last page
    pub next_marker: Option<String>,
}

/// Function operations of the control plane.
pub trait FunctionControlPlane {
    /// Fetch a single function, failing with `NotFound` when it does not exist.
    async fn get_function(&self, name: &str) -> Result<FunctionState, LifecycleError>;

    /// Create a function from a container image.
    async fn create_function(&self, spec: &FunctionSpec) -> Result<(), LifecycleError>;

    /// Point a function at a new image.
    async fn update_function_code(&self, name: &str, image_uri: &str)
        -> Result<(), LifecycleError>;

    /// Apply the configuration fields set in `update`.
    async fn update_function_configuration(
        &self,
        update: &FunctionUpdate,
    ) -> Result<(), LifecycleError>;

    /// Delete a function, failing with `NotFound` when it does not exist.
    async fn delete_function(&self, name: &str) -> Result<(), LifecycleError>;

    /// Invoke a function with an already serialized payload.
    async fn invoke(
        &self,
        name: &str,
        payload: Vec<u8>,
        invocation_type: InvocationType,
    ) -> Result<InvocationResult, LifecycleError>;

    /// Fetch one page of functions.
    async fn list_functions(
        &self,
        marker: Option<String>,
        max_items: Option<i32>,
    ) -> Result<FunctionPage, LifecycleError>;
}

/// Role operations of the control plane.
pub trait RoleControlPlane {
    /// Return the ARN of a role, failing with `NotFound` when it does not exist.
    async fn get_role(&self, role_name: &str) -> Result<String, LifecycleError>;

    /// Create a role with the given trust policy document and return its ARN.
    async fn create_role(
        &self,
        role_name: &str,
        trust_policy: &str,
    ) -> Result<String, LifecycleError>;

    /// Attach a managed policy to a role.
    async fn attach_role_policy(
        &self,
        role_name: &str,
        policy_arn: &str,
    ) -> Result<(), LifecycleError>;

    /// ARNs of every managed policy attached to a role.
    async fn list_attached_role_policies(
        &self,
        role_name: &str,
    ) -> Result<Vec<String>, LifecycleError>;

    /// Detach a managed policy from a role.
    async fn detach_role_policy(
        &self,
        role_name: &str,
        policy_arn: &str,
    ) -> Result<(), LifecycleError>;

    /// Names of the inline policies embedded in a role.
    async fn list_role_policies(&self, role_name: &str) -> Result<Vec<String>, LifecycleError>;

    /// Delete an inline policy from a role.
    async fn delete_role_policy(
        &self,
        role_name: &str,
        policy_name: &str,
    ) -> Result<(), LifecycleError>;

    /// Delete a role that has no managed or inline policies left.
    async fn delete_role(&self, role_name: &str) -> Result<(), LifecycleError>;
}

impl<T: FunctionControlPlane> FunctionControlPlane for &T {
    async fn get_function(&self, name: &str) -> Result<FunctionState, LifecycleError> {
        (**self).get_function(name).await
    }

    async fn create_function(&self, spec: &FunctionSpec) -> Result<(), LifecycleError> {
        (**self).create_function(spec).await
    }

    async fn update_function_code(
        &self,
        name: &str,
        image_uri: &str,
    ) -> Result<(), LifecycleError> {
        (**self).update_function_code(name, image_uri).await
    }

    async fn update_function_configuration(
        &self,
        update: &FunctionUpdate,
    ) -> Result<(), LifecycleError> {
        (**self).update_function_configuration(update).await
    }

    async fn delete_function(&self, name: &str) -> Result<(), LifecycleError> {
        (**self).delete_function(name).await
    }

    async fn invoke(
        &self,
        name: &str,
        payload: Vec<u8>,
        invocation_type: InvocationType,
    ) -> Result<InvocationResult, LifecycleError> {
        (**self).invoke(name, payload, invocation_type).await
    }

    async fn list_functions(
        &self,
        marker: Option<String>,
        max_items: Option<i32>,
    ) -> Result<FunctionPage, LifecycleError> {
        (**self).list_functions(marker, max_items).await
    }
}

impl<T: RoleControlPlane> RoleControlPlane for &T {
    async fn get_role(&self, role_name: &str) -> Result<String, LifecycleError> {
        (**self).get_role(role_name).await
    }

    async fn create_role(
        &self,
        role_name: &str,
        trust_policy: &str,
    ) -> Result<String, LifecycleError> {
        (**self).create_role(role_name, trust_policy).await
    }

    async fn attach_role_policy(
        &self,
        role_name: &str,
        policy_arn: &str,
    ) -> Result<(), LifecycleError> {
        (**self).attach_role_policy(role_name, policy_arn).await
    }

    async fn list_attached_role_policies(
        &self,
        role_name: &str,
    ) -> Result<Vec<String>, LifecycleError> {
        (**self).list_attached_role_policies(role_name).await
    }

    async fn detach_role_policy(
        &self,
        role_name: &str,
        policy_arn: &str,
    ) -> Result<(), LifecycleError> {
        (**self).detach_role_policy(role_name, policy_arn).await
    }

    async fn list_role_policies(&self, role_name: &str) -> Result<Vec<String>, LifecycleError> {
        (**self).list_role_policies(role_name).await
    }

    async fn delete_role_policy(
        &self,
        role_name: &str,
        policy_name: &str,
    ) -> Result<(), LifecycleError> {
        (**self).delete_role_policy(role_name, policy_name).await
    }

    async fn delete_role(&self, role_name: &str) -> Result<(), LifecycleError> {
        (**self).delete_role(role_name).await
    }
}
