use crate::{
    control_plane::RoleControlPlane,
    error::{LifecycleError, ProviderError},
    normalize::from_sdk_error,
};
use aws_sdk_iam::Client;

const ROLE_DESCRIPTION: &str = "Lambda execution role managed by lambda-lifecycle";

/// IAM client implementation.
#[derive(Clone, Debug)]
pub struct IamClient {
    inner: Client,
}

impl IamClient {
    /// Initialize the IAM client.
    #[tracing::instrument(skip(config))]
    pub fn new(config: &aws_types::SdkConfig) -> IamClient {
        tracing::info!("Initializing IAM client");
        IamClient {
            inner: Client::new(config),
        }
    }
}

fn resource(role_name: &str) -> String {
    format!("role {role_name}")
}

fn missing_role(role_name: &str) -> LifecycleError {
    LifecycleError::ServiceUnavailable(ProviderError {
        code: None,
        message: format!("response for role {role_name} did not include the role"),
    })
}

impl RoleControlPlane for IamClient {
    #[tracing::instrument(skip(self))]
    async fn get_role(&self, role_name: &str) -> Result<String, LifecycleError> {
        let res = self
            .inner
            .get_role()
            .role_name(role_name)
            .send()
            .await
            .map_err(|err| from_sdk_error(&resource(role_name), err))?;

        res.role()
            .map(|role| role.arn().to_string())
            .ok_or_else(|| missing_role(role_name))
    }

    #[tracing::instrument(skip(self, trust_policy))]
    async fn create_role(
        &self,
        role_name: &str,
        trust_policy: &str,
    ) -> Result<String, LifecycleError> {
        tracing::info!("creating execution role");
        let res = self
            .inner
            .create_role()
            .role_name(role_name)
            .assume_role_policy_document(trust_policy)
            .description(ROLE_DESCRIPTION)
            .send()
            .await
            .map_err(|err| from_sdk_error(&resource(role_name), err))?;

        res.role()
            .map(|role| role.arn().to_string())
            .ok_or_else(|| missing_role(role_name))
    }

    #[tracing::instrument(skip(self))]
    async fn attach_role_policy(
        &self,
        role_name: &str,
        policy_arn: &str,
    ) -> Result<(), LifecycleError> {
        tracing::info!("attaching policy");
        self.inner
            .attach_role_policy()
            .role_name(role_name)
            .policy_arn(policy_arn)
            .send()
            .await
            .map_err(|err| from_sdk_error(&resource(role_name), err))?;

        Ok(())
    }

    #[tracing::instrument(skip(self))]
    async fn list_attached_role_policies(
        &self,
        role_name: &str,
    ) -> Result<Vec<String>, LifecycleError> {
        let mut policies = Vec::new();
        let mut marker = None;

        loop {
            let res = self
                .inner
                .list_attached_role_policies()
                .role_name(role_name)
                .set_marker(marker)
                .send()
                .await
                .map_err(|err| from_sdk_error(&resource(role_name), err))?;

            policies.extend(
                res.attached_policies()
                    .iter()
                    .filter_map(|p| p.policy_arn().map(str::to_string)),
            );

            match res.marker().filter(|_| res.is_truncated()) {
                Some(next) => marker = Some(next.to_string()),
                None => return Ok(policies),
            }
        }
    }

    #[tracing::instrument(skip(self))]
    async fn detach_role_policy(
        &self,
        role_name: &str,
        policy_arn: &str,
    ) -> Result<(), LifecycleError> {
        tracing::info!("detaching policy");
        self.inner
            .detach_role_policy()
            .role_name(role_name)
            .policy_arn(policy_arn)
            .send()
            .await
            .map_err(|err| from_sdk_error(&resource(role_name), err))?;

        Ok(())
    }

    #[tracing::instrument(skip(self))]
    async fn list_role_policies(&self, role_name: &str) -> Result<Vec<String>, LifecycleError> {
        let mut policies = Vec::new();
        let mut marker = None;

        loop {
            let res = self
                .inner
                .list_role_policies()
                .role_name(role_name)
                .set_marker(marker)
                .send()
                .await
                .map_err(|err| from_sdk_error(&resource(role_name), err))?;

            policies.extend(res.policy_names().iter().cloned());

            match res.marker().filter(|_| res.is_truncated()) {
                Some(next) => marker = Some(next.to_string()),
                None => return Ok(policies),
            }
        }
    }

    #[tracing::instrument(skip(self))]
    async fn delete_role_policy(
        &self,
        role_name: &str,
        policy_name: &str,
    ) -> Result<(), LifecycleError> {
        tracing::info!("deleting inline policy");
        self.inner
            .delete_role_policy()
            .role_name(role_name)
            .policy_name(policy_name)
            .send()
            .await
            .map_err(|err| from_sdk_error(&resource(role_name), err))?;

        Ok(())
    }

    #[tracing::instrument(skip(self))]
    async fn delete_role(&self, role_name: &str) -> Result<(), LifecycleError> {
        tracing::info!("deleting execution role");
        self.inner
            .delete_role()
            .role_name(role_name)
            .send()
            .await
            .map_err(|err| from_sdk_error(&resource(role_name), err))?;

        Ok(())
    }
}
