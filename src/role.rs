use crate::{
    control_plane::RoleControlPlane,
    error::{ErrorKind, LifecycleError},
    model::{ProvisionedRole, RoleSpec},
    validate::validate_role_name,
};

/// Makes sure the execution role a function needs exists.
pub struct RoleProvisioner<R> {
    roles: R,
}

impl<R: RoleControlPlane> RoleProvisioner<R> {
    /// Provisioner backed by `roles`.
    pub fn new(roles: R) -> RoleProvisioner<R> {
        RoleProvisioner { roles }
    }

    /// Ensure a Lambda execution role named `role_name` exists, with basic
    /// execution and S3 full access attached when it has to be created.
    pub async fn ensure_role(&self, role_name: &str) -> Result<ProvisionedRole, LifecycleError> {
        self.ensure(&RoleSpec::lambda_execution(role_name)).await
    }

    /// Look the role up and create it when it is missing.
    ///
    /// An existing role is returned untouched: its trust policy and
    /// attachments are never modified.
    #[tracing::instrument(skip(self, spec), fields(role_name = %spec.role_name))]
    pub async fn ensure(&self, spec: &RoleSpec) -> Result<ProvisionedRole, LifecycleError> {
        validate_role_name(&spec.role_name)?;

        if let Some(role) = self.lookup(&spec.role_name).await? {
            tracing::info!(role_arn = %role.role_arn, "reusing existing role");
            return Ok(role);
        }

        let trust_policy = spec.trust_policy.to_string();
        let role_arn = match self.roles.create_role(&spec.role_name, &trust_policy).await {
            Ok(arn) => arn,
            // created concurrently since the lookup
            Err(err) if err.kind() == ErrorKind::AlreadyExists => {
                return match self.lookup(&spec.role_name).await? {
                    Some(role) => Ok(role),
                    None => Err(err),
                };
            }
            Err(err) => return Err(err),
        };

        for (attached, policy_arn) in spec.attached_policies.iter().enumerate() {
            if let Err(err) = self
                .roles
                .attach_role_policy(&spec.role_name, policy_arn)
                .await
            {
                tracing::error!(error = %err, %policy_arn, "attaching policy failed, removing role");
                self.roll_back(&spec.role_name, &spec.attached_policies[..attached])
                    .await;
                return Err(err);
            }
        }

        tracing::info!(%role_arn, "created role");
        Ok(ProvisionedRole {
            role_name: spec.role_name.clone(),
            role_arn,
            created: true,
        })
    }

    // undo a create whose policy attachments did not all go through, so the
    // next ensure starts from scratch instead of reusing a partial role
    async fn roll_back(&self, role_name: &str, attached: &[String]) {
        for policy_arn in attached {
            if let Err(err) = self.roles.detach_role_policy(role_name, policy_arn).await {
                tracing::warn!(error = %err, %policy_arn, "unable to detach policy");
            }
        }
        if let Err(err) = self.roles.delete_role(role_name).await {
            tracing::warn!(error = %err, "unable to delete partially created role");
        }
    }

    /// Detach every managed policy, delete every inline policy, then delete
    /// the role. Deleting a role that does not exist succeeds.
    #[tracing::instrument(skip(self))]
    pub async fn delete_role(&self, role_name: &str) -> Result<(), LifecycleError> {
        validate_role_name(role_name)?;

        let policies = match self.roles.list_attached_role_policies(role_name).await {
            Ok(policies) => policies,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                tracing::info!("role already absent");
                return Ok(());
            }
            Err(err) => return Err(err),
        };

        for policy_arn in &policies {
            self.roles.detach_role_policy(role_name, policy_arn).await?;
        }

        for policy_name in self.roles.list_role_policies(role_name).await? {
            self.roles.delete_role_policy(role_name, &policy_name).await?;
        }

        match self.roles.delete_role(role_name).await {
            Err(err) if err.kind() != ErrorKind::NotFound => Err(err),
            _ => Ok(()),
        }
    }

    async fn lookup(&self, role_name: &str) -> Result<Option<ProvisionedRole>, LifecycleError> {
        match self.roles.get_role(role_name).await {
            Ok(role_arn) => Ok(Some(ProvisionedRole {
                role_name: role_name.to_string(),
                role_arn,
                created: false,
            })),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err),
        }
    }
}
