use crate::{
    config::WaitSettings,
    control_plane::FunctionControlPlane,
    error::{ErrorKind, LifecycleError, UpdateStep},
    lifecycle::describe_with_retry,
    model::{FunctionSpec, FunctionState, FunctionUpdate},
    poll::{retry_while, wait_until, Backoff, Waited},
    validate::{validate_spec, validate_update},
};
use tokio::time::Instant;

/// Desired state of a single function.
#[derive(Clone, Debug, PartialEq)]
pub enum Desired {
    /// The function must not exist yet and is created from the given `FunctionSpec`
    Create(FunctionSpec),
    /// The function must exist and gets the supplied fields changed
    Update(FunctionUpdate),
}

/// `FunctionReconciler` converges a function towards its desired state.
///
/// Mutating calls are never repeated, with one exception: a create rejected
/// because a freshly created execution role is not assumable yet is sent
/// again within the role propagation budget.
pub struct FunctionReconciler<F> {
    functions: F,
    waits: WaitSettings,
    fresh_role: bool,
}

impl<F: FunctionControlPlane> FunctionReconciler<F> {
    /// Reconciler backed by `functions`, bounded by `waits`.
    pub fn new(functions: F, waits: WaitSettings) -> FunctionReconciler<F> {
        FunctionReconciler {
            functions,
            waits,
            fresh_role: false,
        }
    }

    /// Whether the execution role was created moments ago and may still be propagating.
    pub fn with_fresh_role(self, fresh_role: bool) -> FunctionReconciler<F> {
        FunctionReconciler { fresh_role, ..self }
    }

    /// Apply `desired` and return the resulting snapshot.
    pub async fn reconcile(&self, desired: &Desired) -> Result<FunctionState, LifecycleError> {
        match desired {
            Desired::Create(spec) => self.create(spec).await,
            Desired::Update(update) => self.update(update).await,
        }
    }

    /// Create a function that does not exist yet, then wait for it to leave `Pending`.
    ///
    /// When the activation wait runs out the last observed snapshot is
    /// returned, still `Pending`.
    #[tracing::instrument(skip(self, spec), fields(function = %spec.name))]
    pub async fn create(&self, spec: &FunctionSpec) -> Result<FunctionState, LifecycleError> {
        validate_spec(spec)?;
        let deadline = self.waits.deadline();

        match describe_with_retry(&self.functions, &spec.name).await {
            Ok(_) => {
                return Err(LifecycleError::AlreadyExists {
                    resource: format!("function {}", spec.name),
                    source: None,
                })
            }
            Err(err) if err.kind() == ErrorKind::NotFound => {}
            Err(err) => return Err(err),
        }

        if self.fresh_role {
            retry_while(
                "execution role to become assumable",
                self.waits.role_propagation.until(deadline),
                || self.functions.create_function(spec),
                |err| err.is_role_not_assumable(),
            )
            .await?;
        } else {
            self.functions.create_function(spec).await?;
        }
        tracing::info!(image_uri = %spec.image_uri, "function created");

        let activation = self.waits.activation.until(deadline);
        match self.wait_settled(&spec.name, activation).await? {
            Waited::Settled(state) => Ok(state),
            Waited::Expired(state) => {
                tracing::warn!(state = ?state.state, "function still settling, returning last snapshot");
                Ok(state)
            }
        }
    }

    /// Change the supplied fields of an existing function.
    ///
    /// The image is updated first. When the configuration update fails after
    /// the image update went through, the error is a `PartialUpdate`.
    /// All of its waits share one deadline.
    #[tracing::instrument(skip(self, update), fields(function = %update.name))]
    pub async fn update(&self, update: &FunctionUpdate) -> Result<FunctionState, LifecycleError> {
        validate_update(update)?;
        let deadline = self.waits.deadline();

        let current = describe_with_retry(&self.functions, &update.name).await?;
        if !update.changes_code() && !update.changes_configuration() {
            tracing::info!("nothing to update");
            return Ok(current);
        }

        if !current.is_settled() {
            self.wait_ready(&update.name, deadline).await?;
        }

        if let Some(image_uri) = &update.image_uri {
            self.functions
                .update_function_code(&update.name, image_uri)
                .await?;
            tracing::info!(%image_uri, "code updated");
        }

        if update.changes_configuration() {
            if let Err(err) = self.update_configuration(update, deadline).await {
                if !update.changes_code() {
                    return Err(err);
                }
                tracing::error!(error = %err, "configuration update failed after code update");
                return Err(LifecycleError::PartialUpdate {
                    function: update.name.clone(),
                    succeeded: UpdateStep::Code,
                    failed: UpdateStep::Configuration,
                    source: Box::new(err),
                });
            }
            tracing::info!("configuration updated");
        }

        Ok(self
            .wait_settled(&update.name, self.waits.update.until(deadline))
            .await?
            .into_inner())
    }

    async fn update_configuration(
        &self,
        update: &FunctionUpdate,
        deadline: Option<Instant>,
    ) -> Result<(), LifecycleError> {
        // the provider rejects a configuration change while the code change is applied
        if update.changes_code() {
            self.wait_ready(&update.name, deadline).await?;
        }
        self.functions.update_function_configuration(update).await
    }

    async fn wait_ready(
        &self,
        name: &str,
        deadline: Option<Instant>,
    ) -> Result<FunctionState, LifecycleError> {
        let backoff = self.waits.update.until(deadline);
        match self.wait_settled(name, backoff).await? {
            Waited::Settled(state) => Ok(state),
            Waited::Expired(_) => Err(LifecycleError::Timeout {
                what: format!("function {name} to finish updating"),
                waited: backoff.max_wait,
            }),
        }
    }

    async fn wait_settled(
        &self,
        name: &str,
        backoff: Backoff,
    ) -> Result<Waited<FunctionState>, LifecycleError> {
        wait_until(
            "function to settle",
            backoff,
            || describe_with_retry(&self.functions, name),
            FunctionState::is_settled,
        )
        .await
    }
}
