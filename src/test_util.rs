use crate::{
    control_plane::{FunctionControlPlane, FunctionPage, RoleControlPlane},
    error::{LifecycleError, ProviderError},
    model::{
        FunctionSpec, FunctionState, FunctionUpdate, InvocationResult, InvocationType,
        LifecycleState, UpdateStatus,
    },
    normalize::{classify, conflict_as_existing},
};
use aws_config::{retry::RetryConfig, BehaviorVersion};
use aws_sdk_iam::config::Credentials;
use aws_types::{region::Region, SdkConfig};
use std::{
    collections::{BTreeMap, HashMap, VecDeque},
    sync::Mutex,
};

/// Configuration for mocking AWS SDK clients
pub async fn get_mock_config() -> SdkConfig {
    aws_config::defaults(BehaviorVersion::latest())
        .region(Region::new("us-west-1"))
        .credentials_provider(Credentials::new(
            "accesskey",
            "privatekey",
            None,
            None,
            "dummy",
        ))
        .retry_config(RetryConfig::disabled())
        .load()
        .await
}

/// Base request builder for the AWS SDK calls
pub fn get_request_builder(service: &str) -> http::request::Builder {
    http::Request::builder().uri(format!("https://{service}.us-west-1.amazonaws.com/"))
}

const ACCOUNT_ID: &str = "123456789012";
const FAKE_PAGE_SIZE: i32 = 2;

#[derive(Default)]
struct FakeState {
    functions: BTreeMap<String, FunctionState>,
    // reads left before a function settles
    settling: HashMap<String, usize>,
    roles: BTreeMap<String, Vec<String>>,
    inline_policies: BTreeMap<String, Vec<String>>,
    calls: Vec<String>,
    // `None` lets a call through
    failures: HashMap<&'static str, VecDeque<Option<ProviderError>>>,
    settle_after: usize,
}

impl FakeState {
    fn record(&mut self, op: &'static str, arg: &str) -> Result<(), LifecycleError> {
        self.calls.push(format!("{op} {arg}").trim_end().to_string());
        match self.failures.get_mut(op).and_then(VecDeque::pop_front).flatten() {
            Some(err) => Err(classify_for(op, &resource_for(op, arg), err)),
            None => Ok(()),
        }
    }

    fn mark_changing(&mut self, name: &str, pending: bool) {
        let settle_after = self.settle_after;
        if let Some(function) = self.functions.get_mut(name) {
            if settle_after == 0 {
                function.state = Some(LifecycleState::Active);
                function.last_update_status = Some(UpdateStatus::Successful);
                return;
            }
            if pending {
                function.state = Some(LifecycleState::Pending);
            }
            function.last_update_status = Some(UpdateStatus::InProgress);
            self.settling.insert(name.to_string(), settle_after);
        }
    }

    fn function_mut(&mut self, name: &str) -> Result<&mut FunctionState, LifecycleError> {
        self.functions
            .get_mut(name)
            .ok_or_else(|| missing_function(name))
    }
}

fn resource_for(op: &str, arg: &str) -> String {
    if op.ends_with("role") || op.contains("role_polic") {
        format!("role {arg}")
    } else {
        format!("function {arg}")
    }
}

// mirrors how each adapter maps a provider failure
fn classify_for(op: &str, resource: &str, err: ProviderError) -> LifecycleError {
    let err = classify(resource, err);
    match op {
        "create_function" => conflict_as_existing(resource, err),
        _ => err,
    }
}

fn update_in_progress(name: &str) -> LifecycleError {
    classify(
        &format!("function {name}"),
        ProviderError::new(
            "ResourceConflictException",
            format!(
                "The operation cannot be performed at this time. \
                 An update is in progress for resource: \
                 arn:aws:lambda:us-west-1:{ACCOUNT_ID}:function:{name}"
            ),
        ),
    )
}

fn missing_function(name: &str) -> LifecycleError {
    classify(
        &format!("function {name}"),
        ProviderError::new(
            "ResourceNotFoundException",
            format!("Function not found: arn:aws:lambda:us-west-1:{ACCOUNT_ID}:function:{name}"),
        ),
    )
}

fn missing_role(name: &str) -> LifecycleError {
    classify(
        &format!("role {name}"),
        ProviderError::new(
            "NoSuchEntity",
            format!("The role with name {name} cannot be found."),
        ),
    )
}

fn role_arn(name: &str) -> String {
    format!("arn:aws:iam::{ACCOUNT_ID}:role/{name}")
}

/// In-memory control plane that records every call it receives.
///
/// New and updated functions report `Pending`/`InProgress` for
/// `settle_after` reads before turning `Active`/`Successful`.
#[derive(Default)]
pub struct FakeControlPlane {
    state: Mutex<FakeState>,
}

impl FakeControlPlane {
    pub fn with_settle_after(self, reads: usize) -> FakeControlPlane {
        self.state.lock().unwrap().settle_after = reads;
        self
    }

    pub fn add_function(&self, function: FunctionState) {
        self.state
            .lock()
            .unwrap()
            .functions
            .insert(function.name.clone(), function);
    }

    pub fn add_role(&self, role_name: &str, policies: &[&str]) {
        self.state.lock().unwrap().roles.insert(
            role_name.to_string(),
            policies.iter().map(|p| p.to_string()).collect(),
        );
    }

    pub fn add_inline_policy(&self, role_name: &str, policy_name: &str) {
        self.state
            .lock()
            .unwrap()
            .inline_policies
            .entry(role_name.to_string())
            .or_default()
            .push(policy_name.to_string());
    }

    /// Fail the next call to `op` with `err`.
    pub fn fail_next(&self, op: &'static str, err: ProviderError) {
        self.fail_nth(op, 1, err);
    }

    /// Let `n - 1` calls to `op` through, then fail the next one with `err`.
    pub fn fail_nth(&self, op: &'static str, n: usize, err: ProviderError) {
        let mut state = self.state.lock().unwrap();
        let queue = state.failures.entry(op).or_default();
        queue.extend((1..n).map(|_| None));
        queue.push_back(Some(err));
    }

    pub fn calls(&self) -> Vec<String> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn count_calls(&self, op: &str) -> usize {
        self.state
            .lock()
            .unwrap()
            .calls
            .iter()
            .filter(|call| call.split(' ').next() == Some(op))
            .count()
    }

    pub fn function(&self, name: &str) -> Option<FunctionState> {
        self.state.lock().unwrap().functions.get(name).cloned()
    }

    pub fn has_function(&self, name: &str) -> bool {
        self.function(name).is_some()
    }

    pub fn has_role(&self, role_name: &str) -> bool {
        self.state.lock().unwrap().roles.contains_key(role_name)
    }

    pub fn attached_policies(&self, role_name: &str) -> Vec<String> {
        self.state
            .lock()
            .unwrap()
            .roles
            .get(role_name)
            .cloned()
            .unwrap_or_default()
    }
}

impl FunctionControlPlane for FakeControlPlane {
    async fn get_function(&self, name: &str) -> Result<FunctionState, LifecycleError> {
        let mut state = self.state.lock().unwrap();
        state.record("get_function", name)?;

        let settled = match state.settling.get_mut(name) {
            Some(reads) => {
                *reads -= 1;
                *reads == 0
            }
            None => false,
        };
        if settled {
            state.settling.remove(name);
        }

        let function = state.function_mut(name)?;
        if settled {
            function.state = Some(LifecycleState::Active);
            function.last_update_status = Some(UpdateStatus::Successful);
        }
        Ok(function.clone())
    }

    async fn create_function(&self, spec: &FunctionSpec) -> Result<(), LifecycleError> {
        let mut state = self.state.lock().unwrap();
        state.record("create_function", &spec.name)?;

        if state.functions.contains_key(&spec.name) {
            return Err(classify_for(
                "create_function",
                &format!("function {}", spec.name),
                ProviderError::new(
                    "ResourceConflictException",
                    format!("Function already exist: {}", spec.name),
                ),
            ));
        }

        state.functions.insert(
            spec.name.clone(),
            FunctionState {
                name: spec.name.clone(),
                arn: Some(format!(
                    "arn:aws:lambda:us-west-1:{ACCOUNT_ID}:function:{}",
                    spec.name
                )),
                last_modified: Some("2024-05-01T10:00:00Z".to_string()),
                memory_mb: Some(spec.memory_mb),
                timeout_s: Some(spec.timeout_s),
                image_uri: Some(spec.image_uri.clone()),
                description: spec.description.clone(),
                role_arn: Some(spec.role_arn.clone()),
                environment: (!spec.environment.is_empty()).then(|| spec.environment.clone()),
                ..Default::default()
            },
        );
        state.mark_changing(&spec.name, true);
        Ok(())
    }

    async fn update_function_code(
        &self,
        name: &str,
        image_uri: &str,
    ) -> Result<(), LifecycleError> {
        let mut state = self.state.lock().unwrap();
        state.record("update_function_code", name)?;

        let function = state.function_mut(name)?;
        if function.last_update_status == Some(UpdateStatus::InProgress) {
            return Err(update_in_progress(name));
        }
        function.image_uri = Some(image_uri.to_string());
        state.mark_changing(name, false);
        Ok(())
    }

    async fn update_function_configuration(
        &self,
        update: &FunctionUpdate,
    ) -> Result<(), LifecycleError> {
        let mut state = self.state.lock().unwrap();
        state.record("update_function_configuration", &update.name)?;

        let function = state.function_mut(&update.name)?;
        if function.last_update_status == Some(UpdateStatus::InProgress) {
            return Err(update_in_progress(&update.name));
        }

        if let Some(memory_mb) = update.memory_mb {
            function.memory_mb = Some(memory_mb);
        }
        if let Some(timeout_s) = update.timeout_s {
            function.timeout_s = Some(timeout_s);
        }
        if let Some(description) = &update.description {
            function.description = Some(description.clone());
        }
        if let Some(role_arn) = &update.role_arn {
            function.role_arn = Some(role_arn.clone());
        }
        if let Some(environment) = &update.environment {
            function.environment = (!environment.is_empty()).then(|| environment.clone());
        }
        state.mark_changing(&update.name, false);
        Ok(())
    }

    async fn delete_function(&self, name: &str) -> Result<(), LifecycleError> {
        let mut state = self.state.lock().unwrap();
        state.record("delete_function", name)?;

        state.settling.remove(name);
        match state.functions.remove(name) {
            Some(_) => Ok(()),
            None => Err(missing_function(name)),
        }
    }

    async fn invoke(
        &self,
        name: &str,
        payload: Vec<u8>,
        invocation_type: InvocationType,
    ) -> Result<InvocationResult, LifecycleError> {
        let mut state = self.state.lock().unwrap();
        state.record("invoke", name)?;
        if state.function_mut(name)?.state == Some(LifecycleState::Pending) {
            return Err(classify(
                &format!("function {name}"),
                ProviderError::new(
                    "ResourceConflictException",
                    "The operation cannot be performed at this time. \
                     The function is currently in the following state: Pending",
                ),
            ));
        }

        Ok(match invocation_type {
            InvocationType::RequestResponse => InvocationResult {
                status_code: 200,
                payload,
                executed_version: Some("$LATEST".to_string()),
                ..Default::default()
            },
            InvocationType::Event => InvocationResult {
                status_code: 202,
                ..Default::default()
            },
            InvocationType::DryRun => InvocationResult {
                status_code: 204,
                ..Default::default()
            },
        })
    }

    async fn list_functions(
        &self,
        marker: Option<String>,
        max_items: Option<i32>,
    ) -> Result<FunctionPage, LifecycleError> {
        let mut state = self.state.lock().unwrap();
        state.record("list_functions", marker.as_deref().unwrap_or_default())?;

        let page_size = max_items.unwrap_or(FAKE_PAGE_SIZE).min(FAKE_PAGE_SIZE) as usize;
        let mut remaining = state
            .functions
            .values()
            .filter(|f| marker.as_deref().map_or(true, |m| f.name.as_str() >= m))
            .map(|f| FunctionState {
                image_uri: None,
                ..f.clone()
            });

        let functions: Vec<FunctionState> = remaining.by_ref().take(page_size).collect();
        let next_marker = remaining.next().map(|f| f.name);
        Ok(FunctionPage {
            functions,
            next_marker,
        })
    }
}

impl RoleControlPlane for FakeControlPlane {
    async fn get_role(&self, role_name: &str) -> Result<String, LifecycleError> {
        let mut state = self.state.lock().unwrap();
        state.record("get_role", role_name)?;

        match state.roles.contains_key(role_name) {
            true => Ok(role_arn(role_name)),
            false => Err(missing_role(role_name)),
        }
    }

    async fn create_role(
        &self,
        role_name: &str,
        _trust_policy: &str,
    ) -> Result<String, LifecycleError> {
        let mut state = self.state.lock().unwrap();
        state.record("create_role", role_name)?;

        if state.roles.contains_key(role_name) {
            return Err(classify(
                &format!("role {role_name}"),
                ProviderError::new(
                    "EntityAlreadyExists",
                    format!("Role with name {role_name} already exists."),
                ),
            ));
        }
        state.roles.insert(role_name.to_string(), Vec::new());
        Ok(role_arn(role_name))
    }

    async fn attach_role_policy(
        &self,
        role_name: &str,
        policy_arn: &str,
    ) -> Result<(), LifecycleError> {
        let mut state = self.state.lock().unwrap();
        state.record("attach_role_policy", role_name)?;

        match state.roles.get_mut(role_name) {
            Some(policies) => {
                policies.push(policy_arn.to_string());
                Ok(())
            }
            None => Err(missing_role(role_name)),
        }
    }

    async fn list_attached_role_policies(
        &self,
        role_name: &str,
    ) -> Result<Vec<String>, LifecycleError> {
        let mut state = self.state.lock().unwrap();
        state.record("list_attached_role_policies", role_name)?;

        state
            .roles
            .get(role_name)
            .cloned()
            .ok_or_else(|| missing_role(role_name))
    }

    async fn detach_role_policy(
        &self,
        role_name: &str,
        policy_arn: &str,
    ) -> Result<(), LifecycleError> {
        let mut state = self.state.lock().unwrap();
        state.record("detach_role_policy", role_name)?;

        match state.roles.get_mut(role_name) {
            Some(policies) => {
                policies.retain(|p| p != policy_arn);
                Ok(())
            }
            None => Err(missing_role(role_name)),
        }
    }

    async fn list_role_policies(&self, role_name: &str) -> Result<Vec<String>, LifecycleError> {
        let mut state = self.state.lock().unwrap();
        state.record("list_role_policies", role_name)?;

        match state.roles.contains_key(role_name) {
            true => Ok(state
                .inline_policies
                .get(role_name)
                .cloned()
                .unwrap_or_default()),
            false => Err(missing_role(role_name)),
        }
    }

    async fn delete_role_policy(
        &self,
        role_name: &str,
        policy_name: &str,
    ) -> Result<(), LifecycleError> {
        let mut state = self.state.lock().unwrap();
        state.record("delete_role_policy", role_name)?;

        if !state.roles.contains_key(role_name) {
            return Err(missing_role(role_name));
        }
        let policies = state.inline_policies.entry(role_name.to_string()).or_default();
        match policies.iter().position(|p| p == policy_name) {
            Some(i) => {
                policies.remove(i);
                Ok(())
            }
            None => Err(classify(
                &format!("role {role_name}"),
                ProviderError::new(
                    "NoSuchEntity",
                    format!("The role policy with name {policy_name} cannot be found."),
                ),
            )),
        }
    }

    async fn delete_role(&self, role_name: &str) -> Result<(), LifecycleError> {
        let mut state = self.state.lock().unwrap();
        state.record("delete_role", role_name)?;

        let has_inline = state
            .inline_policies
            .get(role_name)
            .map_or(false, |p| !p.is_empty());
        match state.roles.get(role_name) {
            None => Err(missing_role(role_name)),
            Some(policies) if !policies.is_empty() || has_inline => Err(classify(
                &format!("role {role_name}"),
                ProviderError::new(
                    "DeleteConflict",
                    "Cannot delete entity, must delete policies first.",
                ),
            )),
            Some(_) => {
                state.roles.remove(role_name);
                state.inline_policies.remove(role_name);
                Ok(())
            }
        }
    }
}
