use serde::{Serialize, Serializer};
use serde_json::{json, Value};
use std::{collections::HashMap, fmt, str::FromStr};

/// Default memory size in MB when the caller does not choose one
pub const DEFAULT_MEMORY_MB: i32 = 128;

/// Default timeout in seconds when the caller does not choose one
pub const DEFAULT_TIMEOUT_S: i32 = 30;

/// Managed policy granting a function permission to write its logs
pub const BASIC_EXECUTION_POLICY_ARN: &str =
    "arn:aws:iam::aws:policy/service-role/AWSLambdaBasicExecutionRole";

/// Managed policy granting full access to every S3 bucket in the account
pub const S3_FULL_ACCESS_POLICY_ARN: &str = "arn:aws:iam::aws:policy/AmazonS3FullAccess";

/// `FunctionSpec` describes a function that should be created from a container image
#[derive(Clone, Debug, PartialEq)]
pub struct FunctionSpec {
    /// Function name, unique in the account and region
    pub name: String,
    /// Fully resolved image reference, e.g. `123.dkr.ecr.us-east-1.amazonaws.com/proc:latest`
    pub image_uri: String,
    /// Memory in MB, between 128 and 10240
    pub memory_mb: i32,
    /// Timeout in seconds, between 1 and 900
    pub timeout_s: i32,
    /// Optional free form description
    pub description: Option<String>,
    /// ARN of the execution role
    pub role_arn: String,
    /// Environment variables exposed to the function
    pub environment: HashMap<String, String>,
    /// Tags attached to the function
    pub tags: HashMap<String, String>,
    /// Optional VPC attachment
    pub vpc: Option<VpcSettings>,
}

impl FunctionSpec {
    /// Spec with the default memory and timeout and no optional settings.
    pub fn new(
        name: impl Into<String>,
        image_uri: impl Into<String>,
        role_arn: impl Into<String>,
    ) -> FunctionSpec {
        FunctionSpec {
            name: name.into(),
            image_uri: image_uri.into(),
            memory_mb: DEFAULT_MEMORY_MB,
            timeout_s: DEFAULT_TIMEOUT_S,
            description: None,
            role_arn: role_arn.into(),
            environment: HashMap::new(),
            tags: HashMap::new(),
            vpc: None,
        }
    }
}

/// `VpcSettings` attaches a function to private subnets
#[derive(Clone, Debug, Default, PartialEq)]
pub struct VpcSettings {
    /// Subnets the function's network interfaces are placed in
    pub subnet_ids: Vec<String>,
    /// Security groups applied to those interfaces
    pub security_group_ids: Vec<String>,
}

/// `FunctionUpdate` lists the fields an update should change.
/// Fields left as `None` keep their current value.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FunctionUpdate {
    /// Name of the function to update
    pub name: String,
    /// New image reference
    pub image_uri: Option<String>,
    /// New memory size in MB
    pub memory_mb: Option<i32>,
    /// New timeout in seconds
    pub timeout_s: Option<i32>,
    /// New description
    pub description: Option<String>,
    /// Replacement set of environment variables
    pub environment: Option<HashMap<String, String>>,
    /// New execution role
    pub role_arn: Option<String>,
}

impl FunctionUpdate {
    /// Update of `name` that changes nothing yet.
    pub fn new(name: impl Into<String>) -> FunctionUpdate {
        FunctionUpdate {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Whether the image reference has to change.
    pub fn changes_code(&self) -> bool {
        self.image_uri.is_some()
    }

    /// Whether any configuration field has to change.
    pub fn changes_configuration(&self) -> bool {
        self.memory_mb.is_some()
            || self.timeout_s.is_some()
            || self.description.is_some()
            || self.environment.is_some()
            || self.role_arn.is_some()
    }
}

/// `RoleSpec` describes the execution role a function runs as
#[derive(Clone, Debug, PartialEq)]
pub struct RoleSpec {
    /// IAM role name
    pub role_name: String,
    /// Document stating which service may assume the role
    pub trust_policy: Value,
    /// Managed policy ARNs attached when the role is created
    pub attached_policies: Vec<String>,
}

impl RoleSpec {
    /// Role that Lambda can assume, with basic execution and S3 access attached.
    pub fn lambda_execution(role_name: impl Into<String>) -> RoleSpec {
        RoleSpec {
            role_name: role_name.into(),
            trust_policy: json!({
                "Version": "2012-10-17",
                "Statement": [
                    {
                        "Effect": "Allow",
                        "Principal": { "Service": "lambda.amazonaws.com" },
                        "Action": "sts:AssumeRole"
                    }
                ]
            }),
            attached_policies: vec![
                BASIC_EXECUTION_POLICY_ARN.to_string(),
                S3_FULL_ACCESS_POLICY_ARN.to_string(),
            ],
        }
    }

    /// Default role name for a function, stable across deployments.
    pub fn default_name_for(function_name: &str) -> String {
        format!("{function_name}-execution-role")
    }
}

/// `ProvisionedRole` is the role a function will run as
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct ProvisionedRole {
    /// IAM role name
    pub role_name: String,
    /// IAM role ARN
    pub role_arn: String,
    /// `true` when this call created the role
    pub created: bool,
}

/// Lifecycle state reported for a function
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum LifecycleState {
    /// Resources are still being provisioned
    Pending,
    /// Ready to be invoked
    Active,
    /// Provisioning failed, see the state reason
    Failed,
    /// Reclaimed after a long idle period
    Inactive,
}

impl LifecycleState {
    /// Whether the function is still settling.
    pub fn is_transitional(self) -> bool {
        self == LifecycleState::Pending
    }
}

impl FromStr for LifecycleState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Pending" => Ok(LifecycleState::Pending),
            "Active" => Ok(LifecycleState::Active),
            "Failed" => Ok(LifecycleState::Failed),
            "Inactive" => Ok(LifecycleState::Inactive),
            other => Err(format!("unknown function state {other}")),
        }
    }
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Status of the last update applied to a function
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum UpdateStatus {
    /// The update was applied
    Successful,
    /// The update was rolled back
    Failed,
    /// The update is still being applied
    InProgress,
}

impl FromStr for UpdateStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Successful" => Ok(UpdateStatus::Successful),
            "Failed" => Ok(UpdateStatus::Failed),
            "InProgress" => Ok(UpdateStatus::InProgress),
            other => Err(format!("unknown update status {other}")),
        }
    }
}

/// `FunctionState` is a snapshot of a function as reported by the control plane
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct FunctionState {
    /// Function name
    #[serde(rename = "FunctionName")]
    pub name: String,
    /// Function ARN
    #[serde(rename = "FunctionArn")]
    pub arn: Option<String>,
    /// Lifecycle state
    pub state: Option<LifecycleState>,
    /// Why the function is in its current state
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state_reason: Option<String>,
    /// Status of the last code or configuration update
    pub last_update_status: Option<UpdateStatus>,
    /// RFC 3339 timestamp in UTC
    pub last_modified: Option<String>,
    /// Memory in MB
    #[serde(rename = "MemorySize")]
    pub memory_mb: Option<i32>,
    /// Timeout in seconds
    #[serde(rename = "Timeout")]
    pub timeout_s: Option<i32>,
    /// Image reference, only reported by single function lookups
    pub image_uri: Option<String>,
    /// Description
    pub description: Option<String>,
    /// Execution role ARN
    #[serde(rename = "Role")]
    pub role_arn: Option<String>,
    /// Environment variables
    #[serde(skip_serializing_if = "Option::is_none")]
    pub environment: Option<HashMap<String, String>>,
}

impl FunctionState {
    /// Whether the function is ready to accept another update.
    pub fn is_settled(&self) -> bool {
        let pending = self.state.map(LifecycleState::is_transitional).unwrap_or(false);
        let updating = self.last_update_status == Some(UpdateStatus::InProgress);
        !pending && !updating
    }
}

/// How a function is invoked
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum InvocationType {
    /// Wait for the function to return its response
    #[default]
    RequestResponse,
    /// Queue the event and return immediately
    Event,
    /// Only check parameters and permissions
    DryRun,
}

impl InvocationType {
    /// Name used on the wire.
    pub fn as_str(self) -> &'static str {
        match self {
            InvocationType::RequestResponse => "RequestResponse",
            InvocationType::Event => "Event",
            InvocationType::DryRun => "DryRun",
        }
    }
}

impl FromStr for InvocationType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "RequestResponse" => Ok(InvocationType::RequestResponse),
            "Event" => Ok(InvocationType::Event),
            "DryRun" => Ok(InvocationType::DryRun),
            other => Err(format!(
                "unknown invocation type {other}, expected RequestResponse, Event or DryRun"
            )),
        }
    }
}

/// `InvocationResult` is the normalized outcome of an invocation
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct InvocationResult {
    /// HTTP status code of the invocation
    pub status_code: i32,
    /// Raw response bytes, rendered as JSON when serialized
    #[serde(serialize_with = "serialize_payload")]
    pub payload: Vec<u8>,
    /// Set when the function itself raised an error
    #[serde(skip_serializing_if = "Option::is_none")]
    pub function_error: Option<String>,
    /// Tail of the execution log, decoded
    #[serde(skip_serializing_if = "Option::is_none")]
    pub execution_log: Option<String>,
    /// Version that handled the invocation
    #[serde(skip_serializing_if = "Option::is_none")]
    pub executed_version: Option<String>,
}

impl InvocationResult {
    /// Payload parsed as JSON, falling back to a string for non JSON responses.
    pub fn payload_value(&self) -> Value {
        payload_to_value(&self.payload)
    }
}

fn payload_to_value(payload: &[u8]) -> Value {
    if payload.is_empty() {
        return Value::Null;
    }
    serde_json::from_slice(payload)
        .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(payload).into_owned()))
}

fn serialize_payload<S>(payload: &[u8], serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    payload_to_value(payload).serialize(serializer)
}
