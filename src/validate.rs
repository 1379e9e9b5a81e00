//! Local checks run before any request reaches the control plane.
//!
//! The provider stays authoritative: these checks only reject input the
//! provider is certain to reject, so a bad request never costs a network call.
use crate::{
    error::LifecycleError,
    model::{FunctionSpec, FunctionUpdate, VpcSettings},
};
use std::collections::HashMap;

/// Smallest memory size Lambda accepts, in MB
pub const MIN_MEMORY_MB: i32 = 128;
/// Largest memory size Lambda accepts, in MB
pub const MAX_MEMORY_MB: i32 = 10240;
/// Smallest timeout Lambda accepts, in seconds
pub const MIN_TIMEOUT_S: i32 = 1;
/// Largest timeout Lambda accepts, in seconds
pub const MAX_TIMEOUT_S: i32 = 900;

const MAX_NAME_LEN: usize = 64;
const MAX_ENVIRONMENT_BYTES: usize = 4096;
const MAX_TAG_KEY_LEN: usize = 128;
const MAX_TAG_VALUE_LEN: usize = 256;

/// Function names are 1 to 64 letters, digits, hyphens or underscores.
pub fn validate_function_name(name: &str) -> Result<(), LifecycleError> {
    let valid_chars = name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if name.is_empty() || name.len() > MAX_NAME_LEN || !valid_chars {
        return Err(LifecycleError::validation(format!(
            "function name {name:?} must be 1-{MAX_NAME_LEN} letters, digits, hyphens or underscores"
        )));
    }
    Ok(())
}

/// Role names are 1 to 64 letters, digits or any of `+=,.@_-`.
pub fn validate_role_name(name: &str) -> Result<(), LifecycleError> {
    let valid_chars = name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || "+=,.@_-".contains(c));
    if name.is_empty() || name.len() > MAX_NAME_LEN || !valid_chars {
        return Err(LifecycleError::validation(format!(
            "role name {name:?} must be 1-{MAX_NAME_LEN} letters, digits or +=,.@_-"
        )));
    }
    Ok(())
}

/// Image references must name a repository and pin a tag or a digest.
pub fn validate_image_uri(image_uri: &str) -> Result<(), LifecycleError> {
    let invalid = |reason: &str| {
        Err(LifecycleError::validation(format!(
            "image uri {image_uri:?} {reason}"
        )))
    };

    if image_uri.is_empty() || image_uri.chars().any(char::is_whitespace) {
        return invalid("must be a non-empty reference without whitespace");
    }

    let (registry, repository) = match image_uri.split_once('/') {
        Some(parts) => parts,
        None => return invalid("must include a registry host"),
    };
    if registry.is_empty() || repository.is_empty() {
        return invalid("must include a registry host and a repository");
    }

    let pinned = match repository.split_once('@') {
        Some((name, digest)) => !name.is_empty() && digest.contains(':'),
        None => repository
            .rsplit_once(':')
            .map(|(name, tag)| !name.is_empty() && !tag.is_empty() && !tag.contains('/'))
            .unwrap_or(false),
    };
    if !pinned {
        return invalid("must end with a :tag or an @digest");
    }
    Ok(())
}

/// Memory must lie in 128..=10240 MB.
pub fn validate_memory(memory_mb: i32) -> Result<(), LifecycleError> {
    if !(MIN_MEMORY_MB..=MAX_MEMORY_MB).contains(&memory_mb) {
        return Err(LifecycleError::validation(format!(
            "memory {memory_mb} MB is outside {MIN_MEMORY_MB}-{MAX_MEMORY_MB} MB"
        )));
    }
    Ok(())
}

/// Timeout must lie in 1..=900 seconds.
pub fn validate_timeout(timeout_s: i32) -> Result<(), LifecycleError> {
    if !(MIN_TIMEOUT_S..=MAX_TIMEOUT_S).contains(&timeout_s) {
        return Err(LifecycleError::validation(format!(
            "timeout {timeout_s}s is outside {MIN_TIMEOUT_S}-{MAX_TIMEOUT_S}s"
        )));
    }
    Ok(())
}

fn validate_role_arn(role_arn: &str) -> Result<(), LifecycleError> {
    if !role_arn.starts_with("arn:") || !role_arn.contains(":role/") {
        return Err(LifecycleError::validation(format!(
            "role arn {role_arn:?} is not an IAM role ARN"
        )));
    }
    Ok(())
}

/// Keys start with a letter and hold letters, digits or underscores; the
/// whole set must fit in 4 KB.
pub fn validate_environment(variables: &HashMap<String, String>) -> Result<(), LifecycleError> {
    for key in variables.keys() {
        let mut chars = key.chars();
        let starts_with_letter = chars.next().map(|c| c.is_ascii_alphabetic()).unwrap_or(false);
        if !starts_with_letter || !chars.all(|c| c.is_ascii_alphanumeric() || c == '_') {
            return Err(LifecycleError::validation(format!(
                "environment variable {key:?} must start with a letter and hold only letters, digits or underscores"
            )));
        }
    }

    let size: usize = variables.iter().map(|(k, v)| k.len() + v.len()).sum();
    if size > MAX_ENVIRONMENT_BYTES {
        return Err(LifecycleError::validation(format!(
            "environment variables take {size} bytes, more than {MAX_ENVIRONMENT_BYTES}"
        )));
    }
    Ok(())
}

/// Tag keys are 1 to 128 characters, values up to 256.
pub fn validate_tags(tags: &HashMap<String, String>) -> Result<(), LifecycleError> {
    for (key, value) in tags {
        if key.is_empty() || key.chars().count() > MAX_TAG_KEY_LEN {
            return Err(LifecycleError::validation(format!(
                "tag key {key:?} must be 1-{MAX_TAG_KEY_LEN} characters"
            )));
        }
        if value.chars().count() > MAX_TAG_VALUE_LEN {
            return Err(LifecycleError::validation(format!(
                "tag {key:?} value is longer than {MAX_TAG_VALUE_LEN} characters"
            )));
        }
    }
    Ok(())
}

/// A VPC attachment needs at least one subnet and one security group.
pub fn validate_vpc(vpc: &VpcSettings) -> Result<(), LifecycleError> {
    if vpc.subnet_ids.is_empty() || vpc.security_group_ids.is_empty() {
        return Err(LifecycleError::validation(
            "vpc settings need at least one subnet and one security group",
        ));
    }
    Ok(())
}

/// Validate every field of a create request.
pub fn validate_spec(spec: &FunctionSpec) -> Result<(), LifecycleError> {
    validate_role_arn(&spec.role_arn)?;
    validate_settings(spec)
}

/// Validate every field of a create request except the execution role,
/// which may not be known until the role is provisioned.
pub fn validate_settings(spec: &FunctionSpec) -> Result<(), LifecycleError> {
    validate_function_name(&spec.name)?;
    validate_image_uri(&spec.image_uri)?;
    validate_memory(spec.memory_mb)?;
    validate_timeout(spec.timeout_s)?;
    validate_environment(&spec.environment)?;
    validate_tags(&spec.tags)?;
    if let Some(vpc) = &spec.vpc {
        validate_vpc(vpc)?;
    }
    Ok(())
}

/// Validate the fields an update supplies.
pub fn validate_update(update: &FunctionUpdate) -> Result<(), LifecycleError> {
    validate_function_name(&update.name)?;
    if let Some(image_uri) = &update.image_uri {
        validate_image_uri(image_uri)?;
    }
    if let Some(memory_mb) = update.memory_mb {
        validate_memory(memory_mb)?;
    }
    if let Some(timeout_s) = update.timeout_s {
        validate_timeout(timeout_s)?;
    }
    if let Some(environment) = &update.environment {
        validate_environment(environment)?;
    }
    if let Some(role_arn) = &update.role_arn {
        validate_role_arn(role_arn)?;
    }
    Ok(())
}
