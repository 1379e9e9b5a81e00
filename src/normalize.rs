//! Turns provider responses and failures into the crate's own types.
use crate::{
    error::{LifecycleError, ProviderError},
    model::{FunctionState, InvocationResult},
};
use aws_sdk_lambda::{
    error::{DisplayErrorContext, ProvideErrorMetadata, SdkError},
    operation::invoke::InvokeOutput,
    types::FunctionConfiguration,
};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use chrono::{DateTime, SecondsFormat, Utc};

/// Convert an SDK failure into a [`LifecycleError`].
///
/// `resource` names what the call was about, e.g. `function img-proc`.
pub(crate) fn from_sdk_error<E>(resource: &str, err: SdkError<E>) -> LifecycleError
where
    E: ProvideErrorMetadata + std::error::Error + Send + Sync + 'static,
{
    let context = DisplayErrorContext(&err).to_string();
    match &err {
        SdkError::ServiceError(service) => {
            let inner = service.err();
            let provider = ProviderError {
                code: inner.code().map(str::to_string),
                message: inner.message().map(str::to_string).unwrap_or(context),
            };
            classify(resource, provider)
        }
        SdkError::ConstructionFailure(_) => LifecycleError::Validation {
            message: format!("unable to build request for {resource}"),
            source: Some(ProviderError {
                code: None,
                message: context,
            }),
        },
        // timeouts, dispatch and response failures never reached a service decision
        _ => LifecycleError::ServiceUnavailable(ProviderError {
            code: None,
            message: context,
        }),
    }
}

/// Map a provider error code onto the error taxonomy.
///
/// Lambda and IAM spell the same condition differently
/// (`ResourceNotFoundException` and `NoSuchEntity`), both are handled here.
/// Unknown codes are treated as provider-side faults, and so is Lambda's
/// `ResourceConflictException`, which outside of a create means the function
/// is busy updating or still `Pending`. See [`conflict_as_existing`].
pub(crate) fn classify(resource: &str, provider: ProviderError) -> LifecycleError {
    let code = provider
        .code
        .as_deref()
        .map(sanitize_code)
        .unwrap_or_default()
        .to_string();

    match code.as_str() {
        "ResourceNotFoundException" | "NoSuchEntity" | "NoSuchEntityException" => {
            LifecycleError::NotFound {
                resource: resource.to_string(),
                source: Some(provider),
            }
        }
        "EntityAlreadyExists" | "EntityAlreadyExistsException" => {
            LifecycleError::AlreadyExists {
                resource: resource.to_string(),
                source: Some(provider),
            }
        }
        "AccessDenied"
        | "AccessDeniedException"
        | "UnauthorizedOperation"
        | "UnrecognizedClientException"
        | "InvalidClientTokenId"
        | "ExpiredToken"
        | "ExpiredTokenException" => LifecycleError::PermissionDenied(provider),
        "TooManyRequestsException"
        | "Throttling"
        | "ThrottlingException"
        | "RequestLimitExceeded" => LifecycleError::Throttled(provider),
        "InvalidParameterValueException"
        | "InvalidRequestContentException"
        | "RequestTooLargeException"
        | "CodeStorageExceededException"
        | "ValidationError"
        | "ValidationException"
        | "InvalidInput"
        | "MalformedPolicyDocument"
        | "LimitExceeded" => LifecycleError::Validation {
            message: format!("{resource} rejected by the provider"),
            source: Some(provider),
        },
        _ => LifecycleError::ServiceUnavailable(provider),
    }
}

/// A conflict answered to a create call means the function already exists.
pub(crate) fn conflict_as_existing(resource: &str, err: LifecycleError) -> LifecycleError {
    match err {
        LifecycleError::ServiceUnavailable(provider)
            if provider.code.as_deref().map(sanitize_code) == Some("ResourceConflictException") =>
        {
            LifecycleError::AlreadyExists {
                resource: resource.to_string(),
                source: Some(provider),
            }
        }
        other => other,
    }
}

// x-amzn-errortype may carry a namespace prefix or a `:url` suffix
fn sanitize_code(code: &str) -> &str {
    let code = code.split(':').next().unwrap_or(code);
    code.rsplit('#').next().unwrap_or(code)
}

/// Lambda reports `2024-05-01T10:00:00.000+0000`; callers get RFC 3339 in UTC.
/// Values in neither format are passed through.
pub(crate) fn normalize_timestamp(raw: &str) -> String {
    DateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f%z")
        .or_else(|_| DateTime::parse_from_rfc3339(raw))
        .map(|t| {
            t.with_timezone(&Utc)
                .to_rfc3339_opts(SecondsFormat::Secs, true)
        })
        .unwrap_or_else(|_| raw.to_string())
}

/// Build a snapshot from a function configuration.
/// `image_uri` is only known to single function lookups.
pub(crate) fn function_state(
    name: &str,
    config: &FunctionConfiguration,
    image_uri: Option<&str>,
) -> FunctionState {
    FunctionState {
        name: config.function_name().unwrap_or(name).to_string(),
        arn: config.function_arn().map(str::to_string),
        state: config.state().and_then(|s| s.as_str().parse().ok()),
        state_reason: config.state_reason().map(str::to_string),
        last_update_status: config
            .last_update_status()
            .and_then(|s| s.as_str().parse().ok()),
        last_modified: config.last_modified().map(normalize_timestamp),
        memory_mb: config.memory_size(),
        timeout_s: config.timeout(),
        image_uri: image_uri.map(str::to_string),
        description: config
            .description()
            .filter(|d| !d.is_empty())
            .map(str::to_string),
        role_arn: config.role().map(str::to_string),
        environment: config
            .environment()
            .and_then(|env| env.variables())
            .cloned(),
    }
}

/// Normalize an invocation response, decoding the base64 log tail.
pub(crate) fn invocation_result(output: &InvokeOutput) -> InvocationResult {
    InvocationResult {
        status_code: output.status_code(),
        payload: output
            .payload()
            .map(|blob| blob.as_ref().to_vec())
            .unwrap_or_default(),
        function_error: output.function_error().map(str::to_string),
        execution_log: output.log_result().and_then(decode_log),
        executed_version: output.executed_version().map(str::to_string),
    }
}

fn decode_log(encoded: &str) -> Option<String> {
    match STANDARD.decode(encoded) {
        Ok(bytes) => Some(String::from_utf8_lossy(&bytes).into_owned()),
        Err(err) => {
            tracing::warn!(%err, "discarding undecodable log tail");
            None
        }
    }
}
