use std::{fmt, time::Duration};
use thiserror::Error as ThisError;

/// Diagnostic reported by the AWS control plane.
///
/// Every error that originates from a provider response keeps one of these
/// as its source, so callers can still see the raw code and message.
#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
#[error("{}: {}", .code.as_deref().unwrap_or("Unknown"), .message)]
pub struct ProviderError {
    /// Provider error code, e.g. `ResourceNotFoundException` or `NoSuchEntity`
    pub code: Option<String>,
    /// Human readable message returned with the error
    pub message: String,
}

impl ProviderError {
    /// Build a provider diagnostic from a code and a message.
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> ProviderError {
        ProviderError {
            code: Some(code.into()),
            message: message.into(),
        }
    }
}

/// The two halves of an update, which the provider exposes as separate calls.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UpdateStep {
    /// The image reference update
    Code,
    /// The memory, timeout, description, environment and role update
    Configuration,
}

impl fmt::Display for UpdateStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UpdateStep::Code => f.write_str("code"),
            UpdateStep::Configuration => f.write_str("configuration"),
        }
    }
}

/// Different errors that the lifecycle operations can raise
#[derive(Debug, ThisError)]
pub enum LifecycleError {
    /// The request is malformed. Raised locally before any network call, or
    /// forwarded when the provider rejects a parameter.
    #[error("validation failed: {message}")]
    Validation {
        /// What was wrong with the request
        message: String,
        /// Provider diagnostic, when the provider rejected the request
        #[source]
        source: Option<ProviderError>,
    },
    /// The function or role does not exist
    #[error("{resource} not found")]
    NotFound {
        /// Name of the missing resource
        resource: String,
        /// Provider diagnostic, when the provider reported the absence
        #[source]
        source: Option<ProviderError>,
    },
    /// The function or role already exists
    #[error("{resource} already exists")]
    AlreadyExists {
        /// Name of the conflicting resource
        resource: String,
        /// Provider diagnostic, when the provider reported the conflict
        #[source]
        source: Option<ProviderError>,
    },
    /// The caller's credentials are not allowed to perform the operation
    #[error("permission denied")]
    PermissionDenied(#[source] ProviderError),
    /// The provider rejected the call because of a concurrency or rate limit
    #[error("request throttled")]
    Throttled(#[source] ProviderError),
    /// Transient provider-side fault, including network failures
    #[error("service unavailable")]
    ServiceUnavailable(#[source] ProviderError),
    /// Only the first half of an update was applied
    #[error("partial update of {function}: {succeeded} updated, {failed} update failed")]
    PartialUpdate {
        /// Function that was left half updated
        function: String,
        /// Half of the update that was applied
        succeeded: UpdateStep,
        /// Half of the update that failed
        failed: UpdateStep,
        /// Error returned by the failing half
        #[source]
        source: Box<LifecycleError>,
    },
    /// A bounded wait elapsed before the awaited condition held
    #[error("timed out after {waited:?} waiting for {what}")]
    Timeout {
        /// Condition that was being waited for
        what: String,
        /// How long the wait lasted
        waited: Duration,
    },
}

/// Error kinds exposed on the command line, one per [`LifecycleError`] variant.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    /// See [`LifecycleError::Validation`]
    ValidationError,
    /// See [`LifecycleError::NotFound`]
    NotFound,
    /// See [`LifecycleError::AlreadyExists`]
    AlreadyExists,
    /// See [`LifecycleError::PermissionDenied`]
    PermissionDenied,
    /// See [`LifecycleError::Throttled`]
    Throttled,
    /// See [`LifecycleError::ServiceUnavailable`]
    ServiceUnavailable,
    /// See [`LifecycleError::PartialUpdate`]
    PartialUpdate,
    /// See [`LifecycleError::Timeout`]
    Timeout,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

impl LifecycleError {
    /// Build a local validation error.
    pub fn validation(message: impl Into<String>) -> LifecycleError {
        LifecycleError::Validation {
            message: message.into(),
            source: None,
        }
    }

    /// Classify the error into its taxonomy kind.
    pub fn kind(&self) -> ErrorKind {
        match self {
            LifecycleError::Validation { .. } => ErrorKind::ValidationError,
            LifecycleError::NotFound { .. } => ErrorKind::NotFound,
            LifecycleError::AlreadyExists { .. } => ErrorKind::AlreadyExists,
            LifecycleError::PermissionDenied(_) => ErrorKind::PermissionDenied,
            LifecycleError::Throttled(_) => ErrorKind::Throttled,
            LifecycleError::ServiceUnavailable(_) => ErrorKind::ServiceUnavailable,
            LifecycleError::PartialUpdate { .. } => ErrorKind::PartialUpdate,
            LifecycleError::Timeout { .. } => ErrorKind::Timeout,
        }
    }

    /// Lambda rejects functions whose execution role IAM has not finished
    /// propagating with an invalid parameter error mentioning the role.
    pub(crate) fn is_role_not_assumable(&self) -> bool {
        match self {
            LifecycleError::Validation {
                source: Some(provider),
                ..
            } => provider.message.contains("cannot be assumed"),
            _ => false,
        }
    }
}
