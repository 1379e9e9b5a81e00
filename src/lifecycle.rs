use crate::{
    control_plane::FunctionControlPlane,
    error::{ErrorKind, LifecycleError},
    model::{FunctionState, InvocationResult, InvocationType},
    poll::retry_read_once,
    validate::validate_function_name,
};
use serde_json::Value;
use std::collections::VecDeque;

/// Largest page Lambda returns for a listing
const PAGE_SIZE: usize = 50;

/// Read, invoke and delete operations on existing functions.
pub struct FunctionLifecycle<F> {
    functions: F,
}

impl<F: FunctionControlPlane> FunctionLifecycle<F> {
    /// Lifecycle operations backed by `functions`.
    pub fn new(functions: F) -> FunctionLifecycle<F> {
        FunctionLifecycle { functions }
    }

    /// Current snapshot of a function.
    #[tracing::instrument(skip(self))]
    pub async fn describe(&self, name: &str) -> Result<FunctionState, LifecycleError> {
        validate_function_name(name)?;
        describe_with_retry(&self.functions, name).await
    }

    /// Delete a function. Deleting a function that does not exist succeeds,
    /// since absence is the desired end state.
    #[tracing::instrument(skip(self))]
    pub async fn delete(&self, name: &str) -> Result<(), LifecycleError> {
        validate_function_name(name)?;
        match self.functions.delete_function(name).await {
            Err(err) if err.kind() == ErrorKind::NotFound => {
                tracing::info!("function already absent");
                Ok(())
            }
            res => res,
        }
    }

    /// Invoke a function with a JSON payload. `Value::Null` sends no payload.
    #[tracing::instrument(skip(self, payload))]
    pub async fn invoke(
        &self,
        name: &str,
        payload: &Value,
        invocation_type: InvocationType,
    ) -> Result<InvocationResult, LifecycleError> {
        validate_function_name(name)?;

        let body = match payload {
            Value::Null => Vec::new(),
            value => serde_json::to_vec(value).map_err(|err| {
                LifecycleError::validation(format!("unable to serialize payload: {err}"))
            })?,
        };

        let result = self.functions.invoke(name, body, invocation_type).await?;
        if let Some(function_error) = &result.function_error {
            tracing::warn!(%function_error, "function returned an error");
        }
        Ok(result)
    }

    /// Lazily list functions, at most `max_items` of them when set.
    pub fn list(&self, max_items: Option<usize>) -> FunctionStream<'_, F> {
        FunctionStream {
            functions: &self.functions,
            buffer: VecDeque::new(),
            marker: None,
            remaining: max_items,
            exhausted: false,
        }
    }
}

/// Snapshot lookup shared by every read, retried once when the provider is unavailable.
pub(crate) async fn describe_with_retry<F: FunctionControlPlane>(
    functions: &F,
    name: &str,
) -> Result<FunctionState, LifecycleError> {
    retry_read_once("describe function", || functions.get_function(name)).await
}

/// `FunctionStream` walks every page of a function listing.
///
/// Pages are fetched on demand and the provider's markers stay internal.
/// The stream ends after the last page or after the first error and cannot
/// be restarted.
pub struct FunctionStream<'a, F> {
    functions: &'a F,
    buffer: VecDeque<FunctionState>,
    marker: Option<String>,
    remaining: Option<usize>,
    exhausted: bool,
}

impl<'a, F: FunctionControlPlane> FunctionStream<'a, F> {
    /// Next function, fetching the next page when the current one is used up.
    pub async fn next(&mut self) -> Option<Result<FunctionState, LifecycleError>> {
        if self.remaining == Some(0) {
            return None;
        }

        while self.buffer.is_empty() {
            if self.exhausted {
                return None;
            }

            let functions = self.functions;
            let marker = self.marker.take();
            let page_size = self.remaining.unwrap_or(PAGE_SIZE).min(PAGE_SIZE) as i32;

            let page = retry_read_once("list functions", || {
                functions.list_functions(marker.clone(), Some(page_size))
            })
            .await;

            match page {
                Ok(page) => {
                    tracing::debug!(count = page.functions.len(), "fetched page");
                    self.exhausted = page.next_marker.is_none();
                    self.marker = page.next_marker;
                    self.buffer.extend(page.functions);
                }
                Err(err) => {
                    self.exhausted = true;
                    return Some(Err(err));
                }
            }
        }

        if let Some(remaining) = self.remaining.as_mut() {
            *remaining -= 1;
        }
        self.buffer.pop_front().map(Ok)
    }

    /// Drain the stream into a vector, stopping at the first error.
    pub async fn try_collect(mut self) -> Result<Vec<FunctionState>, LifecycleError> {
        let mut functions = Vec::new();
        while let Some(function) = self.next().await {
            functions.push(function?);
        }
        Ok(functions)
    }
}
