use crate::error::{ErrorKind, LifecycleError};
use std::{future::Future, time::Duration};
use tokio::time::{sleep, Instant};

/// `Backoff` bounds a wait: the first pause, the longest pause, and the
/// total time after which the wait gives up.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Backoff {
    /// Pause after the first unsuccessful attempt
    pub initial: Duration,
    /// Upper bound for a single pause, pauses double until they reach it
    pub max_interval: Duration,
    /// Total time budget for the wait
    pub max_wait: Duration,
}

impl Backoff {
    /// Backoff starting at `initial` and giving up after `max_wait`.
    pub fn new(initial: Duration, max_interval: Duration, max_wait: Duration) -> Backoff {
        Backoff {
            initial,
            max_interval,
            max_wait,
        }
    }

    /// This backoff shortened so it gives up no later than `deadline`.
    pub fn until(self, deadline: Option<Instant>) -> Backoff {
        match deadline {
            Some(deadline) => Backoff {
                max_wait: self
                    .max_wait
                    .min(deadline.saturating_duration_since(Instant::now())),
                ..self
            },
            None => self,
        }
    }

    fn next_interval(&self, current: Duration) -> Duration {
        (current * 2).min(self.max_interval)
    }
}

/// Outcome of [`wait_until`]
#[derive(Clone, Debug, PartialEq)]
pub enum Waited<T> {
    /// The predicate held for this value
    Settled(T),
    /// The time budget ran out, this is the last value observed
    Expired(T),
}

impl<T> Waited<T> {
    /// The observed value, settled or not.
    pub fn into_inner(self) -> T {
        match self {
            Waited::Settled(value) | Waited::Expired(value) => value,
        }
    }
}

/// Call `read` until `done` holds for the value it returns or the backoff budget is spent.
///
/// `read` always runs at least once. A read error ends the wait immediately.
#[tracing::instrument(skip(backoff, read, done))]
pub async fn wait_until<T, F, Fut, P>(
    what: &str,
    backoff: Backoff,
    mut read: F,
    done: P,
) -> Result<Waited<T>, LifecycleError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, LifecycleError>>,
    P: Fn(&T) -> bool,
{
    let deadline = Instant::now() + backoff.max_wait;
    let mut interval = backoff.initial;

    loop {
        let value = read().await?;
        if done(&value) {
            return Ok(Waited::Settled(value));
        }
        if Instant::now() + interval > deadline {
            tracing::warn!(waited = ?backoff.max_wait, "gave up waiting");
            return Ok(Waited::Expired(value));
        }
        tracing::debug!(?interval, "not settled yet");
        sleep(interval).await;
        interval = backoff.next_interval(interval);
    }
}

/// Run `op` again while it fails with an error `retryable` accepts, within
/// the backoff budget. Fails with [`LifecycleError::Timeout`] once the budget
/// is spent; any other error is returned as is.
#[tracing::instrument(skip(backoff, op, retryable))]
pub async fn retry_while<T, F, Fut, R>(
    what: &str,
    backoff: Backoff,
    mut op: F,
    retryable: R,
) -> Result<T, LifecycleError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, LifecycleError>>,
    R: Fn(&LifecycleError) -> bool,
{
    let started = Instant::now();
    let deadline = started + backoff.max_wait;
    let mut interval = backoff.initial;

    loop {
        match op().await {
            Err(err) if retryable(&err) => {
                if Instant::now() + interval > deadline {
                    return Err(LifecycleError::Timeout {
                        what: what.to_string(),
                        waited: started.elapsed(),
                    });
                }
                tracing::info!(error = %err, ?interval, "retrying");
                sleep(interval).await;
                interval = backoff.next_interval(interval);
            }
            res => return res,
        }
    }
}

/// Run a read-only `op`, retrying it once when the provider is unavailable.
pub(crate) async fn retry_read_once<T, F, Fut>(what: &str, mut op: F) -> Result<T, LifecycleError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, LifecycleError>>,
{
    match op().await {
        Err(err) if err.kind() == ErrorKind::ServiceUnavailable => {
            tracing::warn!(error = %err, what, "retrying read once");
            op().await
        }
        res => res,
    }
}
