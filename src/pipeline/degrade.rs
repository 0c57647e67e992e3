//! Stage-level failure policy for the strategy pipeline.
//!
//! Every external stage (retrieval, generation, media search) runs through
//! [`degrade_with`]: it is bounded by a timeout, failures are logged with the
//! stage name, and the caller always receives a usable value.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use tracing::warn;

#[derive(Debug, Clone, PartialEq)]
pub struct StageOutcome<T> {
    pub value: T,
    /// `true` when `value` is the substitute rather than the stage result.
    pub degraded: bool,
}

impl<T> StageOutcome<T> {
    fn ok(value: T) -> Self {
        Self {
            value,
            degraded: false,
        }
    }

    fn fallback(value: T) -> Self {
        Self {
            value,
            degraded: true,
        }
    }
}

/// Runs `fut` under `timeout`; on error or timeout returns `fallback()`.
pub async fn degrade_with<T, E, F, D>(
    stage: &'static str,
    timeout: Duration,
    fut: F,
    fallback: D,
) -> StageOutcome<T>
where
    F: Future<Output = Result<T, E>>,
    E: Display,
    D: FnOnce() -> T,
{
    match tokio::time::timeout(timeout, fut).await {
        Ok(Ok(value)) => StageOutcome::ok(value),
        Ok(Err(err)) => {
            warn!(stage, error = %err, "Stage failed; using fallback");
            StageOutcome::fallback(fallback())
        }
        Err(_) => {
            warn!(stage, timeout_secs = timeout.as_secs(), "Stage timed out; using fallback");
            StageOutcome::fallback(fallback())
        }
    }
}

/// [`degrade_with`] falling back to `T::default()`.
pub async fn degrade<T, E, F>(stage: &'static str, timeout: Duration, fut: F) -> StageOutcome<T>
where
    F: Future<Output = Result<T, E>>,
    E: Display,
    T: Default,
{
    degrade_with(stage, timeout, fut, T::default).await
}
