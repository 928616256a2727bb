//! Rate-limited, cancellable fetching from the catalog.
//!
//! [`fetch_with_retry`] retries retryable failures with exponential
//! backoff and reports exhaustion as a value. [`fetch_batch`] runs those
//! in fixed-size chunks with a pause between chunks, keeping input order.

use std::fmt::{Debug, Display};
use std::future::Future;
use std::time::Duration;

use futures::future::join_all;
use mitsuke_api::ApiError;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::config::FetchConfig;

/// How a collaborator failure should be treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureClass {
    /// Upstream said slow down (429).
    RateLimited,
    /// Network trouble or a server-side error.
    Transient,
    /// The item does not exist (404). Terminal.
    NotFound,
    /// Anything else. Terminal.
    Fatal,
}

impl FailureClass {
    pub fn is_retryable(self) -> bool {
        matches!(self, Self::RateLimited | Self::Transient)
    }
}

/// Errors that can be sorted into a [`FailureClass`].
pub trait Classify {
    fn classify(&self) -> FailureClass;
}

impl Classify for ApiError {
    fn classify(&self) -> FailureClass {
        if self.is_rate_limited() {
            FailureClass::RateLimited
        } else if self.is_not_found() {
            FailureClass::NotFound
        } else if self.is_transient() {
            FailureClass::Transient
        } else {
            FailureClass::Fatal
        }
    }
}

/// Result of one orchestrated fetch. Failures are values, not errors.
#[derive(Debug, Clone, PartialEq)]
pub enum FetchOutcome<T> {
    Ready(T),
    /// The upstream reported the item missing; never retried.
    NotFound,
    /// Retries exhausted or a terminal failure.
    Unavailable,
    /// Retries exhausted while the upstream kept answering 429.
    RateLimited,
    /// The owning view went away; the result must be discarded.
    Cancelled,
}

impl<T> FetchOutcome<T> {
    pub fn ready(self) -> Option<T> {
        match self {
            Self::Ready(value) => Some(value),
            _ => None,
        }
    }
}

/// The fetch was cancelled before it finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cancelled;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl RetryPolicy {
    /// Backoff after the given 1-based attempt: `base * 2^(attempt-1)`.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 1u32
            .checked_shl(attempt.saturating_sub(1))
            .unwrap_or(u32::MAX);
        self.base_delay.saturating_mul(factor)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchPolicy {
    pub batch_size: usize,
    pub inter_batch_delay: Duration,
}

/// Fetch one item, retrying retryable failures.
///
/// Each failed attempt is followed by its backoff delay before the next
/// attempt or before giving up. Cancellation is observed at every step.
pub async fn fetch_with_retry<K, T, E, F, Fut>(
    key: K,
    policy: &RetryPolicy,
    cancel: &CancellationToken,
    fetch: F,
) -> FetchOutcome<T>
where
    K: Clone + Debug,
    E: Classify + Display,
    F: Fn(K) -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut last_class = FailureClass::Transient;
    for attempt in 1..=max_attempts {
        let result = tokio::select! {
            _ = cancel.cancelled() => return FetchOutcome::Cancelled,
            result = fetch(key.clone()) => result,
        };
        if cancel.is_cancelled() {
            return FetchOutcome::Cancelled;
        }
        let error = match result {
            Ok(value) => return FetchOutcome::Ready(value),
            Err(e) => e,
        };

        let class = error.classify();
        match class {
            FailureClass::NotFound => {
                debug!(?key, "Catalog item not found");
                return FetchOutcome::NotFound;
            }
            FailureClass::Fatal => {
                warn!(?key, error = %error, "Fetch failed");
                return FetchOutcome::Unavailable;
            }
            FailureClass::RateLimited | FailureClass::Transient => last_class = class,
        }

        let delay = policy.delay_for(attempt);
        warn!(
            ?key,
            attempt,
            ?class,
            delay_ms = delay.as_millis() as u64,
            error = %error,
            "Fetch attempt failed",
        );
        tokio::select! {
            _ = cancel.cancelled() => return FetchOutcome::Cancelled,
            _ = tokio::time::sleep(delay) => {}
        }
    }

    warn!(?key, attempts = max_attempts, "Giving up on fetch");
    if last_class == FailureClass::RateLimited {
        FetchOutcome::RateLimited
    } else {
        FetchOutcome::Unavailable
    }
}

/// Fetch many items in chunks, keeping input order and dropping failures.
pub async fn fetch_batch<K, T, E, F, Fut>(
    keys: &[K],
    batch: &BatchPolicy,
    retry: &RetryPolicy,
    cancel: &CancellationToken,
    fetch: F,
) -> Result<Vec<T>, Cancelled>
where
    K: Clone + Debug,
    E: Classify + Display,
    F: Fn(K) -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let chunk_size = batch.batch_size.max(1);
    let chunk_count = keys.len().div_ceil(chunk_size);
    let mut results = Vec::with_capacity(keys.len());

    for (index, chunk) in keys.chunks(chunk_size).enumerate() {
        if index > 0 && !batch.inter_batch_delay.is_zero() {
            tokio::select! {
                _ = cancel.cancelled() => return Err(Cancelled),
                _ = tokio::time::sleep(batch.inter_batch_delay) => {}
            }
        }
        debug!(batch = index + 1, of = chunk_count, size = chunk.len(), "Fetching batch");

        let outcomes = join_all(
            chunk
                .iter()
                .cloned()
                .map(|key| fetch_with_retry(key, retry, cancel, &fetch)),
        )
        .await;

        for outcome in outcomes {
            match outcome {
                FetchOutcome::Ready(value) => results.push(value),
                FetchOutcome::Cancelled => return Err(Cancelled),
                FetchOutcome::NotFound | FetchOutcome::Unavailable | FetchOutcome::RateLimited => {}
            }
        }
    }

    if cancel.is_cancelled() {
        return Err(Cancelled);
    }
    Ok(results)
}

/// Retry and batch policies bundled for the runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchOrchestrator {
    pub retry: RetryPolicy,
    pub batch: BatchPolicy,
}

impl FetchOrchestrator {
    pub fn from_config(config: &FetchConfig) -> Self {
        Self {
            retry: RetryPolicy {
                max_attempts: config.max_attempts,
                base_delay: Duration::from_millis(config.base_delay_ms),
            },
            batch: BatchPolicy {
                batch_size: config.batch_size,
                inter_batch_delay: Duration::from_millis(config.inter_batch_delay_ms),
            },
        }
    }

    pub async fn fetch_with_retry<K, T, E, F, Fut>(
        &self,
        key: K,
        cancel: &CancellationToken,
        fetch: F,
    ) -> FetchOutcome<T>
    where
        K: Clone + Debug,
        E: Classify + Display,
        F: Fn(K) -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        fetch_with_retry(key, &self.retry, cancel, fetch).await
    }

    pub async fn fetch_batch<K, T, E, F, Fut>(
        &self,
        keys: &[K],
        cancel: &CancellationToken,
        fetch: F,
    ) -> Result<Vec<T>, Cancelled>
    where
        K: Clone + Debug,
        E: Classify + Display,
        F: Fn(K) -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        fetch_batch(keys, &self.batch, &self.retry, cancel, fetch).await
    }
}
