//! Race combinators over provider candidates.
//!
//! Two strategies:
//! - [`ordered_fallback`]: one candidate at a time, same-capability peers shuffled to spread
//!   load, an optional secondary tried last. First success short-circuits.
//! - [`first_success`]: every candidate concurrently, first success wins, the rest are dropped.
//!
//! Both fail with `AllProvidersFailed` carrying every underlying error in the order the
//! failures were observed.

use futures_util::stream::{FuturesUnordered, StreamExt};
use rand::seq::SliceRandom;
use std::future::Future;
use std::pin::Pin;

use crate::blockchain::types::{SyncError, SyncResult};
use crate::observability::metrics;

/// Boxed future produced by a candidate.
pub type CandidateFuture<'a, T> = Pin<Box<dyn Future<Output = SyncResult<T>> + Send + 'a>>;

/// A lazily started provider call.
///
/// Nothing is sent until the race invokes the candidate.
pub struct Candidate<'a, T> {
    label: String,
    start: Box<dyn FnOnce() -> CandidateFuture<'a, T> + Send + 'a>,
}

impl<'a, T> Candidate<'a, T> {
    pub fn new<F, Fut>(label: impl Into<String>, f: F) -> Self
    where
        F: FnOnce() -> Fut + Send + 'a,
        Fut: Future<Output = SyncResult<T>> + Send + 'a,
    {
        Self {
            label: label.into(),
            start: Box::new(move || Box::pin(f()) as CandidateFuture<'a, T>),
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    fn invoke(self) -> (String, CandidateFuture<'a, T>) {
        let fut = (self.start)();
        (self.label, fut)
    }
}

impl<T> std::fmt::Debug for Candidate<'_, T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Candidate").field("label", &self.label).finish()
    }
}

/// Try `peers` in random order, then `secondary`, until one succeeds.
pub async fn ordered_fallback<'a, T>(
    resource: &str,
    mut peers: Vec<Candidate<'a, T>>,
    secondary: Option<Candidate<'a, T>>,
) -> SyncResult<T> {
    peers.shuffle(&mut rand::thread_rng());
    peers.extend(secondary);
    in_order(resource, peers).await
}

/// Try `candidates` strictly in the given order until one succeeds.
pub async fn in_order<'a, T>(resource: &str, candidates: Vec<Candidate<'a, T>>) -> SyncResult<T> {
    let mut errors = Vec::with_capacity(candidates.len());

    for candidate in candidates {
        let (label, fut) = candidate.invoke();
        match fut.await {
            Ok(value) => {
                metrics::record_provider_call(resource, &label, true);
                tracing::debug!(resource = %resource, provider = %label, "Provider succeeded");
                return Ok(value);
            }
            Err(e) => {
                metrics::record_provider_call(resource, &label, false);
                tracing::warn!(resource = %resource, provider = %label, error = %e, "Provider failed, trying next");
                errors.push(e);
            }
        }
    }

    metrics::record_race_exhausted(resource);
    Err(SyncError::AllProvidersFailed(errors))
}

/// Start every candidate at once and return the first success.
///
/// Candidates still running when a winner arrives are dropped, so their results are
/// never observed.
pub async fn first_success<'a, T>(resource: &str, candidates: Vec<Candidate<'a, T>>) -> SyncResult<T>
where
    T: Send + 'a,
{
    let mut in_flight: FuturesUnordered<_> = candidates
        .into_iter()
        .map(|candidate| {
            let (label, fut) = candidate.invoke();
            async move { (label, fut.await) }
        })
        .collect();

    let mut errors = Vec::with_capacity(in_flight.len());

    while let Some((label, outcome)) = in_flight.next().await {
        match outcome {
            Ok(value) => {
                metrics::record_provider_call(resource, &label, true);
                tracing::debug!(
                    resource = %resource,
                    provider = %label,
                    abandoned = in_flight.len(),
                    "Race won"
                );
                return Ok(value);
            }
            Err(e) => {
                metrics::record_provider_call(resource, &label, false);
                tracing::warn!(resource = %resource, provider = %label, error = %e, "Race candidate failed");
                errors.push(e);
            }
        }
    }

    metrics::record_race_exhausted(resource);
    Err(SyncError::AllProvidersFailed(errors))
}
