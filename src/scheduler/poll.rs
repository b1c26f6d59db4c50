//! Cooperative poll loop.
//!
//! Each pass walks every resource key in a fixed order (height, nonce, balances, histories)
//! and starts the fetch of each key that is due and not already in flight. Fetches run
//! concurrently; their results are merged on the loop task as they land, so a slow race
//! for one key never holds up another. The loop ends when the engine's liveness flag is
//! cleared; fetches already in flight finish, and their results are dropped at merge time.

use futures_util::stream::{FuturesUnordered, StreamExt};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

use crate::blockchain::types::SyncResult;
use crate::config::PollingConfig;
use crate::fetchers::{self, Fact, FetchContext};
use crate::lifecycle::Liveness;
use crate::observability::metrics;
use crate::scheduler::{PollState, ResourceKey};
use crate::state::{unix_now, StateReconciler};

/// A finished check: resource index, height sampled before the fetch, fetch outcome.
type CheckOutcome = (usize, u64, SyncResult<Fact>);

type CheckFuture = Pin<Box<dyn Future<Output = CheckOutcome> + Send>>;

pub struct PollScheduler {
    ctx: Arc<FetchContext>,
    reconciler: Arc<StateReconciler>,
    liveness: Liveness,
    resources: Vec<(ResourceKey, PollState)>,
    checks: FuturesUnordered<CheckFuture>,
    yield_interval: Duration,
}

impl PollScheduler {
    pub fn new(
        ctx: Arc<FetchContext>,
        reconciler: Arc<StateReconciler>,
        liveness: Liveness,
        config: &PollingConfig,
    ) -> Self {
        let secs = Duration::from_secs;
        let mut resources = vec![
            (ResourceKey::Height, PollState::new(secs(config.height_interval_secs))),
            (ResourceKey::Nonce, PollState::new(secs(config.nonce_interval_secs))),
        ];
        let codes: Vec<String> = ctx.currencies().map(str::to_string).collect();
        for code in &codes {
            resources.push((
                ResourceKey::Balance(code.clone()),
                PollState::new(secs(config.balance_interval_secs)),
            ));
        }
        for code in codes {
            resources.push((
                ResourceKey::History(code),
                PollState::new(secs(config.history_interval_secs)),
            ));
        }

        Self {
            ctx,
            reconciler,
            liveness,
            resources,
            checks: FuturesUnordered::new(),
            yield_interval: Duration::from_millis(config.yield_ms),
        }
    }

    /// Tracked keys in pass order.
    pub fn keys(&self) -> impl Iterator<Item = &ResourceKey> {
        self.resources.iter().map(|(key, _)| key)
    }

    /// Checks started but not merged yet.
    pub fn in_flight(&self) -> usize {
        self.checks.len()
    }

    /// Run passes until the liveness flag is cleared.
    pub async fn run(mut self) {
        tracing::info!(resources = self.resources.len(), "Poll scheduler started");
        let mut stopped = !self.liveness.is_alive();
        while !stopped {
            self.start_due();
            let wake = tokio::time::sleep(self.yield_interval);
            tokio::pin!(wake);
            loop {
                tokio::select! {
                    Some(outcome) = self.checks.next(), if !self.checks.is_empty() => self.finish(outcome),
                    _ = &mut wake => break,
                    _ = self.liveness.cleared() => {
                        stopped = true;
                        break;
                    }
                }
            }
        }
        self.drain().await;
        tracing::info!("Poll scheduler stopped");
    }

    /// One pass: start every due check, then wait for everything in flight to be merged.
    /// Returns how many checks the pass started.
    pub async fn run_pass(&mut self) -> usize {
        let started = self.start_due();
        self.drain().await;
        started
    }

    /// Start the fetch of every key that is due and idle. The stamp is taken at start.
    fn start_due(&mut self) -> usize {
        let mut started = 0;
        for i in 0..self.resources.len() {
            if !self.liveness.is_alive() {
                break;
            }
            let now = Instant::now();
            let (key, state) = &mut self.resources[i];
            if state.in_flight || !state.is_due(now) {
                continue;
            }
            state.stamp(now);
            state.in_flight = true;
            let key = key.clone();
            let check = self.fetch(i, key);
            self.checks.push(check);
            started += 1;
        }
        started
    }

    fn fetch(&self, index: usize, key: ResourceKey) -> CheckFuture {
        let ctx = self.ctx.clone();
        let snapshot = self.reconciler.snapshot();
        let pre_update_height = snapshot.block_height;
        let start_block = match &key {
            ResourceKey::History(code) => snapshot.last_queried_height.get(code).copied().unwrap_or(0),
            _ => 0,
        };

        Box::pin(async move {
            let result = match &key {
                ResourceKey::Height => fetchers::fetch_block_height(&ctx).await,
                ResourceKey::Nonce => fetchers::fetch_nonce(&ctx).await,
                ResourceKey::Balance(code) => fetchers::fetch_balance(&ctx, code).await,
                ResourceKey::History(code) => fetchers::fetch_history(&ctx, start_block, code).await,
            };
            (index, pre_update_height, result)
        })
    }

    /// Merge one finished check on the loop task.
    fn finish(&mut self, (index, pre_update_height, result): CheckOutcome) {
        let (key, state) = &mut self.resources[index];
        state.in_flight = false;
        let label = key.to_string();

        match result {
            Ok(fact) => {
                metrics::record_poll_check(&label, true);
                if !self.liveness.is_alive() {
                    tracing::debug!(resource = %label, "Engine stopped; discarding fetched fact");
                    return;
                }
                self.reconciler.process_update(unix_now(), vec![fact], pre_update_height);
            }
            Err(e) => {
                metrics::record_poll_check(&label, false);
                tracing::warn!(resource = %label, error = %e, "Check failed; retrying next interval");
            }
        }
    }

    async fn drain(&mut self) {
        while let Some(outcome) = self.checks.next().await {
            self.finish(outcome);
        }
    }
}

impl std::fmt::Debug for PollScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PollScheduler")
            .field("resources", &self.resources)
            .field("in_flight", &self.checks.len())
            .field("yield_interval", &self.yield_interval)
            .finish()
    }
}
