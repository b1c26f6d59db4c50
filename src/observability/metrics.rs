//! Metrics collection and exposition.
//!
//! # Metrics
//! - `wallet_sync_provider_calls_total` (counter): provider call outcomes by resource, provider
//! - `wallet_sync_races_exhausted_total` (counter): races where every candidate failed
//! - `wallet_sync_poll_checks_total` (counter): scheduler checks by resource, outcome
//! - `wallet_sync_notifications_total` (counter): change notifications by kind
//! - `wallet_sync_nonce_anomalies_total` (counter): confirmed nonce ran past tracked spends
//! - `wallet_sync_block_height` (gauge): last applied block height
//! - `wallet_sync_pending_spends` (gauge): unconfirmed outgoing spends
//!
//! Recording is a no-op until a recorder is installed, so library users and tests pay
//! nothing unless `init_metrics` runs.

use metrics::{counter, gauge};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;

/// Install the Prometheus exporter listening on `addr`.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_provider_call(resource: &str, provider: &str, ok: bool) {
    counter!(
        "wallet_sync_provider_calls_total",
        "resource" => resource.to_string(),
        "provider" => provider.to_string(),
        "outcome" => if ok { "success" } else { "failure" }
    )
    .increment(1);
}

pub fn record_race_exhausted(resource: &str) {
    counter!("wallet_sync_races_exhausted_total", "resource" => resource.to_string()).increment(1);
}

pub fn record_poll_check(resource: &str, ok: bool) {
    counter!(
        "wallet_sync_poll_checks_total",
        "resource" => resource.to_string(),
        "outcome" => if ok { "applied" } else { "skipped" }
    )
    .increment(1);
}

pub fn record_notification(kind: &'static str) {
    counter!("wallet_sync_notifications_total", "kind" => kind).increment(1);
}

pub fn record_nonce_anomaly() {
    counter!("wallet_sync_nonce_anomalies_total").increment(1);
}

pub fn record_block_height(height: u64) {
    gauge!("wallet_sync_block_height").set(height as f64);
}

pub fn record_pending_spends(count: u64) {
    gauge!("wallet_sync_pending_spends").set(count as f64);
}
