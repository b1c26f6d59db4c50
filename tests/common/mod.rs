//! Loopback mock providers for integration tests.

#![allow(dead_code)]

use axum::extract::Query;
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::TcpListener;

use wallet_sync::config::{AggregatorConfig, EndpointConfig, EngineConfig};

pub const WALLET: &str = "0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266";

/// Serve `router` on an ephemeral loopback port.
pub async fn spawn(router: Router) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let _ = axum::serve(listener, router).await;
    });
    addr
}

/// Explorer answering every account query, with hex proxy results, after `delay`.
pub fn explorer(delay: Duration, height_hex: &'static str) -> Router {
    Router::new().route(
        "/api",
        get(move |Query(params): Query<HashMap<String, String>>| async move {
            tokio::time::sleep(delay).await;
            let body = match params.get("action").map(String::as_str) {
                Some("eth_blockNumber") => json!({"jsonrpc": "2.0", "id": 1, "result": height_hex}),
                Some("eth_getTransactionCount") => json!({"jsonrpc": "2.0", "id": 1, "result": "0x5"}),
                Some("balance") => json!({"status": "1", "message": "OK", "result": "1000"}),
                Some("tokenbalance") => json!({"status": "1", "message": "OK", "result": "0"}),
                _ => json!({"status": "0", "message": "No transactions found", "result": []}),
            };
            Json(body)
        }),
    )
}

/// Explorer that is down for everything.
pub fn broken_explorer() -> Router {
    Router::new().route("/api", get(|| async { (StatusCode::SERVICE_UNAVAILABLE, "maintenance") }))
}

/// Aggregator reporting `height` as a plain decimal after `delay`.
pub fn aggregator(delay: Duration, height: u64) -> Router {
    Router::new().route(
        "/ethereum/stats",
        get(move || async move {
            tokio::time::sleep(delay).await;
            Json::<Value>(json!({"data": {"best_block_height": height}}))
        }),
    )
}

/// Engine configuration pointing at the mock providers, persistence disabled by the caller.
pub fn config(explorer: SocketAddr, aggregator: SocketAddr) -> EngineConfig {
    let mut config = EngineConfig::default();
    config.wallet.id = "main".to_string();
    config.wallet.address = WALLET.to_string();
    config.providers.explorers = vec![EndpointConfig {
        name: "explorer".to_string(),
        url: format!("http://{explorer}/api"),
        api_key: None,
    }];
    config.providers.aggregator = Some(AggregatorConfig {
        name: "aggregator".to_string(),
        url: format!("http://{aggregator}/ethereum"),
        api_key: None,
    });
    config.providers.timeout_secs = 2;
    config.polling.yield_ms = 20;
    config
}
