//! Scripted transport for unit tests.
//!
//! Routes match by substring against the GET URL, or `"<url> <json body>"` for POSTs.
//! Each route replays its replies in order and repeats the last one.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::blockchain::client::JsonTransport;
use crate::blockchain::types::{SyncError, SyncResult};

#[derive(Debug, Clone)]
pub(crate) enum MockReply {
    Json(Value, Duration),
    Unavailable(Duration),
}

impl MockReply {
    pub(crate) fn json(value: Value) -> Self {
        Self::Json(value, Duration::ZERO)
    }

    pub(crate) fn delayed(value: Value, ms: u64) -> Self {
        Self::Json(value, Duration::from_millis(ms))
    }

    pub(crate) fn unavailable() -> Self {
        Self::Unavailable(Duration::ZERO)
    }
}

struct Route {
    pattern: String,
    replies: VecDeque<MockReply>,
}

#[derive(Default)]
pub(crate) struct MockTransport {
    routes: Mutex<Vec<Route>>,
    calls: Mutex<Vec<String>>,
}

impl MockTransport {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Queue `reply` for requests containing `pattern`.
    pub(crate) fn on(&self, pattern: &str, reply: MockReply) {
        let mut routes = self.routes.lock().unwrap();
        match routes.iter_mut().find(|r| r.pattern == pattern) {
            Some(route) => route.replies.push_back(reply),
            None => routes.push(Route {
                pattern: pattern.to_string(),
                replies: VecDeque::from([reply]),
            }),
        }
    }

    /// Every request seen so far, in order.
    pub(crate) fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub(crate) fn count(&self, pattern: &str) -> usize {
        self.calls.lock().unwrap().iter().filter(|c| c.contains(pattern)).count()
    }

    fn next_reply(&self, request: &str) -> Option<MockReply> {
        self.calls.lock().unwrap().push(request.to_string());
        let mut routes = self.routes.lock().unwrap();
        let route = routes.iter_mut().find(|r| request.contains(&r.pattern))?;
        if route.replies.len() > 1 {
            route.replies.pop_front()
        } else {
            route.replies.front().cloned()
        }
    }

    async fn respond(&self, request: String) -> SyncResult<Value> {
        match self.next_reply(&request) {
            Some(MockReply::Json(value, delay)) => {
                tokio::time::sleep(delay).await;
                Ok(value)
            }
            Some(MockReply::Unavailable(delay)) => {
                tokio::time::sleep(delay).await;
                Err(SyncError::unavailable("mock", "HTTP 503"))
            }
            None => Err(SyncError::unavailable("mock", format!("no route for {request}"))),
        }
    }
}

#[async_trait]
impl JsonTransport for MockTransport {
    async fn get_json(&self, url: &str) -> SyncResult<Value> {
        self.respond(url.to_string()).await
    }

    async fn post_json(&self, url: &str, body: &Value) -> SyncResult<Value> {
        self.respond(format!("{url} {body}")).await
    }
}
