//! Timeout enforcement.
//!
//! # Responsibilities
//! - Wrap provider calls with a deadline
//! - Report expiry as a distinct error kind
//!
//! # Design Decisions
//! - Uses Tokio's timeout facilities
//! - A timed-out call counts as a failed race candidate, nothing more

use std::future::Future;
use std::time::Duration;
use tokio::time::timeout;

use crate::blockchain::types::{SyncError, SyncResult};

/// Run `fut`, failing with `SyncError::Timeout` if it does not finish within `deadline`.
pub async fn with_deadline<T, F>(provider: &str, deadline: Duration, fut: F) -> SyncResult<T>
where
    F: Future<Output = SyncResult<T>>,
{
    match timeout(deadline, fut).await {
        Ok(result) => result,
        Err(_) => {
            tracing::warn!(provider = %provider, timeout_secs = deadline.as_secs(), "Provider call timed out");
            Err(SyncError::Timeout {
                provider: provider.to_string(),
                secs: deadline.as_secs(),
            })
        }
    }
}
