//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Racer, scheduler, reconciler produce:
//!     → logging.rs (structured log events via tracing)
//!     → metrics.rs (counters and gauges)
//!
//! Consumers:
//!     → stdout
//!     → Prometheus scrape endpoint (optional)
//! ```

pub mod logging;
pub mod metrics;
