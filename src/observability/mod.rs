//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → logging.rs (structured log events via `tracing`)
//!     → metrics.rs (counters, gauges, histograms via `metrics`)
//!
//! Consumers:
//!     → stderr log output
//!     → Metrics endpoint (Prometheus scrape, optional)
//! ```
//!
//! # Design Decisions
//! - Every connection runs inside a `connection` span carrying its id
//! - Correlation ids are recorded on per-request events
//! - Metric updates are no-ops until a recorder is installed

pub mod logging;
pub mod metrics;
