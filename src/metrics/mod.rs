//! Metrics module for Prometheus-based monitoring.
//!
//! Tracks samples served, reload outcomes, load durations, pool and user
//! counts, adapter failures and overall readiness.
//!
//! # Example
//!
//! ```ignore
//! use subject_pool::metrics::{init_metrics, export_metrics};
//!
//! init_metrics().expect("Failed to initialize metrics");
//! // ... serve samples ...
//! println!("{}", export_metrics());
//! ```

pub mod collectors;
pub mod prometheus;

pub use collectors::MetricsCollector;
pub use prometheus::{export_metrics, init_metrics};

pub use prometheus::{
    ACTIVE_USERS, ADAPTER_ERRORS_TOTAL, LOAD_DURATION, POOL_SUBJECTS, READY, REGISTRY,
    RELOADS_TOTAL, SAMPLED_SUBJECTS_TOTAL, SAMPLES_TOTAL,
};
