//! Prometheus metrics registration and export.
//!
//! This module defines all Prometheus metrics used by subject_pool and
//! provides functions for initializing, registering, and exporting them.

use prometheus::{
    CounterVec, Encoder, Gauge, GaugeVec, HistogramOpts, HistogramVec, Opts, Registry,
    TextEncoder,
};
use std::sync::{Mutex, OnceLock, PoisonError};

/// Global Prometheus registry for all subject_pool metrics.
pub static REGISTRY: OnceLock<Registry> = OnceLock::new();

/// Samples served, labeled by workflow and sampling mode.
pub static SAMPLES_TOTAL: OnceLock<CounterVec> = OnceLock::new();

/// Subjects handed out, labeled by workflow.
pub static SAMPLED_SUBJECTS_TOTAL: OnceLock<CounterVec> = OnceLock::new();

/// Reload requests, labeled by workflow and outcome (reloaded/skipped).
pub static RELOADS_TOTAL: OnceLock<CounterVec> = OnceLock::new();

/// Duration of adapter loads in seconds, labeled by workflow.
pub static LOAD_DURATION: OnceLock<HistogramVec> = OnceLock::new();

/// Current pool size, labeled by workflow.
pub static POOL_SUBJECTS: OnceLock<GaugeVec> = OnceLock::new();

/// Current number of live users, labeled by workflow.
pub static ACTIVE_USERS: OnceLock<GaugeVec> = OnceLock::new();

/// Adapter failures, labeled by operation and error kind.
pub static ADAPTER_ERRORS_TOTAL: OnceLock<CounterVec> = OnceLock::new();

/// 1 when every registered workflow is ready, 0 otherwise.
pub static READY: OnceLock<Gauge> = OnceLock::new();

static INIT_LOCK: Mutex<()> = Mutex::new(());

/// Initialize all metrics and register them with the registry.
///
/// Call once at startup. Calling it again is harmless: the first set of
/// metrics stays installed.
///
/// # Errors
///
/// Returns a `prometheus::Error` if metric creation or registration fails.
pub fn init_metrics() -> Result<(), prometheus::Error> {
    let _guard = INIT_LOCK.lock().unwrap_or_else(PoisonError::into_inner);
    if REGISTRY.get().is_some() {
        return Ok(());
    }

    let registry = Registry::new();

    let samples_total = CounterVec::new(
        Opts::new("subject_pool_samples_total", "Total samples served"),
        &["workflow", "mode"],
    )?;

    let sampled_subjects_total = CounterVec::new(
        Opts::new(
            "subject_pool_sampled_subjects_total",
            "Total subject ids handed out",
        ),
        &["workflow"],
    )?;

    let reloads_total = CounterVec::new(
        Opts::new("subject_pool_reloads_total", "Total reload requests"),
        &["workflow", "outcome"],
    )?;

    let load_duration = HistogramVec::new(
        HistogramOpts::new(
            "subject_pool_load_duration_seconds",
            "Adapter load duration in seconds",
        )
        .buckets(vec![0.01, 0.05, 0.1, 0.5, 1.0, 5.0, 30.0, 120.0]),
        &["workflow"],
    )?;

    let pool_subjects = GaugeVec::new(
        Opts::new("subject_pool_subjects", "Subjects in the pool"),
        &["workflow"],
    )?;

    let active_users = GaugeVec::new(
        Opts::new("subject_pool_users", "Live users per workflow"),
        &["workflow"],
    )?;

    let adapter_errors_total = CounterVec::new(
        Opts::new("subject_pool_adapter_errors_total", "Total adapter failures"),
        &["operation", "kind"],
    )?;

    let ready = Gauge::new(
        "subject_pool_workflows_ready",
        "Whether every registered workflow is ready",
    )?;

    registry.register(Box::new(samples_total.clone()))?;
    registry.register(Box::new(sampled_subjects_total.clone()))?;
    registry.register(Box::new(reloads_total.clone()))?;
    registry.register(Box::new(load_duration.clone()))?;
    registry.register(Box::new(pool_subjects.clone()))?;
    registry.register(Box::new(active_users.clone()))?;
    registry.register(Box::new(adapter_errors_total.clone()))?;
    registry.register(Box::new(ready.clone()))?;

    // REGISTRY is set last: once it is visible every metric is installed
    let _ = SAMPLES_TOTAL.set(samples_total);
    let _ = SAMPLED_SUBJECTS_TOTAL.set(sampled_subjects_total);
    let _ = RELOADS_TOTAL.set(reloads_total);
    let _ = LOAD_DURATION.set(load_duration);
    let _ = POOL_SUBJECTS.set(pool_subjects);
    let _ = ACTIVE_USERS.set(active_users);
    let _ = ADAPTER_ERRORS_TOTAL.set(adapter_errors_total);
    let _ = READY.set(ready);
    let _ = REGISTRY.set(registry);

    tracing::info!("Prometheus metrics initialized successfully");

    Ok(())
}

/// Export all registered metrics in Prometheus text format.
///
/// Returns an explanatory comment line instead when metrics were never
/// initialized or encoding fails.
pub fn export_metrics() -> String {
    let Some(registry) = REGISTRY.get() else {
        return "# Metrics not initialized. Call init_metrics() first.\n".to_string();
    };

    let encoder = TextEncoder::new();
    let metric_families = registry.gather();

    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        return format!("# Error encoding metrics: {}\n", e);
    }

    String::from_utf8(buffer)
        .unwrap_or_else(|e| format!("# Error converting metrics to UTF-8: {}\n", e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_metrics_is_idempotent() {
        assert!(init_metrics().is_ok());
        assert!(init_metrics().is_ok());
        assert!(REGISTRY.get().is_some());
    }

    #[test]
    fn test_metrics_after_init() {
        let _ = init_metrics();

        if let Some(samples) = SAMPLES_TOTAL.get() {
            samples.with_label_values(&["export-test", "random"]).inc();
        }

        let metrics = export_metrics();
        assert!(!metrics.starts_with("# Error"));
        assert!(metrics.contains("subject_pool_samples_total"));
    }
}
