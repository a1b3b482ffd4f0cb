//! High-level recording interface over the raw Prometheus metrics.
//!
//! Every method is a no-op until [`init_metrics`](super::init_metrics) has
//! run, so library users that never export metrics pay nothing.

use std::time::Duration;

use super::prometheus::{
    ACTIVE_USERS, ADAPTER_ERRORS_TOTAL, LOAD_DURATION, POOL_SUBJECTS, READY, RELOADS_TOTAL,
    SAMPLED_SUBJECTS_TOTAL, SAMPLES_TOTAL,
};
use crate::error::AdapterError;
use crate::sets::SetKind;

/// Metrics collector for sampling engine operations.
///
/// # Example
///
/// ```ignore
/// use subject_pool::metrics::{init_metrics, MetricsCollector};
///
/// init_metrics().expect("Failed to init metrics");
/// let collector = MetricsCollector::new();
/// collector.record_sample("galaxies", SetKind::Random, 5);
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct MetricsCollector;

impl MetricsCollector {
    pub fn new() -> Self {
        Self
    }

    /// Record one served sample and how many subject ids it carried.
    pub fn record_sample(&self, workflow: &str, kind: SetKind, subjects: usize) {
        if let Some(samples) = SAMPLES_TOTAL.get() {
            samples.with_label_values(&[workflow, kind.as_str()]).inc();
        }

        if let Some(sampled) = SAMPLED_SUBJECTS_TOTAL.get() {
            sampled
                .with_label_values(&[workflow])
                .inc_by(subjects as f64);
        }
    }

    /// Record a completed load or reload and the resulting pool size.
    pub fn record_load(&self, workflow: &str, duration: Duration, subjects: usize) {
        if let Some(load_duration) = LOAD_DURATION.get() {
            load_duration
                .with_label_values(&[workflow])
                .observe(duration.as_secs_f64());
        }

        self.set_subjects(workflow, subjects);

        tracing::trace!(
            workflow = workflow,
            duration_ms = duration.as_millis() as u64,
            subjects = subjects,
            "Recorded load metric"
        );
    }

    /// Record the outcome of a reload request ("reloaded" or "skipped").
    pub fn record_reload(&self, workflow: &str, outcome: &str) {
        if let Some(reloads) = RELOADS_TOTAL.get() {
            reloads.with_label_values(&[workflow, outcome]).inc();
        }
    }

    pub fn set_subjects(&self, workflow: &str, subjects: usize) {
        if let Some(pool) = POOL_SUBJECTS.get() {
            pool.with_label_values(&[workflow]).set(subjects as f64);
        }
    }

    pub fn set_users(&self, workflow: &str, users: usize) {
        if let Some(active) = ACTIVE_USERS.get() {
            active.with_label_values(&[workflow]).set(users as f64);
        }
    }

    /// Drop the pool and user series of a workflow that stopped.
    pub fn clear_workflow(&self, workflow: &str) {
        if let Some(pool) = POOL_SUBJECTS.get() {
            let _ = pool.remove_label_values(&[workflow]);
        }
        if let Some(active) = ACTIVE_USERS.get() {
            let _ = active.remove_label_values(&[workflow]);
        }
    }

    /// Record an adapter failure for the given operation.
    pub fn record_adapter_error(&self, operation: &str, error: &AdapterError) {
        if let Some(errors) = ADAPTER_ERRORS_TOTAL.get() {
            errors.with_label_values(&[operation, error.kind()]).inc();
        }
    }

    pub fn set_ready(&self, ready: bool) {
        if let Some(gauge) = READY.get() {
            gauge.set(if ready { 1.0 } else { 0.0 });
        }
    }
}
