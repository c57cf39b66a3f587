//! Metrics for job status aggregation.
//!
//! Recorded through the `metrics` crate facade; without an installed recorder
//! every call is a no-op.
//!
//! | Metric | Type | Labels | Description |
//! |--------|------|--------|-------------|
//! | `purge_notifications_total` | Counter | `kind`, `result` | Change notifications by record kind and outcome |
//! | `purge_job_status_transitions_total` | Counter | `from_status`, `to_status` | Job status changes written |
//! | `purge_execution_starts_total` | Counter | `result` | Execution start attempts |
//! | `purge_notification_duration_seconds` | Histogram | `kind` | Time to process one notification |
//! | `purge_statistics_scan_events` | Histogram | - | Events read per statistics scan |
//! | `purge_root_conflicts_total` | Counter | - | Conditional root writes lost to a concurrent writer |

use std::time::{Duration, Instant};

use metrics::{counter, histogram};

/// Metric names.
pub mod names {
    /// Counter: change notifications by kind and outcome.
    pub const NOTIFICATIONS_TOTAL: &str = "purge_notifications_total";
    /// Counter: job status changes written.
    pub const STATUS_TRANSITIONS_TOTAL: &str = "purge_job_status_transitions_total";
    /// Counter: execution start attempts.
    pub const EXECUTION_STARTS_TOTAL: &str = "purge_execution_starts_total";
    /// Histogram: notification processing time in seconds.
    pub const NOTIFICATION_DURATION_SECONDS: &str = "purge_notification_duration_seconds";
    /// Histogram: events read per statistics scan.
    pub const STATISTICS_SCAN_EVENTS: &str = "purge_statistics_scan_events";
    /// Counter: conditional root writes that lost a race.
    pub const ROOT_CONFLICTS_TOTAL: &str = "purge_root_conflicts_total";
}

/// Label keys.
pub mod labels {
    /// Record kind (job, job_event, ignored, malformed).
    pub const KIND: &str = "kind";
    /// Outcome (ok, error, started, already_running).
    pub const RESULT: &str = "result";
    /// Status before a transition.
    pub const FROM_STATUS: &str = "from_status";
    /// Status after a transition.
    pub const TO_STATUS: &str = "to_status";
}

/// Recorder for aggregation metrics.
#[derive(Debug, Clone, Copy, Default)]
pub struct JobMetrics;

impl JobMetrics {
    /// Creates a new metrics recorder.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Records a processed notification.
    pub fn record_notification(&self, kind: &'static str, result: &'static str) {
        counter!(
            names::NOTIFICATIONS_TOTAL,
            labels::KIND => kind,
            labels::RESULT => result,
        )
        .increment(1);
    }

    /// Records a job status change.
    pub fn record_status_transition(&self, from_status: &str, to_status: &str) {
        counter!(
            names::STATUS_TRANSITIONS_TOTAL,
            labels::FROM_STATUS => from_status.to_string(),
            labels::TO_STATUS => to_status.to_string(),
        )
        .increment(1);
    }

    /// Records an execution start attempt.
    pub fn record_execution_start(&self, result: &'static str) {
        counter!(names::EXECUTION_STARTS_TOTAL, labels::RESULT => result).increment(1);
    }

    /// Records how long one notification took.
    pub fn observe_notification_duration(&self, kind: &'static str, duration: Duration) {
        histogram!(names::NOTIFICATION_DURATION_SECONDS, labels::KIND => kind)
            .record(duration.as_secs_f64());
    }

    /// Records the size of a statistics scan.
    #[allow(clippy::cast_precision_loss)] // Event counts per job are small
    pub fn observe_scan_size(&self, events: usize) {
        histogram!(names::STATISTICS_SCAN_EVENTS).record(events as f64);
    }

    /// Records a lost conditional write.
    pub fn record_root_conflict(&self) {
        counter!(names::ROOT_CONFLICTS_TOTAL).increment(1);
    }
}

/// RAII guard for timing operations.
///
/// Calls `on_drop` with the elapsed time when dropped.
///
/// ## Example
///
/// ```rust
/// use purge_jobs::metrics::{JobMetrics, TimingGuard};
///
/// let metrics = JobMetrics::new();
/// {
///     let _guard = TimingGuard::new(|duration| {
///         metrics.observe_notification_duration("job_event", duration);
///     });
///     // Process notification...
/// }
/// ```
pub struct TimingGuard<F>
where
    F: FnOnce(Duration),
{
    start: Instant,
    on_drop: Option<F>,
}

impl<F> TimingGuard<F>
where
    F: FnOnce(Duration),
{
    /// Creates a guard that reports the elapsed time to `on_drop`.
    pub fn new(on_drop: F) -> Self {
        Self {
            start: Instant::now(),
            on_drop: Some(on_drop),
        }
    }

    /// Returns the elapsed time since the guard was created.
    #[must_use]
    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }
}

impl<F> Drop for TimingGuard<F>
where
    F: FnOnce(Duration),
{
    fn drop(&mut self) {
        if let Some(f) = self.on_drop.take() {
            f(self.start.elapsed());
        }
    }
}
