//! Event-sourced job status aggregation.
//!
//! The [`StatusAggregator`] consumes the store's change feed one notification
//! at a time:
//!
//! ```text
//! notification ──► INSERT? ──no──► Ignored
//!                    │
//!                    ▼
//!              decode_image
//!          ┌─────────┼──────────┐
//!          ▼         ▼          ▼
//!         Job    JobEvent    Malformed ──► error
//!          │         │
//!          ▼         ▼
//!       trigger   read root ─► transition ─► scan statistics ─► conditional write
//! ```
//!
//! ## Correctness under at-least-once delivery
//!
//! - Statistics are re-derived from the job's full ordered event range on
//!   every fold, with events de-duplicated by sort key
//! - Status transitions are monotone, so an already-folded event is a no-op
//! - The root is written once, conditioned on the version that was read; a
//!   concurrent writer surfaces as [`Error::ConcurrentModification`] and the
//!   redelivered notification recomputes from fresh state
//! - Statistics are computed before the write, so a failed scan writes nothing

use std::sync::Arc;

use tracing::{Instrument, debug, info, warn};

use purge_core::{JobId, job_span};

use crate::error::{Error, Result};
use crate::event::JobEvent;
use crate::execution::ExecutionEngine;
use crate::job::Job;
use crate::metrics::{JobMetrics, TimingGuard};
use crate::record::{ChangeNotification, RecordKind, decode_image};
use crate::statistics::Statistics;
use crate::status::{JobStatus, transition};
use crate::store::{DEFAULT_PAGE_SIZE, EventPageRequest, JobStore, WritePrecondition, WriteResult};
use crate::trigger::{ExecutionTrigger, TriggerOutcome};

/// What processing one notification did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChangeOutcome {
    /// Not an insert; nothing to do.
    Ignored,
    /// A job root was inserted and its execution triggered.
    ExecutionStarted(TriggerOutcome),
    /// A job event changed the job root.
    JobUpdated {
        /// The updated job.
        job_id: JobId,
        /// Status before the event.
        from: JobStatus,
        /// Status after the event.
        to: JobStatus,
    },
    /// A job event was already reflected in the job root.
    Unchanged {
        /// The job the event belongs to.
        job_id: JobId,
    },
}

/// A notification that failed inside a batch.
#[derive(Debug)]
pub struct BatchFailure {
    /// Position of the notification in the batch.
    pub index: usize,
    /// Why it failed.
    pub error: Error,
}

/// Result of processing a batch of notifications.
#[derive(Debug, Default)]
pub struct BatchReport {
    /// Outcomes of the notifications that succeeded, in batch order.
    pub outcomes: Vec<ChangeOutcome>,
    /// Notifications that failed, in batch order.
    pub failures: Vec<BatchFailure>,
}

impl BatchReport {
    /// Returns true if every notification succeeded.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Applies one event to a job root, given the job's re-derived statistics.
///
/// Pure: the returned root differs from `job` only in status, statistics and
/// the start and finish timestamps. Timestamps are set from the event's
/// emission time the first time the status leaves `QUEUED` and the first time
/// it becomes terminal. Under the status lock only statistics change.
#[must_use]
pub fn apply_event(job: &Job, event: &JobEvent, statistics: Statistics) -> Job {
    let status = transition(job.status, event);
    let mut updated = job.clone();
    updated.statistics = statistics;

    if status != job.status {
        updated.status = status;
        if updated.started_at.is_none() && status != JobStatus::Queued {
            updated.started_at = Some(event.emitted_at());
        }
        if updated.finished_at.is_none() && status.is_terminal() {
            updated.finished_at = Some(event.emitted_at());
        }
    }
    updated
}

/// Folds the store's change feed into job roots.
#[derive(Clone)]
pub struct StatusAggregator {
    store: Arc<dyn JobStore>,
    trigger: ExecutionTrigger,
    event_page_size: usize,
    metrics: JobMetrics,
}

impl std::fmt::Debug for StatusAggregator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StatusAggregator")
            .field("trigger", &self.trigger)
            .field("event_page_size", &self.event_page_size)
            .finish_non_exhaustive()
    }
}

impl StatusAggregator {
    /// Creates an aggregator over `store` that starts executions on `engine`.
    #[must_use]
    pub fn new(store: Arc<dyn JobStore>, engine: Arc<dyn ExecutionEngine>) -> Self {
        Self {
            store,
            trigger: ExecutionTrigger::new(engine),
            event_page_size: DEFAULT_PAGE_SIZE,
            metrics: JobMetrics::new(),
        }
    }

    /// Sets how many events each statistics scan page reads.
    #[must_use]
    pub fn with_event_page_size(mut self, page_size: usize) -> Self {
        self.event_page_size = page_size.max(1);
        self
    }

    /// Processes one change notification.
    ///
    /// Safe to call more than once with the same notification.
    ///
    /// # Errors
    ///
    /// - [`Error::MalformedRecord`] if the inserted record is neither a job
    ///   root nor a job event
    /// - [`Error::JobNotFound`] if an event's job root does not exist
    /// - [`Error::ConcurrentModification`] if the root changed while folding
    /// - [`Error::Storage`] or [`Error::Execution`] from the collaborators
    ///
    /// Nothing is written when an error is returned.
    #[tracing::instrument(skip_all, fields(operation = ?notification.operation))]
    pub async fn on_change(&self, notification: &ChangeNotification) -> Result<ChangeOutcome> {
        if !notification.is_insert() {
            debug!("ignoring non-insert notification");
            self.metrics.record_notification("ignored", "ok");
            return Ok(ChangeOutcome::Ignored);
        }

        let kind = match &notification.new_image {
            Some(image) => decode_image(image),
            None => RecordKind::Malformed {
                reason: "insert without a new image".into(),
            },
        };

        let label = match &kind {
            RecordKind::Job(_) => "job",
            RecordKind::JobEvent(_) => "job_event",
            RecordKind::Malformed { .. } => "malformed",
        };
        let metrics = self.metrics;
        let _timer = TimingGuard::new(move |duration| {
            metrics.observe_notification_duration(label, duration);
        });

        let result = match kind {
            RecordKind::Job(job) => self
                .trigger
                .start(&job)
                .await
                .map(ChangeOutcome::ExecutionStarted),
            RecordKind::JobEvent(event) => {
                let span = job_span("fold_event", event.job_id.as_str());
                self.fold_event(&event).instrument(span).await
            }
            RecordKind::Malformed { reason } => {
                warn!(%reason, "malformed record");
                Err(Error::MalformedRecord { reason })
            }
        };

        self.metrics
            .record_notification(label, if result.is_ok() { "ok" } else { "error" });
        result
    }

    /// Processes notifications in order.
    ///
    /// A failed notification is recorded in the report and does not stop the
    /// ones after it.
    pub async fn process_batch(&self, notifications: &[ChangeNotification]) -> BatchReport {
        let mut report = BatchReport::default();
        for (index, notification) in notifications.iter().enumerate() {
            match self.on_change(notification).await {
                Ok(outcome) => report.outcomes.push(outcome),
                Err(error) => {
                    warn!(index, error = %error, "notification failed");
                    report.failures.push(BatchFailure { index, error });
                }
            }
        }
        report
    }

    async fn fold_event(&self, event: &JobEvent) -> Result<ChangeOutcome> {
        let stored = self
            .store
            .get_job(&event.job_id)
            .await?
            .ok_or_else(|| Error::JobNotFound {
                job_id: event.job_id.clone(),
            })?;

        let statistics = self.scan_statistics(event).await?;
        let updated = apply_event(&stored.job, event, statistics);

        if updated == stored.job {
            debug!(event = %event.event_type, "event already reflected in job");
            return Ok(ChangeOutcome::Unchanged {
                job_id: event.job_id.clone(),
            });
        }

        let precondition = WritePrecondition::MatchesVersion(stored.version);
        match self.store.put_job(&updated, precondition).await? {
            WriteResult::Success { version } => {
                let (from, to) = (stored.job.status, updated.status);
                if from != to {
                    self.metrics
                        .record_status_transition(from.as_str(), to.as_str());
                }
                info!(event = %event.event_type, %from, %to, version, "updated job");
                Ok(ChangeOutcome::JobUpdated {
                    job_id: event.job_id.clone(),
                    from,
                    to,
                })
            }
            WriteResult::PreconditionFailed { current_version } => {
                self.metrics.record_root_conflict();
                warn!(expected = stored.version, actual = ?current_version, "job root changed concurrently");
                Err(Error::ConcurrentModification {
                    job_id: event.job_id.clone(),
                    expected: stored.version,
                    actual: current_version,
                })
            }
        }
    }

    /// Re-derives statistics from the job's full event range.
    ///
    /// The notified event is always included, even if the scan does not see
    /// it yet.
    async fn scan_statistics(&self, event: &JobEvent) -> Result<Statistics> {
        let mut events = Vec::new();
        let mut request = EventPageRequest::ascending(self.event_page_size);
        loop {
            let page = self.store.query_events(&event.job_id, &request).await?;
            events.extend(page.items);
            match page.next_start {
                Some(cursor) => request = request.after(Some(cursor)),
                None => break,
            }
        }

        self.metrics.observe_scan_size(events.len());
        events.push(event.clone());
        Ok(Statistics::from_events(&events))
    }
}
