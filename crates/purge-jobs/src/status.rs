//! Job status and the status transition engine.
//!
//! [`transition`] is a pure, total mapping from the current status and an
//! incoming event to the next status. It never consults storage.
//!
//! ## Lattice
//!
//! ```text
//!   QUEUED ──► RUNNING ──► COMPLETED ──► COMPLETED_CLEANUP_FAILED
//!     │           │
//!     └─────┬─────┘
//!           ▼
//!   FIND_FAILED | FORGET_FAILED | FAILED      (locked)
//! ```
//!
//! Transitions only move forward along the arrows. Re-applying an event that
//! is already reflected in the status is therefore a no-op, which keeps the
//! fold idempotent under at-least-once delivery.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::event::{EventType, JobEvent};

/// Lifecycle status of a deletion job.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobStatus {
    /// Submitted, execution not yet reported as started.
    #[default]
    Queued,
    /// The deletion workflow is running.
    Running,
    /// The find phase failed.
    FindFailed,
    /// The forget phase failed.
    ForgetFailed,
    /// The workflow failed outside a specific phase.
    Failed,
    /// All phases and cleanup succeeded.
    Completed,
    /// Deletion succeeded but cleanup afterwards failed.
    CompletedCleanupFailed,
}

impl JobStatus {
    /// Every status.
    pub const ALL: [Self; 7] = [
        Self::Queued,
        Self::Running,
        Self::FindFailed,
        Self::ForgetFailed,
        Self::Failed,
        Self::Completed,
        Self::CompletedCleanupFailed,
    ];

    /// Returns true if the status is hard-failed.
    ///
    /// A locked status is never changed by a subsequent event.
    #[must_use]
    pub const fn is_locked(&self) -> bool {
        matches!(self, Self::FindFailed | Self::ForgetFailed | Self::Failed)
    }

    /// Returns true if the job has finished, successfully or not.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        self.is_locked() || matches!(self, Self::Completed | Self::CompletedCleanupFailed)
    }

    /// Returns the wire name of the status.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Queued => "QUEUED",
            Self::Running => "RUNNING",
            Self::FindFailed => "FIND_FAILED",
            Self::ForgetFailed => "FORGET_FAILED",
            Self::Failed => "FAILED",
            Self::Completed => "COMPLETED",
            Self::CompletedCleanupFailed => "COMPLETED_CLEANUP_FAILED",
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| format!("invalid job status: {s}"))
    }
}

/// What an event asks of the status, before the current status is considered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StatusEffect {
    /// Statistics only.
    None,
    /// Work is in progress.
    Progress,
    /// The job finished successfully.
    Succeed,
    /// Cleanup after a successful deletion failed.
    CleanupFailed,
    /// The job failed with the given status.
    Fail(JobStatus),
}

fn status_effect(event_type: &EventType, reports_error: bool) -> StatusEffect {
    let effect = match event_type {
        EventType::JobStarted
        | EventType::FindPhaseStarted
        | EventType::FindPhaseEnded
        | EventType::ForgetPhaseStarted
        | EventType::ForgetPhaseEnded => StatusEffect::Progress,
        EventType::FindPhaseFailed => StatusEffect::Fail(JobStatus::FindFailed),
        EventType::ForgetPhaseFailed => StatusEffect::Fail(JobStatus::ForgetFailed),
        EventType::Exception => StatusEffect::Fail(JobStatus::Failed),
        EventType::JobSucceeded | EventType::CleanupSucceeded => StatusEffect::Succeed,
        EventType::CleanupFailed => StatusEffect::CleanupFailed,
        EventType::QuerySucceeded
        | EventType::QueryFailed
        | EventType::ObjectUpdated
        | EventType::ObjectUpdateFailed
        | EventType::Other(_) => StatusEffect::None,
    };

    match effect {
        StatusEffect::Fail(_) | StatusEffect::CleanupFailed => effect,
        _ if reports_error => StatusEffect::Fail(JobStatus::Failed),
        _ => effect,
    }
}

/// Computes the status after applying `event` to a job in `current`.
///
/// Locked statuses are returned unchanged. Unknown event types and
/// statistics-only events never change the status.
#[must_use]
pub fn transition(current: JobStatus, event: &JobEvent) -> JobStatus {
    transition_for(current, &event.event_type, event.reports_error())
}

/// Computes the status after an event of `event_type`.
///
/// `reports_error` is true when the event payload carries an error, which
/// turns any non-failure event into a generic failure.
#[must_use]
pub fn transition_for(current: JobStatus, event_type: &EventType, reports_error: bool) -> JobStatus {
    if current.is_locked() {
        return current;
    }

    match (current, status_effect(event_type, reports_error)) {
        (JobStatus::Queued, StatusEffect::Progress) => JobStatus::Running,
        (JobStatus::Queued | JobStatus::Running, StatusEffect::Succeed) => JobStatus::Completed,
        (
            JobStatus::Queued | JobStatus::Running | JobStatus::Completed,
            StatusEffect::CleanupFailed,
        ) => JobStatus::CompletedCleanupFailed,
        (JobStatus::Queued | JobStatus::Running, StatusEffect::Fail(failed)) => failed,
        (current, _) => current,
    }
}
