//! Ordered key-value storage for job roots and job events.
//!
//! Jobs and events share one key space keyed by `(JobId, SortKey)`. A job
//! root lives under its own id; events live under their [`SortKey`] and are
//! never rewritten once appended.
//!
//! ## Design Principles
//!
//! - **Conditional writes**: job roots are written with a [`WritePrecondition`]
//!   so concurrent aggregations of the same job cannot overwrite each other
//! - **Idempotent appends**: appending an event whose key already exists is a
//!   normal [`AppendResult::AlreadyExists`], not an error
//! - **Change feed**: every successful write produces a
//!   [`ChangeNotification`](crate::record::ChangeNotification) delivered at
//!   least once to the aggregator

pub mod memory;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use purge_core::{JobId, SortKey};

use crate::error::Result;
use crate::event::JobEvent;
use crate::job::Job;

/// Default number of items per page.
pub const DEFAULT_PAGE_SIZE: usize = 100;

/// Precondition for a job root write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WritePrecondition {
    /// Write only if the root does not exist yet.
    DoesNotExist,
    /// Write only if the root is still at the given version.
    MatchesVersion(u64),
}

/// Result of a conditional job root write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteResult {
    /// The write was applied.
    Success {
        /// Version of the root after the write.
        version: u64,
    },
    /// The precondition did not hold; nothing was written.
    PreconditionFailed {
        /// Version currently stored, or `None` if the root does not exist.
        current_version: Option<u64>,
    },
}

impl WriteResult {
    /// Returns true if the write was applied.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }
}

/// A job root together with its storage version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionedJob {
    /// The stored job.
    pub job: Job,
    /// Version to condition the next write on.
    pub version: u64,
}

/// Result of appending a job event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppendResult {
    /// The event was stored.
    Appended,
    /// An event with the same key was already stored; nothing changed.
    AlreadyExists,
}

/// Order of an event range scan.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ScanDirection {
    /// Oldest event first.
    #[default]
    Ascending,
    /// Newest event first.
    Descending,
}

/// A page request over one job's events.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventPageRequest {
    /// Exclusive cursor: only events strictly after this key (in scan order).
    pub start_after: Option<SortKey>,
    /// Maximum number of events to return.
    pub page_size: usize,
    /// Scan order.
    pub direction: ScanDirection,
}

impl EventPageRequest {
    /// First page of an ascending scan.
    #[must_use]
    pub const fn ascending(page_size: usize) -> Self {
        Self {
            start_after: None,
            page_size,
            direction: ScanDirection::Ascending,
        }
    }

    /// First page of a descending scan.
    #[must_use]
    pub const fn descending(page_size: usize) -> Self {
        Self {
            start_after: None,
            page_size,
            direction: ScanDirection::Descending,
        }
    }

    /// Continues the scan after `cursor`.
    #[must_use]
    pub fn after(mut self, cursor: Option<SortKey>) -> Self {
        self.start_after = cursor;
        self
    }
}

impl Default for EventPageRequest {
    fn default() -> Self {
        Self::ascending(DEFAULT_PAGE_SIZE)
    }
}

/// Position of a job root in the newest-first listing order.
///
/// Jobs are ordered by `CreatedAt` descending, then by id ascending, so the
/// pair is unique even when many jobs share a creation second.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobCursor {
    /// Creation time of the last job on the previous page.
    pub created_at: DateTime<Utc>,
    /// Id of the last job on the previous page.
    pub job_id: JobId,
}

impl JobCursor {
    /// Cursor positioned at `job`.
    #[must_use]
    pub fn at(job: &Job) -> Self {
        Self {
            created_at: job.created_at,
            job_id: job.id.clone(),
        }
    }

    /// Returns true if `job` sorts strictly after this cursor.
    #[must_use]
    pub fn precedes(&self, job: &Job) -> bool {
        job.created_at < self.created_at
            || (job.created_at == self.created_at && job.id > self.job_id)
    }
}

/// A page request over job roots, newest first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobPageRequest {
    /// Exclusive cursor: only jobs listed strictly after this position.
    pub start_before: Option<JobCursor>,
    /// Maximum number of jobs to return.
    pub page_size: usize,
}

impl Default for JobPageRequest {
    fn default() -> Self {
        Self {
            start_before: None,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

/// One page of a paginated query.
#[derive(Debug, Clone, PartialEq)]
pub struct Page<T, C> {
    /// Items in scan order.
    pub items: Vec<T>,
    /// Cursor for the next page, present when this page is full.
    pub next_start: Option<C>,
}

impl<T, C> Page<T, C> {
    /// Returns true if there may be more items after this page.
    #[must_use]
    pub const fn has_more(&self) -> bool {
        self.next_start.is_some()
    }
}

/// Storage abstraction for job roots and events.
///
/// ## Thread Safety
///
/// All methods are `Send + Sync`; aggregations of the same job may run
/// concurrently and rely on [`WritePrecondition::MatchesVersion`] to detect
/// each other.
#[async_trait]
pub trait JobStore: Send + Sync {
    /// Point-reads a job root.
    ///
    /// Returns `None` if the job does not exist.
    async fn get_job(&self, job_id: &JobId) -> Result<Option<VersionedJob>>;

    /// Writes a full job root if `precondition` holds.
    ///
    /// A failed precondition is a normal [`WriteResult::PreconditionFailed`],
    /// never an error.
    async fn put_job(&self, job: &Job, precondition: WritePrecondition) -> Result<WriteResult>;

    /// Appends an event under its sort key.
    async fn append_event(&self, event: &JobEvent) -> Result<AppendResult>;

    /// Reads one page of a job's events in sort-key order.
    async fn query_events(
        &self,
        job_id: &JobId,
        request: &EventPageRequest,
    ) -> Result<Page<JobEvent, SortKey>>;

    /// Reads one page of job roots, newest first.
    async fn list_jobs(&self, request: &JobPageRequest) -> Result<Page<Job, JobCursor>>;
}
