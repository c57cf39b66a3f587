//! In-memory job store for testing and local processing.
//!
//! This module provides [`InMemoryJobStore`], an implementation of the
//! [`JobStore`] trait that also records a change feed. Every successful write
//! queues a [`ChangeNotification`]; [`InMemoryJobStore::take_changes`] drains
//! the feed in write order.
//!
//! ## Limitations
//!
//! - **NOT suitable for production**: No durability, no cross-process coordination
//! - **No persistence**: All state is lost when the process exits

use std::collections::{BTreeMap, HashMap};
use std::ops::Bound;
use std::sync::{PoisonError, RwLock};

use async_trait::async_trait;

use purge_core::{JobId, SortKey};

use super::{
    AppendResult, EventPageRequest, JobCursor, JobPageRequest, JobStore, Page, ScanDirection,
    VersionedJob, WritePrecondition, WriteResult,
};
use crate::error::{Error, Result};
use crate::event::JobEvent;
use crate::job::Job;
use crate::record::{ChangeNotification, encode_event, encode_job};

#[derive(Debug, Default)]
struct StoreState {
    jobs: HashMap<JobId, VersionedJob>,
    events: HashMap<JobId, BTreeMap<SortKey, JobEvent>>,
    changes: Vec<ChangeNotification>,
}

/// In-memory job store.
///
/// ## Example
///
/// ```rust
/// use purge_jobs::store::memory::InMemoryJobStore;
///
/// let store = InMemoryJobStore::new();
/// assert!(store.take_changes().unwrap().is_empty());
/// ```
#[derive(Debug)]
pub struct InMemoryJobStore {
    state: RwLock<StoreState>,
}

impl Default for InMemoryJobStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Converts a lock poison error to a storage error.
fn poison_err<T>(_: PoisonError<T>) -> Error {
    Error::storage("lock poisoned")
}

fn require_page_size(page_size: usize) -> Result<()> {
    if page_size == 0 {
        return Err(purge_core::Error::InvalidInput("page size must be positive".into()).into());
    }
    Ok(())
}

impl InMemoryJobStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: RwLock::new(StoreState::default()),
        }
    }

    /// Drains the change notifications recorded since the last call.
    ///
    /// # Errors
    ///
    /// Returns an error if the lock is poisoned.
    pub fn take_changes(&self) -> Result<Vec<ChangeNotification>> {
        let mut state = self.state.write().map_err(poison_err)?;
        Ok(std::mem::take(&mut state.changes))
    }

    /// Returns the number of events stored for a job.
    ///
    /// # Errors
    ///
    /// Returns an error if the lock is poisoned.
    pub fn event_count(&self, job_id: &JobId) -> Result<usize> {
        let state = self.state.read().map_err(poison_err)?;
        Ok(state.events.get(job_id).map_or(0, BTreeMap::len))
    }
}

#[async_trait]
impl JobStore for InMemoryJobStore {
    async fn get_job(&self, job_id: &JobId) -> Result<Option<VersionedJob>> {
        let result = {
            let state = self.state.read().map_err(poison_err)?;
            state.jobs.get(job_id).cloned()
        };
        Ok(result)
    }

    async fn put_job(&self, job: &Job, precondition: WritePrecondition) -> Result<WriteResult> {
        let image = encode_job(job)?;
        let mut state = self.state.write().map_err(poison_err)?;
        let current_version = state.jobs.get(&job.id).map(|stored| stored.version);

        let (version, notification) = match (precondition, current_version) {
            (WritePrecondition::DoesNotExist, None) => (1, ChangeNotification::insert(image)),
            (WritePrecondition::MatchesVersion(expected), Some(current)) if expected == current => {
                (current + 1, ChangeNotification::modify(image))
            }
            _ => {
                drop(state);
                return Ok(WriteResult::PreconditionFailed { current_version });
            }
        };

        state.jobs.insert(
            job.id.clone(),
            VersionedJob {
                job: job.clone(),
                version,
            },
        );
        state.changes.push(notification);
        drop(state);
        Ok(WriteResult::Success { version })
    }

    async fn append_event(&self, event: &JobEvent) -> Result<AppendResult> {
        let image = encode_event(event)?;
        let mut state = self.state.write().map_err(poison_err)?;
        let events = state.events.entry(event.job_id.clone()).or_default();
        if events.contains_key(&event.sort_key) {
            drop(state);
            return Ok(AppendResult::AlreadyExists);
        }

        events.insert(event.sort_key.clone(), event.clone());
        state.changes.push(ChangeNotification::insert(image));
        drop(state);
        Ok(AppendResult::Appended)
    }

    async fn query_events(
        &self,
        job_id: &JobId,
        request: &EventPageRequest,
    ) -> Result<Page<JobEvent, SortKey>> {
        require_page_size(request.page_size)?;

        let items: Vec<JobEvent> = {
            let state = self.state.read().map_err(poison_err)?;
            match state.events.get(job_id) {
                None => Vec::new(),
                Some(events) => match (request.direction, &request.start_after) {
                    (ScanDirection::Ascending, None) => {
                        events.values().take(request.page_size).cloned().collect()
                    }
                    (ScanDirection::Ascending, Some(cursor)) => events
                        .range((Bound::Excluded(cursor), Bound::Unbounded))
                        .map(|(_, event)| event)
                        .take(request.page_size)
                        .cloned()
                        .collect(),
                    (ScanDirection::Descending, None) => {
                        events.values().rev().take(request.page_size).cloned().collect()
                    }
                    (ScanDirection::Descending, Some(cursor)) => events
                        .range(..cursor)
                        .rev()
                        .map(|(_, event)| event)
                        .take(request.page_size)
                        .cloned()
                        .collect(),
                },
            }
        };

        let next_start = if items.len() == request.page_size {
            items.last().map(|event| event.sort_key.clone())
        } else {
            None
        };
        Ok(Page { items, next_start })
    }

    async fn list_jobs(&self, request: &JobPageRequest) -> Result<Page<Job, JobCursor>> {
        require_page_size(request.page_size)?;

        let mut jobs: Vec<Job> = {
            let state = self.state.read().map_err(poison_err)?;
            state
                .jobs
                .values()
                .filter(|stored| {
                    request
                        .start_before
                        .as_ref()
                        .is_none_or(|cursor| cursor.precedes(&stored.job))
                })
                .map(|stored| stored.job.clone())
                .collect()
        };

        jobs.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| a.id.cmp(&b.id)));
        jobs.truncate(request.page_size);

        let next_start = if jobs.len() == request.page_size {
            jobs.last().map(JobCursor::at)
        } else {
            None
        };
        Ok(Page {
            items: jobs,
            next_start,
        })
    }
}
