//! # purge-jobs
//!
//! Event-sourced status aggregation for deletion jobs.
//!
//! A deletion job is submitted as a job root and then reported on by a stream
//! of immutable lifecycle events. This crate folds that stream, delivered at
//! least once and possibly duplicated, into each job's current status and
//! statistics.
//!
//! - **Status Aggregator**: consumes store change notifications and writes the
//!   folded status and statistics back onto the job root
//! - **Status Transitions**: a pure, monotone mapping from status and event to
//!   the next status, with hard failures locked
//! - **Execution Trigger**: starts one deletion execution per job, absorbing
//!   duplicate starts
//! - **Query Generation**: expands data mappers and the deletion queue into
//!   find-phase query descriptors
//!
//! ## Guarantees
//!
//! - **Idempotent**: re-delivering any notification leaves the job unchanged
//! - **Locked failures**: once a job has hard-failed its status never changes
//! - **All or nothing**: status and statistics are committed in one
//!   conditional write, or not at all
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use chrono::Utc;
//! use purge_core::JobId;
//! use purge_jobs::prelude::*;
//!
//! # async fn run() -> purge_jobs::error::Result<()> {
//! let store = Arc::new(InMemoryJobStore::new());
//! let engine = Arc::new(InMemoryExecutionEngine::new("purge-deletion"));
//! let aggregator = StatusAggregator::new(store.clone(), engine);
//!
//! let job = Job::new(JobId::new("job-1")?, Utc::now());
//! store.put_job(&job, WritePrecondition::DoesNotExist).await?;
//! store
//!     .append_event(&JobEvent::new(job.id.clone(), EventType::JobStarted, EventData::new()))
//!     .await?;
//!
//! let report = aggregator.process_batch(&store.take_changes()?).await;
//! assert!(report.is_success());
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(rust_2018_idioms)]
#![warn(clippy::pedantic)]

pub mod aggregator;
pub mod config;
pub mod error;
pub mod event;
pub mod execution;
pub mod job;
pub mod metrics;
pub mod queries;
pub mod record;
pub mod statistics;
pub mod status;
pub mod store;
pub mod trigger;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::aggregator::{BatchReport, ChangeOutcome, StatusAggregator, apply_event};
    pub use crate::error::{Error, Result};
    pub use crate::event::{EventData, EventType, JobEvent};
    pub use crate::execution::memory::InMemoryExecutionEngine;
    pub use crate::execution::{ExecutionEngine, ExecutionRequest, StartResult};
    pub use crate::job::{Job, JobConfig};
    pub use crate::record::{ChangeNotification, Operation, RecordKind, decode_image};
    pub use crate::statistics::Statistics;
    pub use crate::status::{JobStatus, transition};
    pub use crate::store::memory::InMemoryJobStore;
    pub use crate::store::{
        AppendResult, EventPageRequest, JobCursor, JobPageRequest, JobStore, Page,
        WritePrecondition, WriteResult,
    };
    pub use crate::trigger::{ExecutionTrigger, TriggerOutcome};
}
