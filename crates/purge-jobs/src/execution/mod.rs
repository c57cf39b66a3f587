//! Execution engine abstraction.
//!
//! This module provides:
//!
//! - [`ExecutionEngine`]: Trait for starting long-running deletion executions
//! - [`ExecutionRequest`]: Serializable start payload keyed by job id
//! - [`InMemoryExecutionEngine`](memory::InMemoryExecutionEngine): In-memory engine for testing
//!
//! Executions are keyed by the job id. Starting an execution whose id is
//! already known is reported as [`StartResult::AlreadyExists`], which callers
//! treat as success.

pub mod memory;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use purge_core::JobId;

use crate::error::Result;
use crate::job::{Job, JobConfig};

/// Input handed to the deletion workflow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ExecutionInput {
    /// The job being executed.
    pub job_id: JobId,
    /// Execution tuning copied from the job root.
    #[serde(flatten)]
    pub config: JobConfig,
}

/// Request to start one execution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ExecutionRequest {
    /// Execution name; equal to the job id so restarts are detected.
    pub execution_id: String,
    /// Workflow input.
    pub input: ExecutionInput,
}

impl ExecutionRequest {
    /// Builds the start request for a job.
    #[must_use]
    pub fn for_job(job: &Job) -> Self {
        Self {
            execution_id: job.id.to_string(),
            input: ExecutionInput {
                job_id: job.id.clone(),
                config: job.config.clone(),
            },
        }
    }
}

/// Result of starting an execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StartResult {
    /// A new execution was started.
    Started {
        /// Engine-specific reference to the execution.
        execution_ref: String,
    },
    /// An execution with the same id already exists.
    AlreadyExists {
        /// Reference to the existing execution.
        execution_ref: String,
    },
}

/// Engine that runs deletion workflows.
///
/// ## Thread Safety
///
/// All methods are `Send + Sync`; the aggregator may start executions for
/// different jobs concurrently.
#[async_trait]
pub trait ExecutionEngine: Send + Sync {
    /// Starts an execution.
    ///
    /// A duplicate execution id is reported as [`StartResult::AlreadyExists`];
    /// only other failures are errors.
    async fn start_execution(&self, request: ExecutionRequest) -> Result<StartResult>;

    /// Returns the workflow name this engine starts executions of.
    fn engine_name(&self) -> &str;
}
