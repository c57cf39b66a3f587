//! Starts the deletion workflow for newly inserted jobs.

use std::sync::Arc;

use tracing::{info, warn};

use crate::error::Result;
use crate::execution::{ExecutionEngine, ExecutionRequest, StartResult};
use crate::job::Job;
use crate::metrics::JobMetrics;

/// Outcome of triggering a job's execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TriggerOutcome {
    /// A new execution was started.
    Started {
        /// Engine reference to the execution.
        execution_ref: String,
    },
    /// The execution had already been started by an earlier delivery.
    AlreadyRunning {
        /// Engine reference to the existing execution.
        execution_ref: String,
    },
}

/// Starts one execution per job, keyed by the job id.
///
/// Redelivered job insertions hit the engine again and are absorbed as
/// [`TriggerOutcome::AlreadyRunning`].
#[derive(Clone)]
pub struct ExecutionTrigger {
    engine: Arc<dyn ExecutionEngine>,
    metrics: JobMetrics,
}

impl std::fmt::Debug for ExecutionTrigger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecutionTrigger")
            .field("engine", &self.engine.engine_name())
            .finish_non_exhaustive()
    }
}

impl ExecutionTrigger {
    /// Creates a trigger over `engine`.
    #[must_use]
    pub fn new(engine: Arc<dyn ExecutionEngine>) -> Self {
        Self {
            engine,
            metrics: JobMetrics::new(),
        }
    }

    /// Starts the execution for `job`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Execution`](crate::error::Error::Execution) if the
    /// engine fails for any reason other than an existing execution.
    #[tracing::instrument(skip(self, job), fields(job_id = %job.id, engine = self.engine.engine_name()))]
    pub async fn start(&self, job: &Job) -> Result<TriggerOutcome> {
        let request = ExecutionRequest::for_job(job);
        let result = match self.engine.start_execution(request).await {
            Ok(result) => result,
            Err(e) => {
                warn!(error = %e, "failed to start execution");
                self.metrics.record_execution_start("error");
                return Err(e);
            }
        };

        match result {
            StartResult::Started { execution_ref } => {
                info!(%execution_ref, "started execution");
                self.metrics.record_execution_start("started");
                Ok(TriggerOutcome::Started { execution_ref })
            }
            StartResult::AlreadyExists { execution_ref } => {
                info!(%execution_ref, "execution already running");
                self.metrics.record_execution_start("already_running");
                Ok(TriggerOutcome::AlreadyRunning { execution_ref })
            }
        }
    }
}
