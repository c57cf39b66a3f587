//! In-memory execution engine for testing.
//!
//! Records every start request and remembers execution ids, so a second start
//! with the same id is reported as already existing. No work is run.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use async_trait::async_trait;

use super::{ExecutionEngine, ExecutionRequest, StartResult};
use crate::error::{Error, Result};

#[derive(Debug, Default)]
struct EngineState {
    requests: Vec<ExecutionRequest>,
    executions: HashMap<String, String>,
    failure: Option<String>,
}

/// In-memory execution engine.
///
/// ## Example
///
/// ```rust
/// use purge_jobs::execution::memory::InMemoryExecutionEngine;
///
/// let engine = InMemoryExecutionEngine::new("purge-deletion");
/// assert!(engine.requests().unwrap().is_empty());
/// ```
#[derive(Debug)]
pub struct InMemoryExecutionEngine {
    name: String,
    state: RwLock<EngineState>,
}

impl Default for InMemoryExecutionEngine {
    fn default() -> Self {
        Self::new("default")
    }
}

fn poison_err<T>(_: PoisonError<T>) -> Error {
    Error::execution("execution engine lock poisoned")
}

impl InMemoryExecutionEngine {
    /// Creates an engine for the named workflow.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            state: RwLock::new(EngineState::default()),
        }
    }

    /// Returns every start request received, including duplicates.
    ///
    /// # Errors
    ///
    /// Returns an error if the lock is poisoned.
    pub fn requests(&self) -> Result<Vec<ExecutionRequest>> {
        let state = self.state.read().map_err(poison_err)?;
        Ok(state.requests.clone())
    }

    /// Returns the number of distinct executions started.
    ///
    /// # Errors
    ///
    /// Returns an error if the lock is poisoned.
    pub fn execution_count(&self) -> Result<usize> {
        let state = self.state.read().map_err(poison_err)?;
        Ok(state.executions.len())
    }

    /// Makes every subsequent start fail with `message`, or clears the
    /// failure when `None`.
    ///
    /// # Errors
    ///
    /// Returns an error if the lock is poisoned.
    pub fn set_failure(&self, message: Option<&str>) -> Result<()> {
        let mut state = self.state.write().map_err(poison_err)?;
        state.failure = message.map(str::to_string);
        drop(state);
        Ok(())
    }
}

#[async_trait]
impl ExecutionEngine for InMemoryExecutionEngine {
    async fn start_execution(&self, request: ExecutionRequest) -> Result<StartResult> {
        let mut state = self.state.write().map_err(poison_err)?;
        if let Some(message) = state.failure.clone() {
            drop(state);
            return Err(Error::execution(message));
        }

        state.requests.push(request.clone());
        if let Some(existing) = state.executions.get(&request.execution_id) {
            let execution_ref = existing.clone();
            drop(state);
            return Ok(StartResult::AlreadyExists { execution_ref });
        }

        let execution_ref = format!("{}:{}", self.name, request.execution_id);
        state
            .executions
            .insert(request.execution_id, execution_ref.clone());
        drop(state);
        Ok(StartResult::Started { execution_ref })
    }

    fn engine_name(&self) -> &str {
        &self.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::Job;
    use chrono::Utc;
    use purge_core::JobId;

    fn request(id: &str) -> Result<ExecutionRequest> {
        Ok(ExecutionRequest::for_job(&Job::new(JobId::new(id)?, Utc::now())))
    }

    #[tokio::test]
    async fn start_then_duplicate() -> Result<()> {
        let engine = InMemoryExecutionEngine::new("purge-deletion");

        let first = engine.start_execution(request("j1")?).await?;
        assert_eq!(
            first,
            StartResult::Started {
                execution_ref: "purge-deletion:j1".into()
            }
        );

        let second = engine.start_execution(request("j1")?).await?;
        assert_eq!(
            second,
            StartResult::AlreadyExists {
                execution_ref: "purge-deletion:j1".into()
            }
        );

        assert_eq!(engine.requests()?.len(), 2);
        assert_eq!(engine.execution_count()?, 1);
        Ok(())
    }

    #[tokio::test]
    async fn injected_failure_is_an_error() -> Result<()> {
        let engine = InMemoryExecutionEngine::default();
        engine.set_failure(Some("throttled"))?;

        let result = engine.start_execution(request("j1")?).await;
        assert!(matches!(result, Err(Error::Execution { .. })));
        assert!(engine.requests()?.is_empty());

        engine.set_failure(None)?;
        assert!(engine.start_execution(request("j1")?).await.is_ok());
        Ok(())
    }

    #[test]
    fn engine_name() {
        assert_eq!(InMemoryExecutionEngine::new("wf").engine_name(), "wf");
    }
}
