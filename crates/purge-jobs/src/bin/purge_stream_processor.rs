//! Purge stream processor.
//!
//! Reads stored job images (job roots and job events) as JSON lines from
//! stdin, writes them into an in-memory store, folds the resulting change
//! feed until it is drained and prints the final job roots as JSON lines.

use std::sync::Arc;

use serde::Serialize;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::{info, warn};

use purge_core::init_logging;
use purge_jobs::aggregator::StatusAggregator;
use purge_jobs::config::ProcessorConfig;
use purge_jobs::error::Result;
use purge_jobs::execution::memory::InMemoryExecutionEngine;
use purge_jobs::record::{RecordKind, decode_image};
use purge_jobs::store::memory::InMemoryJobStore;
use purge_jobs::store::{AppendResult, JobPageRequest, JobStore, WritePrecondition};

#[derive(Debug, Default, Serialize)]
struct RunSummary {
    records_read: usize,
    records_rejected: usize,
    notifications_processed: usize,
    notifications_failed: usize,
    executions_started: usize,
}

async fn load_records(store: &InMemoryJobStore, summary: &mut RunSummary) -> Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines
        .next_line()
        .await
        .map_err(|e| purge_jobs::error::Error::storage_with_source("failed to read stdin", e))?
    {
        if line.trim().is_empty() {
            continue;
        }
        summary.records_read += 1;

        let image = match serde_json::from_str(&line) {
            Ok(image) => image,
            Err(e) => {
                warn!(line = summary.records_read, error = %e, "skipping invalid JSON");
                summary.records_rejected += 1;
                continue;
            }
        };

        match decode_image(&image) {
            RecordKind::Job(job) => {
                let result = store.put_job(&job, WritePrecondition::DoesNotExist).await?;
                if !result.is_success() {
                    warn!(job_id = %job.id, "duplicate job root ignored");
                }
            }
            RecordKind::JobEvent(event) => {
                if store.append_event(&event).await? == AppendResult::AlreadyExists {
                    warn!(job_id = %event.job_id, sort_key = %event.sort_key, "duplicate event ignored");
                }
            }
            RecordKind::Malformed { reason } => {
                warn!(line = summary.records_read, %reason, "skipping malformed record");
                summary.records_rejected += 1;
            }
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = ProcessorConfig::from_env()?;
    init_logging(config.log_format);

    let store = Arc::new(InMemoryJobStore::new());
    let engine = Arc::new(InMemoryExecutionEngine::new(config.state_machine_name.clone()));
    let aggregator = StatusAggregator::new(store.clone(), engine.clone())
        .with_event_page_size(config.event_page_size);

    let mut summary = RunSummary::default();
    load_records(&store, &mut summary).await?;

    // Our own MODIFY writes are fed back and ignored, so this terminates.
    loop {
        let changes = store.take_changes()?;
        if changes.is_empty() {
            break;
        }
        let report = aggregator.process_batch(&changes).await;
        summary.notifications_processed += changes.len();
        summary.notifications_failed += report.failures.len();
        for failure in &report.failures {
            warn!(index = failure.index, error = %failure.error, "notification failed");
        }
    }
    summary.executions_started = engine.execution_count()?;

    let mut stdout = tokio::io::stdout();
    let mut request = JobPageRequest::default();
    loop {
        let page = store.list_jobs(&request).await?;
        for job in &page.items {
            let mut line = serde_json::to_string(job)?;
            line.push('\n');
            stdout
                .write_all(line.as_bytes())
                .await
                .map_err(|e| purge_jobs::error::Error::storage_with_source("failed to write stdout", e))?;
        }
        match page.next_start {
            Some(cursor) => request.start_before = Some(cursor),
            None => break,
        }
    }
    stdout
        .flush()
        .await
        .map_err(|e| purge_jobs::error::Error::storage_with_source("failed to flush stdout", e))?;

    info!(summary = %serde_json::to_string(&summary)?, "stream processed");
    Ok(())
}
