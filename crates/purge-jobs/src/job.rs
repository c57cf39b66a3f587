//! Deletion job root records.
//!
//! A job root is stored under its own id as sort key. It is created once by
//! the submitter and afterwards only rewritten by the status aggregator, which
//! owns `JobStatus`, `JobStats`, `JobStartTime` and `JobFinishTime`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use purge_core::JobId;

use crate::statistics::Statistics;
use crate::status::JobStatus;

/// Execution tuning carried on the job root and passed verbatim to the
/// execution engine.
///
/// The named fields are the ones the workflow is known to read. Any other
/// attribute on the root is kept in `extra` and forwarded unchanged.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct JobConfig {
    /// Maximum concurrent find queries.
    #[serde(
        default,
        deserialize_with = "wire::u32_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub query_concurrency_limit: Option<u32>,
    /// Maximum concurrent forget tasks.
    #[serde(
        default,
        deserialize_with = "wire::u32_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub deletion_tasks_max_number: Option<u32>,
    /// Seconds to wait between query execution polls.
    #[serde(
        default,
        deserialize_with = "wire::u32_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub wait_duration_query_execution: Option<u32>,
    /// Seconds to wait between query queue polls.
    #[serde(
        default,
        deserialize_with = "wire::u32_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub wait_duration_query_queue: Option<u32>,
    /// Seconds to wait between forget queue polls.
    #[serde(
        default,
        deserialize_with = "wire::u32_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub wait_duration_forget_queue: Option<u32>,
    /// Attributes the aggregator does not interpret.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Root record of a deletion job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Job {
    /// Unique job identifier.
    pub id: JobId,
    /// Current lifecycle status.
    #[serde(rename = "JobStatus", default)]
    pub status: JobStatus,
    /// Statistics folded from the job's events.
    #[serde(rename = "JobStats", default)]
    pub statistics: Statistics,
    /// When the job was submitted.
    #[serde(
        serialize_with = "chrono::serde::ts_seconds::serialize",
        deserialize_with = "wire::epoch_seconds"
    )]
    pub created_at: DateTime<Utc>,
    /// Emission time of the event that started the job.
    #[serde(
        rename = "JobStartTime",
        default,
        serialize_with = "chrono::serde::ts_seconds_option::serialize",
        deserialize_with = "wire::epoch_seconds_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub started_at: Option<DateTime<Utc>>,
    /// Emission time of the event that finished the job.
    #[serde(
        rename = "JobFinishTime",
        default,
        serialize_with = "chrono::serde::ts_seconds_option::serialize",
        deserialize_with = "wire::epoch_seconds_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub finished_at: Option<DateTime<Utc>>,
    /// Execution tuning.
    #[serde(flatten)]
    pub config: JobConfig,
}

impl Job {
    /// Creates a queued job with default configuration.
    #[must_use]
    pub fn new(id: JobId, created_at: DateTime<Utc>) -> Self {
        Self {
            id,
            status: JobStatus::Queued,
            statistics: Statistics::new(),
            created_at,
            started_at: None,
            finished_at: None,
            config: JobConfig::default(),
        }
    }

    /// Sets the execution configuration.
    #[must_use]
    pub fn with_config(mut self, config: JobConfig) -> Self {
        self.config = config;
        self
    }
}

/// Numeric attributes arrive either as integers or as integral decimals
/// such as `123.0`.
mod wire {
    use chrono::{DateTime, Utc};
    use serde::{Deserialize, Deserializer};
    use serde_json::Number;

    const MAX_EXACT: f64 = 9.0e15;

    #[allow(clippy::cast_possible_truncation, clippy::float_cmp)]
    fn integral<E: serde::de::Error>(number: &Number) -> Result<i64, E> {
        if let Some(value) = number.as_i64() {
            return Ok(value);
        }
        match number.as_f64() {
            Some(value) if value.trunc() == value && (-MAX_EXACT..=MAX_EXACT).contains(&value) => {
                Ok(value as i64)
            }
            _ => Err(E::custom(format!("expected an integral number, got {number}"))),
        }
    }

    fn to_datetime<E: serde::de::Error>(number: &Number) -> Result<DateTime<Utc>, E> {
        let secs = integral::<E>(number)?;
        DateTime::from_timestamp(secs, 0)
            .ok_or_else(|| E::custom(format!("timestamp {secs} is out of range")))
    }

    pub(super) fn epoch_seconds<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
    where
        D: Deserializer<'de>,
    {
        to_datetime(&Number::deserialize(deserializer)?)
    }

    pub(super) fn epoch_seconds_option<'de, D>(
        deserializer: D,
    ) -> Result<Option<DateTime<Utc>>, D::Error>
    where
        D: Deserializer<'de>,
    {
        Option::<Number>::deserialize(deserializer)?
            .map(|number| to_datetime(&number))
            .transpose()
    }

    pub(super) fn u32_option<'de, D>(deserializer: D) -> Result<Option<u32>, D::Error>
    where
        D: Deserializer<'de>,
    {
        Option::<Number>::deserialize(deserializer)?
            .map(|number| {
                let value = integral::<D::Error>(&number)?;
                u32::try_from(value).map_err(|_| {
                    <D::Error as serde::de::Error>::custom(format!("{value} does not fit in u32"))
                })
            })
            .transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    #[test]
    fn new_job_is_queued() {
        let job = Job::new(JobId::new("j1").unwrap(), Utc::now());
        assert_eq!(job.status, JobStatus::Queued);
        assert!(job.statistics.is_empty());
        assert!(job.started_at.is_none());
    }

    #[test]
    fn serializes_wire_names() {
        let job = Job::new(
            JobId::new("j1").unwrap(),
            Utc.timestamp_opt(1_576_861_489, 0).unwrap(),
        )
        .with_config(JobConfig {
            deletion_tasks_max_number: Some(3),
            ..JobConfig::default()
        });

        let value = serde_json::to_value(&job).unwrap();
        assert_eq!(
            value,
            json!({
                "Id": "j1",
                "JobStatus": "QUEUED",
                "JobStats": {},
                "CreatedAt": 1_576_861_489,
                "DeletionTasksMaxNumber": 3
            })
        );
    }

    #[test]
    fn deserializes_minimal_root() {
        let job: Job = serde_json::from_value(json!({
            "Id": "j1",
            "Sk": "j1",
            "Type": "Job",
            "CreatedAt": 100,
            "QueryConcurrencyLimit": 5,
            "JobStartTime": 110
        }))
        .unwrap();

        assert_eq!(job.status, JobStatus::Queued);
        assert_eq!(job.config.query_concurrency_limit, Some(5));
        assert_eq!(job.started_at.map(|t| t.timestamp()), Some(110));
        assert!(job.finished_at.is_none());
    }

    #[test]
    fn accepts_integral_decimals() {
        let job: Job = serde_json::from_value(json!({
            "Id": "job123",
            "CreatedAt": 123.0,
            "JobFinishTime": 150.0,
            "DeletionTasksMaxNumber": 50.0
        }))
        .unwrap();

        assert_eq!(job.created_at.timestamp(), 123);
        assert_eq!(job.finished_at.map(|t| t.timestamp()), Some(150));
        assert_eq!(job.config.deletion_tasks_max_number, Some(50));
    }

    #[test]
    fn rejects_fractional_timestamps() {
        let result = serde_json::from_value::<Job>(json!({"Id": "j1", "CreatedAt": 123.5}));
        assert!(result.is_err());
    }

    #[test]
    fn unknown_attributes_are_kept() {
        let value = json!({
            "Id": "job123",
            "CreatedAt": 123,
            "AthenaConcurrencyLimit": 15,
            "DeletionTasksMaxNumber": 50
        });
        let job: Job = serde_json::from_value(value).unwrap();

        assert_eq!(job.config.extra.get("AthenaConcurrencyLimit"), Some(&json!(15)));
        assert_eq!(serde_json::to_value(&job).unwrap()["AthenaConcurrencyLimit"], 15);
    }
}
