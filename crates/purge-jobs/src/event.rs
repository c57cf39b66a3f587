//! Job lifecycle events.
//!
//! Events are appended by the deletion workflow as it progresses and are never
//! mutated. Each event carries:
//!
//! - **`EventName`**: what happened (a known [`EventType`] or any other string)
//! - **`EventData`**: statistics deltas and an optional error that forces a
//!   failure status
//! - **`Sk`**: the [`SortKey`] that orders the event within its job

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use purge_core::{JobId, SortKey};

use crate::statistics::Statistics;

/// What a job event reports.
///
/// Event names the aggregator does not know are kept verbatim as
/// [`EventType::Other`]; they contribute statistics but never change status.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum EventType {
    /// The execution engine began running the job.
    JobStarted,
    /// The find phase began.
    FindPhaseStarted,
    /// The find phase finished.
    FindPhaseEnded,
    /// The find phase failed.
    FindPhaseFailed,
    /// The forget phase began.
    ForgetPhaseStarted,
    /// The forget phase finished.
    ForgetPhaseEnded,
    /// The forget phase failed.
    ForgetPhaseFailed,
    /// A find query completed.
    QuerySucceeded,
    /// A find query failed.
    QueryFailed,
    /// An object was rewritten without the matched records.
    ObjectUpdated,
    /// An object rewrite failed.
    ObjectUpdateFailed,
    /// Post-deletion cleanup completed.
    CleanupSucceeded,
    /// Post-deletion cleanup failed.
    CleanupFailed,
    /// The whole job succeeded.
    JobSucceeded,
    /// The workflow raised an unhandled error.
    Exception,
    /// Any event name not listed above.
    Other(String),
}

impl EventType {
    /// Every known event type, in workflow order.
    pub const KNOWN: [Self; 15] = [
        Self::JobStarted,
        Self::FindPhaseStarted,
        Self::FindPhaseEnded,
        Self::FindPhaseFailed,
        Self::ForgetPhaseStarted,
        Self::ForgetPhaseEnded,
        Self::ForgetPhaseFailed,
        Self::QuerySucceeded,
        Self::QueryFailed,
        Self::ObjectUpdated,
        Self::ObjectUpdateFailed,
        Self::CleanupSucceeded,
        Self::CleanupFailed,
        Self::JobSucceeded,
        Self::Exception,
    ];

    /// Returns the wire name of the event type.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::JobStarted => "JobStarted",
            Self::FindPhaseStarted => "FindPhaseStarted",
            Self::FindPhaseEnded => "FindPhaseEnded",
            Self::FindPhaseFailed => "FindPhaseFailed",
            Self::ForgetPhaseStarted => "ForgetPhaseStarted",
            Self::ForgetPhaseEnded => "ForgetPhaseEnded",
            Self::ForgetPhaseFailed => "ForgetPhaseFailed",
            Self::QuerySucceeded => "QuerySucceeded",
            Self::QueryFailed => "QueryFailed",
            Self::ObjectUpdated => "ObjectUpdated",
            Self::ObjectUpdateFailed => "ObjectUpdateFailed",
            Self::CleanupSucceeded => "CleanupSucceeded",
            Self::CleanupFailed => "CleanupFailed",
            Self::JobSucceeded => "JobSucceeded",
            Self::Exception => "Exception",
            Self::Other(name) => name,
        }
    }
}

impl From<&str> for EventType {
    fn from(name: &str) -> Self {
        Self::KNOWN
            .into_iter()
            .find(|known| known.as_str() == name)
            .unwrap_or_else(|| Self::Other(name.to_string()))
    }
}

impl From<String> for EventType {
    fn from(name: String) -> Self {
        Self::from(name.as_str())
    }
}

impl From<EventType> for String {
    fn from(event_type: EventType) -> Self {
        event_type.as_str().to_string()
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Free-form event payload.
///
/// Only `Statistics` and `Error` are interpreted; every other attribute is
/// preserved untouched in `extra`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct EventData {
    /// Counter deltas keyed by stage, then counter name.
    #[serde(default, skip_serializing_if = "Statistics::is_empty")]
    pub statistics: Statistics,
    /// Error reported by the emitter. Forces a failure status.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Attributes the aggregator does not interpret.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl EventData {
    /// Creates an empty payload.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a statistics delta.
    #[must_use]
    pub fn with_delta(mut self, stage: &str, counter: &str, delta: u64) -> Self {
        self.statistics.add(stage, counter, delta);
        self
    }

    /// Sets the reported error.
    #[must_use]
    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }
}

/// An immutable lifecycle event of a deletion job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct JobEvent {
    /// The job this event belongs to.
    #[serde(rename = "Id")]
    pub job_id: JobId,
    /// Position of the event within the job.
    #[serde(rename = "Sk")]
    pub sort_key: SortKey,
    /// What happened.
    #[serde(rename = "EventName")]
    pub event_type: EventType,
    /// Statistics and error payload.
    #[serde(default)]
    pub event_data: EventData,
    /// Component that emitted the event.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub emitter_id: Option<String>,
}

impl JobEvent {
    /// Creates an event emitted now.
    #[must_use]
    pub fn new(job_id: JobId, event_type: EventType, event_data: EventData) -> Self {
        Self::at(job_id, SortKey::generate(Utc::now()), event_type, event_data)
    }

    /// Creates an event with an explicit sort key.
    #[must_use]
    pub fn at(
        job_id: JobId,
        sort_key: SortKey,
        event_type: EventType,
        event_data: EventData,
    ) -> Self {
        Self {
            job_id,
            sort_key,
            event_type,
            event_data,
            emitter_id: None,
        }
    }

    /// Sets the emitter.
    #[must_use]
    pub fn with_emitter(mut self, emitter_id: impl Into<String>) -> Self {
        self.emitter_id = Some(emitter_id.into());
        self
    }

    /// Returns when the event was emitted.
    #[must_use]
    pub fn emitted_at(&self) -> DateTime<Utc> {
        self.sort_key.emitted_at()
    }

    /// Returns true if the payload reports an error.
    #[must_use]
    pub const fn reports_error(&self) -> bool {
        self.event_data.error.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn known_names_roundtrip() {
        for event_type in EventType::KNOWN {
            assert_eq!(EventType::from(event_type.as_str()), event_type);
            assert!(!matches!(event_type, EventType::Other(_)));
        }
    }

    #[test]
    fn unknown_names_are_preserved() {
        let event_type = EventType::from("AnEvent");
        assert_eq!(event_type, EventType::Other("AnEvent".into()));
        assert_eq!(event_type.to_string(), "AnEvent");
    }

    #[test]
    fn job_event_deserializes_wire_shape() {
        let event: JobEvent = serde_json::from_value(json!({
            "Id": "job123",
            "Sk": "1576861489#12345",
            "Type": "JobEvent",
            "EventName": "QuerySucceeded",
            "EventData": {
                "Statistics": {"Find": {"DataScannedInBytes": 1024}},
                "QueryId": "q-1"
            },
            "EmitterId": "query-worker"
        }))
        .unwrap();

        assert_eq!(event.job_id.as_str(), "job123");
        assert_eq!(event.event_type, EventType::QuerySucceeded);
        assert_eq!(event.event_data.statistics.get("Find", "DataScannedInBytes"), 1024);
        assert_eq!(event.event_data.extra.get("QueryId"), Some(&json!("q-1")));
        assert_eq!(event.emitter_id.as_deref(), Some("query-worker"));
        assert_eq!(event.emitted_at().timestamp(), 1_576_861_489);
    }

    #[test]
    fn missing_event_data_defaults_to_empty() {
        let event: JobEvent = serde_json::from_value(json!({
            "Id": "job123",
            "Sk": "1#a",
            "EventName": "JobStarted"
        }))
        .unwrap();
        assert_eq!(event.event_data, EventData::default());
        assert!(!event.reports_error());
    }
}
