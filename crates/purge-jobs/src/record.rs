//! Change notifications and record classification.
//!
//! Jobs and job events share one key space. Every stored image carries `Id`,
//! `Sk` and a `Type` tag; [`decode_image`] turns an untyped image into a
//! [`RecordKind`] at the store boundary so the aggregator only ever sees typed
//! records.
//!
//! | `Type`       | `Sk`    | Kind                       |
//! |--------------|---------|----------------------------|
//! | `"Job"`      | `== Id` | [`RecordKind::Job`]        |
//! | `"JobEvent"` | `!= Id` | [`RecordKind::JobEvent`]   |
//! | other        | any     | [`RecordKind::Malformed`]  |

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::Result;
use crate::event::JobEvent;
use crate::job::Job;

/// Type tag of a job root image.
pub const JOB_TYPE: &str = "Job";
/// Type tag of a job event image.
pub const JOB_EVENT_TYPE: &str = "JobEvent";

/// Kind of write that produced a change notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Operation {
    /// A new record was written.
    Insert,
    /// An existing record was replaced.
    Modify,
    /// A record was deleted.
    Remove,
}

/// One change emitted by the event store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ChangeNotification {
    /// What kind of write happened.
    #[serde(rename = "EventName")]
    pub operation: Operation,
    /// The record after the write. Absent for removals.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new_image: Option<Value>,
}

impl ChangeNotification {
    /// Creates an insert notification.
    #[must_use]
    pub fn insert(image: Value) -> Self {
        Self {
            operation: Operation::Insert,
            new_image: Some(image),
        }
    }

    /// Creates a modify notification.
    #[must_use]
    pub fn modify(image: Value) -> Self {
        Self {
            operation: Operation::Modify,
            new_image: Some(image),
        }
    }

    /// Creates a remove notification.
    #[must_use]
    pub const fn remove() -> Self {
        Self {
            operation: Operation::Remove,
            new_image: None,
        }
    }

    /// Returns true if the notification reports a new record.
    #[must_use]
    pub fn is_insert(&self) -> bool {
        self.operation == Operation::Insert
    }
}

/// A classified stored record.
#[derive(Debug, Clone, PartialEq)]
pub enum RecordKind {
    /// A job root.
    Job(Job),
    /// A job lifecycle event.
    JobEvent(JobEvent),
    /// Neither a job root nor a job event.
    Malformed {
        /// Why classification failed.
        reason: String,
    },
}

impl RecordKind {
    fn malformed(reason: impl Into<String>) -> Self {
        Self::Malformed {
            reason: reason.into(),
        }
    }
}

/// Classifies a stored image.
///
/// Never fails: anything that cannot be decoded is reported as
/// [`RecordKind::Malformed`] with the reason.
#[must_use]
pub fn decode_image(image: &Value) -> RecordKind {
    let Some(fields) = image.as_object() else {
        return RecordKind::malformed("image is not an object");
    };
    let Some(id) = fields.get("Id").and_then(Value::as_str) else {
        return RecordKind::malformed("missing Id");
    };
    let Some(sk) = fields.get("Sk").and_then(Value::as_str) else {
        return RecordKind::malformed("missing Sk");
    };
    let record_type = fields.get("Type").and_then(Value::as_str);

    match record_type {
        Some(JOB_TYPE) if sk == id => match serde_json::from_value(untagged(fields)) {
            Ok(job) => RecordKind::Job(job),
            Err(e) => RecordKind::malformed(format!("invalid job: {e}")),
        },
        Some(JOB_EVENT_TYPE) if sk != id => match serde_json::from_value(image.clone()) {
            Ok(event) => RecordKind::JobEvent(event),
            Err(e) => RecordKind::malformed(format!("invalid job event: {e}")),
        },
        Some(JOB_TYPE) => RecordKind::malformed("job root sort key must equal its id"),
        Some(JOB_EVENT_TYPE) => RecordKind::malformed("job event sort key must differ from its id"),
        Some(other) => RecordKind::malformed(format!("unknown record type '{other}'")),
        None => RecordKind::malformed("missing Type"),
    }
}

/// Drops the keying attributes so only job attributes reach the decoder.
fn untagged(fields: &Map<String, Value>) -> Value {
    let mut fields = fields.clone();
    fields.remove("Sk");
    fields.remove("Type");
    Value::Object(fields)
}

fn tag(value: Value, sk: String, record_type: &str) -> Value {
    match value {
        Value::Object(mut fields) => {
            fields.insert("Sk".into(), Value::String(sk));
            fields.insert("Type".into(), Value::String(record_type.into()));
            Value::Object(fields)
        }
        other => other,
    }
}

/// Encodes a job root as a stored image.
///
/// # Errors
///
/// Returns a serialization error if the job cannot be encoded.
pub fn encode_job(job: &Job) -> Result<Value> {
    let value = serde_json::to_value(job)?;
    Ok(tag(value, job.id.to_string(), JOB_TYPE))
}

/// Encodes a job event as a stored image.
///
/// # Errors
///
/// Returns a serialization error if the event cannot be encoded.
pub fn encode_event(event: &JobEvent) -> Result<Value> {
    let mut value = serde_json::to_value(event)?;
    if let Value::Object(fields) = &mut value {
        fields.insert("Type".into(), Value::String(JOB_EVENT_TYPE.into()));
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{EventData, EventType};
    use crate::status::JobStatus;
    use chrono::Utc;
    use purge_core::JobId;
    use serde_json::json;

    #[test]
    fn classifies_job_root() {
        let kind = decode_image(&json!({
            "Id": "j1", "Sk": "j1", "Type": "Job", "JobStatus": "QUEUED", "CreatedAt": 1
        }));
        let RecordKind::Job(job) = kind else {
            panic!("expected job, got {kind:?}");
        };
        assert_eq!(job.id.as_str(), "j1");
        assert_eq!(job.status, JobStatus::Queued);
    }

    #[test]
    fn classifies_decimal_job_root_with_extra_attributes() {
        let kind = decode_image(&json!({
            "Id": "job123",
            "Sk": "job123",
            "Type": "Job",
            "CreatedAt": 123.0,
            "AthenaConcurrencyLimit": 15
        }));
        let RecordKind::Job(job) = kind else {
            panic!("expected job, got {kind:?}");
        };
        assert_eq!(job.created_at.timestamp(), 123);
        assert_eq!(job.config.extra.get("AthenaConcurrencyLimit"), Some(&json!(15)));
        assert!(!job.config.extra.contains_key("Sk"));
        assert!(!job.config.extra.contains_key("Type"));
    }

    #[test]
    fn classifies_job_event() {
        let kind = decode_image(&json!({
            "Id": "j1", "Sk": "10#a", "Type": "JobEvent", "EventName": "JobStarted"
        }));
        let RecordKind::JobEvent(event) = kind else {
            panic!("expected event, got {kind:?}");
        };
        assert_eq!(event.event_type, EventType::JobStarted);
    }

    #[test]
    fn mismatched_tag_and_key_is_malformed() {
        let root_with_event_key = json!({"Id": "j1", "Sk": "10#a", "Type": "Job", "CreatedAt": 1});
        let event_with_root_key = json!({"Id": "j1", "Sk": "j1", "Type": "JobEvent", "EventName": "X"});
        assert!(matches!(decode_image(&root_with_event_key), RecordKind::Malformed { .. }));
        assert!(matches!(decode_image(&event_with_root_key), RecordKind::Malformed { .. }));
    }

    #[test]
    fn unknown_or_missing_fields_are_malformed() {
        for image in [
            json!({"Id": "j1", "Sk": "j1", "Type": "Nope"}),
            json!({"Id": "j1", "Sk": "j1"}),
            json!({"Sk": "j1", "Type": "Job"}),
            json!({"Id": "j1", "Sk": "bad", "Type": "JobEvent", "EventName": "X"}),
            json!("not an object"),
        ] {
            assert!(
                matches!(decode_image(&image), RecordKind::Malformed { .. }),
                "{image}"
            );
        }
    }

    #[test]
    fn encoded_records_decode_to_themselves() {
        let job = Job::new(JobId::new("j1").unwrap(), Utc::now());
        let event = JobEvent::new(
            job.id.clone(),
            EventType::QuerySucceeded,
            EventData::new().with_delta("Find", "Bytes", 5),
        );

        let job_image = encode_job(&job).unwrap();
        assert_eq!(job_image["Sk"], json!("j1"));
        assert!(matches!(decode_image(&job_image), RecordKind::Job(decoded) if decoded.id == job.id));

        let event_image = encode_event(&event).unwrap();
        assert_eq!(event_image["Type"], json!("JobEvent"));
        assert_eq!(decode_image(&event_image), RecordKind::JobEvent(event));
    }

    #[test]
    fn notification_wire_shape() {
        let notification: ChangeNotification = serde_json::from_value(json!({
            "EventName": "MODIFY",
            "NewImage": {"Id": "j1"}
        }))
        .unwrap();
        assert_eq!(notification.operation, Operation::Modify);
        assert!(!notification.is_insert());
        assert!(ChangeNotification::remove().new_image.is_none());
    }
}
