//! Strongly-typed identifiers for purge entities.
//!
//! Jobs and their events share one ordered key space keyed by
//! `(JobId, SortKey)`:
//! - A job's root record uses its own id as the sort key
//! - Every lifecycle event uses a [`SortKey`] that orders by emission time,
//!   then by a disambiguator
//!
//! # Example
//!
//! ```rust
//! use chrono::{TimeZone, Utc};
//! use purge_core::id::{JobId, SortKey};
//!
//! let job = JobId::new("job-123").unwrap();
//! let first = SortKey::new(Utc.timestamp_opt(1_576_861_489, 0).unwrap(), "a");
//! let second = SortKey::new(Utc.timestamp_opt(1_576_861_490, 0).unwrap(), "a");
//!
//! assert!(first < second);
//! assert_eq!(first.to_string(), "1576861489#a");
//! assert_eq!(job.as_str(), "job-123");
//! ```

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use ulid::Ulid;

use crate::error::{Error, Result};

/// Separator between the emission time and the disambiguator of a sort key.
const SORT_KEY_SEPARATOR: char = '#';

/// A unique identifier for a deletion job.
///
/// Job ids are opaque strings chosen by the submitter. Generated ids are
/// ULIDs, which sort by creation time.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct JobId(String);

impl JobId {
    /// Creates a job ID from an existing identifier.
    ///
    /// # Errors
    ///
    /// Returns an error if the identifier is empty or only whitespace.
    pub fn new(id: impl Into<String>) -> Result<Self> {
        let id = id.into();
        if id.trim().is_empty() {
            return Err(Error::invalid_id("job ID must not be empty"));
        }
        Ok(Self(id))
    }

    /// Generates a new unique job ID.
    #[must_use]
    pub fn generate() -> Self {
        Self(Ulid::new().to_string())
    }

    /// Returns the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for JobId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::new(s)
    }
}

impl TryFrom<String> for JobId {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        Self::new(value)
    }
}

impl From<JobId> for String {
    fn from(id: JobId) -> Self {
        id.0
    }
}

/// Ordering key of a job event within its job.
///
/// Rendered as `"{emitted_at_epoch_seconds}#{disambiguator}"`. Keys compare by
/// emission time first and disambiguator second, so two events emitted in the
/// same second still have a total order.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SortKey {
    emitted_at: i64,
    disambiguator: String,
}

impl SortKey {
    /// Creates a sort key from an emission time and a disambiguator.
    #[must_use]
    pub fn new(emitted_at: DateTime<Utc>, disambiguator: impl Into<String>) -> Self {
        Self {
            emitted_at: emitted_at.timestamp(),
            disambiguator: disambiguator.into(),
        }
    }

    /// Generates a sort key for an event emitted at `emitted_at`.
    ///
    /// The disambiguator is a fresh ULID.
    #[must_use]
    pub fn generate(emitted_at: DateTime<Utc>) -> Self {
        Self::new(emitted_at, Ulid::new().to_string())
    }

    /// Returns the emission time in whole seconds.
    #[must_use]
    pub fn emitted_at(&self) -> DateTime<Utc> {
        DateTime::from_timestamp(self.emitted_at, 0).unwrap_or(DateTime::UNIX_EPOCH)
    }

    /// Returns the emission time as epoch seconds.
    #[must_use]
    pub const fn emitted_at_epoch(&self) -> i64 {
        self.emitted_at
    }

    /// Returns the disambiguator.
    #[must_use]
    pub fn disambiguator(&self) -> &str {
        &self.disambiguator
    }
}

impl Ord for SortKey {
    fn cmp(&self, other: &Self) -> Ordering {
        self.emitted_at
            .cmp(&other.emitted_at)
            .then_with(|| self.disambiguator.cmp(&other.disambiguator))
    }
}

impl PartialOrd for SortKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for SortKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{SORT_KEY_SEPARATOR}{}", self.emitted_at, self.disambiguator)
    }
}

impl FromStr for SortKey {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let invalid = |reason: &str| Error::invalid_id(format!("invalid sort key '{s}': {reason}"));

        let (raw_time, disambiguator) = s
            .split_once(SORT_KEY_SEPARATOR)
            .ok_or_else(|| invalid("missing '#' separator"))?;
        let emitted_at = raw_time
            .parse::<i64>()
            .map_err(|_| invalid("emission time is not an integer"))?;
        // Distinct stored keys must stay distinct after parsing.
        if emitted_at.to_string() != raw_time {
            return Err(invalid("emission time is not in canonical form"));
        }
        if disambiguator.is_empty() {
            return Err(invalid("empty disambiguator"));
        }

        Ok(Self {
            emitted_at,
            disambiguator: disambiguator.to_string(),
        })
    }
}

impl Serialize for SortKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for SortKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).unwrap()
    }

    #[test]
    fn job_id_rejects_blank() {
        assert!(JobId::new("").is_err());
        assert!(JobId::new("   ").is_err());
        assert!(JobId::new("j1").is_ok());
    }

    #[test]
    fn generated_job_ids_are_unique() {
        assert_ne!(JobId::generate(), JobId::generate());
    }

    #[test]
    fn job_id_deserialize_validates() {
        let ok: std::result::Result<JobId, _> = serde_json::from_str("\"j1\"");
        assert_eq!(ok.unwrap().as_str(), "j1");

        let blank: std::result::Result<JobId, _> = serde_json::from_str("\"\"");
        assert!(blank.is_err());
    }

    #[test]
    fn sort_key_orders_by_time_then_disambiguator() {
        let a = SortKey::new(at(100), "z");
        let b = SortKey::new(at(101), "a");
        let c = SortKey::new(at(101), "b");
        assert!(a < b);
        assert!(b < c);
    }

    #[test]
    fn sort_key_orders_numerically_not_lexically() {
        // "99#x" > "100#x" as strings, but not as sort keys.
        let earlier = SortKey::new(at(99), "x");
        let later = SortKey::new(at(100), "x");
        assert!(earlier < later);
    }

    #[test]
    fn sort_key_parses_rendered_form() {
        let key: SortKey = "1576861489#12345".parse().unwrap();
        assert_eq!(key.emitted_at_epoch(), 1_576_861_489);
        assert_eq!(key.disambiguator(), "12345");
        assert_eq!(key.to_string(), "1576861489#12345");
    }

    #[test]
    fn sort_key_rejects_malformed() {
        assert!("1576861489".parse::<SortKey>().is_err());
        assert!("abc#1".parse::<SortKey>().is_err());
        assert!("1576861489#".parse::<SortKey>().is_err());
    }

    #[test]
    fn sort_key_rejects_non_canonical_time() {
        for raw in ["010#a", "+10#a", "-0#a", "00#a"] {
            assert!(raw.parse::<SortKey>().is_err(), "{raw}");
        }
        assert!("0#a".parse::<SortKey>().is_ok());
        assert!("-5#a".parse::<SortKey>().is_ok());
    }

    #[test]
    fn disambiguator_may_contain_separator() {
        let key: SortKey = "10#a#b".parse().unwrap();
        assert_eq!(key.disambiguator(), "a#b");
    }
}
