//! Job statistics derived from the event history.
//!
//! Statistics are never accumulated incrementally on the job root. They are
//! recomputed from the job's full ordered event range on every fold, so a
//! redelivered event cannot be counted twice.
//!
//! Each event contributes:
//! - an implied `+1` for event types that count work items (see [`implied_counter`])
//! - the explicit deltas in its `EventData.Statistics`

use std::collections::{BTreeMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::event::{EventType, JobEvent};

/// Stage names used by implied counters.
pub mod stages {
    /// The query phase that locates matching objects.
    pub const FIND: &str = "Find";
    /// The rewrite phase that removes matched records.
    pub const FORGET: &str = "Forget";
}

/// Counter names used by implied counters.
pub mod counters {
    /// Queries that completed.
    pub const QUERIES_SUCCEEDED: &str = "QueriesSucceeded";
    /// Queries that failed.
    pub const QUERIES_FAILED: &str = "QueriesFailed";
    /// Objects rewritten.
    pub const OBJECTS_UPDATED: &str = "ObjectsUpdated";
    /// Objects whose rewrite failed.
    pub const OBJECTS_UPDATE_FAILED: &str = "ObjectsUpdateFailed";
}

/// Per-stage counters: stage name, then counter name, then value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Statistics(BTreeMap<String, BTreeMap<String, u64>>);

impl Statistics {
    /// Creates empty statistics.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true if no counter has been recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns a counter value, or zero if it was never recorded.
    #[must_use]
    pub fn get(&self, stage: &str, counter: &str) -> u64 {
        self.0
            .get(stage)
            .and_then(|counters| counters.get(counter))
            .copied()
            .unwrap_or(0)
    }

    /// Iterates stages in name order.
    pub fn stages(&self) -> impl Iterator<Item = (&str, &BTreeMap<String, u64>)> {
        self.0.iter().map(|(stage, counters)| (stage.as_str(), counters))
    }

    /// Adds `delta` to a counter, saturating at `u64::MAX`.
    pub fn add(&mut self, stage: &str, counter: &str, delta: u64) {
        let value = self
            .0
            .entry(stage.to_string())
            .or_default()
            .entry(counter.to_string())
            .or_insert(0);
        *value = value.saturating_add(delta);
    }

    /// Adds every counter of `other` into `self`.
    pub fn merge(&mut self, other: &Self) {
        for (stage, counters) in &other.0 {
            for (counter, delta) in counters {
                self.add(stage, counter, *delta);
            }
        }
    }

    /// Folds the statistics of an event history.
    ///
    /// Events sharing a sort key are counted once, whatever their order.
    #[must_use]
    pub fn from_events<'a, I>(events: I) -> Self
    where
        I: IntoIterator<Item = &'a JobEvent>,
    {
        let mut seen = HashSet::new();
        let mut statistics = Self::new();
        for event in events {
            if !seen.insert(&event.sort_key) {
                continue;
            }
            if let Some((stage, counter)) = implied_counter(&event.event_type) {
                statistics.add(stage, counter, 1);
            }
            statistics.merge(&event.event_data.statistics);
        }
        statistics
    }

    /// Returns true if every counter in `self` is at least its value in `earlier`.
    #[must_use]
    pub fn dominates(&self, earlier: &Self) -> bool {
        earlier.stages().all(|(stage, counters)| {
            counters
                .iter()
                .all(|(counter, value)| self.get(stage, counter) >= *value)
        })
    }
}

/// Returns the counter an event type increments by one, if any.
#[must_use]
pub fn implied_counter(event_type: &EventType) -> Option<(&'static str, &'static str)> {
    match event_type {
        EventType::QuerySucceeded => Some((stages::FIND, counters::QUERIES_SUCCEEDED)),
        EventType::QueryFailed => Some((stages::FIND, counters::QUERIES_FAILED)),
        EventType::ObjectUpdated => Some((stages::FORGET, counters::OBJECTS_UPDATED)),
        EventType::ObjectUpdateFailed => Some((stages::FORGET, counters::OBJECTS_UPDATE_FAILED)),
        _ => None,
    }
}
