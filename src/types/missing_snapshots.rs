use crate::types::any_datetime::AnyDateTime;
use crate::types::error::ValidationError;
use chrono::{DateTime, Utc};
use std::collections::BTreeSet;

/// Timestamps known to have no upstream data.
///
/// Passed explicitly to [`crate::TimeRange`] (which drops these hours) and to the
/// artifact store (which refuses to fetch them), so no global state is involved.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MissingSnapshots {
    timestamps: BTreeSet<DateTime<Utc>>,
}

impl MissingSnapshots {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses a list of timestamps in any format [`AnyDateTime`] understands.
    pub fn parse<I, S>(entries: I) -> Result<Self, ValidationError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut registry = Self::new();
        for entry in entries {
            let entry = entry.as_ref();
            let timestamp = entry
                .get_datetime()
                .ok_or_else(|| ValidationError::DateParsing(entry.to_string()))?;
            registry.insert(timestamp);
        }
        Ok(registry)
    }

    pub fn insert(&mut self, timestamp: DateTime<Utc>) -> bool {
        self.timestamps.insert(timestamp)
    }

    pub fn contains(&self, timestamp: &DateTime<Utc>) -> bool {
        self.timestamps.contains(timestamp)
    }

    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &DateTime<Utc>> {
        self.timestamps.iter()
    }
}

impl FromIterator<DateTime<Utc>> for MissingSnapshots {
    fn from_iter<T: IntoIterator<Item = DateTime<Utc>>>(iter: T) -> Self {
        Self {
            timestamps: iter.into_iter().collect(),
        }
    }
}
