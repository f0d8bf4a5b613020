use crate::naming::convention::GAUGECORR_BEGIN;
use crate::types::any_datetime::{AnyDateTime, ARCHIVE_DT_FORMAT};
use crate::types::error::ValidationError;
use crate::types::missing_snapshots::MissingSnapshots;
use chrono::{DateTime, Duration, Timelike, Utc};

/// Checks that a timestamp can name an archive snapshot: it must sit exactly on the
/// hour and must not predate the earliest archived product.
pub fn validate_timestamp(timestamp: DateTime<Utc>) -> Result<(), ValidationError> {
    let invalid = |reason: &str| {
        Err(ValidationError::InvalidTimestamp {
            timestamp: timestamp.format(ARCHIVE_DT_FORMAT).to_string(),
            reason: reason.to_string(),
        })
    };
    if timestamp < *GAUGECORR_BEGIN {
        return invalid("data is not available before 20150506-200000");
    }
    if timestamp.minute() != 0 || timestamp.second() != 0 || timestamp.nanosecond() != 0 {
        return invalid("timestamp must be aligned to the hour");
    }
    Ok(())
}

/// An inclusive, hourly sequence of snapshot timestamps.
///
/// The sequence is derived once at construction: every hour in `[start, end]`,
/// minus the hours listed in the [`MissingSnapshots`] registry handed in.
#[derive(Debug, Clone, PartialEq)]
pub struct TimeRange {
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    hours: Vec<DateTime<Utc>>,
}

impl TimeRange {
    /// Builds the range, validating both endpoints.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::DateParsing`] if an endpoint cannot be resolved,
    /// and [`ValidationError::InvalidTimestamp`] if an endpoint is not on the hour,
    /// predates the archive, or if `end` precedes `start`.
    pub fn new(
        start: impl AnyDateTime,
        end: impl AnyDateTime,
        missing: &MissingSnapshots,
    ) -> Result<Self, ValidationError> {
        let start = start
            .get_datetime()
            .ok_or_else(|| ValidationError::DateParsing("range start".to_string()))?;
        let end = end
            .get_datetime()
            .ok_or_else(|| ValidationError::DateParsing("range end".to_string()))?;
        validate_timestamp(start)?;
        validate_timestamp(end)?;
        if end < start {
            return Err(ValidationError::InvalidTimestamp {
                timestamp: end.format(ARCHIVE_DT_FORMAT).to_string(),
                reason: format!(
                    "range end precedes range start {}",
                    start.format(ARCHIVE_DT_FORMAT)
                ),
            });
        }

        let hours = hourly_sequence(start, end)
            .filter(|hour| !missing.contains(hour))
            .collect();

        Ok(Self { start, end, hours })
    }

    pub fn start(&self) -> DateTime<Utc> {
        self.start
    }

    pub fn end(&self) -> DateTime<Utc> {
        self.end
    }

    /// The hours to process, in ascending order, without known-missing entries.
    pub fn hours(&self) -> &[DateTime<Utc>] {
        &self.hours
    }

    /// Every hour between the bounds, including those excluded as known missing.
    pub fn all_hours(&self) -> Vec<DateTime<Utc>> {
        hourly_sequence(self.start, self.end).collect()
    }

    pub fn len(&self) -> usize {
        self.hours.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hours.is_empty()
    }

    pub fn print_bounds(&self) -> String {
        let fmt = "%Y-%m-%d %H:%M:%S";
        format!("{} to {}", self.start.format(fmt), self.end.format(fmt))
    }
}

fn hourly_sequence(
    start: DateTime<Utc>,
    end: DateTime<Utc>,
) -> impl Iterator<Item = DateTime<Utc>> {
    std::iter::successors(Some(start), |hour| Some(*hour + Duration::hours(1)))
        .take_while(move |hour| *hour <= end)
}
