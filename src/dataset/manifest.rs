//! Per-hour record of what an assembly run achieved.

use crate::types::any_datetime::ARCHIVE_DT_FORMAT;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SnapshotOutcome {
    /// Materialized and included in the merged frame.
    Ready,
    /// The archive does not have this hour. Carries the reason.
    Unavailable(String),
    /// Any other failure, skipped under the continue policy. Carries the error message.
    Failed(String),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Manifest {
    outcomes: BTreeMap<DateTime<Utc>, SnapshotOutcome>,
}

impl Manifest {
    pub fn record(&mut self, timestamp: DateTime<Utc>, outcome: SnapshotOutcome) {
        self.outcomes.insert(timestamp, outcome);
    }

    pub fn get(&self, timestamp: &DateTime<Utc>) -> Option<&SnapshotOutcome> {
        self.outcomes.get(timestamp)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&DateTime<Utc>, &SnapshotOutcome)> {
        self.outcomes.iter()
    }

    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }

    /// Hours that made it into the frame, ascending.
    pub fn succeeded(&self) -> Vec<DateTime<Utc>> {
        self.matching(|o| matches!(o, SnapshotOutcome::Ready))
    }

    pub fn unavailable(&self) -> Vec<DateTime<Utc>> {
        self.matching(|o| matches!(o, SnapshotOutcome::Unavailable(_)))
    }

    pub fn failed(&self) -> Vec<DateTime<Utc>> {
        self.matching(|o| matches!(o, SnapshotOutcome::Failed(_)))
    }

    fn matching(&self, predicate: impl Fn(&SnapshotOutcome) -> bool) -> Vec<DateTime<Utc>> {
        self.outcomes
            .iter()
            .filter(|(_, outcome)| predicate(outcome))
            .map(|(ts, _)| *ts)
            .collect()
    }
}

impl fmt::Display for Manifest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "{} ready, {} unavailable, {} failed",
            self.succeeded().len(),
            self.unavailable().len(),
            self.failed().len()
        )?;
        for (timestamp, outcome) in &self.outcomes {
            let ts = timestamp.format(ARCHIVE_DT_FORMAT);
            match outcome {
                SnapshotOutcome::Ready => {}
                SnapshotOutcome::Unavailable(reason) => writeln!(f, "  {ts} unavailable: {reason}")?,
                SnapshotOutcome::Failed(reason) => writeln!(f, "  {ts} failed: {reason}")?,
            }
        }
        Ok(())
    }
}
