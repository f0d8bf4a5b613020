//! Contains the `PrecipLazyFrame` structure, the merged result of an assembly run.

use crate::dataset::error::DatasetError;
use crate::dataset::manifest::Manifest;
use crate::dataset::merge::gap_fill;
use crate::frame::{distinct_timestamps, COL_TIME};
use crate::types::any_datetime::AnyDateTime;
use crate::types::error::ValidationError;
use crate::types::time_range::TimeRange;
use chrono::{DateTime, Duration, DurationRound, Utc};
use polars::prelude::{col, lit, DataFrame, Expr, LazyFrame, PolarsResult};

/// A wrapper around a Polars `LazyFrame` holding hourly precipitation in long form:
/// one row per hour and grid cell, sorted by `time`, then `latitude`, then
/// `longitude`. See [`crate::frame`] for the schema.
///
/// The `time` column is timezone-naive and holds UTC. The datetime helpers below
/// convert their `DateTime<Utc>` arguments with `naive_utc()` before filtering.
///
/// Alongside the frame, `manifest` records which hours of the assembled range made it
/// in, which the archive does not have, and which failed.
///
/// Instances are typically obtained via [`crate::DatasetAssembler::get_data`].
#[derive(Clone)]
pub struct PrecipLazyFrame {
    /// The underlying Polars LazyFrame containing the hourly grids.
    pub frame: LazyFrame,
    pub manifest: Manifest,
}

impl PrecipLazyFrame {
    pub fn new(frame: LazyFrame, manifest: Manifest) -> Self {
        Self { frame, manifest }
    }

    /// Applies a Polars predicate lazily, returning a new frame. The manifest is
    /// carried over unchanged.
    ///
    /// # Example
    ///
    /// ```no_run
    /// # use mrms_qpe::PrecipLazyFrame;
    /// use polars::prelude::{col, lit};
    ///
    /// # fn run(data: PrecipLazyFrame) -> Result<(), Box<dyn std::error::Error>> {
    /// // Hours and cells with more than 10 mm of rain.
    /// let heavy = data.filter(col("precip_rate").gt(lit(10.0f32)));
    /// println!("{}", heavy.frame.collect()?);
    /// # Ok(())
    /// # }
    /// ```
    pub fn filter(&self, predicate: Expr) -> PrecipLazyFrame {
        PrecipLazyFrame::new(self.frame.clone().filter(predicate), self.manifest.clone())
    }

    /// Rows with `start <= time <= end`.
    ///
    /// # Errors
    ///
    /// [`ValidationError::DateParsing`] if either bound cannot be resolved.
    pub fn get_range(
        &self,
        start: impl AnyDateTime,
        end: impl AnyDateTime,
    ) -> Result<PrecipLazyFrame, ValidationError> {
        let start = start
            .get_datetime()
            .ok_or_else(|| ValidationError::DateParsing("range start".to_string()))?;
        let end = end
            .get_datetime()
            .ok_or_else(|| ValidationError::DateParsing("range end".to_string()))?;
        Ok(self.filter(
            col(COL_TIME)
                .gt_eq(lit(start.naive_utc()))
                .and(col(COL_TIME).lt_eq(lit(end.naive_utc()))),
        ))
    }

    /// Rows for the hour nearest to `datetime` (half past rounds up).
    ///
    /// # Errors
    ///
    /// [`ValidationError::DateParsing`] if `datetime` cannot be resolved.
    pub fn get_at(&self, datetime: impl AnyDateTime) -> Result<PrecipLazyFrame, ValidationError> {
        let datetime = datetime
            .get_datetime()
            .ok_or_else(|| ValidationError::DateParsing("datetime".to_string()))?;
        let hour = nearest_hour(datetime).ok_or_else(|| {
            ValidationError::DateParsing(format!("{datetime} cannot be rounded to an hour"))
        })?;
        Ok(self.filter(col(COL_TIME).eq(lit(hour.naive_utc()))))
    }

    /// Distinct hours present in the frame, ascending. Triggers a computation.
    pub fn timestamps(&self) -> PolarsResult<Vec<DateTime<Utc>>> {
        distinct_timestamps(&self.frame)
    }

    /// Inserts null rows for every hour of `range` that has no data, including hours
    /// excluded from the range as known missing, and drops rows outside the range.
    ///
    /// # Errors
    ///
    /// [`DatasetError::EmptyDataset`] if the frame has no data within the range.
    pub fn gap_fill(&self, range: &TimeRange) -> Result<PrecipLazyFrame, DatasetError> {
        let frame = gap_fill(self.frame.clone(), &range.all_hours())?;
        Ok(PrecipLazyFrame::new(frame, self.manifest.clone()))
    }

    pub fn collect(self) -> PolarsResult<DataFrame> {
        self.frame.collect()
    }
}

fn nearest_hour(datetime: DateTime<Utc>) -> Option<DateTime<Utc>> {
    datetime.duration_round(Duration::hours(1)).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::merge::merge;
    use crate::frame::{grid_to_frame, COL_PRECIP};
    use crate::types::grid::CroppedGrid;
    use crate::types::missing_snapshots::MissingSnapshots;
    use chrono::TimeZone;
    use polars::prelude::IntoLazy;

    fn hour(h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2018, 6, 1, h, 0, 0).unwrap()
    }

    fn data(hours: &[u32]) -> Result<PrecipLazyFrame, Box<dyn std::error::Error>> {
        let grid = CroppedGrid {
            latitudes: vec![35.0, 35.0],
            longitudes: vec![265.0, 266.0],
            values: vec![Some(0.0), Some(4.0)],
        };
        let frames = hours
            .iter()
            .map(|h| grid_to_frame(hour(*h), &grid).map(|df| df.lazy()))
            .collect::<PolarsResult<Vec<_>>>()?;
        Ok(PrecipLazyFrame::new(merge(frames)?, Manifest::default()))
    }

    #[test]
    fn test_get_range_is_inclusive() -> Result<(), Box<dyn std::error::Error>> {
        let data = data(&[0, 1, 2, 3, 4])?;
        let range = data.get_range("2018-06-01 01:00:00", "2018-06-01T03:00:00Z")?;
        assert_eq!(range.timestamps()?, vec![hour(1), hour(2), hour(3)]);
        Ok(())
    }

    #[test]
    fn test_get_at_rounds_to_nearest_hour() -> Result<(), Box<dyn std::error::Error>> {
        let data = data(&[0, 1, 2])?;
        let at = data.get_at(hour(1) + Duration::minutes(40))?;
        assert_eq!(at.timestamps()?, vec![hour(2)]);
        let at = data.get_at(hour(1) + Duration::minutes(10))?;
        assert_eq!(at.collect()?.height(), 2);
        Ok(())
    }

    #[test]
    fn test_unparseable_bounds_are_rejected() -> Result<(), Box<dyn std::error::Error>> {
        let data = data(&[0])?;
        assert!(matches!(
            data.get_range("yesterday", hour(1)),
            Err(ValidationError::DateParsing(_))
        ));
        Ok(())
    }

    #[test]
    fn test_filter_on_precip() -> Result<(), Box<dyn std::error::Error>> {
        let data = data(&[0, 1])?;
        let wet = data.filter(col(COL_PRECIP).gt(lit(1.0f32))).collect()?;
        assert_eq!(wet.height(), 2);
        Ok(())
    }

    #[test]
    fn test_gap_fill_covers_excluded_hours() -> Result<(), Box<dyn std::error::Error>> {
        let missing: MissingSnapshots = [hour(2)].into_iter().collect();
        let range = TimeRange::new(hour(0), hour(3), &missing)?;
        assert_eq!(range.len(), 3);

        let filled = data(&[0, 1, 3])?.gap_fill(&range)?;
        assert_eq!(filled.timestamps()?, range.all_hours());
        let frame = filled.collect()?;
        assert_eq!(frame.height(), 8);
        assert_eq!(frame.column(COL_PRECIP)?.null_count(), 2);
        Ok(())
    }
}
