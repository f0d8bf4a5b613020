//! Combining per-hour frames into one time series.

use crate::dataset::error::DatasetError;
use crate::frame::{
    distinct_timestamps, empty_frame, normalize, scan, write_parquet, COL_LATITUDE, COL_LONGITUDE,
    COL_PRECIP, COL_TIME,
};
use crate::types::year::Year;
use chrono::{DateTime, Datelike, Utc};
use log::{debug, info, warn};
use polars::prelude::*;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

/// Concatenates hourly frames and sorts the result by time, latitude, longitude.
///
/// Callers are expected to pass at most one frame per hour; an empty input yields
/// an empty frame with the usual schema.
pub fn merge(frames: Vec<LazyFrame>) -> PolarsResult<LazyFrame> {
    if frames.is_empty() {
        return Ok(empty_frame()?.lazy());
    }
    let merged = concat(frames, UnionArgs::default())?;
    Ok(sort_frame(normalize(merged)))
}

fn sort_frame(frame: LazyFrame) -> LazyFrame {
    frame.sort(
        [COL_TIME, COL_LATITUDE, COL_LONGITUDE],
        SortMultipleOptions::default(),
    )
}

/// Reindexes `frame` onto `hours`.
///
/// Rows outside `[min(hours), max(hours)]` are dropped. Every hour of `hours` with no
/// rows gets one row per grid cell, with a null `precip_rate`. The cells are taken
/// from the earliest hour that has data; all hours of one assembly share a bounding
/// box, so they share their cells too.
///
/// # Errors
///
/// [`DatasetError::EmptyDataset`] if no hour in range has any data to take the
/// cells from.
pub fn gap_fill(frame: LazyFrame, hours: &[DateTime<Utc>]) -> Result<LazyFrame, DatasetError> {
    let hours: BTreeSet<DateTime<Utc>> = hours.iter().copied().collect();
    let (Some(first), Some(last)) = (hours.first(), hours.last()) else {
        return Ok(empty_frame()?.lazy());
    };

    let in_range = normalize(frame).filter(
        col(COL_TIME)
            .gt_eq(lit(first.naive_utc()))
            .and(col(COL_TIME).lt_eq(lit(last.naive_utc()))),
    );
    let present = distinct_timestamps(&in_range)?;
    let template_hour = *present.first().ok_or(DatasetError::EmptyDataset)?;

    let cells = in_range
        .clone()
        .filter(col(COL_TIME).eq(lit(template_hour.naive_utc())))
        .select([col(COL_LATITUDE), col(COL_LONGITUDE)])
        .collect()?;
    let cell_lats: Vec<f64> = cells.column(COL_LATITUDE)?.f64()?.into_iter().flatten().collect();
    let cell_lons: Vec<f64> = cells.column(COL_LONGITUDE)?.f64()?.into_iter().flatten().collect();

    let present: BTreeSet<DateTime<Utc>> = present.into_iter().collect();
    let missing: Vec<&DateTime<Utc>> = hours.difference(&present).collect();
    if missing.is_empty() {
        return Ok(sort_frame(in_range));
    }

    let rows = missing.len() * cell_lats.len();
    let mut times = Vec::with_capacity(rows);
    let mut latitudes = Vec::with_capacity(rows);
    let mut longitudes = Vec::with_capacity(rows);
    for hour in &missing {
        let time = hour.naive_utc();
        for (lat, lon) in cell_lats.iter().zip(&cell_lons) {
            times.push(time);
            latitudes.push(*lat);
            longitudes.push(*lon);
        }
    }
    let precip: Vec<Option<f32>> = vec![None; times.len()];
    let gaps = df!(
        COL_TIME => times,
        COL_LATITUDE => latitudes,
        COL_LONGITUDE => longitudes,
        COL_PRECIP => precip
    )?;

    debug!("Gap-filled {} of {} hours", missing.len(), hours.len());
    let combined = concat([in_range, normalize(gaps.lazy())], UnionArgs::default())?;
    Ok(sort_frame(combined))
}

/// Concatenates materialized files into one parquet file covering a whole calendar
/// year, with null rows for every hour that has no data.
///
/// `year` defaults to the year of the earliest hour found in the inputs. An input
/// that repeats an hour already seen in an earlier input is skipped. Returns the
/// number of rows written.
pub async fn combine_files<P: AsRef<Path>>(
    inputs: &[P],
    output: &Path,
    year: Option<Year>,
) -> Result<usize, DatasetError> {
    let inputs: Vec<PathBuf> = inputs.iter().map(|p| p.as_ref().to_path_buf()).collect();
    let output = output.to_path_buf();
    tokio::task::spawn_blocking(move || combine_blocking(&inputs, &output, year)).await?
}

fn combine_blocking(
    inputs: &[PathBuf],
    output: &Path,
    year: Option<Year>,
) -> Result<usize, DatasetError> {
    let mut seen = BTreeSet::new();
    let mut frames = Vec::with_capacity(inputs.len());
    for path in inputs {
        let frame = scan(path).map_err(|e| DatasetError::ParquetScan(path.clone(), e))?;
        let timestamps =
            distinct_timestamps(&frame).map_err(|e| DatasetError::ParquetScan(path.clone(), e))?;
        if timestamps.iter().any(|ts| seen.contains(ts)) {
            warn!("Skipping {:?}: its hours are already covered by an earlier input", path);
            continue;
        }
        seen.extend(timestamps);
        frames.push(frame);
    }

    let earliest = seen.first().ok_or(DatasetError::EmptyDataset)?;
    let year = year.unwrap_or(Year(earliest.year()));

    let merged = merge(frames)?;
    let combined = gap_fill(merged, &year.hours())?.collect()?;
    let rows = combined.height();
    write_parquet(combined, output)?;
    info!(
        "Combined {} input file(s) into {:?} ({} rows for {})",
        inputs.len(),
        output,
        rows,
        year
    );
    Ok(rows)
}
