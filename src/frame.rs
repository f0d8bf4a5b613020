//! Polars schema and I/O helpers for precipitation frames.
//!
//! Every frame the crate produces, per snapshot or merged, is in long form with one
//! row per grid point and hour:
//!
//! | column        | dtype                        |
//! |---------------|------------------------------|
//! | `time`        | `Datetime(ms)`, naive UTC    |
//! | `latitude`    | `Float64`                    |
//! | `longitude`   | `Float64` (0-360 convention) |
//! | `precip_rate` | `Float32`, null when missing |

use crate::types::bounding_box::GridExtent;
use crate::types::grid::CroppedGrid;
use chrono::{DateTime, Utc};
use polars::prelude::*;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use thiserror::Error;

pub const COL_TIME: &str = "time";
pub const COL_LATITUDE: &str = "latitude";
pub const COL_LONGITUDE: &str = "longitude";
pub const COL_PRECIP: &str = "precip_rate";

#[derive(Debug, Error)]
pub enum FrameWriteError {
    #[error("I/O error writing parquet file '{0}'")]
    Io(PathBuf, #[source] std::io::Error),

    #[error("Encoding error writing parquet file '{0}'")]
    Polars(PathBuf, #[source] PolarsError),
}

pub(crate) fn time_dtype() -> DataType {
    DataType::Datetime(TimeUnit::Milliseconds, None)
}

/// Casts the columns to the canonical dtypes and fixes their order.
pub(crate) fn normalize(frame: LazyFrame) -> LazyFrame {
    frame.select([
        col(COL_TIME).cast(time_dtype()),
        col(COL_LATITUDE).cast(DataType::Float64),
        col(COL_LONGITUDE).cast(DataType::Float64),
        col(COL_PRECIP).cast(DataType::Float32),
    ])
}

/// Builds the frame for one snapshot: every point of `grid` stamped with `timestamp`.
pub fn grid_to_frame(timestamp: DateTime<Utc>, grid: &CroppedGrid) -> PolarsResult<DataFrame> {
    let times = vec![timestamp.naive_utc(); grid.len()];
    let frame = df!(
        COL_TIME => times,
        COL_LATITUDE => &grid.latitudes,
        COL_LONGITUDE => &grid.longitudes,
        COL_PRECIP => &grid.values
    )?;
    normalize(frame.lazy()).collect()
}

/// A frame with the canonical schema and no rows.
pub fn empty_frame() -> PolarsResult<DataFrame> {
    grid_to_frame(DateTime::<Utc>::default(), &CroppedGrid::default())
}

pub(crate) fn scan(path: &Path) -> PolarsResult<LazyFrame> {
    LazyFrame::scan_parquet(path, Default::default())
}

/// Reads back the coordinate range stored in a parquet frame. `None` for a file
/// without rows.
pub fn read_extent(path: &Path) -> PolarsResult<Option<GridExtent>> {
    let bounds = scan(path)?
        .select([
            col(COL_LONGITUDE).min().alias("lonmin"),
            col(COL_LONGITUDE).max().alias("lonmax"),
            col(COL_LATITUDE).min().alias("latmin"),
            col(COL_LATITUDE).max().alias("latmax"),
        ])
        .collect()?;

    let get = |name: &str| -> PolarsResult<Option<f64>> {
        Ok(bounds.column(name)?.f64()?.get(0))
    };
    match (get("lonmin")?, get("lonmax")?, get("latmin")?, get("latmax")?) {
        (Some(lonmin), Some(lonmax), Some(latmin), Some(latmax)) => Ok(Some(GridExtent {
            lonmin,
            lonmax,
            latmin,
            latmax,
        })),
        _ => Ok(None),
    }
}

/// Distinct timestamps present in a frame, ascending.
pub fn distinct_timestamps(frame: &LazyFrame) -> PolarsResult<Vec<DateTime<Utc>>> {
    let times = frame
        .clone()
        .select([col(COL_TIME).unique().cast(DataType::Int64)])
        .collect()?;
    let mut timestamps: Vec<DateTime<Utc>> = times
        .column(COL_TIME)?
        .i64()?
        .into_iter()
        .flatten()
        .filter_map(DateTime::from_timestamp_millis)
        .collect();
    timestamps.sort_unstable();
    Ok(timestamps)
}

/// Writes `frame` as Snappy parquet, replacing `path` atomically.
///
/// The data goes to a temporary file in the destination directory first, so readers
/// never observe a half-written file and a stale file is only replaced once the new
/// one is complete. Blocking; run it inside `spawn_blocking` from async code.
pub fn write_parquet(mut frame: DataFrame, path: &Path) -> Result<(), FrameWriteError> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let mut temp_file =
        NamedTempFile::new_in(dir).map_err(|e| FrameWriteError::Io(path.to_path_buf(), e))?;
    ParquetWriter::new(temp_file.as_file_mut())
        .with_compression(ParquetCompression::Snappy)
        .finish(&mut frame)
        .map_err(|e| FrameWriteError::Polars(path.to_path_buf(), e))?;
    temp_file
        .persist(path)
        .map_err(|e| FrameWriteError::Io(path.to_path_buf(), e.error))?;
    Ok(())
}
