use crate::frame::FrameWriteError;
use crate::snapshots::error::SnapshotError;
use crate::types::error::ValidationError;
use polars::error::PolarsError;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DatasetError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("Snapshot {timestamp} could not be prepared")]
    Snapshot {
        timestamp: String,
        #[source]
        source: SnapshotError,
    },

    #[error("No hourly data to build the frame from")]
    EmptyDataset,

    #[error("Failed to scan parquet file '{0}'")]
    ParquetScan(PathBuf, #[source] PolarsError),

    #[error(transparent)]
    Write(#[from] FrameWriteError),

    #[error("Failed processing DataFrame: {0}")]
    DataFrameProcessing(#[from] PolarsError),

    #[error("Background task failed to complete")]
    TaskJoin(#[from] tokio::task::JoinError),
}
