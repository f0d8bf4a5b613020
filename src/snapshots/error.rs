use crate::frame::FrameWriteError;
use crate::naming::error::NamingError;
use crate::snapshots::transport::FetchError;
use crate::types::artifact::ArtifactKind;
use crate::types::error::ValidationError;
use polars::error::PolarsError;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error(transparent)]
    Naming(#[from] NamingError),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("Snapshot {timestamp} is listed as known missing; not fetching")]
    KnownUnavailable { timestamp: String },

    #[error("Archive has no snapshot at {url}")]
    SnapshotUnavailable { url: String },

    #[error("Fetching {url} failed after {attempts} attempt(s)")]
    FetchFailed {
        url: String,
        attempts: u32,
        #[source]
        source: FetchError,
    },

    #[error("Cannot produce the {stage} artifact: required input '{input}' is absent")]
    MissingPrerequisite { stage: ArtifactKind, input: PathBuf },

    #[error("Materialized data for {timestamp} is not ready; call ensure_data first")]
    DataNotReady { timestamp: String },

    #[error("Failed to create storage directory '{0}'")]
    StorageDirCreation(PathBuf, #[source] std::io::Error),

    #[error("Failed to decompress '{0}'")]
    Decompress(PathBuf, #[source] std::io::Error),

    #[error("Failed to delete '{0}'")]
    Delete(PathBuf, #[source] std::io::Error),

    #[error("Failed to decode grid from '{path}': {message}")]
    GridDecode { path: PathBuf, message: String },

    #[error("Bounding box {bbox} contains no grid points of '{path}'")]
    EmptyCrop { path: PathBuf, bbox: String },

    #[error(transparent)]
    Write(#[from] FrameWriteError),

    #[error("Failed to scan materialized file '{0}'")]
    ParquetScan(PathBuf, #[source] PolarsError),

    #[error("Failed processing grid frame: {0}")]
    DataFrameProcessing(#[from] PolarsError),

    #[error("Background task failed to complete")]
    TaskJoin(#[from] tokio::task::JoinError),
}

impl SnapshotError {
    /// Errors that indicate a bug or a corrupted storage directory rather than a
    /// problem with a single snapshot. These abort assembly under every policy.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            SnapshotError::MissingPrerequisite { .. } | SnapshotError::DataNotReady { .. }
        )
    }

    /// Errors meaning the archive will never have this snapshot.
    pub fn is_unavailable(&self) -> bool {
        matches!(
            self,
            SnapshotError::SnapshotUnavailable { .. } | SnapshotError::KnownUnavailable { .. }
        )
    }
}
