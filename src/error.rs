use crate::config::ConfigError;
use crate::dataset::error::DatasetError;
use crate::naming::error::NamingError;
use crate::snapshots::error::SnapshotError;
use crate::snapshots::transport::FetchError;
use crate::types::error::ValidationError;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MrmsError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Naming(#[from] NamingError),

    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Snapshot(#[from] SnapshotError),

    #[error(transparent)]
    Dataset(#[from] DatasetError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Failed to create storage directory '{0}'")]
    StorageDirCreation(PathBuf, #[source] std::io::Error),
}
