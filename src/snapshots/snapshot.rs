use crate::frame::scan;
use crate::naming::convention::NamingConvention;
use crate::snapshots::error::SnapshotError;
use crate::types::any_datetime::ARCHIVE_DT_FORMAT;
use crate::types::artifact::ArtifactKind;
use crate::types::bounding_box::BoundingBox;
use chrono::{DateTime, Utc};
use polars::prelude::LazyFrame;
use std::path::{Path, PathBuf};

/// Which of a snapshot's three artifacts are currently satisfied.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ArtifactState {
    pub raw: bool,
    pub decoded: bool,
    /// Present *and* cropped to the snapshot's bounding box.
    pub materialized: bool,
}

impl ArtifactState {
    pub fn get(&self, kind: ArtifactKind) -> bool {
        match kind {
            ArtifactKind::Raw => self.raw,
            ArtifactKind::Decoded => self.decoded,
            ArtifactKind::Materialized => self.materialized,
        }
    }

    pub(crate) fn set(&mut self, kind: ArtifactKind, present: bool) {
        match kind {
            ArtifactKind::Raw => self.raw = present,
            ArtifactKind::Decoded => self.decoded = present,
            ArtifactKind::Materialized => self.materialized = present,
        }
    }
}

/// One hour of precipitation data and the state of its files on disk.
///
/// Obtained from [`crate::ArtifactStore::snapshot`], which computes the state once
/// from the filesystem. [`crate::ArtifactStore::ensure_data`] brings it up to date.
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub(crate) name: NamingConvention,
    pub(crate) bbox: BoundingBox,
    pub(crate) raw_path: PathBuf,
    pub(crate) decoded_path: PathBuf,
    pub(crate) materialized_path: PathBuf,
    pub(crate) state: ArtifactState,
}

impl Snapshot {
    pub fn timestamp(&self) -> DateTime<Utc> {
        self.name.timestamp()
    }

    pub fn naming(&self) -> &NamingConvention {
        &self.name
    }

    pub fn bounding_box(&self) -> &BoundingBox {
        &self.bbox
    }

    pub fn state(&self) -> ArtifactState {
        self.state
    }

    pub fn url(&self) -> String {
        self.name.url()
    }

    pub fn path(&self, kind: ArtifactKind) -> &Path {
        match kind {
            ArtifactKind::Raw => &self.raw_path,
            ArtifactKind::Decoded => &self.decoded_path,
            ArtifactKind::Materialized => &self.materialized_path,
        }
    }

    pub fn is_ready(&self) -> bool {
        self.state.materialized
    }

    /// The materialized frame for this hour.
    ///
    /// Never does any work: if the materialized stage is not satisfied this fails
    /// with [`SnapshotError::DataNotReady`].
    pub fn data(&self) -> Result<LazyFrame, SnapshotError> {
        if !self.state.materialized {
            return Err(SnapshotError::DataNotReady {
                timestamp: self.timestamp_label(),
            });
        }
        scan(&self.materialized_path)
            .map_err(|e| SnapshotError::ParquetScan(self.materialized_path.clone(), e))
    }

    pub(crate) fn timestamp_label(&self) -> String {
        self.timestamp().format(ARCHIVE_DT_FORMAT).to_string()
    }
}
