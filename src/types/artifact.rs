//! The three on-disk representations a snapshot goes through, and how they are
//! laid out under a storage root.

use serde::Deserialize;
use std::fmt;

/// One stage of a snapshot's local artifacts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ArtifactKind {
    /// The gzip-compressed GRIB2 file exactly as published by the archive.
    /// Deleted once it has been decompressed.
    Raw,
    /// The decompressed GRIB2 file, retained so re-crops skip the download.
    Decoded,
    /// The cropped, `f32`-normalized grid serialized as parquet.
    Materialized,
}

impl ArtifactKind {
    pub const ALL: [ArtifactKind; 3] = [
        ArtifactKind::Raw,
        ArtifactKind::Decoded,
        ArtifactKind::Materialized,
    ];

    /// File extension, including the leading dot.
    pub fn extension(&self) -> &'static str {
        match self {
            ArtifactKind::Raw => ".grib2.gz",
            ArtifactKind::Decoded => ".grib2",
            ArtifactKind::Materialized => ".parquet",
        }
    }

    fn label(&self) -> &'static str {
        match self {
            ArtifactKind::Raw => "raw",
            ArtifactKind::Decoded => "decoded",
            ArtifactKind::Materialized => "materialized",
        }
    }
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// Directory layout of artifacts below the storage root.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Layout {
    /// All files directly in the storage root.
    Flat,
    /// Files under `{YYYY}/{MM}/{DD}/`, mirroring the archive.
    #[default]
    Nested,
}
