mod config;
mod dataset;
mod error;
pub mod frame;
mod naming;
mod snapshots;
mod types;
mod utils;

pub use config::{ConfigError, FetchSettings, Settings};
pub use error::MrmsError;

pub use naming::convention::{NamingConvention, Product, GAUGECORR_BEGIN, MULTISENSOR_BEGIN};
pub use naming::error::NamingError;

pub use types::any_datetime::{AnyDateTime, ARCHIVE_DT_FORMAT};
pub use types::artifact::{ArtifactKind, Layout};
pub use types::bounding_box::*;
pub use types::error::ValidationError;
pub use types::grid::{CroppedGrid, Grid, DEFAULT_MISSING_VALUE};
pub use types::missing_snapshots::MissingSnapshots;
pub use types::time_range::{validate_timestamp, TimeRange};
pub use types::year::Year;

pub use snapshots::artifact_store::ArtifactStore;
pub use snapshots::codec::{decompress, DecodeError, Grib2Decoder, GridDecoder};
pub use snapshots::error::SnapshotError;
pub use snapshots::retry::{RetryFailure, RetryPolicy};
pub use snapshots::snapshot::{ArtifactState, Snapshot};
pub use snapshots::transport::{FetchError, Fetcher, HttpFetcher};
pub use snapshots::validity::{ArtifactCheck, FileExists, NonEmptyFile};

pub use dataset::assembler::{DatasetAssembler, FailurePolicy};
pub use dataset::error::DatasetError;
pub use dataset::manifest::{Manifest, SnapshotOutcome};
pub use dataset::merge::{combine_files, gap_fill, merge};
pub use dataset::precip_frame::PrecipLazyFrame;

pub use utils::get_cache_dir;
