//! Orchestration of a whole time range: one snapshot per hour, processed in order,
//! merged into a single frame.

use crate::config::Settings;
use crate::dataset::error::DatasetError;
use crate::dataset::manifest::{Manifest, SnapshotOutcome};
use crate::dataset::merge::merge;
use crate::dataset::precip_frame::PrecipLazyFrame;
use crate::error::MrmsError;
use crate::snapshots::artifact_store::ArtifactStore;
use crate::snapshots::codec::{Grib2Decoder, GridDecoder};
use crate::snapshots::error::SnapshotError;
use crate::snapshots::snapshot::Snapshot;
use crate::snapshots::transport::{Fetcher, HttpFetcher};
use crate::types::any_datetime::ARCHIVE_DT_FORMAT;
use crate::types::bounding_box::BoundingBox;
use crate::types::time_range::TimeRange;
use crate::utils::ensure_storage_dir_exists;
use bon::bon;
use chrono::{DateTime, Utc};
use log::{info, warn};
use polars::prelude::LazyFrame;
use serde::Deserialize;
use std::collections::BTreeMap;

/// What to do when a single snapshot cannot be prepared.
///
/// Internal errors ([`SnapshotError::is_fatal`]) abort under both policies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailurePolicy {
    /// Record the failure in the manifest and go on with the next hour.
    #[default]
    Continue,
    /// Stop at the first failing hour.
    Abort,
}

/// Builds a precipitation dataset for a time range and bounding box.
///
/// # Examples
///
/// ```no_run
/// use mrms_qpe::{
///     ArtifactStore, BoundingBox, DatasetAssembler, Grib2Decoder, HttpFetcher,
///     MissingSnapshots, TimeRange,
/// };
/// use std::time::Duration;
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let missing = MissingSnapshots::new();
/// let store = ArtifactStore::builder()
///     .storage_root("/tmp/mrms")
///     .fetcher(HttpFetcher::new(Duration::from_secs(60))?)
///     .decoder(Grib2Decoder)
///     .missing(missing.clone())
///     .build();
///
/// let assembler = DatasetAssembler::builder()
///     .store(store)
///     .time_range(TimeRange::new("2017-08-01 00:00:00", "2017-08-03 00:00:00", &missing)?)
///     .bbox(BoundingBox::new(260.0, 290.0, 25.0, 40.0)?)
///     .build();
///
/// let data = assembler.get_data().await?;
/// println!("{}", data.manifest);
/// println!("{}", data.frame.collect()?);
/// # Ok(())
/// # }
/// ```
pub struct DatasetAssembler<F: Fetcher = HttpFetcher, D: GridDecoder = Grib2Decoder> {
    store: ArtifactStore<F, D>,
    time_range: TimeRange,
    bbox: BoundingBox,
    failure_policy: FailurePolicy,
}

#[bon]
impl<F: Fetcher, D: GridDecoder> DatasetAssembler<F, D> {
    /// `bbox` defaults to the full archive domain.
    #[builder]
    pub fn new(
        store: ArtifactStore<F, D>,
        time_range: TimeRange,
        #[builder(default)] bbox: BoundingBox,
        #[builder(default)] failure_policy: FailurePolicy,
    ) -> Self {
        Self {
            store,
            time_range,
            bbox,
            failure_policy,
        }
    }

    pub fn store(&self) -> &ArtifactStore<F, D> {
        &self.store
    }

    pub fn time_range(&self) -> &TimeRange {
        &self.time_range
    }

    pub fn bounding_box(&self) -> &BoundingBox {
        &self.bbox
    }

    pub fn failure_policy(&self) -> FailurePolicy {
        self.failure_policy
    }

    /// One snapshot per hour of the range, in order, all cropped to the same box and
    /// stored under the same root. Only reads the disk.
    pub fn snapshots(&self) -> Result<Vec<Snapshot>, DatasetError> {
        self.time_range
            .hours()
            .iter()
            .map(|hour| {
                self.store
                    .snapshot(*hour, &self.bbox)
                    .map_err(|source| snapshot_error(*hour, source))
            })
            .collect()
    }

    /// Prepares every hour of the range, one after the other, and merges the results
    /// into one frame sorted by time with no duplicate hours.
    ///
    /// Hours that could not be prepared are absent from the frame (no gap rows; see
    /// [`PrecipLazyFrame::gap_fill`]) and listed in the returned manifest.
    ///
    /// # Errors
    ///
    /// [`DatasetError::Snapshot`] for the first failing hour under
    /// [`FailurePolicy::Abort`], or for an internal error under either policy.
    pub async fn get_data(&self) -> Result<PrecipLazyFrame, DatasetError> {
        info!(
            "Assembling {} hourly snapshots, {}, {}",
            self.time_range.len(),
            self.time_range.print_bounds(),
            self.bbox
        );

        let mut manifest = Manifest::default();
        let mut frames: BTreeMap<DateTime<Utc>, LazyFrame> = BTreeMap::new();

        for &hour in self.time_range.hours() {
            match self.prepare(hour).await {
                Ok(frame) => {
                    frames.insert(hour, frame);
                    manifest.record(hour, SnapshotOutcome::Ready);
                }
                Err(e) if e.is_fatal() || self.failure_policy == FailurePolicy::Abort => {
                    return Err(snapshot_error(hour, e));
                }
                Err(e) if e.is_unavailable() => {
                    warn!("Skipping {}: {}", hour.format(ARCHIVE_DT_FORMAT), e);
                    manifest.record(hour, SnapshotOutcome::Unavailable(e.to_string()));
                }
                Err(e) => {
                    warn!("Snapshot {} failed: {}", hour.format(ARCHIVE_DT_FORMAT), e);
                    manifest.record(hour, SnapshotOutcome::Failed(error_chain(&e)));
                }
            }
        }

        info!(
            "Assembled {} of {} hours ({} unavailable, {} failed)",
            frames.len(),
            self.time_range.len(),
            manifest.unavailable().len(),
            manifest.failed().len()
        );
        let frame = merge(frames.into_values().collect())?;
        Ok(PrecipLazyFrame::new(frame, manifest))
    }

    async fn prepare(&self, hour: DateTime<Utc>) -> Result<LazyFrame, SnapshotError> {
        let mut snapshot = self.store.snapshot(hour, &self.bbox)?;
        self.store.ensure_data(&mut snapshot).await?;
        snapshot.data()
    }
}

impl DatasetAssembler {
    /// Assembler over the live archive, configured from `settings`.
    ///
    /// Creates the storage root if needed. `time_range` should come from
    /// [`Settings::time_range`] so it skips the same missing snapshots the store does.
    pub async fn from_settings(
        settings: &Settings,
        time_range: TimeRange,
    ) -> Result<Self, MrmsError> {
        let storage_root = settings.storage_root()?;
        ensure_storage_dir_exists(&storage_root)
            .await
            .map_err(|e| MrmsError::StorageDirCreation(storage_root.clone(), e))?;

        let store = ArtifactStore::builder()
            .storage_root(storage_root)
            .fetcher(HttpFetcher::new(settings.fetch.timeout())?)
            .decoder(Grib2Decoder)
            .layout(settings.layout)
            .missing(settings.missing_registry()?)
            .retry(settings.fetch.retry_policy())
            .missing_value(settings.missing_value)
            .build();

        Ok(Self::builder()
            .store(store)
            .time_range(time_range)
            .bbox(settings.bounding_box)
            .failure_policy(settings.failure_policy)
            .build())
    }
}

fn snapshot_error(hour: DateTime<Utc>, source: SnapshotError) -> DatasetError {
    DatasetError::Snapshot {
        timestamp: hour.format(ARCHIVE_DT_FORMAT).to_string(),
        source,
    }
}

fn error_chain(error: &dyn std::error::Error) -> String {
    let mut message = error.to_string();
    let mut source = error.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}
