//! Local artifact cache for hourly snapshots.
//!
//! Each snapshot moves through three files under the storage root:
//!
//! 1. **raw**: `*.grib2.gz` as downloaded; deleted after decompression.
//! 2. **decoded**: `*.grib2`, kept so that a new bounding box only needs a re-crop.
//! 3. **materialized**: `*.parquet`, the grid cropped to one bounding box.
//!
//! [`ArtifactStore::snapshot`] inspects the disk once; [`ArtifactStore::ensure_data`]
//! then performs only the stages that are missing, strictly in that order.

use crate::frame::{grid_to_frame, read_extent, write_parquet};
use crate::naming::convention::NamingConvention;
use crate::snapshots::codec::{decompress, Grib2Decoder, GridDecoder};
use crate::snapshots::error::SnapshotError;
use crate::snapshots::retry::RetryPolicy;
use crate::snapshots::snapshot::{ArtifactState, Snapshot};
use crate::snapshots::transport::{FetchError, Fetcher, HttpFetcher};
use crate::snapshots::validity::{ArtifactCheck, FileExists};
use crate::types::artifact::{ArtifactKind, Layout};
use crate::types::bounding_box::BoundingBox;
use crate::types::grid::DEFAULT_MISSING_VALUE;
use crate::types::missing_snapshots::MissingSnapshots;
use crate::types::time_range::validate_timestamp;
use bon::bon;
use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;

pub struct ArtifactStore<F: Fetcher = HttpFetcher, D: GridDecoder = Grib2Decoder> {
    storage_root: PathBuf,
    layout: Layout,
    fetcher: F,
    decoder: Arc<D>,
    check: Box<dyn ArtifactCheck>,
    missing: MissingSnapshots,
    retry: RetryPolicy,
    missing_value: f32,
}

#[bon]
impl<F: Fetcher, D: GridDecoder> ArtifactStore<F, D> {
    /// Creates a store rooted at `storage_root`.
    ///
    /// `missing` lists hours the archive is known not to have; the store refuses to
    /// fetch them. `check` defaults to [`FileExists`].
    #[builder]
    pub fn new(
        #[builder(into)] storage_root: PathBuf,
        fetcher: F,
        decoder: D,
        #[builder(default)] layout: Layout,
        #[builder(default)] missing: MissingSnapshots,
        #[builder(default)] retry: RetryPolicy,
        #[builder(default = DEFAULT_MISSING_VALUE)] missing_value: f32,
        check: Option<Box<dyn ArtifactCheck>>,
    ) -> Self {
        Self {
            storage_root,
            layout,
            fetcher,
            decoder: Arc::new(decoder),
            check: check.unwrap_or_else(|| Box::new(FileExists)),
            missing,
            retry,
            missing_value,
        }
    }

    pub fn storage_root(&self) -> &Path {
        &self.storage_root
    }

    pub fn layout(&self) -> Layout {
        self.layout
    }

    pub fn missing_snapshots(&self) -> &MissingSnapshots {
        &self.missing
    }

    pub fn fetcher(&self) -> &F {
        &self.fetcher
    }

    pub fn decoder(&self) -> &D {
        &self.decoder
    }

    /// Describes the snapshot for `timestamp` cropped to `bbox`, with its artifact
    /// state read from disk.
    ///
    /// A materialized file only counts as present when the coordinate range stored
    /// in it matches `bbox`; otherwise it is considered stale and will be rewritten.
    ///
    /// # Errors
    ///
    /// [`SnapshotError::Validation`] for a timestamp that is not on the hour or
    /// predates the archive, [`SnapshotError::Naming`] if no product covers it.
    pub fn snapshot(
        &self,
        timestamp: DateTime<Utc>,
        bbox: &BoundingBox,
    ) -> Result<Snapshot, SnapshotError> {
        validate_timestamp(timestamp)?;
        let name = NamingConvention::new(timestamp)?;
        let path = |kind: ArtifactKind| name.path_in(&self.storage_root, kind, self.layout);
        let (raw_path, decoded_path, materialized_path) = (
            path(ArtifactKind::Raw),
            path(ArtifactKind::Decoded),
            path(ArtifactKind::Materialized),
        );

        let state = ArtifactState {
            raw: self.check.is_present(&raw_path),
            decoded: self.check.is_present(&decoded_path),
            materialized: self.check.is_present(&materialized_path)
                && materialized_matches(&materialized_path, bbox),
        };
        debug!("Snapshot {} state: {:?}", name.base_filename(), state);

        Ok(Snapshot {
            name,
            bbox: *bbox,
            raw_path,
            decoded_path,
            materialized_path,
            state,
        })
    }

    /// Brings every stage of `snapshot` up to date, doing only the missing work.
    ///
    /// Calling this on a snapshot that is already materialized touches neither the
    /// network nor the decoder.
    ///
    /// # Errors
    ///
    /// * [`SnapshotError::KnownUnavailable`]: the hour is in the missing list.
    /// * [`SnapshotError::SnapshotUnavailable`]: the archive answered 404.
    /// * [`SnapshotError::FetchFailed`]: transient failures outlasted the retry policy.
    /// * [`SnapshotError::EmptyCrop`]: the bounding box holds no grid points.
    /// * [`SnapshotError::MissingPrerequisite`]: a stage's input vanished from disk.
    /// * I/O, decode and encoding errors with the offending path.
    pub async fn ensure_data(&self, snapshot: &mut Snapshot) -> Result<(), SnapshotError> {
        if snapshot.state.materialized {
            debug!("Cache hit for {}", snapshot.timestamp_label());
            return Ok(());
        }

        if !snapshot.state.decoded {
            if !snapshot.state.raw {
                self.fetch_raw(snapshot).await?;
            }
            self.decompress_raw(snapshot).await?;
        }
        self.materialize(snapshot).await
    }

    async fn fetch_raw(&self, snapshot: &mut Snapshot) -> Result<(), SnapshotError> {
        let timestamp = snapshot.timestamp();
        if self.missing.contains(&timestamp) {
            return Err(SnapshotError::KnownUnavailable {
                timestamp: snapshot.timestamp_label(),
            });
        }
        create_parent_dir(&snapshot.raw_path).await?;

        let url = snapshot.url();
        let fetcher = &self.fetcher;
        let url_ref = url.as_str();
        let destination = snapshot.raw_path.as_path();
        let result = self
            .retry
            .run(url_ref, move || fetcher.fetch(url_ref, destination))
            .await;

        match result {
            Ok(bytes) => {
                info!("Fetched {} ({} bytes)", url, bytes);
                snapshot.state.set(ArtifactKind::Raw, true);
                Ok(())
            }
            Err(failure) => match failure.error {
                FetchError::NotFound { .. } => Err(SnapshotError::SnapshotUnavailable { url }),
                error => Err(SnapshotError::FetchFailed {
                    url,
                    attempts: failure.attempts,
                    source: error,
                }),
            },
        }
    }

    async fn decompress_raw(&self, snapshot: &mut Snapshot) -> Result<(), SnapshotError> {
        let raw = snapshot.raw_path.clone();
        if !self.check.is_present(&raw) {
            return Err(SnapshotError::MissingPrerequisite {
                stage: ArtifactKind::Decoded,
                input: raw,
            });
        }
        create_parent_dir(&snapshot.decoded_path).await?;

        let bytes = decompress(&raw, &snapshot.decoded_path)
            .await
            .map_err(|e| SnapshotError::Decompress(raw.clone(), e))?;
        debug!("Decompressed {:?} ({} bytes)", snapshot.decoded_path, bytes);
        snapshot.state.set(ArtifactKind::Decoded, true);

        fs::remove_file(&raw)
            .await
            .map_err(|e| SnapshotError::Delete(raw.clone(), e))?;
        snapshot.state.set(ArtifactKind::Raw, false);
        Ok(())
    }

    async fn materialize(&self, snapshot: &mut Snapshot) -> Result<(), SnapshotError> {
        let decoded = snapshot.decoded_path.clone();
        if !self.check.is_present(&decoded) {
            return Err(SnapshotError::MissingPrerequisite {
                stage: ArtifactKind::Materialized,
                input: decoded,
            });
        }
        create_parent_dir(&snapshot.materialized_path).await?;

        let decoder = Arc::clone(&self.decoder);
        let output = snapshot.materialized_path.clone();
        let bbox = snapshot.bbox;
        let timestamp = snapshot.timestamp();
        let missing_value = self.missing_value;

        let points = tokio::task::spawn_blocking(move || -> Result<usize, SnapshotError> {
            let grid = decoder
                .decode(&decoded)
                .map_err(|e| SnapshotError::GridDecode {
                    path: decoded.clone(),
                    message: e.to_string(),
                })?;
            let cropped = grid.crop(&bbox, missing_value);
            if cropped.is_empty() {
                return Err(SnapshotError::EmptyCrop {
                    path: decoded,
                    bbox: bbox.to_string(),
                });
            }
            let frame = grid_to_frame(timestamp, &cropped)?;
            write_parquet(frame, &output)?;
            Ok(cropped.len())
        })
        .await??;

        info!(
            "Materialized {} ({} points, {})",
            snapshot.timestamp_label(),
            points,
            snapshot.bbox
        );
        snapshot.state.set(ArtifactKind::Materialized, true);
        Ok(())
    }
}

fn materialized_matches(path: &Path, bbox: &BoundingBox) -> bool {
    match read_extent(path) {
        Ok(Some(extent)) => {
            let matches = bbox.matches_extent(&extent);
            if !matches {
                debug!("{:?} was cropped to {:?}, not {}; treating as stale", path, extent, bbox);
            }
            matches
        }
        Ok(None) => false,
        Err(e) => {
            warn!("Unreadable materialized file {:?}, will rewrite: {}", path, e);
            false
        }
    }
}

async fn create_parent_dir(path: &Path) -> Result<(), SnapshotError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .await
            .map_err(|e| SnapshotError::StorageDirCreation(parent.to_path_buf(), e))?;
    }
    Ok(())
}


#[cfg(test)]
mod tests {
    use super::test_support::{MockDecoder, MockFetcher};
    use super::*;
    use crate::frame::{COL_LATITUDE, COL_LONGITUDE, COL_PRECIP};
    use chrono::TimeZone;
    use polars::prelude::*;
    use std::time::Duration;

    fn hour() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2017, 8, 1, 5, 0, 0).unwrap()
    }

    fn full_box() -> BoundingBox {
        BoundingBox::new(260.0, 262.0, 25.0, 27.0).unwrap()
    }

    fn store(root: &Path, fetcher: MockFetcher) -> ArtifactStore<MockFetcher, MockDecoder> {
        ArtifactStore::builder()
            .storage_root(root)
            .fetcher(fetcher)
            .decoder(MockDecoder::default())
            .retry(RetryPolicy {
                max_attempts: 3,
                initial_backoff: Duration::ZERO,
                max_backoff: Duration::ZERO,
            })
            .build()
    }

    #[tokio::test]
    async fn test_fresh_snapshot_has_no_artifacts() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempfile::tempdir()?;
        let store = store(dir.path(), MockFetcher::default());
        let snapshot = store.snapshot(hour(), &full_box())?;

        assert_eq!(snapshot.state(), ArtifactState::default());
        assert!(matches!(snapshot.data(), Err(SnapshotError::DataNotReady { .. })));
        assert!(snapshot
            .path(ArtifactKind::Materialized)
            .ends_with("2017/08/01/GaugeCorr_QPE_01H_00.00_20170801-050000.parquet"));
        Ok(())
    }

    #[tokio::test]
    async fn test_ensure_data_is_idempotent() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempfile::tempdir()?;
        let store = store(dir.path(), MockFetcher::default());

        let mut snapshot = store.snapshot(hour(), &full_box())?;
        store.ensure_data(&mut snapshot).await?;
        assert!(snapshot.is_ready());
        assert!(!snapshot.state().raw);
        assert!(snapshot.state().decoded);
        assert!(!snapshot.path(ArtifactKind::Raw).exists());
        assert_eq!(store.fetcher().calls(), 1);
        assert_eq!(store.decoder().calls(), 1);

        // Same object again.
        store.ensure_data(&mut snapshot).await?;
        // A fresh view of the same hour sees everything on disk.
        let mut again = store.snapshot(hour(), &full_box())?;
        assert!(again.is_ready());
        store.ensure_data(&mut again).await?;

        assert_eq!(store.fetcher().calls(), 1);
        assert_eq!(store.decoder().calls(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_new_bbox_recrops_without_refetch() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempfile::tempdir()?;
        let store = store(dir.path(), MockFetcher::default());

        let mut first = store.snapshot(hour(), &full_box())?;
        store.ensure_data(&mut first).await?;

        let corner = BoundingBox::new(260.0, 261.0, 25.0, 26.0)?;
        let mut second = store.snapshot(hour(), &corner)?;
        assert!(second.state().decoded);
        assert!(!second.state().materialized);

        store.ensure_data(&mut second).await?;
        assert_eq!(store.fetcher().calls(), 1);
        assert_eq!(store.decoder().calls(), 2);
        assert_eq!(second.data()?.collect()?.height(), 4);

        // The file now belongs to the corner box.
        assert!(!store.snapshot(hour(), &full_box())?.is_ready());
        Ok(())
    }

    #[tokio::test]
    async fn test_sentinel_is_masked() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempfile::tempdir()?;
        let store = store(dir.path(), MockFetcher::default());
        let mut snapshot = store.snapshot(hour(), &full_box())?;
        store.ensure_data(&mut snapshot).await?;

        let frame = snapshot.data()?.collect()?;
        assert_eq!(frame.height(), 9);
        assert_eq!(frame.column(COL_PRECIP)?.null_count(), 1);

        let masked = snapshot
            .data()?
            .filter(
                col(COL_LATITUDE)
                    .eq(lit(26.0))
                    .and(col(COL_LONGITUDE).eq(lit(261.0))),
            )
            .collect()?;
        assert_eq!(masked.height(), 1);
        assert_eq!(masked.column(COL_PRECIP)?.f32()?.get(0), None);
        Ok(())
    }

    #[tokio::test]
    async fn test_known_missing_is_not_fetched() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempfile::tempdir()?;
        let store = ArtifactStore::builder()
            .storage_root(dir.path())
            .fetcher(MockFetcher::default())
            .decoder(MockDecoder::default())
            .missing([hour()].into_iter().collect())
            .build();

        let mut snapshot = store.snapshot(hour(), &full_box())?;
        let err = store.ensure_data(&mut snapshot).await.unwrap_err();
        assert!(matches!(err, SnapshotError::KnownUnavailable { .. }));
        assert!(err.is_unavailable());
        assert_eq!(store.fetcher().calls(), 0);
        Ok(())
    }

    #[tokio::test]
    async fn test_not_found_is_unavailable() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempfile::tempdir()?;
        let fetcher = MockFetcher {
            not_found: true,
            ..Default::default()
        };
        let store = store(dir.path(), fetcher);

        let mut snapshot = store.snapshot(hour(), &full_box())?;
        let err = store.ensure_data(&mut snapshot).await.unwrap_err();
        assert!(matches!(err, SnapshotError::SnapshotUnavailable { .. }));
        assert!(!err.is_fatal());
        assert_eq!(store.fetcher().calls(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_transient_errors_are_retried() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempfile::tempdir()?;
        let fetcher = MockFetcher {
            transient_failures: 2,
            ..Default::default()
        };
        let store = store(dir.path(), fetcher);

        let mut snapshot = store.snapshot(hour(), &full_box())?;
        store.ensure_data(&mut snapshot).await?;
        assert_eq!(store.fetcher().calls(), 3);
        assert!(snapshot.is_ready());
        Ok(())
    }

    #[tokio::test]
    async fn test_exhausted_retries_fail_fetch() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempfile::tempdir()?;
        let fetcher = MockFetcher {
            transient_failures: 10,
            ..Default::default()
        };
        let store = store(dir.path(), fetcher);

        let mut snapshot = store.snapshot(hour(), &full_box())?;
        let err = store.ensure_data(&mut snapshot).await.unwrap_err();
        match err {
            SnapshotError::FetchFailed { attempts, .. } => assert_eq!(attempts, 3),
            other => panic!("unexpected error: {other}"),
        }
        assert!(!snapshot.state().raw);
        Ok(())
    }

    #[tokio::test]
    async fn test_vanished_decoded_file_is_missing_prerequisite(
    ) -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempfile::tempdir()?;
        let store = store(dir.path(), MockFetcher::default());
        let mut first = store.snapshot(hour(), &full_box())?;
        store.ensure_data(&mut first).await?;

        let corner = BoundingBox::new(260.0, 261.0, 25.0, 26.0)?;
        let mut stale = store.snapshot(hour(), &corner)?;
        std::fs::remove_file(stale.path(ArtifactKind::Decoded))?;

        let err = store.ensure_data(&mut stale).await.unwrap_err();
        assert!(matches!(
            err,
            SnapshotError::MissingPrerequisite {
                stage: ArtifactKind::Materialized,
                ..
            }
        ));
        assert!(err.is_fatal());
        Ok(())
    }

    #[tokio::test]
    async fn test_box_outside_grid_is_empty_crop() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempfile::tempdir()?;
        let store = store(dir.path(), MockFetcher::default());
        let elsewhere = BoundingBox::new(280.0, 290.0, 40.0, 45.0)?;
        let mut snapshot = store.snapshot(hour(), &elsewhere)?;

        let err = store.ensure_data(&mut snapshot).await.unwrap_err();
        assert!(matches!(err, SnapshotError::EmptyCrop { .. }));
        assert!(!snapshot.is_ready());
        Ok(())
    }

    #[tokio::test]
    async fn test_flat_layout_and_unaligned_timestamp() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempfile::tempdir()?;
        let store = ArtifactStore::builder()
            .storage_root(dir.path())
            .fetcher(MockFetcher::default())
            .decoder(MockDecoder::default())
            .layout(Layout::Flat)
            .build();

        let snapshot = store.snapshot(hour(), &full_box())?;
        assert_eq!(
            snapshot.path(ArtifactKind::Decoded),
            dir.path().join("GaugeCorr_QPE_01H_00.00_20170801-050000.grib2")
        );

        let half_past = hour() + chrono::Duration::minutes(30);
        assert!(matches!(
            store.snapshot(half_past, &full_box()),
            Err(SnapshotError::Validation(_))
        ));
        Ok(())
    }
}
