//! TOML configuration.
//!
//! ```toml
//! storage_root = "/data/mrms"
//! layout = "nested"
//! missing_value = -3.0
//! failure_policy = "continue"
//! missing_snapshots = ["20170801-020000"]
//!
//! [bounding_box]
//! lonmin = 260.0
//! lonmax = 290.0
//! latmin = 25.0
//! latmax = 40.0
//!
//! [fetch]
//! timeout_secs = 60
//! max_attempts = 3
//! ```
//!
//! Every key is optional.

use crate::dataset::assembler::FailurePolicy;
use crate::snapshots::retry::RetryPolicy;
use crate::types::any_datetime::AnyDateTime;
use crate::types::artifact::Layout;
use crate::types::bounding_box::BoundingBox;
use crate::types::error::ValidationError;
use crate::types::grid::DEFAULT_MISSING_VALUE;
use crate::types::missing_snapshots::MissingSnapshots;
use crate::types::time_range::TimeRange;
use crate::utils::get_cache_dir;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read configuration file '{0}'")]
    Read(PathBuf, #[source] std::io::Error),

    #[error("Invalid configuration: {0}")]
    Parse(#[from] toml::de::Error),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("No storage_root configured and the system cache directory is unknown")]
    StorageRootResolution(#[source] std::io::Error),
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    /// Where artifacts are kept. Defaults to `mrms_qpe_cache` in the system cache dir.
    pub storage_root: Option<PathBuf>,
    pub layout: Layout,
    pub bounding_box: BoundingBox,
    /// Hours the archive is known not to have, in any format
    /// [`AnyDateTime`] accepts for strings.
    pub missing_snapshots: Vec<String>,
    /// Sentinel marking cells without data in the decoded grids.
    pub missing_value: f32,
    pub failure_policy: FailurePolicy,
    pub fetch: FetchSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            storage_root: None,
            layout: Layout::default(),
            bounding_box: BoundingBox::default(),
            missing_snapshots: Vec::new(),
            missing_value: DEFAULT_MISSING_VALUE,
            failure_policy: FailurePolicy::default(),
            fetch: FetchSettings::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FetchSettings {
    pub timeout_secs: u64,
    pub max_attempts: u32,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
}

impl Default for FetchSettings {
    fn default() -> Self {
        Self {
            timeout_secs: 60,
            max_attempts: 3,
            initial_backoff_ms: 500,
            max_backoff_ms: 8000,
        }
    }
}

impl FetchSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts,
            initial_backoff: Duration::from_millis(self.initial_backoff_ms),
            max_backoff: Duration::from_millis(self.max_backoff_ms),
        }
    }
}

impl Settings {
    pub async fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| ConfigError::Read(path.to_path_buf(), e))?;
        Self::from_toml_str(&text)
    }

    /// Parses settings and checks that every listed missing snapshot is a valid
    /// timestamp.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let settings: Settings = toml::from_str(text)?;
        settings.missing_registry()?;
        Ok(settings)
    }

    /// The configured storage root, or the default cache location.
    pub fn storage_root(&self) -> Result<PathBuf, ConfigError> {
        match &self.storage_root {
            Some(root) => Ok(root.clone()),
            None => get_cache_dir().map_err(ConfigError::StorageRootResolution),
        }
    }

    pub fn missing_registry(&self) -> Result<MissingSnapshots, ValidationError> {
        MissingSnapshots::parse(&self.missing_snapshots)
    }

    /// A [`TimeRange`] that skips the configured missing snapshots.
    pub fn time_range(
        &self,
        start: impl AnyDateTime,
        end: impl AnyDateTime,
    ) -> Result<TimeRange, ValidationError> {
        TimeRange::new(start, end, &self.missing_registry()?)
    }
}
