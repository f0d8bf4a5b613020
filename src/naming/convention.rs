//! How the Iowa State MRMS archive names its files.
//!
//! The hourly QPE product was renamed when NCEP switched from the gauge-corrected
//! product to the multi-sensor pass-2 product, so both the variable name and the
//! URL depend on which era a timestamp falls in.

use crate::naming::error::NamingError;
use crate::types::any_datetime::ARCHIVE_DT_FORMAT;
use crate::types::artifact::{ArtifactKind, Layout};
use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

const ARCHIVE_BASE_URL: &str = "https://mtarchive.geol.iastate.edu";
const TIMESTAMP_MARKER: &str = "_00.00_";

/// First hour published as `GaugeCorr_QPE_01H`.
pub static GAUGECORR_BEGIN: LazyLock<DateTime<Utc>> =
    LazyLock::new(|| era_start(2015, 5, 6, 20));

/// First hour published as `MultiSensor_QPE_01H_Pass2`.
pub static MULTISENSOR_BEGIN: LazyLock<DateTime<Utc>> =
    LazyLock::new(|| era_start(2020, 10, 13, 19));

fn era_start(year: i32, month: u32, day: u32, hour: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(year, month, day, hour, 0, 0)
        .single()
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}

/// The archive product a snapshot belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Product {
    /// Radar QPE with gauge bias correction, `[GAUGECORR_BEGIN, MULTISENSOR_BEGIN)`.
    GaugeCorr,
    /// Multi-sensor QPE pass 2, from `MULTISENSOR_BEGIN` onwards.
    MultiSensor,
}

impl Product {
    /// Picks the product for a timestamp. A timestamp exactly on an era threshold
    /// belongs to the later era.
    pub fn for_timestamp(timestamp: DateTime<Utc>) -> Result<Self, NamingError> {
        if timestamp >= *MULTISENSOR_BEGIN {
            Ok(Product::MultiSensor)
        } else if timestamp >= *GAUGECORR_BEGIN {
            Ok(Product::GaugeCorr)
        } else {
            Err(NamingError::UnsupportedTimestamp(
                timestamp.format(ARCHIVE_DT_FORMAT).to_string(),
            ))
        }
    }

    pub fn variable_name(&self) -> &'static str {
        match self {
            Product::GaugeCorr => "GaugeCorr_QPE_01H",
            Product::MultiSensor => "MultiSensor_QPE_01H_Pass2",
        }
    }
}

impl fmt::Display for Product {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.variable_name())
    }
}

/// Names and locations of one snapshot, locally and in the remote archive.
///
/// # Examples
///
/// ```
/// use chrono::{TimeZone, Utc};
/// use mrms_qpe::{ArtifactKind, NamingConvention};
///
/// let ts = Utc.with_ymd_and_hms(2021, 6, 1, 12, 0, 0).unwrap();
/// let name = NamingConvention::new(ts).unwrap();
/// assert_eq!(name.variable(), "MultiSensor_QPE_01H_Pass2");
/// assert_eq!(
///     name.filename(ArtifactKind::Raw),
///     "MultiSensor_QPE_01H_Pass2_00.00_20210601-120000.grib2.gz"
/// );
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NamingConvention {
    timestamp: DateTime<Utc>,
    product: Product,
}

impl NamingConvention {
    pub fn new(timestamp: DateTime<Utc>) -> Result<Self, NamingError> {
        Ok(Self {
            timestamp,
            product: Product::for_timestamp(timestamp)?,
        })
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn product(&self) -> Product {
        self.product
    }

    pub fn variable(&self) -> &'static str {
        self.product.variable_name()
    }

    /// `{variable}_00.00_{YYYYmmdd-HHMMSS}`, without extension.
    pub fn base_filename(&self) -> String {
        format!(
            "{}{}{}",
            self.variable(),
            TIMESTAMP_MARKER,
            self.timestamp.format(ARCHIVE_DT_FORMAT)
        )
    }

    pub fn filename(&self, kind: ArtifactKind) -> String {
        format!("{}{}", self.base_filename(), kind.extension())
    }

    /// Path of an artifact relative to a storage root.
    pub fn relative_path(&self, kind: ArtifactKind, layout: Layout) -> PathBuf {
        let filename = self.filename(kind);
        match layout {
            Layout::Flat => PathBuf::from(filename),
            Layout::Nested => self.date_dir().join(filename),
        }
    }

    pub fn path_in(&self, root: &Path, kind: ArtifactKind, layout: Layout) -> PathBuf {
        root.join(self.relative_path(kind, layout))
    }

    pub fn url(&self) -> String {
        format!(
            "{}/{}/mrms/ncep/{}/{}",
            ARCHIVE_BASE_URL,
            self.timestamp.format("%Y/%m/%d"),
            self.variable(),
            self.filename(ArtifactKind::Raw)
        )
    }

    fn date_dir(&self) -> PathBuf {
        let ts = self.timestamp;
        PathBuf::from(ts.format("%Y").to_string())
            .join(ts.format("%m").to_string())
            .join(ts.format("%d").to_string())
    }

    /// Recovers the snapshot timestamp from any artifact filename or path.
    ///
    /// Directories are ignored; the timestamp is the text between the `_00.00_`
    /// marker and the first `.` after it.
    pub fn parse_filename(filename: &str) -> Result<DateTime<Utc>, NamingError> {
        let malformed = |reason: &str| NamingError::MalformedFilename {
            filename: filename.to_string(),
            reason: reason.to_string(),
        };

        let basename = Path::new(filename)
            .file_name()
            .and_then(|name| name.to_str())
            .ok_or_else(|| malformed("no file name component"))?;
        let (_, tail) = basename
            .split_once(TIMESTAMP_MARKER)
            .ok_or_else(|| malformed("missing '_00.00_' marker"))?;
        let stamp = tail.split('.').next().unwrap_or(tail);
        let naive = NaiveDateTime::parse_from_str(stamp, ARCHIVE_DT_FORMAT)
            .map_err(|e| malformed(&format!("bad timestamp '{stamp}': {e}")))?;
        Ok(Utc.from_utc_datetime(&naive))
    }

    /// The archive URL of the snapshot an artifact filename belongs to.
    pub fn url_for_filename(filename: &str) -> Result<String, NamingError> {
        let timestamp = Self::parse_filename(filename)?;
        Ok(Self::new(timestamp)?.url())
    }
}
