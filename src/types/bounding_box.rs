//! Rectangular crop region for MRMS grids.
//!
//! MRMS products are published on a 0-360 longitude grid covering the continental
//! United States, so boxes are expressed in that convention and must fall inside
//! longitudes `[230, 300]` and latitudes `[20, 55]`.

use crate::types::error::ValidationError;
use serde::Deserialize;
use std::fmt;

/// Smallest longitude the archive grid covers (degrees east, 0-360 convention).
pub const DOMAIN_LON_MIN: f64 = 230.0;
/// Largest longitude the archive grid covers.
pub const DOMAIN_LON_MAX: f64 = 300.0;
/// Smallest latitude the archive grid covers.
pub const DOMAIN_LAT_MIN: f64 = 20.0;
/// Largest latitude the archive grid covers.
pub const DOMAIN_LAT_MAX: f64 = 55.0;

/// Maximum difference, in degrees, between a requested box edge and the matching
/// edge of a cropped grid for the two to be considered the same crop.
pub const EXTENT_TOLERANCE_DEG: f64 = 0.1;

/// A validated geographic box with inclusive coordinate ranges.
///
/// Instances can only be obtained through [`BoundingBox::new`] (or deserialization,
/// which goes through the same checks), so every `BoundingBox` in the program satisfies
/// `lonmin < lonmax`, `latmin < latmax` and lies inside the archive domain.
///
/// # Examples
///
/// ```
/// use mrms_qpe::BoundingBox;
///
/// let gulf_coast = BoundingBox::new(260.0, 290.0, 25.0, 40.0).unwrap();
/// assert!(gulf_coast.contains(30.0, 275.0));
///
/// assert!(BoundingBox::new(290.0, 260.0, 25.0, 40.0).is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(try_from = "RawBoundingBox")]
pub struct BoundingBox {
    lonmin: f64,
    lonmax: f64,
    latmin: f64,
    latmax: f64,
}

#[derive(Deserialize)]
struct RawBoundingBox {
    lonmin: f64,
    lonmax: f64,
    latmin: f64,
    latmax: f64,
}

impl TryFrom<RawBoundingBox> for BoundingBox {
    type Error = ValidationError;

    fn try_from(raw: RawBoundingBox) -> Result<Self, Self::Error> {
        BoundingBox::new(raw.lonmin, raw.lonmax, raw.latmin, raw.latmax)
    }
}

impl BoundingBox {
    /// Creates a bounding box, validating ordering and domain limits.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::InvalidBoundingBox`] when a minimum is not strictly
    /// below its maximum, when any edge falls outside the archive domain, or when an
    /// edge is not a finite number.
    pub fn new(lonmin: f64, lonmax: f64, latmin: f64, latmax: f64) -> Result<Self, ValidationError> {
        let invalid = |reason: String| Err(ValidationError::InvalidBoundingBox { reason });

        if ![lonmin, lonmax, latmin, latmax].iter().all(|v| v.is_finite()) {
            return invalid("all edges must be finite numbers".to_string());
        }
        if lonmin >= lonmax {
            return invalid(format!(
                "min longitude ({lonmin}) must be less than max longitude ({lonmax})"
            ));
        }
        if lonmin < DOMAIN_LON_MIN {
            return invalid(format!("min longitude ({lonmin}) must be at least {DOMAIN_LON_MIN}"));
        }
        if lonmax > DOMAIN_LON_MAX {
            return invalid(format!(
                "max longitude ({lonmax}) must be no greater than {DOMAIN_LON_MAX}"
            ));
        }
        if latmin >= latmax {
            return invalid(format!(
                "min latitude ({latmin}) must be less than max latitude ({latmax})"
            ));
        }
        if latmin < DOMAIN_LAT_MIN {
            return invalid(format!("min latitude ({latmin}) must be at least {DOMAIN_LAT_MIN}"));
        }
        if latmax > DOMAIN_LAT_MAX {
            return invalid(format!(
                "max latitude ({latmax}) must be no greater than {DOMAIN_LAT_MAX}"
            ));
        }

        Ok(Self {
            lonmin,
            lonmax,
            latmin,
            latmax,
        })
    }

    pub fn lonmin(&self) -> f64 {
        self.lonmin
    }

    pub fn lonmax(&self) -> f64 {
        self.lonmax
    }

    pub fn latmin(&self) -> f64 {
        self.latmin
    }

    pub fn latmax(&self) -> f64 {
        self.latmax
    }

    /// Whether a grid point lies inside the box. Both edges are inclusive.
    pub fn contains(&self, latitude: f64, longitude: f64) -> bool {
        (self.latmin..=self.latmax).contains(&latitude)
            && (self.lonmin..=self.lonmax).contains(&longitude)
    }

    /// Checks whether a grid whose coordinates span `extent` was cropped to this box.
    ///
    /// Each edge may differ by at most [`EXTENT_TOLERANCE_DEG`], which absorbs the
    /// snapping of the requested edges to the nearest grid points.
    pub fn matches_extent(&self, extent: &GridExtent) -> bool {
        let close = |a: f64, b: f64| (a - b).abs() <= EXTENT_TOLERANCE_DEG;
        close(self.lonmin, extent.lonmin)
            && close(self.lonmax, extent.lonmax)
            && close(self.latmin, extent.latmin)
            && close(self.latmax, extent.latmax)
    }
}

impl Default for BoundingBox {
    /// The full archive domain.
    fn default() -> Self {
        Self {
            lonmin: DOMAIN_LON_MIN,
            lonmax: DOMAIN_LON_MAX,
            latmin: DOMAIN_LAT_MIN,
            latmax: DOMAIN_LAT_MAX,
        }
    }
}

impl fmt::Display for BoundingBox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "lon [{}, {}] lat [{}, {}]",
            self.lonmin, self.lonmax, self.latmin, self.latmax
        )
    }
}

/// The coordinate range actually present in a grid. Unlike [`BoundingBox`] this is
/// not validated, it simply records what was read back from data.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GridExtent {
    pub lonmin: f64,
    pub lonmax: f64,
    pub latmin: f64,
    pub latmax: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_box_constructs() {
        let bbox = BoundingBox::new(260.0, 290.0, 25.0, 40.0).unwrap();
        assert_eq!(bbox.lonmin(), 260.0);
        assert_eq!(bbox.lonmax(), 290.0);
        assert_eq!(bbox.latmin(), 25.0);
        assert_eq!(bbox.latmax(), 40.0);
    }

    #[test]
    fn test_reversed_longitudes_rejected() {
        let err = BoundingBox::new(290.0, 260.0, 25.0, 40.0).unwrap_err();
        assert!(matches!(err, ValidationError::InvalidBoundingBox { .. }));
    }

    #[test]
    fn test_reversed_latitudes_rejected() {
        assert!(BoundingBox::new(260.0, 290.0, 40.0, 25.0).is_err());
        assert!(BoundingBox::new(260.0, 290.0, 30.0, 30.0).is_err());
    }

    #[test]
    fn test_out_of_domain_rejected() {
        assert!(BoundingBox::new(229.9, 290.0, 25.0, 40.0).is_err());
        assert!(BoundingBox::new(260.0, 300.1, 25.0, 40.0).is_err());
        assert!(BoundingBox::new(260.0, 290.0, 19.0, 40.0).is_err());
        assert!(BoundingBox::new(260.0, 290.0, 25.0, 56.0).is_err());
        // -100 in the -180..180 convention is 260 in the archive convention.
        assert!(BoundingBox::new(-100.0, -80.0, 25.0, 40.0).is_err());
        assert!(BoundingBox::new(f64::NAN, 290.0, 25.0, 40.0).is_err());
    }

    #[test]
    fn test_domain_edges_are_inclusive() {
        let full = BoundingBox::new(230.0, 300.0, 20.0, 55.0).unwrap();
        assert_eq!(full, BoundingBox::default());
        assert!(full.contains(20.0, 230.0));
        assert!(full.contains(55.0, 300.0));
        assert!(!full.contains(55.01, 300.0));
    }

    #[test]
    fn test_extent_tolerance() {
        let bbox = BoundingBox::new(260.0, 290.0, 25.0, 40.0).unwrap();
        let snapped = GridExtent {
            lonmin: 260.005,
            lonmax: 289.995,
            latmin: 25.005,
            latmax: 39.995,
        };
        assert!(bbox.matches_extent(&snapped));

        let other = GridExtent {
            lonmin: 265.0,
            ..snapped
        };
        assert!(!bbox.matches_extent(&other));
    }

    #[test]
    fn test_deserialize_validates() {
        let ok: Result<BoundingBox, _> =
            toml::from_str("lonmin = 260.0\nlonmax = 290.0\nlatmin = 25.0\nlatmax = 40.0");
        assert!(ok.is_ok());

        let bad: Result<BoundingBox, _> =
            toml::from_str("lonmin = 290.0\nlonmax = 260.0\nlatmin = 25.0\nlatmax = 40.0");
        assert!(bad.is_err());
    }
}
