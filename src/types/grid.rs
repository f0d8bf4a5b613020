use crate::types::bounding_box::{BoundingBox, GridExtent};

/// Value the MRMS QPE products use to flag cells without valid data.
pub const DEFAULT_MISSING_VALUE: f32 = -3.0;

/// A decoded precipitation grid in point form.
///
/// The three vectors are parallel: point `i` sits at `(latitudes[i], longitudes[i])`
/// and carries `values[i]`. Longitudes use the archive's 0-360 convention.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Grid {
    pub latitudes: Vec<f64>,
    pub longitudes: Vec<f64>,
    pub values: Vec<f32>,
}

/// A grid after cropping and masking: missing cells are `None`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CroppedGrid {
    pub latitudes: Vec<f64>,
    pub longitudes: Vec<f64>,
    pub values: Vec<Option<f32>>,
}

impl Grid {
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Keeps the points inside `bbox` and masks sentinel or NaN values to `None`.
    ///
    /// Output points are ordered by latitude, then longitude, so that every crop of
    /// the same grid to the same box serializes identically.
    pub fn crop(&self, bbox: &BoundingBox, missing_value: f32) -> CroppedGrid {
        let mut points: Vec<(f64, f64, Option<f32>)> = self
            .latitudes
            .iter()
            .zip(&self.longitudes)
            .zip(&self.values)
            .filter(|((lat, lon), _)| bbox.contains(**lat, **lon))
            .map(|((lat, lon), value)| {
                let masked = if value.is_nan() || *value == missing_value {
                    None
                } else {
                    Some(*value)
                };
                (*lat, *lon, masked)
            })
            .collect();
        points.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.total_cmp(&b.1)));

        let mut cropped = CroppedGrid {
            latitudes: Vec::with_capacity(points.len()),
            longitudes: Vec::with_capacity(points.len()),
            values: Vec::with_capacity(points.len()),
        };
        for (lat, lon, value) in points {
            cropped.latitudes.push(lat);
            cropped.longitudes.push(lon);
            cropped.values.push(value);
        }
        cropped
    }
}

impl CroppedGrid {
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn extent(&self) -> Option<GridExtent> {
        if self.is_empty() {
            return None;
        }
        let fold = |v: &[f64]| {
            v.iter()
                .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), x| {
                    (lo.min(*x), hi.max(*x))
                })
        };
        let (latmin, latmax) = fold(&self.latitudes);
        let (lonmin, lonmax) = fold(&self.longitudes);
        Some(GridExtent {
            lonmin,
            lonmax,
            latmin,
            latmax,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_grid() -> Grid {
        // 3x3 grid at 25..27 N, 260..262 E
        let mut grid = Grid::default();
        for lat in [25.0, 26.0, 27.0] {
            for lon in [260.0, 261.0, 262.0] {
                grid.latitudes.push(lat);
                grid.longitudes.push(lon);
                grid.values.push((lat + lon) as f32);
            }
        }
        grid
    }

    #[test]
    fn test_crop_keeps_inclusive_edges() {
        let bbox = BoundingBox::new(260.0, 261.0, 25.0, 26.0).unwrap();
        let cropped = sample_grid().crop(&bbox, DEFAULT_MISSING_VALUE);
        assert_eq!(cropped.len(), 4);
        assert_eq!(cropped.latitudes, vec![25.0, 25.0, 26.0, 26.0]);
        assert_eq!(cropped.longitudes, vec![260.0, 261.0, 260.0, 261.0]);
    }

    #[test]
    fn test_sentinel_is_masked_in_place() {
        let mut grid = sample_grid();
        grid.values[4] = -3.0; // (26, 261)
        grid.values[0] = f32::NAN; // (25, 260)
        let bbox = BoundingBox::new(259.0, 263.0, 24.0, 28.0).unwrap();
        let cropped = grid.crop(&bbox, -3.0);

        assert_eq!(cropped.len(), 9);
        assert_eq!(cropped.values[0], None);
        assert_eq!(cropped.values[4], None);
        assert_eq!((cropped.latitudes[4], cropped.longitudes[4]), (26.0, 261.0));
        assert_eq!(cropped.values.iter().filter(|v| v.is_none()).count(), 2);
    }

    #[test]
    fn test_extent() {
        let bbox = BoundingBox::new(260.5, 262.0, 25.5, 27.0).unwrap();
        let extent = sample_grid().crop(&bbox, -3.0).extent().unwrap();
        assert_eq!(
            extent,
            GridExtent {
                lonmin: 261.0,
                lonmax: 262.0,
                latmin: 26.0,
                latmax: 27.0
            }
        );
        assert!(CroppedGrid::default().extent().is_none());
    }
}
