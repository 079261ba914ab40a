//! Raster-to-point sampling.
//!
//! A decoded deformation product is a dense single-band grid with a
//! bounding box in its native coordinate reference. [`sample_grid`]
//! reprojects WGS84 monitoring points into that reference, maps them to
//! pixel indices, and extracts calibrated displacement values. The
//! function is pure: no I/O, no shared state.

use serde::{Deserialize, Serialize};

use crate::geo::to_utm;
use crate::types::DbId;

/// Sentinel used by the processing service for pixels with no valid
/// measurement.
pub const DEFAULT_NODATA: f32 = -9999.0;

/// Default plausibility bound on a raw sample, in native units.
///
/// Samples whose absolute value exceeds this are treated as invalid even
/// when they differ from the declared nodata sentinel.
pub const DEFAULT_MAX_ABS_VALUE: f64 = 100.0;

/// Millimeters per native raster unit (meters).
const MM_PER_METER: f64 = 1000.0;

/// Axis-aligned bounding box in the grid's native coordinate reference.
///
/// Either geographic degrees or projected meters; [`GeoBounds::is_projected`]
/// distinguishes the two.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoBounds {
    pub west: f64,
    pub south: f64,
    pub east: f64,
    pub north: f64,
}

impl GeoBounds {
    /// Heuristic: geographic coordinates never exceed 180 in magnitude,
    /// so any larger axis value implies a projected system (e.g. UTM
    /// meters).
    pub fn is_projected(&self) -> bool {
        [self.west, self.south, self.east, self.north]
            .iter()
            .any(|v| v.abs() > 180.0)
    }

    /// True when the box has positive extent on both axes.
    pub fn is_degenerate(&self) -> bool {
        self.east <= self.west || self.north <= self.south
    }
}

/// A decoded single-band raster: row-major values, rows top-to-bottom.
#[derive(Debug, Clone)]
pub struct RasterGrid {
    pub width: usize,
    pub height: usize,
    pub bounds: GeoBounds,
    /// No-data sentinel declared by the producer.
    pub nodata: f32,
    /// Dense value buffer, `width * height` entries, native unit meters.
    pub values: Vec<f32>,
}

impl RasterGrid {
    /// Value at (col, row), or `None` when out of range.
    fn value_at(&self, col: usize, row: usize) -> Option<f32> {
        if col >= self.width || row >= self.height {
            return None;
        }
        self.values.get(row * self.width + col).copied()
    }
}

/// A WGS84 monitoring-point coordinate.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PointCoord {
    pub point_id: DbId,
    pub longitude: f64,
    pub latitude: f64,
}

/// Result of sampling one point against one grid.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SampledValue {
    pub point_id: DbId,
    /// Displacement in millimeters; meaningless when `valid` is false.
    pub displacement_mm: f64,
    pub valid: bool,
}

impl SampledValue {
    fn invalid(point_id: DbId) -> Self {
        Self {
            point_id,
            displacement_mm: 0.0,
            valid: false,
        }
    }
}

/// Tunables for the sampler.
#[derive(Debug, Clone, Copy)]
pub struct SampleConfig {
    /// Reject raw samples with `|value| > max_abs_value` (native units).
    pub max_abs_value: f64,
}

impl Default for SampleConfig {
    fn default() -> Self {
        Self {
            max_abs_value: DEFAULT_MAX_ABS_VALUE,
        }
    }
}

/// Sample a displacement grid at a set of geographic points.
///
/// Each point is handled independently: reprojection failure, pixels
/// outside the grid, nodata sentinels, non-finite values, and implausible
/// magnitudes all yield an invalid sample for that point without
/// affecting the others. Valid samples are converted from native meters
/// to millimeters.
pub fn sample_grid(
    grid: &RasterGrid,
    points: &[PointCoord],
    config: &SampleConfig,
) -> Vec<SampledValue> {
    points
        .iter()
        .map(|p| sample_point(grid, p, config))
        .collect()
}

/// Sample a coherence grid (values in [0, 1], unitless) at a set of
/// points. Returns `None` per point when the pixel is invalid or the
/// value falls outside [0, 1].
pub fn sample_coherence(grid: &RasterGrid, points: &[PointCoord]) -> Vec<Option<f64>> {
    points
        .iter()
        .map(|p| {
            pixel_for(grid, p)
                .and_then(|(col, row)| grid.value_at(col, row))
                .map(f64::from)
                .filter(|v| v.is_finite() && (0.0..=1.0).contains(v))
        })
        .collect()
}

fn sample_point(grid: &RasterGrid, point: &PointCoord, config: &SampleConfig) -> SampledValue {
    let Some((col, row)) = pixel_for(grid, point) else {
        return SampledValue::invalid(point.point_id);
    };

    let Some(raw) = grid.value_at(col, row) else {
        return SampledValue::invalid(point.point_id);
    };

    let value = f64::from(raw);
    if raw == grid.nodata || !value.is_finite() || value.abs() > config.max_abs_value {
        return SampledValue::invalid(point.point_id);
    }

    SampledValue {
        point_id: point.point_id,
        displacement_mm: value * MM_PER_METER,
        valid: true,
    }
}

/// Map a geographic point to a pixel (col, row) of the grid, or `None`
/// when the grid is degenerate, the point cannot be projected, or the
/// pixel falls outside `[0, width) x [0, height)`.
fn pixel_for(grid: &RasterGrid, point: &PointCoord) -> Option<(usize, usize)> {
    if grid.bounds.is_degenerate() || grid.width == 0 || grid.height == 0 {
        return None;
    }

    let (x, y) = if grid.bounds.is_projected() {
        let utm = to_utm(point.longitude, point.latitude).ok()?;
        (utm.easting, utm.northing)
    } else {
        (point.longitude, point.latitude)
    };

    let bounds = &grid.bounds;
    let norm_x = (x - bounds.west) / (bounds.east - bounds.west);
    let norm_y = (y - bounds.south) / (bounds.north - bounds.south);

    // Raster rows run top-to-bottom, so the north edge is row 0.
    let col = (norm_x * grid.width as f64).floor();
    let row = ((1.0 - norm_y) * grid.height as f64).floor();

    if col < 0.0 || row < 0.0 || col >= grid.width as f64 || row >= grid.height as f64 {
        return None;
    }

    Some((col as usize, row as usize))
}
