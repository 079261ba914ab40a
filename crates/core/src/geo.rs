//! WGS84 geodesy helpers: UTM zone derivation and the ellipsoidal
//! transverse-Mercator forward projection.
//!
//! Deformation rasters are delivered either in geographic coordinates or
//! in the UTM zone covering the monitored area. Monitoring points are
//! always stored as WGS84 lon/lat, so sampling a projected raster needs a
//! forward projection into that zone's easting/northing.

use crate::error::CoreError;

/// WGS84 semi-major axis in meters.
const WGS84_A: f64 = 6_378_137.0;

/// WGS84 first eccentricity squared.
const WGS84_E2: f64 = 0.006_694_379_990_14;

/// UTM central-meridian scale factor.
const UTM_K0: f64 = 0.9996;

/// UTM false easting in meters.
const UTM_FALSE_EASTING: f64 = 500_000.0;

/// UTM false northing applied in the southern hemisphere.
const UTM_FALSE_NORTHING_SOUTH: f64 = 10_000_000.0;

/// A projected UTM coordinate.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UtmCoordinate {
    /// Easting in meters (false easting applied).
    pub easting: f64,
    /// Northing in meters (false northing applied in the south).
    pub northing: f64,
    /// Zone number, 1..=60.
    pub zone: u8,
    /// True for the northern hemisphere.
    pub north: bool,
}

/// Derive the UTM zone number from a longitude.
///
/// `zone = floor((lon + 180) / 6) + 1`, clamped so that exactly +180°
/// still lands in zone 60.
pub fn utm_zone(lon: f64) -> u8 {
    let zone = ((lon + 180.0) / 6.0).floor() as i32 + 1;
    zone.clamp(1, 60) as u8
}

/// Central meridian of a UTM zone, in degrees.
pub fn central_meridian(zone: u8) -> f64 {
    f64::from(zone) * 6.0 - 183.0
}

/// Forward-project a WGS84 lon/lat into UTM easting/northing.
///
/// Uses the standard series expansion for the transverse-Mercator
/// projection on the WGS84 ellipsoid. The zone is derived from the
/// point's own longitude and the hemisphere from its latitude sign.
///
/// Returns a validation error for coordinates outside the WGS84 domain
/// or poleward of ±84° where UTM is undefined.
pub fn to_utm(lon: f64, lat: f64) -> Result<UtmCoordinate, CoreError> {
    if !(-180.0..=180.0).contains(&lon) || !(-90.0..=90.0).contains(&lat) {
        return Err(CoreError::Validation(format!(
            "Coordinate ({lon}, {lat}) outside WGS84 range"
        )));
    }
    if lat.abs() > 84.0 {
        return Err(CoreError::Validation(format!(
            "Latitude {lat} is outside the UTM domain (|lat| <= 84)"
        )));
    }

    let zone = utm_zone(lon);
    let lon0 = central_meridian(zone).to_radians();

    let phi = lat.to_radians();
    let lambda = lon.to_radians();

    let e2 = WGS84_E2;
    // Second eccentricity squared.
    let ep2 = e2 / (1.0 - e2);

    let sin_phi = phi.sin();
    let cos_phi = phi.cos();
    let tan_phi = phi.tan();

    // Radius of curvature in the prime vertical.
    let n = WGS84_A / (1.0 - e2 * sin_phi * sin_phi).sqrt();
    let t = tan_phi * tan_phi;
    let c = ep2 * cos_phi * cos_phi;
    let a_term = cos_phi * (lambda - lon0);

    // Meridional arc length from the equator.
    let m = WGS84_A
        * ((1.0 - e2 / 4.0 - 3.0 * e2 * e2 / 64.0 - 5.0 * e2 * e2 * e2 / 256.0) * phi
            - (3.0 * e2 / 8.0 + 3.0 * e2 * e2 / 32.0 + 45.0 * e2 * e2 * e2 / 1024.0)
                * (2.0 * phi).sin()
            + (15.0 * e2 * e2 / 256.0 + 45.0 * e2 * e2 * e2 / 1024.0) * (4.0 * phi).sin()
            - (35.0 * e2 * e2 * e2 / 3072.0) * (6.0 * phi).sin());

    let easting = UTM_K0
        * n
        * (a_term
            + (1.0 - t + c) * a_term.powi(3) / 6.0
            + (5.0 - 18.0 * t + t * t + 72.0 * c - 58.0 * ep2) * a_term.powi(5) / 120.0)
        + UTM_FALSE_EASTING;

    let mut northing = UTM_K0
        * (m + n
            * tan_phi
            * (a_term * a_term / 2.0
                + (5.0 - t + 9.0 * c + 4.0 * c * c) * a_term.powi(4) / 24.0
                + (61.0 - 58.0 * t + t * t + 600.0 * c - 330.0 * ep2) * a_term.powi(6) / 720.0));

    let north = lat >= 0.0;
    if !north {
        northing += UTM_FALSE_NORTHING_SOUTH;
    }

    Ok(UtmCoordinate {
        easting,
        northing,
        zone,
        north,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    // -- utm_zone -------------------------------------------------------------

    #[test]
    fn zone_for_greenwich() {
        assert_eq!(utm_zone(0.0), 31);
    }

    #[test]
    fn zone_for_date_line_west() {
        assert_eq!(utm_zone(-180.0), 1);
    }

    #[test]
    fn zone_for_date_line_east_clamps() {
        assert_eq!(utm_zone(180.0), 60);
    }

    #[test]
    fn zone_for_rhone_valley() {
        // lon 4.5 -> floor(184.5 / 6) + 1 = 31
        assert_eq!(utm_zone(4.5), 31);
    }

    #[test]
    fn central_meridian_of_zone_31() {
        assert_eq!(central_meridian(31), 3.0);
    }

    // -- to_utm ---------------------------------------------------------------

    #[test]
    fn point_on_central_meridian_at_equator() {
        let utm = to_utm(3.0, 0.0).unwrap();
        assert_eq!(utm.zone, 31);
        assert!(utm.north);
        assert!((utm.easting - UTM_FALSE_EASTING).abs() < 1e-6);
        assert!(utm.northing.abs() < 1e-6);
    }

    #[test]
    fn southern_hemisphere_gets_false_northing() {
        let utm = to_utm(3.0, -0.001).unwrap();
        assert!(!utm.north);
        assert!(utm.northing > 9_999_000.0);
    }

    #[test]
    fn known_point_rhone_valley() {
        // 4.5E 44.5N: zone 31, roughly 619.2 km east, 4928.5 km north.
        let utm = to_utm(4.5, 44.5).unwrap();
        assert_eq!(utm.zone, 31);
        assert!((utm.easting - 619_247.0).abs() < 500.0, "easting {}", utm.easting);
        assert!((utm.northing - 4_928_504.0).abs() < 500.0, "northing {}", utm.northing);
    }

    #[test]
    fn easting_grows_eastward_of_central_meridian() {
        let west = to_utm(2.5, 44.0).unwrap();
        let east = to_utm(3.5, 44.0).unwrap();
        assert!(west.easting < UTM_FALSE_EASTING);
        assert!(east.easting > UTM_FALSE_EASTING);
    }

    #[test]
    fn out_of_range_longitude_rejected() {
        assert!(to_utm(190.0, 10.0).is_err());
    }

    #[test]
    fn polar_latitude_rejected() {
        assert!(to_utm(10.0, 88.0).is_err());
    }
}
