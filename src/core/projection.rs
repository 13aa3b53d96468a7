//! Web Mercator (EPSG:3857) projection on an arbitrary reference ellipsoid.

use std::f64::consts::{FRAC_PI_2, FRAC_PI_4, PI};

use crate::core::geo::{Cartographic, Ellipsoid, Point};

/// Latitude (radians) at which the Mercator square ends, about 85.0511 degrees.
/// Equal to `mercator_angle_to_geodetic_latitude(PI)`.
pub const MAXIMUM_LATITUDE: f64 = 1.484_422_229_745_332_4;

/// Converts a Mercator angle in [-PI, PI] to a geodetic latitude in radians
pub fn mercator_angle_to_geodetic_latitude(mercator_angle: f64) -> f64 {
    FRAC_PI_2 - 2.0 * (-mercator_angle).exp().atan()
}

/// Converts a geodetic latitude in radians to a Mercator angle. Latitudes are
/// clamped to the Mercator square first.
pub fn geodetic_latitude_to_mercator_angle(latitude: f64) -> f64 {
    let latitude = latitude.clamp(-MAXIMUM_LATITUDE, MAXIMUM_LATITUDE);
    (FRAC_PI_4 + latitude / 2.0).tan().ln()
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WebMercatorProjection {
    ellipsoid: Ellipsoid,
    semimajor_axis: f64,
}

impl WebMercatorProjection {
    pub fn new(ellipsoid: Ellipsoid) -> Self {
        Self {
            ellipsoid,
            semimajor_axis: ellipsoid.maximum_radius(),
        }
    }

    pub fn ellipsoid(&self) -> &Ellipsoid {
        &self.ellipsoid
    }

    /// Converts to Web Mercator meters
    pub fn project(&self, position: &Cartographic) -> Point {
        Point::new(
            position.longitude * self.semimajor_axis,
            geodetic_latitude_to_mercator_angle(position.latitude) * self.semimajor_axis,
        )
    }

    /// Converts Web Mercator meters back to a geographic position
    pub fn unproject(&self, point: &Point) -> Cartographic {
        Cartographic::new(
            point.x / self.semimajor_axis,
            mercator_angle_to_geodetic_latitude(point.y / self.semimajor_axis),
        )
    }

    /// Half the side of the projected square, in meters
    pub fn half_extent(&self) -> f64 {
        self.semimajor_axis * PI
    }
}

impl Default for WebMercatorProjection {
    fn default() -> Self {
        Self::new(Ellipsoid::WGS84)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_maximum_latitude_matches_mercator_square() {
        assert!((mercator_angle_to_geodetic_latitude(PI) - MAXIMUM_LATITUDE).abs() < 1e-12);
        assert!((MAXIMUM_LATITUDE.to_degrees() - 85.051_128_78).abs() < 1e-6);
    }

    #[test]
    fn test_project_unproject() {
        let projection = WebMercatorProjection::default();
        let position = Cartographic::from_degrees(13.405, 52.52);
        let back = projection.unproject(&projection.project(&position));

        assert!((back.longitude - position.longitude).abs() < 1e-12);
        assert!((back.latitude - position.latitude).abs() < 1e-12);
    }

    #[test]
    fn test_project_clamps_poles() {
        let projection = WebMercatorProjection::default();
        let pole = projection.project(&Cartographic::new(0.0, FRAC_PI_2));
        assert!((pole.y - projection.half_extent()).abs() < 1e-6);
    }
}
