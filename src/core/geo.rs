use serde::{Deserialize, Serialize};
use std::f64::consts::{FRAC_PI_2, PI};
use std::fmt;

use crate::core::constants::{MAX_TILE_LEVEL, WGS84_POLAR_RADIUS, WGS84_RADIUS};

/// A geographic position. Longitude and latitude are in radians, height in meters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Cartographic {
    pub longitude: f64,
    pub latitude: f64,
    #[serde(default)]
    pub height: f64,
}

impl Cartographic {
    /// Creates a new position on the ellipsoid surface
    pub fn new(longitude: f64, latitude: f64) -> Self {
        Self {
            longitude,
            latitude,
            height: 0.0,
        }
    }

    /// Creates a position from longitude and latitude given in degrees
    pub fn from_degrees(longitude: f64, latitude: f64) -> Self {
        Self::new(longitude.to_radians(), latitude.to_radians())
    }

    /// Validates that the coordinates are within valid ranges
    pub fn is_valid(&self) -> bool {
        self.longitude.is_finite()
            && self.latitude.is_finite()
            && (-PI..=PI).contains(&self.longitude)
            && (-FRAC_PI_2..=FRAC_PI_2).contains(&self.latitude)
    }
}

impl Default for Cartographic {
    fn default() -> Self {
        Self::new(0.0, 0.0)
    }
}

/// Represents a point in projected coordinates (meters for Web Mercator)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

impl Default for Point {
    fn default() -> Self {
        Self::new(0.0, 0.0)
    }
}

/// A geographic bounding box in radians.
///
/// Rectangles never cross the antimeridian: `west <= east` and `south <= north`
/// for every rectangle accepted by the provider.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rectangle {
    pub west: f64,
    pub south: f64,
    pub east: f64,
    pub north: f64,
}

impl Rectangle {
    /// The largest possible rectangle: the whole globe.
    pub const MAX_VALUE: Rectangle = Rectangle {
        west: -PI,
        south: -FRAC_PI_2,
        east: PI,
        north: FRAC_PI_2,
    };

    pub fn new(west: f64, south: f64, east: f64, north: f64) -> Self {
        Self {
            west,
            south,
            east,
            north,
        }
    }

    /// Creates a rectangle from bounds given in degrees
    pub fn from_degrees(west: f64, south: f64, east: f64, north: f64) -> Self {
        Self::new(
            west.to_radians(),
            south.to_radians(),
            east.to_radians(),
            north.to_radians(),
        )
    }

    /// Checks if the bounds are finite and ordered (west <= east, south <= north)
    pub fn is_valid(&self) -> bool {
        [self.west, self.south, self.east, self.north]
            .iter()
            .all(|v| v.is_finite())
            && self.west <= self.east
            && self.south <= self.north
    }

    pub fn width(&self) -> f64 {
        self.east - self.west
    }

    pub fn height(&self) -> f64 {
        self.north - self.south
    }

    pub fn southwest(&self) -> Cartographic {
        Cartographic::new(self.west, self.south)
    }

    pub fn northeast(&self) -> Cartographic {
        Cartographic::new(self.east, self.north)
    }

    /// Checks if the rectangle contains a position (edges included)
    pub fn contains(&self, position: &Cartographic) -> bool {
        position.longitude >= self.west
            && position.longitude <= self.east
            && position.latitude >= self.south
            && position.latitude <= self.north
    }

    /// Gets the overlap of two rectangles, if any
    pub fn intersection(&self, other: &Rectangle) -> Option<Rectangle> {
        let west = self.west.max(other.west);
        let south = self.south.max(other.south);
        let east = self.east.min(other.east);
        let north = self.north.min(other.north);

        if west > east || south > north {
            return None;
        }

        Some(Rectangle::new(west, south, east, north))
    }
}

/// Represents a tile coordinate in the slippy map tile system
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TileCoord {
    pub x: u32,
    pub y: u32,
    pub level: u32,
}

impl TileCoord {
    pub fn new(x: u32, y: u32, level: u32) -> Self {
        Self { x, y, level }
    }

    /// Number of tiles along each axis at `level`, or `None` past the deepest level
    pub fn tiles_per_axis(level: u32) -> Option<u64> {
        if level > MAX_TILE_LEVEL {
            return None;
        }
        Some(1u64 << level)
    }

    /// Checks if the tile exists at its zoom level
    pub fn is_valid(&self) -> bool {
        match Self::tiles_per_axis(self.level) {
            Some(n) => u64::from(self.x) < n && u64::from(self.y) < n,
            None => false,
        }
    }

    /// Row index counted from the south edge instead of the north edge (TMS order)
    pub fn reverse_y(&self) -> u64 {
        let n = Self::tiles_per_axis(self.level).unwrap_or(0);
        n.saturating_sub(1).saturating_sub(u64::from(self.y))
    }
}

impl fmt::Display for TileCoord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.level, self.x, self.y)
    }
}

/// Reference ellipsoid described by its three radii in meters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Ellipsoid {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Ellipsoid {
    pub const WGS84: Ellipsoid = Ellipsoid {
        x: WGS84_RADIUS,
        y: WGS84_RADIUS,
        z: WGS84_POLAR_RADIUS,
    };

    pub const UNIT_SPHERE: Ellipsoid = Ellipsoid {
        x: 1.0,
        y: 1.0,
        z: 1.0,
    };

    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    pub fn maximum_radius(&self) -> f64 {
        self.x.max(self.y).max(self.z)
    }

    pub fn is_valid(&self) -> bool {
        [self.x, self.y, self.z]
            .iter()
            .all(|r| r.is_finite() && *r > 0.0)
    }
}

impl Default for Ellipsoid {
    fn default() -> Self {
        Self::WGS84
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cartographic_from_degrees() {
        let position = Cartographic::from_degrees(-74.0060, 40.7128);
        assert!((position.longitude - (-74.0060f64).to_radians()).abs() < 1e-12);
        assert!((position.latitude - 40.7128f64.to_radians()).abs() < 1e-12);
        assert!(position.is_valid());
        assert!(!Cartographic::new(4.0, 0.0).is_valid());
    }

    #[test]
    fn test_rectangle_contains_edges() {
        let rect = Rectangle::from_degrees(-10.0, -5.0, 10.0, 5.0);
        assert!(rect.contains(&rect.southwest()));
        assert!(rect.contains(&rect.northeast()));
        assert!(!rect.contains(&Cartographic::from_degrees(11.0, 0.0)));
    }

    #[test]
    fn test_rectangle_intersection() {
        let a = Rectangle::from_degrees(0.0, 0.0, 10.0, 10.0);
        let b = Rectangle::from_degrees(5.0, 5.0, 15.0, 15.0);
        let overlap = a.intersection(&b).unwrap();
        assert_eq!(overlap, Rectangle::from_degrees(5.0, 5.0, 10.0, 10.0));

        let far = Rectangle::from_degrees(20.0, 20.0, 30.0, 30.0);
        assert!(a.intersection(&far).is_none());
    }

    #[test]
    fn test_rectangle_validity() {
        assert!(Rectangle::MAX_VALUE.is_valid());
        assert!(!Rectangle::new(1.0, 0.0, 0.0, 1.0).is_valid());
        assert!(!Rectangle::new(0.0, 0.0, f64::NAN, 1.0).is_valid());
    }

    #[test]
    fn test_tile_coord_validity() {
        assert!(TileCoord::new(0, 0, 0).is_valid());
        assert!(!TileCoord::new(1, 0, 0).is_valid());
        assert!(TileCoord::new(7, 7, 3).is_valid());
        assert!(!TileCoord::new(8, 0, 3).is_valid());
        assert!(!TileCoord::new(0, 0, 32).is_valid());
    }

    #[test]
    fn test_tile_coord_reverse_y_and_display() {
        let coord = TileCoord::new(4, 2, 3);
        assert_eq!(coord.reverse_y(), 5);
        assert_eq!(coord.to_string(), "3/4/2");
    }
}
