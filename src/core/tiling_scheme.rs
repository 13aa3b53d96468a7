//! Quad-tree tiling of the Web Mercator square.

use std::f64::consts::PI;
use std::fmt::Debug;

use crate::core::geo::{Cartographic, Ellipsoid, Point, Rectangle, TileCoord};
use crate::core::projection::{WebMercatorProjection, MAXIMUM_LATITUDE};

/// Maps geographic positions to tiles and tiles back to their footprint.
pub trait TilingScheme: Debug + Send + Sync {
    /// Ellipsoid the scheme is defined on
    fn ellipsoid(&self) -> &Ellipsoid;

    /// Full coverage of the scheme
    fn rectangle(&self) -> &Rectangle;

    fn number_of_x_tiles_at_level(&self, level: u32) -> u64;

    fn number_of_y_tiles_at_level(&self, level: u32) -> u64;

    /// The tile containing `position` at `level`, or `None` when the position
    /// lies outside the scheme or the level is too deep to address.
    fn position_to_tile_xy(&self, position: &Cartographic, level: u32) -> Option<TileCoord>;

    /// The geographic footprint of a tile
    fn tile_xy_to_rectangle(&self, x: u32, y: u32, level: u32) -> Rectangle;
}

/// Web Mercator tiling with a single tile at level zero, as used by
/// OpenStreetMap and most slippy-map tile servers.
#[derive(Debug, Clone, PartialEq)]
pub struct WebMercatorTilingScheme {
    projection: WebMercatorProjection,
    rectangle: Rectangle,
    southwest_in_meters: Point,
    northeast_in_meters: Point,
}

impl WebMercatorTilingScheme {
    pub fn new(ellipsoid: Ellipsoid) -> Self {
        let projection = WebMercatorProjection::new(ellipsoid);
        let half_extent = projection.half_extent();

        Self {
            projection,
            rectangle: Rectangle::new(-PI, -MAXIMUM_LATITUDE, PI, MAXIMUM_LATITUDE),
            southwest_in_meters: Point::new(-half_extent, -half_extent),
            northeast_in_meters: Point::new(half_extent, half_extent),
        }
    }

    pub fn projection(&self) -> &WebMercatorProjection {
        &self.projection
    }

    /// Footprint of a tile in projected meters as (southwest, northeast)
    pub fn tile_xy_to_native_rectangle(&self, x: u32, y: u32, level: u32) -> (Point, Point) {
        let tiles = 2f64.powi(level as i32);
        let tile_width = (self.northeast_in_meters.x - self.southwest_in_meters.x) / tiles;
        let tile_height = (self.northeast_in_meters.y - self.southwest_in_meters.y) / tiles;

        let west = self.southwest_in_meters.x + f64::from(x) * tile_width;
        let east = self.southwest_in_meters.x + f64::from(x + 1) * tile_width;
        let north = self.northeast_in_meters.y - f64::from(y) * tile_height;
        let south = self.northeast_in_meters.y - f64::from(y + 1) * tile_height;

        (Point::new(west, south), Point::new(east, north))
    }
}

impl Default for WebMercatorTilingScheme {
    fn default() -> Self {
        Self::new(Ellipsoid::WGS84)
    }
}

impl TilingScheme for WebMercatorTilingScheme {
    fn ellipsoid(&self) -> &Ellipsoid {
        self.projection.ellipsoid()
    }

    fn rectangle(&self) -> &Rectangle {
        &self.rectangle
    }

    fn number_of_x_tiles_at_level(&self, level: u32) -> u64 {
        TileCoord::tiles_per_axis(level).unwrap_or(0)
    }

    fn number_of_y_tiles_at_level(&self, level: u32) -> u64 {
        TileCoord::tiles_per_axis(level).unwrap_or(0)
    }

    fn position_to_tile_xy(&self, position: &Cartographic, level: u32) -> Option<TileCoord> {
        if !self.rectangle.contains(position) {
            return None;
        }

        let x_tiles = TileCoord::tiles_per_axis(level)?;
        let y_tiles = x_tiles;

        let x_tile_width =
            (self.northeast_in_meters.x - self.southwest_in_meters.x) / x_tiles as f64;
        let y_tile_height =
            (self.northeast_in_meters.y - self.southwest_in_meters.y) / y_tiles as f64;

        let projected = self.projection.project(position);
        let distance_from_west = projected.x - self.southwest_in_meters.x;
        let distance_from_north = self.northeast_in_meters.y - projected.y;

        // Truncation toward zero absorbs rounding noise on the north and west edges;
        // the clamp maps the east and south edges onto the last tile.
        let x = ((distance_from_west / x_tile_width) as i64).clamp(0, x_tiles as i64 - 1);
        let y = ((distance_from_north / y_tile_height) as i64).clamp(0, y_tiles as i64 - 1);

        Some(TileCoord::new(x as u32, y as u32, level))
    }

    fn tile_xy_to_rectangle(&self, x: u32, y: u32, level: u32) -> Rectangle {
        let (southwest, northeast) = self.tile_xy_to_native_rectangle(x, y, level);
        let southwest = self.projection.unproject(&southwest);
        let northeast = self.projection.unproject(&northeast);

        Rectangle::new(
            southwest.longitude,
            southwest.latitude,
            northeast.longitude,
            northeast.latitude,
        )
    }
}
