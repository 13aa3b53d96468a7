//! Core constants for the OpenStreetMap imagery provider.

/// Default square tile size in pixels.
pub const TILE_SIZE: u32 = 256;

/// Public OpenStreetMap tile endpoint used when no URL is configured.
pub const DEFAULT_URL: &str = "//a.tile.openstreetmap.org/";

/// File extension appended to every tile URL unless overridden.
pub const DEFAULT_FILE_EXTENSION: &str = "png";

/// Attribution shown for the default tile server.
pub const DEFAULT_CREDIT_TEXT: &str = "MapQuest, Open Street Map and contributors, CC-BY-SA";

/// Most tiles a provider may need to cover its rectangle at the minimum level.
pub const MAX_MINIMUM_LEVEL_TILES: u64 = 4;

/// Concurrent in-flight requests allowed against a single tile server.
pub const MAX_REQUESTS_PER_SERVER: usize = 6;

/// Deepest level whose tile indices still fit in a `u32`.
pub const MAX_TILE_LEVEL: u32 = 31;

/// Semi-major axis of the WGS84 ellipsoid in meters.
pub const WGS84_RADIUS: f64 = 6_378_137.0;

/// Semi-minor axis of the WGS84 ellipsoid in meters.
pub const WGS84_POLAR_RADIUS: f64 = 6_356_752.314_245_179;
