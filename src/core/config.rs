//! Provider options, their validation, and the canonical configuration built from them.
//!
//! Options are plain data with a default for every field, so they can be written
//! in code or loaded from JSON. [`build_config`] normalises and validates them once;
//! the resulting [`ProviderConfig`] never changes afterwards.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::sync::Arc;

use crate::core::constants::{
    DEFAULT_FILE_EXTENSION, DEFAULT_URL, MAX_MINIMUM_LEVEL_TILES, MAX_REQUESTS_PER_SERVER,
    MAX_TILE_LEVEL, TILE_SIZE,
};
use crate::core::credit::{Credit, DEFAULT_CREDIT};
use crate::core::geo::{Ellipsoid, Rectangle, TileCoord};
use crate::core::tiling_scheme::{TilingScheme, WebMercatorTilingScheme};
use crate::tiles::proxy::Proxy;
use crate::Result;

/// Reasons a provider configuration is rejected
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigError {
    #[error(
        "the rectangle and minimum level {level} require {tile_count} tiles at the minimum level; \
         providers with more than {cap} tiles at the minimum level are not supported"
    )]
    TooManyMinimumLevelTiles { tile_count: u64, level: u32, cap: u64 },

    #[error("invalid rectangle: {0:?}")]
    InvalidRectangle(Rectangle),

    #[error("rectangle {0:?} does not overlap the tiling scheme")]
    RectangleOutsideTilingScheme(Rectangle),

    #[error("invalid level range: minimum {minimum}, maximum {maximum:?}")]
    InvalidLevelRange { minimum: u32, maximum: Option<u32> },

    #[error("invalid ellipsoid: {0:?}")]
    InvalidEllipsoid(Ellipsoid),

    #[error("file extension must not be empty")]
    EmptyFileExtension,

    #[error("invalid URL template: {0}")]
    InvalidUrlTemplate(String),

    #[error("request cap must allow at least one request in flight")]
    ZeroRequestCap,
}

/// Every option the OpenStreetMap provider recognises, with its default
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderOptions {
    /// Tile server base URL
    pub url: String,
    /// Extension of the tile images, without the dot
    pub file_extension: String,
    /// Ellipsoid of the Web Mercator tiling scheme
    pub ellipsoid: Ellipsoid,
    /// Area covered by the imagery; `None` means the whole tiling scheme
    pub rectangle: Option<Rectangle>,
    pub minimum_level: u32,
    /// Deepest level served; `None` means unbounded
    pub maximum_level: Option<u32>,
    /// Attribution; `None` means the default OpenStreetMap credit
    pub credit: Option<Credit>,
    /// Most tiles the rectangle may span at the minimum level
    pub max_minimum_level_tiles: u64,
    /// In-flight request cap shared by every provider talking to the same server
    pub max_requests_per_server: usize,
}

impl Default for ProviderOptions {
    fn default() -> Self {
        Self {
            url: DEFAULT_URL.to_string(),
            file_extension: DEFAULT_FILE_EXTENSION.to_string(),
            ellipsoid: Ellipsoid::default(),
            rectangle: None,
            minimum_level: 0,
            maximum_level: None,
            credit: None,
            max_minimum_level_tiles: MAX_MINIMUM_LEVEL_TILES,
            max_requests_per_server: MAX_REQUESTS_PER_SERVER,
        }
    }
}

impl ProviderOptions {
    /// Parses options from JSON; missing fields take their defaults
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Reads options from a JSON file
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }
}

/// Validated, immutable configuration of an OpenStreetMap provider
#[derive(Clone)]
pub struct ProviderConfig {
    base_url: String,
    file_extension: String,
    tiling_scheme: WebMercatorTilingScheme,
    tile_width: u32,
    tile_height: u32,
    minimum_level: u32,
    maximum_level: Option<u32>,
    rectangle: Rectangle,
    credit: Arc<Credit>,
    max_minimum_level_tiles: u64,
    max_requests_per_server: usize,
    proxy: Option<Arc<dyn Proxy>>,
}

impl ProviderConfig {
    /// Base URL, always ending with exactly one `/`
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn file_extension(&self) -> &str {
        &self.file_extension
    }

    pub fn tiling_scheme(&self) -> &WebMercatorTilingScheme {
        &self.tiling_scheme
    }

    pub fn tile_width(&self) -> u32 {
        self.tile_width
    }

    pub fn tile_height(&self) -> u32 {
        self.tile_height
    }

    pub fn minimum_level(&self) -> u32 {
        self.minimum_level
    }

    pub fn maximum_level(&self) -> Option<u32> {
        self.maximum_level
    }

    /// Coverage, clipped to the tiling scheme
    pub fn rectangle(&self) -> &Rectangle {
        &self.rectangle
    }

    pub fn credit(&self) -> &Arc<Credit> {
        &self.credit
    }

    pub fn max_minimum_level_tiles(&self) -> u64 {
        self.max_minimum_level_tiles
    }

    pub fn max_requests_per_server(&self) -> usize {
        self.max_requests_per_server
    }

    pub fn proxy(&self) -> Option<&Arc<dyn Proxy>> {
        self.proxy.as_ref()
    }
}

impl fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("base_url", &self.base_url)
            .field("file_extension", &self.file_extension)
            .field("minimum_level", &self.minimum_level)
            .field("maximum_level", &self.maximum_level)
            .field("rectangle", &self.rectangle)
            .field("credit", &self.credit)
            .field("proxy", &self.proxy)
            .finish()
    }
}

/// Ensures the URL ends with exactly one `/`. Applying it twice changes nothing.
pub fn normalize_base_url(url: &str) -> String {
    format!("{}/", url.trim_end_matches('/'))
}

/// Number of tiles spanned by the corners of `rectangle` at `level`.
/// `None` when a corner falls outside the tiling scheme.
pub fn minimum_level_tile_count<S: TilingScheme + ?Sized>(
    tiling_scheme: &S,
    rectangle: &Rectangle,
    level: u32,
) -> Option<u64> {
    let southwest = tiling_scheme.position_to_tile_xy(&rectangle.southwest(), level)?;
    let northeast = tiling_scheme.position_to_tile_xy(&rectangle.northeast(), level)?;

    let columns = u64::from(northeast.x.abs_diff(southwest.x)) + 1;
    let rows = u64::from(northeast.y.abs_diff(southwest.y)) + 1;
    Some(columns * rows)
}

/// Checks the level range and the minimum-level footprint of `rectangle`.
///
/// Returns the rectangle clipped to the tiling scheme. Pure: nothing is retained
/// on failure.
pub fn validate_coverage<S: TilingScheme + ?Sized>(
    tiling_scheme: &S,
    rectangle: &Rectangle,
    minimum_level: u32,
    maximum_level: Option<u32>,
    max_minimum_level_tiles: u64,
) -> std::result::Result<Rectangle, ConfigError> {
    let level_range_ok = minimum_level <= MAX_TILE_LEVEL
        && maximum_level.map_or(true, |max| max >= minimum_level && max <= MAX_TILE_LEVEL);
    if !level_range_ok {
        return Err(ConfigError::InvalidLevelRange {
            minimum: minimum_level,
            maximum: maximum_level,
        });
    }

    if !rectangle.is_valid() {
        return Err(ConfigError::InvalidRectangle(*rectangle));
    }

    let clipped = rectangle
        .intersection(tiling_scheme.rectangle())
        .ok_or(ConfigError::RectangleOutsideTilingScheme(*rectangle))?;

    let tile_count = minimum_level_tile_count(tiling_scheme, &clipped, minimum_level)
        .ok_or(ConfigError::RectangleOutsideTilingScheme(*rectangle))?;

    if tile_count > max_minimum_level_tiles {
        log::warn!(
            "rejecting imagery configuration: {} tiles at minimum level {} (cap {})",
            tile_count,
            minimum_level,
            max_minimum_level_tiles
        );
        return Err(ConfigError::TooManyMinimumLevelTiles {
            tile_count,
            level: minimum_level,
            cap: max_minimum_level_tiles,
        });
    }

    Ok(clipped)
}

/// Normalises and validates `options` into an immutable configuration
pub fn build_config(
    options: &ProviderOptions,
    proxy: Option<Arc<dyn Proxy>>,
) -> std::result::Result<ProviderConfig, ConfigError> {
    let file_extension = options.file_extension.trim().trim_start_matches('.');
    if file_extension.is_empty() {
        return Err(ConfigError::EmptyFileExtension);
    }
    if options.max_requests_per_server == 0 {
        return Err(ConfigError::ZeroRequestCap);
    }
    if !options.ellipsoid.is_valid() {
        return Err(ConfigError::InvalidEllipsoid(options.ellipsoid));
    }

    let tiling_scheme = WebMercatorTilingScheme::new(options.ellipsoid);
    let requested = options.rectangle.unwrap_or(*tiling_scheme.rectangle());
    let rectangle = validate_coverage(
        &tiling_scheme,
        &requested,
        options.minimum_level,
        options.maximum_level,
        options.max_minimum_level_tiles,
    )?;

    let credit = match &options.credit {
        Some(credit) => Arc::new(credit.clone()),
        None => Arc::clone(&DEFAULT_CREDIT),
    };

    Ok(ProviderConfig {
        base_url: normalize_base_url(&options.url),
        file_extension: file_extension.to_string(),
        tiling_scheme,
        tile_width: TILE_SIZE,
        tile_height: TILE_SIZE,
        minimum_level: options.minimum_level,
        maximum_level: options.maximum_level,
        rectangle,
        credit,
        max_minimum_level_tiles: options.max_minimum_level_tiles,
        max_requests_per_server: options.max_requests_per_server,
        proxy,
    })
}

/// Synthesises the fetch URL of a tile: `<base_url><level>/<x>/<y>.<extension>`
pub fn build_tile_url(config: &ProviderConfig, coord: TileCoord) -> String {
    format!(
        "{}{}/{}/{}.{}",
        config.base_url, coord.level, coord.x, coord.y, config.file_extension
    )
}
