//! # osm-imagery
//!
//! Imagery providers for OpenStreetMap-style slippy-map tile servers.
//!
//! A provider exposes tiles on a Web Mercator tiling scheme, builds their URLs as
//! `<url>/<level>/<x>/<y>.<extension>`, and downloads them under a per-server cap
//! on requests in flight. When the cap is reached a request is reported as
//! deferred instead of being queued.
//!
//! ```no_run
//! use osm_imagery::prelude::*;
//!
//! # async fn run() -> osm_imagery::Result<()> {
//! let provider = OpenStreetMapImageryProvider::new(ProviderOptions::default())?;
//! match provider.request_image(0, 0, 0).await? {
//!     RequestOutcome::Delivered(tile) => println!("{}x{}", tile.width(), tile.height()),
//!     RequestOutcome::Deferred => println!("busy, try again later"),
//!     RequestOutcome::Failed(reason) => println!("failed: {}", reason),
//! }
//! # Ok(())
//! # }
//! ```

pub mod core;
pub mod prelude;
pub mod provider;
pub mod tiles;
pub use crate::core::constants;

// Re-export public API
pub use core::{
    config::{ConfigError, ProviderConfig, ProviderOptions},
    credit::Credit,
    geo::{Cartographic, Ellipsoid, Rectangle, TileCoord},
    tiling_scheme::{TilingScheme, WebMercatorTilingScheme},
};

pub use provider::{
    ImageryFeatureInfo, ImageryProvider, ImageryProviderBuilder, OpenStreetMapImageryProvider,
    RequestOutcome, TileImage, UrlTemplateImageryProvider,
};

pub use tiles::{RequestThrottle, TileFetchError, TileFetcher};

/// Result type used throughout the library
pub type Result<T> = std::result::Result<T, ImageryError>;

/// Common error types
#[derive(Debug, thiserror::Error)]
pub enum ImageryError {
    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigError),

    #[error("imagery provider is not ready")]
    NotReady,

    #[error("Invalid tile: {level}/{x}/{y}")]
    InvalidTile { x: u32, y: u32, level: u32 },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
