//! The imagery-provider contract consumed by renderers, and its implementations.
//!
//! A renderer asks a provider for tiles by `(x, y, level)`. Every request ends in
//! one of three [`RequestOutcome`]s:
//!
//! - `Delivered` with the decoded tile image,
//! - `Deferred` when too many requests to the same server are in flight; nothing
//!   was sent and the caller should ask again later,
//! - `Failed` with the reason the tile could not be delivered.
//!
//! Asking before the provider is ready, or for a tile that does not exist, is a
//! usage error reported through [`ImageryError`](crate::ImageryError) instead.

pub mod builder;
pub mod discard;
pub mod openstreetmap;
pub mod url_template;

pub use builder::ImageryProviderBuilder;
pub use discard::{DiscardMissingTileImagePolicy, NeverTileDiscardPolicy, TileDiscardPolicy};
pub use openstreetmap::OpenStreetMapImageryProvider;
pub use url_template::{ProviderHandles, UrlTemplateConfig, UrlTemplateImageryProvider};

use async_trait::async_trait;
use image::DynamicImage;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::core::credit::Credit;
use crate::core::geo::{Cartographic, Rectangle, TileCoord};
use crate::core::tiling_scheme::WebMercatorTilingScheme;
use crate::tiles::loader::TileFetchError;
use crate::Result;

/// A decoded tile image
#[derive(Debug, Clone)]
pub struct TileImage {
    coord: TileCoord,
    image: Arc<DynamicImage>,
}

impl TileImage {
    pub fn new(coord: TileCoord, image: DynamicImage) -> Self {
        Self {
            coord,
            image: Arc::new(image),
        }
    }

    pub fn coord(&self) -> TileCoord {
        self.coord
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn image(&self) -> &DynamicImage {
        &self.image
    }
}

/// Result of a single tile request
#[derive(Debug)]
pub enum RequestOutcome {
    Delivered(TileImage),
    /// The request cap is exhausted; nothing was sent
    Deferred,
    Failed(TileFetchError),
}

impl RequestOutcome {
    pub fn is_delivered(&self) -> bool {
        matches!(self, Self::Delivered(_))
    }

    pub fn is_deferred(&self) -> bool {
        matches!(self, Self::Deferred)
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed(_))
    }

    pub fn into_image(self) -> Option<TileImage> {
        match self {
            Self::Delivered(image) => Some(image),
            _ => None,
        }
    }
}

/// Description of a feature found at a picked location
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageryFeatureInfo {
    pub name: Option<String>,
    pub description: Option<String>,
    pub position: Option<Cartographic>,
    pub data: serde_json::Value,
}

/// Uniform access to a tiled imagery source
#[async_trait]
pub trait ImageryProvider: Send + Sync {
    fn tile_width(&self) -> u32;

    fn tile_height(&self) -> u32;

    fn minimum_level(&self) -> u32;

    /// Deepest level served; `None` means unbounded
    fn maximum_level(&self) -> Option<u32>;

    /// Area covered by the imagery
    fn rectangle(&self) -> &Rectangle;

    fn tiling_scheme(&self) -> &WebMercatorTilingScheme;

    /// Provider-level attribution
    fn credit(&self) -> &Arc<Credit>;

    fn has_alpha_channel(&self) -> bool;

    /// Whether tiles can be requested yet
    fn is_ready(&self) -> bool;

    /// Credits specific to one tile, on top of [`ImageryProvider::credit`]
    fn get_tile_credits(&self, x: u32, y: u32, level: u32) -> Result<Vec<Credit>>;

    /// Requests one tile image. Returns [`RequestOutcome::Deferred`] without any
    /// I/O when the request cap is exhausted.
    async fn request_image(&self, x: u32, y: u32, level: u32) -> Result<RequestOutcome>;

    /// Features at a location inside a tile; `None` when picking is unsupported
    fn pick_features(
        &self,
        x: u32,
        y: u32,
        level: u32,
        longitude: f64,
        latitude: f64,
    ) -> Option<Vec<ImageryFeatureInfo>>;
}
