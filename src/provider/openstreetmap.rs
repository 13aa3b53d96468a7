//! Imagery from OpenStreetMap-style slippy-map tile servers.
//!
//! Tiles are addressed as `<url>/<level>/<x>/<y>.<extension>` on a Web Mercator
//! tiling scheme, with the row counted from the north edge.

use async_trait::async_trait;
use std::sync::Arc;

use crate::core::config::{build_tile_url, ProviderConfig, ProviderOptions};
use crate::core::credit::Credit;
use crate::core::geo::{Rectangle, TileCoord};
use crate::core::tiling_scheme::WebMercatorTilingScheme;
use crate::provider::builder::ImageryProviderBuilder;
use crate::provider::url_template::UrlTemplateImageryProvider;
use crate::provider::{ImageryFeatureInfo, ImageryProvider, RequestOutcome};
use crate::tiles::throttle::RequestThrottle;
use crate::Result;

#[derive(Debug)]
pub struct OpenStreetMapImageryProvider {
    config: ProviderConfig,
    inner: UrlTemplateImageryProvider,
}

impl OpenStreetMapImageryProvider {
    /// Builds a provider talking HTTP to the configured server
    pub fn new(options: ProviderOptions) -> Result<Self> {
        ImageryProviderBuilder::new().with_options(options).build()
    }

    pub fn builder() -> ImageryProviderBuilder {
        ImageryProviderBuilder::new()
    }

    pub(crate) fn from_parts(config: ProviderConfig, inner: UrlTemplateImageryProvider) -> Self {
        Self { config, inner }
    }

    pub fn config(&self) -> &ProviderConfig {
        &self.config
    }

    /// Normalised base URL of the tile server
    pub fn url(&self) -> &str {
        self.config.base_url()
    }

    pub fn throttle(&self) -> &Arc<RequestThrottle> {
        self.inner.throttle()
    }

    /// Fetch URL of a tile, before any proxy rewriting
    pub fn tile_url(&self, x: u32, y: u32, level: u32) -> String {
        build_tile_url(&self.config, TileCoord::new(x, y, level))
    }
}

#[async_trait]
impl ImageryProvider for OpenStreetMapImageryProvider {
    fn tile_width(&self) -> u32 {
        self.inner.tile_width()
    }

    fn tile_height(&self) -> u32 {
        self.inner.tile_height()
    }

    fn minimum_level(&self) -> u32 {
        self.inner.minimum_level()
    }

    fn maximum_level(&self) -> Option<u32> {
        self.inner.maximum_level()
    }

    fn rectangle(&self) -> &Rectangle {
        self.inner.rectangle()
    }

    fn tiling_scheme(&self) -> &WebMercatorTilingScheme {
        self.inner.tiling_scheme()
    }

    fn credit(&self) -> &Arc<Credit> {
        self.inner.credit()
    }

    fn has_alpha_channel(&self) -> bool {
        self.inner.has_alpha_channel()
    }

    fn is_ready(&self) -> bool {
        self.inner.is_ready()
    }

    fn get_tile_credits(&self, x: u32, y: u32, level: u32) -> Result<Vec<Credit>> {
        self.inner.get_tile_credits(x, y, level)
    }

    async fn request_image(&self, x: u32, y: u32, level: u32) -> Result<RequestOutcome> {
        self.inner.request_image(x, y, level).await
    }

    fn pick_features(
        &self,
        x: u32,
        y: u32,
        level: u32,
        longitude: f64,
        latitude: f64,
    ) -> Option<Vec<ImageryFeatureInfo>> {
        self.inner.pick_features(x, y, level, longitude, latitude)
    }
}
