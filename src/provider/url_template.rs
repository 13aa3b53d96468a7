//! Generic imagery provider for any server addressed by a URL template.

use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;

use crate::core::config::{validate_coverage, ConfigError};
use crate::core::constants::{MAX_MINIMUM_LEVEL_TILES, MAX_REQUESTS_PER_SERVER, TILE_SIZE};
use crate::core::credit::{Credit, DEFAULT_CREDIT};
use crate::core::geo::{Rectangle, TileCoord};
use crate::core::tiling_scheme::{TilingScheme, WebMercatorTilingScheme};
use crate::provider::discard::{NeverTileDiscardPolicy, TileDiscardPolicy};
use crate::provider::{ImageryFeatureInfo, ImageryProvider, RequestOutcome, TileImage};
use crate::tiles::loader::{HttpTileFetcher, TileFetchError, TileFetcher};
use crate::tiles::proxy::Proxy;
use crate::tiles::source::{TileSource, UrlTemplate};
use crate::tiles::throttle::{server_key, RequestThrottle};
use crate::{ImageryError, Result};

/// Static description of a URL-template provider
#[derive(Debug, Clone)]
pub struct UrlTemplateConfig {
    pub url_template: UrlTemplate,
    pub tiling_scheme: WebMercatorTilingScheme,
    /// Area covered; `None` means the whole tiling scheme
    pub rectangle: Option<Rectangle>,
    pub minimum_level: u32,
    pub maximum_level: Option<u32>,
    pub tile_width: u32,
    pub tile_height: u32,
    pub credit: Arc<Credit>,
    pub has_alpha_channel: bool,
    pub max_minimum_level_tiles: u64,
}

impl UrlTemplateConfig {
    pub fn new(url_template: UrlTemplate) -> Self {
        Self {
            url_template,
            tiling_scheme: WebMercatorTilingScheme::default(),
            rectangle: None,
            minimum_level: 0,
            maximum_level: None,
            tile_width: TILE_SIZE,
            tile_height: TILE_SIZE,
            credit: Arc::clone(&DEFAULT_CREDIT),
            has_alpha_channel: true,
            max_minimum_level_tiles: MAX_MINIMUM_LEVEL_TILES,
        }
    }
}

/// Runtime collaborators of a provider
#[derive(Clone)]
pub struct ProviderHandles {
    pub fetcher: Arc<dyn TileFetcher>,
    /// Shared in-flight cap; every provider holding the same throttle shares its slots
    pub throttle: Arc<RequestThrottle>,
    pub discard_policy: Arc<dyn TileDiscardPolicy>,
    pub proxy: Option<Arc<dyn Proxy>>,
}

impl ProviderHandles {
    /// HTTP fetching, no proxy, nothing discarded, and the process-wide throttle of
    /// the template's server
    pub fn for_template(url_template: &UrlTemplate, max_requests_per_server: usize) -> Self {
        Self {
            fetcher: Arc::new(HttpTileFetcher::new()),
            throttle: RequestThrottle::for_server(
                server_key(url_template.as_str()),
                max_requests_per_server,
            ),
            discard_policy: Arc::new(NeverTileDiscardPolicy),
            proxy: None,
        }
    }
}

impl Default for ProviderHandles {
    fn default() -> Self {
        Self {
            fetcher: Arc::new(HttpTileFetcher::new()),
            throttle: Arc::new(RequestThrottle::new(MAX_REQUESTS_PER_SERVER)),
            discard_policy: Arc::new(NeverTileDiscardPolicy),
            proxy: None,
        }
    }
}

pub struct UrlTemplateImageryProvider {
    url_template: UrlTemplate,
    tiling_scheme: WebMercatorTilingScheme,
    rectangle: Rectangle,
    minimum_level: u32,
    maximum_level: Option<u32>,
    tile_width: u32,
    tile_height: u32,
    credit: Arc<Credit>,
    has_alpha_channel: bool,
    handles: ProviderHandles,
}

impl UrlTemplateImageryProvider {
    /// Validates `config` and assembles the provider. Fails without side effects.
    pub fn new(
        config: UrlTemplateConfig,
        handles: ProviderHandles,
    ) -> std::result::Result<Self, ConfigError> {
        if handles.throttle.max_in_flight() == 0 {
            return Err(ConfigError::ZeroRequestCap);
        }

        let requested = config
            .rectangle
            .unwrap_or(*config.tiling_scheme.rectangle());
        let rectangle = validate_coverage(
            &config.tiling_scheme,
            &requested,
            config.minimum_level,
            config.maximum_level,
            config.max_minimum_level_tiles,
        )?;

        log::debug!(
            "imagery provider created for {} (levels {}..{:?})",
            config.url_template.as_str(),
            config.minimum_level,
            config.maximum_level
        );

        Ok(Self {
            url_template: config.url_template,
            tiling_scheme: config.tiling_scheme,
            rectangle,
            minimum_level: config.minimum_level,
            maximum_level: config.maximum_level,
            tile_width: config.tile_width,
            tile_height: config.tile_height,
            credit: config.credit,
            has_alpha_channel: config.has_alpha_channel,
            handles,
        })
    }

    pub fn url_template(&self) -> &UrlTemplate {
        &self.url_template
    }

    pub fn throttle(&self) -> &Arc<RequestThrottle> {
        &self.handles.throttle
    }

    pub fn discard_policy(&self) -> &Arc<dyn TileDiscardPolicy> {
        &self.handles.discard_policy
    }

    pub fn proxy(&self) -> Option<&Arc<dyn Proxy>> {
        self.handles.proxy.as_ref()
    }

    /// URL of a tile, before any proxy rewriting
    pub fn tile_url(&self, coord: TileCoord) -> String {
        self.url_template.url(coord)
    }

    fn resolved_url(&self, coord: TileCoord) -> String {
        let url = self.tile_url(coord);
        match &self.handles.proxy {
            Some(proxy) => proxy.get_url(&url),
            None => url,
        }
    }

    fn ensure_ready(&self) -> Result<()> {
        if self.is_ready() {
            Ok(())
        } else {
            Err(ImageryError::NotReady)
        }
    }

    fn checked_coord(&self, x: u32, y: u32, level: u32) -> Result<TileCoord> {
        let coord = TileCoord::new(x, y, level);
        if coord.is_valid() {
            Ok(coord)
        } else {
            Err(ImageryError::InvalidTile { x, y, level })
        }
    }

    async fn download(&self, coord: TileCoord, url: &str) -> RequestOutcome {
        let bytes = match self.handles.fetcher.fetch(url).await {
            Ok(bytes) => bytes,
            Err(e) => {
                log::warn!("failed to fetch tile {} from {}: {}", coord, url, e);
                return RequestOutcome::Failed(e);
            }
        };

        let image = match image::load_from_memory(&bytes) {
            Ok(image) => image,
            Err(e) => {
                log::warn!("tile {} from {} is not a valid image: {}", coord, url, e);
                return RequestOutcome::Failed(TileFetchError::MalformedImage(e.to_string()));
            }
        };

        log::debug!("fetched tile {} ({} bytes)", coord, bytes.len());

        if self.handles.discard_policy.should_discard(&image) {
            log::debug!("discarding placeholder tile {}", coord);
            return RequestOutcome::Failed(TileFetchError::Discarded);
        }

        RequestOutcome::Delivered(TileImage::new(coord, image))
    }
}

impl fmt::Debug for UrlTemplateImageryProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UrlTemplateImageryProvider")
            .field("url_template", &self.url_template.as_str())
            .field("rectangle", &self.rectangle)
            .field("minimum_level", &self.minimum_level)
            .field("maximum_level", &self.maximum_level)
            .field("throttle", &self.handles.throttle)
            .field("discard_policy", &self.handles.discard_policy)
            .finish()
    }
}

#[async_trait]
impl ImageryProvider for UrlTemplateImageryProvider {
    fn tile_width(&self) -> u32 {
        self.tile_width
    }

    fn tile_height(&self) -> u32 {
        self.tile_height
    }

    fn minimum_level(&self) -> u32 {
        self.minimum_level
    }

    fn maximum_level(&self) -> Option<u32> {
        self.maximum_level
    }

    fn rectangle(&self) -> &Rectangle {
        &self.rectangle
    }

    fn tiling_scheme(&self) -> &WebMercatorTilingScheme {
        &self.tiling_scheme
    }

    fn credit(&self) -> &Arc<Credit> {
        &self.credit
    }

    fn has_alpha_channel(&self) -> bool {
        self.has_alpha_channel
    }

    fn is_ready(&self) -> bool {
        self.handles.discard_policy.is_ready()
    }

    fn get_tile_credits(&self, x: u32, y: u32, level: u32) -> Result<Vec<Credit>> {
        self.ensure_ready()?;
        self.checked_coord(x, y, level)?;
        Ok(Vec::new())
    }

    async fn request_image(&self, x: u32, y: u32, level: u32) -> Result<RequestOutcome> {
        self.ensure_ready()?;
        let coord = self.checked_coord(x, y, level)?;
        let url = self.resolved_url(coord);

        // The permit lives until the download finishes or this future is dropped.
        let Some(_permit) = self.handles.throttle.try_acquire() else {
            log::debug!(
                "deferring tile {}: {} requests in flight",
                coord,
                self.handles.throttle.in_flight()
            );
            return Ok(RequestOutcome::Deferred);
        };

        Ok(self.download(coord, &url).await)
    }

    fn pick_features(
        &self,
        _x: u32,
        _y: u32,
        _level: u32,
        _longitude: f64,
        _latitude: f64,
    ) -> Option<Vec<ImageryFeatureInfo>> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::geo::Ellipsoid;
    use image::{DynamicImage, ImageOutputFormat, Rgba, RgbaImage};
    use std::io::Cursor;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingFetcher {
        urls: Mutex<Vec<String>>,
        body: Vec<u8>,
    }

    #[async_trait]
    impl TileFetcher for RecordingFetcher {
        async fn fetch(&self, url: &str) -> std::result::Result<Vec<u8>, TileFetchError> {
            self.urls.lock().unwrap().push(url.to_string());
            Ok(self.body.clone())
        }
    }

    #[derive(Debug)]
    struct PrefixProxy;

    impl Proxy for PrefixProxy {
        fn get_url(&self, resource: &str) -> String {
            format!("/proxy/{}", resource)
        }
    }

    fn png_bytes() -> Vec<u8> {
        let image = DynamicImage::ImageRgba8(RgbaImage::from_pixel(4, 4, Rgba([9, 9, 9, 255])));
        let mut bytes = Vec::new();
        image
            .write_to(&mut Cursor::new(&mut bytes), ImageOutputFormat::Png)
            .unwrap();
        bytes
    }

    fn template() -> UrlTemplate {
        UrlTemplate::parse("https://tiles.example.org/{z}/{x}/{y}.png", Vec::new()).unwrap()
    }

    fn handles(fetcher: Arc<RecordingFetcher>) -> ProviderHandles {
        ProviderHandles {
            fetcher,
            throttle: Arc::new(RequestThrottle::new(2)),
            ..ProviderHandles::default()
        }
    }

    #[test]
    fn test_metadata_defaults() {
        let fetcher = Arc::new(RecordingFetcher::default());
        let provider =
            UrlTemplateImageryProvider::new(UrlTemplateConfig::new(template()), handles(fetcher))
                .unwrap();

        assert_eq!(provider.tile_width(), 256);
        assert_eq!(provider.tile_height(), 256);
        assert_eq!(provider.minimum_level(), 0);
        assert_eq!(provider.maximum_level(), None);
        assert!(provider.has_alpha_channel());
        assert!(provider.is_ready());
        assert_eq!(provider.rectangle(), provider.tiling_scheme().rectangle());
    }

    #[test]
    fn test_rejects_zero_throttle() {
        let handles = ProviderHandles {
            throttle: Arc::new(RequestThrottle::new(0)),
            ..ProviderHandles::default()
        };
        let result = UrlTemplateImageryProvider::new(UrlTemplateConfig::new(template()), handles);
        assert!(matches!(result, Err(ConfigError::ZeroRequestCap)));
    }

    #[test]
    fn test_rejects_wide_minimum_level() {
        let mut config = UrlTemplateConfig::new(template());
        config.minimum_level = 2;
        let result = UrlTemplateImageryProvider::new(config, ProviderHandles::default());
        assert!(matches!(
            result,
            Err(ConfigError::TooManyMinimumLevelTiles { tile_count: 16, .. })
        ));
    }

    #[test]
    fn test_unit_sphere_scheme() {
        let mut config = UrlTemplateConfig::new(template());
        config.tiling_scheme = WebMercatorTilingScheme::new(Ellipsoid::UNIT_SPHERE);
        let provider = UrlTemplateImageryProvider::new(config, ProviderHandles::default()).unwrap();
        assert_eq!(
            provider.tiling_scheme().ellipsoid().maximum_radius(),
            1.0
        );
    }

    #[tokio::test]
    async fn test_request_goes_through_proxy() {
        let fetcher = Arc::new(RecordingFetcher {
            body: png_bytes(),
            ..RecordingFetcher::default()
        });
        let handles = ProviderHandles {
            proxy: Some(Arc::new(PrefixProxy)),
            ..handles(Arc::clone(&fetcher))
        };
        let provider =
            UrlTemplateImageryProvider::new(UrlTemplateConfig::new(template()), handles).unwrap();

        let outcome = provider.request_image(1, 0, 1).await.unwrap();
        let image = outcome.into_image().unwrap();
        assert_eq!(image.coord(), TileCoord::new(1, 0, 1));
        assert_eq!((image.width(), image.height()), (4, 4));

        let urls = fetcher.urls.lock().unwrap();
        assert_eq!(
            urls.as_slice(),
            ["/proxy/https://tiles.example.org/1/1/0.png".to_string()]
        );
        assert_eq!(provider.throttle().in_flight(), 0);
    }

    #[tokio::test]
    async fn test_invalid_tile_is_a_usage_error() {
        let fetcher = Arc::new(RecordingFetcher::default());
        let provider =
            UrlTemplateImageryProvider::new(UrlTemplateConfig::new(template()), handles(fetcher))
                .unwrap();

        let result = provider.request_image(2, 0, 1).await;
        assert!(matches!(
            result,
            Err(ImageryError::InvalidTile { x: 2, y: 0, level: 1 })
        ));
        assert!(matches!(
            provider.get_tile_credits(0, 0, 40),
            Err(ImageryError::InvalidTile { .. })
        ));
    }

    #[test]
    fn test_pick_features_unsupported() {
        let provider = UrlTemplateImageryProvider::new(
            UrlTemplateConfig::new(template()),
            ProviderHandles::default(),
        )
        .unwrap();
        assert!(provider.pick_features(0, 0, 0, 0.0, 0.0).is_none());
    }
}
