//! Fluent construction of [`OpenStreetMapImageryProvider`]s.
//!
//! Plain settings go through [`ProviderOptions`]; the builder adds the runtime
//! collaborators that cannot be serialised, such as the fetcher or a proxy.

use std::sync::Arc;

use crate::core::config::{build_config, ProviderOptions};
use crate::core::credit::Credit;
use crate::core::geo::{Ellipsoid, Rectangle};
use crate::provider::discard::{NeverTileDiscardPolicy, TileDiscardPolicy};
use crate::provider::openstreetmap::OpenStreetMapImageryProvider;
use crate::provider::url_template::{ProviderHandles, UrlTemplateConfig, UrlTemplateImageryProvider};
use crate::tiles::loader::{HttpTileFetcher, TileFetcher};
use crate::tiles::proxy::Proxy;
use crate::tiles::source::UrlTemplate;
use crate::tiles::throttle::{server_key, RequestThrottle};
use crate::Result;

/// Builder for OpenStreetMap imagery providers
#[derive(Default)]
pub struct ImageryProviderBuilder {
    options: ProviderOptions,
    proxy: Option<Arc<dyn Proxy>>,
    discard_policy: Option<Arc<dyn TileDiscardPolicy>>,
    fetcher: Option<Arc<dyn TileFetcher>>,
    /// Replaces the process-wide throttle of the server
    throttle: Option<Arc<RequestThrottle>>,
}

impl ImageryProviderBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace every plain option at once
    pub fn with_options(mut self, options: ProviderOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.options.url = url.into();
        self
    }

    pub fn with_file_extension(mut self, extension: impl Into<String>) -> Self {
        self.options.file_extension = extension.into();
        self
    }

    pub fn with_ellipsoid(mut self, ellipsoid: Ellipsoid) -> Self {
        self.options.ellipsoid = ellipsoid;
        self
    }

    pub fn with_rectangle(mut self, rectangle: Rectangle) -> Self {
        self.options.rectangle = Some(rectangle);
        self
    }

    pub fn with_minimum_level(mut self, level: u32) -> Self {
        self.options.minimum_level = level;
        self
    }

    pub fn with_maximum_level(mut self, level: u32) -> Self {
        self.options.maximum_level = Some(level);
        self
    }

    pub fn with_credit(mut self, credit: impl Into<Credit>) -> Self {
        self.options.credit = Some(credit.into());
        self
    }

    pub fn with_max_minimum_level_tiles(mut self, cap: u64) -> Self {
        self.options.max_minimum_level_tiles = cap;
        self
    }

    pub fn with_max_requests_per_server(mut self, cap: usize) -> Self {
        self.options.max_requests_per_server = cap;
        self
    }

    pub fn with_proxy(mut self, proxy: Arc<dyn Proxy>) -> Self {
        self.proxy = Some(proxy);
        self
    }

    pub fn with_discard_policy(mut self, policy: Arc<dyn TileDiscardPolicy>) -> Self {
        self.discard_policy = Some(policy);
        self
    }

    pub fn with_fetcher(mut self, fetcher: Arc<dyn TileFetcher>) -> Self {
        self.fetcher = Some(fetcher);
        self
    }

    pub fn with_throttle(mut self, throttle: Arc<RequestThrottle>) -> Self {
        self.throttle = Some(throttle);
        self
    }

    /// Validates the options and assembles the provider
    pub fn build(self) -> Result<OpenStreetMapImageryProvider> {
        let config = build_config(&self.options, self.proxy.clone())?;
        let url_template = UrlTemplate::from_base_url(config.base_url(), config.file_extension());

        // Requests go to the proxy host when one is set, so that host owns the cap.
        let throttle = self.throttle.unwrap_or_else(|| {
            let requested_url = match &self.proxy {
                Some(proxy) => proxy.get_url(config.base_url()),
                None => config.base_url().to_string(),
            };
            RequestThrottle::for_server(
                server_key(&requested_url),
                config.max_requests_per_server(),
            )
        });

        let handles = ProviderHandles {
            fetcher: self
                .fetcher
                .unwrap_or_else(|| Arc::new(HttpTileFetcher::new())),
            throttle,
            discard_policy: self
                .discard_policy
                .unwrap_or_else(|| Arc::new(NeverTileDiscardPolicy)),
            proxy: self.proxy,
        };

        let inner = UrlTemplateImageryProvider::new(
            UrlTemplateConfig {
                url_template,
                tiling_scheme: config.tiling_scheme().clone(),
                rectangle: Some(*config.rectangle()),
                minimum_level: config.minimum_level(),
                maximum_level: config.maximum_level(),
                tile_width: config.tile_width(),
                tile_height: config.tile_height(),
                credit: Arc::clone(config.credit()),
                has_alpha_channel: true,
                max_minimum_level_tiles: config.max_minimum_level_tiles(),
            },
            handles,
        )?;

        Ok(OpenStreetMapImageryProvider::from_parts(config, inner))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::ConfigError;
    use crate::provider::ImageryProvider;
    use crate::tiles::proxy::DefaultProxy;
    use crate::ImageryError;

    #[test]
    fn test_builder_overrides() {
        let provider = ImageryProviderBuilder::new()
            .with_url("https://tiles.example.com/osm///")
            .with_file_extension(".jpg")
            .with_maximum_level(18)
            .with_credit("Example tiles")
            .with_throttle(Arc::new(RequestThrottle::new(3)))
            .with_proxy(Arc::new(DefaultProxy::new("/proxy/")))
            .build()
            .unwrap();

        assert_eq!(provider.url(), "https://tiles.example.com/osm/");
        assert_eq!(
            provider.tile_url(1, 2, 3),
            "https://tiles.example.com/osm/3/1/2.jpg"
        );
        assert_eq!(provider.maximum_level(), Some(18));
        assert_eq!(provider.credit().text, "Example tiles");
        assert_eq!(provider.throttle().max_in_flight(), 3);
        assert!(provider.config().proxy().is_some());
    }

    #[test]
    fn test_builder_reports_configuration_errors() {
        let result = ImageryProviderBuilder::new()
            .with_minimum_level(5)
            .with_throttle(Arc::new(RequestThrottle::new(1)))
            .build();

        assert!(matches!(
            result,
            Err(ImageryError::Configuration(
                ConfigError::TooManyMinimumLevelTiles { tile_count: 1024, .. }
            ))
        ));
    }

    #[test]
    fn test_providers_for_same_server_share_throttle() {
        let a = ImageryProviderBuilder::new()
            .with_url("https://builder-share.example.org/")
            .build()
            .unwrap();
        let b = ImageryProviderBuilder::new()
            .with_url("https://builder-share.example.org/")
            .with_file_extension("jpg")
            .build()
            .unwrap();

        assert!(Arc::ptr_eq(a.throttle(), b.throttle()));
    }

    #[test]
    fn test_proxied_providers_share_the_proxy_throttle() {
        let proxy: Arc<dyn Proxy> =
            Arc::new(DefaultProxy::new("https://proxy.builder.example/fetch"));
        let a = ImageryProviderBuilder::new()
            .with_url("https://tiles-one.builder.example/")
            .with_proxy(Arc::clone(&proxy))
            .build()
            .unwrap();
        let b = ImageryProviderBuilder::new()
            .with_url("https://tiles-two.builder.example/")
            .with_proxy(proxy)
            .build()
            .unwrap();

        assert!(Arc::ptr_eq(a.throttle(), b.throttle()));
        assert!(!Arc::ptr_eq(
            a.throttle(),
            &RequestThrottle::for_server("tiles-one.builder.example", 6)
        ));
    }

    #[test]
    fn test_braces_in_base_url_are_kept() {
        let provider = ImageryProviderBuilder::new()
            .with_url("https://{s}.tile.openstreetmap.org/")
            .with_throttle(Arc::new(RequestThrottle::new(1)))
            .build()
            .unwrap();

        assert_eq!(
            provider.tile_url(1, 2, 3),
            "https://{s}.tile.openstreetmap.org/3/1/2.png"
        );
    }
}
