//! Prelude module for common osm-imagery types and traits
//!
//! This module re-exports the most commonly used types and traits
//! for easy importing with `use osm_imagery::prelude::*;`

pub use crate::core::{
    config::{ConfigError, ProviderConfig, ProviderOptions},
    credit::Credit,
    geo::{Cartographic, Ellipsoid, Rectangle, TileCoord},
    projection::WebMercatorProjection,
    tiling_scheme::{TilingScheme, WebMercatorTilingScheme},
};

pub use crate::provider::{
    DiscardMissingTileImagePolicy, ImageryFeatureInfo, ImageryProvider, ImageryProviderBuilder,
    NeverTileDiscardPolicy, OpenStreetMapImageryProvider, RequestOutcome, TileDiscardPolicy,
    TileImage, UrlTemplateImageryProvider,
};

pub use crate::tiles::{
    DefaultProxy, HttpTileFetcher, Proxy, RequestThrottle, TileFetchError, TileFetcher,
    UrlTemplate,
};

pub use crate::{ImageryError, Result};
