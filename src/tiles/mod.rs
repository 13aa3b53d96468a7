pub mod loader;
pub mod proxy;
pub mod source;
pub mod throttle;

// Re-exports for convenience
pub use loader::{HttpTileFetcher, TileFetchError, TileFetcher};
pub use proxy::{DefaultProxy, Proxy};
pub use source::{TileSource, UrlTemplate};
pub use throttle::{server_key, RequestThrottle, ThrottlePermit};
