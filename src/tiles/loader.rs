use async_trait::async_trait;
use once_cell::sync::Lazy;
use std::time::Duration;

/// Shared async HTTP client with a custom User-Agent so that public tile
/// servers (e.g. OpenStreetMap) don't reject the request. Building the client
/// once avoids the cost of TLS and connection pool setup for every tile.
pub(crate) static HTTP_CLIENT: Lazy<reqwest::Client> = Lazy::new(|| {
    reqwest::Client::builder()
        .user_agent(concat!("osm-imagery/", env!("CARGO_PKG_VERSION")))
        .timeout(Duration::from_secs(30))
        .tcp_keepalive(Duration::from_secs(30))
        .pool_idle_timeout(Duration::from_secs(90))
        .pool_max_idle_per_host(16)
        .build()
        .expect("failed to build reqwest async client")
});

/// Why a tile could not be delivered
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TileFetchError {
    #[error("HTTP {0}")]
    HttpStatus(u16),

    #[error("request timed out")]
    Timeout,

    #[error("network error: {0}")]
    Network(String),

    #[error("malformed image: {0}")]
    MalformedImage(String),

    #[error("tile discarded by the tile discard policy")]
    Discarded,
}

/// Transport used to download tile payloads
#[async_trait]
pub trait TileFetcher: Send + Sync {
    /// Downloads the raw bytes behind `url`
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, TileFetchError>;
}

/// Fetches tiles over HTTP(S) with the shared client
#[derive(Debug, Clone)]
pub struct HttpTileFetcher {
    client: reqwest::Client,
    default_scheme: String,
}

impl HttpTileFetcher {
    pub fn new() -> Self {
        Self {
            client: HTTP_CLIENT.clone(),
            default_scheme: "https".to_string(),
        }
    }

    /// Scheme used for protocol-relative URLs such as `//a.tile.openstreetmap.org/`
    pub fn with_default_scheme(mut self, scheme: impl Into<String>) -> Self {
        self.default_scheme = scheme.into();
        self
    }

    /// Uses a caller-configured client instead of the shared one
    pub fn with_client(mut self, client: reqwest::Client) -> Self {
        self.client = client;
        self
    }

    fn absolute_url(&self, url: &str) -> String {
        match url.strip_prefix("//") {
            Some(rest) => format!("{}://{}", self.default_scheme, rest),
            None => url.to_string(),
        }
    }
}

impl Default for HttpTileFetcher {
    fn default() -> Self {
        Self::new()
    }
}

fn classify(error: reqwest::Error) -> TileFetchError {
    if error.is_timeout() {
        TileFetchError::Timeout
    } else {
        TileFetchError::Network(error.to_string())
    }
}

#[async_trait]
impl TileFetcher for HttpTileFetcher {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, TileFetchError> {
        let url = self.absolute_url(url);
        let response = self.client.get(&url).send().await.map_err(classify)?;

        if !response.status().is_success() {
            return Err(TileFetchError::HttpStatus(response.status().as_u16()));
        }

        let bytes = response.bytes().await.map_err(classify)?;
        Ok(bytes.to_vec())
    }
}
