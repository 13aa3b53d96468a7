use std::fmt::Debug;

/// Rewrites a resource URL so the request goes through a proxy.
pub trait Proxy: Debug + Send + Sync {
    fn get_url(&self, resource: &str) -> String;
}

/// Proxy that passes the resource as the percent-encoded query string of a
/// fixed proxy endpoint: `<proxy>?<resource>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DefaultProxy {
    proxy: String,
}

impl DefaultProxy {
    pub fn new(proxy: impl Into<String>) -> Self {
        Self {
            proxy: proxy.into(),
        }
    }
}

impl Proxy for DefaultProxy {
    fn get_url(&self, resource: &str) -> String {
        format!("{}?{}", self.proxy, urlencoding::encode(resource))
    }
}
