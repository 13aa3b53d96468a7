use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

use crate::core::constants::DEFAULT_CREDIT_TEXT;

/// Attribution for imagery. Shared read-only by every tile a provider serves.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Credit {
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
}

impl Credit {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            image_url: None,
            link: None,
        }
    }

    pub fn with_image_url(mut self, image_url: impl Into<String>) -> Self {
        self.image_url = Some(image_url.into());
        self
    }

    pub fn with_link(mut self, link: impl Into<String>) -> Self {
        self.link = Some(link.into());
        self
    }
}

impl From<&str> for Credit {
    fn from(text: &str) -> Self {
        Self::new(text)
    }
}

impl From<String> for Credit {
    fn from(text: String) -> Self {
        Self::new(text)
    }
}

impl fmt::Display for Credit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

/// Credit used by every provider that was not given one.
pub static DEFAULT_CREDIT: Lazy<Arc<Credit>> = Lazy::new(|| Arc::new(Credit::new(DEFAULT_CREDIT_TEXT)));

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_credit_is_shared() {
        let a = Arc::clone(&DEFAULT_CREDIT);
        let b = Arc::clone(&DEFAULT_CREDIT);
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(a.text, DEFAULT_CREDIT_TEXT);
    }

    #[test]
    fn test_credit_deserializes_without_optional_fields() {
        let credit: Credit = serde_json::from_str(r#"{"text": "Tiles by me"}"#).unwrap();
        assert_eq!(credit, Credit::new("Tiles by me"));
        assert_eq!(credit.to_string(), "Tiles by me");
    }
}
