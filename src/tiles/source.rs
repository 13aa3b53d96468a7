use std::fmt::Write;

use crate::core::config::ConfigError;
use crate::core::geo::TileCoord;

/// Trait representing anything that can produce tile URLs for a given coordinate.
pub trait TileSource: Send + Sync {
    /// Build a URL for the requested `coord`.
    fn url(&self, coord: TileCoord) -> String;
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum TemplatePart {
    Literal(String),
    Level,
    X,
    Y,
    ReverseY,
    Subdomain,
}

/// A tile URL pattern such as `https://{s}.tile.example.org/{z}/{x}/{y}.png`.
///
/// Recognised placeholders are `{z}`, `{x}`, `{y}`, `{reverseY}` (row counted from
/// the south) and `{s}` (one of the subdomains, rotated by `(x + y) % len`).
/// Anything else in braces is copied through untouched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UrlTemplate {
    template: String,
    parts: Vec<TemplatePart>,
    subdomains: Vec<String>,
}

impl UrlTemplate {
    /// Parses `template`. Templates must address every tile uniquely, so `{z}`, `{x}`
    /// and one of `{y}` / `{reverseY}` are required.
    pub fn parse(template: &str, subdomains: Vec<String>) -> Result<Self, ConfigError> {
        let mut parts = Vec::new();
        let mut literal = String::new();
        let mut rest = template;

        while let Some(open) = rest.find('{') {
            literal.push_str(&rest[..open]);
            let after = &rest[open..];
            let Some(close) = after.find('}') else {
                rest = after;
                break;
            };

            let tag = &after[1..close];
            let part = match tag {
                "z" => Some(TemplatePart::Level),
                "x" => Some(TemplatePart::X),
                "y" => Some(TemplatePart::Y),
                "reverseY" => Some(TemplatePart::ReverseY),
                "s" => Some(TemplatePart::Subdomain),
                _ => None,
            };

            match part {
                Some(part) => {
                    if !literal.is_empty() {
                        parts.push(TemplatePart::Literal(std::mem::take(&mut literal)));
                    }
                    parts.push(part);
                }
                None => literal.push_str(&after[..=close]),
            }
            rest = &after[close + 1..];
        }
        literal.push_str(rest);
        if !literal.is_empty() {
            parts.push(TemplatePart::Literal(literal));
        }

        let has = |wanted: &TemplatePart| parts.iter().any(|p| p == wanted);
        if !has(&TemplatePart::Level)
            || !has(&TemplatePart::X)
            || !(has(&TemplatePart::Y) || has(&TemplatePart::ReverseY))
        {
            return Err(ConfigError::InvalidUrlTemplate(format!(
                "{} must contain {{z}}, {{x}} and {{y}} or {{reverseY}}",
                template
            )));
        }
        if has(&TemplatePart::Subdomain) && subdomains.is_empty() {
            return Err(ConfigError::InvalidUrlTemplate(format!(
                "{} uses {{s}} but no subdomains were given",
                template
            )));
        }

        Ok(Self {
            template: template.to_string(),
            parts,
            subdomains,
        })
    }

    /// Template for `<base_url><level>/<x>/<y>.<extension>`. The base URL and the
    /// extension are copied verbatim, braces included.
    pub fn from_base_url(base_url: &str, file_extension: &str) -> Self {
        Self {
            template: format!("{}{{z}}/{{x}}/{{y}}.{}", base_url, file_extension),
            parts: vec![
                TemplatePart::Literal(base_url.to_string()),
                TemplatePart::Level,
                TemplatePart::Literal("/".to_string()),
                TemplatePart::X,
                TemplatePart::Literal("/".to_string()),
                TemplatePart::Y,
                TemplatePart::Literal(format!(".{}", file_extension)),
            ],
            subdomains: Vec::new(),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.template
    }

    pub fn subdomains(&self) -> &[String] {
        &self.subdomains
    }
}

impl TileSource for UrlTemplate {
    fn url(&self, coord: TileCoord) -> String {
        let mut url = String::with_capacity(self.template.len() + 16);

        for part in &self.parts {
            // Writing into a String cannot fail.
            let _ = match part {
                TemplatePart::Literal(text) => {
                    url.push_str(text);
                    Ok(())
                }
                TemplatePart::Level => write!(url, "{}", coord.level),
                TemplatePart::X => write!(url, "{}", coord.x),
                TemplatePart::Y => write!(url, "{}", coord.y),
                TemplatePart::ReverseY => write!(url, "{}", coord.reverse_y()),
                TemplatePart::Subdomain => {
                    let idx = (u64::from(coord.x) + u64::from(coord.y))
                        % self.subdomains.len() as u64;
                    url.push_str(&self.subdomains[idx as usize]);
                    Ok(())
                }
            };
        }

        url
    }
}
