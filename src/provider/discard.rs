//! Policies deciding whether a downloaded tile should be thrown away.
//!
//! Some servers answer requests for tiles they do not have with a placeholder
//! image instead of an error. [`DiscardMissingTileImagePolicy`] recognises such a
//! placeholder by sampling a few pixels of a known "missing" image and comparing
//! every downloaded tile against them.

use image::{DynamicImage, GenericImageView, Rgba};
use once_cell::sync::OnceCell;
use std::fmt::Debug;

use crate::tiles::loader::{TileFetchError, TileFetcher};

pub trait TileDiscardPolicy: Debug + Send + Sync {
    /// Whether the policy can judge tiles yet
    fn is_ready(&self) -> bool;

    fn should_discard(&self, image: &DynamicImage) -> bool;
}

/// Keeps every tile
#[derive(Debug, Default, Clone, Copy)]
pub struct NeverTileDiscardPolicy;

impl TileDiscardPolicy for NeverTileDiscardPolicy {
    fn is_ready(&self) -> bool {
        true
    }

    fn should_discard(&self, _image: &DynamicImage) -> bool {
        false
    }
}

/// Discards tiles whose sampled pixels all match the server's "missing tile" image.
/// Not ready until the missing image has been supplied.
#[derive(Debug)]
pub struct DiscardMissingTileImagePolicy {
    pixels_to_check: Vec<(u32, u32)>,
    disable_check_if_all_pixels_are_transparent: bool,
    // `None` inside the cell: the missing image was seen but never matches anything
    missing_pixels: OnceCell<Option<Vec<Option<Rgba<u8>>>>>,
}

impl DiscardMissingTileImagePolicy {
    pub fn new(pixels_to_check: Vec<(u32, u32)>) -> Self {
        Self {
            pixels_to_check,
            disable_check_if_all_pixels_are_transparent: false,
            missing_pixels: OnceCell::new(),
        }
    }

    /// Stop discarding altogether when every sampled pixel of the missing image is
    /// fully transparent
    pub fn disable_check_if_all_pixels_are_transparent(mut self, disable: bool) -> Self {
        self.disable_check_if_all_pixels_are_transparent = disable;
        self
    }

    /// Records the reference image. Returns `false` if one was already recorded.
    pub fn set_missing_image(&self, image: &DynamicImage) -> bool {
        let sampled: Vec<Option<Rgba<u8>>> = self
            .pixels_to_check
            .iter()
            .map(|&(x, y)| image.in_bounds(x, y).then(|| image.get_pixel(x, y)))
            .collect();

        let all_transparent = sampled.iter().all(|p| matches!(p, Some(px) if px[3] == 0));
        let missing = if self.disable_check_if_all_pixels_are_transparent && all_transparent {
            log::debug!("missing tile image is fully transparent; discarding disabled");
            None
        } else {
            Some(sampled)
        };

        self.missing_pixels.set(missing).is_ok()
    }

    /// Downloads and records the reference image. When that fails the policy
    /// becomes ready and never discards anything.
    pub async fn load_missing_image(
        &self,
        fetcher: &dyn TileFetcher,
        url: &str,
    ) -> Result<(), TileFetchError> {
        let loaded = match fetcher.fetch(url).await {
            Ok(bytes) => image::load_from_memory(&bytes)
                .map_err(|e| TileFetchError::MalformedImage(e.to_string())),
            Err(e) => Err(e),
        };

        match loaded {
            Ok(image) => {
                self.set_missing_image(&image);
                Ok(())
            }
            Err(e) => {
                log::warn!(
                    "failed to load missing tile image from {}: {}; tiles will not be discarded",
                    url,
                    e
                );
                let _ = self.missing_pixels.set(None);
                Err(e)
            }
        }
    }
}

impl TileDiscardPolicy for DiscardMissingTileImagePolicy {
    fn is_ready(&self) -> bool {
        self.missing_pixels.get().is_some()
    }

    fn should_discard(&self, image: &DynamicImage) -> bool {
        let Some(Some(missing)) = self.missing_pixels.get() else {
            return false;
        };

        self.pixels_to_check
            .iter()
            .zip(missing)
            .all(|(&(x, y), expected)| match expected {
                Some(expected) => image.in_bounds(x, y) && image.get_pixel(x, y) == *expected,
                None => false,
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::RgbaImage;

    fn solid(color: [u8; 4]) -> DynamicImage {
        DynamicImage::ImageRgba8(RgbaImage::from_pixel(8, 8, Rgba(color)))
    }

    #[test]
    fn test_never_policy() {
        let policy = NeverTileDiscardPolicy;
        assert!(policy.is_ready());
        assert!(!policy.should_discard(&solid([0, 0, 0, 255])));
    }

    #[test]
    fn test_missing_image_policy_requires_reference() {
        let policy = DiscardMissingTileImagePolicy::new(vec![(0, 0), (4, 4)]);
        assert!(!policy.is_ready());
        assert!(!policy.should_discard(&solid([200, 200, 200, 255])));

        assert!(policy.set_missing_image(&solid([200, 200, 200, 255])));
        assert!(!policy.set_missing_image(&solid([1, 1, 1, 255])));
        assert!(policy.is_ready());
    }

    #[test]
    fn test_missing_image_policy_matches_pixels() {
        let policy = DiscardMissingTileImagePolicy::new(vec![(0, 0), (4, 4)]);
        policy.set_missing_image(&solid([200, 200, 200, 255]));

        assert!(policy.should_discard(&solid([200, 200, 200, 255])));
        assert!(!policy.should_discard(&solid([10, 120, 30, 255])));

        let mut partly = RgbaImage::from_pixel(8, 8, Rgba([200, 200, 200, 255]));
        partly.put_pixel(4, 4, Rgba([0, 0, 0, 255]));
        assert!(!policy.should_discard(&DynamicImage::ImageRgba8(partly)));
    }

    #[test]
    fn test_out_of_bounds_pixels_never_match() {
        let policy = DiscardMissingTileImagePolicy::new(vec![(0, 0), (100, 100)]);
        policy.set_missing_image(&solid([200, 200, 200, 255]));
        assert!(!policy.should_discard(&solid([200, 200, 200, 255])));
    }

    struct UnavailableFetcher;

    #[async_trait::async_trait]
    impl TileFetcher for UnavailableFetcher {
        async fn fetch(&self, _url: &str) -> Result<Vec<u8>, TileFetchError> {
            Err(TileFetchError::HttpStatus(503))
        }
    }

    struct GarbageFetcher;

    #[async_trait::async_trait]
    impl TileFetcher for GarbageFetcher {
        async fn fetch(&self, _url: &str) -> Result<Vec<u8>, TileFetchError> {
            Ok(b"not an image".to_vec())
        }
    }

    #[tokio::test]
    async fn test_failed_missing_image_download_never_discards() {
        let policy = DiscardMissingTileImagePolicy::new(vec![(0, 0)]);
        let result = policy
            .load_missing_image(&UnavailableFetcher, "https://tiles.example.org/missing.png")
            .await;

        assert_eq!(result, Err(TileFetchError::HttpStatus(503)));
        assert!(policy.is_ready());
        assert!(!policy.should_discard(&solid([200, 200, 200, 255])));
    }

    #[tokio::test]
    async fn test_undecodable_missing_image_never_discards() {
        let policy = DiscardMissingTileImagePolicy::new(vec![(0, 0)]);
        let result = policy
            .load_missing_image(&GarbageFetcher, "https://tiles.example.org/missing.png")
            .await;

        assert!(matches!(result, Err(TileFetchError::MalformedImage(_))));
        assert!(policy.is_ready());
        assert!(!policy.should_discard(&solid([0, 0, 0, 255])));
    }

    #[test]
    fn test_transparent_reference_disables_discarding() {
        let policy = DiscardMissingTileImagePolicy::new(vec![(0, 0)])
            .disable_check_if_all_pixels_are_transparent(true);
        policy.set_missing_image(&solid([0, 0, 0, 0]));

        assert!(policy.is_ready());
        assert!(!policy.should_discard(&solid([0, 0, 0, 0])));
    }
}
