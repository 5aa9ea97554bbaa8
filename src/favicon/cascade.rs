//! Standard size ladder generation from one decoded raster
//!
//! Append-only: sizes already on disk are never regenerated.

use image::imageops::FilterType;
use image::{DynamicImage, ImageFormat};
use std::io::Cursor;
use std::path::PathBuf;
use tracing::debug;

use crate::errors::FaviconResult;
use crate::favicon::domain_cache::{CASCADE_SIZES, DomainCache, StoreOutcome};

/// Result of one cascade run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CascadeOutcome {
    /// Largest size present after the run, `None` when no size applies
    pub representative: Option<PathBuf>,
    pub written: Vec<u32>,
    pub existing: Vec<u32>,
}

impl CascadeOutcome {
    pub fn is_empty(&self) -> bool {
        self.representative.is_none()
    }
}

/// Cascade sizes not larger than `max_dimension`, largest first
pub fn target_sizes(max_dimension: u32) -> Vec<u32> {
    CASCADE_SIZES
        .into_iter()
        .filter(|size| *size <= max_dimension)
        .collect()
}

#[derive(Debug, Clone)]
pub struct CascadeGenerator {
    cache: DomainCache,
}

impl CascadeGenerator {
    pub fn new(cache: DomainCache) -> Self {
        Self { cache }
    }

    pub async fn generate(&self, domain: &str, image: &DynamicImage) -> FaviconResult<CascadeOutcome> {
        let max_dimension = image.width().max(image.height());
        let sizes = target_sizes(max_dimension);
        let mut outcome = CascadeOutcome::default();

        for size in sizes {
            let path = match self.cache.lookup_exact_size(domain, size).await {
                Some(path) => {
                    outcome.existing.push(size);
                    path
                }
                None => {
                    let png = resize_to_png(image, size)?;
                    match self.cache.store(domain, Some(size), "png", &png).await? {
                        StoreOutcome::Written(path) => {
                            outcome.written.push(size);
                            path
                        }
                        StoreOutcome::Existing(path) => {
                            outcome.existing.push(size);
                            path
                        }
                    }
                }
            };
            if outcome.representative.is_none() {
                outcome.representative = Some(path);
            }
        }

        debug!(
            "Cascade for {} from {}x{}: wrote {:?}, kept {:?}",
            domain,
            image.width(),
            image.height(),
            outcome.written,
            outcome.existing
        );
        Ok(outcome)
    }
}

/// Bilinear resample into a `size`x`size` RGBA PNG
pub fn resize_to_png(image: &DynamicImage, size: u32) -> FaviconResult<Vec<u8>> {
    let resized = DynamicImage::ImageRgba8(
        image
            .resize_exact(size, size, FilterType::Triangle)
            .to_rgba8(),
    );

    let mut buffer = Vec::new();
    resized.write_to(&mut Cursor::new(&mut buffer), ImageFormat::Png)?;
    Ok(buffer)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GenericImageView, RgbaImage};
    use rstest::rstest;
    use tempfile::TempDir;

    fn solid(width: u32, height: u32) -> DynamicImage {
        DynamicImage::ImageRgba8(RgbaImage::from_pixel(
            width,
            height,
            image::Rgba([200, 10, 10, 255]),
        ))
    }

    #[rstest]
    #[case(512, vec![256, 128, 64, 32, 16])]
    #[case(256, vec![256, 128, 64, 32, 16])]
    #[case(255, vec![128, 64, 32, 16])]
    #[case(64, vec![64, 32, 16])]
    #[case(32, vec![32, 16])]
    #[case(16, vec![16])]
    #[case(15, vec![])]
    #[case(0, vec![])]
    fn test_target_sizes(#[case] max_dimension: u32, #[case] expected: Vec<u32>) {
        assert_eq!(target_sizes(max_dimension), expected);
    }

    #[tokio::test]
    async fn test_exact_16_produces_only_16() {
        let dir = TempDir::new().unwrap();
        let generator = CascadeGenerator::new(DomainCache::new(dir.path()));

        let outcome = generator.generate("example.com", &solid(16, 16)).await.unwrap();
        assert_eq!(outcome.written, vec![16]);
        assert_eq!(
            outcome.representative,
            Some(dir.path().join("example_com_16.png"))
        );
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[tokio::test]
    async fn test_below_16_produces_nothing() {
        let dir = TempDir::new().unwrap();
        let generator = CascadeGenerator::new(DomainCache::new(dir.path()));

        let outcome = generator.generate("example.com", &solid(15, 15)).await.unwrap();
        assert!(outcome.is_empty());
        assert!(outcome.written.is_empty());
        assert!(!dir.path().join("example_com_16.png").exists());
    }

    #[tokio::test]
    async fn test_second_run_writes_nothing() {
        let dir = TempDir::new().unwrap();
        let cache = DomainCache::new(dir.path());
        let generator = CascadeGenerator::new(cache.clone());
        let image = solid(300, 300);

        let first = generator.generate("example.com", &image).await.unwrap();
        assert_eq!(first.written, vec![256, 128, 64, 32, 16]);
        let before = std::fs::read(dir.path().join("example_com_64.png")).unwrap();

        let second = generator.generate("example.com", &image).await.unwrap();
        assert!(second.written.is_empty());
        assert_eq!(second.existing, vec![256, 128, 64, 32, 16]);
        assert_eq!(second.representative, first.representative);
        assert_eq!(
            std::fs::read(dir.path().join("example_com_64.png")).unwrap(),
            before
        );
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 5);
    }

    #[tokio::test]
    async fn test_variants_are_square_rgba_png() {
        let dir = TempDir::new().unwrap();
        let generator = CascadeGenerator::new(DomainCache::new(dir.path()));

        let outcome = generator.generate("example.com", &solid(40, 20)).await.unwrap();
        assert_eq!(outcome.written, vec![32, 16]);

        let bytes = std::fs::read(dir.path().join("example_com_32.png")).unwrap();
        let decoded = image::load_from_memory_with_format(&bytes, ImageFormat::Png).unwrap();
        assert_eq!(decoded.dimensions(), (32, 32));
        assert!(decoded.color().has_alpha());
    }
}
