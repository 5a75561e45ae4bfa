//! Poster renditions written under `{root}/{movie id}/`.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView, ImageFormat};

use crate::error::{CatalogError, Result};
use crate::models::MovieId;

const DEFAULT_QUALITY: u8 = 80;

/// One of the four files derived from an uploaded poster.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rendition {
    /// Full size, source metadata kept when the upload is already a JPEG
    Main,
    /// 20px wide placeholder, heavily compressed
    Thumb20,
    Mobile300,
    Desktop480,
}

impl Rendition {
    pub const ALL: [Rendition; 4] = [
        Rendition::Main,
        Rendition::Thumb20,
        Rendition::Mobile300,
        Rendition::Desktop480,
    ];

    pub fn file_name(self) -> &'static str {
        match self {
            Rendition::Main => "main.jpg",
            Rendition::Thumb20 => "thumb-20.jpg",
            Rendition::Mobile300 => "main-300.jpg",
            Rendition::Desktop480 => "main-480.jpg",
        }
    }

    pub fn width(self) -> Option<u32> {
        match self {
            Rendition::Main => None,
            Rendition::Thumb20 => Some(20),
            Rendition::Mobile300 => Some(300),
            Rendition::Desktop480 => Some(480),
        }
    }

    pub fn quality(self) -> u8 {
        match self {
            Rendition::Thumb20 => 10,
            _ => DEFAULT_QUALITY,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ThumbnailGenerator {
    root: PathBuf,
}

impl ThumbnailGenerator {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn directory(&self, id: MovieId) -> PathBuf {
        self.root.join(id.to_string())
    }

    /// Decode `source` once and write all renditions for movie `id`.
    ///
    /// Existing files are overwritten. Every rendition runs to completion
    /// before the call returns; if any of them failed, the first error is
    /// reported and the files written by the others are left in place.
    pub async fn generate(&self, source: &[u8], id: MovieId) -> Result<()> {
        let dir = self.directory(id);
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|e| CatalogError::io(format!("creating {}: {}", dir.display(), e)))?;

        let source: Arc<[u8]> = Arc::from(source);
        let decoded = {
            let source = Arc::clone(&source);
            tokio::task::spawn_blocking(move || image::load_from_memory(&source))
                .await
                .map_err(|e| CatalogError::thumbnail(e.to_string()))?
                .map_err(|e| CatalogError::thumbnail(format!("decoding poster: {e}")))?
        };
        let decoded = Arc::new(decoded);
        let source_is_jpeg = matches!(image::guess_format(&source), Ok(ImageFormat::Jpeg));

        let [main, thumb, mobile, desktop] = Rendition::ALL.map(|rendition| {
            let path = dir.join(rendition.file_name());
            let decoded = Arc::clone(&decoded);
            let source = Arc::clone(&source);
            async move {
                let bytes = if rendition == Rendition::Main && source_is_jpeg {
                    source.to_vec()
                } else {
                    tokio::task::spawn_blocking(move || encode(&decoded, rendition))
                        .await
                        .map_err(|e| CatalogError::thumbnail(e.to_string()))??
                };
                write_rendition(&path, &bytes).await
            }
        });
        let (main, thumb, mobile, desktop) = tokio::join!(main, thumb, mobile, desktop);
        main.and(thumb).and(mobile).and(desktop)?;

        log::info!("generated poster renditions in {}", dir.display());
        Ok(())
    }

    /// Remove the image directory of movie `id`. Returns `false` if it did not exist.
    pub async fn remove(&self, id: MovieId) -> Result<bool> {
        let dir = self.directory(id);
        match tokio::fs::remove_dir_all(&dir).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(CatalogError::io(format!(
                "Could not delete files in {}, please try again later: {}",
                dir.display(),
                e
            ))),
        }
    }
}

/// Height that keeps the aspect ratio of a `w`x`h` image scaled to `width`.
pub fn scaled_height(w: u32, h: u32, width: u32) -> u32 {
    if w == 0 {
        return 1;
    }
    let height = (u64::from(h) * u64::from(width) + u64::from(w) / 2) / u64::from(w);
    height.clamp(1, u64::from(u32::MAX)) as u32
}

fn encode(image: &DynamicImage, rendition: Rendition) -> Result<Vec<u8>> {
    let resized = match rendition.width() {
        Some(width) => {
            let (w, h) = image.dimensions();
            image.resize_exact(width, scaled_height(w, h, width), FilterType::Lanczos3)
        }
        None => image.clone(),
    };
    let rgb = DynamicImage::ImageRgb8(resized.to_rgb8());

    let mut out = Vec::new();
    let encoder = JpegEncoder::new_with_quality(&mut out, rendition.quality());
    rgb.write_with_encoder(encoder).map_err(|e| {
        CatalogError::thumbnail(format!("encoding {}: {e}", rendition.file_name()))
    })?;
    Ok(out)
}

async fn write_rendition(path: &Path, bytes: &[u8]) -> Result<()> {
    tokio::fs::write(path, bytes)
        .await
        .map_err(|e| CatalogError::thumbnail(format!("writing {}: {e}", path.display())))?;
    log::debug!("wrote {} ({} bytes)", path.display(), bytes.len());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scaled_height_keeps_aspect_ratio() {
        assert_eq!(scaled_height(600, 900, 300), 450);
        assert_eq!(scaled_height(600, 900, 480), 720);
        assert_eq!(scaled_height(600, 900, 20), 30);
        assert_eq!(scaled_height(1000, 1, 20), 1);
    }

    #[test]
    fn renditions_match_published_layout() {
        let names: Vec<_> = Rendition::ALL.iter().map(|r| r.file_name()).collect();
        assert_eq!(names, ["main.jpg", "thumb-20.jpg", "main-300.jpg", "main-480.jpg"]);
        assert_eq!(Rendition::Thumb20.quality(), 10);
    }

    fn jpeg_poster() -> Vec<u8> {
        let img = image::RgbImage::from_pixel(40, 60, image::Rgb([90, 30, 200]));
        let mut out = std::io::Cursor::new(Vec::new());
        DynamicImage::ImageRgb8(img)
            .write_to(&mut out, ImageFormat::Jpeg)
            .unwrap();
        out.into_inner()
    }

    #[tokio::test]
    async fn failed_rendition_waits_for_the_others() {
        let root = tempfile::tempdir().unwrap();
        let generator = ThumbnailGenerator::new(root.path());
        let dir = generator.directory(9);
        // A directory where a file should go makes that one write fail.
        std::fs::create_dir_all(dir.join("thumb-20.jpg")).unwrap();

        let err = generator.generate(&jpeg_poster(), 9).await.unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::ThumbnailError);
        for name in ["main.jpg", "main-300.jpg", "main-480.jpg"] {
            assert!(dir.join(name).is_file(), "{name} missing");
        }

        assert!(generator.remove(9).await.unwrap());
        assert!(!dir.exists());
    }

    #[tokio::test]
    async fn remove_reports_missing_directory() {
        let root = tempfile::tempdir().unwrap();
        let generator = ThumbnailGenerator::new(root.path());
        assert!(!generator.remove(3).await.unwrap());
    }
}
