// src/services/image_processor.rs
use crate::errors::TextileGuardError;
use base64::{Engine as _, engine::general_purpose};
use image::{GenericImageView, ImageFormat as ImgFormat};
use std::fs;
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// Thumbnail of a selected image, stored on disk until dropped.
#[derive(Debug)]
pub struct Preview {
    id: Uuid,
    path: PathBuf,
    dimensions: (u32, u32),
}

impl Preview {
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.dimensions
    }

    /// Inline `data:` URI of the thumbnail.
    pub fn to_data_uri(&self) -> Result<String, TextileGuardError> {
        let data = fs::read(&self.path).map_err(|e| {
            TextileGuardError::ImageProcessing(format!("Failed to read preview: {}", e))
        })?;
        Ok(format!(
            "data:image/png;base64,{}",
            general_purpose::STANDARD.encode(data)
        ))
    }
}

impl Drop for Preview {
    fn drop(&mut self) {
        match fs::remove_file(&self.path) {
            Ok(()) => log::debug!("Released preview {}", self.id),
            Err(e) => log::warn!("Failed to release preview {}: {}", self.path.display(), e),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ImageProcessor {
    preview_dir: PathBuf,
    preview_size: u32,
}

impl ImageProcessor {
    pub fn new(preview_dir: impl Into<PathBuf>, preview_size: u32) -> Self {
        Self {
            preview_dir: preview_dir.into(),
            preview_size: preview_size.max(1),
        }
    }

    pub fn content_type(&self, data: &[u8]) -> &'static str {
        match image::guess_format(data) {
            Ok(ImgFormat::Png) => "image/png",
            Ok(ImgFormat::Jpeg) => "image/jpeg",
            Ok(ImgFormat::Gif) => "image/gif",
            Ok(ImgFormat::WebP) => "image/webp",
            Ok(ImgFormat::Bmp) => "image/bmp",
            Ok(ImgFormat::Tiff) => "image/tiff",
            _ => "application/octet-stream",
        }
    }

    /// Decodes `data` once, rejecting anything that is not an image, and
    /// writes the thumbnail. CPU bound; async callers should run it on the
    /// blocking pool.
    pub fn create_preview(&self, data: &[u8]) -> Result<Preview, TextileGuardError> {
        let img = image::load_from_memory(data)
            .map_err(|e| TextileGuardError::ImageProcessing(format!("Invalid image format: {}", e)))?;

        let (width, height) = img.dimensions();
        let max_size = self.preview_size;
        let thumbnail = if width <= max_size && height <= max_size {
            img
        } else {
            img.resize(max_size, max_size, image::imageops::FilterType::Lanczos3)
        };

        fs::create_dir_all(&self.preview_dir).map_err(|e| {
            TextileGuardError::ImageProcessing(format!("Failed to create preview directory: {}", e))
        })?;

        let id = Uuid::new_v4();
        let path = self.preview_dir.join(format!("{}.png", id));
        thumbnail
            .save_with_format(&path, ImgFormat::Png)
            .map_err(|e| {
                TextileGuardError::ImageProcessing(format!("Failed to encode preview: {}", e))
            })?;

        Ok(Preview {
            id,
            path,
            dimensions: thumbnail.dimensions(),
        })
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use image::{ImageBuffer, Rgb};
    use std::io::Cursor;
    use tempfile::TempDir;

    pub(crate) fn png_bytes(width: u32, height: u32) -> Vec<u8> {
        let img = ImageBuffer::from_fn(width, height, |x, y| Rgb([(x % 255) as u8, (y % 255) as u8, 128]));
        let mut output = Vec::new();
        image::DynamicImage::ImageRgb8(img)
            .write_to(&mut Cursor::new(&mut output), ImgFormat::Png)
            .unwrap();
        output
    }

    #[test]
    fn rejects_non_images() {
        let temp = TempDir::new().unwrap();
        let processor = ImageProcessor::new(temp.path(), 64);
        assert!(matches!(
            processor.create_preview(b"not an image"),
            Err(TextileGuardError::ImageProcessing(_))
        ));
        assert_eq!(std::fs::read_dir(temp.path()).unwrap().count(), 0);
        assert_eq!(processor.content_type(b"not an image"), "application/octet-stream");
    }

    #[test]
    fn preview_is_scaled_and_released_on_drop() {
        let temp = TempDir::new().unwrap();
        let processor = ImageProcessor::new(temp.path(), 64);
        let data = png_bytes(256, 128);

        assert_eq!(processor.content_type(&data), "image/png");

        let preview = processor.create_preview(&data).unwrap();
        assert_eq!(preview.dimensions(), (64, 32));
        assert!(preview.to_data_uri().unwrap().starts_with("data:image/png;base64,"));

        let path = preview.path().to_path_buf();
        assert!(path.exists());
        drop(preview);
        assert!(!path.exists());
    }

    #[test]
    fn small_images_keep_their_size() {
        let temp = TempDir::new().unwrap();
        let processor = ImageProcessor::new(temp.path(), 64);
        let preview = processor.create_preview(&png_bytes(20, 10)).unwrap();
        assert_eq!(preview.dimensions(), (20, 10));
    }
}
