//! Image loading with format detection and size limits.
//!
//! Reading and decoding happen on the blocking pool so callers on the async
//! runtime are never stalled by large files.

use image::{DynamicImage, GenericImageView, ImageFormat};
use std::io::Cursor;
use std::path::Path;

use crate::config::LimitsConfig;
use crate::error::PipelineError;

/// Loads images subject to [`LimitsConfig`].
#[derive(Debug, Clone)]
pub struct ImageLoader {
    limits: LimitsConfig,
}

/// Raw file bytes plus the detected format.
pub struct ImageBytes {
    pub bytes: Vec<u8>,
    pub format: ImageFormat,
}

impl ImageLoader {
    /// Create a new loader with the given limits.
    pub fn new(limits: LimitsConfig) -> Self {
        Self { limits }
    }

    /// Read the file and detect its format without decoding pixels.
    pub async fn read(&self, path: &Path) -> Result<ImageBytes, PipelineError> {
        let bytes = self.read_checked(path).await?;
        let format = detect_format(&bytes, path)?;
        Ok(ImageBytes { bytes, format })
    }

    /// Read and fully decode an image.
    pub async fn load(&self, path: &Path) -> Result<DynamicImage, PipelineError> {
        let bytes = self.read_checked(path).await?;
        let path_owned = path.to_path_buf();
        let max_dim = self.limits.max_image_dimension;

        tokio::task::spawn_blocking(move || decode_bytes(bytes, &path_owned, max_dim))
            .await
            .map_err(|e| PipelineError::Decode {
                path: path.to_path_buf(),
                message: format!("Task join error: {e}"),
            })?
    }

    async fn read_checked(&self, path: &Path) -> Result<Vec<u8>, PipelineError> {
        let metadata = match tokio::fs::metadata(path).await {
            Ok(metadata) => metadata,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(PipelineError::FileNotFound(path.to_path_buf()));
            }
            Err(e) => {
                return Err(PipelineError::Decode {
                    path: path.to_path_buf(),
                    message: format!("Cannot read metadata: {e}"),
                });
            }
        };

        let max_bytes = self.limits.max_file_size_mb * 1024 * 1024;
        if metadata.len() > max_bytes {
            return Err(PipelineError::FileTooLarge {
                path: path.to_path_buf(),
                size_mb: metadata.len() / (1024 * 1024),
                max_mb: self.limits.max_file_size_mb,
            });
        }

        tokio::fs::read(path).await.map_err(|e| PipelineError::Decode {
            path: path.to_path_buf(),
            message: format!("Cannot read file: {e}"),
        })
    }
}

fn detect_format(bytes: &[u8], path: &Path) -> Result<ImageFormat, PipelineError> {
    image::guess_format(bytes)
        .or_else(|_| ImageFormat::from_path(path))
        .map_err(|_| PipelineError::UnsupportedFormat {
            path: path.to_path_buf(),
            format: path
                .extension()
                .and_then(|e| e.to_str())
                .unwrap_or("unknown")
                .to_string(),
        })
}

/// Synchronous decode from bytes (runs in spawn_blocking).
fn decode_bytes(bytes: Vec<u8>, path: &Path, max_dim: u32) -> Result<DynamicImage, PipelineError> {
    let format = detect_format(&bytes, path)?;
    let image = image::load(Cursor::new(bytes), format).map_err(|e| PipelineError::Decode {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;

    let (width, height) = image.dimensions();
    if width > max_dim || height > max_dim {
        return Err(PipelineError::ImageTooLarge {
            path: path.to_path_buf(),
            width,
            height,
            max_dim,
        });
    }
    Ok(image)
}

/// Convert an ImageFormat to a string representation.
pub fn format_to_string(format: ImageFormat) -> &'static str {
    match format {
        ImageFormat::Jpeg => "jpeg",
        ImageFormat::Png => "png",
        ImageFormat::WebP => "webp",
        ImageFormat::Gif => "gif",
        ImageFormat::Tiff => "tiff",
        ImageFormat::Bmp => "bmp",
        ImageFormat::Ico => "ico",
        ImageFormat::Pnm => "pnm",
        ImageFormat::Avif => "avif",
        _ => "unknown",
    }
}
