use fast_image_resize::images::Image;
use fast_image_resize::{PixelType, Resizer};
use image::{DynamicImage, ImageFormat, RgbaImage};
use serde::{Deserialize, Serialize};
use std::io::Cursor;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ImageProcessingError {
    #[error("Failed to load image: {0}")]
    LoadError(#[from] image::ImageError),

    #[error("Failed to resize image: {0}")]
    ResizeError(String),

    #[error("Invalid image dimensions")]
    InvalidDimensions,
}

pub type ImageResult<T> = Result<T, ImageProcessingError>;

/// Encoding used for thumbnail files on disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ThumbnailFormat {
    #[default]
    Png,
    Jpeg,
}

impl ThumbnailFormat {
    /// File extension used for stored thumbnails.
    pub fn extension(self) -> &'static str {
        match self {
            ThumbnailFormat::Png => "png",
            ThumbnailFormat::Jpeg => "jpg",
        }
    }

    fn image_format(self) -> ImageFormat {
        match self {
            ThumbnailFormat::Png => ImageFormat::Png,
            ThumbnailFormat::Jpeg => ImageFormat::Jpeg,
        }
    }
}

/// Largest size with the same aspect ratio that fits in a `max_size` square.
/// Images already inside the box keep their size.
pub fn fit_within(width: u32, height: u32, max_size: u32) -> (u32, u32) {
    if width <= max_size && height <= max_size {
        return (width, height);
    }

    let scale = max_size as f64 / width.max(height) as f64;
    let scaled = |side: u32| ((side as f64 * scale).round() as u32).max(1);
    (scaled(width), scaled(height))
}

/// Decodes any supported format into RGBA8.
pub fn decode_rgba(data: &[u8]) -> ImageResult<RgbaImage> {
    Ok(image::load_from_memory(data)?.to_rgba8())
}

/// Decodes `data` and scales it down to fit inside `max_size`.
pub fn render_thumbnail(data: &[u8], max_size: u32) -> ImageResult<RgbaImage> {
    let decoded = image::load_from_memory(data)?;
    resize_to_fit(&decoded, max_size)
}

/// Scales down to fit a `max_size` square, keeping the aspect ratio.
/// Smaller images are returned unscaled.
pub fn resize_to_fit(image: &DynamicImage, max_size: u32) -> ImageResult<RgbaImage> {
    let (width, height) = (image.width(), image.height());
    if width == 0 || height == 0 || max_size == 0 {
        return Err(ImageProcessingError::InvalidDimensions);
    }

    let rgba = image.to_rgba8();
    let (target_width, target_height) = fit_within(width, height, max_size);
    if (target_width, target_height) == (width, height) {
        return Ok(rgba);
    }

    let src = Image::from_vec_u8(width, height, rgba.into_raw(), PixelType::U8x4)
        .map_err(|e| ImageProcessingError::ResizeError(e.to_string()))?;
    let mut dst = Image::new(target_width, target_height, PixelType::U8x4);

    Resizer::new()
        .resize(&src, &mut dst, None)
        .map_err(|e| ImageProcessingError::ResizeError(e.to_string()))?;

    RgbaImage::from_raw(target_width, target_height, dst.into_vec())
        .ok_or(ImageProcessingError::InvalidDimensions)
}

/// Encodes a thumbnail for the disk cache.
pub fn encode(image: &RgbaImage, format: ThumbnailFormat) -> ImageResult<Vec<u8>> {
    let mut out = Cursor::new(Vec::new());
    match format {
        // JPEG has no alpha channel
        ThumbnailFormat::Jpeg => DynamicImage::ImageRgba8(image.clone())
            .to_rgb8()
            .write_to(&mut out, format.image_format())?,
        ThumbnailFormat::Png => image.write_to(&mut out, format.image_format())?,
    }
    Ok(out.into_inner())
}

pub fn is_supported_extension(ext: &str) -> bool {
    matches!(
        ext.to_lowercase().as_str(),
        "png" | "jpg" | "jpeg" | "gif" | "webp" | "bmp" | "tiff" | "tif" | "ico" | "avif"
    )
}

/// Human readable byte count, e.g. `1.5 MB`.
pub fn format_image_size(size_bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB"];
    let mut size = size_bytes as f64;
    let mut unit_index = 0;

    while size >= 1024.0 && unit_index < UNITS.len() - 1 {
        size /= 1024.0;
        unit_index += 1;
    }

    format!("{:.1} {}", size, UNITS[unit_index])
}
