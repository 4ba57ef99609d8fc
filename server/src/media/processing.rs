//! Image processing for managed uploads.
//!
//! Generates blurhash placeholders, a thumbnail, and — when it actually
//! reduces bytes — a re-encoded optimized rendition of the original.

use std::io::Cursor;

use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView, ImageFormat, ImageReader, Limits};
use thiserror::Error;

/// Maximum file size we'll attempt to process (20 MB).
const MAX_PROCESSABLE_SIZE: usize = 20 * 1024 * 1024;

/// Thumbnail max dimension (256px).
const THUMBNAIL_MAX_DIM: u32 = 256;

/// Blurhash component counts (width x height).
const BLURHASH_COMPONENTS_X: u32 = 4;
const BLURHASH_COMPONENTS_Y: u32 = 3;

/// Size to downscale to before computing blurhash (for speed).
const BLURHASH_SAMPLE_SIZE: u32 = 32;

/// Maximum image dimension (width or height) to prevent decompression
/// bombs expanding a small compressed file into enormous RGBA buffers.
const MAX_IMAGE_DIMENSION: u32 = 16384;

#[derive(Error, Debug)]
pub enum ProcessingError {
    #[error("File too large for processing: {0} bytes")]
    TooLarge(usize),
    #[error("Unsupported image format: {0}")]
    UnsupportedFormat(String),
    #[error("Image decode failed: {0}")]
    DecodeFailed(String),
    #[error("Blurhash encoding failed: {0}")]
    BlurhashFailed(String),
    #[error("Image encoding failed: {0}")]
    EncodeFailed(String),
}

/// Result of processing an image: dimensions, blurhash, and optional
/// derived renditions.
pub struct ImageProcessingResult {
    pub width: u32,
    pub height: u32,
    pub blurhash: String,
    /// 256px max dimension thumbnail (None if original is small enough).
    pub thumbnail: Option<ProcessedVariant>,
    /// Full-size WebP re-encode, kept only when smaller than the original.
    pub optimized: Option<ProcessedVariant>,
}

/// A derived image rendition ready for storage.
pub struct ProcessedVariant {
    pub data: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub content_type: String,
}

/// Process an image: extract dimensions, generate blurhash, and create
/// derived renditions.
///
/// For animated formats (GIF), only dimensions and blurhash are generated
/// to preserve animation.
///
/// This function is CPU-bound and should be called inside `spawn_blocking`.
pub fn process_image(
    data: &[u8],
    mime_type: &str,
) -> Result<ImageProcessingResult, ProcessingError> {
    if data.len() > MAX_PROCESSABLE_SIZE {
        return Err(ProcessingError::TooLarge(data.len()));
    }

    let format = mime_to_format(mime_type)?;
    let is_animated = matches!(format, ImageFormat::Gif);

    // Use reader API to enforce dimension limits
    let mut reader = ImageReader::with_format(Cursor::new(data), format);
    let mut limits = Limits::default();
    limits.max_image_width = Some(MAX_IMAGE_DIMENSION);
    limits.max_image_height = Some(MAX_IMAGE_DIMENSION);
    reader.limits(limits);

    let img = reader
        .decode()
        .map_err(|e| ProcessingError::DecodeFailed(e.to_string()))?;

    let (width, height) = img.dimensions();

    let blurhash = generate_blurhash(&img)?;

    let (thumbnail, optimized) = if is_animated {
        (None, None)
    } else {
        let thumbnail = generate_thumbnail(&img)?;
        let optimized = generate_optimized(&img, data.len())?;
        (thumbnail, optimized)
    };

    Ok(ImageProcessingResult {
        width,
        height,
        blurhash,
        thumbnail,
        optimized,
    })
}

/// Map MIME type to `image` crate format.
pub(crate) fn mime_to_format(mime_type: &str) -> Result<ImageFormat, ProcessingError> {
    match mime_type {
        "image/png" => Ok(ImageFormat::Png),
        "image/jpeg" | "image/jpg" => Ok(ImageFormat::Jpeg),
        "image/gif" => Ok(ImageFormat::Gif),
        "image/webp" => Ok(ImageFormat::WebP),
        other => Err(ProcessingError::UnsupportedFormat(other.to_string())),
    }
}

/// Generate a blurhash from a small downscaled sample of the image.
fn generate_blurhash(img: &DynamicImage) -> Result<String, ProcessingError> {
    let sample = img.resize(
        BLURHASH_SAMPLE_SIZE,
        BLURHASH_SAMPLE_SIZE,
        FilterType::Triangle,
    );
    let (w, h) = sample.dimensions();
    let rgba = sample.to_rgba8();

    blurhash::encode(
        BLURHASH_COMPONENTS_X,
        BLURHASH_COMPONENTS_Y,
        w,
        h,
        rgba.as_raw(),
    )
    .map_err(|e| ProcessingError::BlurhashFailed(e.to_string()))
}

/// Generate a 256px WebP thumbnail if the image exceeds the thumbnail
/// dimension. Returns `None` if the image is already small enough.
fn generate_thumbnail(img: &DynamicImage) -> Result<Option<ProcessedVariant>, ProcessingError> {
    let (w, h) = img.dimensions();
    if w <= THUMBNAIL_MAX_DIM && h <= THUMBNAIL_MAX_DIM {
        return Ok(None);
    }

    let resized = img.resize(THUMBNAIL_MAX_DIM, THUMBNAIL_MAX_DIM, FilterType::Lanczos3);
    let (rw, rh) = resized.dimensions();
    let data = encode_webp(&resized)?;

    Ok(Some(ProcessedVariant {
        data,
        width: rw,
        height: rh,
        content_type: "image/webp".to_string(),
    }))
}

/// Re-encode the full-size image as WebP; kept only when it is strictly
/// smaller than the original bytes (size reduction, never inflation).
fn generate_optimized(
    img: &DynamicImage,
    original_size: usize,
) -> Result<Option<ProcessedVariant>, ProcessingError> {
    let data = encode_webp(img)?;
    if data.len() >= original_size {
        return Ok(None);
    }

    let (w, h) = img.dimensions();
    Ok(Some(ProcessedVariant {
        data,
        width: w,
        height: h,
        content_type: "image/webp".to_string(),
    }))
}

fn encode_webp(img: &DynamicImage) -> Result<Vec<u8>, ProcessingError> {
    let mut buf = Cursor::new(Vec::new());
    img.write_to(&mut buf, ImageFormat::WebP)
        .map_err(|e| ProcessingError::EncodeFailed(e.to_string()))?;
    Ok(buf.into_inner())
}
