use std::io::Cursor;
use std::time::Instant;

use image::codecs::jpeg::JpegEncoder;
use image::error::ImageFormatHint;
use image::imageops::FilterType;
use image::{
    ColorType, DynamicImage, ImageError, ImageOutputFormat, ImageResult, Rgb, RgbImage, Rgba,
};
use log::debug;

use crate::config::ImageSettings;
use crate::constants::{
    BYTES_PER_KB, HUGE_IMAGE_QUALITY, LARGE_IMAGE_KB, LARGE_IMAGE_QUALITY, MEDIUM_IMAGE_KB,
    MEDIUM_IMAGE_QUALITY, SMALL_IMAGE_KB, SMALL_IMAGE_QUALITY,
};
use crate::error::{Result, UploadError};
use crate::imaging::sniffer::{classify, ImageFormat};

/// Pick the quality factor for an image of `len` bytes.
///
/// Sizes are bucketed by whole kilobytes, so 921_599 bytes (899 KB) still
/// gets the lightest compression and 921_600 bytes (900 KB) does not.
pub fn quality_for_size(len: u64) -> f32 {
    let size_kb = len / BYTES_PER_KB;
    if size_kb < SMALL_IMAGE_KB {
        SMALL_IMAGE_QUALITY
    } else if size_kb < MEDIUM_IMAGE_KB {
        MEDIUM_IMAGE_QUALITY
    } else if size_kb < LARGE_IMAGE_KB {
        LARGE_IMAGE_QUALITY
    } else {
        HUGE_IMAGE_QUALITY
    }
}

/// Result of a successful recompression.
#[derive(Debug, Clone)]
pub struct Compressed {
    pub bytes: Vec<u8>,
    /// Same as the input format; the file name stays truthful
    pub format: ImageFormat,
    /// Bracket factor. Sets the JPEG encoder quality and, with scaling on,
    /// the dimension multiplier for every format.
    pub quality: f32,
    pub original_size: usize,
}

impl Compressed {
    pub fn compressed_size(&self) -> usize {
        self.bytes.len()
    }
}

/// Re-encode `raw` in its own format at the factor chosen for its size.
///
/// JPEG input is re-encoded at `quality * 100`, after flattening any alpha
/// onto white. PNG, GIF and BMP are lossless here, so only scaling applies
/// to them and transparency is kept. Animated GIFs keep their first frame.
pub fn compress(raw: &[u8], settings: &ImageSettings) -> Result<Compressed> {
    if raw.is_empty() {
        return Err(UploadError::Compression("nothing to compress".into()));
    }

    let format = classify(raw);
    if !format.is_image() {
        return Err(UploadError::Compression("not a recognised image format".into()));
    }

    let start = Instant::now();
    let quality = quality_for_size(raw.len() as u64);

    let mut image = image::load_from_memory(raw)
        .map_err(|e| UploadError::Compression(format!("failed to decode {}: {}", format, e)))?;

    if settings.scale {
        let (width, height) = scaled_dimensions((image.width(), image.height()), quality);
        if (width, height) != (image.width(), image.height()) {
            image = image.resize_exact(width, height, FilterType::Triangle);
        }
    }

    let bytes = encode(&image, format, quality)
        .map_err(|e| UploadError::Compression(format!("failed to encode {}: {}", format, e)))?;

    debug!(
        "Compressed {} {}kb -> {}kb at quality {} in {:?}",
        format,
        raw.len() as u64 / BYTES_PER_KB,
        bytes.len() as u64 / BYTES_PER_KB,
        quality,
        start.elapsed()
    );

    Ok(Compressed {
        bytes,
        format,
        quality,
        original_size: raw.len(),
    })
}

fn encode(image: &DynamicImage, format: ImageFormat, quality: f32) -> ImageResult<Vec<u8>> {
    let mut bytes = Vec::new();
    match format {
        ImageFormat::Jpeg => {
            let flat = flatten_onto_white(image);
            JpegEncoder::new_with_quality(&mut bytes, jpeg_quality(quality)).encode(
                flat.as_raw(),
                flat.width(),
                flat.height(),
                ColorType::Rgb8,
            )?;
        }
        ImageFormat::Png => image.write_to(&mut Cursor::new(&mut bytes), ImageOutputFormat::Png)?,
        // The GIF and BMP encoders only take 8-bit channels
        ImageFormat::Gif => DynamicImage::ImageRgba8(image.to_rgba8())
            .write_to(&mut Cursor::new(&mut bytes), ImageOutputFormat::Gif)?,
        ImageFormat::Bmp => DynamicImage::ImageRgba8(image.to_rgba8())
            .write_to(&mut Cursor::new(&mut bytes), ImageOutputFormat::Bmp)?,
        ImageFormat::Unknown => return Err(ImageError::Unsupported(ImageFormatHint::Unknown.into())),
    }
    Ok(bytes)
}

fn flatten_onto_white(image: &DynamicImage) -> RgbImage {
    let rgba = image.to_rgba8();
    RgbImage::from_fn(rgba.width(), rgba.height(), |x, y| {
        let Rgba([r, g, b, a]) = *rgba.get_pixel(x, y);
        let alpha = a as u16;
        let blend = |channel: u8| ((channel as u16 * alpha + 255 * (255 - alpha)) / 255) as u8;
        Rgb([blend(r), blend(g), blend(b)])
    })
}

fn scaled_dimensions((width, height): (u32, u32), factor: f32) -> (u32, u32) {
    let scale = |side: u32| ((side as f32 * factor).round() as u32).max(1);
    (scale(width), scale(height))
}

fn jpeg_quality(factor: f32) -> u8 {
    (factor * 100.0).round().clamp(1.0, 100.0) as u8
}
