use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;

use crate::constants::{JPEG_QUALITY, MAX_IMAGE_DIMENSION};
use crate::error::OptimizeError;

/// Web-ready JPEG produced from an uploaded image.
#[derive(Debug, Clone)]
pub struct OptimizedImage {
    pub bytes: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

// Decoding and resizing are CPU-bound; callers on an async runtime should
// run this on the blocking pool.
pub fn optimize_for_web(bytes: &[u8]) -> Result<OptimizedImage, OptimizeError> {
    let img = image::load_from_memory(bytes)?;

    // resize() keeps aspect ratio and fits inside the box; skip it for small
    // images so they are never upscaled.
    let img = if img.width() > MAX_IMAGE_DIMENSION || img.height() > MAX_IMAGE_DIMENSION {
        img.resize(MAX_IMAGE_DIMENSION, MAX_IMAGE_DIMENSION, FilterType::Lanczos3)
    } else {
        img
    };

    // JPEG has no alpha channel.
    let rgb = img.to_rgb8();
    let mut out = Vec::new();
    rgb.write_with_encoder(JpegEncoder::new_with_quality(&mut out, JPEG_QUALITY))?;

    Ok(OptimizedImage {
        bytes: out,
        width: rgb.width(),
        height: rgb.height(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageBuffer, Rgba};

    fn png(width: u32, height: u32) -> Vec<u8> {
        let img: ImageBuffer<Rgba<u8>, Vec<u8>> =
            ImageBuffer::from_fn(width, height, |x, _| Rgba([(x % 255) as u8, 80, 160, 255]));
        let mut buf = Vec::new();
        let mut cursor = std::io::Cursor::new(&mut buf);
        img.write_to(&mut cursor, image::ImageFormat::Png).unwrap();
        buf
    }

    #[test]
    fn test_large_image_is_downscaled_keeping_aspect() {
        let out = optimize_for_web(&png(2400, 1200)).unwrap();
        assert_eq!((out.width, out.height), (1920, 960));
        assert_eq!(&out.bytes[..2], &[0xFF, 0xD8]);
    }

    #[test]
    fn test_tall_image_is_bounded_by_height() {
        let out = optimize_for_web(&png(1000, 4000)).unwrap();
        assert_eq!((out.width, out.height), (480, 1920));
    }

    #[test]
    fn test_small_image_is_not_upscaled() {
        let out = optimize_for_web(&png(64, 32)).unwrap();
        assert_eq!((out.width, out.height), (64, 32));
        assert_eq!(&out.bytes[..2], &[0xFF, 0xD8]);
    }

    #[test]
    fn test_garbage_bytes_fail() {
        assert!(optimize_for_web(b"definitely not an image").is_err());
    }
}
