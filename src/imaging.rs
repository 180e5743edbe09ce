//! Decode, remove, encode.
//!
//! The synchronous conversion pipeline behind `POST /remove-background`.
//! Every step owns its bitmap; nothing here is shared between requests.

use std::io::Cursor;
use std::time::Instant;

use image::{DynamicImage, ImageFormat, ImageReader, Limits, RgbaImage};

use crate::remover::{BackgroundRemover, RemovalError};

/// Failure in one stage of the conversion pipeline.
#[derive(Debug, thiserror::Error)]
pub enum ConversionError {
    #[error("could not decode image: {0}")]
    Decode(#[source] image::ImageError),

    #[error("background removal failed: {0}")]
    Removal(#[from] RemovalError),

    #[error("could not encode PNG: {0}")]
    Encode(#[source] image::ImageError),
}

/// PNG bytes produced for one upload.
#[derive(Debug)]
pub struct ConvertedImage {
    pub png: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

/// Decode `bytes` into a bitmap, sniffing the format from content.
///
/// Width and height are each capped at `max_dimension` pixels.
pub fn decode(bytes: &[u8], max_dimension: u32) -> Result<DynamicImage, ConversionError> {
    read_limited(bytes, max_dimension).map_err(ConversionError::Decode)
}

/// Format-sniffing decode with per-side dimension limits. Shared by the
/// upload path and by backends that decode foreign output.
pub(crate) fn read_limited(bytes: &[u8], max_dimension: u32) -> image::ImageResult<DynamicImage> {
    let mut reader = ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(image::ImageError::IoError)?;

    let mut limits = Limits::default();
    limits.max_image_width = Some(max_dimension);
    limits.max_image_height = Some(max_dimension);
    reader.limits(limits);

    reader.decode()
}

/// Encode an RGBA bitmap as PNG.
pub fn encode_png(image: &RgbaImage) -> Result<Vec<u8>, ConversionError> {
    let mut png = Vec::new();
    image
        .write_to(&mut Cursor::new(&mut png), ImageFormat::Png)
        .map_err(ConversionError::Encode)?;
    Ok(png)
}

/// Run the whole pipeline for one upload.
pub fn convert(
    bytes: &[u8],
    remover: &dyn BackgroundRemover,
    max_dimension: u32,
) -> Result<ConvertedImage, ConversionError> {
    let start = Instant::now();
    let input = decode(bytes, max_dimension)?;
    tracing::debug!(
        width = input.width(),
        height = input.height(),
        color = ?input.color(),
        elapsed_ms = start.elapsed().as_millis() as u64,
        "Decoded upload"
    );

    let start = Instant::now();
    let output = remover.remove(input)?;
    tracing::debug!(
        backend = remover.name(),
        elapsed_ms = start.elapsed().as_millis() as u64,
        "Background removed"
    );

    let start = Instant::now();
    let png = encode_png(&output)?;
    tracing::debug!(
        png_bytes = png.len(),
        elapsed_ms = start.elapsed().as_millis() as u64,
        "Encoded PNG"
    );

    Ok(ConvertedImage {
        png,
        width: output.width(),
        height: output.height(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ColorType, Rgba};

    struct Identity;

    impl BackgroundRemover for Identity {
        fn name(&self) -> &'static str {
            "identity"
        }

        fn remove(&self, image: DynamicImage) -> Result<RgbaImage, RemovalError> {
            Ok(image.into_rgba8())
        }
    }

    struct Failing;

    impl BackgroundRemover for Failing {
        fn name(&self) -> &'static str {
            "failing"
        }

        fn remove(&self, _image: DynamicImage) -> Result<RgbaImage, RemovalError> {
            Err(RemovalError::Unsupported("no model".to_string()))
        }
    }

    fn jpeg_bytes(width: u32, height: u32) -> Vec<u8> {
        let rgb = image::RgbImage::from_pixel(width, height, image::Rgb([10, 120, 200]));
        let mut out = Vec::new();
        rgb.write_to(&mut Cursor::new(&mut out), ImageFormat::Jpeg)
            .unwrap();
        out
    }

    #[test]
    fn jpeg_input_becomes_rgba_png() {
        let converted = convert(&jpeg_bytes(4, 3), &Identity, 64).unwrap();
        assert_eq!((converted.width, converted.height), (4, 3));

        let format = image::guess_format(&converted.png).unwrap();
        assert_eq!(format, ImageFormat::Png);
        let decoded = image::load_from_memory(&converted.png).unwrap();
        assert_eq!(decoded.color(), ColorType::Rgba8);
    }

    #[test]
    fn text_is_a_decode_error() {
        let err = convert(b"definitely not an image", &Identity, 64).unwrap_err();
        assert!(matches!(err, ConversionError::Decode(_)));
        assert!(!err.to_string().is_empty());
    }

    #[test]
    fn empty_input_is_a_decode_error() {
        assert!(matches!(
            decode(&[], 64).unwrap_err(),
            ConversionError::Decode(_)
        ));
    }

    #[test]
    fn oversized_dimensions_are_rejected() {
        let err = decode(&jpeg_bytes(40, 10), 32).unwrap_err();
        assert!(matches!(err, ConversionError::Decode(_)));
    }

    #[test]
    fn remover_failure_is_a_removal_error() {
        let err = convert(&jpeg_bytes(2, 2), &Failing, 64).unwrap_err();
        assert!(matches!(err, ConversionError::Removal(_)));
    }

    #[test]
    fn encoding_is_deterministic() {
        let img = RgbaImage::from_fn(5, 5, |x, y| Rgba([x as u8 * 40, y as u8 * 40, 0, 128]));
        assert_eq!(encode_png(&img).unwrap(), encode_png(&img).unwrap());
    }
}
