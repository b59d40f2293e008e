//! Input and output format handling service
//!
//! Every produced image is encoded as PNG. Inputs may be any of the raster
//! formats the `image` features enable.

use crate::error::{BgCanvasError, Result};
use image::codecs::png::{CompressionType, FilterType, PngEncoder};
use image::{ExtendedColorType, ImageEncoder, RgbaImage};
use std::path::Path;

/// File extensions accepted as batch inputs
pub const SUPPORTED_INPUT_EXTENSIONS: &[&str] =
    &["png", "jpg", "jpeg", "webp", "tif", "tiff", "bmp"];

/// Service for encoding results and recognizing inputs
pub struct OutputFormatHandler;

impl OutputFormatHandler {
    /// Encode an RGBA image as PNG, preserving alpha exactly
    ///
    /// # Errors
    /// - PNG encoder failures (reported as `Encode`)
    ///
    /// # Examples
    /// ```rust
    /// use imgly_bgcanvas::services::OutputFormatHandler;
    /// use image::RgbaImage;
    ///
    /// let bytes = OutputFormatHandler::encode_png(&RgbaImage::new(4, 4))?;
    /// assert_eq!(&bytes[..4], b"\x89PNG");
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn encode_png(image: &RgbaImage) -> Result<Vec<u8>> {
        let mut bytes = Vec::new();
        PngEncoder::new_with_quality(&mut bytes, CompressionType::Default, FilterType::Adaptive)
            .write_image(
                image.as_raw(),
                image.width(),
                image.height(),
                ExtendedColorType::Rgba8,
            )
            .map_err(|e| BgCanvasError::encode(format!("Failed to encode PNG: {}", e)))?;
        Ok(bytes)
    }

    /// Whether a path has an extension accepted as input
    ///
    /// ```rust
    /// use imgly_bgcanvas::services::OutputFormatHandler;
    ///
    /// assert!(OutputFormatHandler::is_supported_input("shots/cat.JPG"));
    /// assert!(!OutputFormatHandler::is_supported_input("notes.txt"));
    /// ```
    pub fn is_supported_input<P: AsRef<Path>>(path: P) -> bool {
        path.as_ref()
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| {
                SUPPORTED_INPUT_EXTENSIONS
                    .iter()
                    .any(|supported| supported.eq_ignore_ascii_case(ext))
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageFormat, Rgba};

    #[test]
    fn test_png_round_trip_is_lossless() {
        let image = RgbaImage::from_fn(17, 9, |x, y| {
            Rgba([(x * 15) as u8, (y * 28) as u8, 77, ((x + y) * 10) as u8])
        });

        let bytes = OutputFormatHandler::encode_png(&image).unwrap();
        assert_eq!(image::guess_format(&bytes).unwrap(), ImageFormat::Png);

        let decoded = image::load_from_memory(&bytes).unwrap().into_rgba8();
        assert_eq!(decoded, image);
    }

    #[test]
    fn test_encode_empty_image_fails_cleanly() {
        // Zero-sized images cannot be represented as PNG
        let result = OutputFormatHandler::encode_png(&RgbaImage::new(0, 3));
        if let Err(err) = result {
            assert!(matches!(err, BgCanvasError::Encode(_)));
        }
    }

    #[test]
    fn test_supported_inputs() {
        for name in ["a.png", "b.jpeg", "c.JPG", "d.webp", "e.tiff", "f.bmp"] {
            assert!(OutputFormatHandler::is_supported_input(name), "{name}");
        }
        for name in ["a.gif", "b", "c.zip", ".png"] {
            assert!(!OutputFormatHandler::is_supported_input(name), "{name}");
        }
    }
}
