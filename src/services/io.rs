//! Image I/O operations service
//!
//! Decoding of uploaded bytes and PNG encoding for exports, kept apart from
//! the compositing logic.

use crate::{
    config::PngCompression,
    error::{BgEditError, Result},
};
use image::{codecs::png::PngEncoder, ExtendedColorType, ImageEncoder, ImageFormat, RgbaImage};
use std::io::Cursor;
use std::path::Path;

/// Service for decoding and encoding editor images
pub struct ImageIOService;

impl ImageIOService {
    /// Detect the format and dimensions of encoded image bytes
    ///
    /// Only the header is read; pixel data is not decoded.
    ///
    /// # Errors
    /// - Empty input
    /// - Unrecognized or corrupt image header
    pub fn inspect(bytes: &[u8]) -> Result<(Option<ImageFormat>, (u32, u32))> {
        if bytes.is_empty() {
            return Err(BgEditError::Io(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                "image data is empty",
            )));
        }

        let reader = image::ImageReader::new(Cursor::new(bytes)).with_guessed_format()?;
        let format = reader.format();
        let dimensions = reader.into_dimensions().map_err(|e| {
            log::debug!("Failed to read image header ({} bytes): {}", bytes.len(), e);
            BgEditError::Image(e)
        })?;

        log::debug!(
            "Inspected image: format {:?}, {}x{}",
            format,
            dimensions.0,
            dimensions.1
        );

        Ok((format, dimensions))
    }

    /// Decode image bytes into an RGBA raster
    ///
    /// # Examples
    /// ```rust,no_run
    /// use imgly_bgedit::services::ImageIOService;
    ///
    /// let image_data = std::fs::read("input.jpg")?;
    /// let image = ImageIOService::decode_rgba(&image_data)?;
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    ///
    /// # Errors
    /// - Bytes are not a decodable image
    pub fn decode_rgba(bytes: &[u8]) -> Result<RgbaImage> {
        let image = image::load_from_memory(bytes).map_err(|e| {
            log::debug!("Failed to decode {} bytes: {}", bytes.len(), e);
            BgEditError::Image(e)
        })?;
        Ok(image.to_rgba8())
    }

    /// Encode an RGBA raster as PNG
    ///
    /// # Errors
    /// - PNG encoder failures
    pub fn encode_png(image: &RgbaImage, compression: PngCompression) -> Result<Vec<u8>> {
        let mut buffer = Vec::new();
        let encoder = PngEncoder::new_with_quality(
            &mut buffer,
            compression.to_image_compression(),
            image::codecs::png::FilterType::Adaptive,
        );
        encoder.write_image(
            image.as_raw(),
            image.width(),
            image.height(),
            ExtendedColorType::Rgba8,
        )?;

        log::debug!(
            "Encoded {}x{} PNG ({} compression): {} bytes",
            image.width(),
            image.height(),
            compression,
            buffer.len()
        );

        Ok(buffer)
    }

    /// Write encoded bytes to a file, creating parent directories
    ///
    /// # Errors
    /// - Directory creation or file write failures
    pub fn write_bytes<P: AsRef<Path>>(path: P, bytes: &[u8]) -> Result<()> {
        let path_ref = path.as_ref();

        if let Some(parent) = path_ref.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    BgEditError::file_io_error("create output directory", parent, &e)
                })?;
            }
        }

        std::fs::write(path_ref, bytes)
            .map_err(|e| BgEditError::file_io_error("write image file", path_ref, &e))?;

        log::debug!("Wrote {} bytes to {}", bytes.len(), path_ref.display());
        Ok(())
    }
}
