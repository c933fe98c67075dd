//! Core types for background editing operations

use crate::{
    config::{BackgroundColor, PngCompression},
    error::{BgEditError, Result},
    services::ImageIOService,
};
use chrono::{DateTime, Utc};
use image::{ImageFormat, RgbaImage};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;

/// Lowest accepted effect intensity
pub const MIN_INTENSITY: u8 = 0;

/// Highest accepted effect intensity
pub const MAX_INTENSITY: u8 = 100;

/// Intensity at which brightness and contrast are identity transforms
pub const NEUTRAL_INTENSITY: u8 = 50;

/// Clamp an arbitrary slider value into the 0-100 intensity range
#[must_use]
pub fn clamp_intensity(value: i32) -> u8 {
    value.clamp(i32::from(MIN_INTENSITY), i32::from(MAX_INTENSITY)) as u8
}

/// The photo supplied by the user
///
/// Keeps the original encoded bytes alongside the detected format and
/// dimensions. Immutable once loaded.
#[derive(Debug, Clone)]
pub struct SourceImage {
    bytes: Arc<Vec<u8>>,
    format: Option<ImageFormat>,
    dimensions: (u32, u32),
}

impl SourceImage {
    /// Inspect an uploaded file without fully decoding it
    ///
    /// # Errors
    /// - Unrecognized image format
    /// - Corrupt image header
    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self> {
        let (format, dimensions) = ImageIOService::inspect(&bytes)?;
        Ok(Self {
            bytes: Arc::new(bytes),
            format,
            dimensions,
        })
    }

    #[must_use]
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub(crate) fn shared_bytes(&self) -> Arc<Vec<u8>> {
        Arc::clone(&self.bytes)
    }

    #[must_use]
    pub fn format(&self) -> Option<ImageFormat> {
        self.format
    }

    #[must_use]
    pub fn dimensions(&self) -> (u32, u32) {
        self.dimensions
    }
}

/// Segmentation output: the subject over a transparent background
#[derive(Debug, Clone)]
pub struct CutoutImage {
    image: Arc<RgbaImage>,
    /// PNG bytes the cut-out was decoded from, reused for identity exports
    encoded_png: Option<Arc<Vec<u8>>>,
}

impl CutoutImage {
    /// Decode the bytes returned by the segmentation collaborator
    ///
    /// # Errors
    /// - Bytes are not a decodable image
    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self> {
        let (format, _) = ImageIOService::inspect(&bytes)?;
        let image = ImageIOService::decode_rgba(&bytes)?;
        let encoded_png = (format == Some(ImageFormat::Png)).then(|| Arc::new(bytes));

        Ok(Self {
            image: Arc::new(image),
            encoded_png,
        })
    }

    /// Wrap an already decoded raster
    #[must_use]
    pub fn from_rgba(image: RgbaImage) -> Self {
        Self {
            image: Arc::new(image),
            encoded_png: None,
        }
    }

    #[must_use]
    pub fn image(&self) -> &RgbaImage {
        &self.image
    }

    pub(crate) fn shared_image(&self) -> Arc<RgbaImage> {
        Arc::clone(&self.image)
    }

    pub(crate) fn encoded_png(&self) -> Option<Arc<Vec<u8>>> {
        self.encoded_png.clone()
    }

    #[must_use]
    pub fn dimensions(&self) -> (u32, u32) {
        self.image.dimensions()
    }
}

/// A decoded custom background image
#[derive(Debug, Clone)]
pub struct BackgroundImage {
    image: Arc<RgbaImage>,
}

impl BackgroundImage {
    /// Decode a user-chosen background file
    ///
    /// # Errors
    /// - Bytes are not a decodable image
    /// - Decoded image has no pixels
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let image = ImageIOService::decode_rgba(bytes)?;
        if image.width() == 0 || image.height() == 0 {
            return Err(BgEditError::processing("Background image has no pixels"));
        }
        Ok(Self::from_rgba(image))
    }

    #[must_use]
    pub fn from_rgba(image: RgbaImage) -> Self {
        Self {
            image: Arc::new(image),
        }
    }

    #[must_use]
    pub fn image(&self) -> &RgbaImage {
        &self.image
    }

    #[must_use]
    pub fn dimensions(&self) -> (u32, u32) {
        self.image.dimensions()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.image.width() == 0 || self.image.height() == 0
    }
}

impl PartialEq for BackgroundImage {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.image, &other.image) || *self.image == *other.image
    }
}

/// Background choice for the compositing pass
#[derive(Debug, Clone, PartialEq, Default)]
pub enum BackgroundSpec {
    /// Leave the surface fully transparent
    #[default]
    Transparent,
    /// Fill the surface with a color
    SolidColor(BackgroundColor),
    /// Stretch an image over the surface
    CustomImage(BackgroundImage),
}

impl BackgroundSpec {
    #[must_use]
    pub fn mode(&self) -> BackgroundMode {
        match self {
            Self::Transparent => BackgroundMode::Transparent,
            Self::SolidColor(_) => BackgroundMode::SolidColor,
            Self::CustomImage(_) => BackgroundMode::CustomImage,
        }
    }
}

/// Which kind of background the user selected
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackgroundMode {
    #[default]
    Transparent,
    SolidColor,
    CustomImage,
}

impl std::fmt::Display for BackgroundMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Transparent => write!(f, "transparent"),
            Self::SolidColor => write!(f, "solid_color"),
            Self::CustomImage => write!(f, "custom_image"),
        }
    }
}

/// Which effect the user selected
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EffectKind {
    #[default]
    None,
    Blur,
    Brightness,
    Contrast,
}

impl EffectKind {
    /// Intensity a fresh session starts with for this effect
    #[must_use]
    pub fn default_intensity(self) -> u8 {
        match self {
            Self::None | Self::Blur => MIN_INTENSITY,
            Self::Brightness | Self::Contrast => NEUTRAL_INTENSITY,
        }
    }
}

impl std::fmt::Display for EffectKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::None => write!(f, "none"),
            Self::Blur => write!(f, "blur"),
            Self::Brightness => write!(f, "brightness"),
            Self::Contrast => write!(f, "contrast"),
        }
    }
}

/// The single active pixel effect and its intensity (0-100)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", content = "intensity", rename_all = "snake_case")]
pub enum EffectSpec {
    #[default]
    None,
    Blur(u8),
    Brightness(u8),
    Contrast(u8),
}

impl EffectSpec {
    /// Build an effect of the given kind, clamping the intensity
    #[must_use]
    pub fn new(kind: EffectKind, intensity: u8) -> Self {
        let intensity = intensity.min(MAX_INTENSITY);
        match kind {
            EffectKind::None => Self::None,
            EffectKind::Blur => Self::Blur(intensity),
            EffectKind::Brightness => Self::Brightness(intensity),
            EffectKind::Contrast => Self::Contrast(intensity),
        }
    }

    #[must_use]
    pub fn kind(&self) -> EffectKind {
        match self {
            Self::None => EffectKind::None,
            Self::Blur(_) => EffectKind::Blur,
            Self::Brightness(_) => EffectKind::Brightness,
            Self::Contrast(_) => EffectKind::Contrast,
        }
    }

    /// Intensity clamped to 0-100, `None` for the no-op effect
    #[must_use]
    pub fn intensity(&self) -> Option<u8> {
        match *self {
            Self::None => None,
            Self::Blur(v) | Self::Brightness(v) | Self::Contrast(v) => Some(v.min(MAX_INTENSITY)),
        }
    }

    /// Whether applying this effect leaves every pixel unchanged
    #[must_use]
    pub fn is_identity(&self) -> bool {
        match self.clamped() {
            Self::None | Self::Blur(0) => true,
            Self::Brightness(v) | Self::Contrast(v) => v == NEUTRAL_INTENSITY,
            Self::Blur(_) => false,
        }
    }

    /// Copy with the intensity clamped into range
    #[must_use]
    pub fn clamped(&self) -> Self {
        Self::new(self.kind(), self.intensity().unwrap_or(MIN_INTENSITY))
    }
}

impl std::fmt::Display for EffectSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.intensity() {
            Some(v) => write!(f, "{}({})", self.kind(), v),
            None => write!(f, "{}", self.kind()),
        }
    }
}

/// Metadata describing how a result was rendered
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenderMetadata {
    pub width: u32,
    pub height: u32,
    pub background: BackgroundMode,
    pub effect: EffectSpec,
    /// Time spent in the pipeline
    pub render_ms: u64,
    /// The cut-out raster was reused without compositing
    pub reused_cutout: bool,
    pub rendered_at: DateTime<Utc>,
}

/// Raster produced by the compositing pipeline
#[derive(Debug, Clone)]
pub struct RenderedResult {
    image: Arc<RgbaImage>,
    encoded_png: Option<Arc<Vec<u8>>>,
    metadata: RenderMetadata,
}

impl RenderedResult {
    pub(crate) fn new(
        image: Arc<RgbaImage>,
        encoded_png: Option<Arc<Vec<u8>>>,
        metadata: RenderMetadata,
    ) -> Self {
        Self {
            image,
            encoded_png,
            metadata,
        }
    }

    /// The cut-out shown as-is, used when no render is available
    pub(crate) fn unmodified(cutout: &CutoutImage) -> Self {
        let (width, height) = cutout.dimensions();
        let metadata = RenderMetadata {
            width,
            height,
            background: BackgroundMode::Transparent,
            effect: EffectSpec::None,
            render_ms: 0,
            reused_cutout: true,
            rendered_at: Utc::now(),
        };
        Self::new(cutout.shared_image(), cutout.encoded_png(), metadata)
    }

    #[must_use]
    pub fn image(&self) -> &RgbaImage {
        &self.image
    }

    #[must_use]
    pub fn metadata(&self) -> &RenderMetadata {
        &self.metadata
    }

    #[must_use]
    pub fn dimensions(&self) -> (u32, u32) {
        self.image.dimensions()
    }

    /// Whether the pixels are shared with the cut-out
    #[must_use]
    pub fn reuses_cutout(&self) -> bool {
        self.metadata.reused_cutout
    }

    /// Get the image as raw RGBA bytes
    #[must_use]
    pub fn to_rgba_bytes(&self) -> Vec<u8> {
        self.image.as_raw().clone()
    }

    /// Encode as PNG
    ///
    /// A result that reuses the cut-out returns the segmentation PNG bytes
    /// unchanged instead of re-encoding them.
    ///
    /// # Errors
    /// - PNG encoding failures
    pub fn to_png_bytes(&self, compression: PngCompression) -> Result<Vec<u8>> {
        if let Some(encoded) = &self.encoded_png {
            return Ok(encoded.as_ref().clone());
        }
        ImageIOService::encode_png(&self.image, compression)
    }

    /// Save the result as PNG with alpha channel
    ///
    /// # Errors
    /// - PNG encoding failures
    /// - File system errors
    pub fn save_png<P: AsRef<Path>>(&self, path: P, compression: PngCompression) -> Result<()> {
        let bytes = self.to_png_bytes(compression)?;
        ImageIOService::write_bytes(path, &bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clamp_intensity() {
        assert_eq!(clamp_intensity(-20), 0);
        assert_eq!(clamp_intensity(0), 0);
        assert_eq!(clamp_intensity(42), 42);
        assert_eq!(clamp_intensity(100), 100);
        assert_eq!(clamp_intensity(250), 100);
    }

    #[test]
    fn test_effect_spec_clamps_intensity() {
        assert_eq!(EffectSpec::new(EffectKind::Blur, 200), EffectSpec::Blur(100));
        assert_eq!(EffectSpec::Contrast(180).intensity(), Some(100));
        assert_eq!(EffectSpec::Brightness(255).clamped(), EffectSpec::Brightness(100));
        assert_eq!(EffectSpec::new(EffectKind::None, 80), EffectSpec::None);
        assert_eq!(EffectSpec::None.intensity(), None);
    }

    #[test]
    fn test_effect_identity_detection() {
        assert!(EffectSpec::None.is_identity());
        assert!(EffectSpec::Blur(0).is_identity());
        assert!(EffectSpec::Brightness(50).is_identity());
        assert!(EffectSpec::Contrast(50).is_identity());
        assert!(!EffectSpec::Blur(1).is_identity());
        assert!(!EffectSpec::Brightness(51).is_identity());
    }

    #[test]
    fn test_default_intensities_are_neutral() {
        assert_eq!(EffectKind::Blur.default_intensity(), 0);
        assert_eq!(EffectKind::Brightness.default_intensity(), 50);
        assert_eq!(EffectKind::Contrast.default_intensity(), 50);
    }

    #[test]
    fn test_effect_spec_serialization() {
        let json = serde_json::to_string(&EffectSpec::Blur(30)).unwrap();
        assert_eq!(json, r#"{"kind":"blur","intensity":30}"#);
        let parsed: EffectSpec = serde_json::from_str(r#"{"kind":"none"}"#).unwrap();
        assert_eq!(parsed, EffectSpec::None);
    }

    #[test]
    fn test_background_spec_mode() {
        assert_eq!(BackgroundSpec::default().mode(), BackgroundMode::Transparent);
        assert_eq!(
            BackgroundSpec::SolidColor(BackgroundColor::black()).mode(),
            BackgroundMode::SolidColor
        );
        let image = BackgroundImage::from_rgba(RgbaImage::new(2, 2));
        assert_eq!(BackgroundSpec::CustomImage(image).mode(), BackgroundMode::CustomImage);
    }

    #[test]
    fn test_background_image_rejects_garbage() {
        assert!(BackgroundImage::from_bytes(b"definitely not an image").is_err());
    }

    #[test]
    fn test_cutout_keeps_png_bytes() {
        let image = RgbaImage::from_pixel(3, 2, image::Rgba([10, 20, 30, 128]));
        let png = ImageIOService::encode_png(&image, PngCompression::Fast).unwrap();
        let cutout = CutoutImage::from_bytes(png.clone()).unwrap();
        assert_eq!(cutout.dimensions(), (3, 2));
        assert_eq!(cutout.encoded_png().as_deref(), Some(&png));
        assert_eq!(cutout.image().get_pixel(1, 1), &image::Rgba([10, 20, 30, 128]));
    }
}
