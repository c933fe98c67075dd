//! Configuration types for background editing sessions

use crate::error::{BgEditError, Result};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// RGBA color used for solid backgrounds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct BackgroundColor {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Default for BackgroundColor {
    fn default() -> Self {
        // Default to white background
        Self::white()
    }
}

impl BackgroundColor {
    /// Create an opaque color from RGB values
    ///
    /// # Examples
    /// ```rust
    /// use imgly_bgedit::BackgroundColor;
    /// let purple = BackgroundColor::new(128, 0, 128);
    /// assert_eq!(purple.a, 255);
    /// ```
    #[must_use]
    pub fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 255 }
    }

    /// Create a color with an explicit alpha component
    #[must_use]
    pub fn with_alpha(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    #[must_use]
    pub fn white() -> Self {
        Self::new(255, 255, 255)
    }

    #[must_use]
    pub fn black() -> Self {
        Self::new(0, 0, 0)
    }

    /// Parse a CSS-style hex color
    ///
    /// Accepts `#rgb`, `#rrggbb` and `#rrggbbaa`. The leading `#` is optional
    /// and digits are case-insensitive.
    ///
    /// # Examples
    /// ```rust
    /// use imgly_bgedit::BackgroundColor;
    /// let red = BackgroundColor::from_hex("#ff0000").unwrap();
    /// assert_eq!(red, BackgroundColor::new(255, 0, 0));
    /// let short = BackgroundColor::from_hex("0F0").unwrap();
    /// assert_eq!(short, BackgroundColor::new(0, 255, 0));
    /// ```
    ///
    /// # Errors
    /// - Wrong number of digits
    /// - Non-hexadecimal characters
    pub fn from_hex(input: &str) -> Result<Self> {
        let digits = input.trim();
        let digits = digits.strip_prefix('#').unwrap_or(digits);

        if !digits.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(BgEditError::invalid_config(format!(
                "Invalid color '{}': expected hex digits",
                input
            )));
        }

        let channel = |range: std::ops::Range<usize>| -> Result<u8> {
            let part = digits.get(range).unwrap_or_default();
            u8::from_str_radix(part, 16).map_err(|_| {
                BgEditError::invalid_config(format!(
                    "Invalid color '{}': expected hex digits",
                    input
                ))
            })
        };

        match digits.len() {
            3 => {
                let r = channel(0..1)?;
                let g = channel(1..2)?;
                let b = channel(2..3)?;
                Ok(Self::new(r * 17, g * 17, b * 17))
            },
            6 => Ok(Self::new(channel(0..2)?, channel(2..4)?, channel(4..6)?)),
            8 => Ok(Self::with_alpha(
                channel(0..2)?,
                channel(2..4)?,
                channel(4..6)?,
                channel(6..8)?,
            )),
            _ => Err(BgEditError::invalid_config(format!(
                "Invalid color '{}': expected #rgb, #rrggbb or #rrggbbaa",
                input
            ))),
        }
    }

    /// Format as lowercase hex, omitting alpha when opaque
    #[must_use]
    pub fn to_hex(&self) -> String {
        if self.a == 255 {
            format!("#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
        } else {
            format!("#{:02x}{:02x}{:02x}{:02x}", self.r, self.g, self.b, self.a)
        }
    }

    #[must_use]
    pub fn to_rgba(&self) -> image::Rgba<u8> {
        image::Rgba([self.r, self.g, self.b, self.a])
    }
}

impl std::fmt::Display for BackgroundColor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl FromStr for BackgroundColor {
    type Err = BgEditError;

    fn from_str(s: &str) -> Result<Self> {
        Self::from_hex(s)
    }
}

impl TryFrom<String> for BackgroundColor {
    type Error = BgEditError;

    fn try_from(value: String) -> Result<Self> {
        Self::from_hex(&value)
    }
}

impl From<BackgroundColor> for String {
    fn from(color: BackgroundColor) -> Self {
        color.to_hex()
    }
}

/// PNG compression level used for exports
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PngCompression {
    /// Fast encoding, larger files
    Fast,
    /// Balanced encoding
    #[default]
    Default,
    /// Smallest files, slowest encoding
    Best,
}

impl PngCompression {
    pub(crate) fn to_image_compression(self) -> image::codecs::png::CompressionType {
        match self {
            Self::Fast => image::codecs::png::CompressionType::Fast,
            Self::Default => image::codecs::png::CompressionType::Default,
            Self::Best => image::codecs::png::CompressionType::Best,
        }
    }
}

impl std::fmt::Display for PngCompression {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Fast => write!(f, "fast"),
            Self::Default => write!(f, "default"),
            Self::Best => write!(f, "best"),
        }
    }
}

/// Configuration for an editing session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EditorConfig {
    /// File name used for every export (must end in `.png`)
    pub export_file_name: String,

    /// PNG compression level for exports
    pub png_compression: PngCompression,

    /// Color offered when switching to a solid background
    pub default_color: BackgroundColor,

    /// Largest accepted upload width or height in pixels (0 = unlimited)
    pub max_dimension: u32,

    /// Enable debug mode (additional logging)
    pub debug: bool,
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            export_file_name: "edited-image.png".to_string(),
            png_compression: PngCompression::default(),
            default_color: BackgroundColor::white(),
            max_dimension: 0,
            debug: false,
        }
    }
}

impl EditorConfig {
    /// Create a new configuration builder
    ///
    /// # Examples
    /// ```rust
    /// use imgly_bgedit::{EditorConfig, PngCompression};
    ///
    /// let config = EditorConfig::builder()
    ///     .export_file_name("portrait.png")
    ///     .png_compression(PngCompression::Best)
    ///     .build()
    ///     .unwrap();
    /// assert_eq!(config.export_file_name, "portrait.png");
    /// ```
    #[must_use]
    pub fn builder() -> EditorConfigBuilder {
        EditorConfigBuilder::default()
    }

    /// Load configuration from a JSON document
    ///
    /// Missing fields take their default values.
    ///
    /// # Errors
    /// - Malformed JSON or invalid field values
    /// - Values rejected by [`EditorConfig::validate`]
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json).map_err(|e| {
            BgEditError::invalid_config(format!("Failed to parse editor config: {}", e))
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Validate all configuration parameters
    ///
    /// # Errors
    /// - Empty export file name
    /// - Export file name without a `.png` extension
    /// - Export file name containing path separators
    pub fn validate(&self) -> Result<()> {
        let name = self.export_file_name.trim();
        if name.is_empty() {
            return Err(BgEditError::invalid_config(
                "Export file name must not be empty",
            ));
        }

        if name.contains('/') || name.contains('\\') {
            return Err(BgEditError::invalid_config(format!(
                "Export file name '{}' must not contain path separators",
                name
            )));
        }

        let is_png = std::path::Path::new(name)
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("png"));
        if !is_png {
            return Err(BgEditError::invalid_config(format!(
                "Export file name '{}' must end in .png",
                name
            )));
        }

        Ok(())
    }
}

/// Builder for `EditorConfig`
#[derive(Debug, Default)]
pub struct EditorConfigBuilder {
    config: EditorConfig,
}

impl EditorConfigBuilder {
    #[must_use]
    pub fn export_file_name<S: Into<String>>(mut self, name: S) -> Self {
        self.config.export_file_name = name.into();
        self
    }

    #[must_use]
    pub fn png_compression(mut self, compression: PngCompression) -> Self {
        self.config.png_compression = compression;
        self
    }

    #[must_use]
    pub fn default_color(mut self, color: BackgroundColor) -> Self {
        self.config.default_color = color;
        self
    }

    #[must_use]
    pub fn max_dimension(mut self, max_dimension: u32) -> Self {
        self.config.max_dimension = max_dimension;
        self
    }

    #[must_use]
    pub fn debug(mut self, debug: bool) -> Self {
        self.config.debug = debug;
        self
    }

    /// Build and validate the configuration
    ///
    /// # Errors
    /// - Any rule enforced by [`EditorConfig::validate`]
    pub fn build(self) -> Result<EditorConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}
