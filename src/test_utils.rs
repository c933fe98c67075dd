//! Test utilities and mock collaborators
//!
//! Provides a mock implementation of the `Segmenter` trait and synthetic
//! images so editor workflows can be exercised without a real model.

use crate::{
    config::PngCompression,
    error::{BgEditError, Result},
    segmentation::Segmenter,
    services::ImageIOService,
};
use async_trait::async_trait;
use image::{Rgba, RgbaImage};
use std::sync::{Arc, Mutex};

/// How the mock produces its output
#[derive(Debug, Clone)]
enum MockBehavior {
    /// Keep the central half of the input opaque, clear the border
    CenterCutout,
    /// Return these bytes regardless of input
    Fixed(Vec<u8>),
    /// Fail with this message
    Failing(String),
}

/// Mock segmentation collaborator for testing
#[derive(Debug, Clone)]
pub struct MockSegmenter {
    behavior: MockBehavior,
    /// Sizes of the inputs received, for verification in tests
    call_history: Arc<Mutex<Vec<usize>>>,
}

impl MockSegmenter {
    /// Create a mock that cuts out the center of the input image
    #[must_use]
    pub fn new() -> Self {
        Self::with_behavior(MockBehavior::CenterCutout)
    }

    /// Create a mock that always returns the given bytes
    #[must_use]
    pub fn new_fixed(bytes: Vec<u8>) -> Self {
        Self::with_behavior(MockBehavior::Fixed(bytes))
    }

    /// Create a mock that always fails
    #[must_use]
    pub fn new_failing<S: Into<String>>(message: S) -> Self {
        Self::with_behavior(MockBehavior::Failing(message.into()))
    }

    fn with_behavior(behavior: MockBehavior) -> Self {
        Self {
            behavior,
            call_history: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Number of segmentation calls made so far
    #[must_use]
    pub fn call_count(&self) -> usize {
        self.call_history.lock().map(|h| h.len()).unwrap_or(0)
    }

    /// Input sizes of all calls made so far
    #[must_use]
    pub fn get_call_history(&self) -> Vec<usize> {
        self.call_history
            .lock()
            .map(|h| h.clone())
            .unwrap_or_default()
    }

    fn record_call(&self, input_len: usize) {
        if let Ok(mut history) = self.call_history.lock() {
            history.push(input_len);
        }
    }
}

impl Default for MockSegmenter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Segmenter for MockSegmenter {
    async fn segment(&self, image_bytes: &[u8]) -> Result<Vec<u8>> {
        self.record_call(image_bytes.len());

        match &self.behavior {
            MockBehavior::CenterCutout => {
                let image = ImageIOService::decode_rgba(image_bytes)?;
                let cutout = center_cutout(&image);
                ImageIOService::encode_png(&cutout, PngCompression::Fast)
            },
            MockBehavior::Fixed(bytes) => Ok(bytes.clone()),
            MockBehavior::Failing(message) => Err(BgEditError::segmentation(message.clone())),
        }
    }

    fn name(&self) -> &str {
        "mock"
    }
}

/// Clear everything outside the central half of the image
#[must_use]
pub fn center_cutout(image: &RgbaImage) -> RgbaImage {
    let (width, height) = image.dimensions();
    let (x0, x1) = (width / 4, width - width / 4);
    let (y0, y1) = (height / 4, height - height / 4);

    let mut cutout = image.clone();
    for (x, y, pixel) in cutout.enumerate_pixels_mut() {
        if x < x0 || x >= x1 || y < y0 || y >= y1 {
            *pixel = Rgba([0, 0, 0, 0]);
        } else {
            pixel[3] = 255;
        }
    }
    cutout
}

/// Deterministic opaque gradient used as a stand-in photo
#[must_use]
pub fn sample_photo(width: u32, height: u32) -> RgbaImage {
    RgbaImage::from_fn(width, height, |x, y| {
        Rgba([
            (x * 255 / width.max(1)) as u8,
            (y * 255 / height.max(1)) as u8,
            ((x + y) % 256) as u8,
            255,
        ])
    })
}

/// [`sample_photo`] encoded as PNG
///
/// # Errors
/// - PNG encoding failures
pub fn sample_photo_png(width: u32, height: u32) -> Result<Vec<u8>> {
    ImageIOService::encode_png(&sample_photo(width, height), PngCompression::Fast)
}

/// Solid image encoded as PNG, handy as a custom background
///
/// # Errors
/// - PNG encoding failures
pub fn solid_png(width: u32, height: u32, color: Rgba<u8>) -> Result<Vec<u8>> {
    ImageIOService::encode_png(&RgbaImage::from_pixel(width, height, color), PngCompression::Fast)
}
