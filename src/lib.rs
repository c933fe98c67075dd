#![allow(clippy::too_many_lines)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::uninlined_format_args)]
#![allow(clippy::unused_async)]

//! # IMG.LY Background Editor Core
//!
//! The editing core behind a "remove background, then restyle" workflow. A
//! photo is sent to an external segmentation model; the returned cut-out is
//! composited over a new background and finished with a single pixel effect.
//!
//! ## Features
//!
//! - **View-State Controller**: `Upload -> Loading -> Result` session with
//!   reset, stale-result discarding and explicit change events
//! - **Backgrounds**: transparent, solid color, or a custom image stretched to fill
//! - **Effects**: blur, brightness and contrast with 0-100 intensities
//! - **Identity Fast Path**: transparent background without an effect reuses
//!   the cut-out and its PNG bytes directly
//! - **PNG Export**: deterministic file name from configuration
//! - **Pluggable Segmentation**: any async model behind the [`Segmenter`] trait
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use imgly_bgedit::{
//!     BackgroundColor, BackgroundMode, EditorConfig, EditorController, EffectKind, FnSegmenter,
//! };
//!
//! # async fn example(photo: Vec<u8>) -> anyhow::Result<()> {
//! // Any async model call that returns a PNG with a transparent background
//! let segmenter = FnSegmenter::new("remote-model", |bytes: Vec<u8>| async move {
//!     call_segmentation_service(bytes).await
//! });
//!
//! let mut editor = EditorController::new(EditorConfig::default())?;
//! editor.submit_image(photo, &segmenter).await?;
//!
//! editor.set_background_mode(BackgroundMode::SolidColor);
//! editor.set_background_color(BackgroundColor::from_hex("#ff0000")?);
//! editor.set_effect(EffectKind::Brightness);
//! editor.set_intensity(70);
//!
//! let export = editor.export()?;
//! std::fs::write(&export.file_name, &export.bytes)?;
//! # Ok(())
//! # }
//! # async fn call_segmentation_service(bytes: Vec<u8>) -> imgly_bgedit::Result<Vec<u8>> {
//! #     Ok(bytes)
//! # }
//! ```
//!
//! ## Feature Flags
//!
//! - `webp-support` (default): WebP uploads and backgrounds
//! - `subscriber`: [`tracing_config`] helpers for installing a tracing subscriber
//! - `tracing-json`: JSON log output for the subscriber helpers

pub mod compositing;
pub mod config;
pub mod controller;
pub mod effects;
pub mod error;
pub mod segmentation;
pub mod services;
pub mod test_utils;
#[cfg(feature = "subscriber")]
pub mod tracing_config;
pub mod types;

// Internal imports for lib functions
use tokio::io::AsyncRead;

// Public API exports
pub use compositing::CompositingPipeline;
pub use config::{BackgroundColor, EditorConfig, EditorConfigBuilder, PngCompression};
pub use controller::{
    EditorController, EditorParameters, EffectIntensities, ExportedImage, Phase,
    SubmissionOutcome, SubmissionTicket,
};
pub use error::{BgEditError, Result};
pub use segmentation::{FnSegmenter, Segmenter};
pub use services::{
    EditorEvent, EditorEventReporter, ImageIOService, NoOpEventReporter, TracingEventReporter,
};
pub use types::{
    clamp_intensity, BackgroundImage, BackgroundMode, BackgroundSpec, CutoutImage, EffectKind,
    EffectSpec, RenderMetadata, RenderedResult, SourceImage,
};

#[cfg(feature = "subscriber")]
pub use tracing_config::{init_library_tracing, TracingConfig, TracingFormat};

/// Segment an encoded photo and composite it in one call
///
/// Stateless counterpart of [`EditorController`] for batch or server use:
/// no session, no events, just the rendered result.
///
/// # Arguments
///
/// * `image_bytes` - Encoded photo (JPEG, PNG, WebP, TIFF)
/// * `segmenter` - Model that returns the cut-out as an encoded image
/// * `background` - Background to place behind the subject
/// * `effect` - Effect applied to the composited surface
///
/// # Examples
///
/// ```rust,no_run
/// use imgly_bgedit::{edit_image_from_bytes, BackgroundColor, BackgroundSpec, EffectSpec};
/// use imgly_bgedit::test_utils::MockSegmenter;
///
/// # async fn example(upload_bytes: Vec<u8>) -> anyhow::Result<()> {
/// let result = edit_image_from_bytes(
///     &upload_bytes,
///     &MockSegmenter::new(),
///     &BackgroundSpec::SolidColor(BackgroundColor::white()),
///     &EffectSpec::Contrast(70),
/// )
/// .await?;
/// result.save_png("output.png", Default::default())?;
/// # Ok(())
/// # }
/// ```
pub async fn edit_image_from_bytes(
    image_bytes: &[u8],
    segmenter: &dyn Segmenter,
    background: &BackgroundSpec,
    effect: &EffectSpec,
) -> Result<RenderedResult> {
    // Fail fast on uploads the model could never handle
    ImageIOService::inspect(image_bytes)?;

    let cutout_bytes = segmenter
        .segment(image_bytes)
        .await
        .map_err(segmentation::as_segmentation_error)?;
    let cutout = CutoutImage::from_bytes(cutout_bytes).map_err(|e| {
        BgEditError::segmentation(format!("result could not be decoded ({})", e))
    })?;

    CompositingPipeline::render(&cutout, background, effect)
}

/// Segment and composite a photo read from an async stream
///
/// # Examples
///
/// ```rust,no_run
/// use imgly_bgedit::{edit_image_from_reader, BackgroundSpec, EffectSpec};
/// use imgly_bgedit::test_utils::MockSegmenter;
///
/// # async fn example() -> anyhow::Result<()> {
/// let file = tokio::fs::File::open("portrait.jpg").await?;
/// let result = edit_image_from_reader(
///     file,
///     &MockSegmenter::new(),
///     &BackgroundSpec::Transparent,
///     &EffectSpec::Blur(40),
/// )
/// .await?;
/// # Ok(())
/// # }
/// ```
pub async fn edit_image_from_reader<R: AsyncRead + Unpin>(
    mut reader: R,
    segmenter: &dyn Segmenter,
    background: &BackgroundSpec,
    effect: &EffectSpec,
) -> Result<RenderedResult> {
    let mut buffer = Vec::new();
    tokio::io::AsyncReadExt::read_to_end(&mut reader, &mut buffer)
        .await
        .map_err(|e| BgEditError::processing(format!("Failed to read from stream: {}", e)))?;

    edit_image_from_bytes(&buffer, segmenter, background, effect).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{sample_photo_png, MockSegmenter};
    use image::Rgba;

    #[tokio::test]
    async fn test_edit_image_from_bytes() {
        let photo = sample_photo_png(20, 20).unwrap();
        let result = edit_image_from_bytes(
            &photo,
            &MockSegmenter::new(),
            &BackgroundSpec::SolidColor(BackgroundColor::new(0, 255, 0)),
            &EffectSpec::None,
        )
        .await
        .unwrap();

        assert_eq!(result.dimensions(), (20, 20));
        assert_eq!(result.image().get_pixel(0, 0), &Rgba([0, 255, 0, 255]));
    }

    #[tokio::test]
    async fn test_edit_image_from_reader_rejects_garbage_before_segmenting() {
        let segmenter = MockSegmenter::new();
        let result = edit_image_from_reader(
            std::io::Cursor::new(b"not an image".to_vec()),
            &segmenter,
            &BackgroundSpec::Transparent,
            &EffectSpec::None,
        )
        .await;

        assert!(result.is_err());
        assert_eq!(segmenter.call_count(), 0);
    }
}
