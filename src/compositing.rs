//! Compositing pipeline
//!
//! Turns a cut-out plus the user's background and effect choices into the
//! final raster. Rendering is a pure function of its three inputs: every call
//! starts from a fresh surface, so no earlier effect can leak into a later
//! result.

use crate::{
    effects,
    error::{BgEditError, Result},
    types::{BackgroundSpec, CutoutImage, EffectSpec, RenderMetadata, RenderedResult},
};
use chrono::Utc;
use image::{imageops::FilterType, Rgba, RgbaImage};
use instant::Instant;
use std::sync::Arc;
use tracing::{debug, span, Level};

/// Stateless compositing pipeline
pub struct CompositingPipeline;

impl CompositingPipeline {
    /// Render the cut-out over a background and apply one effect
    ///
    /// A custom background without pixels is treated as transparent. With a
    /// transparent background and an identity effect the cut-out raster is
    /// returned as-is, without copying or re-encoding.
    ///
    /// # Examples
    /// ```rust
    /// use image::{Rgba, RgbaImage};
    /// use imgly_bgedit::{
    ///     BackgroundColor, BackgroundSpec, CompositingPipeline, CutoutImage, EffectSpec,
    /// };
    ///
    /// let cutout = CutoutImage::from_rgba(RgbaImage::from_pixel(4, 4, Rgba([0, 0, 0, 0])));
    /// let background = BackgroundSpec::SolidColor(BackgroundColor::new(255, 0, 0));
    /// let result = CompositingPipeline::render(&cutout, &background, &EffectSpec::None)?;
    /// assert_eq!(result.image().get_pixel(2, 2), &Rgba([255, 0, 0, 255]));
    /// # Ok::<(), imgly_bgedit::BgEditError>(())
    /// ```
    ///
    /// # Errors
    /// - Zero-sized cut-out
    /// - Effect pass failures
    pub fn render(
        cutout: &CutoutImage,
        background: &BackgroundSpec,
        effect: &EffectSpec,
    ) -> Result<RenderedResult> {
        let start = Instant::now();
        let (width, height) = cutout.dimensions();
        let fallback = BackgroundSpec::Transparent;
        let background = if Self::background_unavailable(background) {
            &fallback
        } else {
            background
        };
        let effect = effect.clamped();

        let _span = span!(
            Level::DEBUG,
            "render",
            width = width,
            height = height,
            background = %background.mode(),
            effect = %effect
        )
        .entered();

        if width == 0 || height == 0 {
            return Err(BgEditError::processing_stage_error(
                "surface allocation",
                "cut-out has no pixels",
                Some(&format!("{}x{}", width, height)),
            ));
        }

        if matches!(background, BackgroundSpec::Transparent) && effect.is_identity() {
            debug!("Transparent background without effect, reusing cut-out");
            let metadata = Self::metadata(cutout, background, effect, start, true);
            return Ok(RenderedResult::new(
                cutout.shared_image(),
                cutout.encoded_png(),
                metadata,
            ));
        }

        let mut surface = Self::background_pass(background, width, height);
        Self::subject_pass(&mut surface, cutout.image());
        effects::apply_effect(&mut surface, &effect)?;

        let metadata = Self::metadata(cutout, background, effect, start, false);
        debug!(render_ms = metadata.render_ms, "Render completed");
        Ok(RenderedResult::new(Arc::new(surface), None, metadata))
    }

    /// Custom backgrounds without pixels render as transparent
    fn background_unavailable(background: &BackgroundSpec) -> bool {
        match background {
            BackgroundSpec::CustomImage(image) if image.is_empty() => {
                debug!("Custom background has no pixels, treating as transparent");
                true
            },
            _ => false,
        }
    }

    /// Allocate the output surface and draw the base layer
    fn background_pass(background: &BackgroundSpec, width: u32, height: u32) -> RgbaImage {
        match background {
            BackgroundSpec::Transparent => RgbaImage::new(width, height),
            BackgroundSpec::SolidColor(color) => {
                RgbaImage::from_pixel(width, height, color.to_rgba())
            },
            BackgroundSpec::CustomImage(image) => {
                if image.dimensions() == (width, height) {
                    image.image().clone()
                } else {
                    // Stretch to fill; aspect ratio is not preserved
                    image::imageops::resize(image.image(), width, height, FilterType::Triangle)
                }
            },
        }
    }

    /// Draw the cut-out at the origin with source-over compositing
    fn subject_pass(surface: &mut RgbaImage, subject: &RgbaImage) {
        for (dst, src) in surface.pixels_mut().zip(subject.pixels()) {
            *dst = source_over(*src, *dst);
        }
    }

    fn metadata(
        cutout: &CutoutImage,
        background: &BackgroundSpec,
        effect: EffectSpec,
        start: Instant,
        reused_cutout: bool,
    ) -> RenderMetadata {
        let (width, height) = cutout.dimensions();
        RenderMetadata {
            width,
            height,
            background: background.mode(),
            effect,
            render_ms: start.elapsed().as_millis() as u64,
            reused_cutout,
            rendered_at: Utc::now(),
        }
    }
}

/// Porter-Duff source-over for straight (non-premultiplied) RGBA8
fn source_over(src: Rgba<u8>, dst: Rgba<u8>) -> Rgba<u8> {
    let src_alpha = src[3];
    let dst_alpha = dst[3];

    if src_alpha == 255 || dst_alpha == 0 {
        return src;
    }
    if src_alpha == 0 {
        return dst;
    }

    let sa = f32::from(src_alpha) / 255.0;
    let da = f32::from(dst_alpha) / 255.0;
    let out_alpha = sa + da * (1.0 - sa);

    let blend = |s: u8, d: u8| -> u8 {
        let value = (f32::from(s) * sa + f32::from(d) * da * (1.0 - sa)) / out_alpha;
        value.round().clamp(0.0, 255.0) as u8
    };

    Rgba([
        blend(src[0], dst[0]),
        blend(src[1], dst[1]),
        blend(src[2], dst[2]),
        (out_alpha * 255.0).round().clamp(0.0, 255.0) as u8,
    ])
}
