//! Pixel effects applied to the composited surface
//!
//! Each effect maps a 0-100 intensity onto the parameter of a canvas-style
//! filter. Brightness and contrast touch only the color channels; blur works
//! on premultiplied alpha so transparent pixels do not bleed dark fringes.

use crate::{
    error::{BgEditError, Result},
    types::{EffectSpec, MAX_INTENSITY, NEUTRAL_INTENSITY},
};
use image::RgbaImage;

/// Blur radius in pixels for an intensity (0-10px over 0-100)
#[must_use]
pub fn blur_radius(intensity: u8) -> f32 {
    f32::from(intensity.min(MAX_INTENSITY)) / 10.0
}

/// Channel multiplier for a brightness intensity; 50 is identity
#[must_use]
pub fn brightness_factor(intensity: u8) -> f32 {
    f32::from(intensity.min(MAX_INTENSITY)) / f32::from(NEUTRAL_INTENSITY)
}

/// Signed contrast amount in -100..=100 for an intensity
#[must_use]
pub fn contrast_amount(intensity: u8) -> f32 {
    (f32::from(intensity.min(MAX_INTENSITY)) - f32::from(NEUTRAL_INTENSITY)) * 2.0
}

/// Contrast factor `259(a+255) / (255(259-a))`; 1.0 at the neutral point
#[must_use]
pub fn contrast_factor(intensity: u8) -> f32 {
    let amount = contrast_amount(intensity);
    (259.0 * (amount + 255.0)) / (255.0 * (259.0 - amount))
}

/// Apply an effect to the whole surface in place
///
/// # Errors
/// - Non-finite filter parameters
pub fn apply_effect(surface: &mut RgbaImage, effect: &EffectSpec) -> Result<()> {
    match effect.clamped() {
        EffectSpec::None => Ok(()),
        EffectSpec::Blur(v) => {
            let radius = blur_radius(v);
            if radius > 0.0 {
                *surface = gaussian_blur(surface, radius);
            }
            Ok(())
        },
        EffectSpec::Brightness(v) => {
            if v != NEUTRAL_INTENSITY {
                scale_channels(surface, |c| c * brightness_factor(v))?;
            }
            Ok(())
        },
        EffectSpec::Contrast(v) => {
            if v != NEUTRAL_INTENSITY {
                let factor = contrast_factor(v);
                scale_channels(surface, |c| factor * (c - 128.0) + 128.0)?;
            }
            Ok(())
        },
    }
}

/// Map every color channel through `f`, rounding and clamping to 0-255
fn scale_channels<F>(surface: &mut RgbaImage, f: F) -> Result<()>
where
    F: Fn(f32) -> f32,
{
    // Check once: the mapping is monotonic, so finite endpoints imply finite output
    if !f(0.0).is_finite() || !f(255.0).is_finite() {
        return Err(BgEditError::processing_stage_error(
            "effect pass",
            "filter parameter is not finite",
            None,
        ));
    }

    let lut: Vec<u8> = (0..=255u8)
        .map(|c| f(f32::from(c)).round().clamp(0.0, 255.0) as u8)
        .collect();

    for pixel in surface.pixels_mut() {
        for channel in pixel.0.iter_mut().take(3) {
            *channel = lut.get(usize::from(*channel)).copied().unwrap_or(*channel);
        }
    }

    Ok(())
}

/// Gaussian blur with `radius` as standard deviation, on premultiplied alpha
fn gaussian_blur(surface: &RgbaImage, radius: f32) -> RgbaImage {
    let mut premultiplied = surface.clone();
    for pixel in premultiplied.pixels_mut() {
        let alpha = u32::from(pixel[3]);
        for channel in pixel.0.iter_mut().take(3) {
            *channel = ((u32::from(*channel) * alpha + 127) / 255) as u8;
        }
    }

    let mut blurred = image::imageops::blur(&premultiplied, radius);

    for pixel in blurred.pixels_mut() {
        let alpha = u32::from(pixel[3]);
        if alpha == 0 {
            pixel.0 = [0, 0, 0, 0];
            continue;
        }
        for channel in pixel.0.iter_mut().take(3) {
            *channel = ((u32::from(*channel) * 255 + alpha / 2) / alpha).min(255) as u8;
        }
    }

    blurred
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    fn gradient(width: u32, height: u32) -> RgbaImage {
        RgbaImage::from_fn(width, height, |x, y| {
            Rgba([(x * 13 % 256) as u8, (y * 29 % 256) as u8, ((x + y) * 7 % 256) as u8, 255])
        })
    }

    #[test]
    fn test_parameter_mappings() {
        assert!((blur_radius(100) - 10.0).abs() < f32::EPSILON);
        assert!((blur_radius(0)).abs() < f32::EPSILON);
        assert!((blur_radius(250) - 10.0).abs() < f32::EPSILON);
        assert!((brightness_factor(50) - 1.0).abs() < f32::EPSILON);
        assert!((brightness_factor(100) - 2.0).abs() < f32::EPSILON);
        assert!((contrast_amount(0) + 100.0).abs() < f32::EPSILON);
        assert!((contrast_amount(100) - 100.0).abs() < f32::EPSILON);
        assert!((contrast_factor(50) - 1.0).abs() < f32::EPSILON);
    }

    #[test]
    fn test_contrast_factor_bounds_are_finite() {
        let low = contrast_factor(0);
        let high = contrast_factor(100);
        assert!(low.is_finite() && low > 0.0 && low < 1.0);
        assert!(high.is_finite() && high > 1.0);
        // Out-of-range intensities clamp to the same bounds
        assert!((contrast_factor(255) - high).abs() < f32::EPSILON);
    }

    #[test]
    fn test_neutral_points_are_identity() {
        let original = gradient(16, 9);
        for effect in [
            EffectSpec::Brightness(50),
            EffectSpec::Contrast(50),
            EffectSpec::Blur(0),
            EffectSpec::None,
        ] {
            let mut surface = original.clone();
            apply_effect(&mut surface, &effect).unwrap();
            assert_eq!(surface, original, "{} should be identity", effect);
        }
    }

    #[test]
    fn test_brightness_scales_and_clamps() {
        let mut surface = RgbaImage::from_pixel(1, 1, Rgba([100, 200, 0, 77]));
        apply_effect(&mut surface, &EffectSpec::Brightness(100)).unwrap();
        assert_eq!(surface.get_pixel(0, 0), &Rgba([200, 255, 0, 77]));

        let mut surface = RgbaImage::from_pixel(1, 1, Rgba([100, 200, 0, 77]));
        apply_effect(&mut surface, &EffectSpec::Brightness(0)).unwrap();
        assert_eq!(surface.get_pixel(0, 0), &Rgba([0, 0, 0, 77]));

        let mut surface = RgbaImage::from_pixel(1, 1, Rgba([100, 201, 3, 255]));
        apply_effect(&mut surface, &EffectSpec::Brightness(25)).unwrap();
        assert_eq!(surface.get_pixel(0, 0), &Rgba([50, 101, 2, 255]));
    }

    #[test]
    fn test_contrast_pushes_away_from_midpoint() {
        let mut surface = RgbaImage::from_pixel(2, 1, Rgba([100, 128, 160, 255]));
        apply_effect(&mut surface, &EffectSpec::Contrast(100)).unwrap();
        let pixel = surface.get_pixel(0, 0);
        assert!(pixel[0] < 100);
        assert_eq!(pixel[1], 128);
        assert!(pixel[2] > 160);
        assert_eq!(pixel[3], 255);

        let mut surface = RgbaImage::from_pixel(1, 1, Rgba([0, 255, 128, 10]));
        apply_effect(&mut surface, &EffectSpec::Contrast(0)).unwrap();
        let pixel = surface.get_pixel(0, 0);
        assert!(pixel[0] > 0 && pixel[0] < 128);
        assert!(pixel[1] < 255 && pixel[1] > 128);
        assert_eq!(pixel[3], 10);
    }

    #[test]
    fn test_blur_is_deterministic_and_spreads() {
        let original = RgbaImage::from_fn(31, 31, |x, _| {
            if x < 15 {
                Rgba([255, 255, 255, 255])
            } else {
                Rgba([0, 0, 0, 255])
            }
        });

        let mut first = original.clone();
        apply_effect(&mut first, &EffectSpec::Blur(100)).unwrap();
        let mut second = original.clone();
        apply_effect(&mut second, &EffectSpec::Blur(100)).unwrap();

        assert_eq!(first, second);
        assert_eq!(first.dimensions(), (31, 31));
        assert!(first.get_pixel(14, 15)[0] < 255);
        assert!(first.get_pixel(20, 15)[0] > 0);
        assert_ne!(first, original);
    }

    #[test]
    fn test_blur_keeps_fully_transparent_surface_transparent() {
        let original = RgbaImage::from_pixel(12, 12, Rgba([255, 0, 0, 0]));
        let mut surface = original.clone();
        apply_effect(&mut surface, &EffectSpec::Blur(50)).unwrap();
        assert!(surface.pixels().all(|p| p[3] == 0));
    }

    #[test]
    fn test_blur_does_not_darken_opaque_color_next_to_transparency() {
        let mut surface = RgbaImage::from_fn(20, 20, |x, _| {
            if x < 10 {
                Rgba([255, 255, 255, 255])
            } else {
                Rgba([0, 0, 0, 0])
            }
        });
        apply_effect(&mut surface, &EffectSpec::Blur(30)).unwrap();
        let edge = surface.get_pixel(10, 10);
        assert!(edge[3] > 0);
        assert!(edge[0] >= 250, "unpremultiplied edge stays white, got {:?}", edge);
    }
}
