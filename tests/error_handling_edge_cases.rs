//! Error handling and edge case testing
//!
//! This module tests error conditions, boundary values and invalid phase
//! transitions that can occur during an editing session.

use image::{Rgba, RgbaImage};
use imgly_bgedit::{
    test_utils::{sample_photo_png, MockSegmenter},
    BackgroundColor, BackgroundImage, BackgroundSpec, BgEditError, CompositingPipeline,
    CutoutImage, EditorConfig, EditorController, EffectKind, EffectSpec, Phase, Result,
    SourceImage,
};

#[test]
fn test_config_validation_edge_cases() -> Result<()> {
    assert!(EditorConfig::default().validate().is_ok());

    let config = EditorConfig::builder().export_file_name("RESULT.PNG").build()?;
    assert_eq!(config.export_file_name, "RESULT.PNG");

    for name in ["", "   ", "result.jpg", "result", "out/result.png", "..\\result.png"] {
        let result = EditorConfig::builder().export_file_name(name).build();
        assert!(
            matches!(result, Err(BgEditError::InvalidConfig(_))),
            "'{}' should be rejected",
            name
        );
    }

    // Constructing a controller re-validates
    let mut config = EditorConfig::default();
    config.export_file_name = "image.webp".to_string();
    assert!(EditorController::new(config).is_err());
    Ok(())
}

#[test]
fn test_config_json_edge_cases() {
    let config = EditorConfig::from_json_str("{}").unwrap();
    assert_eq!(config, EditorConfig::default());

    assert!(EditorConfig::from_json_str("not json").is_err());
    assert!(EditorConfig::from_json_str(r#"{ "default_color": "red" }"#).is_err());
    assert!(EditorConfig::from_json_str(r#"{ "png_compression": "maximum" }"#).is_err());
    assert!(EditorConfig::from_json_str(r#"{ "export_file_name": "x.gif" }"#).is_err());
}

#[test]
fn test_color_parsing_edge_cases() {
    assert_eq!(
        BackgroundColor::from_hex("#abc").unwrap(),
        BackgroundColor::new(0xaa, 0xbb, 0xcc)
    );
    assert_eq!(BackgroundColor::from_hex("#00000080").unwrap().a, 0x80);

    for input in ["", "#", "#12", "#12345", "#gggggg", "#+12345", "#1234567"] {
        assert!(BackgroundColor::from_hex(input).is_err(), "'{}' should be rejected", input);
    }
}

#[test]
fn test_intensity_boundaries() -> Result<()> {
    let cutout = CutoutImage::from_rgba(RgbaImage::from_pixel(4, 4, Rgba([100, 100, 100, 255])));

    let brighten = |v: u8| {
        let effect = EffectSpec::Brightness(v);
        CompositingPipeline::render(&cutout, &BackgroundSpec::Transparent, &effect)
    };

    let over = brighten(200)?;
    let max = brighten(100)?;
    assert_eq!(over.image(), max.image());
    assert_eq!(max.image().get_pixel(0, 0), &Rgba([200, 200, 200, 255]));

    let zero = brighten(0)?;
    assert_eq!(zero.image().get_pixel(0, 0), &Rgba([0, 0, 0, 255]));
    Ok(())
}

#[test]
fn test_zero_sized_inputs() {
    let empty = CutoutImage::from_rgba(RgbaImage::new(0, 0));
    let result =
        CompositingPipeline::render(&empty, &BackgroundSpec::Transparent, &EffectSpec::Blur(50));
    assert!(matches!(result, Err(BgEditError::Processing(_))));

    // An empty background image is treated as missing
    let cutout = CutoutImage::from_rgba(RgbaImage::from_pixel(2, 2, Rgba([5, 5, 5, 0])));
    let background = BackgroundSpec::CustomImage(BackgroundImage::from_rgba(RgbaImage::new(0, 3)));
    let result = CompositingPipeline::render(&cutout, &background, &EffectSpec::None).unwrap();
    assert!(result.reuses_cutout());
}

#[test]
fn test_invalid_uploads() {
    assert!(SourceImage::from_bytes(Vec::new()).is_err());
    assert!(SourceImage::from_bytes(b"GIF89a".to_vec()).is_err());

    let mut editor = EditorController::new(EditorConfig::default()).unwrap();
    let err = editor.begin_submission(Vec::new()).unwrap_err();
    assert!(!err.user_message().is_empty());
    assert_eq!(editor.phase(), Phase::Upload);
    assert_eq!(editor.error_message(), Some(err.user_message().as_str()));
}

#[tokio::test]
async fn test_invalid_phase_operations() -> Result<()> {
    let mut editor = EditorController::new(EditorConfig::default())?;

    assert!(matches!(editor.export(), Err(BgEditError::InvalidState(_))));
    assert!(!editor.set_effect(EffectKind::Blur));
    assert!(!editor.set_intensity(30));
    assert!(!editor.clear_custom_background());

    let _ticket = editor.begin_submission(sample_photo_png(8, 8)?)?;
    assert!(matches!(editor.export(), Err(BgEditError::InvalidState(_))));
    let second = editor
        .submit_image(sample_photo_png(8, 8)?, &MockSegmenter::new())
        .await;
    assert!(matches!(second, Err(BgEditError::InvalidState(_))));
    assert_eq!(editor.phase(), Phase::Loading);

    // Reset is valid from any phase
    editor.reset();
    assert_eq!(editor.phase(), Phase::Upload);
    editor.reset();
    assert_eq!(editor.phase(), Phase::Upload);
    Ok(())
}

#[tokio::test]
async fn test_segmentation_output_edge_cases() -> Result<()> {
    let mut editor = EditorController::new(EditorConfig::default())?;

    let result = editor
        .submit_image(sample_photo_png(8, 8)?, &MockSegmenter::new_fixed(Vec::new()))
        .await;
    assert!(matches!(result, Err(BgEditError::Segmentation(_))));
    assert_eq!(editor.phase(), Phase::Upload);
    assert!(editor.error_message().unwrap().starts_with("Could not remove the background"));

    // A completed ticket cannot be completed twice
    let segmenter = MockSegmenter::new();
    let ticket = editor.begin_submission(sample_photo_png(8, 8)?)?;
    let output = segmenter_output(&segmenter, ticket.image_bytes()).await?;
    editor.complete_submission(&ticket, Ok(output.clone()))?;
    let repeat = editor.complete_submission(&ticket, Ok(output))?;
    assert_eq!(repeat, imgly_bgedit::SubmissionOutcome::Discarded);
    assert_eq!(editor.phase(), Phase::Result);
    Ok(())
}

async fn segmenter_output(segmenter: &MockSegmenter, bytes: &[u8]) -> Result<Vec<u8>> {
    use imgly_bgedit::Segmenter;
    segmenter.segment(bytes).await
}
