//! View-state controller
//!
//! Owns the editing session: the current phase, every editing parameter and
//! all image resources. Each resource has exactly one owner here and is
//! dropped on the transition that supersedes it.
//!
//! ```text
//! Upload --submit--> Loading --success--> Result
//!    ^                  |                   |
//!    +-----failure------+                   |
//!    +---------------reset-----------------+
//! ```

use crate::{
    compositing::CompositingPipeline,
    config::{BackgroundColor, EditorConfig},
    error::{BgEditError, Result},
    segmentation::{as_segmentation_error, Segmenter},
    services::{EditorEvent, EditorEventReporter, ImageIOService, TracingEventReporter},
    types::{
        clamp_intensity, BackgroundImage, BackgroundMode, BackgroundSpec, CutoutImage, EffectKind,
        EffectSpec, RenderedResult, SourceImage, MAX_INTENSITY,
    },
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncReadExt};
use tracing::{debug, info, instrument, warn};

/// Which view the editor is showing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    /// Waiting for the user to pick a photo
    #[default]
    Upload,
    /// Segmentation in progress
    Loading,
    /// Cut-out available for editing and export
    Result,
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Upload => write!(f, "upload"),
            Self::Loading => write!(f, "loading"),
            Self::Result => write!(f, "result"),
        }
    }
}

/// Per-effect intensities, kept while another effect is active
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EffectIntensities {
    pub blur: u8,
    pub brightness: u8,
    pub contrast: u8,
}

impl Default for EffectIntensities {
    fn default() -> Self {
        Self {
            blur: EffectKind::Blur.default_intensity(),
            brightness: EffectKind::Brightness.default_intensity(),
            contrast: EffectKind::Contrast.default_intensity(),
        }
    }
}

impl EffectIntensities {
    #[must_use]
    pub fn get(&self, kind: EffectKind) -> u8 {
        match kind {
            EffectKind::None => 0,
            EffectKind::Blur => self.blur,
            EffectKind::Brightness => self.brightness,
            EffectKind::Contrast => self.contrast,
        }
    }

    pub fn set(&mut self, kind: EffectKind, intensity: u8) {
        let intensity = intensity.min(MAX_INTENSITY);
        match kind {
            EffectKind::None => {},
            EffectKind::Blur => self.blur = intensity,
            EffectKind::Brightness => self.brightness = intensity,
            EffectKind::Contrast => self.contrast = intensity,
        }
    }
}

/// All user-adjustable editing parameters
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EditorParameters {
    pub background_mode: BackgroundMode,
    pub background_color: BackgroundColor,
    pub effect: EffectKind,
    pub intensities: EffectIntensities,
}

impl EditorParameters {
    /// Fresh parameters: transparent background, no effect
    #[must_use]
    pub fn new(default_color: BackgroundColor) -> Self {
        Self {
            background_mode: BackgroundMode::Transparent,
            background_color: default_color,
            effect: EffectKind::None,
            intensities: EffectIntensities::default(),
        }
    }

    /// The active effect with its retained intensity
    #[must_use]
    pub fn effect_spec(&self) -> EffectSpec {
        EffectSpec::new(self.effect, self.intensities.get(self.effect))
    }

    /// Intensity of the active effect, `None` when no effect is selected
    #[must_use]
    pub fn active_intensity(&self) -> Option<u8> {
        self.effect_spec().intensity()
    }
}

impl Default for EditorParameters {
    fn default() -> Self {
        Self::new(BackgroundColor::default())
    }
}

/// Handle for an in-flight segmentation call
///
/// Completing a ticket issued before a `reset` (or before a later
/// submission) has no effect on the session.
#[derive(Debug, Clone)]
pub struct SubmissionTicket {
    generation: u64,
    image_bytes: Arc<Vec<u8>>,
}

impl SubmissionTicket {
    #[must_use]
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Bytes to hand to the segmentation collaborator
    #[must_use]
    pub fn image_bytes(&self) -> &[u8] {
        &self.image_bytes
    }
}

/// What happened to a completed submission
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmissionOutcome {
    /// The cut-out was stored and the editor is in `Result`
    Ready,
    /// The session was superseded; the segmentation output was dropped
    Discarded,
}

/// Encoded export ready for download
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportedImage {
    pub file_name: String,
    pub mime_type: &'static str,
    pub bytes: Vec<u8>,
}

/// Single-session editor state machine
pub struct EditorController {
    config: EditorConfig,
    phase: Phase,
    parameters: EditorParameters,
    source: Option<SourceImage>,
    cutout: Option<CutoutImage>,
    custom_background: Option<BackgroundImage>,
    rendered: Option<RenderedResult>,
    error_message: Option<String>,
    generation: u64,
    session_id: String,
    reporter: Box<dyn EditorEventReporter>,
}

impl EditorController {
    /// Create a controller that reports events through `tracing`
    ///
    /// # Errors
    /// - Invalid configuration
    pub fn new(config: EditorConfig) -> Result<Self> {
        Self::with_reporter(config, Box::new(TracingEventReporter))
    }

    /// Create a controller with a custom event reporter
    ///
    /// # Errors
    /// - Invalid configuration
    pub fn with_reporter(
        config: EditorConfig,
        reporter: Box<dyn EditorEventReporter>,
    ) -> Result<Self> {
        config.validate()?;
        let parameters = EditorParameters::new(config.default_color);

        Ok(Self {
            config,
            phase: Phase::Upload,
            parameters,
            source: None,
            cutout: None,
            custom_background: None,
            rendered: None,
            error_message: None,
            generation: 0,
            session_id: uuid::Uuid::new_v4().to_string(),
            reporter,
        })
    }

    #[must_use]
    pub fn config(&self) -> &EditorConfig {
        &self.config
    }

    #[must_use]
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Last user-facing error, cleared by the next submission or reset
    #[must_use]
    pub fn error_message(&self) -> Option<&str> {
        self.error_message.as_deref()
    }

    #[must_use]
    pub fn parameters(&self) -> &EditorParameters {
        &self.parameters
    }

    #[must_use]
    pub fn source(&self) -> Option<&SourceImage> {
        self.source.as_ref()
    }

    #[must_use]
    pub fn cutout(&self) -> Option<&CutoutImage> {
        self.cutout.as_ref()
    }

    #[must_use]
    pub fn custom_background(&self) -> Option<&BackgroundImage> {
        self.custom_background.as_ref()
    }

    #[must_use]
    pub fn rendered(&self) -> Option<&RenderedResult> {
        self.rendered.as_ref()
    }

    /// Counter bumped by every submission and reset
    #[must_use]
    pub fn session_generation(&self) -> u64 {
        self.generation
    }

    #[must_use]
    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Background as the pipeline sees it
    ///
    /// A custom background that has not been loaded yet renders as
    /// transparent.
    #[must_use]
    pub fn background_spec(&self) -> BackgroundSpec {
        match self.parameters.background_mode {
            BackgroundMode::Transparent => BackgroundSpec::Transparent,
            BackgroundMode::SolidColor => {
                BackgroundSpec::SolidColor(self.parameters.background_color)
            },
            BackgroundMode::CustomImage => match &self.custom_background {
                Some(image) => BackgroundSpec::CustomImage(image.clone()),
                None => BackgroundSpec::Transparent,
            },
        }
    }

    #[must_use]
    pub fn effect_spec(&self) -> EffectSpec {
        self.parameters.effect_spec()
    }

    /// Upload a photo and run segmentation to completion
    ///
    /// # Examples
    /// ```rust
    /// use imgly_bgedit::{EditorConfig, EditorController, Phase};
    /// use imgly_bgedit::test_utils::{sample_photo_png, MockSegmenter};
    ///
    /// # async fn example() -> imgly_bgedit::Result<()> {
    /// let mut editor = EditorController::new(EditorConfig::default())?;
    /// editor.submit_image(sample_photo_png(64, 64)?, &MockSegmenter::new()).await?;
    /// assert_eq!(editor.phase(), Phase::Result);
    /// let export = editor.export()?;
    /// assert_eq!(export.file_name, "edited-image.png");
    /// # Ok(())
    /// # }
    /// ```
    ///
    /// # Errors
    /// - Not in the `Upload` phase
    /// - Undecodable or oversized upload
    /// - Segmentation failure (the editor returns to `Upload`)
    #[instrument(
        skip(self, image_bytes, segmenter),
        fields(session = %self.session_id, segmenter = %segmenter.name())
    )]
    pub async fn submit_image(
        &mut self,
        image_bytes: Vec<u8>,
        segmenter: &dyn Segmenter,
    ) -> Result<SubmissionOutcome> {
        let ticket = self.begin_submission(image_bytes)?;
        let outcome = segmenter.segment(ticket.image_bytes()).await;
        self.complete_submission(&ticket, outcome)
    }

    /// Read an upload from an async stream, then submit it
    ///
    /// # Errors
    /// - Stream read failures
    /// - Everything [`EditorController::submit_image`] can fail with
    pub async fn submit_reader<R: AsyncRead + Unpin>(
        &mut self,
        mut reader: R,
        segmenter: &dyn Segmenter,
    ) -> Result<SubmissionOutcome> {
        let mut buffer = Vec::new();
        reader.read_to_end(&mut buffer).await.map_err(|e| {
            BgEditError::processing(format!("Failed to read from stream: {}", e))
        })?;
        self.submit_image(buffer, segmenter).await
    }

    /// Accept an upload and enter `Loading`
    ///
    /// The returned ticket carries the bytes for the segmentation call and
    /// must be passed to [`EditorController::complete_submission`].
    ///
    /// # Errors
    /// - Not in the `Upload` phase
    /// - Undecodable or oversized upload (the editor stays in `Upload`)
    pub fn begin_submission(&mut self, image_bytes: Vec<u8>) -> Result<SubmissionTicket> {
        if self.phase != Phase::Upload {
            return Err(BgEditError::invalid_state(format!(
                "Cannot submit an image while in the {} phase",
                self.phase
            )));
        }

        let source = match self.validate_upload(image_bytes) {
            Ok(source) => source,
            Err(e) => {
                self.error_message = Some(e.user_message());
                return Err(e);
            },
        };

        self.generation += 1;
        self.error_message = None;
        let ticket = SubmissionTicket {
            generation: self.generation,
            image_bytes: source.shared_bytes(),
        };

        info!(
            generation = self.generation,
            width = source.dimensions().0,
            height = source.dimensions().1,
            "Image submitted for segmentation"
        );
        self.source = Some(source);
        self.transition(Phase::Loading);

        Ok(ticket)
    }

    /// Apply the segmentation outcome for a ticket
    ///
    /// Outcomes for superseded tickets are dropped and reported as
    /// [`SubmissionOutcome::Discarded`].
    ///
    /// # Errors
    /// - The segmentation call failed or returned an unusable image; the
    ///   editor returns to `Upload` with a visible error message
    pub fn complete_submission(
        &mut self,
        ticket: &SubmissionTicket,
        outcome: Result<Vec<u8>>,
    ) -> Result<SubmissionOutcome> {
        if ticket.generation != self.generation || self.phase != Phase::Loading {
            debug!(
                ticket = ticket.generation,
                current = self.generation,
                "Ignoring segmentation result for superseded session"
            );
            self.reporter.report(&EditorEvent::SubmissionDiscarded {
                generation: ticket.generation,
            });
            return Ok(SubmissionOutcome::Discarded);
        }

        let cutout = outcome
            .map_err(as_segmentation_error)
            .and_then(|bytes| Self::decode_cutout(bytes, self.source.as_ref()));

        let cutout = match cutout {
            Ok(cutout) => cutout,
            Err(e) => {
                let message = e.user_message();
                self.reporter.report(&EditorEvent::SegmentationFailed {
                    message: message.clone(),
                });
                self.source = None;
                self.error_message = Some(message);
                self.transition(Phase::Upload);
                return Err(e);
            },
        };

        self.cutout = Some(cutout);
        self.transition(Phase::Result);
        self.rerender();
        Ok(SubmissionOutcome::Ready)
    }

    /// Drop the session and return to `Upload`
    ///
    /// Releases the source, cut-out, custom background and rendered result,
    /// restores default parameters, and invalidates in-flight submissions.
    pub fn reset(&mut self) {
        self.source = None;
        self.cutout = None;
        self.custom_background = None;
        self.rendered = None;
        self.error_message = None;
        self.parameters = EditorParameters::new(self.config.default_color);
        self.generation += 1;
        self.session_id = uuid::Uuid::new_v4().to_string();

        info!(generation = self.generation, "Editor session reset");
        self.transition(Phase::Upload);
    }

    /// Select the background kind
    ///
    /// Returns `false` (and changes nothing) outside the `Result` phase.
    pub fn set_background_mode(&mut self, mode: BackgroundMode) -> bool {
        self.update_parameters(|p| p.background_mode = mode)
    }

    /// Set the solid background color
    ///
    /// Returns `false` (and changes nothing) outside the `Result` phase.
    pub fn set_background_color(&mut self, color: BackgroundColor) -> bool {
        self.update_parameters(|p| p.background_color = color)
    }

    /// Decode and store a custom background image
    ///
    /// Decode failures are not errors: the background stays unavailable and
    /// renders as transparent until a valid image is supplied. Returns whether
    /// a usable image is now loaded.
    pub fn load_custom_background(&mut self, image_bytes: &[u8]) -> bool {
        if !self.accepts_edits() {
            return false;
        }

        match BackgroundImage::from_bytes(image_bytes) {
            Ok(image) => {
                debug!(
                    width = image.dimensions().0,
                    height = image.dimensions().1,
                    "Custom background loaded"
                );
                self.custom_background = Some(image);
            },
            Err(e) => {
                warn!(error = %e, "Custom background could not be decoded");
                self.custom_background = None;
                self.reporter.report(&EditorEvent::BackgroundUnavailable {
                    reason: e.to_string(),
                });
            },
        }

        self.parameters_changed();
        self.custom_background.is_some()
    }

    /// Forget the custom background image
    pub fn clear_custom_background(&mut self) -> bool {
        if !self.accepts_edits() {
            return false;
        }
        self.custom_background = None;
        self.parameters_changed();
        true
    }

    /// Select the active effect; its retained intensity comes back with it
    ///
    /// Returns `false` (and changes nothing) outside the `Result` phase.
    pub fn set_effect(&mut self, kind: EffectKind) -> bool {
        self.update_parameters(|p| p.effect = kind)
    }

    /// Set the intensity of the active effect, clamped to 0-100
    ///
    /// Returns `false` outside the `Result` phase or when no effect is active.
    pub fn set_intensity(&mut self, value: i32) -> bool {
        let kind = self.parameters.effect;
        if kind == EffectKind::None {
            return false;
        }
        self.set_effect_intensity(kind, value)
    }

    /// Set the retained intensity of any effect, clamped to 0-100
    ///
    /// Returns `false` (and changes nothing) outside the `Result` phase.
    pub fn set_effect_intensity(&mut self, kind: EffectKind, value: i32) -> bool {
        let intensity = clamp_intensity(value);
        self.update_parameters(|p| p.intensities.set(kind, intensity))
    }

    /// Encode the active result as a PNG download
    ///
    /// # Errors
    /// - Not in the `Result` phase
    /// - PNG encoding failures
    pub fn export(&self) -> Result<ExportedImage> {
        let rendered = match (&self.phase, &self.rendered) {
            (Phase::Result, Some(rendered)) => rendered,
            _ => {
                return Err(BgEditError::invalid_state(format!(
                    "Nothing to export in the {} phase",
                    self.phase
                )))
            },
        };

        let bytes = rendered.to_png_bytes(self.config.png_compression)?;
        info!(
            file_name = %self.config.export_file_name,
            size_bytes = bytes.len(),
            "Exported result"
        );

        Ok(ExportedImage {
            file_name: self.config.export_file_name.clone(),
            mime_type: "image/png",
            bytes,
        })
    }

    /// Export into a directory using the configured file name
    ///
    /// # Errors
    /// - Everything [`EditorController::export`] can fail with
    /// - File system errors
    pub fn export_to_dir<P: AsRef<Path>>(&self, dir: P) -> Result<PathBuf> {
        let export = self.export()?;
        let path = dir.as_ref().join(&export.file_name);
        ImageIOService::write_bytes(&path, &export.bytes)?;
        Ok(path)
    }

    fn validate_upload(&self, image_bytes: Vec<u8>) -> Result<SourceImage> {
        let source = SourceImage::from_bytes(image_bytes)?;
        let (width, height) = source.dimensions();

        if width == 0 || height == 0 {
            return Err(BgEditError::invalid_config("The image has no pixels"));
        }

        let max = self.config.max_dimension;
        if max > 0 && (width > max || height > max) {
            return Err(BgEditError::config_value_error(
                "image size",
                format!("{}x{}", width, height),
                &format!("up to {}x{}", max, max),
                None,
            ));
        }

        Ok(source)
    }

    fn decode_cutout(bytes: Vec<u8>, source: Option<&SourceImage>) -> Result<CutoutImage> {
        let cutout = CutoutImage::from_bytes(bytes).map_err(|e| {
            BgEditError::segmentation(format!("result could not be decoded ({})", e))
        })?;

        let (width, height) = cutout.dimensions();
        if width == 0 || height == 0 {
            return Err(BgEditError::segmentation("result has no pixels"));
        }

        if let Some(source) = source {
            if source.dimensions() != (width, height) {
                debug!(
                    source = ?source.dimensions(),
                    cutout = ?(width, height),
                    "Cut-out size differs from the upload"
                );
            }
        }

        Ok(cutout)
    }

    fn accepts_edits(&self) -> bool {
        if self.phase == Phase::Result {
            true
        } else {
            debug!(phase = %self.phase, "Ignoring edit outside the result phase");
            false
        }
    }

    fn update_parameters<F>(&mut self, update: F) -> bool
    where
        F: FnOnce(&mut EditorParameters),
    {
        if !self.accepts_edits() {
            return false;
        }
        update(&mut self.parameters);
        self.parameters_changed();
        true
    }

    fn parameters_changed(&mut self) {
        self.reporter.report(&EditorEvent::ParametersChanged {
            background: self.parameters.background_mode,
            effect: self.effect_spec(),
        });
        self.rerender();
    }

    /// Recompute the result from the current parameters
    ///
    /// On failure the previous result stays active; without one, the
    /// unmodified cut-out is shown.
    fn rerender(&mut self) {
        if self.phase != Phase::Result {
            return;
        }
        let Some(cutout) = self.cutout.as_ref() else {
            return;
        };

        let background = self.background_spec();
        let effect = self.effect_spec();

        match CompositingPipeline::render(cutout, &background, &effect) {
            Ok(result) => {
                if self.config.debug {
                    info!(
                        background = %background.mode(),
                        effect = %effect,
                        render_ms = result.metadata().render_ms,
                        reused_cutout = result.reuses_cutout(),
                        "Debug render details"
                    );
                }
                self.reporter
                    .report(&EditorEvent::Rendered(result.metadata().clone()));
                self.error_message = None;
                self.rendered = Some(result);
            },
            Err(e) => {
                let message = e.user_message();
                self.reporter.report(&EditorEvent::RenderFailed {
                    message: message.clone(),
                });
                if self.rendered.is_none() {
                    self.rendered = Some(RenderedResult::unmodified(cutout));
                }
                self.error_message = Some(message);
            },
        }
    }

    fn transition(&mut self, to: Phase) {
        let from = self.phase;
        if from == to {
            return;
        }
        self.phase = to;
        self.reporter.report(&EditorEvent::PhaseChanged { from, to });
    }
}

impl std::fmt::Debug for EditorController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EditorController")
            .field("phase", &self.phase)
            .field("parameters", &self.parameters)
            .field("generation", &self.generation)
            .field("has_cutout", &self.cutout.is_some())
            .field("error_message", &self.error_message)
            .finish_non_exhaustive()
    }
}
