//! Editor event reporting service
//!
//! The controller announces phase changes, parameter changes and renders as
//! explicit events. Host UIs plug in their own reporter to refresh views; the
//! library ships a no-op and a tracing-backed implementation.

use crate::{
    controller::Phase,
    types::{BackgroundMode, EffectSpec, RenderMetadata},
};

/// Something observable happened in the editor
#[derive(Debug, Clone, PartialEq)]
pub enum EditorEvent {
    /// The view phase changed
    PhaseChanged { from: Phase, to: Phase },
    /// Background or effect parameters changed
    ParametersChanged {
        background: BackgroundMode,
        effect: EffectSpec,
    },
    /// A new result replaced the previous one
    Rendered(RenderMetadata),
    /// Rendering failed and the previous result was kept
    RenderFailed { message: String },
    /// Segmentation failed and the editor returned to upload
    SegmentationFailed { message: String },
    /// A segmentation result arrived for a session that no longer exists
    SubmissionDiscarded { generation: u64 },
    /// A custom background could not be decoded
    BackgroundUnavailable { reason: String },
}

impl EditorEvent {
    /// Short machine-friendly name of the event
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::PhaseChanged { .. } => "phase_changed",
            Self::ParametersChanged { .. } => "parameters_changed",
            Self::Rendered(_) => "rendered",
            Self::RenderFailed { .. } => "render_failed",
            Self::SegmentationFailed { .. } => "segmentation_failed",
            Self::SubmissionDiscarded { .. } => "submission_discarded",
            Self::BackgroundUnavailable { .. } => "background_unavailable",
        }
    }
}

/// Receives editor events
pub trait EditorEventReporter: Send + Sync {
    /// Report an event
    ///
    /// # Arguments
    /// * `event` - The event that occurred
    fn report(&self, event: &EditorEvent);
}

/// Reporter that discards all events
pub struct NoOpEventReporter;

impl EditorEventReporter for NoOpEventReporter {
    fn report(&self, _event: &EditorEvent) {
        // Intentionally empty - discards events
    }
}

/// Reporter that forwards events to `tracing`
pub struct TracingEventReporter;

impl EditorEventReporter for TracingEventReporter {
    fn report(&self, event: &EditorEvent) {
        match event {
            EditorEvent::PhaseChanged { from, to } => {
                tracing::info!(from = %from, to = %to, "Editor phase changed");
            },
            EditorEvent::ParametersChanged { background, effect } => {
                tracing::debug!(background = %background, effect = %effect, "Parameters changed");
            },
            EditorEvent::Rendered(metadata) => {
                tracing::debug!(
                    width = metadata.width,
                    height = metadata.height,
                    background = %metadata.background,
                    effect = %metadata.effect,
                    render_ms = metadata.render_ms,
                    reused_cutout = metadata.reused_cutout,
                    "Rendered result"
                );
            },
            EditorEvent::RenderFailed { message } => {
                tracing::error!(message = %message, "Render failed, keeping previous result");
            },
            EditorEvent::SegmentationFailed { message } => {
                tracing::error!(message = %message, "Segmentation failed");
            },
            EditorEvent::SubmissionDiscarded { generation } => {
                tracing::info!(generation, "Discarded segmentation result for stale session");
            },
            EditorEvent::BackgroundUnavailable { reason } => {
                tracing::warn!(
                    reason = %reason,
                    "Custom background unavailable, using transparent"
                );
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[derive(Default)]
    struct TestEventReporter {
        events: Arc<Mutex<Vec<EditorEvent>>>,
    }

    impl EditorEventReporter for TestEventReporter {
        fn report(&self, event: &EditorEvent) {
            self.events.lock().unwrap().push(event.clone());
        }
    }

    #[test]
    fn test_event_names() {
        let event = EditorEvent::PhaseChanged {
            from: Phase::Upload,
            to: Phase::Loading,
        };
        assert_eq!(event.name(), "phase_changed");
        assert_eq!(
            EditorEvent::SubmissionDiscarded { generation: 3 }.name(),
            "submission_discarded"
        );
    }

    #[test]
    fn test_reporters_accept_events() {
        let event = EditorEvent::RenderFailed {
            message: "empty surface".to_string(),
        };
        NoOpEventReporter.report(&event);
        TracingEventReporter.report(&event);

        let reporter = TestEventReporter::default();
        reporter.report(&event);
        assert_eq!(reporter.events.lock().unwrap().as_slice(), &[event]);
    }
}
