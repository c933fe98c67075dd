//! Service layer for separating concerns
//!
//! Image I/O and editor event reporting live here so the compositing and
//! controller code stay free of file handling and UI wiring.

pub mod events;
pub mod io;

pub use events::{EditorEvent, EditorEventReporter, NoOpEventReporter, TracingEventReporter};
pub use io::ImageIOService;
