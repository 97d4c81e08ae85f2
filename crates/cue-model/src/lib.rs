//! Subburn Cue Model
//!
//! Defines the data contracts consumed by the rendering pipeline:
//! - **Cues:** Timed text entries with optional per-word timings
//! - **Sub-cues:** Time-sliced fragments of a cue produced for reveal animations
//! - **Style:** Font, colors, placement and animation mode for one export
//! - **Requests:** The submit-export contract and its validated form
//!
//! All times are in seconds relative to the start of the source video.

pub mod color;
pub mod cue;
pub mod error;
pub mod request;
pub mod style;

pub use color::*;
pub use cue::*;
pub use error::*;
pub use request::*;
pub use style::*;
