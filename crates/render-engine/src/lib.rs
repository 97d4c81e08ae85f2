//! Subburn Render Engine
//!
//! Offline pipeline that burns styled captions into a video file.
//!
//! # Pipeline Architecture
//!
//! ```text
//! cues ── Effect Expander ── sub-cues ── Text Layout ── Rasterizer ── caption PNGs
//!                                            │                            │
//! video ── Probe ── frame size ──────────────┘                            │
//!   │                                                                     │
//!   └──────────────┬──────────────────────────────────────────────────────┘
//!                  ▼
//!           Batch Scheduler ── per batch: Composition Graph ── Encode (H.264)
//!                  │                       batch k output = batch k+1 input
//!                  ▼
//!              output.mp4
//! ```
//!
//! Every temporary file lives in a per-job [`artifacts::ArtifactArena`] and
//! is removed when the job ends.

pub mod artifacts;
pub mod batch;
pub mod effects;
pub mod encoder;
pub mod fonts;
pub mod graph;
pub mod layout;
pub mod pipeline;
pub mod raster;

pub use artifacts::{Artifact, ArtifactArena};
pub use batch::{plan_batches, run_batches, BatchSpan, RasterArtifact};
pub use effects::expand;
pub use encoder::{EncodeInvocation, FfmpegBackend, ProgressStream, RenderBackend, VideoInfo};
pub use fonts::{FontRegistry, LineMetrics, RusttypeFace, Typeface};
pub use graph::{build_graph, CompositionGraph, OverlayStage};
pub use layout::{compute_layout, BoxSize, FrameSize, LayoutLine, LayoutMetrics};
pub use pipeline::{plan_captions, PlannedCaption, RenderPipeline};
pub use raster::rasterize;
