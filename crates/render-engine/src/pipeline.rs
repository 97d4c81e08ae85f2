//! End-to-end burn-in of one render job.

use std::path::Path;
use std::sync::Arc;

use rayon::prelude::*;
use subburn_common::config::RenderConfig;
use subburn_common::error::SubburnResult;
use subburn_cue_model::cue::{Cue, SubCue};
use subburn_cue_model::request::RenderInput;
use subburn_cue_model::style::{AnimationCanvas, Style};

use crate::artifacts::{Artifact, ArtifactArena};
use crate::batch::{run_batches, RasterArtifact};
use crate::effects::expand;
use crate::encoder::{FfmpegBackend, RenderBackend};
use crate::fonts::{FontRegistry, Typeface};
use crate::layout::{compute_layout, BoxSize, FrameSize, LayoutMetrics};
use crate::raster::{rasterize, save_png};

/// A sub-cue with its layout, ready to be rasterized.
#[derive(Debug, Clone, PartialEq)]
pub struct PlannedCaption {
    pub sub_cue: SubCue,
    pub layout: LayoutMetrics,
    /// Fixed canvas for animation frames, `None` to fit the text.
    pub canvas: Option<BoxSize>,
}

/// Expand, lay out and order every caption of a job.
///
/// The result is sorted by start time; captions starting together keep
/// their input order, which is also their stacking order.
pub fn plan_captions(
    cues: &[Cue],
    style: &Style,
    frame: FrameSize,
    face: &dyn Typeface,
) -> SubburnResult<Vec<PlannedCaption>> {
    let fixed_canvas =
        style.effect_type.is_animated() && style.animation_canvas == AnimationCanvas::Fixed;

    let mut planned = Vec::with_capacity(cues.len());
    for cue in cues {
        let full_box = if fixed_canvas {
            Some(compute_layout(&cue.text, style, frame, face)?.box_size())
        } else {
            None
        };

        for sub_cue in expand(cue, style.effect_type) {
            let layout = compute_layout(&sub_cue.text, style, frame, face)?;
            let canvas = full_box.map(|full| full.union(layout.box_size()));
            planned.push(PlannedCaption {
                sub_cue,
                layout,
                canvas,
            });
        }
    }

    planned.sort_by(|a, b| a.sub_cue.start.total_cmp(&b.sub_cue.start));
    Ok(planned)
}

/// Burns captions into videos.
///
/// Cheap to share across worker threads; all state is per call.
pub struct RenderPipeline {
    backend: Arc<dyn RenderBackend>,
    fonts: Arc<FontRegistry>,
    config: RenderConfig,
}

impl RenderPipeline {
    pub fn new(backend: Arc<dyn RenderBackend>, fonts: Arc<FontRegistry>, config: RenderConfig) -> Self {
        Self {
            backend,
            fonts,
            config,
        }
    }

    /// Production pipeline: ffmpeg backend and on-disk fonts.
    pub fn from_config(config: &RenderConfig) -> Self {
        Self::new(
            Arc::new(FfmpegBackend::from_config(config)),
            Arc::new(FontRegistry::from_config(config)),
            config.clone(),
        )
    }

    pub fn backend(&self) -> &dyn RenderBackend {
        self.backend.as_ref()
    }

    pub fn fonts(&self) -> &FontRegistry {
        &self.fonts
    }

    pub fn config(&self) -> &RenderConfig {
        &self.config
    }

    /// Render `input` and return the encoded output video.
    ///
    /// `progress` receives non-decreasing percentages. Every temporary file
    /// of the job is removed before this returns, whatever the outcome.
    pub fn render(
        &self,
        job_id: &str,
        input: &RenderInput,
        progress: &dyn Fn(f64),
    ) -> SubburnResult<Vec<u8>> {
        let start = std::time::Instant::now();
        let mut arena = ArtifactArena::new_in(&self.config.temp_root(), job_id)?;

        let result = self.render_in(&mut arena, job_id, input, progress);

        if let Err(err) = arena.close() {
            tracing::warn!(job_id, error = %err, "Failed to remove job artifacts");
        }

        match &result {
            Ok(bytes) => tracing::info!(
                job_id,
                output_bytes = bytes.len(),
                elapsed_secs = start.elapsed().as_secs_f64(),
                "Render finished"
            ),
            Err(err) => tracing::warn!(job_id, error = %err, "Render failed"),
        }
        result
    }

    fn render_in(
        &self,
        arena: &mut ArtifactArena,
        job_id: &str,
        input: &RenderInput,
        progress: &dyn Fn(f64),
    ) -> SubburnResult<Vec<u8>> {
        let base = arena.allocate("input", "mp4");
        std::fs::write(base.path(), &input.video)?;

        let video = self.backend.probe(base.path())?;
        let frame = FrameSize::new(video.width, video.height);
        let face = self.fonts.resolve(&input.style.font_family)?;

        let planned = plan_captions(&input.cues, &input.style, frame, face.as_ref())?;
        tracing::info!(
            job_id,
            cues = input.cues.len(),
            captions = planned.len(),
            width = video.width,
            height = video.height,
            duration_secs = video.duration_secs,
            face = face.name(),
            "Prepared captions"
        );

        let rasters = rasterize_all(arena, planned, &input.style, face.as_ref())?;

        let output = run_batches(
            self.backend.as_ref(),
            arena,
            base,
            &rasters,
            &input.style,
            video,
            self.config.batch_size,
            &mut |value| progress(value),
        )?;

        read_output(output.path())
    }
}

/// Rasterize every caption into its own PNG, in parallel.
fn rasterize_all(
    arena: &mut ArtifactArena,
    planned: Vec<PlannedCaption>,
    style: &Style,
    face: &dyn Typeface,
) -> SubburnResult<Vec<RasterArtifact>> {
    let images: Vec<Artifact> = planned
        .iter()
        .map(|_| arena.allocate("caption", "png"))
        .collect();

    let sizes = planned
        .par_iter()
        .zip(images.par_iter())
        .map(|(caption, artifact)| {
            let image = rasterize(&caption.sub_cue, style, &caption.layout, caption.canvas, face);
            save_png(&image, artifact.path())?;
            Ok(BoxSize {
                width: image.width(),
                height: image.height(),
            })
        })
        .collect::<SubburnResult<Vec<BoxSize>>>()?;

    Ok(planned
        .into_iter()
        .zip(images)
        .zip(sizes)
        .map(|((caption, image), size)| RasterArtifact {
            sub_cue: caption.sub_cue,
            layout: caption.layout,
            image,
            size,
        })
        .collect())
}

fn read_output(path: &Path) -> SubburnResult<Vec<u8>> {
    Ok(std::fs::read(path)?)
}
