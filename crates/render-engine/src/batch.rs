//! Batched overlay passes.
//!
//! A single filter graph with thousands of overlay inputs exceeds what the
//! encoder handles, so sorted captions are split into fixed-size batches.
//! Batch `k` reads the output of batch `k - 1` (batch 0 reads the input
//! video), so the final batch output carries every caption.

use std::ops::Range;

use subburn_common::error::{SubburnError, SubburnResult};
use subburn_cue_model::cue::SubCue;
use subburn_cue_model::style::Style;

use crate::artifacts::{Artifact, ArtifactArena};
use crate::encoder::{EncodeInvocation, RenderBackend, VideoInfo};
use crate::graph::build_graph;
use crate::layout::{BoxSize, FrameSize, LayoutMetrics};

/// One batch's slice of the sorted captions and its share of job progress.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchSpan {
    pub index: usize,
    pub range: Range<usize>,
    /// Progress (percent) already reported when this batch starts.
    pub offset: f64,
    /// Progress (percent) this batch contributes.
    pub weight: f64,
}

/// Split `total` captions into consecutive batches of at most `batch_size`.
///
/// Every batch carries the same weight, `100 / batches`.
pub fn plan_batches(total: usize, batch_size: usize) -> Vec<BatchSpan> {
    if total == 0 {
        return Vec::new();
    }
    let batch_size = batch_size.max(1);
    let count = total.div_ceil(batch_size);
    let weight = 100.0 / count as f64;

    (0..total)
        .step_by(batch_size)
        .enumerate()
        .map(|(index, start)| {
            let end = (start + batch_size).min(total);
            BatchSpan {
                index,
                range: start..end,
                offset: index as f64 * weight,
                weight,
            }
        })
        .collect()
}

/// A rasterized caption on disk, ready to be composited.
#[derive(Debug)]
pub struct RasterArtifact {
    pub sub_cue: SubCue,
    pub layout: LayoutMetrics,
    pub image: Artifact,
    /// Pixel size of the saved image.
    pub size: BoxSize,
}

/// Run every batch in order and return the artifact holding the final
/// video.
///
/// `rasters` must already be sorted by start time. `progress` receives
/// monotonically non-decreasing percentages and exactly `100.0` at the
/// end. Intermediate videos (including `base`) are released as soon as
/// the following batch has succeeded; on failure the partial output of
/// the failing batch is released before the error is returned.
#[allow(clippy::too_many_arguments)]
pub fn run_batches(
    backend: &dyn RenderBackend,
    arena: &mut ArtifactArena,
    base: Artifact,
    rasters: &[RasterArtifact],
    style: &Style,
    video: VideoInfo,
    batch_size: usize,
    progress: &mut dyn FnMut(f64),
) -> SubburnResult<Artifact> {
    let spans = plan_batches(rasters.len(), batch_size);
    if spans.is_empty() {
        progress(100.0);
        return Ok(base);
    }

    let frame = FrameSize::new(video.width, video.height);
    let mut reporter = Reporter {
        reported: 0.0,
        sink: progress,
    };

    let mut current = base;
    for span in &spans {
        let batch = &rasters[span.range.clone()];
        let sub_cues: Vec<SubCue> = batch.iter().map(|r| r.sub_cue.clone()).collect();
        let sizes: Vec<BoxSize> = batch.iter().map(|r| r.size).collect();
        let graph = build_graph(&sub_cues, &sizes, style, frame)?;

        let output = arena.allocate(&format!("batch{:04}", span.index), "mp4");
        let invocation = EncodeInvocation {
            input_video: current.path().to_path_buf(),
            overlays: batch.iter().map(|r| r.image.path().to_path_buf()).collect(),
            filter_graph: graph.to_filter_expr(),
            output_label: graph.output_label().to_string(),
            output: output.path().to_path_buf(),
            duration_secs: video.duration_secs,
        };

        tracing::info!(
            batch = span.index,
            batches = spans.len(),
            overlays = batch.len(),
            "Running overlay batch"
        );

        let result = run_one(backend, &invocation, &mut |fraction| {
            reporter.report(span.offset + fraction * span.weight)
        });

        match result {
            Ok(()) => {
                if !output.path().is_file() {
                    arena.release(output)?;
                    return Err(SubburnError::encoder(format!(
                        "Batch {} produced no output file",
                        span.index
                    )));
                }
                arena.release(std::mem::replace(&mut current, output))?;
                reporter.report(span.offset + span.weight);
            }
            Err(err) => {
                tracing::warn!(batch = span.index, error = %err, "Overlay batch failed");
                if let Err(cleanup) = arena.release(output) {
                    tracing::warn!(error = %cleanup, "Failed to remove partial batch output");
                }
                return Err(err);
            }
        }
    }

    reporter.finish();
    Ok(current)
}

/// Forwards only increasing percentages.
struct Reporter<'a> {
    reported: f64,
    sink: &'a mut dyn FnMut(f64),
}

impl Reporter<'_> {
    fn report(&mut self, value: f64) {
        let value = value.clamp(0.0, 100.0);
        if value > self.reported {
            self.reported = value;
            (self.sink)(value);
        }
    }

    fn finish(&mut self) {
        if self.reported < 100.0 {
            self.reported = 100.0;
            (self.sink)(100.0);
        }
    }
}

fn run_one(
    backend: &dyn RenderBackend,
    invocation: &EncodeInvocation,
    on_fraction: &mut dyn FnMut(f64),
) -> SubburnResult<()> {
    for item in backend.encode(invocation)? {
        on_fraction(item?.clamp(0.0, 1.0));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plan_batches_covers_everything() {
        let spans = plan_batches(450, 200);
        let ranges: Vec<Range<usize>> = spans.iter().map(|s| s.range.clone()).collect();
        assert_eq!(ranges, vec![0..200, 200..400, 400..450]);
        let total: f64 = spans.iter().map(|s| s.weight).sum();
        assert!((total - 100.0).abs() < 1e-9);
        assert_eq!(spans[0].offset, 0.0);
        assert!((spans[1].offset - 100.0 / 3.0).abs() < 1e-9);
        assert!((spans[2].offset - 200.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_reporter_is_monotonic_and_finishes_at_100() {
        let mut seen = Vec::new();
        let mut sink = |v: f64| seen.push(v);
        let mut reporter = Reporter {
            reported: 0.0,
            sink: &mut sink,
        };
        reporter.report(10.0);
        reporter.report(5.0);
        reporter.report(99.999);
        reporter.finish();
        reporter.finish();
        assert_eq!(seen, vec![10.0, 99.999, 100.0]);
    }

    #[test]
    fn test_plan_batches_edge_cases() {
        assert!(plan_batches(0, 200).is_empty());
        assert_eq!(plan_batches(3, 0).len(), 3);
        let single = plan_batches(200, 200);
        assert_eq!(single.len(), 1);
        assert_eq!(single[0].weight, 100.0);
    }
}
