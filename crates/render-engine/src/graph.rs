//! Overlay composition graph.
//!
//! A batch of captions becomes a chain of `overlay` filters: stage `i`
//! composites caption image `i` onto the output of stage `i - 1`, enabled
//! only inside the caption's `[start, end)` window.
//!
//! ```text
//! [0:v] ─┬─ overlay(img 1, t∈[s1,e1)) ─ [v1] ─┬─ overlay(img 2, ...) ─ ... ─ [vout]
//! [1:v] ─┘                          [2:v] ───┘
//! ```

use serde::Serialize;
use subburn_common::error::{SubburnError, SubburnResult};
use subburn_cue_model::cue::SubCue;
use subburn_cue_model::style::{Position, Style};

use crate::layout::{BoxSize, FrameSize};

/// Distance from the frame edge for top/bottom placement, in preview pixels.
pub const BASE_MARGIN: f64 = 20.0;

/// Label of the composited video stream.
pub const OUTPUT_LABEL: &str = "vout";

/// Label of the base video stream.
pub const BASE_LABEL: &str = "0:v";

/// One overlay filter in the chain.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OverlayStage {
    pub input_label: String,
    /// Encoder input index of the caption image.
    pub image_input: usize,
    pub x: i64,
    pub y: i64,
    pub start: f64,
    pub end: f64,
    pub output_label: String,
}

/// Declarative overlay chain for one batch.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompositionGraph {
    pub stages: Vec<OverlayStage>,
}

impl CompositionGraph {
    pub fn output_label(&self) -> &str {
        OUTPUT_LABEL
    }

    /// Render as an ffmpeg `-filter_complex` expression.
    pub fn to_filter_expr(&self) -> String {
        if self.stages.is_empty() {
            return format!("[{BASE_LABEL}]null[{OUTPUT_LABEL}]");
        }

        self.stages
            .iter()
            .map(|stage| {
                format!(
                    "[{input}][{image}:v]overlay=x={x}:y={y}:enable='gte(t,{start:.3})*lt(t,{end:.3})'[{output}]",
                    input = stage.input_label,
                    image = stage.image_input,
                    x = stage.x,
                    y = stage.y,
                    start = stage.start,
                    end = stage.end,
                    output = stage.output_label,
                )
            })
            .collect::<Vec<_>>()
            .join(";")
    }
}

/// Build the overlay chain for `sub_cues` whose images have sizes `images`.
///
/// Image `i` is expected at encoder input `i + 1`; input `0` is the base
/// video.
pub fn build_graph(
    sub_cues: &[SubCue],
    images: &[BoxSize],
    style: &Style,
    frame: FrameSize,
) -> SubburnResult<CompositionGraph> {
    if sub_cues.len() != images.len() {
        return Err(SubburnError::render(format!(
            "composition graph needs one image per sub-cue, got {} sub-cues and {} images",
            sub_cues.len(),
            images.len()
        )));
    }

    let last = sub_cues.len().saturating_sub(1);
    let stages = sub_cues
        .iter()
        .zip(images)
        .enumerate()
        .map(|(i, (sub_cue, image))| {
            let (x, y) = placement(*image, style, frame);
            OverlayStage {
                input_label: if i == 0 {
                    BASE_LABEL.to_string()
                } else {
                    format!("v{i}")
                },
                image_input: i + 1,
                x,
                y,
                start: sub_cue.start,
                end: sub_cue.end,
                output_label: if i == last {
                    OUTPUT_LABEL.to_string()
                } else {
                    format!("v{}", i + 1)
                },
            }
        })
        .collect();

    Ok(CompositionGraph { stages })
}

/// Top-left corner of a caption image inside the frame.
pub fn placement(image: BoxSize, style: &Style, frame: FrameSize) -> (i64, i64) {
    let scale = frame.preview_scale();
    let (fw, fh) = (frame.width as i64, frame.height as i64);
    let (iw, ih) = (image.width as i64, image.height as i64);
    let margin = (BASE_MARGIN * scale).round() as i64;

    let centered_x = ((fw - iw) / 2).max(0);
    match style.custom_origin() {
        Some((cx, cy)) => {
            let x = ((cx * scale).round() as i64).clamp(0, (fw - iw).max(0));
            let y = ((cy * scale).round() as i64).clamp(0, (fh - ih).max(0));
            (x, y)
        }
        None => {
            let y = match style.position {
                Position::Top => margin,
                Position::Middle => (fh - ih) / 2,
                Position::Bottom | Position::Custom => fh - ih - margin,
            };
            (centered_x, y.max(0))
        }
    }
}
