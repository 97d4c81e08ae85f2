//! Text layout: word wrapping and caption box sizing.
//!
//! All style sizes are authored against a fixed-height preview. Layout
//! scales them by `frame_height / REFERENCE_HEIGHT` so an export at any
//! resolution looks like the preview, then shrinks animated captions a
//! little so growing text stays on screen.
//!
//! [`compute_layout`] is a pure function of its inputs; animation frames
//! rely on recomputing the full-text layout and getting the same box.

use serde::Serialize;
use subburn_common::error::{SubburnError, SubburnResult};
use subburn_cue_model::style::{EffectType, Style};

use crate::fonts::Typeface;

/// Height of the editor preview the style sizes were authored against.
pub const REFERENCE_HEIGHT: f64 = 360.0;

/// Padding between text and box edge, in preview pixels.
pub const BASE_PADDING: f64 = 10.0;

/// Line advance as a multiple of font size.
pub const LINE_HEIGHT_RATIO: f64 = 1.2;

/// Lines wrap before exceeding this fraction of the frame width.
pub const MAX_LINE_WIDTH_RATIO: f64 = 0.8;

/// Extra shrink applied to animated captions.
pub const ANIMATED_SHRINK_FACTOR: f64 = 1.15;

/// Output frame dimensions in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct FrameSize {
    pub width: u32,
    pub height: u32,
}

impl FrameSize {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Factor mapping preview pixels to frame pixels.
    pub fn preview_scale(&self) -> f64 {
        self.height as f64 / REFERENCE_HEIGHT
    }
}

/// Pixel size of a rasterized caption box.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct BoxSize {
    pub width: u32,
    pub height: u32,
}

impl BoxSize {
    /// Smallest box containing both.
    pub fn union(self, other: BoxSize) -> BoxSize {
        BoxSize {
            width: self.width.max(other.width),
            height: self.height.max(other.height),
        }
    }
}

/// One wrapped line.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LayoutLine {
    pub text: String,
    pub width: f64,
}

/// Wrapping and sizing for one piece of text under one style and frame.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LayoutMetrics {
    pub lines: Vec<LayoutLine>,
    /// Scaled font size in pixels.
    pub font_size: u32,
    pub line_height: u32,
    /// Offset from a line's top to its baseline.
    pub baseline_offset: f64,
    pub padding: f64,
    pub corner_radius: f64,
    pub text_width: f64,
    pub text_height: f64,
    /// Always even.
    pub box_width: u32,
    /// Always even.
    pub box_height: u32,
}

impl LayoutMetrics {
    pub fn box_size(&self) -> BoxSize {
        BoxSize {
            width: self.box_width,
            height: self.box_height,
        }
    }
}

/// Divisor applied on top of the preview scale for an effect mode.
pub fn shrink_factor(effect: EffectType) -> f64 {
    if effect.is_animated() {
        ANIMATED_SHRINK_FACTOR
    } else {
        1.0
    }
}

/// Measure and wrap `text`, and size its padded box.
pub fn compute_layout(
    text: &str,
    style: &Style,
    frame: FrameSize,
    face: &dyn Typeface,
) -> SubburnResult<LayoutMetrics> {
    if frame.width == 0 || frame.height == 0 {
        return Err(SubburnError::layout(format!(
            "invalid frame size {}x{}",
            frame.width, frame.height
        )));
    }
    if !style.font_size.is_finite() || style.font_size <= 0.0 {
        return Err(SubburnError::layout(format!(
            "invalid font size {}",
            style.font_size
        )));
    }

    let scale = frame.preview_scale() / shrink_factor(style.effect_type);
    let font_size = ((style.font_size * scale).round() as u32).max(1);
    let px = font_size as f32;
    let line_height = ((font_size as f64 * LINE_HEIGHT_RATIO).round() as u32).max(1);

    let max_width = frame.width as f64 * MAX_LINE_WIDTH_RATIO;
    let lines = wrap_text(text, max_width, |candidate| face.measure(candidate, px) as f64);

    let text_width = lines.iter().map(|line| line.width).fold(0.0, f64::max);
    let text_height = lines.len() as f64 * line_height as f64;

    let padding = BASE_PADDING * scale;
    let box_width = even_ceil(text_width + 2.0 * padding);
    let box_height = even_ceil(text_height + 2.0 * padding);

    let metrics = face.line_metrics(px);
    let glyph_height = (metrics.ascent + metrics.descent) as f64;
    let baseline_offset = (line_height as f64 - glyph_height) / 2.0 + metrics.ascent as f64;

    let corner_radius = (style.border_radius * scale)
        .min(box_width.min(box_height) as f64 / 2.0)
        .max(0.0);

    Ok(LayoutMetrics {
        lines,
        font_size,
        line_height,
        baseline_offset,
        padding,
        corner_radius,
        text_width,
        text_height,
        box_width,
        box_height,
    })
}

/// Greedy word wrap. Explicit line breaks always break; an overlong word
/// stays alone on its line.
fn wrap_text(text: &str, max_width: f64, measure: impl Fn(&str) -> f64) -> Vec<LayoutLine> {
    let mut lines = Vec::new();

    for segment in text.split('\n') {
        let segment = segment.strip_suffix('\r').unwrap_or(segment);
        let mut words = segment.split_whitespace();

        let Some(first) = words.next() else {
            lines.push(LayoutLine {
                text: String::new(),
                width: 0.0,
            });
            continue;
        };

        let mut current = first.to_string();
        let mut current_width = measure(&current);
        for word in words {
            let candidate = format!("{current} {word}");
            let candidate_width = measure(&candidate);
            if candidate_width > max_width {
                lines.push(LayoutLine {
                    text: std::mem::replace(&mut current, word.to_string()),
                    width: current_width,
                });
                current_width = measure(&current);
            } else {
                current = candidate;
                current_width = candidate_width;
            }
        }
        lines.push(LayoutLine {
            text: current,
            width: current_width,
        });
    }

    lines
}

/// Round up to the next even integer (encoder chroma subsampling needs
/// even dimensions).
fn even_ceil(value: f64) -> u32 {
    let n = value.max(0.0).ceil() as u32;
    (n + n % 2).max(2)
}
