//! Caption style applied uniformly to every cue of one export.

use serde::{Deserialize, Serialize};

use crate::color::Color;
use crate::error::ModelError;

/// Vertical placement of the caption box.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Position {
    Top,
    Middle,
    #[default]
    Bottom,
    /// Absolute placement from `customX`/`customY` (preview coordinates).
    Custom,
}

/// Word-level animation mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum EffectType {
    /// Whole cue shown for its full window.
    #[default]
    None,
    /// Text accumulates word by word ("typewriter").
    CumulativePopOn,
    /// Only the currently spoken word is shown.
    WordByWord,
}

impl EffectType {
    pub fn is_animated(&self) -> bool {
        !matches!(self, EffectType::None)
    }
}

/// How animated fragments are sized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnimationCanvas {
    /// Each fragment gets a box fitted to its own text.
    #[default]
    Fit,
    /// Every fragment of a cue is drawn inside the full cue text's box.
    Fixed,
}

/// Style descriptor for one export job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Style {
    pub font_family: String,

    /// Font size in preview pixels.
    pub font_size: f64,

    pub text_color: Color,

    /// Box background; `transparent` disables the box.
    pub bg_color: Color,

    /// Background opacity in `[0, 1]`.
    pub bg_opacity: f64,

    /// Corner radius in preview pixels.
    #[serde(default)]
    pub border_radius: f64,

    #[serde(default)]
    pub position: Position,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_x: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_y: Option<f64>,

    #[serde(default)]
    pub effect_type: EffectType,

    #[serde(default)]
    pub animation_canvas: AnimationCanvas,
}

impl Default for Style {
    fn default() -> Self {
        Self {
            font_family: "DejaVu Sans".to_string(),
            font_size: 24.0,
            text_color: Color::WHITE,
            bg_color: Color::BLACK,
            bg_opacity: 0.6,
            border_radius: 8.0,
            position: Position::Bottom,
            custom_x: None,
            custom_y: None,
            effect_type: EffectType::None,
            animation_canvas: AnimationCanvas::Fit,
        }
    }
}

impl Style {
    /// Check field ranges and the custom-position pairing rule.
    pub fn validate(&self) -> Result<(), ModelError> {
        if self.font_family.trim().is_empty() {
            return Err(ModelError::style("fontFamily must not be empty"));
        }
        if !self.font_size.is_finite() || self.font_size <= 0.0 {
            return Err(ModelError::style(format!(
                "fontSize must be positive, got {}",
                self.font_size
            )));
        }
        if self.text_color.is_transparent() {
            return Err(ModelError::style("textColor cannot be transparent"));
        }
        if !self.bg_opacity.is_finite() || !(0.0..=1.0).contains(&self.bg_opacity) {
            return Err(ModelError::style(format!(
                "bgOpacity must be within [0, 1], got {}",
                self.bg_opacity
            )));
        }
        if !self.border_radius.is_finite() || self.border_radius < 0.0 {
            return Err(ModelError::style(format!(
                "borderRadius must be non-negative, got {}",
                self.border_radius
            )));
        }

        match (self.custom_x, self.custom_y) {
            (Some(x), Some(y)) => {
                if !x.is_finite() || !y.is_finite() {
                    return Err(ModelError::style("customX/customY must be finite"));
                }
            }
            (None, None) => {
                if self.position == Position::Custom {
                    return Err(ModelError::style(
                        "position 'custom' requires customX and customY",
                    ));
                }
            }
            _ => {
                return Err(ModelError::style(
                    "customX and customY must be provided together",
                ));
            }
        }

        Ok(())
    }

    /// Custom placement in preview coordinates, if this style uses it.
    pub fn custom_origin(&self) -> Option<(f64, f64)> {
        match (self.position, self.custom_x, self.custom_y) {
            (Position::Custom, Some(x), Some(y)) => Some((x, y)),
            _ => None,
        }
    }
}
