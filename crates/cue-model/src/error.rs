//! Validation errors for the cue model.

/// Errors raised while validating cues, styles and export requests.
#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    #[error("Invalid cue {id}: {message}")]
    InvalidCue { id: String, message: String },

    #[error("Invalid style: {message}")]
    InvalidStyle { message: String },

    #[error("Invalid color {value:?}: expected #rgb, #rrggbb, #rrggbbaa or transparent")]
    InvalidColor { value: String },

    #[error("Invalid request: {message}")]
    InvalidRequest { message: String },
}

impl ModelError {
    pub(crate) fn cue(id: &str, message: impl Into<String>) -> Self {
        Self::InvalidCue {
            id: id.to_string(),
            message: message.into(),
        }
    }

    pub(crate) fn style(message: impl Into<String>) -> Self {
        Self::InvalidStyle {
            message: message.into(),
        }
    }

    pub(crate) fn request(message: impl Into<String>) -> Self {
        Self::InvalidRequest {
            message: message.into(),
        }
    }
}
