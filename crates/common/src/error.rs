//! Error types shared across subburn crates.

/// Top-level error type for subburn operations.
#[derive(Debug, thiserror::Error)]
pub enum SubburnError {
    #[error("Validation error: {message}")]
    Validation { message: String },

    #[error("Layout error: {message}")]
    Layout { message: String },

    #[error("Render error: {message}")]
    Render { message: String },

    #[error("Resource error: {message}")]
    Resource { message: String },

    #[error("Encoder error: {message}")]
    Encoder { message: String },

    #[error("Probe error: {message}")]
    Probe { message: String },

    #[error("Queue error: {message}")]
    Queue { message: String },

    #[error("Job not found: {id}")]
    JobNotFound { id: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Image(#[from] image::ImageError),
}

/// Result type alias using SubburnError.
pub type SubburnResult<T> = Result<T, SubburnError>;

impl SubburnError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
            message: msg.into(),
        }
    }

    pub fn layout(msg: impl Into<String>) -> Self {
        Self::Layout {
            message: msg.into(),
        }
    }

    pub fn render(msg: impl Into<String>) -> Self {
        Self::Render {
            message: msg.into(),
        }
    }

    pub fn resource(msg: impl Into<String>) -> Self {
        Self::Resource {
            message: msg.into(),
        }
    }

    pub fn encoder(msg: impl Into<String>) -> Self {
        Self::Encoder {
            message: msg.into(),
        }
    }

    pub fn probe(msg: impl Into<String>) -> Self {
        Self::Probe {
            message: msg.into(),
        }
    }

    pub fn queue(msg: impl Into<String>) -> Self {
        Self::Queue {
            message: msg.into(),
        }
    }

    /// Whether a job that failed with this error may be attempted again.
    ///
    /// Only failures of the external encoder/probe tools are transient.
    /// Validation, layout, rasterization and temp-file I/O failures would
    /// fail the same way on every attempt.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Encoder { .. } | Self::Probe { .. })
    }
}
