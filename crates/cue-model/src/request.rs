//! The submit-export contract.

use base64::Engine;
use serde::{Deserialize, Serialize};

use crate::cue::{validate_cues, Cue};
use crate::error::ModelError;
use crate::style::Style;

/// An export request as received from the editor.
///
/// JSON callers send the video as `videoBase64`; in-process callers can
/// hand over raw bytes with [`SubmitRequest::from_bytes`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub video_base64: Option<String>,

    #[serde(skip)]
    pub video: Option<Vec<u8>>,

    pub cues: Vec<Cue>,

    pub style: Style,
}

impl SubmitRequest {
    pub fn from_bytes(video: Vec<u8>, cues: Vec<Cue>, style: Style) -> Self {
        Self {
            video_base64: None,
            video: Some(video),
            cues,
            style,
        }
    }

    /// Decode and validate into a render input.
    ///
    /// Every check runs before a job exists, so a rejected request never
    /// reaches the queue.
    pub fn into_input(self) -> Result<RenderInput, ModelError> {
        let video = match (self.video, self.video_base64) {
            (Some(bytes), _) => bytes,
            (None, Some(encoded)) => decode_video_base64(&encoded)?,
            (None, None) => {
                return Err(ModelError::request("no video provided"));
            }
        };
        RenderInput::new(video, self.cues, self.style)
    }
}

/// Validated input of one render job. Immutable for the job's lifetime.
#[derive(Debug, Clone)]
pub struct RenderInput {
    pub video: Vec<u8>,
    pub cues: Vec<Cue>,
    pub style: Style,
}

impl RenderInput {
    pub fn new(video: Vec<u8>, cues: Vec<Cue>, style: Style) -> Result<Self, ModelError> {
        if video.is_empty() {
            return Err(ModelError::request("video is empty"));
        }
        style.validate()?;
        validate_cues(&cues)?;
        Ok(Self { video, cues, style })
    }
}

/// Decode base64 video, accepting an optional `data:` URL prefix.
fn decode_video_base64(encoded: &str) -> Result<Vec<u8>, ModelError> {
    let payload = match encoded.find("base64,") {
        Some(idx) if encoded.starts_with("data:") => &encoded[idx + "base64,".len()..],
        _ => encoded,
    };
    base64::engine::general_purpose::STANDARD
        .decode(payload.trim())
        .map_err(|e| ModelError::request(format!("videoBase64 is not valid base64: {e}")))
}
