pub mod check;
pub mod render;
pub mod validate;

use std::path::Path;

use anyhow::Context;
use subburn_cue_model::{Cue, Style};

/// Read a JSON array of cues.
pub fn load_cues(path: &Path) -> anyhow::Result<Vec<Cue>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read cues from {}", path.display()))?;
    serde_json::from_str(&content)
        .with_context(|| format!("Invalid cue file {}", path.display()))
}

/// Read a caption style object.
pub fn load_style(path: &Path) -> anyhow::Result<Style> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read style from {}", path.display()))?;
    serde_json::from_str(&content)
        .with_context(|| format!("Invalid style file {}", path.display()))
}
