//! Validate a cue file and style without rendering.

use std::path::PathBuf;

use serde::Serialize;
use subburn_common::config::AppConfig;
use subburn_cue_model::{validate_cues, Cue, Style};
use subburn_render_engine::{effects, plan_batches};

use super::{load_cues, load_style};

/// What a render of these cues would do.
#[derive(Debug, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ValidationSummary {
    pub cues: usize,
    pub sub_cues: usize,
    pub batches: usize,
    pub batch_size: usize,
}

pub fn run(config: &AppConfig, cues: PathBuf, style: PathBuf, json: bool) -> anyhow::Result<()> {
    let cue_list = load_cues(&cues)?;
    let style = load_style(&style)?;

    if !json {
        println!("Validating cues at: {}", cues.display());
    }

    let summary = summarize(&cue_list, &style, config.render.batch_size)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
        return Ok(());
    }

    println!("  Cues: {}", summary.cues);
    println!("  Effect: {:?}", style.effect_type);
    println!("  Sub-cues after expansion: {}", summary.sub_cues);
    println!(
        "  Encoder passes: {} (batch size {})",
        summary.batches, summary.batch_size
    );
    println!("\nCues and style are valid.");
    Ok(())
}

/// Run the submit-time checks and count the work a render would do.
pub fn summarize(
    cues: &[Cue],
    style: &Style,
    batch_size: usize,
) -> anyhow::Result<ValidationSummary> {
    style
        .validate()
        .map_err(|e| anyhow::anyhow!("Invalid style: {e}"))?;
    validate_cues(cues).map_err(|e| anyhow::anyhow!("Invalid cues: {e}"))?;

    let sub_cues: usize = cues
        .iter()
        .map(|cue| effects::expand(cue, style.effect_type).len())
        .sum();

    Ok(ValidationSummary {
        cues: cues.len(),
        sub_cues,
        batches: plan_batches(sub_cues, batch_size).len(),
        batch_size,
    })
}
