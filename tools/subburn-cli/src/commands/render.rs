//! Burn captions into a video.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use subburn_common::config::AppConfig;
use subburn_cue_model::SubmitRequest;
use subburn_job_queue::{JobQueue, JobStatus};
use subburn_render_engine::RenderPipeline;

use super::{load_cues, load_style};

const POLL_INTERVAL: Duration = Duration::from_millis(250);

pub async fn run(
    config: &AppConfig,
    video: PathBuf,
    cues: PathBuf,
    style: PathBuf,
    output: Option<PathBuf>,
) -> anyhow::Result<()> {
    println!("Rendering captions into: {}", video.display());

    let bytes = std::fs::read(&video)
        .with_context(|| format!("Failed to read video {}", video.display()))?;
    let cue_list = load_cues(&cues)?;
    let style = load_style(&style)?;
    let output_path = output.unwrap_or_else(|| default_output_path(&video));

    println!("  Output: {}", output_path.display());
    println!("  Cues: {}", cue_list.len());
    println!("  Effect: {:?}", style.effect_type);

    let pipeline = Arc::new(RenderPipeline::from_config(&config.render));
    if !pipeline.backend().is_available() {
        return Err(anyhow::anyhow!(
            "{} backend unavailable; run `subburn check` for details",
            pipeline.backend().name()
        ));
    }
    let queue = JobQueue::start(&config.queue, pipeline);
    let id = queue.submit(SubmitRequest::from_bytes(bytes, cue_list, style))?;
    tracing::debug!(job_id = %id, "Submitted render job");

    let outcome = loop {
        let snapshot = queue.status(&id)?;
        match snapshot.status {
            JobStatus::Completed | JobStatus::Failed => break snapshot,
            JobStatus::Active => print!(
                "\r  Progress: {:5.1}% (attempt {})  ",
                snapshot.progress, snapshot.attempts
            ),
            JobStatus::Waiting => print!("\r  Waiting (attempts so far: {})  ", snapshot.attempts),
        }
        std::io::stdout().flush().ok();
        tokio::time::sleep(POLL_INTERVAL).await;
    };
    queue.remove(&id)?;
    queue.shutdown().await;

    match (outcome.status, outcome.result) {
        (JobStatus::Completed, Some(result)) => {
            if let Some(parent) = output_path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(&output_path, result.as_slice())
                .with_context(|| format!("Failed to write {}", output_path.display()))?;
            println!("\nRender complete: {}", output_path.display());
            Ok(())
        }
        _ => {
            let reason = outcome
                .failure_reason
                .unwrap_or_else(|| "unknown error".to_string());
            println!("\nRender failed after {} attempt(s)", outcome.attempts);
            Err(anyhow::anyhow!("Render failed: {reason}"))
        }
    }
}

/// `clip.mp4` -> `clip.subtitled.mp4` next to the source.
fn default_output_path(video: &Path) -> PathBuf {
    let stem = video
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "output".to_string());
    video.with_file_name(format!("{stem}.subtitled.mp4"))
}
