#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use subburn_common::config::RenderConfig;
use subburn_common::error::{SubburnError, SubburnResult};
use subburn_render_engine::encoder::{EncodeInvocation, ProgressStream, RenderBackend, VideoInfo};
use subburn_render_engine::fonts::{FontRegistry, LineMetrics, Typeface};
use subburn_render_engine::RenderPipeline;

/// Fixed-advance face so layouts do not depend on installed fonts.
pub struct MonoFace;

impl Typeface for MonoFace {
    fn name(&self) -> &str {
        "mono"
    }

    fn line_metrics(&self, px: f32) -> LineMetrics {
        LineMetrics {
            ascent: px * 0.75,
            descent: px * 0.25,
        }
    }

    fn measure(&self, text: &str, px: f32) -> f32 {
        text.chars().count() as f32 * px * 0.6
    }

    fn draw(&self, text: &str, px: f32, x: f32, baseline: f32, plot: &mut dyn FnMut(i32, i32, f32)) {
        let advance = px * 0.6;
        for (i, c) in text.chars().enumerate() {
            if c.is_whitespace() {
                continue;
            }
            let left = (x + i as f32 * advance) as i32;
            for row in (baseline - px * 0.7) as i32..baseline as i32 {
                for col in left..left + (advance * 0.7) as i32 {
                    plot(col, row, 1.0);
                }
            }
        }
    }
}

/// What the fake encoder saw on one invocation.
#[derive(Debug, Clone)]
pub struct Observed {
    pub invocation: EncodeInvocation,
    /// Videos present in the job directory once this pass wrote its output.
    pub live_videos: usize,
    /// Every overlay input existed and decoded as an RGBA PNG.
    pub overlays_valid: bool,
}

/// Encoder stand-in: copies the input video to the output and reports
/// `0.5` then `1.0`. Can be told to fail specific invocations.
pub struct FakeBackend {
    pub info: VideoInfo,
    fail_on: Vec<usize>,
    observed: Mutex<Vec<Observed>>,
}

impl FakeBackend {
    pub fn new(width: u32, height: u32, duration_secs: f64) -> Self {
        Self {
            info: VideoInfo {
                width,
                height,
                duration_secs,
            },
            fail_on: Vec::new(),
            observed: Mutex::new(Vec::new()),
        }
    }

    /// Fail the `n`-th encode call (1-based, counted across all jobs).
    pub fn failing_on(mut self, n: usize) -> Self {
        self.fail_on.push(n);
        self
    }

    pub fn observed(&self) -> Vec<Observed> {
        self.observed.lock().unwrap().clone()
    }
}

impl RenderBackend for FakeBackend {
    fn name(&self) -> &str {
        "fake"
    }

    fn is_available(&self) -> bool {
        true
    }

    fn probe(&self, path: &Path) -> SubburnResult<VideoInfo> {
        if !path.is_file() {
            return Err(SubburnError::probe(format!("{} missing", path.display())));
        }
        Ok(self.info)
    }

    fn encode(&self, invocation: &EncodeInvocation) -> SubburnResult<ProgressStream> {
        let overlays_valid = invocation.overlays.iter().all(|path| {
            image::open(path)
                .map(|img| img.color().has_alpha())
                .unwrap_or(false)
        });

        std::fs::write(&invocation.output, std::fs::read(&invocation.input_video)?)?;
        let live_videos = count_with_ext(invocation.output.parent(), "mp4");

        let mut observed = self.observed.lock().unwrap();
        observed.push(Observed {
            invocation: invocation.clone(),
            live_videos,
            overlays_valid,
        });

        if self.fail_on.contains(&observed.len()) {
            let items: Vec<SubburnResult<f64>> = vec![
                Ok(0.5),
                Err(SubburnError::encoder("ffmpeg failed (status 1): simulated")),
            ];
            return Ok(Box::new(items.into_iter()));
        }

        Ok(Box::new(vec![Ok(0.5), Ok(1.0)].into_iter()))
    }
}

fn count_with_ext(dir: Option<&Path>, ext: &str) -> usize {
    dir.and_then(|dir| std::fs::read_dir(dir).ok())
        .map(|entries| {
            entries
                .filter_map(Result::ok)
                .filter(|e| e.path().extension().is_some_and(|x| x == ext))
                .count()
        })
        .unwrap_or(0)
}

pub fn fonts() -> Arc<FontRegistry> {
    Arc::new(
        FontRegistry::new(None, PathBuf::from("/nonexistent/default.ttf"))
            .with_default_face(Arc::new(MonoFace)),
    )
}

pub fn config(temp_root: &Path, batch_size: usize) -> RenderConfig {
    RenderConfig {
        temp_root: Some(temp_root.to_path_buf()),
        batch_size,
        ..RenderConfig::default()
    }
}

pub fn pipeline(backend: Arc<FakeBackend>, temp_root: &Path, batch_size: usize) -> RenderPipeline {
    RenderPipeline::new(backend, fonts(), config(temp_root, batch_size))
}

/// Everything left under `root`, recursively.
pub fn leftover_files(root: &Path) -> Vec<PathBuf> {
    let mut found = Vec::new();
    let mut stack = vec![root.to_path_buf()];
    while let Some(dir) = stack.pop() {
        let Ok(entries) = std::fs::read_dir(&dir) else {
            continue;
        };
        for entry in entries.filter_map(Result::ok) {
            let path = entry.path();
            if path.is_dir() {
                stack.push(path.clone());
            }
            found.push(path);
        }
    }
    found
}
