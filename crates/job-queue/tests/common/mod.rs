#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use subburn_common::config::{QueueConfig, RenderConfig};
use subburn_common::error::{SubburnError, SubburnResult};
use subburn_cue_model::request::RenderInput;
use subburn_job_queue::JobHandler;
use subburn_render_engine::encoder::{EncodeInvocation, ProgressStream, RenderBackend, VideoInfo};
use subburn_render_engine::fonts::{FontRegistry, LineMetrics, Typeface};
use subburn_render_engine::RenderPipeline;

pub const POLL: Duration = Duration::from_millis(5);

pub fn fast_queue(workers: usize, max_attempts: u32) -> QueueConfig {
    QueueConfig {
        workers,
        rate_limit_max: 100,
        rate_limit_window_ms: 1000,
        max_attempts,
        backoff_initial_ms: 10,
    }
}

struct SquareFace;

impl Typeface for SquareFace {
    fn name(&self) -> &str {
        "square"
    }

    fn line_metrics(&self, px: f32) -> LineMetrics {
        LineMetrics {
            ascent: px * 0.8,
            descent: px * 0.2,
        }
    }

    fn measure(&self, text: &str, px: f32) -> f32 {
        text.chars().count() as f32 * px * 0.5
    }

    fn draw(&self, text: &str, px: f32, x: f32, baseline: f32, plot: &mut dyn FnMut(i32, i32, f32)) {
        let width = self.measure(text, px) as i32;
        for row in (baseline - px * 0.6) as i32..baseline as i32 {
            for col in x as i32..x as i32 + width {
                plot(col, row, 1.0);
            }
        }
    }
}

/// Encoder stand-in that copies its input and fails chosen invocations
/// (1-based, counted over the backend's lifetime).
pub struct CopyBackend {
    fail_on: Vec<usize>,
    calls: AtomicUsize,
}

impl CopyBackend {
    pub fn new() -> Self {
        Self::failing_on(&[])
    }

    pub fn failing_on(calls: &[usize]) -> Self {
        Self {
            fail_on: calls.to_vec(),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl RenderBackend for CopyBackend {
    fn name(&self) -> &str {
        "copy"
    }

    fn is_available(&self) -> bool {
        true
    }

    fn probe(&self, _path: &Path) -> SubburnResult<VideoInfo> {
        Ok(VideoInfo {
            width: 1280,
            height: 720,
            duration_secs: 10.0,
        })
    }

    fn encode(&self, invocation: &EncodeInvocation) -> SubburnResult<ProgressStream> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        std::fs::copy(&invocation.input_video, &invocation.output)?;
        if self.fail_on.contains(&call) {
            let items: Vec<SubburnResult<f64>> = vec![
                Ok(0.3),
                Err(SubburnError::encoder("ffmpeg failed (status 1): simulated crash")),
            ];
            return Ok(Box::new(items.into_iter()));
        }
        Ok(Box::new(vec![Ok(0.5), Ok(1.0)].into_iter()))
    }
}

pub fn pipeline(backend: Arc<CopyBackend>, temp_root: &Path, batch_size: usize) -> RenderPipeline {
    let fonts = FontRegistry::new(None, PathBuf::from("/nonexistent/default.ttf"))
        .with_default_face(Arc::new(SquareFace));
    let config = RenderConfig {
        temp_root: Some(temp_root.to_path_buf()),
        batch_size,
        ..RenderConfig::default()
    };
    RenderPipeline::new(backend, Arc::new(fonts), config)
}

/// Outcome a [`ScriptedHandler`] produces on one attempt.
#[derive(Debug, Clone, Copy)]
pub enum Step {
    Succeed,
    FailRetryable,
    FailFatal,
    Panic,
}

/// Handler that plays back a fixed script of outcomes, repeating the last.
pub struct ScriptedHandler {
    script: Vec<Step>,
    delay: Duration,
    calls: Mutex<Vec<Instant>>,
}

impl ScriptedHandler {
    pub fn new(script: Vec<Step>) -> Self {
        Self {
            script,
            delay: Duration::ZERO,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn call_times(&self) -> Vec<Instant> {
        self.calls.lock().unwrap().clone()
    }
}

impl JobHandler for ScriptedHandler {
    fn handle(
        &self,
        _job_id: &str,
        input: &RenderInput,
        progress: &dyn Fn(f64),
    ) -> SubburnResult<Vec<u8>> {
        let step = {
            let mut calls = self.calls.lock().unwrap();
            calls.push(Instant::now());
            let index = (calls.len() - 1).min(self.script.len() - 1);
            self.script[index]
        };
        progress(25.0);
        std::thread::sleep(self.delay);
        progress(75.0);

        match step {
            Step::Succeed => Ok(input.video.clone()),
            Step::FailRetryable => Err(SubburnError::encoder("exit status 1")),
            Step::FailFatal => Err(SubburnError::render("composition graph mismatch")),
            Step::Panic => panic!("handler exploded"),
        }
    }
}
