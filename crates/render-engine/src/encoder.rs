//! External video encoder boundary.
//!
//! The pipeline never spawns processes directly; it talks to a
//! [`RenderBackend`] that can probe a video and run one overlay pass. The
//! production backend drives `ffmpeg`/`ffprobe`; tests substitute a fake.

use std::io::{BufRead, BufReader, Read};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdout, Command, Stdio};
use std::thread::JoinHandle;
use std::time::Instant;

use serde::Deserialize;
use subburn_common::config::RenderConfig;
use subburn_common::error::{SubburnError, SubburnResult};

/// Lines of encoder stderr kept in failure messages.
const STDERR_TAIL_LINES: usize = 20;

/// Seconds without progress before a stall warning is logged.
const STALL_WARNING_SECS: u64 = 10;

/// Basic properties of an input video.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VideoInfo {
    pub width: u32,
    pub height: u32,
    /// Container duration, `0.0` when unknown.
    pub duration_secs: f64,
}

/// One overlay pass: composite `overlays` onto `input_video` using
/// `filter_graph` and write `output`.
#[derive(Debug, Clone, PartialEq)]
pub struct EncodeInvocation {
    pub input_video: PathBuf,
    /// Image inputs, in encoder input order starting at index 1.
    pub overlays: Vec<PathBuf>,
    pub filter_graph: String,
    pub output_label: String,
    pub output: PathBuf,
    /// Expected output duration, used to turn encoder time into a fraction.
    pub duration_secs: f64,
}

/// Fractions in `[0, 1]` reported while an encode runs.
///
/// The stream ends after the encoder exits. A failed exit is reported as a
/// final `Err` item. Dropping the stream early terminates the encoder.
pub type ProgressStream = Box<dyn Iterator<Item = SubburnResult<f64>> + Send>;

/// Trait for encoder backends.
pub trait RenderBackend: Send + Sync {
    /// Backend name.
    fn name(&self) -> &str;

    /// Check if this backend is available on the system.
    fn is_available(&self) -> bool;

    /// Read dimensions and duration of `path`.
    fn probe(&self, path: &Path) -> SubburnResult<VideoInfo>;

    /// Start an overlay pass.
    fn encode(&self, invocation: &EncodeInvocation) -> SubburnResult<ProgressStream>;
}

/// `ffmpeg`/`ffprobe` backend.
#[derive(Debug, Clone)]
pub struct FfmpegBackend {
    encoder_path: PathBuf,
    probe_path: PathBuf,
    video_codec: String,
    preset: String,
    crf: u8,
}

impl FfmpegBackend {
    pub fn from_config(config: &RenderConfig) -> Self {
        Self {
            encoder_path: config.encoder_path.clone(),
            probe_path: config.probe_path.clone(),
            video_codec: config.video_codec.clone(),
            preset: config.preset.clone(),
            crf: config.crf,
        }
    }

    /// Full argument list for one overlay pass.
    pub fn encode_args(&self, invocation: &EncodeInvocation) -> Vec<String> {
        let mut args: Vec<String> = [
            "-y",
            "-hide_banner",
            "-loglevel",
            "error",
            "-nostats",
            "-progress",
            "pipe:1",
            "-i",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect();
        args.push(invocation.input_video.display().to_string());

        for overlay in &invocation.overlays {
            args.push("-i".to_string());
            args.push(overlay.display().to_string());
        }

        args.extend([
            "-filter_complex".to_string(),
            invocation.filter_graph.clone(),
            "-map".to_string(),
            format!("[{}]", invocation.output_label),
            "-map".to_string(),
            "0:a?".to_string(),
            "-c:v".to_string(),
            self.video_codec.clone(),
            "-preset".to_string(),
            self.preset.clone(),
            "-crf".to_string(),
            self.crf.to_string(),
            "-pix_fmt".to_string(),
            "yuv420p".to_string(),
            "-c:a".to_string(),
            "copy".to_string(),
            "-movflags".to_string(),
            "+faststart".to_string(),
        ]);
        args.push(invocation.output.display().to_string());
        args
    }
}

impl RenderBackend for FfmpegBackend {
    fn name(&self) -> &str {
        "ffmpeg"
    }

    fn is_available(&self) -> bool {
        command_exists(&self.encoder_path) && command_exists(&self.probe_path)
    }

    fn probe(&self, path: &Path) -> SubburnResult<VideoInfo> {
        let output = Command::new(&self.probe_path)
            .args([
                "-v",
                "error",
                "-select_streams",
                "v:0",
                "-show_entries",
                "stream=width,height:format=duration",
                "-of",
                "json",
            ])
            .arg(path)
            .output()
            .map_err(|e| {
                SubburnError::probe(format!(
                    "Failed to start {}: {e}",
                    self.probe_path.display()
                ))
            })?;

        if !output.status.success() {
            return Err(SubburnError::probe(format!(
                "ffprobe failed (status {}): {}",
                output.status,
                stderr_tail(&String::from_utf8_lossy(&output.stderr))
            )));
        }

        parse_probe_output(&output.stdout)
    }

    fn encode(&self, invocation: &EncodeInvocation) -> SubburnResult<ProgressStream> {
        let args = self.encode_args(invocation);
        tracing::debug!(args = ?args, "Running ffmpeg");
        let mut cmd = Command::new(&self.encoder_path);
        cmd.args(&args);
        let progress = FfmpegProgress::spawn(cmd, invocation.duration_secs)?;
        Ok(Box::new(progress))
    }
}

#[derive(Debug, Deserialize)]
struct ProbeOutput {
    #[serde(default)]
    streams: Vec<ProbeStream>,
    format: Option<ProbeFormat>,
}

#[derive(Debug, Deserialize)]
struct ProbeStream {
    width: Option<u32>,
    height: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct ProbeFormat {
    duration: Option<String>,
}

fn parse_probe_output(stdout: &[u8]) -> SubburnResult<VideoInfo> {
    let parsed: ProbeOutput = serde_json::from_slice(stdout)
        .map_err(|e| SubburnError::probe(format!("Unreadable ffprobe output: {e}")))?;

    let stream = parsed
        .streams
        .first()
        .ok_or_else(|| SubburnError::probe("Input has no video stream"))?;
    let (width, height) = match (stream.width, stream.height) {
        (Some(w), Some(h)) if w > 0 && h > 0 => (w, h),
        _ => return Err(SubburnError::probe("Video stream has no dimensions")),
    };

    let duration_secs = parsed
        .format
        .and_then(|f| f.duration)
        .and_then(|d| d.trim().parse::<f64>().ok())
        .filter(|d| d.is_finite() && *d > 0.0)
        .unwrap_or(0.0);

    Ok(VideoInfo {
        width,
        height,
        duration_secs,
    })
}

/// Progress reader over a running encoder process.
pub struct FfmpegProgress {
    child: Child,
    reader: BufReader<ChildStdout>,
    stderr_task: Option<JoinHandle<String>>,
    state: ProgressState,
    duration_secs: f64,
    started: Instant,
    last_advance: Instant,
    last_out_time: f64,
    line: String,
    finished: bool,
}

impl FfmpegProgress {
    /// Spawn `cmd` with piped stdout/stderr and start reading its
    /// `-progress` output.
    pub fn spawn(mut cmd: Command, duration_secs: f64) -> SubburnResult<Self> {
        cmd.stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        let mut child = cmd
            .spawn()
            .map_err(|e| SubburnError::encoder(format!("Failed to start ffmpeg: {e}")))?;
        tracing::info!(pid = child.id(), duration_secs, "ffmpeg process started");

        let stdout = match child.stdout.take() {
            Some(stdout) => stdout,
            None => {
                reap(&mut child);
                return Err(SubburnError::encoder("Failed to capture ffmpeg stdout"));
            }
        };
        let Some(stderr) = child.stderr.take() else {
            reap(&mut child);
            return Err(SubburnError::encoder("Failed to capture ffmpeg stderr"));
        };

        // Drain stderr concurrently so the encoder never blocks on a full pipe.
        let stderr_task = std::thread::spawn(move || -> String {
            let mut reader = BufReader::new(stderr);
            let mut output = String::new();
            match reader.read_to_string(&mut output) {
                Ok(_) => output,
                Err(err) => format!("<failed to read ffmpeg stderr: {err}>"),
            }
        });

        let now = Instant::now();
        Ok(Self {
            child,
            reader: BufReader::new(stdout),
            stderr_task: Some(stderr_task),
            state: ProgressState::default(),
            duration_secs,
            started: now,
            last_advance: now,
            last_out_time: 0.0,
            line: String::new(),
            finished: false,
        })
    }

    fn fraction(&self) -> f64 {
        if self.state.complete {
            1.0
        } else if self.duration_secs <= 0.0 {
            0.0
        } else {
            (self.state.out_time_secs / self.duration_secs).clamp(0.0, 1.0)
        }
    }

    fn finish(&mut self) -> Option<SubburnResult<f64>> {
        self.finished = true;

        let status = match self.child.wait() {
            Ok(status) => status,
            Err(e) => {
                return Some(Err(SubburnError::encoder(format!(
                    "Failed to wait on ffmpeg: {e}"
                ))))
            }
        };
        let stderr_output = self
            .stderr_task
            .take()
            .map(|task| {
                task.join()
                    .unwrap_or_else(|_| "<failed to join stderr reader>".to_string())
            })
            .unwrap_or_default();

        tracing::debug!(
            status = %status,
            elapsed_secs = self.started.elapsed().as_secs_f64(),
            "ffmpeg process exited"
        );

        if status.success() {
            None
        } else {
            Some(Err(SubburnError::encoder(format!(
                "ffmpeg failed (status {status}): {}",
                stderr_tail(&stderr_output)
            ))))
        }
    }
}

impl Iterator for FfmpegProgress {
    type Item = SubburnResult<f64>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }

        loop {
            self.line.clear();
            let bytes = match self.reader.read_line(&mut self.line) {
                Ok(bytes) => bytes,
                Err(e) => {
                    reap(&mut self.child);
                    self.finished = true;
                    return Some(Err(SubburnError::encoder(format!(
                        "Failed reading ffmpeg progress: {e}"
                    ))));
                }
            };
            if bytes == 0 {
                return self.finish();
            }

            let Some((key, value)) = self.line.trim().split_once('=') else {
                continue;
            };
            let is_report = key == "progress";
            self.state.update(key, value);
            if !is_report {
                continue;
            }

            if self.state.out_time_secs > self.last_out_time + 0.001 {
                self.last_out_time = self.state.out_time_secs;
                self.last_advance = Instant::now();
            } else if self.last_advance.elapsed().as_secs() >= STALL_WARNING_SECS {
                tracing::warn!(
                    out_time_secs = self.state.out_time_secs,
                    elapsed_secs = self.started.elapsed().as_secs_f64(),
                    "No ffmpeg progress advancement for {STALL_WARNING_SECS}s"
                );
                self.last_advance = Instant::now();
            }
            return Some(Ok(self.fraction()));
        }
    }
}

impl Drop for FfmpegProgress {
    fn drop(&mut self) {
        if !self.finished {
            tracing::debug!(pid = self.child.id(), "Terminating abandoned ffmpeg process");
            reap(&mut self.child);
        }
    }
}

fn reap(child: &mut Child) {
    let _ = child.kill();
    let _ = child.wait();
}

#[derive(Debug, Default)]
struct ProgressState {
    out_time_secs: f64,
    complete: bool,
}

impl ProgressState {
    fn update(&mut self, key: &str, value: &str) {
        match key {
            // ffmpeg reports microseconds under both keys
            "out_time_ms" | "out_time_us" => {
                if let Ok(us) = value.trim().parse::<f64>() {
                    self.out_time_secs = us / 1_000_000.0;
                }
            }
            "progress" => {
                self.complete = value.trim() == "end";
            }
            _ => {}
        }
    }
}

/// Last lines of a tool's stderr, for error messages.
fn stderr_tail(stderr: &str) -> String {
    let lines: Vec<&str> = stderr.trim().lines().collect();
    let start = lines.len().saturating_sub(STDERR_TAIL_LINES);
    lines[start..].join("\n")
}

/// Whether `binary` can be executed.
pub fn command_exists(binary: &Path) -> bool {
    Command::new(binary)
        .arg("-version")
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map(|status| status.success())
        .unwrap_or(false)
}
