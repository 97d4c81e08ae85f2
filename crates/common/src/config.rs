//! Application configuration.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Global application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Rendering pipeline settings.
    #[serde(default)]
    pub render: RenderConfig,

    /// Job queue and worker pool settings.
    #[serde(default)]
    pub queue: QueueConfig,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Rendering pipeline settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    /// Encoder executable (resolved once at worker startup).
    pub encoder_path: PathBuf,

    /// Media inspection executable.
    pub probe_path: PathBuf,

    /// Maximum number of overlays composited per encoder invocation.
    pub batch_size: usize,

    /// Parent directory for per-job scratch directories.
    pub temp_root: Option<PathBuf>,

    /// Directory searched for `<family>.ttf` / `<family>.otf`.
    pub fonts_dir: Option<PathBuf>,

    /// Font used when the requested family cannot be loaded.
    pub default_font: PathBuf,

    /// Output video codec.
    pub video_codec: String,

    /// Encoder preset.
    pub preset: String,

    /// Constant rate factor.
    pub crf: u8,
}

/// Job queue settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueConfig {
    /// Number of concurrent worker slots.
    pub workers: usize,

    /// Maximum job executions started per rate window.
    pub rate_limit_max: usize,

    /// Rate window length in milliseconds.
    pub rate_limit_window_ms: u64,

    /// Attempts per job, including the first.
    pub max_attempts: u32,

    /// Delay before the first retry; doubles for every further retry.
    pub backoff_initial_ms: u64,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level filter (e.g., "info", "debug", "subburn=debug,warn").
    pub level: String,

    /// Whether to output structured JSON logs.
    pub json: bool,

    /// Optional log file path.
    pub file: Option<PathBuf>,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            encoder_path: PathBuf::from("ffmpeg"),
            probe_path: PathBuf::from("ffprobe"),
            batch_size: 200,
            temp_root: None,
            fonts_dir: None,
            default_font: PathBuf::from("/usr/share/fonts/truetype/dejavu/DejaVuSans-Bold.ttf"),
            video_codec: "libx264".to_string(),
            preset: "veryfast".to_string(),
            crf: 20,
        }
    }
}

impl RenderConfig {
    /// Directory that per-job scratch directories are created in.
    pub fn temp_root(&self) -> PathBuf {
        self.temp_root.clone().unwrap_or_else(std::env::temp_dir)
    }
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            workers: 2,
            rate_limit_max: 10,
            rate_limit_window_ms: 1000,
            max_attempts: 3,
            backoff_initial_ms: 1000,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
            file: None,
        }
    }
}

impl AppConfig {
    /// Load config from the standard location, falling back to defaults.
    pub fn load() -> Self {
        Self::load_from(&config_file_path())
    }

    /// Load config from an explicit path, falling back to defaults.
    pub fn load_from(config_path: &Path) -> Self {
        if config_path.exists() {
            match std::fs::read_to_string(config_path) {
                Ok(content) => match serde_json::from_str(&content) {
                    Ok(config) => return config,
                    Err(e) => {
                        tracing::warn!("Failed to parse config at {:?}: {}", config_path, e);
                    }
                },
                Err(e) => {
                    tracing::warn!("Failed to read config at {:?}: {}", config_path, e);
                }
            }
        }
        Self::default()
    }

    /// Save config to the standard location.
    pub fn save(&self) -> Result<(), std::io::Error> {
        self.save_to(&config_file_path())
    }

    /// Save config to an explicit path.
    pub fn save_to(&self, config_path: &Path) -> Result<(), std::io::Error> {
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self).map_err(std::io::Error::other)?;
        std::fs::write(config_path, json)
    }
}

/// Standard config file location.
fn config_file_path() -> PathBuf {
    let base = std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
            PathBuf::from(home).join(".config")
        });
    base.join("subburn").join("config.json")
}
