//! Subburn CLI: burn styled captions into videos.
//!
//! Usage:
//!   subburn render <VIDEO> --cues <JSON> --style <JSON>   Render a captioned video
//!   subburn validate --cues <JSON> --style <JSON>         Validate cues and style
//!   subburn check                                         Check encoder and font availability

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use subburn_common::config::AppConfig;

mod commands;

#[derive(Parser)]
#[command(
    name = "subburn",
    about = "Burn styled, animated captions into video files",
    version,
    author
)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Config file (defaults to $XDG_CONFIG_HOME/subburn/config.json)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Burn captions into a video
    Render {
        /// Source video
        video: PathBuf,

        /// JSON file with an array of cues
        #[arg(long)]
        cues: PathBuf,

        /// JSON file with the caption style
        #[arg(long)]
        style: PathBuf,

        /// Output file path
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Override the configured batch size
        #[arg(long)]
        batch_size: Option<usize>,
    },

    /// Validate a cue file and style without rendering
    Validate {
        /// JSON file with an array of cues
        #[arg(long)]
        cues: PathBuf,

        /// JSON file with the caption style
        #[arg(long)]
        style: PathBuf,

        /// Print the summary as JSON
        #[arg(long)]
        json: bool,
    },

    /// Check encoder, probe and font availability
    Check,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => AppConfig::load_from(path),
        None => AppConfig::load(),
    };
    if cli.verbose {
        config.logging.level = "debug".to_string();
    }
    subburn_common::logging::init_logging(&config.logging);

    match cli.command {
        Commands::Render {
            video,
            cues,
            style,
            output,
            batch_size,
        } => {
            if let Some(batch_size) = batch_size {
                config.render.batch_size = batch_size;
            }
            commands::render::run(&config, video, cues, style, output).await
        }
        Commands::Validate { cues, style, json } => {
            commands::validate::run(&config, cues, style, json)
        }
        Commands::Check => commands::check::run(&config),
    }
}
