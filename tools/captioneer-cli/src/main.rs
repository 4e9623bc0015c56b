//! Captioneer CLI: caption segmentation, media probing, and rendering.
//!
//! Usage:
//!   captioneer segment <WORDS>   Pack word timings into caption lines
//!   captioneer render <PATH>     Render a project to video
//!   captioneer probe <MEDIA>     Show tracks and orientation of a media file
//!   captioneer init <NAME>       Create a project bundle for a clip
//!   captioneer validate <PATH>   Validate a project bundle
//!   captioneer check             Check for ffmpeg and ffprobe

use std::path::PathBuf;

use captioneer_common::config::AppConfig;
use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(
    name = "captioneer",
    about = "Caption layout and burn-in rendering for short-form video",
    version,
    author
)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Pack word timings into width-bounded caption lines
    Segment {
        /// JSON file holding an array of {text, start, end} word timings
        words: PathBuf,

        /// Maximum line width in pixels (defaults to the configured ratio of the render width)
        #[arg(long)]
        max_width: Option<f64>,

        /// Font size used to measure lines
        #[arg(long, default_value = "56")]
        font_size: f64,

        /// Target reading speed in characters per second
        #[arg(long)]
        cps: Option<f64>,

        /// Output format: json|srt|vtt
        #[arg(long, default_value = "json")]
        format: String,

        /// Output file (stdout when omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Append the lines as cues to this project's captions
        #[arg(long)]
        project: Option<PathBuf>,
    },

    /// Render a project to video
    Render {
        /// Path to the project directory
        path: PathBuf,

        /// Output file path
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Output width in the source's natural axes
        #[arg(long)]
        width: Option<u32>,

        /// Output height in the source's natural axes
        #[arg(long)]
        height: Option<u32>,

        /// Output format: mp4-h264|mp4-h265|webm
        #[arg(long)]
        format: Option<String>,

        /// Also write the captions as an SRT/VTT sidecar
        #[arg(long)]
        subtitles: Option<PathBuf>,
    },

    /// Show tracks, duration and orientation of a media file
    Probe {
        /// Media file to inspect
        media: PathBuf,
    },

    /// Create a new project for a source clip
    Init {
        /// Project name
        name: String,

        /// Source video copied into the project
        #[arg(short, long)]
        source: PathBuf,

        /// Output directory
        #[arg(short, long, default_value = ".")]
        output: PathBuf,

        /// Output width in the source's natural axes
        #[arg(long)]
        width: Option<u32>,

        /// Output height in the source's natural axes
        #[arg(long)]
        height: Option<u32>,
    },

    /// Validate a project bundle
    Validate {
        /// Path to the project directory
        path: PathBuf,
    },

    /// Check system capabilities
    Check,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = AppConfig::load();

    // Initialize logging
    let mut logging = config.logging.clone();
    if cli.verbose {
        logging.level = "debug".to_string();
    }
    captioneer_common::logging::init_logging(&logging);

    match cli.command {
        Commands::Segment {
            words,
            max_width,
            font_size,
            cps,
            format,
            output,
            project,
        } => commands::segment::run(
            &config,
            commands::segment::SegmentArgs {
                words,
                max_width,
                font_size,
                cps,
                format,
                output,
                project,
            },
        ),
        Commands::Render {
            path,
            output,
            width,
            height,
            format,
            subtitles,
        } => commands::render::run(&config, path, output, width, height, format, subtitles).await,
        Commands::Probe { media } => commands::probe::run(&config, media).await,
        Commands::Init {
            name,
            source,
            output,
            width,
            height,
        } => commands::init::run(&config, name, source, output, width, height).await,
        Commands::Validate { path } => commands::validate::run(path),
        Commands::Check => commands::check::run(),
    }
}
