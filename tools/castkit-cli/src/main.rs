//! castkit CLI: assemble, edit, transcribe, and render podcast episodes.
//!
//! Usage:
//!   castkit check                         Check external tools and configuration
//!   castkit init <HANDLE> <TITLE>         Create a podcast with a first episode
//!   castkit new-episode <PODCAST> <TITLE> Add an episode to a podcast
//!   castkit probe <PATH>                  Probe an audio file under the data root
//!   castkit segment <COMMAND>             Add, order, and edit episode segments
//!   castkit asset import <PODCAST> <FILE> Add a reusable library asset
//!   castkit transcript <COMMAND>          Read, edit, and generate transcripts
//!   castkit publish <EPISODE>             Mark an episode as published now
//!   castkit render <EPISODE>              Render the final episode audio

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use castkit_common::config::AppConfig;
use castkit_episode_model::ids::{EpisodeId, PodcastId};

mod commands;

#[derive(Parser)]
#[command(
    name = "castkit",
    about = "Podcast episode assembly with transcript-synchronized editing",
    version,
    author
)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Config file to use instead of the standard location
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Override the data root from the config
    #[arg(long, global = true)]
    data_root: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check external tools and configuration
    Check,

    /// Create a podcast and its first episode
    Init {
        /// Short handle used in feed URLs
        handle: String,

        /// Podcast title
        title: String,

        /// Title of the first episode
        #[arg(short, long, default_value = "Episode 1")]
        episode: String,

        /// Render format: mp3, aac, ogg, wav
        #[arg(long, default_value = "mp3")]
        format: String,
    },

    /// Probe an audio file under the data root
    Probe {
        /// Path relative to the data root
        path: PathBuf,
    },

    /// Manage episode segments
    #[command(subcommand)]
    Segment(commands::segment::SegmentCommand),

    /// Manage reusable library assets
    #[command(subcommand)]
    Asset(commands::asset::AssetCommand),

    /// Manage segment transcripts
    #[command(subcommand)]
    Transcript(commands::transcript::TranscriptCommand),

    /// Mark an episode as published from now on
    Publish { episode: EpisodeId },

    /// Render an episode and wait for the result
    Render { episode: EpisodeId },

    /// Create another episode in an existing podcast
    NewEpisode {
        podcast: PodcastId,
        title: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => AppConfig::load_from(path),
        None => AppConfig::load(),
    };
    if let Some(root) = cli.data_root {
        config.data_root = root;
    }
    if cli.verbose {
        config.logging.level = "debug".to_string();
    }
    castkit_common::logging::init_logging(&config.logging);

    match cli.command {
        Commands::Check => commands::check::run(&config),
        Commands::Init {
            handle,
            title,
            episode,
            format,
        } => commands::init::run(&config, handle, title, episode, &format),
        Commands::NewEpisode { podcast, title } => {
            commands::init::new_episode(&config, podcast, title)
        }
        Commands::Probe { path } => commands::probe::run(&config, path).await,
        Commands::Segment(command) => commands::segment::run(&config, command).await,
        Commands::Asset(command) => commands::asset::run(&config, command).await,
        Commands::Transcript(command) => commands::transcript::run(&config, command).await,
        Commands::Publish { episode } => commands::render::publish(&config, episode),
        Commands::Render { episode } => commands::render::run(&config, episode).await,
    }
}
