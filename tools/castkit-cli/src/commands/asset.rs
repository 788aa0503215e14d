//! Library asset commands.

use std::path::PathBuf;

use clap::Subcommand;

use castkit_common::config::AppConfig;
use castkit_episode_model::ids::PodcastId;

use super::context::Context;

#[derive(Subcommand)]
pub enum AssetCommand {
    /// Copy an audio file into a podcast's library
    Import {
        podcast: PodcastId,
        file: PathBuf,

        #[arg(short, long)]
        name: String,

        /// Attribution credited in rendered episodes that use the asset
        #[arg(long)]
        copyright: Option<String>,
    },
}

pub async fn run(config: &AppConfig, command: AssetCommand) -> anyhow::Result<()> {
    let ctx = Context::open(config)?;
    let editor = ctx.editor();

    match command {
        AssetCommand::Import {
            podcast,
            file,
            name,
            copyright,
        } => {
            let asset = editor.import_asset(podcast, &file, &name, copyright).await?;
            println!("Imported '{}'", asset.name);
            println!("  Asset ID:  {}", asset.id);
            println!("  Audio:     {}", asset.audio_path.display());
            println!("  Duration:  {:.2}s", asset.duration_secs);
            if let Some(copyright) = &asset.copyright {
                println!("  Copyright: {copyright}");
            }
        }
    }
    Ok(())
}
