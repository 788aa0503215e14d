//! Create podcasts and episodes in the catalog.

use castkit_common::config::AppConfig;
use castkit_episode_model::episode::{AudioFormat, Episode, Podcast};
use castkit_episode_model::ids::PodcastId;

use super::context::Context;

pub fn run(
    config: &AppConfig,
    handle: String,
    title: String,
    episode_title: String,
    format: &str,
) -> anyhow::Result<()> {
    let format: AudioFormat = format.parse().map_err(anyhow::Error::msg)?;
    let ctx = Context::open(config)?;

    let mut podcast = Podcast::new(handle, title);
    podcast.render.format = format;
    ctx.store.put_podcast(&podcast)?;
    let episode = Episode::new(podcast.id, episode_title);
    ctx.store.put_episode(&episode)?;

    println!("Podcast '{}' created:", podcast.title);
    println!("  Podcast ID: {}", podcast.id);
    println!("  Handle:     {}", podcast.handle);
    println!(
        "  Render:     {} @ {} kbps, {} ch",
        podcast.render.format, podcast.render.bitrate_kbps, podcast.render.channels
    );
    println!();
    println!("Episode '{}' created:", episode.title);
    println!("  Episode ID: {}", episode.id);
    println!(
        "  Directory:  {}",
        config.data_root.join(episode.directory()).display()
    );
    Ok(())
}

pub fn new_episode(config: &AppConfig, podcast_id: PodcastId, title: String) -> anyhow::Result<()> {
    let ctx = Context::open(config)?;
    let podcast = ctx.store.podcast(podcast_id)?;
    let episode = Episode::new(podcast.id, title);
    ctx.store.put_episode(&episode)?;

    println!("Episode '{}' added to '{}'", episode.title, podcast.title);
    println!("  Episode ID: {}", episode.id);
    Ok(())
}
