//! Render and publish episodes.

use std::time::Duration;

use chrono::Utc;

use castkit_common::config::AppConfig;
use castkit_common::jobs::StatusReport;
use castkit_episode_model::episode::PublicationStatus;
use castkit_episode_model::ids::EpisodeId;

use super::context::Context;

const POLL_INTERVAL: Duration = Duration::from_millis(500);

pub async fn run(config: &AppConfig, episode_id: EpisodeId) -> anyhow::Result<()> {
    let ctx = Context::open(config)?;
    let pipeline = ctx.pipeline();

    let handle = pipeline.start_render(episode_id)?;
    println!(
        "Rendering {} segments ({} skipped)...",
        handle.inputs, handle.skipped
    );
    let report = poll_until_terminal(
        || pipeline.status(episode_id),
        || pipeline.cancel(episode_id),
    )
    .await;
    handle.finished().await;

    if let Some(error) = report.error {
        anyhow::bail!("Render {}: {error}", report.status);
    }

    let episode = ctx.store.episode(episode_id)?;
    match &episode.audio {
        Some(audio) => {
            println!("Render complete:");
            println!("  File:     {}", config.data_root.join(&audio.path).display());
            println!("  Duration: {:.2}s", audio.duration_secs);
            println!("  Size:     {} bytes ({})", audio.size_bytes, audio.mime);
            if let Some(copyright) = &episode.copyright_snapshot {
                println!("  Credits:  {copyright}");
            }
        }
        None => println!("Render {}", report.status),
    }
    Ok(())
}

/// Mark the episode published as of now. Later renders ping the hub.
pub fn publish(config: &AppConfig, episode_id: EpisodeId) -> anyhow::Result<()> {
    let ctx = Context::open(config)?;
    let mut episode = ctx.store.episode(episode_id)?;
    episode.status = PublicationStatus::Published;
    let published_at = *episode.published_at.get_or_insert_with(Utc::now);
    ctx.store.put_episode(&episode)?;

    println!("Episode '{}' published at {}", episode.title, published_at);
    Ok(())
}

/// Poll `status` until the job reaches a terminal state. Ctrl-C cancels the
/// job once; polling then continues until the cancellation is reported.
pub async fn poll_until_terminal(
    mut status: impl FnMut() -> StatusReport,
    cancel: impl Fn() -> bool,
) -> StatusReport {
    let mut ticker = tokio::time::interval(POLL_INTERVAL);
    let mut interrupted = false;
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let report = status();
                // idle: the result was consumed elsewhere
                if report.is_terminal() || report.status == "idle" {
                    return report;
                }
                tracing::debug!(status = %report.status, "Waiting for job");
            }
            signal = tokio::signal::ctrl_c(), if !interrupted => {
                interrupted = true;
                if signal.is_ok() && cancel() {
                    eprintln!("Cancelling...");
                }
            }
        }
    }
}
