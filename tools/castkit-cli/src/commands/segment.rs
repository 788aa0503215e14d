//! Segment commands.

use std::path::PathBuf;

use clap::Subcommand;

use castkit_common::config::AppConfig;
use castkit_episode_model::ids::{AssetId, EpisodeId, SegmentId};
use castkit_episode_model::segment::{Segment, SegmentSource};

use super::context::Context;

#[derive(Subcommand)]
pub enum SegmentCommand {
    /// Append a recorded clip to an episode
    Add {
        episode: EpisodeId,

        /// Audio file to copy into the episode
        file: PathBuf,

        #[arg(short, long)]
        name: Option<String>,
    },

    /// Append a library asset to an episode
    AddAsset {
        episode: EpisodeId,
        asset: AssetId,

        #[arg(short, long)]
        name: Option<String>,
    },

    /// List an episode's segments in playback order
    List {
        episode: EpisodeId,

        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Set the playback order; every segment of the episode must be listed
    Reorder {
        episode: EpisodeId,

        #[arg(required = true)]
        order: Vec<SegmentId>,
    },

    /// Set or clear a segment's label
    Rename {
        segment: SegmentId,

        /// New label; omit to clear it
        name: Option<String>,
    },

    /// Remove a segment and the files it owns
    Delete { segment: SegmentId },

    /// Keep only [START, END] seconds of a recorded segment
    Trim {
        segment: SegmentId,
        start: f64,
        end: f64,
    },

    /// Cut silent stretches out of a recorded segment
    RemoveSilence {
        segment: SegmentId,

        /// Shortest silence to cut (seconds)
        #[arg(long)]
        min_silence: Option<f64>,

        /// Silence threshold (dBFS, negative)
        #[arg(long, allow_hyphen_values = true)]
        threshold_db: Option<f64>,
    },

    /// Reduce background noise in a recorded segment
    Denoise {
        segment: SegmentId,

        /// Noise reduction strength in dB
        #[arg(long)]
        reduction_db: Option<f64>,
    },
}

pub async fn run(config: &AppConfig, command: SegmentCommand) -> anyhow::Result<()> {
    let ctx = Context::open(config)?;
    let editor = ctx.editor();

    match command {
        SegmentCommand::Add {
            episode,
            file,
            name,
        } => {
            let segment = editor.add_recorded(episode, &file, name).await?;
            println!("Added segment {} at position {}", segment.id, segment.position);
            print_segment(&segment);
        }
        SegmentCommand::AddAsset {
            episode,
            asset,
            name,
        } => {
            let segment = editor.add_reusable(episode, asset, name)?;
            println!("Added segment {} at position {}", segment.id, segment.position);
            print_segment(&segment);
        }
        SegmentCommand::List { episode, json } => {
            let segments = editor.list(episode)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&segments)?);
            } else if segments.is_empty() {
                println!("Episode has no segments");
            } else {
                for segment in &segments {
                    print_segment(segment);
                }
                let total: f64 = segments.iter().map(|s| s.duration_secs).sum();
                println!("Total: {} segments, {:.1}s", segments.len(), total);
            }
        }
        SegmentCommand::Reorder { episode, order } => {
            for segment in &editor.reorder(episode, &order)? {
                print_segment(segment);
            }
        }
        SegmentCommand::Rename { segment, name } => {
            print_segment(&editor.rename(segment, name)?);
        }
        SegmentCommand::Delete { segment } => {
            editor.delete(segment).await?;
            println!("Deleted segment {segment}");
        }
        SegmentCommand::Trim {
            segment,
            start,
            end,
        } => {
            let updated = editor.trim(segment, start, end).await?;
            println!("Trimmed to {:.3}s", updated.duration_secs);
            print_segment(&updated);
        }
        SegmentCommand::RemoveSilence {
            segment,
            min_silence,
            threshold_db,
        } => {
            let outcome = editor
                .remove_silence(segment, min_silence, threshold_db)
                .await?;
            if outcome.spans.is_empty() {
                println!("No silence found");
            } else {
                let removed: f64 = outcome.spans.iter().map(|s| s.duration_secs()).sum();
                println!(
                    "Removed {} silent spans ({:.2}s)",
                    outcome.spans.len(),
                    removed
                );
                for span in &outcome.spans {
                    println!("  {:.3}s - {:.3}s", span.start_secs, span.end_secs);
                }
            }
            print_segment(&outcome.segment);
        }
        SegmentCommand::Denoise {
            segment,
            reduction_db,
        } => {
            let updated = editor.noise_suppress(segment, reduction_db).await?;
            print_segment(&updated);
        }
    }
    Ok(())
}

fn print_segment(segment: &Segment) {
    let source = match &segment.source {
        SegmentSource::Recorded { audio_path } => audio_path.display().to_string(),
        SegmentSource::Reusable { asset_id } => format!("asset {asset_id}"),
    };
    println!(
        "  #{:<3} {}  {:>8.2}s  {}  {}",
        segment.position,
        segment.id,
        segment.duration_secs,
        segment.name.as_deref().unwrap_or("-"),
        source
    );
}
