//! Transcript commands.

use std::path::PathBuf;

use anyhow::Context as _;
use clap::Subcommand;

use castkit_common::config::AppConfig;
use castkit_episode_model::ids::{EpisodeId, SegmentId};
use castkit_transcription::SubtitleTrack;

use super::context::Context;
use super::render::poll_until_terminal;

#[derive(Subcommand)]
pub enum TranscriptCommand {
    /// Print a segment's transcript as SRT
    Show { segment: SegmentId },

    /// Replace a segment's transcript with an SRT or WebVTT file
    Import { segment: SegmentId, file: PathBuf },

    /// Transcribe one segment now
    Transcribe { segment: SegmentId },

    /// Transcribe every recorded segment of an episode
    TranscribeAll { episode: EpisodeId },

    /// Delete a cue and cut its audio from the segment
    DeleteCue {
        segment: SegmentId,

        /// 1-based cue number
        cue: usize,
    },

    /// Replace the text of a cue
    EditCue {
        segment: SegmentId,

        /// 1-based cue number
        cue: usize,
        text: String,
    },

    /// Write the transcript as WebVTT
    ExportVtt {
        segment: SegmentId,

        /// Output file; stdout when omitted
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

pub async fn run(config: &AppConfig, command: TranscriptCommand) -> anyhow::Result<()> {
    let ctx = Context::open(config)?;
    let editor = ctx.editor();

    match command {
        TranscriptCommand::Show { segment } => {
            let track = require(editor.transcript(segment)?, segment)?;
            print!("{}", track.format());
        }
        TranscriptCommand::Import { segment, file } => {
            let text = std::fs::read_to_string(&file)
                .with_context(|| format!("Failed to read {}", file.display()))?;
            let track = editor.save_transcript(segment, &text).await?;
            println!("Saved {} cues", track.len());
        }
        TranscriptCommand::Transcribe { segment } => {
            let track = editor.transcribe_segment(segment).await?;
            println!("Transcribed {} cues", track.len());
            print!("{}", track.format());
        }
        TranscriptCommand::TranscribeAll { episode } => {
            let handle = editor.transcribe_episode(episode)?;
            println!("Transcribing {} segments...", handle.segments);
            let report = poll_until_terminal(
                || editor.transcription_status(episode),
                || editor.cancel_transcription(episode),
            )
            .await;
            handle.finished().await;
            match report.error {
                None => println!("Transcription {}", report.status),
                Some(error) => anyhow::bail!("Transcription {}: {error}", report.status),
            }
        }
        TranscriptCommand::DeleteCue { segment, cue } => {
            let updated = editor.delete_cue(segment, cue).await?;
            println!(
                "Deleted cue {cue}; segment is now {:.3}s",
                updated.duration_secs
            );
        }
        TranscriptCommand::EditCue { segment, cue, text } => {
            let track = editor.edit_cue(segment, cue, &text).await?;
            println!("Updated cue {cue} of {}", track.len());
        }
        TranscriptCommand::ExportVtt { segment, output } => {
            let vtt = require(editor.transcript(segment)?, segment)?.to_vtt();
            match output {
                Some(path) => {
                    std::fs::write(&path, vtt)
                        .with_context(|| format!("Failed to write {}", path.display()))?;
                    println!("Wrote {}", path.display());
                }
                None => print!("{vtt}"),
            }
        }
    }
    Ok(())
}

fn require(track: Option<SubtitleTrack>, segment: SegmentId) -> anyhow::Result<SubtitleTrack> {
    track.ok_or_else(|| anyhow::anyhow!("Segment {segment} has no transcript"))
}
