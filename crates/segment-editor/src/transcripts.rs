//! Transcript reads, edits, and transcription runs.

use castkit_audio_engine::{install_replacement, SilenceSpan};
use castkit_common::error::{CastError, CastResult};
use castkit_common::jobs::{spawn_job, JobKey, JobKind, JobTicket, StartOutcome, StatusReport};
use castkit_common::sandbox::ArtifactKind;
use castkit_episode_model::ids::{EpisodeId, SegmentId};
use castkit_episode_model::segment::Segment;
use castkit_transcription::SubtitleTrack;
use tokio::task::JoinHandle;

use crate::editor::{remove_if_present, SegmentEditor};

/// An accepted bulk transcription.
#[derive(Debug)]
pub struct TranscriptionHandle {
    pub ticket: JobTicket,
    pub segments: usize,
    task: JoinHandle<()>,
}

impl TranscriptionHandle {
    pub async fn finished(self) {
        if let Err(e) = self.task.await {
            tracing::warn!(error = %e, "Transcription task ended abnormally");
        }
    }
}

impl SegmentEditor {
    /// The segment's transcript, if it has one.
    pub fn transcript(&self, segment_id: SegmentId) -> CastResult<Option<SubtitleTrack>> {
        let segment = self.store.segment(segment_id)?;
        let audio = self.segment_audio(&segment)?;
        SubtitleTrack::load(audio.derived(ArtifactKind::Transcript).as_path())
    }

    /// Replace the transcript with `text` (SRT or WebVTT). Blank text removes
    /// it.
    pub async fn save_transcript(&self, segment_id: SegmentId, text: &str) -> CastResult<SubtitleTrack> {
        let _guard = self.locks.acquire(segment_id).await;
        let segment = self.store.segment(segment_id)?;
        let path = self.editable_audio(&segment)?.derived(ArtifactKind::Transcript);

        if text.trim().is_empty() {
            remove_if_present(path.as_path());
            return Ok(SubtitleTrack::default());
        }
        let track = SubtitleTrack::parse_any(text);
        if track.is_empty() {
            return Err(CastError::validation("No cues found in transcript"));
        }
        track.save(path.as_path())?;
        Ok(track)
    }

    /// Delete cue `cue_index` (1-based) and the audio under it, then pull the
    /// later cues back by the removed length.
    pub async fn delete_cue(&self, segment_id: SegmentId, cue_index: usize) -> CastResult<Segment> {
        let _guard = self.locks.acquire(segment_id).await;
        let mut segment = self.store.segment(segment_id)?;
        let audio = self.editable_audio(&segment)?;
        let track = SubtitleTrack::load(audio.derived(ArtifactKind::Transcript).as_path())?
            .ok_or_else(|| CastError::not_found("transcript", segment_id))?;
        let cue = track
            .cue(cue_index)
            .cloned()
            .ok_or_else(|| CastError::not_found("cue", cue_index))?;
        let shifted = track
            .without_cue(cue_index - 1, cue.duration_secs())
            .ok_or_else(|| CastError::not_found("cue", cue_index))?;

        tracing::info!(
            segment_id = %segment_id,
            cue_index,
            start_secs = cue.start_secs,
            end_secs = cue.end_secs,
            "Cutting cue audio"
        );
        let output = self
            .engine
            .remove_spans(&audio, &[SilenceSpan::new(cue.start_secs, cue.end_secs)])
            .await?;
        let installed = install_replacement(output, &audio)?;
        shifted.save(installed.path.derived(ArtifactKind::Transcript).as_path())?;

        self.commit(&mut segment, &installed, "delete_cue").await
    }

    /// Correct the text of cue `cue_index` (1-based). Timing is unchanged.
    pub async fn edit_cue(
        &self,
        segment_id: SegmentId,
        cue_index: usize,
        text: &str,
    ) -> CastResult<SubtitleTrack> {
        let _guard = self.locks.acquire(segment_id).await;
        let segment = self.store.segment(segment_id)?;
        let path = self.editable_audio(&segment)?.derived(ArtifactKind::Transcript);
        let track = SubtitleTrack::load(path.as_path())?
            .ok_or_else(|| CastError::not_found("transcript", segment_id))?;

        let updated = track.update_cue_text(cue_index, text)?;
        updated.save(path.as_path())?;
        Ok(updated)
    }

    /// Transcribe one segment now and store the result beside its audio.
    ///
    /// Audio over the provider's upload limit fails with
    /// [`CastError::OversizedInput`].
    pub async fn transcribe_segment(&self, segment_id: SegmentId) -> CastResult<SubtitleTrack> {
        let _guard = self.locks.acquire(segment_id).await;
        let segment = self.store.segment(segment_id)?;
        let audio = self.editable_audio(&segment)?;

        let track = self.gateway.transcribe(&audio).await?;
        track.save(audio.derived(ArtifactKind::Transcript).as_path())?;
        tracing::info!(segment_id = %segment_id, cues = track.len(), "Segment transcribed");
        Ok(track)
    }

    /// Transcribe every recorded segment of the episode in the background.
    pub fn transcribe_episode(&self, episode_id: EpisodeId) -> CastResult<TranscriptionHandle> {
        if !self.gateway.is_configured() {
            return Err(CastError::config("Transcription is not configured"));
        }
        let targets: Vec<SegmentId> = self
            .list(episode_id)?
            .into_iter()
            .filter(Segment::is_recorded)
            .map(|s| s.id)
            .collect();
        if targets.is_empty() {
            return Err(CastError::validation(
                "Episode has no recorded segments to transcribe",
            ));
        }

        let key = JobKey::new(JobKind::Transcribe, episode_id.as_uuid());
        let ticket = match self.jobs.try_start(key) {
            StartOutcome::Accepted(ticket) => ticket,
            StartOutcome::Conflict => {
                return Err(CastError::conflict("Episode is already transcribing"));
            }
        };

        tracing::info!(episode_id = %episode_id, segments = targets.len(), "Transcription accepted");
        let segments = targets.len();
        let editor = self.clone();
        let task = spawn_job(self.jobs.clone(), ticket.clone(), async move {
            editor.transcribe_all(&targets).await
        });
        Ok(TranscriptionHandle {
            ticket,
            segments,
            task,
        })
    }

    async fn transcribe_all(&self, targets: &[SegmentId]) -> CastResult<()> {
        let mut failures = Vec::new();
        for id in targets {
            if let Err(e) = self.transcribe_segment(*id).await {
                tracing::warn!(segment_id = %id, error = %e, "Segment transcription failed");
                failures.push(format!("{id}: {} ({e})", e.kind()));
            }
        }
        if failures.is_empty() {
            Ok(())
        } else {
            Err(CastError::transcription(format!(
                "{} of {} segments failed: {}",
                failures.len(),
                targets.len(),
                failures.join("; ")
            )))
        }
    }

    /// Poll the episode's bulk transcription. A terminal state is reported
    /// once.
    pub fn transcription_status(&self, episode_id: EpisodeId) -> StatusReport {
        self.jobs
            .read_and_clear(JobKey::new(JobKind::Transcribe, episode_id.as_uuid()))
            .report(JobKind::Transcribe)
    }

    /// Cancel the episode's bulk transcription. Segments already transcribed
    /// keep their transcripts.
    pub fn cancel_transcription(&self, episode_id: EpisodeId) -> bool {
        self.jobs
            .cancel(JobKey::new(JobKind::Transcribe, episode_id.as_uuid()))
    }
}
