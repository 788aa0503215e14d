//! Audio edits on recorded segments, with their transcripts kept in step.

use castkit_audio_engine::{install_replacement, InstalledAudio, SilenceSpan};
use castkit_common::error::CastResult;
use castkit_common::sandbox::ArtifactKind;
use castkit_episode_model::ids::SegmentId;
use castkit_episode_model::segment::{Segment, SegmentSource};
use castkit_transcription::SubtitleTrack;

use crate::editor::SegmentEditor;

/// Result of [`SegmentEditor::remove_silence`].
#[derive(Debug, Clone)]
pub struct SilenceRemovalOutcome {
    pub segment: Segment,
    /// Removed spans in the old timeline. Empty when nothing was silent.
    pub spans: Vec<SilenceSpan>,
}

impl SegmentEditor {
    /// Keep `[start_secs, end_secs]` of the segment's audio.
    pub async fn trim(
        &self,
        segment_id: SegmentId,
        start_secs: f64,
        end_secs: f64,
    ) -> CastResult<Segment> {
        let _guard = self.locks.acquire(segment_id).await;
        let mut segment = self.store.segment(segment_id)?;
        let audio = self.editable_audio(&segment)?;
        let transcript = SubtitleTrack::load(audio.derived(ArtifactKind::Transcript).as_path())?;

        let output = self.engine.trim(&audio, start_secs, end_secs).await?;
        let installed = install_replacement(output, &audio)?;
        if let Some(track) = transcript {
            track
                .remap_after_trim(start_secs, end_secs)
                .save(installed.path.derived(ArtifactKind::Transcript).as_path())?;
        }

        self.commit(&mut segment, &installed, "trim").await
    }

    /// Cut silent stretches out of the segment's audio. Parameters left out
    /// come from the editing defaults.
    pub async fn remove_silence(
        &self,
        segment_id: SegmentId,
        min_silence_secs: Option<f64>,
        threshold_db: Option<f64>,
    ) -> CastResult<SilenceRemovalOutcome> {
        let min_silence_secs = min_silence_secs.unwrap_or(self.defaults.min_silence_secs);
        let threshold_db = threshold_db.unwrap_or(self.defaults.silence_threshold_db);

        let _guard = self.locks.acquire(segment_id).await;
        let mut segment = self.store.segment(segment_id)?;
        let audio = self.editable_audio(&segment)?;
        let transcript = SubtitleTrack::load(audio.derived(ArtifactKind::Transcript).as_path())?;

        let Some(removal) = self
            .engine
            .remove_silence(&audio, min_silence_secs, threshold_db)
            .await?
        else {
            tracing::info!(segment_id = %segment_id, "No silence to remove");
            return Ok(SilenceRemovalOutcome {
                segment,
                spans: Vec::new(),
            });
        };

        let spans = removal.spans;
        let installed = install_replacement(removal.output, &audio)?;
        if let Some(track) = transcript {
            track
                .remap_after_silence_removal(&spans)
                .save(installed.path.derived(ArtifactKind::Transcript).as_path())?;
        }

        let segment = self.commit(&mut segment, &installed, "remove_silence").await?;
        Ok(SilenceRemovalOutcome { segment, spans })
    }

    /// Spectral noise reduction. The transcript moves with the audio untouched.
    pub async fn noise_suppress(
        &self,
        segment_id: SegmentId,
        reduction_db: Option<f64>,
    ) -> CastResult<Segment> {
        let reduction_db = reduction_db.unwrap_or(self.defaults.noise_reduction_db);

        let _guard = self.locks.acquire(segment_id).await;
        let mut segment = self.store.segment(segment_id)?;
        let audio = self.editable_audio(&segment)?;

        let output = self
            .engine
            .apply_noise_suppression(&audio, reduction_db)
            .await?;
        let installed = install_replacement(output, &audio)?;

        self.commit(&mut segment, &installed, "noise_suppress").await
    }

    /// Point the segment at its new audio and refresh the waveform.
    pub(crate) async fn commit(
        &self,
        segment: &mut Segment,
        installed: &InstalledAudio,
        operation: &'static str,
    ) -> CastResult<Segment> {
        segment.source = SegmentSource::Recorded {
            audio_path: installed.path.relative().to_path_buf(),
        };
        segment.duration_secs = installed.duration_secs;
        self.store.put_segment(segment)?;

        self.engine.refresh_waveform(&installed.path).await;

        tracing::info!(
            segment_id = %segment.id,
            operation,
            audio = %installed.path.relative().display(),
            duration_secs = segment.duration_secs,
            "Segment audio updated"
        );
        Ok(segment.clone())
    }
}
