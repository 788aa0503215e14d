//! Episode rendering as a single-flight background job.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Utc;
use tokio::task::JoinHandle;

use castkit_audio_engine::AudioEngine;
use castkit_common::error::{CastError, CastResult};
use castkit_common::jobs::{
    spawn_job, JobKey, JobKind, JobStatusRegistry, JobTicket, StartOutcome, StatusReport,
};
use castkit_common::sandbox::{ArtifactKind, SandboxedPath};
use castkit_episode_model::episode::{Episode, Podcast, RenderSettings, RenderedAudio};
use castkit_episode_model::ids::EpisodeId;
use castkit_episode_model::segment::{Segment, SegmentSource};
use castkit_episode_model::store::EpisodeStore;

use crate::publish::PublishHooks;

/// Separator between attribution entries in the copyright snapshot.
pub const COPYRIGHT_SEPARATOR: &str = "; ";

/// Everything a render needs, resolved before the job is accepted.
#[derive(Debug, Clone)]
pub struct RenderPlan {
    pub episode: Episode,
    pub podcast: Podcast,
    pub settings: RenderSettings,
    /// Audio to join, in playback order.
    pub inputs: Vec<SandboxedPath>,
    /// Segments left out because their audio is missing or outside the data
    /// root.
    pub skipped: usize,
    pub output: SandboxedPath,
    pub copyright_snapshot: Option<String>,
}

/// An accepted render.
#[derive(Debug)]
pub struct RenderHandle {
    pub ticket: JobTicket,
    pub inputs: usize,
    pub skipped: usize,
    task: JoinHandle<()>,
}

impl RenderHandle {
    /// Wait for the background job to record its outcome.
    pub async fn finished(self) {
        if let Err(e) = self.task.await {
            tracing::warn!(error = %e, "Render task ended abnormally");
        }
    }
}

/// Renders episodes from their segments.
#[derive(Clone)]
pub struct RenderPipeline {
    store: Arc<dyn EpisodeStore>,
    engine: AudioEngine,
    jobs: Arc<dyn JobStatusRegistry>,
    publisher: Arc<dyn PublishHooks>,
    data_root: PathBuf,
}

impl RenderPipeline {
    pub fn new(
        store: Arc<dyn EpisodeStore>,
        engine: AudioEngine,
        jobs: Arc<dyn JobStatusRegistry>,
        publisher: Arc<dyn PublishHooks>,
        data_root: impl Into<PathBuf>,
    ) -> Self {
        Self {
            store,
            engine,
            jobs,
            publisher,
            data_root: data_root.into(),
        }
    }

    fn key(episode_id: EpisodeId) -> JobKey {
        JobKey::new(JobKind::Render, episode_id.as_uuid())
    }

    /// Resolve segments, settings, and the output path.
    ///
    /// Segments whose audio is missing are skipped; the plan is rejected when
    /// none remain.
    pub fn plan(&self, episode_id: EpisodeId) -> CastResult<RenderPlan> {
        let episode = self.store.episode(episode_id)?;
        let podcast = self.store.podcast(episode.podcast_id)?;
        let segments = self.store.segments_for_episode(episode_id)?;
        if segments.is_empty() {
            return Err(CastError::validation("Episode has no segments"));
        }

        let mut inputs = Vec::with_capacity(segments.len());
        let mut attributions = Vec::new();
        let mut skipped = 0;

        for segment in &segments {
            let (relative, attribution) = match self.resolve_segment(segment) {
                Ok(resolved) => resolved,
                Err(e) => {
                    tracing::warn!(segment_id = %segment.id, error = %e, "Skipping segment");
                    skipped += 1;
                    continue;
                }
            };
            attributions.extend(attribution);

            match SandboxedPath::new(&self.data_root, &relative) {
                Ok(path) if path.exists() => inputs.push(path),
                Ok(path) => {
                    tracing::warn!(segment_id = %segment.id, path = %path, "Segment audio is missing");
                    skipped += 1;
                }
                Err(e) => {
                    tracing::warn!(segment_id = %segment.id, error = %e, "Segment audio rejected");
                    skipped += 1;
                }
            }
        }

        if inputs.is_empty() {
            return Err(CastError::validation(
                "None of the episode's segments has audio to render",
            ));
        }

        let settings = episode.render_settings(&podcast);
        let output = SandboxedPath::new(&self.data_root, episode.final_audio_path(settings.format))?;

        Ok(RenderPlan {
            copyright_snapshot: copyright_snapshot(&attributions),
            episode,
            podcast,
            settings,
            inputs,
            skipped,
            output,
        })
    }

    /// Audio path of `segment` relative to the data root, plus its attribution
    /// line when it plays a library asset with a copyright holder.
    fn resolve_segment(&self, segment: &Segment) -> CastResult<(PathBuf, Option<String>)> {
        match &segment.source {
            SegmentSource::Recorded { audio_path } => Ok((audio_path.clone(), None)),
            SegmentSource::Reusable { asset_id } => {
                let asset = self.store.asset(*asset_id)?;
                let attribution = asset
                    .copyright
                    .as_deref()
                    .map(str::trim)
                    .filter(|c| !c.is_empty())
                    .map(|c| {
                        let label = segment.name.as_deref().unwrap_or(&asset.name);
                        format!("{label} by {c}")
                    });
                Ok((asset.audio_path, attribution))
            }
        }
    }

    /// Start rendering `episode_id` in the background.
    ///
    /// Fails with a conflict while a render of the same episode is running.
    pub fn start_render(&self, episode_id: EpisodeId) -> CastResult<RenderHandle> {
        let plan = self.plan(episode_id)?;

        let ticket = match self.jobs.try_start(Self::key(episode_id)) {
            StartOutcome::Accepted(ticket) => ticket,
            StartOutcome::Conflict => {
                return Err(CastError::conflict("Episode is already building"));
            }
        };

        let stale_transcript = plan.output.derived(ArtifactKind::Transcript);
        if let Err(e) = remove_if_present(stale_transcript.as_path()) {
            tracing::warn!(path = %stale_transcript, error = %e, "Failed to remove stale transcript");
        }

        tracing::info!(
            episode_id = %episode_id,
            inputs = plan.inputs.len(),
            skipped = plan.skipped,
            format = %plan.settings.format,
            "Render accepted"
        );

        let inputs = plan.inputs.len();
        let skipped = plan.skipped;
        let worker = self.clone();
        let task = spawn_job(self.jobs.clone(), ticket.clone(), async move {
            worker.run(plan).await
        });

        Ok(RenderHandle {
            ticket,
            inputs,
            skipped,
            task,
        })
    }

    async fn run(&self, plan: RenderPlan) -> CastResult<()> {
        let output = &plan.output;
        let parent = output
            .as_path()
            .parent()
            .ok_or_else(|| CastError::processing("Render output has no parent directory"))?;
        std::fs::create_dir_all(parent)?;

        let staging = tempfile::Builder::new()
            .prefix(".castkit-render-")
            .suffix(&format!(".{}", plan.settings.format.extension()))
            .tempfile_in(parent)?;
        let staging_path = SandboxedPath::new(output.base(), staging.path())?;

        self.engine
            .concatenate(&plan.inputs, &staging_path, &plan.settings)
            .await?;
        staging
            .persist(output.as_path())
            .map_err(|e| CastError::processing(format!("Failed to move render into place: {e}")))?;

        let probe = self.engine.probe(output).await?;

        // Re-read so edits made while rendering are not overwritten.
        let mut episode = self.store.episode(plan.episode.id)?;
        if let Some(previous) = &episode.audio {
            if previous.path != output.relative() {
                self.remove_previous_render(&previous.path);
            }
        }
        episode.audio = Some(RenderedAudio {
            path: output.relative().to_path_buf(),
            duration_secs: probe.duration_secs,
            size_bytes: probe.size_bytes,
            mime: probe.mime.clone(),
            rendered_at: Utc::now(),
        });
        episode.copyright_snapshot = plan.copyright_snapshot.clone();
        self.store.put_episode(&episode)?;

        tracing::info!(
            episode_id = %episode.id,
            duration_secs = probe.duration_secs,
            size_bytes = probe.size_bytes,
            "Episode rendered"
        );

        if episode.is_publicly_visible(Utc::now()) {
            self.publish(&plan.podcast, &episode).await;
        }

        self.engine.refresh_waveform(output).await;
        Ok(())
    }

    async fn publish(&self, podcast: &Podcast, episode: &Episode) {
        if let Err(e) = self.publisher.regenerate_feed(podcast, episode).await {
            tracing::warn!(podcast = %podcast.handle, error = %e, "Feed regeneration failed");
        }
        if let Err(e) = self.publisher.notify_hub(podcast).await {
            tracing::warn!(podcast = %podcast.handle, error = %e, "Hub notification failed");
        }
    }

    /// A render in another format leaves the old file and its waveform behind.
    fn remove_previous_render(&self, relative: &Path) {
        let Ok(previous) = SandboxedPath::new(&self.data_root, relative) else {
            return;
        };
        for path in [
            previous.as_path().to_path_buf(),
            previous.derived(ArtifactKind::Waveform).as_path().to_path_buf(),
        ] {
            if let Err(e) = remove_if_present(&path) {
                tracing::warn!(path = %path.display(), error = %e, "Failed to remove previous render");
            }
        }
    }

    /// Poll the render status. A terminal state is reported once.
    pub fn status(&self, episode_id: EpisodeId) -> StatusReport {
        self.jobs
            .read_and_clear(Self::key(episode_id))
            .report(JobKind::Render)
    }

    pub fn cancel(&self, episode_id: EpisodeId) -> bool {
        self.jobs.cancel(Self::key(episode_id))
    }
}

/// Join attribution lines, or `None` when there are none.
pub fn copyright_snapshot(entries: &[String]) -> Option<String> {
    if entries.is_empty() {
        None
    } else {
        Some(entries.join(COPYRIGHT_SEPARATOR))
    }
}

fn remove_if_present(path: &Path) -> std::io::Result<()> {
    match std::fs::remove_file(path) {
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        other => other,
    }
}
