//! Timeline operations: adding, ordering, renaming, and deleting segments.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use castkit_audio_engine::AudioEngine;
use castkit_common::config::EditingDefaults;
use castkit_common::error::{CastError, CastResult};
use castkit_common::jobs::JobStatusRegistry;
use castkit_common::sandbox::{ArtifactKind, SandboxedPath};
use castkit_episode_model::episode::ReusableAsset;
use castkit_episode_model::ids::{AssetId, EpisodeId, PodcastId, SegmentId};
use castkit_episode_model::segment::{renumber, Segment, SegmentSource};
use castkit_episode_model::store::EpisodeStore;
use castkit_transcription::TranscriptionGateway;

use crate::locks::SegmentLocks;

/// Owns the segment records of every episode and the files behind them.
#[derive(Clone)]
pub struct SegmentEditor {
    pub(crate) store: Arc<dyn EpisodeStore>,
    pub(crate) engine: AudioEngine,
    pub(crate) gateway: TranscriptionGateway,
    pub(crate) jobs: Arc<dyn JobStatusRegistry>,
    pub(crate) locks: SegmentLocks,
    pub(crate) data_root: PathBuf,
    pub(crate) defaults: EditingDefaults,
}

impl SegmentEditor {
    pub fn new(
        store: Arc<dyn EpisodeStore>,
        engine: AudioEngine,
        gateway: TranscriptionGateway,
        jobs: Arc<dyn JobStatusRegistry>,
        data_root: impl Into<PathBuf>,
        defaults: EditingDefaults,
    ) -> Self {
        Self {
            store,
            engine,
            gateway,
            jobs,
            locks: SegmentLocks::new(),
            data_root: data_root.into(),
            defaults,
        }
    }

    pub fn store(&self) -> &Arc<dyn EpisodeStore> {
        &self.store
    }

    pub fn defaults(&self) -> &EditingDefaults {
        &self.defaults
    }

    pub(crate) fn sandbox(&self, relative: &Path) -> CastResult<SandboxedPath> {
        SandboxedPath::new(&self.data_root, relative)
    }

    /// Current audio of `segment`, wherever it comes from.
    pub fn segment_audio(&self, segment: &Segment) -> CastResult<SandboxedPath> {
        match &segment.source {
            SegmentSource::Recorded { audio_path } => self.sandbox(audio_path),
            SegmentSource::Reusable { asset_id } => {
                let asset = self.store.asset(*asset_id)?;
                self.sandbox(&asset.audio_path)
            }
        }
    }

    /// Audio of a segment this editor may modify. Library assets are shared
    /// between episodes and are never edited through a segment.
    pub(crate) fn editable_audio(&self, segment: &Segment) -> CastResult<SandboxedPath> {
        let relative = segment.recorded_audio().ok_or_else(|| {
            CastError::validation("Library segments cannot be edited; edit the asset instead")
        })?;
        let audio = self.sandbox(relative)?;
        if !audio.exists() {
            return Err(CastError::FileNotFound {
                path: audio.as_path().to_path_buf(),
            });
        }
        Ok(audio)
    }

    /// Copy `upload` into the episode and append it as a recorded segment.
    pub async fn add_recorded(
        &self,
        episode_id: EpisodeId,
        upload: &Path,
        name: Option<String>,
    ) -> CastResult<Segment> {
        let episode = self.store.episode(episode_id)?;
        let mut segment = Segment::recorded(episode_id, 0, PathBuf::new(), 0.0).with_name(name);
        let relative = episode
            .segments_directory()
            .join(format!("{}.{}", segment.id, upload_extension(upload)));

        let (audio, duration_secs) = self.import_file(upload, &relative).await?;
        segment.source = SegmentSource::Recorded {
            audio_path: relative,
        };
        segment.duration_secs = duration_secs;
        segment.position = self.store.segments_for_episode(episode_id)?.len() as u32 + 1;
        self.store.put_segment(&segment)?;
        self.engine.refresh_waveform(&audio).await;

        tracing::info!(
            segment_id = %segment.id,
            episode_id = %episode_id,
            position = segment.position,
            duration_secs,
            "Recorded segment added"
        );
        Ok(segment)
    }

    /// Append a segment that plays library asset `asset_id`.
    pub fn add_reusable(
        &self,
        episode_id: EpisodeId,
        asset_id: AssetId,
        name: Option<String>,
    ) -> CastResult<Segment> {
        let episode = self.store.episode(episode_id)?;
        let asset = self.store.asset(asset_id)?;
        if asset.podcast_id != episode.podcast_id {
            return Err(CastError::permission_denied(
                "Asset belongs to another podcast",
            ));
        }

        let position = self.store.segments_for_episode(episode_id)?.len() as u32 + 1;
        let segment =
            Segment::reusable(episode_id, position, asset_id, asset.duration_secs).with_name(name);
        self.store.put_segment(&segment)?;

        tracing::info!(
            segment_id = %segment.id,
            episode_id = %episode_id,
            asset_id = %asset_id,
            position,
            "Library segment added"
        );
        Ok(segment)
    }

    /// Copy `upload` into the podcast's library.
    pub async fn import_asset(
        &self,
        podcast_id: PodcastId,
        upload: &Path,
        name: &str,
        copyright: Option<String>,
    ) -> CastResult<ReusableAsset> {
        let podcast = self.store.podcast(podcast_id)?;
        let name = name.trim();
        if name.is_empty() {
            return Err(CastError::validation("Asset name cannot be blank"));
        }

        let mut asset = ReusableAsset::new(podcast.id, name, PathBuf::new(), 0.0);
        let relative = PathBuf::from("podcasts")
            .join(podcast.id.to_string())
            .join("library")
            .join(format!("{}.{}", asset.id, upload_extension(upload)));
        let (audio, duration_secs) = self.import_file(upload, &relative).await?;

        asset.audio_path = relative;
        asset.duration_secs = duration_secs;
        asset.copyright = copyright.filter(|c| !c.trim().is_empty());
        self.store.put_asset(&asset)?;
        self.engine.refresh_waveform(&audio).await;

        tracing::info!(asset_id = %asset.id, podcast = %podcast.handle, "Library asset imported");
        Ok(asset)
    }

    /// Copy a file from outside the data root to `relative` and probe it. The
    /// copy is removed again when it is not readable audio.
    async fn import_file(&self, upload: &Path, relative: &Path) -> CastResult<(SandboxedPath, f64)> {
        if !upload.is_file() {
            return Err(CastError::FileNotFound {
                path: upload.to_path_buf(),
            });
        }
        std::fs::create_dir_all(&self.data_root)?;
        let dest = self.sandbox(relative)?;
        if let Some(parent) = dest.as_path().parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::copy(upload, dest.as_path())?;

        match self.engine.probe(&dest).await {
            Ok(info) => Ok((dest, info.duration_secs)),
            Err(e) => {
                remove_if_present(dest.as_path());
                Err(e)
            }
        }
    }

    /// Segments of `episode_id` in playback order.
    pub fn list(&self, episode_id: EpisodeId) -> CastResult<Vec<Segment>> {
        self.store.episode(episode_id)?;
        self.store.segments_for_episode(episode_id)
    }

    /// Put the episode's segments in the order of `order`, which must name
    /// each of them exactly once.
    pub fn reorder(&self, episode_id: EpisodeId, order: &[SegmentId]) -> CastResult<Vec<Segment>> {
        let current = self.list(episode_id)?;
        if order.len() != current.len() {
            return Err(CastError::validation(format!(
                "Expected {} segment ids, got {}",
                current.len(),
                order.len()
            )));
        }
        let mut seen = HashSet::with_capacity(order.len());
        if let Some(dup) = order.iter().find(|id| !seen.insert(**id)) {
            return Err(CastError::validation(format!("Segment {dup} listed twice")));
        }

        let mut by_id: HashMap<SegmentId, Segment> =
            current.into_iter().map(|s| (s.id, s)).collect();
        let mut reordered = Vec::with_capacity(order.len());
        for id in order {
            let segment = by_id.remove(id).ok_or_else(|| {
                CastError::validation(format!("Segment {id} is not part of this episode"))
            })?;
            reordered.push(segment);
        }

        renumber(&mut reordered);
        for segment in &reordered {
            self.store.put_segment(segment)?;
        }
        tracing::info!(episode_id = %episode_id, segments = reordered.len(), "Segments reordered");
        Ok(reordered)
    }

    /// Set or clear the display label.
    pub fn rename(&self, segment_id: SegmentId, name: Option<String>) -> CastResult<Segment> {
        let segment = self.store.segment(segment_id)?.with_name(name);
        self.store.put_segment(&segment)?;
        Ok(segment)
    }

    /// Remove a segment, close the gap in positions, and delete the files a
    /// recorded segment owns.
    pub async fn delete(&self, segment_id: SegmentId) -> CastResult<()> {
        let guard = self.locks.acquire(segment_id).await;
        let segment = self.store.segment(segment_id)?;
        self.store.delete_segment(segment_id)?;

        if let Some(relative) = segment.recorded_audio() {
            match self.sandbox(relative) {
                Ok(audio) => {
                    remove_if_present(audio.derived(ArtifactKind::Transcript).as_path());
                    remove_if_present(audio.derived(ArtifactKind::Waveform).as_path());
                    remove_if_present(audio.as_path());
                }
                Err(e) => {
                    tracing::warn!(segment_id = %segment_id, error = %e, "Not deleting files outside the data root");
                }
            }
        }

        let mut remaining = self.store.segments_for_episode(segment.episode_id)?;
        let before: Vec<u32> = remaining.iter().map(|s| s.position).collect();
        renumber(&mut remaining);
        for (segment, old) in remaining.iter().zip(before) {
            if segment.position != old {
                self.store.put_segment(segment)?;
            }
        }

        drop(guard);
        self.locks.forget(segment_id);
        tracing::info!(segment_id = %segment_id, episode_id = %segment.episode_id, "Segment deleted");
        Ok(())
    }
}

fn upload_extension(upload: &Path) -> String {
    upload
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .filter(|e| !e.is_empty() && e.chars().all(|c| c.is_ascii_alphanumeric()))
        .unwrap_or_else(|| "wav".to_string())
}

pub(crate) fn remove_if_present(path: &Path) {
    match std::fs::remove_file(path) {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => tracing::warn!(path = %path.display(), error = %e, "Failed to remove file"),
    }
}
