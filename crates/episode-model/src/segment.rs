//! Segments: the ordered items of an episode timeline.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::{AssetId, EpisodeId, SegmentId};

/// Where a segment's audio comes from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SegmentSource {
    /// A clip owned by this segment. Path is relative to the data root.
    Recorded { audio_path: PathBuf },
    /// A reference to a library asset owned elsewhere.
    Reusable { asset_id: AssetId },
}

/// One item in an episode's playback order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    pub id: SegmentId,
    pub episode_id: EpisodeId,

    /// 1-based playback position, contiguous within the episode.
    pub position: u32,

    #[serde(flatten)]
    pub source: SegmentSource,

    /// Optional display label.
    #[serde(default)]
    pub name: Option<String>,

    /// Duration from the latest probe of the segment's audio.
    pub duration_secs: f64,

    pub created_at: DateTime<Utc>,
}

impl Segment {
    /// A freshly recorded clip.
    pub fn recorded(
        episode_id: EpisodeId,
        position: u32,
        audio_path: impl Into<PathBuf>,
        duration_secs: f64,
    ) -> Self {
        Self {
            id: SegmentId::new(),
            episode_id,
            position,
            source: SegmentSource::Recorded {
                audio_path: audio_path.into(),
            },
            name: None,
            duration_secs: duration_secs.max(0.0),
            created_at: Utc::now(),
        }
    }

    /// A segment that plays a library asset.
    pub fn reusable(
        episode_id: EpisodeId,
        position: u32,
        asset_id: AssetId,
        duration_secs: f64,
    ) -> Self {
        Self {
            id: SegmentId::new(),
            episode_id,
            position,
            source: SegmentSource::Reusable { asset_id },
            name: None,
            duration_secs: duration_secs.max(0.0),
            created_at: Utc::now(),
        }
    }

    pub fn with_name(mut self, name: Option<String>) -> Self {
        self.name = name.filter(|n| !n.trim().is_empty());
        self
    }

    /// Audio path of a recorded segment; `None` for library references.
    pub fn recorded_audio(&self) -> Option<&Path> {
        match &self.source {
            SegmentSource::Recorded { audio_path } => Some(audio_path),
            SegmentSource::Reusable { .. } => None,
        }
    }

    pub fn asset_id(&self) -> Option<AssetId> {
        match &self.source {
            SegmentSource::Recorded { .. } => None,
            SegmentSource::Reusable { asset_id } => Some(*asset_id),
        }
    }

    pub fn is_recorded(&self) -> bool {
        matches!(self.source, SegmentSource::Recorded { .. })
    }
}

/// Assign positions `1..=n` in slice order.
pub fn renumber(segments: &mut [Segment]) {
    for (i, segment) in segments.iter_mut().enumerate() {
        segment.position = i as u32 + 1;
    }
}

/// Sort by position, breaking ties by creation time so the result is stable.
pub fn sort_by_position(segments: &mut [Segment]) {
    segments.sort_by(|a, b| {
        a.position
            .cmp(&b.position)
            .then_with(|| a.created_at.cmp(&b.created_at))
    });
}
