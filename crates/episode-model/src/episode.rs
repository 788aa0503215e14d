//! Podcasts, episodes, and library assets.
//!
//! Episode CRUD and metadata editing live outside this workspace; these types
//! carry only what segment editing and rendering read or write.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::{AssetId, EpisodeId, PodcastId};

/// Output container/codec for the rendered episode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AudioFormat {
    Mp3,
    /// AAC in an MP4 container.
    Aac,
    /// Opus in an Ogg container.
    Ogg,
    Wav,
}

impl AudioFormat {
    pub fn extension(self) -> &'static str {
        match self {
            AudioFormat::Mp3 => "mp3",
            AudioFormat::Aac => "m4a",
            AudioFormat::Ogg => "ogg",
            AudioFormat::Wav => "wav",
        }
    }

    pub fn mime(self) -> &'static str {
        match self {
            AudioFormat::Mp3 => "audio/mpeg",
            AudioFormat::Aac => "audio/mp4",
            AudioFormat::Ogg => "audio/ogg",
            AudioFormat::Wav => "audio/wav",
        }
    }
}

impl fmt::Display for AudioFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AudioFormat::Mp3 => "mp3",
            AudioFormat::Aac => "aac",
            AudioFormat::Ogg => "ogg",
            AudioFormat::Wav => "wav",
        };
        f.write_str(name)
    }
}

impl FromStr for AudioFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "mp3" => Ok(AudioFormat::Mp3),
            "aac" | "m4a" => Ok(AudioFormat::Aac),
            "ogg" | "opus" => Ok(AudioFormat::Ogg),
            "wav" => Ok(AudioFormat::Wav),
            other => Err(format!("Unknown audio format: {other}. Use: mp3, aac, ogg, wav")),
        }
    }
}

/// Encoding parameters for the final episode file.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RenderSettings {
    pub format: AudioFormat,
    /// Ignored for WAV.
    pub bitrate_kbps: u32,
    pub channels: u8,
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            format: AudioFormat::Mp3,
            bitrate_kbps: 128,
            channels: 2,
        }
    }
}

/// A show.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Podcast {
    pub id: PodcastId,
    /// URL-safe short name used in feed URLs.
    pub handle: String,
    pub title: String,
    #[serde(default)]
    pub render: RenderSettings,
}

impl Podcast {
    pub fn new(handle: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: PodcastId::new(),
            handle: handle.into(),
            title: title.into(),
            render: RenderSettings::default(),
        }
    }
}

/// Publication state of an episode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PublicationStatus {
    #[default]
    Draft,
    Published,
}

/// Facts about the rendered episode file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenderedAudio {
    /// Relative to the data root.
    pub path: PathBuf,
    pub duration_secs: f64,
    pub size_bytes: u64,
    pub mime: String,
    pub rendered_at: DateTime<Utc>,
}

/// An episode.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Episode {
    pub id: EpisodeId,
    pub podcast_id: PodcastId,
    pub title: String,

    #[serde(default)]
    pub status: PublicationStatus,

    /// When the episode goes (or went) live.
    #[serde(default)]
    pub published_at: Option<DateTime<Utc>>,

    /// Per-episode override of the podcast's render settings.
    #[serde(default)]
    pub render_override: Option<RenderSettings>,

    /// Latest rendered output.
    #[serde(default)]
    pub audio: Option<RenderedAudio>,

    /// Attribution line for the library assets used in the latest render.
    #[serde(default)]
    pub copyright_snapshot: Option<String>,
}

impl Episode {
    pub fn new(podcast_id: PodcastId, title: impl Into<String>) -> Self {
        Self {
            id: EpisodeId::new(),
            podcast_id,
            title: title.into(),
            status: PublicationStatus::Draft,
            published_at: None,
            render_override: None,
            audio: None,
            copyright_snapshot: None,
        }
    }

    /// Published with a publish time that has already passed.
    pub fn is_publicly_visible(&self, now: DateTime<Utc>) -> bool {
        self.status == PublicationStatus::Published
            && self.published_at.is_some_and(|at| at <= now)
    }

    pub fn render_settings(&self, podcast: &Podcast) -> RenderSettings {
        self.render_override.unwrap_or(podcast.render)
    }

    /// Directory (relative to the data root) holding this episode's files.
    pub fn directory(&self) -> PathBuf {
        PathBuf::from("podcasts")
            .join(self.podcast_id.to_string())
            .join("episodes")
            .join(self.id.to_string())
    }

    /// Where recorded segment clips are stored.
    pub fn segments_directory(&self) -> PathBuf {
        self.directory().join("segments")
    }

    /// Where the rendered episode is written for a given format.
    pub fn final_audio_path(&self, format: AudioFormat) -> PathBuf {
        self.directory()
            .join(format!("final.{}", format.extension()))
    }
}

/// A library asset that many episodes can reference.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReusableAsset {
    pub id: AssetId,
    pub podcast_id: PodcastId,
    pub name: String,
    /// Relative to the data root.
    pub audio_path: PathBuf,
    pub duration_secs: f64,
    /// Rights holder, e.g. "Jane Doe (CC-BY 4.0)".
    #[serde(default)]
    pub copyright: Option<String>,
}

impl ReusableAsset {
    pub fn new(
        podcast_id: PodcastId,
        name: impl Into<String>,
        audio_path: impl Into<PathBuf>,
        duration_secs: f64,
    ) -> Self {
        Self {
            id: AssetId::new(),
            podcast_id,
            name: name.into(),
            audio_path: audio_path.into(),
            duration_secs,
            copyright: None,
        }
    }
}
