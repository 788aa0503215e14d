//! Shared fixture for unit tests. No external tools are needed: files are
//! placeholders and the audio engine points at binaries that do not exist.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use castkit_audio_engine::AudioEngine;
use castkit_common::config::{EditingDefaults, ToolsConfig};
use castkit_common::jobs::InMemoryJobRegistry;
use castkit_episode_model::episode::{Episode, Podcast, ReusableAsset};
use castkit_episode_model::segment::Segment;
use castkit_episode_model::store::{EpisodeStore, MemoryStore};
use castkit_transcription::{AudioUpload, SpeechToText, SubtitleTrack, TranscriptionGateway};

use crate::editor::SegmentEditor;

struct FixedTranscript(Option<SubtitleTrack>);

#[async_trait]
impl SpeechToText for FixedTranscript {
    fn name(&self) -> &str {
        "fixed"
    }

    async fn transcribe(&self, _upload: &AudioUpload) -> Option<SubtitleTrack> {
        self.0.clone()
    }
}

pub(crate) struct Fixture {
    pub dir: tempfile::TempDir,
    pub store: Arc<MemoryStore>,
    pub jobs: Arc<InMemoryJobRegistry>,
    pub editor: SegmentEditor,
    pub podcast: Podcast,
    pub episode: Episode,
}

impl Fixture {
    /// No transcription provider.
    pub fn new() -> Self {
        Self::build(None)
    }

    /// A provider that always answers with `result`.
    pub fn with_transcript(result: Option<SubtitleTrack>) -> Self {
        Self::build(Some(Arc::new(FixedTranscript(result))))
    }

    fn build(provider: Option<Arc<dyn SpeechToText>>) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(MemoryStore::new());
        let jobs = Arc::new(InMemoryJobRegistry::new());
        let podcast = Podcast::new("show", "Show");
        let episode = Episode::new(podcast.id, "Pilot");
        store.put_podcast(&podcast).unwrap();
        store.put_episode(&episode).unwrap();

        let engine = AudioEngine::new(ToolsConfig {
            ffmpeg: "castkit-no-such-ffmpeg".to_string(),
            ffprobe: "castkit-no-such-ffprobe".to_string(),
            audiowaveform: "castkit-no-such-audiowaveform".to_string(),
        });
        let gateway = match provider {
            Some(provider) => {
                TranscriptionGateway::with_provider(provider, engine.clone(), 1024 * 1024)
            }
            None => TranscriptionGateway::unconfigured(engine.clone()),
        };
        let editor = SegmentEditor::new(
            store.clone(),
            engine,
            gateway,
            jobs.clone(),
            dir.path(),
            EditingDefaults::default(),
        );

        Self {
            dir,
            store,
            jobs,
            editor,
            podcast,
            episode,
        }
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    pub fn write(&self, relative: &str, content: &str) {
        std::fs::write(self.root().join(relative), content).unwrap();
    }

    /// A recorded segment backed by a placeholder file at `relative`.
    pub fn recorded(&self, relative: &str, position: u32) -> Segment {
        self.write(relative, "audio");
        let segment = Segment::recorded(self.episode.id, position, relative, 2.0);
        self.store.put_segment(&segment).unwrap();
        segment
    }

    pub fn asset(&self, relative: &str, copyright: Option<&str>) -> ReusableAsset {
        self.write(relative, "audio");
        let mut asset = ReusableAsset::new(self.podcast.id, "Theme", relative, 4.0);
        asset.copyright = copyright.map(str::to_string);
        self.store.put_asset(&asset).unwrap();
        asset
    }
}
