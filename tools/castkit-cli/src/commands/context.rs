//! Wires the services a command needs from the loaded configuration.

use std::sync::Arc;

use anyhow::Context as _;

use castkit_audio_engine::AudioEngine;
use castkit_common::config::AppConfig;
use castkit_common::jobs::InMemoryJobRegistry;
use castkit_episode_model::store::{EpisodeStore, JsonStore};
use castkit_render_engine::{NoopPublisher, PublishHooks, RenderPipeline, WebSubPublisher};
use castkit_segment_editor::SegmentEditor;
use castkit_transcription::TranscriptionGateway;

/// Catalog file name under the data root.
pub const CATALOG_FILE: &str = "catalog.json";

pub struct Context {
    pub config: AppConfig,
    pub store: Arc<dyn EpisodeStore>,
    pub engine: AudioEngine,
    pub jobs: Arc<InMemoryJobRegistry>,
}

impl Context {
    pub fn open(config: &AppConfig) -> anyhow::Result<Self> {
        std::fs::create_dir_all(&config.data_root).with_context(|| {
            format!("Failed to create data root {}", config.data_root.display())
        })?;
        let store = JsonStore::open(config.data_root.join(CATALOG_FILE))
            .context("Failed to open episode catalog")?;

        Ok(Self {
            config: config.clone(),
            store: Arc::new(store),
            engine: AudioEngine::new(config.tools.clone()),
            jobs: Arc::new(InMemoryJobRegistry::new()),
        })
    }

    pub fn gateway(&self) -> TranscriptionGateway {
        TranscriptionGateway::from_settings(&self.config.transcription, self.engine.clone())
    }

    pub fn editor(&self) -> SegmentEditor {
        SegmentEditor::new(
            self.store.clone(),
            self.engine.clone(),
            self.gateway(),
            self.jobs.clone(),
            &self.config.data_root,
            self.config.editing.clone(),
        )
    }

    pub fn pipeline(&self) -> RenderPipeline {
        let publisher: Arc<dyn PublishHooks> =
            match WebSubPublisher::from_config(&self.config.publishing) {
                Some(publisher) => Arc::new(publisher),
                None => Arc::new(NoopPublisher),
            };
        RenderPipeline::new(
            self.store.clone(),
            self.engine.clone(),
            self.jobs.clone(),
            publisher,
            &self.config.data_root,
        )
    }
}
