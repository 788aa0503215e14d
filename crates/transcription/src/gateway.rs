//! Provider selection and the error contract callers see.

use std::path::Path;
use std::sync::Arc;

use castkit_audio_engine::AudioEngine;
use castkit_common::config::{TranscriptionProviderKind, TranscriptionSettings};
use castkit_common::error::{CastError, CastResult};
use castkit_common::sandbox::SandboxedPath;

use crate::providers::{AudioUpload, CloudAsr, SelfHostedAsr, SpeechToText};
use crate::subtitles::SubtitleTrack;

/// Sends audio to the configured provider and reports failures uniformly.
///
/// Callers can tell three outcomes apart: not configured
/// ([`CastError::Config`]), audio too large for upload
/// ([`CastError::OversizedInput`]), and the provider producing nothing
/// ([`CastError::Transcription`]).
#[derive(Clone)]
pub struct TranscriptionGateway {
    provider: Option<Arc<dyn SpeechToText>>,
    engine: AudioEngine,
    max_upload_bytes: u64,
}

impl std::fmt::Debug for TranscriptionGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TranscriptionGateway")
            .field("provider", &self.provider.as_ref().map(|p| p.name().to_string()))
            .field("max_upload_bytes", &self.max_upload_bytes)
            .finish()
    }
}

impl TranscriptionGateway {
    /// Build the provider named in `settings`. An incomplete provider section
    /// leaves the gateway unconfigured.
    pub fn from_settings(settings: &TranscriptionSettings, engine: AudioEngine) -> Self {
        let provider: Option<Arc<dyn SpeechToText>> = match settings.provider {
            TranscriptionProviderKind::None => None,
            TranscriptionProviderKind::SelfHosted => match settings.self_hosted_url.as_deref() {
                Some(url) if !url.trim().is_empty() => Some(Arc::new(SelfHostedAsr::new(url))),
                _ => {
                    tracing::warn!("Self-hosted transcription selected without a URL");
                    None
                }
            },
            TranscriptionProviderKind::Cloud => match settings.cloud_api_key.as_deref() {
                Some(key) if !key.trim().is_empty() => Some(Arc::new(CloudAsr::new(
                    settings.cloud_url.clone(),
                    key,
                    settings.cloud_model.clone(),
                ))),
                _ => {
                    tracing::warn!("Cloud transcription selected without an API key");
                    None
                }
            },
        };

        Self {
            provider,
            engine,
            max_upload_bytes: settings.max_upload_bytes,
        }
    }

    pub fn with_provider(
        provider: Arc<dyn SpeechToText>,
        engine: AudioEngine,
        max_upload_bytes: u64,
    ) -> Self {
        Self {
            provider: Some(provider),
            engine,
            max_upload_bytes,
        }
    }

    pub fn unconfigured(engine: AudioEngine) -> Self {
        Self {
            provider: None,
            engine,
            max_upload_bytes: 0,
        }
    }

    pub fn is_configured(&self) -> bool {
        self.provider.is_some()
    }

    pub fn provider_name(&self) -> Option<&str> {
        self.provider.as_deref().map(|p| p.name())
    }

    /// Transcribe `audio`.
    pub async fn transcribe(&self, audio: &SandboxedPath) -> CastResult<SubtitleTrack> {
        let provider = self
            .provider
            .as_ref()
            .ok_or_else(|| CastError::config("Transcription is not configured"))?;

        let size_bytes = match tokio::fs::metadata(audio.as_path()).await {
            Ok(meta) => meta.len(),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(CastError::FileNotFound {
                    path: audio.as_path().to_path_buf(),
                })
            }
            Err(e) => return Err(e.into()),
        };
        if size_bytes > self.max_upload_bytes {
            tracing::info!(
                audio = %audio,
                size_bytes,
                limit_bytes = self.max_upload_bytes,
                "Audio exceeds transcription upload limit"
            );
            return Err(CastError::OversizedInput {
                size_bytes,
                limit_bytes: self.max_upload_bytes,
            });
        }

        let duration_secs = match self.engine.probe(audio).await {
            Ok(info) => Some(info.duration_secs),
            Err(e) => {
                tracing::debug!(audio = %audio, error = %e, "Probe before transcription failed");
                None
            }
        };

        let upload = AudioUpload {
            bytes: tokio::fs::read(audio.as_path()).await?,
            file_name: audio
                .as_path()
                .file_name()
                .and_then(|n| n.to_str())
                .unwrap_or("audio")
                .to_string(),
            mime: mime_for_path(audio.as_path()).to_string(),
            duration_secs,
        };

        tracing::info!(
            audio = %audio,
            provider = provider.name(),
            size_bytes,
            "Transcribing audio"
        );
        provider
            .transcribe(&upload)
            .await
            .filter(|track| !track.is_empty())
            .ok_or_else(|| {
                CastError::transcription(format!("{} returned no transcript", provider.name()))
            })
    }
}

/// MIME type for an upload, from its extension.
pub fn mime_for_path(path: &Path) -> &'static str {
    match path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .as_deref()
    {
        Some("mp3") => "audio/mpeg",
        Some("wav") => "audio/wav",
        Some("m4a") | Some("mp4") => "audio/mp4",
        Some("aac") => "audio/aac",
        Some("ogg") | Some("opus") => "audio/ogg",
        Some("flac") => "audio/flac",
        Some("webm") => "audio/webm",
        _ => "application/octet-stream",
    }
}
