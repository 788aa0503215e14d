//! Speech-to-text providers.
//!
//! Providers never fail loudly: any transport error, non-success status, or
//! body that cannot be turned into cues is logged and reported as `None`. The
//! gateway decides what that means for the caller.

use async_trait::async_trait;
use reqwest::multipart;
use serde_json::Value;

use crate::subtitles::{SubtitleTrack, TimedText};

/// Audio handed to a provider.
#[derive(Debug, Clone)]
pub struct AudioUpload {
    pub bytes: Vec<u8>,
    pub file_name: String,
    pub mime: String,
    /// Probed duration, when known. Used to time single-cue results.
    pub duration_secs: Option<f64>,
}

impl AudioUpload {
    fn cue_duration(&self) -> f64 {
        self.duration_secs.filter(|d| *d > 0.0).unwrap_or(1.0)
    }

    fn part(&self) -> Option<multipart::Part> {
        multipart::Part::bytes(self.bytes.clone())
            .file_name(self.file_name.clone())
            .mime_str(&self.mime)
            .map_err(|e| tracing::warn!(mime = %self.mime, error = %e, "Invalid upload MIME type"))
            .ok()
    }
}

/// A speech-to-text backend.
#[async_trait]
pub trait SpeechToText: Send + Sync {
    fn name(&self) -> &str;

    /// Transcribe `upload`, or `None` on any failure.
    async fn transcribe(&self, upload: &AudioUpload) -> Option<SubtitleTrack>;
}

/// A self-hosted Whisper ASR webservice.
pub struct SelfHostedAsr {
    client: reqwest::Client,
    endpoint: String,
}

impl SelfHostedAsr {
    pub fn new(base_url: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: asr_endpoint(base_url),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

/// `{base}/asr`, without doubling the suffix when the base already has it.
pub fn asr_endpoint(base_url: &str) -> String {
    let trimmed = base_url.trim().trim_end_matches('/');
    if trimmed.ends_with("/asr") {
        trimmed.to_string()
    } else {
        format!("{trimmed}/asr")
    }
}

#[async_trait]
impl SpeechToText for SelfHostedAsr {
    fn name(&self) -> &str {
        "self-hosted ASR"
    }

    async fn transcribe(&self, upload: &AudioUpload) -> Option<SubtitleTrack> {
        let form = multipart::Form::new().part("audio_file", upload.part()?);
        let url = format!("{}?output=srt", self.endpoint);

        tracing::debug!(url = %url, bytes = upload.bytes.len(), "Sending audio to self-hosted ASR");

        let response = match self.client.post(&url).multipart(form).send().await {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!(url = %url, error = %e, "Self-hosted ASR request failed");
                return None;
            }
        };
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        if !status.is_success() {
            tracing::warn!(%status, body = %truncate(&body, 200), "Self-hosted ASR returned an error");
            return None;
        }

        let track = normalize_asr_body(&body, upload.cue_duration());
        match &track {
            Some(track) => tracing::info!(cues = track.len(), "Self-hosted ASR transcription completed"),
            None => tracing::warn!(body = %truncate(&body, 200), "Self-hosted ASR response was not understood"),
        }
        track
    }
}

/// A hosted transcription API with bearer-token auth.
pub struct CloudAsr {
    client: reqwest::Client,
    url: String,
    api_key: String,
    model: String,
}

/// The one cloud model that can answer in SRT directly.
pub const SUBTITLE_CAPABLE_MODEL: &str = "whisper-1";

impl CloudAsr {
    pub fn new(url: impl Into<String>, api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            url: url.into(),
            api_key: api_key.into(),
            model: model.into(),
        }
    }

    fn wants_srt(&self) -> bool {
        self.model == SUBTITLE_CAPABLE_MODEL
    }
}

#[async_trait]
impl SpeechToText for CloudAsr {
    fn name(&self) -> &str {
        "cloud ASR"
    }

    async fn transcribe(&self, upload: &AudioUpload) -> Option<SubtitleTrack> {
        let response_format = if self.wants_srt() { "srt" } else { "json" };
        let form = multipart::Form::new()
            .text("model", self.model.clone())
            .text("response_format", response_format)
            .part("file", upload.part()?);

        tracing::debug!(model = %self.model, response_format, "Sending audio to cloud ASR");

        let response = match self
            .client
            .post(&self.url)
            .bearer_auth(&self.api_key)
            .multipart(form)
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!(error = %e, "Cloud ASR request failed");
                return None;
            }
        };
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        if !status.is_success() {
            tracing::warn!(%status, body = %truncate(&body, 200), "Cloud ASR returned an error");
            return None;
        }

        let parsed = if self.wants_srt() {
            Some(SubtitleTrack::parse(&body))
        } else {
            serde_json::from_str::<Value>(&body)
                .ok()
                .and_then(|v| v.get("text").and_then(Value::as_str).map(str::to_string))
                .map(|text| SubtitleTrack::single_cue(&text, upload.cue_duration()))
        };
        let track = parsed.filter(|t| !t.is_empty());

        match &track {
            Some(track) => tracing::info!(model = %self.model, cues = track.len(), "Cloud ASR transcription completed"),
            None => tracing::warn!(model = %self.model, "Cloud ASR response was not understood"),
        }
        track
    }
}

/// Turn whatever the ASR service sent back into cues.
///
/// Accepted shapes: SRT, WebVTT, a JSON list of `{start, end, text}`
/// segments (bare or under `segments`), a JSON `{text}` object or string, and
/// plain text. Text without timing becomes one cue over `duration_secs`.
pub fn normalize_asr_body(body: &str, duration_secs: f64) -> Option<SubtitleTrack> {
    let trimmed = body.trim_start_matches('\u{feff}').trim();
    if trimmed.is_empty() {
        return None;
    }

    let track = if trimmed.starts_with("WEBVTT") {
        SubtitleTrack::parse_vtt(trimmed)
    } else if trimmed.starts_with('{') || trimmed.starts_with('[') || trimmed.starts_with('"') {
        let value: Value = serde_json::from_str(trimmed).ok()?;
        track_from_json(&value, duration_secs)?
    } else {
        let srt = SubtitleTrack::parse(trimmed);
        if !srt.is_empty() {
            srt
        } else if trimmed.contains("-->") {
            // Looks like captions but none parsed.
            return None;
        } else {
            SubtitleTrack::single_cue(trimmed, duration_secs)
        }
    };

    (!track.is_empty()).then_some(track)
}

fn track_from_json(value: &Value, duration_secs: f64) -> Option<SubtitleTrack> {
    match value {
        Value::Array(_) => segments_track(value),
        Value::Object(map) => {
            if let Some(segments) = map.get("segments").filter(|s| s.is_array()) {
                if let Some(track) = segments_track(segments).filter(|t| !t.is_empty()) {
                    return Some(track);
                }
            }
            map.get("text")
                .and_then(Value::as_str)
                .map(|text| SubtitleTrack::single_cue(text, duration_secs))
        }
        Value::String(text) => {
            let captions = SubtitleTrack::parse_any(text);
            if captions.is_empty() {
                Some(SubtitleTrack::single_cue(text, duration_secs))
            } else {
                Some(captions)
            }
        }
        _ => None,
    }
}

fn segments_track(value: &Value) -> Option<SubtitleTrack> {
    let segments: Vec<TimedText> = serde_json::from_value(value.clone()).ok()?;
    Some(SubtitleTrack::from_segments(&segments))
}

fn truncate(s: &str, max_chars: usize) -> String {
    s.chars().take(max_chars).collect()
}
