//! Application configuration.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Global application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Root directory that every audio, transcript, and waveform file must live under.
    pub data_root: PathBuf,

    /// External tool locations.
    pub tools: ToolsConfig,

    /// Speech-to-text provider selection.
    pub transcription: TranscriptionSettings,

    /// Default parameters for segment edits.
    pub editing: EditingDefaults,

    /// Feed publication side effects.
    pub publishing: PublishingConfig,

    /// Logging configuration.
    pub logging: LoggingConfig,
}

/// Names or paths of the external binaries the audio engine spawns.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolsConfig {
    pub ffmpeg: String,
    pub ffprobe: String,
    /// Peak-data generator (BBC audiowaveform compatible CLI).
    pub audiowaveform: String,
}

/// Which speech-to-text backend to call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TranscriptionProviderKind {
    #[default]
    None,
    SelfHosted,
    Cloud,
}

/// Speech-to-text configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TranscriptionSettings {
    pub provider: TranscriptionProviderKind,

    /// Base URL of the self-hosted ASR service (e.g. `http://asr:9000`).
    pub self_hosted_url: Option<String>,

    /// Full endpoint URL of the cloud transcription API.
    pub cloud_url: String,

    /// Bearer token for the cloud API.
    pub cloud_api_key: Option<String>,

    /// Cloud model id.
    pub cloud_model: String,

    /// Largest audio file accepted for upload, in bytes.
    pub max_upload_bytes: u64,
}

/// Defaults applied when an edit request leaves a parameter out.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EditingDefaults {
    /// Shortest silence (seconds) that silence removal cuts.
    pub min_silence_secs: f64,

    /// Level (dBFS) below which audio counts as silence.
    pub silence_threshold_db: f64,

    /// Noise reduction strength in dB passed to the spectral denoiser.
    pub noise_reduction_db: f64,
}

/// Publication side-effect targets.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PublishingConfig {
    /// WebSub hub to ping after a published episode is re-rendered.
    pub hub_url: Option<String>,

    /// Public feed URL; `{podcast}` is replaced with the podcast handle.
    pub feed_url_template: Option<String>,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level filter (e.g., "info", "debug", "castkit=debug,warn").
    pub level: String,

    /// Whether to output structured JSON logs.
    pub json: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            data_root: dirs_default_data_root(),
            tools: ToolsConfig::default(),
            transcription: TranscriptionSettings::default(),
            editing: EditingDefaults::default(),
            publishing: PublishingConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            ffmpeg: "ffmpeg".to_string(),
            ffprobe: "ffprobe".to_string(),
            audiowaveform: "audiowaveform".to_string(),
        }
    }
}

impl Default for TranscriptionSettings {
    fn default() -> Self {
        Self {
            provider: TranscriptionProviderKind::None,
            self_hosted_url: None,
            cloud_url: "https://api.openai.com/v1/audio/transcriptions".to_string(),
            cloud_api_key: None,
            cloud_model: "whisper-1".to_string(),
            max_upload_bytes: 25 * 1024 * 1024,
        }
    }
}

impl Default for EditingDefaults {
    fn default() -> Self {
        Self {
            min_silence_secs: 1.0,
            silence_threshold_db: -40.0,
            noise_reduction_db: 12.0,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

impl AppConfig {
    /// Load config from the standard location, falling back to defaults.
    pub fn load() -> Self {
        Self::load_from(&config_file_path())
    }

    /// Load config from an explicit file, falling back to defaults.
    ///
    /// Environment overrides are applied on top of whatever was loaded.
    pub fn load_from(config_path: &Path) -> Self {
        let mut config = Self::default();
        if config_path.exists() {
            match std::fs::read_to_string(config_path) {
                Ok(content) => match serde_json::from_str(&content) {
                    Ok(parsed) => config = parsed,
                    Err(e) => {
                        tracing::warn!("Failed to parse config at {:?}: {}", config_path, e);
                    }
                },
                Err(e) => {
                    tracing::warn!("Failed to read config at {:?}: {}", config_path, e);
                }
            }
        }
        config.apply_env_overrides();
        config
    }

    /// Save config to the standard location.
    pub fn save(&self) -> Result<(), std::io::Error> {
        let config_path = config_file_path();
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self).map_err(std::io::Error::other)?;
        std::fs::write(config_path, json)
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(root) = std::env::var("CASTKIT_DATA_ROOT") {
            self.data_root = PathBuf::from(root);
        }
        if let Ok(url) = std::env::var("CASTKIT_ASR_URL") {
            self.transcription.self_hosted_url = Some(url);
            if self.transcription.provider == TranscriptionProviderKind::None {
                self.transcription.provider = TranscriptionProviderKind::SelfHosted;
            }
        }
        if let Ok(key) = std::env::var("CASTKIT_CLOUD_API_KEY") {
            self.transcription.cloud_api_key = Some(key);
        }
    }
}

/// Standard config file location.
pub fn config_file_path() -> PathBuf {
    let base = std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
            PathBuf::from(home).join(".config")
        });
    base.join("castkit").join("config.json")
}

/// Default data root.
fn dirs_default_data_root() -> PathBuf {
    let base = std::env::var("XDG_DATA_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
            PathBuf::from(home).join(".local").join("share")
        });
    base.join("castkit")
}
