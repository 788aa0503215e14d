//! Media inspection via ffprobe.

use serde::{Deserialize, Serialize};

use castkit_common::error::{CastError, CastResult};

/// What ffprobe reports about an audio file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProbeInfo {
    pub duration_secs: f64,
    /// ffprobe's demuxer name list, e.g. `mov,mp4,m4a,3gp,3g2,mj2`.
    pub format_name: String,
    pub mime: String,
    pub size_bytes: u64,
}

#[derive(Debug, Deserialize)]
struct ProbeDocument {
    format: Option<ProbeFormat>,
}

#[derive(Debug, Deserialize)]
struct ProbeFormat {
    format_name: Option<String>,
    duration: Option<String>,
    size: Option<String>,
}

/// Parse `ffprobe -show_entries format=duration,format_name,size -of json`.
pub(crate) fn parse_probe_json(json: &str, fallback_size: u64) -> CastResult<ProbeInfo> {
    let doc: ProbeDocument = serde_json::from_str(json)?;
    let format = doc
        .format
        .ok_or_else(|| CastError::processing("ffprobe output has no format section"))?;

    let duration_secs = format
        .duration
        .as_deref()
        .and_then(|d| d.trim().parse::<f64>().ok())
        .filter(|d| d.is_finite() && *d >= 0.0)
        .ok_or_else(|| CastError::processing("ffprobe did not report a duration"))?;

    let format_name = format.format_name.unwrap_or_default();
    let size_bytes = format
        .size
        .as_deref()
        .and_then(|s| s.trim().parse::<u64>().ok())
        .unwrap_or(fallback_size);

    Ok(ProbeInfo {
        duration_secs,
        mime: mime_for_format(&format_name).to_string(),
        format_name,
        size_bytes,
    })
}

/// Best MIME type for an ffprobe format name.
pub fn mime_for_format(format_name: &str) -> &'static str {
    let names: Vec<&str> = format_name.split(',').map(str::trim).collect();
    let has = |n: &str| names.contains(&n);

    if has("mp3") {
        "audio/mpeg"
    } else if has("wav") {
        "audio/wav"
    } else if has("ogg") {
        "audio/ogg"
    } else if has("flac") {
        "audio/flac"
    } else if has("m4a") || has("mp4") || has("mov") {
        "audio/mp4"
    } else if has("webm") || has("matroska") {
        "audio/webm"
    } else if has("aac") {
        "audio/aac"
    } else {
        "application/octet-stream"
    }
}
