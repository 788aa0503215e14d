//! Encoder arguments and filter graphs for episode rendering.

use castkit_episode_model::episode::{AudioFormat, RenderSettings};

/// Sample rate every input is resampled to before concatenation. Opus only
/// accepts 48 kHz, so the whole graph runs at that rate.
pub const RENDER_SAMPLE_RATE: u32 = 48_000;

/// Codec arguments for the final file.
pub fn codec_args_for_settings(settings: &RenderSettings) -> Vec<String> {
    let bitrate = format!("{}k", settings.bitrate_kbps.clamp(32, 320));

    match settings.format {
        AudioFormat::Mp3 => vec![
            "-c:a".to_string(),
            "libmp3lame".to_string(),
            "-b:a".to_string(),
            bitrate,
        ],
        AudioFormat::Aac => vec![
            "-c:a".to_string(),
            "aac".to_string(),
            "-b:a".to_string(),
            bitrate,
            "-movflags".to_string(),
            "+faststart".to_string(),
        ],
        AudioFormat::Ogg => vec![
            "-c:a".to_string(),
            "libopus".to_string(),
            "-b:a".to_string(),
            bitrate,
        ],
        AudioFormat::Wav => vec!["-c:a".to_string(), "pcm_s16le".to_string()],
    }
}

/// `channel_layouts` value for a channel count.
fn channel_layout(channels: u8) -> &'static str {
    if channels <= 1 {
        "mono"
    } else {
        "stereo"
    }
}

/// Filter graph that normalizes `inputs` streams to one sample format and
/// layout, then concatenates them in order into `[out]`.
pub fn build_concat_filter(inputs: usize, channels: u8) -> String {
    let layout = channel_layout(channels);
    let mut graph = String::new();
    for i in 0..inputs {
        graph.push_str(&format!(
            "[{i}:a]aresample={RENDER_SAMPLE_RATE},aformat=sample_fmts=fltp:channel_layouts={layout}[a{i}];"
        ));
    }
    for i in 0..inputs {
        graph.push_str(&format!("[a{i}]"));
    }
    graph.push_str(&format!("concat=n={inputs}:v=0:a=1[out]"));
    graph
}
