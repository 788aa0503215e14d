//! End-to-end checks against a real ffmpeg. Skipped when it is not installed.

use std::path::Path;

use castkit_audio_engine::tool::{command_exists, run_tool, Args};
use castkit_audio_engine::{install_replacement, AudioEngine};
use castkit_common::config::ToolsConfig;
use castkit_common::sandbox::{ArtifactKind, SandboxedPath};
use castkit_episode_model::episode::{AudioFormat, RenderSettings};

fn tools_present() -> bool {
    command_exists("ffmpeg") && command_exists("ffprobe")
}

async fn synth(dir: &Path, name: &str, expr: &str, secs: f64) -> SandboxedPath {
    let out = dir.join(name);
    let args = Args::new()
        .args(["-y", "-hide_banner", "-loglevel", "error", "-f", "lavfi", "-i"])
        .arg(format!("aevalsrc={expr}:s=44100:d={secs}"))
        .arg(&out);
    run_tool("ffmpeg", args.as_slice()).await.unwrap();
    SandboxedPath::new(dir, name).unwrap()
}

async fn tone(dir: &Path, name: &str, secs: f64) -> SandboxedPath {
    synth(dir, name, "0.5*sin(440*2*PI*t)", secs).await
}

fn engine() -> AudioEngine {
    AudioEngine::new(ToolsConfig::default())
}

#[tokio::test]
async fn concatenated_duration_is_the_sum_of_inputs() {
    if !tools_present() {
        eprintln!("ffmpeg not found, skipping");
        return;
    }
    let dir = tempfile::tempdir().unwrap();
    let a = tone(dir.path(), "a.wav", 3.0).await;
    let b = tone(dir.path(), "b.wav", 5.0).await;
    let out = SandboxedPath::new(dir.path(), "final.mp3").unwrap();

    let engine = engine();
    let settings = RenderSettings {
        format: AudioFormat::Mp3,
        bitrate_kbps: 128,
        channels: 2,
    };
    engine.concatenate(&[a, b], &out, &settings).await.unwrap();

    let info = engine.probe(&out).await.unwrap();
    assert!((info.duration_secs - 8.0).abs() < 0.2, "got {}", info.duration_secs);
    assert_eq!(info.mime, "audio/mpeg");
}

#[tokio::test]
async fn trim_keeps_the_requested_window_and_install_renames() {
    if !tools_present() {
        eprintln!("ffmpeg not found, skipping");
        return;
    }
    let dir = tempfile::tempdir().unwrap();
    let clip = tone(dir.path(), "clip.wav", 10.0).await;
    std::fs::write(
        clip.derived(ArtifactKind::Transcript).as_path(),
        "1\n00:00:01,000 --> 00:00:02,000\nhello\n",
    )
    .unwrap();
    std::fs::write(clip.derived(ArtifactKind::Waveform).as_path(), "{}").unwrap();

    let engine = engine();
    let output = engine.trim(&clip, 2.0, 6.0).await.unwrap();
    assert!((output.duration_secs() - 4.0).abs() < 0.1);

    let installed = install_replacement(output, &clip).unwrap();
    assert_ne!(installed.path.as_path(), clip.as_path());
    assert!(installed.path.exists());
    assert!(installed.transcript_moved);
    assert!(installed.path.derived(ArtifactKind::Transcript).exists());
    assert!(!clip.exists());
    assert!(!clip.derived(ArtifactKind::Transcript).exists());
    assert!(!clip.derived(ArtifactKind::Waveform).exists());

    let leftovers: Vec<_> = std::fs::read_dir(dir.path())
        .unwrap()
        .filter_map(Result::ok)
        .filter(|e| e.file_name().to_string_lossy().starts_with(".castkit-edit-"))
        .collect();
    assert!(leftovers.is_empty());
}

#[tokio::test]
async fn trim_rejects_out_of_range_bounds() {
    if !tools_present() {
        eprintln!("ffmpeg not found, skipping");
        return;
    }
    let dir = tempfile::tempdir().unwrap();
    let clip = tone(dir.path(), "clip.wav", 4.0).await;
    let engine = engine();

    for (start, end) in [(-1.0, 2.0), (3.0, 2.0), (0.0, 9.0), (4.0, 4.0)] {
        let err = engine.trim(&clip, start, end).await.unwrap_err();
        assert_eq!(err.kind(), "validation", "{start}..{end}");
    }
    assert!(clip.exists());
}

#[tokio::test]
async fn silence_in_the_middle_is_detected_and_removed() {
    if !tools_present() {
        eprintln!("ffmpeg not found, skipping");
        return;
    }
    let dir = tempfile::tempdir().unwrap();
    let clip = synth(
        dir.path(),
        "gappy.wav",
        "if(between(t\\,2\\,5)\\,0\\,0.5*sin(440*2*PI*t))",
        7.0,
    )
    .await;
    let engine = engine();

    let removal = engine
        .remove_silence(&clip, 1.0, -40.0)
        .await
        .unwrap()
        .expect("silence should be found");
    assert_eq!(removal.spans.len(), 1);
    assert!((removal.spans[0].start_secs - 2.0).abs() < 0.2);
    assert!((removal.output.duration_secs() - 4.0).abs() < 0.3);
}

#[cfg(unix)]
#[tokio::test]
async fn silence_removal_inspects_the_source_once() {
    use std::os::unix::fs::PermissionsExt;

    if !tools_present() {
        eprintln!("ffmpeg not found, skipping");
        return;
    }
    let dir = tempfile::tempdir().unwrap();
    let log = dir.path().join("ffprobe.log");
    let wrapper = dir.path().join("logging-ffprobe");
    std::fs::write(
        &wrapper,
        format!("#!/bin/sh\necho \"$@\" >> '{}'\nexec ffprobe \"$@\"\n", log.display()),
    )
    .unwrap();
    std::fs::set_permissions(&wrapper, std::fs::Permissions::from_mode(0o755)).unwrap();

    let clip = synth(
        dir.path(),
        "gappy.wav",
        "if(between(t\\,2\\,5)\\,0\\,0.5*sin(440*2*PI*t))",
        7.0,
    )
    .await;
    let engine = AudioEngine::new(ToolsConfig {
        ffprobe: wrapper.display().to_string(),
        ..ToolsConfig::default()
    });

    engine
        .remove_silence(&clip, 1.0, -40.0)
        .await
        .unwrap()
        .expect("silence should be found");

    let calls = std::fs::read_to_string(&log).unwrap();
    let source_calls = calls.lines().filter(|l| l.contains("gappy.wav")).count();
    assert_eq!(source_calls, 1, "{calls}");
}

#[tokio::test]
async fn continuous_tone_has_no_silence() {
    if !tools_present() {
        eprintln!("ffmpeg not found, skipping");
        return;
    }
    let dir = tempfile::tempdir().unwrap();
    let clip = tone(dir.path(), "tone.wav", 3.0).await;
    assert!(engine().remove_silence(&clip, 1.0, -40.0).await.unwrap().is_none());
}

#[tokio::test]
async fn noise_suppression_keeps_duration() {
    if !tools_present() {
        eprintln!("ffmpeg not found, skipping");
        return;
    }
    let dir = tempfile::tempdir().unwrap();
    let clip = tone(dir.path(), "tone.wav", 3.0).await;
    let output = engine().apply_noise_suppression(&clip, 12.0).await.unwrap();
    assert!((output.duration_secs() - 3.0).abs() < 0.1);
}
