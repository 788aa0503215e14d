//! The audio transform engine.

use std::path::{Path, PathBuf};

use castkit_common::config::ToolsConfig;
use castkit_common::error::{CastError, CastResult};
use castkit_common::sandbox::{ArtifactKind, SandboxedPath};
use castkit_episode_model::episode::RenderSettings;
use tempfile::TempDir;

use crate::encode::{build_concat_filter, codec_args_for_settings, RENDER_SAMPLE_RATE};
use crate::probe::{parse_probe_json, ProbeInfo};
use crate::silence::{build_cut_filter, normalize_spans, parse_silence_log, total_duration, SilenceSpan};
use crate::tool::{command_exists, run_tool, Args};

/// Lossless container used for every intermediate edit.
pub const INTERMEDIATE_EXTENSION: &str = "wav";

/// Width of the noise reduction range accepted by ffmpeg's `afftdn`.
const NOISE_REDUCTION_RANGE_DB: (f64, f64) = (1.0, 97.0);

/// Edit output sitting in a private temporary directory next to the source.
///
/// Dropping it removes the directory, so an abandoned edit leaves nothing
/// behind.
#[derive(Debug)]
pub struct TransformOutput {
    workspace: TempDir,
    path: PathBuf,
    probe: ProbeInfo,
}

impl TransformOutput {
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn probe(&self) -> &ProbeInfo {
        &self.probe
    }

    pub fn duration_secs(&self) -> f64 {
        self.probe.duration_secs
    }

    pub fn extension(&self) -> &str {
        self.path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or(INTERMEDIATE_EXTENSION)
    }

    pub(crate) fn workspace(&self) -> &Path {
        self.workspace.path()
    }
}

/// Outcome of silence removal.
#[derive(Debug)]
pub struct SilenceRemoval {
    pub output: TransformOutput,
    /// Spans that were cut, in source timeline seconds.
    pub spans: Vec<SilenceSpan>,
}

/// Runs ffmpeg, ffprobe, and the waveform generator.
#[derive(Debug, Clone)]
pub struct AudioEngine {
    tools: ToolsConfig,
}

impl AudioEngine {
    pub fn new(tools: ToolsConfig) -> Self {
        Self { tools }
    }

    /// Whether ffmpeg and ffprobe can be spawned.
    pub fn is_available(&self) -> bool {
        command_exists(&self.tools.ffmpeg) && command_exists(&self.tools.ffprobe)
    }

    pub fn waveform_available(&self) -> bool {
        command_exists(&self.tools.audiowaveform)
    }

    /// Duration, container, MIME type, and size of `path`.
    pub async fn probe(&self, path: &SandboxedPath) -> CastResult<ProbeInfo> {
        ensure_exists(path)?;
        let args = Args::new()
            .args(["-v", "error", "-show_entries", "format=duration,format_name,size"])
            .args(["-of", "json"])
            .arg(path.as_path());
        let output = run_tool(&self.tools.ffprobe, args.as_slice()).await?;
        let fallback_size = std::fs::metadata(path.as_path()).map(|m| m.len()).unwrap_or(0);
        parse_probe_json(&output.stdout, fallback_size)
    }

    /// Keep `[start_secs, end_secs]` of `path`.
    ///
    /// Requires `0 <= start < duration` and `start < end <= duration`.
    pub async fn trim(
        &self,
        path: &SandboxedPath,
        start_secs: f64,
        end_secs: f64,
    ) -> CastResult<TransformOutput> {
        let probe = self.probe(path).await?;
        validate_trim_range(start_secs, end_secs, probe.duration_secs)?;

        tracing::info!(
            path = %path,
            start_secs,
            end_secs,
            duration_secs = probe.duration_secs,
            "Trimming audio"
        );

        let (workspace, out) = edit_workspace(path)?;
        let args = ffmpeg_base()
            .arg("-i")
            .arg(path.as_path())
            .arg("-ss")
            .arg(format!("{start_secs:.3}"))
            .arg("-to")
            .arg(format!("{end_secs:.3}"))
            .args(["-vn", "-c:a", "pcm_s16le"])
            .arg(&out);
        run_tool(&self.tools.ffmpeg, args.as_slice()).await?;
        self.finish_output(path, workspace, out).await
    }

    /// Regions at least `min_silence_secs` long and quieter than
    /// `threshold_db`.
    pub async fn detect_silence(
        &self,
        path: &SandboxedPath,
        min_silence_secs: f64,
        threshold_db: f64,
    ) -> CastResult<Vec<SilenceSpan>> {
        validate_silence_params(min_silence_secs, threshold_db)?;
        let probe = self.probe(path).await?;
        self.run_silencedetect(path, probe.duration_secs, min_silence_secs, threshold_db)
            .await
    }

    /// Cut `spans` out of `path` and close the gaps.
    pub async fn remove_spans(
        &self,
        path: &SandboxedPath,
        spans: &[SilenceSpan],
    ) -> CastResult<TransformOutput> {
        let probe = self.probe(path).await?;
        let spans = normalize_spans(spans, probe.duration_secs);
        if spans.is_empty() {
            return Err(CastError::validation("Nothing to remove"));
        }
        if total_duration(&spans) >= probe.duration_secs - 0.001 {
            return Err(CastError::validation(
                "Removing these spans would leave no audio",
            ));
        }
        self.cut_spans(path, &spans).await
    }

    /// Detect silence and cut it. `None` when there was nothing to cut.
    pub async fn remove_silence(
        &self,
        path: &SandboxedPath,
        min_silence_secs: f64,
        threshold_db: f64,
    ) -> CastResult<Option<SilenceRemoval>> {
        validate_silence_params(min_silence_secs, threshold_db)?;
        let probe = self.probe(path).await?;
        let detected = self
            .run_silencedetect(path, probe.duration_secs, min_silence_secs, threshold_db)
            .await?;
        let spans = normalize_spans(&detected, probe.duration_secs);
        if spans.is_empty() {
            return Ok(None);
        }
        if total_duration(&spans) >= probe.duration_secs - 0.001 {
            return Err(CastError::validation(
                "The whole clip is below the silence threshold",
            ));
        }

        let output = self.cut_spans(path, &spans).await?;
        Ok(Some(SilenceRemoval { output, spans }))
    }

    async fn run_silencedetect(
        &self,
        path: &SandboxedPath,
        duration_secs: f64,
        min_silence_secs: f64,
        threshold_db: f64,
    ) -> CastResult<Vec<SilenceSpan>> {
        // silencedetect reports at info level.
        let args = Args::new()
            .args(["-hide_banner", "-nostats", "-loglevel", "info"])
            .arg("-i")
            .arg(path.as_path())
            .arg("-af")
            .arg(format!(
                "silencedetect=noise={threshold_db}dB:d={min_silence_secs}"
            ))
            .args(["-f", "null", "-"]);
        let output = run_tool(&self.tools.ffmpeg, args.as_slice()).await?;

        let spans = parse_silence_log(&output.stderr, duration_secs);
        tracing::info!(
            path = %path,
            spans = spans.len(),
            silent_secs = total_duration(&spans),
            "Silence detection finished"
        );
        Ok(spans)
    }

    /// `spans` must already be normalized against the source duration.
    async fn cut_spans(
        &self,
        path: &SandboxedPath,
        spans: &[SilenceSpan],
    ) -> CastResult<TransformOutput> {
        let (workspace, out) = edit_workspace(path)?;
        let args = ffmpeg_base()
            .arg("-i")
            .arg(path.as_path())
            .arg("-af")
            .arg(build_cut_filter(spans))
            .args(["-vn", "-c:a", "pcm_s16le"])
            .arg(&out);
        run_tool(&self.tools.ffmpeg, args.as_slice()).await?;
        self.finish_output(path, workspace, out).await
    }

    /// Spectral noise reduction. Duration is unchanged.
    pub async fn apply_noise_suppression(
        &self,
        path: &SandboxedPath,
        reduction_db: f64,
    ) -> CastResult<TransformOutput> {
        ensure_exists(path)?;
        if !reduction_db.is_finite() {
            return Err(CastError::validation("Noise reduction level must be a number"));
        }
        let reduction = reduction_db.clamp(NOISE_REDUCTION_RANGE_DB.0, NOISE_REDUCTION_RANGE_DB.1);
        tracing::info!(path = %path, reduction_db = reduction, "Applying noise suppression");

        let (workspace, out) = edit_workspace(path)?;
        let args = ffmpeg_base()
            .arg("-i")
            .arg(path.as_path())
            .arg("-af")
            .arg(format!("afftdn=nr={reduction:.1}:nf=-25"))
            .args(["-vn", "-c:a", "pcm_s16le"])
            .arg(&out);
        run_tool(&self.tools.ffmpeg, args.as_slice()).await?;
        self.finish_output(path, workspace, out).await
    }

    /// Join `inputs` in order into `output` using `settings`.
    ///
    /// Callers pass only paths they have already resolved and checked; episode
    /// ownership is not re-validated here.
    pub async fn concatenate(
        &self,
        inputs: &[SandboxedPath],
        output: &SandboxedPath,
        settings: &RenderSettings,
    ) -> CastResult<()> {
        if inputs.is_empty() {
            return Err(CastError::validation("Nothing to concatenate"));
        }
        for input in inputs {
            ensure_exists(input)?;
        }
        if let Some(parent) = output.as_path().parent() {
            std::fs::create_dir_all(parent)?;
        }

        let mut args = ffmpeg_base().arg("-nostats");
        for input in inputs {
            args = args.arg("-i").arg(input.as_path());
        }
        args = args
            .arg("-filter_complex")
            .arg(build_concat_filter(inputs.len(), settings.channels))
            .args(["-map", "[out]"])
            .arg("-ac")
            .arg(settings.channels.max(1).to_string())
            .arg("-ar")
            .arg(RENDER_SAMPLE_RATE.to_string())
            .args(codec_args_for_settings(settings))
            .arg(output.as_path());

        tracing::info!(
            inputs = inputs.len(),
            output = %output,
            format = %settings.format,
            bitrate_kbps = settings.bitrate_kbps,
            channels = settings.channels,
            "Concatenating segments"
        );
        run_tool(&self.tools.ffmpeg, args.as_slice()).await?;
        verify_output(output.as_path())
    }

    /// Write the peak-data sibling of `audio`.
    pub async fn generate_waveform_peaks(&self, audio: &SandboxedPath) -> CastResult<SandboxedPath> {
        ensure_exists(audio)?;
        let peaks = audio.derived(ArtifactKind::Waveform);
        let args = Args::new()
            .arg("-i")
            .arg(audio.as_path())
            .arg("-o")
            .arg(peaks.as_path())
            .args(["--pixels-per-second", "20", "--bits", "8"]);
        run_tool(&self.tools.audiowaveform, args.as_slice()).await?;
        verify_output(peaks.as_path())?;
        Ok(peaks)
    }

    /// [`Self::generate_waveform_peaks`] for callers that must not fail on it.
    pub async fn refresh_waveform(&self, audio: &SandboxedPath) -> bool {
        match self.generate_waveform_peaks(audio).await {
            Ok(peaks) => {
                tracing::debug!(peaks = %peaks, "Waveform peaks written");
                true
            }
            Err(e) => {
                tracing::warn!(audio = %audio, error = %e, "Waveform generation failed");
                false
            }
        }
    }

    async fn finish_output(
        &self,
        source: &SandboxedPath,
        workspace: TempDir,
        out: PathBuf,
    ) -> CastResult<TransformOutput> {
        verify_output(&out)?;
        let sandboxed = SandboxedPath::new(source.base(), &out)?;
        let probe = self.probe(&sandboxed).await?;
        Ok(TransformOutput {
            workspace,
            path: out,
            probe,
        })
    }
}

fn validate_silence_params(min_silence_secs: f64, threshold_db: f64) -> CastResult<()> {
    if !(min_silence_secs > 0.0) {
        return Err(CastError::validation(
            "Minimum silence length must be positive",
        ));
    }
    if !(threshold_db < 0.0 && threshold_db >= -120.0) {
        return Err(CastError::validation(
            "Silence threshold must be between -120 dB and 0 dB",
        ));
    }
    Ok(())
}

/// Reject ranges outside `[0, duration]` or with `end <= start`.
pub fn validate_trim_range(start_secs: f64, end_secs: f64, duration_secs: f64) -> CastResult<()> {
    if !start_secs.is_finite() || !end_secs.is_finite() {
        return Err(CastError::validation("Trim bounds must be numbers"));
    }
    if start_secs < 0.0 || start_secs >= duration_secs {
        return Err(CastError::validation(format!(
            "Trim start {start_secs:.3}s must be within [0, {duration_secs:.3})"
        )));
    }
    if end_secs <= start_secs {
        return Err(CastError::validation(format!(
            "Trim end {end_secs:.3}s must be after start {start_secs:.3}s"
        )));
    }
    if end_secs > duration_secs {
        return Err(CastError::validation(format!(
            "Trim end {end_secs:.3}s exceeds duration {duration_secs:.3}s"
        )));
    }
    Ok(())
}

fn ffmpeg_base() -> Args {
    Args::new().args(["-y", "-hide_banner", "-loglevel", "error"])
}

fn ensure_exists(path: &SandboxedPath) -> CastResult<()> {
    if path.exists() {
        Ok(())
    } else {
        Err(CastError::FileNotFound {
            path: path.as_path().to_path_buf(),
        })
    }
}

/// The file must exist and be non-empty.
fn verify_output(path: &Path) -> CastResult<()> {
    match std::fs::metadata(path) {
        Ok(meta) if meta.len() > 0 => Ok(()),
        Ok(_) => Err(CastError::processing(format!(
            "{} was produced empty",
            path.display()
        ))),
        Err(_) => Err(CastError::processing(format!(
            "{} was not produced",
            path.display()
        ))),
    }
}

/// Private directory beside `source` plus the intermediate output path in it.
fn edit_workspace(source: &SandboxedPath) -> CastResult<(TempDir, PathBuf)> {
    let parent = source.as_path().parent().unwrap_or(source.base());
    let workspace = tempfile::Builder::new()
        .prefix(".castkit-edit-")
        .tempdir_in(parent)?;
    let out = workspace
        .path()
        .join(format!("out.{INTERMEDIATE_EXTENSION}"));
    Ok((workspace, out))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trim_range_validation() {
        assert!(validate_trim_range(0.0, 5.0, 10.0).is_ok());
        assert!(validate_trim_range(2.0, 10.0, 10.0).is_ok());

        assert!(validate_trim_range(-0.5, 5.0, 10.0).is_err());
        assert!(validate_trim_range(10.0, 10.0, 10.0).is_err());
        assert!(validate_trim_range(5.0, 5.0, 10.0).is_err());
        assert!(validate_trim_range(5.0, 4.0, 10.0).is_err());
        assert!(validate_trim_range(0.0, 10.5, 10.0).is_err());
        assert!(validate_trim_range(f64::NAN, 1.0, 10.0).is_err());
    }

    #[test]
    fn test_trim_end_may_reach_but_not_pass_duration() {
        assert!(validate_trim_range(0.0, 12.345, 12.345).is_ok());
        assert!(validate_trim_range(0.0, 12.3455, 12.345).is_err());
        assert!(validate_trim_range(0.0, 12.346, 12.345).is_err());
    }

    #[test]
    fn test_trim_errors_are_validation() {
        let err = validate_trim_range(3.0, 1.0, 10.0).unwrap_err();
        assert_eq!(err.kind(), "validation");
    }

    #[test]
    fn test_edit_workspace_is_beside_source_and_cleaned_up() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("clip.mp3"), b"x").unwrap();
        let source = SandboxedPath::new(dir.path(), "clip.mp3").unwrap();

        let (workspace, out) = edit_workspace(&source).unwrap();
        let workspace_path = workspace.path().to_path_buf();
        assert_eq!(workspace_path.parent(), source.as_path().parent());
        assert!(out.ends_with("out.wav"));

        drop(workspace);
        assert!(!workspace_path.exists());
    }

    #[test]
    fn test_verify_output_rejects_empty_and_missing() {
        let dir = tempfile::tempdir().unwrap();
        let empty = dir.path().join("empty.wav");
        std::fs::write(&empty, b"").unwrap();
        assert!(verify_output(&empty).is_err());
        assert!(verify_output(&dir.path().join("missing.wav")).is_err());

        let full = dir.path().join("full.wav");
        std::fs::write(&full, b"RIFF").unwrap();
        assert!(verify_output(&full).is_ok());
    }

    #[tokio::test]
    async fn test_operations_on_missing_files_fail_before_spawning() {
        let dir = tempfile::tempdir().unwrap();
        let engine = AudioEngine::new(ToolsConfig {
            ffmpeg: "castkit-no-such-ffmpeg".to_string(),
            ffprobe: "castkit-no-such-ffprobe".to_string(),
            audiowaveform: "castkit-no-such-audiowaveform".to_string(),
        });
        let missing = SandboxedPath::new(dir.path(), "missing.mp3").unwrap();

        assert!(matches!(
            engine.probe(&missing).await,
            Err(CastError::FileNotFound { .. })
        ));
        assert!(matches!(
            engine.apply_noise_suppression(&missing, 12.0).await,
            Err(CastError::FileNotFound { .. })
        ));
        assert!(!engine.refresh_waveform(&missing).await);
    }
}
