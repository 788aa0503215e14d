//! Swap an edited file in for the original.
//!
//! Every successful edit lands under a fresh file name so caches keyed on the
//! audio URL never serve stale content. The transcript follows the audio to
//! its new name; the waveform is stale and removed.

use std::path::Path;

use castkit_common::error::{CastError, CastResult};
use castkit_common::sandbox::{ArtifactKind, SandboxedPath};

use crate::engine::TransformOutput;

/// Where an installed edit ended up.
#[derive(Debug, Clone)]
pub struct InstalledAudio {
    pub path: SandboxedPath,
    pub duration_secs: f64,
    /// Whether a transcript existed and was moved beside the new file.
    pub transcript_moved: bool,
}

/// `{root}.{edit-id}.{ext}` where `root` is the original name without its
/// extension and without any earlier edit id.
pub fn edited_file_name(original: &Path, extension: &str) -> String {
    let stem = original
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("audio");
    let root = match stem.rsplit_once('.') {
        Some((root, id)) if is_edit_id(id) && !root.is_empty() => root,
        _ => stem,
    };
    format!("{root}.{}.{extension}", new_edit_id())
}

fn new_edit_id() -> String {
    uuid::Uuid::new_v4().simple().to_string()[..8].to_string()
}

fn is_edit_id(s: &str) -> bool {
    s.len() == 8 && s.chars().all(|c| c.is_ascii_hexdigit())
}

/// Move `output` beside `original` under a new name and retire the original.
///
/// The original and its waveform are deleted only after the new file is in
/// place, so a failure part way leaves the old audio usable.
pub fn install_replacement(
    output: TransformOutput,
    original: &SandboxedPath,
) -> CastResult<InstalledAudio> {
    let file_name = edited_file_name(original.as_path(), output.extension());
    let dest = original.sibling(&file_name)?;

    if let Err(rename_err) = std::fs::rename(output.path(), dest.as_path()) {
        tracing::debug!(error = %rename_err, "Rename failed, copying edited audio instead");
        std::fs::copy(output.path(), dest.as_path()).map_err(|e| {
            CastError::processing(format!("Failed to install {}: {e}", dest.as_path().display()))
        })?;
    }

    let old_transcript = original.derived(ArtifactKind::Transcript);
    let transcript_moved = if old_transcript.exists() {
        std::fs::rename(
            old_transcript.as_path(),
            dest.derived(ArtifactKind::Transcript).as_path(),
        )?;
        true
    } else {
        false
    };

    remove_if_present(original.derived(ArtifactKind::Waveform).as_path());
    if dest.as_path() != original.as_path() {
        remove_if_present(original.as_path());
    }

    tracing::info!(
        original = %original,
        installed = %dest,
        duration_secs = output.duration_secs(),
        transcript_moved,
        workspace = %output.workspace().display(),
        "Installed edited audio"
    );

    Ok(InstalledAudio {
        path: dest,
        duration_secs: output.duration_secs(),
        transcript_moved,
    })
}

fn remove_if_present(path: &Path) {
    match std::fs::remove_file(path) {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => tracing::warn!(path = %path.display(), error = %e, "Failed to remove old file"),
    }
}
