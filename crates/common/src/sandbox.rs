//! Paths proven to resolve inside an approved base directory.
//!
//! Every file that takes part in an audio transform is addressed through a
//! [`SandboxedPath`]. The only way to obtain one is [`SandboxedPath::new`],
//! which checks the candidate twice:
//!
//! 1. **Lexically**, before touching the filesystem: `.`/`..` components are
//!    folded and the result must stay under the base directory.
//! 2. **Physically**: the deepest existing ancestor is canonicalized so a
//!    symlink pointing outside the base is caught as well.
//!
//! Audio, transcript, and waveform files for one asset are siblings that share
//! a base name; [`derived_path`] is the single place that naming rule lives.

use std::fmt;
use std::path::{Component, Path, PathBuf};

use crate::error::{CastError, CastResult};

/// Kinds of sibling artifacts stored next to an audio file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArtifactKind {
    /// Time-coded transcript (`.srt`).
    Transcript,
    /// Peak data for waveform rendering (`.json`).
    Waveform,
}

impl ArtifactKind {
    pub fn extension(self) -> &'static str {
        match self {
            ArtifactKind::Transcript => "srt",
            ArtifactKind::Waveform => "json",
        }
    }
}

/// Path of the `kind` artifact belonging to `audio`: same directory and base
/// name, different extension.
pub fn derived_path(audio: &Path, kind: ArtifactKind) -> PathBuf {
    audio.with_extension(kind.extension())
}

/// A file path that has been validated to live under `base`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SandboxedPath {
    base: PathBuf,
    path: PathBuf,
}

impl SandboxedPath {
    /// Validate `candidate` against `base`.
    ///
    /// Relative candidates are resolved against `base`. The candidate itself
    /// does not need to exist, which lets output paths be sandboxed too, but
    /// `base` must.
    pub fn new(base: impl AsRef<Path>, candidate: impl AsRef<Path>) -> CastResult<Self> {
        let base = base.as_ref();
        let candidate = candidate.as_ref();

        let lexical_base =
            normalize_lexically(&absolutize(base)).ok_or_else(|| escape(base, candidate))?;
        let joined = if candidate.is_absolute() {
            candidate.to_path_buf()
        } else {
            lexical_base.join(candidate)
        };
        let lexical = normalize_lexically(&joined).ok_or_else(|| escape(base, candidate))?;
        if !lexical.starts_with(&lexical_base) {
            return Err(escape(base, candidate));
        }

        let physical_base = base.canonicalize().map_err(|_| CastError::FileNotFound {
            path: base.to_path_buf(),
        })?;
        let physical = resolve_existing_prefix(&lexical)?;
        if !physical.starts_with(&physical_base) {
            tracing::warn!(
                base = %physical_base.display(),
                path = %physical.display(),
                "Rejected path resolving outside the sandbox"
            );
            return Err(escape(base, candidate));
        }

        Ok(Self {
            base: physical_base,
            path: physical,
        })
    }

    /// The resolved absolute path.
    pub fn as_path(&self) -> &Path {
        &self.path
    }

    /// The canonical base directory this path was validated against.
    pub fn base(&self) -> &Path {
        &self.base
    }

    /// Path relative to the base directory.
    pub fn relative(&self) -> &Path {
        self.path.strip_prefix(&self.base).unwrap_or(&self.path)
    }

    /// The sibling artifact of `kind`. Stays in the same directory, so it is
    /// inside the sandbox by construction.
    pub fn derived(&self, kind: ArtifactKind) -> SandboxedPath {
        SandboxedPath {
            base: self.base.clone(),
            path: derived_path(&self.path, kind),
        }
    }

    /// Another file in the same directory.
    pub fn sibling(&self, file_name: &str) -> CastResult<SandboxedPath> {
        let parent = self.path.parent().unwrap_or(&self.base);
        SandboxedPath::new(&self.base, parent.join(file_name))
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }
}

impl AsRef<Path> for SandboxedPath {
    fn as_ref(&self) -> &Path {
        &self.path
    }
}

impl fmt::Display for SandboxedPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.path.display())
    }
}

fn escape(base: &Path, candidate: &Path) -> CastError {
    CastError::PathEscape {
        base: base.to_path_buf(),
        path: candidate.to_path_buf(),
    }
}

fn absolutize(path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .unwrap_or_else(|_| PathBuf::from("/"))
            .join(path)
    }
}

/// Fold `.` and `..` without consulting the filesystem. Returns `None` when
/// `..` would climb above the root.
fn normalize_lexically(path: &Path) -> Option<PathBuf> {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::Prefix(_) | Component::RootDir => out.push(component.as_os_str()),
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() || out.as_os_str().is_empty() {
                    return None;
                }
            }
            Component::Normal(part) => out.push(part),
        }
    }
    Some(out)
}

/// Canonicalize the deepest existing ancestor of `path` and re-append the
/// components that do not exist yet.
fn resolve_existing_prefix(path: &Path) -> CastResult<PathBuf> {
    let mut existing = path.to_path_buf();
    let mut missing = Vec::new();
    while existing.symlink_metadata().is_err() {
        match (existing.file_name(), existing.parent()) {
            (Some(name), Some(parent)) => {
                missing.push(name.to_os_string());
                existing = parent.to_path_buf();
            }
            _ => break,
        }
    }

    let mut resolved = existing.canonicalize()?;
    for part in missing.into_iter().rev() {
        resolved.push(part);
    }
    Ok(resolved)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_relative_candidate_resolves_under_base() {
        let dir = tempfile::tempdir().unwrap();
        let path = SandboxedPath::new(dir.path(), "episodes/1/intro.mp3").unwrap();
        assert!(path.as_path().starts_with(dir.path().canonicalize().unwrap()));
        assert_eq!(path.relative(), Path::new("episodes/1/intro.mp3"));
    }

    #[test]
    fn test_parent_traversal_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let err = SandboxedPath::new(dir.path(), "../outside.mp3").unwrap_err();
        assert!(matches!(err, CastError::PathEscape { .. }));

        let err = SandboxedPath::new(dir.path(), "a/../../outside.mp3").unwrap_err();
        assert!(matches!(err, CastError::PathEscape { .. }));
    }

    #[test]
    fn test_traversal_is_rejected_without_touching_the_filesystem() {
        // The base does not exist; a lexical escape must still be reported as
        // an escape rather than a missing directory.
        let err = SandboxedPath::new("/definitely/not/here", "../../etc/passwd").unwrap_err();
        assert!(matches!(err, CastError::PathEscape { .. }));
    }

    #[test]
    fn test_inner_parent_components_are_folded() {
        let dir = tempfile::tempdir().unwrap();
        let path = SandboxedPath::new(dir.path(), "a/b/../c.wav").unwrap();
        assert_eq!(path.relative(), Path::new("a/c.wav"));
    }

    #[test]
    fn test_absolute_path_outside_base_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let other = tempfile::tempdir().unwrap();
        let err = SandboxedPath::new(dir.path(), other.path().join("x.mp3")).unwrap_err();
        assert!(matches!(err, CastError::PathEscape { .. }));
    }

    #[cfg(unix)]
    #[test]
    fn test_symlink_escape_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let other = tempfile::tempdir().unwrap();
        std::fs::write(other.path().join("secret.mp3"), b"x").unwrap();
        std::os::unix::fs::symlink(other.path(), dir.path().join("link")).unwrap();

        let err = SandboxedPath::new(dir.path(), "link/secret.mp3").unwrap_err();
        assert!(matches!(err, CastError::PathEscape { .. }));
    }

    #[test]
    fn test_derived_paths_share_base_name() {
        assert_eq!(
            derived_path(Path::new("/d/clip.1a2b.wav"), ArtifactKind::Transcript),
            PathBuf::from("/d/clip.1a2b.srt")
        );
        assert_eq!(
            derived_path(Path::new("/d/clip.mp3"), ArtifactKind::Waveform),
            PathBuf::from("/d/clip.json")
        );

        let dir = tempfile::tempdir().unwrap();
        let audio = SandboxedPath::new(dir.path(), "clip.mp3").unwrap();
        let transcript = audio.derived(ArtifactKind::Transcript);
        assert_eq!(transcript.relative(), Path::new("clip.srt"));
        assert_eq!(transcript.base(), audio.base());
    }
}
