//! Error types shared across castkit crates.

use std::path::PathBuf;

/// Top-level error type for castkit operations.
#[derive(Debug, thiserror::Error)]
pub enum CastError {
    #[error("Invalid input: {message}")]
    Validation { message: String },

    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    #[error("Permission denied: {message}")]
    PermissionDenied { message: String },

    #[error("Conflict: {message}")]
    Conflict { message: String },

    #[error("Audio too large for transcription: {size_bytes} bytes exceeds limit of {limit_bytes} bytes")]
    OversizedInput { size_bytes: u64, limit_bytes: u64 },

    #[error("Processing error: {message}")]
    Processing { message: String },

    #[error("Path escapes sandbox {base}: {path}")]
    PathEscape { base: PathBuf, path: PathBuf },

    #[error("Transcription error: {message}")]
    Transcription { message: String },

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("File not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Result type alias using CastError.
pub type CastResult<T> = Result<T, CastError>;

impl CastError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
            message: msg.into(),
        }
    }

    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    pub fn permission_denied(msg: impl Into<String>) -> Self {
        Self::PermissionDenied {
            message: msg.into(),
        }
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict {
            message: msg.into(),
        }
    }

    pub fn processing(msg: impl Into<String>) -> Self {
        Self::Processing {
            message: msg.into(),
        }
    }

    pub fn transcription(msg: impl Into<String>) -> Self {
        Self::Transcription {
            message: msg.into(),
        }
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Stable machine-readable token for this error category.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Validation { .. } => "validation",
            Self::NotFound { .. } | Self::FileNotFound { .. } => "not_found",
            Self::PermissionDenied { .. } | Self::PathEscape { .. } => "permission_denied",
            Self::Conflict { .. } => "conflict",
            Self::OversizedInput { .. } => "audio_too_large",
            Self::Transcription { .. } => "transcription_failed",
            Self::Config { .. } => "not_configured",
            Self::Processing { .. } | Self::Io(_) | Self::Json(_) | Self::Other(_) => {
                "processing_failed"
            }
        }
    }

    /// HTTP-style status code an outer surface should report.
    pub fn status_code(&self) -> u16 {
        match self {
            Self::Validation { .. } => 400,
            Self::PermissionDenied { .. } | Self::PathEscape { .. } => 403,
            Self::NotFound { .. } | Self::FileNotFound { .. } => 404,
            Self::Conflict { .. } => 409,
            Self::OversizedInput { .. } => 413,
            Self::Config { .. } => 503,
            Self::Processing { .. }
            | Self::Transcription { .. }
            | Self::Io(_)
            | Self::Json(_)
            | Self::Other(_) => 500,
        }
    }

    /// Whether the failure was caused by the request rather than the system.
    pub fn is_client_error(&self) -> bool {
        (400..500).contains(&self.status_code())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_oversized_input_has_its_own_token_and_status() {
        let err = CastError::OversizedInput {
            size_bytes: 30_000_000,
            limit_bytes: 25_000_000,
        };
        assert_eq!(err.kind(), "audio_too_large");
        assert_eq!(err.status_code(), 413);
        assert!(err.is_client_error());
    }

    #[test]
    fn test_sandbox_violation_reports_as_forbidden() {
        let err = CastError::PathEscape {
            base: PathBuf::from("/data"),
            path: PathBuf::from("/etc/passwd"),
        };
        assert_eq!(err.status_code(), 403);
        assert!(err.to_string().contains("/etc/passwd"));
    }

    #[test]
    fn test_processing_failures_are_server_errors() {
        let err = CastError::processing("ffmpeg exited with status 1");
        assert_eq!(err.kind(), "processing_failed");
        assert!(!err.is_client_error());
    }
}
