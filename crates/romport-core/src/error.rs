//! Error types for romport.
//!
//! Two layers live here:
//! - [`RomportError`] covers infrastructure failures (IO, database, cloud,
//!   network) and is what `Result<T>` carries through the library.
//! - [`ImportError`] is the per-file taxonomy collected during an import batch.
//!   These are never thrown across the batch boundary; they are gathered and
//!   handed to the resolution sequencer or the final summary.

use crate::config::NetworkConfig;
use crate::store::GameRecord;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Main error type for the romport library.
#[derive(Debug, Error)]
pub enum RomportError {
    // Network errors
    #[error("Network error: {message}")]
    Network {
        message: String,
        /// Optional cause description
        cause: Option<String>,
    },

    #[error("Request timeout after {0:?}")]
    Timeout(std::time::Duration),

    // Database errors
    #[error("Database error: {message}")]
    Database {
        message: String,
        #[source]
        source: Option<rusqlite::Error>,
    },

    // File system errors
    #[error("IO error at {path:?}: {message}")]
    Io {
        message: String,
        path: Option<PathBuf>,
        #[source]
        source: Option<std::io::Error>,
    },

    // Serialization errors
    #[error("JSON error: {message}")]
    Json {
        message: String,
        #[source]
        source: Option<serde_json::Error>,
    },

    // Cloud store errors
    #[error("Cloud store error for {path}: {message}")]
    Cloud { path: String, message: String },

    #[error("Download already in progress: {0}")]
    DownloadInProgress(String),

    // Configuration errors
    #[error("Configuration error: {message}")]
    Config { message: String },

    // Generic errors
    #[error("{0}")]
    Other(String),
}

/// Result type alias for romport operations.
pub type Result<T> = std::result::Result<T, RomportError>;

// Conversion implementations for common error types

impl From<std::io::Error> for RomportError {
    fn from(err: std::io::Error) -> Self {
        RomportError::Io {
            message: err.to_string(),
            path: None,
            source: Some(err),
        }
    }
}

impl From<serde_json::Error> for RomportError {
    fn from(err: serde_json::Error) -> Self {
        RomportError::Json {
            message: err.to_string(),
            source: Some(err),
        }
    }
}

impl From<rusqlite::Error> for RomportError {
    fn from(err: rusqlite::Error) -> Self {
        RomportError::Database {
            message: err.to_string(),
            source: Some(err),
        }
    }
}

impl From<reqwest::Error> for RomportError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            // The only HTTP client is the cover lookup one.
            RomportError::Timeout(NetworkConfig::COVER_LOOKUP_TIMEOUT)
        } else {
            RomportError::Network {
                message: err.to_string(),
                cause: Some(err.to_string()),
            }
        }
    }
}

impl RomportError {
    /// Create an IO error with path context.
    pub fn io_with_path(err: std::io::Error, path: impl Into<PathBuf>) -> Self {
        RomportError::Io {
            message: err.to_string(),
            path: Some(path.into()),
            source: Some(err),
        }
    }

    /// Create a cloud store error for a remote path.
    pub fn cloud(path: impl Into<String>, message: impl Into<String>) -> Self {
        RomportError::Cloud {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Check if a transfer that failed with this error is worth retrying.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            RomportError::Network { .. }
                | RomportError::Timeout(_)
                | RomportError::Cloud { .. }
                | RomportError::DownloadInProgress(_)
        )
    }
}

/// Recoverable, per-file import failure.
///
/// Each variant carries enough context (paths, candidate games) to drive a
/// follow-up resolution flow or to render a line in the batch summary.
#[derive(Debug, Clone, Error)]
pub enum ImportError {
    #[error("{file_name} has already been imported")]
    FileAlreadyExists { file_name: String },

    #[error("Failed to copy {file_name} into the library")]
    BadCopy { file_name: String },

    #[error("{file_name} could not be read")]
    BadFile { file_name: String },

    #[error("Failed to record {file_name} in the library database")]
    WriteFailed { file_name: String },

    #[error("{file_name} has an unsupported extension")]
    UnsupportedExtension { file_name: String },

    #[error("{} is not a file type that can be imported", path.display())]
    PermissionDenied { path: PathBuf },

    #[error("{descriptor} references {missing}, which was not provided")]
    MissingSiblingFile { descriptor: String, missing: String },

    #[error("Playlist {playlist} references {missing}, which was not provided")]
    MissingFile { playlist: String, missing: String },

    #[error("{file_name} is not a valid multi-file descriptor")]
    BadMultiFileDescriptor { file_name: String },

    #[error("No game matches the save file {}", save.display())]
    SaveNoMatchingGame { save: PathBuf },

    #[error("The save file {} matches {} games", save.display(), candidates.len())]
    SaveAmbiguousMatch {
        save: PathBuf,
        candidates: Vec<GameRecord>,
    },

    #[error("{} already has a save file", game.name)]
    SaveAlreadyExists { save: PathBuf, game: GameRecord },

    #[error("{file_name} is not a valid save bundle")]
    SaveBundleInvalid { file_name: String },

    #[error("Saves from {} already exist", bundle.display())]
    SaveBundleAlreadyExists { bundle: PathBuf },

    #[error("A skin with identifier {identifier} is already installed")]
    SkinIdentifierConflict { identifier: String },

    #[error("{file_name} is not a valid controller skin")]
    SkinMalformed { file_name: String },

    #[error("{file_name} is password protected")]
    ArchiveEncrypted { file_name: String },

    #[error("{file_name} contains no supported files")]
    ArchiveNothingSupported { file_name: String },

    #[error("Failed to extract {file_name}: {reason}")]
    ArchiveExtractFailed { file_name: String, reason: String },

    #[error("Nothing to import")]
    EmptyInput,
}

impl ImportError {
    /// Whether this error can be resolved through an interactive prompt.
    pub fn is_interactive(&self) -> bool {
        matches!(
            self,
            ImportError::SaveNoMatchingGame { .. }
                | ImportError::SaveAmbiguousMatch { .. }
                | ImportError::SaveAlreadyExists { .. }
                | ImportError::SaveBundleAlreadyExists { .. }
        )
    }
}

/// File name of a path for user-facing messages.
pub(crate) fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}
