//! Error types for resolution, discovery and conversion.
//!
//! Resolution and root-level discovery errors stop a run before any work starts.
//! Everything else is scoped to one path and ends up in a report.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ResolveError {
    #[error("Unknown output format: {0}")]
    UnknownFormat(String),

    #[error("Unknown quality tier: {0} (expected high, mid or low)")]
    UnknownQuality(String),
}

#[derive(Error, Debug)]
pub enum DiscoveryError {
    #[error("Cannot read input folder {path}: {source}")]
    UnreadableRoot {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Input path is not a folder: {0}")]
    NotADirectory(PathBuf),

    #[error("Cannot read {path}: {message}")]
    UnreadableEntry { path: PathBuf, message: String },

    #[error("Cannot create output folder {path}: {source}")]
    CreateOutputDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Two inputs would be written to the same output file. The later one in
    /// walk order is skipped.
    #[error("Skipping {second}: {first} already converts to {path}")]
    OutputCollision {
        path: PathBuf,
        first: PathBuf,
        second: PathBuf,
    },
}

impl DiscoveryError {
    pub fn path(&self) -> &std::path::Path {
        match self {
            DiscoveryError::UnreadableRoot { path, .. }
            | DiscoveryError::UnreadableEntry { path, .. }
            | DiscoveryError::CreateOutputDir { path, .. }
            | DiscoveryError::OutputCollision { path, .. } => path,
            DiscoveryError::NotADirectory(path) => path,
        }
    }
}

/// Failure reported by a transcoding backend.
///
/// `stderr` keeps the backend's full diagnostic output; `message` is the
/// condensed line shown to users.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct TranscodeError {
    pub message: String,
    pub stderr: String,
    pub exit_code: Option<i32>,
}

impl TranscodeError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            stderr: String::new(),
            exit_code: None,
        }
    }
}

#[derive(Error, Debug)]
pub enum ConversionError {
    #[error("Failed to decode image: {0}")]
    Decode(String),

    #[error("Failed to encode {format}: {message}")]
    Encode { format: String, message: String },

    #[error("Transcode failed: {0}")]
    Transcode(#[from] TranscodeError),

    #[error("IO error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Encoding plan has no {0} parameters")]
    PlanMismatch(&'static str),
}

impl ConversionError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        ConversionError::Io {
            path: path.into(),
            source,
        }
    }
}

#[derive(Error, Debug)]
pub enum DispatchError {
    #[error("Failed to create worker pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}
