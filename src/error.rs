// src/error.rs

//! Error types for conda-convert
//!
//! Per-package rejections (native code, entry points) are not errors; they are
//! reported as [`crate::convert::SkipReason`] values. This enum covers the
//! conditions that stop work on a package or on the whole invocation.

use std::path::PathBuf;
use thiserror::Error;

use crate::compression::CompressionError;

/// Result type for conda-convert operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while reading, converting, or writing packages
#[derive(Error, Debug)]
pub enum Error {
    /// Input does not look like a conda package
    #[error("{} does not appear to be a conda package: {reason}", path.display())]
    NotAPackage { path: PathBuf, reason: String },

    /// `info/index.json` is missing or cannot be parsed
    #[error("corrupt manifest in {}: {reason}", path.display())]
    CorruptManifest { path: PathBuf, reason: String },

    /// A layout rule needs the interpreter version and the manifest has none
    #[error("cannot map {entry}: no interpreter version declared in the package manifest")]
    MissingInterpreterVersion { entry: String },

    /// The manifest depends on more than one interpreter version
    #[error("found more than one Python dependency in package: {}", versions.join(", "))]
    AmbiguousInterpreterVersion { versions: Vec<String> },

    /// Two archive entries would land on the same destination path
    #[error("entries {first} and {second} both map to {destination}")]
    MappingConflict {
        destination: String,
        first: String,
        second: String,
    },

    /// Platform token outside the supported set
    #[error("unknown platform: {0}")]
    UnknownPlatform(String),

    /// Archive entry escapes the package root
    #[error("path traversal attempt in archive entry: {0}")]
    PathTraversal(String),

    /// Archive entry path is unusable
    #[error("invalid path: {0}")]
    InvalidPath(String),

    /// Entry listing or entry content could not be read
    #[error("failed to read {entry}: {reason}")]
    ReadError { entry: String, reason: String },

    /// Destination package could not be written
    #[error("failed to write {}: {reason}", path.display())]
    WriteError { path: PathBuf, reason: String },

    /// Output directory is the directory of an input package
    #[error("cannot use the same output directory as the input files: {}", dir.display())]
    OutputCollision { dir: PathBuf },

    /// Compression layer failure
    #[error(transparent)]
    Compression(#[from] CompressionError),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Build a `WriteError` from any displayable cause
    pub fn write(path: impl Into<PathBuf>, reason: impl std::fmt::Display) -> Self {
        Self::WriteError {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    /// Build a `ReadError` from any displayable cause
    pub fn read(entry: impl Into<String>, reason: impl std::fmt::Display) -> Self {
        Self::ReadError {
            entry: entry.into(),
            reason: reason.to_string(),
        }
    }
}
