//! Error Types
//!
//! This module defines the error types used throughout the resource pipeline.
//!
//! # Overview
//!
//! The main error type [`Error`] covers all failure modes including:
//! - Import failures (missing sources, malformed assets, output write failures)
//! - Corrupt library files found while decoding
//! - Lookups for ids the database or cache does not know
//!
//! # Usage
//!
//! All public APIs return [`Result<T>`] which is an alias for `std::result::Result<T, Error>`.
//!
//! ```rust,ignore
//! use myth_library::errors::{Error, Result};
//!
//! fn load_mesh() -> Result<()> {
//!     // Operations that may fail return Result
//!     Ok(())
//! }
//! ```

use std::path::PathBuf;

use thiserror::Error;

use crate::resources::{ResourceId, ResourceType};

/// The main error type for the resource pipeline.
#[derive(Error, Debug)]
pub enum Error {
    // ========================================================================
    // Import Errors
    // ========================================================================
    /// A source asset could not be converted into library files.
    #[error(transparent)]
    Import(#[from] ImportError),

    // ========================================================================
    // Library Format Errors
    // ========================================================================
    /// A library file failed to decode.
    #[error(transparent)]
    CorruptData(#[from] CorruptDataError),

    /// A meta sidecar could not be parsed or written.
    #[error("Meta file {path}: {source}")]
    Meta {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    // ========================================================================
    // Lookup Errors
    // ========================================================================
    /// The id is unknown to the database, or its exported file is missing.
    #[error("Resource not found: {0}")]
    NotFound(ResourceId),

    /// The id is cached (or indexed) under a different resource type.
    #[error("Resource {uuid} is a {found:?}, not a {expected:?}")]
    TypeMismatch {
        uuid: ResourceId,
        expected: ResourceType,
        found: ResourceType,
    },

    /// Two meta files claim the same id and the build policy rejects it.
    #[error("Resource {uuid} is claimed by both {first} and {second}")]
    DuplicateUuid {
        uuid: ResourceId,
        first: PathBuf,
        second: PathBuf,
    },

    /// The resource exists but its payload has not arrived yet.
    #[error("Payload for resource {0} is not loaded yet")]
    PayloadPending(ResourceId),

    /// A payload was delivered to a resource that does not accept it.
    #[error("Payload for resource {0} does not match its type")]
    PayloadMismatch(ResourceId),

    // ========================================================================
    // Configuration & Runtime Errors
    // ========================================================================
    /// Configuration file could not be parsed.
    #[error("Config error: {0}")]
    Config(#[from] serde_json::Error),

    /// The background loader runtime could not be started.
    #[error("Loader runtime error: {0}")]
    Runtime(String),

    // ========================================================================
    // I/O Errors
    // ========================================================================
    /// File I/O error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Failures while importing a source asset.
///
/// Every variant leaves the managed output tree and the database as they were
/// before the import started.
#[derive(Error, Debug)]
pub enum ImportError {
    #[error("Source file missing or unreadable: {0}")]
    SourceMissing(PathBuf),

    #[error("No importer handles {0}")]
    Unsupported(PathBuf),

    #[error("Failed to decompose {path}: {reason}")]
    Decompose { path: PathBuf, reason: String },

    #[error("Failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Nested import of {path} failed: {source}")]
    Nested {
        path: PathBuf,
        #[source]
        source: Box<Error>,
    },
}

/// A library buffer that does not hold what its section table declares.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Corrupt {kind:?} data: {reason}")]
pub struct CorruptDataError {
    pub kind: ResourceType,
    pub reason: String,
}

impl CorruptDataError {
    pub fn new(kind: ResourceType, reason: impl Into<String>) -> Self {
        Self {
            kind,
            reason: reason.into(),
        }
    }
}

impl ImportError {
    pub(crate) fn write(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Write {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn decompose(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        Self::Decompose {
            path: path.into(),
            reason: reason.to_string(),
        }
    }
}

/// Alias for `Result<T, Error>`.
pub type Result<T> = std::result::Result<T, Error>;
