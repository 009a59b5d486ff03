//! Error types for drape.
//!
//! This module defines all error types used throughout the library, plus the
//! non-fatal [`ParseWarning`] values that parsing attaches to a document.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias using [`DrapeError`].
pub type Result<T> = std::result::Result<T, DrapeError>;

/// Errors that can occur while parsing, fitting, transferring or patching.
#[derive(Error, Debug)]
pub enum DrapeError {
    /// A structural line in an MHCLO document could not be parsed.
    #[error("{path}:{line}: {message}")]
    Parse {
        /// The document path (or `<memory>` for in-memory text).
        path: PathBuf,
        /// 1-based line number.
        line: usize,
        /// What was wrong with the line.
        message: String,
    },

    /// A base-mesh vertex index is outside the live vertex count.
    #[error("{what} index {index} is out of range for a mesh with {count} vertices")]
    IndexOutOfRange {
        /// What the index was used for.
        what: &'static str,
        /// The offending index.
        index: usize,
        /// Number of vertices in the base mesh.
        count: usize,
    },

    /// A named vertex group does not exist in a weights document.
    #[error("the {group} group does not exist in the given weights file")]
    MissingGroup {
        /// The group name.
        group: String,
    },

    /// File I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed or unexpected JSON.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Error loading a file.
    #[error("failed to load {path}: {message}")]
    LoadError {
        /// The file path.
        path: PathBuf,
        /// Error message.
        message: String,
    },

    /// Error saving a file.
    #[error("failed to save {path}: {message}")]
    SaveError {
        /// The file path.
        path: PathBuf,
        /// Error message.
        message: String,
    },

    /// Unsupported mesh file format.
    #[error("unsupported file format: {extension}")]
    UnsupportedFormat {
        /// The file extension.
        extension: String,
    },

    /// Invalid parameter value.
    #[error("invalid parameter: {name} = {value} ({reason})")]
    InvalidParameter {
        /// Parameter name.
        name: &'static str,
        /// The invalid value (as string).
        value: String,
        /// Reason the value is invalid.
        reason: &'static str,
    },
}

impl DrapeError {
    /// Create an invalid parameter error.
    pub fn invalid_param<T: std::fmt::Display>(
        name: &'static str,
        value: T,
        reason: &'static str,
    ) -> Self {
        DrapeError::InvalidParameter {
            name,
            value: value.to_string(),
            reason,
        }
    }
}

/// Non-fatal problems found while reading or validating a document.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseWarning {
    /// No `obj_file` key was found. Header-only documents are legal.
    #[error("reached end of document without finding an obj_file reference")]
    MissingMeshReference,

    /// The number of vertex references differs from the auxiliary mesh.
    #[error("document has {actual} vertex references but the mesh has {expected} vertices")]
    VertexCountMismatch {
        /// Vertex count of the auxiliary mesh.
        expected: usize,
        /// Number of vertex references in the document.
        actual: usize,
    },
}
