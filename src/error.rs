//! Error types for multires.
//!
//! The engine trusts well-formed callers: most degraded inputs (missing color
//! layers, empty displacement grids, boundary neighborhoods) are valid states
//! and never surface here. The variants below cover malformed topology, the
//! hierarchy depth limit, and file I/O.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias using [`MultiresError`].
pub type Result<T> = std::result::Result<T, MultiresError>;

/// Errors that can occur during multires operations.
#[derive(Error, Debug)]
pub enum MultiresError {
    /// The mesh has no vertices.
    #[error("mesh has no vertices")]
    EmptyMesh,

    /// An element references an invalid vertex index.
    #[error("element {face} references invalid vertex index {vertex}")]
    InvalidVertexIndex {
        /// The face (or edge) index.
        face: usize,
        /// The invalid vertex index.
        vertex: usize,
    },

    /// A face has duplicate vertex indices.
    #[error("face {face} is degenerate (has duplicate vertices)")]
    DegenerateFace {
        /// The face index.
        face: usize,
    },

    /// A face does not have three or four sides.
    #[error("face {face} has {sides} sides, only triangles and quads are supported")]
    InvalidFace {
        /// The face index.
        face: usize,
        /// Number of sides found.
        sides: usize,
    },

    /// A face side has no matching edge in the edge list.
    #[error("face {face} side ({v0}, {v1}) has no matching edge")]
    MissingEdge {
        /// The face index.
        face: usize,
        /// First vertex of the side.
        v0: u32,
        /// Second vertex of the side.
        v1: u32,
    },

    /// The hierarchy already holds the maximum number of levels.
    #[error("maximum number of multires levels ({max}) reached")]
    MaxLevelsReached {
        /// The level cap.
        max: usize,
    },

    /// A level outside `1..=count` was requested.
    #[error("level {level} is out of range (1..={count})")]
    InvalidLevel {
        /// The requested level.
        level: usize,
        /// Number of levels available.
        count: usize,
    },

    /// Element counts of two collaborating meshes do not agree.
    #[error("topology mismatch in {what}: expected {expected}, found {found}")]
    TopologyMismatch {
        /// Which element stream disagreed.
        what: &'static str,
        /// The expected count.
        expected: usize,
        /// The count actually found.
        found: usize,
    },

    /// File I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Error loading mesh from file.
    #[error("failed to load mesh from {path}: {message}")]
    LoadError {
        /// The file path.
        path: PathBuf,
        /// Error message.
        message: String,
    },

    /// Error saving mesh to file.
    #[error("failed to save mesh to {path}: {message}")]
    SaveError {
        /// The file path.
        path: PathBuf,
        /// Error message.
        message: String,
    },

    /// Unsupported file format.
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

impl MultiresError {
    /// Create an invalid parameter error.
    pub fn invalid_param<T: std::fmt::Display>(
        name: &'static str,
        value: T,
        reason: &'static str,
    ) -> Self {
        MultiresError::InvalidParameter {
            name,
            value: value.to_string(),
            reason,
        }
    }

    /// Create a topology mismatch error.
    pub fn mismatch(what: &'static str, expected: usize, found: usize) -> Self {
        MultiresError::TopologyMismatch {
            what,
            expected,
            found,
        }
    }
}
