//! Error types for assembly operations.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for assembly operations.
pub type AssemblyResult<T> = Result<T, AssemblyError>;

/// Errors that can occur while building or analysing an assembly.
#[derive(Debug, Error)]
pub enum AssemblyError {
    /// Invalid parameters passed to a detection or merge pass.
    #[error("invalid configuration: {details}")]
    Configuration { details: String },

    /// The assembly graph would become inconsistent (missing node, self-edge, ...).
    #[error("assembly consistency error: {details}")]
    Consistency { details: String },

    /// Geometry that cannot be processed (self-intersecting polygon, zero normal, ...).
    ///
    /// Detection recovers from this per face pair.
    #[error("degenerate geometry: {details}")]
    GeometricDegeneracy { details: String },

    /// Face winding of the interfaces on one edge cannot be made consistent.
    ///
    /// Merging recovers from this per edge.
    #[error("cannot merge interfaces: {details}")]
    MergeInconsistency { details: String },

    /// A block was constructed from malformed vertex/face data.
    #[error("invalid block: {details}")]
    InvalidBlock { details: String },

    /// Error reading from a file.
    #[error("failed to read assembly from {path}: {source}")]
    IoRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Error writing to a file.
    #[error("failed to write assembly to {path}: {source}")]
    IoWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Error parsing serialized data.
    #[error("failed to parse {what}: {details}")]
    ParseError { what: String, details: String },
}

impl AssemblyError {
    pub(crate) fn configuration(details: impl Into<String>) -> Self {
        Self::Configuration {
            details: details.into(),
        }
    }

    pub(crate) fn consistency(details: impl Into<String>) -> Self {
        Self::Consistency {
            details: details.into(),
        }
    }

    pub(crate) fn degenerate(details: impl Into<String>) -> Self {
        Self::GeometricDegeneracy {
            details: details.into(),
        }
    }

    /// Whether the pass that raised this error can continue with the next pair or edge.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::GeometricDegeneracy { .. } | Self::MergeInconsistency { .. }
        )
    }
}
