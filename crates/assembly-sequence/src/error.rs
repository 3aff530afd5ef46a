//! Error types for sequencing operations.

use block_assembly::{AssemblyError, NodeId};
use thiserror::Error;

/// Result type alias for sequencing operations.
pub type SequenceResult<T> = Result<T, SequenceError>;

/// Errors that can occur while sequencing an assembly.
#[derive(Debug, Error)]
pub enum SequenceError {
    /// Error from the underlying assembly.
    #[error(transparent)]
    Assembly(#[from] AssemblyError),

    /// The block has no course attribute; run course identification first.
    #[error("courses have not been identified (block {node} has no course)")]
    CoursesNotIdentified { node: NodeId },

    /// The block does not exist.
    #[error("block {node} does not exist")]
    NodeNotFound { node: NodeId },

    /// The block has no face to place it by.
    #[error("block {node} has no usable top face")]
    NoTopFace { node: NodeId },
}
