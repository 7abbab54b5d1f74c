//! Operation-specific errors

use std::fmt;

/// Errors raised by operation state handling
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperationError {
    /// Invalid operation ID format
    InvalidId(String),

    /// Chunk status change not allowed by the state machine
    InvalidChunkTransition {
        chunk_index: usize,
        from: String,
        to: String,
    },

    /// Operation not found in the store
    NotFound(String),

    /// Chunk index outside the operation's chunk list
    UnknownChunk { operation_id: String, chunk_index: usize },

    /// Operation already exists
    AlreadyExists(String),
}

impl OperationError {
    pub fn invalid_id(message: impl Into<String>) -> Self {
        Self::InvalidId(message.into())
    }

    pub fn invalid_chunk_transition(chunk_index: usize, from: &str, to: &str) -> Self {
        Self::InvalidChunkTransition {
            chunk_index,
            from: from.to_string(),
            to: to.to_string(),
        }
    }

    pub fn not_found(id: impl Into<String>) -> Self {
        Self::NotFound(id.into())
    }

    pub fn unknown_chunk(operation_id: impl Into<String>, chunk_index: usize) -> Self {
        Self::UnknownChunk {
            operation_id: operation_id.into(),
            chunk_index,
        }
    }

    pub fn already_exists(id: impl Into<String>) -> Self {
        Self::AlreadyExists(id.into())
    }
}

impl fmt::Display for OperationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidId(msg) => write!(f, "Invalid operation ID: {}", msg),
            Self::InvalidChunkTransition {
                chunk_index,
                from,
                to,
            } => write!(
                f,
                "Invalid state transition for chunk #{} from '{}' to '{}'",
                chunk_index, from, to
            ),
            Self::NotFound(id) => write!(f, "Operation '{}' not found", id),
            Self::UnknownChunk {
                operation_id,
                chunk_index,
            } => write!(
                f,
                "Operation '{}' has no chunk #{}",
                operation_id, chunk_index
            ),
            Self::AlreadyExists(id) => write!(f, "Operation '{}' already exists", id),
        }
    }
}

impl std::error::Error for OperationError {}
