use thiserror::Error;

use super::document::DocumentError;
use super::operation::{ChunkFailure, OperationError};
use super::transport::TransportError;

/// Core domain errors
#[derive(Debug, Error)]
pub enum DomainError {
    #[error("Validation error: {message}")]
    Validation { message: String },

    #[error("Document error: {0}")]
    Document(#[from] DocumentError),

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("{0}")]
    ChunkFailed(Box<ChunkFailure>),

    #[error("Operation error: {0}")]
    Operation(#[from] OperationError),

    #[error("Storage error: {message}")]
    Storage { message: String },

    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl DomainError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage {
            message: message.into(),
        }
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    pub fn chunk_failed(failure: ChunkFailure) -> Self {
        Self::ChunkFailed(Box::new(failure))
    }

    /// True when the error was raised before any request left the process.
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation { .. } | Self::Document(_))
    }

    /// The failed chunk behind an operation failure, if any.
    pub fn chunk_failure(&self) -> Option<&ChunkFailure> {
        match self {
            Self::ChunkFailed(failure) => Some(failure),
            _ => None,
        }
    }
}

impl From<std::io::Error> for DomainError {
    fn from(err: std::io::Error) -> Self {
        Self::storage(err.to_string())
    }
}
