//! Per-invocation operation state

mod entity;
mod error;
pub mod repository;

pub use entity::{
    validate_operation_id, ChunkFailure, ChunkFailureKind, ChunkOutcome, ChunkRecord,
    ChunkStatus, OperationId, OperationResultKind, OperationState, MAX_ID_LENGTH,
};
pub use error::OperationError;
pub use repository::OperationStateRepository;

#[cfg(test)]
pub use repository::MockOperationStateRepository;
