//! Operation state store trait

use std::fmt::Debug;

use async_trait::async_trait;

#[cfg(test)]
use mockall::automock;

use super::{ChunkOutcome, OperationId, OperationState};
use crate::domain::error::DomainError;

/// Per-invocation state keyed by operation id. Implementations must keep
/// operations fully isolated from each other.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait OperationStateRepository: Send + Sync + Debug {
    /// Register a new operation
    async fn create(&self, state: OperationState) -> Result<(), DomainError>;

    /// Move a chunk from pending to dispatched
    async fn mark_dispatched(&self, id: &OperationId, index: usize) -> Result<(), DomainError>;

    /// Store the terminal outcome of a chunk
    async fn record_outcome(
        &self,
        id: &OperationId,
        index: usize,
        outcome: ChunkOutcome,
    ) -> Result<(), DomainError>;

    /// Copy of the current state
    async fn snapshot(&self, id: &OperationId) -> Result<OperationState, DomainError>;

    /// Remove the operation; returns whether it existed
    async fn destroy(&self, id: &OperationId) -> Result<bool, DomainError>;

    /// Number of live operations
    async fn len(&self) -> usize;
}

#[cfg(test)]
pub mod tests {
    use super::*;
    use crate::domain::operation::{ChunkStatus, OperationError};
    use crate::domain::split::PageRange;
    use crate::domain::transport::PartitionResponse;

    /// Helper to create a test operation state with `chunks` two-page chunks
    pub fn create_test_state(chunks: u32, allow_failed: bool) -> OperationState {
        let pages: Vec<_> = (0..chunks)
            .map(|i| PageRange::new(i * 2 + 1, i * 2 + 2))
            .collect();
        OperationState::new(OperationId::generate(), 4, allow_failed, &pages)
    }

    /// Create, progress and destroy one operation
    pub async fn test_repository_lifecycle<R: OperationStateRepository>(repo: &R) {
        let state = create_test_state(2, true);
        let id = state.id().clone();

        repo.create(state.clone()).await.expect("create should succeed");
        assert!(matches!(
            repo.create(state).await,
            Err(DomainError::Operation(OperationError::AlreadyExists(_)))
        ));

        repo.mark_dispatched(&id, 0).await.expect("dispatch should succeed");
        repo.record_outcome(
            &id,
            0,
            ChunkOutcome::Completed(PartitionResponse::new(200, "[]")),
        )
        .await
        .expect("record should succeed");
        repo.record_outcome(&id, 1, ChunkOutcome::Cancelled)
            .await
            .expect("cancel should succeed");

        let snapshot = repo.snapshot(&id).await.expect("snapshot should succeed");
        assert_eq!(snapshot.chunks()[0].status, ChunkStatus::Completed);
        assert_eq!(snapshot.chunks()[1].status, ChunkStatus::Cancelled);
        assert!(snapshot.is_finished());

        assert!(repo.destroy(&id).await.expect("destroy should succeed"));
        assert!(!repo.destroy(&id).await.expect("second destroy should succeed"));
        assert!(matches!(
            repo.snapshot(&id).await,
            Err(DomainError::Operation(OperationError::NotFound(_)))
        ));
        assert_eq!(repo.len().await, 0);
    }

    /// Concurrent operations never see each other's chunks
    pub async fn test_repository_isolation<R: OperationStateRepository>(repo: &R) {
        let first = create_test_state(3, false);
        let second = create_test_state(1, true);
        let (first_id, second_id) = (first.id().clone(), second.id().clone());

        repo.create(first).await.unwrap();
        repo.create(second).await.unwrap();
        repo.mark_dispatched(&first_id, 2).await.unwrap();

        let second_snapshot = repo.snapshot(&second_id).await.unwrap();
        assert_eq!(second_snapshot.chunks().len(), 1);
        assert!(second_snapshot.allow_failed());
        assert_eq!(second_snapshot.chunks()[0].status, ChunkStatus::Pending);
        assert!(repo.mark_dispatched(&second_id, 2).await.is_err());

        repo.destroy(&first_id).await.unwrap();
        assert!(repo.snapshot(&second_id).await.is_ok());
        assert_eq!(repo.len().await, 1);
    }
}
