//! In-memory operation state store

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::domain::error::DomainError;
use crate::domain::operation::{
    ChunkOutcome, OperationError, OperationId, OperationState, OperationStateRepository,
};

/// In-memory implementation of OperationStateRepository
#[derive(Debug, Clone)]
pub struct InMemoryOperationStateRepository {
    operations: Arc<RwLock<HashMap<String, OperationState>>>,
}

impl InMemoryOperationStateRepository {
    /// Create a new empty store
    pub fn new() -> Self {
        Self {
            operations: Arc::new(RwLock::new(HashMap::new())),
        }
    }
}

impl Default for InMemoryOperationStateRepository {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl OperationStateRepository for InMemoryOperationStateRepository {
    async fn create(&self, state: OperationState) -> Result<(), DomainError> {
        let mut operations = self.operations.write().await;
        let id = state.id().as_str().to_string();

        if operations.contains_key(&id) {
            return Err(OperationError::already_exists(id).into());
        }

        operations.insert(id, state);
        Ok(())
    }

    async fn mark_dispatched(&self, id: &OperationId, index: usize) -> Result<(), DomainError> {
        let mut operations = self.operations.write().await;
        let state = operations
            .get_mut(id.as_str())
            .ok_or_else(|| OperationError::not_found(id.as_str()))?;

        state.mark_dispatched(index)?;
        Ok(())
    }

    async fn record_outcome(
        &self,
        id: &OperationId,
        index: usize,
        outcome: ChunkOutcome,
    ) -> Result<(), DomainError> {
        let mut operations = self.operations.write().await;
        let state = operations
            .get_mut(id.as_str())
            .ok_or_else(|| OperationError::not_found(id.as_str()))?;

        state.record_outcome(index, outcome)?;
        Ok(())
    }

    async fn snapshot(&self, id: &OperationId) -> Result<OperationState, DomainError> {
        let operations = self.operations.read().await;
        operations
            .get(id.as_str())
            .cloned()
            .ok_or_else(|| OperationError::not_found(id.as_str()).into())
    }

    async fn destroy(&self, id: &OperationId) -> Result<bool, DomainError> {
        let mut operations = self.operations.write().await;
        Ok(operations.remove(id.as_str()).is_some())
    }

    async fn len(&self) -> usize {
        self.operations.read().await.len()
    }
}
