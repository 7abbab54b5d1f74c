//! Bounded-concurrency chunk dispatch

use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, error, info, instrument, Instrument};

use crate::domain::cancel::CancellationToken;
use crate::domain::operation::{
    ChunkFailure, ChunkOutcome, OperationId, OperationStateRepository,
};
use crate::domain::retry::{RetryOutcome, RetryPolicy};
use crate::domain::split::PageRange;
use crate::domain::transport::{PartitionRequest, Transport};
use crate::domain::DomainError;

/// A materialized chunk request waiting for a slot
#[derive(Debug, Clone)]
pub struct ChunkJob {
    pub index: usize,
    pub pages: PageRange,
    pub request: PartitionRequest,
}

/// Failure policy of one operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailurePolicy {
    /// Every chunk runs to completion
    BestEffort,
    /// The first failure cancels everything else
    Strict,
}

impl FailurePolicy {
    pub fn from_allow_failed(allow_failed: bool) -> Self {
        if allow_failed {
            Self::BestEffort
        } else {
            Self::Strict
        }
    }
}

/// Runs chunk jobs under a counting semaphore and records every outcome in
/// the operation store.
#[derive(Debug, Clone)]
pub struct ChunkDispatcher {
    transport: Arc<dyn Transport>,
    store: Arc<dyn OperationStateRepository>,
    retry: RetryPolicy,
}

impl ChunkDispatcher {
    pub fn new(
        transport: Arc<dyn Transport>,
        store: Arc<dyn OperationStateRepository>,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            transport,
            store,
            retry,
        }
    }

    /// Dispatch jobs in page order. Returns once every job has a terminal
    /// outcome in the store.
    #[instrument(skip(self, operation_id, jobs, cancel), fields(operation_id = %operation_id, chunks = jobs.len()))]
    pub async fn dispatch(
        &self,
        operation_id: &OperationId,
        jobs: Vec<ChunkJob>,
        concurrency_level: usize,
        policy: FailurePolicy,
        cancel: &CancellationToken,
    ) -> Result<(), DomainError> {
        let gate = Arc::new(Semaphore::new(concurrency_level.max(1)));
        let mut workers = JoinSet::new();
        let mut jobs = jobs.into_iter();

        for job in jobs.by_ref() {
            let permit = tokio::select! {
                biased;
                _ = cancel.cancelled() => None,
                permit = gate.clone().acquire_owned() => Some(permit),
            };

            let Some(permit) = permit else {
                self.cancel_undispatched(operation_id, job.index).await?;
                break;
            };
            let permit = permit
                .map_err(|e| DomainError::internal(format!("Concurrency gate closed: {}", e)))?;

            self.store.mark_dispatched(operation_id, job.index).await?;
            info!("Partitioning set #{} (pages {}).", job.index + 1, job.pages);

            let worker = ChunkWorker {
                operation_id: operation_id.clone(),
                transport: self.transport.clone(),
                store: self.store.clone(),
                retry: self.retry.clone(),
                cancel: cancel.clone(),
                policy,
            };
            let span = tracing::info_span!("chunk", chunk_index = job.index);
            workers.spawn(
                async move {
                    let _permit = permit;
                    worker.run(job).await
                }
                .instrument(span),
            );
        }

        for job in jobs {
            self.cancel_undispatched(operation_id, job.index).await?;
        }

        let mut first_error = None;
        while let Some(joined) = workers.join_next().await {
            let result = joined
                .map_err(|e| DomainError::internal(format!("Chunk worker failed: {}", e)))
                .and_then(|recorded| recorded);

            if let Err(e) = result {
                error!(error = %e, "Chunk worker did not record its outcome");
                first_error.get_or_insert(e);
            }
        }

        first_error.map_or(Ok(()), Err)
    }

    async fn cancel_undispatched(
        &self,
        operation_id: &OperationId,
        index: usize,
    ) -> Result<(), DomainError> {
        debug!(chunk_index = index, "Chunk cancelled before dispatch");
        self.store
            .record_outcome(operation_id, index, ChunkOutcome::Cancelled)
            .await
    }
}

struct ChunkWorker {
    operation_id: OperationId,
    transport: Arc<dyn Transport>,
    store: Arc<dyn OperationStateRepository>,
    retry: RetryPolicy,
    cancel: CancellationToken,
    policy: FailurePolicy,
}

impl ChunkWorker {
    async fn run(self, job: ChunkJob) -> Result<(), DomainError> {
        let set_number = job.index + 1;

        let outcome = match self
            .retry
            .send(self.transport.as_ref(), &job.request, &self.cancel)
            .await
        {
            RetryOutcome::Response(response) if response.is_success() => {
                info!(
                    "Successfully partitioned set #{}, elements added to the final result.",
                    set_number
                );
                ChunkOutcome::Completed(response)
            }
            RetryOutcome::Response(response) => {
                ChunkOutcome::Failed(ChunkFailure::status(job.index, job.pages, &response))
            }
            RetryOutcome::Error(e) => {
                ChunkOutcome::Failed(ChunkFailure::transport(job.index, job.pages, e))
            }
            RetryOutcome::Cancelled => {
                debug!("Chunk cancelled in flight");
                ChunkOutcome::Cancelled
            }
        };

        if let ChunkOutcome::Failed(failure) = &outcome {
            match self.policy {
                FailurePolicy::BestEffort => error!(
                    status = failure.status_code(),
                    "Failed to partition set #{}, its elements will be omitted in the final result.",
                    set_number
                ),
                FailurePolicy::Strict => {
                    error!(
                        status = failure.status_code(),
                        "Failed to partition set #{}, cancelling the remaining sets.",
                        set_number
                    );
                    self.cancel.cancel();
                }
            }
        }

        self.store
            .record_outcome(&self.operation_id, job.index, outcome)
            .await
    }
}
