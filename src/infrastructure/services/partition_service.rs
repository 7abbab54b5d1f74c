//! Split partition service: the public entry point of the crate

use std::sync::Arc;

use tempfile::TempDir;
use tracing::{debug, info, instrument, warn};

use crate::config::AppConfig;
use crate::domain::cancel::CancellationToken;
use crate::domain::dispatch::{ChunkDispatcher, ChunkJob, FailurePolicy, ResponseMerger};
use crate::domain::document::{has_pdf_header, PdfDocument};
use crate::domain::error::DomainError;
use crate::domain::form::{params, SplitParams};
use crate::domain::operation::{
    ChunkFailure, OperationId, OperationResultKind, OperationState, OperationStateRepository,
};
use crate::domain::retry::{RetryConfig, RetryOutcome, RetryPolicy};
use crate::domain::split::{
    resolve_page_range, ChunkBuilder, ChunkStorage, PageRange, RequestMaterializer,
    SplitDecision, SplitLimits, SplitPlan,
};
use crate::domain::transport::{PartitionRequest, PartitionResponse, Transport};
use crate::infrastructure::http::ReqwestTransport;
use crate::infrastructure::operation::InMemoryOperationStateRepository;

/// What a partition call hands back
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartitionResult {
    pub response: PartitionResponse,
    /// Chunks omitted under the best-effort policy
    pub failures: Vec<ChunkFailure>,
    /// `None` when the request was sent without splitting
    pub kind: Option<OperationResultKind>,
}

impl PartitionResult {
    fn unsplit(response: PartitionResponse) -> Self {
        Self {
            response,
            failures: Vec::new(),
            kind: None,
        }
    }

    pub fn was_split(&self) -> bool {
        self.kind.is_some()
    }
}

/// Everything needed to split one validated document
struct SplitJob {
    params: SplitParams,
    document: Arc<PdfDocument>,
    plan: SplitPlan,
    filename: String,
}

/// Splits large PDFs into page-range chunks, partitions them concurrently
/// and merges the results.
#[derive(Debug, Clone)]
pub struct SplitPartitionService {
    transport: Arc<dyn Transport>,
    store: Arc<dyn OperationStateRepository>,
    retry: RetryPolicy,
    limits: SplitLimits,
}

impl SplitPartitionService {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self {
            transport,
            store: Arc::new(InMemoryOperationStateRepository::new()),
            retry: RetryPolicy::default(),
            limits: SplitLimits::default(),
        }
    }

    /// Service over the reqwest transport, configured from `AppConfig`
    pub fn from_config(config: &AppConfig) -> Result<Self, DomainError> {
        let transport = ReqwestTransport::with_timeout(config.split.request_timeout())?;

        Self::new(Arc::new(transport))
            .with_retry_config(config.retry.clone())
            .with_limits(config.split.limits())
    }

    pub fn with_store(mut self, store: Arc<dyn OperationStateRepository>) -> Self {
        self.store = store;
        self
    }

    pub fn with_retry_config(mut self, config: RetryConfig) -> Self {
        self.retry = RetryPolicy::new(config);
        self
    }

    /// Replace the splitter bounds. Inconsistent bounds are rejected.
    pub fn with_limits(mut self, limits: SplitLimits) -> Result<Self, DomainError> {
        limits.validate()?;
        self.limits = limits;
        Ok(self)
    }

    /// Partition a request, splitting the PDF when asked to and worthwhile.
    #[instrument(skip(self, request), fields(url = %request.url))]
    pub async fn partition(&self, request: PartitionRequest) -> Result<PartitionResult, DomainError> {
        let Some(job) = self.prepare_split(&request).await? else {
            return self.send_unsplit(request).await;
        };

        let mut context = OperationContext::new(self.store.clone(), &job.params)?;
        info!(operation_id = %context.id, "Starting split partition");

        let result = self.run_split(&mut context, &request, job).await;
        context.teardown().await;

        result
    }

    /// Blocking wrapper driving its own runtime. Must not be called from
    /// inside an async runtime.
    pub fn partition_blocking(&self, request: PartitionRequest) -> Result<PartitionResult, DomainError> {
        if tokio::runtime::Handle::try_current().is_ok() {
            return Err(DomainError::internal(
                "partition_blocking cannot run inside an async runtime; await partition instead",
            ));
        }

        let runtime = tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()
            .map_err(|e| DomainError::internal(format!("Failed to start runtime: {}", e)))?;

        runtime.block_on(self.partition(request))
    }

    /// Decide whether to split. `None` means send the request unchanged.
    async fn prepare_split(&self, request: &PartitionRequest) -> Result<Option<SplitJob>, DomainError> {
        if !params::split_pdf_page(&request.form) {
            info!("Partitioning without split.");
            return Ok(None);
        }

        info!("Preparing to split document for partition.");
        let Some(file) = request.form.file() else {
            info!("Partitioning without split.");
            return Ok(None);
        };

        let bytes = file.content.load().await?;
        if !has_pdf_header(&bytes) {
            info!(filename = %file.filename, "File is not a PDF. Partitioning without split.");
            return Ok(None);
        }

        if file.filename.trim().is_empty() {
            return Err(DomainError::validation("Filename can't be an empty string."));
        }

        let params = SplitParams::from_form(&request.form, &self.limits)?;

        let document = tokio::task::spawn_blocking(move || PdfDocument::load(&bytes))
            .await
            .map_err(|e| DomainError::internal(format!("PDF loader task failed: {}", e)))??;
        let total_pages = document.page_count();

        let range = resolve_page_range(params.page_range, total_pages)?;
        let plan = match SplitPlan::new(range, total_pages, params.concurrency_level, &self.limits) {
            SplitDecision::NoSplit { page_count } => {
                info!(
                    "Document has too few pages ({}) to be split efficiently. Partitioning without split.",
                    page_count
                );
                return Ok(None);
            }
            SplitDecision::Split(plan) => plan,
        };

        plan.log_summary();
        Ok(Some(SplitJob {
            params,
            document: Arc::new(document),
            plan,
            filename: file.filename.clone(),
        }))
    }

    async fn send_unsplit(&self, request: PartitionRequest) -> Result<PartitionResult, DomainError> {
        match self
            .retry
            .send(self.transport.as_ref(), &request, &CancellationToken::new())
            .await
        {
            RetryOutcome::Response(response) => Ok(PartitionResult::unsplit(response)),
            RetryOutcome::Error(e) => Err(e.into()),
            RetryOutcome::Cancelled => Err(DomainError::internal("Request was cancelled")),
        }
    }

    async fn run_split(
        &self,
        context: &mut OperationContext,
        request: &PartitionRequest,
        job: SplitJob,
    ) -> Result<PartitionResult, DomainError> {
        let chunks = ChunkBuilder::new(job.document, job.filename)
            .with_storage(context.chunk_storage())
            .build_async(job.plan)
            .await?;

        let materializer = RequestMaterializer::new(request, job.params.starting_page_number);
        let jobs = chunks
            .iter()
            .map(|chunk| {
                Ok(ChunkJob {
                    index: chunk.index,
                    pages: chunk.range,
                    request: materializer.materialize(chunk)?,
                })
            })
            .collect::<Result<Vec<_>, DomainError>>()?;

        let pages: Vec<PageRange> = jobs.iter().map(|job| job.pages).collect();
        context.register(&pages, &job.params).await?;

        let dispatcher =
            ChunkDispatcher::new(self.transport.clone(), self.store.clone(), self.retry.clone());
        dispatcher
            .dispatch(
                &context.id,
                jobs,
                job.params.concurrency_level,
                FailurePolicy::from_allow_failed(job.params.allow_failed),
                &context.cancel,
            )
            .await?;

        let state = self.store.snapshot(&context.id).await?;
        info!(
            operation_id = %context.id,
            result = ?state.result_kind(),
            elapsed_ms = state.elapsed().map(|elapsed| elapsed.num_milliseconds()),
            "All sets finished"
        );

        let merged = ResponseMerger::new(job.params.starting_page_number).merge(&state)?;
        Ok(PartitionResult {
            response: merged.response,
            failures: merged.failures,
            kind: Some(merged.kind),
        })
    }
}

/// Per-call state: operation id, cancellation token and spool directory.
/// Dropping it cancels outstanding chunks and removes the spool directory.
struct OperationContext {
    id: OperationId,
    cancel: CancellationToken,
    spool_dir: Option<TempDir>,
    store: Arc<dyn OperationStateRepository>,
    registered: bool,
}

impl OperationContext {
    fn new(store: Arc<dyn OperationStateRepository>, params: &SplitParams) -> Result<Self, DomainError> {
        let spool_dir = if params.cache_tmp_data {
            let dir = tempfile::Builder::new()
                .prefix("split_pdf_")
                .tempdir_in(&params.cache_tmp_data_dir)?;
            debug!(path = %dir.path().display(), "Created spool directory");
            Some(dir)
        } else {
            None
        };

        Ok(Self {
            id: OperationId::generate(),
            cancel: CancellationToken::new(),
            spool_dir,
            store,
            registered: false,
        })
    }

    fn chunk_storage(&self) -> ChunkStorage {
        match &self.spool_dir {
            Some(dir) => ChunkStorage::Disk(dir.path().to_path_buf()),
            None => ChunkStorage::Memory,
        }
    }

    async fn register(&mut self, pages: &[PageRange], params: &SplitParams) -> Result<(), DomainError> {
        let mut state = OperationState::new(
            self.id.clone(),
            params.concurrency_level,
            params.allow_failed,
            pages,
        );
        if let Some(dir) = &self.spool_dir {
            state = state.with_temp_dir(dir.path());
        }

        self.store.create(state).await?;
        self.registered = true;
        Ok(())
    }

    async fn teardown(mut self) {
        self.cancel.cancel();

        if self.registered {
            if let Err(e) = self.store.destroy(&self.id).await {
                warn!(operation_id = %self.id, error = %e, "Failed to remove operation state");
            }
            self.registered = false;
        }

        if let Some(dir) = self.spool_dir.take() {
            if let Err(e) = dir.close() {
                warn!(operation_id = %self.id, error = %e, "Failed to remove spool directory");
            }
        }

        debug!(operation_id = %self.id, "Operation torn down");
    }
}

impl Drop for OperationContext {
    fn drop(&mut self) {
        self.cancel.cancel();

        // Reached only when the partition future was dropped mid-flight.
        if self.registered {
            if let Ok(handle) = tokio::runtime::Handle::try_current() {
                let store = self.store.clone();
                let id = self.id.clone();
                handle.spawn(async move {
                    if let Err(e) = store.destroy(&id).await {
                        warn!(operation_id = %id, error = %e, "Failed to remove operation state");
                    }
                });
            }
        }
    }
}
