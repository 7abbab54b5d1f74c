//! Domain layer - Splitting, dispatch and merge logic for partition requests

pub mod cancel;
pub mod dispatch;
pub mod document;
pub mod error;
pub mod form;
pub mod operation;
pub mod retry;
pub mod split;
pub mod transport;

pub use cancel::CancellationToken;
pub use document::{DocumentError, PdfDocument};
pub use error::DomainError;
pub use form::{FilePart, FormData, FormValue, SplitParams};
pub use operation::{
    ChunkFailure, ChunkOutcome, ChunkStatus, OperationId, OperationResultKind, OperationState,
    OperationStateRepository,
};
pub use retry::{RetryConfig, RetryPolicy};
pub use split::{PageRange, SplitLimits, SplitPlan};
pub use transport::{
    Headers, PartitionRequest, PartitionResponse, Transport, TransportError,
};
