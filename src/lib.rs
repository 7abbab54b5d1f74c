//! Split PDF Partition Client
//!
//! Client-side splitting for document partition requests:
//! - Large PDFs are cut into page-range chunks and partitioned concurrently
//! - Chunk responses are merged back in page order
//! - Strict or best-effort failure handling with per-request retry
//! - Optional on-disk spooling of chunk data

pub mod config;
pub mod domain;
pub mod infrastructure;

pub use config::AppConfig;
pub use domain::{
    DomainError, FilePart, FormData, OperationResultKind, PartitionRequest, PartitionResponse,
    Transport, TransportError,
};
pub use infrastructure::http::ReqwestTransport;
pub use infrastructure::logging::{init_logging, try_init_logging};
pub use infrastructure::services::{PartitionResult, SplitPartitionService};
