//! Chunk dispatch under a concurrency gate and response merging

mod executor;
mod merger;

pub use executor::{ChunkDispatcher, ChunkJob, FailurePolicy};
pub use merger::{MergeResult, ResponseMerger};
