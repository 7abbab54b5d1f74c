//! Infrastructure services

mod partition_service;

pub use partition_service::{PartitionResult, SplitPartitionService};
