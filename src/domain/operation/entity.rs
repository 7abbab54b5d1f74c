//! Operation domain entities

use std::fmt;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use super::error::OperationError;
use crate::domain::split::PageRange;
use crate::domain::transport::{PartitionResponse, TransportError};

/// Regex pattern for valid operation IDs: split-{uuid}
static ID_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^split-[a-f0-9]{8}-[a-f0-9]{4}-[a-f0-9]{4}-[a-f0-9]{4}-[a-f0-9]{12}$")
        .expect("operation id pattern is valid")
});

/// Maximum length for operation IDs
pub const MAX_ID_LENGTH: usize = 42; // "split-" + 36 char UUID

/// Identifier scoping all state of one partition call
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct OperationId(String);

impl OperationId {
    /// Create a new validated operation ID
    pub fn new(id: impl Into<String>) -> Result<Self, OperationError> {
        let id = id.into();
        validate_operation_id(&id)?;
        Ok(Self(id))
    }

    /// Generate a fresh operation ID
    pub fn generate() -> Self {
        Self(format!("split-{}", uuid::Uuid::new_v4()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for OperationId {
    type Error = OperationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<OperationId> for String {
    fn from(id: OperationId) -> Self {
        id.0
    }
}

impl fmt::Display for OperationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for OperationId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Validate an operation ID string
pub fn validate_operation_id(id: &str) -> Result<(), OperationError> {
    if id.is_empty() {
        return Err(OperationError::invalid_id("Operation ID cannot be empty"));
    }

    if id.len() > MAX_ID_LENGTH {
        return Err(OperationError::invalid_id(format!(
            "Operation ID exceeds maximum length of {} characters",
            MAX_ID_LENGTH
        )));
    }

    if !ID_PATTERN.is_match(id) {
        return Err(OperationError::invalid_id(format!(
            "Invalid operation ID '{}': must be in format split-{{uuid}}",
            id
        )));
    }

    Ok(())
}

/// Lifecycle of one chunk request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ChunkStatus {
    /// Built but not yet admitted by the concurrency gate
    #[default]
    Pending,

    /// Request in flight (including retries)
    Dispatched,

    Completed,

    Failed,

    /// Stopped or never started because the operation was aborted
    Cancelled,
}

impl ChunkStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }

    pub fn can_transition_to(&self, target: ChunkStatus) -> bool {
        match (self, target) {
            (Self::Pending, Self::Dispatched) => true,
            (Self::Pending, Self::Cancelled) => true,

            (Self::Dispatched, Self::Completed) => true,
            (Self::Dispatched, Self::Failed) => true,
            (Self::Dispatched, Self::Cancelled) => true,

            _ => false,
        }
    }
}

impl fmt::Display for ChunkStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Dispatched => write!(f, "dispatched"),
            Self::Completed => write!(f, "completed"),
            Self::Failed => write!(f, "failed"),
            Self::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// Why a chunk failed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChunkFailureKind {
    /// The server answered with a non-success status
    Status { status: u16, body: String },

    /// No response was obtained
    Transport(TransportError),
}

/// A chunk that exhausted its retries or got a non-retryable answer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkFailure {
    pub chunk_index: usize,
    pub pages: PageRange,
    pub kind: ChunkFailureKind,
}

impl ChunkFailure {
    pub fn status(chunk_index: usize, pages: PageRange, response: &PartitionResponse) -> Self {
        Self {
            chunk_index,
            pages,
            kind: ChunkFailureKind::Status {
                status: response.status,
                body: response.text(),
            },
        }
    }

    pub fn transport(chunk_index: usize, pages: PageRange, error: TransportError) -> Self {
        Self {
            chunk_index,
            pages,
            kind: ChunkFailureKind::Transport(error),
        }
    }

    /// HTTP status of the failed response, if there was one
    pub fn status_code(&self) -> Option<u16> {
        match &self.kind {
            ChunkFailureKind::Status { status, .. } => Some(*status),
            ChunkFailureKind::Transport(_) => None,
        }
    }
}

impl fmt::Display for ChunkFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Failed to partition set #{} (pages {}): ",
            self.chunk_index + 1,
            self.pages
        )?;

        match &self.kind {
            ChunkFailureKind::Status { status, body } if body.is_empty() => {
                write!(f, "server returned status {}", status)
            }
            ChunkFailureKind::Status { status, body } => {
                write!(f, "server returned status {}: {}", status, body)
            }
            ChunkFailureKind::Transport(error) => write!(f, "{}", error),
        }
    }
}

/// Terminal result of one chunk
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChunkOutcome {
    Completed(PartitionResponse),
    Failed(ChunkFailure),
    Cancelled,
}

impl ChunkOutcome {
    pub fn status(&self) -> ChunkStatus {
        match self {
            Self::Completed(_) => ChunkStatus::Completed,
            Self::Failed(_) => ChunkStatus::Failed,
            Self::Cancelled => ChunkStatus::Cancelled,
        }
    }
}

/// Per-chunk bookkeeping
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkRecord {
    pub index: usize,
    pub pages: PageRange,
    pub status: ChunkStatus,
    pub outcome: Option<ChunkOutcome>,
}

/// Aggregate result of an operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationResultKind {
    AllSucceeded,
    PartialSucceeded,
    AllFailed,
}

/// State of one in-flight partition call
#[derive(Debug, Clone)]
pub struct OperationState {
    id: OperationId,
    concurrency_level: usize,
    allow_failed: bool,
    chunks: Vec<ChunkRecord>,
    temp_dir: Option<PathBuf>,
    created_at: DateTime<Utc>,
    completed_at: Option<DateTime<Utc>>,
}

impl OperationState {
    pub fn new(
        id: OperationId,
        concurrency_level: usize,
        allow_failed: bool,
        chunk_pages: &[PageRange],
    ) -> Self {
        let chunks = chunk_pages
            .iter()
            .enumerate()
            .map(|(index, pages)| ChunkRecord {
                index,
                pages: *pages,
                status: ChunkStatus::Pending,
                outcome: None,
            })
            .collect();

        Self {
            id,
            concurrency_level,
            allow_failed,
            chunks,
            temp_dir: None,
            created_at: Utc::now(),
            completed_at: None,
        }
    }

    pub fn with_temp_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.temp_dir = Some(dir.into());
        self
    }

    // Getters

    pub fn id(&self) -> &OperationId {
        &self.id
    }

    pub fn concurrency_level(&self) -> usize {
        self.concurrency_level
    }

    pub fn allow_failed(&self) -> bool {
        self.allow_failed
    }

    pub fn chunks(&self) -> &[ChunkRecord] {
        &self.chunks
    }

    pub fn temp_dir(&self) -> Option<&PathBuf> {
        self.temp_dir.as_ref()
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn completed_at(&self) -> Option<DateTime<Utc>> {
        self.completed_at
    }

    /// Time from creation until the last chunk turned terminal
    pub fn elapsed(&self) -> Option<chrono::Duration> {
        self.completed_at.map(|done| done - self.created_at)
    }

    pub fn count(&self, status: ChunkStatus) -> usize {
        self.chunks.iter().filter(|c| c.status == status).count()
    }

    pub fn is_finished(&self) -> bool {
        self.chunks.iter().all(|c| c.status.is_terminal())
    }

    // State transitions

    pub fn mark_dispatched(&mut self, index: usize) -> Result<(), OperationError> {
        self.transition(index, ChunkStatus::Dispatched)
    }

    pub fn record_outcome(
        &mut self,
        index: usize,
        outcome: ChunkOutcome,
    ) -> Result<(), OperationError> {
        self.transition(index, outcome.status())?;
        if let Some(record) = self.chunks.get_mut(index) {
            record.outcome = Some(outcome);
        }

        if self.is_finished() && self.completed_at.is_none() {
            self.completed_at = Some(Utc::now());
        }

        Ok(())
    }

    fn transition(&mut self, index: usize, target: ChunkStatus) -> Result<(), OperationError> {
        let id = self.id.as_str().to_string();
        let record = self
            .chunks
            .get_mut(index)
            .ok_or_else(|| OperationError::unknown_chunk(id, index))?;

        if !record.status.can_transition_to(target) {
            return Err(OperationError::invalid_chunk_transition(
                index,
                &record.status.to_string(),
                &target.to_string(),
            ));
        }

        record.status = target;
        Ok(())
    }

    /// Aggregate result once every chunk is terminal
    pub fn result_kind(&self) -> Option<OperationResultKind> {
        if !self.is_finished() {
            return None;
        }

        let succeeded = self.count(ChunkStatus::Completed);
        Some(if succeeded == self.chunks.len() {
            OperationResultKind::AllSucceeded
        } else if succeeded > 0 {
            OperationResultKind::PartialSucceeded
        } else {
            OperationResultKind::AllFailed
        })
    }
}
