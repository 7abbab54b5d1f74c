//! Outbound request/response model and the transport seam

use std::collections::BTreeMap;
use std::fmt::Debug;

use async_trait::async_trait;
use bytes::Bytes;
use serde_json::Value;
use thiserror::Error;

#[cfg(test)]
use mockall::automock;

use super::form::FormData;

pub const CONTENT_TYPE: &str = "content-type";
pub const CONTENT_LENGTH: &str = "content-length";

/// Case-insensitive header map; keys are stored lowercase.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Headers(BTreeMap<String, String>);

impl Headers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: &str, value: impl Into<String>) -> Self {
        self.insert(name, value);
        self
    }

    pub fn insert(&mut self, name: &str, value: impl Into<String>) {
        self.0.insert(name.to_ascii_lowercase(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(&name.to_ascii_lowercase()).map(String::as_str)
    }

    pub fn remove(&mut self, name: &str) -> Option<String> {
        self.0.remove(&name.to_ascii_lowercase())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// A multipart POST to the partition endpoint
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartitionRequest {
    pub url: String,
    pub headers: Headers,
    pub form: FormData,
}

impl PartitionRequest {
    pub fn new(url: impl Into<String>, form: FormData) -> Self {
        Self {
            url: url.into(),
            headers: Headers::new(),
            form,
        }
    }

    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.insert(name, value);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartitionResponse {
    pub status: u16,
    pub headers: Headers,
    pub body: Bytes,
}

impl PartitionResponse {
    pub fn new(status: u16, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            headers: Headers::new(),
            body: body.into(),
        }
    }

    /// A JSON response with content headers filled in
    pub fn json(status: u16, value: &Value) -> Self {
        let body = Bytes::from(value.to_string());
        let headers = Headers::new()
            .with(CONTENT_TYPE, "application/json")
            .with(CONTENT_LENGTH, body.len().to_string());

        Self {
            status,
            headers,
            body,
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// The partitioned elements carried by the body
    pub fn elements(&self) -> Result<Vec<Value>, serde_json::Error> {
        serde_json::from_slice(&self.body)
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// Failures below the HTTP status level
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransportError {
    #[error("Connection failed: {0}")]
    Connection(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Request failed: {0}")]
    Request(String),
}

impl TransportError {
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection(message.into())
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::Timeout(message.into())
    }

    pub fn request(message: impl Into<String>) -> Self {
        Self::Request(message.into())
    }

    /// Connection-level failures worth retrying
    pub fn is_connection_level(&self) -> bool {
        matches!(self, Self::Connection(_) | Self::Timeout(_))
    }
}

/// Sends one HTTP request and returns one HTTP response. Non-2xx statuses are
/// responses, not errors.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait Transport: Send + Sync + Debug {
    async fn send(&self, request: PartitionRequest) -> Result<PartitionResponse, TransportError>;
}
