//! reqwest-backed multipart transport for partition requests

use std::time::Duration;

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use tracing::debug;

use crate::domain::form::{FilePart, FormData, FormValue};
use crate::domain::transport::{
    Headers, PartitionRequest, PartitionResponse, Transport, TransportError,
};
use crate::domain::DomainError;

/// Multipart transport over reqwest
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }

    pub fn with_timeout(timeout: Duration) -> Result<Self, DomainError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| DomainError::configuration(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self { client })
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }

    async fn build_form(form: &FormData) -> Result<Form, TransportError> {
        let mut multipart = Form::new();

        for (key, value) in form.iter() {
            multipart = match value {
                FormValue::Text(text) => multipart.text(key.to_string(), text.clone()),
                FormValue::List(values) => values.iter().fold(multipart, |acc, value| {
                    acc.text(key.to_string(), value.clone())
                }),
                FormValue::File(file) => multipart.part(key.to_string(), Self::file_part(file).await?),
            };
        }

        Ok(multipart)
    }

    async fn file_part(file: &FilePart) -> Result<Part, TransportError> {
        let bytes = file.content.load().await.map_err(|e| {
            TransportError::request(format!("Failed to read '{}': {}", file.filename, e))
        })?;

        Part::bytes(bytes.to_vec())
            .file_name(file.filename.clone())
            .mime_str(&file.mime_type())
            .map_err(|e| TransportError::request(format!("Invalid content type: {}", e)))
    }
}

impl Default for ReqwestTransport {
    fn default() -> Self {
        Self::new()
    }
}

fn map_error(error: reqwest::Error) -> TransportError {
    if error.is_timeout() {
        TransportError::timeout(error.to_string())
    } else if error.is_connect() {
        TransportError::connection(error.to_string())
    } else {
        TransportError::request(error.to_string())
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn send(&self, request: PartitionRequest) -> Result<PartitionResponse, TransportError> {
        let form = Self::build_form(&request.form).await?;

        let mut builder = self.client.post(&request.url);
        for (name, value) in request.headers.iter() {
            builder = builder.header(name, value);
        }

        let response = builder.multipart(form).send().await.map_err(map_error)?;

        let status = response.status().as_u16();
        let mut headers = Headers::new();
        for (name, value) in response.headers() {
            if let Ok(value) = value.to_str() {
                headers.insert(name.as_str(), value);
            }
        }
        let body = response.bytes().await.map_err(map_error)?;

        debug!(status, bytes = body.len(), url = %request.url, "Partition request finished");

        Ok(PartitionResponse {
            status,
            headers,
            body,
        })
    }
}
