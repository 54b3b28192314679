//! Sending shopping writes to the remote write endpoint.
//!
//! The endpoint accepts a single JSON POST of
//! `{ operation, item?, itemId? }` and answers `{ success, message, data? }`.
//! A transport failure, a non-2xx status and `success: false` all surface
//! as [`RemoteWriteError`], and all of them are retryable.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::queue::{SyncOperation, SyncQueueItem};
use crate::models::ShoppingItemPatch;

/// Errors from the remote write endpoint.
///
/// `Clone` so one debounced outcome can be handed to every waiting caller.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RemoteWriteError {
    #[error("Network error: {0}")]
    Transport(String),

    #[error("Write endpoint returned status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Write rejected: {0}")]
    Rejected(String),

    #[error("Invalid response from write endpoint: {0}")]
    Decode(String),

    #[error("Write was cancelled before it was sent")]
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WriteRequest {
    pub operation: SyncOperation,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub item: Option<ShoppingItemPatch>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub item_id: Option<String>,
}

impl WriteRequest {
    pub fn create(item: ShoppingItemPatch) -> Self {
        Self {
            operation: SyncOperation::Create,
            item_id: item.id.clone(),
            item: Some(item),
        }
    }

    pub fn update(item_id: impl Into<String>, item: ShoppingItemPatch) -> Self {
        Self {
            operation: SyncOperation::Update,
            item: Some(item),
            item_id: Some(item_id.into()),
        }
    }

    pub fn delete(item_id: impl Into<String>) -> Self {
        Self {
            operation: SyncOperation::Delete,
            item: None,
            item_id: Some(item_id.into()),
        }
    }
}

impl From<&SyncQueueItem> for WriteRequest {
    fn from(entry: &SyncQueueItem) -> Self {
        Self {
            operation: entry.operation,
            item: entry.data.clone(),
            item_id: entry.item_id.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WriteResponse {
    pub success: bool,
    #[serde(default)]
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

/// Something that can apply a write remotely.
#[async_trait]
pub trait RemoteWriter: Send + Sync {
    async fn send(&self, request: &WriteRequest) -> Result<WriteResponse, RemoteWriteError>;
}

/// Posts writes as JSON to a single endpoint.
#[derive(Debug, Clone)]
pub struct HttpRemoteWriter {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpRemoteWriter {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: endpoint.into(),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl RemoteWriter for HttpRemoteWriter {
    async fn send(&self, request: &WriteRequest) -> Result<WriteResponse, RemoteWriteError> {
        tracing::debug!(
            "Sending {} for {}",
            request.operation,
            request.item_id.as_deref().unwrap_or("-")
        );

        let response = self
            .client
            .post(&self.endpoint)
            .json(request)
            .send()
            .await
            .map_err(|e| RemoteWriteError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(RemoteWriteError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let reply: WriteResponse = response
            .json()
            .await
            .map_err(|e| RemoteWriteError::Decode(e.to_string()))?;

        if !reply.success {
            return Err(RemoteWriteError::Rejected(reply.message));
        }

        Ok(reply)
    }
}

/// A request from a batch that did not go through.
#[derive(Debug, Clone, PartialEq)]
pub struct FailedWrite {
    /// Position in the submitted batch
    pub index: usize,
    pub request: WriteRequest,
    pub error: RemoteWriteError,
}

/// Partitioned outcome of [`batch_update`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchResult {
    pub succeeded: Vec<(usize, WriteResponse)>,
    pub failed: Vec<FailedWrite>,
}

impl BatchResult {
    pub fn all_succeeded(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Sends `requests` one at a time, in order, continuing past failures.
pub async fn batch_update(writer: &dyn RemoteWriter, requests: &[WriteRequest]) -> BatchResult {
    let mut result = BatchResult::default();

    for (index, request) in requests.iter().enumerate() {
        match writer.send(request).await {
            Ok(response) => result.succeeded.push((index, response)),
            Err(error) => {
                tracing::warn!("Batch write {} failed: {}", index, error);
                result.failed.push(FailedWrite {
                    index,
                    request: request.clone(),
                    error,
                });
            }
        }
    }

    tracing::info!(
        "Batch finished: {} succeeded, {} failed",
        result.succeeded.len(),
        result.failed.len()
    );
    result
}
