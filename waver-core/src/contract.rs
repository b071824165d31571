//! # contract: the seams between waver and the services it drives
//!
//! Two external collaborators sit behind traits here so the orchestration code
//! can be exercised against real clients, local stand-ins or mocks alike:
//!
//! - [`ObjectStore`]: where generated files end up (S3/MinIO or a local
//!   directory tree).
//! - [`ChatModel`]: the content-generation backend the tutorial stages prompt.
//!
//! ## Mocking & Testing
//! Both traits are annotated for `mockall`; the mocks are exported behind the
//! default `test-export-mocks` feature so integration tests can use them.

use std::path::Path;

use async_trait::async_trait;
#[cfg(any(test, feature = "test-export-mocks"))]
use mockall::automock;
use thiserror::Error;

/// Uniform boxed error returned by pipeline tasks.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Failure talking to the object store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("object store request failed: {0}")]
    Request(String),
    #[error("object store returned status {status} for {url}")]
    Status { status: u16, url: String },
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

/// Failure talking to the content-generation backend.
#[derive(Debug, Error)]
pub enum ChatError {
    #[error("chat request failed: {0}")]
    Request(String),
    #[error("chat backend returned status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("chat backend returned no usable content")]
    EmptyResponse,
}

/// Minimal object-store surface: bucket lifecycle and single-object upload.
///
/// Implementations must tolerate concurrent uploads to distinct keys; the
/// uploader shares one client across concurrent batches.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Whether the bucket already exists.
    async fn bucket_exists(&self, bucket: &str) -> Result<bool, StoreError>;

    /// Create the bucket.
    async fn make_bucket(&self, bucket: &str) -> Result<(), StoreError>;

    /// Upload the local file at `file` under `key` in `bucket`.
    async fn upload_object(&self, bucket: &str, key: &str, file: &Path) -> Result<(), StoreError>;
}

/// A single-turn text completion backend.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait ChatModel: Send + Sync {
    /// Send `prompt` and return the model's text answer.
    async fn chat(&self, prompt: &str) -> Result<String, ChatError>;
}
