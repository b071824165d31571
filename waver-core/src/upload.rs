//! # upload: bulk upload of a generated output tree
//!
//! The last pipeline stage. [`UploadTask`] walks a local directory and
//! uploads every regular file to the object store under
//! `<project>/<path relative to the root>`, one file at a time in walk order.
//!
//! ## Failure model
//! - The root must be an existing directory. This is checked synchronously,
//!   before any walk or upload starts ([`UploadError::InvalidArgument`]).
//! - A file that fails to upload is recorded in
//!   [`UploadResult::failed_uploads`] by its local path and the walk goes on.
//! - Only a failure to read the tree itself aborts the batch
//!   ([`UploadError::DirectoryRead`]).
//!
//! Successful uploads are recorded by object key, failed ones by local path.
//! Consumers of the report rely on that shape, so it is kept as is.

use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::contract::{BoxError, ObjectStore};
use crate::path_util::folder_name;
use crate::pipeline::{PipelineContext, Task};
use crate::tutorial::GenerationContext;

#[derive(Debug, Error)]
pub enum UploadError {
    #[error("Source path must be an existing directory: {}", .0.display())]
    InvalidArgument(PathBuf),
    #[error("Failed to read the source directory: {}", .path.display())]
    DirectoryRead {
        path: PathBuf,
        #[source]
        source: walkdir::Error,
    },
    #[error("invalid upload configuration: {0}")]
    InvalidConfiguration(String),
    #[error("upload worker stopped before finishing")]
    Aborted,
}

/// Outcome of one upload batch. Every regular file visited lands in exactly
/// one of the two lists, in walk order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadResult {
    /// Object keys of files that were uploaded.
    pub successful_uploads: Vec<String>,
    /// Local paths of files whose upload failed.
    pub failed_uploads: Vec<String>,
}

impl UploadResult {
    pub fn success_count(&self) -> usize {
        self.successful_uploads.len()
    }

    pub fn failure_count(&self) -> usize {
        self.failed_uploads.len()
    }
}

/// Object key for `relative` under `project`, always `/`-separated.
pub fn object_key(project: &str, relative: &Path) -> String {
    let mut key = String::from(project);
    for component in relative.components() {
        if let Component::Normal(part) = component {
            key.push('/');
            key.push_str(&part.to_string_lossy());
        }
    }
    key
}

/// Uploads a fixed output directory under a project namespace.
pub struct UploadTask {
    store: Arc<dyn ObjectStore>,
    source_directory: PathBuf,
    bucket_name: String,
    project_name: String,
}

impl UploadTask {
    /// Upload `source_directory`, namespaced by the directory's own name.
    pub fn new(
        store: Arc<dyn ObjectStore>,
        source_directory: impl Into<PathBuf>,
        bucket_name: impl Into<String>,
    ) -> Result<Self, UploadError> {
        let source_directory = source_directory.into();
        let project_name = folder_name(&source_directory.to_string_lossy()).ok_or_else(|| {
            UploadError::InvalidConfiguration(format!(
                "cannot derive a project name from '{}'",
                source_directory.display()
            ))
        })?;
        Self::for_project(store, source_directory, bucket_name, project_name)
    }

    /// Upload `source_directory` under an already derived `project_name`.
    ///
    /// The name is used as given; no `.git` suffix is stripped here.
    pub fn for_project(
        store: Arc<dyn ObjectStore>,
        source_directory: impl Into<PathBuf>,
        bucket_name: impl Into<String>,
        project_name: impl Into<String>,
    ) -> Result<Self, UploadError> {
        let bucket_name = bucket_name.into();
        if bucket_name.trim().is_empty() {
            return Err(UploadError::InvalidConfiguration(
                "'minio.bucket-name' must not be empty".to_string(),
            ));
        }
        let project_name = project_name.into();
        if project_name.trim().is_empty() {
            return Err(UploadError::InvalidConfiguration(
                "project name must not be empty".to_string(),
            ));
        }
        Ok(Self {
            store,
            source_directory: source_directory.into(),
            bucket_name,
            project_name,
        })
    }

    pub fn source_directory(&self) -> &Path {
        &self.source_directory
    }

    pub fn bucket_name(&self) -> &str {
        &self.bucket_name
    }

    pub fn project_name(&self) -> &str {
        &self.project_name
    }

    /// Upload every regular file under `root` to `bucket`.
    pub async fn upload_directory(
        &self,
        root: &Path,
        bucket: &str,
    ) -> Result<UploadResult, UploadError> {
        ensure_directory(root)?;
        upload_tree(self.store.as_ref(), root, bucket, &self.project_name).await
    }

    /// Start uploading the configured directory on a background worker.
    ///
    /// The directory check happens here, before the worker is spawned.
    pub fn spawn(&self) -> Result<JoinHandle<Result<UploadResult, UploadError>>, UploadError> {
        ensure_directory(&self.source_directory)?;
        let store = Arc::clone(&self.store);
        let root = self.source_directory.clone();
        let bucket = self.bucket_name.clone();
        let project = self.project_name.clone();
        Ok(tokio::spawn(async move {
            upload_tree(store.as_ref(), &root, &bucket, &project).await
        }))
    }
}

#[async_trait]
impl Task<GenerationContext, UploadResult> for UploadTask {
    async fn execute(
        &self,
        _input: GenerationContext,
        ctx: &PipelineContext,
    ) -> Result<UploadResult, BoxError> {
        let result = match self.spawn()?.await {
            Ok(outcome) => outcome?,
            Err(_) => return Err(Box::new(UploadError::Aborted)),
        };
        ctx.put("upload.successful", result.success_count());
        ctx.put("upload.failed", result.failure_count());
        Ok(result)
    }
}

fn ensure_directory(root: &Path) -> Result<(), UploadError> {
    if root.is_dir() {
        Ok(())
    } else {
        Err(UploadError::InvalidArgument(root.to_path_buf()))
    }
}

async fn upload_tree(
    store: &dyn ObjectStore,
    root: &Path,
    bucket: &str,
    project: &str,
) -> Result<UploadResult, UploadError> {
    info!(root = %root.display(), bucket, project, "Uploading directory");
    let mut result = UploadResult::default();

    for entry in WalkDir::new(root).follow_links(false) {
        let entry = entry.map_err(|source| UploadError::DirectoryRead {
            path: root.to_path_buf(),
            source,
        })?;
        if !entry.file_type().is_file() {
            continue;
        }

        let path = entry.path();
        let relative = path.strip_prefix(root).unwrap_or(path);
        let key = object_key(project, relative);
        match store.upload_object(bucket, &key, path).await {
            Ok(()) => {
                debug!(key = %key, "Uploaded object");
                result.successful_uploads.push(key);
            }
            Err(e) => {
                warn!(path = %path.display(), key = %key, error = %e, "Upload failed");
                result.failed_uploads.push(path.display().to_string());
            }
        }
    }

    info!(
        successful = result.success_count(),
        failed = result.failure_count(),
        "Upload batch finished"
    );
    Ok(result)
}
