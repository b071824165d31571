//! Object-store clients and the startup bucket check.

use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use reqwest::{StatusCode, Url};
use sha2::{Digest, Sha256};
use tracing::{debug, error, info, warn};

use crate::config::{ConfigError, StoreSettings};
use crate::contract::{ObjectStore, StoreError};

/// Build the store client named by `settings.endpoint`.
///
/// `file://<dir>` selects [`FsObjectStore`] rooted at `<dir>`; `http://` and
/// `https://` select [`HttpObjectStore`].
pub fn store_from_settings(settings: &StoreSettings) -> Result<Arc<dyn ObjectStore>, ConfigError> {
    let endpoint = settings.endpoint.trim();
    if endpoint.is_empty() {
        return Err(ConfigError::Missing(
            "Property 'minio.endpoint' was not set.".to_string(),
        ));
    }
    if let Some(root) = endpoint.strip_prefix("file://") {
        info!(root, "Using filesystem object store");
        return Ok(Arc::new(FsObjectStore::new(root)));
    }
    if endpoint.starts_with("http://") || endpoint.starts_with("https://") {
        let store = HttpObjectStore::new(endpoint, &settings.access_key, &settings.secret_key)?;
        info!(endpoint, "Using HTTP object store");
        return Ok(Arc::new(store));
    }
    Err(ConfigError::Invalid(format!(
        "'minio.endpoint' must start with http://, https:// or file://, got '{endpoint}'"
    )))
}

/// Make sure `bucket` exists, creating it when missing.
///
/// Runs once at startup. Failures are logged and reported through the return
/// value only; they never abort the process.
pub async fn init_bucket(store: &dyn ObjectStore, bucket: &str) -> bool {
    if bucket.trim().is_empty() {
        error!("Could not initialize bucket: 'minio.bucket-name' is empty");
        return false;
    }
    match store.bucket_exists(bucket).await {
        Ok(true) => {
            info!(bucket, "Bucket already exists");
            true
        }
        Ok(false) => match store.make_bucket(bucket).await {
            Ok(()) => {
                info!(bucket, "Created bucket");
                true
            }
            Err(e) => {
                error!(bucket, error = %e, "Could not initialize bucket");
                false
            }
        },
        Err(e) => {
            error!(bucket, error = %e, "Could not initialize bucket");
            false
        }
    }
}

/// Object store backed by a local directory: `<root>/<bucket>/<key>`.
pub struct FsObjectStore {
    root: PathBuf,
}

impl FsObjectStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn bucket_dir(&self, bucket: &str) -> PathBuf {
        self.root.join(bucket)
    }
}

fn relative_key_path(key: &str) -> Result<PathBuf, StoreError> {
    let path = Path::new(key);
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::Normal(part) => out.push(part),
            _ => {
                return Err(StoreError::Request(format!(
                    "object key '{key}' must be a relative path without '..'"
                )))
            }
        }
    }
    if out.as_os_str().is_empty() {
        return Err(StoreError::Request("object key is empty".to_string()));
    }
    Ok(out)
}

#[async_trait]
impl ObjectStore for FsObjectStore {
    async fn bucket_exists(&self, bucket: &str) -> Result<bool, StoreError> {
        match tokio::fs::metadata(self.bucket_dir(bucket)).await {
            Ok(meta) => Ok(meta.is_dir()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(StoreError::Io(e)),
        }
    }

    async fn make_bucket(&self, bucket: &str) -> Result<(), StoreError> {
        tokio::fs::create_dir_all(self.bucket_dir(bucket)).await?;
        Ok(())
    }

    async fn upload_object(&self, bucket: &str, key: &str, file: &Path) -> Result<(), StoreError> {
        if !self.bucket_exists(bucket).await? {
            return Err(StoreError::Request(format!("bucket '{bucket}' does not exist")));
        }
        let target = self.bucket_dir(bucket).join(relative_key_path(key)?);
        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let bytes = tokio::fs::copy(file, &target).await?;
        debug!(bucket, key, bytes, "Stored object on filesystem");
        Ok(())
    }
}

/// S3-compatible client using path-style requests.
///
/// Credentials travel as HTTP basic auth; request signing is not performed.
pub struct HttpObjectStore {
    client: reqwest::Client,
    endpoint: Url,
    access_key: String,
    secret_key: String,
}

impl HttpObjectStore {
    pub fn new(endpoint: &str, access_key: &str, secret_key: &str) -> Result<Self, ConfigError> {
        let endpoint = Url::parse(endpoint)
            .map_err(|e| ConfigError::Invalid(format!("'minio.endpoint' is not a valid URL: {e}")))?;
        if endpoint.cannot_be_a_base() {
            return Err(ConfigError::Invalid(
                "'minio.endpoint' cannot be used as a base URL".to_string(),
            ));
        }
        Ok(Self {
            client: reqwest::Client::new(),
            endpoint,
            access_key: access_key.to_string(),
            secret_key: secret_key.to_string(),
        })
    }

    fn object_url<'a>(&self, segments: impl IntoIterator<Item = &'a str>) -> Url {
        let mut url = self.endpoint.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        if self.access_key.is_empty() {
            request
        } else {
            request.basic_auth(&self.access_key, Some(&self.secret_key))
        }
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> Result<reqwest::Response, StoreError> {
        self.authorize(request)
            .send()
            .await
            .map_err(|e| StoreError::Request(e.to_string()))
    }
}

#[async_trait]
impl ObjectStore for HttpObjectStore {
    async fn bucket_exists(&self, bucket: &str) -> Result<bool, StoreError> {
        let url = self.object_url([bucket]);
        let response = self.send(self.client.head(url.clone())).await?;
        match response.status() {
            status if status.is_success() => Ok(true),
            StatusCode::NOT_FOUND => Ok(false),
            status => Err(StoreError::Status {
                status: status.as_u16(),
                url: url.to_string(),
            }),
        }
    }

    async fn make_bucket(&self, bucket: &str) -> Result<(), StoreError> {
        let url = self.object_url([bucket]);
        let response = self.send(self.client.put(url.clone())).await?;
        match response.status() {
            status if status.is_success() => Ok(()),
            StatusCode::CONFLICT => {
                warn!(bucket, "Bucket already exists while creating it");
                Ok(())
            }
            status => Err(StoreError::Status {
                status: status.as_u16(),
                url: url.to_string(),
            }),
        }
    }

    async fn upload_object(&self, bucket: &str, key: &str, file: &Path) -> Result<(), StoreError> {
        let body = tokio::fs::read(file).await?;
        let content_hash = {
            let mut hasher = Sha256::new();
            hasher.update(&body);
            format!("{:x}", hasher.finalize())
        };
        let url = self.object_url(std::iter::once(bucket).chain(key.split('/')));
        debug!(bucket, key, size = body.len(), "Uploading object");
        let response = self
            .send(
                self.client
                    .put(url.clone())
                    .header("x-amz-content-sha256", content_hash)
                    .body(body),
            )
            .await?;
        let status = response.status();
        if !status.is_success() {
            return Err(StoreError::Status {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }
        Ok(())
    }
}
