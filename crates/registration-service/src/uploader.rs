//! Promotion of generated documents to durable public storage
//!
//! Uploaders never delete the local file; the submission pipeline removes
//! its scratch files once it is finished with them.

use async_trait::async_trait;
use document_renderer::sanitize_file_component;
use reqwest::header::CONTENT_TYPE;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

use crate::error::UploadError;

/// Uploads a local file and returns its public URL
#[async_trait]
pub trait Uploader: Send + Sync {
    async fn upload(&self, local_path: &Path, owner: &str) -> Result<String, UploadError>;
}

/// Storage key `{prefix}/{owner}/{file name}`
pub fn object_key(prefix: &str, owner: &str, local_path: &Path) -> String {
    let file_name = local_path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "document".to_string());

    let prefix = prefix.trim_matches('/');
    let owner = sanitize_file_component(owner);

    if prefix.is_empty() {
        format!("{}/{}", owner, file_name)
    } else {
        format!("{}/{}/{}", prefix, owner, file_name)
    }
}

/// MIME type for the files this service produces
pub fn content_type_for(path: &Path) -> &'static str {
    match path.extension().and_then(|e| e.to_str()) {
        Some(ext) if ext.eq_ignore_ascii_case("pdf") => "application/pdf",
        Some(ext) if ext.eq_ignore_ascii_case("xlsx") => {
            "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet"
        }
        Some(ext) if ext.eq_ignore_ascii_case("html") => "text/html",
        _ => "application/octet-stream",
    }
}

fn public_url(base: &str, key: &str) -> String {
    format!("{}/{}", base.trim_end_matches('/'), key)
}

/// Object storage reached over HTTP (`PUT {endpoint}/{bucket}/{key}`)
pub struct HttpUploader {
    client: reqwest::Client,
    endpoint: String,
    bucket: String,
    token: String,
    public_base_url: String,
    prefix: String,
}

impl HttpUploader {
    pub fn new(
        endpoint: String,
        bucket: String,
        token: String,
        public_base_url: String,
        prefix: String,
        timeout: Duration,
    ) -> Result<Self, UploadError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            endpoint,
            bucket,
            token,
            public_base_url,
            prefix,
        })
    }
}

#[async_trait]
impl Uploader for HttpUploader {
    async fn upload(&self, local_path: &Path, owner: &str) -> Result<String, UploadError> {
        let bytes = tokio::fs::read(local_path)
            .await
            .map_err(|source| UploadError::Read {
                path: local_path.to_path_buf(),
                source,
            })?;

        let key = object_key(&self.prefix, owner, local_path);
        let url = format!(
            "{}/{}/{}",
            self.endpoint.trim_end_matches('/'),
            self.bucket,
            key
        );

        debug!("Uploading {} ({} bytes) to {}", local_path.display(), bytes.len(), url);

        let response = self
            .client
            .put(&url)
            .bearer_auth(&self.token)
            .header(CONTENT_TYPE, content_type_for(local_path))
            .body(bytes)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(UploadError::Rejected { status, body });
        }

        let public = public_url(&self.public_base_url, &key);
        debug!("Uploaded {} to {}", local_path.display(), public);
        Ok(public)
    }
}

/// Copies uploads into a local directory; used in mock mode
pub struct LocalUploader {
    root: PathBuf,
    public_base_url: String,
    prefix: String,
}

impl LocalUploader {
    pub fn new(root: impl Into<PathBuf>, public_base_url: String, prefix: String) -> Self {
        Self {
            root: root.into(),
            public_base_url,
            prefix,
        }
    }
}

#[async_trait]
impl Uploader for LocalUploader {
    async fn upload(&self, local_path: &Path, owner: &str) -> Result<String, UploadError> {
        if !tokio::fs::try_exists(local_path).await.unwrap_or(false) {
            return Err(UploadError::Read {
                path: local_path.to_path_buf(),
                source: std::io::Error::from(std::io::ErrorKind::NotFound),
            });
        }

        let key = object_key(&self.prefix, owner, local_path);
        let destination = self.root.join(&key);
        if let Some(parent) = destination.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::copy(local_path, &destination).await?;

        let public = public_url(&self.public_base_url, &key);
        debug!("Stored {} at {}", local_path.display(), destination.display());
        Ok(public)
    }
}
