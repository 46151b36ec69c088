use crate::domain::ports::ObjectStorage;
use crate::utils::error::{Result, StorefrontError};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::path::{Component, Path, PathBuf};
use std::time::Duration;

/// 物件路徑只允許相對、不可跳出根目錄
fn relative_object_path(path: &str) -> Result<PathBuf> {
    let trimmed = path.trim_matches('/');
    if trimmed.is_empty() {
        return Err(StorefrontError::StorageError {
            message: "object path cannot be empty".to_string(),
        });
    }
    let relative = PathBuf::from(trimmed);
    if relative
        .components()
        .any(|c| !matches!(c, Component::Normal(_)))
    {
        return Err(StorefrontError::StorageError {
            message: format!("object path must stay inside the bucket: {}", path),
        });
    }
    Ok(relative)
}

/// Objects stored as plain files under `base_path`.
#[derive(Debug, Clone)]
pub struct LocalObjectStorage {
    base_path: PathBuf,
    public_base_url: Option<String>,
}

impl LocalObjectStorage {
    pub fn new<P: AsRef<Path>>(base_path: P, public_base_url: Option<String>) -> Self {
        Self {
            base_path: base_path.as_ref().to_path_buf(),
            public_base_url: public_base_url.map(|u| u.trim_end_matches('/').to_string()),
        }
    }

    fn url_for(&self, relative: &str, full_path: &Path) -> String {
        match &self.public_base_url {
            Some(base) => format!("{}/{}", base, relative),
            None => {
                let absolute = std::fs::canonicalize(full_path).unwrap_or_else(|_| full_path.to_path_buf());
                format!("file://{}", absolute.display())
            }
        }
    }
}

#[async_trait]
impl ObjectStorage for LocalObjectStorage {
    async fn upload(&self, path: &str, data: &[u8], content_type: &str) -> Result<String> {
        let relative = relative_object_path(path)?;
        let full_path = self.base_path.join(&relative);
        if let Some(parent) = full_path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&full_path, data).await?;

        tracing::debug!(
            "💾 Stored {} ({} bytes, {})",
            full_path.display(),
            data.len(),
            content_type
        );
        Ok(self.url_for(path.trim_matches('/'), &full_path))
    }

    async fn delete(&self, path: &str) -> Result<()> {
        let full_path = self.base_path.join(relative_object_path(path)?);
        tokio::fs::remove_file(&full_path)
            .await
            .map_err(|e| StorefrontError::StorageError {
                message: format!("failed to delete {}: {}", full_path.display(), e),
            })
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UploadResponse {
    #[serde(default)]
    download_tokens: Option<String>,
}

/// Bucket REST API in the style of Firebase Storage:
/// `POST {endpoint}/v0/b/{bucket}/o?name={path}` to upload and
/// `{endpoint}/v0/b/{bucket}/o/{encoded path}?alt=media` to read.
#[derive(Debug, Clone)]
pub struct HttpObjectStorage {
    client: Client,
    endpoint: String,
    bucket: String,
    auth_token: Option<String>,
}

fn encode_object_name(path: &str) -> String {
    url::form_urlencoded::byte_serialize(path.trim_matches('/').as_bytes()).collect()
}

impl HttpObjectStorage {
    pub fn new(
        endpoint: &str,
        bucket: &str,
        auth_token: Option<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            bucket: bucket.to_string(),
            auth_token: auth_token.filter(|t| !t.trim().is_empty() && !t.contains("${")),
        })
    }

    fn objects_url(&self) -> String {
        format!("{}/v0/b/{}/o", self.endpoint, self.bucket)
    }

    fn object_url(&self, path: &str) -> String {
        format!("{}/{}", self.objects_url(), encode_object_name(path))
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.auth_token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }
}

#[async_trait]
impl ObjectStorage for HttpObjectStorage {
    async fn upload(&self, path: &str, data: &[u8], content_type: &str) -> Result<String> {
        relative_object_path(path)?;
        let name = path.trim_matches('/');
        tracing::debug!("☁️ Uploading {} ({} bytes)", name, data.len());

        let request = self
            .client
            .post(self.objects_url())
            .query(&[("uploadType", "media"), ("name", name)])
            .header(reqwest::header::CONTENT_TYPE, content_type)
            .body(data.to_vec());
        let response = self.authorize(request).send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(StorefrontError::StorageError {
                message: format!("upload of {} failed: HTTP {}: {}", name, status, body.trim()),
            });
        }

        let uploaded: UploadResponse = response.json().await?;
        let mut url = format!("{}?alt=media", self.object_url(name));
        if let Some(token) = uploaded.download_tokens.filter(|t| !t.is_empty()) {
            url.push_str("&token=");
            url.push_str(&token);
        }
        Ok(url)
    }

    async fn delete(&self, path: &str) -> Result<()> {
        let request = self.client.delete(self.object_url(path));
        let response = self.authorize(request).send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(StorefrontError::StorageError {
                message: format!("delete of {} failed: HTTP {}: {}", path, status, body.trim()),
            });
        }
        Ok(())
    }
}
