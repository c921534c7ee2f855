use std::time::Duration;

use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue};
use reqwest::multipart::{Form, Part};
use reqwest::{Client, Response, Url};
use serde::de::DeserializeOwned;

use super::error::ApiError;
use super::types::{
    BatchObject, CreateBatchRequest, FileObject, ResultRef, StatusSnapshot, SubmitConfig,
    is_safe_id,
};
use super::{BatchApi, RetryPolicy};
use crate::error::BatchError;

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com";

/// Connection and retry settings for a [`BatchClient`].
#[derive(Debug, Clone)]
pub struct ClientSettings {
    pub base_url: String,
    pub request_timeout: Duration,
    pub connect_timeout: Duration,
    /// Policy for upload, submit and poll.
    pub call_retry: RetryPolicy,
    /// Policy for result downloads.
    pub download_retry: RetryPolicy,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            request_timeout: Duration::from_secs(60),
            connect_timeout: Duration::from_secs(10),
            call_retry: RetryPolicy::remote_call(),
            download_retry: RetryPolicy::download(),
        }
    }
}

/// HTTP client for the `/v1/files` and `/v1/batches` endpoints.
///
/// Holds a single `reqwest::Client` so every request reuses the same connection
/// pool; the pool is released when the client is dropped.
pub struct BatchClient {
    client: Client,
    base_url: Url,
    call_retry: RetryPolicy,
    download_retry: RetryPolicy,
}

impl BatchClient {
    /// Builds the client. A key that cannot be sent as a header or an unusable
    /// base URL is a configuration error.
    pub fn new(api_key: &str, settings: ClientSettings) -> Result<Self, BatchError> {
        let mut headers = HeaderMap::new();
        let mut auth = HeaderValue::from_str(&format!("Bearer {api_key}"))
            .map_err(|e| BatchError::Config(format!("API key is not a valid header value: {e}")))?;
        auth.set_sensitive(true);
        headers.insert(AUTHORIZATION, auth);

        let base_url = Url::parse(&settings.base_url)
            .map_err(|e| BatchError::Config(format!("invalid base URL {}: {e}", settings.base_url)))?;
        if base_url.cannot_be_a_base() {
            return Err(BatchError::Config(format!(
                "base URL {} cannot carry a path",
                settings.base_url
            )));
        }

        let client = Client::builder()
            .default_headers(headers)
            .connect_timeout(settings.connect_timeout)
            .timeout(settings.request_timeout)
            .build()
            .map_err(|e| BatchError::Config(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url,
            call_retry: settings.call_retry,
            download_retry: settings.download_retry,
        })
    }

    fn url(&self, path: &str) -> Result<Url, ApiError> {
        self.base_url
            .join(path)
            .map_err(|e| ApiError::Decode(format!("invalid URL {path}: {e}")))
    }

    /// Base URL plus `segments`, each percent-encoded as a single path segment.
    fn endpoint(&self, segments: &[&str]) -> Result<Url, ApiError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| ApiError::Decode(format!("base URL {} cannot carry a path", self.base_url)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn result_url(&self, result: &ResultRef) -> Result<Url, ApiError> {
        match result {
            ResultRef::Url(url) => self.url(url),
            ResultRef::FileId(id) => {
                let id = checked_id(id)?;
                self.endpoint(&["v1", "files", id, "content"])
            }
        }
    }

    async fn upload_once(&self, file_name: &str, content: Vec<u8>) -> Result<String, ApiError> {
        let part = Part::bytes(content)
            .file_name(file_name.to_string())
            .mime_str("application/jsonl")?;
        let form = Form::new().text("purpose", "batch").part("file", part);

        let response = self
            .client
            .post(self.endpoint(&["v1", "files"])?)
            .multipart(form)
            .send()
            .await?;
        let file: FileObject = read_json(check_status(response).await?).await?;
        checked_id(&file.id)?;
        Ok(file.id)
    }

    async fn submit_once(&self, body: &CreateBatchRequest) -> Result<String, ApiError> {
        let response = self
            .client
            .post(self.endpoint(&["v1", "batches"])?)
            .json(body)
            .send()
            .await?;
        let batch: BatchObject = read_json(check_status(response).await?).await?;
        checked_id(&batch.id)?;
        Ok(batch.id)
    }

    async fn poll_once(&self, job_id: &str) -> Result<StatusSnapshot, ApiError> {
        let response = self
            .client
            .get(self.endpoint(&["v1", "batches", checked_id(job_id)?])?)
            .send()
            .await?;
        let batch: BatchObject = read_json(check_status(response).await?).await?;
        Ok(batch.snapshot())
    }

    async fn fetch_once(&self, url: Url) -> Result<Vec<u8>, ApiError> {
        let response = self.client.get(url).send().await?;
        let bytes = check_status(response).await?.bytes().await?;
        Ok(bytes.to_vec())
    }
}

/// Ids from the API become URL segments and file names.
fn checked_id(id: &str) -> Result<&str, ApiError> {
    if is_safe_id(id) {
        Ok(id)
    } else {
        Err(ApiError::Decode(format!("API returned an unusable identifier: {id:?}")))
    }
}

/// Reads the whole body, then parses it. Transport failures while reading stay
/// transient; only a JSON parse failure is a [`ApiError::Decode`].
async fn read_json<T: DeserializeOwned>(response: Response) -> Result<T, ApiError> {
    let body = response.bytes().await?;
    serde_json::from_slice(&body).map_err(|e| ApiError::Decode(e.to_string()))
}

/// Turns a non-success response into [`ApiError::Rejected`] carrying the body text.
async fn check_status(response: Response) -> Result<Response, ApiError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let message = response
        .text()
        .await
        .unwrap_or_else(|_| "unknown error".to_string());
    Err(ApiError::Rejected {
        status: status.as_u16(),
        message,
    })
}

impl BatchApi for BatchClient {
    async fn upload(&self, file_name: &str, content: Vec<u8>) -> Result<String, ApiError> {
        tracing::info!(file_name, bytes = content.len(), "uploading file");
        let id = self
            .call_retry
            .run("upload", || self.upload_once(file_name, content.clone()))
            .await?;
        tracing::info!(file_id = %id, "uploaded file");
        Ok(id)
    }

    async fn submit(&self, input_file_id: &str, config: &SubmitConfig) -> Result<String, ApiError> {
        tracing::info!(input_file_id, endpoint = %config.endpoint, "creating batch job");
        let body = CreateBatchRequest::new(input_file_id, config);
        let id = self
            .call_retry
            .run("submit", || self.submit_once(&body))
            .await?;
        tracing::info!(job_id = %id, "created batch job");
        Ok(id)
    }

    async fn poll(&self, job_id: &str) -> Result<StatusSnapshot, ApiError> {
        let snapshot = self
            .call_retry
            .run("poll", || self.poll_once(job_id))
            .await?;
        tracing::debug!(job_id, status = %snapshot.status, "polled batch status");
        Ok(snapshot)
    }

    async fn fetch(&self, result: &ResultRef) -> Result<Vec<u8>, ApiError> {
        let url = self.result_url(result)?;
        tracing::info!(url = %url, "downloading batch results");
        self.download_retry
            .run("fetch", || self.fetch_once(url.clone()))
            .await
    }
}
