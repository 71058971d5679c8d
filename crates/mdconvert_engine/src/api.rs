use std::time::Duration;

use futures_util::StreamExt;
use mdconvert_logging::{convert_debug, convert_info};
use reqwest::multipart::{Form, Part};
use reqwest::{Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;
use url::Url;

use crate::{ApiError, BatchStatus, FailureKind, MarkdownPreview, RemoteStatus, SubmitReceipt, UploadFile};

#[derive(Debug, Clone)]
pub struct ApiSettings {
    pub base_url: String,
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
    pub max_download_bytes: u64,
}

impl Default for ApiSettings {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:5000".to_string(),
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(60),
            max_download_bytes: 50 * 1024 * 1024,
        }
    }
}

/// Remote conversion backend. Every call is independent; implementations
/// must be shareable across the tasks spawned by the engine.
#[async_trait::async_trait]
pub trait ConversionApi: Send + Sync {
    async fn submit(&self, file: &UploadFile, device_id: &str) -> Result<SubmitReceipt, ApiError>;

    async fn status(&self, remote_id: &str) -> Result<RemoteStatus, ApiError>;

    async fn batch_status(&self, remote_ids: &[String]) -> Result<BatchStatus, ApiError>;

    async fn preview(&self, remote_id: &str) -> Result<MarkdownPreview, ApiError>;

    async fn download(&self, remote_id: &str) -> Result<Vec<u8>, ApiError>;

    async fn clear_history(&self, remote_ids: &[String], device_id: &str) -> Result<(), ApiError>;
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

#[derive(Debug, Clone)]
pub struct HttpConversionApi {
    settings: ApiSettings,
    base: Url,
    client: reqwest::Client,
}

impl HttpConversionApi {
    pub fn new(settings: ApiSettings) -> Result<Self, ApiError> {
        let base = Url::parse(&settings.base_url)
            .map_err(|err| ApiError::new(FailureKind::InvalidUrl, err.to_string()))?;
        if base.cannot_be_a_base() {
            return Err(ApiError::new(
                FailureKind::InvalidUrl,
                format!("{} cannot be used as a base url", settings.base_url),
            ));
        }
        let client = reqwest::Client::builder()
            .connect_timeout(settings.connect_timeout)
            .timeout(settings.request_timeout)
            .build()
            .map_err(|err| ApiError::new(FailureKind::Network, err.to_string()))?;
        Ok(Self {
            settings,
            base,
            client,
        })
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url, ApiError> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|_| ApiError::new(FailureKind::InvalidUrl, self.settings.base_url.clone()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn send(&self, request: reqwest::RequestBuilder, fallback: &str) -> Result<Response, ApiError> {
        let response = request.send().await.map_err(map_reqwest_error)?;
        if response.status().is_success() {
            Ok(response)
        } else {
            Err(failure_from_response(response, fallback).await)
        }
    }
}

#[async_trait::async_trait]
impl ConversionApi for HttpConversionApi {
    async fn submit(&self, file: &UploadFile, device_id: &str) -> Result<SubmitReceipt, ApiError> {
        let bytes = tokio::fs::read(&file.path).await.map_err(|err| {
            ApiError::new(
                FailureKind::SourceUnavailable,
                format!("{}: {err}", file.path.display()),
            )
        })?;
        convert_info!("Uploading {} ({} bytes)", file.name, bytes.len());

        let part = Part::bytes(bytes).file_name(file.name.clone());
        let form = Form::new()
            .part("file", part)
            .text("deviceId", device_id.to_string());
        let url = self.endpoint(&["api", "convert"])?;
        let response = self
            .send(self.client.post(url).multipart(form), "Conversion failed")
            .await?;
        decode_json(response).await
    }

    async fn status(&self, remote_id: &str) -> Result<RemoteStatus, ApiError> {
        let url = self.endpoint(&["api", "status", remote_id])?;
        let response = self
            .send(self.client.get(url), "Failed to fetch conversion status")
            .await?;
        let status: RemoteStatus = decode_json(response).await?;
        convert_debug!(
            "Status {} state={} progress={}",
            remote_id,
            status.state,
            status.progress
        );
        Ok(status)
    }

    async fn batch_status(&self, remote_ids: &[String]) -> Result<BatchStatus, ApiError> {
        let url = self.endpoint(&["api", "status", "batch"])?;
        let body = json!({ "taskIds": remote_ids });
        let response = self
            .send(
                self.client.post(url).json(&body),
                "Failed to fetch batch conversion status",
            )
            .await?;
        decode_json(response).await
    }

    async fn preview(&self, remote_id: &str) -> Result<MarkdownPreview, ApiError> {
        let url = self.endpoint(&["api", "convert", remote_id, "preview"])?;
        let response = self
            .send(self.client.get(url), "Failed to preview file")
            .await?;
        decode_json(response).await
    }

    async fn download(&self, remote_id: &str) -> Result<Vec<u8>, ApiError> {
        let url = self.endpoint(&["api", "convert", remote_id, "download"])?;
        let response = self
            .send(self.client.get(url), "Failed to download file")
            .await?;

        let max_bytes = self.settings.max_download_bytes;
        if let Some(content_len) = response.content_length() {
            if content_len > max_bytes {
                return Err(ApiError::new(
                    FailureKind::TooLarge {
                        max_bytes,
                        actual: Some(content_len),
                    },
                    "download too large",
                ));
            }
        }

        let mut bytes = Vec::new();
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(map_reqwest_error)?;
            let next_len = bytes.len() as u64 + chunk.len() as u64;
            if next_len > max_bytes {
                return Err(ApiError::new(
                    FailureKind::TooLarge {
                        max_bytes,
                        actual: Some(next_len),
                    },
                    "download too large",
                ));
            }
            bytes.extend_from_slice(&chunk);
        }
        Ok(bytes)
    }

    async fn clear_history(&self, remote_ids: &[String], device_id: &str) -> Result<(), ApiError> {
        let url = self.endpoint(&["api", "convert", "clear-history"])?;
        let body = json!({ "taskIds": remote_ids, "deviceId": device_id });
        self.send(self.client.post(url).json(&body), "Failed to clear history")
            .await?;
        Ok(())
    }
}

async fn decode_json<T: DeserializeOwned>(response: Response) -> Result<T, ApiError> {
    let bytes = response.bytes().await.map_err(map_reqwest_error)?;
    serde_json::from_slice(&bytes).map_err(|err| ApiError::new(FailureKind::Decode, err.to_string()))
}

async fn failure_from_response(response: Response, fallback: &str) -> ApiError {
    let status: StatusCode = response.status();
    let message = response
        .json::<ErrorBody>()
        .await
        .ok()
        .and_then(|body| body.error.or(body.message))
        .filter(|message| !message.trim().is_empty())
        .unwrap_or_else(|| fallback.to_string());
    ApiError::new(FailureKind::HttpStatus(status.as_u16()), message)
}

fn map_reqwest_error(err: reqwest::Error) -> ApiError {
    if err.is_timeout() {
        return ApiError::new(FailureKind::Timeout, err.to_string());
    }
    if err.is_decode() {
        return ApiError::new(FailureKind::Decode, err.to_string());
    }
    ApiError::new(FailureKind::Network, err.to_string())
}
