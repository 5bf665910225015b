//! Client side of the dashboard HTTP contract
//!
//! [`ApiClient`] is the seam between navigation and the network. The
//! reqwest-backed [`HttpApiClient`] talks to `explorer-server` (or anything
//! else serving the same JSON); tests substitute scripted clients.
//!
//! Error-carrying bodies (`{"error": "..."}`) become [`ApiError::Remote`]
//! whatever their status code.

use std::time::Duration;

use async_trait::async_trait;
use explorer_core::api::{
    AnalysisStatus, AnalyzeRequest, AnalyzeResponse, ErrorBody, TopTracesResponse,
    TracesResponse, TranslateReply,
};
use explorer_core::models::PresentationPackage;
use explorer_core::{Category, Trace, TranslationBundle};
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("{message}")]
    Remote { status: u16, message: String },

    #[error("Unexpected status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Malformed response: {0}")]
    Decode(#[from] serde_json::Error),
}

/// The calls the dashboard makes. Each one is a single request.
#[async_trait]
pub trait ApiClient: Send + Sync {
    async fn traces(&self) -> Result<TracesResponse, ApiError>;

    async fn analysis_status(&self) -> Result<AnalysisStatus, ApiError>;

    async fn analyze(&self, category: Category) -> Result<AnalyzeResponse, ApiError>;

    async fn top_traces(&self, category: Category) -> Result<TopTracesResponse, ApiError>;

    async fn trace(&self, trace_id: &str) -> Result<Trace, ApiError>;

    async fn translate(&self, trace_id: &str) -> Result<TranslationBundle, ApiError>;

    async fn presentation_package(&self, trace_id: &str) -> Result<PresentationPackage, ApiError>;
}

#[derive(Debug, Clone)]
pub struct HttpApiClient {
    client: Client,
    base_url: String,
}

impl HttpApiClient {
    /// Analysis and package generation wait on the model, so the timeout is
    /// generous.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, ApiError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        let response = self.client.get(self.url(path)).send().await?;
        decode(response).await
    }
}

async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, ApiError> {
    let status = response.status();
    let body = response.text().await?;

    if !status.is_success() {
        return Err(match serde_json::from_str::<ErrorBody>(&body) {
            Ok(err) => ApiError::Remote {
                status: status.as_u16(),
                message: err.error,
            },
            Err(_) => ApiError::Status {
                status: status.as_u16(),
                body,
            },
        });
    }

    let value: serde_json::Value = serde_json::from_str(&body)?;
    if let Some(message) = value.get("error").and_then(|e| e.as_str()) {
        return Err(ApiError::Remote {
            status: status.as_u16(),
            message: message.to_string(),
        });
    }
    Ok(serde_json::from_value(value)?)
}

/// Path segment for a trace id.
fn segment(id: &str) -> String {
    let mut out = String::with_capacity(id.len());
    for b in id.bytes() {
        if b.is_ascii_alphanumeric() || matches!(b, b'-' | b'_' | b'.' | b'~') {
            out.push(b as char);
        } else {
            out.push_str(&format!("%{:02X}", b));
        }
    }
    out
}

#[async_trait]
impl ApiClient for HttpApiClient {
    async fn traces(&self) -> Result<TracesResponse, ApiError> {
        self.get("/api/traces").await
    }

    async fn analysis_status(&self) -> Result<AnalysisStatus, ApiError> {
        self.get("/api/analysis-status").await
    }

    async fn analyze(&self, category: Category) -> Result<AnalyzeResponse, ApiError> {
        let response = self
            .client
            .post(self.url("/api/analyze"))
            .json(&AnalyzeRequest {
                category: Some(category.key().to_string()),
            })
            .send()
            .await?;
        decode(response).await
    }

    async fn top_traces(&self, category: Category) -> Result<TopTracesResponse, ApiError> {
        self.get(&format!("/api/top-traces/{}", category.key())).await
    }

    async fn trace(&self, trace_id: &str) -> Result<Trace, ApiError> {
        self.get(&format!("/api/trace/{}", segment(trace_id))).await
    }

    async fn translate(&self, trace_id: &str) -> Result<TranslationBundle, ApiError> {
        let reply: TranslateReply = self
            .get(&format!("/api/translate/{}", segment(trace_id)))
            .await?;
        match reply {
            TranslateReply::Translated(bundle) => Ok(bundle),
            TranslateReply::Failed { error } => Err(ApiError::Remote {
                status: 200,
                message: error,
            }),
        }
    }

    async fn presentation_package(&self, trace_id: &str) -> Result<PresentationPackage, ApiError> {
        let mut package: PresentationPackage = self
            .get(&format!("/api/presentation-package/{}", segment(trace_id)))
            .await?;
        if package.trace_id.is_empty() {
            package.trace_id = trace_id.to_string();
        }
        Ok(package)
    }
}

// ============================================================================
// TESTS
// ============================================================================
