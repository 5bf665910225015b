//! LLM module for the trace explorer: Gemini text generation
//!
//! Provides an `LlmBackend` trait with the Gemini implementation used for
//! category scoring, translation and presentation packages:
//! - **generate**: plain `generateContent` call, returns the reply text
//! - **generate_grounded**: same call with the Google Search tool enabled,
//!   returning the verified source URLs from the grounding metadata
//!
//! Replies are free text; `parse_json_reply` strips Markdown fences before
//! deserialising the JSON the prompts ask for.

use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use tokio_retry::strategy::{jitter, ExponentialBackoff};
use tokio_retry::Retry;

use crate::config::LlmSettings;

// ============================================================================
// LlmBackend trait
// ============================================================================

/// Abstraction over text generation providers.
#[async_trait]
pub trait LlmBackend: Send + Sync {
    /// Generate a reply for `prompt`.
    async fn generate(&self, prompt: &str) -> Result<String, LlmError>;

    /// Generate a reply with web search grounding. Backends without search
    /// support answer ungrounded with no sources.
    async fn generate_grounded(&self, prompt: &str) -> Result<GroundedReply, LlmError> {
        let text = self.generate(prompt).await?;
        Ok(GroundedReply {
            text,
            sources: Vec::new(),
        })
    }

    /// Backend name for logging.
    fn name(&self) -> &str;
}

/// Reply text plus the web sources the answer was grounded on.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GroundedReply {
    pub text: String,
    pub sources: Vec<GroundingSource>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GroundingSource {
    pub uri: String,
    pub title: Option<String>,
}

// ============================================================================
// Error types
// ============================================================================

#[derive(Error, Debug)]
pub enum LlmError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error ({code}): {message}")]
    Api { code: u16, message: String },

    #[error("Model returned no text")]
    EmptyResponse,

    #[error("Missing API key")]
    MissingApiKey,

    #[error("All {attempts} retry attempts failed")]
    RetryExhausted { attempts: usize },

    #[error("Reply is not valid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),
}

// ============================================================================
// Config
// ============================================================================

/// Gemini client configuration
#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub api_key: String,
    pub model: String,
    pub base_url: String,
    pub max_retries: usize,
    pub retry_delay_ms: u64,
    pub timeout_seconds: u64,
}

impl LlmConfig {
    /// Build from file settings; the key falls back to `GOOGLE_API_KEY`.
    pub fn from_settings(settings: &LlmSettings, api_key: Option<String>) -> Self {
        let api_key = api_key
            .or_else(|| std::env::var("GOOGLE_API_KEY").ok())
            .unwrap_or_default();

        Self {
            api_key,
            model: settings.model.clone(),
            base_url: settings.base_url.clone(),
            max_retries: settings.max_retries,
            retry_delay_ms: settings.retry_delay_ms,
            timeout_seconds: settings.timeout_seconds,
        }
    }
}

// ============================================================================
// Gemini API structs (private)
// ============================================================================

#[derive(Debug, Serialize)]
struct GenerateRequest {
    contents: Vec<GeminiContent>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<GeminiTool>,
}

#[derive(Debug, Serialize)]
struct GeminiContent {
    parts: Vec<GeminiPart>,
}

#[derive(Debug, Serialize)]
struct GeminiPart {
    text: String,
}

#[derive(Debug, Serialize)]
struct GeminiTool {
    google_search: GoogleSearch,
}

#[derive(Debug, Serialize)]
struct GoogleSearch {}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    content: Option<CandidateContent>,
    grounding_metadata: Option<GroundingMetadata>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GroundingMetadata {
    #[serde(default)]
    grounding_chunks: Vec<GroundingChunk>,
}

#[derive(Debug, Deserialize)]
struct GroundingChunk {
    web: Option<WebChunk>,
}

#[derive(Debug, Deserialize)]
struct WebChunk {
    uri: Option<String>,
    title: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GeminiErrorResponse {
    error: Option<GeminiErrorDetail>,
}

#[derive(Debug, Deserialize)]
struct GeminiErrorDetail {
    code: u16,
    message: String,
}

// ============================================================================
// GeminiClient
// ============================================================================

/// Gemini client: calls the `generateContent` endpoint.
#[derive(Debug, Clone)]
pub struct GeminiClient {
    client: Client,
    config: LlmConfig,
    base_url: String,
}

impl GeminiClient {
    pub fn new(config: LlmConfig) -> Result<Self, LlmError> {
        let base_url = config.base_url.clone();
        Self::with_base_url(config, base_url)
    }

    /// Create a client with a custom base URL (for testing / integration)
    pub fn with_base_url(config: LlmConfig, base_url: String) -> Result<Self, LlmError> {
        if config.api_key.is_empty() {
            return Err(LlmError::MissingApiKey);
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()?;

        Ok(Self {
            client,
            config,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    async fn generate_with_retry(
        &self,
        prompt: &str,
        grounded: bool,
    ) -> Result<GroundedReply, LlmError> {
        let retry_strategy = ExponentialBackoff::from_millis(self.config.retry_delay_ms)
            .max_delay(Duration::from_secs(10))
            .map(jitter)
            .take(self.config.max_retries);

        let result = Retry::spawn(retry_strategy, || self.generate_once(prompt, grounded)).await;

        match result {
            Ok(reply) => Ok(reply),
            Err(e) => {
                tracing::error!(
                    attempts = self.config.max_retries,
                    grounded,
                    error = %e,
                    "All Gemini retry attempts failed"
                );
                Err(LlmError::RetryExhausted {
                    attempts: self.config.max_retries,
                })
            }
        }
    }

    async fn generate_once(&self, prompt: &str, grounded: bool) -> Result<GroundedReply, LlmError> {
        let url = format!(
            "{}/models/{}:generateContent?key={}",
            self.base_url, self.config.model, self.config.api_key
        );

        let request = GenerateRequest {
            contents: vec![GeminiContent {
                parts: vec![GeminiPart {
                    text: prompt.to_string(),
                }],
            }],
            tools: if grounded {
                vec![GeminiTool {
                    google_search: GoogleSearch {},
                }]
            } else {
                Vec::new()
            },
        };

        let response = self.client.post(&url).json(&request).send().await?;

        let status = response.status();

        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            let error_detail = serde_json::from_str::<GeminiErrorResponse>(&error_body)
                .ok()
                .and_then(|e| e.error);

            let (code, message) = error_detail
                .map(|e| (e.code, e.message))
                .unwrap_or((status.as_u16(), error_body));

            tracing::error!(code = code, message = %message, "Gemini API error");

            return Err(LlmError::Api { code, message });
        }

        let body: GenerateResponse = response.json().await?;
        let candidate = body
            .candidates
            .into_iter()
            .next()
            .ok_or(LlmError::EmptyResponse)?;

        let text: String = candidate
            .content
            .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
            .unwrap_or_default();

        if text.trim().is_empty() {
            return Err(LlmError::EmptyResponse);
        }

        let sources = candidate
            .grounding_metadata
            .map(|m| {
                m.grounding_chunks
                    .into_iter()
                    .filter_map(|chunk| chunk.web)
                    .filter_map(|web| {
                        web.uri.map(|uri| GroundingSource {
                            uri,
                            title: web.title,
                        })
                    })
                    .collect()
            })
            .unwrap_or_default();

        Ok(GroundedReply { text, sources })
    }
}

#[async_trait]
impl LlmBackend for GeminiClient {
    async fn generate(&self, prompt: &str) -> Result<String, LlmError> {
        self.generate_with_retry(prompt, false)
            .await
            .map(|reply| reply.text)
    }

    async fn generate_grounded(&self, prompt: &str) -> Result<GroundedReply, LlmError> {
        self.generate_with_retry(prompt, true).await
    }

    fn name(&self) -> &str {
        "gemini"
    }
}

/// Stand-in used when no API key is configured. Every call fails, so the
/// dashboard still serves traces while LLM-backed endpoints report errors.
#[derive(Debug, Clone, Default)]
pub struct UnconfiguredBackend;

#[async_trait]
impl LlmBackend for UnconfiguredBackend {
    async fn generate(&self, _prompt: &str) -> Result<String, LlmError> {
        Err(LlmError::MissingApiKey)
    }

    fn name(&self) -> &str {
        "unconfigured"
    }
}

// ============================================================================
// Reply parsing
// ============================================================================

/// Strip a Markdown code fence from a model reply, if present.
pub fn extract_json_block(text: &str) -> &str {
    let inner = if let Some((_, rest)) = text.split_once("```json") {
        rest.split("```").next().unwrap_or(rest)
    } else if let Some((_, rest)) = text.split_once("```") {
        rest.split("```").next().unwrap_or(rest)
    } else {
        text
    };
    inner.trim()
}

/// Parse the JSON object a prompt asked for out of a model reply.
pub fn parse_json_reply<T: DeserializeOwned>(text: &str) -> Result<T, LlmError> {
    Ok(serde_json::from_str(extract_json_block(text))?)
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_json, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_config(api_key: &str) -> LlmConfig {
        LlmConfig {
            api_key: api_key.to_string(),
            model: "gemini-2.0-flash".to_string(),
            base_url: "http://unused".to_string(),
            max_retries: 3,
            retry_delay_ms: 10,
            timeout_seconds: 5,
        }
    }

    fn text_response(text: &str) -> serde_json::Value {
        serde_json::json!({
            "candidates": [{ "content": { "parts": [{ "text": text }] } }]
        })
    }

    #[tokio::test]
    async fn test_generate_calls_api_and_returns_text() {
        let mock_server = MockServer::start().await;
        let client = GeminiClient::with_base_url(test_config("test-api-key"), mock_server.uri())
            .expect("Failed to create client");

        Mock::given(method("POST"))
            .and(path("/models/gemini-2.0-flash:generateContent"))
            .and(query_param("key", "test-api-key"))
            .and(body_json(serde_json::json!({
                "contents": [{ "parts": [{ "text": "score these traces" }] }]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(text_response("{\"ok\":true}")))
            .mount(&mock_server)
            .await;

        let text = client.generate("score these traces").await.unwrap();
        assert_eq!(text, "{\"ok\":true}");
    }

    #[tokio::test]
    async fn test_grounded_sends_search_tool_and_collects_sources() {
        let mock_server = MockServer::start().await;
        let client = GeminiClient::with_base_url(test_config("test-api-key"), mock_server.uri())
            .unwrap();

        Mock::given(method("POST"))
            .and(body_json(serde_json::json!({
                "contents": [{ "parts": [{ "text": "find evidence" }] }],
                "tools": [{ "google_search": {} }]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "candidates": [{
                    "content": { "parts": [{ "text": "{\"found\": true}" }] },
                    "groundingMetadata": {
                        "groundingChunks": [
                            { "web": { "uri": "https://www.wri.org/initiatives/afr100", "title": "AFR100" } },
                            { "retrievedContext": {} }
                        ]
                    }
                }]
            })))
            .mount(&mock_server)
            .await;

        let reply = client.generate_grounded("find evidence").await.unwrap();
        assert_eq!(reply.text, "{\"found\": true}");
        assert_eq!(reply.sources.len(), 1);
        assert_eq!(reply.sources[0].uri, "https://www.wri.org/initiatives/afr100");
        assert_eq!(reply.sources[0].title.as_deref(), Some("AFR100"));
    }

    #[tokio::test]
    async fn test_generate_returns_error_on_api_500() {
        let mock_server = MockServer::start().await;
        let client = GeminiClient::with_base_url(test_config("test-api-key"), mock_server.uri())
            .unwrap();

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500).set_body_json(serde_json::json!({
                "error": { "code": 500, "message": "Internal server error" }
            })))
            .mount(&mock_server)
            .await;

        match client.generate("hello").await {
            Err(LlmError::RetryExhausted { attempts }) => assert_eq!(attempts, 3),
            other => panic!("Expected RetryExhausted, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_generate_retries_on_429_then_succeeds() {
        let mock_server = MockServer::start().await;
        let client = GeminiClient::with_base_url(test_config("test-api-key"), mock_server.uri())
            .unwrap();

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(429).set_body_json(serde_json::json!({
                "error": { "code": 429, "message": "Rate limit exceeded" }
            })))
            .up_to_n_times(1)
            .mount(&mock_server)
            .await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(text_response("done")))
            .mount(&mock_server)
            .await;

        assert_eq!(client.generate("hello").await.unwrap(), "done");
    }

    #[tokio::test]
    async fn test_empty_candidates_is_an_error() {
        let mock_server = MockServer::start().await;
        let mut config = test_config("test-api-key");
        config.max_retries = 1;
        let client = GeminiClient::with_base_url(config, mock_server.uri()).unwrap();

        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({ "candidates": [] })),
            )
            .mount(&mock_server)
            .await;

        assert!(client.generate("hello").await.is_err());
    }

    #[test]
    fn test_missing_api_key() {
        match GeminiClient::new(test_config("")) {
            Err(LlmError::MissingApiKey) => {}
            _ => panic!("Expected MissingApiKey error"),
        }
    }

    #[tokio::test]
    async fn test_unconfigured_backend_always_fails() {
        let backend = UnconfiguredBackend;
        assert!(matches!(
            backend.generate("hello").await,
            Err(LlmError::MissingApiKey)
        ));
        assert!(matches!(
            backend.generate_grounded("hello").await,
            Err(LlmError::MissingApiKey)
        ));
    }

    #[test]
    fn test_extract_json_block_variants() {
        assert_eq!(extract_json_block("```json\n{\"a\":1}\n```"), "{\"a\":1}");
        assert_eq!(extract_json_block("Here:\n```\n[1,2]\n```\nbye"), "[1,2]");
        assert_eq!(extract_json_block("  {\"plain\":true} "), "{\"plain\":true}");
    }

    #[test]
    fn test_parse_json_reply() {
        #[derive(Deserialize)]
        struct Reply {
            analyses: Vec<serde_json::Value>,
        }

        let reply: Reply = parse_json_reply("```json\n{\"analyses\": [{}, {}]}\n```").unwrap();
        assert_eq!(reply.analyses.len(), 2);
        assert!(parse_json_reply::<Reply>("not json at all").is_err());
    }
}
