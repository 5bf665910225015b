//! JSON bodies exchanged between the dashboard and the server.

use serde::{Deserialize, Serialize};

use crate::category::Category;
use crate::models::{Trace, TranslationBundle};

/// `GET /api/traces`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TracesResponse {
    pub traces: Vec<Trace>,
    pub total: usize,
    #[serde(default)]
    pub filtered: usize,
}

/// `GET /api/analysis-status`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AnalysisStatus {
    pub analyzed: Vec<Category>,
    #[serde(default)]
    pub categories: Vec<Category>,
}

/// `POST /api/analyze` body. The category stays a string so the server can
/// answer unknown keys with a 400 instead of a body rejection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyzeRequest {
    pub category: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyzeResponse {
    pub success: bool,
    pub analyzed: usize,
    pub category: Category,
}

/// `GET /api/top-traces/{category}`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TopTracesResponse {
    #[serde(default)]
    pub category: Option<Category>,
    pub category_name: String,
    pub traces: Vec<Trace>,
}

/// `GET /api/translate/{trace_id}` answers either a bundle or an error body,
/// sometimes with a 200 status.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TranslateReply {
    Failed { error: String },
    Translated(TranslationBundle),
}

/// Standard error body: `{ "error": "..." }`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}

impl ErrorBody {
    pub fn new(msg: impl Into<String>) -> Self {
        Self { error: msg.into() }
    }
}
