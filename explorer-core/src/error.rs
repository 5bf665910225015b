use thiserror::Error;

use crate::llm::LlmError;

#[derive(Error, Debug)]
pub enum ExplorerError {
    #[error("Config error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),

    #[error("Unknown category: {0}")]
    UnknownCategory(String),

    #[error("Trace not found: {0}")]
    TraceNotFound(String),

    #[error("Other error: {0}")]
    Other(String),
}
