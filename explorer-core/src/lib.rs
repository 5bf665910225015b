pub mod api;
pub mod category;
pub mod config;
pub mod error;
pub mod llm;
pub mod models;

pub use category::{Category, Tier};
pub use config::ExplorerConfig;
pub use error::ExplorerError;
pub use llm::{
    parse_json_reply, GeminiClient, GroundedReply, GroundingSource, LlmBackend, LlmConfig,
    LlmError, UnconfiguredBackend,
};
pub use models::{Message, Role, Trace, TranslationBundle};
