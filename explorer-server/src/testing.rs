//! Test doubles shared by the unit test modules.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use explorer_core::{GroundedReply, GroundingSource, LlmBackend, LlmError, Message, Role, Trace};

pub fn trace(id: &str, question: &str) -> Trace {
    Trace::new(
        id,
        Utc.with_ymd_and_hms(2025, 1, 20, 8, 0, 0).unwrap(),
        vec![
            Message::new(Role::User, question),
            Message::new(Role::Assistant, format!("Answer about {}", question)),
        ],
    )
}

/// Replies are consumed in order; `Err` entries become API errors.
#[derive(Default)]
pub struct ScriptedLlm {
    replies: Mutex<VecDeque<Result<String, String>>>,
    grounded: Mutex<VecDeque<Result<GroundedReply, String>>>,
    pub prompts: Mutex<Vec<String>>,
}

impl ScriptedLlm {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reply(self, text: impl Into<String>) -> Self {
        self.replies.lock().unwrap().push_back(Ok(text.into()));
        self
    }

    pub fn fail(self, message: impl Into<String>) -> Self {
        self.replies.lock().unwrap().push_back(Err(message.into()));
        self
    }

    pub fn grounded(self, text: impl Into<String>, source: Option<&str>) -> Self {
        let sources = source
            .map(|uri| {
                vec![GroundingSource {
                    uri: uri.to_string(),
                    title: Some("Grounded source".to_string()),
                }]
            })
            .unwrap_or_default();
        self.grounded.lock().unwrap().push_back(Ok(GroundedReply {
            text: text.into(),
            sources,
        }));
        self
    }

    pub fn grounded_fail(self, message: impl Into<String>) -> Self {
        self.grounded.lock().unwrap().push_back(Err(message.into()));
        self
    }

    pub fn prompt_count(&self) -> usize {
        self.prompts.lock().unwrap().len()
    }
}

fn api_error(message: String) -> LlmError {
    LlmError::Api { code: 500, message }
}

#[async_trait]
impl LlmBackend for ScriptedLlm {
    async fn generate(&self, prompt: &str) -> Result<String, LlmError> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        match self.replies.lock().unwrap().pop_front() {
            Some(Ok(text)) => Ok(text),
            Some(Err(message)) => Err(api_error(message)),
            None => Err(LlmError::EmptyResponse),
        }
    }

    async fn generate_grounded(&self, prompt: &str) -> Result<GroundedReply, LlmError> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        match self.grounded.lock().unwrap().pop_front() {
            Some(Ok(reply)) => Ok(reply),
            Some(Err(message)) => Err(api_error(message)),
            None => Err(LlmError::EmptyResponse),
        }
    }

    fn name(&self) -> &str {
        "scripted"
    }
}
