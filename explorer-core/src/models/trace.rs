use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use crate::category::{clamp_score, Category};
use crate::models::CategoryMap;

/// Display role of a conversation turn. Exports use `human`/`user` for the
/// person and a handful of names for the model side; everything that is not
/// the person is shown as the assistant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String")]
pub enum Role {
    #[serde(rename = "human")]
    User,
    #[serde(rename = "ai")]
    Assistant,
}

impl From<String> for Role {
    fn from(raw: String) -> Self {
        match raw.to_ascii_lowercase().as_str() {
            "human" | "user" => Role::User,
            _ => Role::Assistant,
        }
    }
}

impl Role {
    pub fn label(self) -> &'static str {
        match self {
            Role::User => "User",
            Role::Assistant => "Assistant",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }
}

/// One logged conversation.
///
/// `scores` and `analysis` are private: they are only ever written together
/// through [`Trace::record_analysis`], so their key sets always match.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trace {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub conversation: Vec<Message>,
    /// Milliseconds.
    #[serde(default)]
    pub latency: f64,
    #[serde(default)]
    pub input_tokens: u64,
    #[serde(default)]
    pub output_tokens: u64,
    #[serde(default)]
    pub total_cost: f64,
    #[serde(default)]
    pub error_count: u64,
    #[serde(default, deserialize_with = "lenient_scores")]
    scores: CategoryMap<u8>,
    #[serde(default)]
    analysis: CategoryMap<String>,
}

impl Trace {
    pub fn new(id: impl Into<String>, timestamp: DateTime<Utc>, conversation: Vec<Message>) -> Self {
        Self {
            id: id.into(),
            timestamp,
            name: String::new(),
            session_id: None,
            user_id: None,
            conversation,
            latency: 0.0,
            input_tokens: 0,
            output_tokens: 0,
            total_cost: 0.0,
            error_count: 0,
            scores: CategoryMap::new(),
            analysis: CategoryMap::new(),
        }
    }

    pub fn scores(&self) -> &CategoryMap<u8> {
        &self.scores
    }

    pub fn analysis(&self) -> &CategoryMap<String> {
        &self.analysis
    }

    pub fn score(&self, category: Category) -> Option<u8> {
        self.scores.get(category).copied()
    }

    pub fn rationale(&self, category: Category) -> Option<&str> {
        self.analysis.get(category).map(String::as_str)
    }

    /// Store the score and rationale for one category. Scores above 100 are
    /// clamped.
    pub fn record_analysis(&mut self, category: Category, score: u8, reason: impl Into<String>) {
        self.scores.insert(category, score.min(100));
        self.analysis.insert(category, reason.into());
    }

    pub fn total_tokens(&self) -> u64 {
        self.input_tokens + self.output_tokens
    }

    /// First turn spoken by `role`, in conversation order.
    pub fn first_message(&self, role: Role) -> Option<&Message> {
        self.conversation.iter().find(|m| m.role == role)
    }

    /// Prompt-ready transcript: `User:`/`Assistant:` prefixed turns, each cut
    /// to `char_limit` characters, separated by blank lines.
    pub fn conversation_text(&self, char_limit: usize) -> String {
        self.conversation
            .iter()
            .map(|m| {
                let content: String = m.content.chars().take(char_limit).collect();
                format!("{}: {}", m.role.label(), content)
            })
            .collect::<Vec<_>>()
            .join("\n\n")
    }

    /// Case-insensitive substring match over the concatenated message contents.
    pub fn matches_query(&self, query: &str) -> bool {
        let needle = query.to_lowercase();
        let haystack = self
            .conversation
            .iter()
            .map(|m| m.content.as_str())
            .collect::<Vec<_>>()
            .join(" ")
            .to_lowercase();
        haystack.contains(&needle)
    }
}

/// Scores written by other producers may be floats, numeric strings or out
/// of range. Each is rounded and clamped; anything non-numeric reads as 0 so
/// the key still lines up with `analysis`.
fn lenient_scores<'de, D: Deserializer<'de>>(deserializer: D) -> Result<CategoryMap<u8>, D::Error> {
    let raw = CategoryMap::<serde_json::Value>::deserialize(deserializer)?;
    Ok(raw
        .iter()
        .map(|(category, value)| {
            let score = match value {
                serde_json::Value::Number(n) => n.as_f64().map(clamp_score).unwrap_or(0),
                serde_json::Value::String(s) => s.trim().parse::<f64>().map(clamp_score).unwrap_or(0),
                _ => 0,
            };
            (category, score)
        })
        .collect())
}
