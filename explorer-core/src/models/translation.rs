use serde::{Deserialize, Serialize};

/// Translation of one conversation turn. `translation` is null when the turn
/// was already in English.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageTranslation {
    pub index: usize,
    #[serde(default)]
    pub translation: Option<String>,
    #[serde(default)]
    pub original_language: String,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TranslationBundle {
    #[serde(default)]
    pub translations: Vec<MessageTranslation>,
    #[serde(default)]
    pub detected_language: String,
}

impl TranslationBundle {
    /// Translated text for the message at `index`, if one was produced.
    pub fn translation_for(&self, index: usize) -> Option<&str> {
        self.translations
            .iter()
            .find(|t| t.index == index)
            .and_then(|t| t.translation.as_deref())
            .filter(|t| !t.trim().is_empty())
    }
}
