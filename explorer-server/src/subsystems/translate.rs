//! Conversation translation for `GET /api/translate/{trace_id}`.
//!
//! One prompt per trace: the model detects the language of every turn and
//! translates the non-English ones. Successful bundles are cached for the
//! life of the process; failures are not cached.

use explorer_core::{parse_json_reply, ExplorerError, LlmBackend, Trace, TranslationBundle};
use serde_json::json;

use crate::store::TraceStore;

pub fn translation_prompt(trace: &Trace) -> Result<String, ExplorerError> {
    let messages: Vec<serde_json::Value> = trace
        .conversation
        .iter()
        .enumerate()
        .map(|(index, msg)| {
            json!({
                "index": index,
                "role": msg.role,
                "content": msg.content,
            })
        })
        .collect();
    let messages = serde_json::to_string_pretty(&messages)?;

    Ok(format!(
        r#"Analyze these conversation messages and translate any non-English messages to English.

MESSAGES:
{messages}

For each message:
1. Detect the language
2. If not English, provide an English translation
3. If already English, leave translation as null

Return a JSON object:
{{
  "detected_language": "the primary non-English language detected, or 'English' if all messages are in English",
  "translations": [
    {{"index": 0, "original_language": "Spanish", "translation": "English translation here"}},
    {{"index": 1, "original_language": "English", "translation": null}},
    ...
  ]
}}

Only output valid JSON."#
    ))
}

/// Translate a trace, answering from the cache when possible.
pub async fn translate_trace(
    store: &TraceStore,
    llm: &dyn LlmBackend,
    trace_id: &str,
) -> Result<TranslationBundle, ExplorerError> {
    if let Some(bundle) = store.cached_translation(trace_id).await {
        tracing::debug!(trace_id, "Translation served from cache");
        return Ok(bundle);
    }

    let trace = store
        .get(trace_id)
        .await
        .ok_or_else(|| ExplorerError::TraceNotFound(trace_id.to_string()))?;

    let reply = llm.generate(&translation_prompt(&trace)?).await?;
    let bundle: TranslationBundle = parse_json_reply(&reply)?;

    tracing::info!(
        trace_id,
        language = %bundle.detected_language,
        messages = bundle.translations.len(),
        "Trace translated"
    );

    store.cache_translation(trace_id, bundle.clone()).await;
    Ok(bundle)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{trace, ScriptedLlm};

    const BUNDLE: &str = r#"```json
{"detected_language": "Portuguese", "translations": [
  {"index": 0, "original_language": "Portuguese", "translation": "Where is deforestation growing?"},
  {"index": 1, "original_language": "English", "translation": null}
]}
```"#;

    #[tokio::test]
    async fn test_translation_is_cached_after_first_call() {
        let store = TraceStore::new(vec![trace("pt-1", "Onde o desmatamento cresce?")]);
        let llm = ScriptedLlm::new().reply(BUNDLE);

        let first = translate_trace(&store, &llm, "pt-1").await.unwrap();
        assert_eq!(first.detected_language, "Portuguese");
        assert_eq!(first.translation_for(0), Some("Where is deforestation growing?"));

        let second = translate_trace(&store, &llm, "pt-1").await.unwrap();
        assert_eq!(first, second);
        assert_eq!(llm.prompt_count(), 1);
    }

    #[tokio::test]
    async fn test_unknown_trace_is_not_found() {
        let store = TraceStore::default();
        let llm = ScriptedLlm::new();
        let err = translate_trace(&store, &llm, "missing").await.unwrap_err();
        assert!(matches!(err, ExplorerError::TraceNotFound(id) if id == "missing"));
        assert_eq!(llm.prompt_count(), 0);
    }

    #[tokio::test]
    async fn test_failures_are_not_cached() {
        let store = TraceStore::new(vec![trace("es-1", "¿Dónde hay incendios?")]);
        let llm = ScriptedLlm::new().reply("no json here").reply(BUNDLE);

        assert!(translate_trace(&store, &llm, "es-1").await.is_err());
        assert!(store.cached_translation("es-1").await.is_none());
        assert!(translate_trace(&store, &llm, "es-1").await.is_ok());
    }

    #[test]
    fn test_prompt_numbers_messages() {
        let prompt = translation_prompt(&trace("t", "Hola")).unwrap();
        assert!(prompt.contains("\"index\": 0"));
        assert!(prompt.contains("\"role\": \"human\""));
        assert!(prompt.contains("\"content\": \"Answer about Hola\""));
    }
}
