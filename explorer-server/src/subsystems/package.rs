//! Presentation package generation for `GET /api/presentation-package/{id}`.
//!
//! Up to three model calls per trace:
//! 1. Core briefing (region, summary, demo prompts, capabilities, angle).
//!    The only call whose failure fails the package.
//! 2. Search-grounded regional context for the identified place.
//! 3. Search-grounded evidence of related WRI programmatic work.

use explorer_core::config::AnalysisConfig;
use explorer_core::models::{
    Capabilities, PresentationAngle, PresentationPackage, Region, RegionalContext,
};
use explorer_core::{parse_json_reply, Category, ExplorerError, LlmBackend, Trace};
use serde::Deserialize;

use crate::store::TraceStore;
use crate::subsystems::evidence;

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct Briefing {
    region: Option<Region>,
    summary: Option<String>,
    demo_prompts: Vec<String>,
    capabilities: Option<Capabilities>,
    presentation_angle: Option<PresentationAngle>,
    wri_topic: Option<String>,
    wri_program: Option<String>,
}

pub fn briefing_prompt(trace: &Trace, char_limit: usize) -> String {
    let mut scored = String::new();
    for (category, score) in trace.scores().iter() {
        scored.push_str(&format!(
            "- {} ({}): {}\n",
            category.name(),
            score,
            trace.rationale(category).unwrap_or_default()
        ));
    }
    if scored.is_empty() {
        scored.push_str("- not analysed yet\n");
    }

    format!(
        r#"You are preparing a presentation package for a demo of Global Nature Watch, an environmental data platform built by the World Resources Institute (WRI).

CONVERSATION:
{conversation}

EXISTING ANALYSIS:
{scored}
Return a JSON object:
{{
  "region": {{"country": "...", "area": "...", "coordinates": "approximate lat/lon if identifiable", "topics": ["..."]}},
  "summary": "two sentences on what the user wanted and what the platform showed",
  "demo_prompts": ["3-5 follow-up prompts a presenter could type live"],
  "capabilities": {{
    "data_sources": ["datasets the answer relied on"],
    "analyses": ["analyses performed"],
    "insights": ["insights surfaced"],
    "limitations": ["gaps or caveats"]
  }},
  "presentation_angle": {{
    "audiences": ["who this demo resonates with"],
    "story": "one-paragraph narrative",
    "key_messages": ["..."],
    "follow_up_questions": ["questions the audience is likely to ask"]
  }},
  "wri_topic": "short topic for finding related WRI work",
  "wri_program": "WRI program or initiative if any, else null"
}}

Use null for anything you cannot identify. Only output valid JSON."#,
        conversation = trace.conversation_text(char_limit),
    )
}

fn regional_prompt(place: &str, topics: &[String]) -> String {
    let topics = if topics.is_empty() {
        "land use, forests and climate".to_string()
    } else {
        topics.join(", ")
    };
    format!(
        r#"Search for recent environmental news and background about {place}, focusing on: {topics}

Return ONLY a JSON object with:
- "background": two sentences of environmental context for the area
- "recent_events": up to three short descriptions of recent events
- "source_url": the URL of the most useful source from the search results (or null)
- "source_title": its title (or null)"#
    )
}

async fn regional_context(
    llm: &dyn LlmBackend,
    place: &str,
    topics: &[String],
) -> Option<RegionalContext> {
    let reply = match llm.generate_grounded(&regional_prompt(place, topics)).await {
        Ok(reply) => reply,
        Err(e) => {
            tracing::warn!(place, error = %e, "Regional context search failed");
            return None;
        }
    };

    let mut context: RegionalContext = match parse_json_reply(&reply.text) {
        Ok(parsed) => parsed,
        Err(e) => {
            tracing::warn!(place, error = %e, "Regional context reply was not JSON");
            return None;
        }
    };

    if let Some(source) = reply.sources.into_iter().next() {
        context.source_url = Some(source.uri);
        if source.title.is_some() {
            context.source_title = source.title;
        }
    }
    Some(context)
}

/// Build the package for one trace.
pub async fn build_presentation_package(
    store: &TraceStore,
    llm: &dyn LlmBackend,
    config: &AnalysisConfig,
    trace_id: &str,
) -> Result<PresentationPackage, ExplorerError> {
    let trace = store
        .get(trace_id)
        .await
        .ok_or_else(|| ExplorerError::TraceNotFound(trace_id.to_string()))?;

    let reply = llm
        .generate(&briefing_prompt(&trace, config.message_char_limit))
        .await?;
    let briefing: Briefing = parse_json_reply(&reply)?;

    let region = briefing.region.filter(|r| !r.is_empty());
    let place = region.as_ref().and_then(Region::place);

    let regional_context = match (&place, &region) {
        (Some(place), Some(region)) => regional_context(llm, place, &region.topics).await,
        _ => None,
    };

    let topic = briefing
        .wri_topic
        .filter(|t| !t.trim().is_empty())
        .or_else(|| {
            trace
                .first_message(explorer_core::Role::User)
                .map(|m| m.content.chars().take(120).collect())
        })
        .unwrap_or_else(|| Category::WriConnections.interest_phrase().to_string());
    let wri_connection = evidence::search_wri_evidence(
        llm,
        &topic,
        place.as_deref().unwrap_or("global"),
        briefing.wri_program.as_deref(),
    )
    .await;

    tracing::info!(
        trace_id,
        region = place.as_deref().unwrap_or("unknown"),
        wri_found = wri_connection.found,
        "Presentation package generated"
    );

    Ok(PresentationPackage {
        trace_id: trace.id,
        region,
        summary: briefing.summary,
        demo_prompts: briefing.demo_prompts,
        regional_context,
        wri_connection: Some(wri_connection),
        capabilities: briefing.capabilities,
        presentation_angle: briefing.presentation_angle,
    })
}
