//! Category analysis: LLM scoring of every trace for one category
//!
//! Implements `POST /api/analyze`:
//! - Generic categories: traces are scored in batches, one prompt per batch
//! - WRI connections: two-step pipeline per trace (assessment, then a
//!   search-grounded evidence lookup for promising traces)
//! - Results are written back into the store and the category is marked
//!   analysed
//!
//! Failures are isolated: a failed batch contributes no results, a failed
//! WRI trace scores 0. Neither aborts the run.

use explorer_core::category::clamp_score;
use explorer_core::config::AnalysisConfig;
use explorer_core::{parse_json_reply, Category, LlmBackend, LlmError, Trace};
use serde::Deserialize;

use crate::store::TraceStore;
use crate::subsystems::evidence;

/// Score and rationale for one trace in one category.
#[derive(Debug, Clone, PartialEq)]
pub struct TraceAnalysis {
    pub trace_id: String,
    pub score: u8,
    pub reason: String,
}

/// Outcome of one analysis run
#[derive(Debug, Clone)]
pub struct AnalysisReport {
    pub category: Category,
    pub traces_scanned: usize,
    pub analyzed: usize,
    pub failed_batches: usize,
}

#[derive(Debug, Deserialize)]
struct BatchReply {
    #[serde(default)]
    analyses: Vec<RawAnalysis>,
}

#[derive(Debug, Deserialize)]
struct RawAnalysis {
    trace_id: String,
    #[serde(default)]
    score: f64,
    #[serde(default)]
    reason: String,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct WriAssessment {
    score: f64,
    has_connection: bool,
    topic: String,
    region: String,
    wri_program: String,
    partner_type: String,
    story: Option<String>,
}

/// Score every trace in the store for `category` and record the results.
pub async fn run_category_analysis(
    store: &TraceStore,
    llm: &dyn LlmBackend,
    config: &AnalysisConfig,
    category: Category,
) -> AnalysisReport {
    let traces = store.all().await;
    let batch_size = config.batch_size.max(1);
    let mut results: Vec<TraceAnalysis> = Vec::with_capacity(traces.len());
    let mut failed_batches = 0;

    tracing::info!(
        category = category.key(),
        traces = traces.len(),
        batch_size,
        backend = llm.name(),
        "Category analysis started"
    );

    for (index, batch) in traces.chunks(batch_size).enumerate() {
        if category == Category::WriConnections {
            for trace in batch {
                results.push(analyze_wri_trace(llm, trace, config).await);
            }
            continue;
        }

        match analyze_batch(llm, batch, category, config.message_char_limit).await {
            Ok(batch_results) => results.extend(batch_results),
            Err(e) => {
                failed_batches += 1;
                tracing::error!(
                    category = category.key(),
                    batch = index,
                    error = %e,
                    "Error in LLM analysis"
                );
            }
        }
    }

    let analyzed = store.apply_analyses(category, &results).await;
    store.mark_analyzed(category).await;

    tracing::info!(
        category = category.key(),
        analyzed,
        failed_batches,
        "Category analysis complete"
    );

    AnalysisReport {
        category,
        traces_scanned: traces.len(),
        analyzed: results.len(),
        failed_batches,
    }
}

pub fn batch_prompt(traces: &[Trace], category: Category, char_limit: usize) -> String {
    let mut traces_text = String::new();
    for (i, trace) in traces.iter().enumerate() {
        traces_text.push_str(&format!(
            "\n--- TRACE {} (ID: {}) ---\n{}\n",
            i + 1,
            trace.id,
            trace.conversation_text(char_limit)
        ));
    }

    format!(
        r#"You are analyzing conversation traces from Global Nature Watch, an environmental data platform.

Your task is to score each trace on how interesting it is for: {name}

Category description: {description}
Look for: {hint}

Score each trace from 0-100 where:
- 0-20: Not relevant to this category
- 21-40: Slightly relevant but low impact
- 41-60: Moderately interesting with some potential
- 61-80: Very interesting with clear actionable insights
- 81-100: Extremely high impact, must-act-on insight

For each trace, provide:
1. A score (0-100)
2. A brief reason (1-2 sentences)

TRACES TO ANALYZE:
{traces_text}

Respond in JSON format:
{{
  "analyses": [
    {{"trace_id": "...", "score": 75, "reason": "..."}},
    ...
  ]
}}

Only output valid JSON, no other text."#,
        name = category.name(),
        description = category.description(),
        hint = category.prompt_hint(),
    )
}

/// Score one batch with a single prompt.
pub async fn analyze_batch(
    llm: &dyn LlmBackend,
    traces: &[Trace],
    category: Category,
    char_limit: usize,
) -> Result<Vec<TraceAnalysis>, LlmError> {
    let reply = llm
        .generate(&batch_prompt(traces, category, char_limit))
        .await?;
    let parsed: BatchReply = parse_json_reply(&reply)?;

    Ok(parsed
        .analyses
        .into_iter()
        .map(|raw| TraceAnalysis {
            trace_id: raw.trace_id,
            score: clamp_score(raw.score),
            reason: raw.reason,
        })
        .collect())
}

fn wri_prompt(trace: &Trace, char_limit: usize) -> String {
    format!(
        r#"Analyze this conversation from Global Nature Watch and identify if it relates to WRI's programmatic work and strategic initiatives.

CONVERSATION:
{conversation}

Consider WRI's PROGRAMMATIC work (not just data tools):

**Country & Regional Programs:**
- Indonesia: government partnerships, corporate sustainability (palm oil companies), peatland restoration
- Brazil: policy work on Amazon/Cerrado, state government collaborations
- Africa: AFR100 restoration initiative, country partnerships (Ethiopia, Kenya, Rwanda, DRC), cocoa sustainability
- Mexico/Central America: community forestry support, Initiative 20x20
- India: forest rights advocacy, state-level restoration programs
- China: sustainable landscapes program, corporate engagement

**Strategic Initiatives:**
- AFR100, Initiative 20x20, Forest Legality Initiative
- Restoration programs and commitments tracking
- Corporate sustainability & supply chain work
- Cities4Forests urban program
- Climate policy and NDC partnerships

Return a JSON object:
{{
  "score": 0-100,
  "has_connection": true/false,
  "topic": "specific topic (e.g., 'palm oil supply chains', 'forest restoration commitments')",
  "region": "geographic region if identifiable",
  "wri_program": "specific WRI program or initiative if any",
  "partner_type": "type of partner if relevant (e.g., 'government', 'corporate', 'NGO', 'community')",
  "story": "one sentence describing how this connects to WRI's programmatic work"
}}

Scoring:
- 80-100: Direct match to a specific WRI program, named partnership, or strategic initiative
- 60-79: Strong alignment with WRI's programmatic priorities in that region/sector
- 40-59: General thematic alignment with WRI's mission areas
- 0-39: Weak or no connection to WRI's programmatic work"#,
        conversation = trace.conversation_text(char_limit)
    )
}

/// Two-step WRI scoring for one trace.
pub async fn analyze_wri_trace(
    llm: &dyn LlmBackend,
    trace: &Trace,
    config: &AnalysisConfig,
) -> TraceAnalysis {
    let assessment: WriAssessment = match llm
        .generate(&wri_prompt(trace, config.message_char_limit))
        .await
        .and_then(|reply| parse_json_reply(&reply))
    {
        Ok(a) => a,
        Err(e) => {
            tracing::error!(trace_id = %trace.id, error = %e, "Error analyzing trace");
            return TraceAnalysis {
                trace_id: trace.id.clone(),
                score: 0,
                reason: "Analysis error".to_string(),
            };
        }
    };

    let mut score = clamp_score(assessment.score);
    let mut reason = assessment
        .story
        .clone()
        .unwrap_or_else(|| "No specific WRI connection identified.".to_string());

    if score >= config.wri_search_threshold && assessment.has_connection {
        let mut parts: Vec<String> = vec![assessment.topic.clone(), assessment.region.clone()];
        if !assessment.wri_program.is_empty() {
            parts.push(assessment.wri_program.clone());
        }
        if !assessment.partner_type.is_empty() {
            parts.push(format!("WRI {} partnership", assessment.partner_type));
        }
        let query = parts
            .into_iter()
            .filter(|p| !p.trim().is_empty())
            .collect::<Vec<_>>()
            .join(" ");

        if !query.is_empty() {
            let region = if assessment.region.is_empty() {
                "global"
            } else {
                assessment.region.as_str()
            };
            let found = evidence::search_wri_evidence(
                llm,
                &query,
                region,
                Some(assessment.wri_program.as_str()),
            )
            .await;

            if let (true, Some(url)) = (found.found, found.url.as_deref()) {
                let source_text = found
                    .source
                    .as_deref()
                    .filter(|s| !s.is_empty())
                    .map(|s| format!(" ({})", s))
                    .unwrap_or_default();
                reason = format!(
                    "{} See: {}{}",
                    assessment.story.as_deref().unwrap_or_default(),
                    url,
                    source_text
                );
                score = score.saturating_add(config.evidence_score_boost).min(100);
            }
        }
    }

    TraceAnalysis {
        trace_id: trace.id.clone(),
        score,
        reason,
    }
}
