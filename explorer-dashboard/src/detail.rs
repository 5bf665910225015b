//! Detail panel for one trace: metrics, the full conversation with its
//! translation slots, and every analysis entry.

use explorer_core::{Category, Role, Tier, Trace};

use crate::card::short_id;
use crate::format::{escape, format_timestamp, linkify, TimestampStyle};
use crate::state::{TranslateState, ViewState};

#[derive(Debug, Clone, PartialEq)]
pub struct TranslateControl {
    pub label: &'static str,
    pub disabled: bool,
    pub status: Option<String>,
}

impl TranslateControl {
    fn new(state: TranslateState, status: Option<&str>) -> Self {
        let (label, disabled) = match state {
            TranslateState::OriginalOnly => ("Translate to English", false),
            TranslateState::Translating => ("Translating...", true),
            TranslateState::TranslatedShown => ("Show Original", false),
            TranslateState::OriginalShown => ("Show Translation", false),
        };
        Self {
            label,
            disabled,
            status: status.map(str::to_string),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MessageBlock {
    pub index: usize,
    pub role: Role,
    pub original: String,
    /// Cached translation for this message, if any.
    pub translation: Option<String>,
    pub translation_visible: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisEntry {
    pub category: Category,
    pub score: Option<u8>,
    pub tier: Option<Tier>,
    /// Rationale, already escaped (and linkified for WRI connections).
    pub rationale_html: String,
    pub highlighted: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Detail {
    pub trace_id: String,
    pub timestamp: String,
    pub session: Option<String>,
    /// Seconds with two decimals.
    pub latency: String,
    pub total_tokens: u64,
    /// Present only when the trace recorded errors.
    pub errors: Option<u64>,
    pub translate: TranslateControl,
    pub messages: Vec<MessageBlock>,
    pub analysis: Vec<AnalysisEntry>,
}

pub fn format_latency(ms: f64) -> String {
    format!("{:.2}s", ms / 1000.0)
}

pub fn render_detail(trace: &Trace, state: &ViewState) -> Detail {
    let translate_state = state.translate_state(&trace.id);
    let bundle = state.cached_translation(&trace.id);
    let showing = translate_state == TranslateState::TranslatedShown;

    let messages = trace
        .conversation
        .iter()
        .enumerate()
        .map(|(index, msg)| {
            let translation = bundle
                .and_then(|b| b.translation_for(index))
                .map(str::to_string);
            MessageBlock {
                index,
                role: msg.role,
                original: msg.content.clone(),
                translation_visible: showing && translation.is_some(),
                translation,
            }
        })
        .collect();

    let highlight = state
        .highlight()
        .filter(|h| h.trace_id == trace.id)
        .map(|h| h.category);

    let analysis = trace
        .analysis()
        .iter()
        .map(|(category, rationale)| {
            let score = trace.score(category);
            let rationale_html = if category == Category::WriConnections {
                linkify(rationale)
            } else {
                escape(rationale)
            };
            AnalysisEntry {
                category,
                score,
                tier: score.map(Tier::from_score),
                rationale_html,
                highlighted: highlight == Some(category),
            }
        })
        .collect();

    Detail {
        trace_id: trace.id.clone(),
        timestamp: format_timestamp(&trace.timestamp, TimestampStyle::Long),
        session: trace.session_id.as_deref().map(short_id),
        latency: format_latency(trace.latency),
        total_tokens: trace.total_tokens(),
        errors: (trace.error_count > 0).then_some(trace.error_count),
        translate: TranslateControl::new(translate_state, state.translation_status(&trace.id)),
        messages,
        analysis,
    }
}

impl Detail {
    pub fn to_html(&self) -> String {
        let id = escape(&self.trace_id);
        let mut html = format!(r#"<section class="trace-detail" data-trace-id="{}">"#, id);

        html.push_str(r#"<div class="detail-meta">"#);
        html.push_str(&format!(
            r#"<span class="meta-time">{}</span>"#,
            escape(&self.timestamp)
        ));
        if let Some(session) = &self.session {
            html.push_str(&format!(
                r#"<span class="meta-session">Session {}</span>"#,
                escape(session)
            ));
        }
        html.push_str(&format!(
            r#"<span class="meta-latency">{}</span><span class="meta-tokens">{} tokens</span>"#,
            self.latency, self.total_tokens
        ));
        if let Some(errors) = self.errors {
            html.push_str(&format!(
                r#"<span class="meta-errors">{} error{}</span>"#,
                errors,
                if errors == 1 { "" } else { "s" }
            ));
        }
        html.push_str("</div>");

        html.push_str(&format!(
            r#"<div class="translate-control"><button class="translate-btn" data-action="translate" data-trace-id="{}"{}>{}</button>"#,
            id,
            if self.translate.disabled { " disabled" } else { "" },
            self.translate.label
        ));
        if let Some(status) = &self.translate.status {
            html.push_str(&format!(
                r#"<span class="translate-status">{}</span>"#,
                escape(status)
            ));
        }
        html.push_str("</div>");

        html.push_str(r#"<div class="conversation">"#);
        for msg in &self.messages {
            html.push_str(&format!(
                r#"<div class="message {}"><div class="message-role">{}</div><div class="message-original">{}</div>"#,
                msg.role.label().to_lowercase(),
                msg.role.label(),
                escape(&msg.original)
            ));
            html.push_str(&format!(
                r#"<div class="message-translation" data-index="{}"{}>{}</div></div>"#,
                msg.index,
                if msg.translation_visible { "" } else { " hidden" },
                escape(msg.translation.as_deref().unwrap_or_default())
            ));
        }
        html.push_str("</div>");

        if !self.analysis.is_empty() {
            html.push_str(r#"<div class="analysis-list">"#);
            for entry in &self.analysis {
                let tier = entry.tier.map(Tier::as_str).unwrap_or("low");
                let score = entry.score.map(|s| s.to_string()).unwrap_or_default();
                html.push_str(&format!(
                    r#"<div class="analysis-entry tier-{}{}" data-category="{}"><div class="analysis-title">{} <span class="analysis-score">{} ({})</span></div><div class="analysis-reason">{}</div></div>"#,
                    tier,
                    if entry.highlighted { " highlight" } else { "" },
                    entry.category.key(),
                    entry.category.name(),
                    score,
                    tier,
                    entry.rationale_html
                ));
            }
            html.push_str("</div>");
        }

        html.push_str("</section>");
        html
    }
}
