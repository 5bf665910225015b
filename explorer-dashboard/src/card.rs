//! Trace cards for the list views.
//!
//! [`render_card`] is a pure function of the trace and the view state; the
//! resulting [`Card`] is turned into markup by [`Card::to_html`]. Every piece
//! of trace text is escaped on the way out.

use explorer_core::{Category, Role, Tier, Trace};

use crate::format::{escape, format_timestamp, linkify, TimestampStyle};
use crate::state::ViewState;

/// Characters of each message shown in a card preview.
pub const PREVIEW_CHARS: usize = 280;

/// Characters of the trace id shown in a card header.
pub const SHORT_ID_CHARS: usize = 12;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CardVariant {
    Standard,
    /// 1-based position in the showcase ranking.
    Showcase { rank: usize },
}

/// Clicking this opens the owning trace's detail panel and focuses the
/// analysis entry for `category`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FocusTarget {
    pub trace_id: String,
    pub category: Category,
}

impl FocusTarget {
    fn data_attrs(&self) -> String {
        format!(
            r#"data-action="focus-analysis" data-trace-id="{}" data-category="{}""#,
            escape(&self.trace_id),
            self.category.key()
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Badge {
    pub category: Category,
    pub score: u8,
    pub tier: Tier,
    pub target: FocusTarget,
}

impl Badge {
    fn new(trace_id: &str, category: Category, score: u8) -> Self {
        Self {
            category,
            score,
            tier: Tier::from_score(score),
            target: FocusTarget {
                trace_id: trace_id.to_string(),
                category,
            },
        }
    }

    pub fn label(&self) -> &'static str {
        self.category.badge_label()
    }

    pub fn to_html(&self) -> String {
        format!(
            r#"<button class="score-badge tier-{}" {}>{} {}</button>"#,
            self.tier.as_str(),
            self.target.data_attrs(),
            self.label(),
            self.score
        )
    }
}

// ============================================================================
// Interest summary
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub enum Segment {
    Text(&'static str),
    /// A category mention, rendered as a focus link.
    Category(Category),
}

/// The WRI clause appended after the main sentence.
#[derive(Debug, Clone, PartialEq)]
pub struct WriClause {
    pub score: u8,
    pub rationale: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct InterestSummary {
    pub segments: Vec<Segment>,
    pub wri: Option<WriClause>,
}

impl InterestSummary {
    /// The main sentence as plain text.
    pub fn sentence(&self) -> String {
        self.segments
            .iter()
            .map(|s| match s {
                Segment::Text(t) => *t,
                Segment::Category(c) => c.interest_phrase(),
            })
            .collect()
    }

    pub fn to_html(&self, trace_id: &str) -> String {
        let mut html = String::from(r#"<p class="interest-summary">"#);
        for segment in &self.segments {
            match segment {
                Segment::Text(t) => html.push_str(t),
                Segment::Category(c) => html.push_str(&interest_link(trace_id, *c)),
            }
        }
        if let Some(wri) = &self.wri {
            html.push_str(&format!(
                r#" <span class="wri-clause">{}: {}</span>"#,
                interest_link(trace_id, Category::WriConnections),
                linkify(&wri.rationale)
            ));
        }
        html.push_str("</p>");
        html
    }
}

fn interest_link(trace_id: &str, category: Category) -> String {
    let target = FocusTarget {
        trace_id: trace_id.to_string(),
        category,
    };
    format!(
        r##"<a class="interest-link" href="#" {}>{}</a>"##,
        target.data_attrs(),
        category.interest_phrase()
    )
}

fn push_joined(segments: &mut Vec<Segment>, categories: &[Category], sep: &'static str) {
    for (i, c) in categories.iter().enumerate() {
        if i > 0 {
            segments.push(Segment::Text(sep));
        }
        segments.push(Segment::Category(*c));
    }
}

/// Summarize which categories a trace is interesting for. WRI connections
/// are left out of the buckets and reported as a separate clause.
pub fn summarize(trace: &Trace) -> InterestSummary {
    let mut high = Vec::new();
    let mut medium = Vec::new();
    for (category, score) in trace.scores().iter() {
        if category == Category::WriConnections {
            continue;
        }
        match Tier::from_score(*score) {
            Tier::High => high.push(category),
            Tier::Medium => medium.push(category),
            Tier::Low => {}
        }
    }

    let mut segments = Vec::new();
    if high.is_empty() && medium.is_empty() {
        segments.push(Segment::Text("Low relevance across interest areas."));
    } else if !high.is_empty() {
        segments.push(Segment::Text("High value for "));
        push_joined(&mut segments, &high, " and ");
        if !medium.is_empty() {
            segments.push(Segment::Text("; moderate for "));
            push_joined(&mut segments, &medium, ", ");
        }
        segments.push(Segment::Text("."));
    } else {
        segments.push(Segment::Text("Moderate interest for "));
        push_joined(&mut segments, &medium, " and ");
        segments.push(Segment::Text("."));
    }

    let wri = trace
        .score(Category::WriConnections)
        .filter(|score| *score >= 40)
        .and_then(|score| {
            trace
                .rationale(Category::WriConnections)
                .filter(|r| !r.trim().is_empty())
                .map(|r| WriClause {
                    score,
                    rationale: r.to_string(),
                })
        });

    InterestSummary { segments, wri }
}

// ============================================================================
// Card
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct Card {
    pub trace_id: String,
    pub variant: CardVariant,
    /// Short id or `#rank`.
    pub header: String,
    pub timestamp: String,
    /// Showcase score shown as "Impact".
    pub headline: Option<Badge>,
    pub badges: Vec<Badge>,
    /// Showcase rationale.
    pub reason: Option<String>,
    pub summary: Option<InterestSummary>,
    pub user_preview: Option<String>,
    pub assistant_preview: Option<String>,
    /// `Some(checked)` in selection mode.
    pub checkbox: Option<bool>,
}

fn preview(text: &str) -> String {
    let mut chars = text.chars();
    let head: String = chars.by_ref().take(PREVIEW_CHARS).collect();
    if chars.next().is_some() {
        format!("{}...", head.trim_end())
    } else {
        head
    }
}

pub fn short_id(id: &str) -> String {
    id.chars().take(SHORT_ID_CHARS).collect()
}

pub fn render_card(trace: &Trace, state: &ViewState, variant: CardVariant) -> Card {
    let showcase = matches!(variant, CardVariant::Showcase { .. });

    let header = match variant {
        CardVariant::Showcase { rank } => format!("#{}", rank),
        CardVariant::Standard => short_id(&trace.id),
    };

    let headline = if showcase {
        trace
            .score(Category::Showcase)
            .map(|score| Badge::new(&trace.id, Category::Showcase, score))
    } else {
        None
    };

    let badges = trace
        .scores()
        .iter()
        .filter(|(c, _)| !(showcase && *c == Category::Showcase))
        .map(|(c, score)| Badge::new(&trace.id, c, *score))
        .collect();

    let reason = if showcase {
        trace
            .rationale(Category::Showcase)
            .filter(|r| !r.trim().is_empty())
            .map(str::to_string)
    } else {
        None
    };

    let summary = if trace.analysis().is_empty() {
        None
    } else {
        Some(summarize(trace))
    };

    Card {
        trace_id: trace.id.clone(),
        variant,
        header,
        timestamp: format_timestamp(&trace.timestamp, TimestampStyle::Short),
        headline,
        badges,
        reason,
        summary,
        user_preview: trace.first_message(Role::User).map(|m| preview(&m.content)),
        assistant_preview: trace
            .first_message(Role::Assistant)
            .map(|m| preview(&m.content)),
        checkbox: state
            .is_selection_mode()
            .then(|| state.is_selected(&trace.id)),
    }
}

impl Card {
    pub fn to_html(&self) -> String {
        let id = escape(&self.trace_id);
        let mut classes = String::from("trace-card");
        if matches!(self.variant, CardVariant::Showcase { .. }) {
            classes.push_str(" showcase-card");
        }
        if self.checkbox == Some(true) {
            classes.push_str(" selected");
        }

        let mut html = format!(
            r#"<div class="{}" data-trace-id="{}" data-action="open-detail">"#,
            classes, id
        );

        html.push_str(r#"<div class="card-header">"#);
        if let Some(checked) = self.checkbox {
            html.push_str(&format!(
                r#"<input type="checkbox" class="package-checkbox" data-trace-id="{}"{} onclick="event.stopPropagation()">"#,
                id,
                if checked { " checked" } else { "" }
            ));
        }
        html.push_str(&format!(
            r#"<span class="trace-id">{}</span><span class="trace-time">{}</span>"#,
            escape(&self.header),
            escape(&self.timestamp)
        ));
        html.push_str("</div>");

        if let Some(headline) = &self.headline {
            html.push_str(&format!(
                r#"<div class="impact-score tier-{}" {}><span class="impact-label">Impact</span><span class="impact-value">{}</span></div>"#,
                headline.tier.as_str(),
                headline.target.data_attrs(),
                headline.score
            ));
        }

        if !self.badges.is_empty() {
            html.push_str(r#"<div class="score-badges">"#);
            for badge in &self.badges {
                html.push_str(&badge.to_html());
            }
            html.push_str("</div>");
        }

        if let Some(reason) = &self.reason {
            html.push_str(&format!(
                r#"<div class="showcase-reason">{}</div>"#,
                escape(reason)
            ));
        }

        if let Some(summary) = &self.summary {
            html.push_str(&summary.to_html(&self.trace_id));
        }

        for (role, text) in [
            (Role::User, &self.user_preview),
            (Role::Assistant, &self.assistant_preview),
        ] {
            if let Some(text) = text {
                html.push_str(&format!(
                    r#"<div class="message-preview {}"><span class="role">{}</span> {}</div>"#,
                    role.label().to_lowercase(),
                    role.label(),
                    escape(text)
                ));
            }
        }

        html.push_str("</div>");
        html
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{scored, trace};
    use explorer_core::Message;

    #[test]
    fn test_tiers_for_mixed_scores() {
        let t = scored(
            "t",
            &[
                (Category::Showcase, 85, "Great demo"),
                (Category::ProductFeatures, 55, "Export"),
                (Category::ResearchAreas, 20, "Nothing"),
            ],
        );
        let card = render_card(&t, &ViewState::new(), CardVariant::Standard);
        let tiers: Vec<Tier> = card.badges.iter().map(|b| b.tier).collect();
        assert_eq!(tiers, vec![Tier::High, Tier::Medium, Tier::Low]);
    }

    #[test]
    fn test_summary_high_and_moderate() {
        let t = scored(
            "t",
            &[
                (Category::ProductFeatures, 75, "Asks for alerts"),
                (Category::ResearchAreas, 45, "Method question"),
            ],
        );
        assert_eq!(
            summarize(&t).sentence(),
            "High value for product features; moderate for research."
        );
    }

    #[test]
    fn test_summary_follows_score_insertion_order() {
        let t = scored(
            "t",
            &[
                (Category::DatasetPriorities, 90, "a"),
                (Category::Showcase, 72, "b"),
                (Category::ResearchAreas, 60, "c"),
                (Category::ProductFeatures, 41, "d"),
            ],
        );
        assert_eq!(
            summarize(&t).sentence(),
            "High value for dataset priorities and showcase; moderate for research, product features."
        );
    }

    #[test]
    fn test_summary_low_scores_never_listed() {
        let t = scored("t", &[(Category::ResearchAreas, 10, "weak")]);
        assert_eq!(summarize(&t).sentence(), "Low relevance across interest areas.");
    }

    #[test]
    fn test_summary_moderate_only() {
        let t = scored(
            "t",
            &[
                (Category::ResearchAreas, 50, "a"),
                (Category::DatasetPriorities, 40, "b"),
            ],
        );
        assert_eq!(
            summarize(&t).sentence(),
            "Moderate interest for research and dataset priorities."
        );
    }

    #[test]
    fn test_wri_clause_is_separate_and_linkified() {
        let t = scored(
            "t",
            &[
                (Category::WriConnections, 80, "AFR100 work. See: https://www.wri.org/initiatives/afr100"),
                (Category::ResearchAreas, 5, "weak"),
            ],
        );
        let summary = summarize(&t);
        assert_eq!(summary.sentence(), "Low relevance across interest areas.");
        let wri = summary.wri.as_ref().unwrap();
        assert_eq!(wri.score, 80);

        let html = summary.to_html("t");
        assert!(html.contains(r#"<a href="https://www.wri.org/initiatives/afr100""#));
        assert!(html.contains(r#"data-category="wri_connections""#));
    }

    #[test]
    fn test_wri_clause_needs_score_and_rationale() {
        let low = scored("t", &[(Category::WriConnections, 39, "Something")]);
        assert!(summarize(&low).wri.is_none());
        let blank = scored("t", &[(Category::WriConnections, 90, "  ")]);
        assert!(summarize(&blank).wri.is_none());
    }

    #[test]
    fn test_category_mentions_are_focus_links() {
        let t = scored("abc", &[(Category::ProductFeatures, 75, "x")]);
        let html = summarize(&t).to_html("abc");
        assert!(html.contains(
            r#"data-action="focus-analysis" data-trace-id="abc" data-category="product_features">product features</a>"#
        ));
    }

    #[test]
    fn test_showcase_variant() {
        let t = scored(
            "trace-with-a-long-identifier",
            &[
                (Category::Showcase, 92, "Clear <b>story</b>"),
                (Category::DatasetPriorities, 48, "Needs data"),
            ],
        );
        let card = render_card(&t, &ViewState::new(), CardVariant::Showcase { rank: 1 });
        assert_eq!(card.header, "#1");
        assert_eq!(card.headline.as_ref().unwrap().score, 92);
        assert_eq!(card.badges.len(), 1);
        assert_eq!(card.badges[0].category, Category::DatasetPriorities);

        let html = card.to_html();
        assert!(html.contains("Impact"));
        assert!(html.contains("Clear &lt;b&gt;story&lt;/b&gt;"));
        assert!(!html.contains("<b>story"));
    }

    #[test]
    fn test_standard_header_and_previews() {
        let mut t = trace("0123456789abcdef", "first question");
        t.conversation.push(Message::new(Role::User, "second question"));
        let card = render_card(&t, &ViewState::new(), CardVariant::Standard);
        assert_eq!(card.header, "0123456789ab");
        assert_eq!(card.user_preview.as_deref(), Some("first question"));
        assert_eq!(
            card.assistant_preview.as_deref(),
            Some("Answer about first question")
        );
        assert!(card.summary.is_none());
        assert!(!card.to_html().contains("second question"));
    }

    #[test]
    fn test_missing_role_omits_preview() {
        let mut t = trace("t", "q");
        t.conversation.retain(|m| m.role == Role::User);
        let card = render_card(&t, &ViewState::new(), CardVariant::Standard);
        assert!(card.assistant_preview.is_none());
    }

    #[test]
    fn test_checkbox_only_in_selection_mode() {
        let t = trace("t", "q");
        let mut state = ViewState::new();
        assert!(render_card(&t, &state, CardVariant::Standard).checkbox.is_none());

        state.toggle_selection_mode();
        assert_eq!(render_card(&t, &state, CardVariant::Standard).checkbox, Some(false));
        state.toggle_selection("t");
        let card = render_card(&t, &state, CardVariant::Standard);
        assert_eq!(card.checkbox, Some(true));
        assert!(card.to_html().contains(" checked"));
    }

    #[test]
    fn test_long_preview_is_truncated() {
        let long = "á".repeat(PREVIEW_CHARS + 20);
        let t = trace("t", &long);
        let card = render_card(&t, &ViewState::new(), CardVariant::Standard);
        let preview = card.user_preview.unwrap();
        assert!(preview.ends_with("..."));
        assert_eq!(preview.chars().count(), PREVIEW_CHARS + 3);
    }
}
