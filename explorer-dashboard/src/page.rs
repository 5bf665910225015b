//! Whole-screen rendering.
//!
//! [`render_screen`] derives everything visible from a [`ViewState`];
//! [`render_page`] wraps it in a standalone HTML document. Re-rendering the
//! same state always yields the same markup.

use explorer_core::Category;

use crate::card::{render_card, Card, CardVariant};
use crate::detail::{render_detail, Detail};
use crate::format::escape;
use crate::package::render_package_card;
use crate::state::{AnalysisProgress, View, ViewState};

#[derive(Debug, Clone, PartialEq)]
pub struct Screen {
    pub view: View,
    pub category: Option<Category>,
    pub title: String,
    pub search_query: String,
    pub analyzed: Vec<Category>,
    pub cards: Vec<Card>,
    pub empty_message: Option<&'static str>,
    pub detail: Option<Detail>,
    /// Selected count, when selection mode is on.
    pub selection: Option<usize>,
    /// Progress modal, while open.
    pub analysis: Option<AnalysisProgress>,
    pub analysis_running: bool,
    pub packages: Vec<String>,
    pub package_progress: Option<String>,
    pub notice: Option<String>,
}

pub fn render_screen(state: &ViewState) -> Screen {
    let (view, category) = state.current_view();

    let cards: Vec<Card> = state
        .visible()
        .iter()
        .enumerate()
        .map(|(i, trace)| {
            let variant = match view {
                View::Showcase => CardVariant::Showcase { rank: i + 1 },
                _ => CardVariant::Standard,
            };
            render_card(trace, state, variant)
        })
        .collect();

    let title = match (view, category, state.title()) {
        (_, _, Some(title)) => title.to_string(),
        (View::All, _, None) if !state.search_query().is_empty() => {
            format!("Search results ({})", cards.len())
        }
        (View::All, _, None) => format!("All Traces ({})", cards.len()),
        (View::Showcase, _, None) => "Showcase".to_string(),
        (View::Interests, Some(c), None) => c.name().to_string(),
        (View::Interests, None, None) => "Interest Areas".to_string(),
    };

    let empty_message = if !cards.is_empty() {
        None
    } else {
        Some(match (view, category) {
            (View::Showcase, _) => "No showcase scores yet. Run the analysis to rank traces.",
            (View::Interests, Some(_)) => "No scored traces for this category yet.",
            _ if !state.search_query().is_empty() => "No traces match your search.",
            _ => "No traces loaded.",
        })
    };

    let analysis = state.analysis();

    Screen {
        view,
        category,
        title,
        search_query: state.search_query().to_string(),
        analyzed: state.analyzed().to_vec(),
        cards,
        empty_message,
        detail: state.detail().map(|t| render_detail(t, state)),
        selection: state
            .is_selection_mode()
            .then(|| state.selected_for_package().len()),
        analysis: analysis.modal_open.then(|| analysis.clone()),
        analysis_running: analysis.running,
        packages: state
            .packages()
            .iter()
            .enumerate()
            .map(|(i, outcome)| render_package_card(i, outcome))
            .collect(),
        package_progress: state.package_progress().map(str::to_string),
        notice: state.notice().map(str::to_string),
    }
}

const STYLE: &str = r#"
body { font-family: system-ui, sans-serif; margin: 0; background: #f5f7f5; color: #1d2b1f; }
header { background: #1f4d2b; color: #fff; padding: 12px 24px; display: flex; gap: 16px; align-items: center; }
nav button.active { font-weight: 700; text-decoration: underline; }
main { display: grid; grid-template-columns: 1fr 1fr; gap: 16px; padding: 16px 24px; }
.trace-card, .package-card, .trace-detail { background: #fff; border-radius: 8px; padding: 12px; margin-bottom: 12px; box-shadow: 0 1px 3px rgba(0,0,0,.1); }
.trace-card.selected { outline: 2px solid #2f7d3f; }
.score-badge { border: 0; border-radius: 10px; padding: 2px 8px; margin-right: 4px; cursor: pointer; }
.tier-high { background: #c8ecd0; } .tier-medium { background: #fbeec1; } .tier-low { background: #eceeed; }
.showcase-reason { background: #eef7f0; border-left: 3px solid #2f7d3f; padding: 6px 10px; margin: 8px 0; }
.analysis-entry.highlight { animation: pulse 1s 2; }
@keyframes pulse { 50% { background: #fff6c4; } }
.modal { position: fixed; inset: 30% 30% auto 30%; background: #fff; padding: 20px; border-radius: 8px; box-shadow: 0 4px 20px rgba(0,0,0,.3); }
.notice { background: #fdecea; padding: 8px 24px; }
"#;

fn tab(view: View, active: View, label: &str) -> String {
    format!(
        r#"<button class="nav-tab{}" data-action="select-tab" data-view="{}">{}</button>"#,
        if view == active { " active" } else { "" },
        view.as_str(),
        label
    )
}

pub fn render_page(screen: &Screen) -> String {
    let mut body = String::new();

    body.push_str(r#"<header><h1>Trace Explorer</h1><nav>"#);
    body.push_str(&tab(View::All, screen.view, "All Traces"));
    body.push_str(&tab(View::Showcase, screen.view, "Showcase"));
    body.push_str(&tab(View::Interests, screen.view, "Interests"));
    body.push_str("</nav>");
    body.push_str(&format!(
        r#"<input type="search" id="search" placeholder="Search conversations" value="{}">"#,
        escape(&screen.search_query)
    ));
    body.push_str(&format!(
        r#"<button id="run-analysis" data-action="run-analysis"{}>Run analysis</button>"#,
        if screen.analysis_running { " disabled" } else { "" }
    ));
    body.push_str(&format!(
        r#"<button id="selection-mode" data-action="toggle-selection-mode">{}</button>"#,
        if screen.selection.is_some() { "Exit selection" } else { "Select for packages" }
    ));
    body.push_str("</header>");

    if let Some(notice) = &screen.notice {
        body.push_str(&format!(r#"<div class="notice">{}</div>"#, escape(notice)));
    }

    if let Some(count) = screen.selection {
        body.push_str(&format!(
            r#"<div class="selection-toolbar"><span id="selection-count">{} selected</span><button data-action="generate-packages"{}>Generate packages</button><button data-action="clear-selection">Clear</button></div>"#,
            count,
            if count == 0 { " disabled" } else { "" }
        ));
    }

    body.push_str(r#"<main><section class="trace-list">"#);
    body.push_str(&format!("<h2>{}</h2>", escape(&screen.title)));

    if screen.view == View::Interests {
        body.push_str(r#"<div class="category-filter">"#);
        for category in Category::ALL {
            let analyzed = screen.analyzed.contains(&category);
            body.push_str(&format!(
                r#"<div class="category-option{}"><strong>{}</strong><p>{}</p><button data-action="view-top" data-category="{}">View top</button>{}</div>"#,
                if screen.category == Some(category) { " active" } else { "" },
                category.name(),
                category.description(),
                category.key(),
                if analyzed { r#"<span class="analyzed-badge">Analyzed</span>"# } else { "" }
            ));
        }
        body.push_str("</div>");
    }

    for card in &screen.cards {
        body.push_str(&card.to_html());
    }
    if let Some(message) = screen.empty_message {
        body.push_str(&format!(r#"<p class="empty">{}</p>"#, message));
    }
    body.push_str("</section>");

    body.push_str(r#"<section class="detail-panel">"#);
    match &screen.detail {
        Some(detail) => body.push_str(&detail.to_html()),
        None => body.push_str(r#"<p class="empty">Select a trace to see the full conversation.</p>"#),
    }
    body.push_str("</section></main>");

    if screen.package_progress.is_some() || !screen.packages.is_empty() {
        body.push_str(r#"<section class="packages"><h2>Presentation packages</h2>"#);
        if let Some(progress) = &screen.package_progress {
            body.push_str(&format!(r#"<p class="progress">{}</p>"#, escape(progress)));
        }
        for card in &screen.packages {
            body.push_str(card);
        }
        body.push_str("</section>");
    }

    if let Some(progress) = &screen.analysis {
        body.push_str(&format!(
            r#"<div class="modal"><h3>Running analysis</h3><progress max="100" value="{0}"></progress><span>{0}%</span><ul>"#,
            progress.percent()
        ));
        for category in Category::ALL {
            let status = if progress.completed.contains(&category) {
                "done"
            } else if progress.failed.contains(&category) {
                "failed"
            } else if progress.current == Some(category) {
                "running"
            } else {
                "pending"
            };
            body.push_str(&format!(
                r#"<li class="{}">{} <span class="status">{}</span></li>"#,
                status,
                category.name(),
                status
            ));
        }
        body.push_str(r#"</ul><button data-action="close-modal">Hide</button></div>"#);
    }

    format!(
        "<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n<meta charset=\"utf-8\">\n<title>Trace Explorer</title>\n<style>{}</style>\n</head>\n<body>\n{}\n</body>\n</html>\n",
        STYLE, body
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{scored, trace};

    #[test]
    fn test_all_view_lists_every_trace() {
        let mut state = ViewState::new();
        state.load_all_traces(vec![trace("a", "one"), trace("b", "two")]);
        let screen = render_screen(&state);
        assert_eq!(screen.title, "All Traces (2)");
        assert_eq!(screen.cards.len(), 2);
        assert!(screen.detail.is_none());
        assert!(screen.empty_message.is_none());
    }

    #[test]
    fn test_showcase_view_ranks_cards() {
        let mut state = ViewState::new();
        state.set_view(View::Showcase, Some(Category::Showcase));
        state.show(vec![
            scored("x", &[(Category::Showcase, 95, "best")]),
            scored("y", &[(Category::Showcase, 80, "good")]),
        ]);
        let screen = render_screen(&state);
        assert_eq!(screen.cards[1].header, "#2");
        assert!(render_page(&screen).contains("showcase-card"));
    }

    #[test]
    fn test_interests_view_shows_category_filter() {
        let mut state = ViewState::new();
        state.set_view(View::Interests, None);
        state.set_analyzed(vec![Category::ResearchAreas]);
        let html = render_page(&render_screen(&state));
        assert!(html.contains(r#"data-action="view-top" data-category="wri_connections""#));
        assert_eq!(html.matches("analyzed-badge").count(), 1);
    }

    #[test]
    fn test_page_escapes_search_and_notice() {
        let mut state = ViewState::new();
        state.load_all_traces(vec![trace("a", "one")]);
        state.apply_search(r#""><script>"#);
        state.set_notice("Failed <b>");
        let html = render_page(&render_screen(&state));
        assert!(!html.contains("<script>"));
        assert!(html.contains("Failed &lt;b&gt;"));
        assert!(html.contains("No traces match your search."));
    }

    #[test]
    fn test_selection_toolbar_and_modal() {
        let mut state = ViewState::new();
        state.toggle_selection_mode();
        state.toggle_selection("a");
        state.begin_analysis();
        state.analysis_started(Category::Showcase);
        let screen = render_screen(&state);
        assert_eq!(screen.selection, Some(1));
        let html = render_page(&screen);
        assert!(html.contains("1 selected"));
        assert!(html.contains(r#"<li class="running">Showcase"#));
        assert!(html.contains(r#"data-action="run-analysis" disabled"#));
    }

    #[test]
    fn test_render_is_deterministic() {
        let mut state = ViewState::new();
        state.load_all_traces(vec![scored("a", &[(Category::ResearchAreas, 66, "gap")])]);
        assert_eq!(
            render_page(&render_screen(&state)),
            render_page(&render_screen(&state))
        );
    }
}
