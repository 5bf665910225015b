//! View state for one dashboard session.
//!
//! A single [`ViewState`] owns everything the renderers read. It is mutated
//! only through the methods below, one event at a time, so every change is
//! visible to the next render without any locking.

use std::collections::{HashMap, HashSet};
use std::time::Instant;

use explorer_core::models::PackageOutcome;
use explorer_core::{Category, Trace, TranslationBundle};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum View {
    #[default]
    All,
    Showcase,
    Interests,
}

impl View {
    pub fn as_str(self) -> &'static str {
        match self {
            View::All => "all",
            View::Showcase => "showcase",
            View::Interests => "interests",
        }
    }
}

/// Transient emphasis on one analysis entry of the open detail panel.
#[derive(Debug, Clone, PartialEq)]
pub struct Highlight {
    pub trace_id: String,
    pub category: Category,
    pub expires_at: Instant,
}

/// Where the translate control of a trace stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TranslateState {
    OriginalOnly,
    Translating,
    TranslatedShown,
    OriginalShown,
}

/// What an activation of the translate control asks the caller to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TranslateStep {
    /// Nothing cached: fetch, then call [`ViewState::finish_translate`].
    Fetch,
    /// Cached bundle; display flipped. `true` when the translation is now shown.
    Toggled(bool),
    /// A fetch is already in flight; the activation is ignored.
    Busy,
}

/// Progress of a full analysis run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AnalysisProgress {
    pub running: bool,
    pub modal_open: bool,
    pub current: Option<Category>,
    pub completed: Vec<Category>,
    pub failed: Vec<Category>,
}

impl AnalysisProgress {
    pub fn percent(&self) -> u8 {
        let done = self.completed.len() + self.failed.len();
        ((done * 100) / Category::ALL.len()).min(100) as u8
    }
}

#[derive(Debug, Clone, Default)]
pub struct ViewState {
    all_traces: Vec<Trace>,
    visible: Vec<Trace>,
    view: View,
    category: Option<Category>,
    title: Option<String>,
    search_query: String,
    selected_trace_id: Option<String>,
    detail: Option<Trace>,
    selected_for_package: Vec<String>,
    selection_mode: bool,
    translation_cache: HashMap<String, TranslationBundle>,
    showing_translation: HashSet<String>,
    translating: HashSet<String>,
    translation_status: HashMap<String, String>,
    analyzed: Vec<Category>,
    highlight: Option<Highlight>,
    analysis: AnalysisProgress,
    packages: Vec<PackageOutcome>,
    package_progress: Option<String>,
    notice: Option<String>,
}

impl ViewState {
    pub fn new() -> Self {
        Self::default()
    }

    // ========================================================================
    // Traces and views
    // ========================================================================

    /// Replace the loaded traces wholesale. The "all" view is re-derived from
    /// the new list and the active search query.
    pub fn load_all_traces(&mut self, traces: Vec<Trace>) -> usize {
        self.all_traces = traces;
        if self.view == View::All {
            self.visible = filter_traces(&self.all_traces, &self.search_query);
        }
        if let Some(id) = &self.selected_trace_id {
            if let Some(fresh) = self.all_traces.iter().find(|t| &t.id == id) {
                self.detail = Some(fresh.clone());
            }
        }
        self.all_traces.len()
    }

    pub fn all_traces(&self) -> &[Trace] {
        &self.all_traces
    }

    pub fn visible(&self) -> &[Trace] {
        &self.visible
    }

    pub fn show(&mut self, traces: Vec<Trace>) {
        self.visible = traces;
    }

    pub fn current_view(&self) -> (View, Option<Category>) {
        (self.view, self.category)
    }

    pub fn set_view(&mut self, view: View, category: Option<Category>) {
        self.view = view;
        self.category = category;
        self.title = None;
    }

    /// Heading shown above the list, e.g. a category's full name.
    pub fn title(&self) -> Option<&str> {
        self.title.as_deref()
    }

    pub fn set_title(&mut self, title: impl Into<String>) {
        self.title = Some(title.into());
    }

    pub fn search_query(&self) -> &str {
        &self.search_query
    }

    /// Filter the full list by `query`. Leaves any category view.
    pub fn apply_search(&mut self, query: &str) -> usize {
        self.search_query = query.trim().to_string();
        self.set_view(View::All, None);
        self.visible = filter_traces(&self.all_traces, &self.search_query);
        self.visible.len()
    }

    // ========================================================================
    // Detail panel
    // ========================================================================

    pub fn selected_trace_id(&self) -> Option<&str> {
        self.selected_trace_id.as_deref()
    }

    pub fn set_selected_trace(&mut self, trace_id: Option<String>) {
        if trace_id.is_none() {
            self.detail = None;
            self.highlight = None;
        }
        self.selected_trace_id = trace_id;
    }

    pub fn detail(&self) -> Option<&Trace> {
        self.detail.as_ref()
    }

    pub fn set_detail(&mut self, trace: Trace) {
        self.selected_trace_id = Some(trace.id.clone());
        self.detail = Some(trace);
    }

    pub fn highlight(&self) -> Option<&Highlight> {
        self.highlight.as_ref()
    }

    pub fn set_highlight(&mut self, highlight: Highlight) {
        self.highlight = Some(highlight);
    }

    /// Drop the highlight once it has expired. Returns whether it was cleared.
    pub fn clear_expired_highlight(&mut self, now: Instant) -> bool {
        match &self.highlight {
            Some(h) if h.expires_at <= now => {
                self.highlight = None;
                true
            }
            _ => false,
        }
    }

    // ========================================================================
    // Package selection
    // ========================================================================

    pub fn is_selection_mode(&self) -> bool {
        self.selection_mode
    }

    pub fn toggle_selection_mode(&mut self) -> bool {
        self.selection_mode = !self.selection_mode;
        self.selection_mode
    }

    /// Flip membership of `trace_id`. Returns `true` when it is now selected.
    pub fn toggle_selection(&mut self, trace_id: &str) -> bool {
        if let Some(pos) = self.selected_for_package.iter().position(|id| id == trace_id) {
            self.selected_for_package.remove(pos);
            false
        } else {
            self.selected_for_package.push(trace_id.to_string());
            true
        }
    }

    pub fn clear_selection(&mut self) {
        self.selected_for_package.clear();
    }

    /// Selected ids in the order they were picked.
    pub fn selected_for_package(&self) -> &[String] {
        &self.selected_for_package
    }

    pub fn is_selected(&self, trace_id: &str) -> bool {
        self.selected_for_package.iter().any(|id| id == trace_id)
    }

    // ========================================================================
    // Translation
    // ========================================================================

    pub fn cache_translation(&mut self, trace_id: &str, bundle: TranslationBundle) {
        self.translation_cache.insert(trace_id.to_string(), bundle);
    }

    pub fn cached_translation(&self, trace_id: &str) -> Option<&TranslationBundle> {
        self.translation_cache.get(trace_id)
    }

    pub fn translate_state(&self, trace_id: &str) -> TranslateState {
        if self.translating.contains(trace_id) {
            TranslateState::Translating
        } else if self.translation_cache.contains_key(trace_id) {
            if self.showing_translation.contains(trace_id) {
                TranslateState::TranslatedShown
            } else {
                TranslateState::OriginalShown
            }
        } else {
            TranslateState::OriginalOnly
        }
    }

    /// Handle an activation of the translate control. The cache is consulted
    /// first; only an uncached, idle trace asks for a fetch.
    pub fn begin_translate(&mut self, trace_id: &str) -> TranslateStep {
        match self.translate_state(trace_id) {
            TranslateState::Translating => TranslateStep::Busy,
            TranslateState::TranslatedShown => {
                self.showing_translation.remove(trace_id);
                TranslateStep::Toggled(false)
            }
            TranslateState::OriginalShown => {
                self.showing_translation.insert(trace_id.to_string());
                TranslateStep::Toggled(true)
            }
            TranslateState::OriginalOnly => {
                self.translating.insert(trace_id.to_string());
                self.translation_status.remove(trace_id);
                TranslateStep::Fetch
            }
        }
    }

    pub fn finish_translate(&mut self, trace_id: &str, result: Result<TranslationBundle, String>) {
        self.translating.remove(trace_id);
        match result {
            Ok(bundle) => {
                let status = if bundle.detected_language.is_empty()
                    || bundle.detected_language.eq_ignore_ascii_case("english")
                {
                    "Already in English".to_string()
                } else {
                    format!("Translated from {}", bundle.detected_language)
                };
                self.translation_status.insert(trace_id.to_string(), status);
                self.cache_translation(trace_id, bundle);
                self.showing_translation.insert(trace_id.to_string());
            }
            Err(error) => {
                self.translation_status
                    .insert(trace_id.to_string(), format!("Translation failed: {}", error));
            }
        }
    }

    pub fn translation_status(&self, trace_id: &str) -> Option<&str> {
        self.translation_status.get(trace_id).map(String::as_str)
    }

    // ========================================================================
    // Analysis
    // ========================================================================

    pub fn analyzed(&self) -> &[Category] {
        &self.analyzed
    }

    pub fn set_analyzed(&mut self, analyzed: Vec<Category>) {
        self.analyzed = analyzed;
    }

    pub fn analysis(&self) -> &AnalysisProgress {
        &self.analysis
    }

    pub fn begin_analysis(&mut self) -> bool {
        if self.analysis.running {
            return false;
        }
        self.analysis = AnalysisProgress {
            running: true,
            modal_open: true,
            ..Default::default()
        };
        true
    }

    pub fn analysis_started(&mut self, category: Category) {
        self.analysis.current = Some(category);
    }

    pub fn analysis_finished(&mut self, category: Category, ok: bool) {
        self.analysis.current = None;
        if ok {
            self.analysis.completed.push(category);
        } else {
            self.analysis.failed.push(category);
        }
    }

    pub fn end_analysis(&mut self) {
        self.analysis.running = false;
        self.analysis.modal_open = false;
        self.analysis.current = None;
    }

    /// Hide the progress modal. A running analysis keeps going.
    pub fn close_analysis_modal(&mut self) {
        self.analysis.modal_open = false;
    }

    // ========================================================================
    // Packages and notices
    // ========================================================================

    pub fn packages(&self) -> &[PackageOutcome] {
        &self.packages
    }

    pub fn set_packages(&mut self, packages: Vec<PackageOutcome>) {
        self.packages = packages;
        self.package_progress = None;
    }

    pub fn package_progress(&self) -> Option<&str> {
        self.package_progress.as_deref()
    }

    pub fn set_package_progress(&mut self, text: impl Into<String>) {
        self.package_progress = Some(text.into());
    }

    pub fn notice(&self) -> Option<&str> {
        self.notice.as_deref()
    }

    pub fn set_notice(&mut self, notice: impl Into<String>) {
        self.notice = Some(notice.into());
    }

    pub fn clear_notice(&mut self) {
        self.notice = None;
    }
}

/// Traces whose concatenated message text contains `query`, ignoring case,
/// in their original order. A blank query keeps everything.
pub fn filter_traces(traces: &[Trace], query: &str) -> Vec<Trace> {
    let query = query.trim();
    if query.is_empty() {
        return traces.to_vec();
    }
    traces
        .iter()
        .filter(|t| t.matches_query(query))
        .cloned()
        .collect()
}
