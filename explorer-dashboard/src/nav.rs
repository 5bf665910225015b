//! Navigation controller: user events in, state transitions out.
//!
//! Every event handler takes `&mut self`, so events are processed strictly
//! one at a time and a view switch cannot begin before the fetch of the
//! previous one has resolved. Network failures never propagate out of a
//! handler: they are logged and turned into notices or error records.

use std::time::{Duration, Instant};

use explorer_core::models::PackageOutcome;
use explorer_core::Category;

use crate::api::ApiClient;
use crate::package::assemble_packages;
use crate::page::{render_screen, Screen};
use crate::state::{AnalysisProgress, Highlight, TranslateStep, View, ViewState};

pub const SEARCH_DEBOUNCE: Duration = Duration::from_millis(300);
pub const HIGHLIGHT_DURATION: Duration = Duration::from_secs(2);

#[derive(Debug, Clone, PartialEq)]
struct PendingSearch {
    query: String,
    due: Instant,
}

/// In-place checkbox update after toggling one trace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectionUpdate {
    pub trace_id: String,
    pub selected: bool,
    pub count: usize,
}

/// Result of a full analysis run.
#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisRunSummary {
    pub completed: Vec<Category>,
    pub failed: Vec<Category>,
}

pub struct Navigator<C: ApiClient> {
    client: C,
    state: ViewState,
    pending_search: Option<PendingSearch>,
}

impl<C: ApiClient> Navigator<C> {
    pub fn new(client: C) -> Self {
        Self {
            client,
            state: ViewState::new(),
            pending_search: None,
        }
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    pub fn state(&self) -> &ViewState {
        &self.state
    }

    pub fn screen(&self) -> Screen {
        render_screen(&self.state)
    }

    // ========================================================================
    // Loading
    // ========================================================================

    /// Initial load: traces, then analysis status.
    pub async fn start(&mut self) -> usize {
        self.reload().await
    }

    pub async fn reload(&mut self) -> usize {
        let count = match self.client.traces().await {
            Ok(resp) => {
                self.state.clear_notice();
                self.state.load_all_traces(resp.traces)
            }
            Err(e) => {
                tracing::error!(error = %e, "Error loading traces");
                self.state.set_notice(format!("Could not load traces: {}", e));
                self.state.all_traces().len()
            }
        };

        match self.client.analysis_status().await {
            Ok(status) => self.state.set_analyzed(status.analyzed),
            Err(e) => tracing::warn!(error = %e, "Error checking analysis status"),
        }

        count
    }

    // ========================================================================
    // Views
    // ========================================================================

    pub async fn select_tab(&mut self, view: View) {
        self.pending_search = None;
        match view {
            View::All => {
                self.state.set_view(View::All, None);
                let all = self.state.all_traces().to_vec();
                self.state.show(all);
                self.state.apply_search("");
            }
            View::Showcase => {
                let traces = match self.client.top_traces(Category::Showcase).await {
                    Ok(resp) => resp.traces,
                    Err(e) => {
                        tracing::error!(error = %e, "Error loading showcase");
                        self.state.set_notice(format!("Could not load showcase: {}", e));
                        Vec::new()
                    }
                };
                self.state.set_view(View::Showcase, Some(Category::Showcase));
                self.state.show(traces);
            }
            View::Interests => {
                self.state.set_view(View::Interests, None);
                let all = self.state.all_traces().to_vec();
                self.state.show(all);
            }
        }
    }

    /// "View top" on a category: its highest-scored traces as plain cards.
    pub async fn view_top(&mut self, category: Category) {
        self.pending_search = None;
        match self.client.top_traces(category).await {
            Ok(resp) => {
                self.state.set_view(View::Interests, Some(category));
                let title = if resp.category_name.is_empty() {
                    category.name().to_string()
                } else {
                    resp.category_name
                };
                self.state.set_title(title);
                self.state.show(resp.traces);
            }
            Err(e) => {
                tracing::error!(category = category.key(), error = %e, "Error loading top traces");
                self.state
                    .set_notice(format!("Could not load top traces for {}: {}", category.name(), e));
            }
        }
    }

    /// Open the detail panel. With `focus`, the matching analysis entry is
    /// highlighted until [`HIGHLIGHT_DURATION`] has passed.
    pub async fn open_detail(&mut self, trace_id: &str, focus: Option<Category>, now: Instant) {
        match self.client.trace(trace_id).await {
            Ok(trace) => {
                self.state.set_detail(trace);
                if let Some(category) = focus {
                    self.state.set_highlight(Highlight {
                        trace_id: trace_id.to_string(),
                        category,
                        expires_at: now + HIGHLIGHT_DURATION,
                    });
                }
            }
            Err(e) => {
                tracing::error!(trace_id, error = %e, "Error loading trace");
                self.state.set_notice(format!("Could not load trace {}: {}", trace_id, e));
            }
        }
    }

    pub fn close_detail(&mut self) {
        self.state.set_selected_trace(None);
    }

    // ========================================================================
    // Search
    // ========================================================================

    /// Record a keystroke. The filter runs once input has been quiet for
    /// [`SEARCH_DEBOUNCE`].
    pub fn search_input(&mut self, query: &str, now: Instant) {
        self.pending_search = Some(PendingSearch {
            query: query.to_string(),
            due: now + SEARCH_DEBOUNCE,
        });
    }

    /// Apply the pending search if its quiet period is over.
    pub fn poll_search(&mut self, now: Instant) -> bool {
        match &self.pending_search {
            Some(pending) if pending.due <= now => {
                let query = pending.query.clone();
                self.pending_search = None;
                self.state.apply_search(&query);
                true
            }
            _ => false,
        }
    }

    /// Wait out the debounce and apply the pending search, if any.
    pub async fn settle_search(&mut self) -> bool {
        let Some(due) = self.pending_search.as_ref().map(|p| p.due) else {
            return false;
        };
        let now = Instant::now();
        if due > now {
            tokio::time::sleep(due - now).await;
        }
        self.poll_search(due)
    }

    /// Housekeeping for time-based state.
    pub fn tick(&mut self, now: Instant) {
        self.state.clear_expired_highlight(now);
        self.poll_search(now);
    }

    // ========================================================================
    // Analysis
    // ========================================================================

    /// Analyse every category in order, one request at a time. Failures are
    /// logged and the run continues; traces and status are reloaded at the
    /// end either way.
    pub async fn run_analysis<F>(&mut self, mut progress: F) -> Option<AnalysisRunSummary>
    where
        F: FnMut(&AnalysisProgress),
    {
        if !self.state.begin_analysis() {
            return None;
        }
        progress(self.state.analysis());

        for category in Category::ALL {
            self.state.analysis_started(category);
            progress(self.state.analysis());

            let ok = match self.client.analyze(category).await {
                Ok(resp) => {
                    tracing::info!(
                        category = category.key(),
                        analyzed = resp.analyzed,
                        "Category analysis finished"
                    );
                    true
                }
                Err(e) => {
                    tracing::error!(category = category.key(), error = %e, "Error analyzing category");
                    false
                }
            };

            self.state.analysis_finished(category, ok);
            progress(self.state.analysis());
        }

        self.reload().await;
        let summary = AnalysisRunSummary {
            completed: self.state.analysis().completed.clone(),
            failed: self.state.analysis().failed.clone(),
        };
        self.state.end_analysis();
        Some(summary)
    }

    pub fn close_analysis_modal(&mut self) {
        self.state.close_analysis_modal();
    }

    // ========================================================================
    // Selection and packages
    // ========================================================================

    pub fn toggle_selection_mode(&mut self) -> bool {
        self.state.toggle_selection_mode()
    }

    pub fn toggle_package_selection(&mut self, trace_id: &str) -> SelectionUpdate {
        let selected = self.state.toggle_selection(trace_id);
        SelectionUpdate {
            trace_id: trace_id.to_string(),
            selected,
            count: self.state.selected_for_package().len(),
        }
    }

    pub fn clear_selection(&mut self) {
        self.state.clear_selection();
    }

    /// Fetch a package for every selected trace, one after another.
    pub async fn generate_packages<F>(&mut self, mut progress: F) -> &[PackageOutcome]
    where
        F: FnMut(usize, usize, &str),
    {
        let ids = self.state.selected_for_package().to_vec();
        let state = &mut self.state;
        let outcomes = assemble_packages(&self.client, &ids, |done, total, trace_id| {
            state.set_package_progress(format!("Generating package {} of {}...", done, total));
            progress(done, total, trace_id);
        })
        .await;
        self.state.set_packages(outcomes);
        self.state.packages()
    }

    // ========================================================================
    // Translation
    // ========================================================================

    /// Activate the translate control of the open trace. A cached bundle is
    /// only toggled; the network is used for uncached traces alone.
    pub async fn activate_translate(&mut self) -> Option<TranslateStep> {
        let trace_id = self.state.selected_trace_id()?.to_string();

        let step = self.state.begin_translate(&trace_id);
        if step == TranslateStep::Fetch {
            let result = self.client.translate(&trace_id).await.map_err(|e| {
                tracing::error!(trace_id = %trace_id, error = %e, "Translation error");
                e.to_string()
            });
            self.state.finish_translate(&trace_id, result);
        }
        Some(step)
    }
}
