//! In-memory trace store shared by every HTTP handler.
//!
//! Traces are loaded once from the CSV export; analysis results and
//! translations accumulate for the life of the process.

use std::collections::HashMap;

use explorer_core::api::TracesResponse;
use explorer_core::{Category, Trace, TranslationBundle};
use tokio::sync::RwLock;

use crate::subsystems::analyze::TraceAnalysis;

#[derive(Debug, Default)]
pub struct TraceStore {
    traces: RwLock<Vec<Trace>>,
    analyzed: RwLock<Vec<Category>>,
    translations: RwLock<HashMap<String, TranslationBundle>>,
}

impl TraceStore {
    pub fn new(traces: Vec<Trace>) -> Self {
        Self {
            traces: RwLock::new(traces),
            ..Default::default()
        }
    }

    pub async fn len(&self) -> usize {
        self.traces.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.traces.read().await.is_empty()
    }

    /// Snapshot of every trace in load order.
    pub async fn all(&self) -> Vec<Trace> {
        self.traces.read().await.clone()
    }

    pub async fn get(&self, trace_id: &str) -> Option<Trace> {
        self.traces
            .read()
            .await
            .iter()
            .find(|t| t.id == trace_id)
            .cloned()
    }

    /// `/api/traces`: optionally keep only traces scored for `category`
    /// (highest first), then cap at `limit`.
    pub async fn list(&self, category: Option<Category>, limit: Option<usize>) -> TracesResponse {
        let traces = self.traces.read().await;
        let total = traces.len();

        let mut result: Vec<Trace> = match category {
            Some(c) => ranked(&traces, c),
            None => traces.clone(),
        };
        if let Some(limit) = limit.filter(|l| *l > 0) {
            result.truncate(limit);
        }

        TracesResponse {
            filtered: result.len(),
            traces: result,
            total,
        }
    }

    /// Top `n` traces for `category` by score; unscored traces are excluded.
    pub async fn top(&self, category: Category, n: usize) -> Vec<Trace> {
        let traces = self.traces.read().await;
        let mut result = ranked(&traces, category);
        result.truncate(n);
        result
    }

    /// Write one category's results into the matching traces. Returns how
    /// many traces were updated.
    pub async fn apply_analyses(&self, category: Category, results: &[TraceAnalysis]) -> usize {
        let by_id: HashMap<&str, &TraceAnalysis> =
            results.iter().map(|a| (a.trace_id.as_str(), a)).collect();

        let mut traces = self.traces.write().await;
        let mut updated = 0;
        for trace in traces.iter_mut() {
            if let Some(analysis) = by_id.get(trace.id.as_str()) {
                trace.record_analysis(category, analysis.score, analysis.reason.clone());
                updated += 1;
            }
        }
        updated
    }

    pub async fn mark_analyzed(&self, category: Category) {
        let mut analyzed = self.analyzed.write().await;
        if !analyzed.contains(&category) {
            analyzed.push(category);
        }
    }

    /// Categories analysed so far, in the order they completed.
    pub async fn analyzed(&self) -> Vec<Category> {
        self.analyzed.read().await.clone()
    }

    pub async fn cached_translation(&self, trace_id: &str) -> Option<TranslationBundle> {
        self.translations.read().await.get(trace_id).cloned()
    }

    pub async fn cache_translation(&self, trace_id: &str, bundle: TranslationBundle) {
        self.translations
            .write()
            .await
            .insert(trace_id.to_string(), bundle);
    }
}

fn ranked(traces: &[Trace], category: Category) -> Vec<Trace> {
    let mut scored: Vec<Trace> = traces
        .iter()
        .filter(|t| t.scores().contains_key(category))
        .cloned()
        .collect();
    scored.sort_by(|a, b| b.score(category).cmp(&a.score(category)));
    scored
}
