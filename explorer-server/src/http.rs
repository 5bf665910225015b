//! Trace Explorer HTTP API
//!
//! Axum server behind the dashboard. Each endpoint has a thin axum handler
//! that delegates to an inner function returning `(StatusCode, Value)`, so the
//! behaviour is testable without going through the router.
//!
//! Endpoints:
//! - GET  /  server-rendered dashboard page
//! - GET  /health  liveness plus store summary
//! - GET  /version  server version info
//! - GET  /api/traces  all traces (optional category/limit)
//! - GET  /api/analysis-status  categories analysed so far
//! - POST /api/analyze  score every trace for one category
//! - GET  /api/top-traces/:category  highest-scored traces
//! - GET  /api/trace/:trace_id  one trace
//! - GET  /api/translate/:trace_id  English translation, cached
//! - GET  /api/presentation-package/:trace_id  demo briefing for one trace

use std::str::FromStr;
use std::sync::Arc;

use anyhow::Result;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse};
use axum::routing::{get, post};
use axum::{Json, Router};
use explorer_core::api::{AnalysisStatus, AnalyzeRequest, AnalyzeResponse, TopTracesResponse};
use explorer_core::{Category, ExplorerConfig, ExplorerError, LlmBackend};
use explorer_dashboard::{render_page, render_screen, View, ViewState};
use serde::Deserialize;
use tokio::net::TcpListener;
use tokio::sync::broadcast;

use crate::store::TraceStore;
use crate::subsystems::{analyze, package, translate};

/// Shared state for all HTTP handlers
#[derive(Clone)]
pub struct HttpState {
    pub store: Arc<TraceStore>,
    pub llm: Arc<dyn LlmBackend>,
    pub config: ExplorerConfig,
}

/// Build the Axum router with all endpoints
pub fn build_router(state: Arc<HttpState>) -> Router {
    Router::new()
        .route("/", get(page_handler))
        .route("/health", get(health_handler))
        .route("/version", get(version_handler))
        .route("/api/traces", get(traces_handler))
        .route("/api/analysis-status", get(analysis_status_handler))
        .route("/api/analyze", post(analyze_handler))
        .route("/api/top-traces/:category", get(top_traces_handler))
        .route("/api/trace/:trace_id", get(trace_handler))
        .route("/api/translate/:trace_id", get(translate_handler))
        .route(
            "/api/presentation-package/:trace_id",
            get(presentation_package_handler),
        )
        .with_state(state)
}

/// Start the HTTP server on the configured address.
/// Gracefully shuts down when the broadcast shutdown signal fires.
pub async fn start_http_server(
    state: Arc<HttpState>,
    mut shutdown: broadcast::Receiver<()>,
) -> Result<()> {
    let addr = format!("{}:{}", state.config.http.host, state.config.http.port);

    let app = build_router(state);
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!("Trace Explorer listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = shutdown.recv().await;
            tracing::info!("HTTP server shutting down...");
        })
        .await?;

    Ok(())
}

// ============================================================================
// Query parameters
// ============================================================================

#[derive(Debug, Deserialize, Default)]
pub struct TracesQuery {
    pub category: Option<String>,
    pub limit: Option<usize>,
}

#[derive(Debug, Deserialize, Default)]
pub struct PageQuery {
    pub view: Option<String>,
    pub category: Option<String>,
}

fn error_body(status: StatusCode, msg: impl Into<String>) -> (StatusCode, serde_json::Value) {
    (status, serde_json::json!({ "error": msg.into() }))
}

fn to_value<T: serde::Serialize>(value: &T) -> (StatusCode, serde_json::Value) {
    match serde_json::to_value(value) {
        Ok(v) => (StatusCode::OK, v),
        Err(e) => error_body(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
    }
}

// ============================================================================
// Inner (directly testable) business logic functions
// ============================================================================

pub async fn health_inner(store: &TraceStore, llm: &dyn LlmBackend) -> (StatusCode, serde_json::Value) {
    let analyzed = store.analyzed().await;
    (
        StatusCode::OK,
        serde_json::json!({
            "status": "healthy",
            "version": env!("CARGO_PKG_VERSION"),
            "traces": store.len().await,
            "analyzed": analyzed,
            "llm": llm.name(),
        }),
    )
}

/// Inner version: returns version info (pure, no IO).
pub fn version_inner() -> serde_json::Value {
    serde_json::json!({
        "version": env!("CARGO_PKG_VERSION"),
        "service": "trace-explorer",
    })
}

/// Unknown categories are ignored and the full list is returned.
pub async fn traces_inner(store: &TraceStore, query: TracesQuery) -> (StatusCode, serde_json::Value) {
    let category = query
        .category
        .as_deref()
        .filter(|c| !c.is_empty())
        .and_then(|c| Category::from_str(c).ok());
    to_value(&store.list(category, query.limit).await)
}

pub async fn analysis_status_inner(store: &TraceStore) -> (StatusCode, serde_json::Value) {
    to_value(&AnalysisStatus {
        analyzed: store.analyzed().await,
        categories: Category::ALL.to_vec(),
    })
}

pub async fn analyze_inner(
    store: &TraceStore,
    llm: &dyn LlmBackend,
    config: &ExplorerConfig,
    req: AnalyzeRequest,
) -> (StatusCode, serde_json::Value) {
    let category = match req.category.as_deref().map(Category::from_str) {
        Some(Ok(c)) => c,
        _ => return error_body(StatusCode::BAD_REQUEST, "Invalid category"),
    };

    let report = analyze::run_category_analysis(store, llm, &config.analysis, category).await;
    to_value(&AnalyzeResponse {
        success: true,
        analyzed: report.analyzed,
        category,
    })
}

pub async fn top_traces_inner(
    store: &TraceStore,
    config: &ExplorerConfig,
    category: &str,
) -> (StatusCode, serde_json::Value) {
    let category = match Category::from_str(category) {
        Ok(c) => c,
        Err(_) => return error_body(StatusCode::BAD_REQUEST, "Invalid category"),
    };

    to_value(&TopTracesResponse {
        category: Some(category),
        category_name: category.name().to_string(),
        traces: store.top(category, config.analysis.top_n).await,
    })
}

pub async fn trace_inner(store: &TraceStore, trace_id: &str) -> (StatusCode, serde_json::Value) {
    match store.get(trace_id).await {
        Some(trace) => to_value(&trace),
        None => error_body(StatusCode::NOT_FOUND, "Trace not found"),
    }
}

pub async fn translate_inner(
    store: &TraceStore,
    llm: &dyn LlmBackend,
    trace_id: &str,
) -> (StatusCode, serde_json::Value) {
    match translate::translate_trace(store, llm, trace_id).await {
        Ok(bundle) => to_value(&bundle),
        Err(ExplorerError::TraceNotFound(_)) => error_body(StatusCode::NOT_FOUND, "Trace not found"),
        Err(e) => {
            tracing::error!(trace_id, error = %e, "Translation error");
            error_body(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
        }
    }
}

pub async fn presentation_package_inner(
    store: &TraceStore,
    llm: &dyn LlmBackend,
    config: &ExplorerConfig,
    trace_id: &str,
) -> (StatusCode, serde_json::Value) {
    match package::build_presentation_package(store, llm, &config.analysis, trace_id).await {
        Ok(pkg) => to_value(&pkg),
        Err(ExplorerError::TraceNotFound(_)) => error_body(StatusCode::NOT_FOUND, "Trace not found"),
        Err(e) => {
            tracing::error!(trace_id, error = %e, "Error generating presentation package");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                serde_json::json!({ "error": e.to_string(), "trace_id": trace_id }),
            )
        }
    }
}

/// Render the dashboard for `?view=&category=`.
pub async fn page_inner(
    store: &TraceStore,
    config: &ExplorerConfig,
    query: PageQuery,
) -> (StatusCode, String) {
    let view = match query.view.as_deref().unwrap_or("all") {
        "all" => View::All,
        "showcase" => View::Showcase,
        "interests" => View::Interests,
        other => return (StatusCode::BAD_REQUEST, format!("Unknown view: {}", other)),
    };
    let category = match query.category.as_deref().filter(|c| !c.is_empty()) {
        None => None,
        Some(raw) => match Category::from_str(raw) {
            Ok(c) => Some(c),
            Err(e) => return (StatusCode::BAD_REQUEST, e.to_string()),
        },
    };

    let mut state = ViewState::new();
    state.load_all_traces(store.all().await);
    state.set_analyzed(store.analyzed().await);

    match (view, category) {
        (View::All, _) => {}
        (View::Showcase, _) => {
            state.set_view(View::Showcase, Some(Category::Showcase));
            state.show(store.top(Category::Showcase, config.analysis.top_n).await);
        }
        (View::Interests, Some(c)) => {
            state.set_view(View::Interests, Some(c));
            state.set_title(c.name());
            state.show(store.top(c, config.analysis.top_n).await);
        }
        (View::Interests, None) => {
            state.set_view(View::Interests, None);
        }
    }

    (StatusCode::OK, render_page(&render_screen(&state)))
}

// ============================================================================
// Axum handler wrappers (thin, delegate to inner functions)
// ============================================================================

pub async fn page_handler(
    State(state): State<Arc<HttpState>>,
    Query(query): Query<PageQuery>,
) -> impl IntoResponse {
    let (status, body) = page_inner(&state.store, &state.config, query).await;
    (status, Html(body))
}

pub async fn health_handler(State(state): State<Arc<HttpState>>) -> impl IntoResponse {
    let (status, body) = health_inner(&state.store, state.llm.as_ref()).await;
    (status, Json(body))
}

pub async fn version_handler() -> impl IntoResponse {
    (StatusCode::OK, Json(version_inner()))
}

pub async fn traces_handler(
    State(state): State<Arc<HttpState>>,
    Query(query): Query<TracesQuery>,
) -> impl IntoResponse {
    let (status, body) = traces_inner(&state.store, query).await;
    (status, Json(body))
}

pub async fn analysis_status_handler(State(state): State<Arc<HttpState>>) -> impl IntoResponse {
    let (status, body) = analysis_status_inner(&state.store).await;
    (status, Json(body))
}

pub async fn analyze_handler(
    State(state): State<Arc<HttpState>>,
    Json(req): Json<AnalyzeRequest>,
) -> impl IntoResponse {
    let (status, body) = analyze_inner(&state.store, state.llm.as_ref(), &state.config, req).await;
    (status, Json(body))
}

pub async fn top_traces_handler(
    State(state): State<Arc<HttpState>>,
    Path(category): Path<String>,
) -> impl IntoResponse {
    let (status, body) = top_traces_inner(&state.store, &state.config, &category).await;
    (status, Json(body))
}

pub async fn trace_handler(
    State(state): State<Arc<HttpState>>,
    Path(trace_id): Path<String>,
) -> impl IntoResponse {
    let (status, body) = trace_inner(&state.store, &trace_id).await;
    (status, Json(body))
}

pub async fn translate_handler(
    State(state): State<Arc<HttpState>>,
    Path(trace_id): Path<String>,
) -> impl IntoResponse {
    let (status, body) = translate_inner(&state.store, state.llm.as_ref(), &trace_id).await;
    (status, Json(body))
}

pub async fn presentation_package_handler(
    State(state): State<Arc<HttpState>>,
    Path(trace_id): Path<String>,
) -> impl IntoResponse {
    let (status, body) =
        presentation_package_inner(&state.store, state.llm.as_ref(), &state.config, &trace_id)
            .await;
    (status, Json(body))
}

// ============================================================================
// Unit Tests: call inner functions directly
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{trace, ScriptedLlm};

    fn store() -> TraceStore {
        let mut a = trace("t-1", "Where are floods worst in Dhaka?");
        a.record_analysis(Category::Showcase, 64, "Good regional story");
        let mut b = trace("t-2", "Mangrove loss in Sundarbans");
        b.record_analysis(Category::Showcase, 88, "Striking loss trend");
        let c = trace("t-3", "Carbon stock in Borneo peat");
        TraceStore::new(vec![a, b, c])
    }

    // ========================================================================
    // TEST 1: version_inner is pure and returns correct fields
    // ========================================================================
    #[test]
    fn test_version_inner_pure() {
        let v = version_inner();
        assert_eq!(v["version"], env!("CARGO_PKG_VERSION"));
        assert_eq!(v["service"], "trace-explorer");
    }

    // ========================================================================
    // TEST 2: health reports trace count and backend
    // ========================================================================
    #[tokio::test]
    async fn test_health_inner_reports_store() {
        let llm = ScriptedLlm::new();
        let (status, body) = health_inner(&store(), &llm).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["traces"], 3);
        assert_eq!(body["llm"], "scripted");
    }

    // ========================================================================
    // TEST 3: traces ignores unknown categories, filters known ones
    // ========================================================================
    #[tokio::test]
    async fn test_traces_inner_category_filter() {
        let store = store();

        let (_, body) = traces_inner(
            &store,
            TracesQuery {
                category: Some("nonsense".to_string()),
                limit: None,
            },
        )
        .await;
        assert_eq!(body["total"], 3);
        assert_eq!(body["traces"].as_array().unwrap().len(), 3);

        let (_, body) = traces_inner(
            &store,
            TracesQuery {
                category: Some("showcase".to_string()),
                limit: Some(1),
            },
        )
        .await;
        assert_eq!(body["filtered"], 1);
        assert_eq!(body["traces"][0]["id"], "t-2");
    }

    // ========================================================================
    // TEST 4: analyze rejects unknown or missing categories
    // ========================================================================
    #[tokio::test]
    async fn test_analyze_inner_invalid_category() {
        let llm = ScriptedLlm::new();
        let config = ExplorerConfig::default();

        for category in [Some("vibes".to_string()), None] {
            let (status, body) =
                analyze_inner(&store(), &llm, &config, AnalyzeRequest { category }).await;
            assert_eq!(status, StatusCode::BAD_REQUEST);
            assert_eq!(body["error"], "Invalid category");
        }
        assert_eq!(llm.prompt_count(), 0);
    }

    // ========================================================================
    // TEST 5: analyze scores traces and marks the category
    // ========================================================================
    #[tokio::test]
    async fn test_analyze_inner_records_scores() {
        let store = store();
        let llm = ScriptedLlm::new().reply(
            r#"{"analyses":[
                {"trace_id":"t-1","score":81,"reason":"Clear gap in flood data"},
                {"trace_id":"t-3","score":12,"reason":"Generic"}
            ]}"#,
        );
        let config = ExplorerConfig::default();

        let (status, body) = analyze_inner(
            &store,
            &llm,
            &config,
            AnalyzeRequest {
                category: Some("research_areas".to_string()),
            },
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);
        assert_eq!(body["analyzed"], 2);
        assert_eq!(body["category"], "research_areas");

        let (_, status_body) = analysis_status_inner(&store).await;
        assert_eq!(status_body["analyzed"][0], "research_areas");
        let t1 = store.get("t-1").await.unwrap();
        assert_eq!(t1.score(Category::ResearchAreas), Some(81));
    }

    // ========================================================================
    // TEST 6: top traces ranks and names the category
    // ========================================================================
    #[tokio::test]
    async fn test_top_traces_inner() {
        let config = ExplorerConfig::default();
        let (status, body) = top_traces_inner(&store(), &config, "showcase").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["category_name"], "Showcase");
        let ids: Vec<&str> = body["traces"]
            .as_array()
            .unwrap()
            .iter()
            .map(|t| t["id"].as_str().unwrap())
            .collect();
        assert_eq!(ids, vec!["t-2", "t-1"]);

        let (status, body) = top_traces_inner(&store(), &config, "bogus").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Invalid category");
    }

    // ========================================================================
    // TEST 7: trace lookup 404s on unknown ids
    // ========================================================================
    #[tokio::test]
    async fn test_trace_inner_not_found() {
        let (status, body) = trace_inner(&store(), "missing").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "Trace not found");

        let (status, body) = trace_inner(&store(), "t-3").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["conversation"][0]["content"], "Carbon stock in Borneo peat");
    }

    // ========================================================================
    // TEST 8: translate maps failures to 404 / 500
    // ========================================================================
    #[tokio::test]
    async fn test_translate_inner_errors() {
        let llm = ScriptedLlm::new().fail("quota exhausted");
        let store = store();

        let (status, _) = translate_inner(&store, &llm, "missing").await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, body) = translate_inner(&store, &llm, "t-1").await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(body["error"].as_str().unwrap().contains("quota exhausted"));
    }

    // ========================================================================
    // TEST 9: failed package generation carries the trace id
    // ========================================================================
    #[tokio::test]
    async fn test_package_inner_failure_body() {
        let llm = ScriptedLlm::new().fail("model overloaded");
        let config = ExplorerConfig::default();

        let (status, body) = presentation_package_inner(&store(), &llm, &config, "t-2").await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["trace_id"], "t-2");
        assert!(body["error"].is_string());
    }

    // ========================================================================
    // TEST 10: page renders the requested view
    // ========================================================================
    #[tokio::test]
    async fn test_page_inner_views() {
        let config = ExplorerConfig::default();
        let store = store();

        let (status, html) = page_inner(&store, &config, PageQuery::default()).await;
        assert_eq!(status, StatusCode::OK);
        assert!(html.contains("All Traces (3)"));

        let (_, html) = page_inner(
            &store,
            &config,
            PageQuery {
                view: Some("showcase".to_string()),
                category: None,
            },
        )
        .await;
        assert_eq!(html.matches("showcase-card").count(), 2);

        let (status, _) = page_inner(
            &store,
            &config,
            PageQuery {
                view: Some("interests".to_string()),
                category: Some("nope".to_string()),
            },
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }
}
