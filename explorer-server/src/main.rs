use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::Parser;
use explorer_core::{ExplorerConfig, GeminiClient, LlmBackend, LlmConfig, UnconfiguredBackend};
use tokio::sync::broadcast;
use tracing_subscriber::{fmt, EnvFilter};

use explorer_server::http::{start_http_server, HttpState};
use explorer_server::store::TraceStore;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[arg(short, long, default_value = "explorer.toml")]
    config: String,

    /// CSV trace export to load (overrides `data.csv_path`)
    #[arg(long)]
    csv: Option<PathBuf>,

    /// Load the traces, report what was found and exit
    #[arg(long)]
    check: bool,
}

fn resolve_csv(args: &Args, config: &ExplorerConfig) -> Result<PathBuf, explorer_ingest::IngestError> {
    if let Some(path) = &args.csv {
        return Ok(path.clone());
    }
    if let Some(path) = &config.data.csv_path {
        return Ok(PathBuf::from(path));
    }
    explorer_ingest::discover_csv(Path::new(&config.data.search_dir))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present (GOOGLE_API_KEY during development)
    dotenvy::dotenv().ok();

    let args = Args::parse();

    // Load config
    let config = match ExplorerConfig::load(&args.config) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load config from {}: {}", args.config, e);
            std::process::exit(1);
        }
    };

    // Init logging; RUST_LOG wins over `service.log_level`
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.service.log_level));
    fmt().with_env_filter(filter).init();

    // Load traces
    let csv_path = match resolve_csv(&args, &config) {
        Ok(p) => p,
        Err(e) => {
            eprintln!("No trace export found: {}", e);
            std::process::exit(1);
        }
    };
    let traces = match explorer_ingest::parse_traces(&csv_path) {
        Ok(t) => t,
        Err(e) => {
            eprintln!("Failed to load traces from {}: {}", csv_path.display(), e);
            std::process::exit(1);
        }
    };
    tracing::info!(path = %csv_path.display(), traces = traces.len(), "Loaded traces");

    let llm: Arc<dyn LlmBackend> = match GeminiClient::new(LlmConfig::from_settings(&config.llm, None)) {
        Ok(client) => Arc::new(client),
        Err(e) => {
            tracing::warn!(
                error = %e,
                "Gemini client unavailable; analysis, translation and packages will fail until GOOGLE_API_KEY is set"
            );
            Arc::new(UnconfiguredBackend)
        }
    };

    if args.check {
        println!("✅ {} traces loaded from {}", traces.len(), csv_path.display());
        println!("✅ LLM backend: {}", llm.name());
        return Ok(());
    }

    let (tx, _rx) = broadcast::channel(1);
    let shutdown_tx = tx.clone();

    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {}", e);
            return;
        }
        tracing::info!("Shutdown signal received");
        let _ = shutdown_tx.send(());
    });

    let state = Arc::new(HttpState {
        store: Arc::new(TraceStore::new(traces)),
        llm,
        config,
    });

    start_http_server(state, tx.subscribe()).await?;

    Ok(())
}
