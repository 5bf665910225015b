//! explorer-cli: terminal front end for a running explorer-server
//!
//! Drives the same navigation controller as the web dashboard, so every
//! subcommand performs the calls a user would trigger in the browser.
//!
//! # Subcommands
//! - `status`  trace count and analysed categories
//! - `list [-n <limit>] [--json]`  all traces
//! - `showcase`  showcase ranking
//! - `top <category>`  highest-scored traces for a category
//! - `show <id> [--translate]`  full conversation and analysis
//! - `search <query>`  case-insensitive text search
//! - `analyze`  run every category analysis in order
//! - `package <ids...> [--export-dir <dir>]`  presentation packages
//! - `render [--view] [--category] [--out]`  write the dashboard page

use std::path::PathBuf;
use std::str::FromStr;
use std::time::{Duration, Instant};

use clap::{Parser, Subcommand};
use explorer_core::models::PackageOutcome;
use explorer_core::{Category, Trace};
use explorer_dashboard::card::Card;
use explorer_dashboard::detail::Detail;
use explorer_dashboard::package::export_text;
use explorer_dashboard::{render_page, HttpApiClient, Navigator, Screen, View};
use tracing_subscriber::{fmt, EnvFilter};

const DEFAULT_SERVER: &str = "http://127.0.0.1:5001";
const DEFAULT_TIMEOUT_SECS: u64 = 300;

// ============================================================================
// CLI Definition
// ============================================================================

#[derive(Debug, Parser)]
#[command(
    name = "explorer-cli",
    version,
    about = "Trace Explorer: browse, analyse and package conversation traces"
)]
struct Cli {
    /// Explorer HTTP server URL (overrides EXPLORER_HTTP_URL env var)
    #[arg(long, env = "EXPLORER_HTTP_URL", default_value = DEFAULT_SERVER)]
    server: String,

    /// Request timeout in seconds; analysis and packages wait on the model
    #[arg(long, default_value_t = DEFAULT_TIMEOUT_SECS)]
    timeout: u64,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Show trace count and analysed categories
    Status,

    /// List all traces
    List {
        /// Maximum number of traces to print
        #[arg(short = 'n', long)]
        limit: Option<usize>,

        /// Print the traces as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show the showcase ranking
    Showcase,

    /// Show the highest-scored traces for one category
    Top {
        /// Category key, e.g. research_areas
        category: String,
    },

    /// Show one trace in full
    Show {
        trace_id: String,

        /// Translate the conversation to English
        #[arg(long)]
        translate: bool,
    },

    /// Search conversation text
    Search { query: String },

    /// Run the analysis for every category, one after another
    Analyze,

    /// Generate presentation packages for the given traces
    Package {
        #[arg(required = true)]
        trace_ids: Vec<String>,

        /// Also write each package as a text file into this directory
        #[arg(long)]
        export_dir: Option<PathBuf>,
    },

    /// Write the dashboard page as HTML
    Render {
        /// all, showcase or interests
        #[arg(long, default_value = "all")]
        view: String,

        /// Category for the interests view
        #[arg(long)]
        category: Option<String>,

        /// Output file; stdout when omitted
        #[arg(long)]
        out: Option<PathBuf>,
    },
}

// ============================================================================
// Text output
// ============================================================================

/// One list entry: header line, badges, question preview and summary.
pub fn format_card(card: &Card) -> String {
    let mut out = format!("{}  {}", card.header, card.timestamp);
    if card.header.starts_with('#') {
        out.push_str(&format!("  [{}]", card.trace_id));
    }
    out.push('\n');

    let badges: Vec<String> = card
        .headline
        .iter()
        .chain(card.badges.iter())
        .map(|b| format!("{} {} ({})", b.label(), b.score, b.tier.as_str()))
        .collect();
    if !badges.is_empty() {
        out.push_str(&format!("  {}\n", badges.join(" | ")));
    }
    if let Some(reason) = &card.reason {
        out.push_str(&format!("  Why: {}\n", reason));
    }
    if let Some(q) = &card.user_preview {
        out.push_str(&format!("  Q: {}\n", q));
    }
    if let Some(summary) = &card.summary {
        out.push_str(&format!("  {}\n", summary.sentence()));
    }
    out
}

pub fn format_screen(screen: &Screen) -> String {
    let mut out = format!("{}\n{}\n", screen.title, "=".repeat(screen.title.chars().count()));
    if let Some(notice) = &screen.notice {
        out.push_str(&format!("! {}\n", notice));
    }
    if let Some(message) = screen.empty_message {
        out.push_str(message);
        out.push('\n');
    }
    for card in &screen.cards {
        out.push('\n');
        out.push_str(&format_card(card));
    }
    out
}

/// Full conversation, with translations in place of originals when shown.
pub fn format_detail(detail: &Detail, trace: &Trace) -> String {
    let mut out = format!("Trace {}\n{}\n", detail.trace_id, detail.timestamp);
    if let Some(session) = &detail.session {
        out.push_str(&format!("Session {}\n", session));
    }
    out.push_str(&format!(
        "Latency {} | {} tokens",
        detail.latency, detail.total_tokens
    ));
    if let Some(errors) = detail.errors {
        out.push_str(&format!(" | {} errors", errors));
    }
    out.push('\n');
    if let Some(status) = &detail.translate.status {
        out.push_str(&format!("({})\n", status));
    }

    for msg in &detail.messages {
        let text = match (&msg.translation, msg.translation_visible) {
            (Some(t), true) => t.as_str(),
            _ => msg.original.as_str(),
        };
        out.push_str(&format!("\n[{}]\n{}\n", msg.role.label(), text));
    }

    if !detail.analysis.is_empty() {
        out.push_str("\nAnalysis\n--------\n");
        for entry in &detail.analysis {
            let score = entry.score.map(|s| s.to_string()).unwrap_or_default();
            out.push_str(&format!(
                "{} {}: {}\n",
                entry.category.name(),
                score,
                trace.rationale(entry.category).unwrap_or_default()
            ));
        }
    }
    out
}

// ============================================================================
// Commands
// ============================================================================

fn parse_category(raw: &str) -> anyhow::Result<Category> {
    Category::from_str(raw).map_err(|_| {
        let keys: Vec<&str> = Category::ALL.iter().map(|c| c.key()).collect();
        anyhow::anyhow!("unknown category {:?} (expected one of {})", raw, keys.join(", "))
    })
}

async fn do_status(nav: &mut Navigator<HttpApiClient>) -> anyhow::Result<()> {
    let count = nav.start().await;
    if let Some(notice) = nav.state().notice() {
        anyhow::bail!("{}", notice);
    }
    let analyzed: Vec<&str> = nav.state().analyzed().iter().map(|c| c.key()).collect();
    println!("Server:   {}", nav.client().base_url());
    println!("Traces:   {}", count);
    println!(
        "Analyzed: {}",
        if analyzed.is_empty() { "none".to_string() } else { analyzed.join(", ") }
    );
    Ok(())
}

async fn do_list(
    nav: &mut Navigator<HttpApiClient>,
    limit: Option<usize>,
    json: bool,
) -> anyhow::Result<()> {
    nav.start().await;
    if json {
        let traces = nav.state().visible();
        let shown = &traces[..limit.unwrap_or(traces.len()).min(traces.len())];
        println!("{}", serde_json::to_string_pretty(shown)?);
        return Ok(());
    }
    let mut screen = nav.screen();
    if let Some(limit) = limit {
        screen.cards.truncate(limit);
    }
    print!("{}", format_screen(&screen));
    Ok(())
}

async fn do_show(
    nav: &mut Navigator<HttpApiClient>,
    trace_id: &str,
    translate: bool,
) -> anyhow::Result<()> {
    nav.open_detail(trace_id, None, Instant::now()).await;
    if let Some(notice) = nav.state().notice() {
        anyhow::bail!("{}", notice);
    }
    if translate {
        nav.activate_translate().await;
    }

    let (Some(detail), Some(trace)) = (nav.screen().detail, nav.state().detail()) else {
        anyhow::bail!("trace {} not loaded", trace_id);
    };
    print!("{}", format_detail(&detail, trace));
    Ok(())
}

async fn do_analyze(nav: &mut Navigator<HttpApiClient>) -> anyhow::Result<()> {
    nav.start().await;
    let summary = nav
        .run_analysis(|progress| {
            if let Some(current) = progress.current {
                eprintln!("[{:>3}%] analysing {}...", progress.percent(), current.name());
            }
        })
        .await;

    let Some(summary) = summary else {
        anyhow::bail!("an analysis is already running");
    };
    for category in &summary.completed {
        println!("✅ {}", category.name());
    }
    for category in &summary.failed {
        println!("❌ {}", category.name());
    }
    if !summary.failed.is_empty() {
        anyhow::bail!("{} categories failed", summary.failed.len());
    }
    Ok(())
}

async fn do_package(
    nav: &mut Navigator<HttpApiClient>,
    trace_ids: &[String],
    export_dir: Option<PathBuf>,
) -> anyhow::Result<()> {
    nav.toggle_selection_mode();
    for id in trace_ids {
        if !nav.state().is_selected(id) {
            nav.toggle_package_selection(id);
        }
    }

    let outcomes = nav
        .generate_packages(|done, total, id| {
            eprintln!("Generating package {} of {} ({})...", done, total, id)
        })
        .await
        .to_vec();

    let mut failed = 0;
    for (i, outcome) in outcomes.iter().enumerate() {
        match outcome {
            PackageOutcome::Ready(package) => {
                let file = export_text(package);
                match &export_dir {
                    Some(dir) => {
                        let path = file.write_to(dir)?;
                        println!("Package {}: {}", i + 1, path.display());
                    }
                    None => println!("{}", file.contents),
                }
            }
            PackageOutcome::Failed(failure) => {
                failed += 1;
                eprintln!("Package {} ({}) failed: {}", i + 1, failure.trace_id, failure.error);
            }
        }
    }

    if failed > 0 {
        anyhow::bail!("{} of {} packages failed", failed, outcomes.len());
    }
    Ok(())
}

async fn do_render(
    nav: &mut Navigator<HttpApiClient>,
    view: &str,
    category: Option<&str>,
    out: Option<PathBuf>,
) -> anyhow::Result<()> {
    nav.start().await;
    match (view, category) {
        ("all", _) => {}
        ("showcase", _) => nav.select_tab(View::Showcase).await,
        ("interests", Some(raw)) => nav.view_top(parse_category(raw)?).await,
        ("interests", None) => nav.select_tab(View::Interests).await,
        (other, _) => anyhow::bail!("unknown view {:?}", other),
    }

    let html = render_page(&nav.screen());
    match out {
        Some(path) => {
            std::fs::write(&path, html)?;
            println!("Wrote {}", path.display());
        }
        None => print!("{}", html),
    }
    Ok(())
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let client = HttpApiClient::new(&cli.server, Duration::from_secs(cli.timeout))?;
    tracing::debug!(server = client.base_url(), "Using explorer server");
    let mut nav = Navigator::new(client);

    match cli.command {
        Commands::Status => do_status(&mut nav).await,
        Commands::List { limit, json } => do_list(&mut nav, limit, json).await,
        Commands::Showcase => {
            nav.select_tab(View::Showcase).await;
            print!("{}", format_screen(&nav.screen()));
            Ok(())
        }
        Commands::Top { category } => {
            nav.view_top(parse_category(&category)?).await;
            print!("{}", format_screen(&nav.screen()));
            Ok(())
        }
        Commands::Show { trace_id, translate } => do_show(&mut nav, &trace_id, translate).await,
        Commands::Search { query } => {
            nav.start().await;
            nav.search_input(&query, Instant::now());
            nav.settle_search().await;
            print!("{}", format_screen(&nav.screen()));
            Ok(())
        }
        Commands::Analyze => do_analyze(&mut nav).await,
        Commands::Package {
            trace_ids,
            export_dir,
        } => do_package(&mut nav, &trace_ids, export_dir).await,
        Commands::Render {
            view,
            category,
            out,
        } => do_render(&mut nav, &view, category.as_deref(), out).await,
    }
}

// ============================================================================
// Main
// ============================================================================

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(EnvFilter::from_default_env().add_directive(tracing::Level::WARN.into()))
        .init();

    if let Err(e) = run(cli).await {
        eprintln!("explorer-cli: {}", e);
        std::process::exit(1);
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use explorer_core::{Message, Role};
    use explorer_dashboard::card::{render_card, CardVariant};
    use explorer_dashboard::detail::render_detail;
    use explorer_dashboard::{render_screen, ViewState};

    fn trace() -> Trace {
        let ts = "2025-01-20T08:05:00Z".parse().unwrap();
        let mut t = Trace::new(
            "0123456789abcdef",
            ts,
            vec![
                Message::new(Role::User, "Where is mangrove loss worst?"),
                Message::new(Role::Assistant, "The Sundarbans lost 3%."),
            ],
        );
        t.record_analysis(Category::Showcase, 88, "Vivid coastal story");
        t.record_analysis(Category::ProductFeatures, 55, "Asks for coastal layers");
        t
    }

    // ========================================================================
    // TEST 1: standard card shows short id, badges and summary
    // ========================================================================
    #[test]
    fn test_format_card_standard() {
        let card = render_card(&trace(), &ViewState::new(), CardVariant::Standard);
        let text = format_card(&card);

        assert!(text.starts_with("0123456789ab  "));
        assert!(text.contains("Q: Where is mangrove loss worst?"));
        assert!(text.contains("(high)"));
        assert!(text.contains("(medium)"));
    }

    // ========================================================================
    // TEST 2: showcase card header carries rank and full id
    // ========================================================================
    #[test]
    fn test_format_card_showcase_rank() {
        let card = render_card(&trace(), &ViewState::new(), CardVariant::Showcase { rank: 3 });
        let text = format_card(&card);
        assert!(text.starts_with("#3  "));
        assert!(text.contains("[0123456789abcdef]"));
        assert!(text.contains("Why: Vivid coastal story"));
    }

    // ========================================================================
    // TEST 3: empty screen prints its message under the title
    // ========================================================================
    #[test]
    fn test_format_screen_empty() {
        let text = format_screen(&render_screen(&ViewState::new()));
        assert!(text.starts_with("All Traces (0)\n=============="));
        assert!(text.contains("No traces loaded."));
    }

    // ========================================================================
    // TEST 4: detail lists conversation then analysis with raw rationale
    // ========================================================================
    #[test]
    fn test_format_detail() {
        let t = trace();
        let detail = render_detail(&t, &ViewState::new());
        let text = format_detail(&detail, &t);

        let user = text.find("[User]").unwrap();
        let assistant = text.find("[Assistant]").unwrap();
        let analysis = text.find("Analysis").unwrap();
        assert!(user < assistant && assistant < analysis);
        assert!(text.contains("Showcase 88: Vivid coastal story"));
    }

    // ========================================================================
    // TEST 5: category parsing reports the valid keys
    // ========================================================================
    #[test]
    fn test_parse_category() {
        assert_eq!(parse_category("research_areas").unwrap(), Category::ResearchAreas);
        let err = parse_category("vibes").unwrap_err().to_string();
        assert!(err.contains("wri_connections"));
    }

    // ========================================================================
    // TEST 6: CLI definition is consistent
    // ========================================================================
    #[test]
    fn test_cli_parses_package_command() {
        let cli = Cli::try_parse_from([
            "explorer-cli",
            "--server",
            "http://localhost:9000",
            "package",
            "a",
            "b",
            "--export-dir",
            "/tmp/out",
        ])
        .unwrap();
        assert_eq!(cli.server, "http://localhost:9000");
        match cli.command {
            Commands::Package {
                trace_ids,
                export_dir,
            } => {
                assert_eq!(trace_ids, vec!["a", "b"]);
                assert_eq!(export_dir, Some(PathBuf::from("/tmp/out")));
            }
            other => panic!("unexpected command {:?}", other),
        }
    }
}
