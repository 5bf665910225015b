//! Presentation packages: sequential fetch, card rendering and plain-text
//! export.

use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use explorer_core::models::{PackageFailure, PackageOutcome, PresentationPackage};

use crate::api::ApiClient;
use crate::format::{escape, linkify};

/// Shown when no WRI programmatic work was found for a trace.
pub const WRI_NOT_FOUND: &str =
    "No direct WRI program connection was found for this conversation.";

/// Fetch one package per id, strictly one after another. A failed fetch is
/// recorded as a [`PackageFailure`] and the loop moves on.
pub async fn assemble_packages<C, F>(
    client: &C,
    trace_ids: &[String],
    mut progress: F,
) -> Vec<PackageOutcome>
where
    C: ApiClient + ?Sized,
    F: FnMut(usize, usize, &str),
{
    let total = trace_ids.len();
    let mut results = Vec::with_capacity(total);

    for (i, trace_id) in trace_ids.iter().enumerate() {
        progress(i + 1, total, trace_id);
        match client.presentation_package(trace_id).await {
            Ok(package) => results.push(PackageOutcome::Ready(package)),
            Err(e) => {
                tracing::error!(trace_id = %trace_id, error = %e, "Error generating package");
                results.push(PackageOutcome::Failed(PackageFailure {
                    error: e.to_string(),
                    trace_id: trace_id.clone(),
                }));
            }
        }
    }

    results
}

fn list_html(class: &str, title: &str, items: &[String]) -> String {
    if items.is_empty() {
        return String::new();
    }
    let mut html = format!(r#"<div class="{}"><h5>{}</h5><ul>"#, class, title);
    for item in items {
        html.push_str(&format!("<li>{}</li>", escape(item)));
    }
    html.push_str("</ul></div>");
    html
}

/// Anchor for a model-supplied address. Only `http(s)` targets become links;
/// anything else is shown as text.
fn source_link(url: &str, title: &str) -> String {
    let trimmed = url.trim();
    let scheme = trimmed.get(..8).unwrap_or(trimmed).to_ascii_lowercase();
    if scheme.starts_with("http://") || scheme.starts_with("https://") {
        format!(
            r#"<a href="{}" target="_blank" rel="noopener noreferrer">{}</a>"#,
            escape(trimmed),
            escape(title)
        )
    } else {
        format!(r#"<span class="source-text">{}</span>"#, escape(title))
    }
}

/// Markup for one package result. `index` keys error cards and copy buttons.
pub fn render_package_card(index: usize, outcome: &PackageOutcome) -> String {
    let package = match outcome {
        PackageOutcome::Failed(failure) => {
            return format!(
                r#"<div class="package-card package-error" data-index="{}"><h3>Package {} failed</h3><p class="error">{}</p><p class="trace-ref">Trace {}</p></div>"#,
                index,
                index + 1,
                escape(&failure.error),
                escape(&failure.trace_id)
            );
        }
        PackageOutcome::Ready(package) => package,
    };

    let mut html = format!(
        r#"<div class="package-card" data-index="{}" data-trace-id="{}">"#,
        index,
        escape(&package.trace_id)
    );
    html.push_str(&format!(
        r#"<div class="package-header"><h3>Package {}</h3><button class="export-btn" data-action="export-package" data-index="{}">Export as text</button></div>"#,
        index + 1,
        index
    ));

    if let Some(region) = package.region.as_ref().filter(|r| !r.is_empty()) {
        html.push_str(r#"<div class="package-region">"#);
        if let Some(place) = region.place() {
            html.push_str(&format!(r#"<span class="region-place">{}</span>"#, escape(&place)));
        }
        if let Some(coords) = &region.coordinates {
            html.push_str(&format!(r#"<span class="region-coords">{}</span>"#, escape(coords)));
        }
        for topic in &region.topics {
            html.push_str(&format!(r#"<span class="topic-tag">{}</span>"#, escape(topic)));
        }
        html.push_str("</div>");
    }

    if let Some(summary) = &package.summary {
        html.push_str(&format!(r#"<p class="package-summary">{}</p>"#, escape(summary)));
    }

    if !package.demo_prompts.is_empty() {
        html.push_str(r#"<div class="demo-prompts"><h4>Demo prompts</h4><ol>"#);
        for (i, prompt) in package.demo_prompts.iter().enumerate() {
            html.push_str(&format!(
                r#"<li><span class="prompt-text">{}</span><button class="copy-btn" data-action="copy-prompt" data-index="{}" data-prompt="{}">Copy</button></li>"#,
                escape(prompt),
                i,
                escape(prompt)
            ));
        }
        html.push_str("</ol></div>");
    }

    if let Some(context) = &package.regional_context {
        html.push_str(r#"<div class="regional-context"><h4>Regional context</h4>"#);
        if let Some(background) = &context.background {
            html.push_str(&format!("<p>{}</p>", escape(background)));
        }
        html.push_str(&list_html("recent-events", "Recent events", &context.recent_events));
        if let Some(url) = &context.source_url {
            let title = context.source_title.as_deref().unwrap_or(url);
            html.push_str(&format!(
                r#"<p class="source">Source: {}</p>"#,
                source_link(url, title)
            ));
        }
        html.push_str("</div>");
    }

    html.push_str(r#"<div class="wri-connection"><h4>WRI connection</h4>"#);
    match package.wri_connection.as_ref().filter(|w| w.found) {
        Some(wri) => {
            if let Some(program) = &wri.program {
                html.push_str(&format!(r#"<p class="wri-program">{}</p>"#, escape(program)));
            }
            if let Some(summary) = &wri.summary {
                html.push_str(&format!("<p>{}</p>", linkify(summary)));
            }
            if let Some(url) = &wri.url {
                let title = wri.title.as_deref().unwrap_or(url);
                html.push_str(&format!(
                    r#"<p class="source">{}{}</p>"#,
                    source_link(url, title),
                    wri.source
                        .as_deref()
                        .map(|s| format!(" ({})", escape(s)))
                        .unwrap_or_default()
                ));
            }
        }
        None => html.push_str(&format!(r#"<p class="not-found">{}</p>"#, WRI_NOT_FOUND)),
    }
    html.push_str("</div>");

    if let Some(caps) = &package.capabilities {
        html.push_str(r#"<div class="capabilities"><h4>Capabilities</h4>"#);
        html.push_str(&list_html("data-sources", "Data sources", &caps.data_sources));
        html.push_str(&list_html("analyses", "Analyses", &caps.analyses));
        html.push_str(&list_html("insights", "Insights", &caps.insights));
        html.push_str(&list_html("limitations", "Limitations", &caps.limitations));
        html.push_str("</div>");
    }

    if let Some(angle) = &package.presentation_angle {
        html.push_str(r#"<div class="presentation-angle"><h4>Presentation angle</h4>"#);
        for audience in &angle.audiences {
            html.push_str(&format!(r#"<span class="audience-tag">{}</span>"#, escape(audience)));
        }
        if let Some(story) = &angle.story {
            html.push_str(&format!(r#"<p class="story">{}</p>"#, escape(story)));
        }
        html.push_str(&list_html("key-messages", "Key messages", &angle.key_messages));
        html.push_str(&list_html(
            "follow-up",
            "Follow-up questions",
            &angle.follow_up_questions,
        ));
        html.push_str("</div>");
    }

    html.push_str("</div>");
    html
}

// ============================================================================
// Plain-text export
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct ExportFile {
    pub filename: String,
    pub contents: String,
}

impl ExportFile {
    /// Write into `dir`, returning the full path.
    pub fn write_to(&self, dir: &Path) -> std::io::Result<PathBuf> {
        let path = dir.join(&self.filename);
        std::fs::write(&path, &self.contents)?;
        Ok(path)
    }
}

fn section(out: &mut String, title: &str) {
    let _ = writeln!(out, "\n{}\n{}", title, "-".repeat(title.len()));
}

fn bullets(out: &mut String, items: &[String]) {
    for item in items {
        let _ = writeln!(out, "- {}", item);
    }
}

/// Render one package as text. Sections appear in card order and are
/// skipped when absent, so the same package always exports the same bytes.
pub fn export_text(package: &PresentationPackage) -> ExportFile {
    let short: String = package.trace_id.chars().take(8).collect();
    let mut out = String::new();

    let _ = writeln!(out, "PRESENTATION PACKAGE");
    let _ = writeln!(out, "Trace: {}", package.trace_id);

    if let Some(region) = package.region.as_ref().filter(|r| !r.is_empty()) {
        section(&mut out, "REGION");
        if let Some(country) = &region.country {
            let _ = writeln!(out, "Country: {}", country);
        }
        if let Some(area) = &region.area {
            let _ = writeln!(out, "Area: {}", area);
        }
        if let Some(coords) = &region.coordinates {
            let _ = writeln!(out, "Coordinates: {}", coords);
        }
        if !region.topics.is_empty() {
            let _ = writeln!(out, "Topics: {}", region.topics.join(", "));
        }
    }

    if let Some(summary) = &package.summary {
        section(&mut out, "SUMMARY");
        let _ = writeln!(out, "{}", summary);
    }

    if !package.demo_prompts.is_empty() {
        section(&mut out, "DEMO PROMPTS");
        for (i, prompt) in package.demo_prompts.iter().enumerate() {
            let _ = writeln!(out, "{}. {}", i + 1, prompt);
        }
    }

    if let Some(context) = &package.regional_context {
        section(&mut out, "REGIONAL CONTEXT");
        if let Some(background) = &context.background {
            let _ = writeln!(out, "{}", background);
        }
        if !context.recent_events.is_empty() {
            let _ = writeln!(out, "Recent events:");
            bullets(&mut out, &context.recent_events);
        }
        if let Some(url) = &context.source_url {
            match &context.source_title {
                Some(title) => {
                    let _ = writeln!(out, "Source: {} ({})", title, url);
                }
                None => {
                    let _ = writeln!(out, "Source: {}", url);
                }
            }
        }
    }

    section(&mut out, "WRI CONNECTION");
    match package.wri_connection.as_ref().filter(|w| w.found) {
        Some(wri) => {
            if let Some(program) = &wri.program {
                let _ = writeln!(out, "Program: {}", program);
            }
            if let Some(summary) = &wri.summary {
                let _ = writeln!(out, "{}", summary);
            }
            if let Some(url) = &wri.url {
                let _ = writeln!(
                    out,
                    "Link: {}{}",
                    url,
                    wri.source
                        .as_deref()
                        .map(|s| format!(" ({})", s))
                        .unwrap_or_default()
                );
            }
        }
        None => {
            let _ = writeln!(out, "{}", WRI_NOT_FOUND);
        }
    }

    if let Some(caps) = &package.capabilities {
        section(&mut out, "CAPABILITIES");
        for (title, items) in [
            ("Data sources", &caps.data_sources),
            ("Analyses", &caps.analyses),
            ("Insights", &caps.insights),
            ("Limitations", &caps.limitations),
        ] {
            if !items.is_empty() {
                let _ = writeln!(out, "{}:", title);
                bullets(&mut out, items);
            }
        }
    }

    if let Some(angle) = &package.presentation_angle {
        section(&mut out, "PRESENTATION ANGLE");
        if !angle.audiences.is_empty() {
            let _ = writeln!(out, "Audiences: {}", angle.audiences.join(", "));
        }
        if let Some(story) = &angle.story {
            let _ = writeln!(out, "Story: {}", story);
        }
        if !angle.key_messages.is_empty() {
            let _ = writeln!(out, "Key messages:");
            for (i, msg) in angle.key_messages.iter().enumerate() {
                let _ = writeln!(out, "{}. {}", i + 1, msg);
            }
        }
        if !angle.follow_up_questions.is_empty() {
            let _ = writeln!(out, "Follow-up questions:");
            bullets(&mut out, &angle.follow_up_questions);
        }
    }

    ExportFile {
        filename: format!("presentation-package-{}.txt", short),
        contents: out,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use explorer_core::models::{Capabilities, Region, RegionalContext, WriConnection};

    fn package() -> PresentationPackage {
        PresentationPackage {
            trace_id: "9f8e7d6c5b4a".to_string(),
            region: Some(Region {
                country: Some("Indonesia".to_string()),
                area: Some("Riau".to_string()),
                coordinates: None,
                topics: vec!["peat fires".to_string()],
            }),
            summary: Some("Peat fire <alerts> in Riau.".to_string()),
            demo_prompts: vec![
                "Show fire alerts in Riau".to_string(),
                "Compare 2019 and 2023".to_string(),
            ],
            capabilities: Some(Capabilities {
                data_sources: vec!["VIIRS alerts".to_string()],
                limitations: vec!["Cloud cover".to_string()],
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    #[test]
    fn test_export_is_deterministic_and_named_by_short_id() {
        let pkg = package();
        let first = export_text(&pkg);
        let second = export_text(&pkg);
        assert_eq!(first, second);
        assert_eq!(first.filename, "presentation-package-9f8e7d6c.txt");

        let text = &first.contents;
        let region = text.find("REGION").unwrap();
        let summary = text.find("SUMMARY").unwrap();
        let prompts = text.find("DEMO PROMPTS").unwrap();
        let wri = text.find("WRI CONNECTION").unwrap();
        let caps = text.find("CAPABILITIES").unwrap();
        assert!(region < summary && summary < prompts && prompts < wri && wri < caps);
        assert!(text.contains("2. Compare 2019 and 2023"));
        assert!(text.contains(WRI_NOT_FOUND));
        assert!(!text.contains("Analyses:"));
    }

    #[test]
    fn test_card_escapes_and_shows_not_found_sentence() {
        let html = render_package_card(0, &PackageOutcome::Ready(package()));
        assert!(html.contains("Peat fire &lt;alerts&gt; in Riau."));
        assert!(html.contains("Riau, Indonesia"));
        assert!(html.contains(WRI_NOT_FOUND));
        assert!(html.contains(r#"data-action="copy-prompt" data-index="1""#));
        assert!(html.contains("Limitations"));
        assert!(!html.contains("Insights"));
    }

    #[test]
    fn test_card_with_wri_evidence() {
        let mut pkg = package();
        pkg.wri_connection = Some(WriConnection {
            found: true,
            program: Some("Global Restoration Initiative".to_string()),
            url: Some("https://www.wri.org/initiatives/restoration".to_string()),
            source: Some("WRI".to_string()),
            ..Default::default()
        });
        let html = render_package_card(2, &PackageOutcome::Ready(pkg));
        assert!(!html.contains(WRI_NOT_FOUND));
        assert!(html.contains("Global Restoration Initiative"));
        assert!(html.contains(r#"href="https://www.wri.org/initiatives/restoration""#));
    }

    #[test]
    fn test_non_http_addresses_are_not_linked() {
        let mut pkg = package();
        pkg.wri_connection = Some(WriConnection {
            found: true,
            url: Some("javascript:alert(document.cookie)".to_string()),
            ..Default::default()
        });
        pkg.regional_context = Some(RegionalContext {
            source_url: Some("JavaScript:void(0)".to_string()),
            source_title: Some("Riau fire report".to_string()),
            ..Default::default()
        });
        let html = render_package_card(0, &PackageOutcome::Ready(pkg));
        assert!(!html.to_lowercase().contains("href=\"javascript:"));
        assert!(html.contains(r#"<span class="source-text">Riau fire report</span>"#));

        let mut pkg = package();
        pkg.regional_context = Some(RegionalContext {
            source_url: Some("HTTPS://reliefweb.int/report".to_string()),
            ..Default::default()
        });
        let html = render_package_card(0, &PackageOutcome::Ready(pkg));
        assert!(html.contains(r#"href="HTTPS://reliefweb.int/report""#));
    }

    #[test]
    fn test_error_card_keyed_by_index() {
        let outcome = PackageOutcome::Failed(PackageFailure {
            error: "Request failed: timeout".to_string(),
            trace_id: "abc".to_string(),
        });
        let html = render_package_card(1, &outcome);
        assert!(html.contains(r#"class="package-card package-error" data-index="1""#));
        assert!(html.contains("Request failed: timeout"));
    }

    #[test]
    fn test_export_write_to_dir() {
        let dir = tempfile::tempdir().unwrap();
        let file = export_text(&package());
        let path = file.write_to(dir.path()).unwrap();
        assert_eq!(std::fs::read_to_string(path).unwrap(), file.contents);
    }
}
