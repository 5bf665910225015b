//! Text formatting for rendered output: escaping, link detection and
//! timestamps.
//!
//! Everything that ends up in a rendered document goes through [`escape`]
//! or [`linkify`]. `escape` leaves the five entities it produces untouched,
//! so escaping already-escaped text is a no-op.

use std::sync::OnceLock;

use chrono::{DateTime, Utc};
use regex::{Captures, Regex};

const ENTITIES: [&str; 5] = ["&amp;", "&lt;", "&gt;", "&quot;", "&#39;"];

/// Neutralize `& < > " '` for embedding in markup.
pub fn escape(text: &str) -> String {
    if text.is_empty() {
        return String::new();
    }

    let mut out = String::with_capacity(text.len() + text.len() / 8);
    for (i, ch) in text.char_indices() {
        match ch {
            '&' if ENTITIES.iter().any(|e| text[i..].starts_with(e)) => out.push('&'),
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(ch),
        }
    }
    out
}

/// Absolute URLs, or bare paths on the WRI family of domains. Runs on
/// escaped text: `&amp;` may appear inside a URL, any other entity ends it.
fn link_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| {
            Regex::new(
                r#"(?i)(?:https?://(?:[^\s&<>"']|&amp;)+|\b(?:www\.)?(?:wri|globalforestwatch|globalnaturewatch)\.org(?:/(?:[^\s&<>"']|&amp;)*)?)"#,
            )
            .ok()
        })
        .as_ref()
}

const TRAILING_PUNCTUATION: &[char] = &['.', ',', ';', ':', '!', '?', ')'];

/// Escape `text`, then turn URLs into links that open in a new tab and do
/// not trigger the enclosing card's click handler.
pub fn linkify(text: &str) -> String {
    let escaped = escape(text);
    let Some(pattern) = link_pattern() else {
        return escaped;
    };

    pattern
        .replace_all(&escaped, |caps: &Captures| {
            let matched = &caps[0];
            let url = matched.trim_end_matches(TRAILING_PUNCTUATION);
            let trailing = &matched[url.len()..];
            if url.is_empty() {
                return matched.to_string();
            }

            let lower = url.to_ascii_lowercase();
            let href = if lower.starts_with("http://") || lower.starts_with("https://") {
                url.to_string()
            } else {
                format!("https://{}", url)
            };

            format!(
                r#"<a href="{href}" target="_blank" rel="noopener noreferrer" onclick="event.stopPropagation()">{url}</a>{trailing}"#
            )
        })
        .into_owned()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimestampStyle {
    /// `Jan 20, 08:05 AM`
    Short,
    /// `Monday, January 20, 2025 at 08:05 AM`
    Long,
}

pub fn format_timestamp(ts: &DateTime<Utc>, style: TimestampStyle) -> String {
    match style {
        TimestampStyle::Short => ts.format("%b %-d, %I:%M %p").to_string(),
        TimestampStyle::Long => ts.format("%A, %B %-d, %Y at %I:%M %p").to_string(),
    }
}
