//! Search-grounded evidence of WRI programmatic work.
//!
//! Used by the WRI connections analysis and by presentation packages. The
//! model is asked for a JSON verdict, but URLs from the grounding metadata
//! take precedence over anything the model typed itself.

use explorer_core::models::WriConnection;
use explorer_core::{parse_json_reply, LlmBackend};

const DEFAULT_PROGRAMS: &str =
    "AFR100, Initiative 20x20, Forest Legality Initiative, Restoration programs";

pub fn evidence_prompt(topic: &str, region: &str, program: Option<&str>) -> String {
    let programs = program.filter(|p| !p.trim().is_empty()).unwrap_or(DEFAULT_PROGRAMS);
    format!(
        r#"Find an article, news story, blog post, report, or publication that discusses World Resources Institute (WRI) programmatic work related to: {topic} in {region}

Focus on finding content about WRI's:
- Strategic initiatives and programs (not just data tools)
- Partnerships with governments, companies, NGOs, or communities
- Policy work and advocacy
- Field projects and on-the-ground impact
- Country or regional programs
- Named initiatives like: {programs}

Search broadly - content can be from WRI's website, news outlets covering WRI's work, partner organization websites, government announcements, academic publications, or NGO reports.

DO NOT prioritize Global Forest Watch technical documentation. We want stories about WRI's programmatic impact.

Return ONLY a JSON object with:
- "found": true/false
- "url": the exact URL if found (or null)
- "title": the article/page title if found (or null)
- "source": where this was published (e.g., "WRI Insights", "Reuters", "partner NGO")
- "summary": one sentence about what WRI is doing related to this topic

Only return URLs from the search results. If you cannot find relevant content about WRI's programmatic work, set found to false."#
    )
}

/// Look for published evidence of WRI work on `topic`. Never fails: any
/// error is logged and reported as "not found".
pub async fn search_wri_evidence(
    llm: &dyn LlmBackend,
    topic: &str,
    region: &str,
    program: Option<&str>,
) -> WriConnection {
    let prompt = evidence_prompt(topic, region, program);

    let reply = match llm.generate_grounded(&prompt).await {
        Ok(reply) => reply,
        Err(e) => {
            tracing::warn!(topic, region, error = %e, "WRI evidence search failed");
            return WriConnection::default();
        }
    };

    let mut evidence: WriConnection = match parse_json_reply(&reply.text) {
        Ok(parsed) => parsed,
        Err(e) => {
            tracing::warn!(topic, error = %e, "WRI evidence reply was not JSON");
            WriConnection::default()
        }
    };

    if let Some(source) = reply.sources.into_iter().next() {
        evidence.url = Some(source.uri);
        evidence.found = true;
        if source.title.is_some() {
            evidence.title = source.title;
        }
    }

    if evidence.program.is_none() {
        evidence.program = program.filter(|p| !p.trim().is_empty()).map(str::to_string);
    }

    evidence
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedLlm;

    #[tokio::test]
    async fn test_grounding_url_overrides_model_text() {
        let llm = ScriptedLlm::new().grounded(
            r#"{"found": false, "url": null, "source": "WRI Insights", "summary": "Restoration in Kenya"}"#,
            Some("https://www.wri.org/insights/kenya-restoration"),
        );

        let evidence = search_wri_evidence(&llm, "restoration", "Kenya", Some("AFR100")).await;
        assert!(evidence.found);
        assert_eq!(
            evidence.url.as_deref(),
            Some("https://www.wri.org/insights/kenya-restoration")
        );
        assert_eq!(evidence.title.as_deref(), Some("Grounded source"));
        assert_eq!(evidence.source.as_deref(), Some("WRI Insights"));
        assert_eq!(evidence.program.as_deref(), Some("AFR100"));
    }

    #[tokio::test]
    async fn test_failure_reports_not_found() {
        let llm = ScriptedLlm::new().grounded_fail("quota exceeded");
        let evidence = search_wri_evidence(&llm, "palm oil", "Indonesia", None).await;
        assert!(!evidence.found);
        assert!(evidence.url.is_none());
    }

    #[test]
    fn test_prompt_falls_back_to_default_programs() {
        let prompt = evidence_prompt("peatland", "Indonesia", Some("  "));
        assert!(prompt.contains("peatland in Indonesia"));
        assert!(prompt.contains(DEFAULT_PROGRAMS));
    }
}
