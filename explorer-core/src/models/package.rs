//! Presentation packages: multi-section briefings assembled per trace for
//! demos. Every section is optional on the wire.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Region {
    pub country: Option<String>,
    pub area: Option<String>,
    pub coordinates: Option<String>,
    pub topics: Vec<String>,
}

impl Region {
    pub fn is_empty(&self) -> bool {
        self.country.is_none()
            && self.area.is_none()
            && self.coordinates.is_none()
            && self.topics.is_empty()
    }

    /// "area, country" with whichever parts are known.
    pub fn place(&self) -> Option<String> {
        let parts: Vec<&str> = [self.area.as_deref(), self.country.as_deref()]
            .into_iter()
            .flatten()
            .filter(|p| !p.trim().is_empty())
            .collect();
        if parts.is_empty() {
            None
        } else {
            Some(parts.join(", "))
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RegionalContext {
    pub background: Option<String>,
    pub recent_events: Vec<String>,
    pub source_url: Option<String>,
    pub source_title: Option<String>,
}

/// Evidence of WRI programmatic work related to a trace.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct WriConnection {
    pub found: bool,
    pub program: Option<String>,
    pub title: Option<String>,
    pub url: Option<String>,
    pub source: Option<String>,
    pub summary: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Capabilities {
    pub data_sources: Vec<String>,
    pub analyses: Vec<String>,
    pub insights: Vec<String>,
    pub limitations: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PresentationAngle {
    pub audiences: Vec<String>,
    pub story: Option<String>,
    pub key_messages: Vec<String>,
    pub follow_up_questions: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PresentationPackage {
    pub trace_id: String,
    pub region: Option<Region>,
    pub summary: Option<String>,
    pub demo_prompts: Vec<String>,
    pub regional_context: Option<RegionalContext>,
    pub wri_connection: Option<WriConnection>,
    pub capabilities: Option<Capabilities>,
    pub presentation_angle: Option<PresentationAngle>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PackageFailure {
    pub error: String,
    #[serde(default)]
    pub trace_id: String,
}

/// Result of fetching one package. `Failed` is listed first so that an
/// `{error, trace_id}` record is never mistaken for an empty package.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PackageOutcome {
    Failed(PackageFailure),
    Ready(PresentationPackage),
}

impl PackageOutcome {
    pub fn trace_id(&self) -> &str {
        match self {
            PackageOutcome::Failed(f) => &f.trace_id,
            PackageOutcome::Ready(p) => &p.trace_id,
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, PackageOutcome::Failed(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outcome_distinguishes_error_records() {
        let failed: PackageOutcome =
            serde_json::from_str(r#"{"error":"timeout","trace_id":"abc"}"#).unwrap();
        assert!(failed.is_failed());
        assert_eq!(failed.trace_id(), "abc");

        let bare: PackageOutcome = serde_json::from_str(r#"{"error":"quota exceeded"}"#).unwrap();
        assert!(bare.is_failed());

        let ready: PackageOutcome =
            serde_json::from_str(r#"{"trace_id":"abc","summary":"Fires in Pará"}"#).unwrap();
        match ready {
            PackageOutcome::Ready(pkg) => assert_eq!(pkg.summary.as_deref(), Some("Fires in Pará")),
            PackageOutcome::Failed(_) => panic!("expected a package"),
        }
    }

    #[test]
    fn test_region_place() {
        let region = Region {
            country: Some("Brazil".to_string()),
            area: Some("Pará".to_string()),
            ..Default::default()
        };
        assert_eq!(region.place().as_deref(), Some("Pará, Brazil"));
        assert_eq!(Region::default().place(), None);
        assert!(Region::default().is_empty());
    }
}
