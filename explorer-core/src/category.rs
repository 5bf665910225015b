//! The five fixed interest categories traces are scored against.
//!
//! Declaration order is the canonical order: it drives the analysis run, the
//! default badge order and `/api/analysis-status`.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ExplorerError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Showcase,
    ProductFeatures,
    ResearchAreas,
    DatasetPriorities,
    WriConnections,
}

impl Category {
    pub const ALL: [Category; 5] = [
        Category::Showcase,
        Category::ProductFeatures,
        Category::ResearchAreas,
        Category::DatasetPriorities,
        Category::WriConnections,
    ];

    /// Wire key, e.g. `product_features`.
    pub fn key(self) -> &'static str {
        match self {
            Category::Showcase => "showcase",
            Category::ProductFeatures => "product_features",
            Category::ResearchAreas => "research_areas",
            Category::DatasetPriorities => "dataset_priorities",
            Category::WriConnections => "wri_connections",
        }
    }

    /// Full display name used for titles and the analysis list.
    pub fn name(self) -> &'static str {
        match self {
            Category::Showcase => "Showcase",
            Category::ProductFeatures => "Product Features",
            Category::ResearchAreas => "Research Areas",
            Category::DatasetPriorities => "Dataset Priorities",
            Category::WriConnections => "WRI Programs",
        }
    }

    /// Short label printed on score badges.
    pub fn badge_label(self) -> &'static str {
        match self {
            Category::Showcase => "Showcase",
            Category::ProductFeatures => "Features",
            Category::ResearchAreas => "Research",
            Category::DatasetPriorities => "Data",
            Category::WriConnections => "WRI",
        }
    }

    /// Lower-case phrase used inside the interest summary sentence.
    pub fn interest_phrase(self) -> &'static str {
        match self {
            Category::Showcase => "showcase",
            Category::ProductFeatures => "product features",
            Category::ResearchAreas => "research",
            Category::DatasetPriorities => "dataset priorities",
            Category::WriConnections => "WRI programs",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            Category::Showcase => {
                "Most impressive demos that show GNW's power for land decisions"
            }
            Category::ProductFeatures => {
                "Conversations suggesting new product features or improvements"
            }
            Category::ResearchAreas => {
                "Conversations indicating new research directions or scientific questions"
            }
            Category::DatasetPriorities => {
                "Conversations highlighting needs for new or improved datasets"
            }
            Category::WriConnections => {
                "Connections to WRI's strategic programs, partnerships, policy work, and field initiatives"
            }
        }
    }

    /// What the model should look for when scoring this category.
    pub fn prompt_hint(self) -> &'static str {
        match self {
            Category::Showcase => {
                "conversations where GNW delivers incredible value - providing actionable insights about \
                 deforestation, land use, conservation that would make any audience say \"wow, this is \
                 powerful\". Look for: specific data delivered, clear actionable insights, complex \
                 questions answered simply, real-world impact potential, impressive scope of analysis"
            }
            Category::ProductFeatures => {
                "user requests for features, pain points, usability issues, feature suggestions"
            }
            Category::ResearchAreas => {
                "novel scientific questions, research gaps, methodology discussions, data analysis needs"
            }
            Category::DatasetPriorities => {
                "requests for data not available, data quality issues, geographic gaps, temporal coverage needs"
            }
            Category::WriConnections => {
                "connections to WRI programs, government/corporate/NGO partnerships, policy initiatives, \
                 restoration projects, and published stories about impact"
            }
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl FromStr for Category {
    type Err = ExplorerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Category::ALL
            .into_iter()
            .find(|c| c.key() == s)
            .ok_or_else(|| ExplorerError::UnknownCategory(s.to_string()))
    }
}

/// Derived score classification used for badge colouring.
/// Model scores may arrive as floats or outside 0–100.
pub fn clamp_score(raw: f64) -> u8 {
    if raw.is_nan() {
        return 0;
    }
    raw.round().clamp(0.0, 100.0) as u8
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    High,
    Medium,
    Low,
}

impl Tier {
    pub fn from_score(score: u8) -> Self {
        match score {
            70.. => Tier::High,
            40..=69 => Tier::Medium,
            _ => Tier::Low,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Tier::High => "high",
            Tier::Medium => "medium",
            Tier::Low => "low",
        }
    }
}
