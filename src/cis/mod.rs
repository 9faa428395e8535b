//! CIS recommendation registry
//!
//! Static metadata for the CIS Google Cloud Platform Foundation
//! benchmark recommendations. The tables are embedded JSON files
//! (one per benchmark section) loaded once into a process-wide
//! registry; checks reference recommendations by their dotted id.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::OnceLock;

/// Embedded recommendation tables (compiled into the binary)
const RECOMMENDATION_FILES: &[&str] = &[
    include_str!("data/iam.json"),
    include_str!("data/logging.json"),
    include_str!("data/network.json"),
    include_str!("data/compute.json"),
    include_str!("data/storage.json"),
    include_str!("data/sql.json"),
    include_str!("data/gke.json"),
];

/// A CIS recommendation for GCP
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Recommendation {
    /// The name of the CIS recommendation
    pub name: String,

    /// The CIS identifier, formatted as a major-minor string (e.g. "1.12")
    #[serde(rename = "cisId")]
    pub id: String,

    /// Whether compliance with the recommendation counts toward the
    /// overall compliance score of the resource
    pub scored: bool,

    /// The CIS level (1 = baseline, 2 = hardened)
    pub level: u8,
}

impl Recommendation {
    /// The fully formatted CIS descriptive name, used as a Control title
    pub fn format(&self) -> String {
        let score = if self.scored { "Scored" } else { "Not Scored" };
        format!("CIS {} - {} ({})", self.id, self.name, score)
    }
}

static REGISTRY: OnceLock<HashMap<String, Recommendation>> = OnceLock::new();

/// Get the recommendation registry (loads from embedded JSON on first access)
pub fn registry() -> &'static HashMap<String, Recommendation> {
    REGISTRY.get_or_init(|| {
        let mut registry = HashMap::new();

        for content in RECOMMENDATION_FILES {
            let table: Vec<Recommendation> = serde_json::from_str(content)
                .unwrap_or_else(|e| panic!("Failed to parse embedded recommendation JSON: {}", e));

            for rec in table {
                registry.insert(rec.id.clone(), rec);
            }
        }

        registry
    })
}

/// Look up a recommendation by its CIS id.
///
/// An unknown id is a programming error in a check definition, and the
/// resulting error is fatal to the run.
pub fn lookup(id: &str) -> Result<&'static Recommendation> {
    registry()
        .get(id)
        .ok_or_else(|| anyhow::anyhow!("Couldn't find CIS recommendation with ID '{id}'"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_loads_successfully() {
        let registry = registry();
        assert!(
            !registry.is_empty(),
            "Registry should have recommendations"
        );
    }

    #[test]
    fn test_lookup_returns_matching_id() {
        for id in ["1.1", "2.2", "3.6", "4.4", "5.1", "6.1", "7.18"] {
            let rec = lookup(id).expect("known id");
            assert_eq!(rec.id, id);
        }
    }

    #[test]
    fn test_lookup_unknown_id_is_an_error() {
        assert!(lookup("99.99").is_err());
    }

    #[test]
    fn test_format_includes_scoring_state() {
        let rec = lookup("4.2").unwrap();
        assert!(!rec.scored);
        assert_eq!(
            rec.format(),
            format!("CIS 4.2 - {} (Not Scored)", rec.name)
        );

        let rec = lookup("4.1").unwrap();
        assert!(rec.scored);
        assert!(rec.format().ends_with("(Scored)"));
    }

    #[test]
    fn test_section_counts() {
        let registry = registry();
        let count = |major: &str| {
            registry
                .keys()
                .filter(|id| id.starts_with(major))
                .count()
        };
        assert_eq!(count("1."), 13);
        assert_eq!(count("2."), 11);
        assert_eq!(count("3."), 9);
        assert_eq!(count("4."), 6);
        assert_eq!(count("5."), 3);
        assert_eq!(count("6."), 4);
        assert_eq!(count("7."), 18);
    }
}
