//! Ontology Lookup
//!
//! Maps a free-text query and a category to a short list of domain terms that
//! agents quote back to the reasoning engine. The table is read-only and is
//! loaded once per process.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use tokio::fs;

use crate::error::ConfigError;

/// Maximum number of terms returned by a lookup.
pub const TOP_K: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OntologyCategory {
    Metaphors,
    EmotionalBiomarkers,
    RiskIndicators,
}

impl OntologyCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            OntologyCategory::Metaphors => "metaphors",
            OntologyCategory::EmotionalBiomarkers => "emotional_biomarkers",
            OntologyCategory::RiskIndicators => "risk_indicators",
        }
    }
}

impl std::fmt::Display for OntologyCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Pure lookup over a domain vocabulary.
pub trait OntologyLookup: Send + Sync {
    /// Return at most [`TOP_K`] candidate terms for `query` in `category`.
    fn lookup(&self, query: &str, category: OntologyCategory) -> Vec<String>;
}

/// One row of the table: a `/`-separated alias key and the terms it maps to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OntologyEntry {
    pub key: String,
    pub terms: Vec<String>,
}

impl OntologyEntry {
    fn new(key: &str, terms: &[&str]) -> Self {
        Self {
            key: key.to_string(),
            terms: terms.iter().map(|t| t.to_string()).collect(),
        }
    }

    fn matches(&self, query_lower: &str) -> bool {
        self.key
            .split('/')
            .map(str::trim)
            .filter(|alias| !alias.is_empty())
            .any(|alias| query_lower.contains(&alias.to_lowercase()))
    }
}

/// In-process ontology table.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LocalOntology {
    categories: HashMap<OntologyCategory, Vec<OntologyEntry>>,
}

impl LocalOntology {
    pub fn new(categories: HashMap<OntologyCategory, Vec<OntologyEntry>>) -> Self {
        Self { categories }
    }

    /// Built-in vocabulary used when no ontology file is configured.
    pub fn builtin() -> Self {
        let mut categories = HashMap::new();

        categories.insert(
            OntologyCategory::Metaphors,
            vec![
                OntologyEntry::new("pressure/tightness", &["tension", "cephalalgia", "pressure sensation", "constriction"]),
                OntologyEntry::new("hollow/empty", &["palpitations", "chest discomfort", "sensation of emptiness"]),
                OntologyEntry::new("burning", &["dyspepsia", "gastroesophageal reflux", "burning sensation"]),
                OntologyEntry::new("sharp/stabbing", &["acute pain", "sharp pain", "stabbing sensation"]),
                OntologyEntry::new("dull/aching", &["chronic pain", "dull ache", "persistent discomfort"]),
                OntologyEntry::new("fluttering", &["palpitations", "arrhythmia", "irregular heartbeat"]),
                OntologyEntry::new("snapping/breaking", &["acute exacerbation", "sudden onset", "acute episode"]),
                OntologyEntry::new("weight/heaviness", &["chest heaviness", "dyspnea", "respiratory distress"]),
                OntologyEntry::new("foggy/cloudy", &["cognitive impairment", "mental fog", "confusion"]),
                OntologyEntry::new("racing", &["tachycardia", "anxiety", "hyperarousal"]),
            ],
        );

        categories.insert(
            OntologyCategory::EmotionalBiomarkers,
            vec![
                OntologyEntry::new("fear", &["anxiety-related distress", "apprehension", "fearful affect"]),
                OntologyEntry::new("panic", &["acute anxiety", "panic-like symptoms", "severe distress"]),
                OntologyEntry::new("sadness", &["low mood", "depressed affect", "dysphoria"]),
                OntologyEntry::new("anger", &["irritability", "agitation", "hostile affect"]),
                OntologyEntry::new("confusion", &["cognitive disorientation", "mental confusion", "altered mental status"]),
                OntologyEntry::new("helplessness", &["sense of powerlessness", "vulnerability", "loss of control"]),
            ],
        );

        categories.insert(
            OntologyCategory::RiskIndicators,
            vec![
                OntologyEntry::new("high", &["chest pain", "shortness of breath", "loss of consciousness", "severe pain", "trauma", "bleeding"]),
                OntologyEntry::new("moderate", &["persistent symptoms", "worsening condition", "functional impairment"]),
                OntologyEntry::new("low", &["mild symptoms", "stable condition", "chronic well-managed"]),
            ],
        );

        Self { categories }
    }

    /// Load a table from a JSON file shaped like
    /// `{"metaphors": [{"key": "burning", "terms": ["..."]}], ...}`.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).await.map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        let categories = serde_json::from_str(&content)?;
        Ok(Self { categories })
    }

    pub fn entries(&self, category: OntologyCategory) -> &[OntologyEntry] {
        self.categories
            .get(&category)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }
}

impl OntologyLookup for LocalOntology {
    fn lookup(&self, query: &str, category: OntologyCategory) -> Vec<String> {
        let query_lower = query.to_lowercase();
        let mut matches: Vec<String> = Vec::new();

        for entry in self.entries(category) {
            if !entry.matches(&query_lower) {
                continue;
            }
            for term in &entry.terms {
                if !matches.contains(term) {
                    matches.push(term.clone());
                }
            }
        }

        matches.truncate(TOP_K);
        matches
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_matches_alias() {
        let ontology = LocalOntology::builtin();
        let terms = ontology.lookup("It feels like a tightness behind my eyes", OntologyCategory::Metaphors);
        assert_eq!(terms[0], "tension");
        assert!(terms.len() <= TOP_K);
    }

    #[test]
    fn test_lookup_is_bounded_and_deduplicated() {
        let ontology = LocalOntology::builtin();
        // "hollow" and "fluttering" both map to palpitations
        let terms = ontology.lookup("a hollow fluttering, racing and burning", OntologyCategory::Metaphors);
        assert_eq!(terms.len(), TOP_K);
        assert_eq!(terms.iter().filter(|t| *t == "palpitations").count(), 1);
    }

    #[test]
    fn test_lookup_unknown_query() {
        let ontology = LocalOntology::builtin();
        assert!(ontology
            .lookup("nothing relevant here", OntologyCategory::EmotionalBiomarkers)
            .is_empty());
    }

    #[test]
    fn test_empty_ontology() {
        let ontology = LocalOntology::default();
        assert!(ontology.lookup("fear", OntologyCategory::EmotionalBiomarkers).is_empty());
    }

    #[tokio::test]
    async fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ontology.json");
        std::fs::write(
            &path,
            r#"{"risk_indicators": [{"key": "dizzy/lightheaded", "terms": ["presyncope"]}]}"#,
        )
        .unwrap();

        let ontology = LocalOntology::load(&path).await.unwrap();
        assert_eq!(
            ontology.lookup("I feel lightheaded", OntologyCategory::RiskIndicators),
            vec!["presyncope".to_string()]
        );
        assert!(ontology.entries(OntologyCategory::Metaphors).is_empty());
    }
}
