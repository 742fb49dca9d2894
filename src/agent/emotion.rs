//! Emotional Biomarker Agent - extracts emotional states as clinical signals.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;

use super::types::{AgentConfig, AgentKind, Confidence};
use super::{format_matches, Agent, LLMProvider, ReasoningEngine};
use crate::ontology::OntologyLookup;

/// Intensity at which a signal counts as clinically significant.
pub const SIGNIFICANT_INTENSITY: f64 = 0.4;
/// Intensity reported as "marked".
pub const MARKED_INTENSITY: f64 = 0.7;

const NO_DISTRESS: &str = "No clinically significant emotional distress identified";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmotionSignal {
    pub emotion: String,
    /// 0.0 - 1.0
    pub intensity: f64,
    pub clinical_term: String,
    pub evidence: String,
    pub significance: Confidence,
}

/// Emotion agent output
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmotionResult {
    pub reasoning: String,
    /// Signals at or above the significance threshold
    pub emotions: Vec<EmotionSignal>,
    pub all_emotions: Vec<EmotionSignal>,
    pub summary: String,
    pub rag_matches: Vec<String>,
    pub degraded: bool,
}

impl EmotionResult {
    pub fn without_reasoning(&self) -> Self {
        Self {
            reasoning: String::new(),
            ..self.clone()
        }
    }
}

pub struct EmotionAgent {
    engine: ReasoningEngine,
    ontology: Arc<dyn OntologyLookup>,
}

impl EmotionAgent {
    pub fn new(provider: Arc<dyn LLMProvider>, ontology: Arc<dyn OntologyLookup>, config: &AgentConfig) -> Self {
        Self {
            engine: ReasoningEngine::from_config(provider, config),
            ontology,
        }
    }

    pub fn with_defaults(provider: Arc<dyn LLMProvider>, ontology: Arc<dyn OntologyLookup>) -> Self {
        Self::new(provider, ontology, &AgentConfig::new(AgentKind::Emotion))
    }
}

/// Keep well-formed entries only; clamp intensities into range.
fn parse_signals(raw: Vec<Value>) -> Vec<EmotionSignal> {
    raw.into_iter()
        .filter(Value::is_object)
        .filter_map(|v| serde_json::from_value::<EmotionSignal>(v).ok())
        .map(|mut s| {
            s.intensity = if s.intensity.is_finite() { s.intensity.clamp(0.0, 1.0) } else { 0.0 };
            s
        })
        .collect()
}

pub fn summarize(significant: &[EmotionSignal]) -> String {
    if significant.is_empty() {
        return NO_DISTRESS.to_string();
    }

    if let Some(marked) = significant.iter().find(|e| e.intensity >= MARKED_INTENSITY) {
        let term = if marked.clinical_term.trim().is_empty() {
            "emotional distress"
        } else {
            marked.clinical_term.trim()
        };
        return format!("Marked {} detected", term);
    }

    let names: Vec<&str> = significant.iter().take(2).map(|e| e.emotion.as_str()).collect();
    format!("Moderate emotional distress: {}", names.join(", "))
}

#[async_trait]
impl Agent for EmotionAgent {
    type Input = str;
    type Output = EmotionResult;

    fn kind(&self) -> AgentKind {
        AgentKind::Emotion
    }

    fn engine(&self) -> &ReasoningEngine {
        &self.engine
    }

    fn ontology(&self) -> &dyn OntologyLookup {
        self.ontology.as_ref()
    }

    async fn execute(&self, narrative: &str) -> EmotionResult {
        let reasoning = self.reason(narrative).await;
        let rag_matches = self.use_ontology(narrative);

        let prompt = format!(
            r#"Extract emotional biomarkers from the patient narrative.

Patient narrative: {}

Relevant emotional concepts: {}

For each detected emotion, provide:
1. Emotion name (fear, panic, sadness, anger, confusion, helplessness, etc.)
2. Intensity score (0.0-1.0, where 0.5+ is clinically significant)
3. Clinical terminology mapping
4. Evidence from text
5. Significance (high/medium/low)

Format as a JSON array of objects with keys: emotion, intensity, clinical_term, evidence, significance."#,
            narrative,
            format_matches(&rag_matches)
        );

        let structured = self.engine.complete_structured(&prompt, Vec::<Value>::new()).await;
        let all_emotions = parse_signals(structured.value);

        let emotions: Vec<EmotionSignal> = all_emotions
            .iter()
            .filter(|e| e.intensity >= SIGNIFICANT_INTENSITY)
            .cloned()
            .collect();

        debug!(
            total = all_emotions.len(),
            significant = emotions.len(),
            "emotion signals extracted"
        );

        EmotionResult {
            reasoning,
            summary: summarize(&emotions),
            emotions,
            all_emotions,
            rag_matches,
            degraded: structured.degraded,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn signal(emotion: &str, intensity: f64, term: &str) -> EmotionSignal {
        EmotionSignal {
            emotion: emotion.to_string(),
            intensity,
            clinical_term: term.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_parse_signals_filters_and_clamps() {
        let raw = vec![
            json!({"emotion": "fear", "intensity": 1.7, "clinical_term": "apprehension"}),
            json!("not an object"),
            json!({"emotion": "anger", "intensity": "very"}),
            json!({"emotion": "sadness"}),
        ];
        let signals = parse_signals(raw);
        assert_eq!(signals.len(), 2);
        assert_eq!(signals[0].intensity, 1.0);
        assert_eq!(signals[1].intensity, 0.0);
    }

    #[test]
    fn test_summary_variants() {
        assert_eq!(summarize(&[]), NO_DISTRESS);
        assert_eq!(
            summarize(&[signal("fear", 0.5, "apprehension"), signal("panic", 0.9, "acute anxiety")]),
            "Marked acute anxiety detected"
        );
        assert_eq!(
            summarize(&[signal("fear", 0.5, ""), signal("anger", 0.45, ""), signal("sadness", 0.4, "")]),
            "Moderate emotional distress: fear, anger"
        );
        assert_eq!(summarize(&[signal("fear", 0.8, " ")]), "Marked emotional distress detected");
    }
}
