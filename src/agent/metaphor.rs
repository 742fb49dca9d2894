//! Metaphor Translation Agent - maps figurative language to neutral clinical terms.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::types::{AgentConfig, AgentKind, Confidence};
use super::{format_matches, Agent, LLMProvider, ReasoningEngine};
use crate::ontology::OntologyLookup;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
struct MetaphorSchema {
    metaphors: Vec<String>,
    clinical_translation: String,
    confidence: Confidence,
    uncertainties: Vec<String>,
}

/// Metaphor agent output
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MetaphorResult {
    pub reasoning: String,
    /// Figurative expressions found in the narrative
    pub metaphors: Vec<String>,
    /// Single neutral sentence
    pub clinical_translation: String,
    pub confidence: Confidence,
    pub uncertainties: Vec<String>,
    pub rag_matches: Vec<String>,
    pub degraded: bool,
}

impl MetaphorResult {
    pub fn without_reasoning(&self) -> Self {
        Self {
            reasoning: String::new(),
            ..self.clone()
        }
    }
}

pub struct MetaphorAgent {
    engine: ReasoningEngine,
    ontology: Arc<dyn OntologyLookup>,
}

impl MetaphorAgent {
    pub fn new(provider: Arc<dyn LLMProvider>, ontology: Arc<dyn OntologyLookup>, config: &AgentConfig) -> Self {
        Self {
            engine: ReasoningEngine::from_config(provider, config),
            ontology,
        }
    }

    pub fn with_defaults(provider: Arc<dyn LLMProvider>, ontology: Arc<dyn OntologyLookup>) -> Self {
        Self::new(provider, ontology, &AgentConfig::new(AgentKind::Metaphor))
    }
}

#[async_trait]
impl Agent for MetaphorAgent {
    type Input = str;
    type Output = MetaphorResult;

    fn kind(&self) -> AgentKind {
        AgentKind::Metaphor
    }

    fn engine(&self) -> &ReasoningEngine {
        &self.engine
    }

    fn ontology(&self) -> &dyn OntologyLookup {
        self.ontology.as_ref()
    }

    async fn execute(&self, narrative: &str) -> MetaphorResult {
        let reasoning = self.reason(narrative).await;
        let rag_matches = self.use_ontology(narrative);

        let prompt = format!(
            r#"Translate the patient's metaphorical language into clinical terminology.

Patient narrative: {}

Relevant medical concepts from ontology: {}

Provide:
1. Identified metaphors (list)
2. Clinical translation (single sentence, neutral tone)
3. Confidence level (high/medium/low)
4. Uncertainties or ambiguities"#,
            narrative,
            format_matches(&rag_matches)
        );

        let structured = self.engine.complete_structured(&prompt, MetaphorSchema::default()).await;
        let schema = structured.value;

        MetaphorResult {
            reasoning,
            metaphors: schema.metaphors,
            clinical_translation: schema.clinical_translation.trim().to_string(),
            confidence: schema.confidence,
            uncertainties: schema.uncertainties,
            rag_matches,
            degraded: structured.degraded,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::GenerationOptions;
    use crate::ontology::LocalOntology;
    use anyhow::Result;

    struct EchoProvider;

    #[async_trait]
    impl LLMProvider for EchoProvider {
        async fn generate(&self, _: &str, prompt: String, _: Option<String>, _: GenerationOptions) -> Result<String> {
            if prompt.starts_with("Translate") {
                assert!(prompt.contains("tension"), "ontology terms missing from prompt");
                Ok(r#"{"metaphors": ["a vice"], "clinical_translation": "  Pressure-type headache reported. ", "confidence": "HIGH", "uncertainties": []}"#.to_string())
            } else {
                Ok("thinking".to_string())
            }
        }
    }

    #[tokio::test]
    async fn test_execute_maps_schema() {
        let agent = MetaphorAgent::with_defaults(Arc::new(EchoProvider), Arc::new(LocalOntology::builtin()));
        let result = agent.execute("There is pressure like a vice on my head").await;

        assert_eq!(result.reasoning, "thinking");
        assert_eq!(result.metaphors, vec!["a vice".to_string()]);
        assert_eq!(result.clinical_translation, "Pressure-type headache reported.");
        assert_eq!(result.confidence, Confidence::High);
        assert!(result.rag_matches.contains(&"tension".to_string()));
        assert!(!result.degraded);
        assert_eq!(result.without_reasoning().reasoning, "");
    }
}
