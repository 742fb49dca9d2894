//! Clinical Synthesis Agent - integrates the first-stage findings into a
//! structured, non-diagnostic clinical note.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::warn;

use super::emotion::{EmotionResult, EmotionSignal};
use super::metaphor::MetaphorResult;
use super::risk::{RiskLevel, RiskResult};
use super::types::{AgentConfig, AgentKind, Confidence};
use super::{Agent, LLMProvider, ReasoningEngine};
use crate::ontology::OntologyLookup;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetaphorContext {
    pub translation: String,
    pub metaphors: Vec<String>,
    pub confidence: Confidence,
    pub uncertainties: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmotionContext {
    pub emotions: Vec<EmotionSignal>,
    pub summary: String,
    pub significant_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskContext {
    pub risk_level: RiskLevel,
    pub confidence: Confidence,
    pub red_flags: Vec<String>,
    pub missing_info: Vec<String>,
    pub rationale: String,
}

/// Everything synthesis is allowed to see. Built from already-computed
/// results; the risk part is always the post-escalation assessment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SynthesisContext {
    pub patient_text: String,
    pub metaphor: MetaphorContext,
    pub emotion: EmotionContext,
    pub risk: RiskContext,
}

impl SynthesisContext {
    pub fn new(patient_text: &str, metaphor: &MetaphorResult, emotion: &EmotionResult, risk: &RiskResult) -> Self {
        Self {
            patient_text: patient_text.to_string(),
            metaphor: MetaphorContext {
                translation: metaphor.clinical_translation.clone(),
                metaphors: metaphor.metaphors.clone(),
                confidence: metaphor.confidence,
                uncertainties: metaphor.uncertainties.clone(),
            },
            emotion: EmotionContext {
                emotions: emotion.emotions.clone(),
                summary: emotion.summary.clone(),
                significant_count: emotion.emotions.len(),
            },
            risk: RiskContext {
                risk_level: risk.assessment.risk_level,
                confidence: risk.assessment.confidence,
                red_flags: risk.assessment.red_flags.clone(),
                missing_info: risk.assessment.missing_info.clone(),
                rationale: risk.assessment.rationale.clone(),
            },
        }
    }
}

/// Structured sections of the clinical note.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StructuredSummary {
    pub presenting_description: String,
    pub symptom_interpretation: String,
    pub emotional_state: String,
    pub risk_assessment: String,
    pub clinical_impression: String,
    pub uncertainties: Vec<String>,
    pub notes_for_clinician: Vec<String>,
    pub confidence: Confidence,
}

/// Synthesis agent output
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SynthesisResult {
    pub reasoning: String,
    pub full_summary: String,
    pub structured: StructuredSummary,
    pub degraded: bool,
}

impl SynthesisResult {
    pub fn without_reasoning(&self) -> Self {
        Self {
            reasoning: String::new(),
            ..self.clone()
        }
    }
}

pub struct SynthesisAgent {
    engine: ReasoningEngine,
    ontology: Arc<dyn OntologyLookup>,
}

impl SynthesisAgent {
    pub fn new(provider: Arc<dyn LLMProvider>, ontology: Arc<dyn OntologyLookup>, config: &AgentConfig) -> Self {
        Self {
            engine: ReasoningEngine::from_config(provider, config),
            ontology,
        }
    }

    pub fn with_defaults(provider: Arc<dyn LLMProvider>, ontology: Arc<dyn OntologyLookup>) -> Self {
        Self::new(provider, ontology, &AgentConfig::new(AgentKind::Synthesis))
    }

    async fn write_note(&self, context_text: &str) -> String {
        let prompt = format!(
            r#"Synthesize a clinical summary from the following agent analyses.

Context:
{}

Create a structured clinical note with these sections:

1. Presenting Description: Patient's narrative in their own words (brief)
2. Symptom Interpretation: Clinical translation of metaphors and symptoms
3. Emotional State: Clinical description of emotional biomarkers
4. Risk Assessment: Urgency level and red flags
5. Clinical Impression: Non-diagnostic summary of findings
6. Uncertainties: Information gaps, ambiguities, missing data
7. Notes for Clinician: Contextual reminders

Write in formal medical documentation style. Be concise but comprehensive."#,
            context_text
        );

        let params = self.engine.params();
        match self
            .engine
            .complete(&prompt, params.synthesis_temperature, params.synthesis_max_tokens)
            .await
        {
            Ok(note) => note.trim().to_string(),
            Err(e) => {
                warn!("synthesis note generation failed: {}", e);
                String::new()
            }
        }
    }
}

#[async_trait]
impl Agent for SynthesisAgent {
    type Input = SynthesisContext;
    type Output = SynthesisResult;

    fn kind(&self) -> AgentKind {
        AgentKind::Synthesis
    }

    fn engine(&self) -> &ReasoningEngine {
        &self.engine
    }

    fn ontology(&self) -> &dyn OntologyLookup {
        self.ontology.as_ref()
    }

    async fn execute(&self, context: &SynthesisContext) -> SynthesisResult {
        let context_text = serde_json::to_string_pretty(context).unwrap_or_default();
        let reasoning = self.reason(&context_text).await;
        let full_summary = self.write_note(&context_text).await;

        let prompt = format!(
            "Extract structured components from this clinical summary:\n\n{}",
            full_summary
        );
        let structured = self.engine.complete_structured(&prompt, StructuredSummary::default()).await;

        SynthesisResult {
            reasoning,
            degraded: structured.degraded || full_summary.is_empty(),
            full_summary,
            structured: structured.value,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::GenerationOptions;
    use crate::ontology::LocalOntology;
    use anyhow::{anyhow, Result};

    /// Fails the free-text note, answers everything else.
    struct NoNoteProvider;

    #[async_trait]
    impl LLMProvider for NoNoteProvider {
        async fn generate(&self, _: &str, prompt: String, _: Option<String>, options: GenerationOptions) -> Result<String> {
            if prompt.starts_with("Synthesize") {
                assert_eq!(options.max_tokens, 800);
                return Err(anyhow!("connection reset"));
            }
            if prompt.starts_with("Extract structured components") {
                return Ok(r#"{"clinical_impression": "Non-specific", "confidence": "low"}"#.to_string());
            }
            Ok(String::new())
        }
    }

    fn context() -> SynthesisContext {
        let mut risk = RiskResult::default();
        risk.assessment.risk_level = RiskLevel::High;
        risk.assessment.red_flags = vec!["chest tightness".to_string()];
        SynthesisContext::new("tight chest", &MetaphorResult::default(), &EmotionResult::default(), &risk)
    }

    #[test]
    fn test_context_carries_risk() {
        let ctx = context();
        assert_eq!(ctx.risk.risk_level, RiskLevel::High);
        assert_eq!(ctx.risk.red_flags, vec!["chest tightness".to_string()]);
        assert_eq!(ctx.emotion.significant_count, 0);
    }

    #[tokio::test]
    async fn test_failed_note_degrades_but_completes() {
        let agent = SynthesisAgent::with_defaults(Arc::new(NoNoteProvider), Arc::new(LocalOntology::builtin()));
        let result = agent.execute(&context()).await;

        assert_eq!(result.full_summary, "");
        assert_eq!(result.reasoning, "");
        assert_eq!(result.structured.clinical_impression, "Non-specific");
        assert_eq!(result.structured.confidence, Confidence::Low);
        assert!(result.structured.uncertainties.is_empty());
        assert!(result.degraded);
    }
}
