//! What-If Comparison Agent - explains how two analyses differ and what could
//! follow from each, without naming diseases or treatments.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::warn;

use super::emotion::EmotionResult;
use super::metaphor::MetaphorResult;
use super::risk::RiskResult;
use super::synthesis::SynthesisResult;
use super::types::{AgentConfig, AgentKind};
use super::{Agent, LLMProvider, ReasoningEngine};
use crate::ontology::OntologyLookup;

/// Explanation used when both narratives are the same text.
pub const NO_MATERIAL_DIFFERENCE: &str = "No material difference: both narratives are identical, so the interpreted \
metaphors, emotional signals, risk level and uncertainties do not differ. Only a clinician can make clinical judgments.";

/// One side of a comparison: clinical content only, reasoning traces removed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReducedAnalysis {
    pub metaphor: MetaphorResult,
    pub emotions: EmotionResult,
    pub risk: RiskResult,
    pub summary: SynthesisResult,
}

impl ReducedAnalysis {
    pub fn new(metaphor: &MetaphorResult, emotions: &EmotionResult, risk: &RiskResult, summary: &SynthesisResult) -> Self {
        Self {
            metaphor: metaphor.without_reasoning(),
            emotions: emotions.without_reasoning(),
            risk: risk.without_reasoning(),
            summary: summary.without_reasoning(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComparisonContext {
    pub baseline: ReducedAnalysis,
    pub hypothetical: ReducedAnalysis,
    /// Narratives were textually identical
    pub identical_narratives: bool,
}

/// Comparison agent output
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ComparisonOutput {
    pub reasoning: String,
    pub what_if_explanation: String,
    pub baseline_consequences: String,
    pub hypothetical_consequences: String,
    pub degraded: bool,
}

pub struct ComparisonAgent {
    engine: ReasoningEngine,
    ontology: Arc<dyn OntologyLookup>,
}

impl ComparisonAgent {
    pub fn new(provider: Arc<dyn LLMProvider>, ontology: Arc<dyn OntologyLookup>, config: &AgentConfig) -> Self {
        Self {
            engine: ReasoningEngine::from_config(provider, config),
            ontology,
        }
    }

    pub fn with_defaults(provider: Arc<dyn LLMProvider>, ontology: Arc<dyn OntologyLookup>) -> Self {
        Self::new(provider, ontology, &AgentConfig::new(AgentKind::Comparison))
    }

    async fn generate(&self, what: &str, prompt: &str, max_tokens: u32) -> String {
        let temperature = self.engine.params().comparison_temperature;
        match self.engine.complete(prompt, temperature, max_tokens).await {
            Ok(text) => text.trim().to_string(),
            Err(e) => {
                warn!("{} generation failed: {}", what, e);
                String::new()
            }
        }
    }

    async fn explain(&self, baseline: &str, hypothetical: &str) -> String {
        let prompt = format!(
            r#"Compare these two analyses.

BASELINE:
{}

HYPOTHETICAL:
{}

Explain in simple, non-diagnostic language:

1. How metaphor interpretations differ (if at all).
2. How emotional signals differ.
3. How risk level / red flags / uncertainties differ.
4. What this means for how clearly the story communicates urgency and
   why a clinician might see one description as needing more timely
   attention than the other.

Keep it short (2-3 paragraphs). End with a reminder that only a doctor
can make clinical judgments."#,
            baseline, hypothetical
        );
        self.generate("comparison explanation", &prompt, self.engine.params().comparison_max_tokens)
            .await
    }

    async fn consequences(&self, label: &str, analysis: &str) -> String {
        let prompt = format!(
            r#"You are helping a patient understand, in very general terms, why this
story might matter for how quickly a clinician wants to review it.

{} ANALYSIS:
{}

Write 2-4 short bullet points describing possible consequences if this
situation is important and is not assessed promptly. Follow STRICT rules:
- Do NOT name specific diseases, diagnoses, or treatments.
- Focus on categories like: symptoms could worsen, important warning
  signs might be missed, or delays could increase the need for urgent
  review.
- Use conditional language only ("could", "might", "may").
- End with one final sentence reminding the patient to contact a
  clinician or emergency services if symptoms are severe, new, or
  rapidly worsening."#,
            label, analysis
        );
        self.generate(
            &format!("{} consequences", label.to_lowercase()),
            &prompt,
            self.engine.params().consequence_max_tokens,
        )
        .await
    }
}

#[async_trait]
impl Agent for ComparisonAgent {
    type Input = ComparisonContext;
    type Output = ComparisonOutput;

    fn kind(&self) -> AgentKind {
        AgentKind::Comparison
    }

    fn engine(&self) -> &ReasoningEngine {
        &self.engine
    }

    fn ontology(&self) -> &dyn OntologyLookup {
        self.ontology.as_ref()
    }

    async fn execute(&self, context: &ComparisonContext) -> ComparisonOutput {
        let baseline = serde_json::to_string_pretty(&context.baseline).unwrap_or_default();
        let hypothetical = serde_json::to_string_pretty(&context.hypothetical).unwrap_or_default();

        let reasoning = self
            .reason(&format!("BASELINE:\n{}\n\nHYPOTHETICAL:\n{}", baseline, hypothetical))
            .await;

        let explanation = async {
            if context.identical_narratives {
                NO_MATERIAL_DIFFERENCE.to_string()
            } else {
                self.explain(&baseline, &hypothetical).await
            }
        };

        // Separate requests: one failing must not block the other.
        let (what_if_explanation, baseline_consequences, hypothetical_consequences) = tokio::join!(
            explanation,
            self.consequences("BASELINE", &baseline),
            self.consequences("HYPOTHETICAL", &hypothetical),
        );

        let degraded = what_if_explanation.is_empty()
            || baseline_consequences.is_empty()
            || hypothetical_consequences.is_empty();

        ComparisonOutput {
            reasoning,
            what_if_explanation,
            baseline_consequences,
            hypothetical_consequences,
            degraded,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::GenerationOptions;
    use crate::ontology::LocalOntology;
    use anyhow::{anyhow, Result};
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct CountingProvider {
        explanations: AtomicUsize,
    }

    #[async_trait]
    impl LLMProvider for CountingProvider {
        async fn generate(&self, _: &str, prompt: String, _: Option<String>, options: GenerationOptions) -> Result<String> {
            if prompt.starts_with("Compare these two analyses") {
                self.explanations.fetch_add(1, Ordering::SeqCst);
                assert_eq!(options.max_tokens, 400);
                return Ok("They differ in urgency.".to_string());
            }
            if prompt.contains("HYPOTHETICAL ANALYSIS:") {
                assert_eq!(options.max_tokens, 300);
                return Err(anyhow!("rate limited"));
            }
            if prompt.contains("BASELINE ANALYSIS:") {
                return Ok(" - Symptoms could worsen. ".to_string());
            }
            Ok("reasoning".to_string())
        }
    }

    fn context(identical: bool) -> ComparisonContext {
        let mut with_reasoning = MetaphorResult::default();
        with_reasoning.reasoning = "private trace".to_string();
        let analysis = ReducedAnalysis::new(
            &with_reasoning,
            &EmotionResult::default(),
            &RiskResult::default(),
            &SynthesisResult::default(),
        );
        ComparisonContext {
            baseline: analysis.clone(),
            hypothetical: analysis,
            identical_narratives: identical,
        }
    }

    #[test]
    fn test_reduced_analysis_strips_reasoning() {
        assert_eq!(context(false).baseline.metaphor.reasoning, "");
    }

    #[tokio::test]
    async fn test_identical_skips_explanation_request() {
        let provider = Arc::new(CountingProvider::default());
        let agent = ComparisonAgent::with_defaults(provider.clone(), Arc::new(LocalOntology::builtin()));
        let output = agent.execute(&context(true)).await;

        assert_eq!(output.what_if_explanation, NO_MATERIAL_DIFFERENCE);
        assert_eq!(provider.explanations.load(Ordering::SeqCst), 0);
        assert_eq!(output.baseline_consequences, "- Symptoms could worsen.");
        assert_eq!(output.hypothetical_consequences, "");
        assert!(output.degraded);
    }

    #[tokio::test]
    async fn test_different_requests_explanation() {
        let provider = Arc::new(CountingProvider::default());
        let agent = ComparisonAgent::with_defaults(provider.clone(), Arc::new(LocalOntology::builtin()));
        let output = agent.execute(&context(false)).await;

        assert_eq!(output.what_if_explanation, "They differ in urgency.");
        assert_eq!(provider.explanations.load(Ordering::SeqCst), 1);
        assert_eq!(output.reasoning, "reasoning");
    }
}
