//! Agent Module
//!
//! Provides the reasoning agents and the engine seam they share.

mod comparison;
mod emotion;
mod engine;
mod metaphor;
mod provider;
mod risk;
mod synthesis;
mod types;

pub use comparison::{ComparisonAgent, ComparisonContext, ComparisonOutput, ReducedAnalysis, NO_MATERIAL_DIFFERENCE};
pub use emotion::{EmotionAgent, EmotionResult, EmotionSignal};
pub use engine::{extract_balanced, parse_structured, ReasoningEngine, Structured};
pub use metaphor::{MetaphorAgent, MetaphorResult};
pub use provider::{GenerationOptions, LLMProvider, OllamaProvider, OpenAICompatibleProvider};
pub use risk::{RiskAgent, RiskAssessment, RiskLevel, RiskResult};
pub use synthesis::{SynthesisAgent, SynthesisContext, SynthesisResult, StructuredSummary};
pub use types::{AgentConfig, AgentKind, Confidence, GenerationParams};

use async_trait::async_trait;

use crate::ontology::OntologyLookup;

/// Shared capability interface of the reasoning agents.
///
/// Agents never see each other's results directly; the orchestrator builds
/// whatever context an agent needs and passes it as `Input`.
#[async_trait]
pub trait Agent: Send + Sync {
    type Input: ?Sized + Sync;
    type Output: Send;

    fn kind(&self) -> AgentKind;

    fn engine(&self) -> &ReasoningEngine;

    fn ontology(&self) -> &dyn OntologyLookup;

    fn name(&self) -> &'static str {
        self.kind().display_name()
    }

    /// Think-aloud trace for transparency. Empty on failure.
    async fn reason(&self, input: &str) -> String {
        let prompt = reasoning_prompt(self.name(), input);
        self.engine().think_aloud(&prompt).await
    }

    /// Candidate ontology terms under this agent's category.
    fn use_ontology(&self, query: &str) -> Vec<String> {
        match self.kind().ontology_category() {
            Some(category) => self.ontology().lookup(query, category),
            None => Vec::new(),
        }
    }

    /// Run the agent. Always returns a schema-complete result.
    async fn execute(&self, input: &Self::Input) -> Self::Output;
}

fn reasoning_prompt(agent_name: &str, input: &str) -> String {
    format!(
        r#"You are {}. Analyze the following input step by step.

Input: {}

Think through your analysis:
1. What key information do you extract?
2. What patterns or signals do you detect?
3. What is your confidence level?
4. What are potential uncertainties?

Provide your reasoning, then your final analysis."#,
        agent_name, input
    )
}

/// Ontology matches rendered for a prompt.
pub(crate) fn format_matches(matches: &[String]) -> String {
    if matches.is_empty() {
        "None found".to_string()
    } else {
        matches.join(", ")
    }
}

pub fn truncate(s: &str, max_len: usize) -> String {
    let s = s.replace('\n', " ");
    if s.len() <= max_len {
        s
    } else {
        let target_len = max_len.saturating_sub(3);
        let mut end = target_len;
        while !s.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}...", &s[..end])
    }
}
