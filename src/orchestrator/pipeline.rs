//! Single-narrative pipeline
//!
//! INTAKE -> AGENTS_RUN -> RISK_OVERRIDE_APPLIED -> SYNTHESIS_RUN ->
//! RESULT_ASSEMBLED -> GUARDRAILS_APPLIED -> DONE. No branching, no retries.

use std::sync::Arc;
use tracing::{debug, info, warn};

use super::result::{AgentReasoning, NarrativeInput, PipelineStage, ProcessingMetadata, RiskOverride, UnifiedResult};
use crate::agent::{
    Agent, AgentKind, ComparisonAgent, EmotionAgent, EmotionResult, LLMProvider, MetaphorAgent, MetaphorResult,
    RiskAgent, RiskResult, SynthesisAgent, SynthesisContext, SynthesisResult,
};
use crate::config::AgencyConfig;
use crate::ontology::OntologyLookup;
use crate::safety::{Guardrails, RiskEscalationEngine};

const PIPELINE_AGENTS: [AgentKind; 4] = [
    AgentKind::Metaphor,
    AgentKind::Emotion,
    AgentKind::Risk,
    AgentKind::Synthesis,
];

/// Sequences the agents, applies the deterministic rules and guardrails.
///
/// Holds no per-run state: every call to [`Orchestrator::run`] builds a fresh
/// result, so one instance can serve concurrent runs.
pub struct Orchestrator {
    pub(super) metaphor: MetaphorAgent,
    pub(super) emotion: EmotionAgent,
    pub(super) risk: RiskAgent,
    pub(super) synthesis: SynthesisAgent,
    pub(super) comparison: ComparisonAgent,
    pub(super) escalation: RiskEscalationEngine,
    pub(super) guardrails: Guardrails,
}

impl Orchestrator {
    pub fn new(provider: Arc<dyn LLMProvider>, ontology: Arc<dyn OntologyLookup>, config: &AgencyConfig) -> Self {
        Self {
            metaphor: MetaphorAgent::new(provider.clone(), ontology.clone(), &config.agent_config(AgentKind::Metaphor)),
            emotion: EmotionAgent::new(provider.clone(), ontology.clone(), &config.agent_config(AgentKind::Emotion)),
            risk: RiskAgent::new(provider.clone(), ontology.clone(), &config.agent_config(AgentKind::Risk)),
            synthesis: SynthesisAgent::new(provider.clone(), ontology.clone(), &config.agent_config(AgentKind::Synthesis)),
            comparison: ComparisonAgent::new(provider, ontology, &config.agent_config(AgentKind::Comparison)),
            escalation: config.escalation_engine(),
            guardrails: Guardrails::new(),
        }
    }

    pub fn with_defaults(provider: Arc<dyn LLMProvider>, ontology: Arc<dyn OntologyLookup>) -> Self {
        Self::new(provider, ontology, &AgencyConfig::default())
    }

    pub fn guardrails(&self) -> &Guardrails {
        &self.guardrails
    }

    pub async fn run_input(&self, input: &NarrativeInput) -> UnifiedResult {
        self.run(input.as_str()).await
    }

    /// Run the full pipeline. Never fails: agent problems surface as
    /// degraded, default-filled sections.
    pub async fn run(&self, narrative: &str) -> UnifiedResult {
        let mut metadata = ProcessingMetadata::new(PIPELINE_AGENTS.to_vec(), true);
        metadata.enter(PipelineStage::Intake);
        info!(run_id = %metadata.run_id, chars = narrative.len(), "Intake");
        if narrative.trim().is_empty() {
            warn!(run_id = %metadata.run_id, "empty narrative; results will be defaults");
        }

        let (metaphor, emotions, risk) = tokio::join!(
            self.metaphor.execute(narrative),
            self.emotion.execute(narrative),
            self.risk.execute(narrative),
        );
        metadata.enter(PipelineStage::AgentsRun);
        info!(run_id = %metadata.run_id, risk = %risk.assessment.risk_level, "First-stage agents complete");

        let escalation = self.escalation.apply(narrative, &risk.assessment);
        if escalation.fired() {
            metadata.risk_override = Some(RiskOverride {
                original_level: risk.assessment.risk_level,
                original_urgency: risk.assessment.urgency_score,
                escalated_level: escalation.assessment.risk_level,
                escalated_urgency: escalation.assessment.urgency_score,
                triggered: escalation.triggered.clone(),
            });
        }
        let risk = risk.with_assessment(escalation.assessment);
        metadata.enter(PipelineStage::RiskOverrideApplied);

        let context = SynthesisContext::new(narrative, &metaphor, &emotions, &risk);
        let summary = self.synthesis.execute(&context).await;
        metadata.enter(PipelineStage::SynthesisRun);
        info!(run_id = %metadata.run_id, "Synthesis complete");

        metadata.degraded_agents = degraded_agents(&metaphor, &emotions, &risk, &summary);
        if !metadata.degraded_agents.is_empty() {
            warn!(run_id = %metadata.run_id, "Degraded agents: {:?}", metadata.degraded_agents);
        }

        let mut result = assemble(narrative, metaphor, emotions, risk, summary, metadata);
        result.processing_metadata.enter(PipelineStage::ResultAssembled);

        let report = self.guardrails.apply(&mut result);
        result.processing_metadata.enter(PipelineStage::GuardrailsApplied);
        debug!(
            violations = report.violations.len(),
            disclaimers = report.disclaimers_added,
            uncertainties = report.uncertainties_added,
            "Guardrail report"
        );

        result.processing_metadata.enter(PipelineStage::Done);
        info!(
            run_id = %result.processing_metadata.run_id,
            risk = %result.risk.assessment.risk_level,
            "Pipeline done"
        );
        result
    }
}

fn degraded_agents(
    metaphor: &MetaphorResult,
    emotions: &EmotionResult,
    risk: &RiskResult,
    summary: &SynthesisResult,
) -> Vec<AgentKind> {
    [
        (AgentKind::Metaphor, metaphor.degraded),
        (AgentKind::Emotion, emotions.degraded),
        (AgentKind::Risk, risk.degraded),
        (AgentKind::Synthesis, summary.degraded),
    ]
    .into_iter()
    .filter_map(|(kind, degraded)| degraded.then_some(kind))
    .collect()
}

fn assemble(
    narrative: &str,
    metaphor: MetaphorResult,
    emotions: EmotionResult,
    risk: RiskResult,
    summary: SynthesisResult,
    processing_metadata: ProcessingMetadata,
) -> UnifiedResult {
    let agent_reasoning = AgentReasoning {
        metaphor: metaphor.reasoning.clone(),
        emotion: emotions.reasoning.clone(),
        risk: risk.reasoning.clone(),
        synthesis: summary.reasoning.clone(),
    };

    let uncertainties = ordered_set(
        metaphor
            .uncertainties
            .iter()
            .chain(&risk.assessment.missing_info)
            .chain(&summary.structured.uncertainties),
    );
    let notes = ordered_set(summary.structured.notes_for_clinician.iter());

    UnifiedResult {
        patient_voice: narrative.to_string(),
        metaphor,
        emotions,
        risk,
        summary,
        agent_reasoning,
        processing_metadata,
        uncertainties,
        notes,
        safety_violations: Vec::new(),
    }
}

fn ordered_set<'a>(items: impl Iterator<Item = &'a String>) -> Vec<String> {
    let mut set: Vec<String> = Vec::new();
    for item in items {
        let item = item.trim();
        if !item.is_empty() && !set.iter().any(|s| s == item) {
            set.push(item.to_string());
        }
    }
    set
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ordered_set_dedupes_and_trims() {
        let items = vec![" a ".to_string(), "b".to_string(), "a".to_string(), "  ".to_string()];
        assert_eq!(ordered_set(items.iter()), vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn test_degraded_agents() {
        let metaphor = MetaphorResult {
            degraded: true,
            ..Default::default()
        };
        let summary = SynthesisResult {
            degraded: true,
            ..Default::default()
        };
        let degraded = degraded_agents(&metaphor, &EmotionResult::default(), &RiskResult::default(), &summary);
        assert_eq!(degraded, vec![AgentKind::Metaphor, AgentKind::Synthesis]);
    }

    #[test]
    fn test_assemble_seeds_uncertainties_and_notes() {
        let metaphor = MetaphorResult {
            uncertainties: vec!["Location of pain unclear".to_string()],
            ..Default::default()
        };
        let mut risk = RiskResult::default();
        risk.assessment.missing_info = vec!["Duration".to_string(), "Location of pain unclear".to_string()];
        let mut summary = SynthesisResult::default();
        summary.structured.notes_for_clinician = vec!["Patient anxious".to_string()];

        let result = assemble(
            "text",
            metaphor,
            EmotionResult::default(),
            risk,
            summary,
            ProcessingMetadata::new(PIPELINE_AGENTS.to_vec(), true),
        );
        assert_eq!(result.uncertainties, vec!["Location of pain unclear".to_string(), "Duration".to_string()]);
        assert_eq!(result.notes, vec!["Patient anxious".to_string()]);
        assert_eq!(result.patient_voice, "text");
    }
}
