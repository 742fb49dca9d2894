//! Pipeline result types
//!
//! `UnifiedResult` is the only object handed to the guardrails and to
//! consumers. Its top-level keys are stable.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::agent::{
    AgentKind, ComparisonOutput, EmotionResult, MetaphorResult, RiskLevel, RiskResult, SynthesisResult,
};
use crate::error::InputError;
use crate::safety::GuardrailViolation;

/// Accepted patient narrative. Immutable once constructed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NarrativeInput(String);

impl NarrativeInput {
    pub fn new(text: impl Into<String>) -> Result<Self, InputError> {
        let text = text.into();
        if text.trim().is_empty() {
            return Err(InputError::EmptyNarrative);
        }
        Ok(Self(text))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for NarrativeInput {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Pipeline stages, in the only order they can occur.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PipelineStage {
    Intake,
    AgentsRun,
    RiskOverrideApplied,
    SynthesisRun,
    ResultAssembled,
    GuardrailsApplied,
    Done,
}

/// One reasoning trace per agent; transparency only.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentReasoning {
    pub metaphor: String,
    pub emotion: String,
    pub risk: String,
    pub synthesis: String,
}

/// Audit record of a deterministic risk override.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskOverride {
    pub original_level: RiskLevel,
    pub original_urgency: f64,
    pub escalated_level: RiskLevel,
    pub escalated_urgency: f64,
    pub triggered: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessingMetadata {
    pub run_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub agents_used: Vec<AgentKind>,
    pub ontology_enabled: bool,
    pub concurrent_agents: bool,
    /// Rule-based escalation layer was active for this run
    pub deterministic_risk_overrides: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub risk_override: Option<RiskOverride>,
    pub degraded_agents: Vec<AgentKind>,
    pub stages: Vec<PipelineStage>,
    pub guardrails_applied: bool,
}

impl ProcessingMetadata {
    pub fn new(agents_used: Vec<AgentKind>, ontology_enabled: bool) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            created_at: Utc::now(),
            agents_used,
            ontology_enabled,
            concurrent_agents: true,
            deterministic_risk_overrides: true,
            risk_override: None,
            degraded_agents: Vec::new(),
            stages: Vec::new(),
            guardrails_applied: false,
        }
    }

    pub fn enter(&mut self, stage: PipelineStage) {
        if !self.stages.contains(&stage) {
            self.stages.push(stage);
        }
    }
}

/// Merged output of one pipeline run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnifiedResult {
    pub patient_voice: String,
    pub metaphor: MetaphorResult,
    pub emotions: EmotionResult,
    pub risk: RiskResult,
    pub summary: SynthesisResult,
    pub agent_reasoning: AgentReasoning,
    pub processing_metadata: ProcessingMetadata,
    /// Ordered set
    pub uncertainties: Vec<String>,
    /// Ordered set; disclaimers live here
    pub notes: Vec<String>,
    pub safety_violations: Vec<GuardrailViolation>,
}

/// How one emotion changed between the two narratives.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmotionChange {
    pub emotion: String,
    pub baseline_intensity: Option<f64>,
    pub hypothetical_intensity: Option<f64>,
}

/// Structural differences computed without the reasoning engine.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Differential {
    pub risk_level_changed: bool,
    pub baseline_risk: RiskLevel,
    pub hypothetical_risk: RiskLevel,
    /// hypothetical minus baseline
    pub urgency_delta: f64,
    pub added_red_flags: Vec<String>,
    pub removed_red_flags: Vec<String>,
    pub emotion_changes: Vec<EmotionChange>,
}

impl Differential {
    pub fn between(baseline: &UnifiedResult, hypothetical: &UnifiedResult) -> Self {
        let base = &baseline.risk.assessment;
        let hypo = &hypothetical.risk.assessment;

        let added_red_flags = hypo
            .red_flags
            .iter()
            .filter(|f| !base.red_flags.contains(f))
            .cloned()
            .collect();
        let removed_red_flags = base
            .red_flags
            .iter()
            .filter(|f| !hypo.red_flags.contains(f))
            .cloned()
            .collect();

        let intensity = |result: &UnifiedResult, name: &str| {
            result
                .emotions
                .emotions
                .iter()
                .find(|e| e.emotion.eq_ignore_ascii_case(name))
                .map(|e| e.intensity)
        };

        let mut names: Vec<String> = Vec::new();
        for signal in baseline.emotions.emotions.iter().chain(&hypothetical.emotions.emotions) {
            let name = signal.emotion.trim().to_lowercase();
            if !name.is_empty() && !names.contains(&name) {
                names.push(name);
            }
        }

        let emotion_changes = names
            .into_iter()
            .filter_map(|name| {
                let before = intensity(baseline, &name);
                let after = intensity(hypothetical, &name);
                let unchanged = match (before, after) {
                    (Some(a), Some(b)) => (a - b).abs() < f64::EPSILON,
                    _ => false,
                };
                (!unchanged).then_some(EmotionChange {
                    emotion: name,
                    baseline_intensity: before,
                    hypothetical_intensity: after,
                })
            })
            .collect();

        Self {
            risk_level_changed: base.risk_level != hypo.risk_level,
            baseline_risk: base.risk_level,
            hypothetical_risk: hypo.risk_level,
            urgency_delta: hypo.urgency_score - base.urgency_score,
            added_red_flags,
            removed_red_flags,
            emotion_changes,
        }
    }
}

/// Output of the what-if pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComparisonResult {
    pub baseline: UnifiedResult,
    pub hypothetical: UnifiedResult,
    pub comparison: ComparisonOutput,
    pub differential: Differential,
    pub safety_violations: Vec<GuardrailViolation>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_narrative_input_rejects_blank() {
        assert_eq!(NarrativeInput::new("   \n\t"), Err(InputError::EmptyNarrative));
        assert_eq!(NarrativeInput::new("my head hurts").unwrap().as_str(), "my head hurts");
    }

    #[test]
    fn test_stage_serialization() {
        let value = serde_json::to_value(PipelineStage::RiskOverrideApplied).unwrap();
        assert_eq!(value, "RISK_OVERRIDE_APPLIED");
        assert!(PipelineStage::Intake < PipelineStage::Done);
    }

    #[test]
    fn test_metadata_records_each_stage_once() {
        let mut meta = ProcessingMetadata::new(vec![AgentKind::Metaphor], true);
        meta.enter(PipelineStage::Intake);
        meta.enter(PipelineStage::Intake);
        meta.enter(PipelineStage::AgentsRun);
        assert_eq!(meta.stages, vec![PipelineStage::Intake, PipelineStage::AgentsRun]);
        assert!(meta.deterministic_risk_overrides);
    }
}
