//! Deterministic Risk Escalation
//!
//! Rule-based high-risk overrides on top of the Risk agent. Rules can only
//! raise risk; nothing here ever lowers it.

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::agent::{RiskAssessment, RiskLevel};

/// Appended to `red_flags` once whenever any trigger fires.
pub const ESCALATION_MARKER: &str =
    "Deterministic safety override: high-risk symptom(s) detected in patient narrative.";

/// Appended to the rationale once; presence is detected case-insensitively
/// through its first word.
pub const RATIONALE_SUFFIX: &str =
    "Deterministic_override: high-risk language present; risk not downgraded below HIGH.";

const RATIONALE_GUARD: &str = "deterministic_override";

/// Minimum urgency once a trigger fires.
pub const ESCALATED_URGENCY: f64 = 0.8;

const BUILTIN_TRIGGERS: &[(&str, &str)] = &[
    ("chest pain", "chest pain with possible cardiac or pulmonary aetiology"),
    ("tightness in my chest", "chest tightness"),
    ("chest tightness", "chest tightness"),
    ("pressure in my chest", "chest pressure"),
    ("shortness of breath", "dyspnea / shortness of breath"),
    ("short of breath", "dyspnea / shortness of breath"),
    ("cant breathe", "subjective inability to breathe"),
    ("can't breathe", "subjective inability to breathe"),
    ("cannot breathe", "subjective inability to breathe"),
    ("trouble breathing", "respiratory difficulty"),
    ("difficulty breathing", "respiratory difficulty"),
    ("face drooping", "possible facial droop (neurological)"),
    ("slurred speech", "slurred speech (neurological)"),
    ("weakness on one side", "unilateral weakness (neurological)"),
    ("numb on one side", "unilateral sensory change"),
    ("sudden weakness", "sudden focal weakness"),
    ("seizure", "possible seizure activity"),
    ("had a fit", "possible seizure activity"),
    ("having a fit", "possible seizure activity"),
    ("fainted", "loss of consciousness"),
    ("passed out", "loss of consciousness"),
    ("blackout", "loss of consciousness"),
    ("blacked out", "loss of consciousness"),
];

/// A phrase whose presence in the narrative forces high risk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EscalationTrigger {
    /// Matched as a lower-case substring of the narrative
    pub phrase: String,
    /// Clinical flag added to `red_flags`
    pub label: String,
}

impl EscalationTrigger {
    pub fn new(phrase: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            phrase: normalize(&phrase.into()),
            label: label.into(),
        }
    }
}

/// Outcome of one escalation pass.
#[derive(Debug, Clone, PartialEq)]
pub struct Escalation {
    pub assessment: RiskAssessment,
    /// Labels that fired, in table order, deduplicated
    pub triggered: Vec<String>,
}

impl Escalation {
    pub fn fired(&self) -> bool {
        !self.triggered.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct RiskEscalationEngine {
    triggers: Vec<EscalationTrigger>,
}

impl RiskEscalationEngine {
    pub fn new() -> Self {
        Self {
            triggers: BUILTIN_TRIGGERS
                .iter()
                .map(|(phrase, label)| EscalationTrigger::new(*phrase, *label))
                .collect(),
        }
    }

    /// Built-in table plus extra pairs. Built-ins cannot be removed.
    pub fn with_extra_triggers(extra: impl IntoIterator<Item = EscalationTrigger>) -> Self {
        let mut engine = Self::new();
        for trigger in extra {
            let trigger = EscalationTrigger::new(trigger.phrase, trigger.label);
            if trigger.phrase.is_empty() || engine.triggers.contains(&trigger) {
                continue;
            }
            engine.triggers.push(trigger);
        }
        engine
    }

    pub fn triggers(&self) -> &[EscalationTrigger] {
        &self.triggers
    }

    /// Labels whose phrase occurs in the narrative.
    pub fn detect(&self, narrative: &str) -> Vec<String> {
        let text = normalize(narrative);
        let mut labels: Vec<String> = Vec::new();
        for trigger in &self.triggers {
            if text.contains(&trigger.phrase) && !labels.contains(&trigger.label) {
                labels.push(trigger.label.clone());
            }
        }
        labels
    }

    /// Never-downgrade merge of the deterministic triggers into `assessment`.
    /// Returns a new value; the input is left as it was for auditing.
    pub fn apply(&self, narrative: &str, assessment: &RiskAssessment) -> Escalation {
        let triggered = self.detect(narrative);
        let mut escalated = assessment.clone();

        if triggered.is_empty() {
            debug!("no deterministic risk triggers");
            return Escalation {
                assessment: escalated,
                triggered,
            };
        }

        escalated.risk_level = escalated.risk_level.max(RiskLevel::High);
        escalated.urgency_score = escalated.urgency_score.max(ESCALATED_URGENCY);

        for label in &triggered {
            if !escalated.red_flags.contains(label) {
                escalated.red_flags.push(label.clone());
            }
        }
        if !escalated.red_flags.iter().any(|f| f == ESCALATION_MARKER) {
            escalated.red_flags.push(ESCALATION_MARKER.to_string());
        }

        if !escalated.rationale.to_lowercase().contains(RATIONALE_GUARD) {
            escalated.rationale = if escalated.rationale.trim().is_empty() {
                RATIONALE_SUFFIX.to_string()
            } else {
                format!("{} {}", escalated.rationale.trim(), RATIONALE_SUFFIX)
            };
        }

        info!(
            from = %assessment.risk_level,
            to = %escalated.risk_level,
            triggers = triggered.len(),
            "deterministic risk override applied"
        );

        Escalation {
            assessment: escalated,
            triggered,
        }
    }
}

impl Default for RiskEscalationEngine {
    fn default() -> Self {
        Self::new()
    }
}

fn normalize(text: &str) -> String {
    text.to_lowercase().replace(['\u{2019}', '\u{2018}', '`'], "'")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assessment(level: RiskLevel, urgency: f64) -> RiskAssessment {
        RiskAssessment {
            risk_level: level,
            urgency_score: urgency,
            red_flags: vec!["reported pain".to_string()],
            rationale: "Model rationale.".to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_chest_pain_and_breathing_escalate() {
        let engine = RiskEscalationEngine::new();
        let result = engine.apply("I have chest pain and can\u{2019}t breathe", &assessment(RiskLevel::Low, 0.1));

        assert!(result.fired());
        let a = &result.assessment;
        assert_eq!(a.risk_level, RiskLevel::High);
        assert!(a.urgency_score >= ESCALATED_URGENCY);
        assert_eq!(a.red_flags[0], "reported pain");
        assert!(a.red_flags.iter().any(|f| f.starts_with("chest pain")));
        assert!(a.red_flags.contains(&"subjective inability to breathe".to_string()));
        assert_eq!(a.red_flags.last().map(String::as_str), Some(ESCALATION_MARKER));
        assert!(a.rationale.starts_with("Model rationale."));
        assert!(a.rationale.ends_with(RATIONALE_SUFFIX));
    }

    #[test]
    fn test_no_trigger_passes_through() {
        let engine = RiskEscalationEngine::new();
        let original = assessment(RiskLevel::Low, 0.2);
        let result = engine.apply("My knee has been a little stiff for a week", &original);
        assert!(!result.fired());
        assert_eq!(result.assessment, original);
    }

    #[test]
    fn test_never_downgrades() {
        let engine = RiskEscalationEngine::new();
        for level in [RiskLevel::Low, RiskLevel::Moderate, RiskLevel::High] {
            for urgency in [0.0, 0.5, 0.95] {
                let input = assessment(level, urgency);
                for text in ["I fainted at work", "sore throat"] {
                    let out = engine.apply(text, &input).assessment;
                    assert!(out.risk_level >= input.risk_level);
                    assert!(out.urgency_score >= input.urgency_score);
                }
            }
        }
        let high = assessment(RiskLevel::High, 0.95);
        assert_eq!(engine.apply("I passed out", &high).assessment.urgency_score, 0.95);
    }

    #[test]
    fn test_idempotent() {
        let engine = RiskEscalationEngine::new();
        let narrative = "Sudden weakness and slurred speech, then I passed out";
        let once = engine.apply(narrative, &assessment(RiskLevel::Moderate, 0.4)).assessment;
        let twice = engine.apply(narrative, &once).assessment;
        assert_eq!(once, twice);
        assert_eq!(once.red_flags.iter().filter(|f| *f == ESCALATION_MARKER).count(), 1);
    }

    #[test]
    fn test_rationale_guard_is_case_insensitive() {
        let engine = RiskEscalationEngine::new();
        let mut input = assessment(RiskLevel::High, 0.9);
        input.rationale = "Already noted: DETERMINISTIC_OVERRIDE applied".to_string();
        let out = engine.apply("seizure last night", &input).assessment;
        assert_eq!(out.rationale, input.rationale);
    }

    #[test]
    fn test_fit_does_not_match_inside_words() {
        let engine = RiskEscalationEngine::new();
        assert!(engine.detect("No benefit from resting").is_empty());
        assert_eq!(engine.detect("She had a fit yesterday"), vec!["possible seizure activity"]);
    }

    #[test]
    fn test_extra_triggers_are_additive() {
        let engine = RiskEscalationEngine::with_extra_triggers(vec![
            EscalationTrigger::new("Coughing Blood", "haemoptysis"),
            EscalationTrigger::new("chest pain", "chest pain with possible cardiac or pulmonary aetiology"),
        ]);
        assert_eq!(engine.triggers().len(), BUILTIN_TRIGGERS.len() + 1);
        assert_eq!(engine.detect("I keep coughing blood"), vec!["haemoptysis"]);
        assert!(!engine.detect("chest pain").is_empty());
    }
}
