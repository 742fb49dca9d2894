//! Safety Module
//!
//! Deterministic guardrails applied to every pipeline result: forbidden
//! language sanitization, mandatory disclaimers and uncertainty flagging,
//! plus the never-downgrade risk escalation rules.

mod content_filter;
mod escalation;

pub use content_filter::{ForbiddenTermFilter, Sanitized, TermCategory, TermMatch};
pub use escalation::{
    Escalation, EscalationTrigger, RiskEscalationEngine, ESCALATED_URGENCY, ESCALATION_MARKER, RATIONALE_SUFFIX,
};

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::{debug, warn};

use crate::orchestrator::UnifiedResult;

/// Always present in `notes`, exactly once each.
pub const REQUIRED_DISCLAIMERS: [&str; 3] = [
    "This is a support tool, not a diagnostic system",
    "Always correlate with clinical examination",
    "Interpret in full clinical context",
];

/// Used when no agent reported any uncertainty.
pub const DEFAULT_UNCERTAINTIES: [&str; 3] = [
    "Symptom onset not clearly specified",
    "Severity and progression unclear",
    "Full clinical context required",
];

pub const NON_CLINICAL_UNCERTAINTY: &str = "Narrative appears non-clinical (e.g. general knowledge or \
non-health-related content); confirm context before interpreting output.";

const NON_CLINICAL_PHRASE: &str = "no clinical information";

lazy_static! {
    static ref HEDGE_PATTERN: Regex = Regex::new(r"(?i)\b(could|might|may)\b").unwrap();
}

/// A forbidden term found in a named result field.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GuardrailViolation {
    pub field: String,
    pub category: TermCategory,
    pub term: String,
}

impl std::fmt::Display for GuardrailViolation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} term found in {}: {}", self.category, self.field, self.term)
    }
}

/// What one guardrail pass changed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GuardrailReport {
    pub violations: Vec<GuardrailViolation>,
    pub disclaimers_added: usize,
    pub uncertainties_added: usize,
}

impl GuardrailReport {
    /// Nothing was rewritten or added.
    pub fn is_clean(&self) -> bool {
        self.violations.is_empty() && self.disclaimers_added == 0 && self.uncertainties_added == 0
    }
}

/// Result of checking a standalone text, e.g. comparison output.
#[derive(Debug, Clone, PartialEq)]
pub struct SpotCheck {
    /// Sanitized text
    pub text: String,
    pub violations: Vec<GuardrailViolation>,
    /// Uses conditional modality ("could", "might", "may")
    pub hedged: bool,
}

/// Post-processing pass over a `UnifiedResult`. Idempotent: a second `apply`
/// on the same result reports nothing and changes nothing.
#[derive(Debug, Clone, Default)]
pub struct Guardrails {
    filter: ForbiddenTermFilter,
}

impl Guardrails {
    pub fn new() -> Self {
        Self {
            filter: ForbiddenTermFilter::new(),
        }
    }

    pub fn apply(&self, result: &mut UnifiedResult) -> GuardrailReport {
        let violations = self.sanitize_result(result);
        for violation in &violations {
            warn!("guardrail rewrite: {}", violation);
            if !result.safety_violations.contains(violation) {
                result.safety_violations.push(violation.clone());
            }
        }

        let disclaimers_added = inject_disclaimers(&mut result.notes);
        let uncertainties_added = enforce_uncertainties(result);
        result.processing_metadata.guardrails_applied = true;

        debug!(
            violations = violations.len(),
            disclaimers_added, uncertainties_added, "guardrails applied"
        );

        GuardrailReport {
            violations,
            disclaimers_added,
            uncertainties_added,
        }
    }

    /// Sanitize a standalone text under `field` and report its modality.
    pub fn spot_check(&self, field: &str, text: &str) -> SpotCheck {
        let mut violations = Vec::new();
        let mut text = text.to_string();
        self.sanitize_field(field, &mut text, &mut violations);
        SpotCheck {
            hedged: HEDGE_PATTERN.is_match(&text),
            text,
            violations,
        }
    }

    fn sanitize_result(&self, result: &mut UnifiedResult) -> Vec<GuardrailViolation> {
        let mut violations = Vec::new();

        let summary = &mut result.summary;
        self.sanitize_field("summary.full_summary", &mut summary.full_summary, &mut violations);

        let s = &mut summary.structured;
        for (field, text) in [
            ("summary.structured.presenting_description", &mut s.presenting_description),
            ("summary.structured.symptom_interpretation", &mut s.symptom_interpretation),
            ("summary.structured.emotional_state", &mut s.emotional_state),
            ("summary.structured.risk_assessment", &mut s.risk_assessment),
            ("summary.structured.clinical_impression", &mut s.clinical_impression),
        ] {
            self.sanitize_field(field, text, &mut violations);
        }
        for text in s.uncertainties.iter_mut() {
            self.sanitize_field("summary.structured.uncertainties", text, &mut violations);
        }
        for text in s.notes_for_clinician.iter_mut() {
            self.sanitize_field("summary.structured.notes_for_clinician", text, &mut violations);
        }

        self.sanitize_field(
            "metaphor.clinical_translation",
            &mut result.metaphor.clinical_translation,
            &mut violations,
        );
        for text in result.metaphor.uncertainties.iter_mut() {
            self.sanitize_field("metaphor.uncertainties", text, &mut violations);
        }

        let risk = &mut result.risk.assessment;
        self.sanitize_field("risk.rationale", &mut risk.rationale, &mut violations);
        for text in risk.red_flags.iter_mut() {
            self.sanitize_field("risk.red_flags", text, &mut violations);
        }
        for text in risk.missing_info.iter_mut() {
            self.sanitize_field("risk.missing_info", text, &mut violations);
        }

        let emotions = &mut result.emotions;
        self.sanitize_field("emotions.summary", &mut emotions.summary, &mut violations);
        for (field, signals) in [
            ("emotions.emotions", &mut emotions.emotions),
            ("emotions.all_emotions", &mut emotions.all_emotions),
        ] {
            for signal in signals.iter_mut() {
                self.sanitize_field(&format!("{}.clinical_term", field), &mut signal.clinical_term, &mut violations);
                self.sanitize_field(&format!("{}.evidence", field), &mut signal.evidence, &mut violations);
            }
        }

        for text in result.uncertainties.iter_mut() {
            self.sanitize_field("uncertainties", text, &mut violations);
        }
        for text in result.notes.iter_mut() {
            if !REQUIRED_DISCLAIMERS.contains(&text.as_str()) {
                self.sanitize_field("notes", text, &mut violations);
            }
        }

        violations
    }

    fn sanitize_field(&self, field: &str, text: &mut String, violations: &mut Vec<GuardrailViolation>) {
        if text.is_empty() {
            return;
        }
        let sanitized = self.filter.sanitize(text);
        if sanitized.matches.is_empty() {
            return;
        }
        for m in sanitized.matches {
            let violation = GuardrailViolation {
                field: field.to_string(),
                category: m.category,
                term: m.term.to_string(),
            };
            if !violations.contains(&violation) {
                violations.push(violation);
            }
        }
        *text = sanitized.text;
    }
}

fn inject_disclaimers(notes: &mut Vec<String>) -> usize {
    let mut seen = HashSet::new();
    notes.retain(|n| !REQUIRED_DISCLAIMERS.contains(&n.as_str()) || seen.insert(n.clone()));

    let mut added = 0;
    for disclaimer in REQUIRED_DISCLAIMERS {
        if !notes.iter().any(|n| n == disclaimer) {
            notes.push(disclaimer.to_string());
            added += 1;
        }
    }
    added
}

fn enforce_uncertainties(result: &mut UnifiedResult) -> usize {
    let mut added = 0;
    if result.uncertainties.is_empty() {
        result.uncertainties = DEFAULT_UNCERTAINTIES.iter().map(|u| u.to_string()).collect();
        added += DEFAULT_UNCERTAINTIES.len();
    }

    let risk = &result.risk.assessment;
    let non_clinical = risk.non_clinical || risk.rationale.to_lowercase().contains(NON_CLINICAL_PHRASE);
    if non_clinical && !result.uncertainties.iter().any(|u| u == NON_CLINICAL_UNCERTAINTY) {
        result.uncertainties.push(NON_CLINICAL_UNCERTAINTY.to_string());
        added += 1;
    }
    added
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::{EmotionSignal, MetaphorResult, RiskLevel, RiskResult, SynthesisResult};
    use crate::orchestrator::{AgentReasoning, ProcessingMetadata};

    fn result() -> UnifiedResult {
        let mut summary = SynthesisResult::default();
        summary.full_summary = "Diagnosis deferred. Treatment not discussed.".to_string();
        summary.structured.clinical_impression = "Possible disorder of the knee".to_string();

        let mut risk = RiskResult::default();
        risk.assessment.risk_level = RiskLevel::High;
        risk.assessment.rationale = "Symptoms suggest a cardiac condition".to_string();

        UnifiedResult {
            patient_voice: "my chest hurts".to_string(),
            metaphor: MetaphorResult {
                clinical_translation: "Patient reports pain; therapy unclear".to_string(),
                ..Default::default()
            },
            emotions: Default::default(),
            risk,
            summary,
            agent_reasoning: AgentReasoning::default(),
            processing_metadata: ProcessingMetadata::new(vec![], true),
            uncertainties: vec![],
            notes: vec!["Ask about medication history".to_string()],
            safety_violations: vec![],
        }
    }

    #[test]
    fn test_sanitizes_all_text_fields() {
        let guardrails = Guardrails::new();
        let mut r = result();
        let report = guardrails.apply(&mut r);

        assert_eq!(r.summary.full_summary, "Clinical impression deferred. Management not discussed.");
        assert_eq!(r.summary.structured.clinical_impression, "Possible presentation of the knee");
        assert_eq!(r.metaphor.clinical_translation, "Patient reports pain; support unclear");
        assert_eq!(r.risk.assessment.rationale, "Symptoms suggest a cardiac state");
        assert_eq!(r.notes[0], "Ask about management history");
        assert_eq!(r.risk.assessment.risk_level, RiskLevel::High);

        assert!(report
            .violations
            .iter()
            .any(|v| v.field == "summary.full_summary" && v.term == "diagnosis" && v.category == TermCategory::Diagnostic));
        assert!(report.violations.iter().any(|v| v.field == "notes" && v.category == TermCategory::Treatment));
        assert_eq!(r.safety_violations, report.violations);
    }

    #[test]
    fn test_sanitizes_agent_lists_and_signals() {
        let guardrails = Guardrails::new();
        let mut r = result();
        r.metaphor.uncertainties = vec!["Prior diagnoses unknown".to_string()];
        r.risk.assessment.red_flags = vec!["Stopped medication abruptly".to_string()];
        r.risk.assessment.missing_info = vec!["Current treatments".to_string()];
        let signal = EmotionSignal {
            emotion: "fear".to_string(),
            intensity: 0.8,
            clinical_term: "Disease-related anxiety".to_string(),
            evidence: "worried about surgery".to_string(),
            ..Default::default()
        };
        r.emotions.emotions = vec![signal.clone()];
        r.emotions.all_emotions = vec![signal];
        r.emotions.summary = "Marked disease-related anxiety".to_string();

        let report = guardrails.apply(&mut r);

        assert_eq!(r.metaphor.uncertainties, vec!["Prior clinical impressions unknown"]);
        assert_eq!(r.risk.assessment.red_flags, vec!["Stopped management abruptly"]);
        assert_eq!(r.risk.assessment.missing_info, vec!["Current management"]);
        for signal in r.emotions.emotions.iter().chain(&r.emotions.all_emotions) {
            assert_eq!(signal.clinical_term, "Presentation-related anxiety");
            assert_eq!(signal.evidence, "worried about specialist review");
        }
        assert_eq!(r.emotions.summary, "Marked presentation-related anxiety");
        for field in ["metaphor.uncertainties", "risk.red_flags", "risk.missing_info", "emotions.all_emotions.evidence"] {
            assert!(report.violations.iter().any(|v| v.field == field), "no violation for {}", field);
        }

        let snapshot = r.clone();
        assert!(guardrails.apply(&mut r).is_clean());
        assert_eq!(r, snapshot);
    }

    #[test]
    fn test_disclaimers_and_default_uncertainties() {
        let guardrails = Guardrails::new();
        let mut r = result();
        r.notes.push(REQUIRED_DISCLAIMERS[1].to_string());
        r.notes.push(REQUIRED_DISCLAIMERS[1].to_string());

        let report = guardrails.apply(&mut r);
        for disclaimer in REQUIRED_DISCLAIMERS {
            assert_eq!(r.notes.iter().filter(|n| *n == disclaimer).count(), 1);
        }
        assert_eq!(report.disclaimers_added, 2);
        assert_eq!(r.uncertainties, DEFAULT_UNCERTAINTIES.map(String::from).to_vec());
        assert!(r.processing_metadata.guardrails_applied);
    }

    #[test]
    fn test_non_clinical_uncertainty() {
        let guardrails = Guardrails::new();

        let mut flagged = result();
        flagged.risk.assessment.non_clinical = true;
        flagged.uncertainties = vec!["Onset unclear".to_string()];
        guardrails.apply(&mut flagged);
        assert_eq!(flagged.uncertainties, vec!["Onset unclear".to_string(), NON_CLINICAL_UNCERTAINTY.to_string()]);

        let mut phrased = result();
        phrased.risk.assessment.rationale = "The text contains No Clinical Information.".to_string();
        guardrails.apply(&mut phrased);
        assert_eq!(phrased.uncertainties.last().map(String::as_str), Some(NON_CLINICAL_UNCERTAINTY));
        assert_eq!(phrased.risk.assessment.risk_level, RiskLevel::High);
    }

    #[test]
    fn test_apply_is_idempotent() {
        let guardrails = Guardrails::new();
        let mut r = result();
        r.risk.assessment.non_clinical = true;
        guardrails.apply(&mut r);
        let snapshot = r.clone();

        let second = guardrails.apply(&mut r);
        assert!(second.is_clean());
        assert_eq!(r, snapshot);
    }

    #[test]
    fn test_spot_check() {
        let guardrails = Guardrails::new();
        let check = guardrails.spot_check("comparison.baseline_consequences", "- Symptoms could worsen without treatment");
        assert!(check.hedged);
        assert_eq!(check.text, "- Symptoms could worsen without management");
        assert_eq!(check.violations.len(), 1);

        let plain = guardrails.spot_check("comparison.what_if_explanation", "Symptoms will worsen.");
        assert!(!plain.hedged);
        assert!(plain.violations.is_empty());
    }
}
