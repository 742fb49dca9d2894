//! Risk & Red-Flag Agent - assesses clinical urgency from the narrative.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::types::{AgentConfig, AgentKind, Confidence};
use super::{format_matches, Agent, LLMProvider, ReasoningEngine};
use crate::ontology::OntologyLookup;

/// Totally ordered urgency: `Low < Moderate < High`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", from = "String")]
pub enum RiskLevel {
    #[default]
    Low,
    Moderate,
    High,
}

impl RiskLevel {
    /// Lenient parse; unknown values are `Low` and left to the escalation rules.
    pub fn parse(value: &str) -> Self {
        let v = value.trim().to_lowercase();
        if v.contains("high") {
            RiskLevel::High
        } else if v.contains("moderate") || v.contains("medium") {
            RiskLevel::Moderate
        } else {
            RiskLevel::Low
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLevel::Low => "low",
            RiskLevel::Moderate => "moderate",
            RiskLevel::High => "high",
        }
    }
}

impl From<String> for RiskLevel {
    fn from(value: String) -> Self {
        RiskLevel::parse(&value)
    }
}

impl std::fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The risk agent's structured contract; also the unit the escalation
/// engine merges against.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RiskAssessment {
    pub risk_level: RiskLevel,
    pub confidence: Confidence,
    /// Ordered; escalation notes are appended last
    pub red_flags: Vec<String>,
    pub missing_info: Vec<String>,
    pub rationale: String,
    /// 0.0 - 1.0
    pub urgency_score: f64,
    /// Set when the text carries no health-related content at all
    pub non_clinical: bool,
}

impl RiskAssessment {
    fn normalized(mut self) -> Self {
        self.urgency_score = if self.urgency_score.is_finite() {
            self.urgency_score.clamp(0.0, 1.0)
        } else {
            0.0
        };
        self.rationale = self.rationale.trim().to_string();
        self
    }
}

/// Risk agent output
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RiskResult {
    pub reasoning: String,
    #[serde(flatten)]
    pub assessment: RiskAssessment,
    pub rag_matches: Vec<String>,
    pub degraded: bool,
}

impl RiskResult {
    /// Same result with a replaced assessment; the original is left untouched.
    pub fn with_assessment(&self, assessment: RiskAssessment) -> Self {
        Self {
            assessment,
            ..self.clone()
        }
    }

    pub fn without_reasoning(&self) -> Self {
        Self {
            reasoning: String::new(),
            ..self.clone()
        }
    }
}

pub struct RiskAgent {
    engine: ReasoningEngine,
    ontology: Arc<dyn OntologyLookup>,
}

impl RiskAgent {
    pub fn new(provider: Arc<dyn LLMProvider>, ontology: Arc<dyn OntologyLookup>, config: &AgentConfig) -> Self {
        Self {
            engine: ReasoningEngine::from_config(provider, config),
            ontology,
        }
    }

    pub fn with_defaults(provider: Arc<dyn LLMProvider>, ontology: Arc<dyn OntologyLookup>) -> Self {
        Self::new(provider, ontology, &AgentConfig::new(AgentKind::Risk))
    }
}

#[async_trait]
impl Agent for RiskAgent {
    type Input = str;
    type Output = RiskResult;

    fn kind(&self) -> AgentKind {
        AgentKind::Risk
    }

    fn engine(&self) -> &ReasoningEngine {
        &self.engine
    }

    fn ontology(&self) -> &dyn OntologyLookup {
        self.ontology.as_ref()
    }

    async fn execute(&self, narrative: &str) -> RiskResult {
        let reasoning = self.reason(narrative).await;
        let rag_matches = self.use_ontology(narrative);

        let prompt = format!(
            r#"Assess clinical risk and urgency from the patient narrative.

Patient narrative: {}

Relevant risk indicators: {}

Provide:
1. Risk level (low/moderate/high)
2. Confidence level (high/medium/low)
3. Red flags identified (list)
4. Missing information that affects assessment
5. Rationale for risk level
6. Urgency score between 0.0 and 1.0
7. non_clinical: true only if the text contains no clinical information at all"#,
            narrative,
            format_matches(&rag_matches)
        );

        let structured = self.engine.complete_structured(&prompt, RiskAssessment::default()).await;

        RiskResult {
            reasoning,
            assessment: structured.value.normalized(),
            rag_matches,
            degraded: structured.degraded,
        }
    }
}
