use serde::{Deserialize, Serialize};

use crate::ontology::OntologyCategory;

/// The reasoning agents of the pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentKind {
    Metaphor,
    Emotion,
    Risk,
    Synthesis,
    Comparison,
}

impl AgentKind {
    /// Get the default model for this agent kind
    pub fn default_model(&self) -> &'static str {
        match self {
            AgentKind::Metaphor => "llama3.2:3b",
            AgentKind::Emotion => "llama3.2:3b",
            AgentKind::Risk => "qwen3:8b",
            AgentKind::Synthesis => "qwen3:8b",
            AgentKind::Comparison => "qwen3:8b",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            AgentKind::Metaphor => "Metaphor Translation Agent",
            AgentKind::Emotion => "Emotional Biomarker Agent",
            AgentKind::Risk => "Risk & Red-Flag Agent",
            AgentKind::Synthesis => "Clinical Synthesis Agent",
            AgentKind::Comparison => "What-If Comparison Agent",
        }
    }

    /// Ontology category the agent grounds its prompts in, if any.
    pub fn ontology_category(&self) -> Option<OntologyCategory> {
        match self {
            AgentKind::Metaphor => Some(OntologyCategory::Metaphors),
            AgentKind::Emotion => Some(OntologyCategory::EmotionalBiomarkers),
            AgentKind::Risk => Some(OntologyCategory::RiskIndicators),
            AgentKind::Synthesis | AgentKind::Comparison => None,
        }
    }

    pub fn system_prompt(&self) -> &'static str {
        match self {
            AgentKind::Metaphor =>
                "You are a Metaphor Translation Agent specialized in converting a patient's figurative language \
                 into neutral, non-diagnostic clinical terminology. \
                 Identify metaphorical expressions, map them to clinical concepts using the supplied ontology terms, \
                 preserve the patient's original meaning, and flag ambiguous metaphors that need clarification. \
                 CRITICAL RULES: never diagnose, never suggest treatment, use neutral and objective language, \
                 preserve patient dignity, indicate confidence levels, flag uncertainties.",

            AgentKind::Emotion =>
                "You are an Emotional Biomarker Agent specialized in identifying emotional states in patient narratives \
                 and quantifying them as clinical signals. \
                 Detect emotional states (fear, panic, sadness, anger, confusion, helplessness), quantify intensity on a \
                 0.0-1.0 scale, and map each to clinical terminology with evidence from the text. \
                 CRITICAL RULES: emotion is not pathology by default, quantify intensity objectively, \
                 flag high-intensity emotions, preserve patient dignity.",

            AgentKind::Risk =>
                "You are a Risk & Red-Flag Agent specialized in identifying clinical urgency indicators in patient narratives. \
                 Assess urgency (low/moderate/high), identify red flags, and flag ambiguities, contradictions or missing information. \
                 High risk: life-threatening symptoms, severe pain, trauma, acute distress. \
                 Moderate risk: persistent symptoms, functional impairment, worsening symptoms. \
                 Low risk: mild symptoms, stable long-standing complaints. \
                 If the text contains no health-related information at all, say so and set non_clinical to true. \
                 CRITICAL RULES: never diagnose, only assess urgency.",

            AgentKind::Synthesis =>
                "You are a Clinical Synthesis Agent specialized in creating structured, neutral clinical summaries \
                 from multiple agent analyses. \
                 Integrate metaphor, emotion and risk findings into structured documentation, separate the patient's \
                 voice from interpretation, and highlight uncertainties and information gaps. \
                 CRITICAL RULES: formal documentation style, no conversational tone, never diagnose, \
                 never suggest treatment, preserve patient dignity.",

            AgentKind::Comparison =>
                "You are a What-If Comparison Agent. You compare two analyses of patient narratives: a baseline \
                 and a hypothetical, modified narrative. \
                 Focus only on metaphor interpretation, emotional signals, risk level and red flags, and uncertainties. \
                 CRITICAL RULES: never diagnose or suggest treatment, do not name specific diseases or procedures, \
                 use neutral patient-friendly language, use conditional language (could, might, may) for any possible \
                 consequence, do not claim clinical outcomes, and always mention that the final risk assessment \
                 belongs to the clinician.",
        }
    }
}

impl std::fmt::Display for AgentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AgentKind::Metaphor => write!(f, "Metaphor"),
            AgentKind::Emotion => write!(f, "Emotion"),
            AgentKind::Risk => write!(f, "Risk"),
            AgentKind::Synthesis => write!(f, "Synthesis"),
            AgentKind::Comparison => write!(f, "Comparison"),
        }
    }
}

/// Three-step qualifier used for confidence and significance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", from = "String")]
pub enum Confidence {
    Low,
    #[default]
    Medium,
    High,
}

impl Confidence {
    /// Lenient parse: anything unrecognised is `Medium`.
    pub fn parse(value: &str) -> Self {
        let v = value.trim().to_lowercase();
        if v.contains("high") {
            Confidence::High
        } else if v.contains("low") {
            Confidence::Low
        } else {
            Confidence::Medium
        }
    }
}

impl From<String> for Confidence {
    fn from(value: String) -> Self {
        Confidence::parse(&value)
    }
}

/// Sampling settings shared by the agents.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationParams {
    /// Think-aloud pre-pass
    pub reasoning_temperature: f32,
    pub reasoning_max_tokens: u32,
    /// Schema-bound extraction
    pub structured_temperature: f32,
    pub structured_max_tokens: u32,
    /// Free-text clinical note written before synthesis extraction
    pub synthesis_temperature: f32,
    pub synthesis_max_tokens: u32,
    pub comparison_temperature: f32,
    pub comparison_max_tokens: u32,
    pub consequence_max_tokens: u32,
}

impl Default for GenerationParams {
    fn default() -> Self {
        Self {
            reasoning_temperature: 0.3,
            reasoning_max_tokens: 1000,
            structured_temperature: 0.2,
            structured_max_tokens: 1000,
            synthesis_temperature: 0.3,
            synthesis_max_tokens: 800,
            comparison_temperature: 0.2,
            comparison_max_tokens: 400,
            consequence_max_tokens: 300,
        }
    }
}

/// Configuration for an agent
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    pub kind: AgentKind,
    pub model: String,
    pub system_prompt: String,
    pub params: GenerationParams,
}

impl AgentConfig {
    pub fn new(kind: AgentKind) -> Self {
        Self {
            kind,
            model: kind.default_model().to_string(),
            system_prompt: kind.system_prompt().to_string(),
            params: GenerationParams::default(),
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_params(mut self, params: GenerationParams) -> Self {
        self.params = params;
        self
    }
}
