//! Clinical Narrative Agency
//!
//! A Rust multi-agent pipeline that interprets a patient's free-text narrative:
//! - Metaphor, emotion and risk agents running concurrently
//! - Deterministic, never-downgrade risk escalation
//! - Synthesis of a clinician-facing, non-diagnostic report
//! - Safety guardrails (forbidden language, disclaimers, uncertainty flags)
//! - What-if comparison of two narratives

pub mod agent;
pub mod config;
pub mod error;
pub mod ontology;
pub mod orchestrator;
pub mod safety;
pub mod utils;

// Re-exports for convenience
pub use agent::{AgentKind, LLMProvider, ReasoningEngine};
pub use config::{AgencyConfig, ConfigManager};
pub use error::{ConfigError, EngineError, InputError};
pub use ontology::{LocalOntology, OntologyCategory, OntologyLookup};
pub use orchestrator::{ComparisonResult, NarrativeInput, Orchestrator, UnifiedResult};
pub use safety::{Guardrails, RiskEscalationEngine};
