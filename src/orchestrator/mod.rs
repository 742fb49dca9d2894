//! Orchestrator Module
//!
//! Runs the agents in their fixed order, merges their results and applies
//! the deterministic safety layers.

mod comparative;
mod pipeline;
mod result;

pub use pipeline::Orchestrator;
pub use result::{
    AgentReasoning, ComparisonResult, Differential, EmotionChange, NarrativeInput, PipelineStage, ProcessingMetadata,
    RiskOverride, UnifiedResult,
};
