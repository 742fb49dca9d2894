//! What-if pipeline: two full runs and a comparison of the results.

use tracing::{info, warn};

use super::pipeline::Orchestrator;
use super::result::{ComparisonResult, Differential, UnifiedResult};
use crate::agent::{Agent, ComparisonContext, ReducedAnalysis};

impl Orchestrator {
    /// Compare a baseline narrative with a modified one. Both runs are full
    /// pipeline runs with guardrails; the comparison only sees their
    /// clinical content.
    pub async fn run_comparative(&self, baseline: &str, hypothetical: &str) -> ComparisonResult {
        let identical_narratives = baseline.trim() == hypothetical.trim();
        info!(identical_narratives, "Starting comparative run");

        let (baseline, hypothetical) = tokio::join!(self.run(baseline), self.run(hypothetical));

        let context = ComparisonContext {
            baseline: reduce(&baseline),
            hypothetical: reduce(&hypothetical),
            identical_narratives,
        };
        let mut comparison = self.comparison.execute(&context).await;

        let mut safety_violations = Vec::new();
        for (field, text, expect_hedging) in [
            ("comparison.what_if_explanation", &mut comparison.what_if_explanation, false),
            ("comparison.baseline_consequences", &mut comparison.baseline_consequences, true),
            ("comparison.hypothetical_consequences", &mut comparison.hypothetical_consequences, true),
        ] {
            if text.is_empty() {
                continue;
            }
            let check = self.guardrails.spot_check(field, text);
            if expect_hedging && !check.hedged {
                warn!("{} lacks conditional phrasing", field);
            }
            for violation in check.violations {
                warn!("guardrail rewrite: {}", violation);
                if !safety_violations.contains(&violation) {
                    safety_violations.push(violation);
                }
            }
            *text = check.text;
        }

        let differential = Differential::between(&baseline, &hypothetical);
        info!(
            risk_changed = differential.risk_level_changed,
            urgency_delta = differential.urgency_delta,
            "Comparative run complete"
        );

        ComparisonResult {
            baseline,
            hypothetical,
            comparison,
            differential,
            safety_violations,
        }
    }
}

fn reduce(result: &UnifiedResult) -> ReducedAnalysis {
    ReducedAnalysis::new(&result.metaphor, &result.emotions, &result.risk, &result.summary)
}
