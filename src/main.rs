//! Clinical Narrative Agency runner
//!
//! Usage:
//!   clinical_agency [--config PATH] run <narrative>
//!   clinical_agency [--config PATH] compare <baseline> <hypothetical>
//!
//! Prints the result as JSON on stdout; logs go to stderr.

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

use clinical_agency::utils::init_logging;
use clinical_agency::{ConfigManager, NarrativeInput, OntologyLookup, Orchestrator};

const DEFAULT_CONFIG_PATH: &str = "clinical_agency.json";

#[derive(Debug, Parser)]
#[command(name = "clinical_agency")]
#[command(about = "Interprets patient narratives into a structured, non-diagnostic clinical summary")]
struct Cli {
    /// JSON configuration file, created with defaults when missing
    #[arg(long, global = true, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, PartialEq, Subcommand)]
enum Commands {
    /// Analyze one patient narrative
    Run { narrative: String },
    /// Compare a baseline narrative with a hypothetical variant
    Compare { baseline: String, hypothetical: String },
}

// ──────────────────────────────────────────────────────────────────────────────
// MAIN ENTRY POINT
// ──────────────────────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables
    dotenv::dotenv().ok();
    init_logging();

    let cli = Cli::parse();

    let config = ConfigManager::new(cli.config.clone()).load_with_env().await?;
    let provider = config.build_provider()?;
    let ontology: Arc<dyn OntologyLookup> = Arc::new(config.load_ontology().await?);
    let orchestrator = Orchestrator::new(provider, ontology, &config);

    let output = match cli.command {
        Commands::Run { narrative } => {
            let input = NarrativeInput::new(narrative)?;
            let result = orchestrator.run_input(&input).await;
            serde_json::to_string_pretty(&result)?
        }
        Commands::Compare { baseline, hypothetical } => {
            let baseline = NarrativeInput::new(baseline)?;
            let hypothetical = NarrativeInput::new(hypothetical)?;
            let result = orchestrator
                .run_comparative(baseline.as_str(), hypothetical.as_str())
                .await;
            serde_json::to_string_pretty(&result)?
        }
    };

    info!("Done");
    println!("{}", output);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_single_run() {
        let cli = Cli::try_parse_from(["clinical_agency", "run", "my chest feels tight"]).unwrap();
        assert_eq!(cli.config, PathBuf::from(DEFAULT_CONFIG_PATH));
        assert_eq!(
            cli.command,
            Commands::Run {
                narrative: "my chest feels tight".to_string()
            }
        );
    }

    #[test]
    fn test_parse_compare_with_config() {
        let cli = Cli::try_parse_from(["clinical_agency", "--config", "alt.json", "compare", "a", "b"]).unwrap();
        assert_eq!(cli.config, PathBuf::from("alt.json"));
        assert_eq!(
            cli.command,
            Commands::Compare {
                baseline: "a".to_string(),
                hypothetical: "b".to_string()
            }
        );
    }

    #[test]
    fn test_parse_rejects_bad_arity() {
        assert!(Cli::try_parse_from(["clinical_agency"]).is_err());
        assert!(Cli::try_parse_from(["clinical_agency", "compare", "only one"]).is_err());
        assert!(Cli::try_parse_from(["clinical_agency", "run", "one", "two"]).is_err());
        assert!(Cli::try_parse_from(["clinical_agency", "run", "x", "--config"]).is_err());
    }
}
