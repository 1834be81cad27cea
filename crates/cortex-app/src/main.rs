//! Cortex application binary - composition root.
//!
//! 1. Parse arguments and load configuration from TOML
//! 2. Initialise tracing (stderr, so stdout stays machine-readable)
//! 3. Build the pipeline (reflex -> orchestrator), chain driver and nudge engine
//! 4. Run the requested command

mod cli;
mod repl;

use clap::Parser;
use cortex_chain::ChainDriver;
use cortex_core::config::CortexConfig;
use cortex_core::telemetry::Telemetry;
use cortex_nudge::NudgeEngine;
use cortex_orchestrator::CortexPipeline;

use crate::cli::{CliArgs, Command};
use crate::repl::Session;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = CliArgs::parse();

    // Config.
    let config_file = args.resolve_config_path();
    let config = CortexConfig::load_or_default(&config_file);

    // Tracing.
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new(
            args.resolve_log_level(&config.general.log_level),
        ))
        .with_writer(std::io::stderr)
        .init();

    tracing::info!("Starting Cortex v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!(path = %config_file.display(), "Configuration loaded");

    let telemetry = Telemetry::new(config.telemetry.clone());

    match &args.command {
        Command::Rules => {
            let engine = NudgeEngine::from_config(&config.nudge);
            if !engine.is_enabled() {
                println!("(nudges disabled in config)");
            }
            for rule in engine.rules() {
                println!(
                    "{:<26} {:<6} {:<20} {:<5} {}",
                    rule.id,
                    rule.priority.to_string(),
                    rule.trigger.intent.to_string(),
                    if rule.enabled { "on" } else { "off" },
                    rule.suggestion.message
                );
            }
        }
        Command::Classify { .. } => {
            let pipeline = CortexPipeline::from_config(&config)?;
            let text = args.command.utterance().unwrap_or_default();
            let result = pipeline.classify(&text);
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        Command::Resolve { .. } => {
            let pipeline = CortexPipeline::from_config(&config)?;
            let text = args.command.utterance().unwrap_or_default();
            let outcome = pipeline.process(&text, &args.session_context()).await;
            println!("{}", serde_json::to_string_pretty(&outcome)?);
        }
        Command::Repl => {
            let pipeline = CortexPipeline::from_config(&config)?;
            tracing::info!(model = pipeline.orchestrator().model_name(), "Pipeline ready");
            let session = Session::new(
                pipeline,
                ChainDriver::new(&config.chain).with_telemetry(telemetry.clone()),
                NudgeEngine::from_config(&config.nudge).with_telemetry(telemetry),
                args.session_context(),
            );
            repl::run(session).await?;
        }
    }

    Ok(())
}
