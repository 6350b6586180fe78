//! CLI entry point and dispatch logic
//!
//! This module owns the `run()` function which:
//! - Parses CLI arguments
//! - Builds CliArgs and discovers Config
//! - Creates the tokio runtime
//! - Dispatches to command handlers
//! - Handles all error output

use clap::Parser;

use llmcompare_utils::logging::init_tracing;
use llmcompare_utils::redaction::redact_secrets;

use super::args::{Cli, Commands};
use super::commands::{self, RunArgs};
use crate::{CliArgs, Config, ExitCode, LlmCompareError};

/// Main CLI execution function.
///
/// Handles ALL output including errors and returns the exit code for
/// failures. main.rs only calls `std::process::exit(code.as_i32())`.
pub fn run() -> Result<(), ExitCode> {
    let cli = Cli::parse();

    if let Err(e) = init_tracing(cli.verbose) {
        eprintln!("warning: logging not initialised: {e}");
    }

    let cli_args = CliArgs {
        config_path: cli.config.clone(),
        feature: cli.command.feature().map(str::to_string),
        num_patterns: match &cli.command {
            Commands::Run { num_patterns, .. } => *num_patterns,
            _ => None,
        },
        data_dir: cli.data_dir.clone(),
        state_dir: cli.state_dir.clone(),
        reports_dir: cli.reports_dir.clone(),
    };

    let config = match Config::discover(&cli_args) {
        Ok(config) => config,
        Err(err) => {
            let err = LlmCompareError::from(err);
            eprint!("{}", err.display_for_user());
            return Err(err.to_exit_code());
        }
    };
    tracing::debug!(
        config_path = ?config.config_path,
        data_dir = %config.defaults.data_dir.display(),
        state_dir = %config.defaults.state_dir.display(),
        "Configuration loaded"
    );

    let rt = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("✗ Failed to create async runtime: {e}");
            return Err(ExitCode::INTERNAL);
        }
    };

    let operation = cli.command.name();
    let result = rt.block_on(async {
        match cli.command {
            Commands::Run {
                phase,
                mode,
                num_patterns,
                inputs,
                skip_evaluation,
                baseline,
                allow_partial,
                ..
            } => {
                let args = RunArgs {
                    phase,
                    mode,
                    num_patterns,
                    inputs,
                    skip_evaluation,
                    baseline,
                    allow_partial,
                };
                commands::execute_run_command(args, &config).await
            }
            Commands::Status { json, .. } => commands::execute_status_command(json, &config),
            Commands::Promote { .. } => commands::execute_promote_command(&config).await,
            Commands::Baselines { json, .. } => commands::execute_baselines_command(json, &config),
            Commands::SelectBaseline { id, .. } => {
                commands::execute_select_baseline_command(&id, &config).await
            }
            Commands::ListFeatures { json } => {
                commands::execute_list_features_command(json, &config)
            }
        }
    });

    if let Err(error) = result {
        if let Some(e) = error.downcast_ref::<LlmCompareError>() {
            tracing::debug!(operation, exit_code = e.to_exit_code().as_i32(), "Command failed");
            eprint!("{}", e.display_for_user());
            return Err(e.to_exit_code());
        }
        eprintln!(
            "✗ Unexpected error during {operation}: {}",
            redact_secrets(&format!("{error:#}"))
        );
        eprintln!("\n  Run with --verbose for more detailed output");
        return Err(ExitCode::INTERNAL);
    }

    Ok(())
}
