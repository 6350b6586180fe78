//! CLI command implementations
//!
//! Each `execute_*` function handles one subcommand. Output goes to stdout;
//! errors are returned to `run()`, which owns error reporting.

use anyhow::{Context, Result};

use llmcompare_engine::{
    BaselineOptions, CompareOptions, InputsSource, TargetOptions, Workflow, feature_overview,
};

use super::args::{ModeArg, PhaseArg};
use crate::{Config, LlmCompareError, emit_jcs};

/// Options of `llmcompare run`, as parsed
#[derive(Debug, Clone)]
pub struct RunArgs {
    pub phase: PhaseArg,
    pub mode: ModeArg,
    pub num_patterns: Option<usize>,
    pub inputs: Option<std::path::PathBuf>,
    pub skip_evaluation: bool,
    pub baseline: Option<String>,
    pub allow_partial: bool,
}

/// Workflow for the feature given on the command line or in config
fn workflow(config: &Config) -> Result<Workflow> {
    let feature = config
        .default_feature()
        .map_err(LlmCompareError::from)?
        .name
        .clone();
    Ok(Workflow::new(config.clone(), &feature)?)
}

// ============================================================================
// Run Command
// ============================================================================

pub async fn execute_run_command(args: RunArgs, config: &Config) -> Result<()> {
    let wf = workflow(config)?;
    let feature = wf.feature().name.clone();

    match args.phase {
        PhaseArg::Baseline => {
            let inputs = match args.inputs {
                Some(path) => InputsSource::File(path),
                None => InputsSource::Generate,
            };
            let record = wf
                .run_baseline(BaselineOptions {
                    num_patterns: args.num_patterns,
                    inputs,
                    skip_evaluation: args.skip_evaluation,
                })
                .await?;
            println!(
                "✓ Baseline {} created for {feature} ({} inputs, {}, {})",
                record.id, record.num_inputs, record.state, record.llm_version
            );
        }
        PhaseArg::Target => {
            if args.inputs.is_some() {
                tracing::warn!("--inputs only applies to the baseline phase; ignoring it");
            }
            let target = wf
                .run_target(TargetOptions {
                    mode: args.mode.into(),
                    num_patterns: args.num_patterns,
                    skip_evaluation: args.skip_evaluation,
                    baseline: args.baseline,
                })
                .await?;
            println!(
                "✓ Target {} created for {feature} ({} inputs, {} failed, {})",
                target.id,
                target.size(),
                target.summary.failed_calls,
                target.llm_version
            );
            if let Some(m) = &target.metrics {
                println!("  Overall score: {:.3}", m.overall);
            }
        }
        PhaseArg::Compare => {
            let outcome = wf
                .run_compare(CompareOptions {
                    allow_partial: args.allow_partial,
                })
                .await?;
            let report = &outcome.report;
            println!(
                "✓ Comparison for {feature}: {} ({} confidence)",
                report.decision.decision, report.decision.confidence
            );
            println!("  {}", report.decision.rationale);
            println!("  Overall: {:.3}", report.metrics.overall);
            if report.partial {
                println!("  Partial report: a metric group is missing");
            }
            for (i, rec) in report.recommendations.iter().enumerate() {
                println!("  {}. {rec}", i + 1);
            }
            println!("  JSON: {}", outcome.report_ref.json_path);
            println!("  HTML: {}", outcome.report_ref.html_path);
        }
    }
    Ok(())
}

// ============================================================================
// Status / Baselines
// ============================================================================

pub fn execute_status_command(json: bool, config: &Config) -> Result<()> {
    let status = workflow(config)?.status()?;
    if json {
        println!("{}", emit_jcs(&status).context("Failed to emit status JSON")?);
    } else {
        print!("{}", status.render_text());
    }
    Ok(())
}

pub fn execute_baselines_command(json: bool, config: &Config) -> Result<()> {
    let wf = workflow(config)?;
    let baselines = wf.baselines()?;
    if json {
        println!(
            "{}",
            emit_jcs(&baselines).context("Failed to emit baselines JSON")?
        );
        return Ok(());
    }

    if baselines.is_empty() {
        println!("No baselines for {}", wf.feature().name);
        return Ok(());
    }
    let selected = wf.status()?.selected_baseline_id;
    for b in &baselines {
        let marker = if selected.as_deref() == Some(b.id.as_str()) {
            "*"
        } else {
            " "
        };
        println!(
            "{marker} {}  {}  {:>4} inputs  {}  {}  {}",
            b.id,
            b.created_at.format("%Y-%m-%d %H:%M:%S"),
            b.num_inputs,
            b.state,
            b.origin,
            b.llm_version
        );
    }
    Ok(())
}

// ============================================================================
// Promote / Select
// ============================================================================

pub async fn execute_promote_command(config: &Config) -> Result<()> {
    let wf = workflow(config)?;
    let record = wf.promote_target_to_baseline().await?;
    println!(
        "✓ Target promoted to baseline {} for {} (selected)",
        record.id,
        wf.feature().name
    );
    Ok(())
}

pub async fn execute_select_baseline_command(id: &str, config: &Config) -> Result<()> {
    let wf = workflow(config)?;
    wf.select_baseline(id).await?;
    println!("✓ Selected baseline {id} for {}", wf.feature().name);
    Ok(())
}

// ============================================================================
// List Features
// ============================================================================

pub fn execute_list_features_command(json: bool, config: &Config) -> Result<()> {
    let features = feature_overview(config)?;
    if json {
        println!(
            "{}",
            emit_jcs(&features).context("Failed to emit features JSON")?
        );
        return Ok(());
    }
    for f in &features {
        let phase = f
            .phase
            .as_ref()
            .map_or_else(|| "-".to_string(), ToString::to_string);
        println!("{:<16} {:<16} {:<18} {}", f.name, f.prompt_id, phase, f.description);
    }
    Ok(())
}
