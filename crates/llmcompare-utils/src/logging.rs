//! Logging and observability for llmcompare
//!
//! Structured `tracing` output with a compact formatter. Workflow phases are
//! wrapped in a span carrying `feature` and `phase` so every gateway call and
//! store write logged inside a phase inherits them.

use crate::redaction::redact_secrets;
use tracing::{Level, error, info, span};
use tracing_subscriber::{
    EnvFilter,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

/// Initialize the global tracing subscriber.
///
/// `RUST_LOG` wins when set. Otherwise llmcompare logs at info (debug with
/// `verbose`) and everything else at warn. Calling this twice returns an error
/// from the second call.
pub fn init_tracing(verbose: bool) -> Result<(), Box<dyn std::error::Error>> {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| {
            if verbose {
                EnvFilter::try_new("llmcompare=debug,warn")
            } else {
                EnvFilter::try_new("llmcompare=info,warn")
            }
        })
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(verbose)
        .with_thread_ids(false)
        .with_thread_names(false)
        .with_line_number(false)
        .with_file(false);

    if verbose {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(layer.with_span_events(FmtSpan::CLOSE).compact())
            .try_init()?;
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(layer.compact())
            .try_init()?;
    }

    Ok(())
}

/// Span for one workflow phase run
pub fn phase_span(feature: &str, phase: &str) -> tracing::Span {
    span!(Level::INFO, "phase", feature = %feature, phase = %phase)
}

pub fn log_phase_start(feature: &str, phase: &str) {
    info!(feature = %feature, phase = %phase, "Starting phase");
}

pub fn log_phase_complete(feature: &str, phase: &str, duration_ms: u128) {
    info!(feature = %feature, phase = %phase, duration_ms = %duration_ms, "Phase completed");
}

/// Log a phase failure. The message is redacted before it is emitted.
pub fn log_phase_error(feature: &str, phase: &str, error: &str, duration_ms: u128) {
    let sanitized_error = redact_secrets(error);
    error!(
        feature = %feature,
        phase = %phase,
        duration_ms = %duration_ms,
        error = %sanitized_error,
        "Phase failed"
    );
}
