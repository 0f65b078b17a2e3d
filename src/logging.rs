//! Structured logging utilities for the ledger.
//!
//! Every ledger event goes through one of the helpers below so field names
//! stay consistent across registry, dispatch and verification.

use crate::config::LoggingConfig;
use crate::violation::Violation;
use crate::{LedgerError, Result};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Install a `tracing` subscriber writing through the test harness' capture.
///
/// `RUST_LOG` wins over the configured level. Setting `STUB_LEDGER_JSON`
/// switches to JSON lines. Fails if another global subscriber is installed.
pub fn init(config: &LoggingConfig) -> Result<()> {
    let level = config.level.as_deref().unwrap_or("info");
    let fallback_filter = format!("stub_ledger={}", level);
    let use_json = config.json.unwrap_or(false) || std::env::var("STUB_LEDGER_JSON").is_ok();

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| fallback_filter.into());

    let installed = if use_json {
        let json_layer = tracing_subscriber::fmt::layer()
            .json()
            .with_test_writer()
            .with_target(true)
            .with_level(true);

        tracing_subscriber::registry()
            .with(filter)
            .with(json_layer)
            .try_init()
    } else {
        let fmt_layer = tracing_subscriber::fmt::layer()
            .with_test_writer()
            .with_target(true)
            .with_level(true);

        tracing_subscriber::registry()
            .with(filter)
            .with(fmt_layer)
            .try_init()
    };

    installed.map_err(|e| {
        LedgerError::ConfigError(format!("Failed to install tracing subscriber: {}", e)).into()
    })
}

/// Install the subscriber once per process; later calls are no-ops.
pub fn init_for_tests() {
    let _ = init(&LoggingConfig::default());
}

/// Log an expectation registration.
pub fn log_expectation_added(target: &str, scope: &str, added: usize, queued: usize) {
    tracing::debug!(target_name = target, scope, added, queued, "Expectation added");
}

/// Log a forbidden registration.
pub fn log_target_forbidden(target: &str, scope: &str) {
    tracing::debug!(target_name = target, scope, "Target forbidden");
}

/// Log interception hook installation.
pub fn log_hook_installed(target: &str, scope: &str) {
    tracing::debug!(target_name = target, scope, "Interception hook installed");
}

/// Log a call routed to a stand-in.
pub fn log_dispatch(target: &str, index: usize, limit: usize) {
    tracing::debug!(
        target_name = target,
        call = index + 1,
        limit,
        "Dispatched to stand-in"
    );
}

/// Log a call passed through to the real implementation.
pub fn log_fallback(target: &str) {
    tracing::debug!(
        target_name = target,
        "No expectations queued, passing call through"
    );
}

pub fn log_violation(violation: &Violation) {
    tracing::warn!(
        target_name = violation.target(),
        kind = ?violation.kind(),
        "Expectation violated"
    );
}

pub fn log_reset(targets: usize) {
    tracing::debug!(targets, "Ledger reset");
}

/// Log a verification pass.
pub fn log_verification_passed(targets: usize) {
    tracing::debug!(targets, "All expectations satisfied");
}
