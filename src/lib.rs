//! Call interception and expectation verification for named functions.
//!
//! A [`Ledger`] records, per target name, the ordered stand-ins a test expects
//! to be called (or that the target must never be called), routes every
//! intercepted call to the stand-in matching its call order, and reports
//! under-called targets at verification time.

pub mod config;
pub mod hook;
pub mod intercept;
pub mod ledger;
pub mod logging;
pub mod shared;
pub mod violation;

use miette::Diagnostic;

pub use config::{Config, LoggingConfig, TraceConfig};
pub use hook::{InterceptionHook, ScopeTable};
pub use ledger::{
    CallRecord, Dispatch, Expectation, ExpectationQueue, InvokeError, Ledger, Route, Signature,
    StandIn, TargetSummary,
};
pub use violation::{CallSite, DispatchResult, Violation, ViolationKind};

/// Result type alias for configuration and setup operations
pub type Result<T> = miette::Result<T>;

/// Error types for ledger setup
#[derive(Debug, thiserror::Error, Diagnostic)]
pub enum LedgerError {
    #[error("Configuration error: {0}")]
    #[diagnostic(
        code(stub_ledger::config_error),
        help("Check the [trace] and [logging] sections of .stub-ledger.toml, or unset STUB_LEDGER_CONFIG to fall back to defaults.")
    )]
    ConfigError(String),

    #[error("File operation failed: {0}")]
    #[diagnostic(
        code(stub_ledger::file_error),
        help("Check if you have necessary permissions and that the path exists.")
    )]
    FileError(String),
}
