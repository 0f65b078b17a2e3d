use miette::Diagnostic;
use serde::Serialize;
use std::any::{type_name, Any};
use std::cell::RefCell;
use std::panic::Location;
use std::rc::Rc;
use std::sync::Arc;
use stub_ledger::{shared, Ledger, Violation};
use tracing::debug;

/// Errors surfaced by the reporting adapter
#[derive(Debug, thiserror::Error, Diagnostic)]
pub enum ReportError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Violation(#[from] Violation),

    #[error("Test context is expected to implement TestContext, got type: [{description}] which is invalid")]
    #[diagnostic(
        code(stub_ledger::invalid_test_context),
        help("Pass a RecordingContext, or a TestContext behind Box, Rc or Arc.")
    )]
    InvalidTestContext { description: String },
}

/// A running test that verification failures can be reported into.
pub trait TestContext {
    /// Mark the current test failed with `message`
    fn fail(&self, message: &str);

    /// Whether the test runner behind this context can take failures right now
    fn is_active(&self) -> bool {
        true
    }
}

/// Verify `ledger`, reporting an unsatisfied expectation into `context`.
///
/// Without a context, or with an inactive one, the violation is returned.
#[track_caller]
pub fn verify(ledger: &Ledger, context: Option<&dyn TestContext>) -> Result<(), ReportError> {
    redirect(ledger.assert_all_satisfied(), context)
}

/// [`verify`] against the current thread's shared ledger.
#[track_caller]
pub fn verify_shared(context: Option<&dyn TestContext>) -> Result<(), ReportError> {
    redirect(shared::assert_all_satisfied(), context)
}

/// Verify with a dynamically typed handle.
///
/// Accepts [`RecordingContext`], `Box<dyn TestContext>`, `Rc<dyn TestContext>`
/// and `Arc<dyn TestContext + Send + Sync>`. Any other handle type is a
/// configuration error, raised before verification runs.
#[track_caller]
pub fn verify_handle<H: Any>(ledger: &Ledger, handle: Option<&H>) -> Result<(), ReportError> {
    let context = match handle {
        Some(handle) => Some(as_test_context(handle)?),
        None => None,
    };
    verify(ledger, context)
}

fn as_test_context<H: Any>(handle: &H) -> Result<&dyn TestContext, ReportError> {
    let any = handle as &dyn Any;
    if let Some(context) = any.downcast_ref::<RecordingContext>() {
        return Ok(context);
    }
    if let Some(context) = any.downcast_ref::<Box<dyn TestContext>>() {
        return Ok(context.as_ref());
    }
    if let Some(context) = any.downcast_ref::<Rc<dyn TestContext>>() {
        return Ok(context.as_ref());
    }
    if let Some(context) = any.downcast_ref::<Arc<dyn TestContext + Send + Sync>>() {
        return Ok(context.as_ref());
    }
    Err(ReportError::InvalidTestContext {
        description: type_name::<H>().to_string(),
    })
}

fn redirect(
    outcome: Result<(), Violation>,
    context: Option<&dyn TestContext>,
) -> Result<(), ReportError> {
    let violation = match outcome {
        Ok(()) => return Ok(()),
        Err(violation) => violation,
    };

    match context {
        Some(context) if context.is_active() => {
            debug!(
                target_name = violation.target(),
                "Reporting violation into test context"
            );
            context.fail(&violation.to_string());
            Ok(())
        }
        _ => Err(violation.into()),
    }
}

/// A test context that records failures instead of aborting.
#[derive(Debug, Default)]
pub struct RecordingContext {
    test_name: String,
    failures: RefCell<Vec<String>>,
    inactive: bool,
}

/// Serializable outcome of a [`RecordingContext`]
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct VerificationReport {
    pub test: String,
    pub passed: bool,
    pub failures: Vec<String>,
}

impl RecordingContext {
    pub fn new(test_name: &str) -> Self {
        Self {
            test_name: test_name.to_string(),
            ..Self::default()
        }
    }

    /// A context whose runner is unavailable; failures propagate instead.
    pub fn detached(test_name: &str) -> Self {
        Self {
            inactive: true,
            ..Self::new(test_name)
        }
    }

    pub fn failures(&self) -> Vec<String> {
        self.failures.borrow().clone()
    }

    pub fn has_failed(&self) -> bool {
        !self.failures.borrow().is_empty()
    }

    pub fn report(&self) -> VerificationReport {
        let failures = self.failures();
        VerificationReport {
            test: self.test_name.clone(),
            passed: failures.is_empty(),
            failures,
        }
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(&self.report())
    }
}

impl TestContext for RecordingContext {
    fn fail(&self, message: &str) {
        self.failures.borrow_mut().push(message.to_string());
    }

    fn is_active(&self) -> bool {
        !self.inactive
    }
}

/// Resets the thread's ledger when created and verifies it when dropped.
///
/// Dropping a guard with unsatisfied expectations panics, unless the thread
/// is already panicking. The failure names the line that created the guard.
#[must_use = "the ledger is verified when the guard is dropped"]
pub struct LedgerGuard {
    created_at: &'static Location<'static>,
}

impl LedgerGuard {
    #[track_caller]
    pub fn new() -> Self {
        shared::reset();
        Self {
            created_at: Location::caller(),
        }
    }
}

impl Default for LedgerGuard {
    #[track_caller]
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for LedgerGuard {
    fn drop(&mut self) {
        let outcome = shared::assert_all_satisfied_at(self.created_at);
        shared::reset();
        if std::thread::panicking() {
            return;
        }
        if let Err(violation) = outcome {
            panic!("{}", violation);
        }
    }
}
