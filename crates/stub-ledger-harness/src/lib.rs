pub mod assertions;
pub mod builder;
pub mod report;

pub use assertions::LedgerAssertions;
pub use builder::LedgerBuilder;
pub use report::{
    verify, verify_handle, verify_shared, LedgerGuard, RecordingContext, ReportError,
    TestContext, VerificationReport,
};
