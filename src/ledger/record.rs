use crate::violation::ViolationKind;
use serde::Serialize;

/// How an intercepted call was handled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "route", rename_all = "snake_case")]
pub enum Route {
    /// Answered by the stand-in at this 0-based queue index
    StandIn { index: usize },
    /// No expectations queued; handed to the real implementation
    Passthrough,
    /// Refused with a violation
    Rejected { kind: ViolationKind },
}

/// One intercepted call, in the order the ledger saw it
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CallRecord {
    /// 1-based position among all calls since the last reset
    pub sequence: usize,
    pub target: String,
    #[serde(flatten)]
    pub route: Route,
}

/// Expected vs. actual invocations of one target
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TargetSummary {
    pub target: String,
    pub expected: usize,
    pub actual: usize,
    pub forbidden: bool,
}

impl TargetSummary {
    pub fn is_satisfied(&self) -> bool {
        self.forbidden || self.actual >= self.expected
    }
}
