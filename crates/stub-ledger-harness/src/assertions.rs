use stub_ledger::{Ledger, Route};

/// Panicking assertions over a ledger's counters and call log.
pub struct LedgerAssertions<'a> {
    ledger: &'a Ledger,
}

impl<'a> LedgerAssertions<'a> {
    pub fn new(ledger: &'a Ledger) -> Self {
        Self { ledger }
    }

    #[track_caller]
    pub fn assert_called(&self, target: &str, times: usize) {
        let actual = self.ledger.invocations(target);
        assert_eq!(
            actual, times,
            "expected {target} to be dispatched {times} times, was dispatched {actual} times"
        );
    }

    #[track_caller]
    pub fn assert_forbidden(&self, target: &str) {
        assert!(
            self.ledger.is_forbidden(target),
            "expected {target} to be forbidden"
        );
    }

    /// Every queued stand-in for `target` has been used
    #[track_caller]
    pub fn assert_exhausted(&self, target: &str) {
        let remaining = self.ledger.remaining(target);
        assert_eq!(
            remaining, 0,
            "{target} still has {remaining} queued stand-in(s)"
        );
    }

    /// Calls to `target` went to the real implementation this many times
    #[track_caller]
    pub fn assert_passed_through(&self, target: &str, times: usize) {
        let actual = self
            .ledger
            .calls()
            .iter()
            .filter(|call| call.target == target && call.route == Route::Passthrough)
            .count();
        assert_eq!(
            actual, times,
            "expected {target} to pass through {times} times, passed through {actual} times"
        );
    }

    /// The call log, target names only, in call order
    pub fn call_order(&self) -> Vec<&str> {
        self.ledger
            .calls()
            .iter()
            .map(|call| call.target.as_str())
            .collect()
    }
}
