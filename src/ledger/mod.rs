//! The invocation ledger: expectation registry plus dispatch engine.

pub mod expectation;
pub mod record;

pub use expectation::{Expectation, ExpectationQueue, InvokeError, Signature, StandIn};
pub use record::{CallRecord, Route, TargetSummary};

use crate::config::{Config, TraceConfig};
use crate::hook::{InterceptionHook, ScopeTable};
use crate::logging;
use crate::violation::{CallSite, DispatchResult, Violation};
use std::collections::HashMap;
use std::fmt;
use std::panic::Location;

/// Registry of expected calls per target, with the counters and call log
/// that dispatch advances.
///
/// A ledger is single-threaded state for one logical test. Call [`Ledger::reset`]
/// between independent tests; redirections installed by the hook and real
/// implementations survive a reset.
pub struct Ledger {
    queues: HashMap<String, ExpectationQueue>,
    /// Targets in first-registration order
    order: Vec<String>,
    counters: HashMap<String, usize>,
    calls: Vec<CallRecord>,
    reals: HashMap<String, StandIn>,
    hook: Box<dyn InterceptionHook>,
    trace: TraceConfig,
}

impl Default for Ledger {
    fn default() -> Self {
        Self::new()
    }
}

impl Ledger {
    /// Create an empty ledger using a [`ScopeTable`] hook and default tracing.
    pub fn new() -> Self {
        Self::with_hook(Box::new(ScopeTable::new()))
    }

    pub fn from_config(config: &Config) -> Self {
        let mut ledger = Self::new();
        ledger.trace = config.trace.clone();
        ledger
    }

    /// Create an empty ledger around a custom interception hook.
    pub fn with_hook(hook: Box<dyn InterceptionHook>) -> Self {
        Self {
            queues: HashMap::new(),
            order: Vec::new(),
            counters: HashMap::new(),
            calls: Vec::new(),
            reals: HashMap::new(),
            hook,
            trace: TraceConfig::default(),
        }
    }

    pub fn set_trace(&mut self, trace: TraceConfig) {
        self.trace = trace;
    }

    /// Queue `repeat` copies of `stand_in` for `target`, or forbid the target
    /// when `stand_in` is `None`. Always installs the interception hook for
    /// `scope`, even when nothing gets queued.
    pub fn add(&mut self, target: &str, scope: &str, stand_in: Option<StandIn>, repeat: usize) {
        if !self.queues.contains_key(target) {
            self.order.push(target.to_string());
        }
        let queue = self.queues.entry(target.to_string()).or_default();

        match stand_in {
            Some(stand_in) => {
                let added = queue.push_stand_in(&stand_in, repeat);
                logging::log_expectation_added(target, scope, added, queue.len());
            }
            None => {
                if queue.forbid() {
                    logging::log_target_forbidden(target, scope);
                }
            }
        }

        self.hook.register(scope, target);
    }

    /// Expect one call to `target`, answered by `f`.
    pub fn expect<A, R, F>(&mut self, target: &str, scope: &str, f: F)
    where
        A: 'static,
        R: 'static,
        F: FnMut(&mut A) -> R + 'static,
    {
        self.add(target, scope, Some(StandIn::new(f)), 1);
    }

    /// Expect `times` consecutive calls to `target`, all answered by `f`.
    pub fn expect_times<A, R, F>(&mut self, target: &str, scope: &str, times: usize, f: F)
    where
        A: 'static,
        R: 'static,
        F: FnMut(&mut A) -> R + 'static,
    {
        self.add(target, scope, Some(StandIn::new(f)), times);
    }

    /// Expect `times` consecutive calls answered by a stateless `f` that may
    /// call `target` again while it runs.
    pub fn expect_reentrant<A, R, F>(&mut self, target: &str, scope: &str, times: usize, f: F)
    where
        A: 'static,
        R: 'static,
        F: Fn(&mut A) -> R + 'static,
    {
        self.add(target, scope, Some(StandIn::reentrant(f)), times);
    }

    /// Fail any call to `target`.
    pub fn forbid(&mut self, target: &str, scope: &str) {
        self.add(target, scope, None, 1);
    }

    /// Register the implementation [`Ledger::call`] passes through to when
    /// `target` has nothing queued. [`Ledger::call_or_real`] ignores it in
    /// favour of its own `real`.
    pub fn register_real<A, R, F>(&mut self, target: &str, f: F)
    where
        A: 'static,
        R: 'static,
        F: FnMut(&mut A) -> R + 'static,
    {
        self.reals.insert(target.to_string(), StandIn::new(f));
    }

    /// Clear expectations, counters and the call log.
    pub fn reset(&mut self) {
        logging::log_reset(self.order.len());
        self.queues.clear();
        self.order.clear();
        self.counters.clear();
        self.calls.clear();
    }

    /// Fail with the first under-called target, in registration order.
    ///
    /// Forbidden targets and targets with nothing queued are not checked here;
    /// calls to them already failed at dispatch time.
    #[track_caller]
    pub fn assert_all_satisfied(&self) -> DispatchResult<()> {
        self.assert_all_satisfied_at(Location::caller())
    }

    /// [`Ledger::assert_all_satisfied`], reporting `caller` as the call site.
    pub fn assert_all_satisfied_at(
        &self,
        caller: &'static Location<'static>,
    ) -> DispatchResult<()> {
        for target in &self.order {
            let Some(queue) = self.queues.get(target) else {
                continue;
            };
            if queue.is_empty() || queue.is_forbidden() {
                continue;
            }

            let actual = self.invocations(target);
            if actual < queue.len() {
                let violation = Violation::NotEnoughCalls {
                    target: target.clone(),
                    expected: queue.len(),
                    actual,
                    site: CallSite::capture_at(caller, &self.trace),
                };
                logging::log_violation(&violation);
                return Err(violation);
            }
        }

        logging::log_verification_passed(self.order.len());
        Ok(())
    }

    /// Resolve the next call to `target` without running anything.
    ///
    /// On success the counter has already advanced; run the returned
    /// [`Dispatch`] to produce the result.
    #[track_caller]
    pub fn dispatch(&mut self, target: &str) -> DispatchResult<Dispatch> {
        self.dispatch_at(target, Location::caller())
    }

    pub(crate) fn dispatch_at(
        &mut self,
        target: &str,
        caller: &'static Location<'static>,
    ) -> DispatchResult<Dispatch> {
        let called = self.invocations(target);
        let sequence = self.calls.len() + 1;

        let queue = match self.queues.get(target) {
            Some(queue) if !queue.is_empty() => queue,
            _ => {
                logging::log_fallback(target);
                self.record(sequence, target, Route::Passthrough);
                return Ok(Dispatch {
                    target: target.to_string(),
                    resolution: Resolution::Passthrough(self.reals.get(target).cloned()),
                    caller,
                    trace: self.trace.clone(),
                });
            }
        };

        if queue.is_forbidden() {
            let violation = Violation::NeverExpected {
                target: target.to_string(),
                site: CallSite::capture_at(caller, &self.trace),
            };
            return Err(self.reject(sequence, violation));
        }

        let limit = queue.len();
        let stand_in = match queue.stand_in(called) {
            Some(stand_in) if called < limit => stand_in.clone(),
            _ => {
                let violation = Violation::CallsLimitExceeded {
                    target: target.to_string(),
                    limit,
                    site: CallSite::capture_at(caller, &self.trace),
                };
                return Err(self.reject(sequence, violation));
            }
        };

        self.counters.insert(target.to_string(), called + 1);
        self.record(sequence, target, Route::StandIn { index: called });
        logging::log_dispatch(target, called, limit);

        Ok(Dispatch {
            target: target.to_string(),
            resolution: Resolution::StandIn(stand_in),
            caller,
            trace: self.trace.clone(),
        })
    }

    /// Dispatch a call and run it. Passes through to the implementation from
    /// [`Ledger::register_real`] when nothing is queued, or yields `Ok(None)`
    /// when there is none.
    #[track_caller]
    pub fn call<A: 'static, R: 'static>(
        &mut self,
        target: &str,
        args: &mut A,
    ) -> DispatchResult<Option<R>> {
        self.dispatch_at(target, Location::caller())?.invoke(args)
    }

    /// Dispatch a call and run it, passing through to `real` when nothing is queued.
    #[track_caller]
    pub fn call_or_real<A, R, F>(&mut self, target: &str, args: &mut A, real: F) -> DispatchResult<R>
    where
        A: 'static,
        R: 'static,
        F: FnOnce(&mut A) -> R,
    {
        self.dispatch_at(target, Location::caller())?
            .invoke_or(args, real)
    }

    /// Whether calls to `target` from `scope` are redirected into the ledger
    pub fn is_redirected(&self, scope: &str, target: &str) -> bool {
        self.hook.is_redirected(scope, target)
    }

    /// Stand-in dispatches to `target` since the last reset
    pub fn invocations(&self, target: &str) -> usize {
        self.counters.get(target).copied().unwrap_or(0)
    }

    /// Length of the queue for `target`
    pub fn expected_calls(&self, target: &str) -> usize {
        self.queues.get(target).map_or(0, ExpectationQueue::len)
    }

    pub fn remaining(&self, target: &str) -> usize {
        self.expected_calls(target)
            .saturating_sub(self.invocations(target))
    }

    pub fn is_forbidden(&self, target: &str) -> bool {
        self.queues
            .get(target)
            .is_some_and(ExpectationQueue::is_forbidden)
    }

    pub fn queue(&self, target: &str) -> Option<&ExpectationQueue> {
        self.queues.get(target)
    }

    /// Registered targets, in registration order
    pub fn targets(&self) -> &[String] {
        &self.order
    }

    /// Every intercepted call since the last reset
    pub fn calls(&self) -> &[CallRecord] {
        &self.calls
    }

    /// Expected vs. actual calls per target, in registration order
    pub fn snapshot(&self) -> Vec<TargetSummary> {
        self.order
            .iter()
            .map(|target| TargetSummary {
                target: target.clone(),
                expected: self.expected_calls(target),
                actual: self.invocations(target),
                forbidden: self.is_forbidden(target),
            })
            .collect()
    }

    fn record(&mut self, sequence: usize, target: &str, route: Route) {
        self.calls.push(CallRecord {
            sequence,
            target: target.to_string(),
            route,
        });
    }

    fn reject(&mut self, sequence: usize, violation: Violation) -> Violation {
        logging::log_violation(&violation);
        self.record(
            sequence,
            violation.target(),
            Route::Rejected {
                kind: violation.kind(),
            },
        );
        violation
    }
}

impl fmt::Debug for Ledger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Ledger")
            .field("targets", &self.order)
            .field("counters", &self.counters)
            .field("calls", &self.calls.len())
            .finish()
    }
}

#[derive(Debug)]
enum Resolution {
    StandIn(StandIn),
    Passthrough(Option<StandIn>),
}

/// A resolved call, detached from the ledger so the behavior can run while
/// the ledger is free to take nested calls.
#[derive(Debug)]
pub struct Dispatch {
    target: String,
    resolution: Resolution,
    caller: &'static Location<'static>,
    trace: TraceConfig,
}

impl Dispatch {
    pub fn target(&self) -> &str {
        &self.target
    }

    /// Whether the call was resolved to a queued stand-in
    pub fn is_stand_in(&self) -> bool {
        matches!(self.resolution, Resolution::StandIn(_))
    }

    /// Run the resolved behavior. `Ok(None)` means the call passes through and
    /// no real implementation was registered with the ledger.
    pub fn invoke<A: 'static, R: 'static>(self, args: &mut A) -> DispatchResult<Option<R>> {
        let behavior = match &self.resolution {
            Resolution::StandIn(stand_in) | Resolution::Passthrough(Some(stand_in)) => stand_in,
            Resolution::Passthrough(None) => return Ok(None),
        };

        let error = match behavior.invoke::<A, R>(args) {
            Ok(result) => return Ok(Some(result)),
            Err(error) => error,
        };

        let site = CallSite::capture_at(self.caller, &self.trace);
        let violation = match error {
            InvokeError::Signature => Violation::SignatureMismatch {
                target: self.target.clone(),
                expected: behavior.signature().clone(),
                actual: Signature::of::<A, R>(),
                site,
            },
            InvokeError::Reentered => Violation::Reentered {
                target: self.target.clone(),
                site,
            },
        };
        logging::log_violation(&violation);
        Err(violation)
    }

    /// Run the resolved stand-in, or `real` when the call passes through.
    /// A real implementation registered with the ledger is not consulted.
    pub fn invoke_or<A, R, F>(self, args: &mut A, real: F) -> DispatchResult<R>
    where
        A: 'static,
        R: 'static,
        F: FnOnce(&mut A) -> R,
    {
        if !self.is_stand_in() {
            return Ok(real(args));
        }
        match self.invoke(args)? {
            Some(result) => Ok(result),
            None => Ok(real(args)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::violation::ViolationKind;

    const SCOPE: &str = "app::clock::tests";

    fn quiet() -> Ledger {
        let mut ledger = Ledger::new();
        ledger.set_trace(TraceConfig {
            capture: false,
            ..TraceConfig::default()
        });
        ledger
    }

    #[test]
    fn registration_order_is_kept() {
        let mut ledger = quiet();
        ledger.expect("time", SCOPE, |_: &mut ()| 1u64);
        ledger.forbid("exit", SCOPE);
        ledger.expect("rand", SCOPE, |_: &mut ()| 4u32);
        ledger.expect("time", SCOPE, |_: &mut ()| 2u64);

        assert_eq!(ledger.targets(), ["time", "exit", "rand"]);
        assert_eq!(ledger.expected_calls("time"), 2);
    }

    #[test]
    fn zero_repeat_still_installs_hook() {
        let mut ledger = quiet();
        ledger.expect_times("time", SCOPE, 0, |_: &mut ()| 1u64);

        assert_eq!(ledger.expected_calls("time"), 0);
        assert!(ledger.is_redirected("app::clock", "time"));
        assert!(ledger.assert_all_satisfied().is_ok());
    }

    #[test]
    fn dispatch_advances_counter_before_invoke() {
        let mut ledger = quiet();
        ledger.expect("time", SCOPE, |_: &mut ()| 10u64);

        let dispatch = ledger.dispatch("time").unwrap();
        assert!(dispatch.is_stand_in());
        assert_eq!(ledger.invocations("time"), 1);
        assert_eq!(dispatch.invoke::<(), u64>(&mut ()).unwrap(), Some(10));
    }

    #[test]
    fn passthrough_uses_registered_real() {
        let mut ledger = quiet();
        ledger.register_real("double", |args: &mut (i32,)| args.0 * 2);

        let result: Option<i32> = ledger.call("double", &mut (21,)).unwrap();
        assert_eq!(result, Some(42));

        let missing: Option<i32> = ledger.call("triple", &mut (1,)).unwrap();
        assert_eq!(missing, None);
        assert_eq!(ledger.invocations("double"), 0);
        assert_eq!(
            ledger.calls()[0].route,
            Route::Passthrough
        );
    }

    #[test]
    fn call_or_real_prefers_the_callers_real() {
        let mut ledger = quiet();
        ledger.register_real("seed", |_: &mut ()| 1u32);

        assert_eq!(ledger.call_or_real("seed", &mut (), |_| 2u32).unwrap(), 2);
        assert_eq!(ledger.call_or_real("seed", &mut (), |_| 3u64).unwrap(), 3);
        assert_eq!(ledger.call::<(), u32>("seed", &mut ()).unwrap(), Some(1));
    }

    #[test]
    fn signature_mismatch_is_reported() {
        let mut ledger = quiet();
        ledger.expect("time", SCOPE, |_: &mut ()| 10u64);

        let err = ledger.call::<(), i32>("time", &mut ()).unwrap_err();
        assert_eq!(err.kind(), ViolationKind::SignatureMismatch);
        assert!(err.to_string().contains("fn(&mut ()) -> u64"));
    }

    #[test]
    fn rejected_calls_are_logged() {
        let mut ledger = quiet();
        ledger.expect("time", SCOPE, |_: &mut ()| 10u64);
        ledger.call::<(), u64>("time", &mut ()).unwrap();
        ledger.call::<(), u64>("time", &mut ()).unwrap_err();

        let routes: Vec<Route> = ledger.calls().iter().map(|c| c.route).collect();
        assert_eq!(
            routes,
            vec![
                Route::StandIn { index: 0 },
                Route::Rejected {
                    kind: ViolationKind::CallsLimitExceeded
                }
            ]
        );
        assert_eq!(ledger.calls()[1].sequence, 2);
    }

    #[test]
    fn reset_keeps_hook_and_reals() {
        let mut ledger = quiet();
        ledger.register_real("time", |_: &mut ()| 99u64);
        ledger.expect("time", SCOPE, |_: &mut ()| 10u64);
        ledger.reset();

        assert!(ledger.targets().is_empty());
        assert!(ledger.calls().is_empty());
        assert!(ledger.is_redirected(SCOPE, "time"));
        assert_eq!(ledger.call::<(), u64>("time", &mut ()).unwrap(), Some(99));
    }

    #[test]
    fn snapshot_reports_each_target() {
        let mut ledger = quiet();
        ledger.expect_times("rand", SCOPE, 2, |_: &mut ()| 4u32);
        ledger.forbid("exit", SCOPE);
        ledger.call::<(), u32>("rand", &mut ()).unwrap();

        let snapshot = ledger.snapshot();
        assert_eq!(
            snapshot[0],
            TargetSummary {
                target: "rand".to_string(),
                expected: 2,
                actual: 1,
                forbidden: false,
            }
        );
        assert!(!snapshot[0].is_satisfied());
        assert!(snapshot[1].forbidden);
        assert!(snapshot[1].is_satisfied());
        assert_eq!(ledger.remaining("rand"), 1);
    }
}
