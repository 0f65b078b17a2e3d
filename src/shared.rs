//! The ledger intercepted functions dispatch through.
//!
//! Each thread owns one [`Ledger`]. The test harness runs every test on its
//! own thread, so tests never observe each other's expectations. Behaviors run
//! after the ledger borrow is released, so a stand-in may itself call other
//! intercepted functions or queue more expectations.
//!
//! Expectations do not follow the code under test onto threads it spawns.
//! A spawned thread starts with an empty ledger, so intercepted calls made
//! there go straight to the real implementation and are not counted. Keep
//! intercepted calls on the test's own thread, or pass an explicit [`Ledger`]
//! to the code that runs elsewhere.

use crate::config::Config;
use crate::ledger::{Ledger, StandIn, TargetSummary};
use crate::violation::DispatchResult;
use std::cell::RefCell;
use std::panic::Location;

thread_local! {
    /// Ledger for the current thread, configured from `.stub-ledger.toml`.
    static LEDGER: RefCell<Ledger> = RefCell::new(Ledger::from_config(&Config::load_or_default()));
}

/// Run `f` against the current thread's ledger.
///
/// # Panics
///
/// Panics if called from inside another `with_ledger` closure.
pub fn with_ledger<T>(f: impl FnOnce(&mut Ledger) -> T) -> T {
    LEDGER.with(|ledger| f(&mut ledger.borrow_mut()))
}

pub fn add(target: &str, scope: &str, stand_in: Option<StandIn>, repeat: usize) {
    with_ledger(|ledger| ledger.add(target, scope, stand_in, repeat));
}

pub fn expect<A, R, F>(target: &str, scope: &str, f: F)
where
    A: 'static,
    R: 'static,
    F: FnMut(&mut A) -> R + 'static,
{
    with_ledger(|ledger| ledger.expect(target, scope, f));
}

pub fn expect_times<A, R, F>(target: &str, scope: &str, times: usize, f: F)
where
    A: 'static,
    R: 'static,
    F: FnMut(&mut A) -> R + 'static,
{
    with_ledger(|ledger| ledger.expect_times(target, scope, times, f));
}

pub fn expect_reentrant<A, R, F>(target: &str, scope: &str, times: usize, f: F)
where
    A: 'static,
    R: 'static,
    F: Fn(&mut A) -> R + 'static,
{
    with_ledger(|ledger| ledger.expect_reentrant(target, scope, times, f));
}

pub fn forbid(target: &str, scope: &str) {
    with_ledger(|ledger| ledger.forbid(target, scope));
}

pub fn reset() {
    with_ledger(Ledger::reset);
}

#[track_caller]
pub fn assert_all_satisfied() -> DispatchResult<()> {
    assert_all_satisfied_at(Location::caller())
}

/// Verify the thread's ledger, reporting `caller` as the call site.
pub fn assert_all_satisfied_at(caller: &'static Location<'static>) -> DispatchResult<()> {
    with_ledger(|ledger| ledger.assert_all_satisfied_at(caller))
}

pub fn invocations(target: &str) -> usize {
    with_ledger(|ledger| ledger.invocations(target))
}

pub fn snapshot() -> Vec<TargetSummary> {
    with_ledger(|ledger| ledger.snapshot())
}

/// Dispatch a call through the thread's ledger, passing through to `real`
/// when nothing is queued for `target`.
#[track_caller]
pub fn call_or_real<A, R, F>(target: &str, args: &mut A, real: F) -> DispatchResult<R>
where
    A: 'static,
    R: 'static,
    F: FnOnce(&mut A) -> R,
{
    let caller = Location::caller();
    with_ledger(|ledger| ledger.dispatch_at(target, caller))?.invoke_or(args, real)
}

/// Entry point of functions generated by [`intercept!`](crate::intercept!).
///
/// Calls `real` directly unless `target` is redirected for `scope`.
///
/// # Panics
///
/// Panics with the violation message when the call breaks an expectation.
#[track_caller]
pub fn intercepted_call<A, R, F>(scope: &str, target: &str, args: A, real: F) -> R
where
    A: 'static,
    R: 'static,
    F: FnOnce(A) -> R,
{
    if !with_ledger(|ledger| ledger.is_redirected(scope, target)) {
        return real(args);
    }

    let caller = Location::caller();
    let dispatch = match with_ledger(|ledger| ledger.dispatch_at(target, caller)) {
        Ok(dispatch) if dispatch.is_stand_in() => dispatch,
        Ok(_) => return real(args),
        Err(violation) => panic!("{}", violation),
    };

    let mut args = args;
    match dispatch.invoke(&mut args) {
        Ok(Some(result)) => result,
        Ok(None) => real(args),
        Err(violation) => panic!("{}", violation),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::violation::ViolationKind;
    use std::cell::Cell;
    use std::rc::Rc;
    use std::thread;

    fn factorial(n: u64) -> DispatchResult<u64> {
        call_or_real("factorial", &mut (n,), |args| (1..=args.0).product())
    }

    #[test]
    fn stand_in_may_call_other_targets() {
        reset();
        expect("inner", "app", |_: &mut ()| 2u32);
        expect("outer", "app", |_: &mut ()| {
            let inner: u32 = call_or_real("inner", &mut (), |_| 0).unwrap();
            inner * 10
        });

        let outer: u32 = call_or_real("outer", &mut (), |_| 0).unwrap();
        assert_eq!(outer, 20);
        assert!(assert_all_satisfied().is_ok());
        reset();
    }

    #[test]
    fn reentrant_stand_in_may_call_its_own_target() {
        reset();
        expect_reentrant("factorial", "app::tests", 3, |args: &mut (u64,)| {
            if args.0 <= 1 {
                1
            } else {
                args.0 * factorial(args.0 - 1).unwrap()
            }
        });

        assert_eq!(factorial(3).unwrap(), 6);
        assert_eq!(invocations("factorial"), 3);
        assert!(assert_all_satisfied().is_ok());
        reset();
    }

    #[test]
    fn mutable_stand_in_refuses_its_own_target() {
        reset();
        let refused = Rc::new(Cell::new(None));
        let seen = refused.clone();
        expect_times("factorial", "app::tests", 3, move |args: &mut (u64,)| {
            if args.0 <= 1 {
                return 1;
            }
            match factorial(args.0 - 1) {
                Ok(inner) => args.0 * inner,
                Err(violation) => {
                    seen.set(Some(violation.kind()));
                    0
                }
            }
        });

        assert_eq!(factorial(3).unwrap(), 0);
        assert_eq!(refused.get(), Some(ViolationKind::Reentered));
        assert_eq!(invocations("factorial"), 2);
        reset();
    }

    #[test]
    fn threads_get_separate_ledgers() {
        reset();
        expect("time", "app", |_: &mut ()| 1u64);

        let seen_elsewhere = thread::spawn(|| snapshot().len()).join().unwrap();
        assert_eq!(seen_elsewhere, 0);
        assert_eq!(snapshot().len(), 1);
        reset();
    }

    #[test]
    fn limit_violation_propagates() {
        reset();
        expect("time", "app", |_: &mut ()| 1u64);
        assert_eq!(call_or_real("time", &mut (), |_| 0u64).unwrap(), 1);

        let err = call_or_real("time", &mut (), |_| 0u64).unwrap_err();
        assert_eq!(err.kind(), ViolationKind::CallsLimitExceeded);
        assert_eq!(invocations("time"), 1);
        reset();
    }
}
