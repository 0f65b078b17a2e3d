use proptest::prelude::*;
use stub_ledger::{Ledger, TraceConfig, Violation};

const SCOPE: &str = "app::tests";

fn ledger() -> Ledger {
    let mut ledger = Ledger::new();
    ledger.set_trace(TraceConfig {
        capture: false,
        ..TraceConfig::default()
    });
    ledger
}

proptest! {
    #[test]
    fn test_dispatch_order_ignores_how_adds_were_split(chunks in prop::collection::vec(1usize..4, 1..6)) {
        let mut ledger = ledger();
        let mut expected = Vec::new();
        for (chunk, size) in chunks.iter().enumerate() {
            ledger.expect_times("next", SCOPE, *size, move |_: &mut ()| chunk);
            expected.extend(std::iter::repeat(chunk).take(*size));
        }

        let mut seen = Vec::new();
        for _ in 0..expected.len() {
            seen.push(ledger.call::<(), usize>("next", &mut ()).unwrap().unwrap());
        }
        prop_assert_eq!(&seen, &expected);
        prop_assert!(ledger.assert_all_satisfied().is_ok());

        match ledger.call::<(), usize>("next", &mut ()) {
            Err(Violation::CallsLimitExceeded { limit, .. }) => prop_assert_eq!(limit, expected.len()),
            other => prop_assert!(false, "expected CallsLimitExceeded, got {:?}", other),
        }
    }

    #[test]
    fn test_verification_reports_exact_shortfall(queued in 1usize..20, made in 0usize..20) {
        let made = made.min(queued);
        let mut ledger = ledger();
        ledger.expect_times("tick", SCOPE, queued, |_: &mut ()| ());
        for _ in 0..made {
            ledger.call::<(), ()>("tick", &mut ()).unwrap();
        }

        match ledger.assert_all_satisfied() {
            Ok(()) => prop_assert_eq!(made, queued),
            Err(Violation::NotEnoughCalls { expected, actual, .. }) => {
                prop_assert_eq!(expected, queued);
                prop_assert_eq!(actual, made);
            }
            Err(other) => prop_assert!(false, "unexpected violation {:?}", other),
        }
    }

    #[test]
    fn test_forbidding_is_idempotent(times in 1usize..10) {
        let mut ledger = ledger();
        for _ in 0..times {
            ledger.forbid("exit", SCOPE);
        }
        prop_assert_eq!(ledger.expected_calls("exit"), 1);
        prop_assert!(ledger.assert_all_satisfied().is_ok());
        prop_assert!(ledger.call::<(), ()>("exit", &mut ()).is_err());
    }
}
