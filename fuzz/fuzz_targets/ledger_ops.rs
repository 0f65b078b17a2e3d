#![no_main]

use libfuzzer_sys::fuzz_target;
use stub_ledger::{Ledger, TraceConfig, Violation};

const TARGETS: [&str; 3] = ["time", "rand", "exit"];

fuzz_target!(|data: &[u8]| {
    let mut ledger = Ledger::new();
    ledger.set_trace(TraceConfig {
        capture: false,
        ..TraceConfig::default()
    });

    for op in data.chunks(2) {
        let target = TARGETS[usize::from(op[0] >> 6) % TARGETS.len()];
        let arg = op.get(1).copied().unwrap_or(0);
        match op[0] & 0x7 {
            0 | 1 => ledger.expect_times(target, "fuzz::tests", usize::from(arg % 4), |_: &mut (u8,)| 1u8),
            2 => ledger.forbid(target, "fuzz::tests"),
            3 => ledger.reset(),
            4 => {
                let _ = ledger.assert_all_satisfied();
            }
            _ => {
                let before = ledger.invocations(target);
                match ledger.call::<(u8,), u8>(target, &mut (arg,)) {
                    Ok(Some(_)) => assert_eq!(ledger.invocations(target), before + 1),
                    Ok(None) => assert_eq!(ledger.expected_calls(target), 0),
                    Err(Violation::NeverExpected { .. }) => assert!(ledger.is_forbidden(target)),
                    Err(Violation::CallsLimitExceeded { limit, .. }) => assert!(before >= limit),
                    Err(other) => panic!("unexpected violation: {other}"),
                }
            }
        }
    }
});
