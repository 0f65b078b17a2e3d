use stub_ledger::{shared, Config, Ledger, StandIn, TraceConfig};

/// Fluent setup of expectations, built into a standalone [`Ledger`] or
/// installed into the current thread's shared one.
pub struct LedgerBuilder {
    scope: String,
    steps: Vec<Step>,
    reals: Vec<Box<dyn FnOnce(&mut Ledger)>>,
    trace: Option<TraceConfig>,
}

struct Step {
    target: String,
    scope: String,
    stand_in: Option<StandIn>,
    repeat: usize,
}

impl LedgerBuilder {
    /// Start a builder whose expectations are registered from `scope`,
    /// usually `module_path!()` of the test.
    pub fn new(scope: &str) -> Self {
        Self {
            scope: scope.to_string(),
            steps: Vec::new(),
            reals: Vec::new(),
            trace: None,
        }
    }

    /// Register the following expectations from a different scope.
    pub fn from_scope(mut self, scope: &str) -> Self {
        self.scope = scope.to_string();
        self
    }

    pub fn expect<A, R, F>(self, target: &str, f: F) -> Self
    where
        A: 'static,
        R: 'static,
        F: FnMut(&mut A) -> R + 'static,
    {
        self.expect_times(target, 1, f)
    }

    pub fn expect_times<A, R, F>(mut self, target: &str, times: usize, f: F) -> Self
    where
        A: 'static,
        R: 'static,
        F: FnMut(&mut A) -> R + 'static,
    {
        self.steps.push(Step {
            target: target.to_string(),
            scope: self.scope.clone(),
            stand_in: Some(StandIn::new(f)),
            repeat: times,
        });
        self
    }

    /// Expect `times` calls returning clones of `value`.
    pub fn returning<A, R>(self, target: &str, times: usize, value: R) -> Self
    where
        A: 'static,
        R: Clone + 'static,
    {
        self.expect_times(target, times, move |_: &mut A| value.clone())
    }

    pub fn forbid(mut self, target: &str) -> Self {
        self.steps.push(Step {
            target: target.to_string(),
            scope: self.scope.clone(),
            stand_in: None,
            repeat: 1,
        });
        self
    }

    /// Real implementation used when `target` has nothing queued.
    pub fn with_real<A, R, F>(mut self, target: &str, f: F) -> Self
    where
        A: 'static,
        R: 'static,
        F: FnMut(&mut A) -> R + 'static,
    {
        let target = target.to_string();
        self.reals
            .push(Box::new(move |ledger: &mut Ledger| ledger.register_real(&target, f)));
        self
    }

    pub fn with_trace(mut self, trace: TraceConfig) -> Self {
        self.trace = Some(trace);
        self
    }

    /// Build a standalone ledger.
    pub fn build(self) -> Ledger {
        let mut ledger = Ledger::from_config(&Config::load_or_default());
        if let Some(trace) = self.trace {
            ledger.set_trace(trace);
        }
        for register in self.reals {
            register(&mut ledger);
        }
        for step in self.steps {
            ledger.add(&step.target, &step.scope, step.stand_in, step.repeat);
        }
        ledger
    }

    /// Reset the current thread's shared ledger and register the expectations there.
    pub fn install(self) {
        shared::with_ledger(|ledger| {
            ledger.reset();
            if let Some(trace) = self.trace {
                ledger.set_trace(trace);
            }
            for register in self.reals {
                register(&mut *ledger);
            }
            for step in self.steps {
                ledger.add(&step.target, &step.scope, step.stand_in, step.repeat);
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_queues_in_order() {
        let mut ledger = LedgerBuilder::new("app::tests")
            .returning::<(), u64>("time", 2, 5)
            .expect("time", |_: &mut ()| 6u64)
            .forbid("exit")
            .forbid("exit")
            .build();

        assert_eq!(ledger.expected_calls("time"), 3);
        assert_eq!(ledger.expected_calls("exit"), 1);
        let results: Vec<u64> = (0..3)
            .map(|_| ledger.call::<(), u64>("time", &mut ()).unwrap().unwrap())
            .collect();
        assert_eq!(results, vec![5, 5, 6]);
    }

    #[test]
    fn scope_switch_applies_to_later_steps() {
        let ledger = LedgerBuilder::new("app::clock::tests")
            .returning::<(), u64>("time", 1, 5)
            .from_scope("app::net")
            .returning::<(String,), bool>("resolve", 1, true)
            .build();

        assert!(ledger.is_redirected("app::clock", "time"));
        assert!(ledger.is_redirected("app::net", "resolve"));
        assert!(!ledger.is_redirected("app::clock", "resolve"));
    }

    #[test]
    fn real_passthrough_is_registered() {
        let mut ledger = LedgerBuilder::new("app::tests")
            .with_real("hostname", |_: &mut ()| "build-box".to_string())
            .build();
        let name: Option<String> = ledger.call("hostname", &mut ()).unwrap();
        assert_eq!(name.as_deref(), Some("build-box"));
    }
}
