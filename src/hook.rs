//! Interception hook registration.
//!
//! A hook decides whether a call to a target made from a given scope is
//! redirected into the ledger. Scopes are module paths as produced by
//! `module_path!()`.

use crate::logging;
use std::collections::HashSet;

/// Capability that redirects calls to a target from within a scope.
pub trait InterceptionHook {
    /// Redirect `target` for `scope`. Returns `true` only when something new was installed.
    fn register(&mut self, scope: &str, target: &str) -> bool;

    /// Whether calls to `target` made from `scope` go through the ledger
    fn is_redirected(&self, scope: &str, target: &str) -> bool;
}

/// Default hook: a table of redirected `(scope, target)` pairs.
///
/// Registering from a test module also redirects the module under test, so
/// `app::clock::tests` covers calls made from `app::clock`.
#[derive(Debug, Clone, Default)]
pub struct ScopeTable {
    redirected: HashSet<(String, String)>,
}

impl ScopeTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Scopes a caller context stands for: itself, then itself without `tests`/`test` segments.
    pub fn derive_scopes(context: &str) -> Vec<String> {
        let context = context.trim();
        let mut scopes = vec![context.to_string()];

        let production = context
            .split("::")
            .filter(|segment| *segment != "tests" && *segment != "test")
            .collect::<Vec<_>>()
            .join("::");
        if !production.is_empty() && production != context {
            scopes.push(production);
        }
        scopes
    }

    pub fn len(&self) -> usize {
        self.redirected.len()
    }

    pub fn is_empty(&self) -> bool {
        self.redirected.is_empty()
    }
}

impl InterceptionHook for ScopeTable {
    fn register(&mut self, scope: &str, target: &str) -> bool {
        let mut installed = false;
        for derived in Self::derive_scopes(scope) {
            if self.is_redirected(&derived, target) {
                continue;
            }
            logging::log_hook_installed(target, &derived);
            self.redirected.insert((derived, target.to_string()));
            installed = true;
        }
        installed
    }

    fn is_redirected(&self, scope: &str, target: &str) -> bool {
        self.redirected
            .contains(&(scope.to_string(), target.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derives_production_scope_from_test_module() {
        assert_eq!(
            ScopeTable::derive_scopes("app::clock::tests"),
            vec!["app::clock::tests".to_string(), "app::clock".to_string()]
        );
        assert_eq!(
            ScopeTable::derive_scopes("app::tests::clock"),
            vec!["app::tests::clock".to_string(), "app::clock".to_string()]
        );
    }

    #[test]
    fn production_scope_maps_to_itself_only() {
        assert_eq!(
            ScopeTable::derive_scopes("app::clock"),
            vec!["app::clock".to_string()]
        );
        assert_eq!(ScopeTable::derive_scopes("tests"), vec!["tests".to_string()]);
    }

    #[test]
    fn registration_is_idempotent() {
        let mut table = ScopeTable::new();
        assert!(table.register("app::clock::tests", "now"));
        assert!(!table.register("app::clock::tests", "now"));
        assert!(!table.register("app::clock", "now"));
        assert_eq!(table.len(), 2);

        assert!(table.is_redirected("app::clock", "now"));
        assert!(table.is_redirected("app::clock::tests", "now"));
        assert!(!table.is_redirected("app::net", "now"));
        assert!(!table.is_redirected("app::clock", "Now"));
    }
}
