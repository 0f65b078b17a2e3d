use serde::Serialize;
use std::any::{type_name, Any};
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

enum Behavior<A, R> {
    /// Exclusive while running; a nested call into the same closure is refused.
    Mut(RefCell<Box<dyn FnMut(&mut A) -> R>>),
    /// Stateless, so nested calls may re-enter it.
    Reentrant(Box<dyn Fn(&mut A) -> R>),
}

/// Why a stand-in could not run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvokeError {
    /// The call's argument or return type differs from the stand-in's
    Signature,
    /// An `FnMut` stand-in was called again before its previous call returned
    Reentered,
}

/// Argument tuple and return type names of a stand-in or call site
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Signature {
    pub args: &'static str,
    pub output: &'static str,
}

impl Signature {
    pub fn of<A: 'static, R: 'static>() -> Self {
        Self {
            args: type_name::<A>(),
            output: type_name::<R>(),
        }
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "fn(&mut {}) -> {}", self.args, self.output)
    }
}

/// A type-erased behavior standing in for a target.
///
/// Clones share the same closure, so a stand-in queued several times keeps
/// any state it captured across those calls.
#[derive(Clone)]
pub struct StandIn {
    behavior: Rc<dyn Any>,
    signature: Signature,
}

impl StandIn {
    /// Wrap a closure receiving the call's argument tuple by mutable reference.
    pub fn new<A, R, F>(f: F) -> Self
    where
        A: 'static,
        R: 'static,
        F: FnMut(&mut A) -> R + 'static,
    {
        let boxed: Box<dyn FnMut(&mut A) -> R> = Box::new(f);
        Self::erase(Behavior::Mut(RefCell::new(boxed)))
    }

    /// Wrap a stateless closure. Unlike [`StandIn::new`], it may call its own
    /// target again while it runs.
    pub fn reentrant<A, R, F>(f: F) -> Self
    where
        A: 'static,
        R: 'static,
        F: Fn(&mut A) -> R + 'static,
    {
        let boxed: Box<dyn Fn(&mut A) -> R> = Box::new(f);
        Self::erase(Behavior::Reentrant(boxed))
    }

    fn erase<A: 'static, R: 'static>(behavior: Behavior<A, R>) -> Self {
        Self {
            behavior: Rc::new(behavior),
            signature: Signature::of::<A, R>(),
        }
    }

    pub fn signature(&self) -> &Signature {
        &self.signature
    }

    /// Run the behavior with the call's argument tuple.
    pub fn invoke<A: 'static, R: 'static>(&self, args: &mut A) -> Result<R, InvokeError> {
        let behavior = self
            .behavior
            .downcast_ref::<Behavior<A, R>>()
            .ok_or(InvokeError::Signature)?;
        match behavior {
            Behavior::Mut(cell) => {
                let mut f = cell.try_borrow_mut().map_err(|_| InvokeError::Reentered)?;
                Ok(f(args))
            }
            Behavior::Reentrant(f) => Ok(f(args)),
        }
    }

    /// Whether both handles share the same closure
    pub fn same_behavior(&self, other: &StandIn) -> bool {
        Rc::ptr_eq(&self.behavior, &other.behavior)
    }
}

impl fmt::Debug for StandIn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StandIn")
            .field("signature", &self.signature)
            .finish()
    }
}

/// One slot in a target's queue
#[derive(Debug, Clone)]
pub enum Expectation {
    StandIn(StandIn),
    Forbidden,
}

/// Ordered expectations for a single target
#[derive(Debug, Clone, Default)]
pub struct ExpectationQueue {
    entries: Vec<Expectation>,
}

impl ExpectationQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `repeat` copies of `stand_in`; returns how many were appended.
    pub fn push_stand_in(&mut self, stand_in: &StandIn, repeat: usize) -> usize {
        self.entries
            .extend(std::iter::repeat_with(|| Expectation::StandIn(stand_in.clone())).take(repeat));
        repeat
    }

    /// Insert the forbidden sentinel unless already present; returns whether it was inserted.
    pub fn forbid(&mut self) -> bool {
        if self.is_forbidden() {
            return false;
        }
        self.entries.push(Expectation::Forbidden);
        true
    }

    pub fn is_forbidden(&self) -> bool {
        self.entries
            .iter()
            .any(|entry| matches!(entry, Expectation::Forbidden))
    }

    /// Stand-in answering the call with 0-based ordinal `index`
    pub fn stand_in(&self, index: usize) -> Option<&StandIn> {
        match self.entries.get(index) {
            Some(Expectation::StandIn(stand_in)) => Some(stand_in),
            _ => None,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[Expectation] {
        &self.entries
    }
}
