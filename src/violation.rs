use crate::config::TraceConfig;
use crate::ledger::Signature;
use miette::Diagnostic;
use serde::Serialize;
use std::backtrace::Backtrace;
use std::fmt;
use std::panic::Location;

/// Result of a dispatch or verification step
pub type DispatchResult<T> = std::result::Result<T, Violation>;

/// Where a violation was raised: the caller location plus an optional trace
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CallSite {
    pub location: String,
    pub frames: Vec<String>,
}

impl CallSite {
    /// Record the given location, capturing a backtrace when `trace.capture` is set.
    pub fn capture_at(location: &'static Location<'static>, trace: &TraceConfig) -> Self {
        let frames = if trace.capture {
            let rendered = Backtrace::force_capture().to_string();
            strip_internal_frames(&rendered, trace.skip_frames, trace.max_frames)
        } else {
            Vec::new()
        };

        Self {
            location: location.to_string(),
            frames,
        }
    }
}

impl fmt::Display for CallSite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.location)?;
        for (i, frame) in self.frames.iter().enumerate() {
            write!(f, "\n#{} {}", i, frame)?;
        }
        Ok(())
    }
}

/// Split a rendered `std::backtrace::Backtrace` into frames, drop the leading
/// framework-internal ones and keep at most `max_frames`.
///
/// At least `skip_frames` leading frames are dropped; after that, frames keep
/// being dropped while they belong to the backtrace machinery or this crate.
pub fn strip_internal_frames(rendered: &str, skip_frames: usize, max_frames: usize) -> Vec<String> {
    let mut frames: Vec<String> = Vec::new();
    for line in rendered.lines() {
        let trimmed = line.trim();
        if let Some((index, symbol)) = trimmed.split_once(": ") {
            if !index.is_empty() && index.chars().all(|c| c.is_ascii_digit()) {
                frames.push(symbol.to_string());
                continue;
            }
        }
        if let (Some(at), Some(frame)) = (trimmed.strip_prefix("at "), frames.last_mut()) {
            frame.push_str(" at ");
            frame.push_str(at);
        }
    }

    let mut skipped = 0;
    frames
        .into_iter()
        .skip_while(|frame| {
            let skip = skipped < skip_frames || is_internal_frame(frame);
            skipped += 1;
            skip
        })
        .take(max_frames)
        .collect()
}

fn is_internal_frame(frame: &str) -> bool {
    let symbol = frame.trim_start_matches('<');
    symbol.starts_with("std::backtrace") || symbol.starts_with("stub_ledger::")
}

/// Violation categories, usable without the message payload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ViolationKind {
    NeverExpected,
    CallsLimitExceeded,
    NotEnoughCalls,
    SignatureMismatch,
    Reentered,
}

/// A broken expectation. Every variant is fatal to the test that raised it.
#[derive(Debug, Clone, thiserror::Error, Diagnostic)]
pub enum Violation {
    #[error("Function {target} was never expected to be called. In:\n{site}")]
    #[diagnostic(
        code(stub_ledger::never_expected),
        help("The target was registered with forbid(); the code under test must not call it.")
    )]
    NeverExpected { target: String, site: CallSite },

    #[error("Function {target} is not expected to be called more than {limit} {}. In:\n{site}", times(.limit))]
    #[diagnostic(
        code(stub_ledger::calls_limit_exceeded),
        help("Queue another stand-in with expect() or raise the repeat count.")
    )]
    CallsLimitExceeded {
        target: String,
        limit: usize,
        site: CallSite,
    },

    #[error("Function [{target}] was expected to be called {expected} times, actually called {actual} times. In:\n{site}")]
    #[diagnostic(
        code(stub_ledger::not_enough_calls),
        help("Either the code under test skipped a call or too many stand-ins were queued.")
    )]
    NotEnoughCalls {
        target: String,
        expected: usize,
        actual: usize,
        site: CallSite,
    },

    #[error("Stand-in for {target} is {expected} but was called as {actual}. In:\n{site}")]
    #[diagnostic(
        code(stub_ledger::signature_mismatch),
        help("Register the stand-in with the same argument tuple and return type the interception hook uses.")
    )]
    SignatureMismatch {
        target: String,
        expected: Signature,
        actual: Signature,
        site: CallSite,
    },

    #[error("Stand-in for {target} was called again before its previous call returned. In:\n{site}")]
    #[diagnostic(
        code(stub_ledger::reentered),
        help("Register recursive stand-ins with expect_reentrant(), which takes an Fn closure.")
    )]
    Reentered { target: String, site: CallSite },
}

fn times(n: &usize) -> &'static str {
    if *n > 1 {
        "times"
    } else {
        "time"
    }
}

impl Violation {
    pub fn kind(&self) -> ViolationKind {
        match self {
            Violation::NeverExpected { .. } => ViolationKind::NeverExpected,
            Violation::CallsLimitExceeded { .. } => ViolationKind::CallsLimitExceeded,
            Violation::NotEnoughCalls { .. } => ViolationKind::NotEnoughCalls,
            Violation::SignatureMismatch { .. } => ViolationKind::SignatureMismatch,
            Violation::Reentered { .. } => ViolationKind::Reentered,
        }
    }

    /// Name of the target the violation concerns
    pub fn target(&self) -> &str {
        match self {
            Violation::NeverExpected { target, .. }
            | Violation::CallsLimitExceeded { target, .. }
            | Violation::NotEnoughCalls { target, .. }
            | Violation::SignatureMismatch { target, .. }
            | Violation::Reentered { target, .. } => target,
        }
    }

    pub fn site(&self) -> &CallSite {
        match self {
            Violation::NeverExpected { site, .. }
            | Violation::CallsLimitExceeded { site, .. }
            | Violation::NotEnoughCalls { site, .. }
            | Violation::SignatureMismatch { site, .. }
            | Violation::Reentered { site, .. } => site,
        }
    }
}
