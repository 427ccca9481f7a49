//! Turning a replay into one of four verdicts.
//!
//! | raw outcome          | normal          | EXPECT FAIL     |
//! |----------------------|-----------------|-----------------|
//! | matched              | expected pass   | unexpected pass |
//! | mismatched / errored | unexpected fail | expected fail   |

use crate::types::{Execution, RawOutcome, Session, SessionResult, SourceTag, Tally, Verdict};
use colored::Colorize;
use std::sync::atomic::{AtomicUsize, Ordering};

pub fn classify(outcome: &RawOutcome, expect_fail: bool) -> Verdict {
    match (outcome.is_matched(), expect_fail) {
        (true, false) => Verdict::ExpectedPass,
        (true, true) => Verdict::UnexpectedPass,
        (false, false) => Verdict::UnexpectedFail,
        (false, true) => Verdict::ExpectedFail,
    }
}

/// Verdict counts for one batch. Shared between worker threads.
#[derive(Debug, Default)]
pub struct Counters {
    expected_pass: AtomicUsize,
    expected_fail: AtomicUsize,
    unexpected_pass: AtomicUsize,
    unexpected_fail: AtomicUsize,
}

impl Counters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, verdict: Verdict) {
        let counter = match verdict {
            Verdict::ExpectedPass => &self.expected_pass,
            Verdict::ExpectedFail => &self.expected_fail,
            Verdict::UnexpectedPass => &self.unexpected_pass,
            Verdict::UnexpectedFail => &self.unexpected_fail,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> Tally {
        Tally {
            expected_pass: self.expected_pass.load(Ordering::Relaxed),
            expected_fail: self.expected_fail.load(Ordering::Relaxed),
            unexpected_pass: self.unexpected_pass.load(Ordering::Relaxed),
            unexpected_fail: self.unexpected_fail.load(Ordering::Relaxed),
        }
    }

    pub fn success(&self) -> bool {
        self.snapshot().unexpected() == 0
    }
}

/// Where verdict messages go.
pub trait Reporter: Send + Sync {
    fn error(&self, at: &SourceTag, message: &str);
    fn warning(&self, at: &SourceTag, message: &str);
}

/// Drops every message.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullReporter;

impl Reporter for NullReporter {
    fn error(&self, _at: &SourceTag, _message: &str) {}
    fn warning(&self, _at: &SourceTag, _message: &str) {}
}

#[derive(Debug, Default, Clone, Copy)]
pub struct StderrReporter;

impl Reporter for StderrReporter {
    fn error(&self, at: &SourceTag, message: &str) {
        eprintln!("{} {}", format!("{at}:").bold(), "error:".red().bold());
        eprintln!("{message}");
    }

    fn warning(&self, at: &SourceTag, message: &str) {
        eprintln!("{} {} {message}", format!("{at}:").bold(), "warning:".yellow().bold());
    }
}

/// Failure text with expected and actual output each on lines of their own.
pub fn failure_text(session: &Session, outcome: &RawOutcome) -> Option<String> {
    let input = |index: usize| session.statements[index].source();
    match outcome {
        RawOutcome::Matched => None,
        RawOutcome::Mismatched {
            index,
            expected,
            actual,
        } => Some(format!(
            "doctest failure running:\n{}expected:\n{expected}\nactual:\n{actual}\n",
            input(*index)
        )),
        RawOutcome::Errored {
            index: Some(index),
            message,
        } => Some(format!(
            "doctest failure running:\n{}threw:\n{message}\n",
            input(*index)
        )),
        RawOutcome::Errored {
            index: None,
            message,
        } => Some(format!("doctest setup failed:\n{message}\n")),
    }
}

/// Tag of the statement the replay stopped at, or of the session.
pub fn failure_tag(session: &Session, outcome: &RawOutcome) -> SourceTag {
    match outcome.failing_index() {
        Some(index) => session
            .source_tag
            .at_offset(session.statements[index].offset),
        None => session.source_tag.clone(),
    }
}

/// Classifies a finished replay, counts it, and reports anything unexpected.
pub fn judge(
    session: &Session,
    execution: Execution,
    reporter: &dyn Reporter,
    counters: &Counters,
) -> SessionResult {
    let outcome = execution.outcome;
    let verdict = classify(&outcome, session.expect_fail);
    counters.record(verdict);

    match verdict {
        Verdict::ExpectedPass => {}
        Verdict::UnexpectedPass => {
            reporter.error(&session.source_tag, "doctest unexpectedly passed.");
        }
        Verdict::ExpectedFail => {
            reporter.warning(&session.source_tag, "doctest failed as expected.");
        }
        Verdict::UnexpectedFail => {
            let text = failure_text(session, &outcome).unwrap_or_default();
            reporter.error(&failure_tag(session, &outcome), &text);
        }
    }

    SessionResult {
        source_tag: session.source_tag.clone(),
        failed_input: outcome
            .failing_index()
            .map(|i| session.statements[i].source()),
        statements: session.statements.len(),
        expect_fail: session.expect_fail,
        outcome,
        verdict,
    }
}
