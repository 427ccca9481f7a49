use crate::backend::Interpreter;
use crate::executor::run_session;
use crate::normalize::Normalizer;
use crate::types::{SessionResult, Session, Summary, Tally, Verdict};
use crate::verdict::{Counters, Reporter, judge};
use rayon::prelude::*;
use tracing::debug;

/// Settings shared by every session of a batch.
#[derive(Debug, Clone, Copy)]
pub struct RunOptions<'a> {
    pub prologue: Option<&'a str>,
    pub normalizer: &'a Normalizer,
}

pub fn tally_of(results: &[SessionResult]) -> Tally {
    let mut tally = Tally::default();
    for r in results {
        match r.verdict {
            Verdict::ExpectedPass => tally.expected_pass += 1,
            Verdict::ExpectedFail => tally.expected_fail += 1,
            Verdict::UnexpectedPass => tally.unexpected_pass += 1,
            Verdict::UnexpectedFail => tally.unexpected_fail += 1,
        }
    }
    tally
}

/// Replays every session in a scope of its own, in parallel.
pub fn run_sessions<I: Interpreter>(
    interpreter: &I,
    sessions: &[Session],
    opts: RunOptions<'_>,
    reporter: &dyn Reporter,
    counters: &Counters,
) -> Summary {
    let results: Vec<SessionResult> = sessions
        .par_iter()
        .map(|session| {
            debug!(session = %session.source_tag, statements = session.statements.len(), "replaying");
            let execution = run_session(interpreter, session, opts.prologue, opts.normalizer);
            judge(session, execution, reporter, counters)
        })
        .collect();
    Summary {
        tally: tally_of(&results),
        sessions: results,
        load_failures: Vec::new(),
    }
}
