use crate::backend::{Interpreter, Scope};
use crate::error::InterpreterError;
use crate::normalize::{Normalizer, SessionMatcher, comparable_actual};
use crate::types::{Execution, ExecutionResult, RawOutcome, Session, StepRecord};
use tracing::debug;

/// Bookkeeping for one replay, independent of how statements are evaluated.
pub struct Replay<'a> {
    session: &'a Session,
    matcher: SessionMatcher<'a>,
    steps: Vec<StepRecord>,
}

impl<'a> Replay<'a> {
    pub fn new(session: &'a Session, normalizer: &'a Normalizer) -> Self {
        Self {
            session,
            matcher: normalizer.matcher(),
            steps: Vec::with_capacity(session.statements.len()),
        }
    }

    /// Prologue output is not compared; only a throw stops the replay.
    pub fn prologue(&mut self, result: Result<String, InterpreterError>) -> Option<RawOutcome> {
        match result {
            Ok(output) => {
                self.steps.push(StepRecord {
                    index: None,
                    result: ExecutionResult::Output(output),
                    matched: true,
                });
                None
            }
            Err(e) => {
                let message = e.to_string();
                self.steps.push(StepRecord {
                    index: None,
                    result: ExecutionResult::Thrown(message.clone()),
                    matched: false,
                });
                Some(RawOutcome::Errored {
                    index: None,
                    message,
                })
            }
        }
    }

    /// Records statement `index`; `Some` means the replay stops here.
    pub fn step(
        &mut self,
        index: usize,
        result: Result<String, InterpreterError>,
    ) -> Option<RawOutcome> {
        let statement = &self.session.statements[index];
        match result {
            Ok(output) => {
                let expected = statement.expected_text();
                let actual = comparable_actual(&output).to_string();
                let matched = self.matcher.matches(&expected, &actual);
                self.steps.push(StepRecord {
                    index: Some(index),
                    result: ExecutionResult::Output(output),
                    matched,
                });
                (!matched).then(|| RawOutcome::Mismatched {
                    index,
                    expected,
                    actual,
                })
            }
            Err(e) => {
                let message = e.to_string();
                self.steps.push(StepRecord {
                    index: Some(index),
                    result: ExecutionResult::Thrown(message.clone()),
                    matched: false,
                });
                Some(RawOutcome::Errored {
                    index: Some(index),
                    message,
                })
            }
        }
    }

    pub fn finish(self, outcome: RawOutcome) -> Execution {
        Execution {
            steps: self.steps,
            outcome,
        }
    }
}

/// Runs the statements of `session` in order in `scope`, stopping at the first
/// statement that throws or does not match.
pub fn execute<S: Scope + ?Sized>(
    scope: &mut S,
    session: &Session,
    prologue: Option<&str>,
    normalizer: &Normalizer,
) -> Execution {
    let mut replay = Replay::new(session, normalizer);
    if let Some(src) = prologue {
        if let Some(outcome) = replay.prologue(scope.evaluate(src)) {
            debug!(session = %session.source_tag, "prologue failed");
            return replay.finish(outcome);
        }
    }
    for (index, statement) in session.statements.iter().enumerate() {
        let result = scope.evaluate(&statement.source());
        if let Some(outcome) = replay.step(index, result) {
            debug!(session = %session.source_tag, statement = index, "replay stopped");
            return replay.finish(outcome);
        }
    }
    replay.finish(RawOutcome::Matched)
}

/// Runs `session` in a scope of its own; the scope is torn down on return.
pub fn run_session<I: Interpreter>(
    interpreter: &I,
    session: &Session,
    prologue: Option<&str>,
    normalizer: &Normalizer,
) -> Execution {
    match interpreter.new_scope() {
        Ok(mut scope) => execute(&mut scope, session, prologue, normalizer),
        Err(e) => Execution {
            steps: Vec::new(),
            outcome: RawOutcome::Errored {
                index: None,
                message: format!("{e:#}"),
            },
        },
    }
}
