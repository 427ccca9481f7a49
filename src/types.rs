use std::fmt;
use std::path::PathBuf;

/// Where a session came from. Only used for reporting.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SourceTag {
    pub file: PathBuf,
    pub line: usize,
}

impl SourceTag {
    pub fn new(file: impl Into<PathBuf>, line: usize) -> Self {
        Self {
            file: file.into(),
            line,
        }
    }

    /// Tag pointing `offset` lines further into the same file.
    pub fn at_offset(&self, offset: usize) -> Self {
        Self {
            file: self.file.clone(),
            line: self.line + offset,
        }
    }
}

impl fmt::Display for SourceTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.file.display(), self.line)
    }
}

/// One input/expected-output pair of a transcript.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Statement {
    /// Source lines, prompt markers removed. Never empty.
    pub input: Vec<String>,
    /// Output lines exactly as transcribed.
    pub expected: Vec<String>,
    /// Zero-based line of the primary prompt within the transcript.
    pub offset: usize,
}

impl Statement {
    /// The evaluation unit submitted to the interpreter.
    pub fn source(&self) -> String {
        let mut src = self.input.join("\n");
        src.push('\n');
        src
    }

    pub fn expected_text(&self) -> String {
        self.expected.join("\n")
    }
}

/// One parsed transcript, i.e. one doctest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub source_tag: SourceTag,
    /// Free text before the first prompt.
    pub description: Vec<String>,
    pub statements: Vec<Statement>,
    pub expect_fail: bool,
}

/// What a single statement produced. Exactly one of the two.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecutionResult {
    Output(String),
    Thrown(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepRecord {
    /// Index into `Session::statements`, `None` for the prologue.
    pub index: Option<usize>,
    pub result: ExecutionResult,
    pub matched: bool,
}

/// How the replay ended, before EXPECT FAIL is taken into account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawOutcome {
    Matched,
    Mismatched {
        index: usize,
        expected: String,
        actual: String,
    },
    Errored {
        index: Option<usize>,
        message: String,
    },
}

impl RawOutcome {
    pub fn is_matched(&self) -> bool {
        matches!(self, RawOutcome::Matched)
    }

    /// Statement the replay stopped at, if any.
    pub fn failing_index(&self) -> Option<usize> {
        match self {
            RawOutcome::Matched => None,
            RawOutcome::Mismatched { index, .. } => Some(*index),
            RawOutcome::Errored { index, .. } => *index,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Execution {
    pub steps: Vec<StepRecord>,
    pub outcome: RawOutcome,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Verdict {
    ExpectedPass,
    ExpectedFail,
    UnexpectedPass,
    UnexpectedFail,
}

impl Verdict {
    pub fn is_expected(self) -> bool {
        matches!(self, Verdict::ExpectedPass | Verdict::ExpectedFail)
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Verdict::ExpectedPass => "expected-pass",
            Verdict::ExpectedFail => "expected-fail",
            Verdict::UnexpectedPass => "unexpected-pass",
            Verdict::UnexpectedFail => "unexpected-fail",
        })
    }
}

#[derive(Debug, Clone)]
pub struct SessionResult {
    pub source_tag: SourceTag,
    /// Source of the statement the replay stopped at.
    pub failed_input: Option<String>,
    pub statements: usize,
    pub expect_fail: bool,
    pub outcome: RawOutcome,
    pub verdict: Verdict,
}

/// Plain snapshot of the verdict counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Tally {
    pub expected_pass: usize,
    pub expected_fail: usize,
    pub unexpected_pass: usize,
    pub unexpected_fail: usize,
}

impl Tally {
    pub fn total(&self) -> usize {
        self.expected_pass + self.expected_fail + self.unexpected_pass + self.unexpected_fail
    }

    pub fn unexpected(&self) -> usize {
        self.unexpected_pass + self.unexpected_fail
    }
}

/// A session file that never made it to the executor.
#[derive(Debug, Clone)]
pub struct LoadFailure {
    pub file: PathBuf,
    pub message: String,
}

#[derive(Debug, Clone, Default)]
pub struct Summary {
    pub tally: Tally,
    pub sessions: Vec<SessionResult>,
    pub load_failures: Vec<LoadFailure>,
}

impl Summary {
    pub fn total(&self) -> usize {
        self.tally.total()
    }

    pub fn success(&self) -> bool {
        self.tally.unexpected() == 0 && self.load_failures.is_empty()
    }
}
