//! Transcript parser.
//!
//! A transcript looks like an interactive session:
//!
//! ```text
//! Optional description, may say EXPECT FAIL.
//! js> for (var i = 0; i < 2; i++) {
//!   >   print(i);
//!   > }
//! 0
//! 1
//! js> "done"
//! done
//! ```

use crate::error::{ConfigError, ParseError};
use crate::types::{Session, SourceTag, Statement};
use regex::Regex;
use std::sync::OnceLock;

pub const DEFAULT_PRIMARY_PROMPT: &str = "js>";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prompts {
    pub primary: String,
    pub continuation: String,
}

impl Prompts {
    /// Primary prompt plus a continuation prompt of the same width (`js>` gives `  >`).
    pub fn new(primary: &str) -> Result<Self, ConfigError> {
        let width = primary.chars().count();
        if width == 0 {
            return Err(ConfigError::EmptyPrompt);
        }
        let continuation = format!("{}>", " ".repeat(width - 1));
        Ok(Self {
            primary: primary.to_string(),
            continuation,
        })
    }

    pub fn with_continuation(primary: &str, continuation: &str) -> Result<Self, ConfigError> {
        if primary.is_empty() || continuation.is_empty() {
            return Err(ConfigError::EmptyPrompt);
        }
        Ok(Self {
            primary: primary.to_string(),
            continuation: continuation.to_string(),
        })
    }
}

impl Default for Prompts {
    fn default() -> Self {
        Self {
            primary: DEFAULT_PRIMARY_PROMPT.to_string(),
            continuation: "  >".to_string(),
        }
    }
}

fn expect_fail_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\bEXPECT\s+FAIL\b").expect("EXPECT FAIL pattern is valid"))
}

/// Whether the text carries the `EXPECT FAIL` marker anywhere.
pub fn has_expect_fail(text: &str) -> bool {
    expect_fail_pattern().is_match(text)
}

fn leading_whitespace(line: &str) -> &str {
    &line[..line.len() - line.trim_start_matches([' ', '\t']).len()]
}

/// Removes the transcript's indentation from every line.
///
/// The indentation is that of the first prompt line, or of the first
/// non-blank line when there is no prompt. A line indented less keeps its text
/// and loses only the part of its indentation it shares with the prefix, so
/// the description may start at column 0 (as on a doc tag line) and adding the
/// same indentation to all lines never changes the result.
pub fn strip_indentation<'t>(text: &'t str, prompts: &Prompts) -> Vec<&'t str> {
    let lines: Vec<&str> = text.lines().collect();
    let prefix = lines
        .iter()
        .find(|l| l.trim_start_matches([' ', '\t']).starts_with(prompts.primary.as_str()))
        .or_else(|| lines.iter().find(|l| !l.trim().is_empty()))
        .map(|l| leading_whitespace(l))
        .unwrap_or("");
    lines
        .into_iter()
        .map(|l| {
            if l.trim().is_empty() {
                return "";
            }
            let shared = l
                .bytes()
                .zip(prefix.bytes())
                .take_while(|(a, b)| a == b)
                .count();
            &l[shared..]
        })
        .collect()
}

// One space after a prompt belongs to the marker.
fn prompt_body(rest: &str) -> String {
    rest.strip_prefix(' ').unwrap_or(rest).to_string()
}

/// Splits a transcript into statements and their expected output.
pub fn parse(text: &str, prompts: &Prompts, source_tag: SourceTag) -> Result<Session, ParseError> {
    let expect_fail = has_expect_fail(text);
    let mut description = Vec::new();
    let mut statements: Vec<Statement> = Vec::new();
    let mut in_input = false;

    for (offset, line) in strip_indentation(text, prompts).into_iter().enumerate() {
        if let Some(rest) = line.strip_prefix(prompts.primary.as_str()) {
            statements.push(Statement {
                input: vec![prompt_body(rest)],
                expected: Vec::new(),
                offset,
            });
            in_input = true;
            continue;
        }
        let Some(current) = statements.last_mut() else {
            description.push(line.to_string());
            continue;
        };
        if in_input {
            if let Some(rest) = line.strip_prefix(prompts.continuation.as_str()) {
                current.input.push(prompt_body(rest));
                continue;
            }
            in_input = false;
        }
        current.expected.push(line.to_string());
    }

    if statements.is_empty() {
        return Err(ParseError::NoStatements {
            prompt: prompts.primary.clone(),
        });
    }
    for statement in &mut statements {
        while statement.expected.last().is_some_and(|l| l.is_empty()) {
            statement.expected.pop();
        }
    }

    Ok(Session {
        source_tag,
        description,
        statements,
        expect_fail,
    })
}
