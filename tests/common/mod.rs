// Shared mock interpreter for the integration tests.
#![allow(dead_code)]

use anyhow::Result;
use session_doctest::backend::{Interpreter, Scope};
use session_doctest::error::InterpreterError;
use session_doctest::transcript::{Prompts, parse};
use session_doctest::types::{Session, SourceTag};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_IDENTITY: AtomicU64 = AtomicU64::new(0x9f0e1d);

/// Understands integer sums, `x = expr`, `print(expr)`, `print("text")`, `new Object()`,
/// `function` declarations and `throw`.
#[derive(Default)]
pub struct MockScope {
    vars: HashMap<String, i64>,
}

impl MockScope {
    fn value(&self, expr: &str) -> Result<i64, InterpreterError> {
        let mut total = 0;
        for term in expr.split('+') {
            let term = term.trim();
            total += match term.parse::<i64>() {
                Ok(n) => n,
                Err(_) => *self.vars.get(term).ok_or_else(|| {
                    InterpreterError::Thrown(format!("ReferenceError: \"{term}\" is not defined."))
                })?,
            };
        }
        Ok(total)
    }
}

impl Scope for MockScope {
    fn evaluate(&mut self, source: &str) -> Result<String, InterpreterError> {
        let src = source.trim().trim_end_matches(';');
        if let Some(message) = src.strip_prefix("throw ") {
            return Err(InterpreterError::Thrown(format!(
                "Error: {}",
                message.trim_matches('"')
            )));
        }
        if src.starts_with("function ") {
            return Ok(String::new());
        }
        if src == "new Object()" {
            let id = NEXT_IDENTITY.fetch_add(0x1111, Ordering::Relaxed);
            return Ok(format!("Object@{id:x}\n"));
        }
        if let Some(inner) = src.strip_prefix("print(").and_then(|s| s.strip_suffix(')')) {
            if let Some(text) = inner.strip_prefix('"').and_then(|s| s.strip_suffix('"')) {
                return Ok(format!("{}\n", text.replace("\\n", "\n")));
            }
            return Ok(format!("{}\n", self.value(inner)?));
        }
        if let Some((name, expr)) = src.split_once('=') {
            let name = name.trim().trim_start_matches("var ").trim();
            let value = self.value(expr)?;
            self.vars.insert(name.to_string(), value);
            return Ok(format!("{value}\n"));
        }
        Ok(format!("{}\n", self.value(src)?))
    }
}

pub struct MockInterpreter;

impl Interpreter for MockInterpreter {
    type Scope = MockScope;

    fn new_scope(&self) -> Result<MockScope> {
        Ok(MockScope::default())
    }

    fn validate(&self) -> Result<()> {
        Ok(())
    }
}

pub fn session(file: &str, text: &str) -> Session {
    parse(text, &Prompts::default(), SourceTag::new(file, 1)).unwrap()
}
