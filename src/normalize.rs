//! Output normalization before comparison.
//!
//! Interpreters print opaque objects as `qualified.Name@1a2b3c`, where the hex
//! part changes from run to run. Only that hex part is masked; everything else
//! is compared byte for byte.

use crate::error::ConfigError;
use regex::Regex;
use std::borrow::Cow;
use std::collections::HashMap;

pub const DEFAULT_IDENTITY_PATTERN: &str =
    r"[A-Za-z_$][\w$]*(?:\.[A-Za-z_$][\w$]*)*@(?P<hash>[0-9a-fA-F]+)\b";
pub const DEFAULT_PLACEHOLDER: &str = "<hash>";

#[derive(Debug, Clone)]
pub struct Normalizer {
    pattern: Regex,
    placeholder: String,
    consistent: bool,
}

impl Default for Normalizer {
    fn default() -> Self {
        Self {
            pattern: Regex::new(DEFAULT_IDENTITY_PATTERN).expect("default identity pattern is valid"),
            placeholder: DEFAULT_PLACEHOLDER.to_string(),
            consistent: false,
        }
    }
}

impl Normalizer {
    /// `pattern` must have a named group `hash`; only that group is replaced.
    pub fn new(pattern: &str, placeholder: &str) -> Result<Self, ConfigError> {
        let pattern = Regex::new(pattern)?;
        if !pattern.capture_names().any(|n| n == Some("hash")) {
            return Err(ConfigError::MissingHashGroup);
        }
        Ok(Self {
            pattern,
            placeholder: placeholder.to_string(),
            consistent: false,
        })
    }

    /// Require each expected hash to stand for the same actual hash throughout a session.
    pub fn with_consistent_identity(mut self, consistent: bool) -> Self {
        self.consistent = consistent;
        self
    }

    pub fn is_consistent(&self) -> bool {
        self.consistent
    }

    pub fn normalize<'a>(&self, text: &'a str) -> Cow<'a, str> {
        let mut out = String::new();
        let mut last = 0;
        let mut changed = false;
        for caps in self.pattern.captures_iter(text) {
            let Some(hash) = caps.name("hash") else {
                continue;
            };
            out.push_str(&text[last..hash.start()]);
            out.push_str(&self.placeholder);
            last = hash.end();
            changed = true;
        }
        if !changed {
            return Cow::Borrowed(text);
        }
        out.push_str(&text[last..]);
        Cow::Owned(out)
    }

    fn hashes<'a>(&self, text: &'a str) -> Vec<&'a str> {
        self.pattern
            .captures_iter(text)
            .filter_map(|c| c.name("hash").map(|m| m.as_str()))
            .collect()
    }

    /// Fresh comparison state for one session.
    pub fn matcher(&self) -> SessionMatcher<'_> {
        SessionMatcher {
            normalizer: self,
            identities: HashMap::new(),
        }
    }
}

/// Interpreters terminate printed lines; the transcript does not, and the
/// parser drops trailing blank expected lines. Trailing line breaks go here.
pub fn comparable_actual(actual: &str) -> &str {
    actual.trim_end_matches(['\r', '\n'])
}

pub struct SessionMatcher<'a> {
    normalizer: &'a Normalizer,
    identities: HashMap<String, String>,
}

impl SessionMatcher<'_> {
    pub fn matches(&mut self, expected: &str, actual: &str) -> bool {
        let n = self.normalizer;
        if n.normalize(expected) != n.normalize(actual) {
            return false;
        }
        if !n.consistent {
            return true;
        }
        let expected_hashes = n.hashes(expected);
        let actual_hashes = n.hashes(actual);
        if expected_hashes.len() != actual_hashes.len() {
            return false;
        }
        for (e, a) in expected_hashes.into_iter().zip(actual_hashes) {
            let bound = self
                .identities
                .entry(e.to_string())
                .or_insert_with(|| a.to_string());
            if bound != a {
                // same object in the transcript, different object now
                return false;
            }
        }
        true
    }
}
