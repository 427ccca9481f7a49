//! Writing parsed sessions back out as stand-alone transcripts.

use crate::transcript::{Prompts, has_expect_fail};
use crate::types::Session;
use crate::t_args;
use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Group directory used when none is configured.
pub const DEFAULT_GROUP: &str = "default";

fn push_prompted(out: &mut String, prompt: &str, line: &str) {
    out.push_str(prompt);
    if !line.is_empty() {
        out.push(' ');
        out.push_str(line);
    }
    out.push('\n');
}

fn push_input<'a>(out: &mut String, prompts: &Prompts, lines: impl IntoIterator<Item = &'a str>) {
    for (i, line) in lines.into_iter().enumerate() {
        let prompt = if i == 0 {
            &prompts.primary
        } else {
            &prompts.continuation
        };
        push_prompted(out, prompt, line);
    }
}

/// Serializes `session` in transcript form.
///
/// A prologue becomes a statement of its own, ahead of the first one, with no
/// expected output.
pub fn emit(session: &Session, prologue: Option<&str>, prompts: &Prompts) -> String {
    let mut head = String::new();
    for line in &session.description {
        head.push_str(line);
        head.push('\n');
    }

    let mut body = String::new();
    if let Some(prologue) = prologue {
        push_input(&mut body, prompts, prologue.lines());
    }
    for statement in &session.statements {
        push_input(&mut body, prompts, statement.input.iter().map(String::as_str));
        for line in &statement.expected {
            body.push_str(line);
            body.push('\n');
        }
    }

    if session.expect_fail && !has_expect_fail(&head) && !has_expect_fail(&body) {
        head.push_str("EXPECT FAIL\n");
    }
    head + &body
}

/// `String.hashCode` over UTF-16 units, as used for stand-alone test file names.
pub fn transcript_hash(text: &str) -> u32 {
    text.encode_utf16()
        .fold(0u32, |h, unit| h.wrapping_mul(31).wrapping_add(u32::from(unit)))
}

pub fn file_name_for(session: &Session, prompts: &Prompts) -> String {
    format!("test-{:08x}.js", transcript_hash(&emit(session, None, prompts)))
}

/// Writes `<dir>/<group>/test-<hash>.js`, headed by the source tag.
pub fn emit_to_dir(
    dir: &Path,
    group: &str,
    session: &Session,
    prologue: Option<&str>,
    prompts: &Prompts,
) -> Result<PathBuf> {
    let out_dir = dir.join(group);
    fs::create_dir_all(&out_dir)
        .with_context(|| t_args!("emit-mkdir-failed", "dir" => out_dir.display()))?;
    let path = out_dir.join(file_name_for(session, prompts));
    let text = format!(
        "{}\n\n{}",
        session.source_tag,
        emit(session, prologue, prompts)
    );
    fs::write(&path, text).with_context(|| t_args!("emit-write-failed", "file" => path.display()))?;
    debug!("{}", t_args!("debug-emitted", "file" => path.display()));
    Ok(path)
}
