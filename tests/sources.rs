mod common;

use anyhow::Result;
use common::{MockInterpreter, session};
use session_doctest::emit::emit_to_dir;
use session_doctest::engine::{RunOptions, run_sessions};
use session_doctest::normalize::Normalizer;
use session_doctest::sources::load_sessions;
use session_doctest::transcript::Prompts;
use session_doctest::types::Verdict;
use session_doctest::verdict::{Counters, NullReporter};
use std::fs;

fn js() -> Vec<String> {
    vec!["js".to_string()]
}

#[test]
fn loads_directory_in_name_order() -> Result<()> {
    let dir = tempfile::tempdir()?;
    fs::write(dir.path().join("b.js"), "js> 1+1\n2\n")?;
    fs::write(dir.path().join("a.js"), "  Indented.\n  js> 2\n  2\n")?;
    fs::write(dir.path().join("notes.txt"), "js> 1\n1\n")?;
    fs::create_dir(dir.path().join("sub"))?;
    fs::write(dir.path().join("sub").join("c.js"), "js> 3\n3\n")?;

    let loaded = load_sessions(&[dir.path().to_path_buf()], &js(), &Prompts::default(), false);
    let names: Vec<_> = loaded
        .sessions
        .iter()
        .map(|s| s.source_tag.file.strip_prefix(dir.path()).unwrap().to_path_buf())
        .collect();
    assert_eq!(
        names,
        vec![
            "a.js".into(),
            "b.js".into(),
            std::path::Path::new("sub").join("c.js")
        ]
    );
    assert!(loaded.failures.is_empty());
    assert_eq!(loaded.sessions[0].description, vec!["Indented."]);
    Ok(())
}

#[test]
fn empty_and_missing_files_are_load_failures() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let empty = dir.path().join("empty.js");
    fs::write(&empty, "no statements here\n")?;
    let missing = dir.path().join("missing.js");

    let loaded = load_sessions(&[empty.clone(), missing.clone()], &js(), &Prompts::default(), false);
    assert!(loaded.sessions.is_empty());
    assert_eq!(loaded.failures.len(), 2);
    assert_eq!(loaded.failures[0].file, empty);
    assert_eq!(loaded.failures[1].file, missing);

    let loaded = load_sessions(&[empty.clone()], &js(), &Prompts::default(), true);
    assert!(loaded.failures.is_empty());
    assert_eq!(loaded.skipped, vec![empty]);
    Ok(())
}

#[test]
fn emitted_sessions_replay_with_the_same_verdicts() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let prompts = Prompts::default();
    let originals = vec![
        session("Widget.java", "Adds.\njs> x = 2\n2\njs> x + 3\n5\n"),
        session("Widget.java", "EXPECT FAIL\njs> 1+1\n3\n"),
    ];
    for s in &originals {
        emit_to_dir(dir.path(), "widgets", s, None, &prompts)?;
    }

    let loaded = load_sessions(&[dir.path().join("widgets")], &js(), &prompts, false);
    assert_eq!(loaded.sessions.len(), 2);

    let normalizer = Normalizer::default();
    let opts = RunOptions {
        prologue: None,
        normalizer: &normalizer,
    };
    let counters = Counters::new();
    let summary = run_sessions(&MockInterpreter, &loaded.sessions, opts, &NullReporter, &counters);
    let mut verdicts: Vec<Verdict> = summary.sessions.iter().map(|r| r.verdict).collect();
    verdicts.sort();
    assert_eq!(verdicts, vec![Verdict::ExpectedPass, Verdict::ExpectedFail]);
    assert!(summary.success());
    Ok(())
}
