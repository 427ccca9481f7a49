mod common;

use common::{MockInterpreter, session};
use session_doctest::engine::{RunOptions, run_sessions};
use session_doctest::normalize::Normalizer;
use session_doctest::report::{OutputKind, render_human};
use session_doctest::types::*;
use session_doctest::verdict::{Counters, NullReporter};
use std::path::PathBuf;

fn summary() -> Summary {
    colored::control::set_override(false);
    let sessions = vec![
        session("pass.js", "js> 1+1\n2\n"),
        session("fail.js", "js> 1+2\n5\n"),
        session("xfail.js", "EXPECT FAIL\njs> 1+2\n5\n"),
    ];
    let normalizer = Normalizer::default();
    let opts = RunOptions {
        prologue: None,
        normalizer: &normalizer,
    };
    let mut summary = run_sessions(&MockInterpreter, &sessions, opts, &NullReporter, &Counters::new());
    summary.load_failures.push(LoadFailure {
        file: PathBuf::from("empty.js"),
        message: "no `js>` statement found in transcript".into(),
    });
    summary
}

#[test]
fn normal_report_lists_sessions_and_details() {
    let text = render_human(&summary(), false, false, false, OutputKind::Normal);
    assert!(text.contains("[PASS] pass.js:1"));
    assert!(text.contains("[FAIL] fail.js:1"));
    assert!(text.contains("[XFAIL] xfail.js:1"));
    assert!(text.contains("    1+2"));
    assert!(text.contains("    5"));
    assert!(text.contains("    3"));
    assert!(text.contains("[LOAD] empty.js"));
}

#[test]
fn hide_passes_keeps_only_unexpected() {
    let text = render_human(&summary(), false, false, true, OutputKind::Compact);
    assert!(!text.contains("[PASS]"));
    assert!(!text.contains("[XFAIL]"));
    assert!(text.contains("[FAIL] fail.js:1"));
    // compact never prints details
    assert!(!text.contains("    1+2"));
}

#[test]
fn terse_report_is_one_mark_per_session() {
    let text = render_human(&summary(), false, true, false, OutputKind::Terse);
    assert!(text.starts_with(".Fx\n"));
    assert!(!text.contains("[LOAD]"));
}

#[test]
fn final_report_is_totals_only() {
    let summary = summary();
    let text = render_human(&summary, false, false, false, OutputKind::Final);
    assert!(!text.contains("[PASS]"));
    assert!(text.contains(&summary.total().to_string()));
    assert!(!summary.success());
}
