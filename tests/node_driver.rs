// Runs the bundled node driver through both engines. Skipped without node.

use session_doctest::backend::{Interpreter, ProcessInterpreter, node_driver_args};
use session_doctest::engine::RunOptions;
use session_doctest::engine_async::run_sessions_async;
use session_doctest::executor::run_session;
use session_doctest::normalize::Normalizer;
use session_doctest::pool::PooledInterpreter;
use session_doctest::transcript::{Prompts, parse};
use session_doctest::types::*;
use session_doctest::verdict::{Counters, NullReporter};
use std::time::Duration;

const TIMEOUT: Duration = Duration::from_secs(2);

fn node_available() -> bool {
    let found = which::which("node").is_ok();
    if !found {
        eprintln!("node not on PATH, skipping");
    }
    found
}

fn interpreter() -> ProcessInterpreter {
    ProcessInterpreter {
        timeout: Some(TIMEOUT),
        quiet: true,
        ..ProcessInterpreter::default()
    }
}

fn pooled(size: usize) -> PooledInterpreter {
    PooledInterpreter::with_size("node".into(), node_driver_args(), true, Some(TIMEOUT), size)
        .unwrap()
}

fn session(file: &str, text: &str) -> Session {
    parse(text, &Prompts::default(), SourceTag::new(file, 1)).unwrap()
}

#[test]
fn process_scope_replays_a_session() {
    if !node_available() {
        return;
    }
    let interp = interpreter();
    interp.validate().unwrap();
    let s = session(
        "a.js",
        "js> var x = 5\njs> x + 1\n6\njs> print('a'); 3\na\n3\njs> function f() { return 1; }\njs> f()\n1\n",
    );
    let execution = run_session(&interp, &s, None, &Normalizer::default());
    assert_eq!(execution.outcome, RawOutcome::Matched);
    assert_eq!(execution.steps.len(), 5);
}

#[test]
fn function_declaration_is_not_echoed() {
    if !node_available() {
        return;
    }
    let s = session("f.js", "js> function g() {}\njs> 1\n1\n");
    let execution = run_session(&interpreter(), &s, None, &Normalizer::default());
    assert_eq!(execution.outcome, RawOutcome::Matched);
    assert_eq!(
        execution.steps[0].result,
        ExecutionResult::Output(String::new())
    );
}

#[test]
fn process_scope_reports_thrown_errors() {
    if !node_available() {
        return;
    }
    let s = session("t.js", "js> 0\n0\njs> null.f\nundefined\n");
    let execution = run_session(&interpreter(), &s, None, &Normalizer::default());
    assert!(matches!(
        &execution.outcome,
        RawOutcome::Errored { index: Some(1), message } if message.starts_with("TypeError")
    ));
}

#[test]
fn process_scope_times_out() {
    if !node_available() {
        return;
    }
    let s = session("loop.js", "js> while (true) {}\n");
    let execution = run_session(&interpreter(), &s, None, &Normalizer::default());
    assert!(matches!(
        &execution.outcome,
        RawOutcome::Errored { index: Some(0), message } if message.contains("timed out")
    ));
}

#[tokio::test]
async fn pooled_sessions_do_not_share_bindings() {
    if !node_available() {
        return;
    }
    let pool = pooled(1);
    pool.validate().await.unwrap();
    let normalizer = Normalizer::default();

    let a = session("a.js", "js> var y = 1\njs> y\n1\n");
    let b = session("b.js", "js> typeof y\nundefined\n");
    let first = pool.run_session(&a, None, &normalizer).await;
    assert_eq!(first.outcome, RawOutcome::Matched);
    // same single process, reset before reuse
    let second = pool.run_session(&b, None, &normalizer).await;
    assert_eq!(second.outcome, RawOutcome::Matched);
    assert_eq!(pool.live_processes(), 1);
}

#[tokio::test]
async fn pooled_thrown_error_keeps_the_process() {
    if !node_available() {
        return;
    }
    let pool = pooled(1);
    let normalizer = Normalizer::default();
    let s = session("t.js", "js> 1\n1\njs> null.f\n");
    let execution = pool.run_session(&s, None, &normalizer).await;
    assert!(matches!(
        &execution.outcome,
        RawOutcome::Errored { index: Some(1), message } if message.starts_with("TypeError")
    ));
    assert_eq!(pool.live_processes(), 1);
}

#[tokio::test]
async fn pooled_timeout_discards_the_process() {
    if !node_available() {
        return;
    }
    let pool = pooled(1);
    let normalizer = Normalizer::default();
    let stuck = session("loop.js", "js> while (true) {}\n");
    let execution = pool.run_session(&stuck, None, &normalizer).await;
    assert!(matches!(
        &execution.outcome,
        RawOutcome::Errored { index: Some(0), message } if message.contains("timed out")
    ));
    assert_eq!(pool.live_processes(), 0);

    // a fresh process takes its place
    let ok = session("ok.js", "js> 2 + 2\n4\n");
    let execution = pool.run_session(&ok, None, &normalizer).await;
    assert_eq!(execution.outcome, RawOutcome::Matched);
}

#[tokio::test]
async fn pooled_batch_counts_verdicts() {
    if !node_available() {
        return;
    }
    let pool = pooled(2);
    let normalizer = Normalizer::default();
    let opts = RunOptions {
        prologue: Some("var base = 10"),
        normalizer: &normalizer,
    };
    let sessions = vec![
        session("a.js", "js> base + 1\n11\n"),
        session("b.js", "js> base = 1\n1\n"),
        session("c.js", "js> base\n10\n"),
        session("d.js", "EXPECT FAIL\njs> base\n1\n"),
    ];
    let counters = Counters::new();
    let summary = run_sessions_async(&pool, &sessions, opts, &NullReporter, &counters).await;
    assert_eq!(counters.snapshot().expected_pass, 3);
    assert_eq!(counters.snapshot().expected_fail, 1);
    assert!(summary.success());
}
