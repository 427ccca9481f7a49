use crate::t;
use crate::t_args;
use crate::types::{RawOutcome, SessionResult, Summary, Verdict};
use colored::Colorize;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputKind {
    /// One line per session, details for unexpected verdicts.
    Normal,
    /// One line per session.
    Compact,
    /// One character per session.
    Terse,
    /// Totals only.
    Final,
}

fn label(verdict: Verdict) -> colored::ColoredString {
    match verdict {
        Verdict::ExpectedPass => "[PASS]".green().bold(),
        Verdict::ExpectedFail => "[XFAIL]".yellow().bold(),
        Verdict::UnexpectedPass => "[XPASS]".red().bold(),
        Verdict::UnexpectedFail => "[FAIL]".red().bold(),
    }
}

fn mark(verdict: Verdict) -> colored::ColoredString {
    match verdict {
        Verdict::ExpectedPass => ".".green(),
        Verdict::ExpectedFail => "x".yellow(),
        Verdict::UnexpectedPass => "X".red().bold(),
        Verdict::UnexpectedFail => "F".red().bold(),
    }
}

fn push_block(out: &mut String, heading: &str, text: &str) {
    out.push_str(&format!("  {}\n", heading.bold()));
    for line in text.lines() {
        out.push_str(&format!("    {line}\n"));
    }
}

fn push_details(out: &mut String, r: &SessionResult) {
    if let Some(input) = &r.failed_input {
        push_block(out, &t!("report-input"), input);
    }
    match &r.outcome {
        RawOutcome::Matched => {
            out.push_str(&format!("  {}\n", t!("report-unexpected-pass").red()));
        }
        RawOutcome::Mismatched {
            expected, actual, ..
        } => {
            push_block(out, &t!("report-expected"), expected);
            push_block(out, &t!("report-actual"), actual);
        }
        RawOutcome::Errored { message, .. } => {
            out.push_str(&format!("  {} {}\n", t!("report-error").bold(), message.red()));
        }
    }
}

fn hidden(r: &SessionResult, hide_fails: bool, hide_passes: bool) -> bool {
    if r.verdict.is_expected() {
        hide_passes
    } else {
        hide_fails
    }
}

pub fn render_summary_line(summary: &Summary) -> String {
    let tally = &summary.tally;
    let color_count = |n: usize, bad: bool| {
        if bad && n > 0 {
            n.to_string().red().bold().to_string()
        } else {
            n.to_string().green().to_string()
        }
    };
    t_args!("report-summary",
        "total" => tally.total(),
        "expected_pass" => color_count(tally.expected_pass, false),
        "expected_fail" => color_count(tally.expected_fail, false),
        "unexpected_pass" => color_count(tally.unexpected_pass, true),
        "unexpected_fail" => color_count(tally.unexpected_fail, true),
        "load_failures" => color_count(summary.load_failures.len(), true)
    )
}

pub fn render_human(
    summary: &Summary,
    verbose: bool,
    hide_fails: bool,
    hide_passes: bool,
    kind: OutputKind,
) -> String {
    let mut out = String::new();

    match kind {
        OutputKind::Final => {}
        OutputKind::Terse => {
            for r in &summary.sessions {
                out.push_str(&mark(r.verdict).to_string());
            }
            out.push('\n');
        }
        OutputKind::Normal | OutputKind::Compact => {
            for r in &summary.sessions {
                if hidden(r, hide_fails, hide_passes) {
                    continue;
                }
                out.push_str(&format!("{} {}\n", label(r.verdict), r.source_tag));
                let detailed = !r.verdict.is_expected()
                    || (verbose && r.verdict == Verdict::ExpectedFail);
                if kind == OutputKind::Normal && detailed {
                    push_details(&mut out, r);
                }
            }
        }
    }

    if !hide_fails {
        for f in &summary.load_failures {
            out.push_str(&format!(
                "{} {}: {}\n",
                "[LOAD]".red().bold(),
                f.file.display(),
                f.message
            ));
        }
    }

    out.push_str(&render_summary_line(summary));
    out.push('\n');
    out
}

pub fn print_human(
    summary: &Summary,
    verbose: bool,
    hide_fails: bool,
    hide_passes: bool,
    kind: OutputKind,
) {
    print!(
        "{}",
        render_human(summary, verbose, hide_fails, hide_passes, kind)
    );
}
