use anyhow::Result;
use clap::{CommandFactory, Parser, ValueEnum, error::ErrorKind};
use colored::Colorize;
use colored::control::set_override as set_color_override;
use regex::Regex;
use session_doctest::backend::Interpreter;
use session_doctest::config::{Overrides, Settings, load_config, resolve};
use session_doctest::emit::emit_to_dir;
use session_doctest::engine::{RunOptions, run_sessions};
use session_doctest::engine_async::run_sessions_async;
use session_doctest::i18n;
use session_doctest::pool::PooledInterpreter;
use session_doctest::report::{OutputKind, print_human};
use session_doctest::sources::load_sessions;
use session_doctest::types::{Session, Summary};
use session_doctest::verdict::{Counters, NullReporter, Reporter, StderrReporter};
use session_doctest::{t, t_args};
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use tracing::{error, info};

#[cfg(feature = "mimalloc")]
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum OutputFormat {
    Compact,
    Terse,
    Final,
    Normal,
}
impl From<OutputFormat> for OutputKind {
    fn from(v: OutputFormat) -> Self {
        match v {
            OutputFormat::Normal => OutputKind::Normal,
            OutputFormat::Compact => OutputKind::Compact,
            OutputFormat::Terse => OutputKind::Terse,
            OutputFormat::Final => OutputKind::Final,
        }
    }
}

#[derive(Parser, Debug, Clone)]
#[command(
    version,
    author,
    about = t!("cli-about")
)]
struct Cli {
    // Session files or directories of session files
    #[arg(value_name = "PATHS", required = true)]
    paths: Vec<PathBuf>,

    #[arg(long, value_name = "FILE", help = t!("cli-config"))]
    config: Option<PathBuf>,

    // Interpreter driver command; replaces the bundled node driver
    #[arg(
        long,
        value_name = "CMD",
        visible_alias = "app",
        help = t!("cli-interpreter")
    )]
    interpreter: Option<String>,

    #[arg(long, value_name = "SECS", help = t!("cli-timeout"))]
    timeout: Option<u64>,

    #[arg(long, value_name = "SRC", help = t!("cli-prologue"))]
    prologue: Option<String>,

    #[arg(long, value_name = "STR", help = t!("cli-prompt"))]
    prompt: Option<String>,

    #[arg(long = "identity-pattern", value_name = "RE", help = t!("cli-identity-pattern"))]
    identity_pattern: Option<String>,

    #[arg(long = "consistent-identity", help = t!("cli-consistent-identity"))]
    consistent_identity: bool,

    // Write stand-alone session files instead of running
    #[arg(long, value_name = "DIR", help = t!("cli-emit"))]
    emit: Option<PathBuf>,

    #[arg(long, value_name = "NAME", requires = "emit", help = t!("cli-group"))]
    group: Option<String>,

    #[arg(long = "skip-empty", help = t!("cli-skip-empty"))]
    skip_empty: bool,

    // One driver process per session instead of the shared pool
    #[arg(long = "no-pool", help = t!("cli-no-pool"))]
    no_pool: bool,

    // -t/--test: number (1..N) or a path fragment. Special: 0 / list lists all sessions.
    #[arg(short = 't', long = "test", value_name = "TEST", help = t!("cli-test"))]
    test: Option<String>,

    #[arg(
        short = 'o',
        long = "output",
        value_enum,
        default_value = "normal",
        help = t!("cli-output")
    )]
    output: OutputFormat,

    #[arg(
        short = 'f',
        long = "hide-fails",
        conflicts_with = "hide_passes",
        help = t!("cli-hide-fails")
    )]
    hide_fails: bool,

    #[arg(
        short = 'p',
        long = "hide-passes",
        conflicts_with = "hide_fails",
        help = t!("cli-hide-passes")
    )]
    hide_passes: bool,

    #[arg(short = 'v', long = "verbose", help = t!("cli-verbose"))]
    verbose: bool,

    #[arg(short = 'q', long = "silent", help = t!("cli-silent"))]
    silent: bool,

    #[arg(long = "no-color", help = t!("cli-no-color"))]
    no_color: bool,
}

impl Cli {
    fn overrides(&self) -> Overrides {
        Overrides {
            command: self.interpreter.clone(),
            timeout: self.timeout,
            prologue: self.prologue.clone(),
            prompt: self.prompt.clone(),
            identity_pattern: self.identity_pattern.clone(),
            consistent_identity: self.consistent_identity,
            group: self.group.clone(),
            quiet: self.silent,
        }
    }
}

fn display_path(path: &str) -> String {
    match std::fs::canonicalize(Path::new(path)) {
        Ok(p) => p.to_string_lossy().into_owned(),
        Err(_) => path.to_string(),
    }
}

fn resolve_interpreter_path(cmd: &str) -> String {
    if cmd.contains(std::path::MAIN_SEPARATOR) || cmd.starts_with("./") || cmd.starts_with(".\\") {
        return display_path(cmd);
    }
    match which::which(cmd) {
        Ok(p) => p.to_string_lossy().into_owned(),
        Err(_) => cmd.to_string(),
    }
}

fn flag_regex() -> &'static Regex {
    static FLAG: OnceLock<Regex> = OnceLock::new();
    FLAG.get_or_init(|| {
        Regex::new(r"(?m)^(\s*)(--?\w+(?:-\w+[^<\n]*)*)").expect("valid flag pattern")
    })
}

/// Format CLI flags to be bold
fn format_flags_bold(text: &str) -> String {
    flag_regex()
        .replace_all(text, |caps: &regex::Captures| {
            format!("{}{}", &caps[1], caps[2].bold())
        })
        .to_string()
}

/// Format clap errors with localized messages
fn format_clap_error(error: clap::Error) -> String {
    let kind = error.kind();

    if kind == ErrorKind::DisplayHelp {
        return create_custom_help();
    }

    let name = env!("CARGO_PKG_NAME");
    let mut msg = error.to_string();
    msg = msg.replace("Usage:", &t!("cli-error-usage").bold().underline().to_string());
    msg = msg.replace("For more information, try '--help'.", &t!("cli-error-help-info"));
    msg = msg.replace("error:", &t!("cli-error-label").red().bold().to_string());
    msg = msg.replace("tip:", &t!("cli-tip-label"));
    msg = msg.replace("unexpected argument", &t!("cli-unexpected-argument"));
    msg = msg.replace(name, &name.bold().to_string());
    msg = format_flags_bold(&msg);

    match kind {
        ErrorKind::MissingRequiredArgument => msg.replace(
            "the following required arguments were not provided:",
            &t!("cli-error-missing-args"),
        ),
        ErrorKind::InvalidValue => msg.replace("invalid value", &t!("cli-error-invalid-value")),
        _ => msg,
    }
}

/// Create custom localized help text
fn create_custom_help() -> String {
    let mut cmd = Cli::command();
    let mut help_text = cmd.render_long_help().to_string();

    let headings = [
        ("Usage:", "cli-error-usage"),
        ("Arguments:", "cli-help-arguments"),
        ("Options:", "cli-help-options"),
    ];
    for (heading, key) in headings {
        help_text = help_text.replace(heading, &t!(key).bold().underline().to_string());
    }
    help_text = help_text.replace("[default:", &format!("[{}:", t!("cli-help-default")));
    help_text = help_text.replace("[aliases:", &format!("[{}:", t!("cli-help-aliases")));
    help_text = help_text.replace(
        "[possible values:",
        &format!("[{}:", t!("cli-help-possible-values")),
    );
    help_text = help_text.replace("Print help", &t!("cli-help-print-help"));
    help_text = help_text.replace("Print version", &t!("cli-help-print-version"));

    let name = env!("CARGO_PKG_NAME");
    help_text = help_text.replace(name, &name.bold().to_string());
    help_text = format_flags_bold(&help_text);

    // collapse runs of blank lines
    let mut cleaned = Vec::new();
    let mut prev_was_empty = false;
    for line in help_text.lines() {
        let is_empty = line.trim().is_empty();
        if is_empty && prev_was_empty {
            continue;
        }
        cleaned.push(line);
        prev_was_empty = is_empty;
    }
    cleaned.join("\n")
}

fn print_session_list(sessions: &[Session], to_stderr: bool) {
    let heading = t!("available-tests");
    let items = sessions.iter().enumerate().map(|(idx, s)| {
        t_args!("test-list-item",
            "index" => (idx + 1),
            "session" => &s.source_tag.file.display(),
            "statements" => s.statements.len()
        )
    });
    if to_stderr {
        eprintln!("{heading}");
        items.for_each(|item| eprintln!("{item}"));
    } else {
        println!("{heading}");
        items.for_each(|item| println!("{item}"));
    }
}

/// Narrows `sessions` to the `-t` selection. `None` means the list was printed.
fn select_sessions(sessions: Vec<Session>, selector: &str) -> Option<Vec<Session>> {
    let trimmed = selector.trim();
    if trimmed == "0" || trimmed.eq_ignore_ascii_case("list") {
        print_session_list(&sessions, false);
        return None;
    }

    if let Ok(n) = trimmed.parse::<usize>() {
        if n == 0 || n > sessions.len() {
            error!(
                "{}",
                t_args!("error-invalid-test-number", "number" => n, "max" => sessions.len())
            );
            print_session_list(&sessions, true);
            std::process::exit(2);
        }
        return Some(sessions.into_iter().skip(n - 1).take(1).collect());
    }

    let total = sessions.len();
    let selected: Vec<Session> = sessions
        .iter()
        .filter(|s| s.source_tag.file.to_string_lossy().contains(trimmed))
        .cloned()
        .collect();
    if selected.is_empty() {
        error!("{}", t_args!("error-test-not-found", "test" => trimmed));
        if total > 0 {
            print_session_list(&sessions, true);
        }
        std::process::exit(2);
    }
    Some(selected)
}

fn emit_sessions(dir: &Path, sessions: &[Session], settings: &Settings) -> Result<()> {
    for session in sessions {
        emit_to_dir(
            dir,
            &settings.group,
            session,
            settings.prologue.as_deref(),
            &settings.prompts,
        )?;
    }
    let out_dir = dir.join(&settings.group);
    info!(
        "{}",
        t_args!("info-emitted", "count" => sessions.len(), "dir" => out_dir.display())
    );
    Ok(())
}

async fn run_with_pool(
    settings: &Settings,
    sessions: &[Session],
    reporter: &dyn Reporter,
    counters: &Counters,
) -> Result<Summary> {
    let interp = &settings.interpreter;
    let pooled = PooledInterpreter::new(
        interp.command.clone(),
        interp.args.clone(),
        interp.quiet,
        interp.timeout,
    )?;
    pooled.validate().await?;
    info!("{}", t_args!("info-starting-parallel", "workers" => pooled.max_size()));

    let opts = RunOptions {
        prologue: settings.prologue.as_deref(),
        normalizer: &settings.normalizer,
    };
    Ok(run_sessions_async(&pooled, sessions, opts, reporter, counters).await)
}

fn run_per_process(
    settings: &Settings,
    sessions: &[Session],
    reporter: &dyn Reporter,
    counters: &Counters,
) -> Result<Summary> {
    settings.interpreter.validate()?;
    let opts = RunOptions {
        prologue: settings.prologue.as_deref(),
        normalizer: &settings.normalizer,
    };
    Ok(run_sessions(&settings.interpreter, sessions, opts, reporter, counters))
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize localization first
    i18n::init();

    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(error) => match error.kind() {
            ErrorKind::DisplayHelp => {
                println!("{}", format_clap_error(error));
                std::process::exit(0);
            }
            ErrorKind::DisplayVersion => {
                println!("{} {}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"));
                std::process::exit(0);
            }
            _ => {
                eprintln!("{}", format_clap_error(error));
                std::process::exit(2);
            }
        },
    };

    // With -v, show INFO and above; RUST_LOG overrides either way
    let default_filter = if cli.verbose {
        "session_doctest=info"
    } else {
        "session_doctest=warn"
    };
    let filter = std::env::var("RUST_LOG").unwrap_or_else(|_| default_filter.to_string());
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    set_color_override(!cli.no_color);

    let raw = match &cli.config {
        Some(path) => match load_config(path) {
            Ok(raw) => Some(raw),
            Err(e) => {
                error!("{e:#}");
                std::process::exit(2);
            }
        },
        None => None,
    };
    let settings = match resolve(
        raw.as_ref().zip(cli.config.as_deref()),
        &cli.overrides(),
    ) {
        Ok(settings) => settings,
        Err(e) => {
            error!("{}", t_args!("error-config", "error" => format!("{e:#}")));
            std::process::exit(2);
        }
    };

    let loaded = load_sessions(
        &cli.paths,
        &settings.extensions,
        &settings.prompts,
        cli.skip_empty,
    );
    let mut sessions = loaded.sessions;
    if !loaded.skipped.is_empty() {
        info!("{}", t_args!("info-skipped-empty", "count" => loaded.skipped.len()));
    }

    if let Some(selector) = &cli.test {
        match select_sessions(sessions, selector) {
            Some(selected) => sessions = selected,
            None => return Ok(()),
        }
    }

    if let Some(dir) = &cli.emit {
        if let Err(e) = emit_sessions(dir, &sessions, &settings) {
            error!("{e:#}");
            std::process::exit(2);
        }
        return Ok(());
    }

    info!(
        "{}",
        t_args!("info-version",
            "name" => env!("CARGO_PKG_NAME"),
            "version" => env!("CARGO_PKG_VERSION")
        )
    );
    info!(
        "{}",
        t_args!("info-interpreter", "path" => resolve_interpreter_path(&settings.interpreter.command))
    );
    if let Some(prologue) = &settings.prologue {
        info!("{}", t_args!("info-prologue", "source" => prologue));
    }
    info!("{}", t_args!("info-starting-tests", "count" => sessions.len()));

    // The report already shows the details; the per-session messages are for
    // runs that print totals only.
    let stderr_reporter = StderrReporter;
    let null_reporter = NullReporter;
    let reporter: &dyn Reporter = if !cli.silent && cli.output == OutputFormat::Final {
        &stderr_reporter
    } else {
        &null_reporter
    };
    let counters = Counters::new();

    let run = if cli.no_pool {
        run_per_process(&settings, &sessions, reporter, &counters)
    } else {
        run_with_pool(&settings, &sessions, reporter, &counters).await
    };
    let mut summary = match run {
        Ok(summary) => summary,
        Err(e) => {
            error!("{}", t_args!("error-validation-failed", "error" => format!("{e:#}")));
            std::process::exit(2);
        }
    };
    summary.load_failures = loaded.failures;

    if !cli.silent {
        print_human(
            &summary,
            cli.verbose,
            cli.hide_fails,
            cli.hide_passes,
            cli.output.into(),
        );
    }

    let tally = counters.snapshot();
    info!(
        "{}",
        t_args!("info-all-finished",
            "total" => tally.total(),
            "unexpected" => tally.unexpected(),
            "load_failures" => summary.load_failures.len()
        )
    );

    if !summary.success() {
        std::process::exit(1);
    }

    Ok(())
}
