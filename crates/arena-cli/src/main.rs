//! Arena CLI: run provider × scenario × region plans.
//!
//! `arena run` executes a plan either behind a live terminal dashboard or in
//! headless mode, then writes `index.json` and an optional HTML report.

// CLI-specific lint allowances (CLI binary, not library)
#![allow(missing_docs)]
#![allow(clippy::print_stdout)] // CLI must print to stdout
#![allow(clippy::print_stderr)] // CLI must print to stderr
#![allow(clippy::exit)] // CLI uses exit codes
#![allow(clippy::unreachable)] // Used for exhaustive enum matching
#![allow(clippy::fn_params_excessive_bools)] // CLI flags are naturally bools

use arena::executor::{ExecutionOutcome, Executor};
use arena::headless::run_headless;
use arena::mode::{select_mode, Mode};
use arena::observer::Observer;
use arena::progress::ProgressModel;
use arena::provider::{MockProvider, ProviderInvoker};
use arena::report::{generate_html_report, write_index, RunIndex, DEFAULT_REPORT_FILE};
use arena::store::{FileResultStore, ResultStore};
use arena::summary::{render_summary, Summary, SummaryStyle};
use arena::{ArenaError, ExecutionParams, RunPlan, DEFAULT_CONCURRENCY};
use clap::{Args, CommandFactory, Parser, Subcommand, ValueEnum};
use clap_complete::{generate, Shell};
use miette::{IntoDiagnostic, Result, WrapErr};
use std::io::{self, IsTerminal, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

mod progress;
mod tui_mode;

/// Color output mode
#[derive(Copy, Clone, Debug, Default, ValueEnum)]
enum ColorMode {
    /// Auto-detect based on terminal and `NO_COLOR` env
    #[default]
    Auto,
    /// Always use colors
    Always,
    /// Never use colors
    Never,
}

#[derive(Debug, Parser)]
#[command(
    name = "arena",
    version,
    about = "Run provider × scenario × region plans with live progress"
)]
struct Cli {
    /// Control color output
    #[arg(long, value_enum, default_value = "auto", global = true)]
    color: ColorMode,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Execute every combination of the selected regions, providers and scenarios
    Run(RunArgs),
    /// Regenerate the HTML report from an existing output directory
    Report {
        #[arg(long, short = 'o', default_value = "out", help = "Output directory")]
        out: PathBuf,
        #[arg(long, help = "HTML file path, relative to --out unless absolute")]
        html_file: Option<PathBuf>,
    },
    /// Generate shell completions for bash, zsh, or fish
    Completions {
        #[arg(value_enum, help = "Shell to generate completions for")]
        shell: Shell,
    },
}

#[derive(Debug, Args)]
struct RunArgs {
    #[arg(long = "region", value_name = "REGION", help = "Region to run (repeatable)")]
    regions: Vec<String>,
    #[arg(long = "provider", value_name = "PROVIDER", help = "Provider to run (repeatable)")]
    providers: Vec<String>,
    #[arg(long = "scenario", value_name = "SCENARIO", help = "Scenario to run (repeatable)")]
    scenarios: Vec<String>,
    #[arg(
        long,
        short = 'j',
        default_value_t = DEFAULT_CONCURRENCY,
        help = "Maximum runs in flight"
    )]
    concurrency: usize,
    #[arg(long, help = "Headless output for CI; never opens the dashboard")]
    ci: bool,
    #[arg(long, help = "Answer every run from the built-in mock provider")]
    mock_provider: bool,
    #[arg(long, help = "YAML file with mock responses (requires --mock-provider)")]
    mock_config: Option<PathBuf>,
    #[arg(long, short = 'o', default_value = "out", help = "Output directory")]
    out: PathBuf,
    #[arg(long, help = "Write an HTML report after the run")]
    html: bool,
    #[arg(long, help = "HTML report path, relative to --out unless absolute")]
    html_file: Option<PathBuf>,
    #[arg(long, short = 'v', help = "Debug logging; also writes <out>/arena.log")]
    verbose: bool,
}

const DEFAULT_REGION: &str = "default";
const DEFAULT_PROVIDER: &str = "mock";
const DEFAULT_SCENARIO: &str = "default";

impl RunArgs {
    fn params(&self) -> ExecutionParams {
        ExecutionParams {
            concurrency: self.concurrency,
            ci_mode: self.ci,
            mock_provider: self.mock_provider,
            mock_config_path: self.mock_config.clone(),
            out_dir: self.out.clone(),
            html_file: self.html_file.clone(),
            verbose: self.verbose,
        }
    }

    fn plan(&self) -> RunPlan {
        RunPlan::from_filters(
            &or_default(&self.regions, DEFAULT_REGION),
            &or_default(&self.providers, DEFAULT_PROVIDER),
            &or_default(&self.scenarios, DEFAULT_SCENARIO),
        )
    }

    /// Pre-run description of what is about to execute.
    fn banner(&self) -> String {
        format!(
            "Running arena\nRegions: {}\nProviders: {}\nScenarios: {}\nConcurrency: {}\nOutput: {}\n\n",
            or_default(&self.regions, DEFAULT_REGION).join(", "),
            or_default(&self.providers, DEFAULT_PROVIDER).join(", "),
            or_default(&self.scenarios, DEFAULT_SCENARIO).join(", "),
            self.concurrency,
            self.out.display(),
        )
    }

    fn wants_html(&self) -> bool {
        self.html || self.html_file.is_some()
    }
}

fn or_default(values: &[String], fallback: &str) -> Vec<String> {
    if values.is_empty() {
        vec![fallback.to_string()]
    } else {
        values.to_vec()
    }
}

/// Configure color output based on CLI flag and environment
fn configure_colors(mode: ColorMode) -> bool {
    let use_color = match mode {
        ColorMode::Always => true,
        ColorMode::Never => false,
        ColorMode::Auto => {
            // Respect NO_COLOR environment variable
            if std::env::var("NO_COLOR").is_ok() {
                false
            } else {
                supports_color::on(supports_color::Stream::Stderr).is_some()
            }
        }
    };

    miette::set_hook(Box::new(move |_| {
        Box::new(
            miette::MietteHandlerOpts::new()
                .color(use_color)
                .unicode(use_color)
                .build(),
        )
    }))
    .ok(); // Ignore error if hook already set
    use_color
}

/// Filter shared by the stderr subscriber and the dashboard dispatch.
/// `RUST_LOG` wins over the verbosity flag; an invalid value falls back.
fn log_filter(verbose: bool) -> EnvFilter {
    filter_from(std::env::var(EnvFilter::DEFAULT_ENV).ok().as_deref(), verbose)
}

fn filter_from(directives: Option<&str>, verbose: bool) -> EnvFilter {
    let fallback = if verbose { "debug" } else { "info" };
    directives
        .filter(|value| !value.trim().is_empty())
        .and_then(|value| EnvFilter::try_new(value).ok())
        .unwrap_or_else(|| EnvFilter::new(fallback))
}

/// Install the process-wide stderr subscriber.
fn init_tracing(verbose: bool, use_color: bool) {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(log_filter(verbose))
        .with_writer(io::stderr)
        .with_ansi(use_color)
        .with_target(false)
        .try_init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let use_color = configure_colors(cli.color);
    match cli.command {
        Commands::Run(args) => cmd_run(&args, use_color),
        Commands::Report { out, html_file } => {
            init_tracing(false, use_color);
            cmd_report(&out, html_file.as_deref())
        }
        Commands::Completions { shell } => cmd_completions(shell),
    }
}

// =============================================================================
// Command Handlers
// =============================================================================

/// What the presentation layer hands back once it is done.
struct Finished {
    outcome: ExecutionOutcome,
    model: ProgressModel,
    style: SummaryStyle,
}

/// Handle the run command.
fn cmd_run(args: &RunArgs, use_color: bool) -> Result<()> {
    let params = args.params();
    if let Err(err) = params.validate() {
        return emit_error(&err);
    }
    init_tracing(params.verbose, use_color);

    let executor = match build_executor(&params) {
        Ok(executor) => executor,
        Err(err) => return emit_error(&err),
    };
    let plan = Arc::new(args.plan());
    tracing::debug!(combinations = plan.len(), "plan built");
    if !params.ci_mode {
        print!("{}", args.banner());
    }

    let selection = select_mode(params.ci_mode, &tui_mode::CrosstermProbe);
    if let Some(reason) = &selection.fallback_reason {
        eprintln!("notice: {reason}; using headless output");
    }

    let finished = match selection.mode {
        Mode::Interactive => tui_mode::run_dashboard(executor, Arc::clone(&plan), &params)
            .map(|run| Finished {
                outcome: run.outcome,
                model: run.model,
                style: SummaryStyle::Decorated {
                    width: tui_mode::summary_width(),
                },
            }),
        Mode::Headless => run_headless_blocking(executor, plan, &params, use_color),
    };
    let finished = match finished {
        Ok(finished) => finished,
        Err(err) => return emit_error(&err),
    };

    let html_report = write_outputs(&params, args.wants_html(), &finished);
    let summary = Summary::from_model(&finished.model, &params.out_dir, html_report.as_deref());
    let rendered = render_summary(&summary, finished.style);
    io::stdout()
        .write_all(rendered.as_bytes())
        .into_diagnostic()
        .wrap_err("failed to write summary")?;

    match &finished.outcome.error {
        Some(err) => emit_error(err),
        None => Ok(()),
    }
}

fn build_executor(params: &ExecutionParams) -> Result<Executor, ArenaError> {
    if !params.mock_provider {
        return Err(ArenaError::setup(
            "no live provider backend is available; pass --mock-provider",
        ));
    }
    let provider = MockProvider::from_path(params.mock_config_path.as_deref())?;
    let store = FileResultStore::create(&params.out_dir)?;
    Ok(Executor::new(
        Arc::new(provider) as Arc<dyn ProviderInvoker>,
        Arc::new(store) as Arc<dyn ResultStore>,
    ))
}

fn run_headless_blocking(
    executor: Executor,
    plan: Arc<RunPlan>,
    params: &ExecutionParams,
    use_color: bool,
) -> Result<Finished, ArenaError> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|err| ArenaError::io("failed to start runtime", err))?;

    let cancel = CancellationToken::new();
    let interrupt = cancel.clone();
    if let Err(err) = ctrlc::set_handler(move || interrupt.cancel()) {
        tracing::warn!(error = %err, "could not install Ctrl-C handler");
    }

    println!("Generated {} run combinations", plan.len());
    println!("Starting execution...");
    println!();

    let show_bar = !params.ci_mode && io::stderr().is_terminal();
    let reporter = Arc::new(progress::LineReporter::new(plan.len(), show_bar, use_color));
    let run = runtime.block_on(run_headless(
        executor,
        plan,
        params.concurrency,
        cancel,
        Some(Arc::clone(&reporter) as Arc<dyn Observer>),
    ));
    reporter.finish();

    Ok(Finished {
        outcome: run.outcome,
        model: run.model,
        style: SummaryStyle::Plain,
    })
}

/// Write the index and, when asked for, the HTML report. Failures here are
/// reported but never change the exit code.
fn write_outputs(params: &ExecutionParams, wants_html: bool, finished: &Finished) -> Option<PathBuf> {
    let index = RunIndex::new(
        finished.outcome.run_ids.clone(),
        finished.model.succeeded_count(),
        finished.model.failed_count(),
    );
    if let Err(err) = write_index(&params.out_dir, &index) {
        eprintln!("warning: failed to write index: {err}");
        return None;
    }
    if !wants_html {
        return None;
    }
    let output = params
        .resolved_html_file()
        .unwrap_or_else(|| params.out_dir.join(DEFAULT_REPORT_FILE));
    match generate_html_report(&params.out_dir, &output) {
        Ok(report) => Some(report.html),
        Err(err) => {
            eprintln!("warning: failed to generate HTML report: {err}");
            None
        }
    }
}

/// Handle the report command.
fn cmd_report(out: &Path, html_file: Option<&Path>) -> Result<()> {
    let output = match html_file {
        Some(path) if path.is_absolute() => path.to_path_buf(),
        Some(path) => out.join(path),
        None => out.join(DEFAULT_REPORT_FILE),
    };
    match generate_html_report(out, &output) {
        Ok(report) => {
            if report.skipped > 0 {
                eprintln!("warning: skipped {} unreadable result files", report.skipped);
            }
            eprintln!("report written to: {}", report.html.display());
            Ok(())
        }
        Err(err) => emit_error(&err),
    }
}

/// Handle the completions command.
fn cmd_completions(shell: Shell) -> Result<()> {
    let mut cmd = Cli::command();
    let name = cmd.get_name().to_string();
    generate(shell, &mut cmd, name, &mut io::stdout());
    Ok(())
}

fn emit_error(err: &ArenaError) -> Result<()> {
    eprintln!("error: {err}");
    if let Some(context) = &err.context {
        eprintln!("  context: {context}");
    }
    std::process::exit(exit_code_for_error(err));
}

fn exit_code_for_error(err: &ArenaError) -> i32 {
    err.exit_code()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_code_maps_setup_and_cancel() {
        assert_eq!(exit_code_for_error(&ArenaError::setup("x")), 2);
        assert_eq!(exit_code_for_error(&ArenaError::canceled()), 130);
    }

    #[test]
    fn banner_lists_filters_with_defaults() {
        let cli = Cli::parse_from([
            "arena", "run", "--provider", "openai", "--provider", "claude", "-j", "3",
        ]);
        let Commands::Run(args) = cli.command else {
            unreachable!("parsed a run command");
        };
        let banner = args.banner();
        assert!(banner.starts_with("Running arena\n"));
        assert!(banner.contains("Regions: default\n"));
        assert!(banner.contains("Providers: openai, claude\n"));
        assert!(banner.contains("Concurrency: 3\n"));
        assert!(banner.contains("Output: out\n"));
    }

    #[test]
    fn rust_log_overrides_verbosity() {
        use tracing_subscriber::filter::LevelFilter;

        assert_eq!(filter_from(None, false).max_level_hint(), Some(LevelFilter::INFO));
        assert_eq!(filter_from(None, true).max_level_hint(), Some(LevelFilter::DEBUG));
        assert_eq!(
            filter_from(Some("warn"), true).max_level_hint(),
            Some(LevelFilter::WARN)
        );
        assert_eq!(
            filter_from(Some("  "), false).max_level_hint(),
            Some(LevelFilter::INFO)
        );
    }

    #[test]
    fn empty_filters_fall_back_to_defaults() {
        let cli = Cli::parse_from(["arena", "run", "--provider", "a", "--provider", "b"]);
        let Commands::Run(args) = cli.command else {
            unreachable!("parsed a run command");
        };
        let labels: Vec<String> = args.plan().iter().map(ToString::to_string).collect();
        assert_eq!(labels, vec!["a/default/default", "b/default/default"]);
        assert_eq!(args.concurrency, DEFAULT_CONCURRENCY);
    }
}
