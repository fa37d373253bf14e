use std::io::{self, IsTerminal, Write};
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use quire_config::{Config, LoadOptions};
use quire_core::{Book, BookError, ExitCode, RenderReport};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

const DEFAULT_LOG_FILTER: &str = "quire_core=info,quire_cli=info";

/// Entry point for CLI execution. Returns the desired exit code.
pub fn run() -> Result<i32> {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            // Usage errors exit 1; help and version exit 0.
            let code = if err.use_stderr() {
                ExitCode::Failure
            } else {
                ExitCode::Success
            };
            err.print().context("failed to print usage")?;
            return Ok(code as i32);
        }
    };
    init_tracing(cli.quiet);

    let mut options = LoadOptions::default();
    if let Some(path) = cli.config.clone() {
        options = options.with_override_path(path);
    }
    let mut config = Config::load(options)?;
    cli.apply_overrides(&mut config);

    let book = Book::from_config(&config)?;
    let report = book.write(&config.book.output)?;

    if cli.json {
        let payload = serde_json::to_string_pretty(&report)?;
        emit(&payload)?;
    } else if !cli.quiet {
        emit(&summary(&report))?;
    }
    Ok(ExitCode::Success as i32)
}

/// Exit code for an error returned by [`run`]; book failures carry their own.
pub fn exit_code_for(err: &anyhow::Error) -> i32 {
    match err.downcast_ref::<BookError>() {
        Some(book_error) => book_error.exit_code() as i32,
        None => ExitCode::Failure as i32,
    }
}

#[derive(Parser, Debug)]
#[command(name = "quire", about = "Render a manifest-driven book to HTML", version)]
struct Cli {
    /// Configuration file layered over the discovered ones.
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Directory holding the chapter sources.
    #[arg(long, value_name = "DIR")]
    root: Option<PathBuf>,

    /// Structure manifest to load.
    #[arg(long, value_name = "FILE")]
    manifest: Option<PathBuf>,

    /// Directory that receives the rendered pages.
    #[arg(long, value_name = "DIR")]
    out: Option<PathBuf>,

    /// Print the render report as JSON on stdout.
    #[arg(long)]
    json: bool,

    /// Only log warnings and errors; suppress the summary line.
    #[arg(short, long)]
    quiet: bool,
}

impl Cli {
    fn apply_overrides(&self, config: &mut Config) {
        if let Some(root) = &self.root {
            config.book.content_root = root.clone();
        }
        if let Some(manifest) = &self.manifest {
            config.book.manifest = manifest.clone();
        }
        if let Some(out) = &self.out {
            config.book.output = out.clone();
        }
    }
}

fn init_tracing(quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("warn")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER))
    };

    // stdout is reserved for the report.
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(io::stderr)
                .with_ansi(io::stderr().is_terminal()),
        )
        .try_init();
}

fn summary(report: &RenderReport) -> String {
    let mut line = format!(
        "Rendered {} page(s) to {}",
        report.pages.len(),
        report.output_root.display()
    );
    if let Some(contents) = &report.contents {
        line.push_str(&format!(" (contents: {})", contents.display()));
    }
    let issues = report.sample_issue_count();
    if issues > 0 {
        line.push_str(&format!(", {issues} code sample warning(s)"));
    }
    line
}

fn emit(text: &str) -> Result<()> {
    let mut stdout = io::stdout().lock();
    writeln!(stdout, "{text}").context("failed to write to stdout")?;
    Ok(())
}
