//! CLI module for the test navigator
//!
//! One entry point, no required flags:
//!
//! - no flags - interactive session over the current directory
//! - `--kind` - skip the kind menu
//! - `--list` / `--json` - print the bound listing and exit
//!
//! ## Design
//!
//! The CLI uses clap for argument parsing with derive macros.
//! Functions return `CliResult<T>` instead of calling `process::exit`.
//! Only the top-level `run()` function handles errors and exits.

// Enforce explicit error handling - no panicking in production code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]

use std::env;
use std::fmt;
use std::io::{self, IsTerminal};
use std::path::PathBuf;
use std::process;
use std::time::Duration;

use clap::{Parser, ValueEnum};

use crate::command::CommandSynthesizer;
use crate::config::{CommandConfig, NavigatorConfig};
use crate::errors::NavigatorError;
use crate::keys::SequenceAllocator;
use crate::runner::SubprocessRunner;
use crate::scan::KindScope;
use crate::session::{self, Console, NavigatorSession, render};

// ============================================================================
// CLI Error handling
// ============================================================================

/// Exit code for CLI operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExitCode(pub i32);

impl ExitCode {
    pub const SUCCESS: ExitCode = ExitCode(0);
    pub const FAILURE: ExitCode = ExitCode(1);
}

/// Error type for CLI operations.
///
/// Contains a user-facing message and an exit code. The CLI entry point
/// catches these errors, prints the message, and exits with the code.
#[derive(Debug)]
pub struct CliError {
    /// User-facing error message (already formatted for display)
    pub message: String,
    /// Exit code to return to the shell
    pub exit_code: ExitCode,
}

impl CliError {
    pub fn new(message: impl Into<String>, exit_code: ExitCode) -> Self {
        Self {
            message: message.into(),
            exit_code,
        }
    }

    /// Create a failure error (exit code 1).
    pub fn failure(message: impl Into<String>) -> Self {
        Self::new(message, ExitCode::FAILURE)
    }
}

impl From<NavigatorError> for CliError {
    fn from(err: NavigatorError) -> Self {
        CliError::failure(format!("{:?}", miette::Report::new(err)))
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CliError {}

/// Result type for CLI operations.
pub type CliResult<T> = Result<T, CliError>;

const VERSION: &str = env!("CARGO_PKG_VERSION");

// ============================================================================
// Clap CLI definition
// ============================================================================

/// Keyboard-driven navigator for Django and pytest test suites
#[derive(Parser, Debug)]
#[command(name = "testnav")]
#[command(version = VERSION)]
#[command(about = "Keyboard-driven navigator for Django and pytest test suites", long_about = None)]
pub struct Cli {
    /// Project root (default: current directory)
    #[arg(long, value_name = "DIR")]
    pub root: Option<PathBuf>,

    /// Only scan this directory (relative to the root, or absolute)
    #[arg(long, value_name = "DIR")]
    pub path: Option<PathBuf>,

    /// Skip the menu and start with this kind of test
    #[arg(long, value_enum, value_name = "KIND")]
    pub kind: Option<KindArg>,

    /// Kill a test run after this many seconds
    #[arg(long, value_name = "SECS", value_parser = clap::value_parser!(u64).range(1..))]
    pub timeout: Option<u64>,

    /// Verbose runner output and key pool statistics
    #[arg(short, long)]
    pub verbose: bool,

    /// Settings module passed to pytest as --ds
    #[arg(long, value_name = "MODULE")]
    pub settings: Option<String>,

    /// Disable colored status lines
    #[arg(long)]
    pub no_color: bool,

    /// Disable screen clearing between screens
    #[arg(long)]
    pub no_clear: bool,

    /// Show resource tags (e.g. [db]) after tests that carry them
    #[arg(long)]
    pub show_tags: bool,

    /// Print the listing and exit
    #[arg(long)]
    pub list: bool,

    /// Print the listing as JSON and exit
    #[arg(long, conflicts_with = "list")]
    pub json: bool,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum KindArg {
    /// Marker-derived test classes (python manage.py test)
    Class,
    /// Standalone functions and Test* classes (pytest)
    Function,
    /// Both kinds together
    Both,
}

impl From<KindArg> for KindScope {
    fn from(kind: KindArg) -> Self {
        match kind {
            KindArg::Class => KindScope::ClassBased,
            KindArg::Function => KindScope::FunctionBased,
            KindArg::Both => KindScope::Both,
        }
    }
}

// ============================================================================
// CLI entry point
// ============================================================================

/// Main CLI entry point.
///
/// This is the only place where `process::exit` is called.
pub fn run() {
    let cli = Cli::parse();

    match execute(cli) {
        Ok(exit_code) => {
            if exit_code.0 != 0 {
                process::exit(exit_code.0);
            }
        }
        Err(e) => {
            if !e.message.is_empty() {
                eprintln!("{}", e.message);
            }
            process::exit(e.exit_code.0);
        }
    }
}

fn execute(cli: Cli) -> CliResult<ExitCode> {
    let config = build_config(&cli)?;
    if cli.list || cli.json {
        let scope = config.initial_scope.unwrap_or(KindScope::Both);
        return print_listing(&config, scope, cli.json);
    }

    let interactive = io::stdout().is_terminal();
    let console = Console::new(interactive && config.color, interactive && config.clear_screen);
    let runner = SubprocessRunner::new(config.project_root.clone()).with_timeout(config.timeout);
    let mut session = NavigatorSession::new(config, console, runner);
    Ok(ExitCode(session.run()))
}

/// Map parsed flags onto a [`NavigatorConfig`].
pub fn build_config(cli: &Cli) -> CliResult<NavigatorConfig> {
    let root = match &cli.root {
        Some(root) => root.clone(),
        None => env::current_dir()
            .map_err(|e| CliError::failure(format!("Error: cannot determine current directory: {e}")))?,
    };
    if !root.is_dir() {
        return Err(CliError::failure(format!(
            "Error: project root '{}' is not a directory",
            root.display()
        )));
    }

    let commands = CommandConfig::default()
        .with_project_root(root.clone())
        .with_verbose(cli.verbose)
        .with_settings_module(cli.settings.clone());

    let config = NavigatorConfig::new(root)
        .with_search_path(cli.path.clone())
        .with_timeout(cli.timeout.map(Duration::from_secs))
        .with_show_tags(cli.show_tags)
        .with_initial_scope(cli.kind.map(KindScope::from))
        .with_color(!cli.no_color)
        .with_clear_screen(!cli.no_clear)
        .with_commands(commands);

    let scan_root = config.scan_root();
    if !scan_root.exists() {
        return Err(CliError::failure(format!(
            "Error: search path '{}' does not exist",
            scan_root.display()
        )));
    }
    let inside_root = match (scan_root.canonicalize(), config.project_root.canonicalize()) {
        (Ok(scan), Ok(root)) => scan.starts_with(root),
        _ => false,
    };
    if !inside_root {
        return Err(CliError::failure(format!(
            "Error: search path '{}' is outside the project root '{}'",
            scan_root.display(),
            config.project_root.display()
        )));
    }
    Ok(config)
}

fn print_listing(config: &NavigatorConfig, scope: KindScope, json: bool) -> CliResult<ExitCode> {
    let mut allocator = SequenceAllocator::new();
    let binding = session::prepare_binding(config, &mut allocator, scope)?;

    for diagnostic in &binding.inventory().diagnostics {
        eprintln!("warning: {diagnostic}");
    }

    if json {
        let synthesizer = CommandSynthesizer::new(config.commands.clone());
        let listing = render::listing_json(&binding, &synthesizer, scope);
        let text = serde_json::to_string_pretty(&listing)
            .map_err(|e| CliError::failure(format!("Error: failed to encode listing: {e}")))?;
        println!("{text}");
    } else {
        for line in render::render_listing(&binding, config.show_tags) {
            println!("{line}");
        }
        println!();
        println!("{}", render::summary_line(&binding));
    }
    Ok(ExitCode::SUCCESS)
}

// ============================================================================
// Tests
// ============================================================================
