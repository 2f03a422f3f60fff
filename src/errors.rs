//! Navigator error taxonomy
//!
//! Every variant is recoverable: the session reports it and returns to a
//! stable state. Per-file scan problems are not errors; they are collected as
//! [`crate::scan::ScanDiagnostic`] records on the inventory.

use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

use crate::keys;
use crate::runner::RunError;
use crate::scan::{FrameworkKind, KindScope};

#[derive(Debug, Error, Diagnostic)]
pub enum NavigatorError {
    #[error(transparent)]
    #[diagnostic(
        code(testnav::pool_exhausted),
        help("narrow the scan with --path, or press 'r' to reset the key pools")
    )]
    PoolExhausted(#[from] keys::PoolExhausted),

    #[error("Invalid key: '{key}'")]
    #[diagnostic(
        code(testnav::unbound_key),
        help("type a key from the listing, 'a' to run all, 'r' to refresh or 'q' to quit")
    )]
    UnboundKey { key: String },

    #[error("No {scope} tests found under {}", .root.display())]
    #[diagnostic(
        code(testnav::no_tests_found),
        help("choose another kind, or point --root/--path at a project with tests")
    )]
    NoTestsFound { scope: KindScope, root: PathBuf },

    #[error("`{command}` failed: {reason}")]
    #[diagnostic(code(testnav::execution_failure))]
    ExecutionFailure { command: String, reason: String },

    #[error("{kind} runner '{program}' is not available")]
    #[diagnostic(
        code(testnav::missing_framework_tool),
        help("install the runner or make sure it is on PATH; this kind is disabled for the rest of the session")
    )]
    MissingFrameworkTool { kind: FrameworkKind, program: String },
}

impl NavigatorError {
    /// Map a runner failure onto the taxonomy. `None` for interrupts, which are not failures.
    pub fn from_run_error(err: RunError, kind: FrameworkKind, command: &str) -> Option<Self> {
        match err {
            RunError::Interrupted => None,
            RunError::MissingTool { program } => Some(NavigatorError::MissingFrameworkTool { kind, program }),
            other => Some(NavigatorError::ExecutionFailure {
                command: command.to_string(),
                reason: other.to_string(),
            }),
        }
    }

    /// Help text, if the variant carries one.
    pub fn help_text(&self) -> Option<String> {
        self.help().map(|h| h.to_string())
    }
}
