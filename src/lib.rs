#![deny(unsafe_code)]
//! Test Navigator
//!
//! Discovers class-based (Django `TestCase`/`APITestCase`) and function-based
//! (pytest) tests in a Python project, binds each one to a short home-row key,
//! and runs the chosen test through the matching external runner.
//!
//! ## Panic Policy
//!
//! - **Production code**: Use `Result` or `Option` with `?` / `ok_or` / `map_err`. The `cli` module enforces
//!   `#![deny(clippy::unwrap_used)]`.
//!
//! - **Test code**: `.unwrap()` and `.expect()` are acceptable in tests.
//!
//! ## Unsafe Policy
//!
//! Denied crate-wide. The only exception is the SIGINT disposition guard in
//! [`runner`], which has no safe std equivalent.

pub mod bind;
pub mod cli;
pub mod command;
pub mod config;
pub mod errors;
pub mod keys;
pub mod runner;
pub mod scan;
pub mod session;

pub use bind::{Binding, bind};
pub use command::{CommandLine, CommandSynthesizer};
pub use config::{CommandConfig, NavigatorConfig, ScanConfig};
pub use errors::NavigatorError;
pub use keys::{Key, KeyPool, PoolExhausted, PoolKind, PoolStats, SequenceAllocator};
pub use runner::{ProcessRunner, RunError, RunOutput, SubprocessRunner};
pub use scan::{FrameworkKind, Inventory, KindScope, scan, scan_source};
pub use session::{NavigatorSession, Presentation, SessionState};
