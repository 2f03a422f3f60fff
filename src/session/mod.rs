//! Interactive navigator session
//!
//! The session is an explicit state machine driven by one blocking read per
//! step:
//!
//! ```text
//! SelectFrameworkKind -> ListInventory -> AwaitKey -> Executing -> ListInventory
//!                                            |
//!                                            +-> Exit
//! ```
//!
//! The session owns its key pools and binding; nothing is shared between
//! sessions.
//!
//! ## Module Structure
//!
//! - `console` - Presentation trait and the terminal implementation
//! - `render` - Listing, summary and JSON rendering

pub mod console;
pub mod render;

pub use console::{Console, Presentation, Status};

use std::collections::HashSet;

use crate::bind::{Binding, bind};
use crate::command::{CommandLine, CommandSynthesizer};
use crate::config::NavigatorConfig;
use crate::errors::NavigatorError;
use crate::keys::{PoolKind, SequenceAllocator};
use crate::runner::{ProcessRunner, RunError};
use crate::scan::{self, FrameworkKind, ItemRef, KindScope};

pub const MENU_PROMPT: &str = "Enter choice: ";
pub const KEY_PROMPT: &str = "Enter key to run test (or 'q' to quit, 'a' to run all): ";
pub const CONTINUE_PROMPT: &str = "Press Enter to continue...";

/// Menu choices in display order.
const MENU: [(&str, KindScope); 3] = [
    ("1", KindScope::ClassBased),
    ("2", KindScope::FunctionBased),
    ("3", KindScope::Both),
];

/// What a planned run covers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunTarget {
    /// One bound item, with a `path::Class::name` label.
    Item(String),
    /// Every test of the run's kind.
    AllOfKind,
}

/// A command queued for execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedRun {
    pub kind: FrameworkKind,
    pub target: RunTarget,
    pub command: CommandLine,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    SelectFrameworkKind,
    ListInventory,
    AwaitKey,
    Executing(Vec<PlannedRun>),
    Exit,
}

/// Reset both pools, scan the configured tree for `scope`, and bind it.
pub fn prepare_binding(
    config: &NavigatorConfig,
    allocator: &mut SequenceAllocator,
    scope: KindScope,
) -> Result<Binding, NavigatorError> {
    allocator.reset_all();
    let root = config.scan_root();
    let inventory = scan::scan(config.project_root(), &root, &config.scan).restrict(scope);
    if inventory.is_empty() {
        return Err(NavigatorError::NoTestsFound { scope, root });
    }
    let (class_pool, function_pool) = allocator.pools_mut();
    Ok(bind(inventory, class_pool, function_pool)?)
}

/// `display/path.py::Class::name`
pub fn item_label(item: ItemRef<'_>) -> String {
    match item {
        ItemRef::Class { module, class } => format!("{}::{}", module.display_path, class.name),
        ItemRef::Function {
            module,
            class: Some(class),
            function,
        } => format!("{}::{}::{}", module.display_path, class.name, function.name),
        ItemRef::Function {
            module,
            class: None,
            function,
        } => format!("{}::{}", module.display_path, function.name),
    }
}

pub struct NavigatorSession<P, R> {
    config: NavigatorConfig,
    presentation: P,
    runner: R,
    synthesizer: CommandSynthesizer,
    allocator: SequenceAllocator,
    state: SessionState,
    scope: Option<KindScope>,
    pending_scope: Option<KindScope>,
    binding: Option<Binding>,
    unavailable: HashSet<FrameworkKind>,
    executions: usize,
    failures: usize,
}

impl<P: Presentation, R: ProcessRunner> NavigatorSession<P, R> {
    pub fn new(config: NavigatorConfig, presentation: P, runner: R) -> Self {
        Self {
            synthesizer: CommandSynthesizer::new(config.commands.clone()),
            pending_scope: config.initial_scope,
            config,
            presentation,
            runner,
            allocator: SequenceAllocator::new(),
            state: SessionState::SelectFrameworkKind,
            scope: None,
            binding: None,
            unavailable: HashSet::new(),
            executions: 0,
            failures: 0,
        }
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn binding(&self) -> Option<&Binding> {
        self.binding.as_ref()
    }

    pub fn scope(&self) -> Option<KindScope> {
        self.scope
    }

    pub fn presentation(&self) -> &P {
        &self.presentation
    }

    pub fn runner(&self) -> &R {
        &self.runner
    }

    pub fn allocator(&self) -> &SequenceAllocator {
        &self.allocator
    }

    pub fn executions(&self) -> usize {
        self.executions
    }

    pub fn is_available(&self, kind: FrameworkKind) -> bool {
        !self.unavailable.contains(&kind)
    }

    fn scope_available(&self, scope: KindScope) -> bool {
        scope.kinds().iter().all(|k| self.is_available(*k))
    }

    /// Aggregate status: nonzero once any execution has failed.
    pub fn exit_status(&self) -> i32 {
        if self.failures > 0 { 1 } else { 0 }
    }

    /// Drive the session until the user quits; returns the aggregate status.
    pub fn run(&mut self) -> i32 {
        while self.state != SessionState::Exit {
            self.step();
        }
        self.presentation.write_line("");
        self.presentation.write_line("Exiting test runner. Goodbye!");
        self.exit_status()
    }

    /// Perform one state transition.
    pub fn step(&mut self) {
        let state = std::mem::replace(&mut self.state, SessionState::Exit);
        tracing::debug!(?state, "session step");
        self.state = match state {
            SessionState::SelectFrameworkKind => self.select_kind(),
            SessionState::ListInventory => self.list_inventory(),
            SessionState::AwaitKey => self.await_key(),
            SessionState::Executing(runs) => self.execute(runs),
            SessionState::Exit => SessionState::Exit,
        };
    }

    /// Fresh scan and bind for `scope`. The previous binding is dropped first,
    /// so a failure leaves no stale keys behind.
    pub fn load(&mut self, scope: KindScope) -> Result<&Binding, NavigatorError> {
        self.binding = None;
        self.scope = Some(scope);
        let binding = prepare_binding(&self.config, &mut self.allocator, scope)?;
        for diagnostic in &binding.inventory().diagnostics {
            self.presentation.status(Status::Warn, &diagnostic.to_string());
        }
        Ok(&*self.binding.insert(binding))
    }

    fn report(&mut self, err: &NavigatorError) {
        self.presentation.status(Status::Fail, &err.to_string());
        if let Some(help) = err.help_text() {
            self.presentation.status(Status::Info, &help);
        }
    }

    // ========================================================================
    // States
    // ========================================================================

    fn select_kind(&mut self) -> SessionState {
        if let Some(scope) = self.pending_scope.take() {
            if self.scope_available(scope) {
                return self.enter_scope(scope);
            }
        }

        self.presentation.clear();
        self.presentation.write_line("Select test type:");
        for (choice, scope) in MENU {
            if self.scope_available(scope) {
                let label = self.menu_label(scope);
                self.presentation.write_line(&format!("  ({choice}) {label}"));
            }
        }
        self.presentation.write_line("  (q) Quit");
        self.presentation.write_prompt(MENU_PROMPT);

        let Some(input) = self.presentation.read_line() else {
            return SessionState::Exit;
        };
        let choice = input.trim();
        if choice == "q" || choice.eq_ignore_ascii_case("quit") {
            return SessionState::Exit;
        }
        match MENU.iter().find(|(c, _)| *c == choice) {
            Some((_, scope)) if self.scope_available(*scope) => self.enter_scope(*scope),
            _ => {
                self.presentation.status(Status::Fail, "Invalid choice. Please try again.");
                SessionState::SelectFrameworkKind
            }
        }
    }

    fn menu_label(&self, scope: KindScope) -> String {
        let commands = self.synthesizer.config();
        match scope {
            KindScope::ClassBased => format!("Class-based tests ({})", commands.class_runner.join(" ")),
            KindScope::FunctionBased => format!("Function-based tests ({})", commands.alt_runner.join(" ")),
            KindScope::Both => "All tests".to_string(),
        }
    }

    fn enter_scope(&mut self, scope: KindScope) -> SessionState {
        match self.load(scope) {
            Ok(_) => SessionState::ListInventory,
            Err(err) => {
                tracing::warn!(%scope, "could not prepare binding: {err}");
                if matches!(err, NavigatorError::NoTestsFound { .. }) {
                    self.presentation.status(Status::Warn, &err.to_string());
                } else {
                    self.report(&err);
                }
                SessionState::SelectFrameworkKind
            }
        }
    }

    fn list_inventory(&mut self) -> SessionState {
        let Some(binding) = &self.binding else {
            return SessionState::SelectFrameworkKind;
        };
        let scope = self.scope.unwrap_or(KindScope::Both);

        self.presentation.clear();
        self.presentation.write_line(&format!("Available Tests ({scope})"));
        self.presentation.write_line("");
        for line in render::render_listing(binding, self.config.show_tags) {
            self.presentation.write_line(&line);
        }
        self.presentation.write_line("");
        self.presentation.write_line(&render::summary_line(binding));
        if self.config.commands.verbose {
            for kind in [PoolKind::Class, PoolKind::Function] {
                let line = render::pool_stats_line(kind, binding.pool_stats(kind));
                self.presentation.status(Status::Info, &line);
            }
        }
        SessionState::AwaitKey
    }

    fn await_key(&mut self) -> SessionState {
        self.presentation.write_prompt(KEY_PROMPT);
        let Some(input) = self.presentation.read_line() else {
            return SessionState::Exit;
        };

        match input.trim() {
            "" => SessionState::AwaitKey,
            "q" | "quit" => SessionState::Exit,
            "r" | "refresh" => match self.scope {
                Some(scope) => self.enter_scope(scope),
                None => SessionState::SelectFrameworkKind,
            },
            "a" | "all" => {
                let runs = self.plan_all();
                if runs.is_empty() {
                    self.presentation.status(Status::Warn, "No runner is available for this selection.");
                    SessionState::AwaitKey
                } else {
                    SessionState::Executing(runs)
                }
            }
            key => match self.plan_key(key) {
                Some(run) => SessionState::Executing(vec![run]),
                None => {
                    let err = NavigatorError::UnboundKey { key: key.to_string() };
                    self.presentation.status(Status::Fail, &err.to_string());
                    SessionState::AwaitKey
                }
            },
        }
    }

    fn plan_key(&self, key: &str) -> Option<PlannedRun> {
        let item = self.binding.as_ref()?.lookup(key)?;
        Some(PlannedRun {
            kind: item.kind(),
            target: RunTarget::Item(item_label(item)),
            command: self.synthesizer.command_for(item),
        })
    }

    fn plan_all(&self) -> Vec<PlannedRun> {
        let scope = self.scope.unwrap_or(KindScope::Both);
        scope
            .kinds()
            .iter()
            .filter(|kind| self.is_available(**kind))
            .map(|kind| PlannedRun {
                kind: *kind,
                target: RunTarget::AllOfKind,
                command: self.synthesizer.command_for_all(*kind),
            })
            .collect()
    }

    fn execute(&mut self, runs: Vec<PlannedRun>) -> SessionState {
        let mut lost_runner = false;

        for run in &runs {
            self.presentation.write_line("");
            self.presentation.write_line("Running:");
            self.presentation.write_line(&format!("  {}", run.command));
            self.presentation.write_line("");
            self.executions += 1;
            tracing::info!(command = %run.command, "executing");

            match self.runner.run(&run.command) {
                Ok(output) => {
                    for line in output.combined_output.lines() {
                        self.presentation.write_line(line);
                    }
                    if output.success() {
                        let message = match &run.target {
                            RunTarget::Item(label) => format!("Test passed: {label}"),
                            RunTarget::AllOfKind => format!("All {} tests passed!", run.kind),
                        };
                        self.presentation.status(Status::Pass, &message);
                    } else {
                        self.failures += 1;
                        let message = match &run.target {
                            RunTarget::Item(label) => {
                                format!("Test failed: {label} (exit code: {})", output.exit_code)
                            }
                            RunTarget::AllOfKind => {
                                format!("Some {} tests failed (exit code: {})", run.kind, output.exit_code)
                            }
                        };
                        self.presentation.status(Status::Fail, &message);
                    }
                }
                Err(err) => {
                    if let RunError::Timeout { output, .. } = &err {
                        for line in output.lines() {
                            self.presentation.write_line(line);
                        }
                    }
                    let command = run.command.to_string();
                    let Some(err) = NavigatorError::from_run_error(err, run.kind, &command) else {
                        self.presentation.status(Status::Warn, "Test interrupted by user");
                        break;
                    };
                    self.failures += 1;
                    if let NavigatorError::MissingFrameworkTool { kind, .. } = &err {
                        self.unavailable.insert(*kind);
                        lost_runner = true;
                    }
                    self.report(&err);
                }
            }
        }

        self.presentation.write_prompt(CONTINUE_PROMPT);
        if self.presentation.read_line().is_none() {
            return SessionState::Exit;
        }

        if lost_runner {
            self.binding = None;
            SessionState::SelectFrameworkKind
        } else {
            SessionState::ListInventory
        }
    }
}
