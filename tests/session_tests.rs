//! End-to-end session tests
//!
//! Sessions run against a temporary project, a scripted terminal and a fake
//! process runner, so every transition can be observed without spawning
//! Django or pytest.

use std::collections::VecDeque;
use std::fs;
use std::path::Path;
use std::time::Duration;

use tempfile::TempDir;
use testnav::runner::{ProcessRunner, RunError, RunOutput};
use testnav::session::{CONTINUE_PROMPT, KEY_PROMPT, NavigatorSession, Presentation, SessionState};
use testnav::{CommandLine, KindScope, NavigatorConfig};

// =============================================================================
// Fakes
// =============================================================================

#[derive(Debug, Default)]
struct ScriptedTerminal {
    input: VecDeque<String>,
    output: Vec<String>,
    prompts: Vec<String>,
}

impl ScriptedTerminal {
    fn new(lines: &[&str]) -> Self {
        Self {
            input: lines.iter().map(|l| l.to_string()).collect(),
            ..Self::default()
        }
    }

    fn count(&self, needle: &str) -> usize {
        self.output.iter().filter(|l| l.contains(needle)).count()
    }

    fn has_line(&self, line: &str) -> bool {
        self.output.iter().any(|l| l == line)
    }
}

impl Presentation for ScriptedTerminal {
    fn write_line(&mut self, text: &str) {
        self.output.push(text.to_string());
    }

    fn write_prompt(&mut self, text: &str) {
        self.prompts.push(text.to_string());
    }

    fn read_line(&mut self) -> Option<String> {
        self.input.pop_front()
    }
}

#[derive(Debug)]
enum Reply {
    Exit(i32, &'static str),
    Missing,
    Timeout,
    Interrupt,
}

#[derive(Debug, Default)]
struct FakeRunner {
    replies: VecDeque<Reply>,
    calls: Vec<CommandLine>,
}

impl FakeRunner {
    fn replying(replies: Vec<Reply>) -> Self {
        Self {
            replies: replies.into(),
            calls: Vec::new(),
        }
    }

    fn argv(&self, call: usize) -> Vec<&str> {
        self.calls[call].argv().iter().map(String::as_str).collect()
    }
}

impl ProcessRunner for FakeRunner {
    fn run(&mut self, command: &CommandLine) -> Result<RunOutput, RunError> {
        self.calls.push(command.clone());
        match self.replies.pop_front().unwrap_or(Reply::Exit(0, "OK")) {
            Reply::Exit(exit_code, output) => Ok(RunOutput {
                exit_code,
                combined_output: output.to_string(),
            }),
            Reply::Missing => Err(RunError::MissingTool {
                program: command.program().unwrap_or_default().to_string(),
            }),
            Reply::Timeout => Err(RunError::Timeout {
                after: Duration::from_secs(3),
                output: "test_create_load_without_legs ... ok\n".to_string(),
            }),
            Reply::Interrupt => Err(RunError::Interrupted),
        }
    }
}

// =============================================================================
// Fixture project
// =============================================================================

const LOADS: &str = "\
from rest_framework.test import APITestCase


class LoadWriteSerializerTestCase(APITestCase):
    def setUp(self):
        self.payload = {}

    def test_create_load_without_legs(self):
        pass

    def test_create_load_with_single_leg_no_stops(self):
        pass
";

const HELPERS: &str = "\
import pytest


class TestUserModel:
    def test_user_creation(self):
        assert True


@pytest.mark.django_db
def test_slugify_company():
    pass
";

fn write(root: &Path, rel: &str, contents: &str) {
    let path = root.join(rel);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, contents).unwrap();
}

fn project() -> TempDir {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "manage.py", "import sys\n");
    write(dir.path(), "machtms/backend/loads/tests.py", LOADS);
    write(dir.path(), "machtms/backend/utils/test_helpers.py", HELPERS);
    dir
}

fn session(
    dir: &TempDir,
    scope: Option<KindScope>,
    input: &[&str],
    replies: Vec<Reply>,
) -> NavigatorSession<ScriptedTerminal, FakeRunner> {
    let config = NavigatorConfig::new(dir.path()).with_initial_scope(scope);
    NavigatorSession::new(config, ScriptedTerminal::new(input), FakeRunner::replying(replies))
}

// =============================================================================
// Key handling
// =============================================================================

#[test]
fn test_unbound_key_stays_in_await_key() {
    let dir = project();
    let mut s = session(&dir, Some(KindScope::ClassBased), &["zzz"], Vec::new());

    s.step();
    assert_eq!(s.state(), &SessionState::ListInventory);
    s.step();
    assert_eq!(s.state(), &SessionState::AwaitKey);
    let keys_before = s.binding().unwrap().len();

    s.step();
    assert_eq!(s.state(), &SessionState::AwaitKey);
    assert_eq!(s.presentation().count("Invalid key"), 1);
    assert!(s.presentation().has_line("[FAIL] Invalid key: 'zzz'"));
    assert_eq!(s.binding().unwrap().len(), keys_before);
    assert!(s.binding().unwrap().lookup("aaaa").is_some());
    assert!(s.runner().calls.is_empty());
}

#[test]
fn test_listing_shows_keys_and_summary() {
    let dir = project();
    let mut s = session(&dir, Some(KindScope::ClassBased), &[], Vec::new());
    s.step();
    s.step();

    let term = s.presentation();
    assert!(term.has_line("backend/loads/tests.py:"));
    assert!(term.has_line("[aaaa] LoadWriteSerializerTestCase"));
    assert!(term.has_line("    <aaa> test_create_load_without_legs"));
    assert!(term.has_line("    <aas> test_create_load_with_single_leg_no_stops"));
    assert!(term.has_line("Found 1 test classes, 2 test functions"));
    assert!(!term.output.iter().any(|l| l.contains("setUp")));
}

#[test]
fn test_failed_run_makes_final_status_nonzero() {
    let dir = project();
    let mut s = session(
        &dir,
        Some(KindScope::ClassBased),
        &["aaa", "", "q"],
        vec![Reply::Exit(1, "FAIL: test_create_load_without_legs\nFAILED (failures=1)")],
    );

    assert_eq!(s.run(), 1);
    assert_eq!(
        s.runner().argv(0),
        vec![
            "python",
            "manage.py",
            "test",
            "machtms.backend.loads.tests.LoadWriteSerializerTestCase.test_create_load_without_legs"
        ]
    );

    let term = s.presentation();
    assert!(term.has_line("FAILED (failures=1)"));
    assert!(term.has_line(
        "[FAIL] Test failed: backend/loads/tests.py::LoadWriteSerializerTestCase::test_create_load_without_legs (exit code: 1)"
    ));
    assert!(term.prompts.iter().any(|p| p == CONTINUE_PROMPT));
    // Listed once on entry and once after the run.
    assert_eq!(term.count("Found 1 test classes, 2 test functions"), 2);
    assert_eq!(s.executions(), 1);
}

#[test]
fn test_later_success_does_not_clear_failure() {
    let dir = project();
    let mut s = session(
        &dir,
        Some(KindScope::ClassBased),
        &["aaa", "", "aas", "", "q"],
        vec![Reply::Exit(1, ""), Reply::Exit(0, "OK")],
    );
    assert_eq!(s.run(), 1);
    assert_eq!(s.executions(), 2);
    assert_eq!(s.presentation().count("[PASS] Test passed"), 1);
}

#[test]
fn test_quit_without_runs_exits_zero() {
    let dir = project();
    let mut s = session(&dir, None, &["1", "q"], Vec::new());
    assert_eq!(s.run(), 0);
    assert_eq!(s.executions(), 0);
    let term = s.presentation();
    assert!(term.has_line("Select test type:"));
    assert!(term.has_line("  (1) Class-based tests (python manage.py test)"));
    assert!(term.has_line("  (2) Function-based tests (pytest)"));
    assert!(term.has_line("  (3) All tests"));
    assert!(term.prompts.iter().any(|p| p == KEY_PROMPT));
}

#[test]
fn test_eof_quits() {
    let dir = project();
    let mut s = session(&dir, None, &[], Vec::new());
    assert_eq!(s.run(), 0);
    assert_eq!(s.state(), &SessionState::Exit);
}

#[test]
fn test_invalid_menu_choice() {
    let dir = project();
    let mut s = session(&dir, None, &["9", "q"], Vec::new());
    assert_eq!(s.run(), 0);
    assert!(s.presentation().has_line("[FAIL] Invalid choice. Please try again."));
}

// =============================================================================
// Commands
// =============================================================================

#[test]
fn test_grouping_class_key_runs_whole_class() {
    let dir = project();
    let mut s = session(&dir, Some(KindScope::FunctionBased), &["aaaa", "", "q"], Vec::new());
    assert_eq!(s.run(), 0);
    assert_eq!(
        s.runner().argv(0),
        vec!["pytest", "machtms/backend/utils/test_helpers.py::TestUserModel"]
    );
}

#[test]
fn test_run_all_in_both_scope_runs_each_runner() {
    let dir = project();
    let mut s = session(&dir, Some(KindScope::Both), &["a", "", "q"], Vec::new());
    assert_eq!(s.run(), 0);

    let root = dir.path().to_string_lossy().to_string();
    assert_eq!(s.runner().calls.len(), 2);
    assert_eq!(
        s.runner().argv(0),
        vec!["python", "manage.py", "test", "--pattern", "*test*.py"]
    );
    assert_eq!(s.runner().argv(1), vec!["pytest", root.as_str()]);
    assert!(s.presentation().has_line("[PASS] All class-based tests passed!"));
    assert!(s.presentation().has_line("[PASS] All function-based tests passed!"));
}

#[test]
fn test_both_scope_keeps_item_kinds() {
    let dir = project();
    let mut s = session(&dir, Some(KindScope::Both), &["aaa", "", "aad", "", "q"], Vec::new());
    assert_eq!(s.run(), 0);
    // aaa is a Django method, aad the first pytest leaf.
    assert_eq!(s.runner().argv(0)[0], "python");
    assert_eq!(
        s.runner().argv(1),
        vec!["pytest", "machtms/backend/utils/test_helpers.py::TestUserModel::test_user_creation"]
    );
}

// =============================================================================
// Failures
// =============================================================================

#[test]
fn test_missing_tool_removes_option() {
    let dir = project();
    let mut s = session(
        &dir,
        Some(KindScope::FunctionBased),
        &["aaa", "", "q"],
        vec![Reply::Missing],
    );
    assert_eq!(s.run(), 1);

    let term = s.presentation();
    assert!(term.has_line("[FAIL] function-based runner 'pytest' is not available"));
    assert!(term.has_line("  (1) Class-based tests (python manage.py test)"));
    assert!(!term.output.iter().any(|l| l.starts_with("  (2)")));
    assert!(!term.output.iter().any(|l| l.starts_with("  (3)")));
}

#[test]
fn test_no_tests_found_returns_to_menu() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "app/test_utils.py", "def make_user():\n    pass\n");
    let mut s = session(&dir, Some(KindScope::ClassBased), &["q"], Vec::new());

    s.step();
    assert_eq!(s.state(), &SessionState::SelectFrameworkKind);
    assert!(s.binding().is_none());
    assert_eq!(s.presentation().count("[WARN] No class-based tests found under"), 1);

    s.step();
    assert_eq!(s.state(), &SessionState::Exit);
}

#[test]
fn test_pool_exhaustion_discards_binding() {
    let dir = TempDir::new().unwrap();
    let source: String = (0..513).map(|i| format!("def test_case_{i}():\n    pass\n\n")).collect();
    write(dir.path(), "app/test_many.py", &source);
    let mut s = session(&dir, Some(KindScope::FunctionBased), &["q"], Vec::new());

    s.step();
    assert_eq!(s.state(), &SessionState::SelectFrameworkKind);
    assert!(s.binding().is_none());
    let term = s.presentation();
    assert!(term.has_line("[FAIL] all 512 function keys have been exhausted (1 more required)"));
    assert_eq!(
        term.output
            .iter()
            .filter(|l| l.starts_with("[INFO]") && l.contains("--path"))
            .count(),
        1
    );

    s.step();
    assert_eq!(s.state(), &SessionState::Exit);
    assert!(s.runner().calls.is_empty());
}

#[test]
fn test_timeout_counts_as_failure() {
    let dir = project();
    let mut s = session(&dir, Some(KindScope::ClassBased), &["aaaa", "", "q"], vec![Reply::Timeout]);
    assert_eq!(s.run(), 1);
    assert_eq!(s.presentation().count("timed out after 3s"), 1);
    assert!(s.presentation().has_line("test_create_load_without_legs ... ok"));
}

#[test]
fn test_interrupt_is_not_failure() {
    let dir = project();
    let mut s = session(&dir, Some(KindScope::ClassBased), &["aaa", "", "q"], vec![Reply::Interrupt]);
    assert_eq!(s.run(), 0);
    assert!(s.presentation().has_line("[WARN] Test interrupted by user"));
}

// =============================================================================
// Refresh
// =============================================================================

#[test]
fn test_refresh_rebinds_from_fresh_pools() {
    let dir = project();
    let mut s = session(&dir, Some(KindScope::ClassBased), &["r"], Vec::new());
    s.step();
    s.step();
    assert_eq!(s.binding().unwrap().len(), 3);

    write(
        dir.path(),
        "machtms/backend/accounts/tests.py",
        "from django.test import TestCase\n\n\nclass AccountTestCase(TestCase):\n    def test_login(self):\n        pass\n",
    );
    s.step();
    assert_eq!(s.state(), &SessionState::ListInventory);

    let binding = s.binding().unwrap();
    assert_eq!(binding.len(), 5);
    match binding.lookup("aaaa").unwrap() {
        testnav::scan::ItemRef::Class { class, .. } => assert_eq!(class.name, "AccountTestCase"),
        other => panic!("unexpected item: {other:?}"),
    }
    assert!(binding.lookup("aaad").is_none());
}
