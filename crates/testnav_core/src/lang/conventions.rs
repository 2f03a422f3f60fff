//! Shared test-authoring conventions (well-known names and patterns).

/// Name prefix that turns a function or method into a leaf test.
pub const TEST_PREFIX: &str = "test_";

/// Name prefix that turns a class into a function-based grouping class.
pub const GROUPING_PREFIX: &str = "Test";

/// Decorator segment that marks a test as needing database access.
pub const RESOURCE_MARKER: &str = "django_db";

/// Glob handed to the class-based runner when running every test.
pub const TEST_FILE_PATTERN: &str = "*test*.py";

/// Source file extension of scanned modules.
pub const SOURCE_EXTENSION: &str = ".py";

/// Directories never descended into, in addition to any hidden directory.
pub const EXCLUDED_DIRS: &[&str] = &[
    "__pycache__",
    "node_modules",
    "venv",
    "env",
    "virtualenv",
    "dist",
    "build",
    "eggs",
    "migrations",
    "static",
    "media",
    "templates",
];

/// Check whether a directory name is excluded by default.
///
/// Hidden directories (leading `.`) and `*.egg-info` are always excluded.
pub fn is_excluded_dir(name: &str) -> bool {
    name.starts_with('.') || name.ends_with(".egg-info") || EXCLUDED_DIRS.contains(&name)
}

/// Check whether a file name follows the test-file naming rules.
///
/// Accepted shapes: `test*.py`, `*test.py`, `*tests.py`, `*_test.py`.
///
/// ## Examples
/// ```rust
/// use testnav_core::lang::conventions::is_test_file_name;
///
/// assert!(is_test_file_name("test_loads.py"));
/// assert!(is_test_file_name("tests.py"));
/// assert!(!is_test_file_name("models.py"));
/// ```
pub fn is_test_file_name(name: &str) -> bool {
    let Some(stem) = name.strip_suffix(SOURCE_EXTENSION) else {
        return false;
    };
    stem.starts_with("test") || stem.ends_with("test") || stem.ends_with("tests")
}
