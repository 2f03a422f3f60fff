//! Navigator configuration
//!
//! Defaults come from the `testnav_core` vocabulary; every value can be
//! overridden through the builder methods (the CLI maps its flags onto them).

use std::path::{Path, PathBuf};
use std::time::Duration;

use testnav_core::lang::{conventions, markers};

use crate::scan::KindScope;

/// What the scanner recognizes.
#[derive(Debug, Clone)]
pub struct ScanConfig {
    /// Base types that make a class a class-based test case.
    pub marker_ancestors: Vec<String>,
    /// Prefix of leaf test names.
    pub test_prefix: String,
    /// Prefix of function-based grouping class names.
    pub grouping_prefix: String,
    /// Decorator segments captured as resource-requirement tags.
    pub resource_markers: Vec<String>,
    /// Directory names skipped on top of the `testnav_core` defaults.
    pub excluded_dirs: Vec<String>,
    /// Columns a tab counts for when measuring indentation.
    pub tab_width: usize,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            marker_ancestors: markers::canonical_names().map(str::to_string).collect(),
            test_prefix: conventions::TEST_PREFIX.to_string(),
            grouping_prefix: conventions::GROUPING_PREFIX.to_string(),
            resource_markers: vec![conventions::RESOURCE_MARKER.to_string()],
            excluded_dirs: Vec::new(),
            tab_width: 4,
        }
    }
}

impl ScanConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an extra marker ancestor (e.g. a project-local `BaseAPITestCase`).
    pub fn with_marker_ancestor(mut self, name: impl Into<String>) -> Self {
        self.marker_ancestors.push(name.into());
        self
    }

    pub fn with_test_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.test_prefix = prefix.into();
        self
    }

    pub fn with_excluded_dir(mut self, name: impl Into<String>) -> Self {
        self.excluded_dirs.push(name.into());
        self
    }

    pub fn is_marker_ancestor(&self, base: &str) -> bool {
        let last = base.rsplit('.').next().unwrap_or(base).trim();
        self.marker_ancestors.iter().any(|m| m == last)
    }

    pub fn is_excluded_dir(&self, name: &str) -> bool {
        conventions::is_excluded_dir(name) || self.excluded_dirs.iter().any(|d| d == name)
    }
}

/// How runner commands are spelled.
#[derive(Debug, Clone)]
pub struct CommandConfig {
    /// Invocation prefix of the class-based runner.
    pub class_runner: Vec<String>,
    /// Invocation prefix of the function-based runner.
    pub alt_runner: Vec<String>,
    /// File glob passed to the class-based runner for "run all".
    pub test_file_pattern: String,
    /// Project root as handed to the function-based runner for "run all".
    pub project_root: PathBuf,
    /// Ask both runners for verbose output.
    pub verbose: bool,
    /// Settings module passed to the function-based runner as `--ds`.
    pub settings_module: Option<String>,
}

impl Default for CommandConfig {
    fn default() -> Self {
        Self {
            class_runner: vec!["python".to_string(), "manage.py".to_string(), "test".to_string()],
            alt_runner: vec!["pytest".to_string()],
            test_file_pattern: conventions::TEST_FILE_PATTERN.to_string(),
            project_root: PathBuf::from("."),
            verbose: false,
            settings_module: None,
        }
    }
}

impl CommandConfig {
    pub fn with_project_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.project_root = root.into();
        self
    }

    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    pub fn with_settings_module(mut self, module: Option<String>) -> Self {
        self.settings_module = module;
        self
    }
}

/// Session-wide configuration.
#[derive(Debug, Clone)]
pub struct NavigatorConfig {
    /// Root that module paths and runner paths are relative to.
    pub project_root: PathBuf,
    /// Where scanning starts; defaults to the project root.
    pub search_path: Option<PathBuf>,
    /// Kill a test run after this long.
    pub timeout: Option<Duration>,
    /// Show ` [tag]` after leaves carrying a resource tag.
    pub show_tags: bool,
    /// Skip the kind menu and start with this scope.
    pub initial_scope: Option<KindScope>,
    /// Color status lines.
    pub color: bool,
    /// Clear the screen before the menu and each listing.
    pub clear_screen: bool,
    pub scan: ScanConfig,
    pub commands: CommandConfig,
}

impl NavigatorConfig {
    pub fn new(project_root: impl Into<PathBuf>) -> Self {
        let project_root = project_root.into();
        Self {
            commands: CommandConfig::default().with_project_root(project_root.clone()),
            project_root,
            search_path: None,
            timeout: None,
            show_tags: false,
            initial_scope: None,
            color: true,
            clear_screen: true,
            scan: ScanConfig::default(),
        }
    }

    pub fn with_search_path(mut self, path: Option<PathBuf>) -> Self {
        self.search_path = path;
        self
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_show_tags(mut self, show: bool) -> Self {
        self.show_tags = show;
        self
    }

    pub fn with_initial_scope(mut self, scope: Option<KindScope>) -> Self {
        self.initial_scope = scope;
        self
    }

    pub fn with_color(mut self, color: bool) -> Self {
        self.color = color;
        self
    }

    pub fn with_clear_screen(mut self, clear: bool) -> Self {
        self.clear_screen = clear;
        self
    }

    pub fn with_commands(mut self, commands: CommandConfig) -> Self {
        self.commands = commands;
        self
    }

    /// Directory the scan starts from.
    ///
    /// A relative search path is taken relative to the project root.
    pub fn scan_root(&self) -> PathBuf {
        match &self.search_path {
            Some(p) if p.is_absolute() => p.clone(),
            Some(p) => self.project_root.join(p),
            None => self.project_root.clone(),
        }
    }

    pub fn project_root(&self) -> &Path {
        &self.project_root
    }
}
