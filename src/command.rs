//! Runner command synthesis
//!
//! Commands are always argument vectors. Nothing is ever joined into a shell
//! string, so test names and paths need no quoting.

use std::fmt;

use serde::Serialize;

use crate::config::CommandConfig;
use crate::scan::{FrameworkKind, ItemRef};

/// One external runner invocation: program followed by its arguments.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct CommandLine(Vec<String>);

impl CommandLine {
    pub fn new(argv: Vec<String>) -> Self {
        Self(argv)
    }

    pub fn program(&self) -> Option<&str> {
        self.0.first().map(String::as_str)
    }

    pub fn args(&self) -> &[String] {
        self.0.get(1..).unwrap_or(&[])
    }

    pub fn argv(&self) -> &[String] {
        &self.0
    }

    /// The last argument, which is the selected target.
    pub fn target(&self) -> Option<&str> {
        self.0.last().map(String::as_str)
    }
}

impl fmt::Display for CommandLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.join(" "))
    }
}

/// Builds runner commands for inventory items.
#[derive(Debug, Clone)]
pub struct CommandSynthesizer {
    config: CommandConfig,
}

impl CommandSynthesizer {
    pub fn new(config: CommandConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &CommandConfig {
        &self.config
    }

    /// Command running exactly one item (a class or a leaf).
    pub fn command_for(&self, item: ItemRef<'_>) -> CommandLine {
        match item.kind() {
            FrameworkKind::ClassBased => {
                let target = match item {
                    ItemRef::Class { module, class } => format!("{}.{}", module.module_path, class.name),
                    ItemRef::Function {
                        module,
                        class: Some(class),
                        function,
                    } => format!("{}.{}.{}", module.module_path, class.name, function.name),
                    ItemRef::Function {
                        module,
                        class: None,
                        function,
                    } => format!("{}.{}", module.module_path, function.name),
                };
                self.class_command(target)
            }
            FrameworkKind::FunctionBased => {
                let target = match item {
                    ItemRef::Class { module, class } => format!("{}::{}", module.path, class.name),
                    ItemRef::Function {
                        module,
                        class: Some(class),
                        function,
                    } => format!("{}::{}::{}", module.path, class.name, function.name),
                    ItemRef::Function {
                        module,
                        class: None,
                        function,
                    } => format!("{}::{}", module.path, function.name),
                };
                self.alt_command(target)
            }
        }
    }

    /// Command running every test of one framework kind.
    pub fn command_for_all(&self, kind: FrameworkKind) -> CommandLine {
        match kind {
            FrameworkKind::ClassBased => {
                let mut argv = self.class_prefix();
                argv.push("--pattern".to_string());
                argv.push(self.config.test_file_pattern.clone());
                CommandLine(argv)
            }
            FrameworkKind::FunctionBased => {
                self.alt_command(self.config.project_root.to_string_lossy().into_owned())
            }
        }
    }

    fn class_prefix(&self) -> Vec<String> {
        let mut argv = self.config.class_runner.clone();
        if self.config.verbose {
            argv.push("-v".to_string());
            argv.push("2".to_string());
        }
        argv
    }

    fn class_command(&self, target: String) -> CommandLine {
        let mut argv = self.class_prefix();
        argv.push(target);
        CommandLine(argv)
    }

    fn alt_command(&self, target: String) -> CommandLine {
        let mut argv = self.config.alt_runner.clone();
        if let Some(settings) = &self.config.settings_module {
            argv.push("--ds".to_string());
            argv.push(settings.clone());
        }
        if self.config.verbose {
            argv.push("-v".to_string());
        }
        argv.push(target);
        CommandLine(argv)
    }
}
