//! Test inventory scanning
//!
//! Walks a directory tree, picks the files that follow the test-file naming
//! rules, and runs the [`source`] recognizer over each one. A file that cannot
//! be read or scanned becomes a [`ScanDiagnostic`]; the walk always continues.
//!
//! ## Module Structure
//!
//! - `inventory` - Inventory tree types (modules, classes, functions, ids)
//! - `source` - Single-pass recognizer for one source text

pub mod inventory;
pub mod source;

pub use inventory::{
    ClassNode, FrameworkKind, FunctionNode, Inventory, ItemId, ItemRef, KindScope, ModuleEntry, ModuleNode,
    ScanDiagnostic,
};
pub use source::{SourceError, scan_source};

use std::fs;
use std::path::{Path, PathBuf};

use ignore::WalkBuilder;
use testnav_core::lang::conventions::is_test_file_name;

use crate::config::ScanConfig;

/// Find candidate test files under `search_root`, in sorted path order.
///
/// Excluded and hidden directories are pruned, not just filtered, so their
/// contents are never visited.
pub fn discover_test_files(search_root: &Path, config: &ScanConfig) -> (Vec<PathBuf>, Vec<ScanDiagnostic>) {
    let mut files = Vec::new();
    let mut diagnostics = Vec::new();

    if search_root.is_file() {
        if search_root
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(is_test_file_name)
        {
            files.push(search_root.to_path_buf());
        }
        return (files, diagnostics);
    }

    let filter_config = config.clone();
    let mut builder = WalkBuilder::new(search_root);
    builder
        .standard_filters(false)
        .follow_links(false)
        .sort_by_file_name(|a, b| a.cmp(b))
        .filter_entry(move |entry| {
            if entry.depth() == 0 || !entry.file_type().is_some_and(|t| t.is_dir()) {
                return true;
            }
            entry
                .file_name()
                .to_str()
                .is_none_or(|name| !filter_config.is_excluded_dir(name))
        });

    for result in builder.build() {
        match result {
            Ok(entry) => {
                if !entry.file_type().is_some_and(|t| t.is_file()) {
                    continue;
                }
                let is_test = entry.file_name().to_str().is_some_and(is_test_file_name);
                if is_test {
                    files.push(entry.into_path());
                }
            }
            Err(err) => {
                tracing::warn!("Failed to read directory entry: {err}");
                diagnostics.push(ScanDiagnostic {
                    path: search_root.to_path_buf(),
                    line: None,
                    message: err.to_string(),
                });
            }
        }
    }

    files.sort();
    (files, diagnostics)
}

/// Scan every test file under `search_root`; paths are reported relative to `project_root`.
///
/// Modules keep file order; entries keep source order. Files without any
/// recognized construct are left out.
#[tracing::instrument(skip_all, fields(root = %search_root.display()))]
pub fn scan(project_root: &Path, search_root: &Path, config: &ScanConfig) -> Inventory {
    let (files, mut diagnostics) = discover_test_files(search_root, config);
    let mut modules = Vec::new();
    let mut scanned_bytes = 0usize;

    for path in &files {
        tracing::debug!(path = %path.display(), "scanning");
        let source = match fs::read_to_string(path) {
            Ok(source) => source,
            Err(err) => {
                tracing::warn!(path = %path.display(), "unreadable test file: {err}");
                diagnostics.push(ScanDiagnostic {
                    path: path.clone(),
                    line: None,
                    message: format!("Failed to read file: {err}"),
                });
                continue;
            }
        };
        scanned_bytes += source.len();

        match scan_source(&source, config) {
            Ok(entries) if entries.is_empty() => {}
            Ok(entries) => {
                let relative = path.strip_prefix(project_root).unwrap_or(path);
                modules.push(ModuleNode::new(relative, entries));
            }
            Err(err) => {
                tracing::warn!(path = %path.display(), line = err.line, "skipping malformed file: {}", err.message);
                diagnostics.push(ScanDiagnostic {
                    path: path.clone(),
                    line: Some(err.line),
                    message: err.message,
                });
            }
        }
    }

    tracing::info!(
        files = files.len(),
        modules = modules.len(),
        bytes = scanned_bytes,
        diagnostics = diagnostics.len(),
        "scan complete"
    );

    Inventory { modules, diagnostics }
}
