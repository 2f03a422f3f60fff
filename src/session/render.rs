//! Listing rendering
//!
//! ```text
//! backend/loads/tests.py:
//! [aaaa] LoadWriteSerializerTestCase
//!     <aaa> test_create_load_without_legs
//! <aad> test_standalone
//! ```

use serde::Serialize;
use testnav_core::lang::markers;

use crate::bind::Binding;
use crate::command::{CommandLine, CommandSynthesizer};
use crate::keys::{Key, PoolKind, PoolStats};
use crate::scan::{FrameworkKind, FunctionNode, ItemId, KindScope, ModuleEntry, ScanDiagnostic};

/// Render the bound inventory, one output line per element.
///
/// Entries keep source order, which is also key order. Modules are separated
/// by a blank line.
pub fn render_listing(binding: &Binding, show_tags: bool) -> Vec<String> {
    let mut lines = Vec::new();
    for (m, module) in binding.inventory().modules.iter().enumerate() {
        if m > 0 {
            lines.push(String::new());
        }
        lines.push(format!("{}:", module.display_path));
        for (e, entry) in module.entries.iter().enumerate() {
            let id = ItemId {
                module: m,
                entry: e,
                method: None,
            };
            match entry {
                ModuleEntry::Class(class) => {
                    lines.push(format!("[{}] {}", key_text(binding, id), class.name));
                    for (k, method) in class.methods.iter().enumerate() {
                        let key = key_text(binding, ItemId { method: Some(k), ..id });
                        lines.push(format!("    <{}> {}", key, leaf_label(method, show_tags)));
                    }
                }
                ModuleEntry::Function(function) => {
                    lines.push(format!("<{}> {}", key_text(binding, id), leaf_label(function, show_tags)));
                }
            }
        }
    }
    lines
}

fn key_text(binding: &Binding, id: ItemId) -> &str {
    binding.key_for(id).map(Key::as_str).unwrap_or("?")
}

fn leaf_label(function: &FunctionNode, show_tags: bool) -> String {
    match (&function.resource, show_tags) {
        (Some(tag), true) => format!("{} [{}]", function.name, short_tag(tag)),
        _ => function.name.clone(),
    }
}

/// `django_db` is shown as `db`.
fn short_tag(tag: &str) -> &str {
    tag.rsplit('_').next().unwrap_or(tag)
}

pub fn summary_line(binding: &Binding) -> String {
    let inventory = binding.inventory();
    format!(
        "Found {} test classes, {} test functions",
        inventory.class_count(),
        inventory.function_count()
    )
}

pub fn pool_stats_line(kind: PoolKind, stats: PoolStats) -> String {
    format!(
        "{kind} keys: {} issued, {} remaining of {}",
        stats.issued, stats.remaining, stats.capacity
    )
}

// ============================================================================
// JSON listing
// ============================================================================

#[derive(Debug, Serialize)]
pub struct ListingJson<'a> {
    pub scope: String,
    pub modules: Vec<ModuleJson<'a>>,
    pub class_keys: PoolStats,
    pub function_keys: PoolStats,
    pub diagnostics: &'a [ScanDiagnostic],
}

#[derive(Debug, Serialize)]
pub struct ModuleJson<'a> {
    pub path: &'a str,
    pub display_path: &'a str,
    pub module_path: &'a str,
    pub items: Vec<ItemJson<'a>>,
}

#[derive(Debug, Serialize)]
pub struct ItemJson<'a> {
    pub key: Option<&'a Key>,
    pub pool: PoolKind,
    pub name: &'a str,
    pub framework: FrameworkKind,
    pub line: usize,
    /// Canonical marker ancestor of a class-based class.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub marker: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resource: Option<&'a str>,
    pub command: Option<CommandLine>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub methods: Vec<ItemJson<'a>>,
}

/// Structured form of the listing, with the command each key would run.
pub fn listing_json<'a>(binding: &'a Binding, synthesizer: &CommandSynthesizer, scope: KindScope) -> ListingJson<'a> {
    let inventory = binding.inventory();
    let leaf = |id: ItemId, function: &'a FunctionNode| ItemJson {
        key: binding.key_for(id),
        pool: PoolKind::Function,
        name: &function.name,
        framework: function.kind,
        line: function.line,
        marker: None,
        resource: function.resource.as_deref(),
        command: binding.inventory().get(id).map(|item| synthesizer.command_for(item)),
        methods: Vec::new(),
    };

    let modules = inventory
        .modules
        .iter()
        .enumerate()
        .map(|(m, module)| ModuleJson {
            path: &module.path,
            display_path: &module.display_path,
            module_path: &module.module_path,
            items: module
                .entries
                .iter()
                .enumerate()
                .map(|(e, entry)| {
                    let id = ItemId {
                        module: m,
                        entry: e,
                        method: None,
                    };
                    match entry {
                        ModuleEntry::Class(class) => ItemJson {
                            key: binding.key_for(id),
                            pool: PoolKind::Class,
                            name: &class.name,
                            framework: class.kind,
                            line: class.line,
                            marker: class.marker.map(markers::as_str),
                            resource: None,
                            command: inventory.get(id).map(|item| synthesizer.command_for(item)),
                            methods: class
                                .methods
                                .iter()
                                .enumerate()
                                .map(|(k, method)| leaf(ItemId { method: Some(k), ..id }, method))
                                .collect(),
                        },
                        ModuleEntry::Function(function) => leaf(id, function),
                    }
                })
                .collect(),
        })
        .collect();

    ListingJson {
        scope: scope.to_string(),
        modules,
        class_keys: binding.pool_stats(PoolKind::Class),
        function_keys: binding.pool_stats(PoolKind::Function),
        diagnostics: &inventory.diagnostics,
    }
}
