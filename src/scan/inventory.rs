//! Inventory tree produced by a scan.
//!
//! Ownership is strictly tree-shaped: an [`Inventory`] owns its modules, a
//! module owns its entries, a class owns its methods. Nodes are addressed from
//! the outside by [`ItemId`], never by reference, so a binding can outlive a
//! borrow of the tree without aliasing it.

use std::fmt;
use std::path::{Component, Path, PathBuf};

use serde::Serialize;
use testnav_core::lang::markers::MarkerId;

/// Which test convention a construct follows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FrameworkKind {
    /// Methods on a marker-derived class, run by the class runner.
    ClassBased,
    /// Standalone functions and grouping classes, run by the alternate runner.
    FunctionBased,
}

impl fmt::Display for FrameworkKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FrameworkKind::ClassBased => write!(f, "class-based"),
            FrameworkKind::FunctionBased => write!(f, "function-based"),
        }
    }
}

/// Which kinds the user asked to see.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KindScope {
    ClassBased,
    FunctionBased,
    Both,
}

impl KindScope {
    pub fn includes(self, kind: FrameworkKind) -> bool {
        match self {
            KindScope::ClassBased => kind == FrameworkKind::ClassBased,
            KindScope::FunctionBased => kind == FrameworkKind::FunctionBased,
            KindScope::Both => true,
        }
    }

    /// Kinds covered by this scope, class-based first.
    pub fn kinds(self) -> &'static [FrameworkKind] {
        match self {
            KindScope::ClassBased => &[FrameworkKind::ClassBased],
            KindScope::FunctionBased => &[FrameworkKind::FunctionBased],
            KindScope::Both => &[FrameworkKind::ClassBased, FrameworkKind::FunctionBased],
        }
    }
}

impl fmt::Display for KindScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KindScope::ClassBased => write!(f, "class-based"),
            KindScope::FunctionBased => write!(f, "function-based"),
            KindScope::Both => write!(f, "all"),
        }
    }
}

/// A leaf test: a standalone function or a method.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FunctionNode {
    pub name: String,
    pub kind: FrameworkKind,
    /// 1-based line of the `def`.
    pub line: usize,
    /// Resource-requirement tag taken from a marker decorator. Informational only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resource: Option<String>,
}

/// A class-like grouping node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClassNode {
    pub name: String,
    pub kind: FrameworkKind,
    pub line: usize,
    /// Marker ancestor named in the header, for class-based classes.
    #[serde(skip)]
    pub marker: Option<MarkerId>,
    pub methods: Vec<FunctionNode>,
}

/// A top-level construct inside a module, in source order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ModuleEntry {
    Class(ClassNode),
    Function(FunctionNode),
}

impl ModuleEntry {
    pub fn kind(&self) -> FrameworkKind {
        match self {
            ModuleEntry::Class(c) => c.kind,
            ModuleEntry::Function(f) => f.kind,
        }
    }
}

/// One scanned test file holding at least one recognized construct.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ModuleNode {
    /// Path relative to the project root, `/`-separated.
    pub path: String,
    /// Path shortened to at most two parent directories.
    pub display_path: String,
    /// Dotted import path (`pkg.mod.tests`).
    pub module_path: String,
    pub entries: Vec<ModuleEntry>,
}

impl ModuleNode {
    /// Build a module node for a root-relative file path.
    pub fn new(relative: &Path, entries: Vec<ModuleEntry>) -> Self {
        let path = slash_path(relative);
        Self {
            display_path: truncate_display_path(&path, 2),
            module_path: dotted_module_path(&path),
            path,
            entries,
        }
    }

    pub fn classes(&self) -> impl Iterator<Item = &ClassNode> {
        self.entries.iter().filter_map(|e| match e {
            ModuleEntry::Class(c) => Some(c),
            ModuleEntry::Function(_) => None,
        })
    }

    pub fn functions(&self) -> impl Iterator<Item = &FunctionNode> {
        self.entries.iter().filter_map(|e| match e {
            ModuleEntry::Function(f) => Some(f),
            ModuleEntry::Class(_) => None,
        })
    }
}

/// A non-fatal problem met while scanning one file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScanDiagnostic {
    pub path: PathBuf,
    pub line: Option<usize>,
    pub message: String,
}

impl fmt::Display for ScanDiagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.line {
            Some(line) => write!(f, "{}:{}: {}", self.path.display(), line, self.message),
            None => write!(f, "{}: {}", self.path.display(), self.message),
        }
    }
}

/// Address of a class-like or leaf node inside an [`Inventory`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ItemId {
    pub module: usize,
    pub entry: usize,
    /// Method index when the item is a method of the class at `entry`.
    pub method: Option<usize>,
}

/// A borrowed view of the node an [`ItemId`] points at.
#[derive(Debug, Clone, Copy)]
pub enum ItemRef<'a> {
    Class {
        module: &'a ModuleNode,
        class: &'a ClassNode,
    },
    Function {
        module: &'a ModuleNode,
        class: Option<&'a ClassNode>,
        function: &'a FunctionNode,
    },
}

impl ItemRef<'_> {
    pub fn kind(&self) -> FrameworkKind {
        match self {
            ItemRef::Class { class, .. } => class.kind,
            ItemRef::Function { function, .. } => function.kind,
        }
    }
}

/// The forest of discovered test-bearing modules.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Inventory {
    pub modules: Vec<ModuleNode>,
    pub diagnostics: Vec<ScanDiagnostic>,
}

impl Inventory {
    pub fn is_empty(&self) -> bool {
        self.modules.iter().all(|m| m.entries.is_empty())
    }

    /// Number of class-like nodes (each needs one class key).
    pub fn class_count(&self) -> usize {
        self.modules.iter().map(|m| m.classes().count()).sum()
    }

    /// Number of leaf test nodes (each needs one function key).
    pub fn function_count(&self) -> usize {
        self.modules
            .iter()
            .map(|m| m.functions().count() + m.classes().map(|c| c.methods.len()).sum::<usize>())
            .sum()
    }

    /// Number of leaf tests carrying a resource tag.
    pub fn tagged_count(&self) -> usize {
        self.modules
            .iter()
            .flat_map(|m| m.entries.iter())
            .map(|e| match e {
                ModuleEntry::Class(c) => c.methods.iter().filter(|f| f.resource.is_some()).count(),
                ModuleEntry::Function(f) => usize::from(f.resource.is_some()),
            })
            .sum()
    }

    /// Keep only the constructs of the requested kinds, dropping emptied modules.
    pub fn restrict(mut self, scope: KindScope) -> Self {
        for module in &mut self.modules {
            module.entries.retain(|e| scope.includes(e.kind()));
        }
        self.modules.retain(|m| !m.entries.is_empty());
        self
    }

    pub fn get(&self, id: ItemId) -> Option<ItemRef<'_>> {
        let module = self.modules.get(id.module)?;
        match (module.entries.get(id.entry)?, id.method) {
            (ModuleEntry::Class(class), None) => Some(ItemRef::Class { module, class }),
            (ModuleEntry::Class(class), Some(m)) => Some(ItemRef::Function {
                module,
                class: Some(class),
                function: class.methods.get(m)?,
            }),
            (ModuleEntry::Function(function), None) => Some(ItemRef::Function {
                module,
                class: None,
                function,
            }),
            (ModuleEntry::Function(_), Some(_)) => None,
        }
    }
}

/// Join path components with `/` regardless of platform.
///
/// Roots, prefixes and `.` are dropped, so the result is always relative.
pub fn slash_path(path: &Path) -> String {
    path.components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part.to_string_lossy()),
            Component::ParentDir => Some("..".into()),
            Component::RootDir | Component::Prefix(_) | Component::CurDir => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}

/// Keep at most `max_dirs` parent directories in front of the file name.
///
/// `machtms/backend/loads/tests.py` with `max_dirs = 2` becomes `backend/loads/tests.py`.
pub fn truncate_display_path(path: &str, max_dirs: usize) -> String {
    let parts: Vec<&str> = path.split('/').filter(|p| !p.is_empty()).collect();
    let keep = (max_dirs + 1).min(parts.len());
    parts[parts.len() - keep..].join("/")
}

/// `pkg/mod/tests.py` -> `pkg.mod.tests`
pub fn dotted_module_path(path: &str) -> String {
    let stem = path.strip_suffix(testnav_core::lang::conventions::SOURCE_EXTENSION).unwrap_or(path);
    stem.split('/').filter(|p| !p.is_empty()).collect::<Vec<_>>().join(".")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn leaf(name: &str, kind: FrameworkKind) -> FunctionNode {
        FunctionNode {
            name: name.to_string(),
            kind,
            line: 1,
            resource: None,
        }
    }

    fn sample() -> Inventory {
        let class = ClassNode {
            name: "LoadTestCase".to_string(),
            kind: FrameworkKind::ClassBased,
            line: 1,
            marker: Some(MarkerId::ApiTestCase),
            methods: vec![leaf("test_a", FrameworkKind::ClassBased), leaf("test_b", FrameworkKind::ClassBased)],
        };
        let standalone = leaf("test_c", FrameworkKind::FunctionBased);
        Inventory {
            modules: vec![ModuleNode::new(
                Path::new("machtms/backend/loads/tests.py"),
                vec![ModuleEntry::Class(class), ModuleEntry::Function(standalone)],
            )],
            diagnostics: Vec::new(),
        }
    }

    #[test]
    fn test_truncate_display_path() {
        assert_eq!(truncate_display_path("machtms/backend/loads/tests.py", 2), "backend/loads/tests.py");
        assert_eq!(truncate_display_path("loads/tests.py", 2), "loads/tests.py");
        assert_eq!(truncate_display_path("tests.py", 2), "tests.py");
    }

    #[test]
    fn test_dotted_module_path() {
        assert_eq!(dotted_module_path("machtms/backend/loads/tests.py"), "machtms.backend.loads.tests");
        assert_eq!(dotted_module_path("test_py_helpers.py"), "test_py_helpers");
    }

    #[cfg(unix)]
    #[test]
    fn test_slash_path_is_always_relative() {
        assert_eq!(slash_path(Path::new("/tmp/other/tests.py")), "tmp/other/tests.py");
        assert_eq!(slash_path(Path::new("./loads/tests.py")), "loads/tests.py");
        assert_eq!(dotted_module_path(&slash_path(Path::new("/tmp/other/tests.py"))), "tmp.other.tests");
    }

    #[test]
    fn test_module_paths() {
        let inv = sample();
        let module = &inv.modules[0];
        assert_eq!(module.path, "machtms/backend/loads/tests.py");
        assert_eq!(module.display_path, "backend/loads/tests.py");
        assert_eq!(module.module_path, "machtms.backend.loads.tests");
    }

    #[test]
    fn test_counts() {
        let inv = sample();
        assert_eq!(inv.class_count(), 1);
        assert_eq!(inv.function_count(), 3);
        assert_eq!(inv.tagged_count(), 0);
    }

    #[test]
    fn test_restrict_drops_other_kind() {
        let inv = sample().restrict(KindScope::ClassBased);
        assert_eq!(inv.function_count(), 2);
        let inv = sample().restrict(KindScope::FunctionBased);
        assert_eq!(inv.class_count(), 0);
        assert_eq!(inv.function_count(), 1);
    }

    #[test]
    fn test_restrict_drops_empty_modules() {
        let mut inv = sample();
        inv.modules[0].entries.truncate(1);
        let inv = inv.restrict(KindScope::FunctionBased);
        assert!(inv.modules.is_empty());
        assert!(inv.is_empty());
    }

    #[test]
    fn test_get_item() {
        let inv = sample();
        let method = inv
            .get(ItemId {
                module: 0,
                entry: 0,
                method: Some(1),
            })
            .unwrap();
        match method {
            ItemRef::Function { class, function, .. } => {
                assert_eq!(class.unwrap().name, "LoadTestCase");
                assert_eq!(function.name, "test_b");
            }
            ItemRef::Class { .. } => panic!("expected a method"),
        }
        assert!(
            inv.get(ItemId {
                module: 0,
                entry: 1,
                method: Some(0)
            })
            .is_none()
        );
    }
}
