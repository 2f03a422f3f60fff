//! Key binding
//!
//! Assigns one class-pool key to every class-like node and one function-pool
//! key to every leaf test. The walk order is fixed (modules by display path,
//! then source order inside each module), so the same tree and fresh pools
//! always give the same keys.

use std::collections::HashMap;

use crate::keys::{Key, KeyPool, PoolExhausted, PoolKind, PoolStats};
use crate::scan::{Inventory, ItemId, ItemRef, ModuleEntry};

/// Bidirectional key <-> item map over an owned inventory.
#[derive(Debug, Clone)]
pub struct Binding {
    inventory: Inventory,
    by_key: HashMap<Key, ItemId>,
    by_item: HashMap<ItemId, Key>,
    class_stats: PoolStats,
    function_stats: PoolStats,
}

impl Binding {
    /// The bound inventory, modules in binding order.
    pub fn inventory(&self) -> &Inventory {
        &self.inventory
    }

    /// Resolve a typed key to the item it runs.
    pub fn lookup(&self, key: &str) -> Option<ItemRef<'_>> {
        let id = self.by_key.get(key)?;
        self.inventory.get(*id)
    }

    pub fn key_for(&self, id: ItemId) -> Option<&Key> {
        self.by_item.get(&id)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.by_key.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.by_key.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_key.is_empty()
    }

    /// Pool counters as they stood right after binding.
    pub fn pool_stats(&self, kind: PoolKind) -> PoolStats {
        match kind {
            PoolKind::Class => self.class_stats,
            PoolKind::Function => self.function_stats,
        }
    }
}

/// Bind every node of `inventory`, drawing from the two pools.
///
/// On exhaustion nothing is returned but the error, whose `requested` field
/// counts the keys of that kind still needed at the point of failure.
#[tracing::instrument(skip_all, fields(modules = inventory.modules.len()))]
pub fn bind(
    mut inventory: Inventory,
    class_pool: &mut KeyPool,
    function_pool: &mut KeyPool,
) -> Result<Binding, PoolExhausted> {
    inventory
        .modules
        .sort_by(|a, b| a.display_path.cmp(&b.display_path).then_with(|| a.path.cmp(&b.path)));

    let mut need_class = inventory.class_count() as u64;
    let mut need_function = inventory.function_count() as u64;

    let mut by_key = HashMap::new();
    let mut by_item = HashMap::new();
    let mut assign = |pool: &mut KeyPool, needed: &mut u64, id: ItemId| -> Result<(), PoolExhausted> {
        let key = pool.next_key().map_err(|e| PoolExhausted {
            requested: *needed,
            ..e
        })?;
        *needed -= 1;
        by_key.insert(key.clone(), id);
        by_item.insert(id, key);
        Ok(())
    };

    for (m, module) in inventory.modules.iter().enumerate() {
        for (e, entry) in module.entries.iter().enumerate() {
            let id = ItemId {
                module: m,
                entry: e,
                method: None,
            };
            match entry {
                ModuleEntry::Class(class) => {
                    assign(class_pool, &mut need_class, id)?;
                    for k in 0..class.methods.len() {
                        let method = ItemId { method: Some(k), ..id };
                        assign(function_pool, &mut need_function, method)?;
                    }
                }
                ModuleEntry::Function(_) => assign(function_pool, &mut need_function, id)?,
            }
        }
    }

    tracing::info!(keys = by_key.len(), "binding complete");

    Ok(Binding {
        inventory,
        by_key,
        by_item,
        class_stats: class_pool.stats(),
        function_stats: function_pool.stats(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ScanConfig;
    use crate::scan::{FrameworkKind, ModuleNode, scan_source};
    use std::collections::HashSet;
    use std::path::Path;

    fn inventory(files: &[(&str, &str)]) -> Inventory {
        let config = ScanConfig::default();
        Inventory {
            modules: files
                .iter()
                .map(|(path, src)| ModuleNode::new(Path::new(path), scan_source(src, &config).unwrap()))
                .collect(),
            diagnostics: Vec::new(),
        }
    }

    fn pools() -> (KeyPool, KeyPool) {
        (KeyPool::for_kind(PoolKind::Class), KeyPool::for_kind(PoolKind::Function))
    }

    const LOADS: &str = "class LoadWriteSerializerTestCase(APITestCase):\n    def test_create_load_without_legs(self):\n        pass\n    def test_create_load_with_single_leg_no_stops(self):\n        pass\n";

    #[test]
    fn test_single_class_gets_first_keys() {
        let (mut cp, mut fp) = pools();
        let binding = bind(inventory(&[("loads/tests.py", LOADS)]), &mut cp, &mut fp).unwrap();

        match binding.lookup("aaaa").unwrap() {
            ItemRef::Class { class, .. } => assert_eq!(class.name, "LoadWriteSerializerTestCase"),
            ItemRef::Function { .. } => panic!("expected class"),
        }
        match binding.lookup("aaa").unwrap() {
            ItemRef::Function { function, .. } => assert_eq!(function.name, "test_create_load_without_legs"),
            ItemRef::Class { .. } => panic!("expected method"),
        }
        match binding.lookup("aas").unwrap() {
            ItemRef::Function { function, .. } => {
                assert_eq!(function.name, "test_create_load_with_single_leg_no_stops")
            }
            ItemRef::Class { .. } => panic!("expected method"),
        }
        assert_eq!(binding.len(), 3);
        assert!(binding.lookup("aad").is_none());
    }

    #[test]
    fn test_modules_bound_in_display_path_order() {
        let (mut cp, mut fp) = pools();
        let binding = bind(
            inventory(&[("zeta/test_z.py", "def test_z():\n    pass\n"), ("alpha/test_a.py", "def test_a():\n    pass\n")]),
            &mut cp,
            &mut fp,
        )
        .unwrap();
        assert_eq!(binding.inventory().modules[0].path, "alpha/test_a.py");
        match binding.lookup("aaa").unwrap() {
            ItemRef::Function { function, .. } => assert_eq!(function.name, "test_a"),
            ItemRef::Class { .. } => panic!("expected function"),
        }
    }

    #[test]
    fn test_binding_is_injective_and_total() {
        let (mut cp, mut fp) = pools();
        let inv = inventory(&[
            ("a/tests.py", LOADS),
            ("b/test_b.py", "class TestB:\n    def test_1(self):\n        pass\n\n    def test_2(self):\n        pass\n\ndef test_3():\n    pass\n"),
        ]);
        let classes = inv.class_count();
        let leaves = inv.function_count();
        let binding = bind(inv, &mut cp, &mut fp).unwrap();

        assert_eq!(binding.len(), classes + leaves);
        let ids: HashSet<ItemId> = binding.by_key.values().copied().collect();
        assert_eq!(ids.len(), binding.len());
        for (key, id) in &binding.by_key {
            assert_eq!(binding.key_for(*id), Some(key));
            let expected_len = if id.method.is_none()
                && matches!(binding.inventory().get(*id), Some(ItemRef::Class { .. }))
            {
                4
            } else {
                3
            };
            assert_eq!(key.as_str().len(), expected_len);
        }
        assert_eq!(binding.pool_stats(PoolKind::Class).issued, classes as u64);
        assert_eq!(binding.pool_stats(PoolKind::Function).issued, leaves as u64);
    }

    #[test]
    fn test_kinds_survive_binding() {
        let (mut cp, mut fp) = pools();
        let binding = bind(inventory(&[("a/tests.py", LOADS)]), &mut cp, &mut fp).unwrap();
        assert_eq!(binding.lookup("aaa").unwrap().kind(), FrameworkKind::ClassBased);
    }

    #[test]
    fn test_exhaustion_reports_remaining_need() {
        let mut cp = KeyPool::for_kind(PoolKind::Class);
        let mut fp = KeyPool::new(PoolKind::Function, 1);
        let src: String = (0..10).map(|i| format!("def test_{i}():\n    pass\n")).collect();
        let err = bind(inventory(&[("test_many.py", &src)]), &mut cp, &mut fp).unwrap_err();
        assert_eq!(err.kind, PoolKind::Function);
        assert_eq!(err.capacity, 8);
        assert_eq!(err.requested, 2);
    }
}
