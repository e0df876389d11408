//! # Material Registry
//!
//! Maps human-readable material names to opaque material-instance handles.
//! Mesh assembly looks up every part's material name here.
//!
//! ```text
//! "Wood"            -> handle A
//! "Stone"           -> handle B
//! "DefaultMaterial" -> handle C   (used for unmatched parts)
//! ```
//!
//! The registry stores handles only; it never owns or frees the materials
//! behind them.
//!
//! ## Concurrency
//!
//! The registry is not internally synchronized. Share it by reference for
//! concurrent reads; wrap it in a lock if it must be mutated while other
//! threads read it.

use std::collections::btree_map;
use std::collections::BTreeMap;

/// Name under which a registry-wide default material is conventionally
/// registered.
pub const DEFAULT_MATERIAL_NAME: &str = "DefaultMaterial";

/// Name → material-handle table.
///
/// Keys are unique; registering a name again replaces its handle. Iteration
/// is sorted by name. `Clone` produces an independent copy of the table and
/// `std::mem::take` moves it out, leaving an empty registry behind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MaterialRegistry<M> {
    entries: BTreeMap<String, M>,
}

impl<M> Default for MaterialRegistry<M> {
    fn default() -> Self {
        Self::new()
    }
}

impl<M> MaterialRegistry<M> {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: BTreeMap::new(),
        }
    }

    /// Maps `name` to `handle`, returning the handle it replaced.
    ///
    /// The empty name never resolves, so it is not stored and `None` is
    /// returned.
    pub fn register(&mut self, name: impl Into<String>, handle: M) -> Option<M> {
        let name = name.into();
        if name.is_empty() {
            return None;
        }
        self.entries.insert(name, handle)
    }

    /// Removes `name`. Returns the removed handle, or `None` if the name was
    /// not registered.
    pub fn unregister(&mut self, name: &str) -> Option<M> {
        self.entries.remove(name)
    }

    /// Removes every entry. The registry stays usable.
    pub fn unregister_all(&mut self) {
        self.entries.clear();
    }

    /// Handle registered under `name`. Always `None` for the empty name.
    #[inline]
    #[must_use]
    pub fn lookup(&self, name: &str) -> Option<&M> {
        if name.is_empty() {
            return None;
        }
        self.entries.get(name)
    }

    /// Whether `name` is registered.
    #[inline]
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.lookup(name).is_some()
    }

    /// Number of registered names.
    #[inline]
    #[must_use]
    pub fn count(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing is registered.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterates `(name, handle)` pairs in name order.
    pub fn iter(&self) -> btree_map::Iter<'_, String, M> {
        self.entries.iter()
    }

    /// Registered names in order.
    pub fn names(&self) -> impl Iterator<Item = &str> + '_ {
        self.entries.keys().map(String::as_str)
    }

    /// Registered handles, in name order.
    pub fn handles(&self) -> impl Iterator<Item = &M> + '_ {
        self.entries.values()
    }
}

impl<M: Clone> MaterialRegistry<M> {
    /// Snapshot of every `(name, handle)` pair, in name order.
    #[must_use]
    pub fn registered_materials(&self) -> Vec<(String, M)> {
        self.entries
            .iter()
            .map(|(name, handle)| (name.clone(), handle.clone()))
            .collect()
    }
}

impl<'a, M> IntoIterator for &'a MaterialRegistry<M> {
    type Item = (&'a String, &'a M);
    type IntoIter = btree_map::Iter<'a, String, M>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<N: Into<String>, M> FromIterator<(N, M)> for MaterialRegistry<M> {
    fn from_iter<I: IntoIterator<Item = (N, M)>>(iter: I) -> Self {
        Self {
            entries: iter
                .into_iter()
                .map(|(name, handle)| (name.into(), handle))
                .filter(|(name, _)| !name.is_empty())
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_overwrites() {
        let mut registry = MaterialRegistry::new();
        assert_eq!(registry.register("Wood", 1u32), None);
        assert_eq!(registry.register("Wood", 2), Some(1));
        assert_eq!(registry.lookup("Wood"), Some(&2));
        assert_eq!(registry.count(), 1);
    }

    #[test]
    fn test_unregister_then_lookup() {
        let mut registry = MaterialRegistry::new();
        registry.register("Stone", 7u32);
        assert_eq!(registry.unregister("Stone"), Some(7));
        assert_eq!(registry.lookup("Stone"), None);
        // Unknown name is a no-op.
        assert_eq!(registry.unregister("Stone"), None);
    }

    #[test]
    fn test_unregister_all_keeps_registry_usable() {
        let mut registry: MaterialRegistry<u32> =
            [("a", 1), ("b", 2), ("c", 3)].into_iter().collect();
        registry.unregister_all();
        assert_eq!(registry.count(), 0);
        assert!(registry.is_empty());
        registry.register("d", 4);
        assert_eq!(registry.lookup("d"), Some(&4));
    }

    #[test]
    fn test_empty_name_never_matches() {
        let mut registry = MaterialRegistry::new();
        assert_eq!(registry.register("", 1u32), None);
        assert_eq!(registry.register("", 2), None);
        assert_eq!(registry.lookup(""), None);
        assert!(!registry.contains(""));
        assert_eq!(registry.count(), 0);

        let collected: MaterialRegistry<u32> = [("", 1), ("Wood", 2)].into_iter().collect();
        assert_eq!(collected.names().collect::<Vec<_>>(), ["Wood"]);
    }

    #[test]
    fn test_enumeration_is_sorted() {
        let registry: MaterialRegistry<u32> =
            [("Stone", 2), ("DefaultMaterial", 0), ("Wood", 1)].into_iter().collect();
        assert_eq!(
            registry.names().collect::<Vec<_>>(),
            vec!["DefaultMaterial", "Stone", "Wood"]
        );
        assert_eq!(registry.handles().copied().collect::<Vec<_>>(), vec![0, 2, 1]);
        assert_eq!(registry.registered_materials()[2], ("Wood".to_string(), 1));
        assert_eq!((&registry).into_iter().count(), 3);
    }

    #[test]
    fn test_clone_is_independent() {
        let mut original = MaterialRegistry::new();
        original.register("Wood", 1u32);
        let mut copy = original.clone();
        copy.register("Stone", 2);
        copy.unregister("Wood");
        assert_eq!(original.lookup("Wood"), Some(&1));
        assert_eq!(original.lookup("Stone"), None);
        assert_eq!(copy.count(), 1);
    }

    #[test]
    fn test_take_leaves_empty_registry() {
        let mut source = MaterialRegistry::new();
        source.register(DEFAULT_MATERIAL_NAME, 9u32);
        let moved = std::mem::take(&mut source);
        assert!(source.is_empty());
        assert_eq!(moved.lookup(DEFAULT_MATERIAL_NAME), Some(&9));
    }
}
