//! Named-arena lifecycle: allocate-and-name, look-up-by-name, and
//! free-by-name, plus `init_global`/`term_global` for the one conventional
//! arena name callers reach for by default.
//!
//! Ported from OpenFastPath/Marvell's shared-memory arena lifecycle
//! (`ofp_rt_lookup_alloc_shared_memory` / `_lookup_shared_memory` /
//! `_free_shared_memory` / `_init_global` / `_term_global`). The registry
//! here stands in for that shared-memory segment: one owning struct per
//! backing store, wrapped in a `std::sync::RwLock` so writers serialize
//! against each other while readers never block on a writer.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use crate::error::LpmError;
use crate::next_hop::NextHop;
use crate::store::{Capacities, Store};

/// The name the reference implementation gives its sole production arena;
/// preserved here as the conventional default for [`init_global`].
pub const GLOBAL_ARENA_NAME: &str = "OfpRtlookupMtrieShMem";

/// One named arena: the store callers mutate/query, plus the capacities it
/// was built with (needed only to rebuild it in place on `term_global`).
pub struct ArenaHandle<D> {
    capacities: Capacities,
    store: RwLock<Store<D>>,
}

impl<D> ArenaHandle<D> {
    pub fn store(&self) -> &RwLock<Store<D>> {
        &self.store
    }

    pub fn capacities(&self) -> Capacities {
        self.capacities
    }
}

/// A named collection of independently-lockable [`Store`]s. Each entry is
/// reference-counted so a looked-up handle keeps working after `free_named`
/// drops the registry's own reference, matching a shared-memory segment
/// that outlives an individual process's attach/detach.
pub struct ArenaRegistry<D> {
    arenas: RwLock<HashMap<String, Arc<ArenaHandle<D>>>>,
}

impl<D: NextHop> Default for ArenaRegistry<D> {
    fn default() -> Self {
        Self::new()
    }
}

impl<D: NextHop> ArenaRegistry<D> {
    pub fn new() -> Self {
        ArenaRegistry {
            arenas: RwLock::new(HashMap::new()),
        }
    }

    /// Builds a new named arena with its own `Store`, failing with
    /// `InitFailure` if the name is already registered.
    pub fn alloc_named(
        &self,
        name: &str,
        capacities: Capacities,
    ) -> Result<Arc<ArenaHandle<D>>, LpmError> {
        let mut arenas = self.arenas.write().expect("registry lock poisoned");
        if arenas.contains_key(name) {
            return Err(LpmError::InitFailure);
        }
        let arena = Arc::new(ArenaHandle {
            capacities,
            store: RwLock::new(Store::new(capacities)),
        });
        arenas.insert(name.to_string(), Arc::clone(&arena));
        Ok(arena)
    }

    /// Returns the named arena, if registered.
    pub fn lookup_named(&self, name: &str) -> Option<Arc<ArenaHandle<D>>> {
        let arenas = self.arenas.read().expect("registry lock poisoned");
        arenas.get(name).cloned()
    }

    /// Removes `name` from the registry. Existing clones of the handle
    /// remain valid until dropped, matching a detach that doesn't disturb
    /// processes still attached to the segment.
    pub fn free_named(&self, name: &str) -> Option<Arc<ArenaHandle<D>>> {
        let mut arenas = self.arenas.write().expect("registry lock poisoned");
        arenas.remove(name)
    }
}

/// Builds the well-known global arena under [`GLOBAL_ARENA_NAME`], matching
/// `ofp_rt_lookup_init_global`. Fails with `InitFailure` if it is already
/// initialized; call `term_global` first to rebuild it.
pub fn init_global<D: NextHop>(
    registry: &ArenaRegistry<D>,
    capacities: Capacities,
) -> Result<Arc<ArenaHandle<D>>, LpmError> {
    registry.alloc_named(GLOBAL_ARENA_NAME, capacities)
}

/// Drops the well-known global arena from the registry, matching
/// `ofp_rt_lookup_term_global`'s "zero the arena" contract: once this
/// returns, a fresh `init_global` call starts from empty pools again.
pub fn term_global<D: NextHop>(registry: &ArenaRegistry<D>) {
    registry.free_named(GLOBAL_ARENA_NAME);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Clone, Copy, Default, zerocopy::IntoBytes, zerocopy::Immutable)]
    #[repr(C)]
    struct Nh(u32);

    #[test]
    fn init_global_then_term_global_allows_reinit() {
        let registry = ArenaRegistry::<Nh>::new();
        let capacities = Capacities {
            ipv4_small: 16,
            ipv4_large: 2,
            ipv4_rules: 16,
            ipv6_nodes: 16,
        };
        let first = init_global(&registry, capacities).unwrap();
        assert!(init_global(&registry, capacities).is_err());
        assert!(registry.lookup_named(GLOBAL_ARENA_NAME).is_some());
        drop(first);

        term_global(&registry);
        assert!(registry.lookup_named(GLOBAL_ARENA_NAME).is_none());
        assert!(init_global(&registry, capacities).is_ok());
    }

    #[test]
    fn alloc_named_rejects_duplicate_names() {
        let registry = ArenaRegistry::<Nh>::new();
        let capacities = Capacities {
            ipv4_small: 16,
            ipv4_large: 2,
            ipv4_rules: 16,
            ipv6_nodes: 16,
        };
        registry.alloc_named("vrf-a", capacities).unwrap();
        let err = registry.alloc_named("vrf-a", capacities).unwrap_err();
        assert_eq!(err, LpmError::InitFailure);
        assert!(registry.free_named("vrf-a").is_some());
        assert!(registry.alloc_named("vrf-a", capacities).is_ok());
    }
}
