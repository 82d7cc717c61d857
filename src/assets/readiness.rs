//! Readiness registry
//!
//! Maps handles to single-fulfillment signals so that any subsystem can
//! attach work to "when this handle is usable", whether the handle is
//! resolved, loading, or not requested yet. Entries are created lazily by
//! whichever side shows up first, the waiter or the producer.

use hecs::Entity;
use rustc_hash::FxHashMap;

use crate::assets::Handle;
use crate::assets::signal::Signal;

/// Value a ready handle resolves to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ready {
    /// A node in the scene: an instance root, the camera, or the light
    Node(Entity),
    /// The scene as a whole
    Everywhere,
}

impl Ready {
    /// The node this resolved to, if any
    #[must_use]
    pub fn entity(self) -> Option<Entity> {
        match self {
            Self::Node(entity) => Some(entity),
            Self::Everywhere => None,
        }
    }
}

/// Handle to readiness signal map
#[derive(Debug, Default)]
pub struct ReadinessRegistry {
    entries: FxHashMap<Handle, Signal<Ready>>,
}

impl ReadinessRegistry {
    /// Create an empty registry
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the entry for `handle`, creating a pending one if needed.
    ///
    /// The returned signal is a clone; settle or attach to it after
    /// releasing any borrow of the registry, since waiters may call back in.
    pub fn entry(&mut self, handle: &Handle) -> Signal<Ready> {
        self.entries.entry(handle.clone()).or_default().clone()
    }

    /// Get a pending entry to settle with a new value.
    ///
    /// A settled entry is replaced by a fresh one, for handles whose target can
    /// legitimately change (the active camera). Named instances never go
    /// through here.
    pub fn rebind(&mut self, handle: &Handle) -> Signal<Ready> {
        if self
            .entries
            .get(handle)
            .is_some_and(|signal| signal.is_settled())
        {
            self.entries.remove(handle);
        }
        self.entry(handle)
    }

    /// Remove the entry for `handle` if it has settled.
    ///
    /// Pending entries stay so their waiters can still be served by a later
    /// instance with the same name.
    pub fn forget_settled(&mut self, handle: &Handle) -> bool {
        let settled = self
            .entries
            .get(handle)
            .is_some_and(|signal| signal.is_settled());
        if settled {
            self.entries.remove(handle);
        }
        settled
    }

    /// Handles whose entries are still pending, sorted by name
    #[must_use]
    pub fn pending(&self) -> Vec<Handle> {
        let mut handles: Vec<Handle> = self
            .entries
            .iter()
            .filter(|(_, signal)| !signal.is_settled())
            .map(|(handle, _)| handle.clone())
            .collect();
        handles.sort_by_key(ToString::to_string);
        handles
    }

    /// Number of entries, pending and settled
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if there are no entries
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drop every entry. Pending listeners resolve to `Err(Dropped)` once no
    /// other clone of their signal is alive.
    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn entity() -> Entity {
        let mut world = hecs::World::new();
        world.spawn(())
    }

    #[test]
    fn test_entry_shared_between_waiter_and_producer() {
        let mut registry = ReadinessRegistry::new();
        let handle = Handle::named("t1");
        let node = entity();

        let seen = Rc::new(RefCell::new(None));
        let seen_clone = Rc::clone(&seen);
        registry
            .entry(&handle)
            .on_settle(move |ready| *seen_clone.borrow_mut() = Some(ready));

        registry.entry(&handle).settle(Ready::Node(node)).unwrap();
        assert_eq!(*seen.borrow(), Some(Ready::Node(node)));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_rebind_replaces_settled() {
        let mut registry = ReadinessRegistry::new();
        let first = entity();

        registry
            .rebind(&Handle::ActiveCamera)
            .settle(Ready::Node(first))
            .unwrap();
        let second = registry.rebind(&Handle::ActiveCamera);
        assert!(!second.is_settled());
    }

    #[test]
    fn test_forget_only_settled() {
        let mut registry = ReadinessRegistry::new();
        let pending = Handle::named("waiting");
        let done = Handle::named("done");

        registry.entry(&pending);
        registry.entry(&done).settle(Ready::Everywhere).unwrap();

        assert!(!registry.forget_settled(&pending));
        assert!(registry.forget_settled(&done));
        assert_eq!(registry.pending(), vec![pending]);
    }
}
