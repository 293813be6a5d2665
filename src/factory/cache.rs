use crate::container::container::Container;
use crate::object::types::Reference;

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Called synchronously for each evicted container, outside the cache lock.
pub type EvictionCallback = Box<dyn Fn(&Reference, &Arc<Container>) + Send + Sync>;

struct Slot {
    container: Arc<Container>,
    last_used: u64,
}

struct CacheState {
    slots: HashMap<Reference, Slot>,
    tick: u64,
}

/// Bounded map of live containers with least-recently-used eviction.
///
/// One mutex guards the whole structure: get-or-install plus the eviction
/// decision must be a single critical section, otherwise two racing
/// acquisitions could both install. The callback runs after the lock is
/// released so it may touch the cache again.
pub struct ContainerCache {
    capacity: usize,
    state: Mutex<CacheState>,
    on_evict: EvictionCallback,
}

impl ContainerCache {
    pub fn new(capacity: usize, on_evict: EvictionCallback) -> Self {
        Self {
            capacity: capacity.max(1),
            state: Mutex::new(CacheState {
                slots: HashMap::new(),
                tick: 0,
            }),
            on_evict,
        }
    }

    fn locked(&self) -> MutexGuard<'_, CacheState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Looks up a live container, marking it most recently used.
    pub fn get(&self, reference: &Reference) -> Option<Arc<Container>> {
        let mut state = self.locked();
        state.tick += 1;
        let tick = state.tick;

        state.slots.get_mut(reference).map(|slot| {
            slot.last_used = tick;
            slot.container.clone()
        })
    }

    /// Installs a container unless one is already registered for the
    /// reference; returns whichever container won. A loser's candidate is
    /// simply dropped by the caller.
    ///
    /// Installing over capacity evicts least-recently-used slots first; the
    /// just-installed container is never the victim.
    pub fn insert_if_absent(
        &self,
        reference: Reference,
        container: Arc<Container>,
    ) -> Arc<Container> {
        let mut evicted = Vec::new();

        let winner = {
            let mut state = self.locked();
            state.tick += 1;
            let tick = state.tick;

            if let Some(slot) = state.slots.get_mut(&reference) {
                slot.last_used = tick;
                slot.container.clone()
            } else {
                state.slots.insert(
                    reference,
                    Slot {
                        container: container.clone(),
                        last_used: tick,
                    },
                );

                while state.slots.len() > self.capacity {
                    let oldest = state
                        .slots
                        .iter()
                        .min_by_key(|(_, slot)| slot.last_used)
                        .map(|(reference, _)| reference.clone());

                    match oldest {
                        Some(reference) => {
                            if let Some(slot) = state.slots.remove(&reference) {
                                evicted.push((reference, slot.container));
                            }
                        }
                        None => break,
                    }
                }

                container
            }
        };

        for (reference, container) in evicted {
            (self.on_evict)(&reference, &container);
        }

        winner
    }

    /// Removes a container. Returns it when one was registered.
    pub fn remove(&self, reference: &Reference) -> Option<Arc<Container>> {
        self.locked()
            .slots
            .remove(reference)
            .map(|slot| slot.container)
    }

    pub fn contains(&self, reference: &Reference) -> bool {
        self.locked().slots.contains_key(reference)
    }

    pub fn len(&self) -> usize {
        self.locked().slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locked().slots.is_empty()
    }
}
