//! Registry of live wrapper objects bound to a context.
//!
//! The registry is an arena: each wrapper registers its native object id
//! together with an unbind callback and receives an [`ObjectKey`]. Slots are
//! reused through a free list; the key's generation makes a stale key from a
//! previous occupant harmless.
//!
//! At teardown [`ObjectRegistry::unbind_all`] consumes the arena and invokes
//! every remaining callback exactly once. Because it takes `self` by value
//! there is no way to walk the same entries twice.

use keyctx_engine::ObjectId;
use std::fmt;

/// Callback run once when the owning context tears down.
pub type UnbindFn = Box<dyn FnOnce(ObjectKey) + Send>;

/// Handle to a registry entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObjectKey {
    index: u32,
    generation: u32,
}

impl ObjectKey {
    /// Slot index.
    #[must_use]
    pub const fn index(self) -> u32 {
        self.index
    }

    /// Slot generation at registration time.
    #[must_use]
    pub const fn generation(self) -> u32 {
        self.generation
    }
}

struct Entry {
    native: Option<ObjectId>,
    unbind: UnbindFn,
}

struct Slot {
    generation: u32,
    entry: Option<Entry>,
}

/// Arena of registered wrapper objects.
#[derive(Default)]
pub struct ObjectRegistry {
    slots: Vec<Slot>,
    free: Vec<u32>,
    live: usize,
}

impl ObjectRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a wrapper and returns its key.
    pub fn insert(&mut self, native: Option<ObjectId>, unbind: UnbindFn) -> ObjectKey {
        let entry = Some(Entry { native, unbind });
        self.live += 1;
        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index as usize];
            slot.generation = slot.generation.wrapping_add(1);
            slot.entry = entry;
            return ObjectKey {
                index,
                generation: slot.generation,
            };
        }
        let index = u32::try_from(self.slots.len()).unwrap_or(u32::MAX);
        self.slots.push(Slot {
            generation: 0,
            entry,
        });
        ObjectKey {
            index,
            generation: 0,
        }
    }

    fn slot(&self, key: ObjectKey) -> Option<&Entry> {
        self.slots
            .get(key.index as usize)
            .filter(|slot| slot.generation == key.generation)
            .and_then(|slot| slot.entry.as_ref())
    }

    /// Removes an entry without running its callback.
    ///
    /// Returns false if the key is stale or already removed.
    pub fn remove(&mut self, key: ObjectKey) -> bool {
        let Some(slot) = self.slots.get_mut(key.index as usize) else {
            return false;
        };
        if slot.generation != key.generation || slot.entry.is_none() {
            return false;
        }
        slot.entry = None;
        self.free.push(key.index);
        self.live -= 1;
        true
    }

    /// Returns true if `key` refers to a live entry.
    #[must_use]
    pub fn contains(&self, key: ObjectKey) -> bool {
        self.slot(key).is_some()
    }

    /// Native object id recorded for `key`.
    #[must_use]
    pub fn native(&self, key: ObjectKey) -> Option<ObjectId> {
        self.slot(key).and_then(|entry| entry.native)
    }

    /// Number of live entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.live
    }

    /// Returns true if no entries are live.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.live == 0
    }

    /// Clears every entry's native handle and runs its unbind callback.
    ///
    /// Returns the number of callbacks invoked.
    pub fn unbind_all(self) -> usize {
        let mut count = 0;
        for (index, slot) in self.slots.into_iter().enumerate() {
            let Some(mut entry) = slot.entry else {
                continue;
            };
            entry.native = None;
            let key = ObjectKey {
                index: u32::try_from(index).unwrap_or(u32::MAX),
                generation: slot.generation,
            };
            (entry.unbind)(key);
            count += 1;
        }
        count
    }
}

impl fmt::Debug for ObjectRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObjectRegistry")
            .field("live", &self.live)
            .field("slots", &self.slots.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn counting(counter: &Arc<AtomicUsize>) -> UnbindFn {
        let counter = Arc::clone(counter);
        Box::new(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        })
    }

    #[test]
    fn insert_and_remove() {
        let counter = Arc::new(AtomicUsize::new(0));
        let mut registry = ObjectRegistry::new();

        let a = registry.insert(Some(ObjectId::new(1)), counting(&counter));
        let b = registry.insert(None, counting(&counter));
        assert_eq!(registry.len(), 2);
        assert_eq!(registry.native(a), Some(ObjectId::new(1)));
        assert_eq!(registry.native(b), None);

        assert!(registry.remove(a));
        assert!(!registry.remove(a));
        assert!(!registry.contains(a));
        assert_eq!(registry.len(), 1);
        assert_eq!(counter.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn stale_key_is_ignored() {
        let counter = Arc::new(AtomicUsize::new(0));
        let mut registry = ObjectRegistry::new();

        let old = registry.insert(None, counting(&counter));
        registry.remove(old);
        let new = registry.insert(Some(ObjectId::new(5)), counting(&counter));

        assert_eq!(old.index(), new.index());
        assert_ne!(old.generation(), new.generation());
        assert!(!registry.remove(old));
        assert!(registry.contains(new));
        assert_eq!(registry.native(new), Some(ObjectId::new(5)));
    }

    #[test]
    fn unbind_all_runs_each_callback_once() {
        let counter = Arc::new(AtomicUsize::new(0));
        let mut registry = ObjectRegistry::new();

        let keys: Vec<_> = (0..3)
            .map(|i| registry.insert(Some(ObjectId::new(i)), counting(&counter)))
            .collect();
        registry.remove(keys[1]);
        registry.insert(None, counting(&counter));

        assert_eq!(registry.unbind_all(), 3);
        assert_eq!(counter.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn unbind_callback_receives_its_key() {
        let seen = Arc::new(parking_lot::Mutex::new(Vec::new()));
        let mut registry = ObjectRegistry::new();

        let mut expected = Vec::new();
        for _ in 0..2 {
            let seen = Arc::clone(&seen);
            expected.push(registry.insert(None, Box::new(move |key| seen.lock().push(key))));
        }
        registry.unbind_all();

        assert_eq!(*seen.lock(), expected);
    }
}
