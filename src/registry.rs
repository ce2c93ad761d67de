use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::handle::HandleSlot;
use crate::tag::TagKey;

/// Maps `TagKey` to its (possibly still-unresolved) `HandleSlot`.
///
/// The registration primitive is `register`, which returns the installed
/// slot along with whether this call was the one that installed it. Holding
/// the map's mutex for the whole "does it exist? if not, install" sequence
/// gives a compare-and-set guarantee without needing an atomic CAS
/// instruction: exactly one caller observes `wasNew = true` for a given tag,
/// for the lifetime of the reader.
pub(crate) struct HandleRegistry {
    slots: Mutex<HashMap<TagKey, Arc<HandleSlot>>>,
}

impl HandleRegistry {
    pub(crate) fn new() -> Self {
        Self { slots: Mutex::new(HashMap::new()) }
    }

    /// Returns the slot for `tag_key`, installing `make` as its value if
    /// none exists yet. `wasNew` is `true` only for the caller whose `make`
    /// closure is actually used.
    pub(crate) fn register(
        &self,
        tag_key: TagKey,
        make: impl FnOnce() -> Arc<HandleSlot>,
    ) -> (Arc<HandleSlot>, bool) {
        let mut slots = self.slots.lock().unwrap();
        match slots.entry(tag_key) {
            Entry::Occupied(existing) => (existing.get().clone(), false),
            Entry::Vacant(vacant) => {
                let slot = make();
                vacant.insert(slot.clone());
                (slot, true)
            }
        }
    }

    pub(crate) fn get(&self, tag_key: &TagKey) -> Option<Arc<HandleSlot>> {
        self.slots.lock().unwrap().get(tag_key).cloned()
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.slots.lock().unwrap().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handle::ReaderHandle;
    use crate::error::ReaderError;

    struct NoFlush;
    impl ReaderHandle for NoFlush {
        fn flush(&self) -> Result<(), ReaderError> {
            Ok(())
        }
    }

    #[test]
    fn second_registration_reuses_slot() {
        let owner: Arc<dyn ReaderHandle> = Arc::new(NoFlush);
        let registry = HandleRegistry::new();
        let tag_key = TagKey::watermark("k1");

        let (slot_a, new_a) = registry
            .register(tag_key.clone(), || HandleSlot::new_watermark(Arc::downgrade(&owner)));
        assert!(new_a);

        let (slot_b, new_b) = registry
            .register(tag_key, || HandleSlot::new_watermark(Arc::downgrade(&owner)));
        assert!(!new_b);
        assert!(Arc::ptr_eq(&slot_a, &slot_b));
        assert_eq!(registry.len(), 1);
    }
}
