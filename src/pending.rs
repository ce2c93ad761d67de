use std::sync::Mutex;

use crate::tag::TagKey;

/// Tags that have been registered but not yet sent to the backing store.
/// Every tag here is also present in the [`crate::registry::HandleRegistry`];
/// a flush drains this queue exactly once per round trip.
pub(crate) struct PendingQueue {
    tags: Mutex<Vec<TagKey>>,
}

impl PendingQueue {
    pub(crate) fn new() -> Self {
        Self { tags: Mutex::new(Vec::new()) }
    }

    pub(crate) fn push(&self, tag_key: TagKey) {
        self.tags.lock().unwrap().push(tag_key);
    }

    /// Atomically empties the queue and returns what it held, preserving
    /// insertion order.
    pub(crate) fn drain(&self) -> Vec<TagKey> {
        std::mem::take(&mut *self.tags.lock().unwrap())
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.tags.lock().unwrap().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drain_empties_and_preserves_order() {
        let queue = PendingQueue::new();
        queue.push(TagKey::value("a"));
        queue.push(TagKey::value("b"));
        assert_eq!(queue.len(), 2);

        let drained = queue.drain();
        assert_eq!(drained, vec![TagKey::value("a"), TagKey::value("b")]);
        assert_eq!(queue.len(), 0);
    }
}
