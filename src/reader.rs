use std::any::Any;
use std::collections::HashMap;
use std::marker::PhantomData;
use std::sync::{Arc, Mutex, Weak};

use tracing::{span, Level};

use crate::backing_store::BackingStore;
use crate::binding::ReaderBinding;
use crate::error::{DecodeError, ReaderError};
use crate::handle::{HandleSlot, ListHandle, ReaderHandle, ValueHandle, WatermarkHandle};
use crate::pending::PendingQueue;
use crate::registry::HandleRegistry;
use crate::request::build_request;
use crate::response::{consume_response, Outstanding};
#[cfg(feature = "stats")]
use crate::stats::ReaderStats;
use crate::tag::{TagKey, TagKind};
use crate::wire::Payload;

/// Holds the `(computation, key, workToken)` binding for one logical unit of
/// work and exposes the three handle factories plus `flush`.
///
/// `Reader` is cheap to clone: it is a thin handle around the shared
/// `ReaderInner`, so handing a clone to another thread (registering handles
/// concurrently) does not duplicate the registry or pending queue.
pub struct Reader<B: BackingStore> {
    inner: Arc<ReaderInner<B>>,
}

impl<B: BackingStore> Clone for Reader<B> {
    fn clone(&self) -> Self {
        Self { inner: self.inner.clone() }
    }
}

pub(crate) struct ReaderInner<B: BackingStore> {
    binding: ReaderBinding,
    backing_store: B,
    registry: HandleRegistry,
    pending: PendingQueue,
    /// Serializes concurrent `flush()` calls: the second one in simply
    /// finds an empty pending queue and returns.
    flush_lock: Mutex<()>,
    #[cfg(feature = "stats")]
    stats: Mutex<ReaderStats>,
}

impl<B: BackingStore + 'static> ReaderHandle for ReaderInner<B> {
    fn flush(&self) -> Result<(), ReaderError> {
        self.flush_impl()
    }
}

impl<B: BackingStore + 'static> Reader<B> {
    pub fn new(
        computation: impl Into<String>,
        key: impl Into<Vec<u8>>,
        work_token: i64,
        backing_store: B,
    ) -> Self {
        Self {
            inner: Arc::new(ReaderInner {
                binding: ReaderBinding::new(computation, key, work_token),
                backing_store,
                registry: HandleRegistry::new(),
                pending: PendingQueue::new(),
                flush_lock: Mutex::new(()),
                #[cfg(feature = "stats")]
                stats: Mutex::new(ReaderStats::new()),
            }),
        }
    }

    pub fn binding(&self) -> &ReaderBinding {
        &self.inner.binding
    }

    /// A snapshot of this reader's flush counters (`stats` feature only).
    #[cfg(feature = "stats")]
    pub fn stats(&self) -> ReaderStats {
        self.inner.stats.lock().unwrap().clone()
    }

    fn weak_handle(&self) -> Weak<dyn ReaderHandle> {
        Arc::downgrade(&self.inner) as Weak<dyn ReaderHandle>
    }

    /// A strong reference to this reader's inner state, handed to every
    /// issued `*Handle` so it outlives the `Reader` (or all of its clones)
    /// that registered it. Only the slot's own back-reference stays weak.
    fn strong_handle(&self) -> Arc<dyn ReaderHandle> {
        self.inner.clone() as Arc<dyn ReaderHandle>
    }

    /// Registers `(Value, tag)` and returns its handle. The decoder
    /// given here is only used if this is the first registration for the
    /// tag; later callers registering the same tag get the already-running
    /// decoder.
    pub fn value_handle<T, E, F>(&self, tag: impl Into<Vec<u8>>, decoder: F) -> ValueHandle<T>
    where
        T: Send + Sync + Clone + 'static,
        E: std::error::Error + Send + Sync + 'static,
        F: Fn(&[u8]) -> Result<T, E> + Send + Sync + 'static,
    {
        let tag_key = TagKey::value(tag);
        let reader_weak = self.weak_handle();
        let (slot, is_new) = self.inner.registry.register(tag_key.clone(), move || {
            let decode: Box<dyn Fn(Option<Vec<u8>>) -> Result<Box<dyn Any + Send + Sync>, DecodeError> + Send + Sync> =
                Box::new(move |data| match data {
                    None => Ok(Box::new(None::<T>) as Box<dyn Any + Send + Sync>),
                    Some(bytes) => {
                        let value = decoder(&bytes).map_err(|e| Box::new(e) as DecodeError)?;
                        Ok(Box::new(Some(value)) as Box<dyn Any + Send + Sync>)
                    }
                });
            HandleSlot::new_value(decode, reader_weak)
        });
        if is_new {
            self.inner.pending.push(tag_key);
        }
        ValueHandle { slot, owner: self.strong_handle(), _marker: PhantomData }
    }

    /// Registers `(List, tag)` and returns its handle. The element
    /// decoder sees each entry's payload with the single zero-byte presence
    /// prefix already stripped off.
    pub fn list_handle<T, E, F>(&self, tag: impl Into<Vec<u8>>, elem_decoder: F) -> ListHandle<T>
    where
        T: Send + Sync + Clone + 'static,
        E: std::error::Error + Send + Sync + 'static,
        F: Fn(&[u8]) -> Result<T, E> + Send + Sync + 'static,
    {
        let tag_key = TagKey::list(tag);
        let reader_weak = self.weak_handle();
        let (slot, is_new) = self.inner.registry.register(tag_key.clone(), move || {
            let decode: Box<dyn Fn(Vec<Payload>) -> Result<Box<dyn Any + Send + Sync>, DecodeError> + Send + Sync> =
                Box::new(move |entries| {
                    let mut out = Vec::with_capacity(entries.len());
                    for entry in entries {
                        let data = match entry.data {
                            Some(bytes) if !bytes.is_empty() => bytes,
                            _ => continue,
                        };
                        let elem = elem_decoder(&data[1..]).map_err(|e| Box::new(e) as DecodeError)?;
                        out.push(elem);
                    }
                    Ok(Box::new(out) as Box<dyn Any + Send + Sync>)
                });
            HandleSlot::new_list(decode, reader_weak)
        });
        if is_new {
            self.inner.pending.push(tag_key);
        }
        ListHandle { slot, owner: self.strong_handle(), _marker: PhantomData }
    }

    /// Registers `(Watermark, tag)` and returns its handle. Carries
    /// no decoder: watermark items are resolved purely from their
    /// timestamps.
    pub fn watermark_handle(&self, tag: impl Into<Vec<u8>>) -> WatermarkHandle {
        let tag_key = TagKey::watermark(tag);
        let reader_weak = self.weak_handle();
        let (slot, is_new) =
            self.inner.registry.register(tag_key.clone(), move || HandleSlot::new_watermark(reader_weak));
        if is_new {
            self.inner.pending.push(tag_key);
        }
        WatermarkHandle { slot, owner: self.strong_handle() }
    }

    /// Drains pending lookups and performs the round trip.
    /// A no-op when nothing is pending.
    pub fn flush(&self) -> Result<(), ReaderError> {
        self.inner.flush_impl()
    }
}

impl<B: BackingStore + 'static> ReaderInner<B> {
    fn flush_impl(&self) -> Result<(), ReaderError> {
        let _guard = self.flush_lock.lock().unwrap();

        let drained = self.pending.drain();
        if drained.is_empty() {
            return Ok(());
        }

        let flush_span = span!(Level::DEBUG, "flush", tags = drained.len());
        let _enter = flush_span.enter();

        let mut outstanding: Outstanding = HashMap::with_capacity(drained.len());
        for tag_key in &drained {
            if let Some(slot) = self.registry.get(tag_key) {
                outstanding.insert(tag_key.tag.clone(), (tag_key.clone(), slot));
            }
        }

        #[cfg(feature = "stats")]
        self.record_flush_stats(&drained);

        let request = build_request(&self.binding, &drained);
        tracing::debug!(value_fetches = request.computations[0].keys[0].value_fetches.len(), list_fetches = request.computations[0].keys[0].list_fetches.len(), "sending composite getData request");

        let response = match self.backing_store.get_data(request) {
            Ok(response) => response,
            Err(transport_err) => {
                let error = ReaderError::transport_boxed(transport_err);
                tracing::warn!(%error, "backing store call failed");
                self.fail_all(&outstanding, error.clone());
                return Err(error);
            }
        };

        match consume_response(&self.binding, &mut outstanding, response) {
            Ok(()) => {
                #[cfg(feature = "stats")]
                self.record_decode_failures(&drained);
                Ok(())
            }
            Err(error) => {
                tracing::warn!(%error, "flush failed during response routing");
                self.fail_all(&outstanding, error.clone());
                Err(error)
            }
        }
    }

    fn fail_all(&self, outstanding: &Outstanding, err: ReaderError) {
        for (_, slot) in outstanding.values() {
            slot.fail(err.clone());
        }
    }

    #[cfg(feature = "stats")]
    fn record_flush_stats(&self, drained: &[TagKey]) {
        let value_count = drained.iter().filter(|t| t.kind == TagKind::Value).count() as u32;
        let list_count = drained.iter().filter(|t| t.kind == TagKind::List).count() as u32;
        let watermark_count = drained.iter().filter(|t| t.kind == TagKind::Watermark).count() as u32;
        self.stats.lock().unwrap().record_flush(value_count, list_count, watermark_count);
    }

    #[cfg(feature = "stats")]
    fn record_decode_failures(&self, drained: &[TagKey]) {
        let mut stats = self.stats.lock().unwrap();
        for tag_key in drained {
            if let Some(slot) = self.registry.get(tag_key) {
                if slot.is_decode_failure() {
                    stats.record_decode_failure();
                }
            }
        }
    }
}
