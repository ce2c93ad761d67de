use std::any::Any;
use std::marker::PhantomData;
use std::sync::{Arc, Condvar, Mutex, Weak};
use std::time::{Duration, Instant};

use crate::error::{DecodeError, ReaderError, TimeoutError};
use crate::tag::TagKind;
use crate::wire::{ListItem, Payload, ValueItem};

/// Converts a wire-format microsecond timestamp to the
/// millisecond domain the rest of the handle API works in.
fn micros_to_millis(micros: i64) -> i64 {
    micros / 1_000
}

type BoxedResult = Box<dyn Any + Send + Sync>;

/// The decoder recorded at first registration. `Watermark` tags carry
/// none; `Value`/`List` tags carry a closure captured with the caller's type
/// parameter baked in, so the slot itself stays ungeneric.
enum Decoder {
    None,
    Value(Box<dyn Fn(Option<Vec<u8>>) -> Result<BoxedResult, DecodeError> + Send + Sync>),
    ListElement(Box<dyn Fn(Vec<Payload>) -> Result<BoxedResult, DecodeError> + Send + Sync>),
}

enum SlotState {
    Unresolved,
    Resolved(Arc<dyn Any + Send + Sync>),
    Failed(ReaderError),
}

/// The non-generic entry installed in the [`crate::registry::HandleRegistry`].
///
/// One `HandleSlot` backs exactly one `TagKey` for the lifetime of the
/// reader. It owns the condvar-guarded terminal state and the decoder
/// captured at creation time; routing (`deliver_*`) is dispatched purely on
/// `kind`, with no type parameters in play here.
pub(crate) struct HandleSlot {
    kind: TagKind,
    decoder: Decoder,
    state: Mutex<SlotState>,
    cv: Condvar,
    reader: Weak<dyn ReaderHandle>,
}

/// Narrow interface a `HandleSlot` needs back from its owning reader: just
/// enough to trigger a flush on first await, without the slot needing to
/// know the reader's backing-store type parameter.
pub(crate) trait ReaderHandle: Send + Sync {
    fn flush(&self) -> Result<(), ReaderError>;
}

impl HandleSlot {
    pub(crate) fn new_value(
        decoder: Box<dyn Fn(Option<Vec<u8>>) -> Result<BoxedResult, DecodeError> + Send + Sync>,
        reader: Weak<dyn ReaderHandle>,
    ) -> Arc<Self> {
        Arc::new(Self {
            kind: TagKind::Value,
            decoder: Decoder::Value(decoder),
            state: Mutex::new(SlotState::Unresolved),
            cv: Condvar::new(),
            reader,
        })
    }

    pub(crate) fn new_list(
        decoder: Box<dyn Fn(Vec<Payload>) -> Result<BoxedResult, DecodeError> + Send + Sync>,
        reader: Weak<dyn ReaderHandle>,
    ) -> Arc<Self> {
        Arc::new(Self {
            kind: TagKind::List,
            decoder: Decoder::ListElement(decoder),
            state: Mutex::new(SlotState::Unresolved),
            cv: Condvar::new(),
            reader,
        })
    }

    pub(crate) fn new_watermark(reader: Weak<dyn ReaderHandle>) -> Arc<Self> {
        Arc::new(Self {
            kind: TagKind::Watermark,
            decoder: Decoder::None,
            state: Mutex::new(SlotState::Unresolved),
            cv: Condvar::new(),
            reader,
        })
    }

    pub(crate) fn kind(&self) -> TagKind {
        self.kind
    }

    /// VALUE decoding: empty/absent payload resolves to the absent
    /// marker without invoking the decoder; otherwise the decoder consumes
    /// the payload bytes unmodified.
    pub(crate) fn deliver_value(&self, item: ValueItem) {
        let decoder = match &self.decoder {
            Decoder::Value(f) => f,
            _ => return self.fail(ReaderError::MissingDecoder { kind: self.kind }),
        };
        let data = item.payload.and_then(|p| p.data).filter(|bytes| !bytes.is_empty());
        match decoder(data) {
            Ok(boxed) => self.resolve(boxed),
            Err(e) => self.fail(ReaderError::decode(e)),
        }
    }

    /// LIST decoding: entries with absent/empty payload are skipped;
    /// present entries drop their single leading prefix byte before
    /// decoding. Order is preserved from the backing store.
    pub(crate) fn deliver_list(&self, item: ListItem) {
        let decoder = match &self.decoder {
            Decoder::ListElement(f) => f,
            _ => return self.fail(ReaderError::MissingDecoder { kind: self.kind }),
        };
        match decoder(item.entries) {
            Ok(boxed) => self.resolve(boxed),
            Err(e) => self.fail(ReaderError::decode(e)),
        }
    }

    /// WATERMARK decoding: the result is the minimum timestamp
    /// across entries whose payload is present and non-empty, converted
    /// from microseconds to milliseconds. Entries that fail that guard are
    /// skipped entirely rather than treated as zero holds.
    pub(crate) fn deliver_watermark(&self, item: ListItem) {
        let mut min_micros: Option<i64> = None;
        for entry in &item.entries {
            if !entry.is_present() {
                continue;
            }
            if let Some(ts) = entry.timestamp {
                min_micros = Some(min_micros.map_or(ts, |cur: i64| cur.min(ts)));
            }
        }
        let millis: Option<i64> = min_micros.map(micros_to_millis);
        self.resolve(Box::new(millis));
    }

    pub(crate) fn fail(&self, err: ReaderError) {
        let mut state = self.state.lock().unwrap();
        if matches!(*state, SlotState::Unresolved) {
            *state = SlotState::Failed(err);
            self.cv.notify_all();
        }
    }

    fn resolve(&self, value: BoxedResult) {
        let mut state = self.state.lock().unwrap();
        if matches!(*state, SlotState::Unresolved) {
            *state = SlotState::Resolved(Arc::from(value));
            self.cv.notify_all();
        }
    }

    fn is_unresolved(&self) -> bool {
        matches!(*self.state.lock().unwrap(), SlotState::Unresolved)
    }

    #[cfg(feature = "stats")]
    pub(crate) fn is_decode_failure(&self) -> bool {
        matches!(*self.state.lock().unwrap(), SlotState::Failed(ReaderError::Decode(_)))
    }

    /// First await triggers `flush()` on the owning reader; any
    /// subsequent await just observes the already-terminal state.
    fn await_result(&self) -> Result<Arc<dyn Any + Send + Sync>, ReaderError> {
        if self.is_unresolved() {
            if let Some(reader) = self.reader.upgrade() {
                // A fatal flush error is delivered to every affected slot via
                // `fail()` before `flush()` returns it here; this handle's own
                // terminal state (read below) is always the authoritative
                // outcome, so the aggregate result is intentionally discarded.
                let _ = reader.flush();
            }
        }
        let guard = self.state.lock().unwrap();
        let guard = self
            .cv
            .wait_while(guard, |s| matches!(s, SlotState::Unresolved))
            .unwrap();
        match &*guard {
            SlotState::Resolved(v) => Ok(v.clone()),
            SlotState::Failed(e) => Err(e.clone()),
            SlotState::Unresolved => unreachable!("wait_while only returns on a terminal state"),
        }
    }

    fn await_result_timeout(
        &self,
        timeout: Duration,
    ) -> Result<Result<Arc<dyn Any + Send + Sync>, ReaderError>, TimeoutError> {
        if self.is_unresolved() {
            if let Some(reader) = self.reader.upgrade() {
                let _ = reader.flush();
            }
        }
        let deadline = Instant::now() + timeout;
        let mut guard = self.state.lock().unwrap();
        loop {
            match &*guard {
                SlotState::Resolved(v) => return Ok(Ok(v.clone())),
                SlotState::Failed(e) => return Ok(Err(e.clone())),
                SlotState::Unresolved => {
                    let now = Instant::now();
                    if now >= deadline {
                        return Err(TimeoutError);
                    }
                    let (g, timeout_result) = self.cv.wait_timeout(guard, deadline - now).unwrap();
                    guard = g;
                    if timeout_result.timed_out() && matches!(*guard, SlotState::Unresolved) {
                        return Err(TimeoutError);
                    }
                }
            }
        }
    }
}

fn downcast<T: Clone + 'static>(boxed: Arc<dyn Any + Send + Sync>) -> T {
    boxed
        .downcast_ref::<T>()
        .unwrap_or_else(|| unreachable!("decoder for this slot always produces the handle's own type"))
        .clone()
}

/// Deferred handle to a VALUE cell.
///
/// Resolves to `None` when the backing store has no data stored for the
/// tag, `Some(value)` otherwise. Cloning a handle shares the same
/// underlying slot; every clone observes the same outcome.
///
/// Holds a strong reference to its owning reader so that a handle returned
/// from a function whose local `Reader` has since been dropped can still
/// trigger its flush; the slot's own back-reference stays weak to avoid a
/// registry-to-slot-to-reader cycle.
pub struct ValueHandle<T> {
    pub(crate) slot: Arc<HandleSlot>,
    pub(crate) owner: Arc<dyn ReaderHandle>,
    pub(crate) _marker: PhantomData<T>,
}

impl<T> Clone for ValueHandle<T> {
    fn clone(&self) -> Self {
        Self { slot: self.slot.clone(), owner: self.owner.clone(), _marker: PhantomData }
    }
}

impl<T: Send + Sync + Clone + 'static> ValueHandle<T> {
    /// Blocks until the handle resolves, triggering a flush on first call.
    pub fn get(&self) -> Result<Option<T>, ReaderError> {
        self.slot.await_result().map(downcast::<Option<T>>)
    }

    /// As [`Self::get`], but returns [`TimeoutError`] if `timeout` elapses
    /// first. Because the flush is a single synchronous round trip, this
    /// degenerates to "wait for the flush or give up".
    pub fn get_timeout(&self, timeout: Duration) -> Result<Result<Option<T>, ReaderError>, TimeoutError> {
        self.slot
            .await_result_timeout(timeout)
            .map(|r| r.map(downcast::<Option<T>>))
    }
}

/// Deferred handle to a LIST cell.
///
/// Resolves to the finished, in-order sequence of decoded elements; an
/// absent list resolves to an empty sequence rather than `None`.
///
/// Holds a strong reference to its owning reader; see [`ValueHandle`].
pub struct ListHandle<T> {
    pub(crate) slot: Arc<HandleSlot>,
    pub(crate) owner: Arc<dyn ReaderHandle>,
    pub(crate) _marker: PhantomData<T>,
}

impl<T> Clone for ListHandle<T> {
    fn clone(&self) -> Self {
        Self { slot: self.slot.clone(), owner: self.owner.clone(), _marker: PhantomData }
    }
}

impl<T: Send + Sync + Clone + 'static> ListHandle<T> {
    pub fn get(&self) -> Result<Vec<T>, ReaderError> {
        self.slot.await_result().map(downcast::<Vec<T>>)
    }

    pub fn get_timeout(&self, timeout: Duration) -> Result<Result<Vec<T>, ReaderError>, TimeoutError> {
        self.slot.await_result_timeout(timeout).map(|r| r.map(downcast::<Vec<T>>))
    }
}

/// Deferred handle to a WATERMARK hold.
///
/// Resolves to the minimum timestamp (milliseconds) across contributing
/// entries, or `None` when no holds exist.
///
/// Holds a strong reference to its owning reader; see [`ValueHandle`].
#[derive(Clone)]
pub struct WatermarkHandle {
    pub(crate) slot: Arc<HandleSlot>,
    pub(crate) owner: Arc<dyn ReaderHandle>,
}

impl WatermarkHandle {
    pub fn get(&self) -> Result<Option<i64>, ReaderError> {
        self.slot.await_result().map(downcast::<Option<i64>>)
    }

    pub fn get_timeout(&self, timeout: Duration) -> Result<Result<Option<i64>, ReaderError>, TimeoutError> {
        self.slot.await_result_timeout(timeout).map(|r| r.map(downcast::<Option<i64>>))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct NoFlush;
    impl ReaderHandle for NoFlush {
        fn flush(&self) -> Result<(), ReaderError> {
            Ok(())
        }
    }

    #[test]
    fn resolved_value_handle_returns_same_outcome_twice() {
        let owner: Arc<dyn ReaderHandle> = Arc::new(NoFlush);
        let slot = HandleSlot::new_value(
            Box::new(|data| Ok(Box::new(data.map(|b| b[0] as i64)) as BoxedResult)),
            Arc::downgrade(&owner),
        );
        slot.deliver_value(ValueItem {
            tag: b"t".to_vec(),
            payload: Some(Payload { data: Some(vec![9]), timestamp: None }),
        });
        let handle = ValueHandle::<i64> { slot: slot.clone(), owner: owner.clone(), _marker: PhantomData };
        assert_eq!(handle.get().unwrap(), Some(9));
        assert_eq!(handle.get().unwrap(), Some(9));
    }

    #[test]
    fn failed_slot_is_observed_by_every_clone() {
        let owner: Arc<dyn ReaderHandle> = Arc::new(NoFlush);
        let slot = HandleSlot::new_watermark(Arc::downgrade(&owner));
        slot.fail(ReaderError::KeyMismatch);
        let h1 = WatermarkHandle { slot: slot.clone(), owner: owner.clone() };
        let h2 = h1.clone();
        assert!(h1.get().is_err());
        assert!(h2.get().is_err());
    }
}
