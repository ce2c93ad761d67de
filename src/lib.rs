//! A batching, deduplicating reader for per-key state backed by a composite
//! `getData` round trip.
//!
//! Handles for individual tags (`Value`, `List`, `Watermark`) are registered
//! lazily; registering the same tag twice on the same [`Reader`] reuses the
//! first registration's handle instead of issuing a second fetch.
//! Nothing is sent to the backing store until [`Reader::flush`] is called, at
//! which point every tag registered since the last flush goes out as a
//! single composite request and the response is demultiplexed back onto the
//! waiting handles.

mod backing_store;
mod binding;
mod error;
mod handle;
mod pending;
mod reader;
mod registry;
mod request;
mod response;
#[cfg(feature = "stats")]
mod stats;
mod tag;
mod wire;

pub mod testing;

pub use backing_store::BackingStore;
pub use binding::ReaderBinding;
pub use error::{ReaderError, TimeoutError};
pub use handle::{ListHandle, ValueHandle, WatermarkHandle};
pub use reader::Reader;
#[cfg(feature = "stats")]
pub use stats::ReaderStats;
pub use tag::{TagKey, TagKind};
pub use wire::{
    ComputationGetDataRequest, ComputationGetDataResponse, GetDataRequest, GetDataResponse,
    KeyedGetDataRequest, KeyedGetDataResponse, ListFetch, ListItem, Payload, ValueFetch, ValueItem,
};
