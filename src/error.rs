use std::sync::Arc;

use crate::tag::TagKind;

/// Error produced by a user-supplied decoder. Decoders are free to return
/// whatever error type is convenient for them; it is boxed once here and
/// carried as the `source` of [`ReaderError::Decode`].
pub type DecodeError = Box<dyn std::error::Error + Send + Sync>;

/// Everything that can go wrong while registering a handle or running a
/// flush.
///
/// Variants fall into two groups: *fatal* conditions abort the whole
/// flush and fail every handle still outstanding in it, while
/// [`ReaderError::Decode`] is scoped to the single handle whose decoder
/// raised it. The enum is `Clone` so the same fatal cause can be handed to
/// every handle it touches without re-deriving it.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ReaderError {
    /// The backing store call itself failed, or returned nothing.
    #[error("backing store call failed: {0}")]
    Transport(#[source] Arc<dyn std::error::Error + Send + Sync>),

    /// The response's computation id did not match the reader's binding.
    #[error("response computation id {observed:?} does not match bound computation {expected:?}")]
    ComputationMismatch { expected: String, observed: String },

    /// The response's key did not match the reader's binding.
    #[error("response key did not match the reader's bound key")]
    KeyMismatch,

    /// The response envelope did not carry exactly one computation block or
    /// exactly one key block.
    #[error("expected exactly one {block} block in response, found {found}")]
    BlockCount { block: &'static str, found: usize },

    /// A response item's tag did not appear in the set of tags this flush
    /// sent to the backing store.
    #[error("response contained unknown tag for kind {kind}")]
    UnknownTag { kind: TagKind },

    /// A response item arrived on the wrong list (e.g. a tag registered as
    /// `Value` showed up among the `lists` entries).
    #[error("tag {tag:?} was registered as {expected} but the response routed it as {observed}")]
    KindMismatch { tag: Vec<u8>, expected: TagKind, observed: TagKind },

    /// Internal bug: a registered tag had no decoder recorded for a kind
    /// that requires one.
    #[error("missing decoder for tag registered as {kind}")]
    MissingDecoder { kind: TagKind },

    /// The response did not account for every tag that was sent; some tags
    /// were never returned.
    #[error("response was missing {missing} of {sent} requested tags")]
    IncompleteResponse { sent: usize, missing: usize },

    /// A decoder raised while decoding a payload for this handle.
    #[error("failed to decode payload: {0}")]
    Decode(#[source] Arc<dyn std::error::Error + Send + Sync>),
}

impl ReaderError {
    pub(crate) fn decode(err: DecodeError) -> Self {
        ReaderError::Decode(Arc::from(err))
    }

    pub(crate) fn transport_boxed(err: Box<dyn std::error::Error + Send + Sync>) -> Self {
        ReaderError::Transport(Arc::from(err))
    }
}

/// Raised when a bounded await ([`crate::handle::ValueHandle::get_timeout`]
/// and friends) does not observe resolution before its deadline.
#[derive(Debug, Clone, thiserror::Error)]
#[error("timed out waiting for handle to resolve")]
pub struct TimeoutError;
