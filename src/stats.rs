//! Optional per-reader instrumentation, gated behind the `stats` feature.
//! There is no cross-work-token cache here to report hit rates for (a reader
//! is scoped to one key/work-token), so what's worth recording is flush
//! shape: how many tags went out, split by kind, and how many handles
//! failed to decode.

#[derive(Debug, Default, Clone)]
pub struct ReaderStats {
    /// Number of times `flush` actually performed a backing-store call
    /// (i.e. drained a non-empty pending queue).
    flushes: u32,
    /// Total `(kind, tag)` entries sent across all flushes.
    tags_sent: u32,
    value_tags_sent: u32,
    list_tags_sent: u32,
    watermark_tags_sent: u32,
    /// Number of handles that resolved to `Failed` with `ReaderError::Decode`.
    decode_failures: u32,
}

impl ReaderStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_flush(&mut self, value_count: u32, list_count: u32, watermark_count: u32) {
        self.flushes += 1;
        self.value_tags_sent += value_count;
        self.list_tags_sent += list_count;
        self.watermark_tags_sent += watermark_count;
        self.tags_sent += value_count + list_count + watermark_count;
    }

    pub(crate) fn record_decode_failure(&mut self) {
        self.decode_failures += 1;
    }

    pub fn flushes(&self) -> u32 {
        self.flushes
    }

    pub fn tags_sent(&self) -> u32 {
        self.tags_sent
    }

    pub fn value_tags_sent(&self) -> u32 {
        self.value_tags_sent
    }

    pub fn list_tags_sent(&self) -> u32 {
        self.list_tags_sent
    }

    pub fn watermark_tags_sent(&self) -> u32 {
        self.watermark_tags_sent
    }

    pub fn decode_failures(&self) -> u32 {
        self.decode_failures
    }
}

impl Drop for ReaderStats {
    fn drop(&mut self) {
        tracing::debug!(reader_stats = ?self);
    }
}
