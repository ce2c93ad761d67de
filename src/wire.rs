//! Wire-shaped request/response types: one `computation` block wrapping
//! one `key` block. The envelope is modeled with `Vec`s (rather than a
//! single struct) on both request and response so that the response
//! consumer can validate block counts instead of assuming they are correct.

/// Maximum representable timestamp, used as the upper bound for every list
/// fetch: lists are always fetched whole, never paginated.
pub const MAX_END_TIMESTAMP: i64 = i64::MAX;

#[derive(Debug, Clone)]
pub struct GetDataRequest {
    pub computations: Vec<ComputationGetDataRequest>,
}

#[derive(Debug, Clone)]
pub struct ComputationGetDataRequest {
    pub computation_id: String,
    pub keys: Vec<KeyedGetDataRequest>,
}

#[derive(Debug, Clone)]
pub struct KeyedGetDataRequest {
    pub key: Vec<u8>,
    pub work_token: i64,
    pub value_fetches: Vec<ValueFetch>,
    pub list_fetches: Vec<ListFetch>,
}

#[derive(Debug, Clone)]
pub struct ValueFetch {
    pub tag: Vec<u8>,
}

#[derive(Debug, Clone)]
pub struct ListFetch {
    pub tag: Vec<u8>,
    pub end_timestamp: i64,
}

#[derive(Debug, Clone)]
pub struct GetDataResponse {
    pub computations: Vec<ComputationGetDataResponse>,
}

#[derive(Debug, Clone)]
pub struct ComputationGetDataResponse {
    pub computation_id: String,
    pub keys: Vec<KeyedGetDataResponse>,
}

#[derive(Debug, Clone)]
pub struct KeyedGetDataResponse {
    pub key: Vec<u8>,
    pub values: Vec<ValueItem>,
    pub lists: Vec<ListItem>,
}

#[derive(Debug, Clone)]
pub struct ValueItem {
    pub tag: Vec<u8>,
    pub payload: Option<Payload>,
}

#[derive(Debug, Clone)]
pub struct ListItem {
    pub tag: Vec<u8>,
    pub entries: Vec<Payload>,
}

/// One opaque entry: `data` is absent for a "no value" marker, and present
/// (possibly zero-length) for an actual value. `timestamp` is microseconds
/// since epoch and is only meaningful for watermark entries.
#[derive(Debug, Clone, Default)]
pub struct Payload {
    pub data: Option<Vec<u8>>,
    pub timestamp: Option<i64>,
}

impl Payload {
    pub fn is_present(&self) -> bool {
        matches!(&self.data, Some(bytes) if !bytes.is_empty())
    }
}
