//! An in-memory [`BackingStore`] fake for tests and doctests. Seed it with
//! canned per-tag responses, then inspect the requests it actually received
//! to assert on call counts and requested tag sets without a real transport.

use std::collections::HashMap;
use std::sync::Mutex;

use crate::backing_store::BackingStore;
use crate::wire::{
    ComputationGetDataResponse, GetDataRequest, GetDataResponse, KeyedGetDataResponse, ListItem,
    Payload, ValueItem,
};

#[derive(Default)]
struct FakeState {
    values: HashMap<Vec<u8>, Option<Payload>>,
    lists: HashMap<Vec<u8>, Vec<Payload>>,
    requests: Vec<GetDataRequest>,
}

/// A deterministic stand-in for the real backing-store transport.
///
/// Responses are seeded per tag ahead of time with [`Self::with_value`] and
/// [`Self::with_list`] (the latter doubles as the watermark seeding call,
/// since both kinds travel as list fetches on the wire). Any fetched
/// tag with no seeded response is answered as absent: an empty payload for
/// a value fetch, zero entries for a list fetch.
#[derive(Default)]
pub struct FakeBackingStore {
    state: Mutex<FakeState>,
}

impl FakeBackingStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_value(self, tag: impl Into<Vec<u8>>, payload: Option<Payload>) -> Self {
        self.state.lock().unwrap().values.insert(tag.into(), payload);
        self
    }

    pub fn with_list(self, tag: impl Into<Vec<u8>>, entries: Vec<Payload>) -> Self {
        self.state.lock().unwrap().lists.insert(tag.into(), entries);
        self
    }

    /// The requests this fake has received so far, in order.
    pub fn requests(&self) -> Vec<GetDataRequest> {
        self.state.lock().unwrap().requests.clone()
    }

    pub fn request_count(&self) -> usize {
        self.state.lock().unwrap().requests.len()
    }
}

impl BackingStore for FakeBackingStore {
    fn get_data(
        &self,
        request: GetDataRequest,
    ) -> Result<GetDataResponse, Box<dyn std::error::Error + Send + Sync>> {
        let mut state = self.state.lock().unwrap();
        state.requests.push(request.clone());

        let computations = request
            .computations
            .into_iter()
            .map(|computation| {
                let keys = computation
                    .keys
                    .into_iter()
                    .map(|key_block| {
                        let values = key_block
                            .value_fetches
                            .into_iter()
                            .map(|fetch| ValueItem {
                                payload: state.values.get(&fetch.tag).cloned().unwrap_or(None),
                                tag: fetch.tag,
                            })
                            .collect();
                        let lists = key_block
                            .list_fetches
                            .into_iter()
                            .map(|fetch| ListItem {
                                entries: state.lists.get(&fetch.tag).cloned().unwrap_or_default(),
                                tag: fetch.tag,
                            })
                            .collect();
                        KeyedGetDataResponse { key: key_block.key, values, lists }
                    })
                    .collect();
                ComputationGetDataResponse { computation_id: computation.computation_id, keys }
            })
            .collect();

        Ok(GetDataResponse { computations })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unseeded_tags_come_back_absent() {
        let store = FakeBackingStore::new();
        let request = GetDataRequest {
            computations: vec![crate::wire::ComputationGetDataRequest {
                computation_id: "c".into(),
                keys: vec![crate::wire::KeyedGetDataRequest {
                    key: b"k".to_vec(),
                    work_token: 1,
                    value_fetches: vec![crate::wire::ValueFetch { tag: b"missing".to_vec() }],
                    list_fetches: vec![],
                }],
            }],
        };
        let response = store.get_data(request).unwrap();
        let item = &response.computations[0].keys[0].values[0];
        assert!(item.payload.is_none());
        assert_eq!(store.request_count(), 1);
    }
}
