use crate::binding::ReaderBinding;
use crate::tag::{TagKey, TagKind};
use crate::wire::{
    ComputationGetDataRequest, GetDataRequest, KeyedGetDataRequest, ListFetch, ValueFetch,
    MAX_END_TIMESTAMP,
};

/// Builds the single composite request for one flush.
///
/// `List` and `Watermark` tags both become `listFetch` entries; `Value`
/// tags become `valueFetch` entries. List fetches always carry the maximum
/// representable end timestamp, since lists are fetched whole and never paginated.
pub(crate) fn build_request(binding: &ReaderBinding, tags: &[TagKey]) -> GetDataRequest {
    let mut value_fetches = Vec::new();
    let mut list_fetches = Vec::new();

    for tag_key in tags {
        match tag_key.kind {
            TagKind::Value => value_fetches.push(ValueFetch { tag: tag_key.tag.clone() }),
            TagKind::List | TagKind::Watermark => {
                list_fetches.push(ListFetch { tag: tag_key.tag.clone(), end_timestamp: MAX_END_TIMESTAMP })
            }
        }
    }

    GetDataRequest {
        computations: vec![ComputationGetDataRequest {
            computation_id: binding.computation.clone(),
            keys: vec![KeyedGetDataRequest {
                key: binding.key.clone(),
                work_token: binding.work_token,
                value_fetches,
                list_fetches,
            }],
        }],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partitions_by_kind_and_caps_list_fetches() {
        let binding = ReaderBinding::new("comp", b"key".to_vec(), 7);
        let tags = vec![TagKey::value("v1"), TagKey::list("l1"), TagKey::watermark("w1")];
        let request = build_request(&binding, &tags);

        assert_eq!(request.computations.len(), 1);
        let computation = &request.computations[0];
        assert_eq!(computation.computation_id, "comp");
        assert_eq!(computation.keys.len(), 1);
        let key_block = &computation.keys[0];
        assert_eq!(key_block.key, b"key");
        assert_eq!(key_block.work_token, 7);
        assert_eq!(key_block.value_fetches.len(), 1);
        assert_eq!(key_block.value_fetches[0].tag, b"v1");
        assert_eq!(key_block.list_fetches.len(), 2);
        assert!(key_block.list_fetches.iter().all(|f| f.end_timestamp == MAX_END_TIMESTAMP));
    }
}
