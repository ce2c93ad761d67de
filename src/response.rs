use std::collections::HashMap;
use std::sync::Arc;

use crate::binding::ReaderBinding;
use crate::error::ReaderError;
use crate::handle::HandleSlot;
use crate::tag::{TagKey, TagKind};
use crate::wire::{GetDataResponse, ListItem, ValueItem};

/// The auxiliary map built at drain time: tag bytes to the
/// `TagKey` and slot that were registered for it. Consumption removes
/// entries as they're routed; anything left over after routing is an
/// incomplete response.
pub(crate) type Outstanding = HashMap<Vec<u8>, (TagKey, Arc<HandleSlot>)>;

/// Validates the envelope and routes every item in `response` to its slot,
/// removing each from `outstanding` as it is consumed.
///
/// On a fatal error this returns immediately without finishing the rest of
/// the response; the caller is responsible for failing whatever remains in
/// `outstanding` with the same error, a single flush-wide cause rather than
/// one derived per handle.
pub(crate) fn consume_response(
    binding: &ReaderBinding,
    outstanding: &mut Outstanding,
    response: GetDataResponse,
) -> Result<(), ReaderError> {
    if response.computations.len() != 1 {
        return Err(ReaderError::BlockCount { block: "computation", found: response.computations.len() });
    }
    let computation = response.computations.into_iter().next().unwrap();
    if computation.computation_id != binding.computation {
        return Err(ReaderError::ComputationMismatch {
            expected: binding.computation.clone(),
            observed: computation.computation_id,
        });
    }

    if computation.keys.len() != 1 {
        return Err(ReaderError::BlockCount { block: "key", found: computation.keys.len() });
    }
    let key_block = computation.keys.into_iter().next().unwrap();
    if key_block.key != binding.key {
        return Err(ReaderError::KeyMismatch);
    }

    let total_sent = outstanding.len();

    for value_item in key_block.values {
        route_value(outstanding, value_item)?;
    }
    for list_item in key_block.lists {
        route_list(outstanding, list_item)?;
    }

    if !outstanding.is_empty() {
        return Err(ReaderError::IncompleteResponse { sent: total_sent, missing: outstanding.len() });
    }
    Ok(())
}

fn take_slot(
    outstanding: &mut Outstanding,
    tag: &[u8],
    observed_kind: TagKind,
) -> Result<(TagKey, Arc<HandleSlot>), ReaderError> {
    match outstanding.remove(tag) {
        Some((tag_key, slot)) if tag_key.kind == observed_kind => Ok((tag_key, slot)),
        Some((tag_key, slot)) => {
            // Put it back failed rather than silently dropping it: routing
            // continues for the rest of the response, but this handle must
            // not hang.
            slot.fail(ReaderError::KindMismatch {
                tag: tag_key.tag.clone(),
                expected: tag_key.kind,
                observed: observed_kind,
            });
            Err(ReaderError::KindMismatch { tag: tag_key.tag, expected: tag_key.kind, observed: observed_kind })
        }
        None => Err(ReaderError::UnknownTag { kind: observed_kind }),
    }
}

fn route_value(outstanding: &mut Outstanding, item: ValueItem) -> Result<(), ReaderError> {
    let (_, slot) = take_slot(outstanding, &item.tag, TagKind::Value)?;
    slot.deliver_value(item);
    Ok(())
}

fn route_list(outstanding: &mut Outstanding, item: ListItem) -> Result<(), ReaderError> {
    // A list-shaped wire item can be either a LIST or a WATERMARK tag;
    // peek at the registered kind first so a legitimate watermark isn't
    // reported as a "mismatch" against an assumed List kind.
    let registered_kind = match outstanding.get(&item.tag) {
        Some((tag_key, _)) => tag_key.kind,
        None => return Err(ReaderError::UnknownTag { kind: TagKind::List }),
    };
    let observed_kind = match registered_kind {
        TagKind::Watermark => TagKind::Watermark,
        _ => TagKind::List,
    };
    let (_, slot) = take_slot(outstanding, &item.tag, observed_kind)?;
    match observed_kind {
        TagKind::Watermark => slot.deliver_watermark(item),
        _ => slot.deliver_list(item),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handle::ReaderHandle;
    use crate::wire::{ComputationGetDataResponse, KeyedGetDataResponse, Payload};
    use std::sync::Weak;

    struct NoFlush;
    impl ReaderHandle for NoFlush {
        fn flush(&self) -> Result<(), ReaderError> {
            Ok(())
        }
    }

    fn owner() -> Weak<dyn ReaderHandle> {
        let owner: Arc<dyn ReaderHandle> = Arc::new(NoFlush);
        Arc::downgrade(&owner)
    }

    #[test]
    fn wrong_computation_id_is_fatal() {
        let binding = ReaderBinding::new("comp", b"key".to_vec(), 1);
        let mut outstanding = Outstanding::new();
        let response = GetDataResponse {
            computations: vec![ComputationGetDataResponse {
                computation_id: "other".into(),
                keys: vec![],
            }],
        };
        let err = consume_response(&binding, &mut outstanding, response).unwrap_err();
        assert!(matches!(err, ReaderError::ComputationMismatch { .. }));
    }

    #[test]
    fn unknown_tag_is_fatal_and_leaves_others_routable() {
        let binding = ReaderBinding::new("comp", b"key".to_vec(), 1);
        let known_slot = HandleSlot::new_watermark(owner());
        let mut outstanding = Outstanding::new();
        outstanding.insert(b"known".to_vec(), (TagKey::watermark("known"), known_slot));

        let response = GetDataResponse {
            computations: vec![ComputationGetDataResponse {
                computation_id: "comp".into(),
                keys: vec![KeyedGetDataResponse {
                    key: b"key".to_vec(),
                    values: vec![],
                    lists: vec![ListItem {
                        tag: b"unexpected".to_vec(),
                        entries: vec![Payload { data: Some(vec![0, 1]), timestamp: Some(1) }],
                    }],
                }],
            }],
        };
        let err = consume_response(&binding, &mut outstanding, response).unwrap_err();
        assert!(matches!(err, ReaderError::UnknownTag { .. }));
        // the known tag is still outstanding; caller fails it with this error.
        assert_eq!(outstanding.len(), 1);
    }
}
