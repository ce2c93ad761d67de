use deferred_state_reader::testing::FakeBackingStore;
use deferred_state_reader::{Payload, Reader};

// Trivial decoders: the value tag carries a UTF-8 string, the list tag
// carries fixed-width u32s.
fn decode_string(bytes: &[u8]) -> Result<String, std::string::FromUtf8Error> {
    String::from_utf8(bytes.to_vec())
}

fn decode_u32(bytes: &[u8]) -> Result<u32, std::array::TryFromSliceError> {
    Ok(u32::from_be_bytes(bytes.try_into()?))
}

fn main() {
    let store = FakeBackingStore::new()
        .with_value("title", Some(Payload { data: Some(b"angry men".to_vec()), timestamp: None }))
        .with_list(
            "scores",
            vec![
                Payload { data: Some(vec![0, 0, 0, 0, 1]), timestamp: None },
                Payload { data: Some(vec![0, 0, 0, 0, 2]), timestamp: None },
            ],
        );

    let reader = Reader::new("my-computation", b"key-12".to_vec(), 1, store);

    // Registering a tag doesn't fetch anything yet; it just queues it.
    let title = reader.value_handle("title", decode_string);
    let scores = reader.list_handle("scores", decode_u32);
    let as_of = reader.watermark_handle("as_of");

    // Registering "title" again before the flush reuses the same handle
    // instead of queuing a second fetch.
    let title_again = reader.value_handle("title", decode_string);

    reader.flush().expect("flush should succeed against the fake store");

    assert_eq!(title.get().unwrap().as_deref(), Some("angry men"));
    assert_eq!(title_again.get().unwrap().as_deref(), Some("angry men"));
    assert_eq!(scores.get().unwrap(), vec![1, 2]);
    assert_eq!(as_of.get().unwrap(), None);

    println!("title={:?} scores={:?} as_of={:?}", title.get().unwrap(), scores.get().unwrap(), as_of.get().unwrap());
}
