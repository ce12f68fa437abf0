use assert_matches::assert_matches;
use serde_json::json;

use vidqueue::domain::{ItemDescriptor, WorkItem};
use vidqueue::error::QueueError;

fn item(id: &str) -> WorkItem {
    WorkItem::from_descriptor(
        ItemDescriptor {
            id: id.to_string(),
            title: "Title".to_string(),
            url: "https://v/x".to_string(),
            duration: 12.5,
        },
        2,
        "chan",
        720,
    )
}

#[test]
fn link_file_name_sanitizes_separators() {
    assert_eq!(item("abc").link_file_name(), "abc.link");
    assert_eq!(item("a/b\\c").file_stem(), "a_b_c");
}

#[test]
fn work_item_survives_storage() {
    let original = item("abc");
    let json = serde_json::to_string(&original).unwrap();
    let restored: WorkItem = serde_json::from_str(&json).unwrap();
    assert_eq!(restored, original);
}

#[test]
fn descriptor_accepts_numeric_id_and_null_duration() {
    let descriptor =
        ItemDescriptor::from_value(&json!({"id": 42, "title": "A", "url": "u", "duration": null}))
            .unwrap();
    assert_eq!(descriptor.id, "42");
    assert_eq!(descriptor.duration, 0.0);
}

#[test]
fn descriptor_rejects_blank_id() {
    for id in ["", "   "] {
        assert_matches!(
            ItemDescriptor::from_value(&json!({"id": id, "title": "A", "url": "u", "duration": 1})),
            Err(QueueError::InvalidEntry(_))
        );
    }
}
