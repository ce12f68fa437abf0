use std::sync::Mutex;

use assert_matches::assert_matches;

use vidqueue::domain::{Cursor, ItemDescriptor};
use vidqueue::error::QueueError;
use vidqueue::source::{CURSOR_LOOKAHEAD, PlaylistClient, new_items};

/// Newest-first listing that records every requested limit.
struct Channel {
    newest_first: Vec<String>,
    limits: Mutex<Vec<Option<usize>>>,
}

impl Channel {
    fn with_uploads(count: usize) -> Self {
        Self {
            newest_first: (1..=count).rev().map(|n| format!("v{n}")).collect(),
            limits: Mutex::new(Vec::new()),
        }
    }
}

impl PlaylistClient for Channel {
    fn list_entries(
        &self,
        _source_url: &str,
        limit: Option<usize>,
    ) -> Result<Vec<ItemDescriptor>, QueueError> {
        self.limits.lock().unwrap().push(limit);
        Ok(self
            .newest_first
            .iter()
            .take(limit.unwrap_or(usize::MAX))
            .map(|id| ItemDescriptor {
                id: id.clone(),
                title: id.to_uppercase(),
                url: format!("https://v/{id}"),
                duration: 10.0,
            })
            .collect())
    }
}

struct Offline;

impl PlaylistClient for Offline {
    fn list_entries(
        &self,
        _source_url: &str,
        _limit: Option<usize>,
    ) -> Result<Vec<ItemDescriptor>, QueueError> {
        Err(QueueError::Enumeration("network unreachable".to_string()))
    }
}

fn ids(items: &[ItemDescriptor]) -> Vec<&str> {
    items.iter().map(|item| item.id.as_str()).collect()
}

#[test]
fn first_run_takes_whole_listing_oldest_first() {
    let channel = Channel::with_uploads(3);
    let items = new_items(&channel, "https://v/c", &Cursor::default()).unwrap();
    assert_eq!(ids(&items), vec!["v1", "v2", "v3"]);
    assert_eq!(*channel.limits.lock().unwrap(), vec![None]);
}

#[test]
fn more_uploads_than_lookahead_fall_back_to_index() {
    let channel = Channel::with_uploads(10);
    let cursor = Cursor {
        last_item_id: Some("v3".to_string()),
        last_download_index: 3,
    };
    let items = new_items(&channel, "https://v/c", &cursor).unwrap();
    assert_eq!(items.len(), 7);
    assert_eq!(items.first().map(|item| item.id.as_str()), Some("v4"));
    assert_eq!(items.last().map(|item| item.id.as_str()), Some("v10"));
    assert_eq!(
        *channel.limits.lock().unwrap(),
        vec![Some(CURSOR_LOOKAHEAD), None]
    );
}

#[test]
fn cursor_at_newest_finds_nothing() {
    let channel = Channel::with_uploads(4);
    let cursor = Cursor {
        last_item_id: Some("v4".to_string()),
        last_download_index: 4,
    };
    assert!(new_items(&channel, "https://v/c", &cursor).unwrap().is_empty());
}

#[test]
fn listing_errors_propagate() {
    assert_matches!(
        new_items(&Offline, "https://v/c", &Cursor::default()),
        Err(QueueError::Enumeration(_))
    );
}
