use assert_matches::assert_matches;
use camino::Utf8PathBuf;

use vidqueue::domain::{DEFAULT_MAX_HEIGHT, ItemDescriptor, WorkItem};
use vidqueue::error::QueueError;
use vidqueue::store::LinkQueue;

fn item(id: &str, title: &str) -> WorkItem {
    WorkItem::from_descriptor(
        ItemDescriptor {
            id: id.to_string(),
            title: title.to_string(),
            url: format!("https://v/{id}"),
            duration: 1.0,
        },
        0,
        "chan",
        DEFAULT_MAX_HEIGHT,
    )
}

fn queue() -> (tempfile::TempDir, LinkQueue) {
    let temp = tempfile::tempdir().unwrap();
    let root = Utf8PathBuf::from_path_buf(temp.path().to_path_buf()).unwrap();
    (temp, LinkQueue::new(root))
}

#[test]
fn enqueue_then_load() {
    let (_guard, queue) = queue();
    let stored = item("abc", "First");
    let path = queue.enqueue(&stored).unwrap();
    assert_eq!(path, queue.root().join("abc.link"));
    assert_eq!(LinkQueue::load(&path).unwrap(), stored);
}

#[test]
fn shared_id_prefix_overwrites() {
    let (_guard, queue) = queue();
    queue
        .enqueue(&item("0123456789abcdefghij-one", "One"))
        .unwrap();
    let path = queue
        .enqueue(&item("0123456789abcdefghij-two", "Two"))
        .unwrap();
    assert_eq!(queue.pending().unwrap().len(), 1);
    assert_eq!(LinkQueue::load(&path).unwrap().title, "Two");
}

#[test]
fn complete_removes_and_reports_missing() {
    let (_guard, queue) = queue();
    let path = queue.enqueue(&item("abc", "A")).unwrap();
    LinkQueue::complete(&path).unwrap();
    assert!(queue.pending().unwrap().is_empty());
    assert_matches!(LinkQueue::complete(&path), Err(QueueError::NotFound(_)));
    assert_matches!(LinkQueue::load(&path), Err(QueueError::NotFound(_)));
}

#[test]
fn requeue_restores_broken_links() {
    let (_guard, queue) = queue();
    let path = queue.enqueue(&item("abc", "A")).unwrap();
    LinkQueue::mark_broken(&path).unwrap();
    assert!(queue.pending().unwrap().is_empty());

    let requeued = queue.requeue_broken().unwrap();
    assert_eq!(requeued, vec![path.clone()]);
    assert_eq!(queue.pending().unwrap(), vec![path]);
    assert!(queue.broken().unwrap().is_empty());
}

#[test]
fn missing_root_lists_nothing() {
    let (_guard, queue) = queue();
    let absent = LinkQueue::new(queue.root().join("absent"));
    assert!(absent.pending().unwrap().is_empty());
}
