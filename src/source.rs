use tracing::{debug, info, warn};

use crate::domain::{Cursor, ItemDescriptor};
use crate::error::QueueError;

pub const CURSOR_LOOKAHEAD: usize = 5;

pub trait PlaylistClient: Send + Sync {
    fn list_entries(
        &self,
        source_url: &str,
        limit: Option<usize>,
    ) -> Result<Vec<ItemDescriptor>, QueueError>;
}

impl<T: PlaylistClient + ?Sized> PlaylistClient for &T {
    fn list_entries(
        &self,
        source_url: &str,
        limit: Option<usize>,
    ) -> Result<Vec<ItemDescriptor>, QueueError> {
        (**self).list_entries(source_url, limit)
    }
}

/// Items published after the cursor, oldest first.
///
/// With a cursor id the newest [`CURSOR_LOOKAHEAD`] entries are scanned and
/// cut at the id. When the id is not among them (more new items than the
/// window, or the item was removed upstream) the numeric index decides: the
/// newest `total - last_download_index` entries are new.
pub fn new_items<C>(
    client: &C,
    source_url: &str,
    cursor: &Cursor,
) -> Result<Vec<ItemDescriptor>, QueueError>
where
    C: PlaylistClient + ?Sized,
{
    if let Some(last_id) = cursor.last_item_id.as_deref() {
        let recent = client.list_entries(source_url, Some(CURSOR_LOOKAHEAD))?;
        if let Some(position) = recent.iter().position(|entry| entry.id == last_id) {
            let mut fresh: Vec<_> = recent.into_iter().take(position).collect();
            fresh.reverse();
            log_found(source_url, fresh.len());
            return Ok(fresh);
        }
        warn!(
            source = source_url,
            last_id, "last queued item not among the {CURSOR_LOOKAHEAD} newest entries; using index"
        );
    }

    let all = client.list_entries(source_url, None)?;
    let total = all.len();
    let fresh_count = total.saturating_sub(cursor.last_download_index as usize);
    debug!(
        source = source_url,
        total,
        last_download_index = cursor.last_download_index,
        "numeric cursor"
    );
    let mut fresh: Vec<_> = all.into_iter().take(fresh_count).collect();
    fresh.reverse();
    log_found(source_url, fresh.len());
    Ok(fresh)
}

fn log_found(source_url: &str, count: usize) {
    match count {
        0 => info!(source = source_url, "no new videos found"),
        1 => info!(source = source_url, "1 video found"),
        n => info!(source = source_url, "{n} videos found"),
    }
}
