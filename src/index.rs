//! Map of chats that already have a bookmark in the target list.

use crate::collection::CollectionHandle;
use crate::karakeep::BookmarkService;
use crate::marker;
use eyre::{Context, Result, eyre};
use std::collections::HashMap;

/// A bookmark recovered from its title marker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteRef {
    pub remote_id: String,
    pub foreign_id: String,
}

/// `chat id -> bookmark` for one list, rebuilt from scratch on every run.
#[derive(Debug, Default)]
pub struct RemoteIndex {
    by_foreign_id: HashMap<String, RemoteRef>,
}

impl RemoteIndex {
    pub fn get(&self, foreign_id: &str) -> Option<&RemoteRef> {
        self.by_foreign_id.get(foreign_id)
    }

    /// Record a bookmark created during this run.
    pub fn insert(&mut self, foreign_id: &str, remote_id: &str) {
        self.by_foreign_id.insert(
            foreign_id.to_string(),
            RemoteRef {
                remote_id: remote_id.to_string(),
                foreign_id: foreign_id.to_string(),
            },
        );
    }

    pub fn len(&self) -> usize {
        self.by_foreign_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_foreign_id.is_empty()
    }
}

/// Page through every bookmark of `collection` and index the ones carrying a marker.
///
/// Any failed page aborts the build: a partial index would make existing chats
/// look new and get created a second time.
pub fn build<S: BookmarkService>(service: &S, collection: &CollectionHandle) -> Result<RemoteIndex> {
    let mut index = RemoteIndex::default();
    let mut cursor: Option<String> = None;
    let mut pages = 0usize;
    let mut scanned = 0usize;

    loop {
        let page = service
            .list_collection_entries(&collection.id, cursor.as_deref())
            .wrap_err_with(|| {
                format!(
                    "Failed to fetch bookmarks of list {} (page {}, cursor {:?})",
                    collection.id,
                    pages + 1,
                    cursor
                )
            })?;
        pages += 1;

        for entry in page.bookmarks {
            scanned += 1;
            let Some(remote_id) = entry.id.filter(|id| !id.is_empty()) else {
                tracing::warn!("skipping bookmark without an id");
                continue;
            };
            let Some(foreign_id) = entry.title.as_deref().and_then(marker::parse_title) else {
                continue;
            };

            if let Some(existing) = index.get(foreign_id) {
                tracing::warn!(
                    foreign_id,
                    kept = %existing.remote_id,
                    ignored = %remote_id,
                    "several bookmarks carry the same chat id"
                );
                continue;
            }
            index.insert(foreign_id, &remote_id);
        }

        match page.next_cursor.filter(|c| !c.is_empty()) {
            None => break,
            Some(next) if cursor.as_deref() == Some(next.as_str()) => {
                return Err(eyre!(
                    "Karakeep returned the same cursor {:?} twice for list {}",
                    next,
                    collection.id
                ));
            }
            Some(next) => cursor = Some(next),
        }
    }

    tracing::info!(
        list = %collection.id,
        pages,
        scanned,
        indexed = index.len(),
        "built index of existing bookmarks"
    );
    Ok(index)
}
