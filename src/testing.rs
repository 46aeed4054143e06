//! In-memory [`BookmarkService`] used by unit tests.

use crate::karakeep::{BookmarkService, Collection, Entry, EntryPage, RemoteError};
use reqwest::StatusCode;
use std::cell::{Cell, RefCell};
use std::collections::HashSet;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Call {
    pub op: &'static str,
    pub target: String,
}

#[derive(Debug, Clone)]
pub struct StoredEntry {
    pub id: String,
    pub title: Option<String>,
    pub body: String,
}

pub struct FakeBookmarks {
    collections: RefCell<Vec<Collection>>,
    entries: RefCell<Vec<StoredEntry>>,
    /// (collection id, entry id), in insertion order.
    members: RefCell<Vec<(String, String)>>,
    calls: RefCell<Vec<Call>>,
    failing: RefCell<HashSet<&'static str>>,
    failing_titles: RefCell<HashSet<String>>,
    page_size: Cell<usize>,
    next_id: Cell<u32>,
}

impl FakeBookmarks {
    pub fn new() -> Self {
        Self {
            collections: RefCell::new(Vec::new()),
            entries: RefCell::new(Vec::new()),
            members: RefCell::new(Vec::new()),
            calls: RefCell::new(Vec::new()),
            failing: RefCell::new(HashSet::new()),
            failing_titles: RefCell::new(HashSet::new()),
            page_size: Cell::new(2),
            next_id: Cell::new(1),
        }
    }

    pub fn add_collection(&self, id: &str, name: &str) {
        self.collections.borrow_mut().push(Collection {
            id: id.to_string(),
            name: name.to_string(),
        });
    }

    /// Seed an entry that already sits in `collection_id`.
    pub fn add_entry(&self, collection_id: &str, id: &str, title: Option<&str>) {
        self.entries.borrow_mut().push(StoredEntry {
            id: id.to_string(),
            title: title.map(str::to_string),
            body: String::new(),
        });
        self.members
            .borrow_mut()
            .push((collection_id.to_string(), id.to_string()));
    }

    /// Make every call of operation `op` fail with a 500.
    pub fn fail_on(&self, op: &'static str) {
        self.failing.borrow_mut().insert(op);
    }

    pub fn heal(&self) {
        self.failing.borrow_mut().clear();
        self.failing_titles.borrow_mut().clear();
    }

    /// Make creates/updates carrying exactly this title fail.
    pub fn fail_on_title(&self, title: &str) {
        self.failing_titles.borrow_mut().insert(title.to_string());
    }

    pub fn set_page_size(&self, size: usize) {
        self.page_size.set(size);
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.borrow().clone()
    }

    pub fn calls_named(&self, op: &str) -> usize {
        self.calls.borrow().iter().filter(|c| c.op == op).count()
    }

    pub fn clear_calls(&self) {
        self.calls.borrow_mut().clear();
    }

    pub fn entry(&self, id: &str) -> Option<StoredEntry> {
        self.entries.borrow().iter().find(|e| e.id == id).cloned()
    }

    pub fn entries_in(&self, collection_id: &str) -> Vec<StoredEntry> {
        self.members
            .borrow()
            .iter()
            .filter(|(c, _)| c == collection_id)
            .filter_map(|(_, e)| self.entry(e))
            .collect()
    }

    fn record(&self, op: &'static str, target: &str) -> Result<(), RemoteError> {
        self.calls.borrow_mut().push(Call {
            op,
            target: target.to_string(),
        });
        if self.failing.borrow().contains(op) {
            return Err(server_error());
        }
        Ok(())
    }

    fn check_title(&self, title: &str) -> Result<(), RemoteError> {
        if self.failing_titles.borrow().contains(title) {
            return Err(server_error());
        }
        Ok(())
    }

    fn mint_id(&self, prefix: &str) -> String {
        let n = self.next_id.get();
        self.next_id.set(n + 1);
        format!("{prefix}{n}")
    }
}

fn server_error() -> RemoteError {
    RemoteError::Status {
        status: StatusCode::INTERNAL_SERVER_ERROR,
        body: "simulated failure".to_string(),
    }
}

impl BookmarkService for FakeBookmarks {
    fn list_collections(&self) -> Result<Vec<Collection>, RemoteError> {
        self.record("list_collections", "")?;
        Ok(self.collections.borrow().clone())
    }

    fn create_collection(&self, name: &str) -> Result<String, RemoteError> {
        self.record("create_collection", name)?;
        let id = self.mint_id("list_");
        self.add_collection(&id, name);
        Ok(id)
    }

    fn list_collection_entries(
        &self,
        collection_id: &str,
        cursor: Option<&str>,
    ) -> Result<EntryPage, RemoteError> {
        self.record("list_collection_entries", cursor.unwrap_or(""))?;
        let all = self.entries_in(collection_id);
        let start: usize = cursor.map(|c| c.parse().unwrap()).unwrap_or(0);
        let end = (start + self.page_size.get()).min(all.len());
        let bookmarks = all[start.min(end)..end]
            .iter()
            .map(|e| Entry {
                id: Some(e.id.clone()),
                title: e.title.clone(),
            })
            .collect();
        let next_cursor = (end < all.len()).then(|| end.to_string());
        Ok(EntryPage {
            bookmarks,
            next_cursor,
        })
    }

    fn create_entry(&self, title: &str, body: &str) -> Result<String, RemoteError> {
        self.record("create_entry", title)?;
        self.check_title(title)?;
        let id = self.mint_id("bm_");
        self.entries.borrow_mut().push(StoredEntry {
            id: id.clone(),
            title: Some(title.to_string()),
            body: body.to_string(),
        });
        Ok(id)
    }

    fn update_entry(&self, entry_id: &str, title: &str, body: &str) -> Result<(), RemoteError> {
        self.record("update_entry", entry_id)?;
        self.check_title(title)?;
        let mut entries = self.entries.borrow_mut();
        let Some(entry) = entries.iter_mut().find(|e| e.id == entry_id) else {
            return Err(RemoteError::Status {
                status: StatusCode::NOT_FOUND,
                body: "Bookmark not found".to_string(),
            });
        };
        entry.title = Some(title.to_string());
        entry.body = body.to_string();
        Ok(())
    }

    fn attach_entry_to_collection(
        &self,
        entry_id: &str,
        collection_id: &str,
    ) -> Result<(), RemoteError> {
        self.record("attach_entry_to_collection", entry_id)?;
        self.members
            .borrow_mut()
            .push((collection_id.to_string(), entry_id.to_string()));
        Ok(())
    }
}
