//! Write side: the Karakeep (formerly Hoarder) REST API v1.
//!
//! The engine only talks to [`BookmarkService`]; [`KarakeepClient`] is the
//! blocking HTTP implementation used by the binary.

use reqwest::StatusCode;
use reqwest::blocking::{Client, RequestBuilder, Response};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use url::Url;

/// A Karakeep list. Lists play the role of collections.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Collection {
    pub id: String,
    pub name: String,
}

/// A bookmark as returned by list listings. Only `id` and `title` matter here.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Entry {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
}

/// One page of a list's bookmarks.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct EntryPage {
    #[serde(default)]
    pub bookmarks: Vec<Entry>,
    #[serde(rename = "nextCursor", default)]
    pub next_cursor: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum RemoteError {
    #[error("HTTP {status}: {body}")]
    Status { status: StatusCode, body: String },

    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("response is missing the {0} id")]
    MissingId(&'static str),

    #[error("invalid endpoint URL: {0}")]
    Url(#[from] url::ParseError),
}

impl RemoteError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, RemoteError::Status { status, .. } if *status == StatusCode::NOT_FOUND)
    }
}

/// The operations the reconciler needs from the bookmark service.
pub trait BookmarkService {
    fn list_collections(&self) -> Result<Vec<Collection>, RemoteError>;
    fn create_collection(&self, name: &str) -> Result<String, RemoteError>;
    fn list_collection_entries(
        &self,
        collection_id: &str,
        cursor: Option<&str>,
    ) -> Result<EntryPage, RemoteError>;
    fn create_entry(&self, title: &str, body: &str) -> Result<String, RemoteError>;
    fn update_entry(&self, entry_id: &str, title: &str, body: &str) -> Result<(), RemoteError>;
    fn attach_entry_to_collection(
        &self,
        entry_id: &str,
        collection_id: &str,
    ) -> Result<(), RemoteError>;
}

#[derive(Serialize)]
struct TextBookmark<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    title: &'a str,
    text: &'a str,
    note: &'static str,
    summary: &'static str,
    archived: bool,
    favourited: bool,
}

impl<'a> TextBookmark<'a> {
    fn new(title: &'a str, text: &'a str) -> Self {
        Self {
            kind: "text",
            title,
            text,
            note: "",
            summary: "",
            archived: false,
            favourited: false,
        }
    }
}

#[derive(Serialize)]
struct NewList<'a> {
    name: &'a str,
    icon: &'static str,
}

#[derive(Deserialize)]
struct ListsResponse {
    #[serde(default)]
    lists: Vec<Collection>,
}

/// `{ "id": ... }`, or the same nested under a key on some versions.
#[derive(Deserialize)]
struct IdResponse {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    list: Option<Box<IdResponse>>,
}

impl IdResponse {
    fn into_id(self) -> Option<String> {
        self.id
            .filter(|id| !id.is_empty())
            .or_else(|| self.list.and_then(|l| l.into_id()))
    }
}

const BODY_EXCERPT_LEN: usize = 200;

pub struct KarakeepClient {
    client: Client,
    base_url: Url,
    api_key: String,
    page_size: u32,
    request_delay: Duration,
}

impl KarakeepClient {
    pub fn new(
        base_url: Url,
        api_key: impl Into<String>,
        page_size: u32,
        timeout: Duration,
        request_delay: Duration,
    ) -> Result<Self, RemoteError> {
        let client = Client::builder()
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()?;
        Ok(Self {
            client,
            base_url,
            api_key: api_key.into(),
            page_size,
            request_delay,
        })
    }

    /// Join path segments onto the API root without dropping its own path (`/api/v1`).
    fn endpoint(&self, segments: &[&str]) -> Result<Url, RemoteError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| RemoteError::Url(url::ParseError::RelativeUrlWithCannotBeABaseBase))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn send(&self, request: RequestBuilder) -> Result<Response, RemoteError> {
        if !self.request_delay.is_zero() {
            std::thread::sleep(self.request_delay);
        }
        let response = request
            .bearer_auth(&self.api_key)
            .header(reqwest::header::ACCEPT, "application/json")
            .send()?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().unwrap_or_default();
        let body = body.chars().take(BODY_EXCERPT_LEN).collect();
        Err(RemoteError::Status { status, body })
    }
}

impl BookmarkService for KarakeepClient {
    fn list_collections(&self) -> Result<Vec<Collection>, RemoteError> {
        let url = self.endpoint(&["lists"])?;
        let lists: ListsResponse = self.send(self.client.get(url))?.json()?;
        Ok(lists.lists)
    }

    fn create_collection(&self, name: &str) -> Result<String, RemoteError> {
        let url = self.endpoint(&["lists"])?;
        let body = NewList { name, icon: "list" };
        let created: IdResponse = self.send(self.client.post(url).json(&body))?.json()?;
        created.into_id().ok_or(RemoteError::MissingId("list"))
    }

    fn list_collection_entries(
        &self,
        collection_id: &str,
        cursor: Option<&str>,
    ) -> Result<EntryPage, RemoteError> {
        let mut url = self.endpoint(&["lists", collection_id, "bookmarks"])?;
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("limit", &self.page_size.to_string());
            if let Some(c) = cursor {
                query.append_pair("cursor", c);
            }
        }
        Ok(self.send(self.client.get(url))?.json()?)
    }

    fn create_entry(&self, title: &str, body: &str) -> Result<String, RemoteError> {
        let url = self.endpoint(&["bookmarks"])?;
        let payload = TextBookmark::new(title, body);
        let created: IdResponse = self.send(self.client.post(url).json(&payload))?.json()?;
        created.into_id().ok_or(RemoteError::MissingId("bookmark"))
    }

    fn update_entry(&self, entry_id: &str, title: &str, body: &str) -> Result<(), RemoteError> {
        let url = self.endpoint(&["bookmarks", entry_id])?;
        let payload = TextBookmark::new(title, body);
        self.send(self.client.put(url).json(&payload))?;
        Ok(())
    }

    fn attach_entry_to_collection(
        &self,
        entry_id: &str,
        collection_id: &str,
    ) -> Result<(), RemoteError> {
        let url = self.endpoint(&["lists", collection_id, "bookmarks", entry_id])?;
        self.send(self.client.put(url).json(&serde_json::json!({})))?;
        Ok(())
    }
}
