//! # owui-karakeep-sync
//!
//! A CLI tool that incrementally copies [OpenWebUI](https://openwebui.com) chats into a
//! [Karakeep](https://karakeep.app) list, one text bookmark per conversation.
//!
//! ## What it does
//!
//! OpenWebUI stores every conversation as a JSON document in the `chat` table of its
//! SQLite (or PostgreSQL) database. This tool reads the chats that changed since the last run, renders
//! each one as Markdown and creates or updates the matching bookmark through the
//! Karakeep REST API.
//!
//! The database is opened **read-only**; your data is never modified. Deleting a chat
//! in OpenWebUI does not delete its bookmark.
//!
//! ## Incremental sync
//!
//! The newest `updated_at` that reached Karakeep is kept in a small JSON state file.
//! It never moves past a chat that failed to sync, so failures are picked up again
//! next time, even when newer chats went through.
//!
//! Bookmarks are matched to chats through a marker at the end of their title,
//! `Trip planning [OW_ID:<chat id>]`. Losing the state file is therefore harmless:
//! the next run re-sends everything as updates, not as new bookmarks.
//!
//! ## Usage
//!
//! ```sh
//! export KARAKEEP_API_KEY=ak1_...
//! owui-karakeep-sync --db /srv/open-webui/webui.db --api-url http://localhost:3000/api/v1
//! ```
//!
//! Preferences can be persisted in `~/.config/owui-karakeep-sync/config.toml`.

pub mod changes;
pub mod collection;
pub mod config;
pub mod index;
pub mod karakeep;
pub mod marker;
pub mod reconcile;
pub mod render;
pub mod source;
pub mod state;
pub mod sync;

#[cfg(test)]
mod testing;
