//! Read side: the OpenWebUI database, SQLite or PostgreSQL.
//!
//! Table schema (the columns this tool reads; `public.chat` on PostgreSQL):
//! ```sql
//! CREATE TABLE chat (
//!     id         VARCHAR(255) NOT NULL PRIMARY KEY,
//!     user_id    VARCHAR(255) NOT NULL,
//!     title      TEXT NOT NULL,
//!     chat       JSON,
//!     created_at BIGINT NOT NULL,  -- epoch seconds
//!     updated_at BIGINT NOT NULL,  -- epoch seconds
//!     ...
//! );
//! ```

use crate::config::ChatDatabase;
use eyre::{Context, Result, eyre};
use rusqlite::{Connection, OpenFlags};
use std::cell::RefCell;
use std::path::Path;

/// One row of the `chat` table, as far as syncing is concerned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatRow {
    pub id: String,
    pub title: Option<String>,
    /// Raw JSON payload of the conversation.
    pub chat: Option<String>,
    /// Epoch seconds.
    pub updated_at: i64,
}

/// Anything that can answer "which chats changed after T".
pub trait ChatSource {
    /// Rows with `updated_at` strictly greater than `since` (epoch seconds),
    /// oldest change first.
    fn list_changed_since(&self, since: i64) -> Result<Vec<ChatRow>>;
}

/// Open whichever backend the configuration names.
pub fn open(database: &ChatDatabase) -> Result<Box<dyn ChatSource>> {
    Ok(match database {
        ChatDatabase::Sqlite(path) => Box::new(SqliteChatSource::open(path)?),
        ChatDatabase::Postgres(params) => Box::new(PostgresChatSource::connect(params)?),
    })
}

pub struct SqliteChatSource {
    conn: Connection,
}

impl SqliteChatSource {
    /// Open the database read-only; OpenWebUI may be running against it.
    pub fn open(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(eyre!("Database not found at: {}", path.display()));
        }
        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .wrap_err_with(|| format!("Failed to open source database: {}", path.display()))?;
        tracing::info!(path = %path.display(), "connected to OpenWebUI database");
        Ok(Self { conn })
    }

    pub fn from_connection(conn: Connection) -> Self {
        Self { conn }
    }
}

impl ChatSource for SqliteChatSource {
    fn list_changed_since(&self, since: i64) -> Result<Vec<ChatRow>> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT id, title, updated_at, chat FROM chat \
                 WHERE updated_at > ?1 ORDER BY updated_at ASC",
            )
            .wrap_err("Failed to prepare query (is this an OpenWebUI database?)")?;

        let rows = stmt
            .query_map([since], |row| {
                Ok(ChatRow {
                    id: row.get(0)?,
                    title: row.get(1)?,
                    updated_at: row.get(2)?,
                    chat: row.get(3)?,
                })
            })
            .wrap_err("Failed to execute query")?
            .collect::<rusqlite::Result<Vec<_>>>()
            .wrap_err("Failed to read chat rows")?;

        tracing::info!(since, count = rows.len(), "queried chats changed since watermark");
        Ok(rows)
    }
}

pub struct PostgresChatSource {
    client: RefCell<postgres::Client>,
}

impl PostgresChatSource {
    /// Connect and switch the session to read-only transactions.
    pub fn connect(params: &str) -> Result<Self> {
        let mut client = postgres::Client::connect(params, postgres::NoTls)
            .wrap_err("Failed to connect to the OpenWebUI PostgreSQL database")?;
        client
            .batch_execute("SET SESSION CHARACTERISTICS AS TRANSACTION READ ONLY")
            .wrap_err("Failed to make the PostgreSQL session read-only")?;
        tracing::info!("connected to OpenWebUI PostgreSQL database");
        Ok(Self {
            client: RefCell::new(client),
        })
    }
}

impl ChatSource for PostgresChatSource {
    fn list_changed_since(&self, since: i64) -> Result<Vec<ChatRow>> {
        // `chat` is a json column there; read it back as text
        let rows = self
            .client
            .borrow_mut()
            .query(
                "SELECT id, title, updated_at, chat::text FROM public.chat \
                 WHERE updated_at > $1 ORDER BY updated_at ASC",
                &[&since],
            )
            .wrap_err("Failed to execute query (is this an OpenWebUI database?)")?;

        let rows = rows
            .iter()
            .map(|row| {
                Ok(ChatRow {
                    id: row.try_get(0)?,
                    title: row.try_get(1)?,
                    updated_at: row.try_get(2)?,
                    chat: row.try_get(3)?,
                })
            })
            .collect::<Result<Vec<_>, postgres::Error>>()
            .wrap_err("Failed to read chat rows")?;

        tracing::info!(since, count = rows.len(), "queried chats changed since watermark");
        Ok(rows)
    }
}
